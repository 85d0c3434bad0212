//! Kubernetes resource watchers.
//!
//! One informer per watched kind. VirtualMachine events map to their own key;
//! workload pod and console service events map back to the owning VM's key,
//! so child state changes re-trigger the same reconcile path.

use crate::config::{ControllerConfig, OwnershipLabels};
use crds::{Credential, VirtualMachine};
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::{Api, Client, Resource};
use kube_runtime::watcher;
use reconcile_runtime::{
    store, watch_stream, Cache, EventRouter, Informer, ObjectKey, Shutdown, WorkQueue,
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tokio::task::JoinHandle;

/// Read-only views of every watched kind.
#[derive(Debug, Clone)]
pub struct Caches {
    pub vms: Cache<VirtualMachine>,
    pub pods: Cache<Pod>,
    pub services: Cache<Service>,
    pub credentials: Cache<Credential>,
}

fn label<'a, K: Resource>(obj: &'a K, key: &str) -> Option<&'a str> {
    obj.meta().labels.as_ref()?.get(key).map(String::as_str)
}

fn has_role<K: Resource>(obj: &K, labels: &OwnershipLabels, role: &str) -> bool {
    label(obj, "app") == Some(labels.app.as_str()) && label(obj, "role") == Some(role)
}

/// Whether `pod` is a VM workload pod owned by this controller.
pub fn is_vm_workload(pod: &Pod, labels: &OwnershipLabels) -> bool {
    has_role(pod, labels, &labels.vm_role)
}

/// Maps a workload pod to its VM. Pod and VM share namespace and name.
pub fn vm_key_for_pod(pod: &Pod, labels: &OwnershipLabels) -> Option<ObjectKey> {
    if !is_vm_workload(pod, labels) {
        return None;
    }
    let meta = pod.meta();
    Some(ObjectKey::namespaced(meta.namespace.clone()?, meta.name.clone()?))
}

/// Maps a console service to its VM via the service's `name` label.
pub fn vm_key_for_service(service: &Service, labels: &OwnershipLabels) -> Option<ObjectKey> {
    if !has_role(service, labels, &labels.console_role) {
        return None;
    }
    let namespace = service.meta().namespace.clone()?;
    Some(ObjectKey::namespaced(namespace, label(service, "name")?))
}

/// Routes workload pod changes to the owning VM's key.
pub fn pod_router(queue: WorkQueue<ObjectKey>, labels: &OwnershipLabels) -> EventRouter<Pod> {
    let filter_labels = labels.clone();
    let key_labels = labels.clone();
    EventRouter::new("pod", queue)
        .with_predicate(move |pod: &Pod| is_vm_workload(pod, &filter_labels))
        .with_key_mapper(move |pod: &Pod| vm_key_for_pod(pod, &key_labels))
}

/// Routes console service changes to the owning VM's key.
pub fn service_router(queue: WorkQueue<ObjectKey>, labels: &OwnershipLabels) -> EventRouter<Service> {
    let labels = labels.clone();
    EventRouter::new("service", queue)
        .with_key_mapper(move |svc: &Service| vm_key_for_service(svc, &labels))
}

fn api_for<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

fn spawn_informer<K>(
    informer: Informer<K>,
    api: Api<K>,
    config: watcher::Config,
    shutdown: &Shutdown,
) -> JoinHandle<()>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    let shutdown = shutdown.clone();
    tokio::spawn(async move { informer.run(watch_stream(api, config), shutdown).await })
}

/// Starts one informer per watched kind, all routing into `queue`.
pub fn start(
    client: &Client,
    config: &ControllerConfig,
    queue: &WorkQueue<ObjectKey>,
    shutdown: &Shutdown,
) -> (Caches, Vec<JoinHandle<()>>) {
    let namespace = config.namespace.as_deref();
    let selector = format!("app={}", config.labels.app);

    let (vms, vm_writer) = store::<VirtualMachine>();
    let (pods, pod_writer) = store::<Pod>();
    let (services, service_writer) = store::<Service>();
    let (credentials, credential_writer) = store::<Credential>();

    let vm_informer = Informer::new("virtualmachine", vm_writer)
        .route_to(EventRouter::new("virtualmachine", queue.clone()));

    let pod_informer =
        Informer::new("pod", pod_writer).route_to(pod_router(queue.clone(), &config.labels));
    let service_informer = Informer::new("service", service_writer)
        .route_to(service_router(queue.clone(), &config.labels));

    // Credentials are only read, never reconciled
    let credential_informer = Informer::new("credential", credential_writer);

    let owned = watcher::Config::default().labels(&selector);
    let handles = vec![
        spawn_informer(vm_informer, api_for(client, namespace), watcher::Config::default(), shutdown),
        spawn_informer(pod_informer, api_for(client, namespace), owned.clone(), shutdown),
        spawn_informer(service_informer, api_for(client, namespace), owned, shutdown),
        spawn_informer(
            credential_informer,
            Api::all(client.clone()),
            watcher::Config::default(),
            shutdown,
        ),
    ];

    (
        Caches {
            vms,
            pods,
            services,
            credentials,
        },
        handles,
    )
}
