//! Child object templates: the VM workload pod, the noVNC console pod and the
//! console NodePort service.

use crate::config::ControllerConfig;
use crds::VirtualMachine;
use k8s_openapi::api::core::v1::{
    Container, DownwardAPIVolumeFile, DownwardAPIVolumeSource, EmptyDirVolumeSource, EnvVar,
    EnvVarSource, ExecAction, HostPathVolumeSource, ObjectFieldSelector, Pod, PodSpec, Probe,
    SecurityContext, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Name suffix of the console pod and service.
pub const CONSOLE_SUFFIX: &str = "-novnc";
/// Port the noVNC proxy listens on.
pub const CONSOLE_PORT: i32 = 6080;

const VM_IMAGE_PREFIX: &str = "llparse/vm-";
const VM_TOOLS_IMAGE: &str = "llparse/vm-tools:0.0.1";
const NOVNC_IMAGE: &str = "llparse/novnc:0.0.1";
const SOCKET_DIR: &str = "/tmp/rancher/vm-socks";
const VM_FS_DIR: &str = "/tmp/rancher/vm-fs";

pub fn console_name(vm_name: &str) -> String {
    format!("{vm_name}{CONSOLE_SUFFIX}")
}

/// Workload pod running the guest. Shares the VM's name.
pub fn vm_pod(vm: &VirtualMachine, public_keys: &[String], config: &ControllerConfig) -> Pod {
    let name = vm.name_any();
    let cpus = vm.spec.cpus.to_string();
    let memory = vm.spec.memory_mb.to_string();

    // The VNC socket only appears once qemu is up
    let socket_probe = Probe {
        exec: Some(ExecAction {
            command: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "[ -S /vm/${MY_POD_NAMESPACE}_${MY_POD_NAME}.sock ]".to_string(),
            ]),
        }),
        initial_delay_seconds: Some(2),
        timeout_seconds: Some(2),
        period_seconds: Some(3),
        success_threshold: Some(1),
        failure_threshold: Some(10),
        ..Default::default()
    };

    let mut vm_fs_mounts = vec![
        mount("vm-image", "/image", None, false),
        mount("dev-kvm", "/dev/kvm", None, false),
        mount("vm-socket", "/vm", None, false),
        // Kubelet bind-mounts hosts/hostname/resolv.conf into /etc
        mount("vm-fs", "/etc", Some("etc"), false),
    ];
    for dir in ["bin", "lib", "lib64", "sbin", "usr", "var"] {
        vm_fs_mounts.push(mount("vm-fs", &format!("/{dir}"), Some(dir), true));
    }

    Pod {
        metadata: child_meta(vm, name.clone(), &config.labels.vm_role, config, Some(annotations(vm))),
        spec: Some(PodSpec {
            volumes: Some(vec![
                host_path_volume("vm-fs", VM_FS_DIR),
                Volume {
                    name: "vm-image".to_string(),
                    empty_dir: Some(EmptyDirVolumeSource::default()),
                    ..Default::default()
                },
                host_path_volume("vm-socket", SOCKET_DIR),
                host_path_volume("dev-kvm", "/dev/kvm"),
            ]),
            init_containers: Some(vec![Container {
                name: "debootstrap".to_string(),
                image: Some(VM_TOOLS_IMAGE.to_string()),
                volume_mounts: Some(vec![mount("vm-fs", "/vm-tools", None, false)]),
                ..Default::default()
            }]),
            containers: vec![Container {
                name: "vm".to_string(),
                image: Some(format!("{VM_IMAGE_PREFIX}{}", vm.spec.image)),
                command: Some(vec!["/usr/bin/startvm".to_string()]),
                env: Some(vec![
                    env_var("IFACE", &config.vm_interface),
                    env_var("MEMORY_MB", &memory),
                    env_var("CPUS", &cpus),
                    env_var("PUBLIC_KEYS", &public_keys.join("\n")),
                    // Socket path is derived from pod identity
                    env_field("MY_POD_NAME", "metadata.name"),
                    env_field("MY_POD_NAMESPACE", "metadata.namespace"),
                ]),
                volume_mounts: Some(vm_fs_mounts),
                liveness_probe: Some(socket_probe.clone()),
                readiness_probe: Some(socket_probe),
                security_context: Some(SecurityContext {
                    privileged: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            host_network: Some(true),
            ..Default::default()
        }),
        status: None,
    }
}

/// noVNC proxy pod for the VM's console socket.
pub fn console_pod(vm: &VirtualMachine, config: &ControllerConfig) -> Pod {
    Pod {
        metadata: child_meta(
            vm,
            console_name(&vm.name_any()),
            &config.labels.console_role,
            config,
            None,
        ),
        spec: Some(PodSpec {
            volumes: Some(vec![
                host_path_volume("vm-socket", SOCKET_DIR),
                Volume {
                    name: "podinfo".to_string(),
                    downward_api: Some(DownwardAPIVolumeSource {
                        items: Some(vec![DownwardAPIVolumeFile {
                            path: "labels".to_string(),
                            field_ref: Some(field_selector("metadata.labels")),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ]),
            containers: vec![Container {
                name: "novnc".to_string(),
                image: Some(NOVNC_IMAGE.to_string()),
                command: Some(vec!["novnc".to_string()]),
                env: Some(vec![env_field("MY_POD_NAMESPACE", "metadata.namespace")]),
                volume_mounts: Some(vec![
                    mount("vm-socket", "/vm", None, false),
                    mount("podinfo", "/podinfo", None, false),
                ]),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: None,
    }
}

/// NodePort service in front of the console pod.
pub fn console_service(vm: &VirtualMachine, config: &ControllerConfig) -> Service {
    let meta = child_meta(
        vm,
        console_name(&vm.name_any()),
        &config.labels.console_role,
        config,
        None,
    );
    Service {
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some("novnc".to_string()),
                port: CONSOLE_PORT,
                ..Default::default()
            }]),
            selector: meta.labels.clone(),
            type_: Some("NodePort".to_string()),
            ..Default::default()
        }),
        metadata: meta,
        status: None,
    }
}

/// Labels shared by every child of `vm_name` in `role`.
pub fn child_labels(vm_name: &str, role: &str, config: &ControllerConfig) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), config.labels.app.clone()),
        ("name".to_string(), vm_name.to_string()),
        ("role".to_string(), role.to_string()),
    ])
}

fn child_meta(
    vm: &VirtualMachine,
    name: String,
    role: &str,
    config: &ControllerConfig,
    annotations: Option<BTreeMap<String, String>>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: vm.namespace(),
        labels: Some(child_labels(&vm.name_any(), role, config)),
        annotations,
        owner_references: vm.controller_owner_ref(&()).map(|owner| vec![owner]),
        ..Default::default()
    }
}

fn annotations(vm: &VirtualMachine) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("cpus".to_string(), vm.spec.cpus.to_string()),
        ("memory_mb".to_string(), vm.spec.memory_mb.to_string()),
        ("image".to_string(), vm.spec.image.clone()),
    ])
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}

fn env_field(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: None,
        value_from: Some(EnvVarSource {
            field_ref: Some(field_selector(field_path)),
            ..Default::default()
        }),
    }
}

fn field_selector(field_path: &str) -> ObjectFieldSelector {
    ObjectFieldSelector {
        field_path: field_path.to_string(),
        api_version: None,
    }
}

fn host_path_volume(name: &str, path: &str) -> Volume {
    Volume {
        name: name.to_string(),
        host_path: Some(HostPathVolumeSource {
            path: path.to_string(),
            type_: None,
        }),
        ..Default::default()
    }
}

fn mount(name: &str, mount_path: &str, sub_path: Option<&str>, read_only: bool) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: mount_path.to_string(),
        sub_path: sub_path.map(str::to_string),
        read_only: Some(read_only),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_vm;

    #[test]
    fn test_vm_pod_shape() {
        let vm = create_test_vm("vm1", "default", "start");
        let config = ControllerConfig::default();
        let pod = vm_pod(&vm, &["ssh-ed25519 AAAA user@host".to_string()], &config);

        assert_eq!(pod.metadata.name.as_deref(), Some("vm1"));
        assert_eq!(pod.metadata.namespace.as_deref(), Some("default"));
        let labels = pod.metadata.labels.as_ref().unwrap();
        assert_eq!(labels["app"], "ranchervm");
        assert_eq!(labels["role"], "vm");
        assert_eq!(labels["name"], "vm1");
        assert_eq!(pod.metadata.annotations.as_ref().unwrap()["memory_mb"], "1024");

        let owner = &pod.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner.kind, "VirtualMachine");
        assert_eq!(owner.controller, Some(true));

        let spec = pod.spec.unwrap();
        assert_eq!(spec.host_network, Some(true));
        let container = &spec.containers[0];
        assert_eq!(container.image.as_deref(), Some("llparse/vm-ubuntu"));
        let env = container.env.as_ref().unwrap();
        let value = |name: &str| {
            env.iter()
                .find(|e| e.name == name)
                .and_then(|e| e.value.clone())
        };
        assert_eq!(value("IFACE").as_deref(), Some("ens33"));
        assert_eq!(value("CPUS").as_deref(), Some("2"));
        assert_eq!(value("PUBLIC_KEYS").as_deref(), Some("ssh-ed25519 AAAA user@host"));
        assert!(container.readiness_probe.is_some());
    }

    #[test]
    fn test_console_service_selects_console_pod() {
        let vm = create_test_vm("vm1", "default", "start");
        let config = ControllerConfig::default();
        let pod = console_pod(&vm, &config);
        let svc = console_service(&vm, &config);

        assert_eq!(pod.metadata.name.as_deref(), Some("vm1-novnc"));
        assert_eq!(svc.metadata.name.as_deref(), Some("vm1-novnc"));

        let spec = svc.spec.unwrap();
        assert_eq!(spec.type_.as_deref(), Some("NodePort"));
        assert_eq!(spec.ports.unwrap()[0].port, CONSOLE_PORT);
        assert_eq!(spec.selector, pod.metadata.labels);
    }
}
