//! Unit tests for reconcile_helpers module

use super::*;
use crate::test_utils::{create_test_pod, ready_condition, terminating_meta};
use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};

#[test]
fn test_identity_from_uid() {
    let uid = "1a2b3c4d-0000-4000-8000-000000000000";
    assert_eq!(derive_instance_id(uid).as_deref(), Some("i-1a2b3c4d"));
    assert_eq!(derive_mac(uid).as_deref(), Some("06:fe:1a:2b:3c:4d"));
}

#[test]
fn test_identity_needs_eight_characters() {
    assert_eq!(derive_instance_id("1234567"), None);
    assert_eq!(derive_mac("123"), None);
}

#[test]
fn test_pod_state_pending_until_ready() {
    let mut pod = create_test_pod("vm1", "default", "vm");
    assert_eq!(observed_pod_state(&pod), VmState::Pending);

    pod.status = Some(ready_condition("False"));
    assert_eq!(observed_pod_state(&pod), VmState::Pending);

    pod.status = Some(ready_condition("True"));
    assert_eq!(observed_pod_state(&pod), VmState::Running);
}

#[test]
fn test_deleting_pod_reports_stopping_even_when_ready() {
    let mut pod = create_test_pod("vm1", "default", "vm");
    pod.status = Some(ready_condition("True"));
    pod.metadata = terminating_meta(pod.metadata);

    assert_eq!(observed_pod_state(&pod), VmState::Stopping);
}

#[test]
fn test_console_endpoint_requires_node_port() {
    let mut svc = Service {
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                port: 6080,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    };
    assert_eq!(console_endpoint("kvm.local", &svc), None);

    if let Some(port) = svc.spec.as_mut().and_then(|s| s.ports.as_mut()).and_then(|p| p.first_mut()) {
        port.node_port = Some(30123);
    }
    assert_eq!(
        console_endpoint("kvm.local", &svc).as_deref(),
        Some("kvm.local:30123")
    );
}

#[test]
fn test_status_needs_update() {
    let status = VirtualMachineStatus {
        state: VmState::Running,
        id: "i-1a2b3c4d".to_string(),
        mac: "06:fe:1a:2b:3c:4d".to_string(),
        vnc_endpoint: None,
    };

    assert!(status_needs_update(None, &status), "Should need update when status is None");
    assert!(!status_needs_update(Some(&status), &status.clone()));

    let moved = VirtualMachineStatus {
        vnc_endpoint: Some("kvm.local:30123".to_string()),
        ..status.clone()
    };
    assert!(status_needs_update(Some(&status), &moved));
}
