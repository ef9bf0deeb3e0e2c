//! On-demand agent attachment.
//!
//! A workload that lacks the agent gets one attached as an ephemeral
//! container through the pod's `ephemeralcontainers` subresource, then the
//! pod is polled until the container reports running. Re-running against a
//! workload that already carries the agent is a fast no-op.

use anyhow::{bail, Context, Result};
use k8s_openapi::api::core::v1::{ContainerPort, EphemeralContainer, Pod};
use kube::api::PostParams;
use kube::{Api, Client};
use std::time::Duration;
use tracing::{debug, info};

pub const AGENT_CONTAINER_NAME: &str = "pulsaar-agent";
pub const AGENT_IMAGE_ENV: &str = "PULSAAR_AGENT_IMAGE";
pub const DEFAULT_AGENT_IMAGE: &str = "pulsaar/agent:latest";

const READY_ATTEMPTS: u32 = 30;
const READY_INTERVAL: Duration = Duration::from_secs(1);

pub async fn ensure_agent(
    client: &Client,
    namespace: &str,
    pod_name: &str,
    image: &str,
) -> Result<()> {
    let api = Api::<Pod>::namespaced(client.clone(), namespace);
    let mut pod = api
        .get(pod_name)
        .await
        .with_context(|| format!("failed to fetch pod {namespace}/{pod_name}"))?;
    if has_agent(&pod) {
        debug!(%namespace, pod = %pod_name, "agent already attached");
        return Ok(());
    }

    pod.spec
        .get_or_insert_with(Default::default)
        .ephemeral_containers
        .get_or_insert_with(Vec::new)
        .push(agent_container(image));
    api.replace_subresource(
        pod_name,
        "ephemeralcontainers",
        &PostParams::default(),
        serde_json::to_vec(&pod)?,
    )
    .await
    .with_context(|| {
        format!(
            "failed to add the agent container to pod {namespace}/{pod_name}; \
             the cluster must support ephemeral containers and the caller \
             must be allowed to update them"
        )
    })?;
    info!(%namespace, pod = %pod_name, %image, "agent container attached");

    await_running(&api, namespace, pod_name).await
}

/// True when any container, regular or ephemeral, already carries the
/// agent's name.
pub fn has_agent(pod: &Pod) -> bool {
    let Some(spec) = &pod.spec else {
        return false;
    };
    spec.containers
        .iter()
        .any(|c| c.name == AGENT_CONTAINER_NAME)
        || spec
            .ephemeral_containers
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|c| c.name == AGENT_CONTAINER_NAME)
}

pub fn is_agent_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.ephemeral_container_statuses.as_ref())
        .map(|statuses| {
            statuses.iter().any(|s| {
                s.name == AGENT_CONTAINER_NAME
                    && s.state
                        .as_ref()
                        .map(|state| state.running.is_some())
                        .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

fn agent_container(image: &str) -> EphemeralContainer {
    EphemeralContainer {
        name: AGENT_CONTAINER_NAME.to_string(),
        image: Some(image.to_string()),
        ports: Some(vec![ContainerPort {
            container_port: i32::from(crate::AGENT_PORT),
            name: Some("grpc".to_string()),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

async fn await_running(api: &Api<Pod>, namespace: &str, pod_name: &str) -> Result<()> {
    for _ in 0..READY_ATTEMPTS {
        tokio::time::sleep(READY_INTERVAL).await;
        let pod = api
            .get(pod_name)
            .await
            .with_context(|| format!("failed to poll pod {namespace}/{pod_name}"))?;
        if is_agent_running(&pod) {
            return Ok(());
        }
    }
    bail!("timed out waiting for the agent container in pod {namespace}/{pod_name} to start")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        Container, ContainerState, ContainerStateRunning, ContainerStatus, PodSpec, PodStatus,
    };

    fn pod_with_containers(names: &[&str], ephemeral: &[&str]) -> Pod {
        Pod {
            spec: Some(PodSpec {
                containers: names
                    .iter()
                    .map(|name| Container {
                        name: name.to_string(),
                        ..Default::default()
                    })
                    .collect(),
                ephemeral_containers: Some(
                    ephemeral
                        .iter()
                        .map(|name| EphemeralContainer {
                            name: name.to_string(),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn attach_is_a_noop_when_the_agent_is_present() {
        assert!(has_agent(&pod_with_containers(&["app", AGENT_CONTAINER_NAME], &[])));
        assert!(has_agent(&pod_with_containers(&["app"], &[AGENT_CONTAINER_NAME])));
        assert!(!has_agent(&pod_with_containers(&["app"], &["debugger"])));
        assert!(!has_agent(&Pod::default()));
    }

    #[test]
    fn agent_container_shape() {
        let container = agent_container("pulsaar/agent:v1");
        assert_eq!(container.name, AGENT_CONTAINER_NAME);
        assert_eq!(container.image.as_deref(), Some("pulsaar/agent:v1"));
        let ports = container.ports.expect("ports");
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].container_port, 50051);
        assert_eq!(ports[0].name.as_deref(), Some("grpc"));
    }

    #[test]
    fn running_state_is_detected_from_ephemeral_statuses() {
        let mut pod = pod_with_containers(&["app"], &[AGENT_CONTAINER_NAME]);
        assert!(!is_agent_running(&pod));

        pod.status = Some(PodStatus {
            ephemeral_container_statuses: Some(vec![ContainerStatus {
                name: AGENT_CONTAINER_NAME.to_string(),
                state: Some(ContainerState {
                    running: Some(ContainerStateRunning::default()),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert!(is_agent_running(&pod));
    }
}
