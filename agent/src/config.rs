//! Effective-policy resolution.
//!
//! The allow-set is resolved once at startup, priority-first: the agent
//! pod's annotation, then the `pulsaar-config` ConfigMap in the agent's
//! namespace, then the environment, then the default of the filesystem
//! root. The first source that yields a value wins, including an explicit
//! empty list (which denies everything). Cluster lookups that fail are
//! treated as absent, never fatal.

use k8s_openapi::api::core::v1::{ConfigMap, Pod};
use kube::{Api, Client};
use tracing::debug;

pub const ALLOWED_ROOTS_ANNOTATION: &str = "pulsaar.io/allowed-roots";
pub const CONFIG_MAP_NAME: &str = "pulsaar-config";
pub const CONFIG_MAP_KEY: &str = "allowed-roots";

const ALLOWED_ROOTS_ENV: &str = "PULSAAR_ALLOWED_ROOTS";
const NAMESPACE_ENV: &str = "PULSAAR_NAMESPACE";
const POD_NAME_ENV: &str = "PULSAAR_POD_NAME";
const SERVICE_ACCOUNT_NAMESPACE: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

pub async fn resolve_allowed_roots() -> Vec<String> {
    let namespace = self_namespace();

    if let (Some(ns), Some(pod)) = (namespace.as_deref(), non_empty_env(POD_NAME_ENV)) {
        if let Some(roots) = annotation_roots(ns, &pod).await {
            debug!(?roots, "allowed roots from pod annotation");
            return roots;
        }
    }
    if let Some(ns) = namespace.as_deref() {
        if let Some(roots) = config_map_roots(ns).await {
            debug!(?roots, "allowed roots from configmap");
            return roots;
        }
    }
    if let Some(roots) = non_empty_env(ALLOWED_ROOTS_ENV).map(|value| split_roots(&value)) {
        debug!(?roots, "allowed roots from environment");
        return roots;
    }
    vec!["/".to_string()]
}

async fn annotation_roots(namespace: &str, pod_name: &str) -> Option<Vec<String>> {
    let client = Client::try_default().await.ok()?;
    let pod = Api::<Pod>::namespaced(client, namespace)
        .get(pod_name)
        .await
        .ok()?;
    let mut annotations = pod.metadata.annotations?;
    let value = annotations.remove(ALLOWED_ROOTS_ANNOTATION)?;
    Some(split_roots(&value))
}

async fn config_map_roots(namespace: &str) -> Option<Vec<String>> {
    let client = Client::try_default().await.ok()?;
    let cm = Api::<ConfigMap>::namespaced(client, namespace)
        .get(CONFIG_MAP_NAME)
        .await
        .ok()?;
    let mut data = cm.data?;
    let value = data.remove(CONFIG_MAP_KEY)?;
    Some(split_roots(&value))
}

/// Splits a comma-separated root list, trimming whitespace. An empty value
/// is an explicit empty allow-set.
pub fn split_roots(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value
        .split(',')
        .map(|root| root.trim().to_string())
        .collect()
}

fn self_namespace() -> Option<String> {
    if let Some(ns) = non_empty_env(NAMESPACE_ENV) {
        return Some(ns);
    }
    std::fs::read_to_string(SERVICE_ACCOUNT_NAMESPACE)
        .ok()
        .map(|ns| ns.trim().to_string())
        .filter(|ns| !ns.is_empty())
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_trims() {
        assert_eq!(split_roots("/app"), ["/app"]);
        assert_eq!(split_roots("/app, /var/log ,/tmp"), ["/app", "/var/log", "/tmp"]);
    }

    #[test]
    fn empty_value_is_an_explicit_empty_set() {
        assert!(split_roots("").is_empty());
    }
}
