//! The cluster identity gate.
//!
//! Before anything touches the target workload, the caller's bearer token
//! is resolved to a user through a TokenReview and that user's access to
//! the pod is checked with a SubjectAccessReview. Every path fails closed:
//! a missing token, an unauthenticated review, or a denied access review
//! aborts the invocation.

use anyhow::{bail, Context, Result};
use k8s_openapi::api::authentication::v1::{TokenReview, TokenReviewSpec};
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
};
use kube::api::PostParams;
use kube::{Api, Client};
use secrecy::ExposeSecret;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct CallerIdentity {
    pub username: String,
    pub groups: Vec<String>,
}

pub async fn authorize(
    client: &Client,
    config: &kube::Config,
    namespace: &str,
    pod: &str,
) -> Result<CallerIdentity> {
    let token = bearer_token(config)?;

    let review = Api::<TokenReview>::all(client.clone())
        .create(
            &PostParams::default(),
            &TokenReview {
                spec: TokenReviewSpec {
                    token: Some(token),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await
        .context("failed to validate the authentication token against the cluster")?;
    let identity = authenticated_user(&review)?;
    debug!(user = %identity.username, "token review passed");

    let review = Api::<SubjectAccessReview>::all(client.clone())
        .create(
            &PostParams::default(),
            &SubjectAccessReview {
                spec: SubjectAccessReviewSpec {
                    resource_attributes: Some(ResourceAttributes {
                        namespace: Some(namespace.to_string()),
                        verb: Some("get".to_string()),
                        resource: Some("pods".to_string()),
                        name: Some(pod.to_string()),
                        ..Default::default()
                    }),
                    user: Some(identity.username.clone()),
                    groups: Some(identity.groups.clone()),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await
        .context("failed to check RBAC permissions for the target pod")?;
    ensure_allowed(&review, namespace, pod)?;
    debug!(user = %identity.username, %namespace, %pod, "access review passed");
    Ok(identity)
}

/// Pulls the raw bearer token out of the client configuration. RBAC
/// enforcement needs the token itself, so client-certificate credentials
/// are rejected outright.
fn bearer_token(config: &kube::Config) -> Result<String> {
    if let Some(token) = &config.auth_info.token {
        return Ok(token.expose_secret().clone());
    }
    if let Some(file) = &config.auth_info.token_file {
        return std::fs::read_to_string(file)
            .map(|token| token.trim().to_string())
            .with_context(|| format!("failed to read token file {file}"));
    }
    bail!(
        "RBAC enforcement requires token-based authentication; \
         client-certificate credentials cannot be reviewed"
    )
}

fn authenticated_user(review: &TokenReview) -> Result<CallerIdentity> {
    let status = review.status.as_ref();
    if !status.and_then(|s| s.authenticated).unwrap_or(false) {
        bail!("token authentication failed; the token is invalid or expired");
    }
    let user = status.and_then(|s| s.user.as_ref());
    Ok(CallerIdentity {
        username: user.and_then(|u| u.username.clone()).unwrap_or_default(),
        groups: user.and_then(|u| u.groups.clone()).unwrap_or_default(),
    })
}

fn ensure_allowed(review: &SubjectAccessReview, namespace: &str, pod: &str) -> Result<()> {
    if review.status.as_ref().map(|s| s.allowed).unwrap_or(false) {
        Ok(())
    } else {
        bail!(
            "access denied to pod {namespace}/{pod}: \
             the caller lacks 'get' on pods in namespace {namespace}"
        )
    }
}
