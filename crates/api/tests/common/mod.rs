#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use hooktail_api::config::{LogFormat, Settings};
use hooktail_api::router::build_app_router;
use hooktail_api::state::AppState;
use hooktail_core::target::DeploymentTarget;
use hooktail_pipeline::testing::RecordingRunner;
use hooktail_pipeline::{DeploymentLauncher, DeploymentPipeline, LaunchMode};

pub const SITE_REPO: &str = "git@github.com:acme/site.git";

/// Build test `Settings` around `targets` with safe defaults.
pub fn test_settings(targets: Vec<DeploymentTarget>) -> Settings {
    Settings {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 8080,
        request_timeout_secs: 30,
        command_timeout: None,
        log_file: None,
        log_format: LogFormat::Text,
        tls: None,
        targets,
    }
}

/// The full application router plus the recording runner behind it.
///
/// Deployments run inline, so every command a request triggers has been
/// recorded by the time the response arrives.
pub struct TestApp {
    pub app: Router,
    pub runner: Arc<RecordingRunner>,
}

pub fn build_test_app(targets: Vec<DeploymentTarget>) -> TestApp {
    build_test_app_with_runner(targets, RecordingRunner::new())
}

pub fn build_test_app_with_runner(targets: Vec<DeploymentTarget>, runner: RecordingRunner) -> TestApp {
    let runner = Arc::new(runner);
    let pipeline = Arc::new(DeploymentPipeline::new(runner.clone()));
    let launcher = Arc::new(DeploymentLauncher::new(pipeline, LaunchMode::Inline));
    let state = AppState::new(test_settings(targets), launcher);
    TestApp {
        app: build_app_router(state),
        runner,
    }
}

pub fn current_user() -> String {
    nix::unistd::User::from_uid(nix::unistd::getuid())
        .expect("passwd lookup")
        .expect("current user has a passwd entry")
        .name
}

/// A temp dir that looks like a git working copy.
pub fn working_copy() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::create_dir(dir.path().join(".git")).expect("create .git");
    dir
}

/// A deployable target for `repository` at `path`, run as the current user.
pub fn target(repository: &str, path: &Path, secret: Option<&str>) -> DeploymentTarget {
    DeploymentTarget {
        secret: secret.map(str::to_string),
        user: current_user(),
        repository: repository.to_string(),
        branch: "main".to_string(),
        path: path.to_str().expect("utf-8 path").to_string(),
        ..Default::default()
    }
}

/// A minimal GitHub push payload for `ssh_url`.
pub fn push_payload(ssh_url: &str) -> String {
    serde_json::json!({
        "ref": "refs/heads/main",
        "before": "0000000000000000000000000000000000000000",
        "after": "6113728f27ae82c7b1a177c8d03f9e96e0adf246",
        "repository": {
            "name": "site",
            "full_name": "acme/site",
            "ssh_url": ssh_url,
            "clone_url": "https://github.com/acme/site.git"
        },
        "pusher": { "name": "octocat", "email": "octocat@github.com" }
    })
    .to_string()
}

/// POST `body` to `/` with the given content type and optional signature.
pub async fn post_webhook(
    app: Router,
    content_type: &str,
    signature: Option<&str>,
    body: impl Into<Body>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", content_type);
    if let Some(signature) = signature {
        builder = builder.header("x-hub-signature", signature);
    }
    let request = builder.body(body.into()).expect("valid request");
    app.oneshot(request).await.expect("infallible service")
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    app.oneshot(request).await.expect("infallible service")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("JSON body")
}
