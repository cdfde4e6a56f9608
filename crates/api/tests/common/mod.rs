#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use servecmd_api::config::{LogFormat, ServerConfig};
use servecmd_api::router::build_app_router;
use servecmd_api::state::AppState;
use servecmd_core::execution::runner::CommandRunner;
use servecmd_core::registry::CommandRegistry;
use servecmd_core::spec::CommandSpec;
use tempfile::TempDir;
use tower::ServiceExt;

pub const ECHO: &str = r#"
name: echo
description: Print a greeting
command: [echo, "$greeting"]
params:
  greeting: {required: true}
return: [stdout]
"#;

pub const SHOW: &str = r#"
name: show
description: Print an uploaded file
command: [cat, "$doc"]
params:
  doc: {required: true, type: file, filename: input.txt}
  label: {}
return:
  - stdout
  - {name: original, type: file, filename: input.txt, mimetype: text/plain}
"#;

/// Build a test `ServerConfig` rooted at `workdir`.
pub fn test_config(workdir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cmd_config_dir: workdir.join("commands"),
        default_workdir: workdir.to_path_buf(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        command_timeout_secs: Some(10),
        max_body_bytes: 1024 * 1024,
        log_format: LogFormat::Text,
    }
}

/// Build the full application router over the fixture commands.
///
/// The returned [`TempDir`] holds the job directories and must outlive the
/// router.
pub fn build_test_app() -> (Router, TempDir) {
    let workdir = tempfile::tempdir().expect("create temp dir");
    let config = test_config(workdir.path());

    let specs = [ECHO, SHOW]
        .into_iter()
        .map(|yaml| serde_yaml::from_str::<CommandSpec>(yaml).expect("valid spec"));
    let registry = CommandRegistry::from_specs(specs).expect("registry");
    let runner = CommandRunner::new(Arc::new(registry), config.runner_config());

    let state = AppState {
        runner: Arc::new(runner),
    };

    (build_app_router(state, &config), workdir)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Entries left behind in the job base directory.
pub fn job_dirs(workdir: &std::path::Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(workdir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}
