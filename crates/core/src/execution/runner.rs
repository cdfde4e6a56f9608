//! Entry point for running a registered command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use super::command::build_command_line;
use super::executor;
use super::output::{collect_outputs, ExecutionResult};
use super::params::{ParamMap, ParamResolver};
use super::session::JobSession;
use crate::error::RunError;
use crate::registry::CommandRegistry;
use crate::spec::CommandSpec;

/// Process-wide defaults applied to commands that do not set their own.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Base directory for job directories of commands without a `cwd`.
    pub default_workdir: PathBuf,
    /// Subprocess deadline for commands without a `timeout_secs`.
    pub default_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_workdir: std::env::temp_dir().join("servecmd"),
            default_timeout: None,
        }
    }
}

/// Runs commands from a shared, read-only registry.
///
/// Each call to [`run`](Self::run) is independent: it owns its job
/// directory and parameter cache, so runs may proceed concurrently.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    registry: Arc<CommandRegistry>,
    config: RunnerConfig,
}

impl CommandRunner {
    pub fn new(registry: Arc<CommandRegistry>, config: RunnerConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Run command `name` with the caller's parameter values.
    ///
    /// Unknown commands fail before any job directory exists. Once the
    /// directory is created it is removed again on every exit path; a
    /// cancelled run leaves the removal to the session's `Drop`.
    pub async fn run(&self, name: &str, params: ParamMap) -> Result<ExecutionResult, RunError> {
        let spec = self
            .registry
            .lookup(name)
            .ok_or_else(|| RunError::CommandNotFound(name.to_string()))?;

        let session = JobSession::open(spec.base_dir(&self.config.default_workdir)).await?;
        let span = tracing::info_span!("run", command = %spec.name, job_id = %session.job_id());

        let result = self
            .run_in_session(&spec, &session, &params)
            .instrument(span)
            .await;
        session.close().await;
        result
    }

    async fn run_in_session(
        &self,
        spec: &CommandSpec,
        session: &JobSession,
        params: &ParamMap,
    ) -> Result<ExecutionResult, RunError> {
        let mut resolver = ParamResolver::new(&spec.params, session.path(), params);
        resolver.preload().await?;

        let cmd = build_command_line(&spec.command, session, &mut resolver).await?;
        tracing::info!(job_id = %session.job_id(), cmd = %cmd, "Command built");

        let timeout = spec.timeout.or(self.config.default_timeout);
        let output = executor::execute(session, &cmd, timeout).await?;

        let outputs = collect_outputs(&spec.returns, session.path(), &output).await?;
        Ok(ExecutionResult {
            job_id: session.job_id().to_string(),
            outputs,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::execution::output::OutputValue;

    fn runner(base: &std::path::Path, yaml: &str) -> CommandRunner {
        let spec: CommandSpec = serde_yaml::from_str(yaml).expect("valid spec");
        let registry = CommandRegistry::from_specs([spec]).expect("registry");
        CommandRunner::new(
            Arc::new(registry),
            RunnerConfig {
                default_workdir: base.to_path_buf(),
                default_timeout: None,
            },
        )
    }

    fn is_empty_dir(path: &std::path::Path) -> bool {
        std::fs::read_dir(path).expect("read dir").next().is_none()
    }

    #[tokio::test]
    async fn unknown_command_creates_no_job_directory() {
        let base = tempfile::tempdir().expect("create temp dir");
        let runner = runner(base.path(), "name: echo\ncommand: [echo]\n");

        let result = runner.run("nope", ParamMap::new()).await;
        assert_matches!(result, Err(RunError::CommandNotFound(name)) if name == "nope");
        assert!(is_empty_dir(base.path()));
    }

    #[tokio::test]
    async fn job_directory_is_removed_after_success_and_failure() {
        let base = tempfile::tempdir().expect("create temp dir");
        let runner = runner(
            base.path(),
            "name: t\ncommand: [touch, out.txt]\nparams:\n  x: {required: true}\n",
        );

        runner
            .run("t", ParamMap::from([("x".to_string(), "1".into())]))
            .await
            .expect("run");
        assert!(is_empty_dir(base.path()));

        let result = runner.run("t", ParamMap::new()).await;
        assert_matches!(result, Err(RunError::MissingParam(_)));
        assert!(is_empty_dir(base.path()));
    }

    #[tokio::test]
    async fn command_cwd_overrides_default_workdir() {
        let base = tempfile::tempdir().expect("create temp dir");
        let own = tempfile::tempdir().expect("create temp dir");
        let yaml = format!(
            "name: pwd\ncwd: {}\ncommand: [pwd]\nreturn: [stdout]\n",
            own.path().display()
        );
        let runner = runner(base.path(), &yaml);

        let result = runner.run("pwd", ParamMap::new()).await.expect("run");
        let Some(OutputValue::Text(pwd)) = result.get("stdout") else {
            panic!("expected stdout");
        };
        assert!(pwd.trim_end().ends_with(&result.job_id), "{pwd}");
    }

    #[tokio::test]
    async fn spec_timeout_fails_the_run_and_cleans_up() {
        let base = tempfile::tempdir().expect("create temp dir");
        let runner = runner(base.path(), "name: slow\ntimeout_secs: 1\ncommand: [sleep, 30]\n");

        let result = runner.run("slow", ParamMap::new()).await;
        assert_matches!(result, Err(RunError::Timeout { .. }));
        assert!(is_empty_dir(base.path()));
    }
}
