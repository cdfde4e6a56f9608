//! Mapping of declared return entries onto captured output.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use indexmap::IndexMap;
use serde::Serialize;

use super::executor::ProcessOutput;
use crate::error::RunError;
use crate::spec::{Encoding, PayloadFormat, ReturnSpec, Stream};

/// An encoded output body with its transport metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payload {
    pub body: String,
    /// Path relative to the job directory; set for `file_list` entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub mimetype: String,
    pub encoding: Encoding,
}

impl Payload {
    pub fn encode(bytes: &[u8], format: &PayloadFormat, filename: Option<String>) -> Self {
        let body = match format.encoding {
            Encoding::Base64 => STANDARD.encode(bytes),
            Encoding::Text => String::from_utf8_lossy(bytes).into_owned(),
        };
        Self {
            body,
            filename,
            mimetype: format.mimetype.clone(),
            encoding: format.encoding,
        }
    }

    /// Recover the raw bytes of the body.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        match self.encoding {
            Encoding::Base64 => STANDARD.decode(&self.body),
            Encoding::Text => Ok(self.body.clone().into_bytes()),
        }
    }
}

/// Value of one return entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutputValue {
    Text(String),
    Payload(Payload),
    PayloadList(Vec<Payload>),
}

/// Outcome of a successful run: the job id plus one value per return
/// entry, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub job_id: String,
    #[serde(flatten)]
    pub outputs: IndexMap<String, OutputValue>,
}

impl ExecutionResult {
    pub fn get(&self, key: &str) -> Option<&OutputValue> {
        self.outputs.get(key)
    }
}

/// Build the value of every entry in `returns`.
pub async fn collect_outputs(
    returns: &[ReturnSpec],
    job_dir: &Path,
    output: &ProcessOutput,
) -> Result<IndexMap<String, OutputValue>, RunError> {
    let mut outputs = IndexMap::with_capacity(returns.len());
    for ret in returns {
        let value = match ret {
            ReturnSpec::Text(stream) => {
                OutputValue::Text(String::from_utf8_lossy(stream_bytes(output, *stream)).into_owned())
            }
            ReturnSpec::Stream { stream, format, .. } => {
                OutputValue::Payload(Payload::encode(stream_bytes(output, *stream), format, None))
            }
            ReturnSpec::File {
                filename, format, ..
            } => {
                let bytes = tokio::fs::read(job_dir.join(filename))
                    .await
                    .map_err(|e| RunError::io(format!("failed to read return file {filename}"), e))?;
                OutputValue::Payload(Payload::encode(&bytes, format, None))
            }
            ReturnSpec::FileList { glob, format, .. } => {
                OutputValue::PayloadList(collect_file_list(job_dir, glob, format).await?)
            }
        };
        outputs.insert(ret.name().to_string(), value);
    }
    Ok(outputs)
}

fn stream_bytes(output: &ProcessOutput, stream: Stream) -> &[u8] {
    match stream {
        Stream::Stdout => &output.stdout,
        Stream::Stderr => &output.stderr,
    }
}

/// Regular files under `root` matching `pattern`, in glob order.
///
/// Directory walking is blocking, so it runs on the blocking thread pool.
async fn glob_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>, RunError> {
    let full_pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&root.to_string_lossy()),
        pattern
    );
    let pattern = pattern.to_string();

    tokio::task::spawn_blocking(move || -> Result<Vec<PathBuf>, RunError> {
        let options = glob::MatchOptions {
            require_literal_leading_dot: true,
            ..glob::MatchOptions::new()
        };
        let paths = glob::glob_with(&full_pattern, options).map_err(|e| {
            RunError::io(
                format!("invalid glob pattern {pattern}"),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e.msg),
            )
        })?;

        let mut files = Vec::new();
        for entry in paths {
            let path = entry
                .map_err(|e| RunError::io(format!("failed to match {pattern}"), e.into_error()))?;
            if path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    })
    .await
    .map_err(|e| RunError::io("glob task failed", std::io::Error::other(e)))?
}

/// Read and encode every regular file under `job_dir` matching `pattern`,
/// in glob match order.
///
/// Hidden files only match when the pattern spells the leading dot, and
/// matches resolving outside the job directory through symlinks are skipped.
async fn collect_file_list(
    job_dir: &Path,
    pattern: &str,
    format: &PayloadFormat,
) -> Result<Vec<Payload>, RunError> {
    let root = tokio::fs::canonicalize(job_dir)
        .await
        .map_err(|e| RunError::io("failed to resolve job directory", e))?;

    let matches = glob_files(&root, pattern).await?;

    let mut payloads = Vec::new();
    for path in matches {
        let resolved = tokio::fs::canonicalize(&path)
            .await
            .map_err(|e| RunError::io(format!("failed to resolve {}", path.display()), e))?;
        if !resolved.starts_with(&root) {
            tracing::warn!(path = %path.display(), "Skipping match outside the job directory");
            continue;
        }

        let relative = path
            .strip_prefix(&root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        let bytes = tokio::fs::read(&resolved)
            .await
            .map_err(|e| RunError::io(format!("failed to read return file {relative}"), e))?;
        payloads.push(Payload::encode(&bytes, format, Some(relative)));
    }
    Ok(payloads)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
