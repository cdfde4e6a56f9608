//! Declarative command definitions.
//!
//! Definitions are validated while they are deserialized: unknown parameter
//! or return types, paths escaping the job directory, bad glob patterns and
//! duplicate output names are rejected at load time instead of during a run.

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SpecError;

/// Name of the output key that always carries the run's job id.
pub const JOB_ID_KEY: &str = "job_id";

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// How a parameter value is delivered to the command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    /// The value is substituted into the command line as text.
    #[default]
    Plain,
    /// The value is written to a file in the job directory and the
    /// filename is substituted instead.
    File,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::File => "file",
        }
    }
}

/// One named input a command accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ParamSpec {
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "type")]
    pub kind: ParamType,
    /// Target filename for `file` parameters; defaults to the parameter name.
    #[serde(default)]
    pub filename: Option<String>,
}

impl ParamSpec {
    /// Filename a `file` parameter named `param_name` is written to.
    pub fn target_filename<'a>(&'a self, param_name: &'a str) -> &'a str {
        match self.filename.as_deref() {
            Some(f) if !f.is_empty() => f,
            _ => param_name,
        }
    }
}

// ---------------------------------------------------------------------------
// Return entries
// ---------------------------------------------------------------------------

/// Captured output stream of the subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Transport encoding of a payload body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Base64,
    /// Lossily decoded UTF-8 text.
    #[serde(alias = "utf-8", alias = "utf8")]
    Text,
}

/// Metadata attached to every encoded payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayloadFormat {
    pub mimetype: String,
    pub encoding: Encoding,
}

/// One named output a command produces, resolved from its declaration once
/// at load time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawReturnSpec")]
pub enum ReturnSpec {
    /// Bare `stdout` / `stderr`: the decoded stream text, keyed by the
    /// stream name.
    Text(Stream),
    /// Structured `stdout` / `stderr`: the raw stream as an encoded payload.
    Stream {
        name: String,
        stream: Stream,
        format: PayloadFormat,
    },
    /// A single file from the job directory.
    File {
        name: String,
        filename: String,
        format: PayloadFormat,
    },
    /// Every file in the job directory matching a glob pattern.
    FileList {
        name: String,
        glob: String,
        format: PayloadFormat,
    },
}

impl ReturnSpec {
    /// Key this entry populates in the execution result.
    pub fn name(&self) -> &str {
        match self {
            Self::Text(stream) => stream.as_str(),
            Self::Stream { name, .. } | Self::File { name, .. } | Self::FileList { name, .. } => {
                name
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawReturnSpec {
    Bare(Stream),
    Entry(RawReturnEntry),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ReturnKind {
    File,
    Stdout,
    Stderr,
    FileList,
}

#[derive(Deserialize)]
struct RawReturnEntry {
    name: String,
    #[serde(rename = "type")]
    kind: ReturnKind,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    glob: Option<String>,
    #[serde(default)]
    mimetype: Option<String>,
    #[serde(default)]
    encoding: Option<Encoding>,
}

impl TryFrom<RawReturnSpec> for ReturnSpec {
    type Error = SpecError;

    fn try_from(raw: RawReturnSpec) -> Result<Self, Self::Error> {
        let entry = match raw {
            RawReturnSpec::Bare(stream) => return Ok(Self::Text(stream)),
            RawReturnSpec::Entry(entry) => entry,
        };

        let format = PayloadFormat {
            mimetype: entry.mimetype.unwrap_or_default(),
            encoding: entry.encoding.unwrap_or_default(),
        };
        let name = entry.name;

        match entry.kind {
            ReturnKind::Stdout => Ok(Self::Stream {
                name,
                stream: Stream::Stdout,
                format,
            }),
            ReturnKind::Stderr => Ok(Self::Stream {
                name,
                stream: Stream::Stderr,
                format,
            }),
            ReturnKind::File => {
                let filename = entry.filename.filter(|f| !f.is_empty()).ok_or_else(|| {
                    SpecError::MissingReturnField {
                        name: name.clone(),
                        kind: "file",
                        field: "filename",
                    }
                })?;
                ensure_job_relative("return filename", &filename)?;
                Ok(Self::File {
                    name,
                    filename,
                    format,
                })
            }
            ReturnKind::FileList => {
                let glob = entry.glob.filter(|g| !g.is_empty()).ok_or_else(|| {
                    SpecError::MissingReturnField {
                        name: name.clone(),
                        kind: "file_list",
                        field: "glob",
                    }
                })?;
                ensure_job_relative("return glob", &glob)?;
                glob::Pattern::new(&glob).map_err(|e| SpecError::InvalidGlob {
                    pattern: glob.clone(),
                    reason: e.msg.to_string(),
                })?;
                Ok(Self::FileList { name, glob, format })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Command spec
// ---------------------------------------------------------------------------

/// A named, pre-configured command. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCommandSpec")]
pub struct CommandSpec {
    pub name: String,
    pub description: Option<String>,
    /// Base directory for job directories; the runner default when `None`.
    pub cwd: Option<PathBuf>,
    pub params: BTreeMap<String, ParamSpec>,
    /// Argv-shaped command line templates, one per item.
    pub command: Vec<String>,
    pub returns: Vec<ReturnSpec>,
    /// Per-command subprocess deadline, overriding the runner default.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Directory job directories are created under.
    pub fn base_dir<'a>(&'a self, default: &'a Path) -> &'a Path {
        self.cwd.as_deref().unwrap_or(default)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawItem {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl RawItem {
    fn render(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Integer(i) => i.to_string(),
            // `{:?}` keeps the fractional part of whole floats (`1.0`).
            Self::Float(f) => format!("{f:?}"),
            Self::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RawCommandSpec {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    cwd: Option<String>,
    #[serde(default)]
    params: Option<BTreeMap<String, ParamSpec>>,
    command: Vec<Option<RawItem>>,
    #[serde(default, rename = "return")]
    returns: Option<Vec<ReturnSpec>>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

impl TryFrom<RawCommandSpec> for CommandSpec {
    type Error = SpecError;

    fn try_from(raw: RawCommandSpec) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err(SpecError::EmptyName);
        }
        if raw.command.is_empty() {
            return Err(SpecError::EmptyCommand(raw.name));
        }

        let params = raw.params.unwrap_or_default();
        for (name, param) in &params {
            if param.kind == ParamType::File {
                ensure_job_relative("param filename", param.target_filename(name))?;
            }
        }

        let returns = raw.returns.unwrap_or_default();
        let mut seen = HashSet::new();
        for ret in &returns {
            let name = ret.name();
            if name == JOB_ID_KEY {
                return Err(SpecError::ReservedReturnName);
            }
            if !seen.insert(name) {
                return Err(SpecError::DuplicateReturn(name.to_string()));
            }
        }

        let command = raw
            .command
            .into_iter()
            .map(|item| item.map(RawItem::render).unwrap_or_default())
            .collect();

        Ok(Self {
            name: raw.name,
            description: raw.description.filter(|d| !d.is_empty()),
            cwd: raw.cwd.filter(|c| !c.is_empty()).map(PathBuf::from),
            params,
            command,
            returns,
            timeout: raw.timeout_secs.map(Duration::from_secs),
        })
    }
}

/// Reject absolute paths and `..` components so a declared path can only
/// name something inside the job directory.
fn ensure_job_relative(field: &'static str, path: &str) -> Result<(), SpecError> {
    let inside = !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if inside {
        Ok(())
    } else {
        Err(SpecError::UnsafePath {
            field,
            path: path.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
