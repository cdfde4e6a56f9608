//! Caller-supplied parameter values and their per-run resolution.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::RunError;
use crate::spec::{ParamSpec, ParamType};

/// A value supplied by the caller: request-body text or uploaded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl ParamValue {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Bytes(b) => b,
        }
    }

    /// Text form used for template substitution; bytes are decoded lossily.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for ParamValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

/// Parameter values of one request, keyed by parameter name (or, for
/// uploaded files, by the uploaded filename).
pub type ParamMap = HashMap<String, ParamValue>;

/// Resolves parameter names to the text substituted into the command line.
///
/// Each name is resolved at most once per run: the first resolution
/// validates required-ness and writes `file` parameters into the job
/// directory, later requests are served from the cache without touching the
/// caller's values or the filesystem.
pub struct ParamResolver<'a> {
    params: &'a BTreeMap<String, ParamSpec>,
    job_dir: &'a Path,
    values: &'a ParamMap,
    cache: HashMap<String, String>,
}

impl<'a> ParamResolver<'a> {
    pub fn new(
        params: &'a BTreeMap<String, ParamSpec>,
        job_dir: &'a Path,
        values: &'a ParamMap,
    ) -> Self {
        Self {
            params,
            job_dir,
            values,
            cache: HashMap::new(),
        }
    }

    /// Resolve `names`, omitting names that are neither declared nor
    /// supplied by the caller.
    pub async fn resolve<S: AsRef<str>>(
        &mut self,
        names: &[S],
    ) -> Result<HashMap<String, String>, RunError> {
        let mut resolved = HashMap::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if let Some(value) = self.resolve_one(name).await? {
                resolved.insert(name.to_string(), value);
            }
        }
        Ok(resolved)
    }

    /// Resolve every declared parameter up front so missing required values
    /// and file writes happen before any command line is built.
    ///
    /// Required-ness is checked for all parameters before the first file is
    /// written.
    pub async fn preload(&mut self) -> Result<(), RunError> {
        let params = self.params;
        if let Some((name, _)) = params
            .iter()
            .find(|(name, spec)| spec.required && !self.values.contains_key(*name))
        {
            return Err(RunError::MissingParam(name.clone()));
        }
        for name in params.keys() {
            self.resolve_one(name).await?;
        }
        Ok(())
    }

    async fn resolve_one(&mut self, name: &str) -> Result<Option<String>, RunError> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(Some(cached.clone()));
        }

        let supplied = self.values.get(name);
        let value = match self.params.get(name) {
            None => match supplied {
                Some(value) => value.to_text(),
                None => return Ok(None),
            },
            Some(spec) => {
                if spec.required && supplied.is_none() {
                    return Err(RunError::MissingParam(name.to_string()));
                }
                match spec.kind {
                    ParamType::Plain => supplied.map(ParamValue::to_text).unwrap_or_default(),
                    ParamType::File => {
                        let filename = spec.target_filename(name);
                        let bytes = supplied.map(ParamValue::as_bytes).unwrap_or_default();
                        self.write_file(filename, bytes).await?;
                        filename.to_string()
                    }
                }
            }
        };

        self.cache.insert(name.to_string(), value.clone());
        Ok(Some(value))
    }

    async fn write_file(&self, filename: &str, bytes: &[u8]) -> Result<(), RunError> {
        let path = self.job_dir.join(filename);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RunError::io(format!("failed to create directory for {filename}"), e))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| RunError::io(format!("failed to write param file {filename}"), e))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
