//! Decoding of command request bodies into a [`ParamMap`].
//!
//! - `application/json`: the body object maps parameter names to values.
//! - `multipart/form-data`: a part typed `application/json` carries the
//!   parameter object; every other part is an uploaded file keyed by its
//!   filename (or field name), valued by its raw bytes. Files win over JSON
//!   values of the same name.
//! - anything else: no parameters.

use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use serde_json::{Map, Value};
use servecmd_core::execution::params::{ParamMap, ParamValue};

use crate::error::AppError;

const JSON_CONTENT_TYPE: &str = "application/json";
const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";

/// Extractor yielding the parameter values of a command request.
#[derive(Debug, Default)]
pub struct CommandParams(pub ParamMap);

impl<S> FromRequest<S> for CommandParams
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with(JSON_CONTENT_TYPE) {
            let body = Bytes::from_request(req, state)
                .await
                .map_err(|e| body_error(e.status(), e.body_text()))?;
            let mut params = ParamMap::new();
            if !body.is_empty() {
                merge_json(&mut params, parse_object(&body)?);
            }
            Ok(Self(params))
        } else if content_type.starts_with(MULTIPART_CONTENT_TYPE) {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| body_error(e.status(), e.body_text()))?;
            read_multipart(multipart).await.map(Self)
        } else {
            Ok(Self::default())
        }
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<ParamMap, AppError> {
    let mut json_fields: Option<Map<String, Value>> = None;
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| body_error(e.status(), e.body_text()))?
    {
        let is_json = field
            .content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().starts_with(JSON_CONTENT_TYPE));
        let key = field
            .file_name()
            .or_else(|| field.name())
            .map(str::to_string);

        let data = field
            .bytes()
            .await
            .map_err(|e| body_error(e.status(), e.body_text()))?;

        if is_json {
            json_fields = Some(parse_object(&data)?);
        } else if let Some(key) = key {
            files.push((key, data.to_vec()));
        } else {
            tracing::debug!(size = data.len(), "Ignoring unnamed multipart field");
        }
    }

    let mut params = ParamMap::new();
    if let Some(fields) = json_fields {
        merge_json(&mut params, fields);
    }
    for (key, bytes) in files {
        params.insert(key, ParamValue::Bytes(bytes));
    }
    Ok(params)
}

/// Body read failures keep 413 for oversized bodies; everything else is 400.
fn body_error(status: StatusCode, message: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(message)
    } else {
        AppError::BadRequest(message)
    }
}

fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>, AppError> {
    match serde_json::from_slice(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::BadRequest(
            "Request parameters must be a JSON object".to_string(),
        )),
        Err(e) => Err(AppError::BadRequest(format!("Invalid JSON body: {e}"))),
    }
}

/// Insert JSON fields as text values; `null` counts as not supplied.
fn merge_json(params: &mut ParamMap, fields: Map<String, Value>) {
    for (key, value) in fields {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s,
            other => other.to_string(),
        };
        params.insert(key, ParamValue::Text(text));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
