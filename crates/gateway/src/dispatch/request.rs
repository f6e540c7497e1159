//! Upstream request construction: path substitution and query parameters.

use secrecy::SecretString;
use serde_json::{Map, Value};

use super::DispatchError;
use super::arguments::render_value;
use crate::registry::Operation;

/// A fully resolved upstream call.
///
/// The market-data key travels separately from `query` and is appended as
/// `apikey` only when the URL is built, so it never shows up in logs.
#[derive(Clone)]
pub struct UpstreamRequest {
    /// Path relative to the upstream base URL, placeholders substituted.
    pub path: String,
    /// Query parameters in declaration order.
    pub query: Vec<(String, String)>,
    /// Market-data API key.
    pub api_key: SecretString,
}

impl std::fmt::Debug for UpstreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamRequest")
            .field("path", &self.path)
            .field("query", &self.query)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Build the upstream request for `operation` from coerced arguments.
///
/// Path placeholders consume their arguments; everything left becomes a
/// query parameter. Path values are percent-encoded.
///
/// # Errors
///
/// Returns [`DispatchError::MissingPathParameter`] when a placeholder has no
/// value or renders to a blank segment.
pub fn build_request(
    operation: &Operation,
    mut arguments: Map<String, Value>,
    api_key: SecretString,
) -> Result<UpstreamRequest, DispatchError> {
    let mut segments = Vec::new();
    for segment in operation.upstream_path.split('/') {
        let placeholder = segment
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'));
        match placeholder {
            Some(name) => {
                let rendered = arguments
                    .remove(name)
                    .filter(|v| !v.is_null())
                    .map(|v| render_value(&v))
                    .filter(|v| !v.trim().is_empty())
                    .ok_or_else(|| DispatchError::MissingPathParameter {
                        operation: operation.id.to_string(),
                        parameter: name.to_string(),
                    })?;
                segments.push(urlencoding::encode(&rendered).into_owned());
            }
            None => segments.push(segment.to_string()),
        }
    }

    let query = operation
        .params
        .iter()
        .filter_map(|spec| {
            arguments
                .remove(spec.name)
                .map(|value| (spec.name.to_string(), render_value(&value)))
        })
        .collect();

    Ok(UpstreamRequest {
        path: segments.join("/"),
        query,
        api_key,
    })
}
