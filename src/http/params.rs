//! Inbound parameter extraction.
//!
//! Turns the flat query string the client runtime sends into the object
//! identifier and a [`RequestCandidate`]. Numbered header pairs
//! (`header0k`/`header0v`, `header1k`/`header1v`, ...) become an ordered
//! list here, so the relay core never sees the numbering.

use std::collections::HashMap;

use thiserror::Error;

use crate::relay::RequestCandidate;
use crate::security::ClientIdentity;

/// Problems that leave no object to report them to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("missing required parameter \"object\"")]
    MissingObject,

    #[error("parameter \"object\" is not a valid object reference: {0:?}")]
    InvalidObject(String),
}

/// Parsed inbound call.
#[derive(Debug, Clone)]
pub struct RelayParams {
    /// Client-side expression the emitted statements address.
    pub object: String,
    pub candidate: RequestCandidate,
}

impl RelayParams {
    /// Parse a raw (still percent-encoded) query string.
    ///
    /// Values are decoded as UTF-8. When a key repeats, the first value wins.
    pub fn from_query(query: &str) -> Result<Self, ParamsError> {
        let mut params: HashMap<String, String> = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }

        let object = params.remove("object").ok_or(ParamsError::MissingObject)?;
        if !is_object_reference(&object) {
            return Err(ParamsError::InvalidObject(object));
        }

        let candidate = RequestCandidate {
            url: params.remove("url"),
            method: params.remove("method").map(|m| m.to_ascii_uppercase()),
            body: params.remove("data"),
            content_type: params.remove("dataType"),
            headers: numbered_headers(&mut params),
            client: ClientIdentity::default(),
        };

        Ok(Self { object, candidate })
    }

    pub fn with_client(mut self, client: ClientIdentity) -> Self {
        self.candidate.client = client;
        self
    }
}

/// Collect `header<N>k`/`header<N>v` pairs from N = 0 upwards.
///
/// Collection stops at the first N where either half is missing, so a gap
/// drops every later pair. The client runtime numbers its headers without
/// gaps, and existing clients rely on exactly this behaviour.
fn numbered_headers(params: &mut HashMap<String, String>) -> Vec<(String, String)> {
    let mut headers = Vec::new();
    for n in 0.. {
        let (Some(name), Some(value)) = (
            params.remove(&format!("header{n}k")),
            params.remove(&format!("header{n}v")),
        ) else {
            break;
        };
        headers.push((name, value));
    }
    headers
}

/// Identifiers, dots and bracketed indices only: `a.b[3]`, `$x`, `_y.z`.
fn is_object_reference(object: &str) -> bool {
    !object.is_empty()
        && object
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']'))
}
