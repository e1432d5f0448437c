use std::collections::HashMap;

use crate::error::{Error, Result};

/// Result the authorization callback navigates back with.
///
/// The callback redirects to the settings surface with either a `success` or
/// an `error` query parameter carrying a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    Connected(String),
    Failed(String),
}

impl AuthorizationOutcome {
    /// Parse a redirect query string (with or without the leading `?`).
    /// `error` wins when both are present; neither yields `None`.
    pub fn from_query(query: &str) -> Option<Self> {
        Self::from_params(&parse_query(query.trim_start_matches('?')))
    }

    /// Like [`from_query`](Self::from_query), but the redirect must echo the
    /// `state` issued when the authorization started. A query without an
    /// outcome is `Ok(None)` whatever its state.
    pub fn from_redirect(query: &str, expected_state: Option<&str>) -> Result<Option<Self>> {
        let params = parse_query(query.trim_start_matches('?'));
        let Some(outcome) = Self::from_params(&params) else {
            return Ok(None);
        };
        verify_state(expected_state, params.get("state").map(String::as_str))?;
        Ok(Some(outcome))
    }

    fn from_params(params: &HashMap<String, String>) -> Option<Self> {
        if let Some(message) = params.get("error") {
            return Some(Self::Failed(message.clone()));
        }
        params
            .get("success")
            .map(|message| Self::Connected(message.clone()))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Connected(m) | Self::Failed(m) => m,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

/// Check the anti-forgery `state` echoed by the provider against the value
/// issued when the authorization started.
pub fn verify_state(expected: Option<&str>, received: Option<&str>) -> Result<()> {
    match (expected, received) {
        (Some(expected), Some(received)) if !expected.is_empty() && expected == received => Ok(()),
        _ => Err(Error::Session(
            "authorization state mismatch, please retry".to_string(),
        )),
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.insert(decode_component(key), decode_component(value));
    }
    params
}

fn decode_component(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
