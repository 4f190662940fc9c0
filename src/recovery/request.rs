//! Recovery request payload
//!
//! ```json
//! {"topic_names_pattern": "^orders-", "retention_bytes": 1048576, "retention_ms": 3600000}
//! ```
//!
//! Every field is optional and so is the body itself.

use std::fmt;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("{0}")]
    BadRequest(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRequest {
    #[serde(default)]
    topic_names_pattern: Option<String>,
    #[serde(default)]
    retention_bytes: Option<u64>,
    #[serde(default, alias = "retention_time_ms")]
    retention_ms: Option<u64>,
}

/// Parsed recovery request
#[derive(Debug, Clone, Default)]
pub struct RecoveryRequest {
    topic_names_pattern: Option<Regex>,
    retention_bytes: Option<u64>,
    retention_ms: Option<Duration>,
}

impl RecoveryRequest {
    /// Parse a request body. An empty body yields the default request.
    pub fn parse(body: &[u8]) -> Result<Self, RequestError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let raw: RawRequest =
            serde_json::from_slice(body).map_err(|e| RequestError::BadRequest(e.to_string()))?;

        let topic_names_pattern = raw
            .topic_names_pattern
            .map(|p| {
                Regex::new(&p).map_err(|e| {
                    RequestError::BadRequest(format!("invalid topic_names_pattern {p:?}: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            topic_names_pattern,
            retention_bytes: raw.retention_bytes,
            retention_ms: raw.retention_ms.map(Duration::from_millis),
        })
    }

    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.topic_names_pattern = Some(pattern);
        self
    }

    pub fn with_retention_bytes(mut self, bytes: u64) -> Self {
        self.retention_bytes = Some(bytes);
        self
    }

    pub fn with_retention_ms(mut self, ms: Duration) -> Self {
        self.retention_ms = Some(ms);
        self
    }

    pub fn topic_names_pattern(&self) -> Option<&Regex> {
        self.topic_names_pattern.as_ref()
    }

    pub fn retention_bytes(&self) -> Option<u64> {
        self.retention_bytes
    }

    pub fn retention_ms(&self) -> Option<Duration> {
        self.retention_ms
    }
}

impl fmt::Display for RecoveryRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{topic_names_pattern: ")?;
        match &self.topic_names_pattern {
            Some(p) => write!(f, "{}", p.as_str())?,
            None => write!(f, "none")?,
        }
        write!(f, ", retention_bytes: ")?;
        match self.retention_bytes {
            Some(b) => write!(f, "{b}")?,
            None => write!(f, "none")?,
        }
        write!(f, ", retention_ms: ")?;
        match self.retention_ms {
            Some(d) => write!(f, "{}", d.as_millis())?,
            None => write!(f, "none")?,
        }
        write!(f, "}}")
    }
}
