//! # Job Descriptor
//!
//! Typed form of the queue message payload:
//!
//! ```json
//! { "upload_container": "uploads", "upload_blob": "batch/data.csv", "profile": "A1" }
//! ```
//!
//! Parsing failures are reported as [`JobError::MalformedJob`] so the caller
//! can dead-letter the message instead of waiting for redelivery.

use crate::error::{JobError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct JobPayload {
    upload_container: Option<String>,
    upload_blob: Option<String>,
    profile: Option<String>,
}

/// Immutable description of one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDescriptor {
    upload_container: String,
    upload_blob: String,
    profile: String,
}

impl JobDescriptor {
    /// Build a descriptor, rejecting empty identifiers
    pub fn new(
        upload_container: impl Into<String>,
        upload_blob: impl Into<String>,
        profile: impl Into<String>,
    ) -> Result<Self> {
        let upload_container = require("upload_container", Some(upload_container.into()))?;
        let upload_blob = require("upload_blob", Some(upload_blob.into()))?;
        let profile = require("profile", Some(profile.into()))?;
        Ok(Self {
            upload_container,
            upload_blob,
            profile,
        })
    }

    /// Decode a raw queue payload. An absent, null or blank `profile` falls
    /// back to `default_profile`.
    pub fn parse(payload: &[u8], default_profile: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| JobError::malformed(format!("payload is not valid JSON: {e}")))?;
        if !value.is_object() {
            return Err(JobError::malformed("payload is not a JSON object"));
        }
        let raw: JobPayload = serde_json::from_value(value)
            .map_err(|e| JobError::malformed(format!("payload is not a valid job object: {e}")))?;

        let profile = raw
            .profile
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| default_profile.to_string());

        Self::new(
            require("upload_container", raw.upload_container)?,
            require("upload_blob", raw.upload_blob)?,
            profile,
        )
    }

    pub fn upload_container(&self) -> &str {
        &self.upload_container
    }

    pub fn upload_blob(&self) -> &str {
        &self.upload_blob
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Single-segment file name for staging the input locally
    pub fn local_file_name(&self) -> String {
        let flattened: String = self
            .upload_blob
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        match flattened.as_str() {
            "" | "." | ".." => "input".to_string(),
            _ => flattened,
        }
    }

    pub fn to_payload(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

fn require(field: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(JobError::malformed(format!("{field} is empty"))),
        None => Err(JobError::malformed(format!("{field} is missing"))),
    }
}
