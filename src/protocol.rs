//! Inbound frames of the progress socket.
//!
//! Every frame is a JSON object tagged by `type`. Known tags decode into
//! [`Frame`]; unknown tags are reported as `Ok(None)` so the caller can skip
//! them, and malformed payloads as `Err` so the caller can log and drop them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, SessionError};

/// Payload of a `progress` frame. Absent fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressFrame {
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub current_frame: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_frames: Option<u64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub execution_providers: Option<String>,
}

/// Frame counters arrive as integers, floats or occasionally negative
/// values. Any number is rounded and clamped at zero; anything else is
/// treated as absent.
fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
        .map(|n| n.round().max(0.0) as u64))
}

/// A recognized server-to-client frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// One line of backend log output.
    Log {
        #[serde(default)]
        message: String,
    },
    /// Job progress snapshot.
    Progress(ProgressFrame),
    /// The job finished and wrote its output.
    Complete {
        #[serde(default)]
        output_path: Option<String>,
    },
    /// Keepalive answer; carries no state.
    Pong,
}

const KNOWN_TAGS: [&str; 4] = ["log", "progress", "complete", "pong"];

/// Decode one text frame.
///
/// Returns `Ok(None)` for a well-formed frame with an unrecognized tag.
pub fn parse_frame(text: &str) -> Result<Option<Frame>> {
    let value: Value = serde_json::from_str(text)?;

    let tag = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| SessionError::InvalidResponse("Frame has no string `type` tag".into()))?;

    if !KNOWN_TAGS.contains(&tag) {
        return Ok(None);
    }

    Ok(Some(serde_json::from_value(value)?))
}
