#![forbid(unsafe_code)]

//! Wire protocol for messages posted by the sandbox.
//!
//! The only message the host understands is:
//!
//! ```json
//! {"type":"entitySelected","entityId":"<string>"}
//! ```
//!
//! optionally extended with `"documentVersion": <u64>`. The version field is
//! advisory: a missing or non-integer value decodes as `None` rather than
//! failing, so pages built for the base protocol stay compatible.

use serde::Deserialize;
use staymap_core::EntityId;

/// `type` tag of a selection message.
pub const ENTITY_SELECTED: &str = "entitySelected";

/// Errors from decoding a sandbox message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Not JSON, or not a JSON object.
    #[error("malformed message: {0}")]
    Json(String),
    /// `type` absent or not a string.
    #[error("missing message type")]
    MissingType,
    /// `type` present but not understood.
    #[error("unknown message type: {0}")]
    UnknownType(String),
    /// Required field absent, empty, or of the wrong JSON type.
    #[error("missing or invalid field: {0}")]
    MissingField(&'static str),
}

/// A decoded sandbox message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxMessage {
    EntitySelected {
        entity_id: EntityId,
        document_version: Option<u64>,
    },
}

impl SandboxMessage {
    /// Encode in the same shape the sandbox page posts.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        match self {
            Self::EntitySelected {
                entity_id,
                document_version,
            } => {
                let mut value = serde_json::json!({
                    "type": ENTITY_SELECTED,
                    "entityId": entity_id.as_str(),
                });
                if let Some(version) = document_version {
                    value["documentVersion"] = serde_json::json!(version);
                }
                value.to_string()
            }
        }
    }
}

/// Loose deserialization target; every field is checked by hand.
#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default, rename = "type")]
    kind: Option<serde_json::Value>,
    #[serde(default, rename = "entityId")]
    entity_id: Option<serde_json::Value>,
    #[serde(default, rename = "documentVersion")]
    document_version: Option<serde_json::Value>,
}

/// Decode one raw message posted by the sandbox.
pub fn parse_sandbox_message(raw: &str) -> Result<SandboxMessage, ProtocolError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ProtocolError::Json(e.to_string()))?;
    // Derived struct impls also accept arrays; only objects are messages.
    if !value.is_object() {
        return Err(ProtocolError::Json("expected a JSON object".to_owned()));
    }
    let msg: RawMessage =
        serde_json::from_value(value).map_err(|e| ProtocolError::Json(e.to_string()))?;

    let kind = msg
        .kind
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .ok_or(ProtocolError::MissingType)?;

    match kind {
        ENTITY_SELECTED => {
            let entity_id = msg
                .entity_id
                .as_ref()
                .and_then(serde_json::Value::as_str)
                .filter(|id| !id.is_empty())
                .ok_or(ProtocolError::MissingField("entityId"))?;
            Ok(SandboxMessage::EntitySelected {
                entity_id: EntityId::new(entity_id),
                document_version: msg
                    .document_version
                    .as_ref()
                    .and_then(serde_json::Value::as_u64),
            })
        }
        other => Err(ProtocolError::UnknownType(other.to_owned())),
    }
}
