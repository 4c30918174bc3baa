//! Shared frame model and subprotocol envelope codec for captured WS traffic.
//!
//! This crate owns the representation of a received websocket message as
//! seen by the capture client, the content-type vocabulary used when
//! injecting messages through the service, and the JSON envelope the service
//! wraps payloads in when a client negotiates `json.webpubsub.azure.v1`.
//! It has no transport dependency; the capture crate converts transport
//! messages into [`Frame`] values.

use std::borrow::Cow;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subprotocol name for the JSON envelope framing.
pub const JSON_SUBPROTOCOL: &str = "json.webpubsub.azure.v1";

/// Error returned by the envelope codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The envelope or a JSON payload was not valid JSON.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    /// Binary envelope data was not valid base64.
    #[error("invalid base64 data: {0}")]
    Base64(#[from] base64::DecodeError),
    /// A text payload was not valid UTF-8.
    #[error("text payload is not utf-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// Payload extraction was attempted on a non-`message` envelope.
    #[error("envelope is not a data message")]
    NotAMessage,
    /// The envelope `data` field does not match its declared `dataType`.
    #[error("envelope data does not match data type {0:?}")]
    UnexpectedData(DataType),
    /// A content type string did not name a known content type.
    #[error("unknown content type: {0}")]
    UnknownContentType(String),
}

/// Transport-reported kind of a websocket message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameKind {
    /// UTF-8 text message.
    Text,
    /// Opaque binary message.
    Binary,
}

/// One websocket message received by a capture client.
///
/// The payload is fixed at construction. The text view is derived on demand
/// from the raw bytes, so a binary frame that happens to carry UTF-8 still
/// exposes it as text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    payload: Vec<u8>,
}

impl Frame {
    /// Build a frame from a transport kind and raw payload.
    #[must_use]
    pub fn new(kind: FrameKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Build a text frame.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(FrameKind::Text, text.into().into_bytes())
    }

    /// Build a binary frame.
    #[must_use]
    pub fn binary(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(FrameKind::Binary, payload.into())
    }

    /// Message kind as reported by the transport.
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is zero-length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload decoded as UTF-8, or `None` when the bytes are not valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Payload decoded as UTF-8 with invalid sequences replaced.
    #[must_use]
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }

    /// Consume the frame and return its payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Content type tag attached to a message injected through the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// `text/plain`
    TextPlain,
    /// `application/json`
    ApplicationJson,
    /// `application/octet-stream`
    ApplicationOctetStream,
}

impl ContentType {
    /// MIME string sent in the `Content-Type` header.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextPlain => "text/plain",
            Self::ApplicationJson => "application/json",
            Self::ApplicationOctetStream => "application/octet-stream",
        }
    }

    /// Transport kind a plain (non-subprotocol) client receives for this content type.
    #[must_use]
    pub fn frame_kind(self) -> FrameKind {
        match self {
            Self::TextPlain | Self::ApplicationJson => FrameKind::Text,
            Self::ApplicationOctetStream => FrameKind::Binary,
        }
    }
}

impl FromStr for ContentType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "text/plain" => Ok(Self::TextPlain),
            "json" | "application/json" => Ok(Self::ApplicationJson),
            "binary" | "application/octet-stream" => Ok(Self::ApplicationOctetStream),
            other => Err(CodecError::UnknownContentType(other.to_owned())),
        }
    }
}

/// `dataType` field of a subprotocol envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Text,
    Json,
    Binary,
}

impl From<ContentType> for DataType {
    fn from(value: ContentType) -> Self {
        match value {
            ContentType::TextPlain => Self::Text,
            ContentType::ApplicationJson => Self::Json,
            ContentType::ApplicationOctetStream => Self::Binary,
        }
    }
}

/// Origin of a data message envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    /// Sent by the server API to all connections or to a connection directly.
    Server,
    /// Delivered through a group the connection belongs to.
    Group,
}

/// Event named by a `system` envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemEvent {
    Connected,
    Disconnected,
}

/// Server-to-client envelope of the JSON subprotocol.
///
/// Field order matters: the service emits `type`, `from`, `group`,
/// `dataType`, `data` and end-signal detection compares encoded text
/// exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// A data message.
    Message {
        from: MessageSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        #[serde(rename = "dataType")]
        data_type: DataType,
        data: Value,
    },
    /// A connection lifecycle notification.
    System {
        event: SystemEvent,
        #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(rename = "connectionId", default, skip_serializing_if = "Option::is_none")]
        connection_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ServerMessage {
    /// Wrap an injected payload the way the service does for subprotocol clients.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidUtf8`] for non-UTF-8 text payloads and
    /// [`CodecError::Json`] for JSON payloads that do not parse.
    pub fn from_payload(
        from: MessageSource,
        group: Option<String>,
        content_type: ContentType,
        payload: &[u8],
    ) -> Result<Self, CodecError> {
        let data_type = DataType::from(content_type);
        let data = match data_type {
            DataType::Text => Value::String(std::str::from_utf8(payload)?.to_owned()),
            DataType::Json => serde_json::from_slice(payload)?,
            DataType::Binary => Value::String(BASE64.encode(payload)),
        };
        Ok(Self::Message {
            from,
            group,
            data_type,
            data,
        })
    }

    /// Build a `system/connected` envelope.
    #[must_use]
    pub fn connected(user_id: Option<String>, connection_id: impl Into<String>) -> Self {
        Self::System {
            event: SystemEvent::Connected,
            user_id,
            connection_id: Some(connection_id.into()),
            message: None,
        }
    }

    /// Recover the original payload bytes from a `message` envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::NotAMessage`] for `system` envelopes and
    /// [`CodecError::UnexpectedData`] / [`CodecError::Base64`] when `data`
    /// does not fit the declared `dataType`.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let Self::Message {
            data_type, data, ..
        } = self
        else {
            return Err(CodecError::NotAMessage);
        };

        match (data_type, data) {
            (DataType::Text, Value::String(text)) => Ok(text.clone().into_bytes()),
            (DataType::Json, value) => Ok(serde_json::to_vec(value)?),
            (DataType::Binary, Value::String(encoded)) => Ok(BASE64.decode(encoded)?),
            _ => Err(CodecError::UnexpectedData(*data_type)),
        }
    }
}

/// Encode an envelope as the exact text the service sends.
#[must_use]
pub fn encode_envelope(message: &ServerMessage) -> String {
    // Serializing plain enums and `Value` cannot fail.
    serde_json::to_string(message).unwrap_or_default()
}

/// Decode envelope text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] when the text is not a known envelope.
pub fn decode_envelope(text: &str) -> Result<ServerMessage, CodecError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
