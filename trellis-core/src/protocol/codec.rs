//! Frame encoding.

use serde::{Deserialize, Serialize};

use super::message::{ClientMessage, Outgoing};
use crate::error::ProtocolError;

/// A single socket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encoding negotiated for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WireFormat {
    /// JSON in text frames.
    #[default]
    #[serde(rename = "json")]
    Json,

    /// MessagePack maps in binary frames.
    #[serde(rename = "msgpack")]
    MessagePack,
}

impl WireFormat {
    /// Decode an inbound frame.
    ///
    /// Text frames are always JSON. Binary frames are MessagePack on a
    /// MessagePack connection and UTF-8 JSON otherwise.
    pub fn decode(self, frame: &Frame) -> Result<ClientMessage, ProtocolError> {
        match (self, frame) {
            (_, Frame::Text(text)) => Ok(serde_json::from_str(text)?),
            (WireFormat::MessagePack, Frame::Binary(bytes)) => Ok(rmp_serde::from_slice(bytes)?),
            (WireFormat::Json, Frame::Binary(bytes)) => {
                let text = std::str::from_utf8(bytes)?;
                Ok(serde_json::from_str(text)?)
            }
        }
    }

    /// Encode an outbound message.
    pub fn encode(self, message: &Outgoing) -> Result<Frame, ProtocolError> {
        match self {
            WireFormat::Json => Ok(Frame::Text(serde_json::to_string(message)?)),
            WireFormat::MessagePack => Ok(Frame::Binary(rmp_serde::to_vec_named(message)?)),
        }
    }
}
