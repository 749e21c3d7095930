//! Active message encoding
//!
//! An active message is the tag of a [`Work`] kind plus its captured state,
//! encoded as JSON. The same encoding travels as text through an environment
//! variable or as bytes through a stream. Two-way messages also carry the
//! descriptor number the reply must be written to in the receiving process.

use crate::catalog::Catalog;
use crate::work::Work;
use reexec_core::{ExecError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};
use std::os::fd::RawFd;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveMessage {
    tag: String,
    payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reply: Option<RawFd>,
}

impl ActiveMessage {
    /// Capture `work` as a one-way message
    pub fn new<W: Work>(work: &W) -> Result<Self> {
        let payload = serde_json::to_value(work)
            .map_err(|e| ExecError::Encode(format!("work '{}': {}", W::TAG, e)))?;

        Ok(Self {
            tag: W::TAG.to_string(),
            payload,
            reply: None,
        })
    }

    /// Capture `work` as a two-way message answering on descriptor `reply`
    pub fn with_reply<W: Work>(work: &W, reply: RawFd) -> Result<Self> {
        let mut message = Self::new(work)?;
        message.reply = Some(reply);
        Ok(message)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Descriptor the outcome is written to, for two-way messages
    pub fn reply(&self) -> Option<RawFd> {
        self.reply
    }

    /// Rebuild the captured work, checking that the tag matches
    pub fn decode<W: Work>(&self) -> Result<W> {
        if self.tag != W::TAG {
            return Err(ExecError::Decode(format!(
                "message carries '{}', expected '{}'",
                self.tag,
                W::TAG
            )));
        }

        serde_json::from_value(self.payload.clone())
            .map_err(|e| ExecError::Decode(format!("work '{}': {}", self.tag, e)))
    }

    /// Text form, suitable for an environment variable value
    pub fn to_text(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ExecError::Encode(e.to_string()))
    }

    pub fn from_text(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ExecError::Decode(format!("active message: {}", e)))
    }

    /// Byte-stream form of the same encoding
    pub fn to_writer<S: Write>(&self, mut stream: S) -> Result<()> {
        let bytes = serde_json::to_vec(self).map_err(|e| ExecError::Encode(e.to_string()))?;
        stream.write_all(&bytes)?;
        stream.flush()?;
        Ok(())
    }

    pub fn from_reader<S: Read>(stream: S) -> Result<Self> {
        serde_json::from_reader(stream).map_err(ExecError::from)
    }

    /// Decode and invoke the captured work through `catalog`
    pub fn activate(self, catalog: &Catalog) -> Result<()> {
        catalog.activate(self)
    }
}
