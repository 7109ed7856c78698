//! Script — a named, opaque command/program body owned by a device.
//!
//! The body is interpreted by the target runtime, never by the core.

use serde::{Deserialize, Serialize};

use crate::error::{HubError, ValidationError};
use crate::id::DeviceId;
use crate::time::Timestamp;

/// A script uploaded to a device. Names are unique per device; uploads
/// upsert by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub device_id: DeviceId,
    pub name: String,
    /// Opaque text payload.
    pub body: String,
    pub version: String,
    pub enabled: bool,
    pub updated_at: Timestamp,
}

impl Script {
    /// Create an enabled script with the default version tag.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Validation`] when the name is empty.
    pub fn new(
        device_id: DeviceId,
        name: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, HubError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationError::EmptyScriptName.into());
        }
        Ok(Self {
            device_id,
            name,
            body: body.into(),
            version: "1.0.0".to_string(),
            enabled: true,
            updated_at: crate::time::now(),
        })
    }
}
