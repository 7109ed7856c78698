//! MQTT adapter error types.

use fleethub_domain::error::HubError;

/// Errors specific to the MQTT adapter.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// The MQTT client has not been initialised yet.
    #[error("MQTT client not connected")]
    NotConnected,

    /// The rumqttc client returned an error.
    #[error("MQTT client error")]
    Client(#[source] rumqttc::ClientError),

    /// Failed to parse an incoming MQTT payload as JSON.
    #[error("failed to parse MQTT payload")]
    PayloadParse(#[source] serde_json::Error),

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] HubError),
}

impl MqttError {
    /// Convert into a [`HubError::Storage`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> HubError {
        match self {
            Self::Domain(err) => err,
            other => HubError::Storage(Box::new(other)),
        }
    }
}

impl From<MqttError> for HubError {
    fn from(err: MqttError) -> Self {
        err.into_domain()
    }
}
