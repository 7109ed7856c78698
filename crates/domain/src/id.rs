//! Typed identifier newtypes.
//!
//! Generated identifiers (queue entries, automations, events) are backed by
//! UUIDs. Device identifiers are different: a device is keyed by its stable
//! transport-independent hardware address (typically a MAC address), which is
//! assigned by the outside world and immutable after registration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a [`QueueEntry`](crate::queue::QueueEntry).
    QueueEntryId
);

define_id!(
    /// Unique identifier for an [`Automation`](crate::automation).
    AutomationId
);

define_id!(
    /// Unique identifier for a [`DeviceEvent`](crate::event::DeviceEvent).
    EventId
);

/// Stable device identifier — the device's hardware address.
///
/// Globally unique and immutable after registration. The core treats it as
/// an opaque string; [`Device::validate`](crate::device::Device::validate)
/// checks the MAC-address format on registration input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap a hardware address.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier looks like a MAC address
    /// (six hex octets separated by `:` or `-`).
    #[must_use]
    pub fn is_mac_address(&self) -> bool {
        let parts: Vec<&str> = if self.0.contains(':') {
            self.0.split(':').collect()
        } else if self.0.contains('-') {
            self.0.split('-').collect()
        } else {
            return false;
        };
        parts.len() == 6
            && parts
                .iter()
                .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        let a = QueueEntryId::new();
        let b = QueueEntryId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = AutomationId::new();
        let text = id.to_string();
        let parsed: AutomationId = text.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let id = EventId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_return_error_when_parsing_invalid_uuid() {
        let result = QueueEntryId::from_str("not-a-uuid");
        assert!(result.is_err());
    }

    #[test]
    fn should_wrap_existing_uuid_when_using_from_uuid() {
        let uuid = uuid::Uuid::new_v4();
        let id = AutomationId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn should_accept_colon_separated_mac_address() {
        assert!(DeviceId::new("AA:BB:CC:DD:EE:FF").is_mac_address());
        assert!(DeviceId::new("00:1b:44:11:3a:b7").is_mac_address());
    }

    #[test]
    fn should_accept_dash_separated_mac_address() {
        assert!(DeviceId::new("AA-BB-CC-DD-EE-FF").is_mac_address());
    }

    #[test]
    fn should_reject_malformed_mac_address() {
        assert!(!DeviceId::new("AA:BB:CC:DD:EE").is_mac_address());
        assert!(!DeviceId::new("AA:BB:CC:DD:EE:GG").is_mac_address());
        assert!(!DeviceId::new("AABBCCDDEEFF").is_mac_address());
        assert!(!DeviceId::new("").is_mac_address());
    }

    #[test]
    fn should_roundtrip_device_id_through_serde_json() {
        let id = DeviceId::new("AA:BB:CC:DD:EE:FF");
        let json = serde_json::to_string(&id).unwrap();
        let parsed: DeviceId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
