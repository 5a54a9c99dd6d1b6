// Numcro Input Layer - Device Identity
// Identifies the physical device an input event came from

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Opaque identifier of a physical source device.
///
/// Identity is the `serial_or_path` string: two identities are equal iff those
/// strings are equal. Vendor and product ids are informational and only used
/// by [`DeviceIdentity::matches`] as a fallback when a path is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u16>,
    #[serde(default, alias = "serial_number", alias = "device_path", alias = "path")]
    pub serial_or_path: String,
    #[serde(default, alias = "product_name", alias = "product")]
    pub display_name: String,
}

impl DeviceIdentity {
    /// Create an identity from a path or serial string
    pub fn new(serial_or_path: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            vendor_id: None,
            product_id: None,
            serial_or_path: serial_or_path.into(),
            display_name: display_name.into(),
        }
    }

    pub fn with_vendor_id(mut self, vendor_id: u16) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn with_product_id(mut self, product_id: u16) -> Self {
        self.product_id = Some(product_id);
        self
    }

    /// True when the identity carries nothing that could ever match.
    pub fn is_empty(&self) -> bool {
        self.serial_or_path.is_empty() && (self.vendor_id.is_none() || self.product_id.is_none())
    }

    /// Matching used for device filtering.
    ///
    /// Path equality wins whenever both sides have one. Only when either side
    /// lacks a path do vendor/product ids decide, and then both ids must be
    /// present on both sides.
    pub fn matches(&self, other: &DeviceIdentity) -> bool {
        if !self.serial_or_path.is_empty() && !other.serial_or_path.is_empty() {
            return self.serial_or_path == other.serial_or_path;
        }

        match (self.vendor_id, self.product_id, other.vendor_id, other.product_id) {
            (Some(v1), Some(p1), Some(v2), Some(p2)) => v1 == v2 && p1 == p2,
            _ => false,
        }
    }
}

impl PartialEq for DeviceIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.serial_or_path == other.serial_or_path
    }
}

impl Eq for DeviceIdentity {}

impl Hash for DeviceIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serial_or_path.hash(state);
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(vid), Some(pid)) = (self.vendor_id, self.product_id) {
            write!(f, "{:04X}:{:04X} - ", vid, pid)?;
        }
        if !self.display_name.is_empty() {
            write!(f, "{} ", self.display_name)?;
        }
        write!(f, "({})", self.serial_or_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_path_only() {
        let a = DeviceIdentity::new("\\\\?\\HID#VID_046D", "Keypad").with_vendor_id(0x046d);
        let b = DeviceIdentity::new("\\\\?\\HID#VID_046D", "Other name");
        assert_eq!(a, b);
        assert_ne!(a, DeviceIdentity::new("other", "Keypad"));
    }

    #[test]
    fn test_matches_prefers_path() {
        let a = DeviceIdentity::new("path-a", "")
            .with_vendor_id(1)
            .with_product_id(2);
        let b = DeviceIdentity::new("path-b", "")
            .with_vendor_id(1)
            .with_product_id(2);
        // Same ids but different paths: paths decide
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_matches_falls_back_to_vendor_product() {
        let stored = DeviceIdentity::default().with_vendor_id(0x1234).with_product_id(0x5678);
        let event = DeviceIdentity::new("usb-1", "Pad")
            .with_vendor_id(0x1234)
            .with_product_id(0x5678);
        assert!(stored.matches(&event));
        assert!(event.matches(&stored));

        let other = DeviceIdentity::new("usb-1", "Pad").with_vendor_id(0x1234);
        assert!(!stored.matches(&other));
    }

    #[test]
    fn test_is_empty() {
        assert!(DeviceIdentity::default().is_empty());
        assert!(DeviceIdentity::default().with_vendor_id(1).is_empty());
        assert!(!DeviceIdentity::new("p", "").is_empty());
    }

    #[test]
    fn test_legacy_field_names_deserialize() {
        let json = r#"{"vendor_id": 4660, "product_id": 22136, "serial_number": "ABC123"}"#;
        let identity: DeviceIdentity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.serial_or_path, "ABC123");
        assert_eq!(identity.vendor_id, Some(0x1234));
        assert_eq!(identity.to_string(), "1234:5678 - (ABC123)");
    }
}
