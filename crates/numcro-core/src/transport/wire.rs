// Numcro Wire Formats
// Adapters from the raw-input JSON formats to InputEvent

use serde::{Deserialize, Serialize};

use crate::input::{DeviceIdentity, EventSource, InputEvent};
use crate::Action;

/// Errors decoding one wire record
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unrecognized record: {0}")]
    UnrecognizedFormat(String),

    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("Record has an empty key name")]
    EmptyKey,
}

/// Record written by the raw-input listener
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    key_name: String,
    event_type: String,
    #[serde(default)]
    device: Option<String>,
    #[serde(default)]
    product: Option<String>,
    #[serde(default)]
    vendor_id: Option<u64>,
    #[serde(default)]
    product_id: Option<u64>,
}

/// Record written by networked broadcasters
#[derive(Debug, Deserialize)]
struct NetworkedRecord {
    key: String,
    action: String,
    #[serde(default)]
    device: Option<DeviceField>,
    #[serde(flatten)]
    flat: DeviceDescriptor,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeviceField {
    Path(String),
    Descriptor(DeviceDescriptor),
}

#[derive(Debug, Default, Deserialize)]
struct DeviceDescriptor {
    #[serde(default)]
    vendor_id: Option<u64>,
    #[serde(default)]
    product_id: Option<u64>,
    #[serde(default, alias = "name", alias = "product")]
    product_name: Option<String>,
    #[serde(default, alias = "device_path")]
    path: Option<String>,
    #[serde(default, alias = "serial_number")]
    serial: Option<String>,
}

impl DeviceDescriptor {
    fn is_empty(&self) -> bool {
        self.vendor_id.is_none()
            && self.product_id.is_none()
            && self.product_name.is_none()
            && self.path.is_none()
            && self.serial.is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireRecord {
    Legacy(LegacyRecord),
    Networked(NetworkedRecord),
}

/// Build an identity; `None` when nothing identifying is present.
///
/// The identity string is the explicit path or serial, falling back to the
/// product name.
fn identity(
    path: Option<String>,
    name: Option<String>,
    vendor_id: Option<u64>,
    product_id: Option<u64>,
) -> Option<DeviceIdentity> {
    let path = path.filter(|p| !p.trim().is_empty());
    let name = name.filter(|n| !n.trim().is_empty());
    let serial_or_path = path.or_else(|| name.clone()).unwrap_or_default();

    let mut device = DeviceIdentity::new(serial_or_path, name.unwrap_or_default());
    device.vendor_id = vendor_id.and_then(|v| u16::try_from(v).ok());
    device.product_id = product_id.and_then(|p| u16::try_from(p).ok());

    if device.serial_or_path.is_empty() && device.vendor_id.is_none() && device.product_id.is_none() {
        None
    } else {
        Some(device)
    }
}

fn descriptor_identity(d: DeviceDescriptor) -> Option<DeviceIdentity> {
    identity(d.path.or(d.serial), d.product_name, d.vendor_id, d.product_id)
}

/// Decode one newline-delimited JSON record into an event stamped now.
pub fn parse_event(line: &str, source: EventSource) -> Result<InputEvent, WireError> {
    let value: serde_json::Value = serde_json::from_str(line.trim())?;
    let record = WireRecord::deserialize(value)
        .map_err(|e| WireError::UnrecognizedFormat(e.to_string()))?;

    let (key, action, device) = match record {
        WireRecord::Legacy(r) => (
            r.key_name,
            r.event_type,
            identity(r.device, r.product, r.vendor_id, r.product_id),
        ),
        WireRecord::Networked(r) => {
            let device = match r.device {
                Some(DeviceField::Path(path)) => identity(
                    Some(path),
                    r.flat.product_name,
                    r.flat.vendor_id,
                    r.flat.product_id,
                ),
                Some(DeviceField::Descriptor(d)) if !d.is_empty() => descriptor_identity(d),
                _ => descriptor_identity(r.flat),
            };
            (r.key, r.action, device)
        }
    };

    let action = Action::from_wire(&action).ok_or(WireError::UnsupportedAction(action))?;
    if key.trim().is_empty() {
        return Err(WireError::EmptyKey);
    }
    Ok(InputEvent::new(&key, action, device, source))
}

/// UDP discovery datagrams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryMessage {
    DiscoveryRequest,
    DiscoveryResponse { sender: String, ip_address: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<InputEvent, WireError> {
        parse_event(line, EventSource::Local)
    }

    #[test]
    fn test_legacy_record() {
        let line = r#"{"timestamp":1700000000000,"device":"\\\\?\\HID#VID_1234","product":"Keypad",
            "vendorId":4660,"productId":22136,"vk":65,"scan":30,"flags":"None",
            "eventType":"down","keyName":"A"}"#;
        let event = parse(line).unwrap();
        assert_eq!(event.key, "a");
        assert_eq!(event.action, Action::Press);
        let device = event.device.unwrap();
        assert_eq!(device.serial_or_path, "\\\\?\\HID#VID_1234");
        assert_eq!(device.display_name, "Keypad");
        assert_eq!(device.vendor_id, Some(0x1234));
        assert_eq!(device.product_id, Some(0x5678));
    }

    #[test]
    fn test_legacy_record_without_device_is_unknown() {
        let event = parse(r#"{"eventType":"up","keyName":"Escape","device":null}"#).unwrap();
        assert_eq!(event.key, "esc");
        assert_eq!(event.action, Action::Release);
        assert!(event.device.is_none());
    }

    #[test]
    fn test_networked_record_with_descriptor() {
        let line = r#"{"key":"Num 1","action":"press","device":{"vendor_id":1,"product_id":2,
            "product_name":"Pad","path":"/dev/hidraw0"}}"#;
        let event = parse(line).unwrap();
        assert_eq!(event.key, "num 1");
        let device = event.device.unwrap();
        assert_eq!(device.serial_or_path, "/dev/hidraw0");
        assert_eq!(device.vendor_id, Some(1));
    }

    #[test]
    fn test_networked_record_with_path_string() {
        let event = parse(r#"{"key":"b","action":"up","device":"dev-7"}"#).unwrap();
        assert_eq!(event.action, Action::Release);
        assert_eq!(event.device_path(), Some("dev-7"));
    }

    #[test]
    fn test_networked_record_with_flat_fields() {
        let event =
            parse(r#"{"key":"c","action":"down","serial":"SN-1","vendor_id":5,"product_id":6}"#)
                .unwrap();
        let device = event.device.unwrap();
        assert_eq!(device.serial_or_path, "SN-1");
        assert_eq!(device.product_id, Some(6));
    }

    #[test]
    fn test_product_name_fallback_identity() {
        let event = parse(r#"{"key":"c","action":"press","device":{"product_name":"Pad"}}"#).unwrap();
        assert_eq!(event.device_path(), Some("Pad"));

        let event = parse(r#"{"key":"c","action":"press","device":{}}"#).unwrap();
        assert!(event.device.is_none());
    }

    #[test]
    fn test_unsupported_action() {
        assert!(matches!(
            parse(r#"{"key":"a","action":"repeat"}"#),
            Err(WireError::UnsupportedAction(a)) if a == "repeat"
        ));
    }

    #[test]
    fn test_malformed_lines() {
        assert!(matches!(parse("Listening for key input..."), Err(WireError::Json(_))));
        assert!(matches!(parse(r#"{"hello":1}"#), Err(WireError::UnrecognizedFormat(_))));
        assert!(matches!(parse(r#"{"key":" ","action":"press"}"#), Err(WireError::EmptyKey)));
    }

    #[test]
    fn test_discovery_messages() {
        let request: DiscoveryMessage =
            serde_json::from_str(r#"{"type":"discovery_request"}"#).unwrap();
        assert_eq!(request, DiscoveryMessage::DiscoveryRequest);

        let response = DiscoveryMessage::DiscoveryResponse {
            sender: "host".into(),
            ip_address: "10.0.0.2".into(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["type"], "discovery_response");
        assert_eq!(json["sender"], "host");
        assert_eq!(json["ip_address"], "10.0.0.2");
    }
}
