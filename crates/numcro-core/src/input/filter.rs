// Numcro Input Layer - Device Filtering
// Device matching for resolution and for local hook device selection

use crate::input::DeviceIdentity;

/// Check whether a button's stored device admits an event's device.
///
/// With filtering disabled device identity is ignored entirely. With
/// filtering enabled both sides must be known and must match; a button with
/// no stored device never matches.
pub fn device_matches(
    filtering: bool,
    mapped: Option<&DeviceIdentity>,
    event: Option<&DeviceIdentity>,
) -> bool {
    if !filtering {
        return true;
    }

    match (mapped, event) {
        (Some(mapped), Some(event)) => mapped.matches(event),
        _ => false,
    }
}

/// Check if a local input device should be opened by the hook.
///
/// 1. If names are given, only devices matching by path or name are used
/// 2. Otherwise virtual devices and non-keyboards are excluded
pub fn matches_hook_filter(
    device_name: &str,
    device_path: &str,
    filter_names: &[String],
    is_keyboard: bool,
    is_virtual: bool,
) -> bool {
    if !filter_names.is_empty() {
        return filter_names
            .iter()
            .any(|name| device_path == name || device_name == name);
    }

    is_keyboard && !is_virtual
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtering_disabled_ignores_devices() {
        assert!(device_matches(false, None, None));
        let dev = DeviceIdentity::new("a", "");
        assert!(device_matches(false, Some(&dev), None));
        assert!(device_matches(false, None, Some(&dev)));
    }

    #[test]
    fn test_filtering_requires_stored_device() {
        let dev = DeviceIdentity::new("a", "");
        assert!(!device_matches(true, None, Some(&dev)));
        assert!(!device_matches(true, Some(&dev), None));
        assert!(device_matches(true, Some(&dev), Some(&dev)));
        assert!(!device_matches(true, Some(&dev), Some(&DeviceIdentity::new("b", ""))));
    }

    #[test]
    fn test_hook_filter_explicit_names() {
        let filter = vec!["/dev/input/event3".to_string()];
        assert!(matches_hook_filter("Keypad", "/dev/input/event3", &filter, false, false));
        assert!(!matches_hook_filter("Keypad", "/dev/input/event4", &filter, true, false));
    }

    #[test]
    fn test_hook_filter_autodetect() {
        assert!(matches_hook_filter("Keyboard", "/dev/input/event0", &[], true, false));
        assert!(!matches_hook_filter("Numcro (virtual)", "/dev/input/event9", &[], true, true));
        assert!(!matches_hook_filter("Mouse", "/dev/input/event1", &[], false, false));
    }
}
