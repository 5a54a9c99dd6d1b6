// Numcro Mapping Resolver
// Maps an input event onto the virtual buttons it triggers

use smallvec::SmallVec;

use crate::input::{device_matches, InputEvent};
use crate::mapping::{ButtonId, ButtonTable};

/// Matched buttons, in table order
pub type Matches = SmallVec<[ButtonId; 4]>;

/// Find every button an event triggers.
///
/// A button matches when its mapped key equals the event key
/// (case-insensitively) and, with device filtering on, its stored device
/// matches the event's. Overlapping buttons simply all match.
pub fn resolve(buttons: &ButtonTable, event: &InputEvent, device_filtering: bool) -> Matches {
    buttons
        .iter()
        .filter(|button| {
            button
                .mapped_key
                .as_deref()
                .is_some_and(|key| key.eq_ignore_ascii_case(&event.key))
        })
        .filter(|button| {
            device_matches(
                device_filtering,
                button.mapped_device.as_ref(),
                event.device.as_ref(),
            )
        })
        .map(|button| button.id())
        .collect()
}
