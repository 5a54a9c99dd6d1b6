// Numcro Key Names
// Canonical lower-case key names and the Linux key-code table behind them

use std::collections::HashMap;
use std::sync::OnceLock;

/// Key that ends a macro recording without being recorded itself.
pub const ABORT_KEY: &str = "esc";

/// Normalize a key name from any source into its canonical form.
///
/// Names are trimmed, lower-cased and whitespace-collapsed, then a small
/// alias table folds the spellings used by the raw-input listener
/// ("Left Arrow", "Escape", ...) onto the hook vocabulary.
pub fn normalize_key_name(raw: &str) -> String {
    let collapsed = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    match collapsed.as_str() {
        "escape" => "esc".to_string(),
        "return" => "enter".to_string(),
        "left arrow" => "left".to_string(),
        "right arrow" => "right".to_string(),
        "up arrow" => "up".to_string(),
        "down arrow" => "down".to_string(),
        "control" => "ctrl".to_string(),
        "left control" => "left ctrl".to_string(),
        "right control" => "right ctrl".to_string(),
        "del" => "delete".to_string(),
        "ins" => "insert".to_string(),
        "pgup" | "prior" => "page up".to_string(),
        "pgdn" | "next" => "page down".to_string(),
        "capslock" => "caps lock".to_string(),
        "numlock" => "num lock".to_string(),
        "scrolllock" => "scroll lock".to_string(),
        "prtsc" | "printscreen" | "print" => "print screen".to_string(),
        "spacebar" => "space".to_string(),
        _ => collapsed,
    }
}

/// Canonical name for a Linux input-event key code
pub fn name_for_code(code: u16) -> Option<&'static str> {
    static BY_CODE: OnceLock<HashMap<u16, &'static str>> = OnceLock::new();
    BY_CODE
        .get_or_init(|| KEY_TABLE.iter().map(|(code, name)| (*code, *name)).collect())
        .get(&code)
        .copied()
}

/// Linux input-event key code for a canonical key name
pub fn code_for_name(name: &str) -> Option<u16> {
    static BY_NAME: OnceLock<HashMap<&'static str, u16>> = OnceLock::new();
    BY_NAME
        .get_or_init(|| KEY_TABLE.iter().map(|(code, name)| (*name, *code)).collect())
        .get(normalize_key_name(name).as_str())
        .copied()
}

// Values match Linux input-event-codes.h
const KEY_TABLE: &[(u16, &str)] = &[
    (1, "esc"),
    (2, "1"),
    (3, "2"),
    (4, "3"),
    (5, "4"),
    (6, "5"),
    (7, "6"),
    (8, "7"),
    (9, "8"),
    (10, "9"),
    (11, "0"),
    (12, "-"),
    (13, "="),
    (14, "backspace"),
    (15, "tab"),
    (16, "q"),
    (17, "w"),
    (18, "e"),
    (19, "r"),
    (20, "t"),
    (21, "y"),
    (22, "u"),
    (23, "i"),
    (24, "o"),
    (25, "p"),
    (26, "["),
    (27, "]"),
    (28, "enter"),
    (29, "left ctrl"),
    (30, "a"),
    (31, "s"),
    (32, "d"),
    (33, "f"),
    (34, "g"),
    (35, "h"),
    (36, "j"),
    (37, "k"),
    (38, "l"),
    (39, ";"),
    (40, "'"),
    (41, "`"),
    (42, "left shift"),
    (43, "\\"),
    (44, "z"),
    (45, "x"),
    (46, "c"),
    (47, "v"),
    (48, "b"),
    (49, "n"),
    (50, "m"),
    (51, ","),
    (52, "."),
    (53, "/"),
    (54, "right shift"),
    (55, "num *"),
    (56, "left alt"),
    (57, "space"),
    (58, "caps lock"),
    (59, "f1"),
    (60, "f2"),
    (61, "f3"),
    (62, "f4"),
    (63, "f5"),
    (64, "f6"),
    (65, "f7"),
    (66, "f8"),
    (67, "f9"),
    (68, "f10"),
    (69, "num lock"),
    (70, "scroll lock"),
    (71, "num 7"),
    (72, "num 8"),
    (73, "num 9"),
    (74, "num -"),
    (75, "num 4"),
    (76, "num 5"),
    (77, "num 6"),
    (78, "num +"),
    (79, "num 1"),
    (80, "num 2"),
    (81, "num 3"),
    (82, "num 0"),
    (83, "num ."),
    (87, "f11"),
    (88, "f12"),
    (96, "num enter"),
    (97, "right ctrl"),
    (98, "num /"),
    (99, "print screen"),
    (100, "right alt"),
    (102, "home"),
    (103, "up"),
    (104, "page up"),
    (105, "left"),
    (106, "right"),
    (107, "end"),
    (108, "down"),
    (109, "page down"),
    (110, "insert"),
    (111, "delete"),
    (113, "volume mute"),
    (114, "volume down"),
    (115, "volume up"),
    (119, "pause"),
    (125, "left windows"),
    (126, "right windows"),
    (127, "menu"),
    (163, "next track"),
    (164, "play/pause"),
    (165, "previous track"),
    (166, "stop media"),
    (183, "f13"),
    (184, "f14"),
    (185, "f15"),
    (186, "f16"),
    (187, "f17"),
    (188, "f18"),
    (189, "f19"),
    (190, "f20"),
    (191, "f21"),
    (192, "f22"),
    (193, "f23"),
    (194, "f24"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_trims() {
        assert_eq!(normalize_key_name("  A "), "a");
        assert_eq!(normalize_key_name("F1"), "f1");
        assert_eq!(normalize_key_name("Num   1"), "num 1");
    }

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(normalize_key_name("Escape"), "esc");
        assert_eq!(normalize_key_name("Left Arrow"), "left");
        assert_eq!(normalize_key_name("Caps Lock"), "caps lock");
        assert_eq!(normalize_key_name("capslock"), "caps lock");
    }

    #[test]
    fn test_code_name_round_trip() {
        assert_eq!(name_for_code(30), Some("a"));
        assert_eq!(code_for_name("A"), Some(30));
        assert_eq!(code_for_name("Escape"), Some(1));
        assert_eq!(name_for_code(79), Some("num 1"));
        assert_eq!(name_for_code(0x2ff), None);
        assert_eq!(code_for_name("no such key"), None);
    }

    #[test]
    fn test_key_table_has_unique_names() {
        let mut seen = std::collections::HashSet::new();
        for (_, name) in KEY_TABLE {
            assert!(seen.insert(*name), "duplicate key name {}", name);
            assert_eq!(normalize_key_name(name), *name);
        }
    }
}
