//! Virtual key definitions and key-class matching
//!
//! Provides the Win32 virtual-key codes the switcher cares about and the
//! rules for matching a generic key class ("either Alt") against the
//! side-specific codes a low-level hook reports.

use serde::{Deserialize, Serialize};

/// A Win32 virtual-key code
///
/// Serialized as the bare numeric code so settings files stay compatible
/// with values written by other tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualKey(pub u16);

impl VirtualKey {
    pub const TAB: Self = Self(0x09);
    /// Either Shift key
    pub const SHIFT: Self = Self(0x10);
    /// Either Control key
    pub const CONTROL: Self = Self(0x11);
    /// Either Alt key
    pub const MENU: Self = Self(0x12);
    pub const CAPITAL: Self = Self(0x14);
    pub const LWIN: Self = Self(0x5B);
    pub const RWIN: Self = Self(0x5C);
    pub const LSHIFT: Self = Self(0xA0);
    pub const RSHIFT: Self = Self(0xA1);
    pub const LCONTROL: Self = Self(0xA2);
    pub const RCONTROL: Self = Self(0xA3);
    pub const LMENU: Self = Self(0xA4);
    pub const RMENU: Self = Self(0xA5);

    /// Check whether a key reported by the hook belongs to this configured key
    ///
    /// Generic classes accept their left and right variants; any other key
    /// only accepts itself.
    pub fn matches(self, reported: VirtualKey) -> bool {
        match self {
            Self::MENU => matches!(reported, Self::MENU | Self::LMENU | Self::RMENU),
            Self::SHIFT => matches!(reported, Self::SHIFT | Self::LSHIFT | Self::RSHIFT),
            Self::CONTROL => matches!(reported, Self::CONTROL | Self::LCONTROL | Self::RCONTROL),
            _ => self == reported,
        }
    }

    /// Check whether two configured keys could match the same physical key
    pub fn overlaps(self, other: VirtualKey) -> bool {
        self == other || self.matches(other) || other.matches(self)
    }

    /// Human-readable name, or "Unknown" for keys outside the settings table
    pub fn name(self) -> &'static str {
        KEY_TABLE
            .iter()
            .find(|(key, _)| *key == self)
            .map(|(_, name)| *name)
            .unwrap_or("Unknown")
    }

    /// Look a key up by the name shown in the settings surface
    pub fn from_name(name: &str) -> Option<Self> {
        KEY_TABLE
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(key, _)| *key)
    }
}

impl std::fmt::Display for VirtualKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.0)
    }
}

const KEY_TABLE: &[(VirtualKey, &str)] = &[
    (VirtualKey::LMENU, "Left Alt"),
    (VirtualKey::RMENU, "Right Alt"),
    (VirtualKey::MENU, "Alt"),
    (VirtualKey::LSHIFT, "Left Shift"),
    (VirtualKey::RSHIFT, "Right Shift"),
    (VirtualKey::SHIFT, "Shift"),
    (VirtualKey::LCONTROL, "Left Ctrl"),
    (VirtualKey::RCONTROL, "Right Ctrl"),
    (VirtualKey::CONTROL, "Ctrl"),
    (VirtualKey::LWIN, "Left Win"),
    (VirtualKey::RWIN, "Right Win"),
    (VirtualKey::TAB, "Tab"),
    (VirtualKey::CAPITAL, "Caps Lock"),
];
