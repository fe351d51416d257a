//! Key kind identifiers for AlderDB indexes.

use serde::{Deserialize, Serialize};

/// Width in bytes of a fixed-length string key.
pub const STRING_KEY_LEN: usize = 10;

/// Identifier for the key type an index is built over.
///
/// The kind is fixed at index creation and persisted in the index header,
/// so the discriminants are part of the on-disk format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum KeyKind {
    /// Signed 32-bit integer keys.
    Int = 0,
    /// IEEE-754 double keys.
    Double = 1,
    /// Fixed-length byte-string keys of `STRING_KEY_LEN` bytes.
    Str = 2,
}

impl KeyKind {
    /// Decodes a persisted kind tag, or None if the tag is unknown.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyKind::Int),
            1 => Some(KeyKind::Double),
            2 => Some(KeyKind::Str),
            _ => None,
        }
    }

    /// Returns the persisted tag for this kind.
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    /// Returns the key width in bytes for this kind.
    pub fn key_width(&self) -> usize {
        match self {
            KeyKind::Int => 4,
            KeyKind::Double => 8,
            KeyKind::Str => STRING_KEY_LEN,
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeyKind::Int => "INT",
            KeyKind::Double => "DOUBLE",
            KeyKind::Str => "STRING",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repr_values() {
        assert_eq!(KeyKind::Int.as_i32(), 0);
        assert_eq!(KeyKind::Double.as_i32(), 1);
        assert_eq!(KeyKind::Str.as_i32(), 2);
    }

    #[test]
    fn test_from_i32_roundtrip() {
        for kind in [KeyKind::Int, KeyKind::Double, KeyKind::Str] {
            assert_eq!(KeyKind::from_i32(kind.as_i32()), Some(kind));
        }
    }

    #[test]
    fn test_from_i32_unknown() {
        assert_eq!(KeyKind::from_i32(-1), None);
        assert_eq!(KeyKind::from_i32(3), None);
        assert_eq!(KeyKind::from_i32(i32::MAX), None);
    }

    #[test]
    fn test_key_width() {
        assert_eq!(KeyKind::Int.key_width(), 4);
        assert_eq!(KeyKind::Double.key_width(), 8);
        assert_eq!(KeyKind::Str.key_width(), STRING_KEY_LEN);
        assert_eq!(KeyKind::Str.key_width(), 10);
    }

    #[test]
    fn test_display() {
        assert_eq!(KeyKind::Int.to_string(), "INT");
        assert_eq!(KeyKind::Double.to_string(), "DOUBLE");
        assert_eq!(KeyKind::Str.to_string(), "STRING");
    }

    #[test]
    fn test_clone_copy_hash() {
        use std::collections::HashSet;

        let k1 = KeyKind::Double;
        let k2 = k1;
        assert_eq!(k1, k2);

        let mut set = HashSet::new();
        set.insert(KeyKind::Int);
        set.insert(KeyKind::Double);
        set.insert(KeyKind::Int);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_serde_roundtrip() {
        for kind in [KeyKind::Int, KeyKind::Double, KeyKind::Str] {
            let serialized = serde_json::to_string(&kind).unwrap();
            let deserialized: KeyKind = serde_json::from_str(&serialized).unwrap();
            assert_eq!(kind, deserialized);
        }
    }
}
