//! Configuration values returned by `nms_config_get`.

use alloc::string::String;
use alloc::vec::Vec;

/// Tagged configuration value. The tag and payload cannot be separated,
/// so every consumer must handle each variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Integer(i32),
    UnsignedInteger(u32),
    Float(f32),
    Boolean(bool),
    /// Identifier-like enumeration member (`[A-Za-z_][A-Za-z0-9_]*`).
    Enumeration(String),
    /// Key into the host's localization tables, without the `$` prefix.
    LocalizationKey(String),
    String(String),
    Array(Vec<ConfigValue>),
}

impl ConfigValue {
    /// Codec tag of this variant.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Integer(_) => 0,
            Self::UnsignedInteger(_) => 1,
            Self::Float(_) => 2,
            Self::Boolean(_) => 3,
            Self::Enumeration(_) => 4,
            Self::LocalizationKey(_) => 5,
            Self::String(_) => 6,
            Self::Array(_) => 7,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::UnsignedInteger(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::UnsignedInteger(v) => Some(*v),
            Self::Integer(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Text of a string, enumeration, or localization key.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Enumeration(s) | Self::LocalizationKey(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ConfigValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Returns true if `s` is a valid enumeration member name.
pub fn is_enumeration_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_integer_accessors_convert_when_lossless() {
        assert_eq!(ConfigValue::Integer(5).as_u32(), Some(5));
        assert_eq!(ConfigValue::Integer(-5).as_u32(), None);
        assert_eq!(ConfigValue::UnsignedInteger(u32::MAX).as_i32(), None);
        assert_eq!(ConfigValue::UnsignedInteger(80).as_i32(), Some(80));
        assert_eq!(ConfigValue::Float(1.0).as_i32(), None);
    }

    #[test]
    fn test_scalar_accessors_match_their_variant() {
        assert_eq!(ConfigValue::Float(0.5).as_f32(), Some(0.5));
        assert_eq!(ConfigValue::Integer(1).as_f32(), None);
        assert_eq!(ConfigValue::Boolean(false).as_bool(), Some(false));
        assert_eq!(ConfigValue::Integer(1).as_bool(), None);
    }

    #[test]
    fn test_as_str_covers_text_variants() {
        assert_eq!(ConfigValue::String("a".into()).as_str(), Some("a"));
        assert_eq!(ConfigValue::Enumeration("Dark".into()).as_str(), Some("Dark"));
        assert_eq!(ConfigValue::LocalizationKey("menu.ok".into()).as_str(), Some("menu.ok"));
        assert_eq!(ConfigValue::Boolean(true).as_str(), None);
    }

    #[test]
    fn test_array_accessor() {
        let v = ConfigValue::Array(vec![ConfigValue::Integer(1), ConfigValue::Boolean(false)]);
        assert_eq!(v.as_array().map(|a| a.len()), Some(2));
        assert_eq!(v.tag(), 7);
    }

    #[test]
    fn test_enumeration_names() {
        assert!(is_enumeration_name("dark_mode"));
        assert!(is_enumeration_name("_x1"));
        assert!(!is_enumeration_name("1x"));
        assert!(!is_enumeration_name(""));
        assert!(!is_enumeration_name("a-b"));
    }
}
