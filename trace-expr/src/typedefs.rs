//! Typedef registry and member resolution
//!
//! Descriptor files declare typedefs: named raw-memory layouts with a byte
//! size, an endianness, and a set of members. A member's offset is itself an
//! expression string (evaluated through the engine, so offsets may be
//! computed), its element type names the cast applied after extraction, and
//! an optional value table maps integer codes to enum labels.
//!
//! The extraction itself is a pure bit operation on the 64-bit integer an
//! event payload was decoded into: big-endian typedefs byte-reverse the
//! container, the container is masked down to the typedef's byte window,
//! shifted right to the member's bit offset, and finally cast.

use crate::types::{ElementType, EvalError, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Byte order of a typedef's raw memory window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// One member of a typedef
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDef {
    /// Byte offset inside the typedef window, as an expression string
    pub offset: String,
    /// Element type applied as a cast after extraction
    pub element_type: ElementType,
    /// Value table for enum-like members (code -> label)
    #[serde(default)]
    pub value_table: Option<HashMap<i64, String>>,
}

impl MemberDef {
    /// Reverse lookup of an enum label, for the `Type:member:Label` form
    pub fn code_for_label(&self, label: &str) -> Option<i64> {
        self.value_table
            .as_ref()
            .and_then(|table| {
                table
                    .iter()
                    .find(|(_, l)| l.as_str() == label)
                    .map(|(code, _)| *code)
            })
    }
}

/// A complete typedef definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedefDef {
    /// Typedef name (registry key)
    pub name: String,
    /// Window size in bytes (at most 8; the container is a 64-bit integer)
    pub size: usize,
    /// Byte order of the raw window
    pub byte_order: ByteOrder,
    /// All members by name
    pub members: HashMap<String, MemberDef>,
}

impl TypedefDef {
    /// Look up a member, with the engine's error shape on failure
    pub fn member(&self, member_name: &str) -> Result<&MemberDef> {
        self.members.get(member_name).ok_or_else(|| {
            EvalError::type_error("member", format!("{}:{}", self.name, member_name))
        })
    }

    /// Extract a member's value from a raw integer payload
    ///
    /// `offset` is the member's byte offset, already evaluated from its
    /// offset expression. The window is the typedef's `size` low bytes of the
    /// container (byte-reversed first for big-endian typedefs); the member's
    /// bits start at `offset * 8` and the result is cast to the member's
    /// element type.
    pub fn extract(&self, member: &MemberDef, base: i64, offset: i64) -> Result<Value> {
        if offset < 0 {
            return Err(EvalError::type_error("extract", format!("offset {}", offset)));
        }

        let mut container = base as u64;
        if self.byte_order == ByteOrder::BigEndian {
            container = container.swap_bytes();
        }

        let window_bits = self.size.saturating_mul(8).min(64) as u32;
        let window = if window_bits >= 64 {
            container
        } else {
            container & ((1u64 << window_bits) - 1)
        };

        let shift = (offset as u64).saturating_mul(8);
        if shift >= window_bits as u64 {
            log::warn!(
                "Member at byte offset {} is outside the {}-byte window of typedef '{}'",
                offset,
                self.size,
                self.name
            );
        }
        let raw = if shift >= 64 { 0 } else { window >> shift };

        Value::Integer(raw as i64).cast(member.element_type)
    }
}

/// Identifier -> typedef-name usage map
///
/// Populated by the descriptor loader when it declares an event payload
/// identifier against a typedef; consumed read-only by member access.
pub type TypedefUsage = HashMap<String, String>;

/// Registry of all typedefs known to one evaluation session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypedefRegistry {
    typedefs: HashMap<String, TypedefDef>,
}

impl TypedefRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a typedef definition, keyed by its name
    pub fn add(&mut self, def: TypedefDef) {
        self.typedefs.insert(def.name.clone(), def);
    }

    /// Look up a typedef by name
    pub fn get(&self, name: &str) -> Option<&TypedefDef> {
        self.typedefs.get(name)
    }

    /// True if `name` is a registered typedef
    pub fn contains(&self, name: &str) -> bool {
        self.typedefs.contains_key(name)
    }

    /// Number of registered typedefs
    pub fn len(&self) -> usize {
        self.typedefs.len()
    }

    /// True if the registry holds no typedefs
    pub fn is_empty(&self) -> bool {
        self.typedefs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_typedef(byte_order: ByteOrder) -> TypedefDef {
        let mut members = HashMap::new();
        members.insert(
            "b".to_string(),
            MemberDef {
                offset: "2".to_string(),
                element_type: ElementType::Uint8,
                value_table: None,
            },
        );
        TypedefDef {
            name: "Reg".to_string(),
            size: 4,
            byte_order,
            members,
        }
    }

    #[test]
    fn test_extract_little_endian_byte() {
        let def = sample_typedef(ByteOrder::LittleEndian);
        let member = def.member("b").unwrap();
        // 4-byte window of 0x1234567890ABCDEF is 0x90ABCDEF; byte 2 is 0xAB
        let value = def.extract(member, 0x1234_5678_90AB_CDEFu64 as i64, 2).unwrap();
        assert_eq!(value, Value::Integer(0xAB));
    }

    #[test]
    fn test_extract_big_endian_byte() {
        let def = sample_typedef(ByteOrder::BigEndian);
        let member = def.member("b").unwrap();
        // Container byte-reversed to 0xEFCDAB9078563412, window 0x78563412,
        // byte 2 is 0x56
        let value = def.extract(member, 0x1234_5678_90AB_CDEFu64 as i64, 2).unwrap();
        assert_eq!(value, Value::Integer(0x56));
    }

    #[test]
    fn test_extract_offset_outside_window_reads_zero() {
        let def = sample_typedef(ByteOrder::LittleEndian);
        let member = def.member("b").unwrap();
        let value = def.extract(member, -1, 7).unwrap();
        assert_eq!(value, Value::Integer(0));
    }

    #[test]
    fn test_unknown_member_is_type_error() {
        let def = sample_typedef(ByteOrder::LittleEndian);
        assert!(matches!(def.member("missing"), Err(EvalError::Type { .. })));
    }

    #[test]
    fn test_enum_label_reverse_lookup() {
        let mut table = HashMap::new();
        table.insert(0i64, "Idle".to_string());
        table.insert(3i64, "Fault".to_string());
        let member = MemberDef {
            offset: "0".to_string(),
            element_type: ElementType::Uint8,
            value_table: Some(table),
        };
        assert_eq!(member.code_for_label("Fault"), Some(3));
        assert_eq!(member.code_for_label("Unknown"), None);
    }
}
