//! Trace Expression Engine Library
//!
//! A stateless, reusable expression engine for rendering embedded-device
//! trace events. Descriptor files declare, per event ID, a human-readable
//! rendering as a small C-like expression; this crate lexes, parses and
//! evaluates those expressions against the event's decoded payload.
//!
//! # Architecture
//!
//! This library is intentionally minimal and focused on evaluation:
//! - Lexes and parses C-style expressions in a single pass, evaluating as
//!   it goes (no AST)
//! - Models values dynamically with C-accurate promotion and casting
//! - Resolves named variables through a caller-owned [`VariableTable`]
//! - Resolves `Type:member` and `ident.member` syntax against a
//!   [`TypedefRegistry`], including bitfield extraction and enum labels
//! - Dispatches a fixed set of diagnostic builtins against a caller-provided
//!   [`SymbolTable`]
//!
//! The library does NOT:
//! - Load ELF images or extract symbol tables
//! - Decode the binary event stream into event records
//! - Format output or aggregate statistics
//! - Parse descriptor files
//!
//! All of that lives in the surrounding application layers; this crate only
//! consumes their results through [`EvalContext`].
//!
//! # Example Usage
//!
//! ```
//! use trace_expr::{evaluate, EvalContext, TypedefRegistry, TypedefUsage};
//! use trace_expr::{Value, VariableTable};
//!
//! let registry = TypedefRegistry::new();
//! let usage = TypedefUsage::new();
//! let variables = VariableTable::new();
//! let ctx = EvalContext::new(&registry, &usage, &variables);
//!
//! variables.set("speed", Value::Integer(88));
//! let value = evaluate("speed > 80 ? 1 : 0", &ctx).unwrap();
//! assert_eq!(value, Value::Integer(1));
//! ```

// Public modules
pub mod builtins;
pub mod parser;
pub mod typedefs;
pub mod types;
pub mod variables;

// Re-export main types for convenience
pub use builtins::{NoSymbols, StaticSymbolTable, SymbolInfo, SymbolTable};
pub use parser::{evaluate, EvalContext};
pub use typedefs::{ByteOrder, MemberDef, TypedefDef, TypedefRegistry, TypedefUsage};
pub use types::{ElementType, EvalError, Result, Value};
pub use variables::{VarId, VariableTable};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Evaluate an expression that must produce an integer
///
/// Floating results truncate toward zero through an `(int64)` cast; anything
/// non-numeric is a type error. Trailing end-of-input (including after a
/// `//` comment) is success.
pub fn evaluate_as_int(text: &str, ctx: &EvalContext) -> Result<i64> {
    match evaluate(text, ctx)? {
        Value::Integer(v) => Ok(v),
        value @ Value::Floating(_) => value.cast(ElementType::Int64)?.as_integer("evaluateAsInt"),
        other => Err(EvalError::Type {
            op: "evaluateAsInt".to_string(),
            fragment: other.kind_name().to_string(),
        }),
    }
}

/// Evaluate an expression that must produce a 16-bit event ID
///
/// The integer result is masked to its low 16 bits through a `(uint16)`
/// cast, matching how descriptor files spell event IDs.
pub fn evaluate_as_id16(text: &str, ctx: &EvalContext) -> Result<u16> {
    let value = evaluate(text, ctx)?;
    match value {
        Value::Integer(_) => Ok(value.cast(ElementType::Uint16)?.as_integer("evaluateAsId16")? as u16),
        other => Err(EvalError::Type {
            op: "evaluateAsId16".to_string(),
            fragment: other.kind_name().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty context evaluates plain arithmetic
        let registry = TypedefRegistry::new();
        let usage = TypedefUsage::new();
        let variables = VariableTable::new();
        let ctx = EvalContext::new(&registry, &usage, &variables);
        assert_eq!(evaluate_as_int("1+1", &ctx).unwrap(), 2);
        assert_eq!(variables.len(), 0);
    }

    #[test]
    fn test_as_int_truncates_floats() {
        let registry = TypedefRegistry::new();
        let usage = TypedefUsage::new();
        let variables = VariableTable::new();
        let ctx = EvalContext::new(&registry, &usage, &variables);
        assert_eq!(evaluate_as_int("7.9", &ctx).unwrap(), 7);
        assert_eq!(evaluate_as_int("-7.9", &ctx).unwrap(), -7);
        assert!(evaluate_as_int("\"text\"", &ctx).is_err());
    }

    #[test]
    fn test_as_id16_masks_low_bits() {
        let registry = TypedefRegistry::new();
        let usage = TypedefUsage::new();
        let variables = VariableTable::new();
        let ctx = EvalContext::new(&registry, &usage, &variables);
        assert_eq!(evaluate_as_id16("0x12345", &ctx).unwrap(), 0x2345);
        assert_eq!(evaluate_as_id16("0x100 + 1 // id", &ctx).unwrap(), 0x101);
        assert!(evaluate_as_id16("1.5", &ctx).is_err());
    }
}
