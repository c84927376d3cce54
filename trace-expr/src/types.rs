//! Core value model and error types for the expression engine
//!
//! This module defines the dynamically-typed [`Value`] that flows through the
//! evaluator, the C-accurate numeric operations on it, and the error enum
//! shared by the lexer, parser and resolution layers. All arithmetic follows
//! C promotion rules: mixed Integer/Floating operands promote to Floating,
//! Integer/Integer stays Integer, and anything non-numeric is a type error.

use crate::variables::VarId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for all engine operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors produced while lexing, parsing or evaluating an expression
///
/// Every variant carries the name of the operation that failed and the
/// offending input fragment, so descriptor authors can locate the problem
/// inside their rendering expressions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("Syntax error in {op}: '{fragment}'")]
    Syntax { op: String, fragment: String },

    #[error("Range error in {op}: '{fragment}'")]
    Range { op: String, fragment: String },

    #[error("Type error in {op}: '{fragment}'")]
    Type { op: String, fragment: String },
}

impl EvalError {
    pub(crate) fn syntax(op: &str, fragment: impl Into<String>) -> Self {
        EvalError::Syntax {
            op: op.to_string(),
            fragment: fragment.into(),
        }
    }

    pub(crate) fn range(op: &str, fragment: impl Into<String>) -> Self {
        EvalError::Range {
            op: op.to_string(),
            fragment: fragment.into(),
        }
    }

    pub(crate) fn type_error(op: &str, fragment: impl Into<String>) -> Self {
        EvalError::Type {
            op: op.to_string(),
            fragment: fragment.into(),
        }
    }
}

/// Cast targets recognized by the engine
///
/// These are the element types that descriptor members declare and that
/// C-style `(typename)expr` casts accept. Integer values are carried in a
/// 64-bit signed container; casting to a narrower width truncates via two's
/// complement and then zero-extends (unsigned targets) or sign-extends
/// (signed targets) back into the container, bit-for-bit with C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    Uint8,
    Int8,
    Uint16,
    Int16,
    Uint32,
    Int32,
    Uint64,
    Int64,
    Float,
    Double,
}

impl ElementType {
    /// Look up a type by its spelling in an expression, e.g. `(uint8)x`.
    ///
    /// Matching is case-insensitive so both the descriptor spelling `Uint8`
    /// and the C-ish `uint8` are accepted.
    pub fn from_type_name(name: &str) -> Option<ElementType> {
        const TABLE: [(&str, ElementType); 10] = [
            ("uint8", ElementType::Uint8),
            ("int8", ElementType::Int8),
            ("uint16", ElementType::Uint16),
            ("int16", ElementType::Int16),
            ("uint32", ElementType::Uint32),
            ("int32", ElementType::Int32),
            ("uint64", ElementType::Uint64),
            ("int64", ElementType::Int64),
            ("float", ElementType::Float),
            ("double", ElementType::Double),
        ];
        TABLE
            .iter()
            .find(|(n, _)| name.eq_ignore_ascii_case(n))
            .map(|(_, t)| *t)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Uint8 => "uint8",
            ElementType::Int8 => "int8",
            ElementType::Uint16 => "uint16",
            ElementType::Int16 => "int16",
            ElementType::Uint32 => "uint32",
            ElementType::Int32 => "int32",
            ElementType::Uint64 => "uint64",
            ElementType::Int64 => "int64",
            ElementType::Float => "float",
            ElementType::Double => "double",
        };
        write!(f, "{}", name)
    }
}

/// The universal runtime datum of the expression engine
///
/// Every literal, identifier and intermediate result is a `Value`. Numeric
/// operators accept only `Integer`/`Floating`; `Str` and `List` exist solely
/// for builtin call arguments. An `Ident` carries the variable-table slot it
/// was bound to when the identifier was resolved (if the variable existed at
/// that moment), which is what makes it assignable.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value (e.g. result of a suppressed dead branch)
    Nothing,
    /// 64-bit integer; also the carrier for all unsigned C widths
    Integer(i64),
    /// 64-bit float; also the carrier for single-precision results
    Floating(f64),
    /// Owned string (literal or builtin argument)
    Str(String),
    /// An identifier, optionally bound to a variable-table slot
    Ident { name: String, slot: Option<VarId> },
    /// Ordered argument list for builtin calls
    List(Vec<Value>),
}

/// Numeric operand pair after C-style promotion
enum Promoted {
    Ints(i64, i64),
    Floats(f64, f64),
}

impl Value {
    /// Short tag name used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Nothing => "nothing",
            Value::Integer(_) => "integer",
            Value::Floating(_) => "floating",
            Value::Str(_) => "string",
            Value::Ident { .. } => "identifier",
            Value::List(_) => "list",
        }
    }

    /// Get the integer payload, or a type error naming `op`
    pub fn as_integer(&self, op: &str) -> Result<i64> {
        match self {
            Value::Integer(v) => Ok(*v),
            _ => Err(EvalError::type_error(op, self.kind_name())),
        }
    }

    /// Truthiness for conditions and logical operators.
    ///
    /// Only numeric values have a truth value; everything else is a type
    /// error, including an unresolved identifier.
    pub fn as_condition(&self, op: &str) -> Result<bool> {
        match self {
            Value::Integer(v) => Ok(*v != 0),
            Value::Floating(f) => Ok(*f != 0.0),
            _ => Err(EvalError::type_error(op, self.kind_name())),
        }
    }

    /// Promote a numeric operand pair per C rules
    fn promote(&self, other: &Value, op: &str) -> Result<Promoted> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(Promoted::Ints(*a, *b)),
            (Value::Integer(a), Value::Floating(b)) => Ok(Promoted::Floats(*a as f64, *b)),
            (Value::Floating(a), Value::Integer(b)) => Ok(Promoted::Floats(*a, *b as f64)),
            (Value::Floating(a), Value::Floating(b)) => Ok(Promoted::Floats(*a, *b)),
            (Value::Integer(_), b) | (Value::Floating(_), b) => {
                Err(EvalError::type_error(op, b.kind_name()))
            }
            (a, _) => Err(EvalError::type_error(op, a.kind_name())),
        }
    }

    /// Both operands must be integers (shift/bitwise/modulo family)
    fn integer_pair(&self, other: &Value, op: &str) -> Result<(i64, i64)> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok((*a, *b)),
            (Value::Integer(_), b) => Err(EvalError::type_error(op, b.kind_name())),
            (a, _) => Err(EvalError::type_error(op, a.kind_name())),
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value> {
        match self.promote(other, "add")? {
            Promoted::Ints(a, b) => Ok(Value::Integer(a.wrapping_add(b))),
            Promoted::Floats(a, b) => Ok(Value::Floating(a + b)),
        }
    }

    pub fn sub(&self, other: &Value) -> Result<Value> {
        match self.promote(other, "sub")? {
            Promoted::Ints(a, b) => Ok(Value::Integer(a.wrapping_sub(b))),
            Promoted::Floats(a, b) => Ok(Value::Floating(a - b)),
        }
    }

    pub fn mul(&self, other: &Value) -> Result<Value> {
        match self.promote(other, "mul")? {
            Promoted::Ints(a, b) => Ok(Value::Integer(a.wrapping_mul(b))),
            Promoted::Floats(a, b) => Ok(Value::Floating(a * b)),
        }
    }

    /// Division; division by integer 0 or floating 0.0 is a type error,
    /// reported as a value rather than a crash.
    pub fn div(&self, other: &Value) -> Result<Value> {
        match self.promote(other, "div")? {
            Promoted::Ints(_, 0) => Err(EvalError::type_error("div", "division by zero")),
            Promoted::Ints(a, b) => Ok(Value::Integer(a.wrapping_div(b))),
            Promoted::Floats(_, b) if b == 0.0 => {
                Err(EvalError::type_error("div", "division by zero"))
            }
            Promoted::Floats(a, b) => Ok(Value::Floating(a / b)),
        }
    }

    /// Modulo; integers only, and the divisor must be non-zero.
    pub fn rem(&self, other: &Value) -> Result<Value> {
        let (a, b) = self.integer_pair(other, "mod")?;
        if b == 0 {
            return Err(EvalError::type_error("mod", "division by zero"));
        }
        Ok(Value::Integer(a.wrapping_rem(b)))
    }

    /// Left shift. Counts of 64 or more follow the host's native 64-bit
    /// behavior: the hardware masks the count to 0..63, so `1 << 64 == 1`.
    /// This is documented legacy behavior, not masked away.
    pub fn shl(&self, other: &Value) -> Result<Value> {
        let (a, b) = self.integer_pair(other, "shl")?;
        Ok(Value::Integer(a.wrapping_shl(b as u32)))
    }

    /// Right shift (arithmetic, since the carrier is signed). Same native
    /// count-masking behavior as [`Value::shl`].
    pub fn shr(&self, other: &Value) -> Result<Value> {
        let (a, b) = self.integer_pair(other, "shr")?;
        Ok(Value::Integer(a.wrapping_shr(b as u32)))
    }

    pub fn bit_and(&self, other: &Value) -> Result<Value> {
        let (a, b) = self.integer_pair(other, "and")?;
        Ok(Value::Integer(a & b))
    }

    pub fn bit_or(&self, other: &Value) -> Result<Value> {
        let (a, b) = self.integer_pair(other, "or")?;
        Ok(Value::Integer(a | b))
    }

    pub fn bit_xor(&self, other: &Value) -> Result<Value> {
        let (a, b) = self.integer_pair(other, "xor")?;
        Ok(Value::Integer(a ^ b))
    }

    /// Comparison operators always yield integer 0 or 1, even for floating
    /// inputs.
    pub fn less(&self, other: &Value) -> Result<Value> {
        let r = match self.promote(other, "less")? {
            Promoted::Ints(a, b) => a < b,
            Promoted::Floats(a, b) => a < b,
        };
        Ok(Value::Integer(r as i64))
    }

    pub fn less_equal(&self, other: &Value) -> Result<Value> {
        let r = match self.promote(other, "lessEqual")? {
            Promoted::Ints(a, b) => a <= b,
            Promoted::Floats(a, b) => a <= b,
        };
        Ok(Value::Integer(r as i64))
    }

    pub fn greater(&self, other: &Value) -> Result<Value> {
        let r = match self.promote(other, "greater")? {
            Promoted::Ints(a, b) => a > b,
            Promoted::Floats(a, b) => a > b,
        };
        Ok(Value::Integer(r as i64))
    }

    pub fn greater_equal(&self, other: &Value) -> Result<Value> {
        let r = match self.promote(other, "greaterEqual")? {
            Promoted::Ints(a, b) => a >= b,
            Promoted::Floats(a, b) => a >= b,
        };
        Ok(Value::Integer(r as i64))
    }

    pub fn equal(&self, other: &Value) -> Result<Value> {
        let r = match self.promote(other, "equal")? {
            Promoted::Ints(a, b) => a == b,
            Promoted::Floats(a, b) => a == b,
        };
        Ok(Value::Integer(r as i64))
    }

    pub fn not_equal(&self, other: &Value) -> Result<Value> {
        let r = match self.promote(other, "notEqual")? {
            Promoted::Ints(a, b) => a != b,
            Promoted::Floats(a, b) => a != b,
        };
        Ok(Value::Integer(r as i64))
    }

    /// Logical AND over numeric truthiness; both operands are evaluated.
    pub fn log_and(&self, other: &Value) -> Result<Value> {
        let a = self.as_condition("logAnd")?;
        let b = other.as_condition("logAnd")?;
        Ok(Value::Integer((a && b) as i64))
    }

    /// Logical OR over numeric truthiness; both operands are evaluated.
    pub fn log_or(&self, other: &Value) -> Result<Value> {
        let a = self.as_condition("logOr")?;
        let b = other.as_condition("logOr")?;
        Ok(Value::Integer((a || b) as i64))
    }

    pub fn neg(&self) -> Result<Value> {
        match self {
            Value::Integer(v) => Ok(Value::Integer(v.wrapping_neg())),
            Value::Floating(f) => Ok(Value::Floating(-f)),
            other => Err(EvalError::type_error("neg", other.kind_name())),
        }
    }

    /// Unary plus: a type check only, the value passes through unchanged.
    pub fn plus(&self) -> Result<Value> {
        match self {
            Value::Integer(_) | Value::Floating(_) => Ok(self.clone()),
            other => Err(EvalError::type_error("plus", other.kind_name())),
        }
    }

    /// Bitwise complement; integers only.
    pub fn complement(&self) -> Result<Value> {
        match self {
            Value::Integer(v) => Ok(Value::Integer(!v)),
            other => Err(EvalError::type_error("complement", other.kind_name())),
        }
    }

    pub fn logical_not(&self) -> Result<Value> {
        let truth = self.as_condition("logicalNot")?;
        Ok(Value::Integer((!truth) as i64))
    }

    /// Increment the numeric payload in place; numeric values only.
    pub fn increment(&mut self) -> Result<()> {
        match self {
            Value::Integer(v) => {
                *v = v.wrapping_add(1);
                Ok(())
            }
            Value::Floating(f) => {
                *f += 1.0;
                Ok(())
            }
            other => Err(EvalError::type_error("increment", other.kind_name())),
        }
    }

    /// Decrement the numeric payload in place; numeric values only.
    pub fn decrement(&mut self) -> Result<()> {
        match self {
            Value::Integer(v) => {
                *v = v.wrapping_sub(1);
                Ok(())
            }
            Value::Floating(f) => {
                *f -= 1.0;
                Ok(())
            }
            other => Err(EvalError::type_error("decrement", other.kind_name())),
        }
    }

    /// Cast to one of the C element types.
    ///
    /// Integer sources truncate/extend bit-for-bit with C. Floating sources
    /// truncate toward zero and saturate at the target's representable range
    /// (Rust `as` semantics; NaN becomes 0). Note the top-of-range edge for
    /// `(uint64)`: any floating value at or above 2^64 saturates to
    /// `u64::MAX`, which reads back as integer -1 in the signed carrier.
    /// Integer-to-`float` narrows through an f32 round-trip, losing precision
    /// exactly as a 32-bit float would.
    pub fn cast(&self, target: ElementType) -> Result<Value> {
        match self {
            Value::Integer(v) => Ok(match target {
                ElementType::Uint8 => Value::Integer((*v as u8) as i64),
                ElementType::Int8 => Value::Integer((*v as i8) as i64),
                ElementType::Uint16 => Value::Integer((*v as u16) as i64),
                ElementType::Int16 => Value::Integer((*v as i16) as i64),
                ElementType::Uint32 => Value::Integer((*v as u32) as i64),
                ElementType::Int32 => Value::Integer((*v as i32) as i64),
                ElementType::Uint64 => Value::Integer((*v as u64) as i64),
                ElementType::Int64 => Value::Integer(*v),
                ElementType::Float => Value::Floating((*v as f32) as f64),
                ElementType::Double => Value::Floating(*v as f64),
            }),
            Value::Floating(f) => Ok(match target {
                ElementType::Uint8 => Value::Integer((*f as u8) as i64),
                ElementType::Int8 => Value::Integer((*f as i8) as i64),
                ElementType::Uint16 => Value::Integer((*f as u16) as i64),
                ElementType::Int16 => Value::Integer((*f as i16) as i64),
                ElementType::Uint32 => Value::Integer((*f as u32) as i64),
                ElementType::Int32 => Value::Integer((*f as i32) as i64),
                ElementType::Uint64 => Value::Integer((*f as u64) as i64),
                ElementType::Int64 => Value::Integer(*f as i64),
                ElementType::Float => Value::Floating((*f as f32) as f64),
                ElementType::Double => Value::Floating(*f),
            }),
            other => Err(EvalError::type_error("cast", other.kind_name())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nothing => write!(f, "(nothing)"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Floating(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Ident { name, .. } => write!(f, "{}", name),
            Value::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}
