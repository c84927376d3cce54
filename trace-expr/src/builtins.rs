//! Built-in diagnostic functions
//!
//! Expressions may call a small fixed set of diagnostic functions, e.g.
//! `__Symbol_exists("LEDOn")`. Each entry in the table declares its arity and
//! the required argument kind; both are hard checks, with no coercion.
//! Symbol queries delegate to the [`SymbolTable`] collaborator, which the
//! ELF/symbol loading layer implements. Register and memory-usage queries are
//! stubs that return zero until a live target is wired up.

use crate::types::{EvalError, Result, Value};
use std::collections::HashMap;

/// Address and size of one symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolInfo {
    pub address: u64,
    pub size: u64,
}

/// Symbol lookup collaborator
///
/// Implemented by the ELF symbol-table loader; the engine only ever reads.
pub trait SymbolTable {
    /// Look up a symbol by name
    fn lookup(&self, name: &str) -> Option<SymbolInfo>;
}

/// An empty symbol table, for callers without a loaded image
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

impl SymbolTable for NoSymbols {
    fn lookup(&self, _name: &str) -> Option<SymbolInfo> {
        None
    }
}

/// In-memory symbol table
///
/// The natural target for a symbol loader, and what tests and demos use.
#[derive(Debug, Clone, Default)]
pub struct StaticSymbolTable {
    symbols: HashMap<String, SymbolInfo>,
}

impl StaticSymbolTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a symbol
    pub fn add(&mut self, name: &str, address: u64, size: u64) {
        self.symbols
            .insert(name.to_string(), SymbolInfo { address, size });
    }

    /// Number of registered symbols
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// True if no symbols are registered
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolTable for StaticSymbolTable {
    fn lookup(&self, name: &str) -> Option<SymbolInfo> {
        self.symbols.get(name).copied()
    }
}

/// Required argument kind of a builtin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    /// All arguments must be strings
    Str,
    /// All arguments must be integers or floats
    Numeric,
}

/// Dispatch id of a builtin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    SymbolExists,
    OffsetOf,
    SizeOf,
    RegisterRead,
    MemoryUsage,
}

/// One entry of the builtin table
#[derive(Debug, Clone, Copy)]
pub struct BuiltinDef {
    name: &'static str,
    function: Function,
    arity: usize,
    param_kind: ParamKind,
}

/// The fixed builtin table
const BUILTINS: [BuiltinDef; 5] = [
    BuiltinDef {
        name: "__Symbol_exists",
        function: Function::SymbolExists,
        arity: 1,
        param_kind: ParamKind::Str,
    },
    BuiltinDef {
        name: "__Offset_of",
        function: Function::OffsetOf,
        arity: 1,
        param_kind: ParamKind::Str,
    },
    BuiltinDef {
        name: "__size_of",
        function: Function::SizeOf,
        arity: 1,
        param_kind: ParamKind::Str,
    },
    BuiltinDef {
        name: "__Register_read",
        function: Function::RegisterRead,
        arity: 1,
        param_kind: ParamKind::Str,
    },
    BuiltinDef {
        name: "__Memory_usage",
        function: Function::MemoryUsage,
        arity: 2,
        param_kind: ParamKind::Numeric,
    },
];

/// Look up a builtin by its call-site name
pub(crate) fn lookup(name: &str) -> Option<&'static BuiltinDef> {
    BUILTINS.iter().find(|def| def.name == name)
}

/// Validate arguments and dispatch a builtin call
///
/// `args` must be a [`Value::List`] whose entries are already
/// rvalue-resolved (no identifier wrappers left).
pub(crate) fn dispatch(
    def: &BuiltinDef,
    args: &Value,
    symbols: &dyn SymbolTable,
) -> Result<Value> {
    let Value::List(args) = args else {
        return Err(EvalError::type_error(def.name, args.kind_name()));
    };
    if args.len() != def.arity {
        return Err(EvalError::type_error(
            def.name,
            format!("expected {} arguments, got {}", def.arity, args.len()),
        ));
    }
    for arg in args {
        let ok = match def.param_kind {
            ParamKind::Str => matches!(arg, Value::Str(_)),
            ParamKind::Numeric => matches!(arg, Value::Integer(_) | Value::Floating(_)),
        };
        if !ok {
            return Err(EvalError::type_error(def.name, arg.kind_name()));
        }
    }

    match def.function {
        Function::SymbolExists => {
            let name = string_arg(&args[0]);
            let exists = symbols.lookup(name).is_some();
            Ok(Value::Integer(exists as i64))
        }
        Function::OffsetOf => {
            let name = string_arg(&args[0]);
            let address = symbols.lookup(name).map(|s| s.address).unwrap_or(0);
            Ok(Value::Integer(address as i64))
        }
        Function::SizeOf => {
            let name = string_arg(&args[0]);
            let size = symbols.lookup(name).map(|s| s.size).unwrap_or(0);
            Ok(Value::Integer(size as i64))
        }
        Function::RegisterRead => {
            // Stub: no live target attached yet
            log::debug!("__Register_read({}) on detached target", string_arg(&args[0]));
            Ok(Value::Integer(0))
        }
        Function::MemoryUsage => {
            // Stub: no live target attached yet
            log::debug!("__Memory_usage on detached target");
            Ok(Value::Integer(0))
        }
    }
}

fn string_arg(value: &Value) -> &str {
    match value {
        Value::Str(s) => s.as_str(),
        // Unreachable after the kind check above
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_symbols() -> StaticSymbolTable {
        let mut table = StaticSymbolTable::new();
        table.add("LEDOn", 0x2000_0100, 4);
        table.add("main", 0x0800_0000, 212);
        table
    }

    fn args(items: Vec<Value>) -> Value {
        Value::List(items)
    }

    #[test]
    fn test_symbol_exists() {
        let symbols = sample_symbols();
        let def = lookup("__Symbol_exists").unwrap();
        let result = dispatch(def, &args(vec![Value::Str("LEDOn".into())]), &symbols).unwrap();
        assert_eq!(result, Value::Integer(1));
        let result = dispatch(def, &args(vec![Value::Str("LEDOff".into())]), &symbols).unwrap();
        assert_eq!(result, Value::Integer(0));
    }

    #[test]
    fn test_offset_and_size_lookups() {
        let symbols = sample_symbols();
        let offset_of = lookup("__Offset_of").unwrap();
        let size_of = lookup("__size_of").unwrap();
        assert_eq!(
            dispatch(offset_of, &args(vec![Value::Str("main".into())]), &symbols).unwrap(),
            Value::Integer(0x0800_0000)
        );
        assert_eq!(
            dispatch(size_of, &args(vec![Value::Str("main".into())]), &symbols).unwrap(),
            Value::Integer(212)
        );
        // Absent symbols report zero, not an error
        assert_eq!(
            dispatch(offset_of, &args(vec![Value::Str("gone".into())]), &symbols).unwrap(),
            Value::Integer(0)
        );
    }

    #[test]
    fn test_stub_functions_return_zero() {
        let register_read = lookup("__Register_read").unwrap();
        assert_eq!(
            dispatch(register_read, &args(vec![Value::Str("r0".into())]), &NoSymbols).unwrap(),
            Value::Integer(0)
        );
        let memory_usage = lookup("__Memory_usage").unwrap();
        assert_eq!(
            dispatch(
                memory_usage,
                &args(vec![Value::Integer(0x2000_0000), Value::Integer(0x2002_0000)]),
                &NoSymbols
            )
            .unwrap(),
            Value::Integer(0)
        );
    }

    #[test]
    fn test_arity_and_kind_mismatch() {
        let def = lookup("__Symbol_exists").unwrap();
        assert!(dispatch(def, &args(vec![]), &NoSymbols).is_err());
        assert!(dispatch(def, &args(vec![Value::Integer(1)]), &NoSymbols).is_err());
        assert!(dispatch(def, &Value::Integer(1), &NoSymbols).is_err());
        let usage = lookup("__Memory_usage").unwrap();
        assert!(dispatch(
            usage,
            &args(vec![Value::Str("lo".into()), Value::Integer(1)]),
            &NoSymbols
        )
        .is_err());
        assert!(lookup("__no_such_fn").is_none());
    }
}
