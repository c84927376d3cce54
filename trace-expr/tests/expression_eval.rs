//! End-to-end evaluation tests
//!
//! Exercises the public API the way the descriptor-driven caller does:
//! build a context from a typedef registry, usage map, variable table and
//! symbol table, then evaluate rendering expressions against it.

use std::collections::HashMap;

use trace_expr::{
    evaluate, evaluate_as_id16, evaluate_as_int, ByteOrder, ElementType, EvalContext, EvalError,
    MemberDef, StaticSymbolTable, TypedefDef, TypedefRegistry, TypedefUsage, Value, VariableTable,
};

/// Everything a test needs to build an [`EvalContext`]
struct Session {
    registry: TypedefRegistry,
    usage: TypedefUsage,
    variables: VariableTable,
    symbols: StaticSymbolTable,
}

impl Session {
    fn new() -> Self {
        Self {
            registry: TypedefRegistry::new(),
            usage: TypedefUsage::new(),
            variables: VariableTable::new(),
            symbols: StaticSymbolTable::new(),
        }
    }

    fn eval(&self, text: &str) -> trace_expr::Result<Value> {
        let ctx = EvalContext::new(&self.registry, &self.usage, &self.variables)
            .with_symbols(&self.symbols);
        evaluate(text, &ctx)
    }

    fn eval_int(&self, text: &str) -> trace_expr::Result<i64> {
        let ctx = EvalContext::new(&self.registry, &self.usage, &self.variables)
            .with_symbols(&self.symbols);
        evaluate_as_int(text, &ctx)
    }
}

#[test]
fn integer_literals_round_trip_in_all_radixes() {
    let session = Session::new();
    for value in [0u64, 1, 7, 8, 255, 4096, u64::MAX / 2, u64::MAX] {
        let decimal = format!("{}", value);
        let hex = format!("0x{:X}", value);
        let octal = format!("0{:o}", value);
        for text in [decimal, hex, octal] {
            let result = session.eval_int(&text).unwrap();
            assert_eq!(result as u64, value, "literal {}", text);
        }
    }
}

#[test]
fn integer_literal_one_past_u64_max_is_range_error() {
    let session = Session::new();
    // 0xFFFFFFFFFFFFFFFF is the last representable literal
    assert_eq!(
        session.eval_int("0xFFFFFFFFFFFFFFFF").unwrap() as u64,
        u64::MAX
    );
    assert!(matches!(
        session.eval("0x10000000000000000"),
        Err(EvalError::Range { .. })
    ));
    assert!(matches!(
        session.eval("18446744073709551616"),
        Err(EvalError::Range { .. })
    ));
}

#[test]
fn cast_round_trips_differ_between_uint8_and_int8() {
    let session = Session::new();
    for x in [-1i64, 0, 255, 256, -123] {
        session.variables.set("x", Value::Integer(x));

        // Through uint8: zero-extension of the low byte
        let through_unsigned = session.eval_int("(int64)(uint8)x").unwrap();
        assert_eq!(through_unsigned, x & 0xFF, "uint8 path for {}", x);

        // Through int8: the same low byte, sign-extended
        let through_signed = session.eval_int("(int64)(int8)x").unwrap();
        assert_eq!(through_signed, (x as i8) as i64, "int8 path for {}", x);
    }
}

#[test]
fn basic_arithmetic_and_promotion() {
    let session = Session::new();
    assert_eq!(session.eval("1+1").unwrap(), Value::Integer(2));
    assert_eq!(session.eval("1+0.23").unwrap(), Value::Floating(1.23));
    assert!(matches!(session.eval("1+"), Err(EvalError::Syntax { .. })));
    assert!(matches!(session.eval(""), Err(EvalError::Syntax { .. })));
}

#[test]
fn assignment_operators_read_modify_write() {
    let session = Session::new();
    session.variables.set("v", Value::Integer(345));

    assert_eq!(session.eval("v <<= 7").unwrap(), Value::Integer(44160));
    let slot = session.variables.get("v").unwrap();
    assert_eq!(session.variables.value_of(slot), Some(Value::Integer(44160)));

    // Division by zero aborts the assignment and preserves the variable
    assert!(session.eval("v /= 0").is_err());
    let slot = session.variables.get("v").unwrap();
    assert_eq!(session.variables.value_of(slot), Some(Value::Integer(44160)));
}

#[test]
fn conditional_operator() {
    let session = Session::new();
    assert_eq!(session.eval("1?2:3").unwrap(), Value::Integer(2));
    assert_eq!(session.eval("0?2:3").unwrap(), Value::Integer(3));
    assert!(matches!(
        session.eval("\"cond\"?2:3"),
        Err(EvalError::Type { .. })
    ));
}

#[test]
fn member_extraction_from_payload_window() {
    let mut session = Session::new();

    let mut members = HashMap::new();
    members.insert(
        "b".to_string(),
        MemberDef {
            offset: "2".to_string(),
            element_type: ElementType::Uint8,
            value_table: None,
        },
    );
    session.registry.add(TypedefDef {
        name: "EventPayload".to_string(),
        size: 4,
        byte_order: ByteOrder::LittleEndian,
        members,
    });
    session
        .usage
        .insert("payload".to_string(), "EventPayload".to_string());

    // The payload identifier holds the raw event word; only the typedef's
    // 4-byte window participates, and member b reads byte 2 of it
    session.variables.set(
        "payload",
        Value::Integer(0x1234_5678_90AB_CDEFu64 as i64),
    );
    assert_eq!(session.eval("payload.b").unwrap(), Value::Integer(0xAB));
}

#[test]
fn symbol_builtins_consult_the_symbol_table() {
    let mut session = Session::new();
    session.symbols.add("LEDOn", 0x0800_1234, 4);

    assert_eq!(
        session.eval("__Symbol_exists(\"LEDOn\")").unwrap(),
        Value::Integer(1)
    );
    assert_eq!(
        session.eval("__Symbol_exists(\"LEDOff\")").unwrap(),
        Value::Integer(0)
    );
    assert_eq!(
        session.eval("__Offset_of(\"LEDOn\")").unwrap(),
        Value::Integer(0x0800_1234)
    );
    assert_eq!(
        session.eval("__size_of(\"LEDOn\")").unwrap(),
        Value::Integer(4)
    );
    assert_eq!(
        session.eval("__Offset_of(\"LEDOff\")").unwrap(),
        Value::Integer(0)
    );
}

#[test]
fn comment_reports_clean_end_of_input() {
    let session = Session::new();
    assert_eq!(session.eval("1+1//rest").unwrap(), session.eval("1+1").unwrap());
    // The comment swallows everything, including unbalanced tokens
    assert_eq!(session.eval("5 // ) ] \"unterminated").unwrap(), Value::Integer(5));
}

#[test]
fn id16_wrapper_masks_to_event_id_width() {
    let session = Session::new();
    let ctx = EvalContext::new(&session.registry, &session.usage, &session.variables);
    assert_eq!(evaluate_as_id16("0xABCD", &ctx).unwrap(), 0xABCD);
    assert_eq!(evaluate_as_id16("0x1ABCD", &ctx).unwrap(), 0xABCD);
    assert_eq!(evaluate_as_id16("2+3 // event id", &ctx).unwrap(), 5);
}

#[test]
fn typedef_registry_loads_from_json_fixture() {
    // Stands in for the out-of-scope descriptor loader: registries are plain
    // serde data
    let json = r#"{
        "typedefs": {
            "Ctrl": {
                "name": "Ctrl",
                "size": 4,
                "byte_order": "BigEndian",
                "members": {
                    "mode": {
                        "offset": "1",
                        "element_type": "Uint8",
                        "value_table": { "0": "Idle", "2": "Armed" }
                    }
                }
            }
        }
    }"#;
    let registry: TypedefRegistry = serde_json::from_str(json).unwrap();
    assert_eq!(registry.len(), 1);

    let mut session = Session::new();
    session.registry = registry;
    assert_eq!(session.eval("Ctrl:mode:Armed").unwrap(), Value::Integer(2));
    assert_eq!(session.eval("Ctrl:mode").unwrap(), Value::Integer(1));

    // Round-trip: what we serialize parses back to the same registry shape
    let serialized = serde_json::to_string(&session.registry).unwrap();
    let reparsed: TypedefRegistry = serde_json::from_str(&serialized).unwrap();
    assert!(reparsed.contains("Ctrl"));
}

#[test]
fn computed_member_offsets_evaluate_through_the_engine() {
    let mut session = Session::new();

    let mut members = HashMap::new();
    members.insert(
        "status".to_string(),
        MemberDef {
            // Offsets are expressions; this one reads a variable
            offset: "base_off + 1".to_string(),
            element_type: ElementType::Uint8,
            value_table: None,
        },
    );
    session.registry.add(TypedefDef {
        name: "Frame".to_string(),
        size: 8,
        byte_order: ByteOrder::LittleEndian,
        members,
    });
    session.usage.insert("word".to_string(), "Frame".to_string());
    session.variables.set("base_off", Value::Integer(2));
    session
        .variables
        .set("word", Value::Integer(0x1122_3344_5566_7788u64 as i64));

    // Offset 3 of the little-endian window is byte 0x55
    assert_eq!(session.eval("word.status").unwrap(), Value::Integer(0x55));
}

#[test]
fn variable_store_semantics_across_evaluations() {
    let session = Session::new();

    // First assignment creates; plain reads see the latest store
    session.eval("counter = 1").unwrap();
    session.eval("counter = counter + 10").unwrap();
    assert_eq!(session.eval_int("counter").unwrap(), 11);

    // A handle taken before a store keeps the old value
    let stale = session.variables.get("counter").unwrap();
    session.eval("counter = 99").unwrap();
    assert_eq!(session.variables.value_of(stale), Some(Value::Integer(11)));

    session.variables.clear_all();
    assert!(session.eval("counter").is_err());
}
