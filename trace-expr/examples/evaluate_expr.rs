//! Standalone expression evaluation tool
//!
//! Evaluates descriptor-style rendering expressions against a small built-in
//! demo context (a typedef, a payload variable, and a few symbols), or
//! evaluates expressions passed on the command line.
//!
//! Usage:
//!   evaluate_expr [expression ...]
//!
//! Example:
//!   evaluate_expr "payload.flags" "(uint8)(status << 4) | 0x0F"

use std::collections::HashMap;
use std::env;

use anyhow::Result;
use trace_expr::{
    evaluate, ByteOrder, ElementType, EvalContext, MemberDef, StaticSymbolTable, TypedefDef,
    TypedefRegistry, TypedefUsage, Value, VariableTable,
};

/// Demo typedef: a 4-byte little-endian event payload with two members
fn demo_registry() -> TypedefRegistry {
    let mut members = HashMap::new();
    members.insert(
        "flags".to_string(),
        MemberDef {
            offset: "0".to_string(),
            element_type: ElementType::Uint8,
            value_table: None,
        },
    );
    let mut mode_labels = HashMap::new();
    mode_labels.insert(0, "Idle".to_string());
    mode_labels.insert(1, "Running".to_string());
    mode_labels.insert(2, "Fault".to_string());
    members.insert(
        "mode".to_string(),
        MemberDef {
            offset: "1".to_string(),
            element_type: ElementType::Uint8,
            value_table: Some(mode_labels),
        },
    );

    let mut registry = TypedefRegistry::new();
    registry.add(TypedefDef {
        name: "EventPayload".to_string(),
        size: 4,
        byte_order: ByteOrder::LittleEndian,
        members,
    });
    registry
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();

    // Build the demo context
    let registry = demo_registry();
    let mut usage = TypedefUsage::new();
    usage.insert("payload".to_string(), "EventPayload".to_string());

    let variables = VariableTable::new();
    variables.set("payload", Value::Integer(0x02AF));
    variables.set("status", Value::Integer(3));

    let mut symbols = StaticSymbolTable::new();
    symbols.add("LEDOn", 0x0800_1234, 4);
    symbols.add("main", 0x0800_0000, 212);

    let ctx = EvalContext::new(&registry, &usage, &variables).with_symbols(&symbols);

    let expressions: Vec<String> = if args.is_empty() {
        // No arguments: walk through a demo set
        [
            "1 + 2 * 3",
            "payload.flags",
            "payload.mode",
            "EventPayload:mode:Fault",
            "__Symbol_exists(\"LEDOn\")",
            "__Offset_of(\"main\")",
            "(uint8)(status << 6)",
            "status > 2 ? \"high\" : \"low\"",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    } else {
        args
    };

    println!("=== Trace Expression Evaluator ===");
    println!("Variables: payload=0x02AF, status=3");
    println!("Typedef:   EventPayload (4 bytes, little-endian)");
    println!("Symbols:   LEDOn, main");
    println!();

    for text in &expressions {
        match evaluate(text, &ctx) {
            Ok(value) => println!("{:40} => {}", text, value),
            Err(e) => println!("{:40} => error: {}", text, e),
        }
    }

    Ok(())
}
