//! Expression parser and evaluator
//!
//! A one-token-lookahead recursive-descent parser that evaluates while it
//! parses, mirroring the C operator precedence ladder from the comma operator
//! down to postfix expressions. There is no AST: each grammar level consumes
//! its operators and folds values as it goes, consulting the variable table
//! for identifiers, the typedef registry for member syntax, and the builtin
//! table for function calls.
//!
//! The ternary operator evaluates only the selected branch. The unselected
//! branch is still parsed, with semantic actions suppressed, so its syntax is
//! checked but no assignment, builtin call or lookup takes effect.

pub mod lexer;

use crate::builtins::{self, NoSymbols, SymbolTable};
use crate::typedefs::{TypedefRegistry, TypedefUsage};
use crate::types::{ElementType, EvalError, Result, Value};
use crate::variables::VariableTable;
use lexer::{Lexer, Op, Token};

/// Everything one evaluation needs to resolve names
///
/// Callers build one context per logical session (or per call) from their
/// descriptor registry, usage map, variable table and symbol table, and pass
/// it to [`evaluate`](crate::evaluate). Symbols default to an empty table.
pub struct EvalContext<'a> {
    pub registry: &'a TypedefRegistry,
    pub usage: &'a TypedefUsage,
    pub variables: &'a VariableTable,
    pub symbols: &'a dyn SymbolTable,
}

impl<'a> EvalContext<'a> {
    /// Create a context with no symbol table attached
    pub fn new(
        registry: &'a TypedefRegistry,
        usage: &'a TypedefUsage,
        variables: &'a VariableTable,
    ) -> Self {
        Self {
            registry,
            usage,
            variables,
            symbols: &NoSymbols,
        }
    }

    /// Attach a symbol table for the `__Symbol_exists` builtin family
    pub fn with_symbols(mut self, symbols: &'a dyn SymbolTable) -> Self {
        self.symbols = symbols;
        self
    }
}

/// Saved parse position for trial-and-backtrack
///
/// The only ambiguity in the grammar is `(` opening either a cast or a
/// parenthesized sub-expression; [`Parser::cast`] saves a snapshot, tries the
/// cast reading, and restores on mismatch.
struct Snapshot {
    pos: usize,
    next: Token,
}

/// Parse/evaluate state for one expression string
struct Parser<'a> {
    lexer: Lexer<'a>,
    /// One token of lookahead
    next: Token,
    ctx: &'a EvalContext<'a>,
    /// Non-zero while parsing an unselected ternary branch: grammar is
    /// checked but semantic actions are suppressed
    suppressed: u32,
}

/// Evaluate an expression to a single value
///
/// The result has any identifier binding resolved away; an expression whose
/// final value is an identifier that was never assigned is a type error.
pub fn evaluate(text: &str, ctx: &EvalContext) -> Result<Value> {
    log::debug!("evaluating expression: {}", text);
    let mut parser = Parser::new(text, ctx)?;
    let value = parser.expression()?;
    parser.expect_end()?;
    parser.rvalue(value)
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, ctx: &'a EvalContext<'a>) -> Result<Self> {
        let mut lexer = Lexer::new(text);
        let next = lexer.next_token()?;
        Ok(Self {
            lexer,
            next,
            ctx,
            suppressed: 0,
        })
    }

    /// Advance the lookahead, propagating lexer errors unchanged
    fn advance(&mut self) -> Result<()> {
        self.next = self.lexer.next_token()?;
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            pos: self.lexer.pos(),
            next: self.next.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.lexer.set_pos(snapshot.pos);
        self.next = snapshot.next;
    }

    /// Consume an expected operator or raise a syntax error naming it
    fn expect(&mut self, op: Op) -> Result<()> {
        if self.next == Token::Operator(op) {
            self.advance()
        } else {
            Err(EvalError::syntax(op.spelling(), self.describe_next()))
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        if self.next == Token::End {
            Ok(())
        } else {
            Err(EvalError::syntax("expression", self.describe_next()))
        }
    }

    fn describe_next(&self) -> String {
        match &self.next {
            Token::Operand(v) => v.to_string(),
            Token::Operator(op) => op.spelling().to_string(),
            Token::End => "end of input".to_string(),
        }
    }

    fn dead(&self) -> bool {
        self.suppressed > 0
    }

    /// Run `f` with semantic actions suppressed when `suppress` is set
    fn with_suppressed<T>(
        &mut self,
        suppress: bool,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if suppress {
            self.suppressed += 1;
        }
        let result = f(self);
        if suppress {
            self.suppressed -= 1;
        }
        result
    }

    /// Resolve an identifier to its bound value; pass anything else through
    fn rvalue(&self, value: Value) -> Result<Value> {
        match value {
            Value::Ident { name, slot } => slot
                .and_then(|id| self.ctx.variables.value_of(id))
                .ok_or_else(|| EvalError::type_error("identifier", name)),
            other => Ok(other),
        }
    }

    // ----- grammar, lowest precedence first -----

    /// Comma/semicolon expression list; the result is the FIRST value,
    /// later entries are evaluated and discarded
    fn expression(&mut self) -> Result<Value> {
        let first = self.assignment()?;
        while matches!(
            self.next,
            Token::Operator(Op::Comma) | Token::Operator(Op::Semicolon)
        ) {
            self.advance()?;
            self.assignment()?;
        }
        Ok(first)
    }

    /// Right-associative assignment; the left side must be an identifier
    fn assignment(&mut self) -> Result<Value> {
        let lhs = self.conditional()?;
        let op = match self.next {
            Token::Operator(op @ Op::Assign)
            | Token::Operator(op @ Op::AddAssign)
            | Token::Operator(op @ Op::SubAssign)
            | Token::Operator(op @ Op::MulAssign)
            | Token::Operator(op @ Op::DivAssign)
            | Token::Operator(op @ Op::ModAssign)
            | Token::Operator(op @ Op::AndAssign)
            | Token::Operator(op @ Op::OrAssign)
            | Token::Operator(op @ Op::XorAssign)
            | Token::Operator(op @ Op::ShlAssign)
            | Token::Operator(op @ Op::ShrAssign) => op,
            _ => return Ok(lhs),
        };
        self.advance()?;
        let rhs = self.assignment()?;

        if self.dead() {
            return Ok(Value::Nothing);
        }

        let Value::Ident { name, .. } = &lhs else {
            return Err(EvalError::type_error("assign", lhs.kind_name()));
        };
        let rhs = self.rvalue(rhs)?;

        let stored = if op == Op::Assign {
            rhs
        } else {
            // Compound forms read-modify-write through the variable table;
            // the read fails if the variable was never assigned
            let current = self.rvalue(lhs.clone())?;
            match op {
                Op::AddAssign => current.add(&rhs)?,
                Op::SubAssign => current.sub(&rhs)?,
                Op::MulAssign => current.mul(&rhs)?,
                Op::DivAssign => current.div(&rhs)?,
                Op::ModAssign => current.rem(&rhs)?,
                Op::AndAssign => current.bit_and(&rhs)?,
                Op::OrAssign => current.bit_or(&rhs)?,
                Op::XorAssign => current.bit_xor(&rhs)?,
                Op::ShlAssign => current.shl(&rhs)?,
                Op::ShrAssign => current.shr(&rhs)?,
                _ => unreachable!("assignment operator set"),
            }
        };
        self.ctx.variables.set(name, stored.clone());
        Ok(stored)
    }

    /// Ternary conditional; only the selected branch takes effect
    fn conditional(&mut self) -> Result<Value> {
        let cond = self.logical_or()?;
        if self.next != Token::Operator(Op::Question) {
            return Ok(cond);
        }
        self.advance()?;

        let truth = if self.dead() {
            false
        } else {
            self.rvalue(cond)?.as_condition("conditional")?
        };

        let on_true = self.with_suppressed(!truth, |p| p.expression())?;
        self.expect(Op::Colon)?;
        let on_false = self.with_suppressed(truth, |p| p.conditional())?;

        if self.dead() {
            return Ok(Value::Nothing);
        }
        Ok(if truth { on_true } else { on_false })
    }

    fn logical_or(&mut self) -> Result<Value> {
        let mut lhs = self.logical_and()?;
        while self.next == Token::Operator(Op::LogOr) {
            self.advance()?;
            let rhs = self.logical_and()?;
            lhs = self.apply_binary(Op::LogOr, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn logical_and(&mut self) -> Result<Value> {
        let mut lhs = self.bit_or()?;
        while self.next == Token::Operator(Op::LogAnd) {
            self.advance()?;
            let rhs = self.bit_or()?;
            lhs = self.apply_binary(Op::LogAnd, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn bit_or(&mut self) -> Result<Value> {
        let mut lhs = self.bit_xor()?;
        while self.next == Token::Operator(Op::Pipe) {
            self.advance()?;
            let rhs = self.bit_xor()?;
            lhs = self.apply_binary(Op::Pipe, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn bit_xor(&mut self) -> Result<Value> {
        let mut lhs = self.bit_and()?;
        while self.next == Token::Operator(Op::Caret) {
            self.advance()?;
            let rhs = self.bit_and()?;
            lhs = self.apply_binary(Op::Caret, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn bit_and(&mut self) -> Result<Value> {
        let mut lhs = self.equality()?;
        while self.next == Token::Operator(Op::Amp) {
            self.advance()?;
            let rhs = self.equality()?;
            lhs = self.apply_binary(Op::Amp, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Value> {
        let mut lhs = self.relational()?;
        loop {
            let op = match self.next {
                Token::Operator(op @ Op::Equal) | Token::Operator(op @ Op::NotEqual) => op,
                _ => break,
            };
            self.advance()?;
            let rhs = self.relational()?;
            lhs = self.apply_binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn relational(&mut self) -> Result<Value> {
        let mut lhs = self.shift()?;
        loop {
            let op = match self.next {
                Token::Operator(op @ Op::Less)
                | Token::Operator(op @ Op::LessEqual)
                | Token::Operator(op @ Op::Greater)
                | Token::Operator(op @ Op::GreaterEqual) => op,
                _ => break,
            };
            self.advance()?;
            let rhs = self.shift()?;
            lhs = self.apply_binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn shift(&mut self) -> Result<Value> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.next {
                Token::Operator(op @ Op::Shl) | Token::Operator(op @ Op::Shr) => op,
                _ => break,
            };
            self.advance()?;
            let rhs = self.additive()?;
            lhs = self.apply_binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Value> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.next {
                Token::Operator(op @ Op::Plus) | Token::Operator(op @ Op::Minus) => op,
                _ => break,
            };
            self.advance()?;
            let rhs = self.multiplicative()?;
            lhs = self.apply_binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn multiplicative(&mut self) -> Result<Value> {
        let mut lhs = self.cast()?;
        loop {
            let op = match self.next {
                Token::Operator(op @ Op::Star)
                | Token::Operator(op @ Op::Slash)
                | Token::Operator(op @ Op::Percent) => op,
                _ => break,
            };
            self.advance()?;
            let rhs = self.cast()?;
            lhs = self.apply_binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    /// Fold one binary operator, unless inside an unselected branch
    fn apply_binary(&mut self, op: Op, lhs: Value, rhs: Value) -> Result<Value> {
        if self.dead() {
            return Ok(Value::Nothing);
        }
        let a = self.rvalue(lhs)?;
        let b = self.rvalue(rhs)?;
        match op {
            Op::Plus => a.add(&b),
            Op::Minus => a.sub(&b),
            Op::Star => a.mul(&b),
            Op::Slash => a.div(&b),
            Op::Percent => a.rem(&b),
            Op::Shl => a.shl(&b),
            Op::Shr => a.shr(&b),
            Op::Amp => a.bit_and(&b),
            Op::Pipe => a.bit_or(&b),
            Op::Caret => a.bit_xor(&b),
            Op::Less => a.less(&b),
            Op::LessEqual => a.less_equal(&b),
            Op::Greater => a.greater(&b),
            Op::GreaterEqual => a.greater_equal(&b),
            Op::Equal => a.equal(&b),
            Op::NotEqual => a.not_equal(&b),
            Op::LogAnd => a.log_and(&b),
            Op::LogOr => a.log_or(&b),
            other => unreachable!("not a binary operator: {}", other),
        }
    }

    /// C-style cast, or fall through to unary
    ///
    /// `(` is ambiguous: `(uint8)x` is a cast, `(a+b)` is grouping. The cast
    /// reading is tried first from a saved snapshot and rolled back when the
    /// parenthesized token is not a type name.
    fn cast(&mut self) -> Result<Value> {
        if self.next != Token::Operator(Op::LParen) {
            return self.unary();
        }
        let saved = self.snapshot();
        self.advance()?;

        let target = match &self.next {
            Token::Operand(Value::Ident { name, .. }) => ElementType::from_type_name(name),
            _ => None,
        };
        let Some(target) = target else {
            self.restore(saved);
            return self.unary();
        };
        self.advance()?;
        if self.next != Token::Operator(Op::RParen) {
            self.restore(saved);
            return self.unary();
        }
        self.advance()?;

        let operand = self.cast()?;
        if self.dead() {
            return Ok(Value::Nothing);
        }
        self.rvalue(operand)?.cast(target)
    }

    /// Prefix `+ - ~ !`; operands sit at cast level, as in C
    fn unary(&mut self) -> Result<Value> {
        let op = match self.next {
            Token::Operator(op @ Op::Plus)
            | Token::Operator(op @ Op::Minus)
            | Token::Operator(op @ Op::Tilde)
            | Token::Operator(op @ Op::Bang) => op,
            _ => return self.postfix(),
        };
        self.advance()?;
        let operand = self.cast()?;
        if self.dead() {
            return Ok(Value::Nothing);
        }
        let value = self.rvalue(operand)?;
        match op {
            Op::Plus => value.plus(),
            Op::Minus => value.neg(),
            Op::Tilde => value.complement(),
            Op::Bang => value.logical_not(),
            _ => unreachable!("unary operator set"),
        }
    }

    /// Postfix `++ -- () [] . ->` chains
    fn postfix(&mut self) -> Result<Value> {
        let mut value = self.primary()?;
        loop {
            match self.next {
                Token::Operator(op @ Op::Increment) | Token::Operator(op @ Op::Decrement) => {
                    self.advance()?;
                    value = self.postfix_step(op, value)?;
                }
                Token::Operator(Op::LParen) => {
                    self.advance()?;
                    value = self.call(value)?;
                }
                Token::Operator(Op::LBracket) => {
                    self.advance()?;
                    let index = self.expression()?;
                    self.expect(Op::RBracket)?;
                    value = self.index(value, index)?;
                }
                Token::Operator(op @ Op::Dot) | Token::Operator(op @ Op::Arrow) => {
                    self.advance()?;
                    let Token::Operand(Value::Ident {
                        name: member_name, ..
                    }) = self.next.clone()
                    else {
                        return Err(EvalError::syntax(op.spelling(), self.describe_next()));
                    };
                    self.advance()?;
                    value = self.member_access(value, &member_name)?;
                }
                _ => return Ok(value),
            }
        }
    }

    /// Postfix increment/decrement: read-modify-write through the variable
    /// table, yielding the pre-mutation value
    fn postfix_step(&mut self, op: Op, value: Value) -> Result<Value> {
        if self.dead() {
            return Ok(Value::Nothing);
        }
        let Value::Ident { ref name, slot } = value else {
            return Err(EvalError::type_error(op.spelling(), value.kind_name()));
        };
        let current = slot
            .and_then(|id| self.ctx.variables.value_of(id))
            .ok_or_else(|| EvalError::type_error(op.spelling(), name.clone()))?;
        let mut updated = current.clone();
        if op == Op::Increment {
            updated.increment()?;
        } else {
            updated.decrement()?;
        }
        self.ctx.variables.set(name, updated);
        Ok(current)
    }

    /// Call syntax after an identifier. Registered builtins dispatch with
    /// hard arity/kind checks; any other callee is consumed as a no-op for
    /// compatibility with legacy descriptors.
    fn call(&mut self, callee: Value) -> Result<Value> {
        let mut args = Vec::new();
        if self.next != Token::Operator(Op::RParen) {
            loop {
                args.push(self.assignment()?);
                if self.next != Token::Operator(Op::Comma) {
                    break;
                }
                self.advance()?;
            }
        }
        self.expect(Op::RParen)?;

        if self.dead() {
            return Ok(Value::Nothing);
        }

        if let Value::Ident { ref name, .. } = callee {
            if let Some(def) = builtins::lookup(name) {
                let resolved = args
                    .into_iter()
                    .map(|arg| self.rvalue(arg))
                    .collect::<Result<Vec<_>>>()?;
                return builtins::dispatch(def, &Value::List(resolved), self.ctx.symbols);
            }
        }
        log::warn!("call to unknown function ignored: {}", callee);
        Ok(callee)
    }

    /// Bracket postfix: replaces the receiver's integer value with the
    /// bracket expression's integer value. This is NOT array indexing; the
    /// behavior is preserved from the legacy engine, quirk and all.
    fn index(&mut self, receiver: Value, index: Value) -> Result<Value> {
        if self.dead() {
            return Ok(Value::Nothing);
        }
        let index = self.rvalue(index)?.as_integer("index")?;
        self.rvalue(receiver)?.as_integer("index")?;
        Ok(Value::Integer(index))
    }

    /// `.`/`->` member access
    ///
    /// Extracts a typedef member field when the receiver identifier was
    /// declared against a typedef; otherwise the member name is consumed with
    /// no effect (legacy leniency).
    fn member_access(&mut self, receiver: Value, member_name: &str) -> Result<Value> {
        if self.dead() {
            return Ok(Value::Nothing);
        }
        let typedef_name = match &receiver {
            Value::Ident { name, .. } => self.ctx.usage.get(name),
            _ => None,
        };
        let Some(typedef_name) = typedef_name else {
            log::warn!(
                "member '.{}' on '{}' has no typedef binding; ignored",
                member_name,
                receiver
            );
            return Ok(receiver);
        };
        let def = self
            .ctx
            .registry
            .get(typedef_name)
            .ok_or_else(|| EvalError::type_error("member", typedef_name.clone()))?;
        let member = def.member(member_name)?;

        // The offset is itself an expression, evaluated through this same
        // engine against the same context
        let offset = evaluate(&member.offset, self.ctx)?.as_integer("member")?;
        let base = self.rvalue(receiver)?.as_integer("member")?;
        def.extract(member, base, offset)
    }

    /// Literals, identifiers, typedef constant syntax, and grouping
    fn primary(&mut self) -> Result<Value> {
        match self.next.clone() {
            Token::Operand(Value::Ident { name, .. }) => {
                self.advance()?;
                if self.ctx.registry.contains(&name) && self.next == Token::Operator(Op::Colon) {
                    return self.typedef_constant(&name);
                }
                // Bind the variable slot now; an unbound identifier is only
                // an error if something later dereferences it
                let slot = self.ctx.variables.get(&name);
                Ok(Value::Ident { name, slot })
            }
            Token::Operand(value) => {
                self.advance()?;
                Ok(value)
            }
            Token::Operator(Op::LParen) => {
                self.advance()?;
                let value = self.expression()?;
                self.expect(Op::RParen)?;
                Ok(value)
            }
            Token::End => Err(EvalError::syntax("expression", "expected expression")),
            Token::Operator(op) => Err(EvalError::syntax("expression", op.spelling())),
        }
    }

    /// `Type:member` (computed offset) and `Type:member:Label` (enum code)
    ///
    /// The second colon is consumed greedily when an identifier follows it,
    /// matching the legacy grammar.
    fn typedef_constant(&mut self, typedef_name: &str) -> Result<Value> {
        self.expect(Op::Colon)?;
        let Token::Operand(Value::Ident {
            name: member_name, ..
        }) = self.next.clone()
        else {
            return Err(EvalError::syntax("member", self.describe_next()));
        };
        self.advance()?;

        let mut label = None;
        if self.next == Token::Operator(Op::Colon) {
            let saved = self.snapshot();
            self.advance()?;
            match self.next.clone() {
                Token::Operand(Value::Ident { name, .. }) => {
                    self.advance()?;
                    label = Some(name);
                }
                _ => self.restore(saved),
            }
        }

        if self.dead() {
            return Ok(Value::Nothing);
        }

        let def = self
            .ctx
            .registry
            .get(typedef_name)
            .ok_or_else(|| EvalError::type_error("member", typedef_name))?;
        let member = def.member(&member_name)?;

        match label {
            Some(label) => member.code_for_label(&label).map(Value::Integer).ok_or_else(|| {
                EvalError::type_error(
                    "member",
                    format!("{}:{}:{}", typedef_name, member_name, label),
                )
            }),
            None => {
                let offset = evaluate(&member.offset, self.ctx)?.as_integer("member")?;
                Ok(Value::Integer(offset))
            }
        }
    }
}
