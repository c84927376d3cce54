//! Lexer for descriptor rendering expressions
//!
//! Converts an expression string into tokens on demand: one call, one token.
//! Literal tokens carry their decoded [`Value`] payload; operators come from
//! a fixed symbol table matched greedily at three, then two, then one
//! characters, so `<<=` wins over `<<` wins over `<`.
//!
//! Float literals are decoded by the engine's own accumulation algorithm
//! (19 significant decimal digits, explicit decimal exponent, power-of-ten
//! scaling by repeated squaring) rather than the host's float parser, so the
//! produced bits match the legacy digit-by-digit behavior.

use crate::types::{EvalError, Result, Value};
use std::fmt;

/// Operator and punctuation symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // Three characters
    ShlAssign,
    ShrAssign,
    // Two characters
    Shl,
    Shr,
    LessEqual,
    GreaterEqual,
    Equal,
    NotEqual,
    LogAnd,
    LogOr,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    Increment,
    Decrement,
    Arrow,
    // One character
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Less,
    Greater,
    Assign,
    Question,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Semicolon,
}

/// The fixed symbol table, tried greedily at 3, then 2, then 1 characters.
/// `//` is handled before this table as the line-comment introducer.
const SYMBOLS: [(&str, Op); 43] = [
    ("<<=", Op::ShlAssign),
    (">>=", Op::ShrAssign),
    ("<<", Op::Shl),
    (">>", Op::Shr),
    ("<=", Op::LessEqual),
    (">=", Op::GreaterEqual),
    ("==", Op::Equal),
    ("!=", Op::NotEqual),
    ("&&", Op::LogAnd),
    ("||", Op::LogOr),
    ("+=", Op::AddAssign),
    ("-=", Op::SubAssign),
    ("*=", Op::MulAssign),
    ("/=", Op::DivAssign),
    ("%=", Op::ModAssign),
    ("&=", Op::AndAssign),
    ("|=", Op::OrAssign),
    ("^=", Op::XorAssign),
    ("++", Op::Increment),
    ("--", Op::Decrement),
    ("->", Op::Arrow),
    ("+", Op::Plus),
    ("-", Op::Minus),
    ("*", Op::Star),
    ("/", Op::Slash),
    ("%", Op::Percent),
    ("&", Op::Amp),
    ("|", Op::Pipe),
    ("^", Op::Caret),
    ("~", Op::Tilde),
    ("!", Op::Bang),
    ("<", Op::Less),
    (">", Op::Greater),
    ("=", Op::Assign),
    ("?", Op::Question),
    (":", Op::Colon),
    ("(", Op::LParen),
    (")", Op::RParen),
    ("[", Op::LBracket),
    ("]", Op::RBracket),
    (".", Op::Dot),
    (",", Op::Comma),
    (";", Op::Semicolon),
];

impl Op {
    /// The symbol's spelling, for diagnostics
    pub fn spelling(&self) -> &'static str {
        SYMBOLS
            .iter()
            .find(|(_, op)| op == self)
            .map(|(s, _)| *s)
            .unwrap_or("?")
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.spelling())
    }
}

/// One token of the expression stream
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A literal or identifier, carried as its decoded value
    Operand(Value),
    /// An operator or punctuation symbol
    Operator(Op),
    /// End of input (also produced after a `//` comment)
    End,
}

/// Powers of ten for exponent scaling by repeated squaring
const POW10: [f64; 9] = [1e1, 1e2, 1e4, 1e8, 1e16, 1e32, 1e64, 1e128, 1e256];

/// 10^exp by repeated squaring against the precomputed table.
/// Exponents beyond the table range overflow to infinity, which callers
/// turn into 0.0 when dividing.
fn pow10(mut exp: u32) -> f64 {
    let mut result = 1.0;
    for power in POW10.iter() {
        if exp == 0 {
            return result;
        }
        if exp & 1 != 0 {
            result *= power;
        }
        exp >>= 1;
    }
    if exp != 0 {
        f64::INFINITY
    } else {
        result
    }
}

/// On-demand tokenizer over an expression string
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `input`, positioned at the start
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Current byte cursor, for parser snapshots
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Restore a byte cursor saved with [`Lexer::pos`]
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn peek_byte(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + offset).copied()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    /// Produce the next token, advancing the cursor past it
    pub fn next_token(&mut self) -> Result<Token> {
        // Whitespace between tokens: space, tab, form-feed
        while matches!(self.peek_byte(), Some(b' ') | Some(b'\t') | Some(0x0C)) {
            self.pos += 1;
        }

        let Some(byte) = self.peek_byte() else {
            return Ok(Token::End);
        };

        // A line comment consumes everything to the end of the input
        if self.rest().starts_with("//") {
            self.pos = self.input.len();
            return Ok(Token::End);
        }

        match byte {
            b'0'..=b'9' => self.scan_number(),
            b'"' => self.scan_string(),
            b'\'' => self.scan_char(),
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => Ok(self.scan_identifier()),
            _ => self.scan_symbol(),
        }
    }

    /// Greedy longest-match against the symbol table: 3, then 2, then 1 chars
    fn scan_symbol(&mut self) -> Result<Token> {
        for len in [3usize, 2, 1] {
            let Some(candidate) = self.rest().get(..len) else {
                continue;
            };
            if let Some((_, op)) = SYMBOLS.iter().find(|(s, _)| *s == candidate) {
                self.pos += len;
                return Ok(Token::Operator(*op));
            }
        }
        let fragment = self.rest().chars().next().map(String::from).unwrap_or_default();
        Err(EvalError::syntax("token", fragment))
    }

    /// Integer or float literal starting at a digit
    fn scan_number(&mut self) -> Result<Token> {
        let start = self.pos;

        // Hex wins before the octal/decimal/float decision
        if self.peek_byte() == Some(b'0')
            && matches!(self.peek_byte_at(1), Some(b'x') | Some(b'X'))
        {
            return self.scan_hex(start);
        }

        // Measure the leading digit run, then decide: a trailing '.', 'e' or
        // 'E' re-scans the run as a float literal
        let mut end = self.pos;
        while matches!(self.input.as_bytes().get(end), Some(b'0'..=b'9')) {
            end += 1;
        }
        if matches!(self.input.as_bytes().get(end), Some(b'.') | Some(b'e') | Some(b'E')) {
            return self.scan_float(start);
        }

        let digits = &self.input[start..end];
        self.pos = end;

        let radix_scan: Result<u64> = if digits.len() > 1 && digits.starts_with('0') {
            // Octal: the 0 prefix, then digits 0-7 only
            digits[1..].bytes().try_fold(0u64, |acc, b| {
                if !(b'0'..=b'7').contains(&b) {
                    return Err(EvalError::syntax("number", digits));
                }
                acc.checked_mul(8)
                    .and_then(|v| v.checked_add((b - b'0') as u64))
                    .ok_or_else(|| EvalError::range("number", digits))
            })
        } else {
            digits.bytes().try_fold(0u64, |acc, b| {
                acc.checked_mul(10)
                    .and_then(|v| v.checked_add((b - b'0') as u64))
                    .ok_or_else(|| EvalError::range("number", digits))
            })
        };

        Ok(Token::Operand(Value::Integer(radix_scan? as i64)))
    }

    fn scan_hex(&mut self, start: usize) -> Result<Token> {
        self.pos += 2; // 0x
        let digit_start = self.pos;
        let mut acc: u64 = 0;
        while let Some(b) = self.peek_byte() {
            let digit = match b {
                b'0'..=b'9' => (b - b'0') as u64,
                b'a'..=b'f' => (b - b'a' + 10) as u64,
                b'A'..=b'F' => (b - b'A' + 10) as u64,
                _ => break,
            };
            acc = acc
                .checked_mul(16)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| EvalError::range("number", &self.input[start..]))?;
            self.pos += 1;
        }
        if self.pos == digit_start {
            return Err(EvalError::syntax("number", &self.input[start..]));
        }
        Ok(Token::Operand(Value::Integer(acc as i64)))
    }

    /// Float literal: mantissa accumulation up to 19 significant decimal
    /// digits, an explicit signed decimal exponent, then power-of-ten scaling
    fn scan_float(&mut self, start: usize) -> Result<Token> {
        let mut mantissa: u64 = 0;
        let mut sig_digits = 0u32;
        let mut exp10: i32 = 0;

        // Integer part
        while let Some(b @ b'0'..=b'9') = self.peek_byte() {
            if sig_digits < 19 {
                mantissa = mantissa * 10 + (b - b'0') as u64;
                if mantissa != 0 {
                    sig_digits += 1;
                }
            } else {
                exp10 += 1;
            }
            self.pos += 1;
        }

        // Fraction part
        if self.peek_byte() == Some(b'.') {
            self.pos += 1;
            while let Some(b @ b'0'..=b'9') = self.peek_byte() {
                if sig_digits < 19 {
                    mantissa = mantissa * 10 + (b - b'0') as u64;
                    exp10 -= 1;
                    if mantissa != 0 {
                        sig_digits += 1;
                    }
                }
                self.pos += 1;
            }
        }

        // Explicit exponent
        if matches!(self.peek_byte(), Some(b'e') | Some(b'E')) {
            self.pos += 1;
            let negative = match self.peek_byte() {
                Some(b'+') => {
                    self.pos += 1;
                    false
                }
                Some(b'-') => {
                    self.pos += 1;
                    true
                }
                _ => false,
            };
            let exp_start = self.pos;
            let mut exp_value: i32 = 0;
            while let Some(b @ b'0'..=b'9') = self.peek_byte() {
                exp_value = exp_value.saturating_mul(10).saturating_add((b - b'0') as i32);
                self.pos += 1;
            }
            if self.pos == exp_start {
                return Err(EvalError::syntax("number", &self.input[start..self.pos]));
            }
            exp10 += if negative { -exp_value } else { exp_value };
        }

        let result = if exp10 >= 0 {
            mantissa as f64 * pow10(exp10 as u32)
        } else {
            mantissa as f64 / pow10(exp10.unsigned_abs())
        };
        Ok(Token::Operand(Value::Floating(result)))
    }

    /// Identifier, or the inf/nan floating keywords
    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        while matches!(
            self.peek_byte(),
            Some(b'A'..=b'Z') | Some(b'a'..=b'z') | Some(b'0'..=b'9') | Some(b'_')
        ) {
            self.pos += 1;
        }
        let word = &self.input[start..self.pos];
        if word.eq_ignore_ascii_case("inf") {
            return Token::Operand(Value::Floating(f64::INFINITY));
        }
        if word.eq_ignore_ascii_case("nan") {
            return Token::Operand(Value::Floating(f64::NAN));
        }
        Token::Operand(Value::Ident {
            name: word.to_string(),
            slot: None,
        })
    }

    /// Double-quoted string literal with C escapes
    fn scan_string(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut text = String::new();
        loop {
            let Some(ch) = self.rest().chars().next() else {
                return Err(EvalError::syntax("string", &self.input[start..]));
            };
            self.pos += ch.len_utf8();
            match ch {
                '"' => return Ok(Token::Operand(Value::Str(text))),
                '\\' => text.push(self.scan_escape(start)?),
                _ => text.push(ch),
            }
        }
    }

    /// Single-quoted character literal, yielding its code point as an integer
    fn scan_char(&mut self) -> Result<Token> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let Some(ch) = self.rest().chars().next() else {
            return Err(EvalError::syntax("character", &self.input[start..]));
        };
        self.pos += ch.len_utf8();
        let decoded = match ch {
            '\'' => return Err(EvalError::syntax("character", &self.input[start..self.pos])),
            '\\' => self.scan_escape(start)?,
            other => other,
        };
        if self.peek_byte() != Some(b'\'') {
            // Multi-codepoint or unterminated
            return Err(EvalError::syntax("character", &self.input[start..]));
        }
        self.pos += 1;
        Ok(Token::Operand(Value::Integer(decoded as u32 as i64)))
    }

    /// One escape sequence; the backslash is already consumed.
    /// `literal_start` anchors the error fragment.
    fn scan_escape(&mut self, literal_start: usize) -> Result<char> {
        let Some(ch) = self.rest().chars().next() else {
            return Err(EvalError::syntax("escape", &self.input[literal_start..]));
        };
        self.pos += ch.len_utf8();
        match ch {
            '\'' => Ok('\''),
            '"' => Ok('"'),
            '\\' => Ok('\\'),
            'a' => Ok('\u{07}'),
            'b' => Ok('\u{08}'),
            'e' => Ok('\u{1B}'),
            'f' => Ok('\u{0C}'),
            'n' => Ok('\n'),
            'r' => Ok('\r'),
            't' => Ok('\t'),
            'v' => Ok('\u{0B}'),
            '0'..='7' => {
                // Octal, up to three digits including the one just read
                let mut value = ch as u32 - '0' as u32;
                for _ in 0..2 {
                    match self.peek_byte() {
                        Some(b @ b'0'..=b'7') => {
                            value = value * 8 + (b - b'0') as u32;
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                char::from_u32(value)
                    .ok_or_else(|| EvalError::range("escape", &self.input[literal_start..self.pos]))
            }
            'x' => {
                // Variable-length hex
                let digit_start = self.pos;
                let mut value: u32 = 0;
                while let Some(b) = self.peek_byte() {
                    let digit = match b {
                        b'0'..=b'9' => (b - b'0') as u32,
                        b'a'..=b'f' => (b - b'a' + 10) as u32,
                        b'A'..=b'F' => (b - b'A' + 10) as u32,
                        _ => break,
                    };
                    value = value.saturating_mul(16).saturating_add(digit);
                    self.pos += 1;
                }
                if self.pos == digit_start {
                    return Err(EvalError::syntax(
                        "escape",
                        &self.input[literal_start..self.pos],
                    ));
                }
                char::from_u32(value)
                    .ok_or_else(|| EvalError::range("escape", &self.input[literal_start..self.pos]))
            }
            'u' => self.scan_fixed_hex(4, literal_start),
            'U' => self.scan_fixed_hex(8, literal_start),
            _ => Err(EvalError::syntax(
                "escape",
                &self.input[literal_start..self.pos],
            )),
        }
    }

    /// Fixed-width `\uHHHH` / `\UHHHHHHHH` escape body
    fn scan_fixed_hex(&mut self, width: usize, literal_start: usize) -> Result<char> {
        let mut value: u32 = 0;
        for _ in 0..width {
            let digit = match self.peek_byte() {
                Some(b @ b'0'..=b'9') => (b - b'0') as u32,
                Some(b @ b'a'..=b'f') => (b - b'a' + 10) as u32,
                Some(b @ b'A'..=b'F') => (b - b'A' + 10) as u32,
                _ => {
                    return Err(EvalError::range(
                        "escape",
                        &self.input[literal_start..self.pos],
                    ))
                }
            };
            value = value.saturating_mul(16).saturating_add(digit);
            self.pos += 1;
        }
        char::from_u32(value)
            .ok_or_else(|| EvalError::range("escape", &self.input[literal_start..self.pos]))
    }
}
