//! Template expressions: computed field values defined by a formula over
//! other fields of the same document.
//!
//! A compiled document may carry `{"$template": "<expr>"}` where a literal
//! would otherwise be. The reducer evaluates the expression against the full
//! candidate document to decide whether a stored literal is merely what the
//! formula already produces.
//!
//! Supported grammar, by rising precedence: string concatenation `..`,
//! additive `+`/`-`, multiplicative `*`/`/`, unary `-`. Primaries are number
//! literals, quoted string literals, parenthesized expressions, and dotted
//! field references. A leading `return` keyword and an `instrument.` prefix
//! on references are accepted and ignored, for compatibility with stored
//! formula definitions.

use crate::{CascadeError, CascadeResult};
use serde_json::Value;

/// Key under which a compiled document stores a formula instead of a literal.
pub const TEMPLATE_KEY: &str = "$template";

/// Key under which a compiled value wraps its plain base value.
pub const BASE_KEY: &str = "base";

/// If `value` is a template object, return its formula source.
#[inline]
pub fn template_source(value: &Value) -> Option<&str> {
    value.as_object()?.get(TEMPLATE_KEY)?.as_str()
}

/// If `value` is a base-wrapped object, return the wrapped base value.
#[inline]
pub fn base_value(value: &Value) -> Option<&Value> {
    value.as_object()?.get(BASE_KEY)
}

/// Evaluate a template expression against a document.
pub fn evaluate(source: &str, doc: &Value) -> CascadeResult<Value> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        doc,
    };
    let result = parser.concat()?;
    if parser.pos != tokens.len() {
        return Err(CascadeError::template(format!(
            "unexpected trailing input in template: {source}"
        )));
    }
    Ok(result)
}

/// Compare a literal against a template result, treating numbers by value
/// so that an integer literal matches a float result of the same magnitude.
pub fn results_equal(literal: &Value, result: &Value) -> bool {
    match (literal.as_f64(), result.as_f64()) {
        (Some(a), Some(b)) => (a - b).abs() <= f64::EPSILON * a.abs().max(b.abs()).max(1.0),
        _ => literal == result,
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Number(f64),
    Int(i64),
    Str(String),
    Ref(Vec<String>),
    Plus,
    Minus,
    Star,
    Slash,
    Concat,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> CascadeResult<Vec<Token>> {
    let src = source.trim();
    let src = src.strip_prefix("return ").unwrap_or(src).trim_start();
    let bytes: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '.' => {
                if bytes.get(i + 1) == Some(&'.') {
                    tokens.push(Token::Concat);
                    i += 2;
                } else {
                    return Err(CascadeError::template(format!(
                        "stray '.' at offset {i} in template"
                    )));
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match bytes.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                        None => {
                            return Err(CascadeError::template("unterminated string literal"))
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '0'..='9' => {
                let start = i;
                let mut is_float = false;
                while i < bytes.len() {
                    match bytes[i] {
                        '0'..='9' => i += 1,
                        // Lone '.' is a decimal point, '..' is the concat operator.
                        '.' if bytes.get(i + 1).is_some_and(|n| n.is_ascii_digit()) => {
                            is_float = true;
                            i += 1;
                        }
                        _ => break,
                    }
                }
                let text: String = bytes[start..i].iter().collect();
                if is_float {
                    let v = text
                        .parse::<f64>()
                        .map_err(|e| CascadeError::template(format!("bad number {text}: {e}")))?;
                    tokens.push(Token::Number(v));
                } else {
                    let v = text
                        .parse::<i64>()
                        .map_err(|e| CascadeError::template(format!("bad number {text}: {e}")))?;
                    tokens.push(Token::Int(v));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut segments = Vec::new();
                let mut current = String::new();
                while i < bytes.len() {
                    let ch = bytes[i];
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        current.push(ch);
                        i += 1;
                    } else if ch == '.' && bytes.get(i + 1) != Some(&'.') {
                        segments.push(std::mem::take(&mut current));
                        i += 1;
                    } else {
                        break;
                    }
                }
                segments.push(current);
                if segments.first().map(String::as_str) == Some("instrument") {
                    segments.remove(0);
                }
                if segments.is_empty() || segments.iter().any(String::is_empty) {
                    return Err(CascadeError::template(format!(
                        "bad field reference at offset {i}"
                    )));
                }
                tokens.push(Token::Ref(segments));
            }
            other => {
                return Err(CascadeError::template(format!(
                    "unexpected character '{other}' in template"
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    doc: &'a Value,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn concat(&mut self) -> CascadeResult<Value> {
        let mut left = self.additive()?;
        while self.peek() == Some(&Token::Concat) {
            self.pos += 1;
            let right = self.additive()?;
            left = Value::String(format!("{}{}", stringify(&left)?, stringify(&right)?));
        }
        Ok(left)
    }

    fn additive(&mut self) -> CascadeResult<Value> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => '+',
                Some(Token::Minus) => '-',
                _ => break,
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = arith(&left, &right, op)?;
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> CascadeResult<Value> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => '*',
                Some(Token::Slash) => '/',
                _ => break,
            };
            self.pos += 1;
            let right = self.unary()?;
            left = arith(&left, &right, op)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> CascadeResult<Value> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            let inner = self.unary()?;
            return arith(&Value::from(0), &inner, '-');
        }
        self.primary()
    }

    fn primary(&mut self) -> CascadeResult<Value> {
        match self.bump() {
            Some(Token::Int(v)) => Ok(Value::from(*v)),
            Some(Token::Number(v)) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .ok_or_else(|| CascadeError::template("non-finite number literal")),
            Some(Token::Str(s)) => Ok(Value::String(s.clone())),
            Some(Token::Ref(segments)) => {
                let mut current = self.doc;
                for seg in segments {
                    current = current.get(seg).ok_or_else(|| {
                        CascadeError::template(format!(
                            "unresolved field reference '{}'",
                            segments.join(".")
                        ))
                    })?;
                }
                Ok(current.clone())
            }
            Some(Token::LParen) => {
                let inner = self.concat()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(CascadeError::template("missing closing parenthesis")),
                }
            }
            other => Err(CascadeError::template(format!(
                "unexpected token in template: {other:?}"
            ))),
        }
    }
}

fn stringify(v: &Value) -> CascadeResult<String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(CascadeError::template(format!(
            "cannot concatenate {} value",
            crate::value_type_name(other)
        ))),
    }
}

/// Integer arithmetic stays integral except division, which is floating.
fn arith(left: &Value, right: &Value, op: char) -> CascadeResult<Value> {
    let (l, r) = match (left, right) {
        (Value::Number(l), Value::Number(r)) => (l, r),
        _ => {
            return Err(CascadeError::template(format!(
                "arithmetic on {} and {}",
                crate::value_type_name(left),
                crate::value_type_name(right)
            )))
        }
    };
    if let (Some(li), Some(ri)) = (l.as_i64(), r.as_i64()) {
        if op != '/' {
            let out = match op {
                '+' => li.checked_add(ri),
                '-' => li.checked_sub(ri),
                '*' => li.checked_mul(ri),
                _ => unreachable!(),
            };
            return out
                .map(Value::from)
                .ok_or_else(|| CascadeError::template("integer overflow in template"));
        }
    }
    let lf = l.as_f64().unwrap_or(f64::NAN);
    let rf = r.as_f64().unwrap_or(f64::NAN);
    let out = match op {
        '+' => lf + rf,
        '-' => lf - rf,
        '*' => lf * rf,
        '/' => lf / rf,
        _ => unreachable!(),
    };
    serde_json::Number::from_f64(out)
        .map(Value::Number)
        .ok_or_else(|| CascadeError::template("template produced non-finite value"))
}
