//! Restricted expression evaluator.
//!
//! A small tokenizer and precedence-climbing parser over literals and a
//! fixed operator whitelist: arithmetic (`+ - * / // % **`), bitwise
//! (`| & ^`), comparisons (`== != < <= > >=`) and unary (`+ - ! not ~`).
//! Identifiers are resolved from a caller-supplied environment; an
//! expression containing identifiers is not constant. Anything outside the
//! whitelist fails to parse, and evaluation errors (division by zero, type
//! mismatch) surface as errors for the caller to treat as "leave
//! unchanged" or "condition false".
//!
//! Division follows the source semantics: `/` is true division producing a
//! float, `//` and `%` are floor division and floor modulo.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Evaluation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Arithmetic overflow")]
    Overflow,
}

/// Literal values an expression can produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    /// Truthiness for guard and loop conditions
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    /// Literal rendering used when folding constants back into a plan
    pub fn render(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{f:.1}")
                } else {
                    f.to_string()
                }
            }
            Value::Str(s) => format!("'{s}'"),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            other => Value::Str(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Pipe,
    Amp,
    Caret,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Not,
    Tilde,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            '&' => {
                tokens.push(Token::Amp);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '~' => {
                tokens.push(Token::Tilde);
                i += 1;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::DoubleStar);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '/' => {
                if chars.get(i + 1) == Some(&'/') {
                    tokens.push(Token::DoubleSlash);
                    i += 2;
                } else {
                    tokens.push(Token::Slash);
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Eq);
                    i += 2;
                } else {
                    return Err(ExprError::Parse("single '=' is not an operator".into()));
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                        None => return Err(ExprError::Parse("unterminated string".into())),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '0'..='9' | '.' => {
                let start = i;
                let mut has_dot = false;
                while let Some(&ch) = chars.get(i) {
                    if ch.is_ascii_digit() {
                        i += 1;
                    } else if ch == '.' && !has_dot {
                        has_dot = true;
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                if has_dot {
                    let f = text
                        .parse::<f64>()
                        .map_err(|_| ExprError::Parse(format!("bad number: {text}")))?;
                    tokens.push(Token::Float(f));
                } else {
                    let n = text
                        .parse::<i64>()
                        .map_err(|_| ExprError::Parse(format!("bad number: {text}")))?;
                    tokens.push(Token::Int(n));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while let Some(&ch) = chars.get(i) {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let word: String = chars[start..i].iter().collect();
                match word.as_str() {
                    "true" | "True" => tokens.push(Token::True),
                    "false" | "False" => tokens.push(Token::False),
                    "not" => tokens.push(Token::Not),
                    _ => tokens.push(Token::Ident(word)),
                }
            }
            other => {
                return Err(ExprError::Parse(format!("unexpected character '{other}'")));
            }
        }
    }
    Ok(tokens)
}

/// Parsed expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    BitOr,
    BitAnd,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    // comparison -> bitor (CMPOP bitor)*
    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_bitor()?;
        while let Some(op) = match self.peek() {
            Some(Token::Eq) => Some(BinaryOp::Eq),
            Some(Token::Ne) => Some(BinaryOp::Ne),
            Some(Token::Lt) => Some(BinaryOp::Lt),
            Some(Token::Le) => Some(BinaryOp::Le),
            Some(Token::Gt) => Some(BinaryOp::Gt),
            Some(Token::Ge) => Some(BinaryOp::Ge),
            _ => None,
        } {
            self.advance();
            let right = self.parse_bitor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_bitor(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_bitxor()?;
        while matches!(self.peek(), Some(Token::Pipe)) {
            self.advance();
            let right = self.parse_bitxor()?;
            left = Expr::Binary(BinaryOp::BitOr, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_bitxor(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_bitand()?;
        while matches!(self.peek(), Some(Token::Caret)) {
            self.advance();
            let right = self.parse_bitand()?;
            left = Expr::Binary(BinaryOp::BitXor, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_bitand(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_additive()?;
        while matches!(self.peek(), Some(Token::Amp)) {
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary(BinaryOp::BitAnd, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::DoubleSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            Some(Token::Plus) => Some(UnaryOp::Pos),
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Not) => Some(UnaryOp::Not),
            Some(Token::Tilde) => Some(UnaryOp::Invert),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(op, Box::new(operand)));
        }
        self.parse_power()
    }

    // power is right-associative: primary ** unary
    fn parse_power(&mut self) -> Result<Expr, ExprError> {
        let base = self.parse_primary()?;
        if matches!(self.peek(), Some(Token::DoubleStar)) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(
                BinaryOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::LParen) => {
                let inner = self.parse_comparison()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExprError::Parse("expected ')'".into())),
                }
            }
            other => Err(ExprError::Parse(format!("unexpected token {other:?}"))),
        }
    }
}

/// Parse an expression against the operator whitelist
pub fn parse(input: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExprError::Parse("empty expression".into()));
    }
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let expr = parser.parse_comparison()?;
    if parser.position != parser.tokens.len() {
        return Err(ExprError::Parse("trailing tokens".into()));
    }
    Ok(expr)
}

/// True when the expression carries only literals and whitelisted operators
pub fn is_constant(expr: &Expr) -> bool {
    match expr {
        Expr::Literal(_) => true,
        Expr::Ident(_) => false,
        Expr::Unary(_, inner) => is_constant(inner),
        Expr::Binary(_, left, right) => is_constant(left) && is_constant(right),
    }
}

/// Evaluate with identifiers resolved from `env`
pub fn eval(expr: &Expr, env: &BTreeMap<String, Value>) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Ident(name) => env
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::UnknownIdentifier(name.clone())),
        Expr::Unary(op, inner) => {
            let value = eval(inner, env)?;
            eval_unary(*op, value)
        }
        Expr::Binary(op, left, right) => {
            let lhs = eval(left, env)?;
            let rhs = eval(right, env)?;
            eval_binary(*op, lhs, rhs)
        }
    }
}

/// Parse + evaluate a boolean condition; identifiers come from `env`
pub fn eval_predicate(input: &str, env: &BTreeMap<String, Value>) -> Result<bool, ExprError> {
    let expr = parse(input)?;
    Ok(eval(&expr, env)?.is_truthy())
}

/// Fold a purely-literal expression to its rendered value. Returns None for
/// non-constant input and for any evaluation error, leaving the caller's
/// text untouched.
pub fn fold_constant(input: &str) -> Option<String> {
    let expr = parse(input).ok()?;
    if !is_constant(&expr) {
        return None;
    }
    let value = eval(&expr, &BTreeMap::new()).ok()?;
    Some(value.render())
}

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value, ExprError> {
    match (op, value) {
        (UnaryOp::Pos, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
        (UnaryOp::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int).ok_or(ExprError::Overflow),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Invert, Value::Int(n)) => Ok(Value::Int(!n)),
        (op, v) => Err(ExprError::TypeMismatch(format!(
            "unary {op:?} on {v:?}"
        ))),
    }
}

fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, ExprError> {
    use BinaryOp::*;
    match op {
        Add => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_add(b).map(Value::Int).ok_or(ExprError::Overflow)
            }
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (a, b) => float_op(a, b, |x, y| x + y),
        },
        Sub => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_sub(b).map(Value::Int).ok_or(ExprError::Overflow)
            }
            (a, b) => float_op(a, b, |x, y| x - y),
        },
        Mul => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                a.checked_mul(b).map(Value::Int).ok_or(ExprError::Overflow)
            }
            (a, b) => float_op(a, b, |x, y| x * y),
        },
        // True division always produces a float
        Div => {
            let b = rhs.as_f64().ok_or_else(type_error(&lhs, &rhs))?;
            let a = lhs.as_f64().ok_or_else(type_error(&lhs, &rhs))?;
            if b == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Value::Float(a / b))
        }
        FloorDiv => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(ExprError::DivisionByZero)
                } else {
                    Ok(Value::Int(a.div_euclid(*b)))
                }
            }
            _ => {
                let a = lhs.as_f64().ok_or_else(type_error(&lhs, &rhs))?;
                let b = rhs.as_f64().ok_or_else(type_error(&lhs, &rhs))?;
                if b == 0.0 {
                    return Err(ExprError::DivisionByZero);
                }
                Ok(Value::Float((a / b).floor()))
            }
        },
        Mod => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) => {
                if *b == 0 {
                    Err(ExprError::DivisionByZero)
                } else {
                    Ok(Value::Int(a.rem_euclid(*b)))
                }
            }
            _ => {
                let a = lhs.as_f64().ok_or_else(type_error(&lhs, &rhs))?;
                let b = rhs.as_f64().ok_or_else(type_error(&lhs, &rhs))?;
                if b == 0.0 {
                    return Err(ExprError::DivisionByZero);
                }
                Ok(Value::Float(a - (a / b).floor() * b))
            }
        },
        Pow => match (&lhs, &rhs) {
            (Value::Int(a), Value::Int(b)) if *b >= 0 => {
                let exponent = u32::try_from(*b).map_err(|_| ExprError::Overflow)?;
                a.checked_pow(exponent)
                    .map(Value::Int)
                    .ok_or(ExprError::Overflow)
            }
            _ => {
                let a = lhs.as_f64().ok_or_else(type_error(&lhs, &rhs))?;
                let b = rhs.as_f64().ok_or_else(type_error(&lhs, &rhs))?;
                Ok(Value::Float(a.powf(b)))
            }
        },
        BitOr => bit_op(lhs, rhs, |a, b| a | b, |a, b| a | b),
        BitAnd => bit_op(lhs, rhs, |a, b| a & b, |a, b| a & b),
        BitXor => bit_op(lhs, rhs, |a, b| a ^ b, |a, b| a ^ b),
        Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        Lt | Le | Gt | Ge => compare(op, &lhs, &rhs),
    }
}

fn type_error(lhs: &Value, rhs: &Value) -> impl FnOnce() -> ExprError {
    let message = format!("{lhs:?} vs {rhs:?}");
    move || ExprError::TypeMismatch(message)
}

fn float_op(lhs: Value, rhs: Value, f: fn(f64, f64) -> f64) -> Result<Value, ExprError> {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => Ok(Value::Float(f(a, b))),
        _ => Err(ExprError::TypeMismatch(format!("{lhs:?} vs {rhs:?}"))),
    }
}

fn bit_op(
    lhs: Value,
    rhs: Value,
    ints: fn(i64, i64) -> i64,
    bools: fn(bool, bool) -> bool,
) -> Result<Value, ExprError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(ints(a, b))),
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(bools(a, b))),
        (a, b) => Err(ExprError::TypeMismatch(format!("{a:?} vs {b:?}"))),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ExprError> {
    let ordering = match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(ExprError::TypeMismatch(format!(
                    "cannot order {lhs:?} vs {rhs:?}"
                )))
            }
        },
    };
    let Some(ordering) = ordering else {
        return Err(ExprError::TypeMismatch("unordered values".into()));
    };
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => false,
    };
    Ok(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("(1 + 2) * (3 + 4)", "21"; "arithmetic")]
    #[test_case("2 ** 10", "1024"; "power")]
    #[test_case("7 // 2", "3"; "floor division")]
    #[test_case("7 % 3", "1"; "modulo")]
    #[test_case("-7 % 3", "2"; "floor modulo of negative")]
    #[test_case("6 / 4", "1.5"; "true division")]
    #[test_case("6 / 3", "2.0"; "true division stays float")]
    #[test_case("5 > 3", "true"; "comparison")]
    #[test_case("5 == 5.0", "true"; "mixed equality")]
    #[test_case("1 | 2", "3"; "bitwise or")]
    #[test_case("6 ^ 3", "5"; "bitwise xor")]
    #[test_case("~0", "-1"; "invert")]
    #[test_case("not true", "false"; "logical not keyword")]
    #[test_case("'foo' + 'bar'", "'foobar'"; "string concat")]
    fn folds_constants(input: &str, expected: &str) {
        assert_eq!(fold_constant(input).as_deref(), Some(expected));
    }

    #[test_case("amount + 1"; "identifier")]
    #[test_case("1 / 0"; "division by zero")]
    #[test_case("f(1)"; "function call")]
    #[test_case("1 +"; "trailing operator")]
    #[test_case(""; "empty")]
    #[test_case("x = 1"; "assignment")]
    fn refuses_to_fold(input: &str) {
        assert_eq!(fold_constant(input), None);
    }

    #[test]
    fn predicates_resolve_identifiers() {
        let env = BTreeMap::from([("amount".to_string(), Value::Int(500))]);
        assert!(eval_predicate("amount <= 1000", &env).unwrap());
        assert!(!eval_predicate("amount > 1000", &env).unwrap());
    }

    #[test]
    fn unknown_identifier_is_an_error() {
        let env = BTreeMap::new();
        assert!(matches!(
            eval_predicate("missing > 1", &env),
            Err(ExprError::UnknownIdentifier(_))
        ));
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        assert_eq!(fold_constant("-2 ** 2").as_deref(), Some("-4"));
    }

    #[test]
    fn overflow_is_an_error_not_a_panic() {
        assert_eq!(fold_constant("9223372036854775807 + 1"), None);
    }
}
