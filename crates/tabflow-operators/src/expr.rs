//! Small expression language for computed fields.
//!
//! ```text
//! {price} * {qty} + 1
//! {name} == 'x' or not {flag}
//! ({a} - {b}) / 2
//! ```
//!
//! `{field}` reads a field of the current record. Literals are integers,
//! floats, quoted text, `true`/`false` and `null` (`True`/`False`/`None` are
//! accepted too). `and`/`or` return one of their operands, like the
//! short-circuit operators of most scripting languages; `not` and the
//! comparisons return booleans. `/` always yields a float; `%` takes the
//! sign of the divisor.
//!
//! Parse failures are specification errors; evaluation failures (type
//! mismatches, division by zero, overflow) are transform errors.

use std::cmp::Ordering;
use std::fmt;

use tabflow_core::error::{Error, Result};
use tabflow_core::record::Record;
use tabflow_core::value::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let mut out = Vec::new();
    let mut chars = src.char_indices().peekable();
    while let Some(&(pos, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, ch)) => name.push(ch),
                        None => return Err(spec(src, pos, "unterminated field reference")),
                    }
                }
                out.push(Token::Field(name));
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some((_, ch)) if ch == quote => break,
                        Some((_, '\\')) => match chars.next() {
                            Some((_, 'n')) => text.push('\n'),
                            Some((_, 't')) => text.push('\t'),
                            Some((_, ch)) => text.push(ch),
                            None => return Err(spec(src, pos, "unterminated string")),
                        },
                        Some((_, ch)) => text.push(ch),
                        None => return Err(spec(src, pos, "unterminated string")),
                    }
                }
                out.push(Token::Str(text));
            }
            '0'..='9' | '.' => {
                let mut lit = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    let exp_sign = (ch == '-' || ch == '+') && lit.ends_with(['e', 'E']);
                    if ch.is_ascii_digit() || ch == '.' || ch == 'e' || ch == 'E' || exp_sign {
                        lit.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let is_float = lit.contains(['.', 'e', 'E']);
                let tok = if is_float {
                    lit.parse().map(Token::Float).ok()
                } else {
                    lit.parse().map(Token::Int).ok()
                };
                out.push(tok.ok_or_else(|| spec(src, pos, &format!("bad number '{lit}'")))?);
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                out.push(Token::Ident(ident));
            }
            '(' => {
                chars.next();
                out.push(Token::LParen);
            }
            ')' => {
                chars.next();
                out.push(Token::RParen);
            }
            _ => {
                chars.next();
                let next = chars.peek().map(|&(_, ch)| ch);
                let op = match (c, next) {
                    ('=', Some('=')) => "==",
                    ('!', Some('=')) => "!=",
                    ('<', Some('=')) => "<=",
                    ('>', Some('=')) => ">=",
                    ('<', _) => "<",
                    ('>', _) => ">",
                    ('+', _) => "+",
                    ('-', _) => "-",
                    ('*', _) => "*",
                    ('/', _) => "/",
                    ('%', _) => "%",
                    _ => return Err(spec(src, pos, &format!("unexpected character '{c}'"))),
                };
                if op.len() == 2 {
                    chars.next();
                }
                out.push(Token::Op(op));
            }
        }
    }
    Ok(out)
}

fn spec(src: &str, pos: usize, msg: &str) -> Error {
    Error::Spec(format!("expression {src:?} at {pos}: {msg}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    fn from_token(tok: &Token) -> Option<Self> {
        Some(match tok {
            Token::Op("+") => BinOp::Add,
            Token::Op("-") => BinOp::Sub,
            Token::Op("*") => BinOp::Mul,
            Token::Op("/") => BinOp::Div,
            Token::Op("%") => BinOp::Rem,
            Token::Op("==") => BinOp::Eq,
            Token::Op("!=") => BinOp::Ne,
            Token::Op("<") => BinOp::Lt,
            Token::Op("<=") => BinOp::Le,
            Token::Op(">") => BinOp::Gt,
            Token::Op(">=") => BinOp::Ge,
            Token::Ident(s) if s == "and" => BinOp::And,
            Token::Ident(s) if s == "or" => BinOp::Or,
            _ => return None,
        })
    }

    /// Left binding power.
    fn power(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 4,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 6,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

const NOT_POWER: u8 = 3;
const NEG_POWER: u8 = 7;

#[derive(Debug, Clone)]
enum Node {
    Lit(Value),
    Field(String),
    Neg(Box<Node>),
    Not(Box<Node>),
    Bin(BinOp, Box<Node>, Box<Node>),
}

struct Parser<'s> {
    src: &'s str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn err(&self, msg: &str) -> Error {
        Error::Spec(format!("expression {:?}: {msg}", self.src))
    }

    fn expr(&mut self, min_power: u8) -> Result<Node> {
        let mut lhs = self.prefix()?;
        while let Some(op) = self.peek().and_then(BinOp::from_token) {
            let power = op.power();
            if power <= min_power {
                break;
            }
            self.bump();
            let rhs = self.expr(power)?;
            lhs = Node::Bin(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Node> {
        match self.bump() {
            Some(Token::Field(name)) => Ok(Node::Field(name)),
            Some(Token::Int(i)) => Ok(Node::Lit(Value::Int(i))),
            Some(Token::Float(f)) => Ok(Node::Lit(Value::Float(f))),
            Some(Token::Str(s)) => Ok(Node::Lit(Value::Str(s))),
            Some(Token::Op("-")) => Ok(Node::Neg(Box::new(self.expr(NEG_POWER - 1)?))),
            Some(Token::Op("+")) => self.expr(NEG_POWER - 1),
            Some(Token::LParen) => {
                let inner = self.expr(0)?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.err("expected ')'")),
                }
            }
            Some(Token::Ident(id)) => match id.as_str() {
                "true" | "True" => Ok(Node::Lit(Value::Bool(true))),
                "false" | "False" => Ok(Node::Lit(Value::Bool(false))),
                "null" | "None" => Ok(Node::Lit(Value::Null)),
                "not" => Ok(Node::Not(Box::new(self.expr(NOT_POWER - 1)?))),
                other => Err(self.err(&format!("unknown name '{other}'"))),
            },
            Some(tok) => Err(self.err(&format!("unexpected {tok:?}"))),
            None => Err(self.err("unexpected end of input")),
        }
    }
}

/// A parsed expression.
#[derive(Clone)]
pub struct Expr {
    src: String,
    root: Node,
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expr").field(&self.src).finish()
    }
}

impl Expr {
    pub fn parse(src: &str) -> Result<Self> {
        let tokens = tokenize(src)?;
        let mut p = Parser { src, tokens, pos: 0 };
        let root = p.expr(0)?;
        if p.pos < p.tokens.len() {
            return Err(p.err("trailing input"));
        }
        Ok(Self {
            src: src.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.src
    }

    /// Names of every field the expression reads, in order of appearance.
    pub fn fields(&self) -> Vec<&str> {
        fn walk<'n>(node: &'n Node, out: &mut Vec<&'n str>) {
            match node {
                Node::Field(name) => out.push(name),
                Node::Neg(n) | Node::Not(n) => walk(n, out),
                Node::Bin(_, a, b) => {
                    walk(a, out);
                    walk(b, out);
                }
                Node::Lit(_) => {}
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }

    /// Fail early when a referenced field is absent from `header`.
    pub fn check_fields(&self, header: &[String]) -> Result<()> {
        for name in self.fields() {
            if !header.iter().any(|h| h == name) {
                return Err(Error::FieldNotFound(format!(
                    "expression {:?} reads '{name}', not in header {header:?}",
                    self.src
                )));
            }
        }
        Ok(())
    }

    pub fn eval(&self, rec: &Record) -> Result<Value> {
        eval(&self.root, rec)
    }
}

fn eval(node: &Node, rec: &Record) -> Result<Value> {
    match node {
        Node::Lit(v) => Ok(v.clone()),
        Node::Field(name) => Ok(rec.get(name)?.clone()),
        Node::Neg(n) => match eval(n, rec)? {
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| Error::Transform("integer overflow in negation".into())),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Bool(b) => Ok(Value::Int(-(b as i64))),
            other => Err(Error::Transform(format!(
                "bad operand type for unary -: {}",
                other.kind().name()
            ))),
        },
        Node::Not(n) => Ok(Value::Bool(!eval(n, rec)?.is_truthy())),
        Node::Bin(BinOp::And, a, b) => {
            let lhs = eval(a, rec)?;
            if lhs.is_truthy() {
                eval(b, rec)
            } else {
                Ok(lhs)
            }
        }
        Node::Bin(BinOp::Or, a, b) => {
            let lhs = eval(a, rec)?;
            if lhs.is_truthy() {
                Ok(lhs)
            } else {
                eval(b, rec)
            }
        }
        Node::Bin(op, a, b) => binary(*op, eval(a, rec)?, eval(b, rec)?),
    }
}

enum Num {
    Int(i64),
    Float(f64),
}

fn num(v: &Value) -> Option<Num> {
    match v {
        Value::Int(i) => Some(Num::Int(*i)),
        Value::Bool(b) => Some(Num::Int(*b as i64)),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn type_error(op: BinOp, a: &Value, b: &Value) -> Error {
    Error::Transform(format!(
        "unsupported operand types for {}: {} and {}",
        op.symbol(),
        a.kind().name(),
        b.kind().name()
    ))
}

fn overflow(op: BinOp) -> Error {
    Error::Transform(format!("integer overflow in {}", op.symbol()))
}

fn py_rem_f64(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

fn binary(op: BinOp, a: Value, b: Value) -> Result<Value> {
    match op {
        BinOp::Eq => return Ok(Value::Bool(a == b)),
        BinOp::Ne => return Ok(Value::Bool(a != b)),
        BinOp::Lt => return Ok(Value::Bool(a.cmp(&b) == Ordering::Less)),
        BinOp::Le => return Ok(Value::Bool(a.cmp(&b) != Ordering::Greater)),
        BinOp::Gt => return Ok(Value::Bool(a.cmp(&b) == Ordering::Greater)),
        BinOp::Ge => return Ok(Value::Bool(a.cmp(&b) != Ordering::Less)),
        _ => {}
    }

    match (op, &a, &b) {
        (BinOp::Add, Value::Str(x), Value::Str(y)) => return Ok(Value::Str(format!("{x}{y}"))),
        (BinOp::Add, Value::List(x), Value::List(y)) => {
            return Ok(Value::List(x.iter().chain(y).cloned().collect()))
        }
        (BinOp::Mul, Value::Str(s), Value::Int(n)) | (BinOp::Mul, Value::Int(n), Value::Str(s)) => {
            return Ok(Value::Str(s.repeat((*n).max(0) as usize)))
        }
        _ => {}
    }

    let (Some(x), Some(y)) = (num(&a), num(&b)) else {
        return Err(type_error(op, &a, &b));
    };

    if op == BinOp::Div {
        let (x, y) = (as_f64(&x), as_f64(&y));
        if y == 0.0 {
            return Err(Error::Transform("division by zero".into()));
        }
        return Ok(Value::Float(x / y));
    }

    match (x, y) {
        (Num::Int(x), Num::Int(y)) => {
            let r = match op {
                BinOp::Add => x.checked_add(y),
                BinOp::Sub => x.checked_sub(y),
                BinOp::Mul => x.checked_mul(y),
                BinOp::Rem => {
                    if y == 0 {
                        return Err(Error::Transform("integer modulo by zero".into()));
                    }
                    x.checked_rem(y).map(|r| if r != 0 && (r < 0) != (y < 0) { r + y } else { r })
                }
                _ => return Err(type_error(op, &a, &b)),
            };
            r.map(Value::Int).ok_or_else(|| overflow(op))
        }
        (x, y) => {
            let (x, y) = (as_f64(&x), as_f64(&y));
            Ok(Value::Float(match op {
                BinOp::Add => x + y,
                BinOp::Sub => x - y,
                BinOp::Mul => x * y,
                BinOp::Rem => {
                    if y == 0.0 {
                        return Err(Error::Transform("float modulo by zero".into()));
                    }
                    py_rem_f64(x, y)
                }
                _ => return Err(type_error(op, &a, &b)),
            }))
        }
    }
}

fn as_f64(n: &Num) -> f64 {
    match n {
        Num::Int(i) => *i as f64,
        Num::Float(f) => *f,
    }
}
