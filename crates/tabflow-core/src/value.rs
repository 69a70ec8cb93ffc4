//! Dynamically typed cell values.
//!
//! Rows carry heterogeneous values (text next to numbers next to `Null`), so
//! `Value` is a closed sum type with a *total* order: sorting or merging a
//! column that mixes kinds never fails. The order is:
//!
//! - `Null` sorts below everything else;
//! - `Int` and `Float` compare numerically with each other (`1 == 1.0`);
//!   NaN sorts after every other number and is equal to itself;
//! - lists compare lexicographically, maps by their sorted entries;
//! - values of different kinds order by kind name
//!   (`bool < bytes < dict < list < number < str`).
//!
//! `PartialEq`, `Eq` and `Hash` are consistent with that order.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// Coarse kind used to order values that are not mutually comparable.
///
/// Variants are declared in the order of their type names, which is the
/// fallback order between kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Null,
    Bool,
    Bytes,
    Dict,
    List,
    Number,
    Str,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Null => "none",
            Kind::Bool => "bool",
            Kind::Bytes => "bytes",
            Kind::Dict => "dict",
            Kind::List => "list",
            Kind::Number => "number",
            Kind::Str => "str",
        }
    }
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) | Value::Float(_) => Kind::Number,
            Value::Str(_) => Kind::Str,
            Value::Bytes(_) => Kind::Bytes,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Dict,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Truthiness: `Null`, `false`, zero, and empty text/collections are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bytes(b) => !b.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Number of items for sequence-like values (text counts chars).
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::Bytes(b) => Some(b.len()),
            Value::List(l) => Some(l.len()),
            Value::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    /// Render the value as a field name (text unquoted, `Null` empty).
    pub fn to_field_name(&self) -> String {
        self.to_string()
    }
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    match a.partial_cmp(&b) {
        Some(ord) => ord,
        None => a.is_nan().cmp(&b.is_nan()),
    }
}

/// 2^63: the first float above every `i64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// `Some(i)` when `f` is integral and exactly representable as an `i64`.
fn exact_i64(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f)).then_some(f as i64)
}

/// Exact comparison, without rounding `a` through `f64`.
fn cmp_int_float(a: i64, b: f64) -> Ordering {
    if b.is_nan() || b >= I64_BOUND {
        return Ordering::Less;
    }
    if b < -I64_BOUND {
        return Ordering::Greater;
    }
    let t = b.trunc();
    match a.cmp(&(t as i64)) {
        Ordering::Equal => t.partial_cmp(&b).unwrap_or(Ordering::Equal),
        ord => ord,
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        use Value::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => cmp_f64(*a, *b),
            (Int(a), Float(b)) => cmp_int_float(*a, *b),
            (Float(a), Int(b)) => cmp_int_float(*b, *a).reverse(),
            (Str(a), Str(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            (List(a), List(b)) => a.cmp(b),
            (Map(a), Map(b)) => a.iter().cmp(b.iter()),
            // Mixed kinds: order by kind name
            _ => self.kind().cmp(&other.kind()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Numbers that compare equal must hash equal: integral floats hash as ints.
        self.kind().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => {
                if let Some(i) = exact_i64(*f) {
                    i.hash(state)
                } else if f.is_nan() {
                    u64::MAX.hash(state)
                } else {
                    f.to_bits().hash(state)
                }
            }
            Value::Str(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::List(l) => l.hash(state),
            Value::Map(m) => m.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => f.write_str(s),
            Value::Bytes(b) => write!(f, "{b:?}"),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Value::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32, usize);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build a `Row` from heterogeneous literals: `row![1, "a", 2.5, Value::Null]`.
#[macro_export]
macro_rules! row {
    () => { ::std::vec::Vec::<$crate::value::Value>::new() };
    ($($v:expr),+ $(,)?) => {
        vec![$($crate::value::Value::from($v)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn h(v: &Value) -> u64 {
        let mut s = DefaultHasher::new();
        v.hash(&mut s);
        s.finish()
    }

    #[test]
    fn null_sorts_first() {
        let mut vals = vec![Value::from("b"), Value::from(3), Value::Null, Value::from(1.5)];
        vals.sort();
        assert_eq!(vals[0], Value::Null);
        assert_eq!(vals[1], Value::from(1.5));
        assert_eq!(vals[2], Value::from(3));
        assert_eq!(vals[3], Value::from("b"));
    }

    #[test]
    fn ints_and_floats_compare_numerically() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert!(Value::from(2) > Value::from(1.5));
        assert!(Value::from(-0.5) < Value::from(0));
        assert_eq!(h(&Value::from(7)), h(&Value::from(7.0)));
    }

    #[test]
    fn int_float_order_is_exact_near_i64_limits() {
        let two_63 = Value::Float(I64_BOUND);
        let max = Value::Int(i64::MAX);
        let below = Value::Int(i64::MAX - 1);
        assert!(below < max);
        assert!(max < two_63);
        assert!(below < two_63);
        assert_eq!(Value::Int(i64::MIN), Value::Float(-I64_BOUND));
        assert_eq!(h(&Value::Int(i64::MIN)), h(&Value::Float(-I64_BOUND)));
        assert!(Value::Int(i64::MIN) > Value::Float(-1e19));
        assert!(Value::Int(3) < Value::Float(3.5));
        assert!(Value::Int(-3) < Value::Float(-2.5));
        assert!(Value::Int(-2) > Value::Float(-2.5));
        assert!(Value::Int(5) < Value::Float(f64::INFINITY));
    }

    #[test]
    fn nan_is_greatest_number_and_self_equal() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(nan, Value::Float(f64::NAN));
        assert!(nan > Value::from(i64::MAX));
        assert!(nan < Value::from("text"));
    }

    #[test]
    fn mixed_kinds_order_by_kind_name() {
        assert!(Value::from(true) < Value::Bytes(vec![0]));
        assert!(Value::List(vec![]) < Value::from(0));
        assert!(Value::from(1_000_000) < Value::from(""));
    }

    #[test]
    fn lists_compare_lexicographically() {
        let a = Value::List(row![1, "x"]);
        let b = Value::List(row![1, "y"]);
        let c = Value::List(row![1]);
        assert!(a < b);
        assert!(c < a);
    }

    #[test]
    fn display_is_unquoted() {
        assert_eq!(Value::from("boy").to_field_name(), "boy");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::List(row![1, "a"]).to_string(), "[1, a]");
    }
}
