//! Ready-made reducers for `recast`, `pivot` and `fold`.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tabflow_core::error::{Error, Result};
use tabflow_core::value::Value;

use crate::traits::{FoldFn, ReduceFn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agg {
    /// Numeric sum; integers stay integers until a float shows up.
    Sum,
    Count,
    Min,
    Max,
    Mean,
    List,
    First,
    Last,
}

impl Agg {
    /// Nulls are skipped by every aggregate except `Count`, `List`, `First`
    /// and `Last`. An all-null input gives `Null`.
    pub fn apply(self, values: &[Value]) -> Result<Value> {
        let present = || values.iter().filter(|v| !v.is_null());
        Ok(match self {
            Agg::Count => Value::Int(values.len() as i64),
            Agg::List => Value::List(values.to_vec()),
            Agg::First => values.first().cloned().unwrap_or_default(),
            Agg::Last => values.last().cloned().unwrap_or_default(),
            Agg::Min => present().min().cloned().unwrap_or_default(),
            Agg::Max => present().max().cloned().unwrap_or_default(),
            Agg::Sum => {
                let mut acc: Option<Value> = None;
                for v in present() {
                    acc = Some(match acc {
                        None => numeric(v)?.clone(),
                        Some(a) => add_values(a, v.clone())?,
                    });
                }
                acc.unwrap_or_default()
            }
            Agg::Mean => {
                let mut n = 0usize;
                let mut total = 0.0;
                for v in present() {
                    total += numeric(v)?.as_f64().unwrap_or(0.0);
                    n += 1;
                }
                if n == 0 {
                    Value::Null
                } else {
                    Value::Float(total / n as f64)
                }
            }
        })
    }

    pub fn reducer(self) -> ReduceFn {
        Arc::new(move |values: &[Value]| self.apply(values))
    }
}

impl FromStr for Agg {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "sum" => Agg::Sum,
            "count" => Agg::Count,
            "min" => Agg::Min,
            "max" => Agg::Max,
            "mean" | "avg" => Agg::Mean,
            "list" => Agg::List,
            "first" => Agg::First,
            "last" => Agg::Last,
            other => return Err(Error::Spec(format!("unknown aggregate '{other}'"))),
        })
    }
}

fn numeric(v: &Value) -> Result<&Value> {
    match v {
        Value::Int(_) | Value::Float(_) | Value::Bool(_) => Ok(v),
        other => Err(Error::Transform(format!(
            "cannot aggregate non-numeric {} value '{other}'",
            other.kind().name()
        ))),
    }
}

/// Numeric addition with integer overflow promoted to float.
pub fn add_values(a: Value, b: Value) -> Result<Value> {
    match (numeric(&a)?, numeric(&b)?) {
        (Value::Int(x), Value::Int(y)) => Ok(x
            .checked_add(*y)
            .map(Value::Int)
            .unwrap_or(Value::Float(*x as f64 + *y as f64))),
        (x, y) => Ok(Value::Float(
            x.as_f64().unwrap_or(0.0) + y.as_f64().unwrap_or(0.0),
        )),
    }
}

/// Fold step adding two numbers.
pub fn add() -> FoldFn {
    Arc::new(add_values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabflow_core::row;

    #[test]
    fn sums_and_means() {
        assert_eq!(Agg::Sum.apply(&row![1, 2, Value::Null, 3]).unwrap(), Value::Int(6));
        assert_eq!(Agg::Sum.apply(&row![1, 2.5]).unwrap(), Value::Float(3.5));
        assert_eq!(Agg::Sum.apply(&[]).unwrap(), Value::Null);
        assert_eq!(Agg::Mean.apply(&row![1, 2]).unwrap(), Value::Float(1.5));
        assert!(Agg::Sum.apply(&row![1, "x"]).is_err());
    }

    #[test]
    fn order_statistics_skip_nulls() {
        let vals = row![Value::Null, 3, 1, 2];
        assert_eq!(Agg::Min.apply(&vals).unwrap(), Value::Int(1));
        assert_eq!(Agg::Max.apply(&vals).unwrap(), Value::Int(3));
        assert_eq!(Agg::First.apply(&vals).unwrap(), Value::Null);
        assert_eq!(Agg::Count.apply(&vals).unwrap(), Value::Int(4));
        assert_eq!(Agg::List.apply(&vals).unwrap(), Value::List(vals.clone()));
    }

    #[test]
    fn add_promotes_on_overflow() {
        let v = add_values(Value::Int(i64::MAX), Value::Int(1)).unwrap();
        assert!(matches!(v, Value::Float(_)));
        let f = add();
        assert_eq!(f(Value::Int(1), Value::Float(0.5)).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn parses_names() {
        assert_eq!("SUM".parse::<Agg>().unwrap(), Agg::Sum);
        assert_eq!("avg".parse::<Agg>().unwrap(), Agg::Mean);
        assert!("median".parse::<Agg>().is_err());
    }
}
