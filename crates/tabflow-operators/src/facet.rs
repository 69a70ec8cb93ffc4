//! Facets: split one table into several views by the value of a field.
//!
//! The value set (or the numeric limits) is discovered with one pass when
//! the facet is built. Each returned view is lazy and re-reads the source.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tabflow_core::error::{Error, Result};
use tabflow_core::field::Field;
use tabflow_core::hash::{Fingerprint, Hash256};
use tabflow_core::table::{RowIter, SharedTable, Table};
use tabflow_core::value::Value;
use tracing::debug;

#[derive(Debug, Clone)]
enum Selector {
    Eq(Value),
    /// `lower <= v < upper`, or `<= upper` when closed.
    Range { lower: f64, upper: f64, closed: bool },
}

fn numeric(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) if !f.is_nan() => Some(*f),
        _ => None,
    }
}

impl Selector {
    fn accepts(&self, v: &Value) -> bool {
        match self {
            Selector::Eq(want) => v == want,
            Selector::Range { lower, upper, closed } => match numeric(v) {
                Some(x) => *lower <= x && (x < *upper || (*closed && x <= *upper)),
                None => false,
            },
        }
    }
}

/// Rows of `source` whose `field` value passes a selector. Short rows read
/// the field as `Null`.
pub struct SelectView {
    source: SharedTable,
    field: Field,
    selector: Selector,
}

impl Table for SelectView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let it = self.source.iter()?;
        let header = it.header().clone();
        let idx = self.field.resolve(&header)?;
        let selector = &self.selector;
        let rows = it.filter(move |r| match r {
            Ok(row) => selector.accepts(row.get(idx).unwrap_or(&Value::Null)),
            Err(_) => true,
        });
        Ok(RowIter::new(header, rows))
    }

    fn cachetag(&self) -> Result<Hash256> {
        let fp = Fingerprint::new("select")
            .tag(self.source.cachetag()?)
            .serde(&self.field)?;
        let fp = match &self.selector {
            Selector::Eq(v) => fp.str("eq").value(v)?,
            Selector::Range { lower, upper, closed } => fp
                .str("range")
                .u64(lower.to_bits())
                .u64(upper.to_bits())
                .flag(*closed),
        };
        Ok(fp.finish())
    }
}

fn select(source: SharedTable, field: Field, selector: Selector) -> SharedTable {
    Arc::new(SelectView {
        source,
        field,
        selector,
    })
}

/// Every distinct value of `field` mapped to a view of the rows holding it.
pub fn facet(source: SharedTable, field: impl Into<Field>) -> Result<BTreeMap<Value, SharedTable>> {
    let field = field.into();
    let mut values = BTreeSet::new();
    {
        let it = source.iter()?;
        let idx = field.resolve(it.header())?;
        for r in it {
            values.insert(r?.get(idx).cloned().unwrap_or(Value::Null));
        }
    }
    debug!(facets = values.len(), "facet values");
    Ok(values
        .into_iter()
        .map(|v| {
            let view = select(Arc::clone(&source), field.clone(), Selector::Eq(v.clone()));
            (v, view)
        })
        .collect())
}

/// One bin of a [`rangefacet`].
pub struct RangeBin {
    pub lower: f64,
    pub upper: f64,
    pub table: SharedTable,
}

/// Bins of `width` over the numeric values of `field`, in ascending order.
///
/// Bins are closed on the left and open on the right, except the last which
/// includes `max`. Limits left as `None` are taken from the data; non-numeric
/// values are ignored there and never selected.
pub fn rangefacet(
    source: SharedTable,
    field: impl Into<Field>,
    width: f64,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<Vec<RangeBin>> {
    if !(width.is_finite() && width > 0.0) {
        return Err(Error::Spec(format!("rangefacet width must be positive, got {width}")));
    }
    let field = field.into();
    let (min, max) = match (min, max) {
        (Some(lo), Some(hi)) => (lo, hi),
        (lo, hi) => {
            let it = source.iter()?;
            let idx = field.resolve(it.header())?;
            let mut limits: Option<(f64, f64)> = None;
            for r in it {
                if let Some(x) = r?.get(idx).and_then(numeric) {
                    limits = Some(match limits {
                        Some((a, b)) => (a.min(x), b.max(x)),
                        None => (x, x),
                    });
                }
            }
            match limits {
                Some((a, b)) => (lo.unwrap_or(a), hi.unwrap_or(b)),
                None => return Ok(Vec::new()),
            }
        }
    };

    let mut bins = Vec::new();
    let mut step = 0u32;
    loop {
        let lower = min + width * f64::from(step);
        if lower >= max {
            break;
        }
        let mut upper = lower + width;
        let closed = upper >= max;
        if closed {
            upper = max;
        }
        let selector = Selector::Range { lower, upper, closed };
        bins.push(RangeBin {
            lower,
            upper,
            table: select(Arc::clone(&source), field.clone(), selector),
        });
        if closed {
            break;
        }
        step += 1;
    }
    debug!(bins = bins.len(), min, max, "rangefacet bins");
    Ok(bins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabflow_core::row;
    use tabflow_core::table::{MemTable, Row};

    fn collect(t: &dyn Table) -> Vec<Row> {
        t.iter().unwrap().collect_rows().unwrap()
    }

    #[test]
    fn facet_by_value() {
        let t = MemTable::from_rows(vec![
            row!["foo", "bar", "baz"],
            row!["a", 4, 9.3],
            row!["a", 2, 88.2],
            row!["b", 1, 23.3],
            row!["c", 8, 42.0],
            row!["d", 7, 100.9],
            row!["c", 2],
        ])
        .shared();
        let facets = facet(t, "foo").unwrap();
        let keys: Vec<&Value> = facets.keys().collect();
        assert_eq!(keys, vec![&Value::from("a"), &Value::from("b"), &Value::from("c"), &Value::from("d")]);
        assert_eq!(collect(facets[&Value::from("a")].as_ref()), vec![row!["a", 4, 9.3], row!["a", 2, 88.2]]);
        let c = facets[&Value::from("c")].iter().unwrap();
        assert_eq!(c.header(), &vec!["foo", "bar", "baz"]);
        assert_eq!(c.collect_rows().unwrap(), vec![row!["c", 8, 42.0], row!["c", 2]]);
    }

    #[test]
    fn facet_views_are_cacheable_and_distinct() {
        let t = MemTable::from_rows(vec![row!["k"], row![1], row![2]]).shared();
        let facets = facet(t, "k").unwrap();
        let a = facets[&Value::from(1)].cachetag().unwrap();
        let b = facets[&Value::from(2)].cachetag().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn facet_unknown_field_fails() {
        let t = MemTable::from_rows(vec![row!["k"], row![1]]).shared();
        assert!(matches!(facet(t, "nope"), Err(Error::FieldNotFound(_))));
    }

    fn bars() -> SharedTable {
        MemTable::from_rows(vec![
            row!["foo", "bar"],
            row!["a", 3],
            row!["a", 7],
            row!["b", 2],
            row!["b", 1],
            row!["b", 9],
            row!["c", 4],
            row!["d", 3],
        ])
        .shared()
    }

    #[test]
    fn rangefacet_bins_over_data_limits() {
        let bins = rangefacet(bars(), "bar", 2.0, None, None).unwrap();
        let edges: Vec<(f64, f64)> = bins.iter().map(|b| (b.lower, b.upper)).collect();
        assert_eq!(edges, vec![(1.0, 3.0), (3.0, 5.0), (5.0, 7.0), (7.0, 9.0)]);
        assert_eq!(collect(bins[0].table.as_ref()), vec![row!["b", 2], row!["b", 1]]);
        assert_eq!(
            collect(bins[1].table.as_ref()),
            vec![row!["a", 3], row!["c", 4], row!["d", 3]]
        );
        assert!(collect(bins[2].table.as_ref()).is_empty());
        // the last bin keeps its right edge
        assert_eq!(collect(bins[3].table.as_ref()), vec![row!["a", 7], row!["b", 9]]);
    }

    #[test]
    fn rangefacet_explicit_limits_and_bad_width() {
        let bins = rangefacet(bars(), "bar", 5.0, Some(0.0), Some(8.0)).unwrap();
        let edges: Vec<(f64, f64)> = bins.iter().map(|b| (b.lower, b.upper)).collect();
        assert_eq!(edges, vec![(0.0, 5.0), (5.0, 8.0)]);
        assert_eq!(collect(bins[1].table.as_ref()), vec![row!["a", 7]]);

        assert!(matches!(rangefacet(bars(), "bar", 0.0, None, None), Err(Error::Spec(_))));
        let text = MemTable::from_rows(vec![row!["x"], row!["n/a"]]).shared();
        assert!(rangefacet(text, "x", 1.0, None, None).unwrap().is_empty());
    }
}
