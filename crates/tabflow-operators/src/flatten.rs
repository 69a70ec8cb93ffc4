//! Row-major flattening of a table into values, and the inverse regrouping
//! of a value sequence into fixed-width rows.

use std::sync::Arc;

use tabflow_core::error::Result;
use tabflow_core::field::Field;
use tabflow_core::table::{Header, Row, RowIter, SharedTable, Table};
use tabflow_core::value::Value;

use crate::traits::step_iter;

/// Every data value of `table`, row by row (the header is skipped).
pub fn flatten(table: &dyn Table) -> Result<impl Iterator<Item = Result<Value>> + '_> {
    let it = table.iter()?;
    Ok(it.flat_map(|r| -> Box<dyn Iterator<Item = Result<Value>>> {
        match r {
            Ok(row) => Box::new(row.into_iter().map(Ok)),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }))
}

enum Values {
    List(Arc<Vec<Value>>),
    Column(SharedTable, Field),
}

/// Groups consecutive values into rows of `period` fields named
/// `f0..f{period-1}`; a final partial row is padded with `missing`.
pub struct UnflattenView {
    values: Values,
    period: usize,
    missing: Value,
}

impl UnflattenView {
    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }
}

impl Table for UnflattenView {
    fn iter(&self) -> Result<RowIter<'_>> {
        if self.period == 0 {
            return Err(tabflow_core::Error::Spec("unflatten period must be positive".into()));
        }
        let header: Header = (0..self.period).map(|i| format!("f{i}")).collect();
        let mut values: Box<dyn Iterator<Item = Result<Value>> + '_> = match &self.values {
            Values::List(v) => Box::new(v.iter().cloned().map(Ok)),
            Values::Column(source, field) => {
                let it = source.iter()?;
                let idx = field.resolve(it.header())?;
                Box::new(it.map(move |r| r.map(|row| row.get(idx).cloned().unwrap_or(Value::Null))))
            }
        };
        let period = self.period;
        let missing = self.missing.clone();
        let rows = step_iter(move || {
            let mut row: Row = Vec::with_capacity(period);
            while row.len() < period {
                match values.next() {
                    Some(v) => row.push(v?),
                    None => break,
                }
            }
            if row.is_empty() {
                return Ok(None);
            }
            row.resize(period, missing.clone());
            Ok(Some(row))
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn unflatten<I, V>(values: I, period: usize) -> UnflattenView
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    UnflattenView {
        values: Values::List(Arc::new(values.into_iter().map(Into::into).collect())),
        period,
        missing: Value::Null,
    }
}

/// Unflatten the values of one column of `source`.
pub fn unflatten_field(source: SharedTable, field: impl Into<Field>, period: usize) -> UnflattenView {
    UnflattenView {
        values: Values::Column(source, field.into()),
        period,
        missing: Value::Null,
    }
}
