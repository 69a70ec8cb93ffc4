use std::collections::{HashSet, VecDeque};

use tabflow_core::error::{Error, Result};
use tabflow_core::field::{resolve_all, Field};
use tabflow_core::table::{project, Header, Row, RowIter, SharedTable, Table};
use tabflow_core::value::Value;

use crate::traits::{pull, step_iter};

/// Wide to long: one output row per (row, variable field).
///
/// Short rows: key fields past the end read as `Null`. A variable field past
/// the end produces no output row, unless a `missing` value is set, in which
/// case it is emitted with that value.
pub struct MeltView {
    source: SharedTable,
    key: Option<Vec<Field>>,
    variables: Option<Vec<Field>>,
    variablefield: String,
    valuefield: String,
    missing: Option<Value>,
}

fn fields_of<I, F>(fields: I) -> Vec<Field>
where
    I: IntoIterator<Item = F>,
    F: Into<Field>,
{
    fields.into_iter().map(Into::into).collect()
}

impl MeltView {
    /// Fields held fixed on every output row.
    pub fn key<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.key = Some(fields_of(fields));
        self
    }

    /// Fields turned into (variable, value) pairs.
    pub fn variables<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.variables = Some(fields_of(fields));
        self
    }

    pub fn variablefield(mut self, name: impl Into<String>) -> Self {
        self.variablefield = name.into();
        self
    }

    pub fn valuefield(mut self, name: impl Into<String>) -> Self {
        self.valuefield = name.into();
        self
    }

    /// Emit variables missing from short rows with this value (and fill
    /// short key fields with it) instead of skipping them.
    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = Some(missing);
        self
    }

    /// `(key indices, variable indices)`, each defaulting to the other's
    /// complement.
    fn layout(&self, header: &[String]) -> Result<(Vec<usize>, Vec<usize>)> {
        let complement = |taken: &[usize]| -> Vec<usize> {
            let taken: HashSet<usize> = taken.iter().copied().collect();
            (0..header.len()).filter(|i| !taken.contains(i)).collect()
        };
        match (&self.key, &self.variables) {
            (None, None) => Err(Error::Spec(
                "melt needs a key or a list of variables".into(),
            )),
            (Some(k), None) => {
                let k = resolve_all(k, header)?;
                let v = complement(&k);
                Ok((k, v))
            }
            (None, Some(v)) => {
                let v = resolve_all(v, header)?;
                let k = complement(&v);
                Ok((k, v))
            }
            (Some(k), Some(v)) => Ok((resolve_all(k, header)?, resolve_all(v, header)?)),
        }
    }
}

impl Table for MeltView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let mut it = self.source.iter()?;
        let (key, variables) = self.layout(it.header())?;
        let names: Vec<Value> = variables
            .iter()
            .map(|&i| Value::Str(it.header()[i].clone()))
            .collect();
        let mut header: Header = key.iter().map(|&i| it.header()[i].clone()).collect();
        header.push(self.variablefield.clone());
        header.push(self.valuefield.clone());

        let missing = self.missing.clone();
        let key_fill = missing.clone().unwrap_or(Value::Null);
        let mut pending: VecDeque<Row> = VecDeque::new();
        let rows = step_iter(move || loop {
            if let Some(row) = pending.pop_front() {
                return Ok(Some(row));
            }
            let Some(row) = pull(&mut it)? else {
                return Ok(None);
            };
            let fixed = project(&row, &key, &key_fill);
            for (name, &vi) in names.iter().zip(&variables) {
                if let Some(v) = row.get(vi).or(missing.as_ref()) {
                    let mut out = Vec::with_capacity(fixed.len() + 2);
                    out.extend(fixed.iter().cloned());
                    out.push(name.clone());
                    out.push(v.clone());
                    pending.push_back(out);
                }
            }
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn melt(source: SharedTable) -> MeltView {
    MeltView {
        source,
        key: None,
        variables: None,
        variablefield: "variable".to_string(),
        valuefield: "value".to_string(),
        missing: None,
    }
}
