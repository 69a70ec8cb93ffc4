//! Column selection and column-adding views.
//!
//! Field selectors resolve when a pass starts; positions past the end of a
//! short row read as the view's `missing` value.

use std::collections::HashSet;
use std::sync::Arc;

use tabflow_core::error::{Error, Result};
use tabflow_core::field::{resolve_all, Field};
use tabflow_core::hash::{Fingerprint, Hash256};
use tabflow_core::record::Record;
use tabflow_core::table::{pad_row, project, RowIter, SharedTable, Table};
use tabflow_core::value::Value;

use crate::traits::{fields_arc, pull, step_iter, Compiled, Derive};

/// Positions of `target` names in `header`.
pub(crate) fn indices_of(target: &[String], header: &[String]) -> Result<Vec<usize>> {
    target
        .iter()
        .map(|name| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| Error::FieldNotFound(format!("'{name}' not in header {header:?}")))
        })
        .collect()
}

/// Reorder/select columns by position list; the basis of cut, cutout and
/// movefield.
fn projected<'a>(it: RowIter<'a>, indices: Vec<usize>, missing: Value) -> RowIter<'a> {
    let header = indices.iter().map(|&i| it.header()[i].clone()).collect();
    RowIter::new(
        header,
        it.map(move |r| r.map(|row| project(&row, &indices, &missing))),
    )
}

/// Keep only the selected fields, in the order given.
pub struct CutView {
    source: SharedTable,
    fields: Vec<Field>,
    missing: Value,
}

impl CutView {
    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }
}

impl Table for CutView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let it = self.source.iter()?;
        let indices = resolve_all(&self.fields, it.header())?;
        Ok(projected(it, indices, self.missing.clone()))
    }

    fn cachetag(&self) -> Result<Hash256> {
        Ok(Fingerprint::new("cut")
            .tag(self.source.cachetag()?)
            .serde(&self.fields)?
            .value(&self.missing)?
            .finish())
    }
}

pub fn cut<I, F>(source: SharedTable, fields: I) -> CutView
where
    I: IntoIterator<Item = F>,
    F: Into<Field>,
{
    CutView {
        source,
        fields: fields.into_iter().map(Into::into).collect(),
        missing: Value::Null,
    }
}

/// Drop the selected fields, keeping the rest in order.
pub struct CutOutView {
    source: SharedTable,
    fields: Vec<Field>,
    missing: Value,
}

impl CutOutView {
    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }
}

impl Table for CutOutView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let it = self.source.iter()?;
        let drop: HashSet<usize> = resolve_all(&self.fields, it.header())?
            .into_iter()
            .collect();
        let indices = (0..it.header().len()).filter(|i| !drop.contains(i)).collect();
        Ok(projected(it, indices, self.missing.clone()))
    }

    fn cachetag(&self) -> Result<Hash256> {
        Ok(Fingerprint::new("cutout")
            .tag(self.source.cachetag()?)
            .serde(&self.fields)?
            .value(&self.missing)?
            .finish())
    }
}

pub fn cutout<I, F>(source: SharedTable, fields: I) -> CutOutView
where
    I: IntoIterator<Item = F>,
    F: Into<Field>,
{
    CutOutView {
        source,
        fields: fields.into_iter().map(Into::into).collect(),
        missing: Value::Null,
    }
}

/// Move one field to a new position.
pub struct MoveFieldView {
    source: SharedTable,
    field: Field,
    index: usize,
    missing: Value,
}

impl Table for MoveFieldView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let it = self.source.iter()?;
        let from = self.field.resolve(it.header())?;
        let mut indices: Vec<usize> = (0..it.header().len()).filter(|&i| i != from).collect();
        if self.index > indices.len() {
            return Err(Error::Spec(format!(
                "cannot move '{}' to position {} of {} fields",
                self.field,
                self.index,
                it.header().len()
            )));
        }
        indices.insert(self.index, from);
        Ok(projected(it, indices, self.missing.clone()))
    }
}

pub fn movefield(source: SharedTable, field: impl Into<Field>, index: usize) -> MoveFieldView {
    MoveFieldView {
        source,
        field: field.into(),
        index,
        missing: Value::Null,
    }
}

/// Add a computed field, appended or inserted at `index`.
pub struct AddFieldView {
    source: SharedTable,
    field: String,
    value: Derive,
    index: Option<usize>,
    missing: Value,
}

impl AddFieldView {
    pub fn index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }
}

impl Table for AddFieldView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let it = self.source.iter()?;
        let src_header = it.header().clone();
        let compiled = Compiled::new(&self.value, &src_header)?;
        let fields = fields_arc(&src_header);
        let width = src_header.len();
        let index = match self.index {
            Some(i) if i > width => {
                return Err(Error::Spec(format!(
                    "cannot insert '{}' at position {i} of {width} fields",
                    self.field
                )))
            }
            other => other,
        };
        let mut header = src_header;
        match index {
            Some(i) => header.insert(i, self.field.clone()),
            None => header.push(self.field.clone()),
        }
        let missing = self.missing.clone();
        let rows = it.map(move |r| {
            let row = pad_row(r?, width, &missing);
            let rec = Record::new(Arc::clone(&fields), row, missing.clone());
            let v = compiled.eval(&rec)?;
            let mut row = rec.into_values();
            match index {
                Some(i) => row.insert(i, v),
                None => row.push(v),
            }
            Ok(row)
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn addfield(source: SharedTable, field: impl Into<String>, value: impl Into<Derive>) -> AddFieldView {
    AddFieldView {
        source,
        field: field.into(),
        value: value.into(),
        index: None,
        missing: Value::Null,
    }
}

/// Add a column of given values, pairing them with rows by position.
///
/// When the table runs out first the extra values get rows of `missing`;
/// when the values run out first the remaining rows get `missing`.
pub struct AddColumnView {
    source: SharedTable,
    field: String,
    values: Arc<Vec<Value>>,
    index: Option<usize>,
    missing: Value,
}

impl AddColumnView {
    pub fn index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }
}

impl Table for AddColumnView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let mut it = self.source.iter()?;
        let width = it.header().len();
        let index = self.index.unwrap_or(width).min(width);
        let mut header = it.header().clone();
        header.insert(index, self.field.clone());
        let values = Arc::clone(&self.values);
        let missing = self.missing.clone();
        let mut pos = 0;
        let rows = step_iter(move || {
            let row = pull(&mut it)?;
            let value = values.get(pos).cloned();
            pos += 1;
            let (row, value) = match (row, value) {
                (None, None) => return Ok(None),
                (row, value) => (
                    row.unwrap_or_default(),
                    value.unwrap_or_else(|| missing.clone()),
                ),
            };
            let mut row = pad_row(row, width, &missing);
            row.insert(index, value);
            Ok(Some(row))
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn addcolumn<I, V>(source: SharedTable, field: impl Into<String>, values: I) -> AddColumnView
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    AddColumnView {
        source,
        field: field.into(),
        values: Arc::new(values.into_iter().map(Into::into).collect()),
        index: None,
        missing: Value::Null,
    }
}

/// Prepend a running row number.
pub struct AddRowNumbersView {
    source: SharedTable,
    start: i64,
    step: i64,
    field: String,
}

impl AddRowNumbersView {
    pub fn start(mut self, start: i64) -> Self {
        self.start = start;
        self
    }

    pub fn step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

impl Table for AddRowNumbersView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let it = self.source.iter()?;
        let mut header = Vec::with_capacity(it.header().len() + 1);
        header.push(self.field.clone());
        header.extend(it.header().iter().cloned());
        let mut n = self.start;
        let step = self.step;
        let rows = it.map(move |r| {
            let mut row = r?;
            row.insert(0, Value::Int(n));
            n += step;
            Ok(row)
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn addrownumbers(source: SharedTable) -> AddRowNumbersView {
    AddRowNumbersView {
        source,
        start: 1,
        step: 1,
        field: "row".to_string(),
    }
}
