//! Header-aware view over one row.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::field::Field;
use crate::table::Row;
use crate::value::Value;

/// A row paired with its header so callbacks can address fields by name.
///
/// Positions past the end of a short row read as `missing`.
#[derive(Debug, Clone)]
pub struct Record {
    fields: Arc<[String]>,
    values: Row,
    missing: Value,
}

impl Record {
    pub fn new(fields: Arc<[String]>, values: Row, missing: Value) -> Self {
        Self {
            fields,
            values,
            missing,
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Row {
        self.values
    }

    /// Value of the named field. Unknown names are an error; known names
    /// beyond the row's end read as `missing`.
    pub fn get(&self, name: &str) -> Result<&Value> {
        let idx = self
            .fields
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| Error::FieldNotFound(format!("'{name}' not in record")))?;
        Ok(self.at(idx))
    }

    pub fn at(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&self.missing)
    }

    pub fn field(&self, field: &Field) -> Result<&Value> {
        match field {
            Field::Name(n) => self.get(n),
            Field::Index(i) => Ok(self.at(*i)),
        }
    }

    /// Values in header order, padded with `missing` (long rows keep extras).
    pub fn padded(&self) -> Row {
        let mut out = self.values.clone();
        if out.len() < self.fields.len() {
            out.resize(self.fields.len(), self.missing.clone());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
