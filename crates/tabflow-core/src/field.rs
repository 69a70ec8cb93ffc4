//! Field selectors and key specifications.
//!
//! A field may be named or addressed by position; both forms are accepted
//! everywhere a field is expected. Resolution happens at iteration time
//! against the header actually encountered.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Name(String),
    Index(usize),
}

impl Field {
    /// Resolve to a column index. Names win over indices; an index must be
    /// inside the header.
    pub fn resolve(&self, header: &[String]) -> Result<usize> {
        match self {
            Field::Name(name) => header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| Error::FieldNotFound(format!("'{name}' not in header {header:?}"))),
            Field::Index(i) if *i < header.len() => Ok(*i),
            Field::Index(i) => Err(Error::FieldNotFound(format!(
                "index {i} out of range for {} fields",
                header.len()
            ))),
        }
    }

    /// The header name this selector refers to.
    pub fn name_in(&self, header: &[String]) -> Result<String> {
        let idx = self.resolve(header)?;
        Ok(header[idx].clone())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Name(n) => f.write_str(n),
            Field::Index(i) => write!(f, "#{i}"),
        }
    }
}

impl From<&str> for Field {
    fn from(v: &str) -> Self {
        Field::Name(v.to_string())
    }
}

impl From<String> for Field {
    fn from(v: String) -> Self {
        Field::Name(v)
    }
}

impl From<&String> for Field {
    fn from(v: &String) -> Self {
        Field::Name(v.clone())
    }
}

impl From<usize> for Field {
    fn from(v: usize) -> Self {
        Field::Index(v)
    }
}

/// Resolve a list of selectors to indices.
pub fn resolve_all(fields: &[Field], header: &[String]) -> Result<Vec<usize>> {
    fields.iter().map(|f| f.resolve(header)).collect()
}

/// Build a selector list from anything field-like.
pub fn fields<I, F>(items: I) -> Vec<Field>
where
    I: IntoIterator<Item = F>,
    F: Into<Field>,
{
    items.into_iter().map(Into::into).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Ordered key fields, each with its own direction. Empty means "whole row".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeySpec {
    parts: Vec<(Field, SortOrder)>,
}

impl KeySpec {
    /// Compare entire rows.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new<I, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Self {
            parts: fields.into_iter().map(|f| (f.into(), SortOrder::Asc)).collect(),
        }
    }

    pub fn asc(mut self, field: impl Into<Field>) -> Self {
        self.parts.push((field.into(), SortOrder::Asc));
        self
    }

    pub fn desc(mut self, field: impl Into<Field>) -> Self {
        self.parts.push((field.into(), SortOrder::Desc));
        self
    }

    pub fn is_whole_row(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.parts.iter().map(|(f, _)| f)
    }

    pub fn parts(&self) -> &[(Field, SortOrder)] {
        &self.parts
    }

    /// Resolve to `(index, order)` pairs; `None` for whole-row keys.
    pub fn resolve(&self, header: &[String]) -> Result<Option<Vec<(usize, SortOrder)>>> {
        if self.parts.is_empty() {
            return Ok(None);
        }
        self.parts
            .iter()
            .map(|(f, o)| Ok((f.resolve(header)?, *o)))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Indices of the key fields; whole-row keys expand to every column.
    pub fn indices(&self, header: &[String]) -> Result<Vec<usize>> {
        Ok(match self.resolve(header)? {
            Some(parts) => parts.into_iter().map(|(i, _)| i).collect(),
            None => (0..header.len()).collect(),
        })
    }
}

impl From<&str> for KeySpec {
    fn from(v: &str) -> Self {
        KeySpec::new([v])
    }
}

impl From<String> for KeySpec {
    fn from(v: String) -> Self {
        KeySpec::new([v])
    }
}

impl From<usize> for KeySpec {
    fn from(v: usize) -> Self {
        KeySpec::new([v])
    }
}

impl From<Field> for KeySpec {
    fn from(v: Field) -> Self {
        KeySpec::new([v])
    }
}

impl From<Vec<Field>> for KeySpec {
    fn from(v: Vec<Field>) -> Self {
        KeySpec::new(v)
    }
}

impl From<Vec<&str>> for KeySpec {
    fn from(v: Vec<&str>) -> Self {
        KeySpec::new(v)
    }
}

impl<const N: usize> From<[&str; N]> for KeySpec {
    fn from(v: [&str; N]) -> Self {
        KeySpec::new(v)
    }
}

impl From<Option<KeySpec>> for KeySpec {
    fn from(v: Option<KeySpec>) -> Self {
        v.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Vec<String> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn names_and_indices_resolve() {
        assert_eq!(Field::from("b").resolve(&header()).unwrap(), 1);
        assert_eq!(Field::from(2usize).resolve(&header()).unwrap(), 2);
    }

    #[test]
    fn unresolved_fields_are_errors() {
        assert!(matches!(
            Field::from("z").resolve(&header()),
            Err(Error::FieldNotFound(_))
        ));
        assert!(Field::from(3usize).resolve(&header()).is_err());
    }

    #[test]
    fn whole_row_key_expands_to_all_columns() {
        assert_eq!(KeySpec::all().indices(&header()).unwrap(), vec![0, 1, 2]);
        assert_eq!(
            KeySpec::from("c").desc("a").resolve(&header()).unwrap(),
            Some(vec![(2, SortOrder::Asc), (0, SortOrder::Desc)])
        );
    }
}
