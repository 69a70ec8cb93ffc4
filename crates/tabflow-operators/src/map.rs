//! Per-row calculated tables: `fieldmap`, `rowmap`, `rowmapmany`, and the
//! `coalesce` helper.

use std::collections::HashMap;
use std::sync::Arc;

use tabflow_core::error::Result;
use tabflow_core::field::Field;
use tabflow_core::record::Record;
use tabflow_core::table::{Header, Row, RowIter, SharedTable, Table};
use tabflow_core::value::Value;
use tracing::debug;

use crate::expr::Expr;
use crate::traits::{fields_arc, RecordFn, RowFn, RowsFn, ValueFn};

/// How one output field of a [`FieldMapView`] is computed.
#[derive(Clone)]
pub enum Mapping {
    /// Copy a source field.
    Field(Field),
    /// Evaluate an expression over the record.
    Expr(String),
    Func(RecordFn),
    /// Apply a function to one source field.
    Translate(Field, ValueFn),
    /// Look the source value up; values not in the map pass through.
    Lookup(Field, Arc<HashMap<Value, Value>>),
}

impl Mapping {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Record) -> Result<Value> + Send + Sync + 'static,
    {
        Mapping::Func(Arc::new(f))
    }

    pub fn translate<F>(field: impl Into<Field>, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        Mapping::Translate(field.into(), Arc::new(f))
    }

    pub fn lookup<I, K, V>(field: impl Into<Field>, table: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        let map = table.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Mapping::Lookup(field.into(), Arc::new(map))
    }
}

/// Text containing `{` is an expression, otherwise a field name.
impl From<&str> for Mapping {
    fn from(s: &str) -> Self {
        if s.contains('{') {
            Mapping::Expr(s.to_string())
        } else {
            Mapping::Field(Field::from(s))
        }
    }
}

impl From<usize> for Mapping {
    fn from(i: usize) -> Self {
        Mapping::Field(Field::Index(i))
    }
}

impl From<Field> for Mapping {
    fn from(f: Field) -> Self {
        Mapping::Field(f)
    }
}

impl std::fmt::Debug for Mapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mapping::Field(x) => f.debug_tuple("Field").field(x).finish(),
            Mapping::Expr(s) => f.debug_tuple("Expr").field(s).finish(),
            Mapping::Func(_) => f.write_str("Func(..)"),
            Mapping::Translate(x, _) => f.debug_tuple("Translate").field(x).finish(),
            Mapping::Lookup(x, m) => write!(f, "Lookup({x}, {} entries)", m.len()),
        }
    }
}

enum Resolved {
    Index(usize),
    Expr(Expr),
    Func(RecordFn),
    Translate(usize, ValueFn),
    Lookup(usize, Arc<HashMap<Value, Value>>),
}

impl Resolved {
    fn new(mapping: &Mapping, header: &[String]) -> Result<Self> {
        Ok(match mapping {
            Mapping::Field(f) => Resolved::Index(f.resolve(header)?),
            Mapping::Expr(src) => {
                let e = Expr::parse(src)?;
                e.check_fields(header)?;
                Resolved::Expr(e)
            }
            Mapping::Func(f) => Resolved::Func(Arc::clone(f)),
            Mapping::Translate(f, g) => Resolved::Translate(f.resolve(header)?, Arc::clone(g)),
            Mapping::Lookup(f, m) => Resolved::Lookup(f.resolve(header)?, Arc::clone(m)),
        })
    }

    fn eval(&self, rec: &Record) -> Result<Value> {
        match self {
            Resolved::Index(i) => Ok(rec.at(*i).clone()),
            Resolved::Expr(e) => e.eval(rec),
            Resolved::Func(f) => f(rec),
            Resolved::Translate(i, g) => g(rec.at(*i)),
            Resolved::Lookup(i, m) => {
                let v = rec.at(*i);
                Ok(m.get(v).cloned().unwrap_or_else(|| v.clone()))
            }
        }
    }
}

/// Table whose fields are each computed from the source record.
///
/// Output fields keep their declaration order; declaring a field again
/// replaces its mapping in place.
pub struct FieldMapView {
    source: SharedTable,
    mappings: Vec<(String, Mapping)>,
    failonerror: bool,
    errorvalue: Value,
}

impl FieldMapView {
    /// Declare or overwrite an output field.
    pub fn set(mut self, field: impl Into<String>, mapping: impl Into<Mapping>) -> Self {
        self.insert(field, mapping);
        self
    }

    /// In-place form of [`FieldMapView::set`].
    pub fn insert(&mut self, field: impl Into<String>, mapping: impl Into<Mapping>) {
        let field = field.into();
        let mapping = mapping.into();
        match self.mappings.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = mapping,
            None => self.mappings.push((field, mapping)),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.mappings.iter().map(|(n, _)| n.as_str())
    }

    /// Halt the pass on the first failing mapping instead of substituting
    /// `errorvalue`.
    pub fn failonerror(mut self, on: bool) -> Self {
        self.failonerror = on;
        self
    }

    pub fn errorvalue(mut self, value: Value) -> Self {
        self.errorvalue = value;
        self
    }
}

impl Table for FieldMapView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let it = self.source.iter()?;
        let fields = fields_arc(it.header());
        let resolved = self
            .mappings
            .iter()
            .map(|(_, m)| Resolved::new(m, it.header()))
            .collect::<Result<Vec<_>>>()?;
        let header: Header = self.mappings.iter().map(|(n, _)| n.clone()).collect();
        let failonerror = self.failonerror;
        let errorvalue = self.errorvalue.clone();
        let rows = it.map(move |r| {
            let rec = Record::new(Arc::clone(&fields), r?, Value::Null);
            resolved
                .iter()
                .map(|m| match m.eval(&rec) {
                    Ok(v) => Ok(v),
                    Err(e) if failonerror => Err(e),
                    Err(_) => Ok(errorvalue.clone()),
                })
                .collect::<Result<Row>>()
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn fieldmap(source: SharedTable) -> FieldMapView {
    FieldMapView {
        source,
        mappings: Vec::new(),
        failonerror: false,
        errorvalue: Value::Null,
    }
}

/// One output row per input row, built by a callback.
///
/// Rows for which the callback fails are dropped unless `failonerror`.
pub struct RowMapView {
    source: SharedTable,
    f: RowFn,
    header: Header,
    failonerror: bool,
}

impl RowMapView {
    pub fn failonerror(mut self, on: bool) -> Self {
        self.failonerror = on;
        self
    }
}

impl Table for RowMapView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let it = self.source.iter()?;
        let fields = fields_arc(it.header());
        let f = Arc::clone(&self.f);
        let failonerror = self.failonerror;
        let rows = it.filter_map(move |r| {
            let rec = match r {
                Ok(row) => Record::new(Arc::clone(&fields), row, Value::Null),
                Err(e) => return Some(Err(e)),
            };
            match f(&rec) {
                Ok(row) => Some(Ok(row)),
                Err(e) if failonerror => Some(Err(e)),
                Err(e) => {
                    debug!(error = %e, "rowmap dropped row");
                    None
                }
            }
        });
        Ok(RowIter::new(self.header.clone(), rows))
    }
}

pub fn rowmap<F, I, S>(source: SharedTable, f: F, header: I) -> RowMapView
where
    F: Fn(&Record) -> Result<Row> + Send + Sync + 'static,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RowMapView {
        source,
        f: Arc::new(f),
        header: header.into_iter().map(Into::into).collect(),
        failonerror: false,
    }
}

/// Zero or more output rows per input row.
pub struct RowMapManyView {
    source: SharedTable,
    f: RowsFn,
    header: Header,
    failonerror: bool,
}

impl RowMapManyView {
    pub fn failonerror(mut self, on: bool) -> Self {
        self.failonerror = on;
        self
    }
}

impl Table for RowMapManyView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let it = self.source.iter()?;
        let fields = fields_arc(it.header());
        let f = Arc::clone(&self.f);
        let failonerror = self.failonerror;
        let rows = it.flat_map(move |r| -> Vec<Result<Row>> {
            let rec = match r {
                Ok(row) => Record::new(Arc::clone(&fields), row, Value::Null),
                Err(e) => return vec![Err(e)],
            };
            match f(&rec) {
                Ok(rows) => rows.into_iter().map(Ok).collect(),
                Err(e) if failonerror => vec![Err(e)],
                Err(e) => {
                    debug!(error = %e, "rowmapmany dropped row");
                    Vec::new()
                }
            }
        });
        Ok(RowIter::new(self.header.clone(), rows))
    }
}

pub fn rowmapmany<F, I, S>(source: SharedTable, f: F, header: I) -> RowMapManyView
where
    F: Fn(&Record) -> Result<Vec<Row>> + Send + Sync + 'static,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RowMapManyView {
        source,
        f: Arc::new(f),
        header: header.into_iter().map(Into::into).collect(),
        failonerror: false,
    }
}

/// Callback returning the first of `fields` (all fields when empty) whose
/// value is not `missing`, else `default`.
pub fn coalesce(fields: Vec<Field>, missing: Value, default: Value) -> RecordFn {
    Arc::new(move |rec: &Record| -> Result<Value> {
        if fields.is_empty() {
            return Ok(rec
                .values()
                .iter()
                .find(|v| **v != missing)
                .cloned()
                .unwrap_or_else(|| default.clone()));
        }
        for f in &fields {
            let v = rec.field(f)?;
            if *v != missing {
                return Ok(v.clone());
            }
        }
        Ok(default.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabflow_core::error::Error;
    use tabflow_core::row;
    use tabflow_core::table::MemTable;

    fn table() -> SharedTable {
        MemTable::from_rows(vec![
            row!["id", "sex", "age", "height", "weight"],
            row![1, "male", 16, 1.45, 62.0],
            row![2, "female", 19, 1.34, 55.4],
            row![3, "female", 17, 1.78, 74.4],
            row![4, "male", 21, 1.33, 45.2],
            row![5, "-", 25, 1.65, 51.9],
        ])
        .shared()
    }

    #[test]
    fn fieldmap_mixes_mapping_kinds() {
        let view = fieldmap(table())
            .set("subject_id", "id")
            .set("gender", Mapping::lookup("sex", [("male", "M"), ("female", "F")]))
            .set("age_months", "{age} * 12")
            .set(
                "bmi",
                Mapping::func(|r| {
                    let w = r.get("weight")?.as_f64().unwrap_or(f64::NAN);
                    let h = r.get("height")?.as_f64().unwrap_or(f64::NAN);
                    Ok(Value::Float((w / (h * h) * 10.0).round() / 10.0))
                }),
            );
        let it = view.iter().unwrap();
        assert_eq!(it.header(), &vec!["subject_id", "gender", "age_months", "bmi"]);
        let rows = it.collect_rows().unwrap();
        assert_eq!(rows[0], row![1, "M", 192, 29.5]);
        assert_eq!(rows[4][1], Value::from("-"));
    }

    #[test]
    fn fieldmap_overwrites_in_place() {
        let mut view = fieldmap(table()).set("a", "id").set("b", "age");
        view.insert("a", Mapping::translate("id", |v| Ok(Value::Int(v.as_i64().unwrap_or(0) * 100))));
        assert_eq!(view.fields().collect::<Vec<_>>(), vec!["a", "b"]);
        let rows = view.iter().unwrap().collect_rows().unwrap();
        assert_eq!(rows[1], row![200, 19]);
    }

    #[test]
    fn fieldmap_error_policy() {
        let bad = || Mapping::func(|_| Err(Error::Transform("nope".into())));
        let rows = fieldmap(table())
            .set("x", bad())
            .errorvalue(Value::from("err"))
            .iter()
            .unwrap()
            .collect_rows()
            .unwrap();
        assert_eq!(rows[0], row!["err"]);
        let it_view = fieldmap(table()).set("x", bad()).failonerror(true);
        let mut it = it_view.iter().unwrap();
        assert!(it.next().unwrap().is_err());
    }

    #[test]
    fn fieldmap_unknown_field_is_invalid() {
        assert!(fieldmap(table()).set("x", "nope").iter().is_err());
        assert!(fieldmap(table()).set("x", "{nope} + 1").iter().is_err());
    }

    #[test]
    fn rowmap_drops_failures_unless_asked() {
        let f = |r: &Record| -> Result<Row> {
            let age = r.get("age")?.as_i64().ok_or_else(|| Error::Transform("age".into()))?;
            if age > 20 {
                return Err(Error::Transform("too old".into()));
            }
            Ok(vec![r.get("id")?.clone(), Value::Int(age + 1)])
        };
        let rows_view = rowmap(table(), f, ["id", "next_age"]);
        let rows = rows_view.iter().unwrap().collect_rows().unwrap();
        assert_eq!(rows.len(), 3);
        let all_view = rowmap(table(), f, ["id", "next_age"]).failonerror(true);
        let all = all_view.iter().unwrap().collect_rows();
        assert!(all.is_err());
    }

    #[test]
    fn rowmapmany_expands() {
        let view = rowmapmany(
            table(),
            |r| {
                let id = r.get("id")?.clone();
                Ok(vec![
                    vec![id.clone(), Value::from("age"), r.get("age")?.clone()],
                    vec![id, Value::from("height"), r.get("height")?.clone()],
                ])
            },
            ["id", "variable", "value"],
        );
        let rows = view.iter().unwrap().collect_rows().unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[1], row![1, "height", 1.45]);
    }

    #[test]
    fn coalesce_picks_first_present() {
        let t = MemTable::from_rows(vec![
            row!["a", "b", "c"],
            row![Value::Null, 2, 3],
            row![Value::Null, Value::Null],
        ])
        .shared();
        let view = fieldmap(t).set("x", Mapping::Func(coalesce(
            vec!["a".into(), "b".into(), "c".into()],
            Value::Null,
            Value::from("none"),
        )));
        let rows = view.iter().unwrap().collect_rows().unwrap();
        assert_eq!(rows, vec![row![2], row!["none"]]);
    }
}
