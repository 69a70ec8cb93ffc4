use std::collections::{BTreeSet, HashMap};

use tabflow_core::config::EngineConfig;
use tabflow_core::error::{Error, Result};
use tabflow_core::field::{resolve_all, Field, KeySpec};
use tabflow_core::sortkey::KeyComparator;
use tabflow_core::table::{project, Header, Row, RowIter, SharedTable, Table};
use tabflow_core::value::Value;
use tracing::debug;

use crate::sort::{SortOptions, Sorter};
use crate::traits::{pull, step_iter, Grouper, ReduceFn};

/// Long to wide: the inverse of melt.
///
/// Reads the source twice. A discovery pass over the first `samplesize` rows
/// finds the distinct values of each variable field, which become the
/// output columns (sorted). The output pass sorts the full source by key and
/// fills one row per key group: no value gives `missing`, one value is taken
/// as is, several are combined by the reducer registered for that column or
/// collected into a list.
pub struct RecastView {
    source: SharedTable,
    key: Option<Vec<Field>>,
    variablefields: Vec<Field>,
    valuefield: Field,
    samplesize: usize,
    reducers: HashMap<String, ReduceFn>,
    missing: Value,
    variables: HashMap<String, Vec<Value>>,
    sorter: Sorter,
}

impl RecastView {
    pub fn key<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.key = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// One or more fields whose values become column names. An empty list
    /// means every field that is neither a key nor the value field.
    pub fn variablefields<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.variablefields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn valuefield(mut self, field: impl Into<Field>) -> Self {
        self.valuefield = field.into();
        self
    }

    pub fn samplesize(mut self, n: usize) -> Self {
        self.samplesize = n;
        self
    }

    /// Combine several values landing in column `name`.
    pub fn reducer(mut self, name: impl Into<String>, f: ReduceFn) -> Self {
        self.reducers.insert(name.into(), f);
        self
    }

    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }

    /// Fix the values of one variable field instead of discovering them.
    pub fn variable_values<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.variables
            .insert(field.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn options(mut self, opts: SortOptions) -> Self {
        let presorted = self.sorter.is_presorted();
        self.sorter = Sorter::new(opts).presorted(presorted);
        self
    }

    pub fn presorted(mut self, presorted: bool) -> Self {
        self.sorter = self.sorter.presorted(presorted);
        self
    }
}

/// Key groups of the output pass; without key fields the whole table is
/// one group.
enum Groups<'a> {
    Keyed(Grouper<'a>),
    Whole(Option<RowIter<'a>>),
}

impl Groups<'_> {
    fn next(&mut self) -> Result<Option<Vec<Row>>> {
        match self {
            Groups::Keyed(g) => g.next_group(),
            Groups::Whole(it) => match it.take() {
                Some(it) => {
                    let rows = it.collect_rows()?;
                    Ok((!rows.is_empty()).then_some(rows))
                }
                None => Ok(None),
            },
        }
    }
}

/// Resolved layout of one recast pass.
struct Plan {
    key: Vec<usize>,
    /// `(variable field index, its column values)`
    variables: Vec<(usize, Vec<Value>)>,
    value: usize,
    header: Header,
}

impl RecastView {
    fn plan(&self) -> Result<Plan> {
        let mut it = self.source.iter()?;
        let header = it.header().clone();
        let value = self.valuefield.resolve(&header)?;
        let named_vars = resolve_all(&self.variablefields, &header)?;
        let key = match &self.key {
            Some(k) => resolve_all(k, &header)?,
            None => (0..header.len())
                .filter(|i| *i != value && !named_vars.contains(i))
                .collect(),
        };
        let var_idx = if named_vars.is_empty() {
            (0..header.len())
                .filter(|i| *i != value && !key.contains(i))
                .collect()
        } else {
            named_vars
        };
        if key.contains(&value) {
            return Err(Error::Spec(format!(
                "value field {} cannot also be a key field",
                header[value]
            )));
        }
        if var_idx.contains(&value) {
            return Err(Error::Spec(format!(
                "value field {} cannot also be a variable field",
                header[value]
            )));
        }

        let mut discovered: Vec<Option<BTreeSet<Value>>> = var_idx
            .iter()
            .map(|&i| match self.variables.get(&header[i]) {
                Some(_) => None,
                None => Some(BTreeSet::new()),
            })
            .collect();
        if discovered.iter().any(Option::is_some) {
            let mut seen = 0;
            while seen < self.samplesize {
                let Some(row) = pull(&mut it)? else {
                    break;
                };
                seen += 1;
                for (slot, &vi) in discovered.iter_mut().zip(&var_idx) {
                    if let (Some(set), Some(v)) = (slot.as_mut(), row.get(vi)) {
                        set.insert(v.clone());
                    }
                }
            }
            debug!(sampled = seen, "recast discovery pass");
        }
        drop(it);

        let variables: Vec<(usize, Vec<Value>)> = var_idx
            .iter()
            .zip(discovered)
            .map(|(&vi, found)| {
                let values = match found {
                    Some(set) => set.into_iter().collect(),
                    None => self.variables.get(&header[vi]).cloned().unwrap_or_default(),
                };
                (vi, values)
            })
            .collect();

        let mut out: Header = key.iter().map(|&i| header[i].clone()).collect();
        for (_, values) in &variables {
            out.extend(values.iter().map(Value::to_field_name));
        }
        debug!(columns = ?&out[key.len()..], "recast output columns");
        Ok(Plan {
            key,
            variables,
            value,
            header: out,
        })
    }
}

impl Table for RecastView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let plan = self.plan()?;
        let keyspec = KeySpec::new(plan.key.iter().copied());

        let mut groups = if plan.key.is_empty() {
            Groups::Whole(Some(self.source.iter()?))
        } else {
            let sorted = self.sorter.iter(self.source.as_ref(), &keyspec, false)?;
            let cmp = KeyComparator::new(&keyspec, sorted.header(), false)?;
            Groups::Keyed(Grouper::new(sorted, cmp))
        };
        let Plan {
            key,
            variables,
            value,
            header,
        } = plan;
        let reducers: Vec<Vec<Option<ReduceFn>>> = variables
            .iter()
            .map(|(_, values)| {
                values
                    .iter()
                    .map(|v| self.reducers.get(&v.to_field_name()).cloned())
                    .collect()
            })
            .collect();
        let missing = self.missing.clone();

        let rows = step_iter(move || {
            let Some(group) = groups.next()? else {
                return Ok(None);
            };
            let mut out = project(&group[0], &key, &Value::Null);
            for ((vi, values), reducers) in variables.iter().zip(&reducers) {
                for (name, reducer) in values.iter().zip(reducers) {
                    let found: Vec<Value> = group
                        .iter()
                        .filter(|r| r.get(*vi) == Some(name))
                        .map(|r| r.get(value).cloned().unwrap_or(Value::Null))
                        .collect();
                    out.push(match found.len() {
                        0 => missing.clone(),
                        1 => found.into_iter().next().unwrap_or_default(),
                        _ => match reducer {
                            Some(f) => f(&found)?,
                            None => Value::List(found),
                        },
                    });
                }
            }
            Ok(Some(out))
        });
        Ok(RowIter::new(header, rows))
    }
}

pub fn recast(source: SharedTable) -> RecastView {
    RecastView {
        source,
        key: None,
        variablefields: vec![Field::from("variable")],
        valuefield: Field::from("value"),
        samplesize: EngineConfig::default().sample_size,
        reducers: HashMap::new(),
        missing: Value::Null,
        variables: HashMap::new(),
        sorter: Sorter::new(SortOptions::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Agg;
    use tabflow_core::row;
    use tabflow_core::table::MemTable;

    fn sorted_rows(mut rows: Vec<Row>) -> Vec<Row> {
        rows.sort();
        rows
    }

    fn long() -> SharedTable {
        MemTable::from_rows(vec![
            row!["id", "variable", "value"],
            row![3, "age", 16],
            row![1, "gender", "F"],
            row![2, "gender", "M"],
            row![2, "age", 17],
            row![1, "age", 12],
            row![3, "gender", "M"],
        ])
        .shared()
    }

    #[test]
    fn recast_defaults() {
        let it_view = recast(long());
        let it = it_view.iter().unwrap();
        assert_eq!(it.header(), &vec!["id", "age", "gender"]);
        let rows = it.collect_rows().unwrap();
        assert_eq!(
            rows,
            vec![row![1, 12, "F"], row![2, 17, "M"], row![3, 16, "M"]]
        );
    }

    #[test]
    fn recast_fills_missing_and_reduces() {
        let t = MemTable::from_rows(vec![
            row!["id", "variable", "value"],
            row![1, "w", 10],
            row![1, "w", 20],
            row![2, "h", 5],
            row![2, "w", 7],
            row![2, "w", 8],
        ])
        .shared();
        let rows = recast(t.clone())
            .missing(Value::from(0))
            .iter()
            .unwrap()
            .collect_rows()
            .unwrap();
        assert_eq!(
            rows,
            vec![
                row![1, 0, Value::List(row![10, 20])],
                row![2, 5, Value::List(row![7, 8])],
            ]
        );
        let rows = recast(t)
            .reducer("w", Agg::Sum.reducer())
            .iter()
            .unwrap()
            .collect_rows()
            .unwrap();
        assert_eq!(rows[0], row![1, Value::Null, 30]);
        assert_eq!(rows[1], row![2, 5, 15]);
    }

    #[test]
    fn samplesize_limits_discovery() {
        let rows_view = recast(long()).samplesize(2);
        let rows = rows_view.iter().unwrap();
        assert_eq!(rows.header(), &vec!["id", "age", "gender"]);
        let rows_view = recast(long()).samplesize(1);
        let rows = rows_view.iter().unwrap();
        assert_eq!(rows.header(), &vec!["id", "age"]);
    }

    #[test]
    fn explicit_variable_values() {
        let it_view = recast(long()).variable_values("variable", ["gender"]);
        let it = it_view.iter().unwrap();
        assert_eq!(it.header(), &vec!["id", "gender"]);
        let rows = sorted_rows(it.collect_rows().unwrap());
        assert_eq!(rows[0], row![1, "F"]);
    }

    #[test]
    fn multiple_variable_fields() {
        let t = MemTable::from_rows(vec![
            row!["id", "time", "sex", "value"],
            row![1, "t1", "a", 1],
            row![1, "t2", "b", 2],
        ])
        .shared();
        let it_view = recast(t)
            .key(["id"])
            .variablefields(["time", "sex"]);
        let it = it_view.iter().unwrap();
        assert_eq!(it.header(), &vec!["id", "t1", "t2", "a", "b"]);
        assert_eq!(it.collect_rows().unwrap(), vec![row![1, 1, 2, 1, 2]]);
    }

    #[test]
    fn empty_variable_fields_take_the_remaining_columns() {
        let t = MemTable::from_rows(vec![
            row!["id", "kind", "amount"],
            row![1, "a", 3],
            row![1, "b", 4],
            row![2, "a", 5],
        ])
        .shared();
        let it_view = recast(t)
            .key(["id"])
            .variablefields(Vec::<Field>::new())
            .valuefield("amount");
        let it = it_view.iter().unwrap();
        assert_eq!(it.header(), &vec!["id", "a", "b"]);
        assert_eq!(
            it.collect_rows().unwrap(),
            vec![row![1, 3, 4], row![2, 5, Value::Null]]
        );
    }

    #[test]
    fn value_field_cannot_be_key_or_variable() {
        let as_key_view = recast(long()).key(["id", "value"]);
        let as_key = as_key_view.iter();
        assert!(matches!(as_key, Err(Error::Spec(_))));
        let as_variable_view = recast(long()).variablefields(["variable", "value"]);
        let as_variable = as_variable_view.iter();
        assert!(matches!(as_variable, Err(Error::Spec(_))));
    }

    #[test]
    fn unknown_value_field_is_invalid() {
        assert!(recast(long()).valuefield("nope").iter().is_err());
    }
}
