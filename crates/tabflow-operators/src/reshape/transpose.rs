use tabflow_core::error::Result;
use tabflow_core::table::{Header, RowIter, SharedTable, Table};
use tabflow_core::value::Value;

/// Swap rows and columns.
///
/// Output row `i` is original column `i`, so each output row costs one full
/// pass over the source: memory stays proportional to the table height,
/// while the number of passes equals its width. The output header is the
/// original first column (field name followed by its values).
pub struct TransposeView {
    source: SharedTable,
    missing: Value,
}

impl TransposeView {
    pub fn missing(mut self, missing: Value) -> Self {
        self.missing = missing;
        self
    }

    fn column(&self, i: usize) -> Result<Vec<Value>> {
        let it = self.source.iter()?;
        let mut out = vec![Value::Str(it.header().get(i).cloned().unwrap_or_default())];
        for row in it {
            out.push(row?.get(i).cloned().unwrap_or_else(|| self.missing.clone()));
        }
        Ok(out)
    }
}

impl Table for TransposeView {
    fn iter(&self) -> Result<RowIter<'_>> {
        let width = self.source.header()?.len();
        if width == 0 {
            return Ok(RowIter::empty(Vec::new()));
        }
        let header: Header = self.column(0)?.iter().map(Value::to_field_name).collect();
        let rows = (1..width).map(move |i| self.column(i));
        Ok(RowIter::new(header, rows))
    }
}

pub fn transpose(source: SharedTable) -> TransposeView {
    TransposeView {
        source,
        missing: Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tabflow_core::row;
    use tabflow_core::table::MemTable;

    #[test]
    fn swaps_rows_and_columns() {
        let t = MemTable::from_rows(vec![
            row!["id", "colour"],
            row![1, "blue"],
            row![2, "red"],
            row![3],
        ])
        .shared();
        let it_view = transpose(t);
        let it = it_view.iter().unwrap();
        assert_eq!(it.header(), &vec!["id", "1", "2", "3"]);
        let rows = it.collect_rows().unwrap();
        assert_eq!(rows, vec![row!["colour", "blue", "red", Value::Null]]);
    }

    #[test]
    fn transpose_twice_restores_text_table() {
        let t = MemTable::from_rows(vec![row!["a", "b"], row!["x", "y"], row!["z", "w"]]).shared();
        let back = transpose(Arc::new(transpose(t)));
        let rows = back.iter().unwrap().collect_rows().unwrap();
        assert_eq!(rows, vec![row!["x", "y"], row!["z", "w"]]);
    }
}
