//! Table storage behind the in-memory engine

use std::collections::BTreeMap;

use procbind_core::Row;

/// Named tables of rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableStore {
    tables: BTreeMap<String, Vec<Row>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of a table in insertion order; unknown tables are empty
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn insert(&mut self, table: &str, row: Row) {
        self.tables.entry(table.to_string()).or_default().push(row);
    }

    /// Rows matching a predicate, cloned
    pub fn select(&self, table: &str, predicate: impl Fn(&Row) -> bool) -> Vec<Row> {
        self.rows(table)
            .iter()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    /// Replace every matching row with the result of `update`
    pub fn update_where(
        &mut self,
        table: &str,
        predicate: impl Fn(&Row) -> bool,
        update: impl Fn(&Row) -> Row,
    ) -> u64 {
        let Some(rows) = self.tables.get_mut(table) else {
            return 0;
        };
        let mut changed = 0;
        for row in rows.iter_mut().filter(|row| predicate(row)) {
            *row = update(row);
            changed += 1;
        }
        changed
    }

    /// Remove every matching row, returning how many went
    pub fn delete_where(&mut self, table: &str, predicate: impl Fn(&Row) -> bool) -> u64 {
        let Some(rows) = self.tables.get_mut(table) else {
            return 0;
        };
        let before = rows.len();
        rows.retain(|row| !predicate(row));
        (before - rows.len()) as u64
    }

    pub fn count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}
