//! Filtered range queries against the record tables.
//!
//! Column names are checked against a per-table whitelist before any SQL is
//! built; values are always bound as parameters.

use crate::error::{RegionError, RegionResult};
use rusqlite::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Event,
    Club,
    Participation,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Event         => "event",
            Self::Club          => "club",
            Self::Participation => "participation",
        }
    }

    fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Event => &[
                "id", "name", "address", "state", "latitude", "longitude",
                "event_date", "region", "region_method", "region_confidence",
            ],
            Self::Club => &[
                "id", "name", "address", "state", "latitude", "longitude",
                "region", "region_method", "region_confidence",
            ],
            Self::Participation => &["id", "event_id", "participant_id"],
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(&'static str, Value),
    IsNull(&'static str),
    NotNull(&'static str),
    Gte(&'static str, Value),
    Lte(&'static str, Value),
    In(&'static str, Vec<Value>),
}

impl Condition {
    pub fn column(&self) -> &'static str {
        match self {
            Self::Eq(c, _)
            | Self::IsNull(c)
            | Self::NotNull(c)
            | Self::Gte(c, _)
            | Self::Lte(c, _)
            | Self::In(c, _) => c,
        }
    }

    fn push_sql(&self, clauses: &mut Vec<String>, values: &mut Vec<Value>) {
        match self {
            Self::Eq(c, v) => {
                clauses.push(format!("{c} = ?"));
                values.push(v.clone());
            }
            Self::IsNull(c)  => clauses.push(format!("{c} IS NULL")),
            Self::NotNull(c) => clauses.push(format!("{c} IS NOT NULL")),
            Self::Gte(c, v) => {
                clauses.push(format!("{c} >= ?"));
                values.push(v.clone());
            }
            Self::Lte(c, v) => {
                clauses.push(format!("{c} <= ?"));
                values.push(v.clone());
            }
            // An empty IN list matches nothing.
            Self::In(_, vs) if vs.is_empty() => clauses.push("0".into()),
            Self::In(c, vs) => {
                let marks = vec!["?"; vs.len()].join(", ");
                clauses.push(format!("{c} IN ({marks})"));
                values.extend(vs.iter().cloned());
            }
        }
    }
}

/// A filtered, id-ordered read over one table. Paging is supplied
/// separately so the same query can be replayed page after page.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    table:      Table,
    conditions: Vec<Condition>,
}

impl RangeQuery {
    pub fn new(table: Table) -> Self {
        Self { table, conditions: Vec::new() }
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filter(Condition::Eq(column, value.into()))
    }

    pub fn is_null(self, column: &'static str) -> Self {
        self.filter(Condition::IsNull(column))
    }

    pub fn not_null(self, column: &'static str) -> Self {
        self.filter(Condition::NotNull(column))
    }

    pub fn gte(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filter(Condition::Gte(column, value.into()))
    }

    pub fn lte(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filter(Condition::Lte(column, value.into()))
    }

    pub fn within<V: Into<Value>>(
        self,
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filter(Condition::In(column, values.into_iter().map(Into::into).collect()))
    }

    /// `SELECT <select> FROM <table> WHERE … ORDER BY id ASC LIMIT ? OFFSET ?`
    /// with every bound value in order, limit and offset last.
    pub(crate) fn to_sql(
        &self,
        select: &str,
        limit:  usize,
        offset: usize,
    ) -> RegionResult<(String, Vec<Value>)> {
        let mut clauses = Vec::with_capacity(self.conditions.len());
        let mut values = Vec::new();
        for condition in &self.conditions {
            if !self.table.has_column(condition.column()) {
                return Err(RegionError::InvalidQuery {
                    reason: format!(
                        "unknown column '{}' on table {}",
                        condition.column(),
                        self.table.name()
                    ),
                });
            }
            condition.push_sql(&mut clauses, &mut values);
        }

        let mut sql = format!("SELECT {select} FROM {}", self.table.name());
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id ASC LIMIT ? OFFSET ?");
        values.push(Value::Integer(limit as i64));
        values.push(Value::Integer(offset as i64));
        Ok((sql, values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_filtered_page_query() {
        let query = RangeQuery::new(Table::Event)
            .not_null("latitude")
            .gte("event_date", "2024-01-01".to_string())
            .within("id", [1i64, 2, 3]);
        let (sql, values) = query.to_sql("id", 1000, 2000).unwrap();
        assert_eq!(
            sql,
            "SELECT id FROM event WHERE latitude IS NOT NULL AND event_date >= ? \
             AND id IN (?, ?, ?) ORDER BY id ASC LIMIT ? OFFSET ?"
        );
        assert_eq!(values.len(), 6);
        assert_eq!(values[4], Value::Integer(1000));
        assert_eq!(values[5], Value::Integer(2000));
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let query = RangeQuery::new(Table::Participation).within("event_id", Vec::<i64>::new());
        let (sql, _) = query.to_sql("id", 10, 0).unwrap();
        assert!(sql.contains("WHERE 0 ORDER BY"));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let query = RangeQuery::new(Table::Club).not_null("event_date");
        assert!(matches!(
            query.to_sql("id", 10, 0),
            Err(RegionError::InvalidQuery { .. })
        ));
    }
}
