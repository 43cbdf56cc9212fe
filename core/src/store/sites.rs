//! Store methods for scraped events, clubs and participation records.

use crate::{
    aggregator::RangeSource,
    assignment::{Assignment, LocationRecord},
    error::{RegionError, RegionResult},
    geometry::Point,
    types::{RegionName, RowId},
};
use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Row};

use super::{query::Table, RangeQuery, RegionStore};

/// The two classifiable tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteKind {
    Event,
    Club,
}

impl SiteKind {
    pub fn table(&self) -> Table {
        match self {
            Self::Event => Table::Event,
            Self::Club  => Table::Club,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.table().name()
    }
}

/// An event or club with its classification inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteRow {
    pub id:       RowId,
    pub location: LocationRecord,
    pub region:   Option<RegionName>,
}

/// An event or club reduced to its coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRow {
    pub id:    RowId,
    pub point: Point,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipationRow {
    pub id:             RowId,
    pub event_id:       RowId,
    pub participant_id: String,
}

/// An assignment as written back onto a row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAssignment {
    pub region:     Option<RegionName>,
    pub method:     String,
    pub confidence: f64,
    pub rationale:  Vec<String>,
}

impl RegionStore {
    // ── Ingestion ──────────────────────────────────────────────

    /// Insert or refresh an event. An existing region assignment is kept.
    pub fn insert_event(
        &self,
        id:       RowId,
        location: &LocationRecord,
        date:     NaiveDate,
    ) -> RegionResult<()> {
        self.conn.execute(
            "INSERT INTO event (id, name, address, state, latitude, longitude, event_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, address = excluded.address,
                state = excluded.state, latitude = excluded.latitude,
                longitude = excluded.longitude, event_date = excluded.event_date",
            params![
                id,
                location.name,
                location.address,
                location.declared_state,
                location.latitude,
                location.longitude,
                date.format("%Y-%m-%d").to_string(),
            ],
        )?;
        Ok(())
    }

    /// Insert or refresh a club. An existing region assignment is kept.
    pub fn insert_club(&self, id: RowId, location: &LocationRecord) -> RegionResult<()> {
        self.conn.execute(
            "INSERT INTO club (id, name, address, state, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, address = excluded.address,
                state = excluded.state, latitude = excluded.latitude,
                longitude = excluded.longitude",
            params![
                id,
                location.name,
                location.address,
                location.declared_state,
                location.latitude,
                location.longitude,
            ],
        )?;
        Ok(())
    }

    pub fn insert_participation(
        &self,
        id:             RowId,
        event_id:       RowId,
        participant_id: &str,
    ) -> RegionResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO participation (id, event_id, participant_id)
             VALUES (?1, ?2, ?3)",
            params![id, event_id, participant_id],
        )?;
        Ok(())
    }

    // ── Region write-back ──────────────────────────────────────

    /// Overwrite the region columns of one row.
    pub fn set_region(
        &self,
        kind:       SiteKind,
        id:         RowId,
        assignment: &Assignment,
    ) -> RegionResult<()> {
        let sql = format!(
            "UPDATE {} SET region = ?1, region_method = ?2,
                region_confidence = ?3, region_rationale = ?4
             WHERE id = ?5",
            kind.table().name()
        );
        self.conn.execute(
            &sql,
            params![
                assignment.region,
                assignment.method.as_str(),
                assignment.confidence,
                serde_json::to_string(&assignment.rationale)?,
                id,
            ],
        )?;
        Ok(())
    }

    pub fn site_assignment(
        &self,
        kind: SiteKind,
        id:   RowId,
    ) -> RegionResult<Option<StoredAssignment>> {
        let sql = format!(
            "SELECT region, region_method, region_confidence, region_rationale
             FROM {} WHERE id = ?1 AND region_method IS NOT NULL",
            kind.table().name()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let rationale: Option<String> = row.get(3)?;
        Ok(Some(StoredAssignment {
            region:     row.get(0)?,
            method:     row.get(1)?,
            confidence: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
            rationale:  match rationale {
                Some(json) => serde_json::from_str(&json)?,
                None => Vec::new(),
            },
        }))
    }

    // ── Test / summary helpers ─────────────────────────────────

    pub fn site_count(&self, kind: SiteKind) -> RegionResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", kind.table().name());
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Rows of `kind` that still have no region.
    pub fn unassigned_count(&self, kind: SiteKind) -> RegionResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE region IS NULL", kind.table().name());
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Run one page of `query`, clamped to the per-request ceiling.
    fn query_page<R>(
        &self,
        query:  &RangeQuery,
        select: &str,
        start:  usize,
        end:    usize,
        map:    impl FnMut(&Row<'_>) -> rusqlite::Result<R>,
    ) -> RegionResult<Vec<R>> {
        let limit = end.saturating_sub(start).min(self.max_rows_per_request);
        let (sql, values) = query.to_sql(select, limit, start)?;
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), map)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn expect_table(query: &RangeQuery, allowed: &[Table], row_type: &str) -> RegionResult<()> {
    if allowed.contains(&query.table()) {
        Ok(())
    } else {
        Err(RegionError::InvalidQuery {
            reason: format!("{row_type} rows cannot be read from {}", query.table().name()),
        })
    }
}

impl RangeSource<SiteRow> for RegionStore {
    fn fetch_range(&self, query: &RangeQuery, start: usize, end: usize) -> RegionResult<Vec<SiteRow>> {
        expect_table(query, &[Table::Event, Table::Club], "site")?;
        self.query_page(
            query,
            "id, name, address, state, latitude, longitude, region",
            start,
            end,
            |row| {
                Ok(SiteRow {
                    id: row.get(0)?,
                    location: LocationRecord {
                        name:           row.get(1)?,
                        address:        row.get(2)?,
                        declared_state: row.get(3)?,
                        latitude:       row.get(4)?,
                        longitude:      row.get(5)?,
                    },
                    region: row.get(6)?,
                })
            },
        )
    }
}

impl RangeSource<PointRow> for RegionStore {
    /// Rows without both coordinates are skipped by the query itself.
    fn fetch_range(&self, query: &RangeQuery, start: usize, end: usize) -> RegionResult<Vec<PointRow>> {
        expect_table(query, &[Table::Event, Table::Club], "point")?;
        let query = query.clone().not_null("latitude").not_null("longitude");
        self.query_page(&query, "id, longitude, latitude", start, end, |row| {
            Ok(PointRow {
                id:    row.get(0)?,
                point: Point::new(row.get(1)?, row.get(2)?),
            })
        })
    }
}

impl RangeSource<ParticipationRow> for RegionStore {
    fn fetch_range(
        &self,
        query: &RangeQuery,
        start: usize,
        end:   usize,
    ) -> RegionResult<Vec<ParticipationRow>> {
        expect_table(query, &[Table::Participation], "participation")?;
        self.query_page(query, "id, event_id, participant_id", start, end, |row| {
            Ok(ParticipationRow {
                id:             row.get(0)?,
                event_id:       row.get(1)?,
                participant_id: row.get(2)?,
            })
        })
    }
}
