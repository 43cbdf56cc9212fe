//! Store methods for region metrics. One row per region, overwritten each run.

use crate::{error::RegionResult, metrics::RegionMetrics};
use chrono::NaiveDate;
use rusqlite::{params, Row};

use super::RegionStore;

impl RegionStore {
    pub fn upsert_region_metrics(&self, m: &RegionMetrics) -> RegionResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO region_metrics (
                region_name, entity_count, recent_event_count,
                active_participant_count, total_participations,
                estimated_population, activity_ratio,
                unclassifiable, truncation_suspect, as_of
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                m.region_name,
                m.entity_count as i64,
                m.recent_event_count as i64,
                m.active_participant_count as i64,
                m.total_participations as i64,
                m.estimated_population as i64,
                m.activity_ratio,
                m.unclassifiable,
                m.truncation_suspect,
                m.as_of.format("%Y-%m-%d").to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn region_metrics(&self, region_name: &str) -> RegionResult<Option<RegionMetrics>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {METRICS_COLUMNS} FROM region_metrics WHERE region_name = ?1"
        ))?;
        let mut rows = stmt.query_map(params![region_name], metrics_from_row)?;
        Ok(rows.next().transpose()?)
    }

    /// Every persisted metrics row, ordered by region name.
    pub fn all_region_metrics(&self) -> RegionResult<Vec<RegionMetrics>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {METRICS_COLUMNS} FROM region_metrics ORDER BY region_name ASC"
        ))?;
        let rows = stmt
            .query_map([], metrics_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

const METRICS_COLUMNS: &str = "region_name, entity_count, recent_event_count, \
    active_participant_count, total_participations, estimated_population, \
    activity_ratio, unclassifiable, truncation_suspect, as_of";

fn metrics_from_row(row: &Row<'_>) -> rusqlite::Result<RegionMetrics> {
    let as_of: String = row.get(9)?;
    let as_of = NaiveDate::parse_from_str(&as_of, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(RegionMetrics {
        region_name:              row.get(0)?,
        entity_count:             row.get::<_, i64>(1)? as u64,
        recent_event_count:       row.get::<_, i64>(2)? as u64,
        active_participant_count: row.get::<_, i64>(3)? as u64,
        total_participations:     row.get::<_, i64>(4)? as u64,
        estimated_population:     row.get::<_, i64>(5)? as u64,
        activity_ratio:           row.get(6)?,
        unclassifiable:           row.get(7)?,
        truncation_suspect:       row.get(8)?,
        as_of,
    })
}
