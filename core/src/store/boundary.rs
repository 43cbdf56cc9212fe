//! Store methods for region boundaries supplied by collaborators.

use crate::{
    error::RegionResult,
    geometry::{Boundary, BoundaryGeometry},
};
use rusqlite::params;
use std::collections::HashMap;

use super::RegionStore;

impl RegionStore {
    /// Insert or replace the boundary row for `region_name`. `None` clears a
    /// stored geometry but keeps the member-state list.
    pub fn upsert_region_boundary(
        &self,
        region_name: &str,
        states:      &[String],
        geometry:    Option<&BoundaryGeometry>,
    ) -> RegionResult<()> {
        let geometry_json = geometry.map(serde_json::to_string).transpose()?;
        self.conn.execute(
            "INSERT OR REPLACE INTO region_boundary (region_name, states_json, geometry_json)
             VALUES (?1, ?2, ?3)",
            params![region_name, serde_json::to_string(states)?, geometry_json],
        )?;
        Ok(())
    }

    /// Stored boundaries keyed by region name. Rows without geometry are skipped.
    pub fn region_boundaries(&self) -> RegionResult<HashMap<String, Boundary>> {
        let mut stmt = self.conn.prepare(
            "SELECT region_name, geometry_json FROM region_boundary
             WHERE geometry_json IS NOT NULL
             ORDER BY region_name ASC",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut boundaries = HashMap::with_capacity(rows.len());
        for (name, json) in rows {
            let geometry: BoundaryGeometry = serde_json::from_str(&json)?;
            boundaries.insert(name, Boundary::from(geometry));
        }
        Ok(boundaries)
    }

    /// Stored member-state lists keyed by region name.
    pub fn region_member_states(&self) -> RegionResult<HashMap<String, Vec<String>>> {
        let mut stmt = self.conn.prepare(
            "SELECT region_name, states_json FROM region_boundary ORDER BY region_name ASC",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut states = HashMap::with_capacity(rows.len());
        for (name, json) in rows {
            states.insert(name, serde_json::from_str(&json)?);
        }
        Ok(states)
    }
}
