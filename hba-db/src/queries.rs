//! Typed lookups against the network index.

use rusqlite::{params, OptionalExtension};

use hba_core::{BasinId, NetworkRecord, PfafCode};

use crate::{Database, DbError, Result};

impl Database {
    /// Fetch one basin with its upstream ids (ascending), or `None`.
    pub fn get_basin(&self, id: BasinId) -> Result<Option<NetworkRecord>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT area, tot_area, pfaf_id, stream_order FROM basins WHERE basin_id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i32>(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((area, tot_area, pfaf, order)) = row else {
            log::debug!("db: query: basin {} not found", id);
            return Ok(None);
        };
        let pfaf_id: PfafCode = pfaf.parse().map_err(|e: hba_core::Error| DbError::Corrupt {
            id,
            reason: e.to_string(),
        })?;

        let mut stmt = conn.prepare_cached("SELECT up_id FROM upstream WHERE basin_id = ?1 ORDER BY up_id")?;
        let up_seg_ids = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<BasinId>, _>>()?;

        Ok(Some(NetworkRecord {
            id,
            area,
            tot_area,
            pfaf_id,
            order,
            up_seg_ids,
        }))
    }

    /// All basin ids, ascending.
    pub fn basin_ids(&self) -> Result<Vec<BasinId>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT basin_id FROM basins ORDER BY basin_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<BasinId>, _>>()?;
        log::info!("db: query: basin_ids returned {} records", ids.len());
        Ok(ids)
    }

    pub fn basin_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM basins", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Basin ids whose Pfafstetter code starts with `prefix`, ascending.
    pub fn basins_in(&self, prefix: &PfafCode) -> Result<Vec<BasinId>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT basin_id FROM basins WHERE substr(pfaf_id, 1, ?1) = ?2 ORDER BY basin_id")?;
        let ids = stmt
            .query_map(params![prefix.level() as i64, prefix.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<BasinId>, _>>()?;
        Ok(ids)
    }
}
