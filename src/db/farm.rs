use super::{Store, expect_row, query_all, timestamp_col};
use crate::error::{LedgerError, Result};
use crate::models::{
    CropArea, DairyRecord, Livestock, NewCropArea, NewDairyRecord, NewLivestock,
};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;

const CROP_COLUMNS: &str = "id, crop, hectares, planting_date, harvest_date";
const LIVESTOCK_COLUMNS: &str = "id, kind, head_count, category, registered_at";
const DAIRY_COLUMNS: &str = "id, date, liters, pregnancy_pct, calving_pct, weaning_pct, lactating_cows, notes";

impl Store {
    // ==================== Crop Area Operations ====================

    pub fn create_crop_area(&self, new: &NewCropArea) -> Result<CropArea> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO crop_areas (crop, hectares, planting_date, harvest_date)
                 VALUES (?1, ?2, ?3, ?4)",
                (&new.crop, new.hectares, new.planting_date, new.harvest_date),
            )?;
            let id = conn.last_insert_rowid();
            info!(id, crop = %new.crop, hectares = new.hectares, "created crop area");
            fetch_crop_area(conn, id)?.ok_or(LedgerError::NotFound { entity: "CropArea", id })
        })
    }

    pub fn get_crop_area(&self, id: i64) -> Result<Option<CropArea>> {
        self.with_conn(|conn| fetch_crop_area(conn, id))
    }

    /// Crop areas, largest first
    pub fn list_crop_areas(&self) -> Result<Vec<CropArea>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!("SELECT {CROP_COLUMNS} FROM crop_areas ORDER BY hectares DESC, id"),
                [],
                crop_from_row,
            )
        })
    }

    pub fn delete_crop_area(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM crop_areas WHERE id = ?1", [id])?;
            expect_row(rows, "CropArea", id)?;
            info!(id, "deleted crop area");
            Ok(())
        })
    }

    // ==================== Livestock Operations ====================

    pub fn create_livestock(&self, new: &NewLivestock) -> Result<Livestock> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO livestock (kind, head_count, category) VALUES (?1, ?2, ?3)",
                (&new.kind, new.head_count, &new.category),
            )?;
            let id = conn.last_insert_rowid();
            info!(id, kind = %new.kind, head_count = new.head_count, "registered livestock");
            conn.query_row(
                &format!("SELECT {LIVESTOCK_COLUMNS} FROM livestock WHERE id = ?1"),
                [id],
                livestock_from_row,
            )
            .map_err(|e| e.into())
        })
    }

    /// Livestock, most recently registered first
    pub fn list_livestock(&self) -> Result<Vec<Livestock>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!("SELECT {LIVESTOCK_COLUMNS} FROM livestock ORDER BY registered_at DESC, id DESC"),
                [],
                livestock_from_row,
            )
        })
    }

    pub fn delete_livestock(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM livestock WHERE id = ?1", [id])?;
            expect_row(rows, "Livestock", id)?;
            info!(id, "deleted livestock");
            Ok(())
        })
    }

    // ==================== Dairy Operations ====================

    pub fn create_dairy_record(&self, new: &NewDairyRecord, date: NaiveDate) -> Result<DairyRecord> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO dairy_records
                    (date, liters, pregnancy_pct, calving_pct, weaning_pct, lactating_cows, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                (
                    date,
                    new.liters,
                    new.pregnancy_pct,
                    new.calving_pct,
                    new.weaning_pct,
                    new.lactating_cows,
                    &new.notes,
                ),
            )?;
            let id = conn.last_insert_rowid();
            info!(id, %date, liters = new.liters, "created dairy record");
            fetch_dairy_record(conn, id)?.ok_or(LedgerError::NotFound {
                entity: "DairyRecord",
                id,
            })
        })
    }

    pub fn get_dairy_record(&self, id: i64) -> Result<Option<DairyRecord>> {
        self.with_conn(|conn| fetch_dairy_record(conn, id))
    }

    /// The `limit` most recent dairy records, newest first
    pub fn list_recent_dairy_records(&self, limit: usize) -> Result<Vec<DairyRecord>> {
        self.with_conn(|conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {DAIRY_COLUMNS} FROM dairy_records ORDER BY date DESC, id DESC LIMIT ?1"
                ),
                [limit as i64],
                dairy_from_row,
            )
        })
    }

    pub fn delete_dairy_record(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let rows = conn.execute("DELETE FROM dairy_records WHERE id = ?1", [id])?;
            expect_row(rows, "DairyRecord", id)?;
            info!(id, "deleted dairy record");
            Ok(())
        })
    }
}

fn fetch_crop_area(conn: &Connection, id: i64) -> Result<Option<CropArea>> {
    conn.query_row(
        &format!("SELECT {CROP_COLUMNS} FROM crop_areas WHERE id = ?1"),
        [id],
        crop_from_row,
    )
    .optional()
    .map_err(|e| e.into())
}

fn fetch_dairy_record(conn: &Connection, id: i64) -> Result<Option<DairyRecord>> {
    conn.query_row(
        &format!("SELECT {DAIRY_COLUMNS} FROM dairy_records WHERE id = ?1"),
        [id],
        dairy_from_row,
    )
    .optional()
    .map_err(|e| e.into())
}

fn crop_from_row(row: &Row) -> rusqlite::Result<CropArea> {
    Ok(CropArea {
        id: row.get("id")?,
        crop: row.get("crop")?,
        hectares: row.get("hectares")?,
        planting_date: row.get("planting_date")?,
        harvest_date: row.get("harvest_date")?,
    })
}

fn livestock_from_row(row: &Row) -> rusqlite::Result<Livestock> {
    Ok(Livestock {
        id: row.get("id")?,
        kind: row.get("kind")?,
        head_count: row.get("head_count")?,
        category: row.get("category")?,
        registered_at: timestamp_col(row, "registered_at")?,
    })
}

fn dairy_from_row(row: &Row) -> rusqlite::Result<DairyRecord> {
    Ok(DairyRecord {
        id: row.get("id")?,
        date: row.get("date")?,
        liters: row.get("liters")?,
        pregnancy_pct: row.get("pregnancy_pct")?,
        calving_pct: row.get("calving_pct")?,
        weaning_pct: row.get("weaning_pct")?,
        lactating_cows: row.get("lactating_cows")?,
        notes: row.get("notes")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (Store, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::open(temp_dir.path().join("test.db"));
        store.initialize().unwrap();
        (store, temp_dir)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_crop_areas_largest_first() {
        let (store, _temp) = setup();
        for (crop, hectares) in [("Trigo", 100.0), ("Soja", 150.0), ("Maíz", 80.0)] {
            store
                .create_crop_area(&NewCropArea {
                    crop: crop.to_string(),
                    hectares,
                    ..Default::default()
                })
                .unwrap();
        }

        let crops: Vec<String> = store
            .list_crop_areas()
            .unwrap()
            .into_iter()
            .map(|c| c.crop)
            .collect();
        assert_eq!(crops, vec!["Soja", "Trigo", "Maíz"]);
    }

    #[test]
    fn test_crop_area_round_trip() {
        let (store, _temp) = setup();
        let created = store
            .create_crop_area(&NewCropArea {
                crop: "Soja".to_string(),
                hectares: 150.5,
                planting_date: Some(date(2024, 10, 15)),
                harvest_date: None,
            })
            .unwrap();

        let fetched = store.get_crop_area(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.planting_date, Some(date(2024, 10, 15)));
        assert_eq!(fetched.harvest_date, None);

        store.delete_crop_area(created.id).unwrap();
        assert!(store.get_crop_area(created.id).unwrap().is_none());
    }

    #[test]
    fn test_livestock_registration() {
        let (store, _temp) = setup();
        let cattle = store
            .create_livestock(&NewLivestock {
                kind: "Novillos".to_string(),
                head_count: 50,
                category: Some("engorde".to_string()),
            })
            .unwrap();
        assert_eq!(cattle.head_count, 50);

        assert_eq!(store.list_livestock().unwrap().len(), 1);
        store.delete_livestock(cattle.id).unwrap();
        assert!(matches!(
            store.delete_livestock(cattle.id),
            Err(LedgerError::NotFound { entity: "Livestock", .. })
        ));
    }

    #[test]
    fn test_dairy_records_newest_first_and_capped() {
        let (store, _temp) = setup();
        for day in 1..=12 {
            store
                .create_dairy_record(
                    &NewDairyRecord {
                        liters: 4000.0 + day as f64,
                        lactating_cows: Some(250),
                        ..Default::default()
                    },
                    date(2025, 2, day),
                )
                .unwrap();
        }

        let recent = store.list_recent_dairy_records(10).unwrap();
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].date, date(2025, 2, 12));
        assert_eq!(recent[0].liters, Some(4012.0));
        assert_eq!(recent[9].date, date(2025, 2, 3));
    }

    #[test]
    fn test_dairy_record_optional_rates() {
        let (store, _temp) = setup();
        let created = store
            .create_dairy_record(
                &NewDairyRecord {
                    liters: 5000.0,
                    pregnancy_pct: Some(85.0),
                    notes: Some("Normal production".to_string()),
                    ..Default::default()
                },
                date(2025, 3, 1),
            )
            .unwrap();

        let fetched = store.get_dairy_record(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.pregnancy_pct, Some(85.0));
        assert_eq!(fetched.calving_pct, None);

        store.delete_dairy_record(created.id).unwrap();
        assert!(store.get_dairy_record(created.id).unwrap().is_none());
    }
}
