use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::mapping::PlantId;
use crate::schema::store as keys;

/// Read a CSV file with all columns as String dtype, column names trimmed.
/// Validation and typing happen downstream; the reader never guesses.
pub fn read_csv_as_strings(path: &Path) -> Result<DataFrame, PipelineError> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;

    Ok(df)
}

/// Blob store for canonical per-plant tables.
///
/// One delimited-text table per plant, keyed `<plant_id>_clean.csv`. Writes
/// are atomic replaces (write to a temp sibling, then rename) so a reader
/// never observes a mix of old and new content.
pub struct TableStore {
    dir: PathBuf,
}

impl TableStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn clean_path(&self, plant: &PlantId) -> PathBuf {
        self.dir
            .join(format!("{}{}", plant.as_str(), keys::CLEAN_SUFFIX))
    }

    /// Replace the plant's canonical table wholesale.
    pub fn write_table(&self, plant: &PlantId, df: &DataFrame) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.dir)?;

        let tmp = self.dir.join(format!(".{}.tmp", plant.as_str()));
        let mut file = fs::File::create(&tmp)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df.clone())?;
        drop(file);

        fs::rename(&tmp, self.clean_path(plant))?;
        debug!(plant = %plant, rows = df.height(), "wrote canonical table");
        Ok(())
    }

    /// Read the plant's canonical table, all columns as strings.
    /// Returns `Ok(None)` when no table exists for the plant.
    pub fn read_table(&self, plant: &PlantId) -> Result<Option<DataFrame>, PipelineError> {
        let path = self.clean_path(plant);
        // The table may appear or vanish between a directory scan and this
        // read (a concurrent reprocess); absence is never an error here.
        match fs::File::open(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
            Ok(_) => {}
        }
        read_csv_as_strings(&path).map(Some)
    }

    /// Plant ids with a persisted canonical table, sorted. Files in the store
    /// directory that do not parse as plant tables are skipped with a warning.
    pub fn list_plants(&self) -> Result<Vec<PlantId>, PipelineError> {
        let mut plants = Vec::new();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(plants),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(stem) = name.strip_suffix(keys::CLEAN_SUFFIX) else {
                continue;
            };
            match PlantId::parse(stem) {
                Ok(plant) => plants.push(plant),
                Err(_) => warn!(file = name, "skipping non-plant table in store"),
            }
        }

        plants.sort();
        Ok(plants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::canonical;

    fn sample_table() -> DataFrame {
        DataFrame::new(vec![
            Column::new(canonical::DATE.into(), ["2025-03-10"]),
            Column::new(canonical::SHIFT.into(), ["A"]),
            Column::new(canonical::BOTTLES_PRODUCED.into(), [100i64]),
            Column::new(canonical::DEFECT_COUNT.into(), [2i64]),
            Column::new(canonical::DOWNTIME.into(), [5.0f64]),
            Column::new(canonical::DAY_OF_WEEK.into(), ["Monday"]),
        ])
        .unwrap()
    }

    #[test]
    fn write_then_read_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path());
        let plant = PlantId::parse("plant_1").unwrap();

        store.write_table(&plant, &sample_table()).unwrap();
        let back = store.read_table(&plant).unwrap().unwrap();

        assert_eq!(back.height(), 1);
        assert_eq!(
            back.get_column_names_str(),
            canonical::PERSISTED.to_vec()
        );
        assert_eq!(back.column("shift").unwrap().str().unwrap().get(0), Some("A"));
        assert_eq!(
            back.column("bottles_produced").unwrap().str().unwrap().get(0),
            Some("100")
        );
    }

    #[test]
    fn absent_table_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path());
        let plant = PlantId::parse("plant_3").unwrap();
        assert!(store.read_table(&plant).unwrap().is_none());
    }

    #[test]
    fn lists_only_plant_tables_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = TableStore::new(dir.path());

        for p in ["plant_4", "plant_1"] {
            store
                .write_table(&PlantId::parse(p).unwrap(), &sample_table())
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        std::fs::write(dir.path().join("legacy_clean.csv"), "date\n").unwrap();

        let plants = store.list_plants().unwrap();
        let names: Vec<&str> = plants.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, ["plant_1", "plant_4"]);
    }

    #[test]
    fn listing_missing_dir_is_empty_not_error() {
        let store = TableStore::new("/nonexistent/fleetkit-test-store");
        assert!(store.list_plants().unwrap().is_empty());
    }
}
