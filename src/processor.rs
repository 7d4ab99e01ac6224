use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::mapping::{MappingRegistry, PlantId};
use crate::normalize::normalize_columns;
use crate::schema::store as keys;
use crate::standardize::standardize;
use crate::store::{read_csv_as_strings, TableStore};

/// Outcome of successfully processing one upload.
#[derive(Debug, Serialize)]
pub struct ProcessSummary {
    pub plant: PlantId,
    pub rows: usize,
}

/// Per-file result of a batch run. One file's failure never blocks the rest.
#[derive(Debug)]
pub struct FileReport {
    pub file: String,
    pub outcome: Result<ProcessSummary, PipelineError>,
}

impl FileReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Orchestrates the pipeline for uploaded plant files: read raw CSV,
/// normalize columns, standardize values, persist the canonical table.
///
/// The registry is injected at construction and owned for the processor's
/// lifetime; it is the process-wide source of per-plant rules.
pub struct FileProcessor {
    raw_dir: PathBuf,
    store: TableStore,
    registry: MappingRegistry,
}

impl FileProcessor {
    pub fn new(raw_dir: impl Into<PathBuf>, store: TableStore, registry: MappingRegistry) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            store,
            registry,
        }
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    /// Process one uploaded file and replace the plant's canonical table
    /// wholesale. On any failure nothing is persisted and the error is
    /// returned unchanged. Re-uploading a plant's file is the authoritative
    /// way to fix bad data.
    pub fn process_file(&self, file_name: &str) -> Result<ProcessSummary, PipelineError> {
        let plant = plant_from_file_name(file_name)?;
        let clean = self.run_pipeline(file_name, &plant)?;
        self.store.write_table(&plant, &clean)?;

        let summary = ProcessSummary {
            plant,
            rows: clean.height(),
        };
        info!(file = file_name, plant = %summary.plant, rows = summary.rows, "processed upload");
        Ok(summary)
    }

    fn run_pipeline(&self, file_name: &str, plant: &PlantId) -> Result<DataFrame, PipelineError> {
        let raw = read_csv_as_strings(&self.raw_dir.join(file_name))?;
        let renamed = normalize_columns(raw, plant, &self.registry)?;
        let rules = self.registry.rules(plant)?;
        standardize(renamed, rules)
    }

    /// Process every raw upload in the store, continuing past individual
    /// failures. Files are handled in sorted name order, so the order is
    /// consistent within one call. Returns one report per file.
    pub fn process_all(&self) -> Result<Vec<FileReport>, PipelineError> {
        let mut files = Vec::new();
        let entries = match fs::read_dir(&self.raw_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let is_raw = Path::new(name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(keys::RAW_EXT));
            if is_raw {
                files.push(name.to_string());
            }
        }
        files.sort();

        let mut reports = Vec::with_capacity(files.len());
        for file in files {
            let outcome = self.process_file(&file);
            if let Err(e) = &outcome {
                warn!(file = file.as_str(), error = %e, "upload failed, continuing batch");
            }
            reports.push(FileReport { file, outcome });
        }
        Ok(reports)
    }
}

/// Derive the plant id from an upload's file name: strip the extension and
/// lowercase. The result must be a registered plant id.
fn plant_from_file_name(file_name: &str) -> Result<PlantId, PipelineError> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            PipelineError::UnknownPlant(format!("cannot derive a plant id from '{file_name}'"))
        })?;
    PlantId::parse(stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPING: &str = r#"{
        "plant_1": {"Date": "date", "Shift": "shift", "Bottles": "bottles_produced",
                    "Defects": "defect_count", "Downtime": "downtime"},
        "plant_2": {"date": "date", "shift": "shift", "made": "bottles_produced",
                    "bad": "defect_count", "stopped": "downtime"},
        "plant_3": {"Date": "date", "Shift": "shift", "Bottles": "bottles_produced",
                    "Defects": "defect_count", "Hours Down": "downtime",
                    "downtime_unit": "hours"}
    }"#;

    fn fixture() -> (tempfile::TempDir, FileProcessor) {
        let dir = tempfile::tempdir().unwrap();
        let raw_dir = dir.path().join("raw");
        fs::create_dir_all(&raw_dir).unwrap();
        let store = TableStore::new(dir.path().join("processed"));
        let registry = MappingRegistry::from_json(MAPPING).unwrap();
        let processor = FileProcessor::new(raw_dir, store, registry);
        (dir, processor)
    }

    fn write_raw(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join("raw").join(name), body).unwrap();
    }

    fn plant(n: &str) -> PlantId {
        PlantId::parse(n).unwrap()
    }

    #[test]
    fn processes_file_end_to_end() {
        let (dir, processor) = fixture();
        write_raw(
            dir.path(),
            "plant_1.csv",
            "Date,Shift,Bottles,Defects,Downtime,Line\n\
             2025-03-10,1,100,2,5,east\n\
             2025-03-11,B,90,0,0,east\n",
        );

        let summary = processor.process_file("plant_1.csv").unwrap();
        assert_eq!(summary.plant.as_str(), "plant_1");
        assert_eq!(summary.rows, 2);

        let table = processor.store().read_table(&plant("plant_1")).unwrap().unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(table.column("shift").unwrap().str().unwrap().get(0), Some("A"));
        assert_eq!(
            table.column("day_of_week").unwrap().str().unwrap().get(0),
            Some("Monday")
        );
    }

    #[test]
    fn hours_plant_is_converted_via_declared_unit() {
        let (dir, processor) = fixture();
        write_raw(
            dir.path(),
            "plant_3.csv",
            "Date,Shift,Bottles,Defects,Hours Down\n2025-03-10,A,100,2,2\n",
        );

        processor.process_file("plant_3.csv").unwrap();
        let table = processor.store().read_table(&plant("plant_3")).unwrap().unwrap();
        assert_eq!(
            table.column("downtime").unwrap().str().unwrap().get(0),
            Some("120.0")
        );
    }

    #[test]
    fn failed_file_persists_nothing() {
        let (dir, processor) = fixture();
        write_raw(
            dir.path(),
            "plant_1.csv",
            "Date,Shift,Bottles,Defects,Downtime\n\
             2025-03-10,A,100,-1,5\n\
             2025-03-11,A,90,0,0\n",
        );

        let err = processor.process_file("plant_1.csv").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidMetric { .. }));
        assert!(processor.store().read_table(&plant("plant_1")).unwrap().is_none());
    }

    #[test]
    fn reprocessing_replaces_wholesale() {
        let (dir, processor) = fixture();
        write_raw(
            dir.path(),
            "plant_1.csv",
            "Date,Shift,Bottles,Defects,Downtime\n\
             2025-03-10,A,100,2,5\n\
             2025-03-11,B,90,0,0\n",
        );
        processor.process_file("plant_1.csv").unwrap();

        write_raw(
            dir.path(),
            "plant_1.csv",
            "Date,Shift,Bottles,Defects,Downtime\n2025-04-01,C,50,1,3\n",
        );
        processor.process_file("plant_1.csv").unwrap();

        let table = processor.store().read_table(&plant("plant_1")).unwrap().unwrap();
        assert_eq!(table.height(), 1);
        assert_eq!(table.column("date").unwrap().str().unwrap().get(0), Some("2025-04-01"));
    }

    #[test]
    fn batch_tolerates_per_file_failures() {
        let (dir, processor) = fixture();
        write_raw(
            dir.path(),
            "plant_1.csv",
            "Date,Shift,Bottles,Defects,Downtime\n2025-03-10,A,100,2,5\n",
        );
        // plant_2's upload is missing its defect column.
        write_raw(
            dir.path(),
            "plant_2.csv",
            "date,shift,made,stopped\n2025-03-10,A,100,5\n",
        );
        write_raw(
            dir.path(),
            "plant_3.csv",
            "Date,Shift,Bottles,Defects,Hours Down\n2025-03-10,B,80,1,1\n",
        );

        let reports = processor.process_all().unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].file, "plant_1.csv");
        assert!(reports[0].is_success());
        assert!(matches!(
            reports[1].outcome,
            Err(PipelineError::MissingColumn { ref column, .. }) if column == "defect_count"
        ));
        assert!(reports[2].is_success());

        assert!(processor.store().read_table(&plant("plant_1")).unwrap().is_some());
        assert!(processor.store().read_table(&plant("plant_2")).unwrap().is_none());
        assert!(processor.store().read_table(&plant("plant_3")).unwrap().is_some());
    }

    #[test]
    fn unregistered_upload_is_reported_not_fatal() {
        let (dir, processor) = fixture();
        write_raw(
            dir.path(),
            "warehouse.csv",
            "date,shift,bottles_produced,defect_count,downtime\n2025-03-10,A,1,0,0\n",
        );

        let reports = processor.process_all().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(matches!(
            reports[0].outcome,
            Err(PipelineError::UnknownPlant(_))
        ));
    }

    #[test]
    fn empty_raw_dir_is_empty_batch() {
        let (_dir, processor) = fixture();
        assert!(processor.process_all().unwrap().is_empty());
    }
}
