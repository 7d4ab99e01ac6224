use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Config: {0}")]
    Config(String),

    #[error("Unknown plant: {0}")]
    UnknownPlant(String),

    #[error("Missing required column '{column}' (columns present: {present})")]
    MissingColumn { column: String, present: String },

    #[error("Invalid date '{value}' at row {row}")]
    InvalidDate { value: String, row: usize },

    #[error("Invalid shift code '{value}' (expected A/B/C or 1/2/3)")]
    InvalidShift { value: String },

    #[error("Invalid value '{value}' for '{field}' at row {row}")]
    InvalidMetric {
        field: String,
        row: usize,
        value: String,
    },

    #[error(
        "Duplicate entry for ({date}, shift {shift}): existing row has \
         bottles_produced={bottles_produced}, defect_count={defect_count}, downtime={downtime}"
    )]
    DuplicateEntry {
        date: String,
        shift: String,
        bottles_produced: i64,
        defect_count: i64,
        downtime: f64,
    },

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
