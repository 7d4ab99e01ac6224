//! plant-fleetkit: normalization pipeline for per-plant manufacturing data.
//!
//! Heterogeneous plant spreadsheets (different column names, shift-label
//! conventions, and units) are converted into one canonical row format:
//! `date, shift, bottles_produced, defect_count, downtime, day_of_week`.
//! One clean table is persisted per plant; the fleet-wide view is assembled
//! at read time and feeds the dashboard's aggregates.
//!
//! Pipeline: raw upload → [`processor::FileProcessor`] →
//! ([`normalize`] → [`standardize`]) → per-plant table in [`store::TableStore`]
//! → [`fleet::load_fleet`] → [`analytics`]. Manual entries go through
//! [`manual::add_entry`], which converges to the same canonical shape.

pub mod analytics;
pub mod error;
pub mod fleet;
pub mod manual;
pub mod mapping;
pub mod normalize;
pub mod processor;
pub mod schema;
pub mod standardize;
pub mod store;

pub use error::PipelineError;
pub use fleet::load_fleet;
pub use manual::add_entry;
pub use mapping::{DowntimeUnit, MappingRegistry, PlantId, PlantRules};
pub use normalize::normalize_columns;
pub use processor::{FileProcessor, FileReport, ProcessSummary};
pub use standardize::standardize;
pub use store::TableStore;
