use polars::prelude::*;
use tracing::debug;

use crate::error::PipelineError;
use crate::schema::{canonical, fleet};
use crate::standardize::canonical_shift;
use crate::store::TableStore;

/// Fleet view columns, in output order.
const FLEET_COLUMNS: [&str; 7] = [
    canonical::DATE,
    canonical::SHIFT,
    canonical::BOTTLES_PRODUCED,
    canonical::DEFECT_COUNT,
    canonical::DOWNTIME,
    canonical::DAY_OF_WEEK,
    fleet::PLANT,
];

/// Assemble the fleet-wide table: every persisted canonical table, each row
/// tagged with its plant id taken from the storage key (never from row
/// content), concatenated into one DataFrame with typed metric columns.
///
/// Shift codes are re-canonicalized on the way in: manually appended or
/// hand-edited rows may carry numeric codes that bypassed the standardizer.
/// Unknown codes still fail loudly. Tables that vanish between the directory
/// scan and the read are skipped.
///
/// Zero persisted tables is a valid "no data yet" state: the result is a
/// zero-row frame with the full fleet schema, not an error.
pub fn load_fleet(store: &TableStore) -> Result<DataFrame, PipelineError> {
    let mut frames: Vec<DataFrame> = Vec::new();

    for plant in store.list_plants()? {
        let Some(df) = store.read_table(&plant)? else {
            continue; // vanished since the scan
        };
        let df = recanonicalize_shifts(df)?;
        let height = df.height();

        let mut df = df
            .lazy()
            .with_columns([
                col(canonical::BOTTLES_PRODUCED).strict_cast(DataType::Int64),
                col(canonical::DEFECT_COUNT).strict_cast(DataType::Int64),
                col(canonical::DOWNTIME).strict_cast(DataType::Float64),
            ])
            .collect()?;
        df.with_column(Column::new(
            fleet::PLANT.into(),
            vec![plant.as_str().to_string(); height],
        ))?;

        debug!(plant = %plant, rows = height, "added plant to fleet view");
        frames.push(df.select(FLEET_COLUMNS)?);
    }

    let Some(mut combined) = frames.first().cloned() else {
        return empty_fleet();
    };
    for frame in &frames[1..] {
        combined.vstack_mut(frame)?;
    }
    Ok(combined)
}

/// Zero-row fleet table with the full canonical schema.
fn empty_fleet() -> Result<DataFrame, PipelineError> {
    let df = DataFrame::new(vec![
        Column::new_empty(canonical::DATE.into(), &DataType::String),
        Column::new_empty(canonical::SHIFT.into(), &DataType::String),
        Column::new_empty(canonical::BOTTLES_PRODUCED.into(), &DataType::Int64),
        Column::new_empty(canonical::DEFECT_COUNT.into(), &DataType::Int64),
        Column::new_empty(canonical::DOWNTIME.into(), &DataType::Float64),
        Column::new_empty(canonical::DAY_OF_WEEK.into(), &DataType::String),
        Column::new_empty(fleet::PLANT.into(), &DataType::String),
    ])?;
    Ok(df)
}

fn recanonicalize_shifts(df: DataFrame) -> Result<DataFrame, PipelineError> {
    let shifts = df.column(canonical::SHIFT)?.str()?;
    let mut canonicalized: Vec<&'static str> = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let raw = shifts.get(i).unwrap_or("");
        let code = canonical_shift(raw).ok_or_else(|| PipelineError::InvalidShift {
            value: raw.to_string(),
        })?;
        canonicalized.push(code);
    }

    let mut df = df;
    df.with_column(Column::new(canonical::SHIFT.into(), canonicalized))?;
    Ok(df)
}
