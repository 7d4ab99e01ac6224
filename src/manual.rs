use polars::prelude::*;
use tracing::info;

use crate::error::PipelineError;
use crate::mapping::{MappingRegistry, PlantId};
use crate::schema::canonical;
use crate::standardize::{canonical_shift, parse_date, weekday_name};
use crate::store::TableStore;

/// Validate and append one hand-entered record to a plant's canonical table.
///
/// The entry converges to the same canonical shape the pipeline produces:
/// same shift rule, same ISO date form, `day_of_week` recomputed. Divergence
/// from the batch pipeline, by design: `bottles_produced` must be at least 1
/// (zero-production days are not representable through manual entry), and the
/// `(date, shift)` pair must not already exist — a collision is rejected with
/// the existing row's values and nothing is mutated, so a retry is a no-op
/// from the caller's perspective.
#[allow(clippy::too_many_arguments)]
pub fn add_entry(
    store: &TableStore,
    registry: &MappingRegistry,
    plant_id: &str,
    date: &str,
    shift_raw: &str,
    bottles_produced: i64,
    defect_count: i64,
    downtime: f64,
) -> Result<(), PipelineError> {
    let plant = PlantId::parse(plant_id)?;
    if !registry.contains(&plant) {
        return Err(PipelineError::UnknownPlant(format!(
            "plant '{plant}' is not in the mapping registry"
        )));
    }

    if bottles_produced < 1 {
        return Err(PipelineError::InvalidEntry(format!(
            "bottles_produced must be at least 1, got {bottles_produced}"
        )));
    }
    if defect_count < 0 {
        return Err(PipelineError::InvalidEntry(format!(
            "defect_count must not be negative, got {defect_count}"
        )));
    }
    if downtime < 0.0 || !downtime.is_finite() {
        return Err(PipelineError::InvalidEntry(format!(
            "downtime must be a non-negative number of minutes, got {downtime}"
        )));
    }

    let shift = canonical_shift(shift_raw).ok_or_else(|| PipelineError::InvalidShift {
        value: shift_raw.to_string(),
    })?;
    let parsed_date = parse_date(date)
        .ok_or_else(|| PipelineError::InvalidEntry(format!("invalid date '{date}'")))?;
    let iso_date = parsed_date.format("%Y-%m-%d").to_string();

    let existing = store.read_table(&plant)?;
    let table = match existing {
        Some(df) => df,
        None => empty_plant_table()?,
    };

    check_duplicate(&table, &iso_date, shift)?;

    let appended = append_row(
        &table,
        &iso_date,
        shift,
        bottles_produced,
        defect_count,
        downtime,
        weekday_name(parsed_date),
    )?;
    store.write_table(&plant, &appended)?;
    info!(plant = %plant, date = iso_date.as_str(), shift, "appended manual entry");
    Ok(())
}

fn empty_plant_table() -> Result<DataFrame, PipelineError> {
    let columns = canonical::PERSISTED
        .iter()
        .map(|c| Column::new_empty((*c).into(), &DataType::String))
        .collect();
    Ok(DataFrame::new(columns)?)
}

fn check_duplicate(table: &DataFrame, iso_date: &str, shift: &str) -> Result<(), PipelineError> {
    let dates = table.column(canonical::DATE)?.str()?;
    let shifts = table.column(canonical::SHIFT)?.str()?;
    let bottles = table.column(canonical::BOTTLES_PRODUCED)?.str()?;
    let defects = table.column(canonical::DEFECT_COUNT)?.str()?;
    let downtime = table.column(canonical::DOWNTIME)?.str()?;

    for i in 0..table.height() {
        let row_date = dates.get(i).unwrap_or("");
        // Stored rows may predate shift standardization; compare canonically.
        let row_shift = shifts.get(i).and_then(canonical_shift);
        if row_date == iso_date && row_shift == Some(shift) {
            return Err(PipelineError::DuplicateEntry {
                date: iso_date.to_string(),
                shift: shift.to_string(),
                bottles_produced: bottles.get(i).and_then(|v| v.parse().ok()).unwrap_or(0),
                defect_count: defects.get(i).and_then(|v| v.parse().ok()).unwrap_or(0),
                downtime: downtime.get(i).and_then(|v| v.parse().ok()).unwrap_or(0.0),
            });
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn append_row(
    table: &DataFrame,
    iso_date: &str,
    shift: &str,
    bottles_produced: i64,
    defect_count: i64,
    downtime: f64,
    day_of_week: &str,
) -> Result<DataFrame, PipelineError> {
    let mut columns: Vec<Column> = Vec::with_capacity(canonical::PERSISTED.len());
    let new_values = [
        iso_date.to_string(),
        shift.to_string(),
        bottles_produced.to_string(),
        defect_count.to_string(),
        downtime.to_string(),
        day_of_week.to_string(),
    ];

    for (name, new_value) in canonical::PERSISTED.iter().zip(new_values) {
        let existing = table.column(name)?.str()?;
        let mut values: Vec<String> = existing
            .into_iter()
            .map(|v| v.unwrap_or("").to_string())
            .collect();
        values.push(new_value);
        columns.push(Column::new((*name).into(), values));
    }

    Ok(DataFrame::new(columns)?)
}
