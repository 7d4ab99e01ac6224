use std::collections::HashMap;

use polars::prelude::*;

use crate::error::PipelineError;
use crate::mapping::{MappingRegistry, PlantId};
use crate::schema::canonical;

/// Rename a raw upload's columns to the canonical schema using the plant's
/// registered mapping, then verify every required field arrived.
///
/// Matching is insensitive to case and surrounding whitespace on both sides.
/// A raw column whose folded name is already canonical passes through without
/// a mapping entry. Columns matching nothing are dropped silently (uploads
/// may carry extra informational columns). Two raw columns resolving to the
/// same canonical name would corrupt data on pick-one semantics, so that is a
/// `Config` error naming both.
///
/// Pure transformation; output columns are the required set in canonical
/// order.
pub fn normalize_columns(
    raw: DataFrame,
    plant: &PlantId,
    registry: &MappingRegistry,
) -> Result<DataFrame, PipelineError> {
    let rules = registry.rules(plant)?;

    let original: Vec<String> = raw
        .get_column_names_str()
        .iter()
        .map(|c| c.to_string())
        .collect();
    let folded: Vec<String> = original.iter().map(|c| c.trim().to_lowercase()).collect();

    // Two raw columns folding to the same name cannot be told apart below.
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (fold, orig) in folded.iter().zip(&original) {
        if let Some(first) = seen.insert(fold.as_str(), orig.as_str()) {
            return Err(PipelineError::Config(format!(
                "columns '{first}' and '{orig}' in upload for {plant} are identical after \
                 case-folding"
            )));
        }
    }

    // Resolve each folded raw name to its canonical target.
    let mut target_to_raw: HashMap<&str, &str> = HashMap::new();
    for fold in &folded {
        let target = match rules.columns.get(fold.as_str()) {
            Some(t) => t.as_str(),
            None if canonical::PERSISTED.contains(&fold.as_str()) => fold.as_str(),
            None => continue, // informational column, dropped
        };
        if let Some(first) = target_to_raw.insert(target, fold.as_str()) {
            return Err(PipelineError::Config(format!(
                "mapping for {plant} sends both '{first}' and '{fold}' to '{target}'"
            )));
        }
    }

    for required in canonical::REQUIRED {
        if !target_to_raw.contains_key(required) {
            return Err(PipelineError::MissingColumn {
                column: required.to_string(),
                present: folded.join(", "),
            });
        }
    }

    let mut df = raw;
    df.set_column_names(folded.as_slice())?;

    let selection: Vec<Expr> = canonical::REQUIRED
        .iter()
        .map(|target| col(target_to_raw[*target]).alias(*target))
        .collect();
    let df = df.lazy().select(selection).collect()?;

    Ok(df)
}
