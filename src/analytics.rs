use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;

use crate::error::PipelineError;
use crate::schema::{canonical, fleet};

/// Derived column: per-group defect percentage.
pub const DEFECT_RATE: &str = "defect_rate";

/// Conjunctive row predicates the dashboard applies to the fleet table.
/// `None` means "no restriction" for that dimension.
#[derive(Debug, Clone, Default)]
pub struct FleetFilter {
    pub plants: Option<Vec<String>>,
    pub shifts: Option<Vec<String>>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Headline figures for the dashboard summary cards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetKpis {
    pub plants: usize,
    pub total_bottles: i64,
    pub total_defects: i64,
    /// Percentage; 0 when there is no production.
    pub defect_rate_pct: f64,
    /// Mean downtime per record, in minutes; 0 for an empty table.
    pub avg_downtime: f64,
}

/// Filter the fleet table by plant subset, shift subset, and inclusive date
/// range. Dates are compared in their canonical ISO form, which orders
/// lexicographically.
pub fn filter_fleet(df: DataFrame, filter: &FleetFilter) -> Result<DataFrame, PipelineError> {
    let mut lf = df.lazy();

    if let Some(plants) = &filter.plants {
        let allowed = Series::new(fleet::PLANT.into(), plants.clone());
        lf = lf.filter(col(fleet::PLANT).is_in(lit(allowed), false));
    }
    if let Some(shifts) = &filter.shifts {
        let allowed = Series::new(canonical::SHIFT.into(), shifts.clone());
        lf = lf.filter(col(canonical::SHIFT).is_in(lit(allowed), false));
    }
    if let Some(from) = filter.date_from {
        lf = lf.filter(col(canonical::DATE).gt_eq(lit(from.format("%Y-%m-%d").to_string())));
    }
    if let Some(to) = filter.date_to {
        lf = lf.filter(col(canonical::DATE).lt_eq(lit(to.format("%Y-%m-%d").to_string())));
    }

    Ok(lf.collect()?)
}

/// Headline KPIs over a (possibly filtered) fleet table.
pub fn fleet_kpis(df: &DataFrame) -> Result<FleetKpis, PipelineError> {
    let plants = df.column(fleet::PLANT)?.str()?.n_unique()?;
    let total_bottles = df
        .column(canonical::BOTTLES_PRODUCED)?
        .i64()?
        .sum()
        .unwrap_or(0);
    let total_defects = df.column(canonical::DEFECT_COUNT)?.i64()?.sum().unwrap_or(0);
    let defect_rate_pct = if total_bottles > 0 {
        total_defects as f64 / total_bottles as f64 * 100.0
    } else {
        0.0
    };
    let avg_downtime = df.column(canonical::DOWNTIME)?.f64()?.mean().unwrap_or(0.0);

    Ok(FleetKpis {
        plants,
        total_bottles,
        total_defects,
        defect_rate_pct,
        avg_downtime,
    })
}

/// Bottles produced per date, date-sorted.
pub fn daily_production(df: DataFrame) -> Result<DataFrame, PipelineError> {
    sum_by(df, canonical::DATE, canonical::BOTTLES_PRODUCED)
}

/// Downtime minutes per date, date-sorted.
pub fn daily_downtime(df: DataFrame) -> Result<DataFrame, PipelineError> {
    sum_by(df, canonical::DATE, canonical::DOWNTIME)
}

/// Defect percentage per date, date-sorted. Columns: date, defect_count,
/// bottles_produced, defect_rate.
pub fn daily_defect_rate(df: DataFrame) -> Result<DataFrame, PipelineError> {
    defect_breakdown_by(df, canonical::DATE)
}

/// Defect percentage per shift. Columns: shift, defect_count,
/// bottles_produced, defect_rate.
pub fn shift_defect_breakdown(df: DataFrame) -> Result<DataFrame, PipelineError> {
    defect_breakdown_by(df, canonical::SHIFT)
}

/// Total bottles produced per plant, plant-sorted.
pub fn plant_totals(df: DataFrame) -> Result<DataFrame, PipelineError> {
    sum_by(df, fleet::PLANT, canonical::BOTTLES_PRODUCED)
}

fn sum_by(df: DataFrame, key: &str, value: &str) -> Result<DataFrame, PipelineError> {
    let out = df
        .lazy()
        .group_by([col(key)])
        .agg([col(value).sum()])
        .sort([key], Default::default())
        .collect()?;
    Ok(out)
}

fn defect_breakdown_by(df: DataFrame, key: &str) -> Result<DataFrame, PipelineError> {
    let out = df
        .lazy()
        .group_by([col(key)])
        .agg([
            col(canonical::DEFECT_COUNT).sum(),
            col(canonical::BOTTLES_PRODUCED).sum(),
        ])
        .with_column(
            (col(canonical::DEFECT_COUNT).cast(DataType::Float64)
                / col(canonical::BOTTLES_PRODUCED).cast(DataType::Float64)
                * lit(100.0))
            .alias(DEFECT_RATE),
        )
        .sort([key], Default::default())
        .collect()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet_table() -> DataFrame {
        DataFrame::new(vec![
            Column::new(
                canonical::DATE.into(),
                ["2025-03-10", "2025-03-10", "2025-03-11", "2025-03-11"],
            ),
            Column::new(canonical::SHIFT.into(), ["A", "B", "A", "C"]),
            Column::new(canonical::BOTTLES_PRODUCED.into(), [100i64, 50, 200, 50]),
            Column::new(canonical::DEFECT_COUNT.into(), [2i64, 1, 4, 1]),
            Column::new(canonical::DOWNTIME.into(), [5.0f64, 0.0, 10.0, 5.0]),
            Column::new(
                canonical::DAY_OF_WEEK.into(),
                ["Monday", "Monday", "Tuesday", "Tuesday"],
            ),
            Column::new(
                fleet::PLANT.into(),
                ["plant_1", "plant_1", "plant_2", "plant_2"],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn kpis_summarize_the_fleet() {
        let kpis = fleet_kpis(&fleet_table()).unwrap();
        assert_eq!(kpis.plants, 2);
        assert_eq!(kpis.total_bottles, 400);
        assert_eq!(kpis.total_defects, 8);
        assert_eq!(kpis.defect_rate_pct, 2.0);
        assert_eq!(kpis.avg_downtime, 5.0);
    }

    #[test]
    fn kpis_on_empty_table_are_zero() {
        let empty = fleet_table().head(Some(0));
        let kpis = fleet_kpis(&empty).unwrap();
        assert_eq!(kpis.total_bottles, 0);
        assert_eq!(kpis.defect_rate_pct, 0.0);
        assert_eq!(kpis.avg_downtime, 0.0);
    }

    #[test]
    fn daily_production_sums_by_date() {
        let out = daily_production(fleet_table()).unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(out.column("date").unwrap().str().unwrap().get(0), Some("2025-03-10"));
        assert_eq!(
            out.column("bottles_produced").unwrap().i64().unwrap().get(0),
            Some(150)
        );
        assert_eq!(
            out.column("bottles_produced").unwrap().i64().unwrap().get(1),
            Some(250)
        );
    }

    #[test]
    fn shift_breakdown_computes_defect_rate() {
        let out = shift_defect_breakdown(fleet_table()).unwrap();
        assert_eq!(out.height(), 3);
        // Shift A: 6 defects over 300 bottles.
        assert_eq!(out.column("shift").unwrap().str().unwrap().get(0), Some("A"));
        assert_eq!(out.column(DEFECT_RATE).unwrap().f64().unwrap().get(0), Some(2.0));
    }

    #[test]
    fn plant_totals_sum_by_plant() {
        let out = plant_totals(fleet_table()).unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(
            out.column("bottles_produced").unwrap().i64().unwrap().get(1),
            Some(250)
        );
    }

    #[test]
    fn filter_is_conjunctive() {
        let filter = FleetFilter {
            plants: Some(vec!["plant_1".to_string()]),
            shifts: Some(vec!["A".to_string()]),
            date_from: NaiveDate::from_ymd_opt(2025, 3, 10),
            date_to: NaiveDate::from_ymd_opt(2025, 3, 10),
        };
        let out = filter_fleet(fleet_table(), &filter).unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(
            out.column("bottles_produced").unwrap().i64().unwrap().get(0),
            Some(100)
        );
    }

    #[test]
    fn default_filter_keeps_everything() {
        let out = filter_fleet(fleet_table(), &FleetFilter::default()).unwrap();
        assert_eq!(out.height(), 4);
    }
}
