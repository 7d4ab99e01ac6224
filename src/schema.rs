/// Column-name and symbol constants for the plant-fleetkit schema.
/// Single source of truth for every table the pipeline reads or writes.

// ── Canonical record columns ────────────────────────────────────────────────
pub mod canonical {
    pub const DATE: &str = "date";
    pub const SHIFT: &str = "shift";
    pub const BOTTLES_PRODUCED: &str = "bottles_produced";
    pub const DEFECT_COUNT: &str = "defect_count";
    pub const DOWNTIME: &str = "downtime";
    pub const DAY_OF_WEEK: &str = "day_of_week";

    /// Columns every upload must provide after renaming.
    pub const REQUIRED: [&str; 5] = [DATE, SHIFT, BOTTLES_PRODUCED, DEFECT_COUNT, DOWNTIME];

    /// Columns of a persisted per-plant table, in storage order.
    pub const PERSISTED: [&str; 6] = [
        DATE,
        SHIFT,
        BOTTLES_PRODUCED,
        DEFECT_COUNT,
        DOWNTIME,
        DAY_OF_WEEK,
    ];
}

// ── Shift symbols ───────────────────────────────────────────────────────────
pub mod shift {
    pub const A: &str = "A";
    pub const B: &str = "B";
    pub const C: &str = "C";

    pub const ALL: [&str; 3] = [A, B, C];
}

// ── Fleet view columns ──────────────────────────────────────────────────────
pub mod fleet {
    /// Source plant id, populated from the storage key at aggregation time.
    pub const PLANT: &str = "plant";
}

// ── Plant identifier space ──────────────────────────────────────────────────
pub mod plant {
    pub const PREFIX: &str = "plant_";
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 7;
}

// ── Blob store keys ─────────────────────────────────────────────────────────
pub mod store {
    /// Suffix appended to a plant id to key its canonical table.
    pub const CLEAN_SUFFIX: &str = "_clean.csv";
    /// Extension of raw uploads.
    pub const RAW_EXT: &str = "csv";
    /// Reserved mapping key declaring a plant's raw downtime unit.
    pub const DOWNTIME_UNIT_KEY: &str = "downtime_unit";
}
