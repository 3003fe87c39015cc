//! Planner-facing size and cost constants.

/// Cost to start up a remote query.
pub const DEFAULT_STARTUP_COST: f64 = 100.0;

/// Cost to process one returned row.
pub const DEFAULT_TUPLE_COST: f64 = 0.01;

/// Placeholder row estimate used when the remote engine is not consulted.
pub const DEFAULT_ROW_ESTIMATE: f64 = 1000.0;

/// Page size used to express remote table footprints to ANALYZE.
pub const ANALYZE_PAGE_SIZE: u64 = 8192;

/// Total cost of scanning `rows` remote rows.
pub fn scan_total_cost(rows: f64) -> f64 {
    DEFAULT_TUPLE_COST * rows
}
