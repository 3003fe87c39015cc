#![forbid(unsafe_code)]

//! Foreign-table scan adapter for remote Hive/Hadoop-style columnar
//! engines.
//!
//! The adapter sits between a relational host planner and a remote engine
//! reached over a text-query protocol. Per relation it classifies the
//! host's restriction clauses into remote-safe and local-only sets,
//! synthesizes a remote SELECT for the pushed-down portion, and streams
//! the result back as typed, null-aware local rows. The host framework,
//! the transport, and the configuration store are collaborators behind
//! traits; this crate contains the decision logic between them.

pub mod catalog;
pub mod error;
pub mod expr;
pub mod fdw;
pub mod host;
pub mod remote;
pub mod types;
pub mod value;

pub use error::{FdwError, Result};
pub use fdw::scan::{ScanSession, ScanStep};
pub use fdw::{AnalyzeReport, ForeignScanPlan, HiveFdw, RelationPlanInfo, ScanPath};
