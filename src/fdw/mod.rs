//! Foreign-scan adapter surface.
//!
//! The host invokes a closed, compile-time-known set of callbacks on the
//! adapter: relation sizing, path and plan generation, the scan lifecycle,
//! EXPLAIN, and ANALYZE. [`HiveFdw`] implements them as ordinary methods;
//! there is no dynamic callback table to populate.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

pub mod classify;
pub mod deparse;
pub mod estimate;
pub mod materialize;
pub mod scan;

use crate::catalog::CatalogProvider;
use crate::error::{FdwError, Result};
use crate::expr::{Expr, Restriction};
use crate::host::RelationDesc;
use crate::remote::RemoteClient;
use crate::types::AttrNum;
use estimate::{
    scan_total_cost, ANALYZE_PAGE_SIZE, DEFAULT_ROW_ESTIMATE, DEFAULT_STARTUP_COST,
    DEFAULT_TUPLE_COST,
};
use scan::ScanSession;

/// Planning state for one foreign relation, built at size-estimation time
/// and consumed by path and plan construction.
#[derive(Clone, Debug)]
pub struct RelationPlanInfo {
    pub startup_cost: f64,
    pub tuple_cost: f64,
    pub rows: f64,
    pub remote_conds: Vec<Restriction>,
    pub local_conds: Vec<Restriction>,
    /// Attributes that must be fetched from the remote side, in attribute
    /// number order.
    pub attrs_used: BTreeSet<AttrNum>,
}

/// One access path offered to the planner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanPath {
    pub rows: f64,
    pub startup_cost: f64,
    pub total_cost: f64,
}

/// Finished plan for one foreign scan, carried from plan time into
/// execution time.
#[derive(Clone, Debug)]
pub struct ForeignScanPlan {
    /// Synthesized remote query.
    pub sql: String,
    /// Nth remote result column -> local attribute number.
    pub retrieved_attrs: Vec<AttrNum>,
    /// Parameter expressions in placeholder order, resolved by the host
    /// before execution.
    pub params: Vec<Expr>,
    /// Expressions the host must re-check against fetched rows.
    pub local_exprs: Vec<Expr>,
    pub rows: f64,
    pub startup_cost: f64,
    pub total_cost: f64,
}

/// Result of the ANALYZE support callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalyzeReport {
    /// Remote table footprint expressed in pages.
    pub total_pages: u64,
}

/// Scan adapter for a remote Hive/Hadoop-style engine.
pub struct HiveFdw {
    catalog: Arc<dyn CatalogProvider>,
    client: Arc<dyn RemoteClient>,
}

impl HiveFdw {
    pub fn new(catalog: Arc<dyn CatalogProvider>, client: Arc<dyn RemoteClient>) -> Self {
        Self { catalog, client }
    }

    /// Estimates the relation's size and classifies its restriction
    /// clauses. The classification and the needed-attribute set are cached
    /// in the returned plan info for the later planning callbacks.
    pub fn estimate_rel_size(
        &self,
        rel: &RelationDesc,
        targets: &[Expr],
        restrictions: &[Restriction],
    ) -> Result<RelationPlanInfo> {
        let options = self.catalog.resolve(rel.id)?;
        let (remote_conds, local_conds) = classify::classify(restrictions);
        let attrs_used = classify::needed_attrs(targets, &local_conds);

        let mut rows = DEFAULT_ROW_ESTIMATE;
        if options.use_remote_estimate {
            let mut conn = self.client.connect(&options.connection_params())?;
            let count = conn.row_count(&options.table_name);
            conn.close();
            rows = count? as f64;
        }

        Ok(RelationPlanInfo {
            startup_cost: DEFAULT_STARTUP_COST,
            tuple_cost: DEFAULT_TUPLE_COST,
            rows,
            remote_conds,
            local_conds,
            attrs_used,
        })
    }

    /// Offers access paths for the relation. There is exactly one: a
    /// straight remote scan whose cost was settled at sizing time.
    pub fn scan_paths(&self, info: &RelationPlanInfo) -> Vec<ScanPath> {
        vec![ScanPath {
            rows: info.rows,
            startup_cost: info.startup_cost,
            total_cost: scan_total_cost(info.rows),
        }]
    }

    /// Builds the executable plan: re-partitions the clause list the
    /// executor hands over (which may now include join clauses never seen
    /// at sizing time), synthesizes the remote query, and records the
    /// attribute mapping.
    pub fn plan_scan(
        &self,
        rel: &RelationDesc,
        info: &RelationPlanInfo,
        scan_clauses: &[Restriction],
    ) -> Result<ForeignScanPlan> {
        let options = self.catalog.resolve(rel.id)?;

        let mut remote_conds = Vec::new();
        let mut local_exprs = Vec::new();
        for clause in scan_clauses {
            if clause.pseudoconstant {
                continue;
            }
            if info.remote_conds.contains(clause) {
                remote_conds.push(clause.clone());
            } else if info.local_conds.contains(clause) {
                local_exprs.push(clause.expr.clone());
            } else if classify::is_remote_safe(&clause.expr) {
                remote_conds.push(clause.clone());
            } else {
                local_exprs.push(clause.expr.clone());
            }
        }

        let deparsed =
            deparse::deparse_select(&options.table_name, rel, &info.attrs_used, &remote_conds)?;
        debug!(sql = %deparsed.sql, table = %rel.name, "remote SQL");

        Ok(ForeignScanPlan {
            sql: deparsed.sql,
            retrieved_attrs: deparsed.retrieved_attrs,
            params: deparsed.params,
            local_exprs,
            rows: info.rows,
            startup_cost: info.startup_cost,
            total_cost: scan_total_cost(info.rows),
        })
    }

    /// Opens the scan: resolves options, acquires the remote connection,
    /// and hands both to a fresh session. Query execution is deferred to
    /// the session's first fetch.
    pub fn begin_scan(&self, rel: &RelationDesc, plan: &ForeignScanPlan) -> Result<ScanSession> {
        let options = self.catalog.resolve(rel.id)?;
        let conn = self.client.connect(&options.connection_params())?;
        Ok(ScanSession::new(
            conn,
            rel.clone(),
            plan.sql.clone(),
            plan.retrieved_attrs.clone(),
        ))
    }

    /// EXPLAIN properties for the scan; the remote query is only shown in
    /// verbose mode.
    pub fn explain(&self, plan: &ForeignScanPlan, verbose: bool) -> Vec<(&'static str, String)> {
        if verbose {
            vec![("Remote SQL", plan.sql.clone())]
        } else {
            Vec::new()
        }
    }

    /// ANALYZE support: refreshes remote statistics and reports the table
    /// footprint in pages.
    pub fn analyze(&self, rel: &RelationDesc) -> Result<AnalyzeReport> {
        let options = self.catalog.resolve(rel.id)?;
        let mut conn = self.client.connect(&options.connection_params())?;
        let report = conn
            .analyze(&options.table_name)
            .and_then(|()| conn.table_bytes(&options.table_name))
            .map(|bytes| AnalyzeReport {
                total_pages: bytes / ANALYZE_PAGE_SIZE,
            });
        conn.close();
        report
    }

    /// Row sampling for ANALYZE. Not implemented yet; callers can detect
    /// the limitation instead of silently sampling nothing.
    pub fn acquire_sample_rows(&self, _rel: &RelationDesc) -> Result<Vec<crate::host::TupleSlot>> {
        Err(FdwError::NotImplemented("analyze sample acquisition"))
    }
}
