//! Scan session lifecycle: lazy execution, polling fetches, rescan, and
//! idempotent teardown.

use tracing::{debug, trace};

use super::materialize::materialize_row;
use crate::error::{FdwError, Result};
use crate::host::{RelationDesc, TupleSlot};
use crate::remote::{ColumnDesc, Fetch, RemoteConnection, RemoteCursor};
use crate::types::AttrNum;

/// Outcome of a single poll step against the scan.
#[derive(Debug)]
pub enum ScanStep {
    /// A materialized row.
    Row(TupleSlot),
    /// The remote engine is still executing; poll again.
    Pending,
    /// The stream is exhausted (or the session is closed).
    Done,
}

/// One running foreign scan.
///
/// The session exclusively owns its connection and cursor. The query is
/// submitted on the first fetch, not at scan start, so a scan that never
/// fetches costs no remote execution.
pub struct ScanSession {
    conn: Option<Box<dyn RemoteConnection>>,
    cursor: Option<Box<dyn RemoteCursor>>,
    columns: Option<Vec<ColumnDesc>>,
    rel: RelationDesc,
    sql: String,
    retrieved_attrs: Vec<AttrNum>,
}

impl ScanSession {
    pub(crate) fn new(
        conn: Box<dyn RemoteConnection>,
        rel: RelationDesc,
        sql: String,
        retrieved_attrs: Vec<AttrNum>,
    ) -> Self {
        Self {
            conn: Some(conn),
            cursor: None,
            columns: None,
            rel,
            sql,
            retrieved_attrs,
        }
    }

    /// The remote query this scan executes.
    pub fn query(&self) -> &str {
        &self.sql
    }

    /// Drives the scan one step. `Pending` is a retry signal: the remote
    /// engine runs the query asynchronously and must be polled again.
    pub fn poll(&mut self) -> Result<ScanStep> {
        let Some(conn) = self.conn.as_mut() else {
            return Ok(ScanStep::Done);
        };
        if self.cursor.is_none() {
            trace!(sql = %self.sql, "submitting remote query");
            self.cursor = Some(conn.execute(&self.sql)?);
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(ScanStep::Done);
        };
        if self.columns.is_none() {
            self.columns = Some(cursor.columns()?);
        }
        match cursor.fetch()? {
            Fetch::Row | Fetch::RowWithMore => {
                let columns = self.columns.as_deref().unwrap_or_default();
                let slot = materialize_row(&self.rel, &self.retrieved_attrs, columns, &**cursor)?;
                Ok(ScanStep::Row(slot))
            }
            Fetch::Eof => Ok(ScanStep::Done),
            Fetch::Pending => Ok(ScanStep::Pending),
        }
    }

    /// Fetches the next row, looping over `Pending` outcomes until the
    /// remote engine produces a terminal answer.
    pub fn next_row(&mut self) -> Result<Option<TupleSlot>> {
        loop {
            match self.poll()? {
                ScanStep::Row(slot) => return Ok(Some(slot)),
                ScanStep::Pending => continue,
                ScanStep::Done => return Ok(None),
            }
        }
    }

    /// Restarts iteration from the first row by re-submitting the same
    /// query. The connection and the column-descriptor cache are kept. A
    /// rescan before the first fetch has nothing to reset.
    pub fn rescan(&mut self) -> Result<()> {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
            let conn = self
                .conn
                .as_mut()
                .ok_or(FdwError::Invalid("rescan on a closed scan"))?;
            debug!(sql = %self.sql, "re-submitting remote query");
            self.cursor = Some(conn.execute(&self.sql)?);
        }
        Ok(())
    }

    /// Ends the scan, closing the cursor and releasing the connection.
    /// Safe to call more than once.
    pub fn end(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.end();
    }
}
