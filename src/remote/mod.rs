//! Remote engine collaborator interface.
//!
//! The adapter never speaks the wire protocol itself; it drives these
//! traits. A scan owns exactly one connection and at most one cursor, and
//! nothing else may touch either while the scan is running.

use crate::error::Result;
use crate::value::RemoteType;

pub mod memory;

/// Parameters used to open a remote session, resolved from catalog options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Name and declared type for one column of a remote result stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub ty: RemoteType,
}

impl ColumnDesc {
    pub fn new(name: impl Into<String>, ty: RemoteType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Outcome of a single fetch request against a cursor.
///
/// `Pending` is a retry signal for engines that execute asynchronously;
/// callers poll again rather than treating it as end-of-data or failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Fetch {
    /// A row is positioned at the cursor.
    Row,
    /// A row is positioned and more are already known to follow.
    RowWithMore,
    /// The stream is exhausted.
    Eof,
    /// The remote engine is still executing; poll again.
    Pending,
}

/// Opens sessions against the remote engine.
pub trait RemoteClient {
    fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn RemoteConnection>>;
}

/// One open remote session.
pub trait RemoteConnection {
    /// Submits a query for execution and returns its result stream.
    fn execute(&mut self, sql: &str) -> Result<Box<dyn RemoteCursor>>;
    /// Count-style estimate for the named table.
    fn row_count(&mut self, table: &str) -> Result<u64>;
    /// Asks the engine to refresh statistics for the named table.
    fn analyze(&mut self, table: &str) -> Result<()>;
    /// Storage footprint of the named table in bytes.
    fn table_bytes(&mut self, table: &str) -> Result<u64>;
    /// Releases the session. Must be idempotent.
    fn close(&mut self);
}

/// Stateful cursor over one submitted query's output rows.
pub trait RemoteCursor {
    fn fetch(&mut self) -> Result<Fetch>;
    /// Descriptors for the columns of this result stream.
    fn columns(&self) -> Result<Vec<ColumnDesc>>;
    /// Raw length of the field at `index` in the current row.
    fn field_len(&self, index: usize) -> Result<usize>;
    /// Raw bytes of the field at `index`; `None` when the value is absent.
    fn field(&self, index: usize) -> Result<Option<&[u8]>>;
    /// Closes the result stream. Must be idempotent.
    fn close(&mut self);
}
