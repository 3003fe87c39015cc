//! In-memory remote engine used by tests and prototyping.
//!
//! The engine serves registered tables through the collaborator traits and
//! records every interaction (queries, releases, descriptor requests) so
//! tests can assert on lifecycle behavior. Scripted pending fetches and
//! injected failures model an asynchronously executing remote engine.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::{ColumnDesc, ConnectionParams, Fetch, RemoteClient, RemoteConnection, RemoteCursor};
use crate::error::{FdwError, Result};

#[derive(Clone)]
struct TableData {
    columns: Vec<ColumnDesc>,
    rows: Vec<Vec<Option<String>>>,
}

#[derive(Default)]
struct EngineState {
    tables: FxHashMap<String, TableData>,
    pending_fetches: u32,
    fail_next_execute: Option<String>,
    fail_fetch_at: Option<u32>,
    executed: Vec<String>,
    connections: Vec<ConnectionParams>,
    connections_released: usize,
    cursors_closed: usize,
    column_desc_requests: usize,
}

/// Scriptable remote engine backed by registered in-memory tables.
#[derive(Clone, Default)]
pub struct MemoryEngine {
    shared: Rc<RefCell<EngineState>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table with its result columns and text-rendered rows.
    pub fn with_table(
        self,
        name: impl Into<String>,
        columns: Vec<ColumnDesc>,
        rows: &[&[Option<&str>]],
    ) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.map(str::to_owned)).collect())
            .collect();
        self.shared
            .borrow_mut()
            .tables
            .insert(name.into(), TableData { columns, rows });
        self
    }

    /// Scripts every new cursor to report "still executing" for the first
    /// `count` fetch requests.
    pub fn with_pending_fetches(self, count: u32) -> Self {
        self.shared.borrow_mut().pending_fetches = count;
        self
    }

    /// Makes the next `execute` call fail with a remote error.
    pub fn fail_next_execute(&self, message: impl Into<String>) {
        self.shared.borrow_mut().fail_next_execute = Some(message.into());
    }

    /// Makes the `nth` fetch call (1-based) on each new cursor fail.
    pub fn fail_fetch_at(&self, nth: u32) {
        self.shared.borrow_mut().fail_fetch_at = Some(nth);
    }

    pub fn executed_queries(&self) -> Vec<String> {
        self.shared.borrow().executed.clone()
    }

    pub fn connections_opened(&self) -> usize {
        self.shared.borrow().connections.len()
    }

    pub fn connections_released(&self) -> usize {
        self.shared.borrow().connections_released
    }

    pub fn connection_log(&self) -> Vec<ConnectionParams> {
        self.shared.borrow().connections.clone()
    }

    pub fn cursors_closed(&self) -> usize {
        self.shared.borrow().cursors_closed
    }

    /// Number of column-descriptor lookups served across all cursors.
    pub fn column_desc_requests(&self) -> usize {
        self.shared.borrow().column_desc_requests
    }
}

impl RemoteClient for MemoryEngine {
    fn connect(&self, params: &ConnectionParams) -> Result<Box<dyn RemoteConnection>> {
        self.shared.borrow_mut().connections.push(params.clone());
        Ok(Box::new(MemoryConnection {
            shared: Rc::clone(&self.shared),
            closed: false,
        }))
    }
}

struct MemoryConnection {
    shared: Rc<RefCell<EngineState>>,
    closed: bool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(FdwError::Connection("connection is closed".into()));
        }
        Ok(())
    }
}

impl RemoteConnection for MemoryConnection {
    fn execute(&mut self, sql: &str) -> Result<Box<dyn RemoteCursor>> {
        self.ensure_open()?;
        let mut shared = self.shared.borrow_mut();
        if let Some(message) = shared.fail_next_execute.take() {
            return Err(FdwError::Remote(message));
        }
        shared.executed.push(sql.to_owned());
        let (columns, rows) = run_select(sql, &shared.tables)?;
        Ok(Box::new(MemoryCursor {
            shared: Rc::clone(&self.shared),
            columns,
            rows,
            next: 0,
            current: None,
            pending_left: shared.pending_fetches,
            fetch_calls: 0,
            fail_fetch_at: shared.fail_fetch_at,
            closed: false,
        }))
    }

    fn row_count(&mut self, table: &str) -> Result<u64> {
        self.ensure_open()?;
        let mut shared = self.shared.borrow_mut();
        shared
            .executed
            .push(format!("SELECT COUNT(*) FROM `{table}`"));
        let data = shared
            .tables
            .get(table)
            .ok_or_else(|| FdwError::Remote(format!("table '{table}' not found")))?;
        Ok(data.rows.len() as u64)
    }

    fn analyze(&mut self, table: &str) -> Result<()> {
        self.ensure_open()?;
        let mut shared = self.shared.borrow_mut();
        shared
            .executed
            .push(format!("ANALYZE TABLE `{table}` COMPUTE STATISTICS"));
        if !shared.tables.contains_key(table) {
            return Err(FdwError::Remote(format!("table '{table}' not found")));
        }
        Ok(())
    }

    fn table_bytes(&mut self, table: &str) -> Result<u64> {
        self.ensure_open()?;
        let mut shared = self.shared.borrow_mut();
        shared.executed.push(format!("DESCRIBE FORMATTED `{table}`"));
        let data = shared
            .tables
            .get(table)
            .ok_or_else(|| FdwError::Remote(format!("table '{table}' not found")))?;
        let bytes = data
            .rows
            .iter()
            .flatten()
            .map(|cell| cell.as_ref().map(String::len).unwrap_or(0) as u64)
            .sum();
        Ok(bytes)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.borrow_mut().connections_released += 1;
        }
    }
}

struct MemoryCursor {
    shared: Rc<RefCell<EngineState>>,
    columns: Vec<ColumnDesc>,
    rows: Vec<Vec<Option<String>>>,
    next: usize,
    current: Option<usize>,
    pending_left: u32,
    fetch_calls: u32,
    fail_fetch_at: Option<u32>,
    closed: bool,
}

impl MemoryCursor {
    fn cell(&self, index: usize) -> Result<Option<&String>> {
        let row = self
            .current
            .ok_or(FdwError::Invalid("no current row at cursor"))?;
        let cell = self.rows[row]
            .get(index)
            .ok_or(FdwError::Invalid("field index out of range"))?;
        Ok(cell.as_ref())
    }
}

impl RemoteCursor for MemoryCursor {
    fn fetch(&mut self) -> Result<Fetch> {
        if self.closed {
            return Err(FdwError::Invalid("fetch on a closed cursor"));
        }
        self.fetch_calls += 1;
        if self.fail_fetch_at == Some(self.fetch_calls) {
            return Err(FdwError::Remote("injected fetch failure".into()));
        }
        if self.pending_left > 0 {
            self.pending_left -= 1;
            return Ok(Fetch::Pending);
        }
        if self.next >= self.rows.len() {
            self.current = None;
            return Ok(Fetch::Eof);
        }
        self.current = Some(self.next);
        self.next += 1;
        Ok(if self.next < self.rows.len() {
            Fetch::RowWithMore
        } else {
            Fetch::Row
        })
    }

    fn columns(&self) -> Result<Vec<ColumnDesc>> {
        self.shared.borrow_mut().column_desc_requests += 1;
        Ok(self.columns.clone())
    }

    fn field_len(&self, index: usize) -> Result<usize> {
        Ok(self.cell(index)?.map(String::len).unwrap_or(0))
    }

    fn field(&self, index: usize) -> Result<Option<&[u8]>> {
        Ok(self.cell(index)?.map(String::as_bytes))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shared.borrow_mut().cursors_closed += 1;
        }
    }
}

enum Projection {
    Column(usize),
    Literal(String),
}

/// Minimal SELECT interpreter: resolves the projection list against the
/// registered table and ignores any WHERE clause, so tests observe exactly
/// what was pushed down.
fn run_select(
    sql: &str,
    tables: &FxHashMap<String, TableData>,
) -> Result<(Vec<ColumnDesc>, Vec<Vec<Option<String>>>)> {
    let rest = sql
        .strip_prefix("SELECT ")
        .ok_or_else(|| FdwError::Remote(format!("unsupported query: {sql}")))?;
    let from = rest
        .find(" FROM ")
        .ok_or_else(|| FdwError::Remote(format!("unsupported query: {sql}")))?;
    let select_list = &rest[..from];
    let table_token = rest[from + " FROM ".len()..]
        .split_whitespace()
        .next()
        .ok_or_else(|| FdwError::Remote(format!("unsupported query: {sql}")))?;
    let table_name = unquote(table_token).unwrap_or_else(|| table_token.to_owned());
    let table = tables
        .get(&table_name)
        .ok_or_else(|| FdwError::Remote(format!("table '{table_name}' not found")))?;

    let mut projections = Vec::new();
    for item in select_list.split(", ") {
        match unquote(item) {
            Some(name) => {
                let index = table
                    .columns
                    .iter()
                    .position(|c| c.name == name)
                    .ok_or_else(|| FdwError::Remote(format!("unknown column '{name}'")))?;
                projections.push(Projection::Column(index));
            }
            None => projections.push(Projection::Literal(item.to_owned())),
        }
    }

    let columns = projections
        .iter()
        .map(|p| match p {
            Projection::Column(index) => table.columns[*index].clone(),
            Projection::Literal(text) => ColumnDesc::new(text.clone(), crate::value::RemoteType::String),
        })
        .collect();
    let rows = table
        .rows
        .iter()
        .map(|row| {
            projections
                .iter()
                .map(|p| match p {
                    Projection::Column(index) => row[*index].clone(),
                    Projection::Literal(text) => Some(text.clone()),
                })
                .collect()
        })
        .collect();
    Ok((columns, rows))
}

fn unquote(token: &str) -> Option<String> {
    token
        .strip_prefix('`')
        .and_then(|t| t.strip_suffix('`'))
        .map(|t| t.replace("``", "`"))
}
