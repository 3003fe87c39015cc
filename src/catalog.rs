//! Server, table, and user-mapping option resolution.
//!
//! The host stores connection and table options in three layers: the
//! foreign server, the user mapping for that server, and the foreign table
//! itself. The adapter reads them through [`CatalogProvider`], an explicit
//! collaborator passed into its constructor rather than ambient global
//! state.

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::{FdwError, Result};
use crate::remote::ConnectionParams;
use crate::types::TableId;

fn default_port() -> u16 {
    10000
}

fn default_dbname() -> String {
    "default".to_owned()
}

/// Options declared on a foreign server.
#[derive(Clone, Debug, Deserialize)]
pub struct ServerOptions {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_dbname")]
    pub dbname: String,
    /// Ask the remote engine for an authoritative row count at plan time
    /// instead of using the fixed placeholder estimate.
    #[serde(default)]
    pub use_remote_estimate: bool,
}

impl ServerOptions {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            dbname: default_dbname(),
            use_remote_estimate: false,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = dbname.into();
        self
    }

    pub fn use_remote_estimate(mut self, enabled: bool) -> Self {
        self.use_remote_estimate = enabled;
        self
    }
}

/// Options declared on a foreign table.
#[derive(Clone, Debug, Deserialize)]
pub struct TableOptions {
    /// Name of the table on the remote side.
    pub table_name: String,
    /// Foreign server this table lives on.
    pub server: String,
}

/// Credentials from the user mapping for a server.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UserMapping {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Fully resolved options for one foreign-table scan.
#[derive(Clone, Debug)]
pub struct ScanOptions {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub table_name: String,
    pub use_remote_estimate: bool,
}

impl ScanOptions {
    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            host: self.host.clone(),
            port: self.port,
            dbname: self.dbname.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Resolves the merged option set for a foreign table.
pub trait CatalogProvider {
    fn resolve(&self, table: TableId) -> Result<ScanOptions>;
}

/// In-memory provider used by tests and prototyping.
#[derive(Default, Debug)]
pub struct InMemoryCatalog {
    servers: FxHashMap<String, ServerOptions>,
    users: FxHashMap<String, UserMapping>,
    tables: FxHashMap<TableId, TableOptions>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a foreign server under a name.
    pub fn with_server(mut self, name: impl Into<String>, options: ServerOptions) -> Self {
        self.servers.insert(name.into(), options);
        self
    }

    /// Registers credentials for a server.
    pub fn with_user(mut self, server: impl Into<String>, mapping: UserMapping) -> Self {
        self.users.insert(server.into(), mapping);
        self
    }

    /// Registers a foreign table.
    pub fn with_table(
        mut self,
        id: TableId,
        server: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        self.tables.insert(
            id,
            TableOptions {
                table_name: table_name.into(),
                server: server.into(),
            },
        );
        self
    }

    /// Loads a catalog from its TOML rendering.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(text)
            .map_err(|err| FdwError::Config(format!("catalog parse error: {err}")))?;
        let mut catalog = Self::new();
        catalog.servers = file.servers;
        catalog.users = file.users;
        for table in file.tables {
            catalog.tables.insert(
                TableId(table.id),
                TableOptions {
                    table_name: table.table_name,
                    server: table.server,
                },
            );
        }
        Ok(catalog)
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    servers: FxHashMap<String, ServerOptions>,
    #[serde(default)]
    users: FxHashMap<String, UserMapping>,
    #[serde(default)]
    tables: Vec<TableEntry>,
}

#[derive(Deserialize)]
struct TableEntry {
    id: u32,
    table_name: String,
    server: String,
}

impl CatalogProvider for InMemoryCatalog {
    fn resolve(&self, table: TableId) -> Result<ScanOptions> {
        let table_options = self
            .tables
            .get(&table)
            .ok_or_else(|| FdwError::Config(format!("no foreign table registered for id {table}")))?;
        let server = self.servers.get(&table_options.server).ok_or_else(|| {
            FdwError::Config(format!("unknown foreign server '{}'", table_options.server))
        })?;
        let user = self
            .users
            .get(&table_options.server)
            .cloned()
            .unwrap_or_default();
        Ok(ScanOptions {
            host: server.host.clone(),
            port: server.port,
            dbname: server.dbname.clone(),
            username: user.username,
            password: user.password,
            table_name: table_options.table_name.clone(),
            use_remote_estimate: server.use_remote_estimate,
        })
    }
}
