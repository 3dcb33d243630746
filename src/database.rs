use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::TableConfig;
use crate::error::{TableError, TableResult};
use crate::request::{Request, Response};
use crate::table::Table;

/// The main entry point for the in-memory engine.
/// It manages a collection of named tables and routes requests to them.
#[derive(Default)]
pub struct Database {
    /// A map of table names to their respective [Table] structures.
    tables: FxHashMap<String, Table>,
    /// Sizing applied to every table this database creates.
    config: TableConfig,
}

impl Database {
    /// Creates a new, empty database instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TableConfig) -> Self {
        Self {
            tables: FxHashMap::default(),
            config,
        }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Creates a new, empty table.
    ///
    /// Returns `false` if a table with the same name already exists, in which
    /// case it is left untouched.
    pub fn create_table(&mut self, name: &str) -> bool {
        if self.tables.contains_key(name) {
            return false;
        }
        self.tables
            .insert(name.to_owned(), Table::with_config(name, self.config));
        debug!(table = name, "table created");
        true
    }

    /// Removes a table from the database by its name.
    ///
    /// # Errors
    /// Returns [TableError::UnknownTable] if the table does not exist.
    pub fn drop_table(&mut self, name: &str) -> TableResult<()> {
        match self.tables.remove(name) {
            Some(_) => {
                debug!(table = name, "table dropped");
                Ok(())
            }
            None => Err(TableError::UnknownTable {
                table: name.to_owned(),
            }),
        }
    }

    /// Retrieves a reference to a table by name.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Retrieves a mutable reference to a table by name.
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    /// Returns a list of all table names currently stored in the database.
    pub fn list_tables(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Executes `request` against the table `table`.
    ///
    /// Insert, key and tag requests create the table if it does not exist
    /// yet. Select, update and delete never do.
    ///
    /// # Errors
    /// Returns [TableError::UnknownTable] for a select, update or delete on a
    /// missing table, and otherwise whatever the table operation returns.
    ///
    /// # Example
    /// ```
    /// use tagtable::{Database, InsertRequest, Request, Response, SelectRequest};
    ///
    /// let mut db = Database::new();
    /// db.execute("stocks", Request::Insert(InsertRequest::new([("ticker", "IBM")])))
    ///     .unwrap();
    ///
    /// let Response::Select(res) = db
    ///     .execute("stocks", Request::Select(SelectRequest::all()))
    ///     .unwrap()
    /// else {
    ///     panic!("expected a select response");
    /// };
    /// assert_eq!(res.records, vec![vec!["0", "IBM"]]);
    /// ```
    pub fn execute(&mut self, table: &str, request: Request) -> TableResult<Response> {
        if request.creates_table() {
            self.create_table(table);
        }
        let target = self
            .tables
            .get_mut(table)
            .ok_or_else(|| TableError::UnknownTable {
                table: table.to_owned(),
            })?;
        target.execute(request)
    }
}
