use std::sync::Arc;

use allocative::Allocative;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::column::{Column, ColumnKind, KeyIndex};
use crate::config::TableConfig;
use crate::error::{KeyConflict, TableError, TableResult};
use crate::record::Record;
use crate::request::{
    ColumnValue, DeleteRequest, DeleteResponse, Filter, InsertRequest, InsertResponse,
    KeyRequest, Request, Response, SelectRequest, SelectResponse, TagRequest, UpdateRequest,
    UpdateResponse,
};
use crate::rows::RowStore;
use crate::tag::TagRemoval;

/// A single table: its columns, its rows and the key and tag indexes over
/// them.
///
/// Columns are created on first use and always appended, so a failed request
/// can undo the columns it introduced by truncating the column list. Row
/// positions are never reused; the position of a row is its id.
///
/// The table does no locking of its own: callers serialize access, typically
/// by holding one lock per table for the duration of a request.
#[derive(Debug, Allocative)]
pub struct Table {
    name: String,
    col_map: FxHashMap<String, usize>,
    columns: Vec<Column>,
    records: RowStore,
    key_columns: Vec<usize>,
    tag_columns: Vec<usize>,
}

impl Table {
    /// Creates an empty table holding only the implicit `id` column.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, TableConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: TableConfig) -> Self {
        let mut table = Self {
            name: name.into(),
            col_map: FxHashMap::default(),
            columns: Vec::with_capacity(config.column_capacity),
            records: RowStore::with_capacity(config.record_capacity),
            key_columns: Vec::new(),
            tag_columns: Vec::new(),
        };
        table.col_map.insert(Column::ID.to_owned(), 0);
        table.columns.push(Column::id());
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // COLUMNS

    /// Returns the total number of columns, `id` included.
    ///
    /// # Panics
    /// Panics if the column list and the column map disagree, which means the
    /// table is corrupted.
    pub fn column_count(&self) -> usize {
        assert_eq!(
            self.columns.len(),
            self.col_map.len(),
            "column list and column map of table {} do not match",
            self.name
        );
        self.columns.len()
    }

    /// Columns in ordinal order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.col_map.get(name).map(|&ordinal| &self.columns[ordinal])
    }

    /// Appends a new normal column and returns its ordinal.
    fn add_column(&mut self, name: &str) -> usize {
        let ordinal = self.columns.len();
        self.columns.push(Column::new(name.to_owned(), ordinal));
        self.col_map.insert(name.to_owned(), ordinal);
        debug!(table = %self.name, column = name, ordinal, "column added");
        ordinal
    }

    /// Returns the ordinal of column `name`, creating it if needed.
    /// The flag is true when the column was created by this call.
    pub fn resolve_or_create_column(&mut self, name: &str) -> (usize, bool) {
        match self.col_map.get(name) {
            Some(&ordinal) => (ordinal, false),
            None => (self.add_column(name), true),
        }
    }

    /// Drops every column from `ordinal` onwards.
    fn remove_columns(&mut self, ordinal: usize) {
        if self.columns.len() <= ordinal {
            return;
        }
        for column in self.columns.drain(ordinal..) {
            self.col_map.remove(&column.name);
            debug!(table = %self.name, column = %column.name, "column rolled back");
        }
    }

    // RECORDS

    /// Number of row positions handed out so far, deleted rows included.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    pub fn live_record_count(&self) -> usize {
        self.records.live_len()
    }

    /// Record at `position`, or `None` if it does not exist or was deleted.
    pub fn get_record(&self, position: usize) -> Option<&Record> {
        self.records.get(position)
    }

    /// Number of rows in the tag chain of `value`; 0 if `column` is not a
    /// tag column.
    pub fn tag_chain_len(&self, column: &str, value: &str) -> usize {
        self.get_column(column)
            .and_then(Column::tags)
            .map_or(0, |tags| tags.chain_len(value))
    }

    /// Heap bytes owned by the table.
    pub fn allocated_bytes(&self) -> usize {
        allocative::size_of_unique_allocated_data(self)
    }

    /// Dispatches `request` to the matching operation.
    pub fn execute(&mut self, request: Request) -> TableResult<Response> {
        match request {
            Request::Insert(req) => self.sql_insert(&req).map(Response::Insert),
            Request::Select(req) => self.sql_select(&req).map(Response::Select),
            Request::Update(req) => self.sql_update(&req).map(Response::Update),
            Request::Delete(req) => self.sql_delete(&req).map(Response::Delete),
            Request::Key(req) => self.sql_key(&req).map(|()| Response::Ok),
            Request::Tag(req) => self.sql_tag(&req).map(|()| Response::Ok),
        }
    }

    // KEY AND TAG

    /// Defines a unique index on a column.
    ///
    /// A missing column can only become a key while the table holds no rows.
    /// An existing column is scanned and rejected if two rows share a value.
    ///
    /// # Errors
    /// - [TableError::AlreadyIndexed] if the column is already id, key or tag.
    /// - [TableError::AmbiguousKeyDefinition] if the column is missing while
    ///   rows exist, or if existing rows hold duplicate values.
    pub fn sql_key(&mut self, req: &KeyRequest) -> TableResult<()> {
        let ordinal = match self.col_map.get(&req.column).copied() {
            Some(ordinal) if self.columns[ordinal].is_indexed() => {
                return Err(TableError::already_indexed(&req.column));
            }
            Some(ordinal) => {
                let key = self.build_key(ordinal).inspect_err(|err| {
                    warn!(table = %self.name, %err, "key definition rejected");
                })?;
                self.columns[ordinal].promote_to_key(key)?;
                ordinal
            }
            None if self.records.live_len() > 0 => {
                let err = TableError::AmbiguousKeyDefinition {
                    column: req.column.clone(),
                    reason: KeyConflict::MissingColumn,
                };
                warn!(table = %self.name, %err, "key definition rejected");
                return Err(err);
            }
            None => {
                let ordinal = self.add_column(&req.column);
                self.columns[ordinal].promote_to_key(KeyIndex::default())?;
                ordinal
            }
        };
        self.key_columns.push(ordinal);
        debug!(table = %self.name, column = %req.column, "key defined");
        Ok(())
    }

    /// Indexes the current value of every live row, failing on the first
    /// value seen twice.
    fn build_key(&self, ordinal: usize) -> TableResult<KeyIndex> {
        let mut key =
            KeyIndex::with_capacity_and_hasher(self.records.live_len(), Default::default());
        for record in self.records.iter() {
            let value = record.value_arc(ordinal);
            if key.contains_key(&*value) {
                return Err(TableError::AmbiguousKeyDefinition {
                    column: self.columns[ordinal].name.clone(),
                    reason: KeyConflict::Duplicate(value.to_string()),
                });
            }
            key.insert(value, record.position());
        }
        Ok(key)
    }

    /// Defines a tag on a column, creating the column if needed, and tags
    /// every live row with its current value.
    ///
    /// # Errors
    /// Returns [TableError::AlreadyIndexed] if the column is already id, key
    /// or tag.
    pub fn sql_tag(&mut self, req: &TagRequest) -> TableResult<()> {
        if self.get_column(&req.column).is_some_and(Column::is_indexed) {
            return Err(TableError::already_indexed(&req.column));
        }
        let (ordinal, _) = self.resolve_or_create_column(&req.column);
        let tag_slot = self.tag_columns.len();
        self.columns[ordinal].promote_to_tag(tag_slot)?;
        self.tag_columns.push(ordinal);
        for position in self.records.live_positions() {
            self.tag_record(ordinal, position);
        }
        debug!(table = %self.name, column = %req.column, tag_slot, "tag defined");
        Ok(())
    }

    /// Adds the row at `position` to the chain of its current value in the
    /// tag column `ordinal`.
    fn tag_record(&mut self, ordinal: usize, position: usize) {
        let Some(tags) = self.columns[ordinal].tags_mut() else {
            return;
        };
        let Some(record) = self.records.get_mut(position) else {
            return;
        };
        let handle = tags.push(&record.value_arc(ordinal), position);
        record.set_tag_ref(tags.tag_slot(), Some(handle));
    }

    /// Removes the row at `position` from its chain in the tag column
    /// `ordinal`, repointing the row whose node was slid into its place.
    fn untag_record(&mut self, ordinal: usize, position: usize) {
        let Some(tags) = self.columns[ordinal].tags_mut() else {
            return;
        };
        let tag_slot = tags.tag_slot();
        let Some(record) = self.records.get_mut(position) else {
            return;
        };
        let Some(handle) = record.take_tag_ref(tag_slot) else {
            return;
        };
        let value = record.value_arc(ordinal);
        match tags.remove(&value, handle) {
            TagRemoval::Slid { slot } => {
                if let Some(slid) = self.records.get_mut(slot) {
                    slid.set_tag_ref(tag_slot, Some(handle));
                }
            }
            TagRemoval::Emptied | TagRemoval::Unlinked => {}
        }
    }

    // INSERT

    /// Resolves the columns named in `values`, creating missing ones, and
    /// checks them against the key indexes before anything is written.
    ///
    /// `owner` is the one row allowed to already hold a key value, `rows` the
    /// number of rows the values will be written to. On a collision the
    /// columns created here are dropped again.
    ///
    /// When a column is named twice the last value wins. Values for the `id`
    /// column are ignored.
    fn prepare_assignments(
        &mut self,
        values: &[ColumnValue],
        owner: Option<usize>,
        rows: usize,
    ) -> TableResult<Vec<(usize, Arc<str>)>> {
        let original_len = self.columns.len();
        let mut assignments: Vec<(usize, Arc<str>)> = Vec::with_capacity(values.len());
        for ColumnValue { column, value } in values {
            let (ordinal, _) = self.resolve_or_create_column(column);
            let col = &self.columns[ordinal];
            match col.kind() {
                ColumnKind::Id => {
                    trace!(table = %self.name, "ignoring value for id column");
                    continue;
                }
                ColumnKind::Key => {
                    let collides = match col.key_position(value) {
                        Some(holder) => owner != Some(holder),
                        // one value written to several rows
                        None => rows > 1,
                    };
                    if collides {
                        self.remove_columns(original_len);
                        let err = TableError::duplicate(column, value);
                        warn!(table = %self.name, %err, "request rejected");
                        return Err(err);
                    }
                }
                ColumnKind::Normal | ColumnKind::Tag => {}
            }
            let value: Arc<str> = Arc::from(value.as_str());
            match assignments.iter_mut().find(|(o, _)| *o == ordinal) {
                Some(assignment) => assignment.1 = value,
                None => assignments.push((ordinal, value)),
            }
        }
        Ok(assignments)
    }

    /// Inserts a new row and returns its id.
    ///
    /// # Errors
    /// Returns [TableError::DuplicateKeyValue] if a key column already holds
    /// one of the values; the row is not added and the columns introduced by
    /// the request are removed again.
    ///
    /// # Example
    /// ```
    /// use tagtable::{InsertRequest, SelectRequest, Table};
    ///
    /// let mut table = Table::new("stocks");
    /// let res = table
    ///     .sql_insert(&InsertRequest::new([("ticker", "IBM"), ("bid", "12")]))
    ///     .unwrap();
    /// assert_eq!(res.id, "0");
    ///
    /// let rows = table.sql_select(&SelectRequest::filtered("id", "0")).unwrap();
    /// assert_eq!(rows.columns, vec!["id", "ticker", "bid"]);
    /// assert_eq!(rows.records, vec![vec!["0", "IBM", "12"]]);
    /// ```
    pub fn sql_insert(&mut self, req: &InsertRequest) -> TableResult<InsertResponse> {
        let assignments = self.prepare_assignments(&req.column_values, None, 1)?;
        let position = self.records.next_position();
        let mut record = Record::new(position, self.columns.len(), self.tag_columns.len());
        for (ordinal, value) in assignments {
            record.set_value(ordinal, Arc::clone(&value));
            let column = &mut self.columns[ordinal];
            if column.is_key() {
                column.key_insert(value, position);
            } else if let Some(tags) = column.tags_mut() {
                let handle = tags.push(&value, position);
                record.set_tag_ref(tags.tag_slot(), Some(handle));
            }
        }
        let id = record.id();
        self.records.push(record);
        trace!(table = %self.name, %id, "record inserted");
        Ok(InsertResponse { id })
    }

    // SELECT

    /// Resolves a filter into the positions of the live rows it matches.
    ///
    /// An `id` filter that does not parse or points past the end matches
    /// nothing. Tag filters yield rows in chain order.
    fn filter_positions(&self, filter: Option<&Filter>) -> TableResult<Vec<usize>> {
        let Some(Filter { column, value }) = filter else {
            return Ok(self.records.live_positions());
        };
        let col = self
            .get_column(column)
            .ok_or_else(|| TableError::UnknownColumn {
                column: column.clone(),
            })?;
        let positions: Vec<usize> = match col.kind() {
            ColumnKind::Id => value
                .parse::<usize>()
                .ok()
                .filter(|&p| self.records.get(p).is_some())
                .into_iter()
                .collect(),
            ColumnKind::Key => col.key_position(value).into_iter().collect(),
            ColumnKind::Tag => col
                .tags()
                .map(|tags| tags.slots(value).collect())
                .unwrap_or_default(),
            ColumnKind::Normal => {
                return Err(TableError::UnindexedFilterColumn {
                    column: column.clone(),
                });
            }
        };
        Ok(positions)
    }

    /// Returns the matching rows together with the table's full column list.
    ///
    /// # Errors
    /// - [TableError::UnknownColumn] if the filter column does not exist.
    /// - [TableError::UnindexedFilterColumn] if it is not id, key or tag.
    pub fn sql_select(&self, req: &SelectRequest) -> TableResult<SelectResponse> {
        let positions = self.filter_positions(req.filter.as_ref())?;
        let width = self.columns.len();
        let records = positions
            .into_iter()
            .filter_map(|p| self.records.get(p))
            .map(|record| record.to_row(width))
            .collect();
        Ok(SelectResponse {
            columns: self.column_names(),
            records,
        })
    }

    // UPDATE

    /// Writes `value` into column `ordinal` of the row at `position`,
    /// keeping the column's index in step.
    fn update_value(&mut self, position: usize, ordinal: usize, value: Arc<str>) {
        match self.columns[ordinal].kind() {
            ColumnKind::Id => {}
            ColumnKind::Key => {
                let Some(record) = self.records.get_mut(position) else {
                    return;
                };
                let column = &mut self.columns[ordinal];
                column.key_remove(record.value(ordinal), position);
                record.set_value(ordinal, Arc::clone(&value));
                column.key_insert(value, position);
            }
            ColumnKind::Tag => {
                self.untag_record(ordinal, position);
                if let Some(record) = self.records.get_mut(position) {
                    record.set_value(ordinal, value);
                }
                self.tag_record(ordinal, position);
            }
            ColumnKind::Normal => {
                if let Some(record) = self.records.get_mut(position) {
                    record.set_value(ordinal, value);
                }
            }
        }
    }

    /// Updates every row matched by the filter.
    ///
    /// Key constraints are checked for all rows before the first write. A key
    /// value already in use is only accepted when the request matched exactly
    /// the row that owns it.
    ///
    /// # Errors
    /// Fails like [Table::sql_select] on a bad filter, and with
    /// [TableError::DuplicateKeyValue] on a key collision, in which case no
    /// row is touched and the columns introduced by the request are removed.
    pub fn sql_update(&mut self, req: &UpdateRequest) -> TableResult<UpdateResponse> {
        let positions = self.filter_positions(req.filter.as_ref())?;
        if positions.is_empty() {
            return Ok(UpdateResponse { updated: 0 });
        }
        let owner = match positions.as_slice() {
            [only] => Some(*only),
            _ => None,
        };
        let assignments = self.prepare_assignments(&req.column_values, owner, positions.len())?;
        let mut updated = 0;
        for position in positions {
            if self.records.get(position).is_none() {
                continue;
            }
            for (ordinal, value) in &assignments {
                self.update_value(position, *ordinal, Arc::clone(value));
            }
            trace!(table = %self.name, position, "record updated");
            updated += 1;
        }
        Ok(UpdateResponse { updated })
    }

    // DELETE

    /// Drops the row at `position` from every index, then clears its slot.
    /// Returns false if the row was already gone.
    fn delete_record(&mut self, position: usize) -> bool {
        let Some(record) = self.records.get(position) else {
            return false;
        };
        for &ordinal in &self.key_columns {
            self.columns[ordinal].key_remove(record.value(ordinal), position);
        }
        for i in 0..self.tag_columns.len() {
            let ordinal = self.tag_columns[i];
            self.untag_record(ordinal, position);
        }
        trace!(table = %self.name, position, "record deleted");
        self.records.clear(position).is_some()
    }

    /// Deletes every row matched by the filter.
    ///
    /// # Errors
    /// Fails like [Table::sql_select] on a bad filter.
    pub fn sql_delete(&mut self, req: &DeleteRequest) -> TableResult<DeleteResponse> {
        let positions = self.filter_positions(req.filter.as_ref())?;
        let deleted = positions
            .into_iter()
            .filter(|&position| self.delete_record(position))
            .count();
        Ok(DeleteResponse { deleted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(table: &mut Table, pairs: &[(&str, &str)]) -> TableResult<String> {
        table
            .sql_insert(&InsertRequest::new(pairs.iter().copied()))
            .map(|res| res.id)
    }

    fn select(table: &Table, column: &str, value: &str) -> Vec<Vec<String>> {
        table
            .sql_select(&SelectRequest::filtered(column, value))
            .unwrap()
            .records
    }

    fn ids(table: &Table, column: &str, value: &str) -> Vec<String> {
        select(table, column, value)
            .into_iter()
            .map(|row| row[0].clone())
            .collect()
    }

    fn update(table: &mut Table, filter: (&str, &str), pairs: &[(&str, &str)]) -> TableResult<usize> {
        table
            .sql_update(&UpdateRequest {
                filter: Some(Filter::new(filter.0, filter.1)),
                column_values: pairs.iter().map(|(c, v)| ColumnValue::new(*c, *v)).collect(),
            })
            .map(|res| res.updated)
    }

    fn delete(table: &mut Table, column: &str, value: &str) -> TableResult<usize> {
        table
            .sql_delete(&DeleteRequest {
                filter: Some(Filter::new(column, value)),
            })
            .map(|res| res.deleted)
    }

    fn key(table: &mut Table, column: &str) -> TableResult<()> {
        table.sql_key(&KeyRequest {
            column: column.into(),
        })
    }

    fn tag(table: &mut Table, column: &str) -> TableResult<()> {
        table.sql_tag(&TagRequest {
            column: column.into(),
        })
    }

    /// Checks that every tag node points back at a record whose reference
    /// points at the node.
    fn assert_tags_consistent(table: &Table) {
        for &ordinal in &table.tag_columns {
            let column = &table.columns[ordinal];
            let tags = column.tags().unwrap();
            let mut nodes = 0;
            for record in table.records.iter() {
                let Some(handle) = record.tag_ref(tags.tag_slot()) else {
                    continue;
                };
                nodes += 1;
                assert_eq!(tags.node(handle).map(|n| n.slot), Some(record.position()));
                assert!(tags.slots(record.value(ordinal)).any(|s| s == record.position()));
            }
            assert_eq!(nodes, tags.node_count(), "column {}", column.name);
        }
    }

    #[test]
    fn test_table_creation() {
        let table = Table::new("stocks");

        assert_eq!(table.name(), "stocks");
        assert_eq!(table.column_count(), 1);
        assert_eq!(table.column_names(), vec!["id"]);
        assert_eq!(table.get_column("id").map(Column::kind), Some(ColumnKind::Id));
        assert_eq!(table.record_count(), 0);
    }

    #[test]
    fn test_resolve_or_create_column() {
        let mut table = Table::new("t");

        assert_eq!(table.resolve_or_create_column("a"), (1, true));
        assert_eq!(table.resolve_or_create_column("b"), (2, true));
        assert_eq!(table.resolve_or_create_column("a"), (1, false));
        assert_eq!(table.resolve_or_create_column("id"), (0, false));
        assert_eq!(table.column_count(), 3);
        for (i, column) in table.columns().iter().enumerate() {
            assert_eq!(column.ordinal, i);
        }
    }

    #[test]
    fn test_insert_and_select_all_in_order() {
        let mut table = Table::with_config("t", TableConfig::for_testing());
        for i in 0..50 {
            let id = insert(&mut table, &[("n", i.to_string().as_str())]).unwrap();
            assert_eq!(id, i.to_string());
        }

        let all = table.sql_select(&SelectRequest::all()).unwrap();
        assert_eq!(all.columns, vec!["id", "n"]);
        assert_eq!(all.records.len(), 50);
        for (i, row) in all.records.iter().enumerate() {
            assert_eq!(row, &vec![i.to_string(), i.to_string()]);
            assert_eq!(select(&table, "id", &row[0]), vec![row.clone()]);
        }
    }

    #[test]
    fn test_new_columns_pad_older_rows() {
        let mut table = Table::new("t");
        insert(&mut table, &[("a", "1")]).unwrap();
        insert(&mut table, &[("b", "2")]).unwrap();

        let all = table.sql_select(&SelectRequest::all()).unwrap();
        assert_eq!(all.columns, vec!["id", "a", "b"]);
        assert_eq!(all.records, vec![vec!["0", "1", ""], vec!["1", "", "2"]]);
    }

    #[test]
    fn test_insert_ignores_id_value() {
        let mut table = Table::new("t");
        let id = insert(&mut table, &[("id", "42"), ("a", "x")]).unwrap();

        assert_eq!(id, "0");
        assert_eq!(select(&table, "id", "0"), vec![vec!["0", "x"]]);
    }

    #[test]
    fn test_repeated_column_last_value_wins() {
        let mut table = Table::new("t");
        key(&mut table, "k").unwrap();
        insert(&mut table, &[("k", "a"), ("k", "b")]).unwrap();

        assert_eq!(ids(&table, "k", "b"), vec!["0"]);
        assert!(ids(&table, "k", "a").is_empty());
    }

    #[test]
    fn test_select_by_id_out_of_range_or_deleted() {
        let mut table = Table::new("t");
        insert(&mut table, &[("a", "1")]).unwrap();
        insert(&mut table, &[("a", "2")]).unwrap();

        assert!(select(&table, "id", "2").is_empty());
        assert!(select(&table, "id", "1000").is_empty());
        assert!(select(&table, "id", "-1").is_empty());
        assert!(select(&table, "id", "abc").is_empty());

        assert_eq!(delete(&mut table, "id", "0"), Ok(1));
        assert!(select(&table, "id", "0").is_empty());
        assert_eq!(delete(&mut table, "id", "0"), Ok(0));
        assert_eq!(ids(&table, "id", "1"), vec!["1"]);
    }

    #[test]
    fn test_filter_errors() {
        let mut table = Table::new("t");
        insert(&mut table, &[("a", "1")]).unwrap();

        assert_eq!(
            table.sql_select(&SelectRequest::filtered("nope", "1")),
            Err(TableError::UnknownColumn {
                column: "nope".into()
            })
        );
        assert_eq!(
            table.sql_select(&SelectRequest::filtered("a", "1")),
            Err(TableError::UnindexedFilterColumn { column: "a".into() })
        );
        assert!(update(&mut table, ("a", "1"), &[("b", "2")]).is_err());
        assert!(delete(&mut table, "a", "1").is_err());

        // a failed filter creates nothing
        assert!(table.get_column("b").is_none());
        assert_eq!(table.live_record_count(), 1);
    }

    #[test]
    fn test_key_on_empty_table() {
        let mut table = Table::new("t");
        key(&mut table, "k").unwrap();

        assert_eq!(table.get_column("k").map(Column::kind), Some(ColumnKind::Key));
        assert_eq!(
            key(&mut table, "k"),
            Err(TableError::AlreadyIndexed { column: "k".into() })
        );
        assert_eq!(
            tag(&mut table, "k"),
            Err(TableError::AlreadyIndexed { column: "k".into() })
        );
        assert!(key(&mut table, "id").is_err());
        assert!(tag(&mut table, "id").is_err());
    }

    #[test]
    fn test_key_on_missing_column_with_rows() {
        let mut table = Table::new("t");
        insert(&mut table, &[("a", "1")]).unwrap();

        assert_eq!(
            key(&mut table, "k"),
            Err(TableError::AmbiguousKeyDefinition {
                column: "k".into(),
                reason: KeyConflict::MissingColumn,
            })
        );
        assert!(table.get_column("k").is_none());
    }

    #[test]
    fn test_key_over_duplicates_fails() {
        let mut table = Table::new("t");
        insert(&mut table, &[("k", "a")]).unwrap();
        insert(&mut table, &[("k", "b")]).unwrap();
        insert(&mut table, &[("k", "a")]).unwrap();

        assert_eq!(
            key(&mut table, "k"),
            Err(TableError::AmbiguousKeyDefinition {
                column: "k".into(),
                reason: KeyConflict::Duplicate("a".into()),
            })
        );
        let column = table.get_column("k").unwrap();
        assert_eq!(column.kind(), ColumnKind::Normal);
        assert!(!column.contains_key_value("a"));

        // once the duplicate is gone the key can be defined
        assert_eq!(delete(&mut table, "id", "2"), Ok(1));
        key(&mut table, "k").unwrap();
        assert_eq!(ids(&table, "k", "a"), vec!["0"]);
        assert_eq!(ids(&table, "k", "b"), vec!["1"]);
    }

    #[test]
    fn test_duplicate_insert_rolls_back_columns() {
        let mut table = Table::new("t");
        key(&mut table, "k").unwrap();
        insert(&mut table, &[("k", "a")]).unwrap();

        assert_eq!(
            insert(&mut table, &[("extra", "x"), ("k", "a"), ("more", "y")]),
            Err(TableError::DuplicateKeyValue {
                column: "k".into(),
                value: "a".into()
            })
        );
        assert!(table.get_column("extra").is_none());
        assert!(table.get_column("more").is_none());
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.record_count(), 1);

        // the next row still gets the next position
        assert_eq!(insert(&mut table, &[("k", "b"), ("extra", "x")]), Ok("1".into()));
        assert_eq!(table.get_column("extra").map(|c| c.ordinal), Some(2));
    }

    #[test]
    fn test_key_lookup() {
        let mut table = Table::new("t");
        key(&mut table, "ticker").unwrap();
        insert(&mut table, &[("ticker", "IBM"), ("bid", "10")]).unwrap();
        insert(&mut table, &[("ticker", "MSFT"), ("bid", "20")]).unwrap();

        assert_eq!(select(&table, "ticker", "MSFT"), vec![vec!["1", "MSFT", "20"]]);
        assert!(select(&table, "ticker", "ORCL").is_empty());
    }

    #[test]
    fn test_update_key_to_own_value_is_noop() {
        let mut table = Table::new("t");
        key(&mut table, "k").unwrap();
        insert(&mut table, &[("k", "a"), ("v", "1")]).unwrap();
        insert(&mut table, &[("k", "b"), ("v", "2")]).unwrap();

        assert_eq!(update(&mut table, ("k", "a"), &[("k", "a"), ("v", "3")]), Ok(1));
        assert_eq!(select(&table, "k", "a"), vec![vec!["0", "a", "3"]]);

        assert_eq!(
            update(&mut table, ("k", "a"), &[("fresh", "z"), ("k", "b")]),
            Err(TableError::DuplicateKeyValue {
                column: "k".into(),
                value: "b".into()
            })
        );
        assert!(table.get_column("fresh").is_none());
        assert_eq!(select(&table, "k", "a"), vec![vec!["0", "a", "3"]]);
        assert_eq!(ids(&table, "k", "b"), vec!["1"]);
    }

    #[test]
    fn test_update_key_moves_index_entry() {
        let mut table = Table::new("t");
        key(&mut table, "k").unwrap();
        insert(&mut table, &[("k", "a")]).unwrap();

        assert_eq!(update(&mut table, ("id", "0"), &[("k", "z")]), Ok(1));
        assert!(ids(&table, "k", "a").is_empty());
        assert_eq!(ids(&table, "k", "z"), vec!["0"]);
        assert_eq!(insert(&mut table, &[("k", "a")]), Ok("1".into()));
    }

    #[test]
    fn test_update_one_key_value_on_many_rows_fails() {
        let mut table = Table::new("t");
        key(&mut table, "k").unwrap();
        tag(&mut table, "group").unwrap();
        insert(&mut table, &[("k", "a"), ("group", "g")]).unwrap();
        insert(&mut table, &[("k", "b"), ("group", "g")]).unwrap();

        assert!(update(&mut table, ("group", "g"), &[("k", "c")]).is_err());
        assert_eq!(ids(&table, "k", "a"), vec!["0"]);
        assert_eq!(ids(&table, "k", "b"), vec!["1"]);
    }

    #[test]
    fn test_update_without_match() {
        let mut table = Table::new("t");
        key(&mut table, "k").unwrap();

        assert_eq!(update(&mut table, ("k", "missing"), &[("new", "x")]), Ok(0));
        assert!(table.get_column("new").is_none());
        assert_eq!(update(&mut table, ("id", "7"), &[("v", "x")]), Ok(0));
    }

    #[test]
    fn test_update_all_rows() {
        let mut table = Table::new("t");
        insert(&mut table, &[("v", "1")]).unwrap();
        insert(&mut table, &[("v", "2")]).unwrap();
        delete(&mut table, "id", "0").unwrap();
        insert(&mut table, &[("v", "3")]).unwrap();

        let updated = table
            .sql_update(&UpdateRequest {
                filter: None,
                column_values: vec![ColumnValue::new("v", "x")],
            })
            .unwrap()
            .updated;
        assert_eq!(updated, 2);
        let all = table.sql_select(&SelectRequest::all()).unwrap();
        assert_eq!(all.records, vec![vec!["1", "x"], vec!["2", "x"]]);
    }

    #[test]
    fn test_tag_lookup_most_recent_first() {
        let mut table = Table::new("t");
        tag(&mut table, "sector").unwrap();
        insert(&mut table, &[("sector", "tech")]).unwrap();
        insert(&mut table, &[("sector", "energy")]).unwrap();
        insert(&mut table, &[("sector", "tech")]).unwrap();

        assert_eq!(ids(&table, "sector", "tech"), vec!["2", "0"]);
        assert_eq!(ids(&table, "sector", "energy"), vec!["1"]);
        assert!(ids(&table, "sector", "retail").is_empty());
        assert_tags_consistent(&table);
    }

    #[test]
    fn test_tag_existing_rows() {
        let mut table = Table::new("t");
        insert(&mut table, &[("sector", "tech")]).unwrap();
        insert(&mut table, &[("sector", "energy")]).unwrap();
        insert(&mut table, &[("sector", "tech")]).unwrap();
        delete(&mut table, "id", "1").unwrap();
        insert(&mut table, &[("other", "x")]).unwrap();

        tag(&mut table, "sector").unwrap();
        assert_eq!(table.tag_chain_len("sector", "tech"), 2);
        assert_eq!(table.tag_chain_len("sector", "energy"), 0);
        // rows without a value are tagged with the empty string
        assert_eq!(ids(&table, "sector", ""), vec!["3"]);
        assert_tags_consistent(&table);

        tag(&mut table, "brand_new").unwrap();
        assert_eq!(table.tag_chain_len("brand_new", ""), 3);
        assert_tags_consistent(&table);
    }

    #[test]
    fn test_delete_middle_of_tag_chain() {
        let mut table = Table::new("t");
        tag(&mut table, "t").unwrap();
        for _ in 0..3 {
            insert(&mut table, &[("t", "v")]).unwrap();
        }
        // chain is 2 -> 1 -> 0, row 1 is not the head
        assert_eq!(delete(&mut table, "id", "1"), Ok(1));
        assert_tags_consistent(&table);

        let mut remaining = ids(&table, "t", "v");
        remaining.sort();
        assert_eq!(remaining, vec!["0", "2"]);

        assert_eq!(delete(&mut table, "id", "0"), Ok(1));
        assert_tags_consistent(&table);
        assert_eq!(ids(&table, "t", "v"), vec!["2"]);

        assert_eq!(delete(&mut table, "id", "2"), Ok(1));
        assert_eq!(table.tag_chain_len("t", "v"), 0);
        let tags = table.get_column("t").and_then(Column::tags).unwrap();
        assert!(!tags.contains("v"));
        assert_eq!(tags.node_count(), 0);
    }

    #[test]
    fn test_delete_by_tag_filter() {
        let mut table = Table::new("t");
        tag(&mut table, "t").unwrap();
        tag(&mut table, "u").unwrap();
        for i in 0..6 {
            let t = if i % 2 == 0 { "even" } else { "odd" };
            let u = if i < 3 { "low" } else { "high" };
            insert(&mut table, &[("t", t), ("u", u)]).unwrap();
        }

        assert_eq!(delete(&mut table, "t", "even"), Ok(3));
        assert_tags_consistent(&table);
        assert_eq!(table.tag_chain_len("t", "even"), 0);
        assert_eq!(ids(&table, "u", "low"), vec!["1"]);
        assert_eq!(ids(&table, "u", "high").len(), 2);
        assert_eq!(table.live_record_count(), 3);
        assert_eq!(table.record_count(), 6);
    }

    #[test]
    fn test_delete_purges_key_and_tag() {
        let mut table = Table::new("t");
        key(&mut table, "k").unwrap();
        tag(&mut table, "t").unwrap();
        insert(&mut table, &[("k", "a"), ("t", "x")]).unwrap();
        insert(&mut table, &[("k", "b"), ("t", "x")]).unwrap();
        insert(&mut table, &[("k", "c"), ("t", "x")]).unwrap();

        assert_eq!(delete(&mut table, "k", "b"), Ok(1));
        assert!(select(&table, "k", "b").is_empty());
        assert!(!ids(&table, "t", "x").contains(&"1".to_string()));
        assert_eq!(ids(&table, "t", "x").len(), 2);
        assert_tags_consistent(&table);

        // the key value is free again
        assert_eq!(insert(&mut table, &[("k", "b")]), Ok("3".into()));
    }

    #[test]
    fn test_delete_row_without_key_value_keeps_others() {
        let mut table = Table::new("t");
        key(&mut table, "k").unwrap();
        insert(&mut table, &[("k", "")]).unwrap();
        insert(&mut table, &[("other", "x")]).unwrap();

        assert_eq!(delete(&mut table, "id", "1"), Ok(1));
        assert_eq!(ids(&table, "k", ""), vec!["0"]);
    }

    #[test]
    fn test_update_tag_moves_chain() {
        let mut table = Table::new("t");
        tag(&mut table, "t").unwrap();
        for v in ["a", "a", "a", "b"] {
            insert(&mut table, &[("t", v)]).unwrap();
        }

        assert_eq!(update(&mut table, ("id", "1"), &[("t", "b")]), Ok(1));
        assert_tags_consistent(&table);
        assert_eq!(table.tag_chain_len("t", "a"), 2);
        assert_eq!(ids(&table, "t", "b"), vec!["1", "3"]);

        assert_eq!(update(&mut table, ("t", "a"), &[("t", "c")]), Ok(2));
        assert_tags_consistent(&table);
        assert_eq!(table.tag_chain_len("t", "a"), 0);
        assert_eq!(table.tag_chain_len("t", "c"), 2);
    }

    #[test]
    fn test_execute_dispatch() {
        let mut table = Table::new("t");

        assert_eq!(
            table.execute(Request::Key(KeyRequest { column: "k".into() })),
            Ok(Response::Ok)
        );
        let res = table
            .execute(Request::Insert(InsertRequest::new([("k", "a")])))
            .unwrap();
        assert_eq!(res, Response::Insert(InsertResponse { id: "0".into() }));

        let res = table
            .execute(Request::Delete(DeleteRequest { filter: None }))
            .unwrap();
        assert_eq!(res, Response::Delete(DeleteResponse { deleted: 1 }));

        let res = table.execute(Request::Select(SelectRequest::all())).unwrap();
        assert_eq!(
            res,
            Response::Select(SelectResponse {
                columns: vec!["id".into(), "k".into()],
                records: vec![],
            })
        );
    }

    #[test]
    fn test_allocated_bytes_grows() {
        let mut table = Table::with_config("t", TableConfig::for_testing());
        let before = table.allocated_bytes();
        for i in 0..100 {
            insert(&mut table, &[("payload", "x".repeat(i).as_str())]).unwrap();
        }
        assert!(table.allocated_bytes() > before);
    }
}
