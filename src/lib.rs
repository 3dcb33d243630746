pub mod column;
pub mod config;
pub mod database;
pub mod error;
pub mod record;
pub mod request;
pub mod rows;
pub mod table;
pub mod tag;

pub use column::{Column, ColumnKind};
pub use config::TableConfig;
pub use database::Database;
pub use error::{KeyConflict, TableError, TableResult};
pub use record::Record;
pub use request::{
    ColumnValue, DeleteRequest, DeleteResponse, Filter, InsertRequest, InsertResponse,
    KeyRequest, Request, Response, SelectRequest, SelectResponse, TagRequest, UpdateRequest,
    UpdateResponse,
};
pub use table::Table;
pub use tag::{TagHandle, TagIndex, TagNode};
