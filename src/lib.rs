pub mod adapter;
pub mod cli;
pub mod data;
pub mod engine;
pub mod error;
pub mod query;
pub mod resource;
pub mod schema;
pub mod sql;
pub mod update;

pub use adapter::{
    CompositeDataContext, CsvConfiguration, CsvDataContext, DataContext, DataContextExt,
    MemoryDataContext, SqliteConfiguration, SqliteDataContext, UpdateableDataContext,
    UpdateableDataContextExt,
};
pub use data::{DataSet, Row, Value, ValueKind};
pub use error::{ErrorKind, MetaQueryError, Result};
pub use query::{FilterItem, FromItem, OperatorType, Query, QueryBuilder, SelectItem, WhereClause};
pub use resource::{FileResource, InMemoryResource, Resource, ResourceExt};
pub use schema::{Column, ColumnType, Schema, Table, TableType};
pub use sql::{Dialect, DialectRegistry, DialectRewriter, QueryRewriter, SqlStatement};
pub use update::{UpdateCallback, UpdateCallbackExt, UpdateScript};
