pub mod dataset;
pub mod row;
pub mod value;

pub use dataset::{DataSet, RowSource};
pub use row::Row;
pub use value::{Value, ValueKind};
