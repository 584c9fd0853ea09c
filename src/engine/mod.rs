pub mod aggregate;
pub mod evaluator;
pub mod executor;
pub mod join;
pub mod planner;

pub use evaluator::{like_match, RowLayout, Truth};
pub use executor::execute;
pub use planner::{Plan, Planner};

use crate::data::Value;
use crate::error::Result;

/// A stream of value tuples flowing between executor stages.
pub type RowStream = Box<dyn Iterator<Item = Result<Vec<Value>>> + Send>;

/// Where NULLs sort relative to other values in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullOrdering {
    /// NULLs last ascending, first descending.
    #[default]
    High,
    Low,
}
