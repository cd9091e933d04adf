pub mod datatable;
pub mod error;
pub mod filter;
pub mod filter_order;
pub mod filter_where;
pub mod types;

pub use datatable::{equality_filters, DataTablePage, DataTableRequest, FilterValueKind};
pub use error::FilterError;
pub use filter::Filter;
pub use types::*;
