//! Transport-layer types shared between the HTTP handlers and the services crate.
//! Nothing in here touches the database.

mod filters;
mod pagination;
mod price;

pub use filters::CourseFilter;
pub use pagination::{Page, PageQuery};
pub use price::format_rupiah;
