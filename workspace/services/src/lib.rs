//! Domain operations of the learning-management service.
//!
//! Every function takes a database connection and works on the entities from
//! the `model` crate. HTTP concerns (status codes, response shapes) live in the
//! server crate; this crate only decides *what* happens and reports failures
//! through [`error::ServiceError`].

pub mod comments;
pub mod completion;
pub mod contents;
pub mod courses;
pub mod dashboard;
pub mod enrollment;
pub mod error;
pub mod importer;
pub mod password;
pub mod users;

mod search;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, ServiceError};
