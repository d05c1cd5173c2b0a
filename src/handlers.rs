pub mod auth;
pub mod comments;
pub mod completions;
pub mod contents;
pub mod courses;
pub mod dashboard;
pub mod demo;
pub mod health;
pub mod members;
pub mod users;
