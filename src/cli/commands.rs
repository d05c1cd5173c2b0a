pub mod create_superuser;
pub mod import_contents;
pub mod initdb;
pub mod migrate_and_serve;
pub mod openapi;
pub mod serve;

pub use create_superuser::create_superuser;
pub use import_contents::import_contents;
pub use initdb::init_database;
pub use migrate_and_serve::migrate_and_serve;
pub use openapi::print_openapi;
pub use serve::serve;
