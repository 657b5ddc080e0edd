pub mod connection;
pub mod migrations;
pub mod models;
pub mod repository;

pub use connection::{connect_database, get_database_pool, lazy_database_pool, DatabaseManager};
pub use migrations::{run_migrations, MigrationManager};
pub use models::*;
pub use repository::{ListingRepository, ReviewRepository};
