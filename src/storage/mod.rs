pub mod database;
pub mod models;
pub mod queries;
pub mod repository;
pub mod seed;

pub use database::Database;
pub use queries::Queries;
pub use repository::{LoadOutcome, Loader};
