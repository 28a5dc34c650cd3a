pub mod database;

pub use database::DatabaseService;
