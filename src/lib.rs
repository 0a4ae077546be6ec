pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod service;
pub mod staging;

pub use api::{router, AppState};
pub use config::AppConfig;
pub use db::{connect_backend, create_pool};
pub use error::AppError;
