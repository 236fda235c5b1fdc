pub mod api;
pub mod auth;
pub mod blob_store;
pub mod config;
pub mod db;
pub mod db_migrate;
pub mod email_sender;
pub mod error;
pub mod models;
pub mod payment;
pub mod pricing_plans;
pub mod program_manager;
pub mod server;
pub mod state;
pub mod templates;
pub mod tokens;

#[cfg(test)]
mod test_support;

pub use db::PgConnector;
pub use error::Result as AppResult;
