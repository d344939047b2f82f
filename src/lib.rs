//! Library circulation server
//!
//! Book inventory, member accounts and the loan lifecycle behind a REST JSON
//! API. Every circulation command updates the book, the member and the loan
//! in a single transaction.

use std::sync::Arc;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
