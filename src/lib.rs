pub mod cache;
pub mod config;
pub mod database;
pub mod entities;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod services;
pub mod swagger;
pub mod utils;

pub use config::Config;
pub use error::{AppError, AppResult};
