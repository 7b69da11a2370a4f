pub mod config;
pub mod error;
pub mod models;
pub mod store;

pub use config::Config;
pub use error::{RelayError, Result};
pub use models::*;
pub use store::JsonStore;
