pub mod config;
pub mod error;
pub mod io;
pub mod migrations;
pub mod paths;
pub mod pipeline;
pub mod services;
pub mod state;
pub mod templates;

pub use error::{OakError, Result};
