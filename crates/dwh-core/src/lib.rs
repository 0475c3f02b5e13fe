pub mod checkpoint;
pub mod classifier;
pub mod collaborator;
pub mod config;
pub mod context;
pub mod directive;
pub mod error;
pub mod io;
pub mod knowledge;
pub mod paths;
pub mod pii;
pub mod query;
pub mod render;
pub mod task;
pub mod types;

pub use error::{DwhError, Result};
