pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod sheet;
pub mod store;

pub use error::{ImportError, Result};
