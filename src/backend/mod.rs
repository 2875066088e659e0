pub mod ast;
pub mod config;
pub mod defs;
pub mod model;
pub mod phases;
pub mod sink;
pub mod stream;

pub mod generate;
pub mod listing;

pub use generate::{Generator, Program};
pub use phases::types::Error;
