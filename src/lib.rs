pub mod assets;
pub mod hw;

pub mod backend;
pub mod image;

pub mod cli;
