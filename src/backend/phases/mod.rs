pub mod types;

pub mod decompose;
pub mod fold;
pub mod resolve;

pub use decompose::decompose;
pub use fold::fold;
pub use resolve::resolve;
