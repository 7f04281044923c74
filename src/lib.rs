pub mod arguments;
pub mod bump;
pub mod changes;
pub mod discovery;
pub mod document;
pub mod engine;
pub mod error;
pub mod fields;
pub mod git;
pub mod version;
