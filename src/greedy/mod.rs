pub mod analyzer;
pub mod matcher;
