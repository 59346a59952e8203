pub mod builder;
pub mod enumeration;
pub mod exclusion;
pub mod extraction;
pub mod model;
pub mod signature;
