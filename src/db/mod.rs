pub mod accessors;
pub mod catalog;
pub mod models;
