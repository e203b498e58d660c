pub mod data;
pub mod orchestrator;
pub mod output;
pub mod structure;
