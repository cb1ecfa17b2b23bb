pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod error;
pub mod executor;
pub mod generator;
pub mod info;
pub mod llm;
pub mod orchestrator;
pub mod reflect;
pub mod relationships;
pub mod sanitize;
pub mod schema;
