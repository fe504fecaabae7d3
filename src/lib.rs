pub mod auth;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod publisher;
pub mod render;
pub mod reporter;
pub mod state;
pub mod types;
pub mod watcher;
