pub mod analytics;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod models;
pub mod output;
pub mod reconciler;
pub mod replay;
pub mod session;
pub mod state;
pub mod store;
