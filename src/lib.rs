// Library crate for the Matachana 130HPO simulator host: configuration, HTTP surfaces and the dispatcher

pub mod cli;
pub mod config;
pub mod server;
pub mod ticker;
pub mod web;

pub use config::{Config, ConfigError, load_config};
pub use server::{BoundSimulator, ServerError, Simulator};
