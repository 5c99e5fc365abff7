// src/web/mod.rs - HTTP surfaces of the simulated sterilizer
pub mod api;
pub mod models;
pub mod telemetry;
