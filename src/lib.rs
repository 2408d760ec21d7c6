pub mod app;
pub mod config;
pub mod error;
pub mod models;
pub mod persist;
pub mod routes;
pub mod services;
pub mod smtp;
pub mod state;
pub mod telemetry;
