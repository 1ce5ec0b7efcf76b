pub mod agent;
pub mod config;
pub mod error;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod prompts;
pub mod provider;
pub mod providers;
pub mod telemetry;
pub mod tools;
