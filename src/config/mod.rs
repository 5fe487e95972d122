// src/config/mod.rs
pub mod service;

pub use service::{ServiceConfig, DEFAULT_CONFIG_PATH, ENV_API_KEY, ENV_CONFIG_PATH};
