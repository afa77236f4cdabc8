//! config/mod.rs
pub mod gateway_config;
