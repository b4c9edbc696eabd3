#![warn(clippy::unwrap_used)]

pub mod fan_rest;
pub mod rest;
pub mod server;

pub use server::ApiServer;
