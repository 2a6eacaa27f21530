pub mod auth;
pub mod config;
pub mod error;
pub mod security;
pub mod server;
pub mod store;
pub mod transport;
