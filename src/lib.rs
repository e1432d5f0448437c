pub mod auth;
pub mod cancel;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod markdown;
pub mod registry;
pub mod report;
pub mod session;
pub mod sources;
pub mod store;
pub mod view;

#[cfg(test)]
mod test_helpers;
