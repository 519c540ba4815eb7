pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod routes;
pub mod server;
pub mod timeout_worker;

#[cfg(test)]
mod endpoint_tests;
