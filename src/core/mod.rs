pub mod builder;
pub mod components;
pub mod config;
pub mod distributions;
pub mod errors;
pub mod event;
pub mod event_scheduler;
pub mod execution;
pub mod stats;
pub mod types;

#[cfg(test)]
mod tests;
