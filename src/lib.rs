//! Game-lifecycle orchestration for a pickup-games chat bot: pre-start
//! notifications, participant counter reconciliation and listing expiry.

pub mod config;
/// Listing persistence.
pub mod dao;
mod dto;
/// Error taxonomy of lifecycle operations.
pub mod error;
pub mod jobs;
pub mod platform;
/// HTTP routes.
pub mod routes;
/// Lifecycle operations.
pub mod services;
/// Shared application state.
pub mod state;

#[cfg(test)]
mod testing;
