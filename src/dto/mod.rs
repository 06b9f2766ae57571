/// Health check payloads.
pub mod health;
