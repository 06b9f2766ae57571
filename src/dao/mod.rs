/// Listing persistence contract and its backends.
pub mod listing_store;
/// Persisted listing model and partial updates.
pub mod models;
/// Storage error shared by every backend.
pub mod storage;
