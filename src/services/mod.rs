pub mod generation;
pub mod status_store;
pub mod upload;
pub mod watches;
