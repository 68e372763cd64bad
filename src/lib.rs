//! Short video generation service.
//!
//! Accepts an image upload, forwards it to the generation webhook and tracks
//! the asynchronous video job through the status table until it completes,
//! fails or times out.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod watcher;
