//! HTTP API Module
//!
//! REST API for browsing a bucket and opening or downloading its files.

mod http;

pub use http::{AppState, HttpServer};
