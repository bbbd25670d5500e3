//! HTTP server: shared state, accept loop and top-level routing

pub mod http;

pub use http::{run, AppState};
