//! Wire models for the deploy backend.
//!
//! The backend exposes two endpoints: a one-shot `POST /deploy` and a
//! long-lived WebSocket stream of build-log events.

pub mod models;

pub use models::*;
