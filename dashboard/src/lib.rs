//! Deployment dashboard core
//!
//! Owns the build-log stream connection and the list of deployments, and
//! merges submission results and streamed log lines as they arrive.

pub mod app;
pub mod channel;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod registry;
pub mod server;
pub mod storage;
pub mod utils;
pub mod view;
pub mod workers;
