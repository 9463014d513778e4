pub mod client;
pub mod deployments;
