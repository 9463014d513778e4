pub mod submitter;

pub use submitter::DeploymentSubmitter;
