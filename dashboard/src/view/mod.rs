pub mod follow;

pub use follow::{TailFollower, Viewport};
