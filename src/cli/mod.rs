pub mod args;
pub mod launch;
pub mod validation;

pub use args::Args;
pub use validation::{parse_mount_target, MountTarget};
