pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod merge;
pub mod operations;
pub mod resolver;
pub mod space;
pub mod wildcard;

#[cfg(unix)]
pub mod fuse;

pub use config::{load_mapping, parse_mapping, MappingRule, MappingTable};
pub use engine::{ContextArena, FlexFs, RequestContext};
pub use error::{FlexError, Result};
pub use operations::{FileSystemOperations, OpError, OpResult, Status};
pub use resolver::PathResolver;
