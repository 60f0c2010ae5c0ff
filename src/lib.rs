pub mod advisor;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod graph;
pub mod store;
pub mod tools;
pub mod utils;

// Re-export main types for easier access
pub use config::Config;
pub use core::{
    Session,
    SessionStatus,
    Tool,
    ToolCategory,
    ToolMetadata,
    ToolRegistry,
    ToolResult,
};
pub use engine::ReconEngine;
pub use error::{ReconError, ReconResult};
