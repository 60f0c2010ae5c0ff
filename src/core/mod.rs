mod analysis;
mod registry;
mod session;
mod target;
mod tool;

pub use analysis::{AiAnalysis, AnalysisOutcome, BusinessProfile};
pub use registry::{CatalogEntry, ToolConstructor, ToolRegistry};
pub use session::{Session, SessionAggregator, SessionStatus, WriteFailure};
pub use target::{domain_of, sanitize, TargetType};
pub use tool::{capture, Tool, ToolCategory, ToolMetadata, ToolOutput, ToolResult};
