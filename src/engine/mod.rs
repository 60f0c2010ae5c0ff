mod executor;
mod plan;
mod postprocess;
mod recon;

pub use executor::{BoundedExecutor, ExecutionReport, RunContext};
pub use plan::{Plan, PlanBuilder, PlanSource};
pub use postprocess::{summarize_results, trim_data, PostProcessor, SynthesisOutcome};
pub use recon::ReconEngine;
