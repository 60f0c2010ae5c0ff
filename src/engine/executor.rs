// src/engine/executor.rs
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::{SessionAggregator, Tool, ToolRegistry, ToolResult};
use crate::error::ReconError;
use crate::graph::{extract_contacts, ContactGraph};
use crate::store::ReconStore;

/// Everything a completing tool needs to commit its result
#[derive(Clone)]
pub struct RunContext {
    pub session_id: String,
    pub target: String,
    pub aggregator: Arc<SessionAggregator>,
    pub store: Arc<dyn ReconStore>,
    pub graph: Option<Arc<dyn ContactGraph>>,
    pub cancel: CancellationToken,
}

/// What happened to each planned identifier
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReport {
    /// Registered tools that were started, in dispatch order
    pub dispatched: Vec<String>,
    /// Planned names with no registered tool
    pub skipped: Vec<String>,
    /// Tools whose result could not be persisted
    pub write_failures: Vec<String>,
    pub cancelled: bool,
}

/// Runs a plan with at most `max_concurrent` probes in flight
pub struct BoundedExecutor {
    registry: Arc<ToolRegistry>,
    max_concurrent: usize,
    timeout: Duration,
}

impl BoundedExecutor {
    pub fn new(registry: Arc<ToolRegistry>, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            registry,
            max_concurrent: max_concurrent.max(1),
            timeout,
        }
    }

    /// Fan out over the plan and wait for every started tool to finish.
    ///
    /// Each finished tool is written to the store before it is recorded in
    /// the aggregator. Unknown and repeated names are skipped. Once `cancel`
    /// fires no new tool is started; tools already running are awaited.
    pub async fn execute(&self, plan: &[String], ctx: &RunContext) -> ExecutionReport {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut report = ExecutionReport::default();
        let mut seen = HashSet::new();
        let mut handles = Vec::new();

        info!(
            "Executing {} planned tools against {} with max concurrency {}",
            plan.len(), ctx.target, self.max_concurrent
        );

        for name in plan {
            if !seen.insert(name.as_str()) {
                debug!("Tool '{}' appears more than once in the plan, running it once", name);
                continue;
            }

            let Some(tool) = self.registry.get(name) else {
                warn!("Tool '{}' not found, skipping", name);
                report.skipped.push(name.clone());
                continue;
            };

            let permit = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => {
                    info!("Cancellation requested, not starting remaining tools");
                    report.cancelled = true;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            report.dispatched.push(name.clone());

            let task_ctx = ctx.clone();
            let timeout = self.timeout;
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let result = run_isolated(tool, &task_ctx.target, timeout).await;
                commit(&task_ctx, result)
            });
            handles.push((name.clone(), handle));
        }

        for (name, handle) in handles {
            let committed = match handle.await {
                Ok(committed) => committed,
                Err(e) => {
                    let message = join_error_message(e);
                    error!("Task for tool '{}' aborted: {}", name, message);
                    if ctx.aggregator.contains(&name) {
                        true
                    } else {
                        commit(ctx, ToolResult::failure(&name, &ctx.target, message))
                    }
                }
            };

            if !committed && !ctx.aggregator.contains(&name) {
                report.write_failures.push(name);
            }
        }

        if !report.cancelled && ctx.cancel.is_cancelled() {
            info!("Cancellation requested while tools were in flight");
            report.cancelled = true;
        }

        info!(
            "Fan-in complete: {} dispatched, {} skipped, {} write failures",
            report.dispatched.len(), report.skipped.len(), report.write_failures.len()
        );
        report
    }
}

/// Probe one tool under the deadline, turning a timeout or panic into a
/// failed result
async fn run_isolated(tool: Arc<dyn Tool>, target: &str, timeout: Duration) -> ToolResult {
    let name = tool.metadata().name.clone();
    info!("Executing {} on {}", name, target);

    let start_time = Instant::now();
    let outcome = AssertUnwindSafe(tokio::time::timeout(timeout, tool.probe(target)))
        .catch_unwind()
        .await;
    let elapsed = start_time.elapsed().as_secs_f64();

    let result = match outcome {
        Ok(Ok(result)) => result.normalized(&name),
        Ok(Err(_)) => {
            warn!("Tool '{}' timed out after {:?}", name, timeout);
            let error = ReconError::TimeoutError { tool: name.clone(), timeout };
            ToolResult::failure(&name, target, error.to_string())
                .with_execution_time(elapsed)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!("Tool '{}' panicked: {}", name, message);
            ToolResult::failure(&name, target, format!("Tool panicked: {}", message))
                .with_execution_time(elapsed)
        }
    };

    debug!(
        "Tool '{}' finished in {:.2}s (success: {})",
        name, result.execution_time, result.success
    );
    result
}

/// Persist a result, then publish it. Returns false if it was not recorded.
fn commit(ctx: &RunContext, result: ToolResult) -> bool {
    let name = result.tool_name.clone();
    let contacts = result
        .data
        .as_ref()
        .filter(|_| result.success && ctx.graph.is_some())
        .map(extract_contacts);

    let recorded = ctx
        .aggregator
        .record_with(result, |result| ctx.store.record_tool_result(&ctx.session_id, result));

    match recorded {
        Ok(true) => {}
        Ok(false) => return false,
        Err(e) => {
            error!("Failed to persist result of '{}' for session {}: {}", name, ctx.session_id, e);
            ctx.aggregator.record_write_failure(&name, e.to_string());
            return false;
        }
    }

    if let (Some(graph), Some(contacts)) = (&ctx.graph, contacts.filter(|c| !c.is_empty())) {
        if let Err(e) = graph.ingest_contacts(&ctx.target, &contacts.emails, &contacts.phones, &name) {
            debug!("Skipping graph ingestion for {}: {}", name, e);
        }
    }

    true
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn join_error_message(error: JoinError) -> String {
    if error.is_panic() {
        format!("Tool task panicked: {}", panic_message(error.into_panic().as_ref()))
    } else {
        format!("Tool task failed: {}", error)
    }
}
