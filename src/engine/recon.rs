// src/engine/recon.rs
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::executor::{BoundedExecutor, RunContext};
use super::plan::PlanBuilder;
use super::postprocess::{PostProcessor, SynthesisOutcome};
use crate::advisor::{Advisor, OpenRouterAdvisor};
use crate::config::Config;
use crate::core::{Session, SessionAggregator, SessionStatus, ToolMetadata, ToolRegistry};
use crate::error::{ReconError, ReconResult};
use crate::graph::{ContactGraph, SqliteContactGraph};
use crate::store::{ReconStore, SessionSummary, SqliteStore, TargetStats};
use crate::tools::default_catalog;

/// Orchestrates reconnaissance runs. Each instance owns its registry,
/// backends and in-memory session cache.
pub struct ReconEngine {
    config: Config,
    registry: Arc<ToolRegistry>,
    store: Arc<dyn ReconStore>,
    graph: Option<Arc<dyn ContactGraph>>,
    advisor: Option<Arc<dyn Advisor>>,
    sessions: RwLock<SessionCache>,
}

/// Sessions this engine ran. Finished entries (completed or cancelled) are
/// evicted oldest first once more than `limit` are held.
struct SessionCache {
    entries: HashMap<String, Arc<SessionAggregator>>,
    finished: VecDeque<String>,
    limit: usize,
}

impl SessionCache {
    fn new(limit: usize) -> Self {
        Self {
            entries: HashMap::new(),
            finished: VecDeque::new(),
            limit,
        }
    }

    fn get(&self, session_id: &str) -> Option<&Arc<SessionAggregator>> {
        self.entries.get(session_id)
    }

    fn insert(&mut self, session_id: String, aggregator: Arc<SessionAggregator>) {
        self.entries.insert(session_id, aggregator);
    }

    fn retire(&mut self, session_id: &str) {
        self.finished.push_back(session_id.to_string());
        while self.finished.len() > self.limit {
            if let Some(evicted) = self.finished.pop_front() {
                debug!("Evicting session {} from the in-memory cache", evicted);
                self.entries.remove(&evicted);
            }
        }
    }
}

impl ReconEngine {
    /// Build the registry from the tool catalog and open the configured backends
    pub fn new(config: Config) -> ReconResult<Self> {
        let registry = ToolRegistry::from_catalog(&config, default_catalog());
        if registry.is_empty() {
            return Err(ReconError::NoToolsRegistered);
        }

        let store: Arc<dyn ReconStore> = Arc::new(SqliteStore::open(&config.global.db_path)?);

        let graph: Option<Arc<dyn ContactGraph>> = if config.graph.enabled {
            match SqliteContactGraph::open(&config.graph.db_path) {
                Ok(graph) => Some(Arc::new(graph)),
                Err(e) => {
                    warn!("Contact graph unavailable, continuing without it: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let advisor: Option<Arc<dyn Advisor>> = if config.advisor.enabled {
            match OpenRouterAdvisor::from_config(&config.advisor, &config.global.user_agent) {
                Ok(advisor) => Some(Arc::new(advisor)),
                Err(e) => {
                    warn!("Advisor unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self::from_parts(config, registry, store, graph, advisor)
    }

    /// Assemble an engine from already-built parts
    pub fn from_parts(
        config: Config,
        registry: ToolRegistry,
        store: Arc<dyn ReconStore>,
        graph: Option<Arc<dyn ContactGraph>>,
        advisor: Option<Arc<dyn Advisor>>,
    ) -> ReconResult<Self> {
        if registry.is_empty() {
            return Err(ReconError::NoToolsRegistered);
        }

        info!(
            "Recon engine ready with {} tools (advisor: {}, contact graph: {})",
            registry.len(),
            advisor.as_ref().map_or(false, |a| a.is_enabled()),
            graph.is_some()
        );

        let cache_size = config.global.session_cache_size;
        Ok(Self {
            config,
            registry: Arc::new(registry),
            store,
            graph,
            advisor,
            sessions: RwLock::new(SessionCache::new(cache_size)),
        })
    }

    pub async fn run_recon(&self, target: &str, tools: Option<&[String]>, ai_guided: bool) -> ReconResult<Session> {
        self.run_recon_with_cancel(target, tools, ai_guided, CancellationToken::new()).await
    }

    /// Run every stage for one target and return the completed session.
    ///
    /// If `cancel` fires before post-processing starts the session is left
    /// `running` and `ReconError::Cancelled` is returned. Results of tools
    /// that were already in flight are still recorded.
    pub async fn run_recon_with_cancel(
        &self,
        target: &str,
        tools: Option<&[String]>,
        ai_guided: bool,
        cancel: CancellationToken,
    ) -> ReconResult<Session> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ReconError::InvalidInput("target must not be empty".to_string()));
        }

        let session = Session::start(target);
        let session_id = session.session_id.clone();
        info!("Starting reconnaissance session {} for {} ({})", session_id, target, session.target_type);

        let target_id = self.store.upsert_target(target, session.target_type)?;
        self.store.create_session(&session, target_id)?;

        let aggregator = Arc::new(SessionAggregator::new(session));
        self.sessions.write().insert(session_id.clone(), aggregator.clone());

        let advisor = self.advisor.as_deref();
        let plan = PlanBuilder::new(&self.registry, advisor, self.config.tools.default_plan_size)
            .build(target, tools, ai_guided)
            .await;

        let ctx = RunContext {
            session_id: session_id.clone(),
            target: target.to_string(),
            aggregator: aggregator.clone(),
            store: self.store.clone(),
            graph: self.graph.clone(),
            cancel,
        };
        let executor = BoundedExecutor::new(
            self.registry.clone(),
            self.config.tools.max_concurrent,
            Duration::from_secs(self.config.tools.timeout_seconds),
        );
        let report = executor.execute(&plan.tools, &ctx).await;

        if report.cancelled || ctx.cancel.is_cancelled() {
            warn!("Session {} cancelled, leaving it running", session_id);
            self.sessions.write().retire(&session_id);
            return Err(ReconError::Cancelled { session_id });
        }

        let results = aggregator.results();
        let post = PostProcessor::new(advisor, &self.registry, &self.config.synthesis);

        if let Some(outcome) = post.analyze(target, &results).await {
            if let Err(e) = self.store.upsert_ai_analysis(&session_id, &outcome) {
                error!("Failed to persist AI analysis for {}: {}", session_id, e);
            }
            aggregator.attach_analysis(outcome);
        }

        match post.synthesize(target, &results).await {
            SynthesisOutcome::Profile(profile) => {
                if let Err(e) = self.store.upsert_business_profile(&session_id, &profile) {
                    error!("Failed to persist business profile for {}: {}", session_id, e);
                }
                aggregator.attach_profile(profile);
            }
            SynthesisOutcome::Failed(reason) => warn!("No business profile for {}: {}", session_id, reason),
            other => info!("No business profile for {}: {:?}", session_id, other),
        }

        let end_time = Utc::now();
        self.store.complete_session(&session_id, end_time)?;
        aggregator.mark_completed(end_time);
        self.sessions.write().retire(&session_id);

        let session = aggregator.snapshot();
        info!(
            "Session {} completed: {} tools executed, {} write failures",
            session_id,
            session.tools_executed.len(),
            session.write_failures.len()
        );

        if let Some(dir) = &self.config.global.results_dir {
            write_backup(dir, &session).await;
        }

        Ok(session)
    }

    /// Current snapshot of a session, from memory if this engine ran it,
    /// otherwise rebuilt from storage
    pub fn get_session(&self, session_id: &str) -> ReconResult<Option<Session>> {
        if let Some(aggregator) = self.sessions.read().get(session_id) {
            return Ok(Some(aggregator.snapshot()));
        }
        self.store.load_session(session_id)
    }

    pub fn list_tools(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn get_tool_info(&self, name: &str) -> Option<ToolMetadata> {
        self.registry.info(name)
    }

    pub fn list_sessions(&self, limit: usize, status: Option<SessionStatus>) -> ReconResult<Vec<SessionSummary>> {
        self.store.list_sessions(limit, status)
    }

    pub fn target_stats(&self, target: &str) -> ReconResult<Option<TargetStats>> {
        self.store.target_stats(target)
    }
}

async fn write_backup(dir: &Path, session: &Session) {
    let path = dir.join(format!("{}.json", session.session_id));

    let body = match serde_json::to_string_pretty(session) {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to serialize session {}: {}", session.session_id, e);
            return;
        }
    };

    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!("Failed to create results directory {}: {}", dir.display(), e);
        return;
    }

    match tokio::fs::write(&path, body).await {
        Ok(()) => info!("Session backup written to {}", path.display()),
        Err(e) => warn!("Failed to write session backup {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use crate::advisor::MockAdvisor;
    use crate::core::{Tool, ToolCategory, ToolResult};

    struct EchoTool(ToolMetadata);

    #[async_trait]
    impl Tool for EchoTool {
        fn metadata(&self) -> &ToolMetadata {
            &self.0
        }

        async fn probe(&self, target: &str) -> ToolResult {
            ToolResult::success(&self.0.name, target, json!({"emails": ["Info@Example.com"]}))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::from_tools(vec![
            Arc::new(EchoTool(ToolMetadata::new("site", "site", ToolCategory::Web))) as Arc<dyn Tool>,
            Arc::new(EchoTool(ToolMetadata::new("certs", "certs", ToolCategory::Dns))),
        ])
    }

    fn config(results_dir: Option<&Path>) -> Config {
        let mut config = Config::default();
        config.global.results_dir = results_dir.map(Path::to_path_buf);
        config
    }

    #[test]
    fn test_empty_registry_is_fatal() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let result = ReconEngine::from_parts(Config::default(), ToolRegistry::from_tools(Vec::new()), store, None, None);
        assert!(matches!(result, Err(ReconError::NoToolsRegistered)));
    }

    #[tokio::test]
    async fn test_run_completes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let graph = Arc::new(SqliteContactGraph::in_memory().unwrap());
        let engine = ReconEngine::from_parts(
            config(Some(dir.path())),
            registry(),
            store.clone(),
            Some(graph.clone()),
            None,
        )
        .unwrap();

        let session = engine.run_recon("example.com", None, false).await.unwrap();

        assert!(session.is_completed());
        assert!(session.end_time.is_some());
        assert_eq!(session.tools_executed.len(), 2);
        assert_eq!(session.ai_analysis.as_ref().map(|a| a.status()), Some("unavailable"));
        assert!(session.business_profile.is_none());

        let stored = store.load_session(&session.session_id).unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert_eq!(store.tool_result_count(&session.session_id).unwrap(), 2);

        let contacts = graph.contacts_for("example.com").unwrap();
        assert_eq!(contacts, vec![("email".to_string(), "info@example.com".to_string())]);

        let backup = dir.path().join(format!("{}.json", session.session_id));
        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(backup).unwrap()).unwrap();
        assert_eq!(written["session_id"], session.session_id.as_str());
    }

    #[tokio::test]
    async fn test_profile_is_attached_and_persisted() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let mut advisor = MockAdvisor::new();
        advisor.expect_is_enabled().return_const(true);
        advisor.expect_analyze().returning(|_, _| Ok(json!({"summary": "two tools"})));
        advisor
            .expect_synthesize()
            .times(1)
            .returning(|_, _| Ok(Some(json!({"industry": "Retail"}))));

        let engine = ReconEngine::from_parts(config(None), registry(), store.clone(), None, Some(Arc::new(advisor))).unwrap();
        let session = engine.run_recon("example.com", None, false).await.unwrap();

        let profile = session.business_profile.as_ref().unwrap();
        assert_eq!(profile.industry.as_deref(), Some("Retail"));
        assert_eq!(profile.source_tools, vec!["site".to_string()]);
        assert_eq!(session.ai_analysis.as_ref().map(|a| a.status()), Some("completed"));

        let stored = store.load_session(&session.session_id).unwrap().unwrap();
        assert_eq!(stored.business_profile, session.business_profile);
    }

    #[tokio::test]
    async fn test_cancelled_run_stays_running() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = ReconEngine::from_parts(config(None), registry(), store.clone(), None, None).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = engine
            .run_recon_with_cancel("example.com", None, false, cancel)
            .await
            .unwrap_err();

        let ReconError::Cancelled { session_id } = err else {
            panic!("expected cancellation, got {:?}", err);
        };
        let cached = engine.get_session(&session_id).unwrap().unwrap();
        assert_eq!(cached.status, SessionStatus::Running);
        let stored = store.load_session(&session_id).unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Running);
    }

    #[tokio::test]
    async fn test_completed_sessions_are_evicted_from_cache() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let mut config = config(None);
        config.global.session_cache_size = 1;
        let engine = ReconEngine::from_parts(config, registry(), store, None, None).unwrap();

        let first = engine.run_recon("example.com", None, false).await.unwrap();
        let second = engine.run_recon("example.org", None, false).await.unwrap();

        {
            let cache = engine.sessions.read();
            assert!(cache.get(&first.session_id).is_none());
            assert!(cache.get(&second.session_id).is_some());
            assert_eq!(cache.entries.len(), 1);
        }

        let reloaded = engine.get_session(&first.session_id).unwrap().unwrap();
        assert_eq!(reloaded.status, SessionStatus::Completed);
        assert_eq!(reloaded.tools_executed.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_queries() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let engine = ReconEngine::from_parts(config(None), registry(), store, None, None).unwrap();

        assert_eq!(engine.list_tools(), vec!["site".to_string(), "certs".to_string()]);
        assert_eq!(engine.get_tool_info("certs").unwrap().category, ToolCategory::Dns);
        assert!(engine.get_tool_info("nmap").is_none());
        assert!(engine.get_session("missing").unwrap().is_none());
    }
}
