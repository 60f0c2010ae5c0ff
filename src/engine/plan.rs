// src/engine/plan.rs
use std::collections::HashSet;
use std::fmt;
use tracing::{info, warn};

use crate::advisor::Advisor;
use crate::core::ToolRegistry;

/// Where a plan came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    Advisor,
    /// AI guidance was requested but produced nothing usable
    Fallback,
    Explicit,
    Registry,
}

impl fmt::Display for PlanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlanSource::Advisor => "advisor",
            PlanSource::Fallback => "fallback",
            PlanSource::Explicit => "explicit",
            PlanSource::Registry => "registry",
        };
        f.write_str(label)
    }
}

/// Ordered tool identifiers selected for one run
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub tools: Vec<String>,
    pub source: PlanSource,
}

pub struct PlanBuilder<'a> {
    registry: &'a ToolRegistry,
    advisor: Option<&'a dyn Advisor>,
    fallback_size: usize,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(registry: &'a ToolRegistry, advisor: Option<&'a dyn Advisor>, fallback_size: usize) -> Self {
        Self {
            registry,
            advisor,
            fallback_size: fallback_size.max(1),
        }
    }

    /// Pick the tools for a run.
    ///
    /// With `ai_guided`, the advisor's answer is filtered to registered names;
    /// if that leaves nothing (or the advisor is missing or fails) the first
    /// `fallback_size` registered tools are used. Otherwise the explicit list
    /// is passed through unfiltered, or the whole registry when there is none.
    pub async fn build(&self, target: &str, explicit: Option<&[String]>, ai_guided: bool) -> Plan {
        let plan = if ai_guided {
            match self.advised(target).await {
                Some(tools) => Plan { tools, source: PlanSource::Advisor },
                None => Plan { tools: self.fallback(), source: PlanSource::Fallback },
            }
        } else if let Some(tools) = explicit.filter(|tools| !tools.is_empty()) {
            Plan { tools: tools.to_vec(), source: PlanSource::Explicit }
        } else {
            Plan { tools: self.registry.list(), source: PlanSource::Registry }
        };

        info!("Execution plan ({}) for {}: {:?}", plan.source, target, plan.tools);
        plan
    }

    async fn advised(&self, target: &str) -> Option<Vec<String>> {
        let advisor = self.advisor.filter(|advisor| advisor.is_enabled())?;

        let proposed = match advisor.plan(target, &self.registry.list()).await {
            Ok(proposed) => proposed,
            Err(e) => {
                warn!("Advisor planning failed, using default plan: {}", e);
                return None;
            }
        };

        let mut seen = HashSet::new();
        let mut tools = Vec::new();
        for name in proposed {
            if !self.registry.contains(&name) {
                warn!("Advisor proposed unknown tool '{}', dropping it", name);
            } else if seen.insert(name.clone()) {
                tools.push(name);
            }
        }

        if tools.is_empty() {
            warn!("Advisor plan contained no registered tools, using default plan");
            None
        } else {
            Some(tools)
        }
    }

    fn fallback(&self) -> Vec<String> {
        self.registry.list().into_iter().take(self.fallback_size).collect()
    }
}
