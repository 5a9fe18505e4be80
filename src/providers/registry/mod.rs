use crate::config::AgentsConfig;
use crate::providers::base::Agent;
use crate::providers::command::CommandAgent;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Named agents plus the process-wide active selection.
///
/// A turn reads the active agent once at its start; switching while a turn
/// is in flight only affects later turns.
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
    active: RwLock<(String, Arc<dyn Agent>)>,
}

impl AgentRegistry {
    pub fn new(agents: HashMap<String, Arc<dyn Agent>>, default: &str) -> Result<Self> {
        let agent = agents
            .get(default)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown agent: {}", default))?;
        Ok(Self {
            agents,
            active: RwLock::new((default.to_string(), agent)),
        })
    }

    pub fn from_config(config: &AgentsConfig) -> Result<Self> {
        let agents = config
            .definitions
            .iter()
            .map(|(name, def)| {
                let agent: Arc<dyn Agent> = Arc::new(CommandAgent::new(name, def.clone()));
                (name.clone(), agent)
            })
            .collect();
        Self::new(agents, &config.default)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).cloned()
    }

    pub fn active_name(&self) -> String {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .0
            .clone()
    }

    /// The currently selected agent and its name.
    pub fn active(&self) -> (String, Arc<dyn Agent>) {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Resolve an explicit agent name, or the active one when `None`.
    pub fn resolve(&self, name: Option<&str>) -> Result<(String, Arc<dyn Agent>)> {
        match name {
            Some(name) => self
                .get(name)
                .map(|agent| (name.to_string(), agent))
                .ok_or_else(|| anyhow::anyhow!("unknown agent: {}", name)),
            None => Ok(self.active()),
        }
    }

    pub fn switch(&self, name: &str) -> Result<()> {
        let agent = self
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("unknown agent: {}", name))?;
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if active.0 != name {
            info!("switching active agent from '{}' to '{}'", active.0, name);
            *active = (name.to_string(), agent);
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.keys().cloned().collect();
        names.sort();
        names
    }
}
