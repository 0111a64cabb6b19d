//! Synchronous front end for transports without an async runtime.

use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::agent::{AgentLoop, EventSink};
use crate::error::{ParlanceError, Result};
use crate::session::SessionStore;
use crate::skills::SkillCatalog;

use super::manager::{HandleResult, SessionDefaults, SessionRegistry};

/// A [`SessionRegistry`] driven by its own current-thread tokio runtime.
///
/// Must not be used from inside an async context: `block_on` panics when
/// called on a runtime worker thread.
pub struct BlockingRegistry {
    runtime: Runtime,
    registry: SessionRegistry,
}

impl BlockingRegistry {
    pub fn open(
        agent: Arc<AgentLoop>,
        store: SessionStore,
        defaults: SessionDefaults,
        skills: SkillCatalog,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ParlanceError::Session(format!("failed to start runtime: {}", e)))?;
        let registry = runtime.block_on(SessionRegistry::open(agent, store, defaults, skills))?;
        Ok(Self { runtime, registry })
    }

    /// Blocking [`SessionRegistry::handle`].
    pub fn handle_blocking(&self, text: &str, session_id: &str, sink: &dyn EventSink) -> HandleResult {
        self.runtime
            .block_on(self.registry.handle(text, session_id, sink))
    }

    /// The wrapped registry, for setup that needs the async API.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Run any future on the owned runtime.
    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }
}
