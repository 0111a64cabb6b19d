//! Session registry - the single entry point transports call.
//!
//! [`SessionRegistry::handle`] takes a line of user text and a session id,
//! routes it to a hook or to the agent loop, persists the session and returns
//! a [`HandleResult`]. Each session id has its own lock: two messages for the
//! same session run one after the other, while different sessions proceed
//! concurrently.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::agent::{emit, AgentEvent, AgentLoop, EventSink};
use crate::config::Config;
use crate::error::{ParlanceError, Result};
use crate::session::{SessionState, SessionStore, TokenBudget, ToolSelection};
use crate::skills::SkillCatalog;
use crate::utils::string::{preview, single_line};

use super::hook::{HookAction, HookDispatcher, HookHandler, HookResult};

/// A session slot. `None` until the first caller loads or creates the state.
type Slot = Arc<Mutex<Option<SessionState>>>;

/// Settings given to sessions the registry creates.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDefaults {
    pub budget: TokenBudget,
    pub tools: ToolSelection,
    /// Sessions held in memory before idle, saved ones are evicted.
    /// `0` disables eviction.
    pub max_cached: usize,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            budget: TokenBudget::default(),
            tools: ToolSelection::default(),
            max_cached: 256,
        }
    }
}

impl SessionDefaults {
    pub fn from_config(config: &Config) -> Self {
        Self {
            budget: config.context.budget(),
            tools: config.tools.selection(),
            max_cached: config.sessions.max_cached,
        }
    }
}

/// Catalogue entry for one known session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub session_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub message_count: usize,
}

impl SessionSummary {
    fn of(state: &SessionState) -> Self {
        Self {
            session_id: state.session_id.clone(),
            name: state.name.clone(),
            created_at: state.created_at,
            last_active: state.last_active,
            message_count: state.message_count(),
        }
    }
}

/// What a transport receives for every handled message.
#[derive(Debug, Clone, PartialEq)]
pub struct HandleResult {
    /// Reply or hook message to show the user
    pub message: String,
    pub action: HookAction,
    pub action_data: Map<String, Value>,
    /// `false` when the session could not be saved after the call
    pub persisted: bool,
}

impl HandleResult {
    /// The session a `SwitchSession` result points at.
    pub fn target_session(&self) -> Option<&str> {
        match self.action {
            HookAction::SwitchSession => self.action_data.get("session_id")?.as_str(),
            _ => None,
        }
    }
}

struct RegistryShared {
    agent: Arc<AgentLoop>,
    store: SessionStore,
    defaults: SessionDefaults,
    skills: SkillCatalog,
    slots: RwLock<HashMap<String, Slot>>,
    /// Ids whose last save failed; their slots must not be evicted.
    unsaved: RwLock<HashSet<String>>,
    catalog: RwLock<BTreeMap<String, SessionSummary>>,
    hooks: HookDispatcher,
}

/// Owns every session and serializes access to each one.
///
/// Cloning is cheap; clones share the same sessions.
#[derive(Clone)]
pub struct SessionRegistry {
    shared: Arc<RegistryShared>,
}

impl SessionRegistry {
    /// Open a registry over `store`, reading the catalogue of stored sessions
    /// and registering the built-in hooks.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed. Individual unreadable
    /// records are skipped.
    pub async fn open(
        agent: Arc<AgentLoop>,
        store: SessionStore,
        defaults: SessionDefaults,
        skills: SkillCatalog,
    ) -> Result<Self> {
        let records = store.list().await?;
        let catalog: BTreeMap<String, SessionSummary> = records
            .iter()
            .map(|s| (s.session_id.clone(), SessionSummary::of(s)))
            .collect();
        info!(sessions = catalog.len(), skills = skills.len(), "Session registry opened");

        let registry = Self {
            shared: Arc::new(RegistryShared {
                agent,
                store,
                defaults,
                skills,
                slots: RwLock::new(HashMap::new()),
                unsaved: RwLock::new(HashSet::new()),
                catalog: RwLock::new(catalog),
                hooks: HookDispatcher::new(),
            }),
        };
        for kind in Builtin::ALL {
            let hook = BuiltinHook {
                kind,
                shared: Arc::downgrade(&registry.shared),
            };
            registry.shared.hooks.register(kind.name(), Arc::new(hook)).await;
        }
        Ok(registry)
    }

    /// Handle one line of user text for `session_id`.
    ///
    /// Slash commands go to the hook dispatcher, everything else to the
    /// agent loop. The session is saved afterwards; a failed save is logged,
    /// reported to `sink` and flagged in [`HandleResult::persisted`], but the
    /// reply is still returned.
    pub async fn handle(&self, text: &str, session_id: &str, sink: &dyn EventSink) -> HandleResult {
        let span = info_span!("handle", session_id = %session_id);
        self.handle_locked(text, session_id, sink)
            .instrument(span)
            .await
    }

    async fn handle_locked(&self, text: &str, session_id: &str, sink: &dyn EventSink) -> HandleResult {
        let shared = &self.shared;
        let mut guard = shared.lock_session(session_id).await;
        let state = shared.ensure_loaded(&mut guard, session_id).await;

        let (message, action, action_data) = match shared.hooks.dispatch(text, state).await {
            Some(result) => {
                debug!(action = ?result.action, "Hook handled");
                (result.message, result.action, result.action_data)
            }
            None => {
                let outcome = shared.agent.run(state, text, sink).await;
                debug!(stop = ?outcome.stop, iterations = outcome.iterations, "Turn finished");
                (outcome.reply, HookAction::None, Map::new())
            }
        };

        state.touch();
        let persisted = match shared.store.save(state).await {
            Ok(()) => {
                shared.unsaved.write().await.remove(session_id);
                true
            }
            Err(e) => {
                shared.unsaved.write().await.insert(session_id.to_string());
                error!(error = %e, "Failed to persist session");
                emit(
                    sink,
                    &AgentEvent::Error {
                        message: "Failed to save session".to_string(),
                        details: Some(e.to_string()),
                    },
                )
                .await;
                false
            }
        };
        shared
            .catalog
            .write()
            .await
            .insert(session_id.to_string(), SessionSummary::of(state));
        shared.evict_idle(session_id).await;

        HandleResult {
            message,
            action,
            action_data,
            persisted,
        }
    }

    /// Register a custom hook next to the built-in ones.
    pub async fn register_hook(&self, name: &str, handler: Arc<dyn HookHandler>) {
        self.shared.hooks.register(name, handler).await;
    }

    pub fn hooks(&self) -> &HookDispatcher {
        &self.shared.hooks
    }

    pub fn agent(&self) -> &Arc<AgentLoop> {
        &self.shared.agent
    }

    pub fn store(&self) -> &SessionStore {
        &self.shared.store
    }

    pub fn skills(&self) -> &SkillCatalog {
        &self.shared.skills
    }

    /// Known sessions, most recently active first.
    pub async fn sessions(&self) -> Vec<SessionSummary> {
        self.shared.sorted_catalog().await
    }

    /// Whether `session_id` is a known session.
    pub async fn contains(&self, session_id: &str) -> bool {
        self.shared.catalog.read().await.contains_key(session_id)
    }

    /// A copy of a session's current state, waiting for any running turn.
    pub async fn snapshot(&self, session_id: &str) -> Option<SessionState> {
        let slot = self.shared.slots.read().await.get(session_id).cloned();
        if let Some(slot) = slot {
            if let Some(state) = slot.lock().await.as_ref() {
                return Some(state.clone());
            }
        }
        self.shared.store.load(session_id).await.ok().flatten()
    }
}

impl RegistryShared {
    /// Lock the slot for `session_id`, creating it if needed.
    ///
    /// A slot removed by `/delete` while we waited is stale; retry against
    /// the current one so one id never has two live slots.
    async fn lock_session(&self, session_id: &str) -> OwnedMutexGuard<Option<SessionState>> {
        loop {
            let slot = self.slot(session_id).await;
            let guard = slot.clone().lock_owned().await;
            if self.is_current(session_id, &slot).await {
                return guard;
            }
            debug!(session_id, "Session slot was replaced, retrying");
        }
    }

    /// Whether `slot` is still the registered slot for `session_id`.
    async fn is_current(&self, session_id: &str, slot: &Slot) -> bool {
        self.slots
            .read()
            .await
            .get(session_id)
            .is_some_and(|s| Arc::ptr_eq(s, slot))
    }

    async fn slot(&self, session_id: &str) -> Slot {
        if let Some(slot) = self.slots.read().await.get(session_id) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Fill a locked slot from the store, or with a fresh session.
    async fn ensure_loaded<'a>(
        &self,
        slot: &'a mut Option<SessionState>,
        session_id: &str,
    ) -> &'a mut SessionState {
        let state = match slot.take() {
            Some(state) => state,
            None => {
                let state = self.load_or_fresh(session_id).await;
                self.catalog
                    .write()
                    .await
                    .insert(session_id.to_string(), SessionSummary::of(&state));
                state
            }
        };
        slot.insert(state)
    }

    async fn load_or_fresh(&self, session_id: &str) -> SessionState {
        match self.store.load(session_id).await {
            Ok(Some(mut state)) => {
                if state.session_id != session_id {
                    warn!(
                        session_id,
                        recorded = %state.session_id,
                        "Session record has a different id, using the requested one"
                    );
                    state.session_id = session_id.to_string();
                }
                if !state.budget.is_valid() {
                    warn!(
                        session_id,
                        budget = ?state.budget,
                        "Session record has an out-of-range budget, using defaults"
                    );
                    state.budget = state.budget.normalized();
                }
                if state.system_prompt.is_empty() {
                    self.agent.context_builder().refresh(&mut state, &self.skills);
                }
                debug!(session_id, messages = state.message_count(), "Session loaded");
                state
            }
            Ok(None) => {
                info!(session_id, "Creating session");
                self.fresh_session(session_id, session_id, None)
            }
            Err(e) => {
                warn!(session_id, error = %e, "Session record unreadable, starting fresh");
                self.fresh_session(session_id, session_id, None)
            }
        }
    }

    /// A new empty session. Skills and tool selection are inherited from
    /// `parent` when given, otherwise taken from the defaults.
    fn fresh_session(&self, session_id: &str, name: &str, parent: Option<&SessionState>) -> SessionState {
        let tools = parent
            .map(|p| p.enabled_tools.clone())
            .unwrap_or_else(|| self.defaults.tools.clone());
        let mut state = SessionState::new(session_id, name, self.defaults.budget, tools);
        if let Some(parent) = parent {
            state.loaded_skills = parent.loaded_skills.clone();
        }
        self.agent.context_builder().refresh(&mut state, &self.skills);
        state
    }

    /// Drop idle slots beyond `max_cached`, least recently active first.
    ///
    /// Only slots that are unlocked and whose last save succeeded go; their
    /// state is reloaded from the store on the next call. `keep` is never
    /// evicted.
    async fn evict_idle(&self, keep: &str) {
        let capacity = self.defaults.max_cached;
        if capacity == 0 {
            return;
        }
        let mut slots = self.slots.write().await;
        if slots.len() <= capacity {
            return;
        }

        let mut candidates: Vec<(Option<DateTime<Utc>>, String)> = {
            let unsaved = self.unsaved.read().await;
            let catalog = self.catalog.read().await;
            slots
                .keys()
                .filter(|id| id.as_str() != keep && !unsaved.contains(id.as_str()))
                .map(|id| (catalog.get(id).map(|s| s.last_active), id.clone()))
                .collect()
        };
        candidates.sort();

        let mut evicted = 0;
        for (_, id) in candidates {
            if slots.len() <= capacity {
                break;
            }
            let Some(slot) = slots.get(&id).cloned() else {
                continue;
            };
            // Held across the removal so no turn is running on it.
            let Ok(_guard) = slot.try_lock_owned() else {
                continue;
            };
            slots.remove(&id);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, cached = slots.len(), "Evicted idle sessions");
        }
    }

    async fn sorted_catalog(&self) -> Vec<SessionSummary> {
        let mut sessions: Vec<SessionSummary> =
            self.catalog.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| {
            b.last_active
                .cmp(&a.last_active)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        sessions
    }

    /// Session id for an id or an exact session name.
    async fn resolve_name(&self, target: &str) -> Option<String> {
        let catalog = self.catalog.read().await;
        if catalog.contains_key(target) {
            return Some(target.to_string());
        }
        catalog
            .values()
            .find(|s| s.name == target)
            .map(|s| s.session_id.clone())
    }

    /// `base`, or `base-1`, `base-2`, ... if another session has that name.
    async fn unique_name(&self, base: &str, exclude: Option<&str>) -> String {
        let catalog = self.catalog.read().await;
        let taken = |name: &str| {
            catalog
                .values()
                .any(|s| s.name == name && Some(s.session_id.as_str()) != exclude)
        };
        if !taken(base) {
            return base.to_string();
        }
        let mut counter = 1;
        while taken(&format!("{}-{}", base, counter)) {
            counter += 1;
        }
        format!("{}-{}", base, counter)
    }

    // ── hooks ──────────────────────────────────────────────────────────

    async fn hook_new(&self, args: &[String], state: &SessionState) -> Result<HookResult> {
        let session_id = generate_session_id();
        let name = match args.first() {
            Some(base) => self.unique_name(base, None).await,
            None => format!("session-{}", session_id),
        };

        let fresh = self.fresh_session(&session_id, &name, Some(state));
        self.store.save(&fresh).await?;
        self.catalog
            .write()
            .await
            .insert(session_id.clone(), SessionSummary::of(&fresh));
        self.slots
            .write()
            .await
            .insert(session_id.clone(), Arc::new(Mutex::new(Some(fresh))));
        info!(session_id = %session_id, name = %name, "Created session");

        Ok(HookResult::switch_session(
            format!("Created new session: {} (ID: {})", name, session_id),
            &session_id,
        ))
    }

    async fn hook_switch(&self, args: &[String], state: &SessionState) -> Result<HookResult> {
        let Some(target) = args.first() else {
            return Ok(HookResult::error("Usage: /switch <session_name_or_id>"));
        };
        let Some(session_id) = self.resolve_name(target).await else {
            return Ok(HookResult::error(format!(
                "Session '{}' not found. Use /list to see available sessions.",
                target
            )));
        };
        if session_id == state.session_id {
            return Ok(HookResult::switch_session(
                format!("Already in session: {}", state.name),
                &session_id,
            ));
        }

        let in_memory = self.slots.read().await.contains_key(&session_id);
        if !in_memory && !matches!(self.store.load(&session_id).await, Ok(Some(_))) {
            return Ok(HookResult::error(format!("Failed to load session: {}", target)));
        }

        let name = self
            .catalog
            .read()
            .await
            .get(&session_id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| session_id.clone());
        info!(from = %state.session_id, to = %session_id, "Switching session");
        Ok(HookResult::switch_session(
            format!("Switched to session: {}", name),
            &session_id,
        ))
    }

    async fn hook_list(&self, state: &SessionState) -> Result<HookResult> {
        let sessions = self.sorted_catalog().await;
        if sessions.is_empty() {
            return Ok(HookResult::ok(
                "No sessions available. Create one with /new [name]",
            ));
        }

        let mut lines = vec![
            "**Available Sessions:**".to_string(),
            String::new(),
            "| Name | Messages | Created | Last Active |".to_string(),
            "|------|----------|---------|-------------|".to_string(),
        ];
        for summary in &sessions {
            // The caller's row comes from the live state, not the catalogue.
            let (name, count) = if summary.session_id == state.session_id {
                (format!("**{}** ✓", state.name), state.message_count())
            } else {
                (summary.name.clone(), summary.message_count)
            };
            lines.push(format!(
                "| {} | {} | {} | {} |",
                name,
                count,
                format_time(&summary.created_at),
                format_time(&summary.last_active)
            ));
        }
        lines.push(String::new());
        lines.push("*✓ indicates the current active session*".to_string());
        Ok(HookResult::ok(lines.join("\n")))
    }

    async fn hook_delete(&self, args: &[String], state: &SessionState) -> Result<HookResult> {
        let Some(target) = args.first() else {
            return Ok(HookResult::error("Usage: /delete <session_name_or_id>"));
        };
        let Some(session_id) = self.resolve_name(target).await else {
            return Ok(HookResult::error(format!("Session '{}' not found.", target)));
        };
        if session_id == state.session_id {
            return Ok(HookResult::error(
                "Cannot delete the current active session. Switch to another session first.",
            ));
        }

        // Never wait on another session's lock from inside a hook. The slot
        // is created if missing so a turn starting meanwhile queues on it.
        let slot = self.slot(&session_id).await;
        let busy = || {
            HookResult::error(format!("Session '{}' is busy. Try again later.", target))
        };
        let Ok(guard) = slot.clone().try_lock_owned() else {
            return Ok(busy());
        };
        if !self.is_current(&session_id, &slot).await {
            return Ok(busy());
        }

        if let Err(e) = self.store.delete(&session_id).await {
            warn!(session_id = %session_id, error = %e, "Failed to delete session record");
            return Ok(HookResult::error(format!("Error deleting session: {}", e)));
        }
        {
            let mut slots = self.slots.write().await;
            if slots.get(&session_id).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
                slots.remove(&session_id);
            }
        }
        self.unsaved.write().await.remove(&session_id);
        let name = self
            .catalog
            .write()
            .await
            .remove(&session_id)
            .map(|s| s.name)
            .unwrap_or_else(|| session_id.clone());
        // Turns queued on the removed slot see it is stale and start over.
        drop(guard);
        info!(session_id = %session_id, name = %name, "Deleted session");

        Ok(HookResult::refresh_sessions(
            format!("Deleted session: {}", name),
            None,
        ))
    }

    async fn hook_rename(&self, args: &[String], state: &mut SessionState) -> Result<HookResult> {
        let (session_id, new_name) = match args {
            [new_name] => (state.session_id.clone(), new_name),
            [target, new_name, ..] => match self.resolve_name(target).await {
                Some(session_id) => (session_id, new_name),
                None => {
                    return Ok(HookResult::error(format!("Session '{}' not found.", target)))
                }
            },
            [] => {
                return Ok(HookResult::error(
                    "Usage: /rename <new_name> or /rename <session> <new_name>",
                ))
            }
        };

        let resolved = self.unique_name(new_name, Some(&session_id)).await;
        let old_name = if session_id == state.session_id {
            let old = std::mem::replace(&mut state.name, resolved.clone());
            self.catalog
                .write()
                .await
                .insert(session_id.clone(), SessionSummary::of(state));
            old
        } else {
            let slot = self.slot(&session_id).await;
            let busy = || {
                HookResult::error(format!("Session '{}' is busy. Try again later.", session_id))
            };
            let Ok(mut guard) = slot.clone().try_lock_owned() else {
                return Ok(busy());
            };
            if !self.is_current(&session_id, &slot).await {
                return Ok(busy());
            }
            let other = self.ensure_loaded(&mut guard, &session_id).await;
            let old = std::mem::replace(&mut other.name, resolved.clone());
            if let Err(e) = self.store.save(other).await {
                self.unsaved.write().await.insert(session_id.clone());
                return Err(e);
            }
            self.unsaved.write().await.remove(&session_id);
            self.catalog
                .write()
                .await
                .insert(session_id.clone(), SessionSummary::of(other));
            old
        };
        info!(session_id = %session_id, from = %old_name, to = %resolved, "Renamed session");

        let message = if &resolved != new_name {
            format!("Renamed '{}' to '{}' (name conflict resolved)", old_name, resolved)
        } else {
            format!("Renamed '{}' to '{}'", old_name, resolved)
        };
        Ok(HookResult::refresh_sessions(message, None))
    }

    async fn hook_compress(&self, state: &mut SessionState) -> Result<HookResult> {
        let provider = self.agent.provider().await;
        let report = self
            .agent
            .accountant()
            .compress(state, provider.as_deref())
            .await;
        Ok(HookResult::ok(report.message))
    }

    async fn hook_save(&self, args: &[String], state: &SessionState) -> Result<HookResult> {
        let path = args.first().map(String::as_str).unwrap_or("history.json");
        match self.store.export(state, Path::new(path)).await {
            Ok(()) => Ok(HookResult::ok(format!(
                "History for session {} saved to {}.",
                state.session_id, path
            ))),
            Err(e) => Ok(HookResult::error(format!("Failed to save history: {}", e))),
        }
    }

    async fn hook_tools(&self, args: &[String], state: &mut SessionState) -> Result<HookResult> {
        let tools = self.agent.tools().read().await;

        if !args.is_empty() {
            let names: Vec<&str> = args
                .iter()
                .flat_map(|a| a.split(','))
                .filter(|n| !n.trim().is_empty())
                .collect();
            let selection = ToolSelection::from_names(&names);
            let unknown: Vec<String> = match &selection {
                ToolSelection::Named(names) => {
                    names.iter().filter(|n| !tools.has(n)).cloned().collect()
                }
                _ => Vec::new(),
            };
            let mut message = format!("Enabled tools: {}", selection);
            if !unknown.is_empty() {
                message.push_str(&format!(" (not registered: {})", unknown.join(", ")));
            }
            state.enabled_tools = selection;
            return Ok(HookResult::ok(message));
        }

        let resolved = tools.resolve(&state.enabled_tools);
        if resolved.is_empty() {
            return Ok(HookResult::ok("No tools available."));
        }
        let mut lines = vec!["Available Tools:".to_string()];
        for tool in resolved {
            lines.push(format!("\n  • {}", tool.name()));
            lines.push(format!("    {}", tool.description()));
        }
        Ok(HookResult::ok(lines.join("\n")))
    }

    fn hook_skills(&self, state: &SessionState) -> HookResult {
        if self.skills.is_empty() {
            return HookResult::ok("No skills available.");
        }
        let mut lines = vec!["Available Skills:".to_string()];
        for skill in self.skills.iter() {
            let marker = if state.has_skill(&skill.name) {
                " [loaded]"
            } else {
                ""
            };
            lines.push(format!("\n  • {}{}", skill.name, marker));
            lines.push(format!("    {}", skill.description));
        }
        HookResult::ok(lines.join("\n"))
    }

    fn hook_load(&self, args: &[String], state: &mut SessionState) -> HookResult {
        let Some(name) = args.first() else {
            return HookResult::error("Usage: /load <skill_name>");
        };
        if !self.skills.has(name) {
            return HookResult::error(format!(
                "Skill '{}' not found. Use /skills to see available skills.",
                name
            ));
        }
        if !state.load_skill(name) {
            return HookResult::ok(format!("Skill '{}' is already loaded.", name));
        }
        self.agent.context_builder().refresh(state, &self.skills);
        HookResult::ok(format!("Loaded skill: {}", name))
    }

    fn hook_unload(&self, args: &[String], state: &mut SessionState) -> HookResult {
        let Some(name) = args.first() else {
            return HookResult::error("Usage: /unload <skill_name>");
        };
        if !state.unload_skill(name) {
            return HookResult::error(format!("Skill '{}' is not loaded.", name));
        }
        self.agent.context_builder().refresh(state, &self.skills);
        HookResult::ok(format!("Unloaded skill: {}", name))
    }

    async fn hook_help(&self) -> HookResult {
        let mut lines = vec!["Available hooks:".to_string()];
        for (name, usage, description) in self.hooks.describe().await {
            let synopsis = if usage.is_empty() {
                format!("/{}", name)
            } else {
                format!("/{} {}", name, usage)
            };
            lines.push(format!("  {} - {}", synopsis, description));
        }
        HookResult::ok(lines.join("\n"))
    }
}

/// `YYYYmmdd-HHMMSS-<8 hex>`; the random suffix keeps ids created in the
/// same second apart.
fn generate_session_id() -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("{}-{}", Local::now().format("%Y%m%d-%H%M%S"), suffix)
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn history_listing(state: &SessionState) -> HookResult {
    if state.messages.is_empty() {
        return HookResult::ok("No history in this session.");
    }
    let lines: Vec<String> = state
        .messages
        .iter()
        .map(|m| {
            format!(
                "{}: {}",
                m.role.to_string().to_uppercase(),
                preview(&single_line(&m.content), 50)
            )
        })
        .collect();
    HookResult::ok(format!("Recent History:\n{}", lines.join("\n")))
}

// ---------------------------------------------------------------------------
// Built-in hooks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    New,
    Switch,
    List,
    Delete,
    Rename,
    Clear,
    Compress,
    Save,
    History,
    Tools,
    Skills,
    Load,
    Unload,
    Help,
}

impl Builtin {
    const ALL: [Builtin; 14] = [
        Builtin::New,
        Builtin::Switch,
        Builtin::List,
        Builtin::Delete,
        Builtin::Rename,
        Builtin::Clear,
        Builtin::Compress,
        Builtin::Save,
        Builtin::History,
        Builtin::Tools,
        Builtin::Skills,
        Builtin::Load,
        Builtin::Unload,
        Builtin::Help,
    ];

    fn name(self) -> &'static str {
        match self {
            Builtin::New => "new",
            Builtin::Switch => "switch",
            Builtin::List => "list",
            Builtin::Delete => "delete",
            Builtin::Rename => "rename",
            Builtin::Clear => "clear",
            Builtin::Compress => "compress",
            Builtin::Save => "save",
            Builtin::History => "history",
            Builtin::Tools => "tools",
            Builtin::Skills => "skills",
            Builtin::Load => "load",
            Builtin::Unload => "unload",
            Builtin::Help => "help",
        }
    }

    fn usage(self) -> &'static str {
        match self {
            Builtin::New => "[name]",
            Builtin::Switch | Builtin::Delete => "<session_name_or_id>",
            Builtin::Rename => "<new_name> | <session> <new_name>",
            Builtin::Save => "[path]",
            Builtin::Tools => "[all|none|name,...]",
            Builtin::Load | Builtin::Unload => "<skill_name>",
            _ => "",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Builtin::New => "Create a session and switch to it",
            Builtin::Switch => "Switch to another session",
            Builtin::List => "List all sessions",
            Builtin::Delete => "Delete a session other than the current one",
            Builtin::Rename => "Rename the current or a named session",
            Builtin::Clear => "Clear this session's history",
            Builtin::Compress => "Summarize older history to free context",
            Builtin::Save => "Export this session's history as JSON",
            Builtin::History => "Show this session's history",
            Builtin::Tools => "Show or set the tools this session may use",
            Builtin::Skills => "List skills",
            Builtin::Load => "Load a skill into this session",
            Builtin::Unload => "Unload a skill from this session",
            Builtin::Help => "Show this help",
        }
    }
}

/// A built-in hook. Holds the registry weakly so the hook table does not
/// keep it alive.
struct BuiltinHook {
    kind: Builtin,
    shared: Weak<RegistryShared>,
}

#[async_trait]
impl HookHandler for BuiltinHook {
    fn description(&self) -> &str {
        self.kind.description()
    }

    fn usage(&self) -> &str {
        self.kind.usage()
    }

    async fn handle(&self, args: &[String], state: &mut SessionState) -> Result<HookResult> {
        let shared = self
            .shared
            .upgrade()
            .ok_or_else(|| ParlanceError::Session("session registry is closed".into()))?;

        match self.kind {
            Builtin::New => shared.hook_new(args, state).await,
            Builtin::Switch => shared.hook_switch(args, state).await,
            Builtin::List => shared.hook_list(state).await,
            Builtin::Delete => shared.hook_delete(args, state).await,
            Builtin::Rename => shared.hook_rename(args, state).await,
            Builtin::Clear => {
                state.clear_history();
                Ok(HookResult::ok("Session history cleared."))
            }
            Builtin::Compress => shared.hook_compress(state).await,
            Builtin::Save => shared.hook_save(args, state).await,
            Builtin::History => Ok(history_listing(state)),
            Builtin::Tools => shared.hook_tools(args, state).await,
            Builtin::Skills => Ok(shared.hook_skills(state)),
            Builtin::Load => Ok(shared.hook_load(args, state)),
            Builtin::Unload => Ok(shared.hook_unload(args, state)),
            Builtin::Help => Ok(shared.hook_help().await),
        }
    }
}
