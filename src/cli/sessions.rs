//! Session and hook command handlers.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use tokio::sync::RwLock;

use parlance::agent::AgentLoop;
use parlance::config::Config;
use parlance::interaction::{SessionDefaults, SessionRegistry};
use parlance::session::{SessionState, SessionStore};
use parlance::skills::SkillCatalog;
use parlance::tools::{EchoTool, ToolRegistry};
use parlance::utils::string::{preview, single_line};

use super::SessionsAction;

pub(crate) async fn cmd_sessions(action: SessionsAction) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let store = SessionStore::with_path(config.sessions_dir())
        .with_context(|| format!("Failed to open {}", config.sessions_dir().display()))?;

    match action {
        SessionsAction::List => {
            let mut sessions = store.list().await.context("Failed to list sessions")?;
            if sessions.is_empty() {
                println!("No sessions stored in {}", config.sessions_dir().display());
                return Ok(());
            }
            sessions.sort_by(|a, b| b.last_active.cmp(&a.last_active));
            println!("{:<28} {:<24} {:>8}  LAST ACTIVE", "ID", "NAME", "MESSAGES");
            for s in &sessions {
                println!(
                    "{:<28} {:<24} {:>8}  {}",
                    s.session_id,
                    preview(&s.name, 24),
                    s.message_count(),
                    s.last_active.with_timezone(&Local).format("%Y-%m-%d %H:%M")
                );
            }
        }
        SessionsAction::Show { session, last } => {
            let state = find(&store, &session).await?;
            println!("Session: {} ({})", state.name, state.session_id);
            println!(
                "Budget: {} tokens, compress at {:.0}%, keep last {}",
                state.budget.max_tokens,
                state.budget.compress_ratio * 100.0,
                state.budget.keep_last_n
            );
            println!("Tools: {}", state.enabled_tools);
            if !state.loaded_skills.is_empty() {
                println!("Skills: {}", state.loaded_skills.join(", "));
            }
            println!();

            let skip = last
                .map(|n| state.messages.len().saturating_sub(n))
                .unwrap_or(0);
            for message in state.messages.iter().skip(skip) {
                let mut line = format!(
                    "{}: {}",
                    message.role.to_string().to_uppercase(),
                    preview(&single_line(&message.content), 120)
                );
                if let Some(calls) = &message.tool_calls {
                    let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                    line.push_str(&format!(" [calls: {}]", names.join(", ")));
                }
                println!("{}", line);
            }
        }
        SessionsAction::Delete { session } => {
            let state = find(&store, &session).await?;
            store
                .delete(&state.session_id)
                .await
                .context("Failed to delete session")?;
            println!("Deleted session: {}", state.name);
        }
        SessionsAction::Export { session, output } => {
            let state = find(&store, &session).await?;
            store
                .export(&state, &output)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Exported {} messages from {} to {}",
                state.message_count(),
                state.name,
                output.display()
            );
        }
    }
    Ok(())
}

/// Load a session by id, falling back to an exact name match.
async fn find(store: &SessionStore, target: &str) -> Result<SessionState> {
    if let Some(state) = store
        .load(target)
        .await
        .with_context(|| format!("Session record '{}' is unreadable", target))?
    {
        return Ok(state);
    }
    let sessions = store.list().await.context("Failed to list sessions")?;
    match sessions.into_iter().find(|s| s.name == target) {
        Some(state) => Ok(state),
        None => bail!("Session '{}' not found", target),
    }
}

/// Print the built-in slash commands.
pub(crate) async fn cmd_hooks() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let tools = Arc::new(RwLock::new(ToolRegistry::from_tools(vec![Box::new(EchoTool)])));
    let agent = AgentLoop::from_config(&config, tools);
    let registry = SessionRegistry::open(
        Arc::new(agent),
        SessionStore::new_memory(),
        SessionDefaults::from_config(&config),
        SkillCatalog::new(),
    )
    .await
    .context("Failed to open session registry")?;

    for (name, usage, description) in registry.hooks().describe().await {
        let synopsis = if usage.is_empty() {
            format!("/{}", name)
        } else {
            format!("/{} {}", name, usage)
        };
        println!("{:<48} {}", synopsis, description);
    }
    Ok(())
}
