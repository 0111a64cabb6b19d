//! Skills - named prompt blocks that can be loaded into a session
//!
//! Reading skill files from disk is left to the embedding application; it
//! hands the parsed skills to a [`SkillCatalog`]. Sessions only record the
//! names of loaded skills, and the system prompt is re-rendered from the
//! catalog whenever that set changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named block of prompt text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    /// One-line summary shown for available skills
    pub description: String,
    /// Prompt text injected while the skill is loaded
    pub content: String,
    /// Where the skill came from, if it has a file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Skill {
    pub fn new(name: &str, description: &str, content: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            content: content.to_string(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }
}

/// The set of skills a registry can offer, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct SkillCatalog {
    skills: BTreeMap<String, Skill>,
}

impl SkillCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_skills(skills: Vec<Skill>) -> Self {
        let mut catalog = Self::new();
        for skill in skills {
            catalog.insert(skill);
        }
        catalog
    }

    /// Add or replace a skill.
    pub fn insert(&mut self, skill: Skill) {
        self.skills.insert(skill.name.clone(), skill);
    }

    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.skills.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Skill> {
        self.skills.values()
    }

    /// Render the `<skills>` prompt block.
    ///
    /// Loaded skills come first, in load order, followed by every other
    /// catalog skill marked `available`. Loaded names missing from the
    /// catalog are still listed so the model knows they were requested.
    pub fn render(&self, loaded: &[String]) -> String {
        if self.skills.is_empty() && loaded.is_empty() {
            return String::new();
        }

        let mut lines = vec!["<skills>".to_string()];
        for name in loaded {
            lines.push("  <skill state=\"loaded\">".to_string());
            lines.push(format!("    <name>{}</name>", escape_xml(name)));
            if let Some(skill) = self.get(name) {
                push_details(&mut lines, skill);
            }
            lines.push("  </skill>".to_string());
        }
        for skill in self.skills.values().filter(|s| !loaded.contains(&s.name)) {
            lines.push("  <skill state=\"available\">".to_string());
            lines.push(format!("    <name>{}</name>", escape_xml(&skill.name)));
            push_details(&mut lines, skill);
            lines.push("  </skill>".to_string());
        }
        lines.push("</skills>".to_string());

        let bodies: Vec<String> = loaded
            .iter()
            .filter_map(|name| self.get(name))
            .filter(|s| !s.content.trim().is_empty())
            .map(|s| format!("### Skill: {}\n\n{}", s.name, s.content.trim()))
            .collect();
        if !bodies.is_empty() {
            lines.push(String::new());
            lines.push(bodies.join("\n\n---\n\n"));
        }
        lines.join("\n")
    }
}

fn push_details(lines: &mut Vec<String>, skill: &Skill) {
    lines.push(format!(
        "    <description>{}</description>",
        escape_xml(&skill.description)
    ));
    if let Some(path) = &skill.path {
        lines.push(format!("    <path>{}</path>", escape_xml(path)));
    }
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
