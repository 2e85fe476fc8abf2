//! Descriptor loading
//!
//! Parses markdown files with YAML frontmatter into [`AgentDescriptor`]s.
//!
//! # Format
//!
//! ```markdown
//! ---
//! name: Security Sentinel
//! description: Finds vulnerabilities before they ship
//! tools: [search, githubRepo]
//! handoffs:
//!   - agent: performance-oracle
//!     label: Check performance
//!     send: false
//! ---
//!
//! # Instructions
//! ...
//! ```
//!
//! Every file is parsed on its own. A broken file is logged and skipped; it
//! never prevents its siblings from loading.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use yaml_rust2::parser::{Event, EventReceiver, Parser};
use tracing::{debug, info, warn};

use crate::agent::{AgentDescriptor, Handoff};
use crate::config::EngineConfig;
use crate::error::LoadError;

/// Parses descriptor resources and whole descriptor directories
#[derive(Debug, Clone)]
pub struct DescriptorLoader {
    default_model: String,
    max_aliases: usize,
}

impl DescriptorLoader {
    pub fn new(default_model: impl Into<String>, max_aliases: usize) -> Self {
        Self {
            default_model: default_model.into(),
            max_aliases,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.default_model.clone(), config.max_aliases)
    }

    /// Parse one resource. `path` is only recorded and used in messages.
    pub fn parse(&self, id: &str, source: &str, path: &Path) -> Result<AgentDescriptor, LoadError> {
        let parse_error = |reason: String| LoadError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        let (meta, body) = split_frontmatter(source)
            .ok_or_else(|| parse_error("no frontmatter found".into()))?;

        let aliases = count_aliases(meta);
        if aliases > self.max_aliases {
            return Err(parse_error(format!(
                "{} aliases exceeds the limit of {}",
                aliases, self.max_aliases
            )));
        }

        let value: Value = serde_yaml::from_str(meta).map_err(|e| parse_error(e.to_string()))?;
        let metadata = match value {
            Value::Mapping(mapping) => mapping,
            _ => return Err(parse_error("expected a mapping".into())),
        };

        let name = required_string(&metadata, "name", path)?;
        let description = required_string(&metadata, "description", path)?;

        let tools: BTreeSet<String> = match metadata.get("tools") {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect(),
            _ => BTreeSet::new(),
        };

        let handoffs = match metadata.get("handoffs") {
            Some(Value::Sequence(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| match parse_handoff(item) {
                    Ok(handoff) => Some(handoff),
                    Err(reason) => {
                        warn!(path = %path.display(), index, "Dropping invalid handoff: {}", reason);
                        None
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        let model_hint = metadata
            .get("model")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.default_model.clone());

        Ok(AgentDescriptor {
            id: id.to_string(),
            name,
            description,
            tools,
            model_hint,
            handoffs,
            instructions: body.trim().to_string(),
            source_path: path.to_path_buf(),
        })
    }

    /// Read and parse a file, deriving the id by stripping `suffix` from its name
    pub fn parse_file(&self, path: &Path, suffix: &str) -> Result<AgentDescriptor, LoadError> {
        let source = fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let id = file_name.strip_suffix(suffix).unwrap_or(file_name);
        self.parse(id, &source, path)
    }

    /// Load every `*<suffix>` file directly under `dir`.
    ///
    /// A missing or unreadable directory yields an empty mapping.
    pub fn load_all(&self, dir: &Path, suffix: &str) -> BTreeMap<String, AgentDescriptor> {
        let mut loaded = BTreeMap::new();

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Descriptor directory not readable");
                return loaded;
            }
        };

        let mut paths: Vec<_> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_suffix(suffix))
                    .map(|id| !id.is_empty())
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        for path in paths {
            match self.parse_file(&path, suffix) {
                Ok(descriptor) => {
                    debug!(id = %descriptor.id, path = %path.display(), "Loaded descriptor");
                    loaded.insert(descriptor.id.clone(), descriptor);
                }
                Err(e) => {
                    warn!(path = %path.display(), "Skipping descriptor: {}", e);
                }
            }
        }

        info!(dir = %dir.display(), count = loaded.len(), "Loaded descriptors");
        loaded
    }
}

impl Default for DescriptorLoader {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Split `---\n<meta>\n---\n<body>` into its two halves
fn split_frontmatter(source: &str) -> Option<(&str, &str)> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    let mut lines = source.split_inclusive('\n');

    let opening = lines.next()?;
    if opening.trim_end() != "---" || !opening.ends_with('\n') {
        return None;
    }

    let meta_start = opening.len();
    let mut offset = meta_start;
    for line in lines {
        if line.trim_end() == "---" {
            return Some((&source[meta_start..offset], &source[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

#[derive(Default)]
struct AliasCounter {
    aliases: usize,
}

impl EventReceiver for AliasCounter {
    fn on_event(&mut self, event: Event) {
        if let Event::Alias(_) = event {
            self.aliases += 1;
        }
    }
}

/// Count alias nodes in a YAML document.
///
/// Stops at the first syntax error; `serde_yaml` reports that error afterwards.
fn count_aliases(yaml: &str) -> usize {
    let mut counter = AliasCounter::default();
    let mut parser = Parser::new_from_str(yaml);
    if let Err(e) = parser.load(&mut counter, true) {
        debug!(error = %e, "Alias scan stopped early");
    }
    counter.aliases
}

fn required_string(metadata: &Mapping, field: &'static str, path: &Path) -> Result<String, LoadError> {
    match metadata.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(LoadError::Validation {
            path: path.to_path_buf(),
            field,
            reason: "must not be empty".into(),
        }),
        Some(_) => Err(LoadError::Validation {
            path: path.to_path_buf(),
            field,
            reason: "must be a string".into(),
        }),
        None => Err(LoadError::Validation {
            path: path.to_path_buf(),
            field,
            reason: "is required".into(),
        }),
    }
}

fn parse_handoff(item: &Value) -> Result<Handoff, &'static str> {
    let entry = item.as_mapping().ok_or("not a mapping")?;
    let target = entry
        .get("agent")
        .and_then(Value::as_str)
        .filter(|a| !a.is_empty())
        .ok_or("missing or invalid 'agent' field")?;

    Ok(Handoff {
        target: target.to_string(),
        label: entry.get("label").and_then(Value::as_str).map(str::to_string),
        prompt: entry.get("prompt").and_then(Value::as_str).map(str::to_string),
        auto_send: !matches!(entry.get("send"), Some(Value::Bool(false))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;

    const SAMPLE_AGENT: &str = r#"---
name: Test Agent
description: A test agent for unit testing
tools:
  - search
  - githubRepo
  - 42
handoffs:
  - label: Consult Security
    agent: security-sentinel
    prompt: Review the security implications
    send: false
---

# Test Agent Instructions

This agent exists for unit testing the agent parser.
"#;

    fn loader() -> DescriptorLoader {
        DescriptorLoader::default()
    }

    fn parse(source: &str) -> Result<AgentDescriptor, LoadError> {
        loader().parse("test", source, &PathBuf::from("test.agent.md"))
    }

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn valid(name: &str) -> String {
        format!("---\nname: {}\ndescription: Does {}\n---\nBody\n", name, name)
    }

    // === parse ===

    #[test]
    fn test_parse_valid_agent() {
        let descriptor = parse(SAMPLE_AGENT).unwrap();
        assert_eq!(descriptor.id, "test");
        assert_eq!(descriptor.name, "Test Agent");
        assert_eq!(descriptor.description, "A test agent for unit testing");
        assert_eq!(descriptor.model_hint, "Claude Sonnet 4");
        assert_eq!(descriptor.tools.len(), 2);
        assert!(descriptor.tools.contains("search"));
        assert!(descriptor.tools.contains("githubRepo"));
    }

    #[test]
    fn test_parse_handoffs() {
        let descriptor = parse(SAMPLE_AGENT).unwrap();
        assert_eq!(descriptor.handoffs.len(), 1);
        let handoff = &descriptor.handoffs[0];
        assert_eq!(handoff.target, "security-sentinel");
        assert_eq!(handoff.label.as_deref(), Some("Consult Security"));
        assert_eq!(handoff.prompt.as_deref(), Some("Review the security implications"));
        assert!(!handoff.auto_send);
    }

    #[test]
    fn test_parse_trims_instructions() {
        let descriptor = parse(SAMPLE_AGENT).unwrap();
        assert!(descriptor.instructions.starts_with("# Test Agent Instructions"));
        assert!(descriptor.instructions.ends_with("agent parser."));
    }

    #[test]
    fn test_invalid_handoffs_dropped_individually() {
        let source = r#"---
name: Router
description: Routes work
handoffs:
  - agent: first
  - "just a string"
  - label: no agent
  - agent: ""
  - agent: 7
  - agent: second
    send: "no"
---
"#;
        let descriptor = parse(source).unwrap();
        let targets: Vec<_> = descriptor.handoffs.iter().map(|h| h.target.as_str()).collect();
        assert_eq!(targets, vec!["first", "second"]);
        assert!(descriptor.handoffs.iter().all(|h| h.auto_send));
    }

    #[test]
    fn test_model_default_and_override() {
        let descriptor = parse("---\nname: A\ndescription: B\nmodel: GPT-5\n---\n").unwrap();
        assert_eq!(descriptor.model_hint, "GPT-5");

        let descriptor = parse("---\nname: A\ndescription: B\nmodel: [1, 2]\n---\n").unwrap();
        assert_eq!(descriptor.model_hint, "Claude Sonnet 4");
    }

    #[test]
    fn test_missing_description_is_validation_error() {
        let result = parse("---\nname: Lonely\n---\nBody\n");
        assert!(matches!(
            result,
            Err(LoadError::Validation { field: "description", .. })
        ));
    }

    #[test]
    fn test_non_string_name_is_validation_error() {
        let result = parse("---\nname: [a, b]\ndescription: fine\n---\n");
        assert!(matches!(result, Err(LoadError::Validation { field: "name", .. })));
    }

    #[test]
    fn test_no_frontmatter_is_parse_error() {
        assert!(matches!(parse("# Just markdown\n"), Err(LoadError::Parse { .. })));
        assert!(matches!(
            parse("---\nname: broken\n# never closed\n"),
            Err(LoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_non_mapping_metadata_is_parse_error() {
        assert!(matches!(parse("---\n- a\n- b\n---\n"), Err(LoadError::Parse { .. })));
        assert!(matches!(parse("---\n---\nbody\n"), Err(LoadError::Parse { .. })));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let result = parse("---\nname: A\nname: B\ndescription: C\n---\n");
        assert!(matches!(result, Err(LoadError::Parse { .. })));
    }

    #[test]
    fn test_alias_limit() {
        let mut source = String::from("---\nname: A\ndescription: B\nbase: &b x\nrefs:\n");
        for _ in 0..11 {
            source.push_str("  - *b\n");
        }
        source.push_str("---\n");
        assert!(matches!(parse(&source), Err(LoadError::Parse { .. })));

        let ok = "---\nname: &n A\ndescription: *n\n---\n";
        assert_eq!(parse(ok).unwrap().description, "A");
    }

    #[test]
    fn test_count_aliases_counts_alias_nodes_only() {
        assert_eq!(count_aliases("a: &x 1\nb: *x\nc: [*x, *x]"), 3);
        assert_eq!(count_aliases("a: \"*x\"\nb: '*y' # *z"), 0);
        assert_eq!(count_aliases("a: 2 * 3"), 0);
    }

    #[test]
    fn test_emphasis_in_plain_scalars_is_not_an_alias() {
        let words: Vec<String> = (0..11).map(|i| format!("*risk{}*", i)).collect();
        let description = format!("Flags {}", words.join(" "));
        let source = format!("---\nname: A\ndescription: {}\n---\nBody\n", description);

        assert_eq!(count_aliases(&format!("description: {}", description)), 0);
        let descriptor = parse(&source).unwrap();
        assert_eq!(descriptor.description, description);
    }

    #[test]
    fn test_empty_model_is_kept() {
        let descriptor = parse("---\nname: A\ndescription: B\nmodel: \"\"\n---\n").unwrap();
        assert_eq!(descriptor.model_hint, "");
    }

    #[test]
    fn test_closing_delimiter_at_eof() {
        let descriptor = parse("---\nname: A\ndescription: B\n---").unwrap();
        assert!(descriptor.instructions.is_empty());
    }

    proptest! {
        #[test]
        fn prop_parse_is_idempotent(
            name in "[A-Za-z][A-Za-z0-9 ]{0,20}",
            description in "[A-Za-z][A-Za-z0-9 .]{0,40}",
            tools in proptest::collection::vec("[a-z]{1,8}", 0..4),
            body in "[A-Za-z0-9 #\n]{0,80}",
        ) {
            let mut source = format!("---\nname: \"{}\"\ndescription: \"{}\"\ntools:\n", name, description);
            for tool in &tools {
                source.push_str(&format!("  - {}\n", tool));
            }
            source.push_str("---\n");
            source.push_str(&body);

            let first = parse(&source).unwrap();
            let second = parse(&source).unwrap();
            prop_assert_eq!(first, second);
        }
    }

    // === load_all ===

    #[test]
    fn test_load_all_skips_invalid_sibling() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "alpha.agent.md", &valid("Alpha"));
        write(dir.path(), "beta.agent.md", &valid("Beta"));
        write(dir.path(), "gamma.agent.md", &valid("Gamma"));
        write(dir.path(), "broken.agent.md", "---\nname: Broken\n---\nNo description\n");

        let loaded = loader().load_all(dir.path(), ".agent.md");
        assert_eq!(loaded.len(), 3);
        assert!(!loaded.contains_key("broken"));
        assert_eq!(loaded["beta"].name, "Beta");
    }

    #[test]
    fn test_load_all_filters_by_suffix() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "alpha.agent.md", &valid("Alpha"));
        write(dir.path(), "review.prompt.md", &valid("Review"));
        write(dir.path(), "README.md", "# readme");
        write(dir.path(), ".agent.md", &valid("Nameless"));
        fs::create_dir(dir.path().join("nested.agent.md")).unwrap();

        let agents = loader().load_all(dir.path(), ".agent.md");
        assert_eq!(agents.keys().collect::<Vec<_>>(), vec!["alpha"]);

        let prompts = loader().load_all(dir.path(), ".prompt.md");
        assert_eq!(prompts.keys().collect::<Vec<_>>(), vec!["review"]);
        assert_eq!(
            prompts["review"].source_path,
            dir.path().join("review.prompt.md")
        );
    }

    #[test]
    fn test_load_all_missing_directory() {
        let loaded = loader().load_all(Path::new("/non/existent/directory"), ".agent.md");
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_parse_file_missing() {
        let result = loader().parse_file(Path::new("/non/existent/file.agent.md"), ".agent.md");
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }
}
