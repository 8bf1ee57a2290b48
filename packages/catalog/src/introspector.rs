// ABOUTME: Filesystem scanner that turns agent module manifests into catalog entries
// ABOUTME: Walks a module tree for agent.toml files and extracts parameter specs and capability tags

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::types::{CatalogEntry, OutputSchema, ParamSpec, ParamType, SchemaField, UiHint};

/// A directory is a runnable module iff it contains this file.
pub const ENTRY_FILE: &str = "agent.toml";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog root not found: {0}")]
    RootNotFound(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),
}

/// On-disk declaration of one agent module.
///
/// `input` blocks are the module's formal parameters; the `defaults` table is
/// its configuration block. An input with no entry in `defaults` is required.
#[derive(Debug, Deserialize)]
struct Manifest {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    subcategory: Option<String>,
    #[serde(default)]
    instructions: Vec<String>,
    #[serde(default)]
    tools: Vec<String>,
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default, rename = "input")]
    inputs: Vec<ManifestInput>,
    #[serde(default)]
    defaults: BTreeMap<String, toml::Value>,
    #[serde(default, rename = "output_schema")]
    output_schemas: Vec<ManifestSchema>,
}

#[derive(Debug, Deserialize)]
struct ManifestInput {
    name: String,
    #[serde(default, rename = "type")]
    param_type: Option<String>,
    #[serde(default)]
    positional: bool,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ManifestSchema {
    name: String,
    #[serde(default)]
    docstring: String,
    #[serde(default, rename = "field")]
    fields: Vec<ManifestField>,
}

#[derive(Debug, Deserialize)]
struct ManifestField {
    name: String,
    #[serde(default = "default_field_type", rename = "type")]
    field_type: String,
    #[serde(default)]
    description: String,
}

fn default_field_type() -> String {
    "string".to_string()
}

/// Maps concrete tool integration names to capability categories.
/// Matched by substring against the lowercased declared tool name; earlier
/// rows win, so the more specific names come first.
const TOOL_CATEGORIES: &[(&str, &str)] = &[
    ("duckduckgo", "web"),
    ("tavily", "web"),
    ("serpapi", "web"),
    ("exa", "web"),
    ("lancedb", "rag"),
    ("pinecone", "rag"),
    ("qdrant", "rag"),
    ("knowledge", "rag"),
    ("sqlite", "memory"),
    ("postgres", "memory"),
    ("memory", "memory"),
    ("team", "team"),
    ("reasoning", "reasoning"),
    ("pdf", "files"),
    ("csv", "files"),
    ("file", "files"),
    ("python", "code"),
    ("shell", "code"),
    ("http", "api"),
    ("api", "api"),
];

/// Pattern names declared in manifests that imply a capability tag.
const PATTERN_CATEGORIES: &[(&str, &str)] = &[
    ("web", "web"),
    ("search", "web"),
    ("knowledge", "rag"),
    ("rag", "rag"),
    ("memory", "memory"),
    ("structured", "structured"),
    ("team", "team"),
    ("reasoning", "reasoning"),
];

/// Scans `root` for agent modules and produces one catalog entry per module.
///
/// Traversal is lexicographically sorted, so the same tree always yields the
/// same ordered output. A malformed manifest skips that module with a warning;
/// only a missing root is fatal. Directories whose name starts with `_` are
/// treated as templates and pruned.
pub fn scan(root: &Path) -> Result<Vec<CatalogEntry>, CatalogError> {
    if !root.is_dir() {
        return Err(CatalogError::RootNotFound(root.to_path_buf()));
    }

    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('_'));

    for dirent in walker {
        let dirent = match dirent {
            Ok(d) => d,
            Err(err) => {
                warn!(error = %err, "skipping unreadable path during catalog scan");
                continue;
            }
        };
        if !dirent.file_type().is_dir() {
            continue;
        }
        let manifest_path = dirent.path().join(ENTRY_FILE);
        if !manifest_path.is_file() {
            continue;
        }
        match load_entry(root, dirent.path(), &manifest_path) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                warn!(
                    path = %manifest_path.display(),
                    error = %err,
                    "skipping malformed agent module"
                );
            }
        }
    }

    info!(count = entries.len(), root = %root.display(), "catalog scan complete");
    Ok(entries)
}

fn load_entry(root: &Path, dir: &Path, manifest_path: &Path) -> Result<CatalogEntry, ManifestError> {
    let raw = std::fs::read_to_string(manifest_path)?;
    let manifest: Manifest = toml::from_str(&raw)?;

    let rel = dir.strip_prefix(root).unwrap_or(dir);
    let mut path_parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if path_parts.is_empty() {
        if let Some(name) = dir.file_name() {
            path_parts.push(name.to_string_lossy().into_owned());
        }
    }
    let id = path_parts.join("__");

    let category = manifest
        .category
        .clone()
        .filter(|c| !c.is_empty())
        .or_else(|| (path_parts.len() >= 2).then(|| title_case(&path_parts[0])))
        .unwrap_or_else(|| "General".to_string());
    let subcategory = manifest
        .subcategory
        .clone()
        .filter(|c| !c.is_empty())
        .or_else(|| (path_parts.len() >= 3).then(|| title_case(&path_parts[1])));

    let params = build_params(&manifest);
    let tools = collect_tools(&manifest);
    let output_schemas = manifest
        .output_schemas
        .into_iter()
        .map(|schema| OutputSchema {
            name: schema.name,
            docstring: schema.docstring,
            fields: schema
                .fields
                .into_iter()
                .map(|f| SchemaField {
                    name: f.name,
                    field_type: f.field_type,
                    description: f.description,
                })
                .collect(),
        })
        .collect();

    Ok(CatalogEntry {
        id,
        name: manifest.name,
        category,
        subcategory,
        description: manifest.description,
        path_parts,
        params,
        tools,
        patterns: manifest.patterns,
        output_schemas,
        instructions: manifest.instructions,
        source_path: manifest_path.to_path_buf(),
    })
}

fn build_params(manifest: &Manifest) -> Vec<ParamSpec> {
    let mut params = Vec::new();
    let mut seen = BTreeSet::new();

    for input in &manifest.inputs {
        let default_value = manifest.defaults.get(&input.name);
        let param_type = input
            .param_type
            .as_deref()
            .map(parse_param_type)
            .or_else(|| default_value.map(infer_type_from_value))
            .unwrap_or(ParamType::String);
        let default = default_value.map(value_to_string).unwrap_or_default();
        let required = default.is_empty();
        let ui_hint = infer_ui_hint(&input.name, &input.description, param_type);
        params.push(ParamSpec {
            name: input.name.clone(),
            param_type,
            required,
            is_positional: input.positional,
            default,
            description: input.description.clone(),
            ui_hint,
        });
        seen.insert(input.name.clone());
    }

    // Defaults not covered by a declared input still become optional params.
    for (name, value) in &manifest.defaults {
        if seen.contains(name) {
            continue;
        }
        let param_type = infer_type_from_value(value);
        params.push(ParamSpec {
            name: name.clone(),
            param_type,
            required: false,
            is_positional: false,
            default: value_to_string(value),
            description: String::new(),
            ui_hint: infer_ui_hint(name, "", param_type),
        });
    }

    params
}

fn collect_tools(manifest: &Manifest) -> Vec<String> {
    let mut tags = BTreeSet::new();
    for raw in &manifest.tools {
        let lower = raw.to_lowercase();
        if let Some((_, category)) = TOOL_CATEGORIES.iter().find(|(frag, _)| lower.contains(frag)) {
            tags.insert((*category).to_string());
        }
    }
    for pattern in &manifest.patterns {
        let lower = pattern.to_lowercase();
        for (frag, category) in PATTERN_CATEGORIES {
            if lower.contains(frag) {
                tags.insert((*category).to_string());
            }
        }
    }
    if !manifest.output_schemas.is_empty() {
        tags.insert("structured".to_string());
    }
    tags.into_iter().collect()
}

fn parse_param_type(raw: &str) -> ParamType {
    match raw.to_lowercase().as_str() {
        "int" | "integer" => ParamType::Integer,
        "float" | "number" => ParamType::Float,
        "bool" | "boolean" => ParamType::Boolean,
        _ => ParamType::String,
    }
}

fn infer_type_from_value(value: &toml::Value) -> ParamType {
    match value {
        toml::Value::Integer(_) => ParamType::Integer,
        toml::Value::Float(_) => ParamType::Float,
        toml::Value::Boolean(_) => ParamType::Boolean,
        _ => ParamType::String,
    }
}

fn value_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Picks a dashboard widget from parameter name and type conventions.
/// Name-substring matching is a heuristic carried over from the original
/// discovery tooling; precedence is file kinds, then url/email, then long-text.
fn infer_ui_hint(name: &str, description: &str, param_type: ParamType) -> UiHint {
    if param_type == ParamType::Boolean {
        return UiHint::Checkbox;
    }
    if matches!(param_type, ParamType::Integer | ParamType::Float) {
        return UiHint::Number;
    }

    let name = name.to_lowercase();
    let desc = description.to_lowercase();

    if name.contains("pdf") || desc.contains("pdf") {
        return UiHint::FilePdf;
    }
    if name.contains("csv") || desc.contains("csv") {
        return UiHint::FileCsv;
    }
    if name.contains("file") || name.contains("path") {
        return UiHint::FileAny;
    }
    if name.contains("url") || name.contains("link") {
        return UiHint::Url;
    }
    if name.contains("email") {
        return UiHint::Email;
    }

    const LONG_TEXT_FRAGMENTS: &[&str] = &[
        "query",
        "topic",
        "content",
        "message",
        "description",
        "text",
        "prompt",
    ];
    if LONG_TEXT_FRAGMENTS.iter().any(|frag| name.contains(frag)) {
        return UiHint::Textarea;
    }

    // Descriptions like "Tone: formal/casual/playful" enumerate options.
    if desc.contains(':') && desc.contains('/') {
        return UiHint::Select;
    }

    UiHint::Text
}

fn title_case(segment: &str) -> String {
    segment
        .replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
