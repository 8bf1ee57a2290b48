// ABOUTME: Catalog data model for runnable agent example modules
// ABOUTME: CatalogEntry, ParamSpec and output schema types shared across packages

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Semantic type of a module parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
}

/// Input widget the dashboard should render for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiHint {
    Text,
    Textarea,
    Checkbox,
    Number,
    Email,
    Url,
    FilePdf,
    FileCsv,
    FileAny,
    Select,
}

/// Declared shape of one configurable input to a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    pub is_positional: bool,
    /// Empty string means no default.
    pub default: String,
    pub description: String,
    pub ui_hint: UiHint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub description: String,
}

/// Structured-output descriptor a module declares for its responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    pub docstring: String,
    pub fields: Vec<SchemaField>,
}

/// Structured description of one runnable example module.
///
/// Entries are created at scan time and never mutated; a rescan produces an
/// entirely new set. `id` is derived from `path_parts` so repeated scans of
/// the same tree are idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub description: String,
    /// Directory segments from the catalog root to the module directory.
    pub path_parts: Vec<String>,
    pub params: Vec<ParamSpec>,
    /// Normalized capability tags (web, rag, memory, ...), sorted and deduped.
    pub tools: Vec<String>,
    pub patterns: Vec<String>,
    pub output_schemas: Vec<OutputSchema>,
    /// System-prompt lines used when the module is executed.
    pub instructions: Vec<String>,
    /// Absolute path of the manifest this entry was built from.
    pub source_path: PathBuf,
}
