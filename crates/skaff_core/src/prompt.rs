//! Prompt specs and the prompt resolver.
//!
//! Prompts are resolved serially, in declared order, because later prompts
//! may depend on earlier answers. A prompt whose name already holds a
//! non-empty value in the store is never re-asked, which is what makes
//! non-interactive re-runs via supplied defaults work.
//!
//! The resolver also implements recursive, tag-driven prompting over a
//! template tree: scanned placeholder tags become prompts on the fly, with
//! block tags recursing into nested value objects.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use skaff_templates::{is_text_file, scan, Renderer, Tag, TagKind};

use crate::error::{EngineError, EngineResult};
use crate::session::{PromptAnswer, PromptRequest, PromptSession};
use crate::values::ValueStore;

/// Validation callback: `Ok(())` accepts, `Err(message)` re-asks (or
/// surfaces the message, for values seeded from defaults).
pub type Validator = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// Prompt kinds the resolver can drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PromptKind {
    Input,
    Password,
    Confirm,
    Choose,
    List,
    /// Parsed but not resolvable; fails fast at resolution.
    Custom(String),
}

impl Default for PromptKind {
    fn default() -> Self {
        Self::Input
    }
}

impl From<String> for PromptKind {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "input" => Self::Input,
            "password" => Self::Password,
            "confirm" => Self::Confirm,
            "choose" | "select" => Self::Choose,
            "list" | "rawlist" => Self::List,
            _ => Self::Custom(s),
        }
    }
}

impl From<PromptKind> for String {
    fn from(kind: PromptKind) -> Self {
        match kind {
            PromptKind::Input => "input".to_string(),
            PromptKind::Password => "password".to_string(),
            PromptKind::Confirm => "confirm".to_string(),
            PromptKind::Choose => "choose".to_string(),
            PromptKind::List => "list".to_string(),
            PromptKind::Custom(s) => s,
        }
    }
}

/// One option of a selection prompt.
///
/// A choice may declare a backing value distinct from its label; resolution
/// substitutes the backing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ChoiceDef")]
pub struct Choice {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Choice {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChoiceDef {
    Label(String),
    Full {
        label: String,
        #[serde(default)]
        value: Option<Value>,
    },
}

impl From<ChoiceDef> for Choice {
    fn from(def: ChoiceDef) -> Self {
        match def {
            ChoiceDef::Label(label) => Choice::new(label),
            ChoiceDef::Full { label, value } => Choice { label, value },
        }
    }
}

/// Declarative prompt specification.
#[derive(Clone, Serialize, Deserialize)]
pub struct PromptSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: PromptKind,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(skip)]
    pub validate: Option<Validator>,
}

impl PromptSpec {
    pub fn input(name: impl Into<String>) -> Self {
        Self::with_kind(name, PromptKind::Input)
    }

    pub fn confirm(name: impl Into<String>) -> Self {
        Self::with_kind(name, PromptKind::Confirm)
    }

    pub fn choose(name: impl Into<String>, choices: Vec<Choice>) -> Self {
        let mut spec = Self::with_kind(name, PromptKind::Choose);
        spec.choices = choices;
        spec
    }

    fn with_kind(name: impl Into<String>, kind: PromptKind) -> Self {
        Self {
            name: name.into(),
            kind,
            message: None,
            default: None,
            choices: Vec::new(),
            validate: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(f));
        self
    }

    fn message_or_name(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("{}:", self.name))
    }
}

impl std::fmt::Debug for PromptSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptSpec")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("default", &self.default)
            .field("choices", &self.choices)
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

/// Resolve an ordered prompt list into the value store.
pub fn resolve_prompts(
    specs: &[PromptSpec],
    task_validators: &HashMap<String, Validator>,
    values: &mut ValueStore,
    session: &mut dyn PromptSession,
) -> EngineResult<()> {
    for spec in specs {
        resolve_prompt(spec, task_validators, values, session)?;
    }
    Ok(())
}

fn resolve_prompt(
    spec: &PromptSpec,
    task_validators: &HashMap<String, Validator>,
    values: &mut ValueStore,
    session: &mut dyn PromptSession,
) -> EngineResult<()> {
    if spec.name.is_empty() {
        return Err(EngineError::Validation(
            "prompt is missing a name".to_string(),
        ));
    }
    if values.has_non_empty(&spec.name) {
        debug!("Prompt '{}' already answered, skipping", spec.name);
        return Ok(());
    }

    let validator = spec
        .validate
        .clone()
        .or_else(|| task_validators.get(&spec.name).cloned());

    match &spec.kind {
        PromptKind::Custom(kind) => Err(EngineError::UnsupportedPrompt(kind.clone())),
        PromptKind::Confirm => {
            let default = matches!(spec.default, Some(Value::Bool(true)));
            let answer = session.ask(&PromptRequest::Confirm {
                name: spec.name.clone(),
                message: spec.message_or_name(),
                default,
            })?;
            values.set(&spec.name, as_flag(&answer));
            Ok(())
        }
        PromptKind::Choose | PromptKind::List => {
            if spec.choices.is_empty() {
                return Err(EngineError::Validation(format!(
                    "prompt '{}' has no choices",
                    spec.name
                )));
            }
            let options: Vec<String> = spec.choices.iter().map(|c| c.label.clone()).collect();
            let answer = session.ask(&PromptRequest::Select {
                name: spec.name.clone(),
                message: spec.message_or_name(),
                options,
            })?;
            let index = match answer {
                PromptAnswer::Index(i) if i < spec.choices.len() => i,
                other => {
                    return Err(EngineError::Session(format!(
                        "invalid selection {other:?} for prompt '{}'",
                        spec.name
                    )))
                }
            };
            let choice = &spec.choices[index];
            let value = choice
                .value
                .clone()
                .unwrap_or_else(|| Value::String(choice.label.clone()));
            if let Some(validator) = &validator {
                validator(&value_as_string(&value)).map_err(EngineError::Validation)?;
            }
            values.set(&spec.name, value);
            Ok(())
        }
        PromptKind::Input | PromptKind::Password => {
            let default = spec.default.as_ref().map(value_as_string);
            let mut message = spec.message_or_name();
            loop {
                let answer = session.ask(&PromptRequest::Input {
                    name: spec.name.clone(),
                    message: message.clone(),
                    default: default.clone(),
                    secret: spec.kind == PromptKind::Password,
                })?;
                let text = match answer {
                    PromptAnswer::Text(s) => s,
                    PromptAnswer::Flag(b) => b.to_string(),
                    PromptAnswer::Index(i) => i.to_string(),
                };
                match &validator {
                    Some(validator) => match validator(&text) {
                        Ok(()) => {
                            values.set(&spec.name, text);
                            return Ok(());
                        }
                        Err(reason) => {
                            // re-ask, carrying the rejection reason
                            message = format!("{} ({reason})", spec.message_or_name());
                        }
                    },
                    None => {
                        values.set(&spec.name, text);
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn as_flag(answer: &PromptAnswer) -> bool {
    match answer {
        PromptAnswer::Flag(b) => *b,
        PromptAnswer::Text(s) => matches!(s.trim(), "y" | "Y" | "yes" | "true"),
        PromptAnswer::Index(_) => false,
    }
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Scan a rendered-to-be template tree for the tags it requires.
///
/// Files are visited in sorted order and each file's tags in document
/// order, so the derived prompt sequence is deterministic. Unreadable
/// files are skipped with a warning.
pub fn scan_tree(root: &Path, renderer: &Renderer) -> EngineResult<Vec<Tag>> {
    let mut tags: Vec<Tag> = Vec::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_text_file(path) {
            continue;
        }

        if let Ok(relative) = path.strip_prefix(root) {
            merge_tags(
                &mut tags,
                scan(&relative.to_string_lossy(), renderer.helpers())?,
            );
        }

        match std::fs::read_to_string(path) {
            Ok(content) => merge_tags(&mut tags, scan(&content, renderer.helpers())?),
            Err(e) => warn!("Skipping unreadable file {:?}: {}", path, e),
        }
    }

    Ok(tags)
}

fn merge_tags(tags: &mut Vec<Tag>, found: Vec<Tag>) {
    for tag in found {
        if !tags.iter().any(|t| t.name == tag.name) {
            tags.push(tag);
        }
    }
}

/// Resolve every unbound tag of a template tree into the value store.
pub fn resolve_tree_prompts(
    root: &Path,
    renderer: &Renderer,
    values: &mut ValueStore,
    session: &mut dyn PromptSession,
) -> EngineResult<()> {
    let tags = scan_tree(root, renderer)?;

    for tag in tags {
        match tag.kind {
            TagKind::Scalar => {
                if !values.has_non_empty(&tag.name) {
                    let answer = ask_scalar(&tag.name, session)?;
                    values.set(&tag.name, answer);
                }
            }
            TagKind::Block(inner) => {
                if values.get(&tag.name).is_none() {
                    if let Some(value) = resolve_block(&tag.name, &inner, session)? {
                        values.set(&tag.name, value);
                    }
                }
            }
        }
    }

    Ok(())
}

fn ask_scalar(name: &str, session: &mut dyn PromptSession) -> EngineResult<String> {
    let answer = session.ask(&PromptRequest::Input {
        name: name.to_string(),
        message: format!("Value for '{name}':"),
        default: None,
        secret: false,
    })?;
    Ok(match answer {
        PromptAnswer::Text(s) => s,
        PromptAnswer::Flag(b) => b.to_string(),
        PromptAnswer::Index(i) => i.to_string(),
    })
}

/// Resolve one block tag into a nested value: a single object, or a list
/// when the operator adds repetitions. Declining the block resolves to
/// `None` and issues no inner prompts.
fn resolve_block(
    name: &str,
    inner: &[Tag],
    session: &mut dyn PromptSession,
) -> EngineResult<Option<Value>> {
    let answer = session.ask(&PromptRequest::Confirm {
        name: name.to_string(),
        message: format!("Fill '{name}'?"),
        default: false,
    })?;
    if !as_flag(&answer) {
        return Ok(None);
    }

    let mut entries = Vec::new();
    loop {
        let mut object = serde_json::Map::new();
        fill_object(inner, &mut object, session)?;
        entries.push(Value::Object(object));

        let again = session.ask(&PromptRequest::Confirm {
            name: name.to_string(),
            message: format!("Add another '{name}'?"),
            default: false,
        })?;
        if !as_flag(&again) {
            break;
        }
    }

    Ok(Some(if entries.len() == 1 {
        entries.into_iter().next().unwrap_or(Value::Null)
    } else {
        Value::Array(entries)
    }))
}

fn fill_object(
    tags: &[Tag],
    object: &mut serde_json::Map<String, Value>,
    session: &mut dyn PromptSession,
) -> EngineResult<()> {
    for tag in tags {
        if object.contains_key(&tag.name) {
            continue;
        }
        match &tag.kind {
            TagKind::Scalar => {
                let answer = ask_scalar(&tag.name, session)?;
                object.insert(tag.name.clone(), Value::String(answer));
            }
            TagKind::Block(inner) => {
                if let Some(value) = resolve_block(&tag.name, inner, session)? {
                    object.insert(tag.name.clone(), value);
                }
            }
        }
    }
    Ok(())
}
