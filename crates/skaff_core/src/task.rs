//! Task model and registry.
//!
//! A task is a named, registered recipe of prompts and actions. Tasks are
//! immutable once registered; every `run` is an independent execution
//! against the definition. Prompt and action lists may be static or
//! computed lazily against the value store through the same
//! `resolve(&ValueStore)` capability.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::action::ActionItem;
use crate::error::{EngineError, EngineResult};
use crate::prompt::{PromptSpec, Validator};
use crate::values::ValueStore;

/// Lazily-computed prompt list.
pub type PromptResolverFn = Arc<dyn Fn(&ValueStore) -> Vec<PromptSpec> + Send + Sync>;

/// Lazily-computed action list.
pub type ActionResolverFn = Arc<dyn Fn(&ValueStore) -> Vec<ActionItem> + Send + Sync>;

/// Static or computed prompt definitions.
#[derive(Clone, Deserialize)]
#[serde(from = "Vec<PromptSpec>")]
pub enum PromptSource {
    List(Vec<PromptSpec>),
    Resolver(PromptResolverFn),
}

impl Default for PromptSource {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl From<Vec<PromptSpec>> for PromptSource {
    fn from(specs: Vec<PromptSpec>) -> Self {
        Self::List(specs)
    }
}

impl PromptSource {
    /// Materialize the prompt list against the current value store.
    pub fn resolve(&self, values: &ValueStore) -> Vec<PromptSpec> {
        match self {
            Self::List(specs) => specs.clone(),
            Self::Resolver(f) => f(values),
        }
    }
}

impl std::fmt::Debug for PromptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::List(specs) => f.debug_tuple("List").field(specs).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// Static or computed action definitions.
#[derive(Clone, Deserialize)]
#[serde(from = "Vec<ActionItem>")]
pub enum ActionSource {
    List(Vec<ActionItem>),
    Resolver(ActionResolverFn),
}

impl Default for ActionSource {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl From<Vec<ActionItem>> for ActionSource {
    fn from(items: Vec<ActionItem>) -> Self {
        Self::List(items)
    }
}

impl ActionSource {
    /// Materialize the action list against the current value store.
    pub fn resolve(&self, values: &ValueStore) -> Vec<ActionItem> {
        match self {
            Self::List(items) => items.clone(),
            Self::Resolver(f) => f(values),
        }
    }
}

impl std::fmt::Debug for ActionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// A registered generator task.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Task {
    /// Registry key; filled from the manifest map key when loaded from a
    /// Skaffile.
    #[serde(skip)]
    pub name: String,
    pub description: Option<String>,
    /// Root for resolving relative sources and template files.
    pub base_path: Option<PathBuf>,
    /// Positional argument names, mapped into the value store by callers.
    pub arguments: Vec<String>,
    pub prompts: PromptSource,
    pub actions: ActionSource,
    /// Named validators, applied to supplied defaults and used as default
    /// prompt validators.
    #[serde(skip)]
    pub validate: HashMap<String, Validator>,
    pub abort_on_fail: bool,
    pub quiet: bool,
    pub skip_if_exists: bool,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    pub fn with_argument(mut self, name: impl Into<String>) -> Self {
        self.arguments.push(name.into());
        self
    }

    /// Append a prompt (replaces a resolver-backed source).
    pub fn prompt(mut self, spec: PromptSpec) -> Self {
        match &mut self.prompts {
            PromptSource::List(specs) => specs.push(spec),
            PromptSource::Resolver(_) => self.prompts = PromptSource::List(vec![spec]),
        }
        self
    }

    /// Append an action (replaces a resolver-backed source).
    pub fn action(mut self, item: impl Into<ActionItem>) -> Self {
        match &mut self.actions {
            ActionSource::List(items) => items.push(item.into()),
            ActionSource::Resolver(_) => self.actions = ActionSource::List(vec![item.into()]),
        }
        self
    }

    pub fn with_prompts(mut self, prompts: impl Into<PromptSource>) -> Self {
        self.prompts = prompts.into();
        self
    }

    pub fn with_prompt_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(&ValueStore) -> Vec<PromptSpec> + Send + Sync + 'static,
    {
        self.prompts = PromptSource::Resolver(Arc::new(f));
        self
    }

    pub fn with_actions(mut self, actions: impl Into<ActionSource>) -> Self {
        self.actions = actions.into();
        self
    }

    pub fn with_action_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(&ValueStore) -> Vec<ActionItem> + Send + Sync + 'static,
    {
        self.actions = ActionSource::Resolver(Arc::new(f));
        self
    }

    pub fn with_validator<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validate.insert(name.into(), Arc::new(f));
        self
    }

    pub fn abort_on_fail(mut self) -> Self {
        self.abort_on_fail = true;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    pub fn skip_if_exists(mut self) -> Self {
        self.skip_if_exists = true;
        self
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("base_path", &self.base_path)
            .field("prompts", &self.prompts)
            .field("actions", &self.actions)
            .field("validate", &self.validate.keys().collect::<Vec<_>>())
            .field("abort_on_fail", &self.abort_on_fail)
            .field("quiet", &self.quiet)
            .field("skip_if_exists", &self.skip_if_exists)
            .finish()
    }
}

/// Registry of tasks by name.
///
/// Registering a task under an existing name replaces it.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task: Task) {
        debug!("Registering task: {}", task.name);
        self.tasks.insert(task.name.clone(), task);
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn get_required(&self, name: &str) -> EngineResult<&Task> {
        self.get(name)
            .ok_or_else(|| EngineError::TaskNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered task names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Registered tasks, sorted by name.
    pub fn tasks(&self) -> Vec<&Task> {
        let mut tasks: Vec<&Task> = self.tasks.values().collect();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionSpec;

    #[test]
    fn test_builder() {
        let task = Task::new("component")
            .with_description("Generate a component")
            .prompt(PromptSpec::input("name"))
            .action(ActionSpec::add("src/{{snakeCase name}}.rs"))
            .abort_on_fail();

        assert_eq!(task.name, "component");
        assert!(task.abort_on_fail);
        assert_eq!(task.prompts.resolve(&ValueStore::new()).len(), 1);
        assert_eq!(task.actions.resolve(&ValueStore::new()).len(), 1);
    }

    #[test]
    fn test_action_resolver_sees_values() {
        let task = Task::new("dynamic").with_action_resolver(|values| {
            if values.has_non_empty("with_tests") {
                vec![
                    ActionItem::from(ActionSpec::add("src/lib.rs")),
                    ActionItem::from(ActionSpec::add("tests/basic.rs")),
                ]
            } else {
                vec![ActionItem::from(ActionSpec::add("src/lib.rs"))]
            }
        });

        let plain = ValueStore::new();
        assert_eq!(task.actions.resolve(&plain).len(), 1);

        let with_tests: ValueStore = [("with_tests", "yes")].into_iter().collect();
        assert_eq!(task.actions.resolve(&with_tests).len(), 2);
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = TaskRegistry::new();
        assert!(registry.is_empty());

        registry.register(Task::new("component"));
        registry.register(Task::new("api"));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("api"));
        assert_eq!(registry.names(), vec!["api", "component"]);
        assert!(registry.get_required("component").is_ok());

        let err = registry.get_required("nope").unwrap_err();
        assert_eq!(err.to_string(), "Task not found: nope");
    }

    #[test]
    fn test_task_deserializes_from_yaml() {
        let yaml = r#"
description: Generate a module
abort_on_fail: true
prompts:
  - name: name
    message: "Module name:"
actions:
  - add: "src/{{snakeCase name}}.rs"
    template: "pub mod {{snakeCase name}};"
"#;
        let task: Task = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(task.description.as_deref(), Some("Generate a module"));
        assert!(task.abort_on_fail);
        assert_eq!(task.prompts.resolve(&ValueStore::new()).len(), 1);
        assert_eq!(task.actions.resolve(&ValueStore::new()).len(), 1);
    }
}
