//! Action specifications and normalization.
//!
//! An [`ActionSpec`] is the loose, serde-friendly form a Skaffile or host
//! builds: every field optional, shorthand keys allowed (`{add: "x.txt"}`
//! instead of `{type: "add", dest: "x.txt"}`). [`ActionSpec::normalize`]
//! turns it into the closed [`Action`] enum, rejecting unknown kinds and
//! missing required fields at construction time, before any mutation.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::values::ValueStore;

/// Host callback for the `extend` action: mutate the parsed document.
#[derive(Clone)]
pub struct ExtendFn(Arc<dyn Fn(&mut Value, &ValueStore) + Send + Sync>);

impl ExtendFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Value, &ValueStore) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, document: &mut Value, values: &ValueStore) {
        (self.0)(document, values)
    }
}

impl std::fmt::Debug for ExtendFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExtendFn")
    }
}

/// Host callback action item: runs against the value store between
/// declarative actions.
#[derive(Clone)]
pub struct SideEffectFn(Arc<dyn Fn(&mut ValueStore) -> EngineResult<()> + Send + Sync>);

impl SideEffectFn {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut ValueStore) -> EngineResult<()> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, values: &mut ValueStore) -> EngineResult<()> {
        (self.0)(values)
    }
}

impl std::fmt::Debug for SideEffectFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SideEffectFn")
    }
}

/// One item of a task's action list.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "ActionSpec")]
pub enum ActionItem {
    Spec(ActionSpec),
    /// Side-channel callback; the only mutation path into the value store
    /// besides the prompt resolver.
    Call(SideEffectFn),
}

impl From<ActionSpec> for ActionItem {
    fn from(spec: ActionSpec) -> Self {
        Self::Spec(spec)
    }
}

impl From<SideEffectFn> for ActionItem {
    fn from(f: SideEffectFn) -> Self {
        Self::Call(f)
    }
}

/// Declarative action specification, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionSpec {
    /// Explicit action kind; shorthand keys below imply it.
    #[serde(rename = "type")]
    pub kind: Option<String>,

    // shorthand keys: `{add: "x.txt"}` ≡ `{type: "add", dest: "x.txt"}`
    pub add: Option<String>,
    /// Shorthand for `copy`; sets `src`.
    pub copy: Option<String>,
    pub modify: Option<String>,
    pub extend: Option<String>,
    pub clone: Option<String>,
    pub render: Option<String>,
    pub clean: Option<String>,
    pub exec: Option<String>,
    pub install: Option<Vec<String>>,

    pub dest: Option<String>,
    pub src: Option<String>,

    pub template: Option<String>,
    #[serde(alias = "template_file")]
    pub template_file: Option<PathBuf>,
    pub content: Option<String>,

    pub pattern: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub unless: Option<String>,
    #[serde(alias = "delete_content")]
    pub delete_content: Option<bool>,
    #[serde(alias = "default_content")]
    pub default_content: Option<String>,

    pub command: Option<String>,
    pub quiet: Option<bool>,

    #[serde(alias = "git_url")]
    pub git_url: Option<String>,

    pub dependencies: Vec<String>,
    #[serde(alias = "dev_dependencies")]
    pub dev_dependencies: Vec<String>,
    #[serde(alias = "optional_dependencies")]
    pub optional_dependencies: Vec<String>,

    #[serde(alias = "abort_on_fail")]
    pub abort_on_fail: Option<bool>,

    #[serde(skip)]
    pub callback: Option<ExtendFn>,
}

impl ActionSpec {
    pub fn add(dest: impl Into<String>) -> Self {
        Self {
            kind: Some("add".into()),
            dest: Some(dest.into()),
            ..Self::default()
        }
    }

    pub fn copy(src: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            kind: Some("copy".into()),
            src: Some(src.into()),
            dest: Some(dest.into()),
            ..Self::default()
        }
    }

    pub fn modify(dest: impl Into<String>) -> Self {
        Self {
            kind: Some("modify".into()),
            dest: Some(dest.into()),
            ..Self::default()
        }
    }

    pub fn extend<F>(dest: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut Value, &ValueStore) + Send + Sync + 'static,
    {
        Self {
            kind: Some("extend".into()),
            dest: Some(dest.into()),
            callback: Some(ExtendFn::new(callback)),
            ..Self::default()
        }
    }

    pub fn clone_repo(git_url: impl Into<String>, dest: impl Into<String>) -> Self {
        Self {
            kind: Some("clone".into()),
            git_url: Some(git_url.into()),
            dest: Some(dest.into()),
            ..Self::default()
        }
    }

    pub fn render(dest: impl Into<String>) -> Self {
        Self {
            kind: Some("render".into()),
            dest: Some(dest.into()),
            ..Self::default()
        }
    }

    pub fn clean(dest: impl Into<String>) -> Self {
        Self {
            kind: Some("clean".into()),
            dest: Some(dest.into()),
            ..Self::default()
        }
    }

    pub fn exec(command: impl Into<String>) -> Self {
        Self {
            kind: Some("exec".into()),
            command: Some(command.into()),
            ..Self::default()
        }
    }

    pub fn install(dest: impl Into<String>) -> Self {
        Self {
            kind: Some("install".into()),
            dest: Some(dest.into()),
            ..Self::default()
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_template_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_file = Some(path.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_before(mut self, anchor: impl Into<String>) -> Self {
        self.before = Some(anchor.into());
        self
    }

    pub fn with_after(mut self, anchor: impl Into<String>) -> Self {
        self.after = Some(anchor.into());
        self
    }

    pub fn with_unless(mut self, marker: impl Into<String>) -> Self {
        self.unless = Some(marker.into());
        self
    }

    pub fn with_delete_content(mut self) -> Self {
        self.delete_content = Some(true);
        self
    }

    pub fn with_default_content(mut self, content: impl Into<String>) -> Self {
        self.default_content = Some(content.into());
        self
    }

    pub fn with_quiet(mut self) -> Self {
        self.quiet = Some(true);
        self
    }

    pub fn with_dependencies(mut self, packages: Vec<String>) -> Self {
        self.dependencies = packages;
        self
    }

    pub fn with_dev_dependencies(mut self, packages: Vec<String>) -> Self {
        self.dev_dependencies = packages;
        self
    }

    pub fn with_optional_dependencies(mut self, packages: Vec<String>) -> Self {
        self.optional_dependencies = packages;
        self
    }

    pub fn with_abort_on_fail(mut self) -> Self {
        self.abort_on_fail = Some(true);
        self
    }

    /// The action kind, explicit or implied by a shorthand key.
    pub fn kind_name(&self) -> Option<&str> {
        if let Some(kind) = &self.kind {
            return Some(kind.as_str());
        }
        if self.add.is_some() {
            Some("add")
        } else if self.copy.is_some() {
            Some("copy")
        } else if self.modify.is_some() {
            Some("modify")
        } else if self.extend.is_some() {
            Some("extend")
        } else if self.clone.is_some() {
            Some("clone")
        } else if self.render.is_some() {
            Some("render")
        } else if self.clean.is_some() {
            Some("clean")
        } else if self.exec.is_some() {
            Some("exec")
        } else if self.install.is_some() {
            Some("install")
        } else {
            None
        }
    }

    /// Normalize into the closed [`Action`] enum.
    pub fn normalize(&self) -> EngineResult<NormalizedAction> {
        let kind = self
            .kind_name()
            .ok_or_else(|| EngineError::UnsupportedAction("unknown".to_string()))?
            .to_string();

        let spec = self.desugared();
        let require = |field: &str, value: &Option<String>| -> EngineResult<String> {
            value.clone().ok_or_else(|| EngineError::MissingField {
                kind: kind.clone(),
                field: field.to_string(),
            })
        };

        let action = match kind.as_str() {
            "add" => Action::Add {
                dest: require("dest", &spec.dest)?,
                template: spec.template,
                template_file: spec.template_file,
                content: spec.content,
            },
            "copy" => Action::Copy {
                src: require("src", &spec.src)?,
                dest: require("dest", &spec.dest)?,
            },
            "modify" => {
                let dest = require("dest", &spec.dest)?;
                if spec.pattern.is_none() && spec.before.is_none() && spec.after.is_none() {
                    return Err(EngineError::MissingField {
                        kind: kind.clone(),
                        field: "pattern".to_string(),
                    });
                }
                Action::Modify {
                    dest,
                    pattern: spec.pattern,
                    before: spec.before,
                    after: spec.after,
                    template: spec.template,
                    template_file: spec.template_file,
                    content: spec.content,
                    unless: spec.unless,
                    delete_content: spec.delete_content.unwrap_or(false),
                    default_content: spec.default_content,
                }
            }
            "extend" => Action::Extend {
                dest: require("dest", &spec.dest)?,
                callback: spec.callback.ok_or_else(|| EngineError::MissingField {
                    kind: kind.clone(),
                    field: "callback".to_string(),
                })?,
            },
            "clone" => Action::Clone {
                git_url: require("gitUrl", &spec.git_url)?,
                dest: require("dest", &spec.dest)?,
            },
            "render" => Action::Render {
                dest: require("dest", &spec.dest)?,
            },
            "clean" => Action::Clean {
                dest: require("dest", &spec.dest)?,
            },
            "exec" => Action::Exec {
                command: require("command", &spec.command)?,
                quiet: spec.quiet.unwrap_or(false),
            },
            "install" => Action::Install {
                dest: require("dest", &spec.dest)?,
                dependencies: spec.dependencies,
                dev_dependencies: spec.dev_dependencies,
                optional_dependencies: spec.optional_dependencies,
            },
            other => return Err(EngineError::UnsupportedAction(other.to_string())),
        };

        Ok(NormalizedAction {
            action,
            abort_on_fail: self.abort_on_fail.unwrap_or(false),
        })
    }

    /// Fold shorthand keys into their canonical fields.
    fn desugared(&self) -> Self {
        let mut spec = self.clone();
        if let Some(value) = spec.add.take() {
            spec.dest.get_or_insert(value);
        }
        if let Some(value) = spec.copy.take() {
            spec.src.get_or_insert(value);
        }
        if let Some(value) = spec.modify.take() {
            spec.dest.get_or_insert(value);
        }
        if let Some(value) = spec.extend.take() {
            spec.dest.get_or_insert(value);
        }
        if let Some(value) = spec.clone.take() {
            spec.git_url.get_or_insert(value);
        }
        if let Some(value) = spec.render.take() {
            spec.dest.get_or_insert(value);
        }
        if let Some(value) = spec.clean.take() {
            spec.dest.get_or_insert(value);
        }
        if let Some(value) = spec.exec.take() {
            spec.command.get_or_insert(value);
        }
        if let Some(packages) = spec.install.take() {
            if spec.dependencies.is_empty() {
                spec.dependencies = packages;
            }
        }
        spec
    }
}

/// A normalized action plus its escalation flag.
#[derive(Debug, Clone)]
pub struct NormalizedAction {
    pub action: Action,
    pub abort_on_fail: bool,
}

/// The closed set of action kinds the executor dispatches over.
#[derive(Debug, Clone)]
pub enum Action {
    Add {
        dest: String,
        template: Option<String>,
        template_file: Option<PathBuf>,
        content: Option<String>,
    },
    Copy {
        src: String,
        dest: String,
    },
    Modify {
        dest: String,
        pattern: Option<String>,
        before: Option<String>,
        after: Option<String>,
        template: Option<String>,
        template_file: Option<PathBuf>,
        content: Option<String>,
        unless: Option<String>,
        delete_content: bool,
        default_content: Option<String>,
    },
    Extend {
        dest: String,
        callback: ExtendFn,
    },
    Clone {
        git_url: String,
        dest: String,
    },
    Render {
        dest: String,
    },
    Clean {
        dest: String,
    },
    Exec {
        command: String,
        quiet: bool,
    },
    Install {
        dest: String,
        dependencies: Vec<String>,
        dev_dependencies: Vec<String>,
        optional_dependencies: Vec<String>,
    },
}

impl Action {
    /// Kind name, as recorded in change and failure records.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Copy { .. } => "copy",
            Self::Modify { .. } => "modify",
            Self::Extend { .. } => "extend",
            Self::Clone { .. } => "clone",
            Self::Render { .. } => "render",
            Self::Clean { .. } => "clean",
            Self::Exec { .. } => "exec",
            Self::Install { .. } => "install",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand_add() {
        let spec: ActionSpec = serde_yaml::from_str("add: x.txt").unwrap();
        let normalized = spec.normalize().unwrap();
        match normalized.action {
            Action::Add { dest, .. } => assert_eq!(dest, "x.txt"),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_shorthand_copy_sets_src() {
        let spec: ActionSpec = serde_yaml::from_str("{copy: templates/a.txt, dest: a.txt}")
            .unwrap();
        let normalized = spec.normalize().unwrap();
        match normalized.action {
            Action::Copy { src, dest } => {
                assert_eq!(src, "templates/a.txt");
                assert_eq!(dest, "a.txt");
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_shorthand_exec_and_install() {
        let spec: ActionSpec = serde_yaml::from_str("exec: echo ok").unwrap();
        assert!(matches!(
            spec.normalize().unwrap().action,
            Action::Exec { command, .. } if command == "echo ok"
        ));

        let spec: ActionSpec =
            serde_yaml::from_str("{install: [noop], dest: '.'}").unwrap();
        match spec.normalize().unwrap().action {
            Action::Install { dependencies, .. } => assert_eq!(dependencies, vec!["noop"]),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_empty_spec_is_unsupported() {
        let err = ActionSpec::default().normalize().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported 'unknown' action");
    }

    #[test]
    fn test_unknown_kind_rejected_at_construction() {
        let spec: ActionSpec = serde_yaml::from_str("{type: dunno, dest: a.txt}").unwrap();
        let err = spec.normalize().unwrap_err();
        assert_eq!(err.to_string(), "Unsupported 'dunno' action");
    }

    #[test]
    fn test_missing_dest_named() {
        let spec: ActionSpec = serde_yaml::from_str("type: add").unwrap();
        let err = spec.normalize().unwrap_err();
        assert_eq!(err.to_string(), "Missing required field 'dest' for 'add' action");
    }

    #[test]
    fn test_missing_src_named() {
        let spec: ActionSpec = serde_yaml::from_str("{type: copy, dest: a.txt}").unwrap();
        let err = spec.normalize().unwrap_err();
        assert_eq!(err.to_string(), "Missing required field 'src' for 'copy' action");
    }

    #[test]
    fn test_modify_requires_pattern() {
        let spec: ActionSpec = serde_yaml::from_str("modify: a.txt").unwrap();
        let err = spec.normalize().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required field 'pattern' for 'modify' action"
        );
    }

    #[test]
    fn test_modify_accepts_anchor_instead_of_pattern() {
        let spec: ActionSpec =
            serde_yaml::from_str("{modify: a.txt, after: '## deps'}").unwrap();
        assert!(spec.normalize().is_ok());
    }

    #[test]
    fn test_exec_requires_command() {
        let spec: ActionSpec = serde_yaml::from_str("type: exec").unwrap();
        let err = spec.normalize().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required field 'command' for 'exec' action"
        );
    }

    #[test]
    fn test_extend_requires_callback() {
        let spec: ActionSpec = serde_yaml::from_str("extend: package.json").unwrap();
        let err = spec.normalize().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required field 'callback' for 'extend' action"
        );
    }

    #[test]
    fn test_action_level_abort_flag() {
        let spec = ActionSpec::exec("false").with_abort_on_fail();
        assert!(spec.normalize().unwrap().abort_on_fail);
    }
}
