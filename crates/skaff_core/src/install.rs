//! Dependency installation.
//!
//! The install orchestrator maps grouped dependency lists to
//! package-manager invocations, in fixed order (runtime, dev, optional) so
//! a later failure cannot corrupt an already-applied earlier install.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::record::{ChangeRecord, ChangeStatus};

/// Dependency category, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyCategory {
    Runtime,
    Dev,
    Optional,
}

impl DependencyCategory {
    /// Package-manager flag selecting this category, if any.
    pub fn flag(&self) -> Option<&'static str> {
        match self {
            Self::Runtime => None,
            Self::Dev => Some("--save-dev"),
            Self::Optional => Some("--save-optional"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Runtime => "dependencies",
            Self::Dev => "devDependencies",
            Self::Optional => "optionalDependencies",
        }
    }
}

/// Collaborator that installs one category of packages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn install(
        &self,
        category: DependencyCategory,
        packages: &[String],
        cwd: &Path,
    ) -> EngineResult<()>;
}

/// Installs packages with the system `npm`.
#[derive(Debug, Clone, Default)]
pub struct NpmInstaller;

#[async_trait]
impl PackageInstaller for NpmInstaller {
    async fn install(
        &self,
        category: DependencyCategory,
        packages: &[String],
        cwd: &Path,
    ) -> EngineResult<()> {
        let mut command = Command::new("npm");
        command.arg("install");
        if let Some(flag) = category.flag() {
            command.arg(flag);
        }
        command.args(packages).current_dir(cwd);

        info!(
            "Installing {} {} in {}",
            packages.len(),
            category.label(),
            cwd.display()
        );

        let rendered = format!("npm install {}", packages.join(" "));
        let output = command.output().await.map_err(|e| EngineError::Process {
            command: rendered.clone(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            return Err(EngineError::Process {
                command: rendered,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

/// Per-category disable flags for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallFlags {
    pub no_install: bool,
    pub no_install_dev: bool,
    pub no_install_opts: bool,
}

impl InstallFlags {
    fn disabled(&self, category: DependencyCategory) -> bool {
        match category {
            DependencyCategory::Runtime => self.no_install,
            DependencyCategory::Dev => self.no_install_dev,
            DependencyCategory::Optional => self.no_install_opts,
        }
    }
}

/// Maps grouped dependency lists to package-manager invocations.
pub struct InstallOrchestrator<'a> {
    installer: &'a dyn PackageInstaller,
    flags: InstallFlags,
}

impl<'a> InstallOrchestrator<'a> {
    pub fn new(installer: &'a dyn PackageInstaller, flags: InstallFlags) -> Self {
        Self { installer, flags }
    }

    /// Run the non-disabled categories in fixed order, appending one
    /// change record per category actually executed.
    ///
    /// The runtime category runs even with an empty list (a plain install
    /// against the project manifest), so "install was run" stays
    /// observable; dev and optional categories are skipped when empty.
    pub async fn run(
        &self,
        dest: &Path,
        dependencies: &[String],
        dev_dependencies: &[String],
        optional_dependencies: &[String],
        changes: &mut Vec<ChangeRecord>,
    ) -> EngineResult<()> {
        let categories = [
            (DependencyCategory::Runtime, dependencies),
            (DependencyCategory::Dev, dev_dependencies),
            (DependencyCategory::Optional, optional_dependencies),
        ];

        for (category, packages) in categories {
            if self.flags.disabled(category) {
                debug!("{} disabled, skipping", category.label());
                continue;
            }
            if packages.is_empty() && category != DependencyCategory::Runtime {
                continue;
            }

            self.installer.install(category, packages, dest).await?;

            changes.push(
                ChangeRecord::new("install", ChangeStatus::Installed)
                    .with_dependencies(packages.to_vec()),
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_runtime_still_records() {
        let mut installer = MockPackageInstaller::new();
        installer
            .expect_install()
            .withf(|category, packages, _| {
                *category == DependencyCategory::Runtime && packages.is_empty()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let orchestrator = InstallOrchestrator::new(&installer, InstallFlags::default());
        let mut changes = Vec::new();
        orchestrator
            .run(Path::new("."), &[], &[], &[], &mut changes)
            .await
            .unwrap();

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, "install");
        assert_eq!(changes[0].dependencies.as_deref(), Some(&[][..]));
    }

    #[tokio::test]
    async fn test_fixed_category_order() {
        let mut installer = MockPackageInstaller::new();
        let mut sequence = mockall::Sequence::new();
        for expected in [
            DependencyCategory::Runtime,
            DependencyCategory::Dev,
            DependencyCategory::Optional,
        ] {
            installer
                .expect_install()
                .withf(move |category, _, _| *category == expected)
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_, _, _| Ok(()));
        }

        let orchestrator = InstallOrchestrator::new(&installer, InstallFlags::default());
        let mut changes = Vec::new();
        orchestrator
            .run(
                Path::new("."),
                &strings(&["a"]),
                &strings(&["b"]),
                &strings(&["c"]),
                &mut changes,
            )
            .await
            .unwrap();

        assert_eq!(changes.len(), 3);
    }

    #[tokio::test]
    async fn test_disabled_category_not_invoked() {
        let mut installer = MockPackageInstaller::new();
        installer
            .expect_install()
            .withf(|category, _, _| *category == DependencyCategory::Runtime)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let flags = InstallFlags {
            no_install_dev: true,
            ..Default::default()
        };
        let orchestrator = InstallOrchestrator::new(&installer, flags);
        let mut changes = Vec::new();
        orchestrator
            .run(
                Path::new("."),
                &strings(&["a"]),
                &strings(&["b"]),
                &[],
                &mut changes,
            )
            .await
            .unwrap();

        assert_eq!(changes.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_earlier_records() {
        let mut installer = MockPackageInstaller::new();
        installer
            .expect_install()
            .withf(|category, _, _| *category == DependencyCategory::Runtime)
            .returning(|_, _, _| Ok(()));
        installer
            .expect_install()
            .withf(|category, _, _| *category == DependencyCategory::Dev)
            .returning(|_, _, _| {
                Err(EngineError::Process {
                    command: "npm install --save-dev b".to_string(),
                    message: "registry down".to_string(),
                })
            });

        let orchestrator = InstallOrchestrator::new(&installer, InstallFlags::default());
        let mut changes = Vec::new();
        let err = orchestrator
            .run(
                Path::new("."),
                &strings(&["a"]),
                &strings(&["b"]),
                &[],
                &mut changes,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Process { .. }));
        // the runtime install already happened and stays recorded
        assert_eq!(changes.len(), 1);
    }
}
