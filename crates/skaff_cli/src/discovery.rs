//! Skaffile discovery.
//!
//! Task-definition manifests (`Skaffile.yaml`/`Skaffile.yml`) are looked up
//! from the working directory upward, bounded, stopping at the filesystem
//! root. Manifests closer to the working directory are registered last, so
//! their tasks shadow farther ones. A manifest that fails to parse is
//! reported and skipped; discovery keeps going.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use skaff_core::{Skaff, Task};

const MANIFEST_NAMES: [&str; 2] = ["Skaffile.yaml", "Skaffile.yml"];
const MAX_DEPTH: usize = 20;

/// A parsed Skaffile.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub tasks: HashMap<String, Task>,
}

/// Find every manifest path from `start` upward.
pub fn manifest_paths(start: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut current = Some(start);
    while let Some(dir) = current {
        dirs.push(dir.to_path_buf());
        if dirs.len() >= MAX_DEPTH {
            break;
        }
        current = dir.parent();
    }

    // farthest first, so nearer definitions shadow them on registration
    dirs.reverse();

    dirs.into_iter()
        .flat_map(|dir| MANIFEST_NAMES.iter().map(move |name| dir.join(name)))
        .filter(|path| path.is_file())
        .collect()
}

/// Load a single manifest file.
pub fn load_manifest(path: &Path) -> anyhow::Result<Manifest> {
    debug!("Loading manifest from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    let manifest: Manifest = serde_yaml::from_str(&content)?;
    Ok(manifest)
}

/// Discover manifests and register their tasks into the engine.
///
/// Returns the number of manifests loaded. Each task's `base_path`
/// defaults to its manifest's directory, so relative sources resolve next
/// to the Skaffile that declared them.
pub fn load_into(engine: &mut Skaff, start: &Path) -> usize {
    let mut loaded = 0;

    for path in manifest_paths(start) {
        let manifest = match load_manifest(&path) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("Failed to load {}: {}", path.display(), e);
                continue;
            }
        };

        let base_dir = path.parent().map(Path::to_path_buf);
        for (name, mut task) in manifest.tasks {
            task.name = name;
            if task.base_path.is_none() {
                task.base_path = base_dir.clone();
            } else if let (Some(dir), Some(relative)) = (&base_dir, &task.base_path) {
                if relative.is_relative() {
                    task.base_path = Some(dir.join(relative));
                }
            }
            engine.register(task);
        }
        loaded += 1;
    }

    loaded
}
