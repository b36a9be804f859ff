use super::AutoRegistration;
use crate::error::{BridgeError, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Directories under each registration root that hold component definitions
pub const COMPONENT_DIRS: [&str; 3] = ["relations", "mappers", "commands"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentKind {
    Relation,
    Mapper,
    Command,
}

impl ComponentKind {
    pub fn all() -> [ComponentKind; 3] {
        [ComponentKind::Relation, ComponentKind::Mapper, ComponentKind::Command]
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            ComponentKind::Relation => COMPONENT_DIRS[0],
            ComponentKind::Mapper => COMPONENT_DIRS[1],
            ComponentKind::Command => COMPONENT_DIRS[2],
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A definition file found during auto-registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDefinition {
    pub kind: ComponentKind,
    /// `relations::users` when namespaced, `users` otherwise
    pub identifier: String,
    pub path: PathBuf,
}

/// Scan the component directories of one registration root.
///
/// Missing directories are skipped; hidden files are ignored.
pub fn discover_components(registration: &AutoRegistration) -> Result<Vec<ComponentDefinition>> {
    let mut found = Vec::new();

    for kind in ComponentKind::all() {
        let dir = registration.root.join(kind.dir_name());
        if !dir.is_dir() {
            continue;
        }

        let mut files = Vec::new();
        collect_files(&dir, &mut files)?;
        files.sort();

        for path in files {
            let identifier = identifier_for(&dir, &path, kind, registration.namespace);
            found.push(ComponentDefinition {
                kind,
                identifier,
                path,
            });
        }
    }

    Ok(found)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| BridgeError::Registration {
        path: dir.display().to_string(),
        cause: e.to_string(),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| BridgeError::Registration {
            path: dir.display().to_string(),
            cause: e.to_string(),
        })?;

        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(true);
        if hidden {
            continue;
        }

        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }

    Ok(())
}

fn identifier_for(dir: &Path, path: &Path, kind: ComponentKind, namespace: bool) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path).with_extension("");

    let mut segments: Vec<String> = Vec::new();
    if namespace {
        segments.push(kind.dir_name().to_string());
    }
    segments.extend(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    segments.join("::")
}
