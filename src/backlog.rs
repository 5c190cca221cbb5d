//! The persisted PRD backlog and the merge of freshly generated epics into it.

use crate::error::{Error, Result};
use crate::models::Epic;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

/// All epics ever generated, oldest first.
///
/// Task ids are unique across the whole document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Backlog {
    pub epics: Vec<Epic>,
}

impl Backlog {
    pub fn new(epics: Vec<Epic>) -> Self {
        Backlog { epics }
    }

    pub fn len(&self) -> usize {
        self.epics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epics.is_empty()
    }

    /// Every non-empty task id in the document
    pub fn task_ids(&self) -> HashSet<String> {
        self.epics
            .iter()
            .flat_map(|epic| epic.tasks.iter())
            .filter(|task| !task.id.is_empty())
            .map(|task| task.id.clone())
            .collect()
    }
}

/// Append `epic` to `backlog`, renaming colliding task ids to `id-2`, `id-3`, ...
///
/// Existing epics are left untouched. Each renamed id is reserved before the
/// next task is considered, so a batch cannot collide with itself either.
pub fn merge(mut backlog: Backlog, mut epic: Epic) -> Backlog {
    let mut taken = backlog.task_ids();

    for task in epic.tasks.iter_mut().filter(|task| !task.id.is_empty()) {
        let id = unique_id(&task.id, &taken);
        taken.insert(id.clone());
        task.id = id;
    }

    backlog.epics.push(epic);
    backlog
}

/// First of `id`, `id-2`, `id-3`, ... not in `taken`
pub fn unique_id(id: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(id) {
        return id.to_string();
    }
    (2u64..)
        .map(|n| format!("{id}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| id.to_string())
}

/// The backlog document on disk
#[derive(Debug, Clone)]
pub struct BacklogStore {
    path: PathBuf,
}

impl BacklogStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        BacklogStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty backlog; anything unreadable is an error
    pub fn load(&self) -> Result<Backlog> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Backlog::default()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Backlog::default());
        }
        serde_json::from_str(&contents)
            .map_err(|e| Error::malformed(self.path.display().to_string(), e))
    }

    /// Write the whole document, replacing the old file in one rename
    pub fn save(&self, backlog: &Backlog) -> Result<()> {
        let payload = serde_json::to_string_pretty(backlog)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(payload.as_bytes())?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|source| Error::Persist {
            path: self.path.display().to_string(),
            source,
        })?;

        info!(path = %self.path.display(), epics = backlog.len(), "saved backlog");
        Ok(())
    }
}
