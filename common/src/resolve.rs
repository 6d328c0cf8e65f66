//! Destination resolution
//!
//! Every single-entry copy, including each synthesized `dest/child` path during recursion,
//! resolves its destination afresh: the parent entry, the destination entry itself and the
//! effective child name that the copy will be created under.

use crate::entry::Entry;
use crate::error::{CopyError, TransportContext};
use crate::path;
use crate::remote::Remote;

/// Resolved view of a destination path.
#[derive(Debug, Clone)]
pub struct Destination {
    pub path: String,
    pub parent_path: String,
    pub leaf: String,
    /// `None` if the parent path does not exist
    pub parent: Option<Entry>,
    /// `None` if nothing exists at the destination path yet
    pub entry: Option<Entry>,
}

/// Where a copy of a given source is placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// `None` or empty when the destination parent could not be resolved
    pub parent_id: Option<String>,
    pub name: String,
}

/// Resolves `dst` and its parent; "not found" is a valid outcome for both.
#[tracing::instrument(skip(remote))]
pub async fn resolve_destination(remote: &Remote, dst: &str) -> Result<Destination, CopyError> {
    let dst = path::normalize(dst);
    let (parent_path, leaf) = path::split(&dst);
    let parent = remote
        .resolve_by_path(&parent_path)
        .await
        .transport_context(|| format!("failed resolving destination parent {parent_path:?}"))?;
    // nothing can exist below a missing parent
    let entry = if parent.is_some() {
        remote
            .resolve_by_path(&dst)
            .await
            .transport_context(|| format!("failed resolving destination {dst:?}"))?
    } else {
        None
    };
    tracing::debug!(
        "destination {:?}: parent found: {}, exists: {}",
        dst,
        parent.is_some(),
        entry.is_some()
    );
    Ok(Destination {
        path: dst,
        parent_path,
        leaf,
        parent,
        entry,
    })
}

impl Destination {
    /// Applies the duplicate-avoidance and copy-into-directory rules for `source`.
    ///
    /// Without duplicates, a directory source over an existing directory gets the nested name
    /// `existing/leaf`. That name only reaches [`crate::remote::RemoteTree::upsert_directory`]
    /// as the template name, which the remote ignores when it reuses the existing directory
    /// (see [`Destination::existing_directory`]). A file source over an existing directory
    /// is placed inside it under its own name.
    pub fn target_for(&self, source: &Entry, allow_duplicates: bool) -> Result<Target, CopyError> {
        let mut name = self.leaf.clone();
        if !allow_duplicates && let Some(existing) = &self.entry {
            if !existing.is_dir {
                return Err(CopyError::DuplicateNotAllowed(self.path.clone()));
            }
            name = format!("{}/{}", existing.name, self.leaf);
        }
        let mut parent_id = self
            .parent
            .as_ref()
            .map(|parent| parent.id.clone())
            .filter(|id| !id.is_empty());
        if let Some(existing) = self.existing_directory()
            && !source.is_dir
        {
            name = source.name.clone();
            parent_id = Some(existing.id.clone());
        }
        Ok(Target { parent_id, name })
    }

    /// The destination entry, if it exists and is a directory.
    pub fn existing_directory(&self) -> Option<&Entry> {
        self.entry.as_ref().filter(|entry| entry.is_dir)
    }
}
