//! In-memory remote tree
//!
//! Implements [`RemoteTree`] over a node table held in memory. It backs the engine tests and
//! the `rdcp` snapshot store, which loads and saves the table as JSON.
//!
//! Behavior follows the remote store closely enough for the copy engine:
//!
//! - paths resolve from the root by name, the first non-trashed match wins when names repeat
//! - listings are paginated, the continuation token is the offset of the next page
//! - copies and directory creations receive fresh identifiers
//! - copies of entries with a given name can be made to fail (see
//!   [`MemoryTree::fail_copies_named`])

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Context};

use crate::entry::{ChildQuery, DirectoryTemplate, Entry, Page};
use crate::path;
use crate::remote::RemoteTree;

pub const ROOT_ID: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub entry: Entry,
    pub parent: Option<String>,
    #[serde(default)]
    pub trashed: bool,
}

/// Serialized form of a [`MemoryTree`].
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
}

/// Number of calls served per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calls {
    pub resolve: u64,
    pub list: u64,
    pub copy: u64,
    pub upsert: u64,
}

impl Calls {
    /// Calls that change the remote tree.
    pub fn mutations(&self) -> u64 {
        self.copy + self.upsert
    }
}

#[derive(Debug, Default)]
struct CallCounters {
    resolve: AtomicU64,
    list: AtomicU64,
    copy: AtomicU64,
    upsert: AtomicU64,
}

#[derive(Debug)]
struct State {
    nodes: Vec<Node>,
    next_id: u64,
}

impl State {
    fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.entry.id == id)
    }

    fn children<'a>(
        &'a self,
        parent_id: &'a str,
        include_trashed: bool,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.iter().filter(move |node| {
            node.parent.as_deref() == Some(parent_id) && (include_trashed || !node.trashed)
        })
    }

    fn lookup(&self, remote_path: &str) -> Option<&Node> {
        let normalized = path::normalize(remote_path);
        let mut current = self.node(ROOT_ID)?;
        for name in normalized.split('/').filter(|s| !s.is_empty()) {
            current = self
                .children(&current.entry.id, false)
                .find(|node| node.entry.name == name)?;
        }
        Some(current)
    }

    fn fresh_id(&mut self) -> String {
        loop {
            self.next_id += 1;
            let id = format!("n{}", self.next_id);
            if self.node(&id).is_none() {
                return id;
            }
        }
    }

    fn insert(&mut self, parent_id: &str, name: &str, is_dir: bool, copyable: bool) -> Entry {
        let entry = Entry {
            id: self.fresh_id(),
            name: name.to_string(),
            is_dir,
            copyable,
        };
        self.nodes.push(Node {
            entry: entry.clone(),
            parent: Some(parent_id.to_string()),
            trashed: false,
        });
        entry
    }

    fn directory(&self, id: &str) -> anyhow::Result<&Node> {
        match self.node(id) {
            Some(node) if node.entry.is_dir && !node.trashed => Ok(node),
            Some(_) => Err(anyhow!("{id:?} is not a directory")),
            None => Err(anyhow!("no entry with id {id:?}")),
        }
    }
}

#[derive(Debug)]
pub struct MemoryTree {
    state: std::sync::Mutex<State>,
    calls: CallCounters,
    failing_names: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl MemoryTree {
    /// A tree holding only the root directory.
    pub fn new() -> Self {
        Self::from_snapshot(Snapshot::default())
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut nodes = snapshot.nodes;
        if !nodes.iter().any(|node| node.entry.id == ROOT_ID) {
            nodes.insert(
                0,
                Node {
                    entry: Entry::directory(ROOT_ID, ""),
                    parent: None,
                    trashed: false,
                },
            );
        }
        let next_id = nodes.len() as u64;
        Self {
            state: std::sync::Mutex::new(State { nodes, next_id }),
            calls: CallCounters::default(),
            failing_names: Default::default(),
        }
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(json).context("failed parsing remote tree snapshot")?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            nodes: self.state().nodes.clone(),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
            .context("failed serializing remote tree snapshot")
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates the directory at `dir_path` along with any missing ancestors.
    pub fn mkdir(&self, dir_path: &str) -> anyhow::Result<Entry> {
        let mut state = self.state();
        let mut current = state
            .node(ROOT_ID)
            .map(|node| node.entry.clone())
            .ok_or_else(|| anyhow!("tree has no root"))?;
        for name in path::normalize(dir_path).split('/').filter(|s| !s.is_empty()) {
            let existing = state
                .children(&current.id, false)
                .find(|node| node.entry.name == name)
                .map(|node| node.entry.clone());
            current = match existing {
                Some(entry) if entry.is_dir => entry,
                Some(_) => return Err(anyhow!("{name:?} in {dir_path:?} is not a directory")),
                None => state.insert(&current.id, name, true, true),
            };
        }
        Ok(current)
    }

    /// Adds a copyable file, creating missing parent directories.
    pub fn add_file(&self, file_path: &str) -> anyhow::Result<Entry> {
        self.add_entry(file_path, true)
    }

    /// Adds a file the remote refuses to copy.
    pub fn add_uncopyable(&self, file_path: &str) -> anyhow::Result<Entry> {
        self.add_entry(file_path, false)
    }

    fn add_entry(&self, file_path: &str, copyable: bool) -> anyhow::Result<Entry> {
        let (parent_path, name) = path::split(file_path);
        if name.is_empty() {
            return Err(anyhow!("cannot add a file at the root path"));
        }
        let parent = self.mkdir(&parent_path)?;
        Ok(self.state().insert(&parent.id, &name, false, copyable))
    }

    /// Moves the entry at `entry_path` (and implicitly its subtree) to the trash.
    pub fn trash(&self, entry_path: &str) -> anyhow::Result<()> {
        let mut state = self.state();
        let id = state
            .lookup(entry_path)
            .map(|node| node.entry.id.clone())
            .ok_or_else(|| anyhow!("{entry_path:?} not found"))?;
        if let Some(node) = state.nodes.iter_mut().find(|node| node.entry.id == id) {
            node.trashed = true;
        }
        Ok(())
    }

    /// Every subsequent copy of an entry named `name` fails.
    pub fn fail_copies_named(&self, name: &str) {
        self.failing_names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string());
    }

    pub fn get(&self, entry_path: &str) -> Option<Entry> {
        self.state().lookup(entry_path).map(|node| node.entry.clone())
    }

    /// Non-trashed children of the directory at `dir_path`, in insertion order.
    pub fn children(&self, dir_path: &str) -> Vec<Entry> {
        let state = self.state();
        match state.lookup(dir_path) {
            Some(dir) => state
                .children(&dir.entry.id, false)
                .map(|node| node.entry.clone())
                .collect(),
            None => vec![],
        }
    }

    /// Sorted paths of every reachable, non-trashed entry (the root excluded).
    pub fn paths(&self) -> Vec<String> {
        fn walk(state: &State, id: &str, prefix: &str, out: &mut Vec<String>) {
            for node in state.children(id, false) {
                let node_path = path::join(prefix, &node.entry.name);
                out.push(node_path.clone());
                if node.entry.is_dir {
                    walk(state, &node.entry.id, &node_path, out);
                }
            }
        }
        let state = self.state();
        let mut out = vec![];
        walk(&state, ROOT_ID, path::ROOT, &mut out);
        out.sort();
        out
    }

    pub fn calls(&self) -> Calls {
        Calls {
            resolve: self.calls.resolve.load(Ordering::Relaxed),
            list: self.calls.list.load(Ordering::Relaxed),
            copy: self.calls.copy.load(Ordering::Relaxed),
            upsert: self.calls.upsert.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RemoteTree for MemoryTree {
    async fn resolve_by_path(&self, entry_path: &str) -> anyhow::Result<Option<Entry>> {
        self.calls.resolve.fetch_add(1, Ordering::Relaxed);
        Ok(self.get(entry_path))
    }

    async fn list_children(
        &self,
        query: &ChildQuery,
        page_token: Option<&str>,
        page_size: u32,
    ) -> anyhow::Result<Page> {
        self.calls.list.fetch_add(1, Ordering::Relaxed);
        let offset = match page_token.filter(|token| !token.is_empty()) {
            Some(token) => token
                .parse::<usize>()
                .with_context(|| format!("invalid page token {token:?}"))?,
            None => 0,
        };
        let page_size = usize::try_from(page_size.max(1)).unwrap_or(usize::MAX);
        let state = self.state();
        let children: Vec<Entry> = state
            .children(&query.parent_id, query.include_trashed)
            .map(|node| node.entry.clone())
            .collect();
        let end = offset.saturating_add(page_size).min(children.len());
        let entries = children.get(offset..end).unwrap_or_default().to_vec();
        let next_page_token = (end < children.len()).then(|| end.to_string());
        Ok(Page {
            entries,
            next_page_token,
        })
    }

    async fn copy_entry(&self, source: &Entry, parent_id: &str, name: &str) -> anyhow::Result<Entry> {
        self.calls.copy.fetch_add(1, Ordering::Relaxed);
        if self
            .failing_names
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&source.name)
        {
            return Err(anyhow!("copy of {:?} rejected by remote", source.name));
        }
        let mut state = self.state();
        state.directory(parent_id)?;
        let original = state
            .node(&source.id)
            .ok_or_else(|| anyhow!("no entry with id {:?}", source.id))?;
        if original.entry.is_dir {
            return Err(anyhow!("{:?} is a directory", source.name));
        }
        if !original.entry.copyable {
            return Err(anyhow!("{:?} cannot be copied", source.name));
        }
        Ok(state.insert(parent_id, name, false, true))
    }

    async fn upsert_directory(
        &self,
        parent_id: Option<&str>,
        template: &DirectoryTemplate,
        existing: Option<&Entry>,
    ) -> anyhow::Result<Entry> {
        self.calls.upsert.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state();
        if let Some(existing) = existing {
            return Ok(state.directory(&existing.id)?.entry.clone());
        }
        let parent_id = parent_id.filter(|id| !id.is_empty()).unwrap_or(ROOT_ID);
        state.directory(parent_id)?;
        Ok(state.insert(parent_id, &template.name, true, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_paths() -> anyhow::Result<()> {
        let tree = MemoryTree::new();
        tree.add_file("/a/b/c.txt")?;
        assert_eq!(tree.resolve_by_path("/").await?.map(|e| e.id), Some(ROOT_ID.to_string()));
        assert!(tree.resolve_by_path("/a/b").await?.is_some_and(|e| e.is_dir));
        assert!(tree.resolve_by_path("a/b/c.txt").await?.is_some_and(|e| !e.is_dir));
        assert!(tree.resolve_by_path("/a/x").await?.is_none());
        assert!(tree.resolve_by_path("/a/b/c.txt/d").await?.is_none());
        assert_eq!(tree.calls().resolve, 5);
        Ok(())
    }

    #[tokio::test]
    async fn trashed_entries_are_invisible() -> anyhow::Result<()> {
        let tree = MemoryTree::new();
        let dir = tree.mkdir("/d")?;
        tree.add_file("/d/keep")?;
        tree.add_file("/d/gone")?;
        tree.trash("/d/gone")?;
        assert!(tree.get("/d/gone").is_none());
        let page = tree
            .list_children(&ChildQuery::children_of(&dir.id), None, 10)
            .await?;
        assert_eq!(page.entries.len(), 1);
        let query = ChildQuery {
            parent_id: dir.id,
            include_trashed: true,
        };
        assert_eq!(tree.list_children(&query, None, 10).await?.entries.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn paginates_with_offsets() -> anyhow::Result<()> {
        let tree = MemoryTree::new();
        let dir = tree.mkdir("/d")?;
        for i in 0..5 {
            tree.add_file(&format!("/d/{i}"))?;
        }
        let query = ChildQuery::children_of(&dir.id);
        let first = tree.list_children(&query, None, 2).await?;
        assert_eq!(first.next_token(), Some("2"));
        let second = tree.list_children(&query, first.next_token(), 2).await?;
        let third = tree.list_children(&query, second.next_token(), 2).await?;
        assert_eq!(third.entries.len(), 1);
        assert_eq!(third.next_token(), None);
        assert!(tree.list_children(&query, Some("bogus"), 2).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn copy_and_upsert() -> anyhow::Result<()> {
        let tree = MemoryTree::new();
        let file = tree.add_file("/src/f")?;
        let dst = tree.mkdir("/dst")?;
        let copied = tree.copy_entry(&file, &dst.id, "g").await?;
        assert_ne!(copied.id, file.id);
        assert_eq!(tree.get("/dst/g"), Some(copied));
        let src_dir = tree.get("/src").unwrap();
        let created = tree
            .upsert_directory(Some(&dst.id), &src_dir.to_template("sub"), None)
            .await?;
        assert_eq!(tree.get("/dst/sub"), Some(created.clone()));
        let reused = tree
            .upsert_directory(Some(&dst.id), &src_dir.to_template("sub"), Some(&created))
            .await?;
        assert_eq!(reused, created);
        // no parent means the root
        tree.upsert_directory(None, &src_dir.to_template("top"), None)
            .await?;
        assert!(tree.get("/top").is_some());
        assert_eq!(
            tree.calls(),
            Calls {
                resolve: 0,
                list: 0,
                copy: 1,
                upsert: 3
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn copy_failures() -> anyhow::Result<()> {
        let tree = MemoryTree::new();
        let file = tree.add_file("/f")?;
        let form = tree.add_uncopyable("/form")?;
        let dir = tree.mkdir("/d")?;
        assert!(tree.copy_entry(&file, "missing", "x").await.is_err());
        assert!(tree.copy_entry(&file, &file.id, "x").await.is_err());
        assert!(tree.copy_entry(&dir, &dir.id, "x").await.is_err());
        assert!(tree.copy_entry(&form, &dir.id, "x").await.is_err());
        tree.fail_copies_named("f");
        assert!(tree.copy_entry(&file, &dir.id, "x").await.is_err());
        assert!(tree.children("/d").is_empty());
        Ok(())
    }

    #[test]
    fn json_round_trip_keeps_structure() -> anyhow::Result<()> {
        let tree = MemoryTree::new();
        tree.add_file("/a/b.txt")?;
        tree.add_uncopyable("/a/form")?;
        let restored = MemoryTree::from_json(&tree.to_json()?)?;
        assert_eq!(restored.paths(), vec!["/a", "/a/b.txt", "/a/form"]);
        assert_eq!(restored.get("/a/form").map(|e| e.copyable), Some(false));
        // fresh ids never collide with loaded ones
        let added = restored.add_file("/a/c.txt")?;
        assert_eq!(
            restored
                .snapshot()
                .nodes
                .iter()
                .filter(|node| node.entry.id == added.id)
                .count(),
            1
        );
        Ok(())
    }

    #[test]
    fn minimal_json_gets_a_root() -> anyhow::Result<()> {
        let tree = MemoryTree::from_json(
            r#"{"nodes": [{"id": "d1", "name": "docs", "is_dir": true, "parent": "root"},
                          {"id": "f1", "name": "a.txt", "is_dir": false, "parent": "d1"}]}"#,
        )?;
        assert_eq!(tree.paths(), vec!["/docs", "/docs/a.txt"]);
        assert!(tree.get("/docs/a.txt").is_some_and(|e| e.copyable));
        Ok(())
    }
}
