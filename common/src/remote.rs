//! Remote tree access
//!
//! The copy engine only talks to the remote store through [`RemoteTree`]. Every call goes
//! through [`Remote`], which waits on the shared rate limiter first.

use crate::entry::{ChildQuery, DirectoryTemplate, Entry, Page};

/// Abstract paginated list/get/insert interface of the remote store.
///
/// "Not found" from [`RemoteTree::resolve_by_path`] is `Ok(None)`; every `Err` is a transport
/// failure.
#[async_trait::async_trait]
pub trait RemoteTree: Send + Sync {
    async fn resolve_by_path(&self, path: &str) -> anyhow::Result<Option<Entry>>;

    async fn list_children(
        &self,
        query: &ChildQuery,
        page_token: Option<&str>,
        page_size: u32,
    ) -> anyhow::Result<Page>;

    async fn copy_entry(&self, source: &Entry, parent_id: &str, name: &str)
        -> anyhow::Result<Entry>;

    /// Creates the directory if `existing` is `None`, reuses `existing` otherwise.
    ///
    /// A `None` parent leaves placement to the remote (its root).
    async fn upsert_directory(
        &self,
        parent_id: Option<&str>,
        template: &DirectoryTemplate,
        existing: Option<&Entry>,
    ) -> anyhow::Result<Entry>;
}

/// Rate-limited handle to a remote tree, cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct Remote {
    tree: std::sync::Arc<dyn RemoteTree>,
    limiter: std::sync::Arc<throttle::RateLimiter>,
}

impl std::fmt::Debug for Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Remote")
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl Remote {
    pub fn new(
        tree: std::sync::Arc<dyn RemoteTree>,
        limiter: std::sync::Arc<throttle::RateLimiter>,
    ) -> Self {
        Self { tree, limiter }
    }

    pub async fn resolve_by_path(&self, path: &str) -> anyhow::Result<Option<Entry>> {
        self.limiter.tick().await;
        tracing::trace!("resolve {:?}", path);
        self.tree.resolve_by_path(path).await
    }

    pub async fn list_children(
        &self,
        query: &ChildQuery,
        page_token: Option<&str>,
        page_size: u32,
    ) -> anyhow::Result<Page> {
        self.limiter.tick().await;
        tracing::trace!("list {} (page token: {:?})", query.expression(), page_token);
        self.tree.list_children(query, page_token, page_size).await
    }

    pub async fn copy_entry(
        &self,
        source: &Entry,
        parent_id: &str,
        name: &str,
    ) -> anyhow::Result<Entry> {
        self.limiter.tick().await;
        tracing::trace!("copy {:?} into {:?} as {:?}", source.id, parent_id, name);
        self.tree.copy_entry(source, parent_id, name).await
    }

    pub async fn upsert_directory(
        &self,
        parent_id: Option<&str>,
        template: &DirectoryTemplate,
        existing: Option<&Entry>,
    ) -> anyhow::Result<Entry> {
        self.limiter.tick().await;
        tracing::trace!("upsert directory {:?} under {:?}", template.name, parent_id);
        self.tree.upsert_directory(parent_id, template, existing).await
    }
}
