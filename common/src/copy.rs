use tracing::instrument;

use crate::entry::{ChildQuery, Entry};
use crate::error::{CopyError, TransportContext};
use crate::filter::HiddenPolicy;
use crate::path;
use crate::progress::Progress;
use crate::remote::Remote;
use crate::resolve;

pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Error type for copy operations that preserves operation summary even on failure.
///
/// # Logging Convention
/// The Display implementation shows the full error chain, so you can log it with any format
/// specifier:
/// ```ignore
/// tracing::error!("operation failed: {}", &error);
/// tracing::error!("operation failed: {:#}", &error);
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct Error {
    #[source]
    pub source: CopyError,
    pub summary: Summary,
}

impl Error {
    #[must_use]
    pub fn new(source: CopyError, summary: Summary) -> Self {
        Error { source, summary }
    }
}

impl From<CopyError> for Error {
    fn from(source: CopyError) -> Self {
        Error::new(source, Default::default())
    }
}

/// How independent copies (top-level sources, children of one page) are scheduled.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, serde::Serialize, serde::Deserialize,
)]
pub enum ConcurrencyMode {
    /// Each copy is awaited before the next one starts
    Sequential,
    /// All copies are started at once and joined before returning
    #[default]
    FanOut,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub recursive: bool,
    pub allow_duplicates: bool,
    pub hidden: HiddenPolicy,
    pub page_size: u32,
    pub concurrency: ConcurrencyMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            recursive: false,
            allow_duplicates: false,
            hidden: HiddenPolicy::dot_files(),
            page_size: DEFAULT_PAGE_SIZE,
            concurrency: ConcurrencyMode::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Summary {
    pub files_copied: usize,
    pub directories_created: usize,
    pub directories_reused: usize,
    pub hidden_skipped: usize,
    pub pages_listed: usize,
    /// branches that failed and were abandoned
    pub failures: usize,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            files_copied: self.files_copied + other.files_copied,
            directories_created: self.directories_created + other.directories_created,
            directories_reused: self.directories_reused + other.directories_reused,
            hidden_skipped: self.hidden_skipped + other.hidden_skipped,
            pages_listed: self.pages_listed + other.pages_listed,
            failures: self.failures + other.failures,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "files copied: {}\n\
            directories created: {}\n\
            directories reused: {}\n\
            hidden skipped: {}\n\
            pages listed: {}\n\
            failures: {}",
            self.files_copied,
            self.directories_created,
            self.directories_reused,
            self.hidden_skipped,
            self.pages_listed,
            self.failures,
        )
    }
}

/// Result of copying a single entry.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// The created entry; `None` for a directory subtree.
    pub entry: Option<Entry>,
    pub summary: Summary,
}

/// Consulted before fetching each subsequent page of a directory listing.
#[async_trait::async_trait]
pub trait PageGate: Send + Sync {
    async fn next_page(&self) -> bool;
}

/// Gate that never interrupts a listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysContinue;

#[async_trait::async_trait]
impl PageGate for AlwaysContinue {
    async fn next_page(&self) -> bool {
        true
    }
}

/// Source paths followed by a single destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub sources: Vec<String>,
    pub destination: String,
}

impl CopyRequest {
    /// The trailing argument is the destination, everything before it a source.
    pub fn from_args(paths: &[String]) -> Result<Self, CopyError> {
        match paths.split_last() {
            Some((destination, sources)) if !sources.is_empty() => Ok(Self {
                sources: sources.to_vec(),
                destination: destination.clone(),
            }),
            _ => Err(CopyError::Usage),
        }
    }
}

/// Copies entries within one remote tree.
///
/// Cheap to clone: every field is shared, clones are handed to spawned copy tasks.
#[derive(Clone)]
pub struct Copier {
    remote: Remote,
    settings: std::sync::Arc<Settings>,
    progress: std::sync::Arc<Progress>,
    gate: std::sync::Arc<dyn PageGate>,
}

impl std::fmt::Debug for Copier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Copier")
            .field("remote", &self.remote)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Copier {
    pub fn new(remote: Remote, settings: Settings, progress: std::sync::Arc<Progress>) -> Self {
        Self {
            remote,
            settings: std::sync::Arc::new(settings),
            progress,
            gate: std::sync::Arc::new(AlwaysContinue),
        }
    }

    #[must_use]
    pub fn with_gate(mut self, gate: std::sync::Arc<dyn PageGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    fn record_failure(&self, src: &str, dst: &str, error: Error, summary: &mut Summary) {
        tracing::error!("copy: {:?} -> {:?} failed with: {:#}", src, dst, &error);
        self.progress.failures.inc();
        *summary = *summary + error.summary;
        summary.failures += 1;
    }

    /// Validates `request` and copies every source to its destination.
    ///
    /// Validation failures abort the whole request before any remote mutation. Failures of
    /// individual sources are logged and counted in [`Summary::failures`] but do not stop the
    /// remaining sources.
    #[instrument(skip(self))]
    pub async fn copy(&self, request: &CopyRequest) -> Result<Summary, Error> {
        let mut nesting_count = usize::from(request.sources.len() >= 2);
        let mut sources = Vec::with_capacity(request.sources.len());
        for src in &request.sources {
            let entry = self
                .remote
                .resolve_by_path(src)
                .await
                .transport_context(|| format!("failed resolving source {src:?}"))?
                .ok_or_else(|| CopyError::SourceNotFound(src.clone()))?;
            if entry.is_dir {
                nesting_count += 1;
            }
            if !entry.copyable && !entry.is_dir {
                return Err(CopyError::NotCopyable(src.clone()).into());
            }
            if entry.is_dir && !self.settings.recursive {
                return Err(CopyError::DirectoryNotAllowed(src.clone()).into());
            }
            sources.push((src.clone(), entry));
        }
        let dst = &request.destination;
        let dst_entry = self
            .remote
            .resolve_by_path(dst)
            .await
            .transport_context(|| format!("failed resolving destination {dst:?}"))?;
        if nesting_count > 1 && dst_entry.as_ref().is_some_and(|entry| !entry.is_dir) {
            return Err(CopyError::AmbiguousMultiDestination(dst.clone()).into());
        }
        tracing::debug!("copying {} source(s) to {:?}", sources.len(), dst);
        let mut summary = Summary::default();
        match self.settings.concurrency {
            ConcurrencyMode::Sequential => {
                for (src, entry) in sources {
                    match self.copy_one(&entry, dst).await {
                        Ok(outcome) => summary = summary + outcome.summary,
                        Err(error) => self.record_failure(&src, dst, error, &mut summary),
                    }
                }
            }
            ConcurrencyMode::FanOut => {
                let mut sources = sources.into_iter();
                // the first source materializes a missing destination, the rest find it in place
                if dst_entry.is_none()
                    && request.sources.len() > 1
                    && let Some((src, entry)) = sources.next()
                {
                    match self.copy_one(&entry, dst).await {
                        Ok(outcome) => summary = summary + outcome.summary,
                        Err(error) => self.record_failure(&src, dst, error, &mut summary),
                    }
                }
                let mut join_set = tokio::task::JoinSet::new();
                for (src, entry) in sources {
                    let copier = self.clone();
                    let dst = dst.clone();
                    let do_copy = || async move {
                        let result = copier.copy_one(&entry, &dst).await;
                        (src, result)
                    };
                    join_set.spawn(do_copy());
                }
                while let Some(res) = join_set.join_next().await {
                    match res {
                        Ok((_, Ok(outcome))) => summary = summary + outcome.summary,
                        Ok((src, Err(error))) => self.record_failure(&src, dst, error, &mut summary),
                        Err(error) => {
                            tracing::error!("copy task for {:?} failed: {}", dst, &error);
                            self.progress.failures.inc();
                            summary.failures += 1;
                        }
                    }
                }
            }
        }
        Ok(summary)
    }

    /// Copies `source` to `dst`, recursing into directories.
    ///
    /// A file is a single remote copy call. A directory is materialized (or an existing
    /// destination directory reused) and its children are copied page by page to
    /// `dst/<child name>`. Child failures are logged and counted, they never fail the
    /// directory itself.
    #[instrument(skip(self))]
    #[async_recursion::async_recursion]
    pub async fn copy_one(&self, source: &Entry, dst: &str) -> Result<Outcome, Error> {
        let _ops_guard = self.progress.ops.guard();
        let destination = resolve::resolve_destination(&self.remote, dst).await?;
        let target = destination.target_for(source, self.settings.allow_duplicates)?;
        if !source.is_dir {
            if !source.copyable {
                return Err(CopyError::NotCopyable(source.name.clone()).into());
            }
            let parent_id = target
                .parent_id
                .ok_or_else(|| CopyError::NoSuchParent(destination.parent_path.clone()))?;
            let entry = self
                .remote
                .copy_entry(source, &parent_id, &target.name)
                .await
                .transport_context(|| format!("failed copying {:?} to {:?}", source.name, dst))?;
            tracing::info!("copied {:?} -> {:?} ({})", source.name, dst, entry.id);
            self.progress.files_copied.inc();
            return Ok(Outcome {
                entry: Some(entry),
                summary: Summary {
                    files_copied: 1,
                    ..Default::default()
                },
            });
        }
        if !self.settings.recursive {
            return Err(CopyError::DirectoryNotAllowed(source.name.clone()).into());
        }
        // only an existing directory can be reused, anything else gets a new node
        let existing = destination.existing_directory();
        if existing.is_none() && target.parent_id.is_none() {
            tracing::warn!(
                "parent {:?} of {:?} not found, the remote places the directory at its root",
                destination.parent_path,
                dst
            );
        }
        let template = source.to_template(&target.name);
        let directory = self
            .remote
            .upsert_directory(target.parent_id.as_deref(), &template, existing)
            .await
            .transport_context(|| format!("cannot create directory {dst:?}"))?;
        let mut summary = if existing.is_some() {
            tracing::debug!("{:?} already exists, reusing {}", dst, directory.id);
            self.progress.directories_reused.inc();
            Summary {
                directories_reused: 1,
                ..Default::default()
            }
        } else {
            tracing::info!("created directory {:?} ({})", dst, directory.id);
            self.progress.directories_created.inc();
            Summary {
                directories_created: 1,
                ..Default::default()
            }
        };
        let scope = self.progress.tasks.scope();
        let query = ChildQuery::children_of(&source.id);
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .remote
                .list_children(&query, page_token.as_deref(), self.settings.page_size)
                .await
                .transport_context(|| format!("failed listing children of {:?}", source.name))
                .map_err(|err| Error::new(err, summary))?;
            self.progress.pages_listed.inc();
            summary.pages_listed += 1;
            scope.begin(page.entries.len());
            let mut join_set = tokio::task::JoinSet::new();
            for child in &page.entries {
                if let Some(pattern) = self.settings.hidden.is_hidden(&child.name, child.is_dir) {
                    tracing::debug!("skipping hidden {:?} (matches {:?})", child.name, pattern);
                    self.progress.hidden_skipped.inc();
                    summary.hidden_skipped += 1;
                    scope.done();
                    continue;
                }
                let child_dst = path::join(dst, &child.name);
                match self.settings.concurrency {
                    ConcurrencyMode::Sequential => {
                        match self.copy_one(child, &child_dst).await {
                            Ok(outcome) => summary = summary + outcome.summary,
                            Err(error) => {
                                self.record_failure(&child.name, &child_dst, error, &mut summary)
                            }
                        }
                        scope.done();
                    }
                    ConcurrencyMode::FanOut => {
                        let copier = self.clone();
                        let child = child.clone();
                        let do_copy = || async move {
                            let result = copier.copy_one(&child, &child_dst).await;
                            (child.name, child_dst, result)
                        };
                        join_set.spawn(do_copy());
                    }
                }
            }
            while let Some(res) = join_set.join_next().await {
                match res {
                    Ok((_, _, Ok(outcome))) => summary = summary + outcome.summary,
                    Ok((name, child_dst, Err(error))) => {
                        self.record_failure(&name, &child_dst, error, &mut summary)
                    }
                    Err(error) => {
                        tracing::error!("copy task under {:?} failed: {}", dst, &error);
                        self.progress.failures.inc();
                        summary.failures += 1;
                    }
                }
                scope.done();
            }
            match page.next_token() {
                Some(token) => page_token = Some(token.to_string()),
                None => break,
            }
            if !self.gate.next_page().await {
                tracing::warn!("listing of {:?} stopped before the next page", source.name);
                break;
            }
        }
        Ok(Outcome {
            entry: None,
            summary,
        })
    }
}
