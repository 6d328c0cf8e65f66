//! Copy engine for remote hierarchical object stores
//!
//! Copies files and directory trees from one location to another inside a remote store that
//! is only reachable through a paginated, rate-limited API (see [`remote::RemoteTree`]).
//!
//! # Copy Semantics
//!
//! - A file copied onto a path that does not exist is created under that name.
//! - A file copied onto an existing directory is placed inside it under its own name.
//! - A file copied onto an existing file fails unless duplicates are allowed, in which case a
//!   second entry with the same name is created.
//! - Directories require `recursive`. The destination directory is created, or reused if it
//!   already exists, then children are copied page by page.
//! - Several sources, or any directory source next to another source, can only target a
//!   directory (or a path that does not exist yet).
//!
//! # Error Handling
//!
//! Validation errors abort the request before anything is created. Once copying started, a
//! failure only abandons its own branch: it is logged, counted in [`copy::Summary::failures`]
//! and the remaining sources and children carry on.
//!
//! # Concurrency
//!
//! [`copy::ConcurrencyMode::FanOut`] spawns one task per source and per child of each listing
//! page; [`copy::ConcurrencyMode::Sequential`] awaits them one by one. In both modes every
//! remote call waits on the single shared [`throttle::RateLimiter`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let tree = Arc::new(common::memory::MemoryTree::new());
//! let remote = common::remote::Remote::new(tree, Arc::new(throttle::RateLimiter::per_second(20)));
//! let copier = common::copy::Copier::new(
//!     remote,
//!     common::copy::Settings {
//!         recursive: true,
//!         ..Default::default()
//!     },
//!     Arc::new(common::progress::Progress::new()),
//! );
//! let request = common::copy::CopyRequest::from_args(&["/proj".into(), "/archive/proj".into()])?;
//! let summary = copier.copy(&request).await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod copy;
pub mod entry;
pub mod error;
pub mod filter;
pub mod memory;
pub mod path;
pub mod progress;
pub mod remote;
pub mod resolve;

#[cfg(test)]
mod testutils;

pub use config::{OutputConfig, ProgressSettings, ProgressType, RuntimeConfig, ThrottleConfig};
pub use copy::{ConcurrencyMode, CopyRequest, Copier, Summary};
pub use error::CopyError;

struct ProgressTracker {
    done: std::sync::Arc<(std::sync::Mutex<bool>, std::sync::Condvar)>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ProgressTracker {
    fn new(
        progress: std::sync::Arc<progress::Progress>,
        progress_type: ProgressType,
        delay: std::time::Duration,
    ) -> Self {
        let done = std::sync::Arc::new((std::sync::Mutex::new(false), std::sync::Condvar::new()));
        let handle = {
            let done = done.clone();
            std::thread::spawn(move || {
                let mut printer = progress::ProgressPrinter::new(&progress);
                let bar = (progress_type == ProgressType::ProgressBar).then(|| {
                    let bar = indicatif::ProgressBar::new_spinner();
                    bar.set_style(
                        indicatif::ProgressStyle::with_template("{spinner} [{elapsed}] {msg}")
                            .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
                    );
                    bar
                });
                let (lock, cvar) = &*done;
                let mut is_done = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                loop {
                    match &bar {
                        Some(bar) => {
                            bar.set_message(printer.short());
                            bar.tick();
                        }
                        None => eprintln!("{}", printer.print()),
                    }
                    if *is_done {
                        break;
                    }
                    is_done = cvar
                        .wait_timeout(is_done, delay)
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .0;
                }
                if let Some(bar) = bar {
                    bar.finish_and_clear();
                }
            })
        };
        Self {
            done,
            handle: Some(handle),
        }
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.done;
        *lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = true;
        cvar.notify_one();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                eprintln!("progress thread panicked");
            }
        }
    }
}

fn init_logging(output: &OutputConfig) {
    let filter = if output.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(output.log_level()))
    };
    // logs go to stdout, progress to stderr
    let res = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stdout()))
        .with_writer(std::io::stdout)
        .try_init();
    if let Err(error) = res {
        eprintln!("failed to initialize logging: {error}");
    }
}

/// Runs `func` on a fresh tokio runtime with logging and optional progress reporting.
///
/// Returns `None` if `func` failed; the error has been reported already.
pub fn run<Fut>(
    progress_settings: Option<ProgressSettings>,
    progress: std::sync::Arc<progress::Progress>,
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: impl FnOnce() -> Fut,
) -> Option<Summary>
where
    Fut: std::future::Future<Output = anyhow::Result<Summary>>,
{
    init_logging(&output);
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(error) => {
            tracing::error!("failed to create runtime: {}", &error);
            return None;
        }
    };
    let tracker = match progress_settings.map(|settings| settings.resolve()).transpose() {
        Ok(resolved) => resolved.map(|(progress_type, delay)| {
            ProgressTracker::new(progress.clone(), progress_type, delay)
        }),
        Err(error) => {
            tracing::error!("{:#}", &error);
            return None;
        }
    };
    let res = rt.block_on(func());
    drop(tracker);
    match res {
        Ok(summary) => {
            if output.print_summary || output.verbose > 0 {
                println!("{summary}");
            }
            Some(summary)
        }
        Err(error) => {
            tracing::error!("{:#}", &error);
            None
        }
    }
}
