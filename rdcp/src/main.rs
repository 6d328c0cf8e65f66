use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rdcp",
    version,
    about = "Copy files and directories inside a remote drive",
    long_about = "`rdcp` copies files and directory trees from one location to another inside a remote \
hierarchical store, paging through directory listings and throttling remote calls.

The remote tree is read from and written back to a JSON snapshot given with --store.

EXAMPLE:
    # Copy a report into an existing directory
    rdcp --store drive.json /docs/report.txt /backup/

    # Copy a directory tree, 50 entries per listing page
    rdcp --store drive.json -r --page-size 50 /proj /archive/proj --summary"
)]
struct Args {
    // Copy options
    /// Copy directories recursively
    #[arg(short, long, help_heading = "Copy options")]
    recursive: bool,

    /// Create another entry when the destination file already exists
    ///
    /// The remote store permits several entries with the same name under one parent.
    #[arg(long, help_heading = "Copy options")]
    allow_duplicates: bool,

    /// Include hidden entries (names starting with a dot) when copying directories
    #[arg(long, help_heading = "Copy options")]
    hidden: bool,

    /// Additional glob pattern for child names to skip (can be specified multiple times)
    ///
    /// Patterns match a single name; a trailing / matches only directories.
    #[arg(long, value_name = "PATTERN", action = clap::ArgAction::Append, help_heading = "Copy options")]
    hidden_pattern: Vec<String>,

    /// Ask before fetching each subsequent page of a directory listing
    #[arg(long, help_heading = "Copy options")]
    prompt_pages: bool,

    // Remote store
    /// JSON snapshot of the remote tree, updated in place
    #[arg(long, value_name = "FILE", help_heading = "Remote store")]
    store: std::path::PathBuf,

    /// Maximum entries requested per listing page
    #[arg(long, default_value_t = common::copy::DEFAULT_PAGE_SIZE, value_name = "N", help_heading = "Remote store")]
    page_size: u32,

    // Progress & output
    /// Show progress
    #[arg(long, help_heading = "Progress & output")]
    progress: bool,

    /// Toggles the type of progress to show
    ///
    /// If specified, --progress flag is implied.
    ///
    /// Options are: `ProgressBar` (animated progress bar), `TextUpdates` (appropriate for logging), Auto (default, will
    /// choose between `ProgressBar` or `TextUpdates` depending on the type of terminal attached to stderr)
    #[arg(long, value_name = "TYPE", help_heading = "Progress & output")]
    progress_type: Option<common::ProgressType>,

    /// Sets the delay between progress updates
    ///
    /// - For the interactive (--progress-type=ProgressBar), the default is 200ms.
    /// - For the non-interactive (--progress-type=TextUpdates), the default is 10s.
    ///
    /// If specified, --progress flag is implied.
    ///
    /// This option accepts a human readable duration, e.g. "200ms", "10s", "5min" etc.
    #[arg(long, value_name = "DELAY", help_heading = "Progress & output")]
    progress_delay: Option<String>,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Performance & throttling
    /// Throttle the number of remote calls per second, 0 means no throttle
    #[arg(
        long,
        default_value_t = throttle::DEFAULT_OPS_PER_SECOND,
        value_name = "N",
        help_heading = "Performance & throttling"
    )]
    ops_per_second: usize,

    /// Run independent copies one after another or all at once
    #[arg(long, value_enum, default_value_t, value_name = "MODE", help_heading = "Performance & throttling")]
    concurrency: common::ConcurrencyMode,

    // Advanced settings
    /// Number of worker threads, 0 means number of cores
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    // ARGUMENTS
    /// Source path(s) followed by the destination path
    #[arg()]
    paths: Vec<String>,
}

/// Asks on the terminal whether the next listing page should be fetched.
struct StdinGate;

#[async_trait::async_trait]
impl common::copy::PageGate for StdinGate {
    async fn next_page(&self) -> bool {
        let answer = tokio::task::spawn_blocking(|| {
            eprint!("fetch more results? [Y/n] ");
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|read| (read, line))
        })
        .await;
        match answer {
            // end of input stops the listing
            Ok(Ok((0, _))) => false,
            Ok(Ok((_, line))) => !line.trim().to_lowercase().starts_with('n'),
            Ok(Err(error)) => {
                tracing::warn!("failed reading answer: {}", &error);
                false
            }
            Err(error) => {
                tracing::warn!("prompt task failed: {}", &error);
                false
            }
        }
    }
}

fn hidden_policy(args: &Args) -> Result<common::filter::HiddenPolicy> {
    let mut policy = if args.hidden {
        common::filter::HiddenPolicy::include_all()
    } else {
        common::filter::HiddenPolicy::dot_files()
    };
    for pattern in &args.hidden_pattern {
        policy.add_pattern(pattern)?;
    }
    Ok(policy)
}

#[instrument(skip(progress))]
async fn async_main(
    args: Args,
    progress: std::sync::Arc<common::progress::Progress>,
) -> Result<common::Summary> {
    let request = common::CopyRequest::from_args(&args.paths)?;
    let throttle = common::ThrottleConfig {
        ops_per_second: args.ops_per_second,
        page_size: args.page_size,
    };
    throttle.validate().map_err(|error| anyhow!(error))?;
    let settings = common::copy::Settings {
        recursive: args.recursive,
        allow_duplicates: args.allow_duplicates,
        hidden: hidden_policy(&args)?,
        page_size: throttle.page_size,
        concurrency: args.concurrency,
    };
    let json = tokio::fs::read_to_string(&args.store)
        .await
        .with_context(|| format!("failed reading store {:?}", &args.store))?;
    let tree = std::sync::Arc::new(common::memory::MemoryTree::from_json(&json)?);
    let remote = common::remote::Remote::new(tree.clone(), std::sync::Arc::new(throttle.limiter()));
    let mut copier = common::Copier::new(remote, settings, progress);
    if args.prompt_pages {
        copier = copier.with_gate(std::sync::Arc::new(StdinGate));
    }
    let result = copier.copy(&request).await;
    // partial copies are persisted as well
    if tree.calls().mutations() > 0 {
        tokio::fs::write(&args.store, tree.to_json()?)
            .await
            .with_context(|| format!("failed writing store {:?}", &args.store))?;
    }
    let summary = match result {
        Ok(summary) => summary,
        Err(error) => {
            // rejected requests did no work, there is nothing to summarize
            if args.summary && !error.source.is_validation() {
                return Err(anyhow!("{}\n\n{}", error, &error.summary));
            }
            return Err(anyhow!("{}", error));
        }
    };
    if summary.failures > 0 {
        if args.summary {
            return Err(anyhow!("rdcp encountered errors\n\n{}", &summary));
        }
        return Err(anyhow!("rdcp encountered errors"));
    }
    Ok(summary)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let progress = std::sync::Arc::new(common::progress::Progress::new());
    let func = {
        let args = args.clone();
        let progress = progress.clone();
        || async_main(args, progress)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: 0,
    };
    let res = common::run(
        if args.progress || args.progress_type.is_some() || args.progress_delay.is_some() {
            Some(common::ProgressSettings {
                progress_type: args.progress_type.unwrap_or_default(),
                progress_delay: args.progress_delay,
            })
        } else {
            None
        },
        progress,
        output,
        runtime,
        func,
    );
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
