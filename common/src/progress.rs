use tracing::{event, instrument, Level};

#[derive(Debug)]
pub struct TlsCounter {
    // mutex is used primarily from one thread, so it's not a bottleneck
    count: thread_local::ThreadLocal<std::sync::Mutex<u64>>,
}

impl TlsCounter {
    pub fn new() -> Self {
        Self {
            count: thread_local::ThreadLocal::new(),
        }
    }

    pub fn add(&self, value: u64) {
        let mutex = self.count.get_or(|| std::sync::Mutex::new(0));
        let mut guard = mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += value;
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn get(&self) -> u64 {
        self.count.iter().fold(0, |x, y| {
            x + *y.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        })
    }
}

impl Default for TlsCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct ProgressCounter {
    started: TlsCounter,
    finished: TlsCounter,
}

impl Default for ProgressCounter {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ProgressGuard<'a> {
    progress: &'a ProgressCounter,
}

impl<'a> ProgressGuard<'a> {
    pub fn new(progress: &'a ProgressCounter) -> Self {
        progress.started.inc();
        Self { progress }
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.progress.finished.inc();
    }
}

pub struct Status {
    pub started: u64,
    pub finished: u64,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self {
            started: TlsCounter::new(),
            finished: TlsCounter::new(),
        }
    }

    pub fn guard(&self) -> ProgressGuard<'_> {
        ProgressGuard::new(self)
    }

    #[instrument]
    pub fn get(&self) -> Status {
        let mut status = Status {
            started: self.started.get(),
            finished: self.finished.get(),
        };
        if status.finished > status.started {
            event!(
                Level::DEBUG,
                "Progress inversion - started: {}, finished {}",
                status.started,
                status.finished
            );
            status.started = status.finished;
        }
        status
    }
}

/// Counts in-flight sub-copies of directory traversals.
///
/// Every directory copy registers each listed page with [`TaskTracker::begin`], marks children
/// with [`TaskTracker::done`] as they complete and calls [`TaskTracker::finish`] once all of its
/// pages were processed.
#[derive(Debug, Default)]
pub struct TaskTracker {
    begun: TlsCounter,
    completed: TlsCounter,
    finished_scopes: TlsCounter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStatus {
    pub pending: u64,
    pub completed: u64,
    pub finished_scopes: u64,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, count: usize) {
        self.begun.add(count as u64);
    }

    pub fn done(&self) {
        self.completed.inc();
    }

    pub fn finish(&self) {
        self.finished_scopes.inc();
    }

    /// Calls [`TaskTracker::finish`] when the returned guard is dropped.
    pub fn scope(&self) -> TaskScope<'_> {
        TaskScope { tracker: self }
    }

    pub fn status(&self) -> TaskStatus {
        let begun = self.begun.get();
        let completed = self.completed.get();
        TaskStatus {
            pending: begun.saturating_sub(completed),
            completed,
            finished_scopes: self.finished_scopes.get(),
        }
    }
}

pub struct TaskScope<'a> {
    tracker: &'a TaskTracker,
}

impl TaskScope<'_> {
    pub fn begin(&self, count: usize) {
        self.tracker.begin(count);
    }

    pub fn done(&self) {
        self.tracker.done();
    }
}

impl Drop for TaskScope<'_> {
    fn drop(&mut self) {
        self.tracker.finish();
    }
}

pub struct Progress {
    pub ops: ProgressCounter,
    pub tasks: TaskTracker,
    pub files_copied: TlsCounter,
    pub directories_created: TlsCounter,
    pub directories_reused: TlsCounter,
    pub hidden_skipped: TlsCounter,
    pub pages_listed: TlsCounter,
    pub failures: TlsCounter,
    start_time: std::time::Instant,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            ops: Default::default(),
            tasks: Default::default(),
            files_copied: Default::default(),
            directories_created: Default::default(),
            directories_reused: Default::default(),
            hidden_skipped: Default::default(),
            pages_listed: Default::default(),
            failures: Default::default(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn get_duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Progress")
            .field("files_copied", &self.files_copied.get())
            .field("directories_created", &self.directories_created.get())
            .field("failures", &self.failures.get())
            .finish_non_exhaustive()
    }
}

pub struct ProgressPrinter<'a> {
    progress: &'a Progress,
    last_ops: u64,
    last_update: std::time::Instant,
}

impl<'a> ProgressPrinter<'a> {
    pub fn new(progress: &'a Progress) -> Self {
        Self {
            progress,
            last_ops: progress.ops.get().finished,
            last_update: std::time::Instant::now(),
        }
    }

    pub fn print(&mut self) -> String {
        let time_now = std::time::Instant::now();
        let ops = self.progress.ops.get();
        let tasks = self.progress.tasks.status();
        let total_duration_secs = self.progress.get_duration().as_secs_f64();
        let curr_duration_secs = (time_now - self.last_update).as_secs_f64();
        let average_ops_rate = ops.finished as f64 / total_duration_secs;
        let current_ops_rate = (ops.finished - self.last_ops) as f64 / curr_duration_secs;
        self.last_ops = ops.finished;
        self.last_update = time_now;
        format!(
            "---------------------\n\
            OPS:\n\
            pending: {:>10}\n\
            queued:  {:>10}\n\
            average: {:>10.2} items/s\n\
            current: {:>10.2} items/s\n\
            -----------------------\n\
            COPIED:\n\
            files:       {:>10}\n\
            directories: {:>10}\n\
            -----------------------\n\
            OTHER:\n\
            reused:      {:>10}\n\
            hidden:      {:>10}\n\
            pages:       {:>10}\n\
            failures:    {:>10}",
            ops.started - ops.finished,
            tasks.pending,
            average_ops_rate,
            current_ops_rate,
            self.progress.files_copied.get(),
            self.progress.directories_created.get(),
            self.progress.directories_reused.get(),
            self.progress.hidden_skipped.get(),
            self.progress.pages_listed.get(),
            self.progress.failures.get(),
        )
    }

    /// Single-line variant used as the progress bar message.
    pub fn short(&self) -> String {
        let ops = self.progress.ops.get();
        format!(
            "pending: {} | files: {} | dirs: {} | failures: {}",
            ops.started - ops.finished,
            self.progress.files_copied.get(),
            self.progress.directories_created.get() + self.progress.directories_reused.get(),
            self.progress.failures.get(),
        )
    }
}
