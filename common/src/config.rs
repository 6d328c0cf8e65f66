//! Configuration types for runtime and execution settings

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Throttling configuration for remote calls
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    /// Remote operations per second (0 = no throttle)
    pub ops_per_second: usize,
    /// Maximum entries requested per listing page
    pub page_size: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            ops_per_second: throttle::DEFAULT_OPS_PER_SECOND,
            page_size: crate::copy::DEFAULT_PAGE_SIZE,
        }
    }
}

impl ThrottleConfig {
    /// Validate configuration and return errors if invalid
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("page_size must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Builds the shared limiter, must be called from within the runtime.
    pub fn limiter(&self) -> throttle::RateLimiter {
        throttle::RateLimiter::per_second(self.ops_per_second)
    }
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

impl OutputConfig {
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "off";
        }
        match self.verbose {
            0 => "error",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ProgressType {
    /// Pick `ProgressBar` when stderr is a terminal, `TextUpdates` otherwise
    #[default]
    Auto,
    /// Animated progress bar
    ProgressBar,
    /// Periodic text reports, appropriate for logging
    TextUpdates,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressSettings {
    pub progress_type: ProgressType,
    /// Human readable delay between updates, e.g. "200ms" or "10s"
    pub progress_delay: Option<String>,
}

impl ProgressSettings {
    /// Resolved display type and update delay.
    pub fn resolve(&self) -> anyhow::Result<(ProgressType, std::time::Duration)> {
        use std::io::IsTerminal;
        let progress_type = match self.progress_type {
            ProgressType::Auto => {
                if std::io::stderr().is_terminal() {
                    ProgressType::ProgressBar
                } else {
                    ProgressType::TextUpdates
                }
            }
            other => other,
        };
        let delay = match &self.progress_delay {
            Some(delay) => humantime::parse_duration(delay)
                .map_err(|err| anyhow::anyhow!("invalid progress delay {delay:?}: {err}"))?,
            None if progress_type == ProgressType::ProgressBar => {
                std::time::Duration::from_millis(200)
            }
            None => std::time::Duration::from_secs(10),
        };
        Ok((progress_type, delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels() {
        let mut output = OutputConfig::default();
        assert_eq!(output.log_level(), "error");
        output.verbose = 2;
        assert_eq!(output.log_level(), "debug");
        output.verbose = 7;
        assert_eq!(output.log_level(), "trace");
        output.quiet = true;
        assert_eq!(output.log_level(), "off");
    }

    #[test]
    fn throttle_validation() {
        assert!(ThrottleConfig::default().validate().is_ok());
        let config = ThrottleConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn progress_delay_parsing() -> anyhow::Result<()> {
        let settings = ProgressSettings {
            progress_type: ProgressType::TextUpdates,
            progress_delay: Some("5s".to_string()),
        };
        assert_eq!(
            settings.resolve()?,
            (ProgressType::TextUpdates, std::time::Duration::from_secs(5))
        );
        let settings = ProgressSettings {
            progress_type: ProgressType::ProgressBar,
            progress_delay: None,
        };
        assert_eq!(settings.resolve()?.1, std::time::Duration::from_millis(200));
        let settings = ProgressSettings {
            progress_delay: Some("soon".to_string()),
            ..Default::default()
        };
        assert!(settings.resolve().is_err());
        Ok(())
    }
}
