// src/utils/progress_config.rs

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::env;

const BAR_TEMPLATE: &str = "  {spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";

/// Configuration for progress tracking during a comparison run
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to show the per-phase bars (image prefetch, bucket matching)
    pub detailed: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("PROGRESS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            detailed: env::var("PROGRESS_DETAILED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    /// Create a MultiProgress instance if detailed progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.should_show_detailed() {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }
}

/// Adds a styled phase bar to `multi_progress`, or returns `None` when
/// progress is disabled.
pub fn phase_progress_bar(multi_progress: Option<&MultiProgress>, len: u64, message: &str) -> Result<Option<ProgressBar>> {
    let Some(mp) = multi_progress else {
        return Ok(None);
    };
    let pb = mp.add(ProgressBar::new(len));
    pb.set_style(
        ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .context("Failed to set progress bar style")?
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    pb.set_message(message.to_string());
    Ok(Some(pb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProgressConfig::default();
        assert!(config.enabled);
        assert!(config.detailed);
    }

    #[test]
    fn test_multi_progress_creation() {
        let mut config = ProgressConfig::default();
        assert!(config.create_multi_progress().is_some());

        config.detailed = false;
        assert!(config.create_multi_progress().is_none());

        config.detailed = true;
        config.enabled = false;
        assert!(config.create_multi_progress().is_none());
    }

    #[test]
    fn test_phase_bar_only_when_enabled() {
        assert!(phase_progress_bar(None, 10, "idle").unwrap().is_none());

        let mp = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let pb = phase_progress_bar(Some(&mp), 10, "matching").unwrap().unwrap();
        assert_eq!(pb.length(), Some(10));
    }
}
