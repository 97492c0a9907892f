//! Component progress bar for the command-line interface

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use voxpart::ProgressCallback;

const TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} components";

/// Creates a progress bar counting components
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(TEMPLATE) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Progress bar plus the callback that drives it
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    pub fn new(message: &str) -> Self {
        eprintln!("{message}");
        Self {
            pb: create_progress_bar(0),
        }
    }

    /// Callback for `SegmentOptions::progress`
    pub fn callback(&self) -> ProgressCallback {
        let pb = self.pb.clone();
        Arc::new(move |done, total| {
            if pb.length().unwrap_or(0) != total {
                pb.set_length(total);
            }
            pb.set_position(done);
            if done >= total {
                pb.finish_and_clear();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_progress_bar_template() {
        let pb = create_progress_bar(10);
        assert_eq!(pb.length().unwrap(), 10);
        pb.set_position(3);
        pb.finish();
    }

    #[test]
    fn test_callback_tracks_components() {
        let manager = ProgressManager::new("Test run");
        let callback = manager.callback();
        callback(1, 4);
        assert_eq!(manager.pb.length().unwrap(), 4);
        assert_eq!(manager.pb.position(), 1);
        callback(4, 4);
        assert!(manager.pb.is_finished());
    }
}
