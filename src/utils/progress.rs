use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const RUNNING_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
const DONE_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} {msg}";

fn style(template: &str) -> Option<ProgressStyle> {
    ProgressStyle::default_bar()
        .template(template)
        .ok()
        .map(|s| s.progress_chars("#>-"))
}

/// One bar for a whole batch, advanced once per finished filing.
#[derive(Clone)]
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new(total: u64, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(total)
        } else {
            ProgressBar::hidden()
        };
        if let Some(s) = style(RUNNING_TEMPLATE) {
            bar.set_style(s);
        }
        if visible {
            bar.enable_steady_tick(Duration::from_millis(100));
        }
        Self { bar }
    }

    pub fn advance(&self, filing_id: &str, ok: bool) {
        let mark = if ok { "✓" } else { "✗" };
        self.bar.set_message(format!("{} {}", mark, filing_id));
        self.bar.inc(1);
    }

    pub fn finish(&self, succeeded: usize, failed: usize) {
        if let Some(s) = style(DONE_TEMPLATE) {
            self.bar.set_style(s);
        }
        self.bar
            .finish_with_message(format!("Complete: {} ok, {} failed", succeeded, failed));
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_still_counts() {
        let progress = BatchProgress::new(3, false);
        progress.advance("081220230512582935", true);
        progress.advance("081220230512593540", false);
        assert_eq!(progress.position(), 2);
        progress.finish(1, 1);
    }
}
