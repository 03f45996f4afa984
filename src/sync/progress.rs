// reddit-transfer/src/sync/progress.rs
use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{prefix:>24.cyan.bold} [{bar:40}] {pos}/{len} {wide_msg}";

/// Per-item progress for one write phase. Nothing is drawn for an empty phase
/// or when stderr is not a terminal.
pub(crate) fn item_bar(len: usize, label: String) -> ProgressBar {
    if len == 0 {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    bar.set_prefix(label);
    bar
}
