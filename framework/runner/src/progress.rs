use indicatif::{ProgressBar, ProgressStyle};

/// A progress bar over the configurations of a sweep.
///
/// Hidden when `enabled` is false, so callers can tick it unconditionally.
pub fn start_progress(total_combinations: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total_combinations as u64);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} configurations [{elapsed_precise}] {msg}",
    )
    .map(|style| style.progress_chars("#>-"))
    .unwrap_or_else(|e| {
        log::warn!("Invalid progress template, using the default: {e}");
        ProgressStyle::default_bar()
    });
    pb.set_style(style);
    pb
}
