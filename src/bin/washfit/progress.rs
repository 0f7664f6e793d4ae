/// Progress bar over the slices of a fit
pub (super) struct SliceProgress(ProgressBar);

impl SliceProgress {

    pub (super) fn new(n_slices: usize) -> Self {
        let bar = ProgressBar::new(n_slices as u64);
        bar.set_style(ProgressStyle::default_bar()
                      .template("{msg}\n[{elapsed_precise}] {wide_bar} {pos}/{len} slices ({eta_precise})")
                      .unwrap_or_else(|_| ProgressStyle::default_bar())
        );
        bar.tick();
        Self(bar)
    }

    /// Status callback for `Chain::run`: called on entering every slice
    pub (super) fn status(&self, message: &str) {
        if !self.0.message().is_empty() { self.0.inc(1) }
        self.0.set_message(message.to_string());
    }

    pub (super) fn finish(&self, report: &RunReport) {
        self.0.inc(1);
        let verb = if report.cancelled { "Cancelled after" } else { "Fitted" };
        self.0.finish_with_message(format!("{verb} {} voxels", group_digits(report.fitted)));
    }
}

// ----- Imports -----------------------------------------------------------------------------------------
use indicatif::{ProgressBar, ProgressStyle};
use washfit::{RunReport, utils::group_digits};
