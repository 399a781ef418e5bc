use indicatif::{ProgressBar, ProgressStyle};

/// Explicit progress handle passed into the simulation driver. Batches
/// report through a single counter; the hidden variant keeps library and
/// test callers silent.
#[derive(Clone)]
pub struct ProgressHandle {
    bar: Option<ProgressBar>,
}

impl ProgressHandle {
    pub fn new(len: u64) -> Self {
        let bar = ProgressBar::new(len);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise} / {eta_precise}] {bar:40.cyan/blue} {pos:>9}/{len:9} {msg}")
                .expect("static template")
                .progress_chars("##-"),
        );
        Self { bar: Some(bar) }
    }

    pub fn hidden() -> Self {
        Self { bar: None }
    }

    pub fn advance(&self, n: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(n);
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}
