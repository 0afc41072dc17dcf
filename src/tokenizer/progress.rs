// src/tokenizer/progress.rs

// Per-file progress for multi-file jobs. With the "progressbar" feature this
// draws an indicatif bar; without it every call compiles to nothing.

use std::path::Path;

#[cfg(feature = "progressbar")]
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) struct FileProgress {
    #[cfg(feature = "progressbar")]
    bar: Option<ProgressBar>,
}

impl FileProgress {
    #[cfg(feature = "progressbar")]
    pub(crate) fn new(files: usize, visible: bool) -> Self {
        let bar = visible.then(|| {
            let bar = ProgressBar::new(files as u64);
            if let Ok(style) = ProgressStyle::default_bar().template("{msg} [{bar:40}] {pos}/{len}") {
                bar.set_style(style);
            }
            bar
        });
        Self { bar }
    }

    #[cfg(not(feature = "progressbar"))]
    pub(crate) fn new(_files: usize, _visible: bool) -> Self {
        Self {}
    }

    pub(crate) fn start(&self, _file: &Path) {
        #[cfg(feature = "progressbar")]
        if let Some(bar) = &self.bar {
            bar.set_message(_file.display().to_string());
        }
    }

    pub(crate) fn done(&self) {
        #[cfg(feature = "progressbar")]
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    pub(crate) fn finish(&self) {
        #[cfg(feature = "progressbar")]
        if let Some(bar) = &self.bar {
            bar.finish();
        }
    }
}
