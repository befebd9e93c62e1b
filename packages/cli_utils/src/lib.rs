#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the tollway toolchain.
//!
//! Provides `indicatif`-backed progress bars behind the engine's
//! [`ProgressCallback`] trait, plus [`init_logger`] which routes `log`
//! output through `indicatif-log-bridge` so log lines never tear a bar
//! mid-redraw.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tollway_fare::progress::ProgressCallback;

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style applied once `start()` provides the highway count.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Creates the per-highway bar used while reconciling a fare table.
    ///
    /// Starts as a spinner; the engine calls [`ProgressCallback::start()`]
    /// with the highway count before the first highway, which switches it
    /// to a full bar.
    #[must_use]
    pub fn highways_bar(multi: &MultiProgress) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message("Reconciling fares");

        let bar_style = ProgressStyle::with_template(
            "{msg:<28} {wide_bar:.green/dim} {pos}/{len} highways [{elapsed_precise}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn start(&self, highways: u64) {
        self.bar.set_length(highways);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn highway_started(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn highway_done(&self) {
        self.bar.inc(1);
    }

    fn finish(&self, totals: String) {
        self.bar.finish_with_message(totals);
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Returns the
/// [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set in tests.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
