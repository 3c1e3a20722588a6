use anyhow::{Context, Result};
use criterion::Criterion;

use crate::config::BenchConfig;

/// Timing harness: runs a labelled operation repeatedly and reports
/// statistics. Thin wrapper over `criterion` so failures inside the timed
/// loop surface as errors instead of panics.
pub struct Harness {
    criterion: Criterion,
}

impl Harness {
    pub fn new(config: &BenchConfig) -> Self {
        let criterion = Criterion::default()
            .sample_size(config.min_iterations as usize)
            .warm_up_time(config.warm_up_time())
            .measurement_time(config.measurement_time())
            .without_plots();
        Harness { criterion }
    }

    /// Time `op` under `label`. Stops calling `op` after its first error and
    /// returns that error once criterion finishes the run.
    pub fn run<F>(&mut self, label: &str, mut op: F) -> Result<()>
    where
        F: FnMut() -> mb_tensor::Result<()>,
    {
        let mut failure = None;
        self.criterion.bench_function(label, |b| {
            b.iter(|| {
                if failure.is_none() {
                    if let Err(e) = op() {
                        failure = Some(e);
                    }
                }
            })
        });

        match failure {
            Some(e) => Err(e).with_context(|| format!("{} failed during timing", label)),
            None => Ok(()),
        }
    }

    /// Print criterion's closing summary.
    pub fn finish(self) {
        self.criterion.final_summary();
    }
}
