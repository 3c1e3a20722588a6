use std::fmt;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use mb_tensor::Shape;

/// Benchmark dense f32 matrix multiplication on naive CPU, SIMD CPU and GPU backends.
#[derive(Parser, Debug, Clone)]
#[command(name = "mb-bench")]
#[command(version)]
#[command(about = "Compare naive, SIMD and Metal matrix multiplication", long_about = None)]
pub struct BenchConfig {
    /// Rows of A (and of the output)
    #[arg(short = 'm', long, default_value_t = 1000)]
    pub a_rows: usize,

    /// Columns of A, rows of B (the shared dimension)
    #[arg(short = 'k', long, default_value_t = 1000)]
    pub a_cols: usize,

    /// Columns of B (and of the output)
    #[arg(short = 'n', long, default_value_t = 100)]
    pub b_cols: usize,

    /// Minimum number of timed samples per backend
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(10..))]
    pub min_iterations: u64,

    /// Backends to run; repeat the flag for several. Defaults to every compiled backend
    #[arg(short, long = "backend", value_enum)]
    pub backends: Vec<BackendKind>,

    /// Seed for the random input matrices
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Largest relative (and absolute, near zero) error accepted against the reference
    #[arg(long, default_value_t = 1e-4)]
    pub tolerance: f32,

    /// Skip checking each backend against the scalar reference before timing
    #[arg(long)]
    pub skip_verify: bool,

    /// Warm-up time per backend, in seconds
    #[arg(long, default_value_t = 3.0)]
    pub warm_up_secs: f64,

    /// Target measurement time per backend, in seconds
    #[arg(long, default_value_t = 5.0)]
    pub measurement_secs: f64,
}

impl BenchConfig {
    pub fn a_shape(&self) -> Shape {
        Shape::new(self.a_rows, self.a_cols)
    }

    pub fn b_shape(&self) -> Shape {
        Shape::new(self.a_cols, self.b_cols)
    }

    /// The backends to run, in CPU, SIMD, GPU order, without duplicates.
    pub fn selected_backends(&self) -> Vec<BackendKind> {
        if self.backends.is_empty() {
            return BackendKind::compiled();
        }
        BackendKind::value_variants()
            .iter()
            .copied()
            .filter(|kind| self.backends.contains(kind))
            .collect()
    }

    pub fn warm_up_time(&self) -> Duration {
        Duration::from_secs_f64(self.warm_up_secs.max(0.0))
    }

    pub fn measurement_time(&self) -> Duration {
        Duration::from_secs_f64(self.measurement_secs.max(0.0))
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Scalar triple loop
    Cpu,
    /// matrixmultiply sgemm
    Simd,
    /// Metal compute kernel
    Gpu,
}

impl BackendKind {
    /// Label used for the benchmark entry.
    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::Cpu => "CPU",
            BackendKind::Simd => "SIMD",
            BackendKind::Gpu => "GPU",
        }
    }

    /// Whether this build can run the backend.
    pub fn is_compiled(&self) -> bool {
        match self {
            BackendKind::Cpu | BackendKind::Simd => true,
            BackendKind::Gpu => cfg!(all(feature = "metal", target_os = "macos")),
        }
    }

    /// Every backend this build can run.
    pub fn compiled() -> Vec<BackendKind> {
        BackendKind::value_variants()
            .iter()
            .copied()
            .filter(BackendKind::is_compiled)
            .collect()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_workload() {
        let config = BenchConfig::try_parse_from(["mb-bench"]).unwrap();
        assert_eq!(config.a_shape(), Shape::new(1000, 1000));
        assert_eq!(config.b_shape(), Shape::new(1000, 100));
        assert_eq!(config.min_iterations, 10);
        assert_eq!(config.seed, 42);
        assert!(!config.skip_verify);
        assert_eq!(config.selected_backends(), BackendKind::compiled());
    }

    #[test]
    fn test_explicit_backends_are_ordered_and_deduplicated() {
        let config =
            BenchConfig::try_parse_from(["mb-bench", "-b", "gpu", "-b", "cpu", "--backend", "cpu"])
                .unwrap();
        assert_eq!(
            config.selected_backends(),
            vec![BackendKind::Cpu, BackendKind::Gpu]
        );
    }

    #[test]
    fn test_dimensions() {
        let config =
            BenchConfig::try_parse_from(["mb-bench", "-m", "2", "-k", "3", "-n", "4"]).unwrap();
        assert_eq!(config.a_shape(), Shape::new(2, 3));
        assert_eq!(config.b_shape(), Shape::new(3, 4));
    }

    #[test]
    fn test_min_iterations_floor() {
        assert!(BenchConfig::try_parse_from(["mb-bench", "--min-iterations", "9"]).is_err());
        let config = BenchConfig::try_parse_from(["mb-bench", "--min-iterations", "25"]).unwrap();
        assert_eq!(config.min_iterations, 25);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(BenchConfig::try_parse_from(["mb-bench", "-b", "cuda"]).is_err());
    }

    #[test]
    fn test_cpu_backends_always_compiled() {
        let compiled = BackendKind::compiled();
        assert!(compiled.contains(&BackendKind::Cpu));
        assert!(compiled.contains(&BackendKind::Simd));
        assert_eq!(BackendKind::Gpu.label(), "GPU");
    }
}
