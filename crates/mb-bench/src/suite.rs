use anyhow::{bail, Context, Result};
use log::info;
use mb_tensor::{matmul, matmul_into, ComputeBackend, CpuBackend, Matrix, Shape, SimdBackend};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{BackendKind, BenchConfig};
use crate::harness::Harness;
use crate::verify::{self, VerifyReport};

/// Host-side inputs shared by every backend in one run.
#[derive(Debug, Clone)]
pub struct Workload {
    pub a: Matrix,
    pub b: Matrix,
}

impl Workload {
    /// Fill A and B with uniform values in `[-1, 1)` from a seeded RNG.
    pub fn generate(a_shape: Shape, b_shape: Shape, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = random_matrix(&mut rng, a_shape)?;
        let b = random_matrix(&mut rng, b_shape)?;
        Ok(Workload { a, b })
    }

    pub fn out_shape(&self) -> Result<Shape> {
        Ok(self.a.shape().matmul(&self.b.shape())?)
    }
}

fn random_matrix(rng: &mut StdRng, shape: Shape) -> Result<Matrix> {
    let data: Vec<f32> = (0..shape.try_numel()?)
        .map(|_| rng.gen_range(-1.0f32..1.0))
        .collect();
    Ok(Matrix::new(data, shape))
}

/// Outcome for one backend.
#[derive(Debug, Clone)]
pub struct BackendReport {
    pub kind: BackendKind,
    /// `None` when verification was skipped.
    pub verify: Option<VerifyReport>,
}

/// Run the configured backends: verify each against the scalar reference,
/// then time it.
pub fn run(config: &BenchConfig) -> Result<Vec<BackendReport>> {
    let out_shape = config.a_shape().matmul(&config.b_shape())?;
    out_shape.try_numel()?;
    let workload = Workload::generate(config.a_shape(), config.b_shape(), config.seed)?;
    info!(
        "workload: A{} @ B{} = OUT{}, seed {}",
        workload.a.shape(),
        workload.b.shape(),
        out_shape,
        config.seed
    );

    let reference = if config.skip_verify {
        None
    } else {
        info!("computing reference result");
        let expected = matmul(&workload.a, &workload.b, &CpuBackend::new())
            .context("reference multiply")?;
        Some(expected)
    };

    let mut harness = Harness::new(config);
    let mut reports = Vec::new();

    for kind in config.selected_backends() {
        let report = match kind {
            BackendKind::Cpu => bench_backend(
                kind,
                &CpuBackend::new(),
                &workload,
                reference.as_ref(),
                config,
                &mut harness,
            )?,
            BackendKind::Simd => bench_backend(
                kind,
                &SimdBackend::new(),
                &workload,
                reference.as_ref(),
                config,
                &mut harness,
            )?,
            #[cfg(all(feature = "metal", target_os = "macos"))]
            BackendKind::Gpu => {
                let backend =
                    mb_tensor::MetalBackend::new().context("initializing Metal backend")?;
                info!("GPU device: {}", backend.device_name());
                bench_backend(
                    kind,
                    &backend,
                    &workload,
                    reference.as_ref(),
                    config,
                    &mut harness,
                )?
            }
            #[cfg(not(all(feature = "metal", target_os = "macos")))]
            BackendKind::Gpu => {
                log::warn!("GPU backend requires the `metal` feature on macOS; skipping");
                continue;
            }
        };
        reports.push(report);
    }

    harness.finish();
    Ok(reports)
}

/// Upload the workload into `backend`'s memory, verify one result, then
/// time repeated multiplies into the same output buffer.
pub fn bench_backend<B>(
    kind: BackendKind,
    backend: &B,
    workload: &Workload,
    reference: Option<&Matrix>,
    config: &BenchConfig,
    harness: &mut Harness,
) -> Result<BackendReport>
where
    B: ComputeBackend,
{
    let label = kind.label();
    let a = workload
        .a
        .to_backend(backend)
        .with_context(|| format!("{}: allocating A", label))?;
    let b = workload
        .b
        .to_backend(backend)
        .with_context(|| format!("{}: allocating B", label))?;
    let out_shape = workload.out_shape()?;
    let out_buffer = backend
        .allocate(out_shape.try_numel()?)
        .with_context(|| format!("{}: allocating OUT", label))?;
    let mut out = Matrix::from_storage(out_buffer, out_shape)?;

    let verify = match reference {
        Some(expected) => {
            matmul_into(&a, &b, &mut out, backend)
                .with_context(|| format!("{}: first run", label))?;
            let report = verify::compare(out.data(), expected.data(), config.tolerance);
            if !report.passed() {
                bail!(
                    "{} ({}) disagrees with the reference: {} of {} elements outside tolerance {}, max abs diff {}",
                    label,
                    backend.name(),
                    report.mismatches,
                    report.checked,
                    config.tolerance,
                    report.max_abs_diff
                );
            }
            info!(
                "{} ({}) verified: max abs diff {:e}",
                label,
                backend.name(),
                report.max_abs_diff
            );
            Some(report)
        }
        None => None,
    };

    harness.run(label, || matmul_into(&a, &b, &mut out, backend))?;

    Ok(BackendReport { kind, verify })
}
