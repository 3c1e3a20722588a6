use approx::relative_eq;

/// Result of comparing a backend's output against the reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifyReport {
    /// Largest `|got - expected|` over all elements.
    pub max_abs_diff: f32,
    /// Elements outside the tolerance.
    pub mismatches: usize,
    /// Elements compared.
    pub checked: usize,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

/// Compare `got` to `expected` element by element.
///
/// An element passes when it is within `tolerance` relative to the larger
/// magnitude, or within `tolerance` absolutely (for results near zero).
/// Lengths must match; a length difference counts every missing element as
/// a mismatch.
pub fn compare(got: &[f32], expected: &[f32], tolerance: f32) -> VerifyReport {
    let mut max_abs_diff = 0.0f32;
    let mut mismatches = got.len().abs_diff(expected.len());

    for (&g, &e) in got.iter().zip(expected.iter()) {
        let diff = (g - e).abs();
        if diff > max_abs_diff || diff.is_nan() {
            max_abs_diff = diff;
        }
        if !relative_eq!(g, e, epsilon = tolerance, max_relative = tolerance) {
            mismatches += 1;
        }
    }

    VerifyReport {
        max_abs_diff,
        mismatches,
        checked: got.len().min(expected.len()),
    }
}
