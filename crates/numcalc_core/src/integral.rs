//! Adaptive midpoint-rule integration.
//!
//! The interval `[a, b]` is split into `n` equal pieces and each piece
//! contributes `width * f(midpoint)`. Starting from `n = 1`, the count doubles
//! until the relative change between successive approximations drops to the
//! requested precision.

use crate::cancellation::{checkpoint, CancellationToken};
use crate::error::CalculusError;
use crate::traits::{Scalar, ScalarFunction};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PRECISION: f64 = 1e-4;
pub const DEFAULT_MAX_ROUNDS: u32 = 30;

/// Settings controlling adaptive refinement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntegrationSettings {
    /// Relative change between successive rounds at which refinement stops.
    pub precision: f64,
    /// Upper bound on doubling rounds before giving up.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

fn default_max_rounds() -> u32 {
    DEFAULT_MAX_ROUNDS
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl IntegrationSettings {
    pub fn with_precision(precision: f64) -> Self {
        Self {
            precision,
            ..Self::default()
        }
    }
}

/// Result of a converged integration together with how it got there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrature<T> {
    pub value: T,
    /// Interval count of the returned value.
    pub intervals: usize,
    /// Doubling rounds performed before convergence.
    pub rounds: u32,
    /// Relative change observed in the final round.
    pub relative_change: T,
}

/// Midpoint-rule integrator with interval doubling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdaptiveMidpoint {
    settings: IntegrationSettings,
}

impl AdaptiveMidpoint {
    pub fn new(settings: IntegrationSettings) -> Result<Self, CalculusError> {
        // NaN fails the comparison as well.
        if !(settings.precision >= 0.0) {
            return Err(CalculusError::InvalidPrecision(settings.precision));
        }
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &IntegrationSettings {
        &self.settings
    }

    /// Approximates the integral of `f` over `[a, b]`.
    pub fn integrate<T, F>(
        &self,
        cancel: Option<&CancellationToken>,
        f: &F,
        a: T,
        b: T,
    ) -> Result<T, CalculusError>
    where
        T: Scalar,
        F: ScalarFunction<T> + ?Sized,
    {
        Ok(self.integrate_detailed(cancel, f, a, b)?.value)
    }

    /// Like [`AdaptiveMidpoint::integrate`], also reporting the refinement
    /// that was needed.
    pub fn integrate_detailed<T, F>(
        &self,
        cancel: Option<&CancellationToken>,
        f: &F,
        a: T,
        b: T,
    ) -> Result<Quadrature<T>, CalculusError>
    where
        T: Scalar,
        F: ScalarFunction<T> + ?Sized,
    {
        let eps = T::from_f64(self.settings.precision)
            .ok_or(CalculusError::InvalidPrecision(self.settings.precision))?;

        let mut intervals: usize = 1;
        let mut previous = T::zero();
        let mut rounds = 0;

        loop {
            checkpoint(cancel)?;

            let current = midpoint_sum(f, a, b, intervals)?;
            // A zero first estimate has nothing to be compared against.
            let change = if intervals == 1 && current.is_zero() {
                T::infinity()
            } else {
                relative_change(current, previous)
            };
            rounds += 1;
            previous = current;

            let doubled = intervals.checked_mul(2);
            if change <= eps {
                if let Some(doubled) = doubled {
                    // The returned value is the refinement one step past the
                    // round that met the precision.
                    let value = midpoint_sum(f, a, b, doubled)?;
                    return Ok(Quadrature {
                        value,
                        intervals: doubled,
                        rounds,
                        relative_change: change,
                    });
                }
            }

            match doubled {
                Some(doubled) if rounds < self.settings.max_rounds => intervals = doubled,
                _ => {
                    return Err(CalculusError::DidNotConverge {
                        rounds,
                        intervals,
                        relative_change: change.to_f64().unwrap_or(f64::NAN),
                    })
                }
            }
        }
    }
}

impl Default for AdaptiveMidpoint {
    fn default() -> Self {
        Self {
            settings: IntegrationSettings::default(),
        }
    }
}

/// Approximates `∫ f(x) dx` over `[a, b]` to relative precision `eps` using
/// the default refinement cap.
///
/// `a > b` is allowed and yields the negated integral. Fails with
/// [`CalculusError::InvalidPrecision`] when `eps` is negative or NaN.
///
/// At least one round always runs, so even `eps >= 1` returns the two-interval
/// sum rather than the single-midpoint estimate.
pub fn integrate<T, F>(
    cancel: Option<&CancellationToken>,
    f: &F,
    a: T,
    b: T,
    eps: T,
) -> Result<T, CalculusError>
where
    T: Scalar,
    F: ScalarFunction<T> + ?Sized,
{
    let precision = eps.to_f64().unwrap_or(f64::NAN);
    AdaptiveMidpoint::new(IntegrationSettings::with_precision(precision))?
        .integrate(cancel, f, a, b)
}

/// One midpoint-rule evaluation with a fixed number of intervals.
pub fn midpoint_sum<T, F>(f: &F, a: T, b: T, intervals: usize) -> Result<T, CalculusError>
where
    T: Scalar,
    F: ScalarFunction<T> + ?Sized,
{
    let count = T::from_usize(intervals)
        .ok_or(CalculusError::UnrepresentableIntervalCount(intervals))?;
    let width = (b - a) / count;
    let half_width = width / (T::one() + T::one());

    let mut area = T::zero();
    for i in 0..intervals {
        let index = T::from_usize(i).ok_or(CalculusError::UnrepresentableIntervalCount(i))?;
        let x = a + half_width + index * width;
        area = area + width * f.eval(x);
    }
    Ok(area)
}

/// `|(current - previous) / current|`, treating identical approximations as
/// unchanged so an exactly-zero integral converges instead of producing NaN.
/// The integrator only relies on this from the second round onward.
fn relative_change<T: Scalar>(current: T, previous: T) -> T {
    if current == previous {
        return T::zero();
    }
    ((current - previous) / current).abs()
}
