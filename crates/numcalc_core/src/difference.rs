//! Finite-difference approximations of first and second derivatives.
//!
//! A strategy is a stateless stencil. Asking it for a derivative validates the
//! step size and wraps the original function in a [`Derivative`] or
//! [`DoubleDerivative`], which evaluate the stencil lazily on every call. Both
//! wrappers are themselves [`ScalarFunction`]s, so derivatives can be
//! differentiated again.

use crate::cancellation::{checkpoint, CancellationToken};
use crate::error::CalculusError;
use crate::traits::{Scalar, ScalarFunction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A finite-difference stencil for first and second derivatives.
pub trait DifferenceStrategy: Copy {
    /// Evaluates the first-derivative stencil of `f` at `x`.
    fn first_difference<T, F>(&self, f: &F, x: T, delta: T) -> T
    where
        T: Scalar,
        F: ScalarFunction<T> + ?Sized;

    /// Evaluates the three-point second-derivative stencil of `f` at `x`.
    fn second_difference<T, F>(&self, f: &F, x: T, delta: T) -> T
    where
        T: Scalar,
        F: ScalarFunction<T> + ?Sized;

    /// Builds an approximation of `f'`.
    ///
    /// Fails with [`CalculusError::DeltaIsZero`] before `f` is ever evaluated.
    fn derivative<T, F>(
        &self,
        cancel: Option<&CancellationToken>,
        f: F,
        delta: T,
    ) -> Result<Derivative<Self, F, T>, CalculusError>
    where
        T: Scalar,
        F: ScalarFunction<T>,
    {
        validate_step(cancel, delta)?;
        Ok(Derivative {
            strategy: *self,
            function: f,
            delta,
        })
    }

    /// Builds an approximation of `f''` from the direct three-point formula.
    ///
    /// This is more stable than differentiating twice, since it rounds once
    /// instead of compounding the error of two divisions by `delta`.
    fn double_derivative<T, F>(
        &self,
        cancel: Option<&CancellationToken>,
        f: F,
        delta: T,
    ) -> Result<DoubleDerivative<Self, F, T>, CalculusError>
    where
        T: Scalar,
        F: ScalarFunction<T>,
    {
        validate_step(cancel, delta)?;
        Ok(DoubleDerivative {
            strategy: *self,
            function: f,
            delta,
        })
    }
}

fn validate_step<T: Scalar>(
    cancel: Option<&CancellationToken>,
    delta: T,
) -> Result<(), CalculusError> {
    checkpoint(cancel)?;
    if delta.is_zero() {
        return Err(CalculusError::DeltaIsZero);
    }
    Ok(())
}

fn two<T: Scalar>() -> T {
    T::one() + T::one()
}

/// `(f(x+h) - f(x)) / h` and `(f(x+2h) - 2f(x+h) + f(x)) / h²`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardDifference;

impl DifferenceStrategy for ForwardDifference {
    fn first_difference<T, F>(&self, f: &F, x: T, delta: T) -> T
    where
        T: Scalar,
        F: ScalarFunction<T> + ?Sized,
    {
        (f.eval(x + delta) - f.eval(x)) / delta
    }

    fn second_difference<T, F>(&self, f: &F, x: T, delta: T) -> T
    where
        T: Scalar,
        F: ScalarFunction<T> + ?Sized,
    {
        let two = two::<T>();
        (f.eval(x + two * delta) - two * f.eval(x + delta) + f.eval(x)) / (delta * delta)
    }
}

/// `(f(x) - f(x-h)) / h` and `(f(x) - 2f(x-h) + f(x-2h)) / h²`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackwardDifference;

impl DifferenceStrategy for BackwardDifference {
    fn first_difference<T, F>(&self, f: &F, x: T, delta: T) -> T
    where
        T: Scalar,
        F: ScalarFunction<T> + ?Sized,
    {
        (f.eval(x) - f.eval(x - delta)) / delta
    }

    fn second_difference<T, F>(&self, f: &F, x: T, delta: T) -> T
    where
        T: Scalar,
        F: ScalarFunction<T> + ?Sized,
    {
        let two = two::<T>();
        (f.eval(x) - two * f.eval(x - delta) + f.eval(x - two * delta)) / (delta * delta)
    }
}

/// `(f(x+h) - f(x-h)) / 2h` and `(f(x+h) - 2f(x) + f(x-h)) / h²`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CentralDifference;

impl DifferenceStrategy for CentralDifference {
    fn first_difference<T, F>(&self, f: &F, x: T, delta: T) -> T
    where
        T: Scalar,
        F: ScalarFunction<T> + ?Sized,
    {
        (f.eval(x + delta) - f.eval(x - delta)) / (two::<T>() * delta)
    }

    fn second_difference<T, F>(&self, f: &F, x: T, delta: T) -> T
    where
        T: Scalar,
        F: ScalarFunction<T> + ?Sized,
    {
        (f.eval(x + delta) - two::<T>() * f.eval(x) + f.eval(x - delta)) / (delta * delta)
    }
}

/// Runtime selection between the three stencils.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stencil {
    Forward,
    Backward,
    Central,
}

impl Stencil {
    pub const ALL: [Stencil; 3] = [Stencil::Forward, Stencil::Backward, Stencil::Central];

    pub fn name(&self) -> &'static str {
        match self {
            Stencil::Forward => "forward",
            Stencil::Backward => "backward",
            Stencil::Central => "central",
        }
    }
}

impl DifferenceStrategy for Stencil {
    fn first_difference<T, F>(&self, f: &F, x: T, delta: T) -> T
    where
        T: Scalar,
        F: ScalarFunction<T> + ?Sized,
    {
        match self {
            Stencil::Forward => ForwardDifference.first_difference(f, x, delta),
            Stencil::Backward => BackwardDifference.first_difference(f, x, delta),
            Stencil::Central => CentralDifference.first_difference(f, x, delta),
        }
    }

    fn second_difference<T, F>(&self, f: &F, x: T, delta: T) -> T
    where
        T: Scalar,
        F: ScalarFunction<T> + ?Sized,
    {
        match self {
            Stencil::Forward => ForwardDifference.second_difference(f, x, delta),
            Stencil::Backward => BackwardDifference.second_difference(f, x, delta),
            Stencil::Central => CentralDifference.second_difference(f, x, delta),
        }
    }
}

impl fmt::Display for Stencil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stencil '{0}', expected forward, backward or central")]
pub struct UnknownStencil(pub String);

impl FromStr for Stencil {
    type Err = UnknownStencil;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Stencil::Forward),
            "backward" => Ok(Stencil::Backward),
            "central" => Ok(Stencil::Central),
            other => Err(UnknownStencil(other.to_string())),
        }
    }
}

/// A lazily evaluated first-derivative approximation.
#[derive(Debug, Clone, Copy)]
pub struct Derivative<S, F, T> {
    strategy: S,
    function: F,
    delta: T,
}

impl<S, F, T: Copy> Derivative<S, F, T> {
    pub fn delta(&self) -> T {
        self.delta
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn function(&self) -> &F {
        &self.function
    }
}

impl<S, F, T> ScalarFunction<T> for Derivative<S, F, T>
where
    S: DifferenceStrategy,
    F: ScalarFunction<T>,
    T: Scalar,
{
    fn eval(&self, x: T) -> T {
        self.strategy.first_difference(&self.function, x, self.delta)
    }
}

/// A lazily evaluated second-derivative approximation.
#[derive(Debug, Clone, Copy)]
pub struct DoubleDerivative<S, F, T> {
    strategy: S,
    function: F,
    delta: T,
}

impl<S, F, T: Copy> DoubleDerivative<S, F, T> {
    pub fn delta(&self) -> T {
        self.delta
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    pub fn function(&self) -> &F {
        &self.function
    }
}

impl<S, F, T> ScalarFunction<T> for DoubleDerivative<S, F, T>
where
    S: DifferenceStrategy,
    F: ScalarFunction<T>,
    T: Scalar,
{
    fn eval(&self, x: T) -> T {
        self.strategy.second_difference(&self.function, x, self.delta)
    }
}
