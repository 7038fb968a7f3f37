//! The `numcalc_core` crate approximates derivatives and definite integrals of
//! single-variable functions numerically.
//! Every routine is generic over the scalar type, so the same code runs in
//! `f32` and `f64`.
//!
//! Key components:
//! - **Traits**: `Scalar` (numeric type abstraction), `ScalarFunction` (anything
//!   evaluable at a point).
//! - **Difference**: forward, backward and central stencils producing lazily evaluated derivatives.
//! - **Integral**: midpoint rule with interval doubling until the relative
//!   change meets a precision.
//! - **Equation Engine**: a bytecode VM turning expression strings into scalar functions.
pub mod cancellation;
pub mod difference;
pub mod equation_engine;
pub mod error;
pub mod integral;
pub mod traits;

pub use cancellation::CancellationToken;
pub use difference::{
    BackwardDifference, CentralDifference, Derivative, DifferenceStrategy, DoubleDerivative,
    ForwardDifference, Stencil,
};
pub use error::CalculusError;
pub use integral::{integrate, AdaptiveMidpoint, IntegrationSettings, Quadrature};
pub use traits::{Scalar, ScalarFunction};
