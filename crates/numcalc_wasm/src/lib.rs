//! WASM bindings for `numcalc_core`.
//!
//! Scalar functions cross the boundary as expression strings; derivatives are
//! sampled at caller-provided points and integrals come back as values or
//! serialized `Quadrature` reports.

mod expression;

pub use expression::WasmExpression;
