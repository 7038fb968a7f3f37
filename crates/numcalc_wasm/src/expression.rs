//! WASM wrapper around a compiled expression and the numerical methods.

use anyhow::{Context, Result};
use numcalc_core::difference::{DifferenceStrategy, Stencil};
use numcalc_core::equation_engine::{compile_expression, Expression};
use numcalc_core::integral::{AdaptiveMidpoint, IntegrationSettings, Quadrature};
use numcalc_core::traits::ScalarFunction;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmExpression {
    pub(crate) expression: Expression,
}

pub(crate) fn build_expression(
    source: &str,
    variable: &str,
    param_names: &[String],
    params: &[f64],
) -> Result<Expression> {
    compile_expression(source, variable, param_names, params)
        .with_context(|| format!("Failed to compile expression '{source}'"))
}

fn parse_stencil(name: &str) -> Result<Stencil> {
    Ok(name.parse::<Stencil>()?)
}

fn to_js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{err:#}"))
}

impl WasmExpression {
    pub(crate) fn sample_derivative(
        &self,
        stencil: &str,
        delta: f64,
        points: &[f64],
    ) -> Result<Vec<f64>> {
        let stencil = parse_stencil(stencil)?;
        let derivative = stencil.derivative(None, self.expression.clone(), delta)?;
        Ok(points.iter().map(|&x| derivative.eval(x)).collect())
    }

    pub(crate) fn sample_double_derivative(
        &self,
        stencil: &str,
        delta: f64,
        points: &[f64],
    ) -> Result<Vec<f64>> {
        let stencil = parse_stencil(stencil)?;
        let derivative = stencil.double_derivative(None, self.expression.clone(), delta)?;
        Ok(points.iter().map(|&x| derivative.eval(x)).collect())
    }

    pub(crate) fn quadrature(
        &self,
        a: f64,
        b: f64,
        settings: IntegrationSettings,
    ) -> Result<Quadrature<f64>> {
        let integrator = AdaptiveMidpoint::new(settings)?;
        let report = integrator
            .integrate_detailed(None, &self.expression, a, b)
            .with_context(|| format!("Integration over [{a}, {b}] failed"))?;
        Ok(report)
    }
}

#[wasm_bindgen]
impl WasmExpression {
    #[wasm_bindgen(constructor)]
    pub fn new(
        expression: String,
        variable: String,
        param_names: Vec<String>,
        params: Vec<f64>,
    ) -> Result<WasmExpression, JsValue> {
        console_error_panic_hook::set_once();

        let expression =
            build_expression(&expression, &variable, &param_names, &params).map_err(to_js_error)?;
        Ok(WasmExpression { expression })
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.expression.evaluate(x)
    }

    /// Evaluates the first-derivative approximation at each point.
    pub fn derivative(
        &self,
        stencil: &str,
        delta: f64,
        points: &[f64],
    ) -> Result<Vec<f64>, JsValue> {
        self.sample_derivative(stencil, delta, points)
            .map_err(to_js_error)
    }

    /// Evaluates the direct second-derivative approximation at each point.
    pub fn double_derivative(
        &self,
        stencil: &str,
        delta: f64,
        points: &[f64],
    ) -> Result<Vec<f64>, JsValue> {
        self.sample_double_derivative(stencil, delta, points)
            .map_err(to_js_error)
    }

    pub fn integrate(&self, a: f64, b: f64, precision: f64) -> Result<f64, JsValue> {
        self.quadrature(a, b, IntegrationSettings::with_precision(precision))
            .map(|report| report.value)
            .map_err(to_js_error)
    }

    /// Integrates with explicit `IntegrationSettings`, returning the full
    /// `Quadrature` report.
    pub fn integrate_detailed(
        &self,
        a: f64,
        b: f64,
        settings: JsValue,
    ) -> Result<JsValue, JsValue> {
        let settings: IntegrationSettings = from_value(settings)
            .map_err(|err| JsValue::from_str(&format!("Invalid integration settings: {err}")))?;
        let report = self.quadrature(a, b, settings).map_err(to_js_error)?;
        to_value(&report)
            .map_err(|err| JsValue::from_str(&format!("Failed to serialize quadrature: {err}")))
    }
}
