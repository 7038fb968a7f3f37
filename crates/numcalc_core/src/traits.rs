use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types the numerical methods can run in.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A pure mapping from one scalar to another.
///
/// Implementations must be free of observable side effects: evaluating the
/// same point twice yields the same value. Closures, compiled expressions and
/// the derivatives produced by `difference` all implement it, so the output of
/// one method can be fed straight back into another.
pub trait ScalarFunction<T: Scalar> {
    /// Evaluates the function at `x`.
    fn eval(&self, x: T) -> T;
}

impl<T: Scalar, F: Fn(T) -> T> ScalarFunction<T> for F {
    fn eval(&self, x: T) -> T {
        self(x)
    }
}

#[cfg(test)]
mod tests {
    use super::{Scalar, ScalarFunction};

    fn evaluate_at<T: Scalar>(f: &impl ScalarFunction<T>, x: T) -> T {
        f.eval(x)
    }

    #[test]
    fn closures_are_scalar_functions() {
        let square = |x: f64| x * x;
        assert_eq!(evaluate_at(&square, 3.0), 9.0);
        assert_eq!(evaluate_at(&f32::cos, 0.0_f32), 1.0);
    }

    #[test]
    fn boxed_functions_are_scalar_functions() {
        let shifted: Box<dyn Fn(f64) -> f64> = Box::new(|x| x + 1.0);
        assert_eq!(evaluate_at(&shifted, 1.5), 2.5);
    }
}
