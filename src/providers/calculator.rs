/// Arithmetic provider
///
/// All results are finite `Number`s. Non-finite inputs, division or modulo by
/// zero, negative square roots and overflowing results are `Validation`
/// errors; the documented default for every operation is NaN.
use crate::registry::{Operation, Provider};
use crate::value::args;
use crate::{DefaultKind, OperationError, OperationResult, Value};

pub const PROVIDER_ID: &str = "calculator";

#[derive(Debug, Default, Clone, Copy)]
pub struct Calculator;

impl Provider for Calculator {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn operations(&self) -> Vec<Operation> {
        vec![
            binary("add", "Adds two numbers. Args: (a, b)", |a, b| Ok(a + b)),
            binary("subtract", "Subtracts b from a. Args: (a, b)", |a, b| Ok(a - b)),
            binary("multiply", "Multiplies two numbers. Args: (a, b)", |a, b| Ok(a * b)),
            binary("divide", "Divides a by b. Args: (a, b)", |a, b| {
                if b == 0.0 {
                    return Err(OperationError::Validation(format!(
                        "Cannot divide {} by zero",
                        a
                    )));
                }
                Ok(a / b)
            }),
            binary(
                "power",
                "Raises base to exponent. Args: (base, exponent)",
                |base, exponent| {
                    if base < 0.0 && exponent.fract() != 0.0 {
                        return Err(OperationError::Validation(format!(
                            "Cannot raise negative number {} to non-integer power {}",
                            base, exponent
                        )));
                    }
                    Ok(base.powf(exponent))
                },
            ),
            binary("modulo", "Returns remainder of a/b. Args: (a, b)", |a, b| {
                if b == 0.0 {
                    return Err(OperationError::Validation(format!(
                        "Cannot compute {} modulo zero",
                        a
                    )));
                }
                Ok(floored_rem(a, b))
            }),
            sqrt(),
        ]
    }
}

fn sqrt() -> Operation {
    Operation::new("sqrt", PROVIDER_ID, |a: &[Value]| {
        let x = finite(a, 0, "a")?;
        if x < 0.0 {
            return Err(OperationError::Validation(format!(
                "Cannot compute square root of negative number {}",
                x
            )));
        }
        checked(x.sqrt(), &format!("sqrt({})", x))
    })
    .with_description("Returns square root. Args: (a)")
    .with_default(DefaultKind::SentinelNumeric)
}

fn binary<F>(name: &'static str, description: &str, op: F) -> Operation
where
    F: Fn(f64, f64) -> OperationResult<f64> + Send + Sync + 'static,
{
    Operation::new(name, PROVIDER_ID, move |a: &[Value]| {
        let x = finite(a, 0, "a")?;
        let y = finite(a, 1, "b")?;
        checked(op(x, y)?, &format!("{}({}, {})", name, x, y))
    })
    .with_description(description)
    .with_default(DefaultKind::SentinelNumeric)
}

fn finite(a: &[Value], index: usize, name: &str) -> OperationResult<f64> {
    let x = args::number(a, index, name)?;
    if !x.is_finite() {
        return Err(OperationError::Validation(format!(
            "{} must be finite, got {}",
            name, x
        )));
    }
    Ok(x)
}

fn checked(result: f64, description: &str) -> OperationResult<Value> {
    if result.is_nan() {
        return Err(OperationError::Validation(format!(
            "Operation '{}' produced NaN (undefined result)",
            description
        )));
    }
    if result.is_infinite() {
        return Err(OperationError::Validation(format!(
            "Operation '{}' produced Infinity (overflow)",
            description
        )));
    }
    Ok(Value::Number(result))
}

/// Remainder with the sign of the divisor
fn floored_rem(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) {
        r + b
    } else {
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::OperationRegistry;
    use crate::ErrorKind;
    use test_case::test_case;

    fn registry() -> OperationRegistry {
        let mut registry = OperationRegistry::new();
        registry.register_provider(&Calculator).unwrap();
        registry
    }

    fn call(name: &str, a: &[Value]) -> OperationResult<Value> {
        registry().resolve(name).unwrap().invoke(a)
    }

    #[test_case("add", 2.0, 3.0, 5.0)]
    #[test_case("subtract", 2.0, 3.0, -1.0)]
    #[test_case("multiply", 2.0, 3.0, 6.0)]
    #[test_case("divide", 10.0, 4.0, 2.5)]
    #[test_case("power", 2.0, 10.0, 1024.0)]
    #[test_case("modulo", 7.0, 3.0, 1.0)]
    #[test_case("modulo", -7.0, 3.0, 2.0 ; "modulo follows divisor sign")]
    fn test_binary_operations(name: &str, a: f64, b: f64, expected: f64) {
        assert_eq!(
            call(name, &[Value::Number(a), Value::Number(b)]).unwrap(),
            Value::Number(expected)
        );
    }

    #[test]
    fn test_integer_arguments_widen() {
        assert_eq!(
            call("add", &[Value::Integer(2), Value::Integer(3)]).unwrap(),
            Value::Number(5.0)
        );
    }

    #[test]
    fn test_sqrt() {
        assert_eq!(call("sqrt", &[Value::Number(16.0)]).unwrap(), Value::Number(4.0));
        assert_eq!(
            call("sqrt", &[Value::Number(-1.0)]).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test_case("divide", 1.0, 0.0 ; "divide by zero")]
    #[test_case("modulo", 1.0, 0.0 ; "modulo zero")]
    #[test_case("power", -8.0, 0.5 ; "negative base fractional exponent")]
    #[test_case("power", 10.0, 400.0 ; "overflow")]
    #[test_case("add", f64::NAN, 1.0 ; "nan input")]
    #[test_case("add", f64::INFINITY, 1.0 ; "infinite input")]
    fn test_invalid_inputs_are_validation_errors(name: &str, a: f64, b: f64) {
        let err = call(name, &[Value::Number(a), Value::Number(b)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_non_numeric_argument() {
        let err = call("add", &[Value::Text("5".into()), Value::Number(3.0)]).unwrap_err();
        assert!(err.to_string().contains("a must be a number, got text"));

        let err = call("add", &[Value::Bool(true), Value::Number(1.0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_all_operations_default_to_nan() {
        let registry = registry();
        assert_eq!(registry.len(), 7);
        for name in registry.list() {
            let op = registry.resolve(&name).unwrap();
            assert_eq!(op.default_kind(), &DefaultKind::SentinelNumeric);
            assert_eq!(op.provider_id(), PROVIDER_ID);
            assert!(!op.description().is_empty());
        }
    }
}
