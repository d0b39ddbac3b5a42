//! The seven indicator strategies, as pure functions over resolved operands.
use crate::compute::ledger::ComputationError;
use crate::store::{RawValue, StrategyKind};

/// Decimal places kept by ratio, rate and average.
pub const ROUNDING_PLACES: i32 = 2;

/// Everything a strategy may look at.
#[derive(Debug, Clone)]
pub struct Operands<'a> {
    /// Display name, for error reporting.
    pub indicator: &'a str,
    pub kind: StrategyKind,
    /// The record's own value for the indicator's concept (value kind only).
    pub direct: Option<RawValue>,
    /// Resolved parameter values, ascending by parameter order.
    pub values: &'a [Option<RawValue>],
}

pub type StrategyFn = fn(&Operands<'_>) -> Result<Option<RawValue>, ComputationError>;

impl StrategyKind {
    /// Static dispatch table from kind to evaluation function.
    pub fn evaluator(&self) -> StrategyFn {
        match self {
            StrategyKind::Value => value,
            StrategyKind::Sum => sum,
            StrategyKind::Product => product,
            StrategyKind::Difference => difference,
            StrategyKind::Ratio => ratio,
            StrategyKind::Rate => rate,
            StrategyKind::Average => average,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Num::Int(i) => i == 0,
            Num::Float(f) => f == 0.0,
        }
    }

    /// Integer arithmetic while both sides are integers and nothing
    /// overflows; float arithmetic otherwise.
    fn combine(self, rhs: Num, int_op: fn(i64, i64) -> Option<i64>, float_op: fn(f64, f64) -> f64) -> Num {
        match (self, rhs) {
            (Num::Int(a), Num::Int(b)) => match int_op(a, b) {
                Some(v) => Num::Int(v),
                None => Num::Float(float_op(a as f64, b as f64)),
            },
            (a, b) => Num::Float(float_op(a.as_f64(), b.as_f64())),
        }
    }

    fn into_raw(self) -> RawValue {
        match self {
            Num::Int(i) => RawValue::Int(i),
            Num::Float(f) => RawValue::Float(f),
        }
    }
}

/// Rounds half to even at [`ROUNDING_PLACES`] decimals.
pub fn round_places(x: f64) -> f64 {
    let scale = 10f64.powi(ROUNDING_PLACES);
    (x * scale).round_ties_even() / scale
}

fn operand(op: &Operands<'_>, pos: usize) -> Result<Num, ComputationError> {
    match op.values.get(pos).and_then(|v| v.as_ref()) {
        None => Err(ComputationError::MissingOperand { indicator: op.indicator.to_string(), position: pos + 1 }),
        Some(RawValue::Int(i)) => Ok(Num::Int(*i)),
        Some(RawValue::Float(f)) => Ok(Num::Float(*f)),
        Some(_) => Err(ComputationError::NonNumericOperand { indicator: op.indicator.to_string(), position: pos + 1 }),
    }
}

fn operands(op: &Operands<'_>) -> Result<Vec<Num>, ComputationError> {
    if op.values.is_empty() {
        return Err(ComputationError::EmptyParameterList { indicator: op.indicator.to_string(), kind: op.kind });
    }
    (0..op.values.len()).map(|pos| operand(op, pos)).collect()
}

fn pair(op: &Operands<'_>) -> Result<(Num, Num), ComputationError> {
    match op.values.len() {
        0 => Err(ComputationError::EmptyParameterList { indicator: op.indicator.to_string(), kind: op.kind }),
        2 => Ok((operand(op, 0)?, operand(op, 1)?)),
        n => Err(ComputationError::ParameterCountMismatch {
            indicator: op.indicator.to_string(),
            kind: op.kind,
            expected: 2,
            actual: n,
        }),
    }
}

fn unrounded_ratio(op: &Operands<'_>) -> Result<f64, ComputationError> {
    let (num, den) = pair(op)?;
    if den.is_zero() {
        return Err(ComputationError::DivisionByZero { indicator: op.indicator.to_string() });
    }
    Ok(num.as_f64() / den.as_f64())
}

fn value(op: &Operands<'_>) -> Result<Option<RawValue>, ComputationError> {
    Ok(op.direct.clone())
}

fn sum(op: &Operands<'_>) -> Result<Option<RawValue>, ComputationError> {
    let nums = operands(op)?;
    let total = nums[1..].iter().fold(nums[0], |acc, &n| acc.combine(n, i64::checked_add, |a, b| a + b));
    Ok(Some(total.into_raw()))
}

fn product(op: &Operands<'_>) -> Result<Option<RawValue>, ComputationError> {
    let nums = operands(op)?;
    let total = nums[1..].iter().fold(nums[0], |acc, &n| acc.combine(n, i64::checked_mul, |a, b| a * b));
    Ok(Some(total.into_raw()))
}

fn difference(op: &Operands<'_>) -> Result<Option<RawValue>, ComputationError> {
    let (minuend, subtrahend) = pair(op)?;
    Ok(Some(minuend.combine(subtrahend, i64::checked_sub, |a, b| a - b).into_raw()))
}

fn ratio(op: &Operands<'_>) -> Result<Option<RawValue>, ComputationError> {
    Ok(Some(RawValue::Float(round_places(unrounded_ratio(op)?))))
}

fn rate(op: &Operands<'_>) -> Result<Option<RawValue>, ComputationError> {
    Ok(Some(RawValue::Float(round_places(unrounded_ratio(op)? * 100.0))))
}

fn average(op: &Operands<'_>) -> Result<Option<RawValue>, ComputationError> {
    let nums = operands(op)?;
    let total: f64 = nums.iter().map(|n| n.as_f64()).sum();
    Ok(Some(RawValue::Float(round_places(total / nums.len() as f64))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn eval(kind: StrategyKind, values: &[Option<RawValue>]) -> Result<Option<RawValue>, ComputationError> {
        let op = Operands { indicator: "test", kind, direct: None, values };
        (kind.evaluator())(&op)
    }

    fn ints(vals: &[i64]) -> Vec<Option<RawValue>> {
        vals.iter().map(|&v| Some(RawValue::Int(v))).collect()
    }

    #[rstest]
    #[case(StrategyKind::Ratio, &[10, 4], RawValue::Float(2.5))]
    #[case(StrategyKind::Rate, &[1, 4], RawValue::Float(25.0))]
    #[case(StrategyKind::Average, &[10, 2], RawValue::Float(6.0))]
    #[case(StrategyKind::Ratio, &[10, 20], RawValue::Float(0.5))]
    #[case(StrategyKind::Ratio, &[1, 3], RawValue::Float(0.33))]
    #[case(StrategyKind::Rate, &[2, 3], RawValue::Float(66.67))]
    #[case(StrategyKind::Sum, &[1, 2, 3], RawValue::Int(6))]
    #[case(StrategyKind::Product, &[10, 2], RawValue::Int(20))]
    #[case(StrategyKind::Difference, &[10, 2], RawValue::Int(8))]
    #[case(StrategyKind::Sum, &[7], RawValue::Int(7))]
    fn test_strategy_values(#[case] kind: StrategyKind, #[case] input: &[i64], #[case] expected: RawValue) {
        assert_eq!(eval(kind, &ints(input)).unwrap(), Some(expected));
    }

    #[rstest]
    #[case(StrategyKind::Ratio, true)]
    #[case(StrategyKind::Rate, true)]
    #[case(StrategyKind::Difference, true)]
    #[case(StrategyKind::Sum, false)]
    #[case(StrategyKind::Product, false)]
    #[case(StrategyKind::Average, false)]
    fn test_order_sensitivity(#[case] kind: StrategyKind, #[case] sensitive: bool) {
        let forward = eval(kind, &ints(&[10, 4])).unwrap();
        let backward = eval(kind, &ints(&[4, 10])).unwrap();
        assert_eq!(forward != backward, sensitive);
    }

    #[test]
    fn test_rate_rounds_after_scaling() {
        // Rounding the ratio first would give 0.33 * 100 = 33.0.
        assert_eq!(eval(StrategyKind::Rate, &ints(&[1, 3])).unwrap(), Some(RawValue::Float(33.33)));
    }

    #[test]
    fn test_round_half_to_even() {
        assert_eq!(round_places(0.125), 0.12);
        assert_eq!(round_places(0.375), 0.38);
        assert_eq!(round_places(-1.005), -1.0);
    }

    #[test]
    fn test_mixed_int_float_promotes() {
        let values = vec![Some(RawValue::Int(1)), Some(RawValue::Float(0.5))];
        assert_eq!(eval(StrategyKind::Sum, &values).unwrap(), Some(RawValue::Float(1.5)));
    }

    #[test]
    fn test_integer_overflow_promotes_to_float() {
        let values = ints(&[i64::MAX, 2]);
        assert_eq!(eval(StrategyKind::Product, &values).unwrap(), Some(RawValue::Float(i64::MAX as f64 * 2.0)));
    }

    #[rstest]
    #[case(StrategyKind::Ratio)]
    #[case(StrategyKind::Rate)]
    fn test_division_by_zero(#[case] kind: StrategyKind) {
        let err = eval(kind, &ints(&[1, 0])).unwrap_err();
        assert_eq!(err, ComputationError::DivisionByZero { indicator: "test".into() });
        let floats = vec![Some(RawValue::Float(1.0)), Some(RawValue::Float(0.0))];
        assert!(matches!(eval(kind, &floats), Err(ComputationError::DivisionByZero { .. })));
    }

    #[rstest]
    #[case(StrategyKind::Sum)]
    #[case(StrategyKind::Product)]
    #[case(StrategyKind::Average)]
    #[case(StrategyKind::Difference)]
    #[case(StrategyKind::Ratio)]
    #[case(StrategyKind::Rate)]
    fn test_empty_parameter_list(#[case] kind: StrategyKind) {
        assert!(matches!(eval(kind, &[]), Err(ComputationError::EmptyParameterList { .. })));
    }

    #[test]
    fn test_binary_kinds_need_exactly_two() {
        let err = eval(StrategyKind::Difference, &ints(&[1, 2, 3])).unwrap_err();
        assert!(matches!(err, ComputationError::ParameterCountMismatch { expected: 2, actual: 3, .. }));
        let err = eval(StrategyKind::Ratio, &ints(&[1])).unwrap_err();
        assert!(matches!(err, ComputationError::ParameterCountMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_absent_denominator_is_missing_operand() {
        let values = vec![Some(RawValue::Int(1)), None];
        assert_eq!(
            eval(StrategyKind::Ratio, &values).unwrap_err(),
            ComputationError::MissingOperand { indicator: "test".into(), position: 2 }
        );
    }

    #[test]
    fn test_non_numeric_operand() {
        let values = vec![Some(RawValue::Text("ten".into())), Some(RawValue::Int(2))];
        assert!(matches!(
            eval(StrategyKind::Sum, &values),
            Err(ComputationError::NonNumericOperand { position: 1, .. })
        ));
    }

    #[test]
    fn test_value_passthrough() {
        let op = Operands { indicator: "h", kind: StrategyKind::Value, direct: Some(RawValue::Int(10)), values: &[] };
        assert_eq!(value(&op).unwrap(), Some(RawValue::Int(10)));
        let op = Operands { direct: None, ..op };
        assert_eq!(value(&op).unwrap(), None);
    }
}
