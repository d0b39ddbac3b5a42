//! Display formatting of raw matrix values.
use crate::compute::ComputationError;
use crate::store::RawValue;
use std::fmt::Write;

/// Formats one value; dates go through `time_format` (strftime syntax).
pub fn format_value(value: &RawValue, time_format: &str) -> Result<String, ComputationError> {
    Ok(match value {
        RawValue::Int(i) => i.to_string(),
        RawValue::Float(f) => format_float(*f),
        RawValue::Text(s) => s.clone(),
        RawValue::Bool(true) => "True".to_string(),
        RawValue::Bool(false) => "False".to_string(),
        RawValue::Date(d) => {
            let mut out = String::new();
            write!(out, "{}", d.format(time_format))
                .map_err(|_| ComputationError::InvalidTimeFormat { format: time_format.to_string() })?;
            out
        }
    })
}

/// Absent cells render empty so rows keep one cell per column.
pub fn format_cell(value: Option<&RawValue>, time_format: &str) -> Result<String, ComputationError> {
    value.map_or_else(|| Ok(String::new()), |v| format_value(v, time_format))
}

/// Shortest round-trip form, always with a fractional part for whole numbers.
///
/// Magnitudes of `1e16` and up, or below `1e-4`, switch to exponent form
/// with a signed, two digit minimum exponent (`1e+16`, `2.5e-07`).
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    let magnitude = f.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        return format_exponent(f);
    }
    if f.fract() == 0.0 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn format_exponent(f: f64) -> String {
    let shortest = format!("{:e}", f);
    let (mantissa, exponent) = shortest.split_once('e').unwrap_or((shortest.as_str(), "0"));
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(d) => ('-', d),
        None => ('+', exponent),
    };
    format!("{}e{}{:0>2}", mantissa, sign, digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    #[rstest]
    #[case(RawValue::Int(10), "10")]
    #[case(RawValue::Int(-3), "-3")]
    #[case(RawValue::Float(0.5), "0.5")]
    #[case(RawValue::Float(25.0), "25.0")]
    #[case(RawValue::Float(66.67), "66.67")]
    #[case(RawValue::Float(0.0001), "0.0001")]
    #[case(RawValue::Float(1e-5), "1e-05")]
    #[case(RawValue::Float(-2.5e-7), "-2.5e-07")]
    #[case(RawValue::Float(1e16), "1e+16")]
    #[case(RawValue::Float(1.2345e120), "1.2345e+120")]
    #[case(RawValue::Float(9999999999999998.0), "9999999999999998.0")]
    #[case(RawValue::Float(0.0), "0.0")]
    #[case(RawValue::Text("Mopti".into()), "Mopti")]
    #[case(RawValue::Bool(true), "True")]
    fn test_format_value(#[case] value: RawValue, #[case] expected: &str) {
        assert_eq!(format_value(&value, "%m/%d/%y").unwrap(), expected);
    }

    #[test]
    fn test_dates_use_view_format() {
        let d = RawValue::Date(NaiveDate::from_ymd_opt(2011, 3, 9).unwrap());
        assert_eq!(format_value(&d, "%m/%d/%y").unwrap(), "03/09/11");
        assert_eq!(format_value(&d, "%Y-%m-%d").unwrap(), "2011-03-09");
    }

    #[test]
    fn test_invalid_time_format() {
        let d = RawValue::Date(NaiveDate::from_ymd_opt(2011, 3, 9).unwrap());
        assert!(matches!(format_value(&d, "%Y %"), Err(ComputationError::InvalidTimeFormat { .. })));
    }

    #[test]
    fn test_absent_cell_is_empty() {
        assert_eq!(format_cell(None, "%m/%d/%y").unwrap(), "");
    }
}
