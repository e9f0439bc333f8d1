//! Column type inference and cell coercion.

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellClass {
    Bool,
    Int,
    Float,
    Text,
}

fn classify(v: &Value) -> Option<CellClass> {
    match v {
        Value::Null => None,
        Value::Bool(_) => Some(CellClass::Bool),
        Value::Int64(_) => Some(CellClass::Int),
        Value::Float64(f) if f.is_finite() => Some(CellClass::Float),
        Value::Float64(_) => Some(CellClass::Text),
        Value::Utf8(s) => Some(classify_text(s)),
    }
}

fn classify_text(s: &str) -> CellClass {
    let s = s.trim();
    if parse_bool(s).is_some() {
        CellClass::Bool
    } else if has_leading_zero(s) {
        // Identifiers like zip codes lose meaning as numbers.
        CellClass::Text
    } else if s.parse::<i64>().is_ok() {
        CellClass::Int
    } else if parse_finite_f64(s).is_some() {
        CellClass::Float
    } else {
        CellClass::Text
    }
}

fn has_leading_zero(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.")
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_finite_f64(s: &str) -> Option<f64> {
    // Reject spellings like "inf" / "NaN" that `f64::from_str` accepts.
    if !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Infer the column type from its cells.
///
/// Null cells are ignored. A column is [`DataType::Bool`] if every cell is boolean,
/// [`DataType::Int64`] if every cell is an integer, [`DataType::Float64`] if every cell is
/// numeric, and [`DataType::Utf8`] otherwise (including all-null columns).
pub fn infer_column_type<'a>(cells: impl IntoIterator<Item = &'a Value>) -> DataType {
    let mut acc: Option<CellClass> = None;
    for class in cells.into_iter().filter_map(classify) {
        acc = Some(match (acc, class) {
            (None, c) => c,
            (Some(a), c) if a == c => a,
            (Some(CellClass::Int), CellClass::Float) | (Some(CellClass::Float), CellClass::Int) => {
                CellClass::Float
            }
            _ => return DataType::Utf8,
        });
    }
    match acc {
        Some(CellClass::Bool) => DataType::Bool,
        Some(CellClass::Int) => DataType::Int64,
        Some(CellClass::Float) => DataType::Float64,
        Some(CellClass::Text) | None => DataType::Utf8,
    }
}

/// Coerce one cell to `data_type`.
///
/// Fails with a value error if the cell cannot be represented, which can only happen when
/// `data_type` was not inferred from the same column.
pub fn coerce(value: Value, data_type: DataType) -> IngestionResult<Value> {
    let mismatch = |v: &Value| {
        IngestionError::value(format!("cannot store '{v}' in a {data_type:?} column"))
    };
    match (value, data_type) {
        (Value::Null, _) => Ok(Value::Null),
        (v @ Value::Utf8(_), DataType::Utf8) => Ok(v),
        (v, DataType::Utf8) => Ok(Value::Utf8(v.to_string())),

        (Value::Bool(b), DataType::Bool) => Ok(Value::Bool(b)),
        (Value::Utf8(s), DataType::Bool) => match parse_bool(s.trim()) {
            Some(b) => Ok(Value::Bool(b)),
            None => Err(mismatch(&Value::Utf8(s))),
        },

        (Value::Int64(i), DataType::Int64) => Ok(Value::Int64(i)),
        (Value::Utf8(s), DataType::Int64) => match s.trim().parse::<i64>() {
            Ok(i) => Ok(Value::Int64(i)),
            Err(_) => Err(mismatch(&Value::Utf8(s))),
        },

        (Value::Float64(f), DataType::Float64) => Ok(Value::Float64(f)),
        (Value::Int64(i), DataType::Float64) => Ok(Value::Float64(i as f64)),
        (Value::Utf8(s), DataType::Float64) => match parse_finite_f64(s.trim()) {
            Some(f) => Ok(Value::Float64(f)),
            None => Err(mismatch(&Value::Utf8(s))),
        },

        (v, _) => Err(mismatch(&v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Utf8(s.to_string())
    }

    #[test]
    fn integers_and_floats_widen_to_real() {
        let cells = vec![text("1"), Value::Null, Value::Float64(2.5)];
        assert_eq!(infer_column_type(&cells), DataType::Float64);
    }

    #[test]
    fn leading_zeros_stay_text() {
        let cells = vec![text("02134"), text("10001")];
        assert_eq!(infer_column_type(&cells), DataType::Utf8);
        assert_eq!(infer_column_type(&[text("0"), text("-3")]), DataType::Int64);
        assert_eq!(infer_column_type(&[text("0.5")]), DataType::Float64);
    }

    #[test]
    fn special_float_spellings_are_text() {
        assert_eq!(infer_column_type(&[text("NaN"), text("1")]), DataType::Utf8);
        assert_eq!(infer_column_type(&[text("inf")]), DataType::Utf8);
    }

    #[test]
    fn booleans_and_all_null() {
        assert_eq!(infer_column_type(&[text("TRUE"), Value::Bool(false)]), DataType::Bool);
        assert_eq!(infer_column_type(&[text("true"), text("1")]), DataType::Utf8);
        assert_eq!(infer_column_type(&[Value::Null]), DataType::Utf8);
    }

    #[test]
    fn coerce_follows_column_type() {
        assert_eq!(coerce(text(" 42 "), DataType::Int64).unwrap(), Value::Int64(42));
        assert_eq!(coerce(Value::Int64(3), DataType::Float64).unwrap(), Value::Float64(3.0));
        assert_eq!(coerce(Value::Int64(3), DataType::Utf8).unwrap(), text("3"));
        assert!(coerce(text("x"), DataType::Int64).is_err());
    }
}
