use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A concrete hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    // Int before Float: untagged deserialisation tries variants in order.
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
}

impl ParameterValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Json(v) => v.as_f64(),
        }
    }

    /// Integer view; floats qualify only when they carry no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            Self::Float(_) => None,
            Self::Json(v) => v.as_i64(),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

/// Hyperparameter assignment keyed by dimension name.
pub type ParameterSet = BTreeMap<String, ParameterValue>;

/// Render a parameter set as `{a: 1, b: 0.5}` for log lines.
pub fn format_parameters(params: &ParameterSet) -> String {
    let body = params
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{body}}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_values_keep_their_kind() {
        let mut params = ParameterSet::new();
        params.insert("learning_rate".into(), ParameterValue::Float(0.05));
        params.insert("n_estimators".into(), ParameterValue::Int(250));

        let json = serde_json::to_string(&params).unwrap();
        let back: ParameterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn integer_view_rejects_fractions() {
        assert_eq!(ParameterValue::Float(12.0).as_i64(), Some(12));
        assert_eq!(ParameterValue::Float(12.5).as_i64(), None);
        assert_eq!(ParameterValue::Int(3).as_f64(), Some(3.0));
    }

    #[test]
    fn formats_in_name_order() {
        let mut params = ParameterSet::new();
        params.insert("b".into(), ParameterValue::Int(2));
        params.insert("a".into(), ParameterValue::Float(0.5));
        assert_eq!(format_parameters(&params), "{a: 0.5, b: 2}");
    }
}
