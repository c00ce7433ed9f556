// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request parameters and their declared schemas.
//
// Parameters arrive as a flat string map (form fields or JSON scalars).
// Every operation declares a `ParamSpec` list; values are read through the
// spec so defaults and bounds live in one place.

use std::collections::BTreeMap;

use pexel_core::error::{PexelError, Result};
use serde::Serialize;
use serde_json::Value;

/// Shape and bounds of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    Text { min_chars: usize, max_chars: usize },
    /// Like `Text` but never echoed back in errors.
    Secret { min_chars: usize },
    Integer { min: i64, max: i64 },
    Number { min: f64, max: f64 },
    Choice { options: &'static [&'static str] },
    /// A page range expression such as `1-3,5` or `all`.
    PageRange,
}

/// Declared parameter of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: ParamKind,
    /// Used when the caller omits the parameter.  `None` with
    /// `required == false` means "absent".
    pub default: Option<&'static str>,
    pub required: bool,
    pub description: &'static str,
}

/// Accepted by every operation: lifetime of the output artifact.
pub const TTL_SECONDS: ParamSpec = ParamSpec {
    name: "ttl_seconds",
    kind: ParamKind::Integer { min: 1, max: 86_400 },
    default: None,
    required: false,
    description: "Lifetime of the output artifact in seconds",
};

/// Caller-supplied parameters, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(BTreeMap<String, String>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flatten a JSON object of scalars.  `null` entries are treated as
    /// absent; arrays and objects are rejected.
    pub fn from_json(object: serde_json::Map<String, Value>) -> Result<Self> {
        let mut params = Self::new();
        for (name, value) in object {
            let text = match value {
                Value::Null => continue,
                Value::String(text) => text,
                Value::Bool(flag) => flag.to_string(),
                Value::Number(number) => number.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(PexelError::invalid(name, "expected a scalar value"));
                }
            };
            params.insert(name, text);
        }
        Ok(params)
    }

    /// Reject any parameter not declared in `specs`.
    pub fn reject_unknown(&self, specs: &[ParamSpec]) -> Result<()> {
        match self
            .names()
            .find(|name| *name != TTL_SECONDS.name && !specs.iter().any(|spec| spec.name == *name))
        {
            Some(name) => Err(PexelError::invalid(name, "unknown parameter")),
            None => Ok(()),
        }
    }

    fn raw<'a>(&'a self, spec: &ParamSpec) -> Result<Option<&'a str>> {
        match self.get(spec.name).or(spec.default) {
            Some(value) => Ok(Some(value)),
            None if spec.required => Err(PexelError::invalid(spec.name, "is required")),
            None => Ok(None),
        }
    }

    /// Read a `Text` or `Secret` parameter.
    pub fn text(&self, spec: &ParamSpec) -> Result<Option<String>> {
        let Some(value) = self.raw(spec)? else {
            return Ok(None);
        };
        let chars = value.chars().count();
        match spec.kind {
            ParamKind::Text {
                min_chars,
                max_chars,
            } => {
                if chars < min_chars || chars > max_chars {
                    return Err(PexelError::invalid(
                        spec.name,
                        format!("length must be between {min_chars} and {max_chars} characters"),
                    ));
                }
            }
            ParamKind::Secret { min_chars } => {
                if chars < min_chars {
                    return Err(PexelError::invalid(
                        spec.name,
                        format!("must be at least {min_chars} characters"),
                    ));
                }
            }
            _ => return Err(kind_mismatch(spec)),
        }
        Ok(Some(value.to_string()))
    }

    /// Read an `Integer` parameter.
    pub fn integer(&self, spec: &ParamSpec) -> Result<Option<i64>> {
        let ParamKind::Integer { min, max } = spec.kind else {
            return Err(kind_mismatch(spec));
        };
        let Some(value) = self.raw(spec)? else {
            return Ok(None);
        };
        let parsed: i64 = value
            .trim()
            .parse()
            .map_err(|_| PexelError::invalid(spec.name, format!("{value:?} is not an integer")))?;
        if parsed < min || parsed > max {
            return Err(PexelError::invalid(
                spec.name,
                format!("{parsed} is outside {min}..={max}"),
            ));
        }
        Ok(Some(parsed))
    }

    /// Read a `Number` parameter.
    pub fn number(&self, spec: &ParamSpec) -> Result<Option<f64>> {
        let ParamKind::Number { min, max } = spec.kind else {
            return Err(kind_mismatch(spec));
        };
        let Some(value) = self.raw(spec)? else {
            return Ok(None);
        };
        let parsed: f64 = value
            .trim()
            .parse()
            .map_err(|_| PexelError::invalid(spec.name, format!("{value:?} is not a number")))?;
        if !parsed.is_finite() || parsed < min || parsed > max {
            return Err(PexelError::invalid(
                spec.name,
                format!("{value} is outside [{min}, {max}]"),
            ));
        }
        Ok(Some(parsed))
    }

    /// Read a `Choice` parameter, lower-cased.
    pub fn choice(&self, spec: &ParamSpec) -> Result<Option<String>> {
        let ParamKind::Choice { options } = spec.kind else {
            return Err(kind_mismatch(spec));
        };
        let Some(value) = self.raw(spec)? else {
            return Ok(None);
        };
        let normalised = value.trim().to_ascii_lowercase();
        if options.contains(&normalised.as_str()) {
            Ok(Some(normalised))
        } else {
            Err(PexelError::invalid(
                spec.name,
                format!("{value:?} is not one of {}", options.join(", ")),
            ))
        }
    }

    /// Read a `PageRange` expression.  Syntax is checked later, against the
    /// document's page count.
    pub fn page_range(&self, spec: &ParamSpec) -> Result<Option<String>> {
        let ParamKind::PageRange = spec.kind else {
            return Err(kind_mismatch(spec));
        };
        Ok(self.raw(spec)?.map(str::to_string))
    }

    /// The output TTL override, if any.
    pub fn ttl_seconds(&self) -> Result<Option<u64>> {
        Ok(self.integer(&TTL_SECONDS)?.map(|ttl| ttl as u64))
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// A value that exists in the schema but is read through the wrong accessor.
fn kind_mismatch(spec: &ParamSpec) -> PexelError {
    PexelError::invalid(spec.name, "parameter schema mismatch")
}

/// Shorthand for a non-required spec with a default.
pub(crate) const fn optional(
    name: &'static str,
    kind: ParamKind,
    default: &'static str,
    description: &'static str,
) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        default: Some(default),
        required: false,
        description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DPI: ParamSpec = optional("dpi", ParamKind::Integer { min: 36, max: 600 }, "150", "");
    const OPACITY: ParamSpec = optional("opacity", ParamKind::Number { min: 0.0, max: 1.0 }, "0.3", "");
    const MODE: ParamSpec = optional(
        "mode",
        ParamKind::Choice {
            options: &["extract", "burst"],
        },
        "extract",
        "",
    );
    const PASSWORD: ParamSpec = ParamSpec {
        name: "password",
        kind: ParamKind::Secret { min_chars: 4 },
        default: None,
        required: true,
        description: "",
    };

    #[test]
    fn defaults_apply_when_absent() {
        let params = Parameters::new();
        assert_eq!(params.integer(&DPI).unwrap(), Some(150));
        assert_eq!(params.number(&OPACITY).unwrap(), Some(0.3));
        assert_eq!(params.choice(&MODE).unwrap().as_deref(), Some("extract"));
        assert_eq!(params.ttl_seconds().unwrap(), None);
    }

    #[test]
    fn bounds_are_enforced() {
        let params = Parameters::new().with("dpi", "1000").with("opacity", "1.5");
        assert_eq!(params.integer(&DPI).unwrap_err().code(), "INVALID_PARAMETER");
        assert!(params.number(&OPACITY).is_err());

        let params = Parameters::new().with("opacity", "NaN");
        assert!(params.number(&OPACITY).is_err());

        let params = Parameters::new().with("ttl_seconds", "0");
        assert!(params.ttl_seconds().is_err());
    }

    #[test]
    fn choices_are_case_insensitive() {
        let params = Parameters::new().with("mode", "BURST");
        assert_eq!(params.choice(&MODE).unwrap().as_deref(), Some("burst"));
        let params = Parameters::new().with("mode", "shred");
        let err = params.choice(&MODE).unwrap_err();
        assert!(err.to_string().contains("extract, burst"), "{err}");
    }

    #[test]
    fn required_secret_is_checked_without_echo() {
        let err = Parameters::new().text(&PASSWORD).unwrap_err();
        assert!(err.to_string().contains("required"));

        let err = Parameters::new()
            .with("password", "abc")
            .text(&PASSWORD)
            .unwrap_err();
        assert!(!err.to_string().contains("abc"));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let params = Parameters::new().with("dpi", "72").with("colour", "red");
        let err = params.reject_unknown(&[DPI]).unwrap_err();
        assert!(err.to_string().contains("colour"));
        assert!(
            Parameters::new()
                .with("ttl_seconds", "5")
                .reject_unknown(&[DPI])
                .is_ok()
        );
    }

    #[test]
    fn json_scalars_flatten_to_strings() {
        let Value::Object(object) = json!({"angle": 90, "opacity": 0.5, "flag": true, "gone": null}) else {
            unreachable!()
        };
        let params = Parameters::from_json(object).unwrap();
        assert_eq!(params.get("angle"), Some("90"));
        assert_eq!(params.get("opacity"), Some("0.5"));
        assert_eq!(params.get("flag"), Some("true"));
        assert_eq!(params.get("gone"), None);

        let Value::Object(object) = json!({"pages": [1, 2]}) else {
            unreachable!()
        };
        assert!(Parameters::from_json(object).is_err());
    }
}
