//! Typed access to step parameters.

use crate::error::{StepError, StepResult};
use serde_json::Value;
use std::time::Duration;
use trawl_recipe::StepParams;

pub fn str_param<'a>(params: &'a StepParams, name: &str) -> Option<&'a str> {
    params.get(name).and_then(Value::as_str)
}

pub fn required_str<'a>(params: &'a StepParams, name: &str) -> StepResult<&'a str> {
    str_param(params, name)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| StepError::InvalidParams(format!("'{name}' is required")))
}

/// A string or an array of strings.
pub fn string_list(params: &StepParams, name: &str) -> Option<Vec<String>> {
    match params.get(name)? {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect(),
        ),
        _ => None,
    }
}

pub fn bool_param(params: &StepParams, name: &str, default: bool) -> bool {
    params.get(name).and_then(Value::as_bool).unwrap_or(default)
}

pub fn usize_param(params: &StepParams, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(default)
}

pub fn f64_param(params: &StepParams, name: &str) -> Option<f64> {
    params.get(name).and_then(Value::as_f64)
}

/// Seconds parameter as a duration.
pub fn secs_param(params: &StepParams, name: &str) -> Option<Duration> {
    f64_param(params, name)
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Validation helper: `name` must be present as a non-empty string.
pub fn expect_str(params: &StepParams, name: &str) -> Result<(), String> {
    match str_param(params, name) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        Some(_) => Err(format!("'{name}' cannot be empty")),
        None => Err(format!("'{name}' is required")),
    }
}

/// Validation helper: `name`, when present, must be one of `allowed`.
pub fn expect_one_of(params: &StepParams, name: &str, allowed: &[&str]) -> Result<(), String> {
    match params.get(name) {
        None => Ok(()),
        Some(Value::String(s)) if allowed.contains(&s.as_str()) => Ok(()),
        Some(other) => Err(format!(
            "'{name}' must be one of {}, got {other}",
            allowed.join(", ")
        )),
    }
}
