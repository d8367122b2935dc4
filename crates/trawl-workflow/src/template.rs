//! `{placeholder}` resolution in step parameters.
//!
//! Placeholders name a run parameter or an extracted field; `{name[i]}`
//! indexes into an extracted array. Unresolved placeholders stay verbatim.

use crate::context::ExecutionContext;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use trawl_recipe::StepParams;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)(?:\[(\d+)\])?\}").expect("placeholder regex is valid")
});

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lookup(ctx: &ExecutionContext, name: &str, index: Option<usize>) -> Option<String> {
    match index {
        None => ctx
            .params
            .get(name)
            .cloned()
            .or_else(|| ctx.results.get(name).and_then(scalar)),
        Some(i) => match ctx.results.get(name)? {
            Value::Array(items) => items.get(i).and_then(scalar),
            _ => None,
        },
    }
}

/// Substitute every resolvable placeholder in `template`.
pub fn resolve(template: &str, ctx: &ExecutionContext) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let index = caps.get(2).and_then(|m| m.as_str().parse().ok());
            lookup(ctx, &caps[1], index).unwrap_or_else(|| {
                tracing::debug!(placeholder = &caps[0], "unresolved placeholder");
                caps[0].to_string()
            })
        })
        .into_owned()
}

/// Resolve placeholders in every string inside `value`.
pub fn resolve_value(value: &Value, ctx: &ExecutionContext) -> Value {
    match value {
        Value::String(s) => Value::String(resolve(s, ctx)),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, ctx)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

pub fn resolve_params(params: &StepParams, ctx: &ExecutionContext) -> StepParams {
    params
        .iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, ctx)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new("035585499741", "https://shop.test")
            .with_params([("username", "buyer")]);
        ctx.set("variant_urls", json!(["/p/1", "/p/2"]));
        ctx.set("brand", "Acme");
        ctx
    }

    #[test]
    fn test_resolves_params_fields_and_indexes() {
        let ctx = ctx();
        assert_eq!(
            resolve("{base_url}/search?q={sku}", &ctx),
            "https://shop.test/search?q=035585499741"
        );
        assert_eq!(resolve("{brand} by {username}", &ctx), "Acme by buyer");
        assert_eq!(resolve("{base_url}{variant_urls[1]}", &ctx), "https://shop.test/p/2");
    }

    #[test]
    fn test_unresolved_left_verbatim() {
        let ctx = ctx();
        assert_eq!(resolve("{missing} {variant_urls[9]}", &ctx), "{missing} {variant_urls[9]}");
        assert_eq!(resolve("{ not a placeholder }", &ctx), "{ not a placeholder }");
    }

    #[test]
    fn test_resolve_nested_params() {
        let ctx = ctx();
        let params = match json!({"fields": ["{brand}"], "timeout": 5, "url": "{base_url}"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let resolved = resolve_params(&params, &ctx);
        assert_eq!(resolved["fields"], json!(["Acme"]));
        assert_eq!(resolved["timeout"], json!(5));
        assert_eq!(resolved["url"], json!("https://shop.test"));
    }
}
