//! Conversion of extracted JSON text into a `PlanDescriptor`.
//!
//! Parsing is deliberately tolerant of the shapes LLMs actually produce:
//! alternate key casings, missing order values, stray non-object array
//! elements. Anything recoverable is recovered with a warning; only a
//! syntactically broken document or a missing step list is terminal.

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::types::{
    ParamValue, PlanDescriptor, StepDescriptor, StepKind, KEY_CHILD_STEPS, KEY_EXPLANATION,
    KEY_PARAMETERS, KEY_STEPS, KEY_STEP_ORDER, KEY_STEP_TYPE,
};

/// Terminal parse failures. Everything else degrades with a warning.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("response JSON contains no \"{}\" array", KEY_STEPS)]
    MissingSteps,
}

/// Look a key up under its canonical name, then the casings models commonly
/// substitute for it.
fn field<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| obj.get(*name))
}

/// Parse extracted JSON text into a plan descriptor.
pub fn parse_plan(json_text: &str) -> Result<PlanDescriptor, ParseError> {
    let root: Value =
        serde_json::from_str(json_text).map_err(|e| ParseError::MalformedJson(e.to_string()))?;

    let step_values = field(&root, &[KEY_STEPS, "steps"])
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingSteps)?;

    let steps: Vec<StepDescriptor> = step_values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| parse_step(value, index))
        .collect();

    let mut explanations: Vec<String> = field(&root, &[KEY_EXPLANATION, "explanation"])
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    synthesize_missing_explanations(&mut explanations, &steps);

    Ok(PlanDescriptor {
        steps,
        explanations,
    })
}

/// Parse one array element into a step. `index` is the 0-based array
/// position, used as the order fallback and in warnings.
fn parse_step(value: &Value, index: usize) -> Option<StepDescriptor> {
    if !value.is_object() {
        warn!(index, "skipping non-object step entry");
        return None;
    }

    let order = field(value, &[KEY_STEP_ORDER, "stepOrder", "Order", "order"])
        .and_then(as_integer)
        .unwrap_or(index as i64 + 1);

    // A missing type becomes the empty string; the validator reports it.
    let step_type = field(value, &[KEY_STEP_TYPE, "stepType", "Type", "type"])
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut params = IndexMap::new();
    if let Some(raw) = field(value, &[KEY_PARAMETERS, "parameters"]).and_then(Value::as_object) {
        for (key, raw_value) in raw {
            match ParamValue::from_json(raw_value) {
                Some(param) => {
                    params.insert(key.clone(), param);
                }
                None => warn!(index, key = %key, "skipping non-scalar parameter value"),
            }
        }
    }

    // Children are meaningful only on container steps; drop them elsewhere.
    let children = if StepKind::parse(&step_type) == Some(StepKind::TimeGuard) {
        field(value, &[KEY_CHILD_STEPS, "childSteps", "Children", "children"])
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .enumerate()
                    .filter_map(|(child_index, child)| parse_step(child, child_index))
                    .collect()
            })
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    Some(StepDescriptor {
        order,
        step_type,
        params,
        children,
    })
}

/// Accept an integer given either as a JSON integer or an integral float.
fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Fill in explanation entries the model left out: index 0 summarizes the
/// plan, index i + 1 summarizes root step i.
fn synthesize_missing_explanations(explanations: &mut Vec<String>, steps: &[StepDescriptor]) {
    while explanations.len() < steps.len() + 1 {
        if explanations.is_empty() {
            explanations.push(format!(
                "This test plan consists of {} step(s) designed for the connected instrument.",
                steps.len()
            ));
        } else {
            let step = &steps[explanations.len() - 1];
            explanations.push(format!(
                "Step {}: Executes a {} operation.",
                step.order, step.step_type
            ));
        }
    }
}
