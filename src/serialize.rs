//! The inverse direction: live step tree back to descriptor form.
//!
//! Serialization exists so the current plan state can be embedded as context
//! in the next prompt. Order is assigned 1-based by position, not read from
//! any stored field, and explanations are emitted empty since they are
//! regenerated fresh each cycle.

use serde_json::{json, Value};

use crate::live::{LivePlan, LiveStep};
use crate::types::{
    PlanDescriptor, StepDescriptor, StepKind, KEY_CHILD_STEPS, KEY_EXPLANATION, KEY_PARAMETERS,
    KEY_STEPS, KEY_STEP_ORDER, KEY_STEP_TYPE, P_ACTION, P_DELAY_SECS, P_DIMENSION_TITLES,
    P_INSTRUMENT, P_MATCH_PATTERN, P_QUERY, P_RESULT_BEHAVIOR, P_RESULT_PATTERN,
    P_STOP_ON_TIMEOUT, P_TIMEOUT, P_TIMEOUT_VERDICT, P_VERDICT_ON_MATCH, P_VERDICT_ON_NO_MATCH,
};

/// Serialize a live tree back into descriptor form.
pub fn serialize_plan<H>(tree: &LivePlan<H>) -> PlanDescriptor {
    PlanDescriptor {
        steps: serialize_steps(&tree.steps),
        explanations: Vec::new(),
    }
}

fn serialize_steps<H>(steps: &[LiveStep<H>]) -> Vec<StepDescriptor> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| serialize_step(step, index as i64 + 1))
        .collect()
}

fn serialize_step<H>(step: &LiveStep<H>, order: i64) -> StepDescriptor {
    match step {
        LiveStep::Scpi(scpi) => {
            let mut descriptor = StepDescriptor::new(order, StepKind::Scpi)
                .with_param(P_ACTION, scpi.action.as_str())
                .with_param(P_QUERY, scpi.command.clone())
                .with_param(P_INSTRUMENT, scpi.instrument_name.clone());
            if let Some(rule) = &scpi.match_rule {
                descriptor = descriptor
                    .with_param(P_MATCH_PATTERN, rule.pattern.clone())
                    .with_param(P_VERDICT_ON_MATCH, rule.on_match.as_str())
                    .with_param(P_VERDICT_ON_NO_MATCH, rule.on_no_match.as_str());
            }
            if let Some(capture) = &scpi.capture {
                descriptor = descriptor
                    .with_param(P_RESULT_PATTERN, capture.pattern.clone())
                    .with_param(P_RESULT_BEHAVIOR, capture.behavior.as_str());
                if let Some(titles) = &capture.dimension_titles {
                    descriptor = descriptor.with_param(P_DIMENSION_TITLES, titles.clone());
                }
            }
            descriptor
        }
        LiveStep::Delay(delay) => StepDescriptor::new(order, StepKind::Delay)
            .with_param(P_DELAY_SECS, delay.seconds),
        LiveStep::TimeGuard(guard) => {
            let mut descriptor = StepDescriptor::new(order, StepKind::TimeGuard)
                .with_param(P_TIMEOUT, guard.timeout_secs)
                .with_param(P_STOP_ON_TIMEOUT, guard.stop_on_timeout)
                .with_param(P_TIMEOUT_VERDICT, guard.timeout_verdict.as_str());
            descriptor.children = serialize_steps(&guard.children);
            descriptor
        }
    }
}

/// Render a descriptor as wire JSON, ready to embed in the next prompt.
pub fn plan_to_json(plan: &PlanDescriptor) -> Value {
    json!({
        (KEY_STEPS): plan.steps.iter().map(step_to_json).collect::<Vec<Value>>(),
        (KEY_EXPLANATION): plan.explanations,
    })
}

/// Pretty-printed form of [`plan_to_json`].
pub fn plan_to_json_string(plan: &PlanDescriptor) -> String {
    serde_json::to_string_pretty(&plan_to_json(plan))
        .expect("a JSON value always serializes")
}

fn step_to_json(step: &StepDescriptor) -> Value {
    let params: serde_json::Map<String, Value> = step
        .params
        .iter()
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect();
    let mut object = json!({
        (KEY_STEP_ORDER): step.order,
        (KEY_STEP_TYPE): step.step_type,
        (KEY_PARAMETERS): params,
    });
    if !step.children.is_empty() {
        object[KEY_CHILD_STEPS] = step
            .children
            .iter()
            .map(step_to_json)
            .collect::<Vec<Value>>()
            .into();
    }
    object
}
