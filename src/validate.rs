//! Structural and semantic validation of a parsed plan descriptor.
//!
//! Validation is all-or-nothing: a plan with any hard finding must never
//! reach the synthesizer. Soft findings (optional-parameter consistency) are
//! reported as warnings and never invalidate the plan. That asymmetry is
//! deliberate and mirrors the two-tier strictness of the pipeline: one hard
//! gate here, then per-step degradation during synthesis.

use std::fmt;

use tracing::warn;

use crate::types::{
    PlanDescriptor, StepDescriptor, StepKind, P_ACTION, P_DELAY_SECS, P_DIMENSION_TITLES,
    P_INSTRUMENT, P_MATCH_PATTERN, P_QUERY, P_RESULT_BEHAVIOR, P_RESULT_PATTERN,
    P_STOP_ON_TIMEOUT, P_TIMEOUT, P_TIMEOUT_VERDICT, P_VERDICT_ON_MATCH, P_VERDICT_ON_NO_MATCH,
};

/// One validation finding, located by a human-readable step path such as
/// `step 2 > child 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Everything validation found. The plan is usable only when `errors` is
/// empty; `warnings` never block it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.into(),
        });
    }

    fn warning(&mut self, path: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(path = %path, "{}", message);
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message,
        });
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", issue)?;
        }
        Ok(())
    }
}

/// Validate a plan against the per-step-type rules, recursively.
pub fn validate_plan(plan: &PlanDescriptor) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    if plan.steps.is_empty() {
        outcome.error("plan", "a plan must contain at least one step");
    }

    for (index, step) in plan.steps.iter().enumerate() {
        validate_step(step, &format!("step {}", index + 1), &mut outcome);
    }

    outcome
}

fn validate_step(step: &StepDescriptor, path: &str, outcome: &mut ValidationOutcome) {
    let Some(kind) = StepKind::parse(&step.step_type) else {
        outcome.error(path, format!("unknown step type \"{}\"", step.step_type));
        return;
    };

    if kind != StepKind::TimeGuard && !step.children.is_empty() {
        outcome.error(
            path,
            format!("a {} step cannot have child steps", kind.wire_name()),
        );
    }

    match kind {
        StepKind::Scpi => validate_scpi(step, path, outcome),
        StepKind::Delay => validate_delay(step, path, outcome),
        StepKind::TimeGuard => validate_guard(step, path, outcome),
    }
}

fn validate_scpi(step: &StepDescriptor, path: &str, outcome: &mut ValidationOutcome) {
    for required in [P_ACTION, P_QUERY, P_INSTRUMENT] {
        if step.param(required).is_none() {
            outcome.error(path, format!("missing required parameter \"{}\"", required));
        }
    }

    // Soft consistency checks. These flag likely mistakes in the generated
    // plan but the step is still usable, so they are warnings only.
    if step.param(P_MATCH_PATTERN).is_some()
        && (step.param(P_VERDICT_ON_MATCH).is_none()
            || step.param(P_VERDICT_ON_NO_MATCH).is_none())
    {
        outcome.warning(
            path,
            format!(
                "\"{}\" given without both \"{}\" and \"{}\"",
                P_MATCH_PATTERN, P_VERDICT_ON_MATCH, P_VERDICT_ON_NO_MATCH
            ),
        );
    }
    if step.param(P_RESULT_PATTERN).is_some() && step.param(P_RESULT_BEHAVIOR).is_none() {
        outcome.warning(
            path,
            format!(
                "\"{}\" given without \"{}\"",
                P_RESULT_PATTERN, P_RESULT_BEHAVIOR
            ),
        );
    }
    if step.param(P_DIMENSION_TITLES).is_some()
        && (step.param(P_RESULT_PATTERN).is_none() || step.param(P_RESULT_BEHAVIOR).is_none())
    {
        outcome.warning(
            path,
            format!(
                "\"{}\" given without \"{}\" and \"{}\"",
                P_DIMENSION_TITLES, P_RESULT_PATTERN, P_RESULT_BEHAVIOR
            ),
        );
    }
}

fn validate_delay(step: &StepDescriptor, path: &str, outcome: &mut ValidationOutcome) {
    match step.param(P_DELAY_SECS) {
        None => outcome.error(path, format!("missing required parameter \"{}\"", P_DELAY_SECS)),
        Some(value) if value.as_num().is_none() => {
            outcome.error(path, format!("parameter \"{}\" must be numeric", P_DELAY_SECS))
        }
        Some(_) => {}
    }
}

fn validate_guard(step: &StepDescriptor, path: &str, outcome: &mut ValidationOutcome) {
    match step.param(P_TIMEOUT) {
        None => outcome.error(path, format!("missing required parameter \"{}\"", P_TIMEOUT)),
        Some(value) if value.as_num().is_none() => {
            outcome.error(path, format!("parameter \"{}\" must be numeric", P_TIMEOUT))
        }
        Some(_) => {}
    }
    match step.param(P_STOP_ON_TIMEOUT) {
        None => outcome.error(
            path,
            format!("missing required parameter \"{}\"", P_STOP_ON_TIMEOUT),
        ),
        Some(value) if value.as_bool().is_none() => outcome.error(
            path,
            format!("parameter \"{}\" must be a boolean", P_STOP_ON_TIMEOUT),
        ),
        Some(_) => {}
    }
    if step.param(P_TIMEOUT_VERDICT).is_none() {
        outcome.error(
            path,
            format!("missing required parameter \"{}\"", P_TIMEOUT_VERDICT),
        );
    }

    if step.children.is_empty() {
        outcome.error(path, "a TimeGuard step must contain at least one child step");
    }
    for (index, child) in step.children.iter().enumerate() {
        validate_step(child, &format!("{} > child {}", path, index + 1), outcome);
    }
}
