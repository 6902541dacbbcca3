//! Synthesis of a live step tree from a validated plan descriptor.
//!
//! Synthesis is deliberately permissive where validation is strict: a single
//! malformed step is skipped with a warning while the rest of the plan is
//! still built, because one bad step in a large generated batch should not
//! discard the others. Callers are expected to run `validate_plan` first;
//! the per-step checks here exist for descriptors built programmatically.

use std::fmt;

use tracing::warn;

use crate::live::{
    DelayStep, InstrumentBindings, LivePlan, LiveStep, MatchRule, ResultCapture, ScpiStep,
    TimeGuardStep,
};
use crate::types::{
    CaptureBehavior, ParamValue, PlanDescriptor, ScpiAction, StepDescriptor, StepKind, Verdict,
    P_ACTION, P_DELAY_SECS, P_DIMENSION_TITLES, P_INSTRUMENT, P_MATCH_PATTERN, P_QUERY,
    P_RESULT_BEHAVIOR, P_RESULT_PATTERN, P_STOP_ON_TIMEOUT, P_TIMEOUT, P_TIMEOUT_VERDICT,
    P_VERDICT_ON_MATCH, P_VERDICT_ON_NO_MATCH,
};

const LABEL_COMMAND_CHARS: usize = 32;

/// A non-fatal synthesis finding: a skipped step or an unresolved
/// instrument. The plan as a whole still builds.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisWarning {
    pub path: String,
    pub detail: String,
}

impl fmt::Display for SynthesisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.detail)
    }
}

/// Rebuild `tree` from `plan`, replacing its existing top-level steps.
///
/// Steps are built in `order` sequence regardless of array position.
/// Instrument names resolve against `bindings`, falling back to
/// `default_instrument`, and finally to an unbound step with a warning.
/// Returns the warnings accumulated across the whole plan.
pub fn synthesize_plan<H: Clone>(
    tree: &mut LivePlan<H>,
    plan: &PlanDescriptor,
    bindings: &InstrumentBindings<H>,
    default_instrument: &str,
) -> Vec<SynthesisWarning> {
    let mut warnings = Vec::new();
    tree.steps = build_steps(&plan.steps, "", bindings, default_instrument, &mut warnings);
    warnings
}

/// Build one sibling list, sorted by `order`. Array position breaks ties.
fn build_steps<H: Clone>(
    descriptors: &[StepDescriptor],
    parent_path: &str,
    bindings: &InstrumentBindings<H>,
    default_instrument: &str,
    warnings: &mut Vec<SynthesisWarning>,
) -> Vec<LiveStep<H>> {
    let mut ordered: Vec<&StepDescriptor> = descriptors.iter().collect();
    ordered.sort_by_key(|step| step.order);

    let mut built = Vec::with_capacity(ordered.len());
    for (index, descriptor) in ordered.iter().enumerate() {
        let path = if parent_path.is_empty() {
            format!("step {}", index + 1)
        } else {
            format!("{} > child {}", parent_path, index + 1)
        };
        match build_step(descriptor, &path, bindings, default_instrument, warnings) {
            Ok(step) => built.push(step),
            Err(detail) => {
                // Skip this step only; the rest of the plan still builds.
                warn!(path = %path, "skipping step: {}", detail);
                warnings.push(SynthesisWarning { path, detail });
            }
        }
    }
    built
}

fn build_step<H: Clone>(
    descriptor: &StepDescriptor,
    path: &str,
    bindings: &InstrumentBindings<H>,
    default_instrument: &str,
    warnings: &mut Vec<SynthesisWarning>,
) -> Result<LiveStep<H>, String> {
    match StepKind::parse(&descriptor.step_type) {
        Some(StepKind::Scpi) => {
            build_scpi(descriptor, path, bindings, default_instrument, warnings)
                .map(LiveStep::Scpi)
        }
        Some(StepKind::Delay) => build_delay(descriptor).map(LiveStep::Delay),
        Some(StepKind::TimeGuard) => {
            build_guard(descriptor, path, bindings, default_instrument, warnings)
                .map(LiveStep::TimeGuard)
        }
        None => Err(format!("unknown step type \"{}\"", descriptor.step_type)),
    }
}

fn build_scpi<H: Clone>(
    descriptor: &StepDescriptor,
    path: &str,
    bindings: &InstrumentBindings<H>,
    default_instrument: &str,
    warnings: &mut Vec<SynthesisWarning>,
) -> Result<ScpiStep<H>, String> {
    let action = parse_symbol(descriptor, P_ACTION, ScpiAction::parse)?
        .ok_or_else(|| missing(P_ACTION))?;
    let command = sanitize_command(
        descriptor
            .param_str(P_QUERY)
            .ok_or_else(|| missing(P_QUERY))?,
    );
    let instrument_name = descriptor
        .param_str(P_INSTRUMENT)
        .ok_or_else(|| missing(P_INSTRUMENT))?
        .to_string();

    // Resolution order: the requested name, then the default instrument,
    // then unbound with a warning. An unresolved instrument never skips the
    // step.
    let instrument = bindings
        .get(&instrument_name)
        .or_else(|| bindings.get(default_instrument))
        .cloned();
    if instrument.is_none() {
        let detail = format!(
            "instrument \"{}\" not found and default \"{}\" is not configured; step left unbound",
            instrument_name, default_instrument
        );
        warn!(path = %path, "{}", detail);
        warnings.push(SynthesisWarning {
            path: path.to_string(),
            detail,
        });
    }

    let match_rule = match descriptor.param_str(P_MATCH_PATTERN) {
        Some(pattern) => Some(MatchRule {
            pattern: pattern.to_string(),
            on_match: parse_symbol(descriptor, P_VERDICT_ON_MATCH, Verdict::parse)?
                .unwrap_or(Verdict::Pass),
            on_no_match: parse_symbol(descriptor, P_VERDICT_ON_NO_MATCH, Verdict::parse)?
                .unwrap_or(Verdict::Fail),
        }),
        None => None,
    };

    let capture = match descriptor.param_str(P_RESULT_PATTERN) {
        Some(pattern) => Some(ResultCapture {
            pattern: pattern.to_string(),
            behavior: parse_symbol(descriptor, P_RESULT_BEHAVIOR, CaptureBehavior::parse)?
                .unwrap_or(CaptureBehavior::Text),
            dimension_titles: descriptor
                .param_str(P_DIMENSION_TITLES)
                .map(str::to_string),
        }),
        None => None,
    };

    let label = format!("{} {}", action.as_str(), truncate(&command, LABEL_COMMAND_CHARS));

    Ok(ScpiStep {
        label,
        action,
        command,
        instrument_name,
        instrument,
        match_rule,
        capture,
    })
}

fn build_delay(descriptor: &StepDescriptor) -> Result<DelayStep, String> {
    let seconds = descriptor
        .param_num(P_DELAY_SECS)
        .ok_or_else(|| missing(P_DELAY_SECS))?;
    Ok(DelayStep {
        label: format!("Delay {}s", seconds),
        seconds,
    })
}

fn build_guard<H: Clone>(
    descriptor: &StepDescriptor,
    path: &str,
    bindings: &InstrumentBindings<H>,
    default_instrument: &str,
    warnings: &mut Vec<SynthesisWarning>,
) -> Result<TimeGuardStep<H>, String> {
    let timeout_secs = descriptor
        .param_num(P_TIMEOUT)
        .ok_or_else(|| missing(P_TIMEOUT))?;
    let stop_on_timeout = descriptor
        .param_bool(P_STOP_ON_TIMEOUT)
        .ok_or_else(|| missing(P_STOP_ON_TIMEOUT))?;
    let timeout_verdict = parse_symbol(descriptor, P_TIMEOUT_VERDICT, Verdict::parse)?
        .ok_or_else(|| missing(P_TIMEOUT_VERDICT))?;

    let children = build_steps(
        &descriptor.children,
        path,
        bindings,
        default_instrument,
        warnings,
    );

    Ok(TimeGuardStep {
        label: format!("Guard {}s", timeout_secs),
        timeout_secs,
        stop_on_timeout,
        timeout_verdict,
        children,
    })
}

/// Read an enum-like string parameter. Absent is `Ok(None)`; present but
/// unrecognized is a hard failure for the step.
fn parse_symbol<T>(
    descriptor: &StepDescriptor,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, String> {
    match descriptor.param(key) {
        None => Ok(None),
        Some(ParamValue::Str(raw)) => parse(raw)
            .map(Some)
            .ok_or_else(|| format!("unrecognized value \"{}\" for parameter \"{}\"", raw, key)),
        Some(_) => Err(format!("parameter \"{}\" must be a string", key)),
    }
}

fn missing(key: &str) -> String {
    format!("missing required parameter \"{}\"", key)
}

/// Strip inline comments (`#` or `//`) from generated command text, then
/// trim. Models occasionally annotate commands in place.
fn sanitize_command(raw: &str) -> String {
    let mut end = raw.len();
    if let Some(pos) = raw.find('#') {
        end = end.min(pos);
    }
    if let Some(pos) = raw.find("//") {
        end = end.min(pos);
    }
    raw[..end].trim().to_string()
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
