//! End-to-end glue: response text in, validated plan descriptor out.
//!
//! Extraction, parsing, and validation are all-or-nothing; any failure here
//! carries human-readable text the caller is expected to surface verbatim
//! alongside the raw response.

use thiserror::Error;

use crate::extract::extract_json;
use crate::parse::{parse_plan, ParseError};
use crate::transport::{request_with_retry, ChatTransport, RetryPolicy};
use crate::types::PlanDescriptor;
use crate::validate::{validate_plan, ValidationOutcome};

const PREVIEW_CHARS: usize = 400;

/// Terminal pipeline failures. Synthesis warnings are not represented here;
/// they degrade per step instead of aborting.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("could not locate a JSON document in the response.\nResponse preview:\n{preview}")]
    NoJson { preview: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("the generated plan failed validation:\n{0}")]
    Invalid(ValidationOutcome),
}

/// Run extraction, parsing, and validation over raw response text.
pub fn plan_from_response(response: &str) -> Result<PlanDescriptor, PlanError> {
    let json_text = extract_json(response).ok_or_else(|| PlanError::NoJson {
        preview: preview(response),
    })?;
    let plan = parse_plan(json_text)?;
    let outcome = validate_plan(&plan);
    if outcome.is_valid() {
        Ok(plan)
    } else {
        Err(PlanError::Invalid(outcome))
    }
}

/// Ask the transport (with retry) and run the full pipeline on its answer.
pub async fn request_plan(
    transport: &dyn ChatTransport,
    prompt: &str,
    policy: &RetryPolicy,
) -> Result<PlanDescriptor, PlanError> {
    let response = request_with_retry(transport, prompt, policy).await;
    plan_from_response(&response)
}

fn preview(response: &str) -> String {
    if response.chars().count() <= PREVIEW_CHARS {
        response.to_string()
    } else {
        let head: String = response.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StepKind, P_INSTRUMENT, P_QUERY};
    use pretty_assertions::assert_eq;

    #[test]
    fn a_fenced_response_parses_end_to_end() {
        let response = "Sure!\n```json\n{\"Steps\":[{\"StepOrder\":1,\"StepType\":\"SCPI\",\"Parameters\":{\"Action\":\"Query\",\"Query\":\"*IDN?\",\"Instrument\":\"DMM\"}}],\"Explanation\":[\"ctx\"]}\n```\n";
        let plan = plan_from_response(response).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(StepKind::parse(&plan.steps[0].step_type), Some(StepKind::Scpi));
        assert_eq!(plan.steps[0].param_str(P_QUERY), Some("*IDN?"));
        assert_eq!(plan.steps[0].param_str(P_INSTRUMENT), Some("DMM"));
    }

    #[test]
    fn prose_without_json_reports_extraction_failure_with_preview() {
        let err = plan_from_response("I am unable to produce a plan.").unwrap_err();
        let PlanError::NoJson { preview } = &err else {
            panic!("expected NoJson, got {err:?}");
        };
        assert!(preview.contains("unable to produce"));
    }

    #[test]
    fn long_responses_are_truncated_in_the_preview() {
        let response = "x".repeat(2_000);
        let err = plan_from_response(&response).unwrap_err();
        let PlanError::NoJson { preview } = &err else {
            panic!("expected NoJson");
        };
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn invalid_plans_surface_every_violation() {
        let response = "{\"Steps\":[{\"StepOrder\":1,\"StepType\":\"Delay\",\"Parameters\":{}},{\"StepOrder\":2,\"StepType\":\"Warp\",\"Parameters\":{}}],\"Explanation\":[]}";
        let err = plan_from_response(response).unwrap_err();
        let PlanError::Invalid(outcome) = &err else {
            panic!("expected Invalid, got {err:?}");
        };
        assert_eq!(outcome.errors.len(), 2);
        let rendered = err.to_string();
        assert!(rendered.contains("DelaySecs"));
        assert!(rendered.contains("Warp"));
    }

    #[test]
    fn malformed_json_propagates_as_a_parse_error() {
        let err = plan_from_response("{\"Steps\": [}").unwrap_err();
        assert!(matches!(err, PlanError::Parse(ParseError::MalformedJson(_))));
    }
}
