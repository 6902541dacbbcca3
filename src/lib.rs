//! benchplan — turns free-form LLM chat output into validated, strongly
//! typed instrument test plans.
//!
//! The pipeline runs in one direction: raw response text → [`extract`] pulls
//! out the JSON payload → [`parse`] builds a [`types::PlanDescriptor`] →
//! [`validate`] gates it all-or-nothing → [`synthesize`] rebuilds the
//! caller-owned live tree, degrading per step instead of aborting.
//! [`serialize`] runs the other way, flattening the current live tree back
//! into descriptor JSON for the next prompt, and [`transport`] wraps the
//! opaque upstream request with a bounded fixed-interval retry.
//!
//! Instrument execution, the chat UI, and the HTTP transport itself are the
//! host application's concern; this crate never touches them.

pub mod extract;
pub mod live;
pub mod parse;
pub mod pipeline;
pub mod serialize;
pub mod synthesize;
pub mod transport;
pub mod types;
pub mod validate;

pub use extract::extract_json;
pub use live::{
    DelayStep, InstrumentBindings, LivePlan, LiveStep, MatchRule, ResultCapture, ScpiStep,
    TimeGuardStep,
};
pub use parse::{parse_plan, ParseError};
pub use pipeline::{plan_from_response, request_plan, PlanError};
pub use serialize::{plan_to_json, plan_to_json_string, serialize_plan};
pub use synthesize::{synthesize_plan, SynthesisWarning};
pub use transport::{request_with_retry, ChatTransport, RetryPolicy};
pub use types::{
    CaptureBehavior, ParamValue, PlanDescriptor, ScpiAction, StepDescriptor, StepKind, Verdict,
};
pub use validate::{validate_plan, ValidationIssue, ValidationOutcome};
