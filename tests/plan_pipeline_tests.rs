//! End-to-end tests over the full response → live tree → descriptor cycle.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use benchplan::types::{
    P_ACTION, P_DELAY_SECS, P_INSTRUMENT, P_QUERY, P_STOP_ON_TIMEOUT, P_TIMEOUT,
    P_TIMEOUT_VERDICT,
};
use benchplan::{
    plan_from_response, request_plan, serialize_plan, synthesize_plan, ChatTransport,
    InstrumentBindings, LivePlan, LiveStep, PlanDescriptor, PlanError, RetryPolicy, ScpiAction,
    StepDescriptor, StepKind,
};
use pretty_assertions::assert_eq;

/// Counts calls and answers with a scripted sequence, repeating the last
/// entry once the script runs out.
struct ScriptedTransport {
    responses: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new(responses: &[&str]) -> ScriptedTransport {
        ScriptedTransport {
            responses: responses.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn ask(&self, _prompt: &str) -> String {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .get(index)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default()
    }
}

fn bench_instruments() -> InstrumentBindings<&'static str> {
    InstrumentBindings::new([
        ("DMM".to_string(), "handle:dmm"),
        ("PSU".to_string(), "handle:psu"),
    ])
}

#[test]
fn fenced_scpi_response_flows_through_to_a_bound_live_node() {
    let response = "Sure!\n```json\n{\"Steps\":[{\"StepOrder\":1,\"StepType\":\"SCPI\",\"Parameters\":{\"Action\":\"Query\",\"Query\":\"*IDN?\",\"Instrument\":\"DMM\"}}],\"Explanation\":[\"ctx\"]}\n```\n";

    let plan = plan_from_response(response).unwrap();
    assert_eq!(plan.steps.len(), 1);
    assert_eq!(plan.steps[0].param_str(P_QUERY), Some("*IDN?"));

    let mut tree = LivePlan::new();
    let warnings = synthesize_plan(&mut tree, &plan, &bench_instruments(), "PSU");
    assert!(warnings.is_empty());
    assert_eq!(tree.steps.len(), 1);
    let LiveStep::Scpi(step) = &tree.steps[0] else {
        panic!("expected an SCPI step");
    };
    assert_eq!(step.action, ScpiAction::Query);
    assert_eq!(step.command, "*IDN?");
    assert_eq!(step.instrument, Some("handle:dmm"));
}

#[test]
fn synthesize_then_serialize_round_trips_modulo_order_and_explanations() {
    // A plan with no optional/soft fields, orders deliberately sparse.
    let plan = PlanDescriptor {
        steps: vec![
            StepDescriptor::new(10, StepKind::Scpi)
                .with_param(P_ACTION, "Query")
                .with_param(P_QUERY, "*IDN?")
                .with_param(P_INSTRUMENT, "DMM"),
            StepDescriptor::new(20, StepKind::Delay).with_param(P_DELAY_SECS, 2.5),
            StepDescriptor::new(30, StepKind::TimeGuard)
                .with_param(P_TIMEOUT, 30i64)
                .with_param(P_STOP_ON_TIMEOUT, true)
                .with_param(P_TIMEOUT_VERDICT, "Fail")
                .with_child(
                    StepDescriptor::new(1, StepKind::Scpi)
                        .with_param(P_ACTION, "Command")
                        .with_param(P_QUERY, "*RST")
                        .with_param(P_INSTRUMENT, "PSU"),
                ),
        ],
        explanations: vec!["ctx".to_string()],
    };

    let mut tree = LivePlan::new();
    let warnings = synthesize_plan(&mut tree, &plan, &bench_instruments(), "DMM");
    assert!(warnings.is_empty());

    let round_tripped = serialize_plan(&tree);

    // Same plan, but order renumbered 1..N by position and explanations
    // dropped.
    let mut expected = plan.clone();
    expected.explanations.clear();
    for (index, step) in expected.steps.iter_mut().enumerate() {
        step.order = index as i64 + 1;
    }
    assert_eq!(round_tripped, expected);
}

#[test]
fn serialized_plans_reparse_for_the_next_cycle() {
    let plan = PlanDescriptor {
        steps: vec![StepDescriptor::new(1, StepKind::Delay).with_param(P_DELAY_SECS, 1.5)],
        explanations: Vec::new(),
    };
    let mut tree: LivePlan<&str> = LivePlan::new();
    synthesize_plan(&mut tree, &plan, &InstrumentBindings::default(), "DMM");

    let json = benchplan::plan_to_json_string(&serialize_plan(&tree));
    let reparsed = plan_from_response(&json).unwrap();
    assert_eq!(reparsed.steps, plan.steps);
}

#[tokio::test(start_paused = true)]
async fn request_plan_retries_then_delivers_a_validated_plan() {
    let plan_json =
        "{\"Steps\":[{\"StepOrder\":1,\"StepType\":\"Delay\",\"Parameters\":{\"DelaySecs\":2}}],\"Explanation\":[]}";
    let transport = ScriptedTransport::new(&["", "Error: Too many requests", plan_json]);

    let plan = request_plan(&transport, "make a plan", &RetryPolicy::default())
        .await
        .unwrap();
    assert_eq!(plan.steps.len(), 1);
    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn an_exhausted_retry_budget_surfaces_as_extraction_failure() {
    let transport = ScriptedTransport::new(&[""]);
    let policy = RetryPolicy::default();

    let err = request_plan(&transport, "make a plan", &policy)
        .await
        .unwrap_err();
    assert_eq!(transport.calls.load(Ordering::SeqCst), 6);
    let PlanError::NoJson { preview } = &err else {
        panic!("expected NoJson, got {err:?}");
    };
    // The terminal error text is preserved for the caller to surface.
    assert_eq!(preview, &policy.exhausted_message);
}

#[test]
fn an_invalid_plan_never_reaches_synthesis() {
    let response = "{\"Steps\":[{\"StepOrder\":1,\"StepType\":\"TimeGuard\",\"Parameters\":{\"Timeout\":10,\"StopOnTimeout\":true,\"TimeoutVerdict\":\"Fail\"},\"ChildSteps\":[]}],\"Explanation\":[]}";
    let err = plan_from_response(response).unwrap_err();
    let PlanError::Invalid(outcome) = &err else {
        panic!("expected Invalid, got {err:?}");
    };
    assert!(!outcome.is_valid());
    assert!(err.to_string().contains("at least one child"));
}
