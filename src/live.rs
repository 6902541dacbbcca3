//! The live step tree and instrument bindings.
//!
//! The live tree is the executable representation the surrounding
//! application owns. It is generic over the host's instrument handle type
//! `H` so this crate never needs to know what an instrument connection
//! actually is: synthesis resolves names to handles, everything else about
//! the handle belongs to the host.

use indexmap::IndexMap;

use crate::types::{CaptureBehavior, ScpiAction, Verdict};

/// Name-to-handle lookup for the instruments currently configured in the
/// host. Built once per synthesis call from the host's enumeration and never
/// mutated.
#[derive(Debug, Clone)]
pub struct InstrumentBindings<H> {
    by_name: IndexMap<String, H>,
}

impl<H> InstrumentBindings<H> {
    pub fn new(instruments: impl IntoIterator<Item = (String, H)>) -> InstrumentBindings<H> {
        InstrumentBindings {
            by_name: instruments.into_iter().collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&H> {
        self.by_name.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl<H> Default for InstrumentBindings<H> {
    fn default() -> Self {
        InstrumentBindings {
            by_name: IndexMap::new(),
        }
    }
}

/// A full executable plan. The caller owns it; synthesis replaces its
/// top-level steps wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LivePlan<H> {
    pub steps: Vec<LiveStep<H>>,
}

impl<H> LivePlan<H> {
    pub fn new() -> LivePlan<H> {
        LivePlan { steps: Vec::new() }
    }
}

/// One executable step.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveStep<H> {
    Scpi(ScpiStep<H>),
    Delay(DelayStep),
    TimeGuard(TimeGuardStep<H>),
}

impl<H> LiveStep<H> {
    /// Display label, derived at synthesis time. Not a correctness concern.
    pub fn label(&self) -> &str {
        match self {
            LiveStep::Scpi(step) => &step.label,
            LiveStep::Delay(step) => &step.label,
            LiveStep::TimeGuard(step) => &step.label,
        }
    }
}

/// Verdicts attached to a response-matching rule on an SCPI step.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRule {
    pub pattern: String,
    pub on_match: Verdict,
    pub on_no_match: Verdict,
}

/// Result capture configuration on an SCPI step.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultCapture {
    pub pattern: String,
    pub behavior: CaptureBehavior,
    pub dimension_titles: Option<String>,
}

/// A command or query against one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct ScpiStep<H> {
    pub label: String,
    pub action: ScpiAction,
    /// Command text with inline comments stripped and whitespace trimmed.
    pub command: String,
    /// The instrument name the plan asked for; round-trips through
    /// serialization even when resolution fell back or failed.
    pub instrument_name: String,
    /// The resolved handle. `None` means neither the requested name nor the
    /// default instrument resolved; the step is built but unbound.
    pub instrument: Option<H>,
    pub match_rule: Option<MatchRule>,
    pub capture: Option<ResultCapture>,
}

/// A fixed pause.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayStep {
    pub label: String,
    pub seconds: f64,
}

/// A container that runs its children under a time limit.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGuardStep<H> {
    pub label: String,
    pub timeout_secs: f64,
    pub stop_on_timeout: bool,
    pub timeout_verdict: Verdict,
    pub children: Vec<LiveStep<H>>,
}
