//! Descriptor model for instrument test plans.
//!
//! A `PlanDescriptor` is the parsed, pre-execution representation of a test
//! plan as it travels between the LLM response and the live step tree. It is
//! value-like: owned by the call that produced it, freely clonable, no shared
//! state.

use indexmap::IndexMap;
use serde_json::Value;

// Wire key names as they appear in the JSON the LLM is asked to produce.
pub const KEY_STEPS: &str = "Steps";
pub const KEY_EXPLANATION: &str = "Explanation";
pub const KEY_STEP_ORDER: &str = "StepOrder";
pub const KEY_STEP_TYPE: &str = "StepType";
pub const KEY_PARAMETERS: &str = "Parameters";
pub const KEY_CHILD_STEPS: &str = "ChildSteps";

// SCPI step parameters.
pub const P_ACTION: &str = "Action";
pub const P_QUERY: &str = "Query";
pub const P_INSTRUMENT: &str = "Instrument";
pub const P_MATCH_PATTERN: &str = "MatchPattern";
pub const P_VERDICT_ON_MATCH: &str = "VerdictOnMatch";
pub const P_VERDICT_ON_NO_MATCH: &str = "VerdictOnNoMatch";
pub const P_RESULT_PATTERN: &str = "ResultPattern";
pub const P_RESULT_BEHAVIOR: &str = "ResultBehavior";
pub const P_DIMENSION_TITLES: &str = "DimensionTitles";

// Delay step parameters.
pub const P_DELAY_SECS: &str = "DelaySecs";

// TimeGuard step parameters.
pub const P_TIMEOUT: &str = "Timeout";
pub const P_STOP_ON_TIMEOUT: &str = "StopOnTimeout";
pub const P_TIMEOUT_VERDICT: &str = "TimeoutVerdict";

/// A single scalar parameter value. LLM-produced parameter maps are
/// heterogeneous, so every parameter is one of these three shapes; anything
/// else in the wire JSON (arrays, nested objects, null) is dropped at parse
/// time with a warning.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl ParamValue {
    /// Convert a JSON scalar into a `ParamValue`. Returns `None` for
    /// non-scalar values.
    pub fn from_json(value: &Value) -> Option<ParamValue> {
        match value {
            Value::String(s) => Some(ParamValue::Str(s.clone())),
            Value::Number(n) => n.as_f64().map(ParamValue::Num),
            Value::Bool(b) => Some(ParamValue::Bool(*b)),
            _ => None,
        }
    }

    /// Render back to JSON. Integral numbers are emitted as JSON integers so
    /// plans embedded into the next prompt stay clean.
    pub fn to_json(&self) -> Value {
        match self {
            ParamValue::Str(s) => Value::String(s.clone()),
            ParamValue::Num(n) if n.fract() == 0.0 && n.is_finite() => {
                Value::from(*n as i64)
            }
            ParamValue::Num(n) => Value::from(*n),
            ParamValue::Bool(b) => Value::Bool(*b),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            ParamValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Num(n)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Num(n as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

/// The closed set of step types a plan may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// A command or query sent to an instrument.
    Scpi,
    /// A fixed pause between steps.
    Delay,
    /// A container that runs its child steps under a time limit.
    TimeGuard,
}

impl StepKind {
    /// Parse a wire type tag, case-insensitively. Returns `None` for anything
    /// outside the closed set.
    pub fn parse(tag: &str) -> Option<StepKind> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "scpi" => Some(StepKind::Scpi),
            "delay" => Some(StepKind::Delay),
            "timeguard" => Some(StepKind::TimeGuard),
            _ => None,
        }
    }

    /// The canonical wire tag for this kind.
    pub fn wire_name(&self) -> &'static str {
        match self {
            StepKind::Scpi => "SCPI",
            StepKind::Delay => "Delay",
            StepKind::TimeGuard => "TimeGuard",
        }
    }
}

/// What an SCPI step does with its command text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScpiAction {
    /// Send the text and read a response back.
    Query,
    /// Send the text, expect no response.
    Command,
}

impl ScpiAction {
    pub fn parse(s: &str) -> Option<ScpiAction> {
        match s.trim().to_ascii_lowercase().as_str() {
            "query" => Some(ScpiAction::Query),
            "command" => Some(ScpiAction::Command),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScpiAction::Query => "Query",
            ScpiAction::Command => "Command",
        }
    }
}

/// Outcome assigned to a step by a match rule or a guard timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
    Inconclusive,
    Error,
}

impl Verdict {
    pub fn parse(s: &str) -> Option<Verdict> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass" => Some(Verdict::Pass),
            "fail" => Some(Verdict::Fail),
            "inconclusive" => Some(Verdict::Inconclusive),
            "error" => Some(Verdict::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "Pass",
            Verdict::Fail => "Fail",
            Verdict::Inconclusive => "Inconclusive",
            Verdict::Error => "Error",
        }
    }
}

/// How a captured result value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBehavior {
    Text,
    Numeric,
    Boolean,
}

impl CaptureBehavior {
    pub fn parse(s: &str) -> Option<CaptureBehavior> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Some(CaptureBehavior::Text),
            "numeric" => Some(CaptureBehavior::Numeric),
            "boolean" => Some(CaptureBehavior::Boolean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureBehavior::Text => "Text",
            CaptureBehavior::Numeric => "Numeric",
            CaptureBehavior::Boolean => "Boolean",
        }
    }
}

/// One step of a plan in descriptor form.
///
/// `step_type` is kept as the raw wire tag rather than a parsed `StepKind` so
/// the validator can report unknown types by name. `order` controls execution
/// sequence relative to siblings; values need not be contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDescriptor {
    pub order: i64,
    pub step_type: String,
    pub params: IndexMap<String, ParamValue>,
    /// Non-empty only for `TimeGuard` steps.
    pub children: Vec<StepDescriptor>,
}

impl StepDescriptor {
    pub fn new(order: i64, kind: StepKind) -> StepDescriptor {
        StepDescriptor {
            order,
            step_type: kind.wire_name().to_string(),
            params: IndexMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<ParamValue>) -> StepDescriptor {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_child(mut self, child: StepDescriptor) -> StepDescriptor {
        self.children.push(child);
        self
    }

    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(ParamValue::as_str)
    }

    pub fn param_num(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(ParamValue::as_num)
    }

    pub fn param_bool(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(ParamValue::as_bool)
    }
}

/// A full plan in descriptor form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanDescriptor {
    /// Root-level steps. Must be non-empty for the plan to validate.
    pub steps: Vec<StepDescriptor>,
    /// Human-readable context. Index 0 describes the plan as a whole, index
    /// i + 1 describes root step i when present.
    pub explanations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_kind_parses_wire_tags_case_insensitively() {
        assert_eq!(StepKind::parse("SCPI"), Some(StepKind::Scpi));
        assert_eq!(StepKind::parse("scpi"), Some(StepKind::Scpi));
        assert_eq!(StepKind::parse("timeguard"), Some(StepKind::TimeGuard));
        assert_eq!(StepKind::parse(" Delay "), Some(StepKind::Delay));
        assert_eq!(StepKind::parse("Loop"), None);
        assert_eq!(StepKind::parse(""), None);
    }

    #[test]
    fn param_value_round_trips_json_scalars() {
        assert_eq!(
            ParamValue::from_json(&serde_json::json!("*IDN?")),
            Some(ParamValue::Str("*IDN?".to_string()))
        );
        assert_eq!(
            ParamValue::from_json(&serde_json::json!(2.5)),
            Some(ParamValue::Num(2.5))
        );
        assert_eq!(
            ParamValue::from_json(&serde_json::json!(true)),
            Some(ParamValue::Bool(true))
        );
        assert_eq!(ParamValue::from_json(&serde_json::json!([1, 2])), None);
        assert_eq!(ParamValue::from_json(&serde_json::Value::Null), None);
    }

    #[test]
    fn integral_numbers_serialize_as_json_integers() {
        assert_eq!(ParamValue::Num(30.0).to_json(), serde_json::json!(30));
        assert_eq!(ParamValue::Num(2.5).to_json(), serde_json::json!(2.5));
    }

    #[test]
    fn verdict_and_behavior_symbols_parse() {
        assert_eq!(Verdict::parse("PASS"), Some(Verdict::Pass));
        assert_eq!(Verdict::parse("inconclusive"), Some(Verdict::Inconclusive));
        assert_eq!(Verdict::parse("maybe"), None);
        assert_eq!(CaptureBehavior::parse("Numeric"), Some(CaptureBehavior::Numeric));
        assert_eq!(ScpiAction::parse("query"), Some(ScpiAction::Query));
        assert_eq!(ScpiAction::parse("write"), None);
    }
}
