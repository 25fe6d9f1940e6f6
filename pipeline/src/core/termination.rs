//! Fixed-iteration termination policy.
//!
//! After each iteration the loop asks [`FixedPolicy::decide`] whether to stop.
//! Explicit agent decisions win over heuristic signals, which win over the
//! iteration cap. Rules are listed in [`PRECEDENCE`] and evaluated in that
//! order; the first rule that stops the loop decides the verdict.

use serde::{Deserialize, Serialize};

use crate::core::types::AgentResult;

/// Iteration cap used when no positive setting is supplied.
pub const DEFAULT_FIXED_ITERATIONS: u32 = 1;

/// Termination settings as written in config.
///
/// Both fields are optional; non-positive values count as unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

impl FixedConfig {
    /// Iteration cap: positive `iterations`, else positive `max`, else 1.
    pub fn target(&self) -> u32 {
        positive(self.iterations)
            .or_else(|| positive(self.max))
            .unwrap_or(DEFAULT_FIXED_ITERATIONS)
    }
}

fn positive(value: Option<i64>) -> Option<u32> {
    value
        .filter(|v| *v > 0)
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
}

/// One entry of the decision chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// `decision` is `stop`.
    ExplicitStop,
    /// `decision` is `error`.
    ExplicitError,
    /// `decision` is set to anything else; signals are not consulted.
    ExplicitContinue,
    /// No decision and `signals.risk` is `high`.
    HighRisk,
    /// No decision and `signals.plateau_suspected` is set.
    Plateau,
    /// The iteration count reached the cap.
    CapReached,
}

/// Evaluation order of the decision chain.
pub const PRECEDENCE: [Rule; 6] = [
    Rule::ExplicitStop,
    Rule::ExplicitError,
    Rule::ExplicitContinue,
    Rule::HighRisk,
    Rule::Plateau,
    Rule::CapReached,
];

impl Rule {
    /// Whether this rule's condition holds for the given inputs.
    pub fn matches(self, iteration: u32, target: u32, result: &AgentResult) -> bool {
        let decision = normalized_decision(result);
        match self {
            Rule::ExplicitStop => decision == "stop",
            Rule::ExplicitError => decision == "error",
            Rule::ExplicitContinue => {
                !decision.is_empty() && decision != "stop" && decision != "error"
            }
            Rule::HighRisk => {
                decision.is_empty() && result.signals.risk.trim().eq_ignore_ascii_case("high")
            }
            Rule::Plateau => decision.is_empty() && result.signals.plateau_suspected,
            Rule::CapReached => iteration >= target,
        }
    }

    /// Whether a match on this rule ends the loop.
    pub fn stops(self) -> bool {
        !matches!(self, Rule::ExplicitContinue)
    }

    /// Whether a stop through this rule is an error outcome.
    pub fn is_error(self) -> bool {
        matches!(self, Rule::ExplicitError | Rule::HighRisk)
    }

    fn reason(self, iteration: u32, target: u32) -> String {
        match self {
            Rule::ExplicitStop | Rule::Plateau => {
                format!("Agent requested stop at iteration {iteration}")
            }
            Rule::ExplicitError | Rule::HighRisk => {
                format!("Agent reported error at iteration {iteration}")
            }
            Rule::CapReached => format!("Completed {iteration} iterations (max: {target})"),
            Rule::ExplicitContinue => String::new(),
        }
    }
}

fn normalized_decision(result: &AgentResult) -> String {
    result.decision.trim().to_ascii_lowercase()
}

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub done: bool,
    pub reason: String,
    /// Rule that ended the loop, if any.
    pub rule: Option<Rule>,
}

impl Verdict {
    fn proceed() -> Self {
        Self {
            done: false,
            reason: String::new(),
            rule: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.rule.is_some_and(Rule::is_error)
    }
}

/// Stops after a fixed number of iterations unless the agent stops it first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPolicy {
    target: u32,
}

impl FixedPolicy {
    pub fn new(config: FixedConfig) -> Self {
        Self {
            target: config.target(),
        }
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    /// Evaluate the decision chain for `iteration` (1-based).
    pub fn decide(&self, iteration: u32, result: &AgentResult) -> Verdict {
        PRECEDENCE
            .iter()
            .copied()
            .find(|rule| rule.stops() && rule.matches(iteration, self.target, result))
            .map(|rule| Verdict {
                done: true,
                reason: rule.reason(iteration, self.target),
                rule: Some(rule),
            })
            .unwrap_or_else(Verdict::proceed)
    }

    /// `(done, reason)` form of [`FixedPolicy::decide`].
    pub fn should_stop(&self, iteration: u32, result: &AgentResult) -> (bool, String) {
        let verdict = self.decide(iteration, result);
        (verdict.done, verdict.reason)
    }
}

impl Default for FixedPolicy {
    fn default() -> Self {
        Self::new(FixedConfig::default())
    }
}
