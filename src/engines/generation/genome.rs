//! Genome representation for policy evolution
//!
//! A genome is a finite-state policy graph. Every state carries an active
//! policy, a decision tree evaluated against each telemetry reading while the
//! supervised process is in that state, and an ordered list of transitions to
//! other states.
//!
//! # Example
//!
//! ```json
//! {
//!   "initial_state": "observe",
//!   "states": {
//!     "observe": {
//!       "active_policy": {"type": "rule", "metric": "cpu_percent_total", "operator": "GT", "value": 80.0},
//!       "transitions": []
//!     }
//!   }
//! }
//! ```
//!
//! The numeric thresholds in the tree, together with the scalar
//! `parameters`, are what mutation perturbs.
use crate::error::{Result, SentryError};
use crate::types::{CPU_PERCENT_TOTAL, IO_READ_BYTES, IO_WRITE_BYTES, MEMORY_RSS_BYTES, NUM_THREADS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the state used when a genome declares no initial state
pub const IDLE_STATE: &str = "idle";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Comparison {
    Gt,
    Lt,
    Eq,
    Neq,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicOp {
    And,
    Or,
    Nand,
    Nor,
    Xor,
    #[serde(other)]
    Unknown,
}

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyNode {
    Rule {
        metric: String,
        operator: Comparison,
        value: f64,
    },
    Combinator {
        operator: LogicOp,
        #[serde(default)]
        children: Vec<PolicyNode>,
    },
    #[serde(other)]
    Unrecognized,
}

impl PolicyNode {
    pub fn rule(metric: &str, operator: Comparison, value: f64) -> Self {
        PolicyNode::Rule {
            metric: metric.to_string(),
            operator,
            value,
        }
    }

    pub fn combinator(operator: LogicOp, children: Vec<PolicyNode>) -> Self {
        PolicyNode::Combinator { operator, children }
    }

    /// `OR` over nothing: never matches
    pub fn never() -> Self {
        Self::combinator(LogicOp::Or, Vec::new())
    }

    /// `AND` over nothing: always matches
    pub fn always() -> Self {
        Self::combinator(LogicOp::And, Vec::new())
    }

    pub fn node_count(&self) -> usize {
        match self {
            PolicyNode::Combinator { children, .. } => {
                1 + children.iter().map(PolicyNode::node_count).sum::<usize>()
            }
            _ => 1,
        }
    }

    fn collect_tunables<'a>(&'a mut self, out: &mut Vec<Tunable<'a>>) {
        match self {
            PolicyNode::Rule { metric, value, .. } => out.push(Tunable {
                domain: ParamDomain::for_metric(metric),
                value,
            }),
            PolicyNode::Combinator { children, .. } => {
                for child in children.iter_mut() {
                    child.collect_tunables(out);
                }
            }
            PolicyNode::Unrecognized => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub condition: PolicyNode,
    pub target_state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDefinition {
    #[serde(default = "PolicyNode::never")]
    pub active_policy: PolicyNode,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl StateDefinition {
    /// Pure observation: nothing is enforced and nothing moves
    pub fn idle() -> Self {
        Self {
            active_policy: PolicyNode::never(),
            transitions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub states: BTreeMap<String, StateDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, f64>,
}

impl Genome {
    /// Genome that never kills, used to observe the benign workload untouched
    pub fn permissive() -> Self {
        let mut states = BTreeMap::new();
        states.insert(IDLE_STATE.to_string(), StateDefinition::idle());
        Self {
            states,
            initial_state: Some(IDLE_STATE.to_string()),
            parameters: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.states.is_empty() {
            return Err(SentryError::InvalidGenome("genome has no states".to_string()));
        }
        if let Some(initial) = &self.initial_state {
            if !self.states.contains_key(initial) {
                return Err(SentryError::InvalidGenome(format!(
                    "initial state '{}' is not defined",
                    initial
                )));
            }
        }
        for (name, state) in &self.states {
            for transition in &state.transitions {
                if !self.states.contains_key(&transition.target_state) {
                    return Err(SentryError::InvalidGenome(format!(
                        "state '{}' transitions to undefined state '{}'",
                        name, transition.target_state
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Total decision tree nodes across all policies and transition conditions
    pub fn node_count(&self) -> usize {
        self.states
            .values()
            .map(|state| {
                state.active_policy.node_count()
                    + state
                        .transitions
                        .iter()
                        .map(|t| t.condition.node_count())
                        .sum::<usize>()
            })
            .sum()
    }

    /// Size of the canonical serialized genome
    pub fn complexity(&self) -> usize {
        self.canonical_json().len()
    }

    /// Deterministic JSON text; map keys are ordered
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Every mutable numeric parameter, paired with its valid domain
    pub fn tunables_mut(&mut self) -> Vec<Tunable<'_>> {
        let mut out = Vec::new();
        for state in self.states.values_mut() {
            state.active_policy.collect_tunables(&mut out);
            for transition in state.transitions.iter_mut() {
                transition.condition.collect_tunables(&mut out);
            }
        }
        for (name, value) in self.parameters.iter_mut() {
            out.push(Tunable {
                domain: ParamDomain::for_metric(name),
                value,
            });
        }
        out
    }
}

/// Closed interval a numeric parameter must stay within
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDomain {
    pub min: f64,
    pub max: f64,
}

impl ParamDomain {
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    /// Domain for a threshold compared against `metric`; substring match so
    /// scalar parameters such as `max_cpu_percent` share the CPU domain.
    pub fn for_metric(metric: &str) -> Self {
        if metric == CPU_PERCENT_TOTAL || metric.contains("cpu_percent") {
            Self { min: 1.0, max: 95.0 }
        } else if metric == MEMORY_RSS_BYTES || metric.contains("memory") {
            Self { min: 0.0, max: 64.0 * Self::GIB }
        } else if metric == IO_READ_BYTES || metric == IO_WRITE_BYTES || metric.contains("io_") {
            Self { min: 0.0, max: 1024.0 * Self::GIB }
        } else if metric == NUM_THREADS || metric.contains("thread") {
            Self { min: 1.0, max: 4096.0 }
        } else {
            Self { min: 0.0, max: f64::MAX }
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max)
    }
}

/// Mutable handle to one numeric parameter inside a genome
pub struct Tunable<'a> {
    pub domain: ParamDomain,
    pub value: &'a mut f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_state_genome() -> Genome {
        let mut states = BTreeMap::new();
        states.insert(
            "observe".to_string(),
            StateDefinition {
                active_policy: PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Gt, 80.0),
                transitions: vec![Transition {
                    condition: PolicyNode::rule(IO_READ_BYTES, Comparison::Gt, 4096.0),
                    target_state: "alert".to_string(),
                }],
            },
        );
        states.insert(
            "alert".to_string(),
            StateDefinition {
                active_policy: PolicyNode::combinator(
                    LogicOp::Or,
                    vec![
                        PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Gt, 40.0),
                        PolicyNode::rule(NUM_THREADS, Comparison::Gt, 8.0),
                    ],
                ),
                transitions: Vec::new(),
            },
        );
        Genome {
            states,
            initial_state: Some("observe".to_string()),
            parameters: BTreeMap::new(),
        }
    }

    #[test]
    fn test_validate_rejects_dangling_references() {
        assert!(two_state_genome().validate().is_ok());

        let empty = Genome {
            states: BTreeMap::new(),
            initial_state: None,
            parameters: BTreeMap::new(),
        };
        assert!(empty.validate().is_err());

        let mut bad_initial = two_state_genome();
        bad_initial.initial_state = Some("missing".to_string());
        assert!(bad_initial.validate().is_err());

        let mut bad_target = two_state_genome();
        bad_target.states.get_mut("observe").unwrap().transitions[0].target_state = "nowhere".to_string();
        assert!(bad_target.validate().is_err());
    }

    #[test]
    fn test_tunables_cover_every_threshold() {
        let mut genome = two_state_genome();
        genome.parameters.insert("max_cpu_percent".to_string(), 50.0);
        let tunables = genome.tunables_mut();
        assert_eq!(tunables.len(), 5);
        assert!(tunables.iter().any(|t| t.domain.max == 4096.0));
    }

    #[test]
    fn test_unknown_shapes_deserialize_without_error() {
        let json = r#"{
            "states": {
                "s": {
                    "active_policy": {"type": "lambda"},
                    "transitions": [
                        {"condition": {"type": "combinator", "operator": "IMPLIES", "children": []}, "target_state": "s"},
                        {"condition": {"type": "rule", "metric": "cpu_percent_total", "operator": "GTE", "value": 1.0}, "target_state": "s"}
                    ]
                }
            }
        }"#;
        let genome: Genome = serde_json::from_str(json).unwrap();
        let state = &genome.states["s"];
        assert_eq!(state.active_policy, PolicyNode::Unrecognized);
        assert!(matches!(
            state.transitions[0].condition,
            PolicyNode::Combinator { operator: LogicOp::Unknown, .. }
        ));
        assert!(matches!(
            state.transitions[1].condition,
            PolicyNode::Rule { operator: Comparison::Unknown, .. }
        ));
        assert!(genome.validate().is_ok());
    }

    #[test]
    fn test_missing_policy_defaults_to_never() {
        let genome: Genome =
            serde_json::from_str(r#"{"states": {"s": {}}, "initial_state": "s"}"#).unwrap();
        assert_eq!(genome.states["s"].active_policy, PolicyNode::never());
    }

    #[test]
    fn test_domain_clamps_cpu_thresholds() {
        let domain = ParamDomain::for_metric(CPU_PERCENT_TOTAL);
        assert_eq!(domain.clamp(120.0), 95.0);
        assert_eq!(domain.clamp(0.2), 1.0);
        assert_eq!(domain.clamp(f64::NAN), 1.0);
    }

    #[test]
    fn test_complexity_grows_with_structure() {
        let small = Genome::permissive();
        let large = two_state_genome();
        assert!(large.complexity() > small.complexity());
        assert_eq!(large.node_count(), 5);
        assert_eq!(large.state_count(), 2);
    }
}
