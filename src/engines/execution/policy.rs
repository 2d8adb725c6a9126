use crate::engines::generation::genome::{Comparison, Genome, LogicOp, PolicyNode, StateDefinition, IDLE_STATE};
use crate::types::TelemetryReading;

/// Evaluate a decision tree against one reading.
///
/// Pure: a rule over a metric the reading does not carry, an unknown operator
/// or an unrecognized node all evaluate to `false`. Combinators evaluate every
/// child before applying their operator.
pub fn evaluate(node: &PolicyNode, reading: &TelemetryReading) -> bool {
    match node {
        PolicyNode::Rule {
            metric,
            operator,
            value,
        } => evaluate_rule(metric, *operator, *value, reading),
        PolicyNode::Combinator { operator, children } => {
            let outcomes: Vec<bool> = children.iter().map(|c| evaluate(c, reading)).collect();
            combine(*operator, &outcomes)
        }
        PolicyNode::Unrecognized => false,
    }
}

fn evaluate_rule(metric: &str, operator: Comparison, threshold: f64, reading: &TelemetryReading) -> bool {
    let observed = match reading.metric(metric) {
        Some(v) => v,
        None => return false,
    };
    match operator {
        Comparison::Gt => observed > threshold,
        Comparison::Lt => observed < threshold,
        Comparison::Eq => observed == threshold,
        Comparison::Neq => observed != threshold,
        Comparison::Unknown => false,
    }
}

fn combine(operator: LogicOp, outcomes: &[bool]) -> bool {
    let true_count = outcomes.iter().filter(|o| **o).count();
    match operator {
        LogicOp::And => true_count == outcomes.len(),
        LogicOp::Or => true_count > 0,
        LogicOp::Nand => true_count != outcomes.len(),
        LogicOp::Nor => true_count == 0,
        // exactly one, not odd parity
        LogicOp::Xor => true_count == 1,
        LogicOp::Unknown => false,
    }
}

/// Result of feeding one reading to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The active policy of `state` matched; the run must end now
    Violation { state: String },
    /// No violation; `next_state` is where the next reading is evaluated
    Allow { next_state: String },
}

/// Finite-state policy graph walker for one run
#[derive(Debug, Clone)]
pub struct PolicyMachine {
    genome: Genome,
    current: Option<String>,
    idle: StateDefinition,
}

impl PolicyMachine {
    pub fn new(genome: Genome) -> Self {
        let current = genome.initial_state.clone();
        Self {
            genome,
            current,
            idle: StateDefinition::idle(),
        }
    }

    pub fn current_state(&self) -> &str {
        self.current.as_deref().unwrap_or(IDLE_STATE)
    }

    fn active_definition(&self) -> &StateDefinition {
        self.current
            .as_ref()
            .and_then(|name| self.genome.states.get(name))
            .unwrap_or(&self.idle)
    }

    /// Active policy first; a violation ends evaluation for this reading.
    /// Otherwise the first matching transition wins.
    pub fn step(&mut self, reading: &TelemetryReading) -> Decision {
        let definition = self.active_definition();
        if evaluate(&definition.active_policy, reading) {
            return Decision::Violation {
                state: self.current_state().to_string(),
            };
        }

        let next = definition
            .transitions
            .iter()
            .find(|t| evaluate(&t.condition, reading))
            .map(|t| t.target_state.clone());

        if let Some(target) = next {
            self.current = Some(target);
        }

        Decision::Allow {
            next_state: self.current_state().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::genome::Transition;
    use crate::types::{CPU_PERCENT_TOTAL, NUM_THREADS};
    use std::collections::BTreeMap;

    fn reading(cpu: f64, threads: f64) -> TelemetryReading {
        TelemetryReading {
            cpu_percent_total: cpu,
            num_threads: threads,
            ..TelemetryReading::zero_impact()
        }
    }

    #[test]
    fn test_rule_comparisons_are_exact() {
        let r = reading(50.0, 4.0);
        assert!(evaluate(&PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Gt, 49.9), &r));
        assert!(!evaluate(&PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Lt, 50.0), &r));
        assert!(evaluate(&PolicyNode::rule(NUM_THREADS, Comparison::Eq, 4.0), &r));
        assert!(!evaluate(&PolicyNode::rule(NUM_THREADS, Comparison::Eq, 4.0000001), &r));
        assert!(evaluate(&PolicyNode::rule(NUM_THREADS, Comparison::Neq, 4.0000001), &r));
        assert!(!evaluate(&PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Unknown, 0.0), &r));
    }

    #[test]
    fn test_combinators() {
        let r = reading(10.0, 1.0);
        let t = || PolicyNode::always();
        let f = || PolicyNode::never();
        assert!(evaluate(&PolicyNode::combinator(LogicOp::Nand, vec![t(), f()]), &r));
        assert!(!evaluate(&PolicyNode::combinator(LogicOp::Nand, vec![t(), t()]), &r));
        assert!(evaluate(&PolicyNode::combinator(LogicOp::Nor, vec![f(), f()]), &r));
        assert!(!evaluate(&PolicyNode::combinator(LogicOp::Nor, vec![f(), t()]), &r));
        assert!(!evaluate(&PolicyNode::combinator(LogicOp::Unknown, vec![t()]), &r));
        assert!(!evaluate(&PolicyNode::Unrecognized, &r));
    }

    #[test]
    fn test_missing_initial_state_observes_only() {
        let mut states = BTreeMap::new();
        states.insert(
            "strict".to_string(),
            StateDefinition {
                active_policy: PolicyNode::always(),
                transitions: Vec::new(),
            },
        );
        let genome = Genome {
            states,
            initial_state: None,
            parameters: BTreeMap::new(),
        };
        let mut machine = PolicyMachine::new(genome);
        assert_eq!(
            machine.step(&reading(99.0, 64.0)),
            Decision::Allow {
                next_state: IDLE_STATE.to_string()
            }
        );
    }

    #[test]
    fn test_transition_moves_state_for_next_reading() {
        let mut states = BTreeMap::new();
        states.insert(
            "calm".to_string(),
            StateDefinition {
                active_policy: PolicyNode::never(),
                transitions: vec![Transition {
                    condition: PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Gt, 20.0),
                    target_state: "hot".to_string(),
                }],
            },
        );
        states.insert(
            "hot".to_string(),
            StateDefinition {
                active_policy: PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Gt, 30.0),
                transitions: Vec::new(),
            },
        );
        let genome = Genome {
            states,
            initial_state: Some("calm".to_string()),
            parameters: BTreeMap::new(),
        };
        let mut machine = PolicyMachine::new(genome);

        // 50% in "calm" only transitions; the kill rule lives in "hot"
        assert_eq!(
            machine.step(&reading(50.0, 1.0)),
            Decision::Allow {
                next_state: "hot".to_string()
            }
        );
        assert_eq!(
            machine.step(&reading(50.0, 1.0)),
            Decision::Violation {
                state: "hot".to_string()
            }
        );
    }
}
