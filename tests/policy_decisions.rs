use sentryforge::engines::execution::{evaluate, Decision, PolicyMachine};
use sentryforge::engines::generation::{Comparison, Genome, LogicOp, PolicyNode, StateDefinition, Transition};
use sentryforge::types::{TelemetryReading, CPU_PERCENT_TOTAL, IO_READ_BYTES, NUM_THREADS};
use std::collections::BTreeMap;

fn reading(cpu: f64, io_read: f64, threads: f64) -> TelemetryReading {
    TelemetryReading {
        cpu_percent_total: cpu,
        io_read_bytes: io_read,
        num_threads: threads,
        ..TelemetryReading::zero_impact()
    }
}

fn cpu_above(threshold: f64) -> PolicyNode {
    PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Gt, threshold)
}

#[test]
fn rule_on_absent_metric_is_false() {
    let r = reading(99.0, 0.0, 1.0);
    for op in [Comparison::Gt, Comparison::Lt, Comparison::Eq, Comparison::Neq] {
        assert!(!evaluate(&PolicyNode::rule("gpu_percent", op, 0.0), &r));
    }
}

#[test]
fn comparison_operators() {
    let r = reading(50.0, 0.0, 1.0);
    assert!(evaluate(&cpu_above(49.9), &r));
    assert!(!evaluate(&cpu_above(50.0), &r));
    assert!(evaluate(&PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Lt, 50.1), &r));
    assert!(evaluate(&PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Eq, 50.0), &r));
    assert!(!evaluate(&PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Neq, 50.0), &r));
}

#[test]
fn xor_means_exactly_one() {
    let r = reading(50.0, 0.0, 1.0);
    let xor = |children: Vec<PolicyNode>| PolicyNode::combinator(LogicOp::Xor, children);

    assert!(evaluate(&xor(vec![cpu_above(10.0), cpu_above(90.0)]), &r));
    assert!(!evaluate(&xor(vec![cpu_above(10.0), cpu_above(20.0)]), &r));
    // three true children have odd parity but still fail
    assert!(!evaluate(
        &xor(vec![cpu_above(10.0), cpu_above(20.0), cpu_above(30.0)]),
        &r
    ));
    assert!(!evaluate(&xor(vec![]), &r));
}

#[test]
fn empty_combinators() {
    let r = reading(0.0, 0.0, 1.0);
    assert!(evaluate(&PolicyNode::always(), &r));
    assert!(!evaluate(&PolicyNode::never(), &r));
    assert!(evaluate(&PolicyNode::combinator(LogicOp::Nor, vec![]), &r));
    assert!(!evaluate(&PolicyNode::combinator(LogicOp::Nand, vec![]), &r));
}

#[test]
fn unknown_operators_and_nodes_parse_and_evaluate_false() {
    let node: PolicyNode = serde_json::from_str(
        r#"{"type": "combinator", "operator": "IMPLIES", "children": [{"type": "rule", "metric": "cpu_percent_total", "operator": "GE", "value": 1.0}]}"#,
    )
    .unwrap();
    assert!(!evaluate(&node, &reading(99.0, 0.0, 1.0)));

    let odd: PolicyNode = serde_json::from_str(r#"{"type": "lookup_table"}"#).unwrap();
    assert_eq!(odd, PolicyNode::Unrecognized);
    assert!(!evaluate(&odd, &reading(99.0, 0.0, 1.0)));
}

fn escalating_genome() -> Genome {
    let mut states = BTreeMap::new();
    states.insert(
        "observe".to_string(),
        StateDefinition {
            active_policy: cpu_above(90.0),
            transitions: vec![
                Transition {
                    condition: PolicyNode::rule(IO_READ_BYTES, Comparison::Gt, 1000.0),
                    target_state: "alert".to_string(),
                },
                Transition {
                    condition: PolicyNode::rule(IO_READ_BYTES, Comparison::Gt, 10.0),
                    target_state: "observe".to_string(),
                },
            ],
        },
    );
    states.insert(
        "alert".to_string(),
        StateDefinition {
            active_policy: PolicyNode::rule(NUM_THREADS, Comparison::Gt, 4.0),
            transitions: vec![],
        },
    );
    Genome {
        states,
        initial_state: Some("observe".to_string()),
        parameters: BTreeMap::new(),
    }
}

#[test]
fn first_matching_transition_wins() {
    let mut machine = PolicyMachine::new(escalating_genome());
    // both transitions match; the first one is taken
    assert_eq!(
        machine.step(&reading(5.0, 5000.0, 8.0)),
        Decision::Allow {
            next_state: "alert".to_string()
        }
    );
    // the new state's policy applies from the next reading on
    assert_eq!(
        machine.step(&reading(5.0, 0.0, 8.0)),
        Decision::Violation {
            state: "alert".to_string()
        }
    );
}

#[test]
fn violation_is_checked_before_transitions() {
    let mut machine = PolicyMachine::new(escalating_genome());
    assert_eq!(
        machine.step(&reading(95.0, 5000.0, 1.0)),
        Decision::Violation {
            state: "observe".to_string()
        }
    );
    assert_eq!(machine.current_state(), "observe");
}

#[test]
fn always_true_policy_violates_on_first_reading() {
    let mut states = BTreeMap::new();
    states.insert(
        "strict".to_string(),
        StateDefinition {
            active_policy: PolicyNode::always(),
            transitions: vec![],
        },
    );
    let genome = Genome {
        states,
        initial_state: Some("strict".to_string()),
        parameters: BTreeMap::new(),
    };
    let mut machine = PolicyMachine::new(genome);
    assert!(matches!(
        machine.step(&TelemetryReading::zero_impact()),
        Decision::Violation { .. }
    ));
}

#[test]
fn missing_initial_state_falls_back_to_idle() {
    let mut genome = escalating_genome();
    genome.initial_state = None;
    let mut machine = PolicyMachine::new(genome);
    assert_eq!(machine.current_state(), "idle");
    assert_eq!(
        machine.step(&reading(99.0, 99999.0, 99.0)),
        Decision::Allow {
            next_state: "idle".to_string()
        }
    );
}
