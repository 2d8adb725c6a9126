use crate::config::{SeedingConfig, UniformRange};
use crate::engines::generation::genome::{Comparison, Genome, LogicOp, PolicyNode, StateDefinition, Transition};
use crate::engines::generation::individual::{rank_order, Individual};
use crate::types::{CPU_PERCENT_TOTAL, IO_READ_BYTES, MEMORY_RSS_BYTES, NUM_THREADS};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

/// Hands out run-unique individual ids
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Tournament selection: best of K distinct random candidates.
///
/// Each tournament samples without replacement; successive tournaments are
/// independent, so one individual can win many times.
pub fn tournament_selection<'a, R: Rng>(
    population: &'a [Individual],
    tournament_size: usize,
    rng: &mut R,
) -> Option<&'a Individual> {
    let k = tournament_size.clamp(1, population.len().max(1));
    population
        .choose_multiple(rng, k)
        .min_by(|a, b| rank_order(a, b))
}

/// Elitism plus tournament fill.
///
/// The top `elitism_count` individuals move over unchanged, keeping their ids
/// and genomes; every other slot is a fresh clone of a tournament winner.
pub fn select_next_generation<R: Rng>(
    population: &[Individual],
    elitism_count: usize,
    tournament_size: usize,
    ids: &mut IdAllocator,
    rng: &mut R,
) -> Vec<Individual> {
    let target_size = population.len();
    let mut ranked: Vec<&Individual> = population.iter().collect();
    ranked.sort_by(|a, b| rank_order(a, b));

    let mut next_generation: Vec<Individual> = ranked
        .iter()
        .take(elitism_count)
        .map(|elite| elite.carried_over())
        .collect();

    while next_generation.len() < target_size {
        match tournament_selection(population, tournament_size, rng) {
            Some(winner) => next_generation.push(winner.offspring(ids.next_id())),
            None => break,
        }
    }

    next_generation
}

/// Perturb one numeric parameter by a factor in `[1 - strength, 1 + strength]`,
/// then clamp it to its domain. Returns false when the genome has nothing to tune.
pub fn mutate<R: Rng>(genome: &mut Genome, strength: f64, rng: &mut R) -> bool {
    let mut tunables = genome.tunables_mut();
    if tunables.is_empty() {
        return false;
    }
    let index = rng.gen_range(0..tunables.len());
    let tunable = &mut tunables[index];
    let factor = 1.0 + rng.gen_range(-strength..=strength);
    *tunable.value = tunable.domain.clamp(*tunable.value * factor);
    true
}

/// Mutate every non-elite individual with probability `mutation_rate`.
///
/// Elites occupy the first `elitism_count` slots, as laid out by
/// [`select_next_generation`].
pub fn mutate_population<R: Rng>(
    population: &mut [Individual],
    elitism_count: usize,
    mutation_rate: f64,
    mutation_strength: f64,
    rng: &mut R,
) -> usize {
    let mut mutated = 0;
    for individual in population.iter_mut().skip(elitism_count) {
        if rng.gen::<f64>() < mutation_rate && mutate(&mut individual.genome, mutation_strength, rng) {
            mutated += 1;
        }
    }
    mutated
}

fn draw<R: Rng>(range: &UniformRange, rng: &mut R) -> f64 {
    if range.max <= range.min {
        return range.min;
    }
    rng.gen_range(range.min..=range.max)
}

/// Generate a random genome.
///
/// Two states: `observe` kills on CPU or memory excess and escalates to
/// `alert` on read I/O; `alert` kills on CPU or thread excess and relaxes
/// back when CPU drops. Every threshold is drawn from `seeding`.
pub fn random_genome<R: Rng>(seeding: &SeedingConfig, rng: &mut R) -> Genome {
    let observe = StateDefinition {
        active_policy: PolicyNode::combinator(
            LogicOp::Or,
            vec![
                PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Gt, draw(&seeding.cpu_percent, rng)),
                PolicyNode::rule(MEMORY_RSS_BYTES, Comparison::Gt, draw(&seeding.memory_rss_bytes, rng)),
            ],
        ),
        transitions: vec![Transition {
            condition: PolicyNode::rule(IO_READ_BYTES, Comparison::Gt, draw(&seeding.io_read_bytes, rng)),
            target_state: "alert".to_string(),
        }],
    };
    let alert = StateDefinition {
        active_policy: PolicyNode::combinator(
            LogicOp::Or,
            vec![
                PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Gt, draw(&seeding.cpu_percent, rng)),
                PolicyNode::rule(NUM_THREADS, Comparison::Gt, draw(&seeding.num_threads, rng)),
            ],
        ),
        transitions: vec![Transition {
            condition: PolicyNode::rule(CPU_PERCENT_TOTAL, Comparison::Lt, draw(&seeding.cpu_percent, rng)),
            target_state: "observe".to_string(),
        }],
    };

    let mut states = BTreeMap::new();
    states.insert("observe".to_string(), observe);
    states.insert("alert".to_string(), alert);
    Genome {
        states,
        initial_state: Some("observe".to_string()),
        parameters: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scored(id: u64, fitness: f64) -> Individual {
        Individual {
            fitness: Some(fitness),
            ..Individual::new(id, Genome::permissive())
        }
    }

    #[test]
    fn test_tournament_of_whole_population_picks_best() {
        let population = vec![scored(0, 1.0), scored(1, 9.0), scored(2, 9.0), scored(3, -4.0)];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let winner = tournament_selection(&population, 10, &mut rng).unwrap();
            assert_eq!(winner.id, 1);
        }
        assert!(tournament_selection(&[], 3, &mut rng).is_none());
    }

    #[test]
    fn test_selection_keeps_size_and_fresh_ids() {
        let population: Vec<Individual> = (0..6).map(|i| scored(i, i as f64)).collect();
        let mut ids = IdAllocator { next: 6 };
        let mut rng = StdRng::seed_from_u64(3);
        let next = select_next_generation(&population, 2, 3, &mut ids, &mut rng);

        assert_eq!(next.len(), 6);
        assert_eq!(next[0].id, 5);
        assert_eq!(next[1].id, 4);
        assert!(next.iter().skip(2).all(|i| i.id >= 6 && i.parent_id.is_some()));
        assert!(next.iter().all(|i| !i.is_scored()));
    }

    #[test]
    fn test_mutation_stays_in_domain() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut genome = random_genome(&SeedingConfig::default(), &mut rng);
        for _ in 0..500 {
            assert!(mutate(&mut genome, 0.9, &mut rng));
        }
        for tunable in genome.tunables_mut() {
            assert!(*tunable.value >= tunable.domain.min);
            assert!(*tunable.value <= tunable.domain.max);
        }
    }

    #[test]
    fn test_mutation_changes_exactly_one_parameter() {
        let mut rng = StdRng::seed_from_u64(5);
        let original = random_genome(&SeedingConfig::default(), &mut rng);
        let mut mutated = original.clone();
        mutate(&mut mutated, 0.2, &mut rng);

        let mut before = original.clone();
        let before_values: Vec<f64> = before.tunables_mut().iter().map(|t| *t.value).collect();
        let after_values: Vec<f64> = mutated.tunables_mut().iter().map(|t| *t.value).collect();
        let changed = before_values
            .iter()
            .zip(&after_values)
            .filter(|(a, b)| a != b)
            .count();
        assert!(changed <= 1);
        for (a, b) in before_values.iter().zip(&after_values) {
            if a != b {
                let ratio = b / a;
                assert!(ratio >= 0.8 - 1e-9 && ratio <= 1.2 + 1e-9 || *b == 1.0 || *b == 95.0);
            }
        }
    }

    #[test]
    fn test_random_genome_is_valid_and_seeded_from_ranges() {
        let mut rng = StdRng::seed_from_u64(1);
        let seeding = SeedingConfig::default();
        let mut genome = random_genome(&seeding, &mut rng);
        assert!(genome.validate().is_ok());
        assert_eq!(genome.state_count(), 2);
        assert_eq!(genome.tunables_mut().len(), 6);
    }
}
