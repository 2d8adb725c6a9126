use crate::engines::generation::genome::Genome;
use crate::types::{fitness_sentinel, RunOutcome};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A genome plus its score within one generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Individual {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
    pub genome: Genome,
    #[serde(with = "fitness_sentinel")]
    pub fitness: Option<f64>,
    #[serde(default)]
    pub breakdown: BTreeMap<String, f64>,
    #[serde(default)]
    pub benign_outcome: Option<RunOutcome>,
    #[serde(default)]
    pub attack_outcome: Option<RunOutcome>,
}

impl Individual {
    pub fn new(id: u64, genome: Genome) -> Self {
        Self {
            id,
            parent_id: None,
            genome,
            fitness: None,
            breakdown: BTreeMap::new(),
            benign_outcome: None,
            attack_outcome: None,
        }
    }

    /// Fresh, unscored clone of this individual's genome under a new id
    pub fn offspring(&self, id: u64) -> Self {
        Self {
            parent_id: Some(self.id),
            ..Self::new(id, self.genome.clone())
        }
    }

    /// Keep identity and genome, drop the previous generation's score
    pub fn carried_over(&self) -> Self {
        Self {
            parent_id: self.parent_id,
            ..Self::new(self.id, self.genome.clone())
        }
    }

    pub fn is_scored(&self) -> bool {
        self.fitness.is_some()
    }

    /// Fitness used for ranking; unscored individuals rank last
    pub fn rank_fitness(&self) -> f64 {
        self.fitness.unwrap_or(f64::NEG_INFINITY)
    }
}

/// Fitness descending, ties broken by lower id
pub fn rank_order(a: &Individual, b: &Individual) -> Ordering {
    b.rank_fitness()
        .partial_cmp(&a.rank_fitness())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id.cmp(&b.id))
}

/// Highest-ranked individual, if any
pub fn best_of<'a, I>(individuals: I) -> Option<&'a Individual>
where
    I: IntoIterator<Item = &'a Individual>,
{
    individuals
        .into_iter()
        .min_by(|a, b| rank_order(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: u64, fitness: Option<f64>) -> Individual {
        Individual {
            fitness,
            ..Individual::new(id, Genome::permissive())
        }
    }

    #[test]
    fn test_rank_order_breaks_ties_by_id() {
        let mut population = vec![
            scored(3, Some(10.0)),
            scored(1, None),
            scored(2, Some(10.0)),
            scored(0, Some(-5.0)),
        ];
        population.sort_by(rank_order);
        let ids: Vec<u64> = population.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 3, 0, 1]);
        assert_eq!(best_of(&population).map(|i| i.id), Some(2));
    }

    #[test]
    fn test_unscored_fitness_serializes_as_sentinel() {
        let json = serde_json::to_value(scored(7, None)).unwrap();
        assert_eq!(json["fitness"], serde_json::json!(-9999.0));
        let back: Individual = serde_json::from_value(json).unwrap();
        assert!(!back.is_scored());
    }

    #[test]
    fn test_offspring_tracks_lineage() {
        let parent = scored(4, Some(1.0));
        let child = parent.offspring(9);
        assert_eq!(child.id, 9);
        assert_eq!(child.parent_id, Some(4));
        assert_eq!(child.genome, parent.genome);
        assert!(!child.is_scored());
    }
}
