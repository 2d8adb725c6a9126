use crate::engines::generation::individual::{rank_order, Individual};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElitePolicy {
    pub individual: Individual,
    pub generation: usize,
    pub canonical_string: String, // For deduplication
}

/// Best distinct policies seen across the whole search
pub struct HallOfFame {
    policies: Vec<ElitePolicy>,
    max_size: usize,
    seen_signatures: HashSet<String>,
}

impl HallOfFame {
    pub fn new(max_size: usize) -> Self {
        Self {
            policies: Vec::new(),
            max_size,
            seen_signatures: HashSet::new(),
        }
    }

    /// Attempt to add a scored individual. Unscored individuals are
    /// rejected. A genome already present has its entry replaced by the newer
    /// score, since elites are re-run every generation; that is not an
    /// addition and returns `false`.
    pub fn try_add(&mut self, individual: &Individual, generation: usize) -> bool {
        if !individual.is_scored() || self.max_size == 0 {
            return false;
        }
        let canonical_string = individual.genome.canonical_json();
        if self.seen_signatures.contains(&canonical_string) {
            if let Some(entry) = self
                .policies
                .iter_mut()
                .find(|entry| entry.canonical_string == canonical_string)
            {
                entry.individual = individual.clone();
                entry.generation = generation;
            }
            self.sort_and_trim();
            return false;
        }

        self.seen_signatures.insert(canonical_string.clone());
        self.policies.push(ElitePolicy {
            individual: individual.clone(),
            generation,
            canonical_string,
        });
        self.sort_and_trim();
        true
    }

    fn sort_and_trim(&mut self) {
        self.policies
            .sort_by(|a, b| rank_order(&a.individual, &b.individual));

        while self.policies.len() > self.max_size {
            if let Some(removed) = self.policies.pop() {
                self.seen_signatures.remove(&removed.canonical_string);
            }
        }
    }

    pub fn get_all(&self) -> &[ElitePolicy] {
        &self.policies
    }

    pub fn get_top_n(&self, n: usize) -> &[ElitePolicy] {
        &self.policies[..n.min(self.policies.len())]
    }

    pub fn best(&self) -> Option<&ElitePolicy> {
        self.policies.first()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
