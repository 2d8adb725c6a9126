//! The evolutionary search loop.
//!
//! `Uninitialized -> Calibrating -> PopulationSeeded -> (Evaluating ->
//! Selecting -> Mutating)* -> Terminated`. Each step is a method that checks
//! the current phase; [`SearchEngine::run`] drives them all. Evaluation fans
//! the population out over a rayon pool, one runner per worker thread.

use crate::config::{AppConfig, ConfigSection, EvolutionConfig, FitnessConfig, SeedingConfig, WatchdogConfig};
use crate::engines::evaluation::fitness::FitnessEvaluator;
use crate::engines::evaluation::oracle::BehavioralOracle;
use crate::engines::execution::sandbox::{GenomeRunner, RunnerFactory, Workloads};
use crate::engines::generation::genome::Genome;
use crate::engines::generation::hall_of_fame::{ElitePolicy, HallOfFame};
use crate::engines::generation::individual::{best_of, Individual};
use crate::engines::generation::operators::{mutate_population, random_genome, select_next_generation, IdAllocator};
use crate::engines::generation::progress::{GenerationSummary, ProgressCallback};
use crate::engines::generation::watchdog::{Heartbeat, StallHandler, StallReport, Watchdog};
use crate::error::{Result, SentryError};
use crate::ledger::{self, AuditLedger};
use crate::types::{RunOutcome, RunReport, SearchPhase};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Exit status used when the watchdog gives up on a frozen search
pub const STALL_EXIT_CODE: i32 = 70;

/// The configuration sections the search loop reads
#[derive(Debug, Clone, Default)]
pub struct SearchSettings {
    pub evolution: EvolutionConfig,
    pub fitness: FitnessConfig,
    pub seeding: SeedingConfig,
    pub watchdog: WatchdogConfig,
}

impl From<&AppConfig> for SearchSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            evolution: config.evolution.clone(),
            fitness: config.fitness.clone(),
            seeding: config.seeding.clone(),
            watchdog: config.watchdog.clone(),
        }
    }
}

impl SearchSettings {
    fn validate(&self) -> Result<()> {
        self.evolution.validate()?;
        self.fitness.validate()?;
        self.seeding.validate()?;
        self.watchdog.validate()?;
        Ok(())
    }
}

/// Repeated re-runs of one genome against both workloads
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GauntletReport {
    pub trials: usize,
    pub benign_passes: usize,
    pub attack_blocks: usize,
    pub benign_outcomes: Vec<RunOutcome>,
    pub attack_outcomes: Vec<RunOutcome>,
}

impl GauntletReport {
    /// Every benign run survived and every attack run was stopped
    pub fn passed(&self) -> bool {
        self.benign_passes == self.trials && self.attack_blocks == self.trials
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub champion: Individual,
    pub normal_profile: u32,
    pub generations: usize,
    pub hall_of_fame: Vec<ElitePolicy>,
}

pub struct SearchEngine<F: RunnerFactory, O: BehavioralOracle> {
    settings: SearchSettings,
    workloads: Workloads,
    factory: F,
    oracle: O,
    ledger: Arc<dyn AuditLedger>,
    rng: StdRng,
    pool: rayon::ThreadPool,
    phase: SearchPhase,
    evaluator: Option<FitnessEvaluator>,
    population: Vec<Individual>,
    last_evaluated: Vec<Individual>,
    generation: Arc<AtomicUsize>,
    ids: IdAllocator,
    hall_of_fame: HallOfFame,
    heartbeat: Arc<Heartbeat>,
    stall_handler: Option<StallHandler>,
}

impl<F: RunnerFactory, O: BehavioralOracle> SearchEngine<F, O> {
    pub fn new(
        settings: SearchSettings,
        workloads: Workloads,
        factory: F,
        oracle: O,
        ledger: Arc<dyn AuditLedger>,
    ) -> Result<Self> {
        settings.validate()?;

        let rng = match settings.evolution.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let workers = settings.evolution.worker_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("sentry-eval-{}", i))
            .build()
            .map_err(|e| SentryError::Configuration(format!("Failed to start {} evaluation workers: {}", workers, e)))?;
        let hall_of_fame = HallOfFame::new(settings.evolution.hall_of_fame_size);

        Ok(Self {
            settings,
            workloads,
            factory,
            oracle,
            ledger,
            rng,
            pool,
            phase: SearchPhase::Uninitialized,
            evaluator: None,
            population: Vec::new(),
            last_evaluated: Vec::new(),
            generation: Arc::new(AtomicUsize::new(0)),
            ids: IdAllocator::new(),
            hall_of_fame,
            heartbeat: Arc::new(Heartbeat::new("search created")),
            stall_handler: None,
        })
    }

    /// Replace the random source, for reproducible runs
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Replace the default stall handler, which flushes the ledger and exits
    pub fn with_stall_handler(mut self, handler: StallHandler) -> Self {
        self.stall_handler = Some(handler);
        self
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn generation(&self) -> usize {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn hall_of_fame(&self) -> &HallOfFame {
        &self.hall_of_fame
    }

    pub fn heartbeat(&self) -> Arc<Heartbeat> {
        Arc::clone(&self.heartbeat)
    }

    pub fn normal_profile(&self) -> Option<u32> {
        self.evaluator.as_ref().map(|e| e.normal_profile())
    }

    fn require_phase(&self, allowed: &[SearchPhase], expected: SearchPhase) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(SentryError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    /// Run the benign workload under a permissive policy and take the
    /// oracle's verdict as the normal profile.
    pub fn calibrate(&mut self) -> Result<u32> {
        self.require_phase(&[SearchPhase::Uninitialized], SearchPhase::Uninitialized)?;
        self.phase = SearchPhase::Calibrating;
        match self.calibrate_inner() {
            Ok(profile) => Ok(profile),
            Err(e) => Err(self.abort(e)),
        }
    }

    fn calibrate_inner(&mut self) -> Result<u32> {
        log::info!("Calibrating normal behavior on the benign workload");
        let mut runner = self.factory.create_runner();
        let report = runner.run(&self.workloads.benign, &Genome::permissive());
        self.heartbeat.beat("calibration run finished");

        if report.outcome == RunOutcome::UnknownError {
            return Err(SentryError::FatalInit {
                phase: SearchPhase::Calibrating,
                reason: "the target could not be run".to_string(),
            });
        }
        if !report.outcome.survived() {
            log::warn!("Calibration run ended as {}; classifying it anyway", report.outcome);
        }

        let classification = self.oracle.analyze(&report.telemetry);
        let profile = classification.profile.ok_or_else(|| SentryError::FatalInit {
            phase: SearchPhase::Calibrating,
            reason: format!(
                "the oracle could not classify the benign workload ({} samples)",
                report.samples_observed()
            ),
        })?;

        log::info!(
            "Normal profile is {} (confidence {:.3})",
            profile,
            classification.confidence_for(profile)
        );
        self.ledger.record_event(
            0,
            ledger::CALIBRATION_COMPLETE,
            json!({
                "normal_profile": profile,
                "confidence": classification.confidence,
                "outcome": report.outcome,
                "samples": report.samples_observed(),
            }),
        );
        self.evaluator = Some(FitnessEvaluator::new(self.settings.fitness.clone(), profile));
        Ok(profile)
    }

    /// Create `population_size` random individuals
    pub fn seed_population(&mut self) -> Result<()> {
        self.require_phase(&[SearchPhase::Calibrating], SearchPhase::Calibrating)?;
        if self.evaluator.is_none() {
            let e = SentryError::FatalInit {
                phase: SearchPhase::PopulationSeeded,
                reason: "no normal profile has been calibrated".to_string(),
            };
            return Err(self.abort(e));
        }

        let size = self.settings.evolution.population_size;
        let mut population = Vec::with_capacity(size);
        for _ in 0..size {
            let genome = random_genome(&self.settings.seeding, &mut self.rng);
            population.push(Individual::new(self.ids.next_id(), genome));
        }
        self.population = population;
        self.phase = SearchPhase::PopulationSeeded;

        log::info!("Seeded population of {}", size);
        match serde_json::to_value(&self.population) {
            Ok(population) => self.ledger.record_event(
                0,
                ledger::INITIAL_POPULATION_CREATED,
                json!({ "population": population }),
            ),
            Err(e) => return Err(self.abort(e.into())),
        }
        Ok(())
    }

    /// Run and score every individual of the current generation
    pub fn evaluate_generation<C: ProgressCallback>(&mut self, callback: &mut C) -> Result<GenerationSummary> {
        self.require_phase(
            &[SearchPhase::PopulationSeeded, SearchPhase::Mutating],
            SearchPhase::Evaluating,
        )?;
        self.phase = SearchPhase::Evaluating;
        match self.evaluate_inner(callback) {
            Ok(summary) => Ok(summary),
            Err(e) => Err(self.abort(e)),
        }
    }

    fn evaluate_inner<C: ProgressCallback>(&mut self, callback: &mut C) -> Result<GenerationSummary> {
        let generation = self.generation();
        let evaluator = match &self.evaluator {
            Some(evaluator) => evaluator,
            None => {
                return Err(SentryError::FatalInit {
                    phase: SearchPhase::Evaluating,
                    reason: "no normal profile has been calibrated".to_string(),
                })
            }
        };

        let factory = &self.factory;
        let workloads = &self.workloads;
        let heartbeat = &*self.heartbeat;
        let population = &self.population;
        let total = population.len();
        self.heartbeat
            .beat(format!("generation {}: evaluating {} individuals", generation, total));

        let runs: Vec<Result<(RunReport, RunReport)>> = self.pool.install(|| {
            population
                .par_iter()
                .map_init(
                    || factory.create_runner(),
                    |runner, individual| {
                        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
                            let benign = runner.run(&workloads.benign, &individual.genome);
                            let attack = runner.run(&workloads.malicious, &individual.genome);
                            (benign, attack)
                        }));
                        match attempt {
                            Ok(pair) => {
                                heartbeat.beat(format!(
                                    "generation {}: evaluated individual {}",
                                    generation, individual.id
                                ));
                                Ok(pair)
                            }
                            Err(payload) => Err(SentryError::WorkerCrash {
                                generation,
                                individual_id: individual.id,
                                genome: individual.genome.canonical_json(),
                                detail: panic_detail(payload.as_ref()),
                            }),
                        }
                    },
                )
                .collect()
        });
        let runs = runs.into_iter().collect::<Result<Vec<_>>>()?;

        for (done, (individual, (benign, attack))) in self.population.iter_mut().zip(runs).enumerate() {
            let report = evaluator.score(&benign, &attack, &individual.genome, &self.oracle);
            log::debug!(
                "individual {}: fitness {:.3} (benign {}, attack {})",
                individual.id,
                report.fitness,
                benign.outcome,
                attack.outcome
            );
            individual.fitness = Some(report.fitness);
            individual.breakdown = report.breakdown;
            individual.benign_outcome = Some(benign.outcome);
            individual.attack_outcome = Some(attack.outcome);
            callback.on_individual_evaluated(done + 1, total);
        }

        for individual in &self.population {
            self.hall_of_fame.try_add(individual, generation);
        }
        self.last_evaluated = self.population.clone();

        let scores: Vec<f64> = self.population.iter().filter_map(|i| i.fitness).collect();
        let best = best_of(&self.population);
        let summary = GenerationSummary {
            generation,
            best_fitness: best.map(|i| i.rank_fitness()).unwrap_or(f64::NEG_INFINITY),
            mean_fitness: if scores.is_empty() {
                0.0
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            },
            champion_id: best.map(|i| i.id),
            hall_of_fame_size: self.hall_of_fame.len(),
        };

        self.ledger.record_event(
            generation,
            ledger::EVALUATION_COMPLETE,
            json!({
                "generation": generation,
                "best_fitness": summary.best_fitness,
                "mean_fitness": summary.mean_fitness,
                "evaluation_results": serde_json::to_value(&self.population)?,
            }),
        );
        Ok(summary)
    }

    /// Elitism plus tournament selection into the next population
    pub fn select(&mut self) -> Result<()> {
        self.require_phase(&[SearchPhase::Evaluating], SearchPhase::Selecting)?;
        self.phase = SearchPhase::Selecting;

        let generation = self.generation();
        if let Some(champion) = best_of(&self.population) {
            log::info!(
                "Generation {} champion: individual {} with fitness {:.3}",
                generation,
                champion.id,
                champion.rank_fitness()
            );
            match serde_json::to_value(champion) {
                Ok(champion) => self.ledger.record_event(
                    generation,
                    ledger::CHAMPION_UPDATED,
                    json!({ "generation": generation, "champion": champion }),
                ),
                Err(e) => log::warn!("Champion of generation {} not recorded: {}", generation, e),
            }
        }

        let evolution = &self.settings.evolution;
        self.population = select_next_generation(
            &self.population,
            evolution.elitism_count,
            evolution.tournament_size,
            &mut self.ids,
            &mut self.rng,
        );
        Ok(())
    }

    /// Perturb non-elite individuals and advance the generation counter
    pub fn mutate(&mut self) -> Result<usize> {
        self.require_phase(&[SearchPhase::Selecting], SearchPhase::Mutating)?;
        self.phase = SearchPhase::Mutating;

        let evolution = &self.settings.evolution;
        let mutated = mutate_population(
            &mut self.population,
            evolution.elitism_count,
            evolution.mutation_rate,
            evolution.mutation_strength,
            &mut self.rng,
        );
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Mutated {} individuals for generation {}", mutated, generation);
        Ok(mutated)
    }

    /// Pick the best of the last evaluated generation and close the ledger
    pub fn terminate(&mut self) -> Result<SearchOutcome> {
        self.require_phase(
            &[SearchPhase::Evaluating, SearchPhase::Selecting, SearchPhase::Mutating],
            SearchPhase::Terminated,
        )?;
        let normal_profile = self.normal_profile();
        let (champion, normal_profile) = match (best_of(&self.last_evaluated).cloned(), normal_profile) {
            (Some(champion), Some(profile)) => (champion, profile),
            _ => {
                return Err(SentryError::InvalidPhase {
                    expected: SearchPhase::Evaluating,
                    actual: self.phase,
                })
            }
        };
        self.phase = SearchPhase::Terminated;

        let generations = self.generation() + 1;
        log::info!(
            "Final champion: individual {} with fitness {:.3} after {} generations",
            champion.id,
            champion.rank_fitness(),
            generations
        );
        self.ledger.record_event(
            self.generation(),
            ledger::FINAL_CHAMPION_SYNTHESIZED,
            json!({
                "champion": serde_json::to_value(&champion)?,
                "normal_profile": normal_profile,
                "generations": generations,
                "hall_of_fame_size": self.hall_of_fame.len(),
            }),
        );
        if let Err(e) = self.ledger.flush() {
            log::error!("Failed to persist ledger: {}", e);
        }

        Ok(SearchOutcome {
            champion,
            normal_profile,
            generations,
            hall_of_fame: self.hall_of_fame.get_all().to_vec(),
        })
    }

    /// Calibrate, seed and evolve for the configured number of generations
    pub fn run<C: ProgressCallback>(&mut self, mut callback: C) -> Result<SearchOutcome> {
        self.heartbeat.beat("search started");
        let _watchdog = self.start_watchdog()?;

        if self.phase == SearchPhase::Uninitialized {
            self.calibrate()?;
        }
        if self.phase == SearchPhase::Calibrating {
            self.seed_population()?;
        }

        let generations = self.settings.evolution.generations;
        loop {
            let generation = self.generation();
            callback.on_generation_start(generation);
            let summary = self.evaluate_generation(&mut callback)?;
            callback.on_generation_complete(&summary);
            self.select()?;
            if generation + 1 >= generations {
                break;
            }
            self.mutate()?;
        }

        self.terminate()
    }

    /// Re-run `genome` `trials` times against both workloads
    pub fn validate_champion(&self, genome: &Genome, trials: usize) -> GauntletReport {
        let mut runner = self.factory.create_runner();
        let mut report = GauntletReport {
            trials,
            benign_passes: 0,
            attack_blocks: 0,
            benign_outcomes: Vec::with_capacity(trials),
            attack_outcomes: Vec::with_capacity(trials),
        };

        for trial in 0..trials {
            let benign = runner.run(&self.workloads.benign, genome).outcome;
            let attack = runner.run(&self.workloads.malicious, genome).outcome;
            log::info!("Gauntlet trial {}/{}: benign {}, attack {}", trial + 1, trials, benign, attack);
            if benign.survived() {
                report.benign_passes += 1;
            }
            if !attack.survived() {
                report.attack_blocks += 1;
            }
            report.benign_outcomes.push(benign);
            report.attack_outcomes.push(attack);
        }
        report
    }

    fn start_watchdog(&self) -> Result<Watchdog> {
        let handler = match &self.stall_handler {
            Some(handler) => Arc::clone(handler),
            None => default_stall_handler(Arc::clone(&self.ledger), Arc::clone(&self.generation)),
        };
        let watchdog = Watchdog::spawn(
            Arc::clone(&self.heartbeat),
            self.settings.watchdog.freeze_threshold(),
            self.settings.watchdog.check_interval(),
            handler,
        )?;
        Ok(watchdog)
    }

    /// Record the failure, persist the ledger and stop the search
    fn abort(&mut self, error: SentryError) -> SentryError {
        let phase = error.phase().unwrap_or(self.phase);
        let generation = self.generation();
        let mut details = json!({
            "phase": phase.to_string(),
            "generation": generation,
            "error": error.to_string(),
        });
        if let SentryError::WorkerCrash { individual_id, genome, .. } = &error {
            log::error!(
                "Aborting during {}: {}. Offending genome (individual {}): {}",
                phase,
                error,
                individual_id,
                genome
            );
            details["individual_id"] = json!(individual_id);
            details["genome"] = json!(genome);
        } else {
            log::error!("Aborting during {}: {}", phase, error);
        }

        self.ledger.record_event(generation, ledger::FATAL_ERROR, details);
        if let Err(e) = self.ledger.flush() {
            log::error!("Failed to persist ledger after fatal error: {}", e);
        }
        self.phase = SearchPhase::Terminated;
        error
    }
}

fn default_stall_handler(audit: Arc<dyn AuditLedger>, generation: Arc<AtomicUsize>) -> StallHandler {
    Arc::new(move |report: &StallReport| {
        let generation = generation.load(Ordering::SeqCst);
        audit.record_event(
            generation,
            ledger::FATAL_ERROR,
            json!({
                "phase": SearchPhase::Evaluating.to_string(),
                "generation": generation,
                "error": "search stopped making progress",
                "silent_for_secs": report.silent_for.as_secs_f64(),
                "last_status": report.last_status,
            }),
        );
        if let Err(e) = audit.flush() {
            log::error!("Failed to persist ledger after stall: {}", e);
        }
        std::process::exit(STALL_EXIT_CODE);
    })
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::progress::ConsoleProgressCallback;
    use crate::ledger::HashChainLedger;
    use crate::types::{Classification, TelemetryReading};
    use std::collections::BTreeMap;

    /// Survives benign input, gets stopped on anything else
    struct ScriptedRunner;

    impl GenomeRunner for ScriptedRunner {
        fn run(&mut self, payload: &[u8], _genome: &Genome) -> RunReport {
            let outcome = if payload == b"benign" {
                RunOutcome::Survived
            } else {
                RunOutcome::PolicyViolation
            };
            RunReport {
                outcome,
                telemetry: vec![TelemetryReading {
                    cpu_percent_total: 4.0,
                    ..TelemetryReading::zero_impact()
                }],
                final_state: None,
            }
        }
    }

    struct ScriptedFactory;

    impl RunnerFactory for ScriptedFactory {
        type Runner = ScriptedRunner;

        fn create_runner(&self) -> ScriptedRunner {
            ScriptedRunner
        }
    }

    struct FixedOracle(Option<u32>);

    impl BehavioralOracle for FixedOracle {
        fn analyze(&self, _telemetry: &[TelemetryReading]) -> Classification {
            match self.0 {
                Some(profile) => Classification {
                    profile: Some(profile),
                    confidence: BTreeMap::from([(profile.to_string(), 1.0)]),
                },
                None => Classification::inconclusive(),
            }
        }
    }

    fn settings() -> SearchSettings {
        let mut settings = SearchSettings::default();
        settings.evolution.population_size = 6;
        settings.evolution.generations = 3;
        settings.evolution.seed = Some(42);
        settings.evolution.workers = Some(2);
        settings
    }

    fn workloads() -> Workloads {
        Workloads {
            benign: b"benign".to_vec(),
            malicious: b"attack".to_vec(),
        }
    }

    #[test]
    fn test_steps_out_of_order_are_rejected() {
        let ledger = Arc::new(HashChainLedger::in_memory().unwrap());
        let mut engine =
            SearchEngine::new(settings(), workloads(), ScriptedFactory, FixedOracle(Some(1)), ledger).unwrap();
        assert!(matches!(
            engine.select(),
            Err(SentryError::InvalidPhase { actual: SearchPhase::Uninitialized, .. })
        ));
        assert!(engine.seed_population().is_err());
        assert_eq!(engine.phase(), SearchPhase::Uninitialized);
    }

    #[test]
    fn test_inconclusive_calibration_is_fatal() {
        let ledger = Arc::new(HashChainLedger::in_memory().unwrap());
        let mut engine = SearchEngine::new(
            settings(),
            workloads(),
            ScriptedFactory,
            FixedOracle(None),
            Arc::clone(&ledger) as Arc<dyn AuditLedger>,
        )
        .unwrap();

        let err = engine.calibrate().unwrap_err();
        assert_eq!(err.phase(), Some(SearchPhase::Calibrating));
        assert_eq!(engine.phase(), SearchPhase::Terminated);
        assert_eq!(ledger.events_of(ledger::FATAL_ERROR).len(), 1);
    }

    #[test]
    fn test_full_run_records_every_milestone() {
        let ledger = Arc::new(HashChainLedger::in_memory().unwrap());
        let mut engine = SearchEngine::new(
            settings(),
            workloads(),
            ScriptedFactory,
            FixedOracle(Some(1)),
            Arc::clone(&ledger) as Arc<dyn AuditLedger>,
        )
        .unwrap();

        let outcome = engine.run(ConsoleProgressCallback).unwrap();
        assert_eq!(outcome.normal_profile, 1);
        assert_eq!(outcome.generations, 3);
        assert!(outcome.champion.is_scored());
        assert_eq!(engine.phase(), SearchPhase::Terminated);

        assert_eq!(ledger.events_of(ledger::CALIBRATION_COMPLETE).len(), 1);
        assert_eq!(ledger.events_of(ledger::INITIAL_POPULATION_CREATED).len(), 1);
        assert_eq!(ledger.events_of(ledger::EVALUATION_COMPLETE).len(), 3);
        assert_eq!(ledger.events_of(ledger::CHAMPION_UPDATED).len(), 3);
        assert_eq!(ledger.events_of(ledger::FINAL_CHAMPION_SYNTHESIZED).len(), 1);
        assert!(ledger.verify().is_ok());
    }

    #[test]
    fn test_gauntlet_counts_passes_and_blocks() {
        let ledger = Arc::new(HashChainLedger::in_memory().unwrap());
        let engine =
            SearchEngine::new(settings(), workloads(), ScriptedFactory, FixedOracle(Some(1)), ledger).unwrap();
        let report = engine.validate_champion(&Genome::permissive(), 4);
        assert_eq!(report.benign_passes, 4);
        assert_eq!(report.attack_blocks, 4);
        assert!(report.passed());
    }
}
