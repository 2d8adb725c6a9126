use serde::Serialize;

/// Summary of one evaluated generation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSummary {
    pub generation: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub champion_id: Option<u64>,
    pub hall_of_fame_size: usize,
}

pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, generation: usize);
    fn on_individual_evaluated(&mut self, evaluated: usize, total: usize);
    fn on_generation_complete(&mut self, summary: &GenerationSummary);
}

pub struct ConsoleProgressCallback;

impl ProgressCallback for ConsoleProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        log::info!("Generation {} starting...", generation + 1);
    }

    fn on_individual_evaluated(&mut self, evaluated: usize, total: usize) {
        if evaluated % 10 == 0 || evaluated == total {
            log::info!("  Scored {}/{} policies", evaluated, total);
        }
    }

    fn on_generation_complete(&mut self, summary: &GenerationSummary) {
        log::info!(
            "Generation {} complete. Best fitness: {:.4}, mean: {:.4}, Hall of Fame size: {}",
            summary.generation + 1,
            summary.best_fitness,
            summary.mean_fitness,
            summary.hall_of_fame_size
        );
    }
}

/// Forwards progress over a channel, for callers that watch the search
/// from another thread
pub struct ChannelProgressCallback {
    sender: std::sync::mpsc::Sender<ProgressMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    GenerationStart(usize),
    IndividualEvaluated { current: usize, total: usize },
    GenerationComplete(GenerationSummary),
}

impl ChannelProgressCallback {
    pub fn new(sender: std::sync::mpsc::Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationStart(generation));
    }

    fn on_individual_evaluated(&mut self, evaluated: usize, total: usize) {
        let _ = self.sender.send(ProgressMessage::IndividualEvaluated {
            current: evaluated,
            total,
        });
    }

    fn on_generation_complete(&mut self, summary: &GenerationSummary) {
        let _ = self
            .sender
            .send(ProgressMessage::GenerationComplete(summary.clone()));
    }
}
