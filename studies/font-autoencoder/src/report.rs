use std::sync::mpsc::Sender;

use tracing::info;
use ui::state::TrainingState;

/// Logs training events and mirrors them into the dashboard when one is attached.
pub struct ProgressReporter {
    tx: Option<Sender<TrainingState>>,
    state: TrainingState,
}

impl ProgressReporter {
    pub fn new(tx: Option<Sender<TrainingState>>) -> Self {
        Self { tx, state: TrainingState::default() }
    }

    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    pub fn started(&mut self, max_epoch: usize, max_iteration: usize, batch_size: usize) {
        self.state.progress.max_epoch = gauge_value(max_epoch);
        self.state.progress.max_iteration = gauge_value(max_iteration);
        self.state.progress.batch_size = gauge_value(batch_size);
        self.state.description = format!("ITERATION - loss: {:.5}", 0.0);
        info!(epochs = max_epoch, iterations = max_iteration, batch_size, "training started");
        self.send();
    }

    pub fn split(&mut self, name: &str, samples: usize) {
        info!(split = name, samples, "dataset loaded");
        self.state.splits.push((name.to_string(), samples.to_string()));
        self.send();
    }

    pub fn epoch_started(&mut self, epoch: usize) {
        self.state.progress.current_epoch = gauge_value(epoch.saturating_sub(1));
        self.state.progress.current_iteration = 0;
        self.send();
    }

    /// Called every `log_interval` iterations of an epoch.
    pub fn iteration(&mut self, epoch: usize, iteration: usize, loss: f64, running: f64) {
        self.state.description = format!("ITERATION - loss: {:.5}", loss);
        self.state.running_loss = running;
        self.state.progress.current_iteration = gauge_value(iteration);
        info!(epoch, iteration, running_mse = running, "ITERATION - loss: {:.5}", loss);
        self.send();
    }

    pub fn epoch_completed(&mut self, epoch: usize, train_mse: f64, valid_mse: f64) {
        info!("Training Result - Epoch: {} MSE: {:.7}", epoch, train_mse);
        info!("Validation Results - Epoch: {} MSE: {:.7}", epoch, valid_mse);

        self.state.progress.current_epoch = gauge_value(epoch);
        self.state.history.train.push((epoch as f64, train_mse));
        self.state.history.valid.push((epoch as f64, valid_mse));
        self.state.log.push((format!("-> Epoch {} Train", epoch), format!("{:.7}", train_mse)));
        self.state.log.push((format!("-> Epoch {} Valid", epoch), format!("{:.7}", valid_mse)));
        self.send();
    }

    pub fn artifact(&mut self, kind: &str, path: &std::path::Path) {
        info!(kind, path = %path.display(), "artifact saved");
        self.state.log.push((format!("Saved {}", kind), path.display().to_string()));
        self.send();
    }

    pub fn finished(&mut self) {
        self.state.finished = true;
        info!("training finished");
        self.send();
    }

    fn send(&self) {
        if let Some(tx) = &self.tx {
            // A closed dashboard must not stop training.
            let _ = tx.send(self.state.clone());
        }
    }
}

/// Dashboard counters are `u16`; larger values pin to the maximum.
fn gauge_value(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}
