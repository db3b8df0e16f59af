use std::sync::{ Arc, Mutex };

/// One point per finished epoch: `(epoch, mse)`.
#[derive(Debug, Default, Clone)]
pub struct MseHistory {
    pub train: Vec<(f64, f64)>,
    pub valid: Vec<(f64, f64)>,
}

impl MseHistory {
    /// Largest value across both series, used to scale the chart.
    pub fn max_mse(&self) -> f64 {
        self.train
            .iter()
            .chain(self.valid.iter())
            .map(|(_, mse)| *mse)
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Default, Clone)]
pub struct Progress {
    pub current_epoch: u16,
    pub max_epoch: u16,
    pub batch_size: u16,
    pub max_iteration: u16,
    pub current_iteration: u16,
}

#[derive(Debug, Default, Clone)]
pub struct TrainingState {
    pub progress: Progress,
    pub history: MseHistory,
    /// Latest text shown next to the iteration gauge.
    pub description: String,
    pub running_loss: f64,
    /// Dataset summary rows: `(split, samples)`.
    pub splits: Vec<(String, String)>,
    pub log: Vec<(String, String)>,
    pub finished: bool,
}

pub type StateMutex = Arc<Mutex<TrainingState>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_mse_spans_both_series() {
        let history = MseHistory {
            train: vec![(1.0, 0.2), (2.0, 0.1)],
            valid: vec![(1.0, 0.3)],
        };
        assert_eq!(history.max_mse(), 0.3);
        assert_eq!(MseHistory::default().max_mse(), 0.0);
    }
}
