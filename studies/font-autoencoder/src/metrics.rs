/// Exponential moving average of the training loss, restarted every epoch.
#[derive(Debug, Clone)]
pub struct RunningAverage {
    alpha: f64,
    value: Option<f64>,
}

impl RunningAverage {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    pub fn reset(&mut self) {
        self.value = None;
    }

    /// Folds `x` in and returns the new average. The first value seeds the average.
    pub fn update(&mut self, x: f64) -> f64 {
        let value = match self.value {
            Some(prev) => prev * self.alpha + (1.0 - self.alpha) * x,
            None => x,
        };
        self.value = Some(value);
        value
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl Default for RunningAverage {
    fn default() -> Self {
        Self::new(0.98)
    }
}

/// Sample-weighted mean of per-batch mean losses.
#[derive(Debug, Clone, Default)]
pub struct MeanLoss {
    sum: f64,
    samples: usize,
}

impl MeanLoss {
    pub fn update(&mut self, batch_loss: f64, batch_len: usize) {
        self.sum += batch_loss * (batch_len as f64);
        self.samples += batch_len;
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// `None` until at least one sample was seen.
    pub fn compute(&self) -> Option<f64> {
        if self.samples == 0 { None } else { Some(self.sum / (self.samples as f64)) }
    }
}
