//! Digital filters for conditioning per-zone intensity streams

use serde::{Deserialize, Serialize};

/// Filter configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Low-pass smoothing factor, weight of the newest sample
    pub lowpass_alpha: f32,
    /// Moving-average window length in samples
    pub window_size: usize,
    /// High-pass feedback factor
    pub highpass_alpha: f32,
}

impl FilterConfig {
    /// Check every coefficient is usable
    pub fn is_valid(&self) -> bool {
        let unit = |a: f32| a > 0.0 && a <= 1.0;
        unit(self.lowpass_alpha) && unit(self.highpass_alpha) && self.window_size > 0
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            lowpass_alpha: LowPassFilter::DEFAULT_ALPHA,
            window_size: MovingAverageFilter::DEFAULT_WINDOW,
            highpass_alpha: HighPassFilter::DEFAULT_ALPHA,
        }
    }
}

/// A streaming single-sample filter
pub trait SampleFilter: Send {
    /// Feed one sample and get the filtered output
    fn apply(&mut self, sample: f32) -> f32;
}

/// Exponential low-pass: `y[n] = a*x[n] + (1-a)*y[n-1]`
///
/// The first sample initializes the output and passes through unchanged.
#[derive(Debug, Clone)]
pub struct LowPassFilter {
    alpha: f32,
    last_output: f32,
    primed: bool,
}

impl LowPassFilter {
    pub const DEFAULT_ALPHA: f32 = 0.5;

    pub fn new(alpha: f32) -> Self {
        LowPassFilter {
            alpha,
            last_output: 0.0,
            primed: false,
        }
    }
}

impl Default for LowPassFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ALPHA)
    }
}

impl SampleFilter for LowPassFilter {
    fn apply(&mut self, sample: f32) -> f32 {
        if self.primed {
            self.last_output = self.alpha * sample + (1.0 - self.alpha) * self.last_output;
        } else {
            self.last_output = sample;
            self.primed = true;
        }
        self.last_output
    }
}

/// Moving average over a fixed circular window with a running sum
///
/// Until the window fills, the output is the mean of everything seen so far.
#[derive(Debug, Clone)]
pub struct MovingAverageFilter {
    window: Vec<f32>,
    pointer: usize,
    count: usize,
    sum: f32,
}

impl MovingAverageFilter {
    pub const DEFAULT_WINDOW: usize = 4;

    /// Create new moving average filter; a zero window is widened to one sample
    pub fn new(window_size: usize) -> Self {
        MovingAverageFilter {
            window: vec![0.0; window_size.max(1)],
            pointer: 0,
            count: 0,
            sum: 0.0,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }
}

impl Default for MovingAverageFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

impl SampleFilter for MovingAverageFilter {
    fn apply(&mut self, sample: f32) -> f32 {
        self.sum -= self.window[self.pointer];
        self.window[self.pointer] = sample;
        self.sum += sample;
        self.pointer = (self.pointer + 1) % self.window.len();
        if self.count < self.window.len() {
            self.count += 1;
        }

        self.sum / self.count as f32
    }
}

/// High-pass: `y[n] = a*(y[n-1] + x[n] - x[n-1])`, with `x[-1] = y[-1] = 0`
#[derive(Debug, Clone)]
pub struct HighPassFilter {
    alpha: f32,
    prev_input: f32,
    prev_output: f32,
}

impl HighPassFilter {
    pub const DEFAULT_ALPHA: f32 = 0.975;

    pub fn new(alpha: f32) -> Self {
        HighPassFilter {
            alpha,
            prev_input: 0.0,
            prev_output: 0.0,
        }
    }
}

impl Default for HighPassFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ALPHA)
    }
}

impl SampleFilter for HighPassFilter {
    fn apply(&mut self, sample: f32) -> f32 {
        let output = self.alpha * (self.prev_output + sample - self.prev_input);
        self.prev_input = sample;
        self.prev_output = output;
        output
    }
}

/// Low-pass, moving-average, high-pass chain for one zone
#[derive(Debug, Clone)]
pub struct ZoneFilterChain {
    low_pass: LowPassFilter,
    moving_average: MovingAverageFilter,
    high_pass: HighPassFilter,
}

impl ZoneFilterChain {
    pub fn new(config: &FilterConfig) -> Self {
        ZoneFilterChain {
            low_pass: LowPassFilter::new(config.lowpass_alpha),
            moving_average: MovingAverageFilter::new(config.window_size),
            high_pass: HighPassFilter::new(config.highpass_alpha),
        }
    }

    /// Run one raw zone average through all three stages
    pub fn apply(&mut self, sample: f32) -> f32 {
        let smoothed = self.low_pass.apply(sample);
        let averaged = self.moving_average.apply(smoothed);
        self.high_pass.apply(averaged)
    }
}

/// One independent filter chain per zone
pub struct FilterBank {
    config: FilterConfig,
    chains: Vec<ZoneFilterChain>,
}

impl FilterBank {
    /// Create new filter bank with `zones` fresh chains
    pub fn new(zones: usize, config: FilterConfig) -> Self {
        let chains = (0..zones).map(|_| ZoneFilterChain::new(&config)).collect();
        FilterBank { config, chains }
    }

    pub fn zone_count(&self) -> usize {
        self.chains.len()
    }

    /// Filter one value per zone; `samples.len()` must equal the zone count
    pub fn apply(&mut self, samples: &[f32]) -> Vec<f32> {
        debug_assert_eq!(samples.len(), self.chains.len());
        self.chains
            .iter_mut()
            .zip(samples)
            .map(|(chain, &sample)| chain.apply(sample))
            .collect()
    }

    /// Replace every chain with a freshly constructed one
    pub fn rebuild(&mut self) {
        let zones = self.chains.len();
        self.chains = (0..zones).map(|_| ZoneFilterChain::new(&self.config)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_lowpass_first_sample_passes_through() {
        let mut filter = LowPassFilter::default();
        assert_eq!(filter.apply(-173.25), -173.25);

        let inputs = [4.0, -2.0, 10.0];
        let mut prev = -173.25;
        for x in inputs {
            let y = filter.apply(x);
            assert!((y - (0.5 * x + 0.5 * prev)).abs() < EPS);
            prev = y;
        }
    }

    #[test]
    fn test_moving_average_warmup_and_window() {
        let mut filter = MovingAverageFilter::default();

        assert!((filter.apply(2.0) - 2.0).abs() < EPS);
        assert!((filter.apply(4.0) - 3.0).abs() < EPS);
        assert!((filter.apply(6.0) - 4.0).abs() < EPS);
        assert!((filter.apply(8.0) - 5.0).abs() < EPS);

        // Window now slides: mean of the last four
        assert!((filter.apply(10.0) - 7.0).abs() < EPS);
        assert!((filter.apply(-10.0) - 3.5).abs() < EPS);
    }

    #[test]
    fn test_moving_average_matches_mean_of_last_four() {
        let mut filter = MovingAverageFilter::new(4);
        let inputs: Vec<f32> = (0..50).map(|i| ((i * 37) % 11) as f32 - 5.0).collect();

        for (i, &x) in inputs.iter().enumerate() {
            let y = filter.apply(x);
            let start = i.saturating_sub(3);
            let window = &inputs[start..=i];
            let mean = window.iter().sum::<f32>() / window.len() as f32;
            assert!((y - mean).abs() < 1e-3, "sample {}: {} vs {}", i, y, mean);
        }
    }

    #[test]
    fn test_highpass_first_output() {
        let mut filter = HighPassFilter::default();
        // prev input and output both start at zero
        assert!((filter.apply(2.0) - 0.975 * 2.0).abs() < EPS);
    }

    #[test]
    fn test_highpass_rejects_dc() {
        let mut filter = HighPassFilter::default();
        let mut output = 0.0;
        for _ in 0..2000 {
            output = filter.apply(-170.0);
        }
        assert!(output.abs() < 1e-6);
    }

    #[test]
    fn test_chain_settles_on_constant_input() {
        let mut chain = ZoneFilterChain::new(&FilterConfig::default());
        let first = chain.apply(-150.0);
        // The first output still carries the step, far outside a +/-1 band
        assert!(first.abs() > 100.0);

        let mut last = first;
        for _ in 0..1000 {
            last = chain.apply(-150.0);
        }
        assert!(last.abs() < 1e-3);
    }

    #[test]
    fn test_filter_bank_zones_are_independent() {
        let mut bank = FilterBank::new(4, FilterConfig::default());
        let out = bank.apply(&[1.0, 2.0, 3.0, 4.0]);

        // Each zone sees only its own history, so equal first outputs per zone input
        for (i, y) in out.iter().enumerate() {
            let expected = 0.975 * (i as f32 + 1.0);
            assert!((y - expected).abs() < EPS);
        }
    }

    #[test]
    fn test_filter_bank_rebuild_clears_history() {
        let mut bank = FilterBank::new(2, FilterConfig::default());
        let fresh = bank.apply(&[5.0, 5.0]);
        for _ in 0..10 {
            bank.apply(&[5.0, 5.0]);
        }
        bank.rebuild();
        assert_eq!(bank.apply(&[5.0, 5.0]), fresh);
    }

    #[test]
    fn test_filter_config_validation() {
        assert!(FilterConfig::default().is_valid());
        let bad = FilterConfig {
            window_size: 0,
            ..Default::default()
        };
        assert!(!bad.is_valid());
        let bad_alpha = FilterConfig {
            highpass_alpha: 1.5,
            ..Default::default()
        };
        assert!(!bad_alpha.is_valid());
    }
}
