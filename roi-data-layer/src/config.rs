//! Data layer configuration format.

use crate::{common::*, ratio::Ratio, sampler::SamplingPolicy};

/// The data layer configuration.
///
/// The configuration is read-only once loaded. Components receive it at
/// construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    /// The seed for the random number generators of samplers and builders.
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
    pub training: TrainingConfig,
}

impl LayerConfig {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the consistency of the options.
    pub fn validate(&self) -> Result<()> {
        self.training.validate()
    }
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            rng_seed: default_rng_seed(),
            training: TrainingConfig::default(),
        }
    }
}

/// The training options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// The number of images per minibatch.
    pub ims_per_batch: NonZeroUsize,
    /// The number of RoIs per minibatch.
    pub batch_size: NonZeroUsize,
    /// The fraction of foreground RoIs in a minibatch.
    pub fg_fraction: Ratio,
    /// RoIs with overlap above this value are foreground.
    pub fg_thresh: Ratio,
    /// The inclusive lower bound of background overlap.
    pub bg_thresh_lo: Ratio,
    /// The exclusive upper bound of background overlap.
    pub bg_thresh_hi: Ratio,
    /// If set, produce bounding box regression targets.
    pub bbox_reg: bool,
    /// If set, build minibatches on a separate thread.
    pub use_prefetch: bool,
    /// The maximum number of waiting minibatches when prefetching.
    #[serde(default = "default_prefetch_capacity")]
    pub prefetch_capacity: NonZeroUsize,
    /// Which examples are drawn by the index sampler.
    #[serde(default)]
    pub sampling_policy: SamplingPolicy,
    /// The candidate lengths of the shorter image side.
    pub scales: Vec<NonZeroUsize>,
    /// The maximum length of the longer image side.
    pub max_size: NonZeroUsize,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.bg_thresh_lo <= self.bg_thresh_hi,
            "bg_thresh_lo ({}) must not exceed bg_thresh_hi ({})",
            self.bg_thresh_lo,
            self.bg_thresh_hi
        );
        ensure!(!self.scales.is_empty(), "scales must not be empty");
        ensure!(
            self.batch_size.get() % self.ims_per_batch.get() == 0,
            "batch_size ({}) must be a multiple of ims_per_batch ({})",
            self.batch_size,
            self.ims_per_batch
        );
        Ok(())
    }

    pub fn thresholds(&self) -> OverlapThresholds {
        OverlapThresholds {
            fg: self.fg_thresh.to_f32(),
            bg_lo: self.bg_thresh_lo.to_f32(),
            bg_hi: self.bg_thresh_hi.to_f32(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            ims_per_batch: NonZeroUsize::new(2).unwrap(),
            batch_size: NonZeroUsize::new(128).unwrap(),
            fg_fraction: Ratio::clamped(0.25),
            fg_thresh: Ratio::clamped(0.5),
            bg_thresh_lo: Ratio::clamped(0.1),
            bg_thresh_hi: Ratio::clamped(0.5),
            bbox_reg: true,
            use_prefetch: false,
            prefetch_capacity: default_prefetch_capacity(),
            sampling_policy: SamplingPolicy::default(),
            scales: vec![NonZeroUsize::new(600).unwrap()],
            max_size: NonZeroUsize::new(1000).unwrap(),
        }
    }
}

/// Overlap cutoffs that tell foreground regions from background regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapThresholds {
    pub fg: f32,
    pub bg_lo: f32,
    pub bg_hi: f32,
}

impl OverlapThresholds {
    /// Whether the overlap exceeds the foreground threshold.
    pub fn is_foreground(&self, overlap: f32) -> bool {
        overlap > self.fg
    }

    /// Whether the overlap lies within the background band `[bg_lo, bg_hi)`.
    pub fn is_background(&self, overlap: f32) -> bool {
        (self.bg_lo..self.bg_hi).contains(&overlap)
    }
}

fn default_rng_seed() -> u64 {
    3
}

fn default_prefetch_capacity() -> NonZeroUsize {
    NonZeroUsize::new(10).unwrap()
}
