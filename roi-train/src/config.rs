//! Training program configuration format.

use crate::common::*;

/// The main training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub layer: LayerConfig,
    pub dataset: DatasetConfig,
    pub logging: LoggingConfig,
    pub training: TrainingConfig,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.layer.validate()?;
        let params = self.training.layer_params()?;
        ensure!(
            !self.dataset.image_channels.is_empty(),
            "image_channels must not be empty"
        );
        if self.dataset.image_channels.len() < params.num_data {
            warn!(
                "{} data streams but {} image channel counts are given, the last one is reused",
                params.num_data,
                self.dataset.image_channels.len()
            );
        }
        Ok(())
    }
}

/// Dataset options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// The JSON file of annotated examples.
    pub roidb_file: PathBuf,
    /// The number of channels of each data stream.
    pub image_channels: Vec<NonZeroUsize>,
}

/// Data logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

/// Training loop options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// The data layer parameters, for example `--num_classes 21 --num_data 1`.
    pub layer_params: String,
    /// The number of forward steps to run.
    pub steps: usize,
}

impl TrainingConfig {
    pub fn layer_params(&self) -> Result<LayerParams> {
        LayerParams::parse(&self.layer_params)
    }
}
