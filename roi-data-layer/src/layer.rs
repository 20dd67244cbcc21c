//! The data layer facade driven by the training loop.

use crate::{
    common::*,
    config::LayerConfig,
    example::ExampleStore,
    feeder::Feeder,
    minibatch::MinibatchBuilder,
    publisher::{BatchPublisher, NetworkInputs, SlotTable},
};
use structopt::StructOpt;

/// The layer parameters given as a string of flags, for example
/// `--num_classes 21 --num_data 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StructOpt)]
#[structopt(name = "roi-data-layer")]
pub struct LayerParams {
    /// The number of classes including background.
    #[structopt(long = "num_classes")]
    pub num_classes: usize,
    /// The number of image streams per example.
    #[structopt(long = "num_data")]
    pub num_data: usize,
}

impl LayerParams {
    pub fn parse(text: &str) -> Result<Self> {
        let args = iter::once("roi-data-layer").chain(text.split_whitespace());
        let params = Self::from_iter_safe(args)
            .with_context(|| format!("invalid layer parameters '{}'", text))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.num_classes >= 1,
            "num_classes must be at least 1, but get {}",
            self.num_classes
        );
        ensure!(
            self.num_data >= 1,
            "num_data must be at least 1, but get {}",
            self.num_data
        );
        Ok(())
    }
}

impl FromStr for LayerParams {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

/// The RoI data layer.
///
/// It is set up once with the layer parameters, receives the example store,
/// and then fills the network inputs on every forward pass.
#[derive(Debug)]
pub struct RoiDataLayer {
    config: LayerConfig,
    params: LayerParams,
    publisher: BatchPublisher,
    feeder: Option<Feeder>,
}

impl RoiDataLayer {
    /// Parses the layer parameters, builds the slot table and gives the
    /// network inputs their placeholder shapes.
    pub fn setup<N>(config: LayerConfig, param_str: &str, inputs: &mut N) -> Result<Self>
    where
        N: NetworkInputs + ?Sized,
    {
        config.validate()?;
        let params = LayerParams::parse(param_str)?;
        let table = SlotTable::new(
            params.num_data,
            params.num_classes,
            config.training.bbox_reg,
        )?;
        let publisher = BatchPublisher::new(table);
        publisher.init_inputs(inputs)?;

        info!(
            "set up data layer with {} classes, {} data streams and inputs {:?}",
            params.num_classes,
            params.num_data,
            publisher.table().names().collect_vec()
        );

        Ok(Self {
            config,
            params,
            publisher,
            feeder: None,
        })
    }

    /// The number of network inputs the layer fills with given parameters.
    pub fn num_inputs(config: &LayerConfig, param_str: &str) -> Result<usize> {
        let params = LayerParams::parse(param_str)?;
        let table = SlotTable::new(
            params.num_data,
            params.num_classes,
            config.training.bbox_reg,
        )?;
        Ok(table.len())
    }

    /// Sets the examples to train on. A previous feeder is shut down.
    pub fn set_roidb(
        &mut self,
        store: Arc<ExampleStore>,
        builder: Arc<dyn MinibatchBuilder>,
    ) -> Result<()> {
        if let Some(mut feeder) = self.feeder.take() {
            feeder.shutdown();
        }
        let feeder = Feeder::new(&self.config, store, builder, self.params)?;
        self.feeder = Some(feeder);
        Ok(())
    }

    /// Fetches the next minibatch and copies it into the network inputs.
    pub fn forward<N>(&mut self, inputs: &mut N) -> Result<()>
    where
        N: NetworkInputs + ?Sized,
    {
        let feeder = self
            .feeder
            .as_mut()
            .ok_or_else(|| format_err!("set_roidb() must be called before forward()"))?;
        let blobs = feeder.next_minibatch()?;
        self.publisher.publish(&blobs, inputs)
    }

    /// The layer does not propagate gradients.
    pub fn backward(&mut self) {}

    /// Reshaping happens in [RoiDataLayer::forward].
    pub fn reshape(&mut self) {}

    pub fn shutdown(&mut self) {
        if let Some(feeder) = self.feeder.as_mut() {
            feeder.shutdown();
        }
    }

    pub fn params(&self) -> LayerParams {
        self.params
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn publisher(&self) -> &BatchPublisher {
        &self.publisher
    }

    pub fn feeder(&self) -> Option<&Feeder> {
        self.feeder.as_ref()
    }
}
