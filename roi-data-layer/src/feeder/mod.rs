//! Minibatch feeders in synchronous and prefetching modes.

mod prefetch;
mod sync;

pub use prefetch::*;
pub use sync::*;

use crate::{
    blob::BlobSet, common::*, config::LayerConfig, example::ExampleStore, layer::LayerParams,
    minibatch::MinibatchBuilder,
};

/// The minibatch feeder. The mode is fixed at construction.
#[derive(Debug)]
pub enum Feeder {
    Sync(SyncFeeder),
    Prefetch(PrefetchFeeder),
}

impl Feeder {
    /// Creates a feeder in the mode selected by `use_prefetch`.
    pub fn new(
        config: &LayerConfig,
        store: Arc<ExampleStore>,
        builder: Arc<dyn MinibatchBuilder>,
        params: LayerParams,
    ) -> Result<Self> {
        let feeder = SyncFeeder::new(config, store, builder, params)?;

        let feeder = if config.training.use_prefetch {
            Self::Prefetch(PrefetchFeeder::start(
                feeder,
                config.training.prefetch_capacity,
            )?)
        } else {
            Self::Sync(feeder)
        };
        Ok(feeder)
    }

    /// Returns the blobs of the next minibatch, blocking until available.
    pub fn next_minibatch(&mut self) -> Result<BlobSet> {
        match self {
            Self::Sync(feeder) => feeder.next_minibatch(),
            Self::Prefetch(feeder) => feeder.next_minibatch(),
        }
    }

    /// Stops the producer thread in prefetching mode. It is a no-op otherwise.
    pub fn shutdown(&mut self) {
        if let Self::Prefetch(feeder) = self {
            feeder.shutdown();
        }
    }

    pub fn is_prefetch(&self) -> bool {
        matches!(self, Self::Prefetch(_))
    }
}
