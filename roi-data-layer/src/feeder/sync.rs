use crate::{
    blob::BlobSet,
    common::*,
    config::LayerConfig,
    example::ExampleStore,
    layer::LayerParams,
    minibatch::MinibatchBuilder,
    sampler::IndexSampler,
};

/// Builds minibatches on the caller's thread.
#[derive(Debug)]
pub struct SyncFeeder {
    store: Arc<ExampleStore>,
    sampler: IndexSampler,
    builder: Arc<dyn MinibatchBuilder>,
    rng: StdRng,
    params: LayerParams,
}

impl SyncFeeder {
    pub fn new(
        config: &LayerConfig,
        store: Arc<ExampleStore>,
        builder: Arc<dyn MinibatchBuilder>,
        params: LayerParams,
    ) -> Result<Self> {
        let LayerConfig {
            rng_seed,
            ref training,
        } = *config;

        let sampler = IndexSampler::new(
            store.clone(),
            training.thresholds(),
            training.sampling_policy,
            training.ims_per_batch,
            rng_seed,
        )?;

        Ok(Self {
            store,
            sampler,
            builder,
            // the builder draws from a stream apart from the sampler's
            rng: StdRng::seed_from_u64(rng_seed.wrapping_add(1)),
            params,
        })
    }

    /// Samples the next examples and builds their blobs.
    pub fn next_minibatch(&mut self) -> Result<BlobSet> {
        let indices = self.sampler.next_indices()?;
        let examples = self.store.gather(indices)?;
        let LayerParams {
            num_classes,
            num_data,
        } = self.params;
        self.builder
            .build(&examples, num_classes, num_data, &mut self.rng)
    }

    pub fn sampler(&self) -> &IndexSampler {
        &self.sampler
    }

    pub fn params(&self) -> LayerParams {
        self.params
    }
}
