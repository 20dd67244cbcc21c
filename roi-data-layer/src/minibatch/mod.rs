//! Minibatch construction from sampled examples.

mod fast_rcnn;
mod image;

pub use fast_rcnn::*;
pub use image::*;

use crate::{blob::BlobSet, common::*, example::Example};

/// Builds the network input blobs from a list of training examples.
///
/// The number of RoIs per call varies with the examples, so the produced
/// blob shapes do too. Given the same random state and examples, the output
/// must be the same.
pub trait MinibatchBuilder
where
    Self: Debug + Send + Sync,
{
    fn build(
        &self,
        examples: &[Arc<Example>],
        num_classes: usize,
        num_data: usize,
        rng: &mut StdRng,
    ) -> Result<BlobSet>;
}
