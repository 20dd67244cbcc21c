//! The RoI data layer that samples, assembles and feeds training minibatches
//! to an object detection network.

mod common;
pub mod blob;
pub mod config;
pub mod example;
pub mod feeder;
pub mod layer;
pub mod minibatch;
pub mod publisher;
pub mod ratio;
pub mod sampler;

pub use blob::{Blob, BlobSet};
pub use config::{LayerConfig, OverlapThresholds, TrainingConfig};
pub use example::{Example, ExampleRecord, ExampleStore};
pub use feeder::{Feeder, FeederState, PrefetchFeeder, SyncFeeder};
pub use layer::{LayerParams, RoiDataLayer};
pub use minibatch::{BlankImageSource, FastRcnnBuilder, ImageSource, MinibatchBuilder};
pub use publisher::{BatchPublisher, InputSlot, NetworkInputs, SlotTable};
pub use ratio::Ratio;
pub use sampler::{IndexSampler, SamplingPolicy};
