#![allow(dead_code)]

use anyhow::Result;
use ndarray::{array, Array2};
use rand::prelude::*;
use roi_data_layer::{
    BlankImageSource, Example, ExampleStore, FastRcnnBuilder, LayerConfig, LayerParams,
    OverlapThresholds, TrainingConfig,
};
use std::{num::NonZeroUsize, path::PathBuf, sync::Arc};

lazy_static::lazy_static! {
    pub static ref CONFIG_DIR: PathBuf =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("cfg");
    pub static ref ROIDB_FILE: PathBuf = CONFIG_DIR.join("roidb.json");
    pub static ref LAYER_CONFIG_FILE: PathBuf = CONFIG_DIR.join("layer.json5");
}

pub const NUM_CLASSES: usize = 3;

pub fn thresholds() -> OverlapThresholds {
    OverlapThresholds {
        fg: 0.5,
        bg_lo: 0.1,
        bg_hi: 0.5,
    }
}

pub fn params(num_data: usize) -> LayerParams {
    LayerParams {
        num_classes: NUM_CLASSES,
        num_data,
    }
}

/// Builds a config producing 2 images and 8 RoIs per minibatch.
pub fn layer_config(use_prefetch: bool, seed: u64) -> LayerConfig {
    LayerConfig {
        rng_seed: seed,
        training: TrainingConfig {
            ims_per_batch: NonZeroUsize::new(2).unwrap(),
            batch_size: NonZeroUsize::new(8).unwrap(),
            bbox_reg: true,
            use_prefetch,
            prefetch_capacity: NonZeroUsize::new(3).unwrap(),
            scales: vec![NonZeroUsize::new(40).unwrap(), NonZeroUsize::new(60).unwrap()],
            ..Default::default()
        },
    }
}

pub fn builder(config: &LayerConfig) -> Arc<FastRcnnBuilder> {
    let source = BlankImageSource::new(vec![NonZeroUsize::new(3).unwrap()]).unwrap();
    Arc::new(FastRcnnBuilder::new(&config.training, Arc::new(source)).unwrap())
}

/// An example with 6 regions. Eligible examples have a class 2 foreground
/// region and background regions. Ineligible ones only have regions below
/// the background band.
pub fn example(index: usize, eligible: bool) -> Example {
    let boxes = array![
        [10.0, 10.0, 50.0, 50.0],
        [0.0, 0.0, 20.0, 20.0],
        [5.0, 5.0, 30.0, 30.0],
        [40.0, 40.0, 90.0, 90.0],
        [60.0, 0.0, 99.0, 40.0],
        [0.0, 60.0, 40.0, 99.0],
    ];
    let overlaps = if eligible {
        array![
            [0.0, 0.0, 0.8],
            [0.0, 0.3, 0.0],
            [0.2, 0.0, 0.0],
            [0.0, 0.0, 0.4],
            [0.0, 0.15, 0.0],
            [0.0, 0.0, 0.0],
        ]
    } else {
        Array2::from_elem((6, NUM_CLASSES), 0.05)
    };
    let mut targets = Array2::zeros((6, 5));
    if eligible {
        targets[[0, 0]] = 2.0;
        targets[[0, 1]] = 0.5;
    }

    Example::new(
        format!("images/{:06}.jpg", index),
        100 + index % 7 * 10,
        150 + index % 5 * 10,
        boxes,
        overlaps,
    )
    .unwrap()
    .with_bbox_targets(targets)
    .unwrap()
}

pub fn store(eligible: &[bool]) -> Arc<ExampleStore> {
    let store: ExampleStore = eligible
        .iter()
        .enumerate()
        .map(|(index, &eligible)| example(index, eligible))
        .collect();
    Arc::new(store)
}

/// A store with random overlap matrices.
pub fn random_store(num_examples: usize, rng: &mut StdRng) -> Result<Arc<ExampleStore>> {
    let examples: Vec<_> = (0..num_examples)
        .map(|index| {
            let num_regions = rng.gen_range(0..8);
            let num_classes = rng.gen_range(2..5);
            let boxes = Array2::from_shape_fn((num_regions, 4), |(_, col)| {
                if col < 2 {
                    0.0
                } else {
                    10.0
                }
            });
            let overlaps =
                Array2::from_shape_fn((num_regions, num_classes), |_| rng.gen_range(0.0..=1.0));
            Example::new(format!("{}.jpg", index), 10, 10, boxes, overlaps)
        })
        .collect::<Result<_>>()?;
    Ok(Arc::new(ExampleStore::new(examples)))
}
