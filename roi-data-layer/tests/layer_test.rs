mod common;

use anyhow::Result;
use common::{LAYER_CONFIG_FILE, ROIDB_FILE};
use roi_data_layer::{
    BlankImageSource, ExampleStore, FastRcnnBuilder, InputSlot, LayerConfig, RoiDataLayer,
};
use std::{num::NonZeroUsize, sync::Arc};

const PARAM_STR: &str = "--num_classes 3 --num_data 2";

fn builder(config: &LayerConfig) -> Result<Arc<FastRcnnBuilder>> {
    let channels = vec![NonZeroUsize::new(3).unwrap(), NonZeroUsize::new(1).unwrap()];
    let source = BlankImageSource::new(channels)?;
    Ok(Arc::new(FastRcnnBuilder::new(&config.training, Arc::new(source))?))
}

#[test]
fn load_fixtures_test() -> Result<()> {
    let config = LayerConfig::open(&*LAYER_CONFIG_FILE)?;
    assert_eq!(config.rng_seed, 11);
    assert!(config.training.use_prefetch);
    assert_eq!(config.training.prefetch_capacity.get(), 4);

    let store = ExampleStore::open(&*ROIDB_FILE)?;
    assert_eq!(store.len(), 5);
    let eligible = store.eligible_mask(&config.training.thresholds());
    assert_eq!(eligible, vec![true, true, true, false, true]);
    Ok(())
}

#[test]
fn layer_forward_test() -> Result<()> {
    for use_prefetch in [false, true] {
        let mut config = LayerConfig::open(&*LAYER_CONFIG_FILE)?;
        config.training.use_prefetch = use_prefetch;
        let store = Arc::new(ExampleStore::open(&*ROIDB_FILE)?);

        let num_inputs = RoiDataLayer::num_inputs(&config, PARAM_STR)?;
        assert_eq!(num_inputs, 6);
        let mut inputs = vec![InputSlot::default(); num_inputs];

        let mut layer = RoiDataLayer::setup(config.clone(), PARAM_STR, &mut inputs)?;
        assert!(inputs[..2].iter().all(|slot| slot.shape() == [1, 3, 100, 100]));
        assert_eq!(inputs[2].shape(), &[1, 5]);
        assert_eq!(inputs[3].shape(), &[1]);
        assert_eq!(inputs[4].shape(), &[1, 12]);
        assert_eq!(inputs[5].shape(), &[1, 12]);

        layer.set_roidb(store.clone(), builder(&config)?)?;
        assert_eq!(layer.feeder().map(|feeder| feeder.is_prefetch()), Some(use_prefetch));

        for _ in 0..10 {
            layer.forward(&mut inputs)?;
            layer.backward();

            let num_rois = inputs[2].shape()[0];
            assert!(num_rois > 0 && num_rois <= 16);
            assert_eq!(inputs[0].shape()[..2], [2, 3]);
            assert_eq!(inputs[1].shape()[..2], [2, 1]);
            assert_eq!(inputs[3].shape(), &[num_rois]);
            assert_eq!(inputs[4].shape(), &[num_rois, 12]);
            assert_eq!(inputs[5].shape(), &[num_rois, 12]);

            // the short side is 120 or 160 unless capped by the long side
            let (height, width) = (inputs[0].shape()[2], inputs[0].shape()[3]);
            assert!(height.max(width) <= 240);

            let rois = inputs[2].data();
            assert!(rois.outer_iter().all(|roi| roi[0] == 0.0 || roi[0] == 1.0));
            let labels = inputs[3].data();
            assert!(labels.iter().all(|&label| label == 0.0 || label == 1.0 || label == 2.0));
        }

        layer.shutdown();
        layer.shutdown();
        drop(layer);
        assert_eq!(Arc::strong_count(&store), 1);
    }
    Ok(())
}

#[test]
fn replace_roidb_test() -> Result<()> {
    let config = LayerConfig::open(&*LAYER_CONFIG_FILE)?;
    let mut inputs = vec![InputSlot::default(); 6];
    let mut layer = RoiDataLayer::setup(config.clone(), PARAM_STR, &mut inputs)?;

    let first = Arc::new(ExampleStore::open(&*ROIDB_FILE)?);
    layer.set_roidb(first.clone(), builder(&config)?)?;
    layer.forward(&mut inputs)?;

    let second = Arc::new(ExampleStore::open(&*ROIDB_FILE)?);
    layer.set_roidb(second, builder(&config)?)?;
    assert_eq!(Arc::strong_count(&first), 1);
    layer.forward(&mut inputs)?;
    Ok(())
}

#[test]
fn setup_errors_test() -> Result<()> {
    let config = LayerConfig::open(&*LAYER_CONFIG_FILE)?;

    let mut inputs = vec![InputSlot::default(); 5];
    assert!(RoiDataLayer::setup(config.clone(), PARAM_STR, &mut inputs).is_err());

    let mut inputs = vec![InputSlot::default(); 6];
    assert!(RoiDataLayer::setup(config.clone(), "--num_classes 3", &mut inputs).is_err());
    assert!(RoiDataLayer::setup(config, "--num_classes 3 --num_data 0", &mut inputs).is_err());
    Ok(())
}
