//! The training program driving the RoI data layer.

pub mod common;
pub mod config;
pub mod utils;

use crate::{common::*, config::Config, utils::RateCounter};

/// The entry of training program.
pub async fn start(config: Arc<Config>) -> Result<()> {
    let start_time = Local::now();
    let logging_dir: Arc<Path> = {
        let dir = config
            .logging
            .dir
            .join(format!("{}", start_time.format(utils::FILE_STRFTIME)));
        dir.into_boxed_path().into()
    };

    // create dirs and save config
    {
        tokio::fs::create_dir_all(&*logging_dir).await?;
        let path = logging_dir.join("config.json5");
        let text = serde_json::to_string_pretty(&*config)?;
        tokio::fs::write(&path, text).await?;
    }
    info!("logging to '{}'", logging_dir.display());

    // load dataset
    info!("loading dataset");
    let store = {
        let path = config.dataset.roidb_file.clone();
        tokio::task::spawn_blocking(move || ExampleStore::open(path))
            .await?
            .with_context(|| {
                format!(
                    "failed to load roidb file '{}'",
                    config.dataset.roidb_file.display()
                )
            })?
    };
    let store = Arc::new(store);

    // training worker
    let training_worker_future = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || training_worker(config, store))
            .map(|result| Fallible::Ok(result??))
    };

    let num_steps = training_worker_future.await?;
    info!("finished {} steps", num_steps);

    Ok(())
}

/// Runs the forward passes of the data layer and returns the number of
/// finished steps.
pub fn training_worker(config: Arc<Config>, store: Arc<ExampleStore>) -> Result<usize> {
    let _span = info_span!("training_worker").entered();
    let Config {
        ref layer,
        ref dataset,
        ref training,
        ..
    } = *config;

    let num_inputs = RoiDataLayer::num_inputs(layer, &training.layer_params)?;
    let mut inputs = vec![InputSlot::default(); num_inputs];
    let mut data_layer = RoiDataLayer::setup(layer.clone(), &training.layer_params, &mut inputs)?;

    let builder = {
        let source = BlankImageSource::new(dataset.image_channels.clone())?;
        FastRcnnBuilder::new(&layer.training, Arc::new(source))?
    };
    data_layer.set_roidb(store, Arc::new(builder))?;

    let names = data_layer
        .publisher()
        .table()
        .names()
        .map(String::from)
        .collect_vec();
    let mut rate_counter = RateCounter::with_second_interval();

    for step in 0..training.steps {
        trace_span!("forward", step).in_scope(|| data_layer.forward(&mut inputs))?;
        data_layer.backward();

        rate_counter.add(1.0);
        if let Some(rate) = rate_counter.rate() {
            info!("step {}\t{:.2} minibatches/s", step, rate);
        }

        debug!(
            "step {}\t{}",
            step,
            names
                .iter()
                .zip(&inputs)
                .map(|(name, slot)| format!("{}: {:?}", name, slot.shape()))
                .join(", ")
        );
    }

    data_layer.shutdown();
    Ok(training.steps)
}
