use super::{images_to_blob, ImageSource, MinibatchBuilder};
use crate::{
    blob::{self, BlobSet},
    common::*,
    config::{OverlapThresholds, TrainingConfig},
    example::Example,
};

/// The Fast R-CNN minibatch builder.
///
/// For every image it picks a random scale, samples a fixed number of
/// foreground and background RoIs, and emits the `data`, `rois` and
/// `labels` blobs, plus `bbox_targets` and `bbox_loss_weights` when
/// bounding box regression is enabled.
#[derive(Debug, Clone)]
pub struct FastRcnnBuilder {
    rois_per_batch: usize,
    fg_fraction: f64,
    thresholds: OverlapThresholds,
    bbox_reg: bool,
    scales: Vec<usize>,
    max_size: usize,
    image_source: Arc<dyn ImageSource>,
}

impl FastRcnnBuilder {
    pub fn new(config: &TrainingConfig, image_source: Arc<dyn ImageSource>) -> Result<Self> {
        config.validate()?;
        let TrainingConfig {
            batch_size,
            fg_fraction,
            bbox_reg,
            ref scales,
            max_size,
            ..
        } = *config;

        Ok(Self {
            rois_per_batch: batch_size.get(),
            fg_fraction: fg_fraction.to_f64(),
            thresholds: config.thresholds(),
            bbox_reg,
            scales: scales.iter().map(|scale| scale.get()).collect(),
            max_size: max_size.get(),
            image_source,
        })
    }

    /// Picks the resize factor of an example from the candidate scales.
    fn sample_scale(&self, example: &Example, rng: &mut StdRng) -> Result<f64> {
        let target = *self
            .scales
            .choose(rng)
            .ok_or_else(|| format_err!("no candidate scales"))?;
        let (height, width) = (*example.height() as f64, *example.width() as f64);
        let min_side = height.min(width);
        let max_side = height.max(width);

        let scale = target as f64 / min_side;
        let scale = if (scale * max_side).round() > self.max_size as f64 {
            self.max_size as f64 / max_side
        } else {
            scale
        };
        Ok(scale)
    }

    /// Samples foreground and background regions of an example.
    ///
    /// Foreground regions are the ones reaching the foreground threshold
    /// and keep their class. Background regions come from the background
    /// band and get label 0.
    fn sample_rois(
        &self,
        example: &Example,
        fg_rois_per_image: usize,
        rois_per_image: usize,
        rng: &mut StdRng,
    ) -> Vec<(usize, usize)> {
        let max_overlaps = example.max_overlaps();
        let max_classes = example.max_classes();

        let fg_inds: Vec<usize> = max_overlaps
            .iter()
            .positions(|&ov| ov >= self.thresholds.fg)
            .collect();
        let num_fg = fg_rois_per_image.min(fg_inds.len());

        let bg_inds: Vec<usize> = max_overlaps
            .iter()
            .positions(|&ov| self.thresholds.is_background(ov))
            .collect();
        let num_bg = (rois_per_image - num_fg).min(bg_inds.len());

        let fg = fg_inds
            .choose_multiple(rng, num_fg)
            .map(|&index| (index, max_classes[index]))
            .collect_vec();
        let bg = bg_inds
            .choose_multiple(rng, num_bg)
            .map(|&index| (index, 0));

        fg.into_iter().chain(bg).collect()
    }
}

impl MinibatchBuilder for FastRcnnBuilder {
    fn build(
        &self,
        examples: &[Arc<Example>],
        num_classes: usize,
        num_data: usize,
        rng: &mut StdRng,
    ) -> Result<BlobSet> {
        let num_images = examples.len();
        ensure!(num_images > 0, "cannot build a minibatch from zero examples");
        ensure!(num_data >= 1, "num_data must be at least 1");
        ensure!(
            self.rois_per_batch % num_images == 0,
            "num_images ({}) must divide the RoI batch size ({})",
            num_images,
            self.rois_per_batch
        );
        let rois_per_image = self.rois_per_batch / num_images;
        let fg_rois_per_image = (self.fg_fraction * rois_per_image as f64).round() as usize;

        let scales: Vec<f64> = examples
            .iter()
            .map(|example| self.sample_scale(example, rng))
            .try_collect()?;

        // sample RoIs of each image
        let mut rois: Vec<[f32; 5]> = vec![];
        let mut labels: Vec<i64> = vec![];
        let mut targets: Vec<(usize, [f32; 4])> = vec![];

        for (image_index, (example, &scale)) in izip!(examples, &scales).enumerate() {
            ensure!(
                example.num_classes() <= num_classes,
                "example '{}' has {} classes, more than {}",
                example.image().display(),
                example.num_classes(),
                num_classes
            );
            let sampled = self.sample_rois(example, fg_rois_per_image, rois_per_image, rng);
            let boxes = example.boxes();
            let scale = scale as f32;

            for (region, label) in sampled {
                let row = boxes.row(region);
                rois.push([
                    image_index as f32,
                    row[0] * scale,
                    row[1] * scale,
                    row[2] * scale,
                    row[3] * scale,
                ]);
                labels.push(label as i64);

                if self.bbox_reg {
                    let bbox_targets = example.bbox_targets().as_ref().ok_or_else(|| {
                        format_err!(
                            "bounding box regression is enabled but '{}' has no bbox targets",
                            example.image().display()
                        )
                    })?;
                    let target = bbox_targets.row(region);
                    let class = target[0] as usize;
                    ensure!(
                        class < num_classes,
                        "bbox target class {} out of range of {} classes",
                        class,
                        num_classes
                    );
                    targets.push((class, [target[1], target[2], target[3], target[4]]));
                }
            }
        }
        let num_rois = rois.len();

        let mut blobs = BlobSet::new();

        // image blobs of every data stream
        for stream in 0..num_data {
            let images: Vec<_> = izip!(examples, &scales)
                .map(|(example, &scale)| self.image_source.load(example, stream, scale))
                .try_collect()?;
            blobs.insert(blob::data_blob_name(stream), images_to_blob(&images)?.into());
        }

        let rois = Array2::from_shape_vec((num_rois, 5), rois.into_iter().flatten().collect())?;
        blobs.insert(blob::ROIS.to_string(), rois.into());
        blobs.insert(blob::LABELS.to_string(), Array1::from(labels).into());

        if self.bbox_reg {
            let mut bbox_targets = Array2::<f32>::zeros((num_rois, 4 * num_classes));
            let mut bbox_loss_weights = Array2::<f32>::zeros((num_rois, 4 * num_classes));

            // only the 4 columns of the target class are active
            for (row, (class, target)) in targets.into_iter().enumerate() {
                if class == 0 {
                    continue;
                }
                let cols = (4 * class)..(4 * class + 4);
                bbox_targets
                    .slice_mut(s![row, cols.clone()])
                    .assign(&ndarray::aview1(&target));
                bbox_loss_weights.slice_mut(s![row, cols]).fill(1.0);
            }

            blobs.insert(blob::BBOX_TARGETS.to_string(), bbox_targets.into());
            blobs.insert(blob::BBOX_LOSS_WEIGHTS.to_string(), bbox_loss_weights.into());
        }

        Ok(blobs)
    }
}
