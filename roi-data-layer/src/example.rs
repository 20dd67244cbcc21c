//! Annotated training examples and the example store.

use crate::{common::*, config::OverlapThresholds};

/// One annotated training image with its candidate regions.
///
/// The per-region statistics `max_overlaps` and `max_classes` are computed
/// once at construction. An example is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct Example {
    image: PathBuf,
    height: usize,
    width: usize,
    flipped: bool,
    /// Region boxes in (x1, y1, x2, y2) pixel coordinates, one row per region.
    boxes: Array2<f32>,
    /// Region to class overlaps, one row per region and one column per class.
    gt_overlaps: Array2<f32>,
    /// The maximum overlap over classes for each region.
    max_overlaps: Array1<f32>,
    /// The class achieving the maximum overlap for each region.
    max_classes: Array1<usize>,
    /// Optional regression targets in (class, dx, dy, dw, dh) rows.
    bbox_targets: Option<Array2<f32>>,
}

impl Example {
    pub fn new(
        image: impl Into<PathBuf>,
        height: usize,
        width: usize,
        boxes: Array2<f32>,
        gt_overlaps: Array2<f32>,
    ) -> Result<Self> {
        let image = image.into();
        ensure!(
            height > 0 && width > 0,
            "image height and width must be positive, but get {}x{} for '{}'",
            height,
            width,
            image.display()
        );
        ensure!(
            boxes.ncols() == 4,
            "boxes must have 4 columns, but get {}",
            boxes.ncols()
        );
        ensure!(
            boxes.nrows() == gt_overlaps.nrows(),
            "the number of boxes ({}) and overlap rows ({}) mismatch",
            boxes.nrows(),
            gt_overlaps.nrows()
        );
        ensure!(
            gt_overlaps.iter().all(|ov| (0.0..=1.0).contains(ov)),
            "overlap values must be within [0.0, 1.0] for '{}'",
            image.display()
        );

        let (max_overlaps, max_classes): (Vec<f32>, Vec<usize>) = gt_overlaps
            .outer_iter()
            .map(|row| {
                row.iter()
                    .copied()
                    .enumerate()
                    .fold((0.0, 0), |(max_ov, max_cls), (cls, ov)| {
                        if ov > max_ov {
                            (ov, cls)
                        } else {
                            (max_ov, max_cls)
                        }
                    })
            })
            .unzip();

        Ok(Self {
            image,
            height,
            width,
            flipped: false,
            boxes,
            gt_overlaps,
            max_overlaps: Array1::from(max_overlaps),
            max_classes: Array1::from(max_classes),
            bbox_targets: None,
        })
    }

    pub fn with_flipped(mut self, flipped: bool) -> Self {
        self.flipped = flipped;
        self
    }

    pub fn with_bbox_targets(mut self, bbox_targets: Array2<f32>) -> Result<Self> {
        ensure!(
            bbox_targets.dim() == (self.num_regions(), 5),
            "bbox targets must have shape [{}, 5], but get {:?}",
            self.num_regions(),
            bbox_targets.shape()
        );
        self.bbox_targets = Some(bbox_targets);
        Ok(self)
    }

    pub fn num_regions(&self) -> usize {
        self.boxes.nrows()
    }

    pub fn num_classes(&self) -> usize {
        self.gt_overlaps.ncols()
    }

    /// Whether the example has at least one usable foreground region and
    /// one usable background region.
    pub fn is_eligible(&self, thresholds: &OverlapThresholds) -> bool {
        let has_fg = self
            .max_overlaps
            .iter()
            .any(|&ov| thresholds.is_foreground(ov));
        let has_bg = self
            .max_overlaps
            .iter()
            .any(|&ov| thresholds.is_background(ov));
        has_fg && has_bg
    }
}

/// The serialized form of an [Example] in a roidb file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleRecord {
    pub image: PathBuf,
    pub height: usize,
    pub width: usize,
    #[serde(default)]
    pub flipped: bool,
    pub boxes: Vec<[f32; 4]>,
    pub gt_overlaps: Vec<Vec<f32>>,
    #[serde(default)]
    pub bbox_targets: Option<Vec<[f32; 5]>>,
}

impl TryFrom<ExampleRecord> for Example {
    type Error = Error;

    fn try_from(record: ExampleRecord) -> Result<Self, Self::Error> {
        let ExampleRecord {
            image,
            height,
            width,
            flipped,
            boxes,
            gt_overlaps,
            bbox_targets,
        } = record;

        let num_regions = boxes.len();
        let num_classes = gt_overlaps.first().map(|row| row.len()).unwrap_or(0);
        ensure!(
            gt_overlaps.iter().all(|row| row.len() == num_classes),
            "overlap rows of '{}' have inconsistent lengths",
            image.display()
        );

        let boxes = Array2::from_shape_vec((num_regions, 4), boxes.into_iter().flatten().collect())?;
        let gt_overlaps = Array2::from_shape_vec(
            (gt_overlaps.len(), num_classes),
            gt_overlaps.into_iter().flatten().collect(),
        )?;

        let example = Example::new(image, height, width, boxes, gt_overlaps)?.with_flipped(flipped);
        let example = match bbox_targets {
            Some(targets) => {
                let targets = Array2::from_shape_vec(
                    (targets.len(), 5),
                    targets.into_iter().flatten().collect(),
                )?;
                example.with_bbox_targets(targets)?
            }
            None => example,
        };
        Ok(example)
    }
}

/// The ordered, read-only collection of training examples.
#[derive(Debug, Clone, Default)]
pub struct ExampleStore {
    examples: Vec<Arc<Example>>,
}

impl ExampleStore {
    pub fn new(examples: impl IntoIterator<Item = Example>) -> Self {
        Self {
            examples: examples.into_iter().map(Arc::new).collect(),
        }
    }

    /// Loads a roidb JSON file, which is an array of [ExampleRecord]s.
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read roidb file '{}'", path.display()))?;
        let records: Vec<ExampleRecord> = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse roidb file '{}'", path.display()))?;
        let examples: Vec<_> = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                Example::try_from(record).with_context(|| format!("invalid example at {}", index))
            })
            .try_collect()?;
        info!(
            "loaded {} examples from '{}'",
            examples.len(),
            path.display()
        );
        Ok(Self::new(examples))
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[Arc<Example>] {
        &self.examples
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Example>> {
        self.examples.get(index)
    }

    /// Collects the examples at given indices in order.
    pub fn gather(&self, indices: &[usize]) -> Result<Vec<Arc<Example>>> {
        indices
            .iter()
            .map(|&index| {
                self.examples.get(index).cloned().ok_or_else(|| {
                    format_err!(
                        "example index {} out of range of {} examples",
                        index,
                        self.len()
                    )
                })
            })
            .try_collect()
    }

    /// Computes the eligibility of every example.
    pub fn eligible_mask(&self, thresholds: &OverlapThresholds) -> Vec<bool> {
        self.examples
            .iter()
            .map(|example| example.is_eligible(thresholds))
            .collect()
    }
}

impl FromIterator<Example> for ExampleStore {
    fn from_iter<T: IntoIterator<Item = Example>>(iter: T) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn thresholds() -> OverlapThresholds {
        OverlapThresholds {
            fg: 0.5,
            bg_lo: 0.1,
            bg_hi: 0.5,
        }
    }

    #[test]
    fn max_overlaps_test() -> Result<()> {
        let example = Example::new(
            "a.jpg",
            10,
            20,
            array![[0.0, 0.0, 5.0, 5.0], [1.0, 1.0, 9.0, 9.0]],
            array![[0.0, 0.2, 0.7], [0.3, 0.0, 0.1]],
        )?;

        assert_eq!(example.max_overlaps(), &array![0.7, 0.3]);
        assert_eq!(example.max_classes(), &array![2, 0]);
        assert!(example.is_eligible(&thresholds()));
        Ok(())
    }

    #[test]
    fn eligibility_test() -> Result<()> {
        let fg_only = Example::new(
            "fg.jpg",
            10,
            10,
            array![[0.0, 0.0, 5.0, 5.0]],
            array![[0.0, 0.9]],
        )?;
        let bg_only = Example::new(
            "bg.jpg",
            10,
            10,
            array![[0.0, 0.0, 5.0, 5.0], [0.0, 0.0, 2.0, 2.0]],
            array![[0.0, 0.2], [0.0, 0.05]],
        )?;
        let empty = Example::new("empty.jpg", 10, 10, Array2::zeros((0, 4)), Array2::zeros((0, 3)))?;

        assert!(!fg_only.is_eligible(&thresholds()));
        assert!(!bg_only.is_eligible(&thresholds()));
        assert!(!empty.is_eligible(&thresholds()));
        Ok(())
    }

    #[test]
    fn invalid_example_test() {
        assert!(Example::new(
            "a.jpg",
            10,
            10,
            array![[0.0, 0.0, 5.0, 5.0]],
            array![[0.0, 1.5]],
        )
        .is_err());
        assert!(Example::new(
            "a.jpg",
            10,
            10,
            array![[0.0, 0.0, 5.0, 5.0]],
            array![[0.0, 0.5], [0.3, 0.0]],
        )
        .is_err());
        assert!(Example::new("a.jpg", 0, 10, Array2::zeros((0, 4)), Array2::zeros((0, 2))).is_err());
    }

    #[test]
    fn example_record_test() -> Result<()> {
        let text = r#"[
            {
                "image": "images/000001.jpg",
                "height": 300,
                "width": 400,
                "boxes": [[10, 10, 100, 100], [50, 50, 200, 150]],
                "gt_overlaps": [[0.0, 1.0], [0.3, 0.0]],
                "bbox_targets": [[1, 0.0, 0.0, 0.0, 0.0], [0, 0.0, 0.0, 0.0, 0.0]]
            },
            {
                "image": "images/000002.jpg",
                "height": 300,
                "width": 400,
                "flipped": true,
                "boxes": [[10, 10, 100, 100]],
                "gt_overlaps": [[0.0, 0.2, 0.1]]
            }
        ]"#;
        let records: Vec<ExampleRecord> = serde_json::from_str(text)?;
        let store: ExampleStore = records
            .into_iter()
            .map(Example::try_from)
            .collect::<Result<_>>()?;

        assert_eq!(store.len(), 2);
        let first = store.get(0).unwrap();
        assert_eq!(first.num_regions(), 2);
        assert_eq!(first.num_classes(), 2);
        assert!(first.bbox_targets().is_some());
        assert!(*store.get(1).unwrap().flipped());
        assert_eq!(store.eligible_mask(&thresholds()), vec![true, false]);
        Ok(())
    }

    #[test]
    fn ragged_record_test() {
        let record = ExampleRecord {
            image: "a.jpg".into(),
            height: 10,
            width: 10,
            flipped: false,
            boxes: vec![[0.0, 0.0, 5.0, 5.0], [0.0, 0.0, 3.0, 3.0]],
            gt_overlaps: vec![vec![0.0, 0.8], vec![0.3]],
            bbox_targets: None,
        };
        assert!(Example::try_from(record).is_err());
    }

    #[test]
    fn gather_test() -> Result<()> {
        let example = Example::new(
            "a.jpg",
            10,
            10,
            array![[0.0, 0.0, 5.0, 5.0]],
            array![[0.0, 0.9]],
        )?;
        let store: ExampleStore = iter::repeat(example).take(3).collect();

        assert_eq!(store.gather(&[2, 0])?.len(), 2);
        assert!(store.gather(&[3]).is_err());
        Ok(())
    }
}
