//! Copying minibatch blobs into network input slots.

use crate::{
    blob::{self, BlobSet},
    common::*,
};

/// The spatial size of the placeholder image shapes given at setup.
const PLACEHOLDER_SIZE: usize = 100;
/// The channels of the placeholder image shapes given at setup.
const PLACEHOLDER_CHANNELS: usize = 3;

/// A network input with a mutable shape.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSlot {
    data: ArrayD<f32>,
}

impl InputSlot {
    pub fn new(shape: &[usize]) -> Self {
        Self {
            data: ArrayD::zeros(IxDyn(shape)),
        }
    }

    /// Changes the shape of the slot. The values are reset when the shape
    /// differs.
    pub fn reshape(&mut self, shape: &[usize]) {
        if self.data.shape() != shape {
            self.data = ArrayD::zeros(IxDyn(shape));
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ArrayD<f32> {
        &mut self.data
    }
}

impl Default for InputSlot {
    fn default() -> Self {
        Self::new(&[0])
    }
}

/// The indexed inputs of a network.
pub trait NetworkInputs {
    fn num_inputs(&self) -> usize;

    fn input_mut(&mut self, index: usize) -> Option<&mut InputSlot>;
}

impl NetworkInputs for Vec<InputSlot> {
    fn num_inputs(&self) -> usize {
        self.len()
    }

    fn input_mut(&mut self, index: usize) -> Option<&mut InputSlot> {
        self.get_mut(index)
    }
}

/// The fixed mapping from blob names to input slots.
///
/// The position of a name is its slot index. Slot 0 is `data`, slots
/// `1..num_data` are the auxiliary `data_i` streams, followed by `rois`,
/// `labels`, and the two bounding box regression slots when enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotTable {
    slots: IndexMap<String, Vec<usize>>,
}

impl SlotTable {
    pub fn new(num_data: usize, num_classes: usize, bbox_reg: bool) -> Result<Self> {
        ensure!(num_data >= 1, "num_data must be at least 1, but get {}", num_data);
        ensure!(
            num_classes >= 1,
            "num_classes must be at least 1, but get {}",
            num_classes
        );

        let image_shape =
            |channels| vec![1, channels, PLACEHOLDER_SIZE, PLACEHOLDER_SIZE];

        let data_slots = (0..num_data).map(|stream| {
            (
                blob::data_blob_name(stream),
                image_shape(PLACEHOLDER_CHANNELS),
            )
        });
        let roi_slots = [
            // (n, x1, y1, x2, y2) per RoI
            (blob::ROIS.to_string(), vec![1, 5]),
            (blob::LABELS.to_string(), vec![1]),
        ];
        let bbox_slots = bbox_reg
            .then(|| {
                [
                    (blob::BBOX_TARGETS.to_string(), vec![1, num_classes * 4]),
                    (blob::BBOX_LOSS_WEIGHTS.to_string(), vec![1, num_classes * 4]),
                ]
            })
            .into_iter()
            .flatten();

        let mut slots = IndexMap::new();
        for (name, shape) in data_slots.chain(roi_slots).chain(bbox_slots) {
            let prev = slots.insert(name.clone(), shape);
            ensure!(prev.is_none(), "duplicated input slot '{}'", name);
        }

        let expect = num_data + 2 + if bbox_reg { 2 } else { 0 };
        ensure!(
            slots.len() == expect,
            "expect {} input slots, but get {}",
            expect,
            slots.len()
        );

        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The slot index of a blob.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.slots.get_index_of(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(|name| name.as_str())
    }

    /// The shapes given to the slots before the first minibatch arrives.
    pub fn placeholder_shapes(&self) -> impl Iterator<Item = &[usize]> {
        self.slots.values().map(|shape| shape.as_slice())
    }
}

/// Copies minibatch blobs into their input slots.
#[derive(Debug, Clone)]
pub struct BatchPublisher {
    table: SlotTable,
}

impl BatchPublisher {
    pub fn new(table: SlotTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &SlotTable {
        &self.table
    }

    /// Gives every slot its placeholder shape.
    pub fn init_inputs<N>(&self, inputs: &mut N) -> Result<()>
    where
        N: NetworkInputs + ?Sized,
    {
        ensure!(
            inputs.num_inputs() == self.table.len(),
            "the network has {} inputs, but the data layer produces {}",
            inputs.num_inputs(),
            self.table.len()
        );
        for (index, shape) in self.table.placeholder_shapes().enumerate() {
            let slot = inputs
                .input_mut(index)
                .ok_or_else(|| format_err!("missing network input {}", index))?;
            slot.reshape(shape);
        }
        Ok(())
    }

    /// Resizes each destination slot to the blob shape, then copies the blob
    /// in single precision.
    ///
    /// Every slot of the table must be covered by the blob set.
    pub fn publish<N>(&self, blobs: &BlobSet, inputs: &mut N) -> Result<()>
    where
        N: NetworkInputs + ?Sized,
    {
        let mut filled = vec![false; self.table.len()];

        for (name, blob) in blobs {
            let index = self
                .table
                .slot_of(name)
                .ok_or_else(|| format_err!("blob '{}' has no input slot", name))?;
            let slot = inputs
                .input_mut(index)
                .ok_or_else(|| format_err!("missing network input {} for blob '{}'", index, name))?;

            slot.reshape(blob.shape());
            blob.copy_to(slot.data_mut())
                .with_context(|| format!("failed to copy blob '{}'", name))?;
            filled[index] = true;
        }

        let missing = self
            .table
            .names()
            .zip(&filled)
            .filter(|&(_, &filled)| !filled)
            .map(|(name, _)| name)
            .collect_vec();
        ensure!(
            missing.is_empty(),
            "the minibatch is missing blobs {:?}",
            missing
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::Blob;
    use ndarray::{array, Array};

    fn blob_set(num_rois: usize, bbox_reg: bool) -> BlobSet {
        let mut blobs = BlobSet::new();
        blobs.insert("data".into(), Array4::<f32>::ones((2, 3, 30, 40)).into());
        blobs.insert(
            "rois".into(),
            Array::from_shape_fn((num_rois, 5), |(row, col)| (row * 5 + col) as f32).into(),
        );
        blobs.insert("labels".into(), Array1::<i64>::ones(num_rois).into());
        if bbox_reg {
            blobs.insert("bbox_targets".into(), Array2::<f32>::zeros((num_rois, 8)).into());
            blobs.insert("bbox_loss_weights".into(), Array2::<f32>::zeros((num_rois, 8)).into());
        }
        blobs
    }

    #[test]
    fn slot_table_test() -> Result<()> {
        let table = SlotTable::new(3, 21, true)?;
        assert_eq!(
            table.names().collect_vec(),
            vec!["data", "data_1", "data_2", "rois", "labels", "bbox_targets", "bbox_loss_weights"]
        );
        assert_eq!(table.slot_of("rois"), Some(3));
        assert_eq!(table.slot_of("labels"), Some(4));
        assert_eq!(table.slot_of("bbox_loss_weights"), Some(6));
        assert_eq!(table.placeholder_shapes().nth(5), Some(&[1, 84][..]));

        let table = SlotTable::new(1, 21, false)?;
        assert_eq!(table.len(), 3);
        assert_eq!(table.slot_of("bbox_targets"), None);

        assert!(SlotTable::new(0, 21, false).is_err());
        assert!(SlotTable::new(1, 0, false).is_err());
        Ok(())
    }

    #[test]
    fn publish_shapes_test() -> Result<()> {
        let publisher = BatchPublisher::new(SlotTable::new(1, 2, true)?);
        let mut inputs = vec![InputSlot::default(); publisher.table().len()];
        publisher.init_inputs(&mut inputs)?;
        assert_eq!(inputs[0].shape(), &[1, 3, 100, 100]);
        assert_eq!(inputs[1].shape(), &[1, 5]);

        for num_rois in [7, 3, 12] {
            publisher.publish(&blob_set(num_rois, true), &mut inputs)?;
            assert_eq!(inputs[0].shape(), &[2, 3, 30, 40]);
            assert_eq!(inputs[1].shape(), &[num_rois, 5]);
            assert_eq!(inputs[2].shape(), &[num_rois]);
            assert_eq!(inputs[3].shape(), &[num_rois, 8]);
            assert_eq!(inputs[1].data()[[num_rois - 1, 4]], (num_rois * 5 - 1) as f32);
            assert!(inputs[2].data().iter().all(|&label| label == 1.0));
        }
        Ok(())
    }

    #[test]
    fn publish_errors_test() -> Result<()> {
        let publisher = BatchPublisher::new(SlotTable::new(1, 2, false)?);
        let mut inputs = vec![InputSlot::default(); 3];

        let mut unknown = blob_set(4, false);
        unknown.insert("extra".into(), Blob::from(array![1.0f32]));
        assert!(publisher.publish(&unknown, &mut inputs).is_err());

        let mut missing = blob_set(4, false);
        missing.remove("labels");
        assert!(publisher.publish(&missing, &mut inputs).is_err());

        let mut too_few = vec![InputSlot::default(); 2];
        assert!(publisher.init_inputs(&mut too_few).is_err());
        Ok(())
    }
}
