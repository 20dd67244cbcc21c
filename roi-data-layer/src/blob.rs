//! Named numeric arrays passed to the network.

use crate::common::*;

/// The blob name of the primary image batch.
pub const DATA: &str = "data";
/// The blob name of the RoI list.
pub const ROIS: &str = "rois";
/// The blob name of the RoI labels.
pub const LABELS: &str = "labels";
/// The blob name of the bounding box regression targets.
pub const BBOX_TARGETS: &str = "bbox_targets";
/// The blob name of the bounding box regression weights.
pub const BBOX_LOSS_WEIGHTS: &str = "bbox_loss_weights";

/// The blob name of the image batch of a data stream.
///
/// Stream 0 is the primary `data` blob and stream `i > 0` is `data_i`.
pub fn data_blob_name(stream: usize) -> String {
    match stream {
        0 => DATA.to_string(),
        _ => format!("{}_{}", DATA, stream),
    }
}

/// The blobs produced for one minibatch, in insertion order.
pub type BlobSet = IndexMap<String, Blob>;

/// A shaped numeric array with its element type.
#[derive(Debug, Clone, PartialEq)]
pub enum Blob {
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
    I64(ArrayD<i64>),
}

impl Blob {
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::F32(array) => array.shape(),
            Self::F64(array) => array.shape(),
            Self::I64(array) => array.shape(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::F32(array) => array.len(),
            Self::F64(array) => array.len(),
            Self::I64(array) => array.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Converts the values to single precision.
    pub fn to_f32(&self) -> ArrayD<f32> {
        match self {
            Self::F32(array) => array.clone(),
            Self::F64(array) => array.mapv(|value| value as f32),
            Self::I64(array) => array.mapv(|value| value as f32),
        }
    }

    /// Copies the values into an array of the same shape, converting them
    /// to single precision.
    pub fn copy_to(&self, dst: &mut ArrayD<f32>) -> Result<()> {
        ensure!(
            dst.shape() == self.shape(),
            "cannot copy a blob of shape {:?} to an array of shape {:?}",
            self.shape(),
            dst.shape()
        );
        match self {
            Self::F32(array) => dst.assign(array),
            Self::F64(array) => dst.zip_mut_with(array, |dst, &src| *dst = src as f32),
            Self::I64(array) => dst.zip_mut_with(array, |dst, &src| *dst = src as f32),
        }
        Ok(())
    }
}

impl<D> From<ndarray::Array<f32, D>> for Blob
where
    D: ndarray::Dimension,
{
    fn from(array: ndarray::Array<f32, D>) -> Self {
        Self::F32(array.into_dyn())
    }
}

impl<D> From<ndarray::Array<f64, D>> for Blob
where
    D: ndarray::Dimension,
{
    fn from(array: ndarray::Array<f64, D>) -> Self {
        Self::F64(array.into_dyn())
    }
}

impl<D> From<ndarray::Array<i64, D>> for Blob
where
    D: ndarray::Dimension,
{
    fn from(array: ndarray::Array<i64, D>) -> Self {
        Self::I64(array.into_dyn())
    }
}
