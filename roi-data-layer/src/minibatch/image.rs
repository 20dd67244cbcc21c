use crate::{common::*, example::Example};

/// Provides the pixels of each data stream of an example.
pub trait ImageSource
where
    Self: Debug + Send + Sync,
{
    /// Loads the image of `stream` resized by `scale`, in CHW layout.
    fn load(&self, example: &Example, stream: usize, scale: f64) -> Result<Array3<f32>>;
}

/// The image source producing zero-filled images of the scaled size.
#[derive(Debug, Clone)]
pub struct BlankImageSource {
    channels: Vec<NonZeroUsize>,
}

impl BlankImageSource {
    /// Creates the source with the number of channels of each stream.
    ///
    /// Streams beyond the list use the last channel count.
    pub fn new(channels: Vec<NonZeroUsize>) -> Result<Self> {
        ensure!(!channels.is_empty(), "channels must not be empty");
        Ok(Self { channels })
    }

    pub fn channels(&self, stream: usize) -> usize {
        let channels = self
            .channels
            .get(stream)
            .or_else(|| self.channels.last())
            .map(|channels| channels.get());
        // the list is non-empty on construction
        channels.unwrap_or(1)
    }
}

impl ImageSource for BlankImageSource {
    fn load(&self, example: &Example, stream: usize, scale: f64) -> Result<Array3<f32>> {
        ensure!(scale > 0.0, "image scale must be positive, but get {}", scale);
        let (height, width) = scaled_size(*example.height(), *example.width(), scale);
        Ok(Array3::zeros((self.channels(stream), height, width)))
    }
}

/// Stacks CHW images into one NCHW blob, padding each image with zeros to
/// the largest height and width.
pub fn images_to_blob(images: &[Array3<f32>]) -> Result<Array4<f32>> {
    let first = images
        .first()
        .ok_or_else(|| format_err!("cannot build an image blob from zero images"))?;
    let channels = first.dim().0;
    ensure!(
        images.iter().all(|image| image.dim().0 == channels),
        "images in a blob must have the same number of channels"
    );

    let max_h = images.iter().map(|image| image.dim().1).max().unwrap_or(0);
    let max_w = images.iter().map(|image| image.dim().2).max().unwrap_or(0);

    let mut blob = Array4::zeros((images.len(), channels, max_h, max_w));
    for (index, image) in images.iter().enumerate() {
        let (_, h, w) = image.dim();
        blob.slice_mut(s![index, .., ..h, ..w]).assign(image);
    }
    Ok(blob)
}

pub(crate) fn scaled_size(height: usize, width: usize, scale: f64) -> (usize, usize) {
    let height = ((height as f64 * scale).round() as usize).max(1);
    let width = ((width as f64 * scale).round() as usize).max(1);
    (height, width)
}
