use image::RgbaImage;

/// A width×height grid of interleaved RGBA `f32` pixels in [0, 1].
///
/// Flat row-major storage, top-left origin. This is the working surface for
/// every bake pass: decoders fill it, the highlight and distance passes
/// produce one each, and the compositor folds four of them into the final
/// map.
#[derive(Clone)]
pub struct Canvas {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Canvas {
    /// Create a transparent-black canvas.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height * 4],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Flat interleaved RGBA pixel data, row-major.
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [f32; 4] {
        let i = (y * self.width + x) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    #[inline]
    pub fn put(&mut self, x: usize, y: usize, px: [f32; 4]) {
        let i = (y * self.width + x) * 4;
        self.data[i..i + 4].copy_from_slice(&px);
    }

    /// Import a conventional 8-bit image, normalizing channels to [0, 1].
    /// No Y flip — `image` decodes with the same top-left origin we use.
    pub fn from_rgba_image(img: &RgbaImage) -> Self {
        let width = img.width() as usize;
        let height = img.height() as usize;
        let data = img.as_raw().iter().map(|&b| b as f32 / 255.0).collect();
        Self {
            width,
            height,
            data,
        }
    }

    /// Export to an 8-bit image for PNG encoding. Values are clamped, so a
    /// canvas that was never clamped upstream still round-trips safely.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let raw: Vec<u8> = self
            .data
            .iter()
            .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect();
        RgbaImage::from_raw(self.width as u32, self.height as u32, raw)
            .expect("canvas dimensions match buffer length")
    }
}
