use image::{GrayImage, ImageBuffer, Luma};

type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Exponentially weighted running average of recent frames plus the
/// number of consecutive quiet frames seen against it.
pub struct BackgroundModel {
    average: FloatImage,
    quiet_frames: u32,
}

impl BackgroundModel {
    /// Seed the model from the first frame of a scan
    pub fn seed(frame: &GrayImage) -> Self {
        let (width, height) = frame.dimensions();
        let average = FloatImage::from_fn(width, height, |x, y| {
            Luma([frame.get_pixel(x, y)[0] as f32])
        });

        Self {
            average,
            quiet_frames: 0,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.average.dimensions()
    }

    /// Blend `frame` into the average with weight `alpha`, then return
    /// the absolute difference between `frame` and the updated average.
    pub fn blend_and_diff(&mut self, frame: &GrayImage, alpha: f32) -> GrayImage {
        let (width, height) = self.average.dimensions();
        let mut diff = GrayImage::new(width, height);

        for ((avg, current), out) in self
            .average
            .pixels_mut()
            .zip(frame.pixels())
            .zip(diff.pixels_mut())
        {
            let value = current[0] as f32;
            avg[0] = avg[0] * (1.0 - alpha) + value * alpha;
            out[0] = (value - avg[0]).abs().round().min(255.0) as u8;
        }

        diff
    }

    pub fn quiet_frames(&self) -> u32 {
        self.quiet_frames
    }

    /// Count one more quiet frame and return the running total
    pub fn record_quiet(&mut self) -> u32 {
        self.quiet_frames += 1;
        self.quiet_frames
    }
}
