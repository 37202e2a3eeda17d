//! Image grid export.
//!
//! Renders are saved for inspection as a single PNG with several panels side
//! by side: colour, normals, opacity. Each panel is an [`ImageData`] in HWC
//! layout with float values, mapped to bytes through its data range.

use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};

use crate::error::{DreamIoError, Result};

/// Float image in HWC layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Image height in pixels.
    pub height: usize,
    /// Image width in pixels.
    pub width: usize,
    /// Channels per pixel (1 or 3).
    pub channels: usize,
    /// Row-major pixel values, `height * width * channels` of them.
    pub data: Vec<f32>,
}

impl ImageData {
    /// Wrap HWC data, checking the length.
    pub fn new(height: usize, width: usize, channels: usize, data: Vec<f32>) -> Result<Self> {
        if channels != 1 && channels != 3 {
            return Err(DreamIoError::UnsupportedChannels { channels });
        }
        let expected = height * width * channels;
        if data.len() != expected {
            return Err(DreamIoError::ShapeMismatch {
                name: "image".to_string(),
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            height,
            width,
            channels,
            data,
        })
    }

    #[inline]
    fn pixel(&self, x: usize, y: usize) -> &[f32] {
        let start = (y * self.width + x) * self.channels;
        &self.data[start..start + self.channels]
    }
}

/// Colormaps for grayscale panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colormap {
    /// Blue to red through cyan, green and yellow.
    Jet,
}

impl Colormap {
    fn apply(self, t: f32) -> [f32; 3] {
        match self {
            Colormap::Jet => {
                let channel = |offset: f32| (1.5 - (4.0 * t - offset).abs()).clamp(0.0, 1.0);
                [channel(3.0), channel(2.0), channel(1.0)]
            }
        }
    }
}

/// One panel of an image grid.
#[derive(Debug, Clone, PartialEq)]
pub enum GridItem {
    /// Colour image with three channels.
    Rgb {
        /// Pixel data.
        image: ImageData,
        /// Values mapped to 0 and 255.
        data_range: (f32, f32),
    },
    /// Single-channel image, shown as gray or through a colormap.
    Grayscale {
        /// Pixel data.
        image: ImageData,
        /// Values mapped to the ends of the gray ramp or colormap.
        data_range: (f32, f32),
        /// Optional colormap; `None` keeps plain gray.
        colormap: Option<Colormap>,
    },
}

impl GridItem {
    /// Colour panel with the default `(0, 1)` range.
    pub fn rgb(image: ImageData) -> Self {
        GridItem::Rgb {
            image,
            data_range: (0.0, 1.0),
        }
    }

    /// Plain gray panel with the default `(0, 1)` range.
    pub fn grayscale(image: ImageData) -> Self {
        GridItem::Grayscale {
            image,
            data_range: (0.0, 1.0),
            colormap: None,
        }
    }

    fn image(&self) -> &ImageData {
        match self {
            GridItem::Rgb { image, .. } | GridItem::Grayscale { image, .. } => image,
        }
    }

    fn to_rgb8(&self) -> Result<RgbImage> {
        let image = self.image();
        let normalize = |v: f32, (lo, hi): (f32, f32)| {
            let span = if hi > lo { hi - lo } else { 1.0 };
            ((v - lo) / span).clamp(0.0, 1.0)
        };
        let to_byte = |v: f32| (v * 255.0).round() as u8;

        let mut out = RgbImage::new(image.width as u32, image.height as u32);
        match self {
            GridItem::Rgb { data_range, .. } => {
                if image.channels != 3 {
                    return Err(DreamIoError::UnsupportedChannels {
                        channels: image.channels,
                    });
                }
                for (x, y, px) in out.enumerate_pixels_mut() {
                    let src = image.pixel(x as usize, y as usize);
                    *px = Rgb([
                        to_byte(normalize(src[0], *data_range)),
                        to_byte(normalize(src[1], *data_range)),
                        to_byte(normalize(src[2], *data_range)),
                    ]);
                }
            }
            GridItem::Grayscale {
                data_range,
                colormap,
                ..
            } => {
                if image.channels != 1 {
                    return Err(DreamIoError::UnsupportedChannels {
                        channels: image.channels,
                    });
                }
                for (x, y, px) in out.enumerate_pixels_mut() {
                    let t = normalize(image.pixel(x as usize, y as usize)[0], *data_range);
                    let [r, g, b] = match colormap {
                        Some(cmap) => cmap.apply(t),
                        None => [t, t, t],
                    };
                    *px = Rgb([to_byte(r), to_byte(g), to_byte(b)]);
                }
            }
        }
        Ok(out)
    }
}

/// Concatenate panels horizontally into one RGB image.
pub fn compose_image_grid(items: &[GridItem]) -> Result<RgbImage> {
    let first = items.first().ok_or(DreamIoError::Empty { what: "image grid" })?;
    let height = first.image().height;

    let mut panels = Vec::with_capacity(items.len());
    for item in items {
        if item.image().height != height {
            return Err(DreamIoError::HeightMismatch {
                expected: height,
                got: item.image().height,
            });
        }
        panels.push(item.to_rgb8()?);
    }

    let width: u32 = panels.iter().map(|p| p.width()).sum();
    let mut grid = RgbImage::new(width, height as u32);
    let mut offset = 0u32;
    for panel in panels {
        for (x, y, px) in panel.enumerate_pixels() {
            grid.put_pixel(offset + x, y, *px);
        }
        offset += panel.width();
    }
    Ok(grid)
}

/// Save panels side by side as a PNG, creating parent directories as needed.
pub fn save_image_grid<P: AsRef<Path>>(path: P, items: &[GridItem]) -> Result<()> {
    let path = path.as_ref();
    let grid = compose_image_grid(items)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    grid.save_with_format(path, ImageFormat::Png)?;
    log::debug!("Saved {}x{} image grid to {}", grid.width(), grid.height(), path.display());
    Ok(())
}
