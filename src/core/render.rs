//! Drawing surfaces and page rendering.
//!
//! A [`Surface`] is an RGBA8 pixel buffer the engine draws into. Themes are
//! applied afterwards as color matrices over the produced pixels:
//!
//! - dark: `invert(1) hue-rotate(180deg)`
//! - sepia: `sepia(0.5) brightness(0.95)`

use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, RgbaImage};

use crate::adapters::{EngineError, PageHandle};
use crate::domain::ThemeMode;

/// RGBA8 pixel buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Surface {
    /// Empty 0x0 surface
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major RGBA bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Resize and clear to opaque white
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(width as usize * height as usize * 4, 255);
    }

    /// Replace the contents with an RGBA buffer of the given size
    pub fn put_rgba(&mut self, width: u32, height: u32, pixels: Vec<u8>) -> Result<(), EngineError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(EngineError::Render(format!(
                "bitmap is {} bytes, expected {} for {}x{}",
                pixels.len(),
                expected,
                width,
                height
            )));
        }
        self.width = width;
        self.height = height;
        self.pixels = pixels;
        Ok(())
    }

    /// RGBA value at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels
            .get(idx..idx + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Apply a theme's color treatment in place
    pub fn apply_theme(&mut self, theme: ThemeMode) {
        let steps = match theme {
            ThemeMode::Light => return,
            ThemeMode::Dark => vec![ColorStep::Invert, ColorStep::Matrix(hue_rotate(180.0))],
            ThemeMode::Sepia => vec![
                ColorStep::Matrix(sepia(0.5)),
                ColorStep::Matrix(brightness(0.95)),
            ],
        };

        for px in self.pixels.chunks_exact_mut(4) {
            let mut rgb = [
                f32::from(px[0]) / 255.0,
                f32::from(px[1]) / 255.0,
                f32::from(px[2]) / 255.0,
            ];
            for step in &steps {
                rgb = step.apply(rgb);
            }
            for (dst, v) in px.iter_mut().zip(rgb) {
                *dst = (v * 255.0).round() as u8;
            }
        }
    }

    /// Encode as PNG
    pub fn to_png(&self) -> Result<Vec<u8>> {
        if self.is_empty() {
            anyhow::bail!("Cannot encode an empty surface");
        }

        let image = RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .context("Surface size does not match its pixel buffer")?;

        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .context("Failed to encode PNG")?;
        Ok(buf)
    }

    /// Encode as an embeddable `data:image/png;base64,...` URL
    pub fn to_data_url(&self) -> Result<String> {
        Ok(format!("data:image/png;base64,{}", STANDARD.encode(self.to_png()?)))
    }

    /// Write a PNG file
    pub fn save_png(&self, path: &Path) -> Result<()> {
        let png = self.to_png()?;
        std::fs::write(path, png)
            .with_context(|| format!("Failed to write image: {}", path.display()))
    }
}

/// Render `page` at `scale` into `surface`, then apply `theme`
pub async fn render_page(
    page: &PageHandle,
    surface: &mut Surface,
    scale: f32,
    theme: ThemeMode,
) -> Result<(), EngineError> {
    let viewport = page.viewport(scale);
    surface.resize(viewport.width, viewport.height);
    page.render(surface, viewport).await?;
    surface.apply_theme(theme);
    Ok(())
}

type Matrix = [[f32; 3]; 3];

enum ColorStep {
    Invert,
    Matrix(Matrix),
}

impl ColorStep {
    fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        match self {
            ColorStep::Invert => rgb.map(|c| 1.0 - c),
            ColorStep::Matrix(m) => {
                let mut out = [0.0; 3];
                for (row, o) in m.iter().zip(out.iter_mut()) {
                    *o = (row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2]).clamp(0.0, 1.0);
                }
                out
            }
        }
    }
}

// Coefficients from the CSS Filter Effects definitions

fn hue_rotate(degrees: f32) -> Matrix {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

fn sepia(amount: f32) -> Matrix {
    let k = 1.0 - amount.clamp(0.0, 1.0);
    [
        [0.393 + 0.607 * k, 0.769 - 0.769 * k, 0.189 - 0.189 * k],
        [0.349 - 0.349 * k, 0.686 + 0.314 * k, 0.168 - 0.168 * k],
        [0.272 - 0.272 * k, 0.534 - 0.534 * k, 0.131 + 0.869 * k],
    ]
}

fn brightness(amount: f32) -> Matrix {
    [[amount, 0.0, 0.0], [0.0, amount, 0.0], [0.0, 0.0, amount]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(rgb: [u8; 3]) -> Surface {
        let mut surface = Surface::new();
        surface.resize(2, 2);
        for px in surface.pixels_mut().chunks_exact_mut(4) {
            px[..3].copy_from_slice(&rgb);
        }
        surface
    }

    #[test]
    fn test_resize_clears_to_white() {
        let mut surface = Surface::new();
        assert!(surface.is_empty());

        surface.resize(3, 2);
        assert_eq!(surface.pixels().len(), 24);
        assert_eq!(surface.pixel(2, 1), Some([255, 255, 255, 255]));
        assert_eq!(surface.pixel(3, 0), None);
    }

    #[test]
    fn test_put_rgba_checks_size() {
        let mut surface = Surface::new();
        assert!(surface.put_rgba(2, 2, vec![0; 15]).is_err());
        assert!(surface.put_rgba(2, 2, vec![0; 16]).is_ok());
        assert_eq!(surface.width(), 2);
    }

    #[test]
    fn test_light_theme_is_identity() {
        let mut surface = solid([10, 120, 200]);
        let before = surface.clone();
        surface.apply_theme(ThemeMode::Light);
        assert_eq!(surface, before);
    }

    #[test]
    fn test_dark_theme_swaps_paper_and_ink() {
        let mut paper = solid([255, 255, 255]);
        paper.apply_theme(ThemeMode::Dark);
        assert_eq!(paper.pixel(0, 0), Some([0, 0, 0, 255]));

        let mut ink = solid([0, 0, 0]);
        ink.apply_theme(ThemeMode::Dark);
        assert_eq!(ink.pixel(1, 1), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_sepia_theme_warms_white() {
        let mut surface = solid([255, 255, 255]);
        surface.apply_theme(ThemeMode::Sepia);

        let [r, g, b, a] = surface.pixel(0, 0).unwrap();
        assert_eq!(a, 255);
        assert!(r < 255);
        assert_eq!(r, g);
        assert!(b < r);
    }

    #[test]
    fn test_data_url() {
        let surface = solid([1, 2, 3]);
        let url = surface.to_data_url().unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));

        assert!(Surface::new().to_data_url().is_err());
    }
}
