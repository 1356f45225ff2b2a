//! Environment image (C3): a lat-long pixel grid with nearest or bilinear
//! lookup, loaded from an HDR/EXR scanline image via the `image` crate.
//!
//! Grounded in `examples/original_source/src/em_image.hxx` (`EnvironmentMapImage`)
//! for the wrap/filtering rules, and in the teacher's use of the `image` crate
//! for asset loading.

use std::path::Path;

use glam::Vec3;
use image::GenericImageView;
use log::{debug, info};

use crate::error::{Error, Result};
use crate::sphere::direction_to_uv;
use crate::spectrum::Spectrum;

pub struct EnvImage {
    width: u32,
    height: u32,
    pixels: Vec<Spectrum>,
    bilinear: bool,
}

impl EnvImage {
    /// Loads a floating-point HDR image, horizontally rotates it by
    /// `rotate_u ∈ [0,1)` and scales every texel by `scale` in linear light.
    pub fn load(path: impl AsRef<Path>, rotate_u: f32, scale: f32, bilinear: bool) -> Result<Self> {
        let path = path.as_ref();
        info!("loading environment map {}", path.display());

        let decoded = image::open(path).map_err(|source| Error::ImageDecode {
            path: path.display().to_string(),
            source,
        })?;

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::BuildFailed { reason: "environment image has a zero dimension" });
        }

        let rgb = decoded.to_rgb32f();
        let shift = ((rotate_u.rem_euclid(1.0)) * width as f32).round() as u32 % width.max(1);

        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let src_x = (x + shift) % width;
                let texel = rgb.get_pixel(src_x, y);
                pixels.push(Spectrum::new(texel[0] * scale, texel[1] * scale, texel[2] * scale));
            }
        }

        debug!("environment map {}x{}, bilinear={}", width, height, bilinear);

        Ok(Self { width, height, pixels, bilinear })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: i64, y: i64) -> Spectrum {
        let w = self.width as i64;
        let h = self.height as i64;
        let (mut x, mut y) = (x, y);
        if y < 0 {
            y = -y - 1;
            x += w / 2;
        } else if y >= h {
            y = 2 * h - y - 1;
            x += w / 2;
        }
        let x = x.rem_euclid(w) as usize;
        let y = y.clamp(0, h - 1) as usize;
        self.pixels[y * self.width as usize + x]
    }

    /// `(u,v) -> spectrum`, nearest-neighbour or bilinear depending on how
    /// the image was loaded.
    pub fn eval(&self, u: f32, v: f32) -> Spectrum {
        let u = u.rem_euclid(1.0);
        let v = v.clamp(0.0, 1.0);

        let fx = u * self.width as f32 - 0.5;
        let fy = v * self.height as f32 - 0.5;

        if !self.bilinear {
            let x = fx.round() as i64;
            let y = fy.round() as i64;
            return self.pixel(x, y);
        }

        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let x0 = x0 as i64;
        let y0 = y0 as i64;

        let p00 = self.pixel(x0, y0);
        let p10 = self.pixel(x0 + 1, y0);
        let p01 = self.pixel(x0, y0 + 1);
        let p11 = self.pixel(x0 + 1, y0 + 1);

        let top = p00.scale(1.0 - tx) + p10.scale(tx);
        let bottom = p01.scale(1.0 - tx) + p11.scale(tx);
        top.scale(1.0 - ty) + bottom.scale(ty)
    }

    /// `eval(uv)` composed with the lat-long map.
    pub fn eval_dir(&self, dir: Vec3) -> Spectrum {
        let (u, v) = direction_to_uv(dir);
        self.eval(u, v)
    }
}

/// Synthetic-image construction for tests and benchmarks, where loading a
/// real asset off disk isn't the point.
pub mod test_support {
    use super::{EnvImage, Spectrum};

    pub fn uniform(width: u32, height: u32, color: Spectrum) -> EnvImage {
        EnvImage {
            width,
            height,
            pixels: vec![color; (width * height) as usize],
            bilinear: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_support::uniform;

    #[test]
    fn uniform_image_evaluates_to_its_color_everywhere() {
        let img = uniform(8, 4, Spectrum::new(1.0, 2.0, 3.0));
        for i in 0..10 {
            let u = i as f32 / 10.0;
            let v = 0.3;
            let c = img.eval(u, v);
            assert!((c.x - 1.0).abs() < 1e-4);
            assert!((c.y - 2.0).abs() < 1e-4);
            assert!((c.z - 3.0).abs() < 1e-4);
        }
    }

    #[test]
    fn horizontal_wrap_does_not_panic_at_edges() {
        let img = uniform(8, 4, Spectrum::splat(1.0));
        let _ = img.eval(-0.1, 0.5);
        let _ = img.eval(1.1, 0.5);
    }

    #[test]
    fn pole_wrap_reflects_to_antipodal_column() {
        let img = uniform(8, 4, Spectrum::splat(1.0));
        let above_pole = img.pixel(2, -1);
        let below_pole = img.pixel(2, 4);
        assert_eq!(above_pole, Spectrum::splat(1.0));
        assert_eq!(below_pole, Spectrum::splat(1.0));
    }
}
