//! Spectrum (C1): a triple of non-negative floats in linear sRGB.
//!
//! Grounded in `examples/original_source/src/spectrum.hxx`
//! (`SRGBSpectrumX<T>`), simplified to the float-only working representation
//! this crate needs.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Spectrum {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Spectrum {
    pub const ZERO: Spectrum = Spectrum { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    pub fn as_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn from_vec3(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }

    /// `0.2127*x + 0.7152*y + 0.0722*z`, per spec.md section 3.
    pub fn luminance(self) -> f32 {
        0.2127 * self.x + 0.7152 * self.y + 0.0722 * self.z
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn max_component(self) -> f32 {
        self.x.max(self.y).max(self.z)
    }
}

impl std::ops::Add for Spectrum {
    type Output = Spectrum;
    fn add(self, rhs: Spectrum) -> Spectrum {
        Spectrum::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::AddAssign for Spectrum {
    fn add_assign(&mut self, rhs: Spectrum) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Spectrum {
    type Output = Spectrum;
    fn sub(self, rhs: Spectrum) -> Spectrum {
        Spectrum::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul for Spectrum {
    type Output = Spectrum;
    fn mul(self, rhs: Spectrum) -> Spectrum {
        Spectrum::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }
}

impl std::ops::Mul<f32> for Spectrum {
    type Output = Spectrum;
    fn mul(self, rhs: f32) -> Spectrum {
        self.scale(rhs)
    }
}

impl std::ops::Div<f32> for Spectrum {
    type Output = Spectrum;
    fn div(self, rhs: f32) -> Spectrum {
        self.scale(1.0 / rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luminance_of_white_is_one() {
        let white = Spectrum::splat(1.0);
        assert!((white.luminance() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_predicate() {
        assert!(Spectrum::ZERO.is_zero());
        assert!(!Spectrum::splat(0.001).is_zero());
    }
}
