//! Steerable value algebra (C4): 9-basis spherical-harmonic moments and the
//! clamped-cosine coefficient generator.
//!
//! Grounded in `examples/original_source/src/em_steerable_sampler.hxx`
//! (`SteerableBasisValue::GenerateSphHarm`, `SteerableCoefficients::GenerateForClampedCos`),
//! following Ramamoorthi & Hanrahan 2001 for the SH basis and Subr & Arvo 2007
//! for the steerable clamped-cosine reconstruction.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

pub const BASIS_SIZE: usize = 9;

/// A length-9 tuple in the steerable basis. Used both as `Y(ω)·L(ω)` weight
/// accumulators and as `C(n)` reconstruction coefficients; the distinction is
/// purely which constructor produced the values, so both share one type.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SteerableValue {
    pub coeffs: [f32; BASIS_SIZE],
}

impl SteerableValue {
    pub const ZERO: SteerableValue = SteerableValue { coeffs: [0.0; BASIS_SIZE] };

    pub fn splat(v: f32) -> Self {
        Self { coeffs: [v; BASIS_SIZE] }
    }

    /// `Y(dir) * mul_factor`: the first nine real spherical harmonics, up to
    /// ℓ=2, evaluated at a unit direction.
    pub fn spherical_harmonics(dir: Vec3, mul_factor: f32) -> Self {
        debug_assert!((dir.length() - 1.0).abs() < 1e-3);

        let (x, y, z) = (dir.x, dir.y, dir.z);
        Self {
            coeffs: [
                mul_factor * 0.282095,
                mul_factor * 0.488603 * y,
                mul_factor * 0.488603 * z,
                mul_factor * 0.488603 * x,
                mul_factor * 1.092548 * x * y,
                mul_factor * 1.092548 * y * z,
                mul_factor * 0.315392 * (3.0 * z * z - 1.0),
                mul_factor * 1.092548 * x * z,
                mul_factor * 0.546274 * (x * x - y * y),
            ],
        }
    }

    /// `C(n)`: clamped-cosine reconstruction coefficients for a normal, with
    /// the +0.15 positivity compensation folded into the DC term.
    pub fn clamped_cosine(normal: Vec3, compensate_negativity: bool) -> Self {
        debug_assert!((normal.length() - 1.0).abs() < 1e-3);

        const C1: f32 = 0.429043;
        const C2: f32 = 0.511644;
        const C3: f32 = 0.743125;
        const C4: f32 = 0.886227;
        const C5: f32 = 0.247708;

        let (x, y, z) = (normal.x, normal.y, normal.z);
        Self {
            coeffs: [
                C4 + if compensate_negativity { 0.15 } else { 0.0 },
                2.0 * C2 * y,
                2.0 * C2 * z,
                2.0 * C2 * x,
                2.0 * C1 * x * y,
                2.0 * C1 * y * z,
                C3 * z * z - C5,
                2.0 * C1 * x * z,
                C1 * (x * x - y * y),
            ],
        }
    }

    pub fn dot(&self, rhs: &SteerableValue) -> f32 {
        self.coeffs.iter().zip(rhs.coeffs.iter()).map(|(a, b)| a * b).sum()
    }

    pub fn is_finite(&self) -> bool {
        self.coeffs.iter().all(|c| c.is_finite())
    }

    pub fn equals_delta(&self, rhs: &SteerableValue, delta: f32) -> bool {
        self.coeffs.iter().zip(rhs.coeffs.iter()).all(|(a, b)| (a - b).abs() <= delta)
    }
}

impl std::ops::Add for SteerableValue {
    type Output = SteerableValue;
    fn add(self, rhs: SteerableValue) -> SteerableValue {
        let mut coeffs = [0.0; BASIS_SIZE];
        for i in 0..BASIS_SIZE {
            coeffs[i] = self.coeffs[i] + rhs.coeffs[i];
        }
        SteerableValue { coeffs }
    }
}

impl std::ops::AddAssign for SteerableValue {
    fn add_assign(&mut self, rhs: SteerableValue) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for SteerableValue {
    type Output = SteerableValue;
    fn sub(self, rhs: SteerableValue) -> SteerableValue {
        let mut coeffs = [0.0; BASIS_SIZE];
        for i in 0..BASIS_SIZE {
            coeffs[i] = self.coeffs[i] - rhs.coeffs[i];
        }
        SteerableValue { coeffs }
    }
}

impl std::ops::Mul<f32> for SteerableValue {
    type Output = SteerableValue;
    fn mul(self, rhs: f32) -> SteerableValue {
        let mut coeffs = [0.0; BASIS_SIZE];
        for i in 0..BASIS_SIZE {
            coeffs[i] = self.coeffs[i] * rhs;
        }
        SteerableValue { coeffs }
    }
}

impl std::ops::Div<f32> for SteerableValue {
    type Output = SteerableValue;
    fn div(self, rhs: f32) -> SteerableValue {
        self * (1.0 / rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sh_matches_reference_on_positive_z() {
        let v = SteerableValue::spherical_harmonics(Vec3::Z, 1.0);
        let expected = [1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        let normalization =
            [0.282095, 0.488603, 0.488603, 0.488603, 1.092548 * 0.5, 1.092548 * 0.5, 0.315392 * 2.0, 1.092548 * 0.5, 0.546274];
        for i in 0..9 {
            assert!((v.coeffs[i] - expected[i] * normalization[i]).abs() < 1e-4, "component {}", i);
        }
    }

    #[test]
    fn sh_matches_reference_on_positive_x() {
        let v = SteerableValue::spherical_harmonics(Vec3::X, 1.0);
        let expected = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0, -0.5, 0.0, 1.0];
        let normalization =
            [0.282095, 0.488603, 0.488603, 0.488603, 1.092548 * 0.5, 1.092548 * 0.5, 0.315392 * 2.0, 1.092548 * 0.5, 0.546274];
        for i in 0..9 {
            assert!((v.coeffs[i] - expected[i] * normalization[i]).abs() < 1e-4, "component {}", i);
        }
    }

    #[test]
    fn reconstruction_within_tolerance_uncompensated() {
        let mut rng = rand::thread_rng();
        use rand::Rng;
        for _ in 0..2000 {
            let normal = random_unit(&mut rng);
            let omega = random_unit(&mut rng);
            let coeffs = SteerableValue::clamped_cosine(normal, false);
            let basis = SteerableValue::spherical_harmonics(omega, 1.0);
            let reconstructed = basis.dot(&coeffs);
            assert!(reconstructed >= -0.04 - 1e-3 && reconstructed <= 1.07 + 1e-3, "{}", reconstructed);
            if normal.dot(omega).max(0.0) == 0.0 {
                assert!(reconstructed <= 0.095 + 1e-3, "{}", reconstructed);
            }
        }
    }

    #[test]
    fn reconstruction_within_tolerance_compensated() {
        let mut rng = rand::thread_rng();
        use rand::Rng;
        for _ in 0..2000 {
            let normal = random_unit(&mut rng);
            let omega = random_unit(&mut rng);
            let coeffs = SteerableValue::clamped_cosine(normal, true);
            let basis = SteerableValue::spherical_harmonics(omega, 1.0);
            let reconstructed = basis.dot(&coeffs);
            assert!(reconstructed >= 0.0 - 1e-3 && reconstructed <= 1.105 + 1e-3, "{}", reconstructed);
            if normal.dot(omega).max(0.0) == 0.0 {
                assert!(reconstructed <= 0.138 + 1e-3, "{}", reconstructed);
            }
        }
    }

    fn random_unit(rng: &mut impl rand::Rng) -> Vec3 {
        loop {
            let v = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            let len = v.length();
            if len > 1e-6 && len <= 1.0 {
                return v / len;
            }
        }
    }
}
