//! BSDF evaluation (external collaborator per spec.md section 1, carried
//! only as the minimal surface the MIS estimator and light picker need to
//! call through).
//!
//! Grounded in `examples/pema99-rust-path-tracer/kernels/src/bsdf.rs`
//! (`BSDF` trait, `Lambertian`, `PBR`), ported from the teacher's GPU kernel
//! types to plain CPU `glam`/`Spectrum` types.

use glam::Vec3;

use crate::rng::RngState;
use crate::spectrum::Spectrum;

const EPS: f32 = 0.001;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Lobe {
    Diffuse,
    Specular,
}

pub struct BsdfSample {
    pub direction: Vec3,
    pub lobe: Lobe,
    pub f: Spectrum,
    pub pdf: f32,
}

pub trait Bsdf {
    fn evaluate(&self, view: Vec3, normal: Vec3, sample_dir: Vec3, lobe: Lobe) -> Spectrum;
    fn sample(&self, view: Vec3, normal: Vec3, rng: &mut RngState) -> BsdfSample;
    fn pdf(&self, view: Vec3, normal: Vec3, sample_dir: Vec3, lobe: Lobe) -> f32;
    fn is_dirac(&self) -> bool {
        false
    }
}

fn create_cartesian(up: Vec3) -> (Vec3, Vec3, Vec3) {
    let arbitrary = Vec3::new(0.1, 0.5, 0.9);
    let tangent = up.cross(arbitrary).normalize();
    let right = tangent.cross(up).normalize();
    let forward = up.cross(right).normalize();
    (up, right, forward)
}

fn cosine_sample_hemisphere(r1: f32, r2: f32) -> Vec3 {
    let theta = r1.sqrt().acos();
    let phi = 2.0 * std::f32::consts::PI * r2;
    Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin())
}

fn to_world(local: Vec3, up: Vec3, right: Vec3, forward: Vec3) -> Vec3 {
    Vec3::new(
        local.x * right.x + local.y * up.x + local.z * forward.x,
        local.x * right.y + local.y * up.y + local.z * forward.y,
        local.x * right.z + local.y * up.z + local.z * forward.z,
    )
    .normalize()
}

fn fresnel_schlick(cos_theta: f32, f0: Spectrum) -> Spectrum {
    let factor = (1.0 - cos_theta).clamp(0.0, 1.0).powi(5);
    f0 + (Spectrum::splat(1.0) - f0).scale(factor)
}

fn ggx_distribution(normal: Vec3, halfway: Vec3, roughness: f32) -> f32 {
    let a2 = roughness * roughness;
    let n_dot_h = normal.dot(halfway).max(0.0);
    let denom = (n_dot_h * n_dot_h) * (a2 - 1.0) + 1.0;
    a2 / (std::f32::consts::PI * denom * denom).max(EPS)
}

fn geometry_schlick_ggx(n_dot_v: f32, roughness: f32) -> f32 {
    let k = (roughness + 1.0).powi(2) / 8.0;
    n_dot_v / (n_dot_v * (1.0 - k) + k).max(EPS)
}

fn geometry_smith(normal: Vec3, view: Vec3, light: Vec3, roughness: f32) -> f32 {
    let n_dot_v = normal.dot(view).max(0.0);
    let n_dot_l = normal.dot(light).max(0.0);
    geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness)
}

fn sample_ggx(r1: f32, r2: f32, reflection_dir: Vec3, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = 2.0 * std::f32::consts::PI * r1;
    let cos_theta = ((1.0 - r2) / (r2 * (a * a - 1.0) + 1.0)).max(0.0).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let halfway_local = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);

    let up = if reflection_dir.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent = up.cross(reflection_dir).normalize();
    let bitangent = reflection_dir.cross(tangent);
    (tangent * halfway_local.x + bitangent * halfway_local.y + reflection_dir * halfway_local.z).normalize()
}

fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - normal * 2.0 * incident.dot(normal)
}

pub struct Lambertian {
    pub albedo: Spectrum,
}

impl Lambertian {
    fn pdf_fast(&self, cos_theta: f32) -> f32 {
        cos_theta / std::f32::consts::PI
    }

    fn evaluate_fast(&self, cos_theta: f32) -> Spectrum {
        self.albedo.scale(cos_theta / std::f32::consts::PI)
    }
}

impl Bsdf for Lambertian {
    fn evaluate(&self, _view: Vec3, normal: Vec3, sample_dir: Vec3, _lobe: Lobe) -> Spectrum {
        self.evaluate_fast(normal.dot(sample_dir).max(0.0))
    }

    fn sample(&self, _view: Vec3, normal: Vec3, rng: &mut RngState) -> BsdfSample {
        let (up, right, forward) = create_cartesian(normal);
        let local = rng.gen_2d();
        let sample = cosine_sample_hemisphere(local.x, local.y);
        let direction = to_world(sample, up, right, forward);

        let cos_theta = normal.dot(direction).max(0.0);
        BsdfSample {
            direction,
            lobe: Lobe::Diffuse,
            f: self.evaluate_fast(cos_theta),
            pdf: self.pdf_fast(cos_theta),
        }
    }

    fn pdf(&self, _view: Vec3, normal: Vec3, sample_dir: Vec3, _lobe: Lobe) -> f32 {
        self.pdf_fast(normal.dot(sample_dir).max(0.0))
    }
}

/// Metallic/roughness PBR lobe mixing Lambertian diffuse with a GGX
/// microfacet specular term.
pub struct Pbr {
    pub albedo: Spectrum,
    pub roughness: f32,
    pub metallic: f32,
}

impl Pbr {
    fn diffuse_specular_ratio(&self) -> f32 {
        0.5 + 0.5 * self.metallic
    }

    fn fresnel_term(&self, cos_theta: f32) -> Spectrum {
        let f0 = Spectrum::splat(0.04) * (1.0 - self.metallic) + self.albedo.scale(self.metallic);
        fresnel_schlick(cos_theta, f0)
    }

    fn evaluate_diffuse(&self, cos_theta: f32, ratio: f32, ks: Spectrum) -> Spectrum {
        let kd = (Spectrum::splat(1.0) - ks).scale(1.0 - self.metallic);
        (self.albedo * kd).scale(cos_theta / (std::f32::consts::PI * (1.0 - ratio)))
    }

    fn evaluate_specular(&self, view: Vec3, normal: Vec3, sample_dir: Vec3, cos_theta: f32, d_term: f32, ratio: f32, ks: Spectrum) -> Spectrum {
        let roughness = self.roughness.max(EPS);
        let g_term = geometry_smith(normal, view, sample_dir, roughness);
        let denom = (4.0 * normal.dot(view).max(0.0) * cos_theta).max(EPS);
        ks.scale(d_term * g_term * cos_theta / (denom * ratio))
    }
}

impl Bsdf for Pbr {
    fn evaluate(&self, view: Vec3, normal: Vec3, sample_dir: Vec3, lobe: Lobe) -> Spectrum {
        let ratio = self.diffuse_specular_ratio();
        let cos_theta = normal.dot(sample_dir).max(0.0);
        let halfway = (view + sample_dir).normalize();
        let ks = self.fresnel_term(halfway.dot(view).max(0.0));

        match lobe {
            Lobe::Diffuse => self.evaluate_diffuse(cos_theta, ratio, ks),
            Lobe::Specular => {
                let roughness = self.roughness.max(EPS);
                let d_term = ggx_distribution(normal, halfway, roughness);
                self.evaluate_specular(view, normal, sample_dir, cos_theta, d_term, ratio, ks)
            }
        }
    }

    fn sample(&self, view: Vec3, normal: Vec3, rng: &mut RngState) -> BsdfSample {
        let ratio = self.diffuse_specular_ratio();
        let roughness = self.roughness.max(EPS);
        let choice = rng.gen_1d();
        let local = rng.gen_2d();

        let (direction, lobe) = if choice > ratio {
            let (up, right, forward) = create_cartesian(normal);
            let sample = cosine_sample_hemisphere(local.x, local.y);
            (to_world(sample, up, right, forward), Lobe::Diffuse)
        } else {
            let reflection_dir = reflect(-view, normal);
            (sample_ggx(local.x, local.y, reflection_dir, roughness), Lobe::Specular)
        };

        let cos_theta = normal.dot(direction).max(0.0);
        let halfway = (view + direction).normalize();
        let ks = self.fresnel_term(halfway.dot(view).max(0.0));

        let (pdf, f) = match lobe {
            Lobe::Diffuse => (cos_theta / std::f32::consts::PI, self.evaluate_diffuse(cos_theta, ratio, ks)),
            Lobe::Specular => {
                let d_term = ggx_distribution(normal, halfway, roughness);
                let pdf = (d_term * normal.dot(halfway).max(0.0)) / (4.0 * view.dot(halfway)).max(EPS);
                (pdf, self.evaluate_specular(view, normal, direction, cos_theta, d_term, ratio, ks))
            }
        };

        BsdfSample { direction, lobe, f, pdf }
    }

    fn pdf(&self, view: Vec3, normal: Vec3, sample_dir: Vec3, lobe: Lobe) -> f32 {
        let cos_theta = normal.dot(sample_dir).max(0.0);
        match lobe {
            Lobe::Diffuse => cos_theta / std::f32::consts::PI,
            Lobe::Specular => {
                let roughness = self.roughness.max(EPS);
                let halfway = (view + sample_dir).normalize();
                let d_term = ggx_distribution(normal, halfway, roughness);
                (d_term * normal.dot(halfway).max(0.0)) / (4.0 * view.dot(halfway)).max(EPS)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lambertian_sample_pdf_matches_pdf_query() {
        let bsdf = Lambertian { albedo: Spectrum::splat(0.8) };
        let mut rng = RngState::new(5, 0);
        let normal = Vec3::Z;
        for _ in 0..32 {
            let sample = bsdf.sample(Vec3::Z, normal, &mut rng);
            let pdf = bsdf.pdf(Vec3::Z, normal, sample.direction, sample.lobe);
            assert!((pdf - sample.pdf).abs() < 1e-5);
        }
    }

    #[test]
    fn lambertian_samples_stay_in_upper_hemisphere() {
        let bsdf = Lambertian { albedo: Spectrum::splat(1.0) };
        let mut rng = RngState::new(9, 0);
        let normal = Vec3::Z;
        for _ in 0..64 {
            let sample = bsdf.sample(Vec3::Z, normal, &mut rng);
            assert!(sample.direction.dot(normal) >= -1e-4);
        }
    }
}
