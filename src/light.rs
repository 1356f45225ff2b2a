//! Light picker (C10): per-light contribution estimate, proportional
//! choice, and a picking-probability query that reuses the same cached
//! estimates.
//!
//! Grounded in `examples/original_source/src/lights.hxx` (`AreaLight`,
//! `PointLight`, `BackgroundLight`) for the individual light models and
//! `examples/original_source/src/pathtracerbase.hxx` (`PickSingleLight`,
//! `LightPickingProbability`) for the picker itself.

use glam::Vec3;

use crate::bsdf::{Bsdf, Lobe};
use crate::env_sampler::EnvSampler;
use crate::rng::RngState;
use crate::spectrum::Spectrum;

/// A drawn light sample, per spec.md section 3. `pdf_w = f32::INFINITY`
/// encodes a Dirac (point) light, for which no MIS weighting against a
/// BSDF strategy is applicable.
pub struct LightSample {
    pub dir: Vec3,
    pub radiance: Spectrum,
    pub pdf_w: f32,
    pub distance: f32,
    pub pick_prob: f32,
}

pub struct PointLight {
    pub position: Vec3,
    pub intensity: Spectrum,
}

pub struct AreaLight {
    pub p0: Vec3,
    pub p1: Vec3,
    pub p2: Vec3,
    pub radiance: Spectrum,
}

impl AreaLight {
    fn normal_and_area(&self) -> (Vec3, f32) {
        let e1 = self.p1 - self.p0;
        let e2 = self.p2 - self.p0;
        let cross = e1.cross(e2);
        let len = cross.length();
        (cross / len.max(1e-12), len * 0.5)
    }
}

pub enum Light<'a> {
    Point(PointLight),
    Area(AreaLight),
    Environment(EnvSampler<'a>),
}

const ENVIRONMENT_ESTIMATE_ROUNDS: u32 = 10;

impl<'a> Light<'a> {
    pub fn is_dirac(&self) -> bool {
        matches!(self, Light::Point(_))
    }

    /// Samples illumination at `point` with shading frame normal `normal`.
    /// Returns `None` when the light contributes nothing from this point
    /// (e.g. below the light's own horizon).
    fn sample_illumination(&self, point: Vec3, normal: Vec3, rng: &mut RngState) -> Option<LightSample> {
        match self {
            Light::Point(light) => {
                let to_light = light.position - point;
                let dist_sqr = to_light.length_squared();
                let distance = dist_sqr.sqrt();
                let dir = to_light / distance.max(1e-12);
                let cos_theta = normal.dot(dir);
                if cos_theta <= 0.0 {
                    return None;
                }
                // Bare radiance: the shading-point cosine is applied once,
                // by the BSDF evaluation at the call site, not baked in here.
                let radiance = light.intensity.scale(1.0 / dist_sqr.max(1e-12));
                Some(LightSample { dir, radiance, pdf_w: f32::INFINITY, distance, pick_prob: 1.0 })
            }
            Light::Area(light) => {
                let sample = rng.gen_2d();
                let bary_x = sample.x.sqrt();
                let alpha = 1.0 - bary_x;
                let beta = bary_x * (1.0 - sample.y);
                let gamma = bary_x * sample.y;
                let sample_point = light.p0 * alpha + light.p1 * beta + light.p2 * gamma;

                let to_light = sample_point - point;
                let dist_sqr = to_light.length_squared();
                let distance = dist_sqr.sqrt();
                let dir = to_light / distance.max(1e-12);

                let (light_normal, area) = light.normal_and_area();
                let cos_theta_out = -light_normal.dot(dir);
                let cos_theta_in = normal.dot(dir);
                if cos_theta_in <= 0.0 || cos_theta_out <= 0.0 {
                    return None;
                }

                let solid_angle_pdf = dist_sqr / (cos_theta_out * area).max(1e-12);
                // Bare radiance, for the same reason as the point light above:
                // `cos_theta_in` is applied once, by the BSDF evaluation.
                Some(LightSample {
                    dir,
                    radiance: light.radiance,
                    pdf_w: solid_angle_pdf,
                    distance,
                    pick_prob: 1.0,
                })
            }
            Light::Environment(sampler) => {
                let sample = sampler.sample(normal, true, false, rng)?;
                if sample.pdf_w <= 1e-9 {
                    return None;
                }
                Some(LightSample {
                    dir: sample.dir,
                    radiance: sample.radiance,
                    pdf_w: sample.pdf_w,
                    distance: f32::INFINITY,
                    pick_prob: 1.0,
                })
            }
        }
    }

    /// PDF of sampling `dir` from this light's `sample_illumination`,
    /// for the BSDF-sampled auxiliary-ray branch of the MIS estimator.
    pub fn pdf_w(&self, point: Vec3, normal: Vec3, dir: Vec3) -> f32 {
        match self {
            Light::Point(_) => f32::INFINITY,
            Light::Area(light) => {
                let (light_normal, area) = light.normal_and_area();
                // Ray-plane intersection of `dir` against the light's plane.
                let denom = light_normal.dot(dir);
                if denom.abs() < 1e-9 {
                    return 0.0;
                }
                let t = light_normal.dot(light.p0 - point) / denom;
                if t <= 0.0 {
                    return 0.0;
                }
                let dist_sqr = t * t;
                let cos_theta_out = -light_normal.dot(dir);
                if cos_theta_out <= 0.0 {
                    return 0.0;
                }
                dist_sqr / (cos_theta_out * area).max(1e-12)
            }
            Light::Environment(sampler) => sampler.pdf(dir, normal, true, false),
        }
    }

    /// 10-round two-strategy MIS estimate of `∫L·f_r·cosθ` for the
    /// environment light; a cheap analytic estimate for the others.
    fn estimate_contribution(&self, point: Vec3, normal: Vec3, bsdf: &dyn Bsdf, view: Vec3, rng: &mut RngState) -> f32 {
        match self {
            Light::Point(light) => {
                let to_light = light.position - point;
                let dist_sqr = to_light.length_squared().max(1e-12);
                let dir = to_light / dist_sqr.sqrt();
                let cos_theta = normal.dot(dir).max(0.0);
                (light.intensity.luminance() * cos_theta / dist_sqr).max(0.0)
            }
            Light::Area(light) => {
                let centroid = (light.p0 + light.p1 + light.p2) / 3.0;
                let (light_normal, area) = light.normal_and_area();
                let to_light = centroid - point;
                let dist_sqr = to_light.length_squared().max(1e-12);
                let dir = to_light / dist_sqr.sqrt();
                let cos_theta_in = normal.dot(dir).max(0.0);
                let cos_theta_out = (-light_normal.dot(dir)).max(0.0);
                (light.radiance.luminance() * cos_theta_in * cos_theta_out * area / dist_sqr).max(0.0)
            }
            Light::Environment(sampler) => {
                let mut sum = 0.0_f32;
                for _ in 0..ENVIRONMENT_ESTIMATE_ROUNDS {
                    // Strategy 1: cosine-hemisphere sample via the BSDF.
                    let bsdf_sample = bsdf.sample(view, normal, rng);
                    if bsdf_sample.pdf > 1e-9 {
                        let radiance = sampler.em_image.eval_dir(bsdf_sample.direction);
                        let light_pdf = sampler.pdf(bsdf_sample.direction, normal, true, false);
                        let weight = bsdf_sample.pdf / (bsdf_sample.pdf + light_pdf).max(1e-12);
                        // `bsdf_sample.f` already bakes the shading-point cosine.
                        sum += weight * radiance.luminance() * bsdf_sample.f.luminance() / bsdf_sample.pdf;
                    }

                    // Strategy 2: sample the environment map directly.
                    if let Some(sample) = sampler.sample(normal, true, false, rng) {
                        if sample.pdf_w > 1e-9 {
                            let f = bsdf.evaluate(view, normal, sample.dir, Lobe::Diffuse);
                            let bsdf_pdf = bsdf.pdf(view, normal, sample.dir, Lobe::Diffuse);
                            let weight = sample.pdf_w / (sample.pdf_w + bsdf_pdf).max(1e-12);
                            // `f` already bakes the shading-point cosine.
                            sum += weight * sample.radiance.luminance() * f.luminance() / sample.pdf_w;
                        }
                    }
                }
                (sum / ENVIRONMENT_ESTIMATE_ROUNDS as f32).max(0.0)
            }
        }
    }
}

/// Per-sample context caching the light-contribution estimates so that
/// a later probability query reuses exactly the values `pick` used.
#[derive(Default)]
pub struct LightPickContext {
    estimates: Vec<f32>,
    total: f32,
    valid: bool,
}

impl LightPickContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn fill(&mut self, lights: &[Light], point: Vec3, normal: Vec3, bsdf: &dyn Bsdf, view: Vec3, rng: &mut RngState) {
        if self.valid {
            return;
        }
        self.estimates.clear();
        self.estimates.reserve(lights.len());
        self.total = 0.0;
        for light in lights {
            let e = light.estimate_contribution(point, normal, bsdf, view, rng);
            self.total += e;
            self.estimates.push(e);
        }
        self.valid = true;
    }
}

pub struct LightPicker;

impl LightPicker {
    /// Picks a light index proportional to its cached contribution
    /// estimate. `S = 0` falls back to a uniform pick. Returns `None` for
    /// an empty scene.
    pub fn pick(
        lights: &[Light],
        ctx: &mut LightPickContext,
        point: Vec3,
        normal: Vec3,
        bsdf: &dyn Bsdf,
        view: Vec3,
        rng: &mut RngState,
    ) -> Option<(usize, f32)> {
        if lights.is_empty() {
            return None;
        }
        if lights.len() == 1 {
            return Some((0, 1.0));
        }

        ctx.fill(lights, point, normal, bsdf, view, rng);

        if ctx.total > 0.0 {
            let threshold = rng.gen_1d() * ctx.total;
            let mut cumulative = 0.0;
            for (i, &e) in ctx.estimates.iter().enumerate() {
                cumulative += e;
                if threshold <= cumulative || i == ctx.estimates.len() - 1 {
                    let prob = e / ctx.total;
                    return Some((i, prob));
                }
            }
            unreachable!("cumulative sum must reach total");
        } else {
            let n = lights.len();
            let i = ((rng.gen_1d() * n as f32) as usize).min(n - 1);
            Some((i, 1.0 / n as f32))
        }
    }

    /// Probability of having picked `light_id`, reusing the same cached
    /// estimates `pick` filled in — the invariant the MIS combiner relies
    /// on.
    pub fn pick_probability(
        lights: &[Light],
        ctx: &mut LightPickContext,
        point: Vec3,
        normal: Vec3,
        bsdf: &dyn Bsdf,
        view: Vec3,
        rng: &mut RngState,
        light_id: usize,
    ) -> f32 {
        if lights.is_empty() {
            return 0.0;
        }
        if lights.len() == 1 {
            return 1.0;
        }

        ctx.fill(lights, point, normal, bsdf, view, rng);

        if ctx.total > 0.0 {
            ctx.estimates[light_id] / ctx.total
        } else {
            1.0 / lights.len() as f32
        }
    }

    /// Draws one light sample via the picker, folding the chosen light's
    /// picking probability into `LightSample::pick_prob`.
    pub fn sample_lights_single(
        lights: &[Light],
        ctx: &mut LightPickContext,
        point: Vec3,
        normal: Vec3,
        bsdf: &dyn Bsdf,
        view: Vec3,
        rng: &mut RngState,
    ) -> Option<LightSample> {
        let (light_id, pick_prob) = Self::pick(lights, ctx, point, normal, bsdf, view, rng)?;
        let mut sample = lights[light_id].sample_illumination(point, normal, rng)?;
        sample.pick_prob = pick_prob;
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsdf::Lambertian;

    fn lambertian() -> Lambertian {
        Lambertian { albedo: Spectrum::splat(0.8) }
    }

    #[test]
    fn single_point_light_is_always_picked_with_probability_one() {
        let light = Light::Point(PointLight { position: Vec3::new(0.0, 5.0, 0.0), intensity: Spectrum::splat(10.0) });
        let lights = vec![light];
        let mut ctx = LightPickContext::new();
        let mut rng = RngState::new(1, 0);
        let bsdf = lambertian();
        let (idx, prob) = LightPicker::pick(&lights, &mut ctx, Vec3::ZERO, Vec3::Y, &bsdf, Vec3::Y, &mut rng).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(prob, 1.0);
    }

    #[test]
    fn zero_total_estimate_falls_back_to_uniform_pick() {
        let point_below = PointLight { position: Vec3::new(0.0, -5.0, 0.0), intensity: Spectrum::splat(10.0) };
        let point_below_2 = PointLight { position: Vec3::new(0.0, -5.0, 1.0), intensity: Spectrum::splat(10.0) };
        let lights = vec![Light::Point(point_below), Light::Point(point_below_2)];
        let mut ctx = LightPickContext::new();
        let mut rng = RngState::new(2, 0);
        let bsdf = lambertian();
        // Both lights sit below the shading normal, so every contribution
        // estimate should be exactly zero and picking must fall back to
        // a uniform 1/N choice rather than dividing by zero.
        let (_idx, prob) = LightPicker::pick(&lights, &mut ctx, Vec3::ZERO, Vec3::Y, &bsdf, Vec3::Y, &mut rng).unwrap();
        assert!((prob - 0.5).abs() < 1e-6);
    }

    #[test]
    fn pick_probability_matches_pick_cached_estimates() {
        let lights = vec![
            Light::Point(PointLight { position: Vec3::new(0.0, 5.0, 0.0), intensity: Spectrum::splat(10.0) }),
            Light::Point(PointLight { position: Vec3::new(0.0, 3.0, 0.0), intensity: Spectrum::splat(4.0) }),
        ];
        let mut ctx = LightPickContext::new();
        let mut rng = RngState::new(3, 0);
        let bsdf = lambertian();
        let (picked, prob) = LightPicker::pick(&lights, &mut ctx, Vec3::ZERO, Vec3::Y, &bsdf, Vec3::Y, &mut rng).unwrap();

        let mut rng2 = RngState::new(3, 0);
        let mut ctx2 = LightPickContext::new();
        // Seed ctx2's cache identically by calling pick_probability directly;
        // since both lights are above-horizon the cache is deterministic
        // given the same inputs regardless of RNG draws used for picking.
        let queried = LightPicker::pick_probability(&lights, &mut ctx2, Vec3::ZERO, Vec3::Y, &bsdf, Vec3::Y, &mut rng2, picked);
        assert!((queried - prob).abs() < 1e-6);
    }
}
