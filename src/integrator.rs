//! MIS direct-illumination estimator (C11): combines light sampling and
//! BSDF sampling, weighted by the balance or power heuristic.
//!
//! Grounded in `examples/original_source/src/directillumination.hxx`
//! (the `kDirectIllumMis` branch of `EstimateIncomingRadiance`) and
//! `examples/original_source/src/pathtracerbase.hxx`
//! (`AddMISLightSampleContribution`, `AddDirectIllumMISBrdfSampleContribution`).

use glam::Vec3;

use crate::bsdf::{Bsdf, Lobe};
use crate::light::{Light, LightPickContext, LightPicker};
use crate::rng::RngState;
use crate::spectrum::Spectrum;

const PDF_EPSILON: f32 = 1e-9;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MisHeuristic {
    Balance,
    Power,
}

impl MisHeuristic {
    /// Weight of the strategy with PDF `p_self` against a competing
    /// strategy with PDF `p_other`. Zero when `p_self` itself is zero, so
    /// a strategy that could not have produced this sample never
    /// contributes.
    fn weight(self, p_self: f32, p_other: f32) -> f32 {
        if p_self <= PDF_EPSILON {
            return 0.0;
        }
        match self {
            MisHeuristic::Balance => p_self / (p_self + p_other),
            MisHeuristic::Power => {
                let a = p_self * p_self;
                let b = p_other * p_other;
                a / (a + b)
            }
        }
    }
}

/// What an auxiliary (BSDF-sampled) ray found, reported by the out-of-scope
/// scene/geometry collaborator.
pub enum AuxiliaryHit {
    /// Hit emissive geometry belonging to `light_id`, with outgoing
    /// radiance `radiance` towards the ray origin.
    Emitter { light_id: usize, radiance: Spectrum },
    /// Escaped to the environment light `light_id` (if one is present in
    /// the scene), carrying its radiance in the ray direction.
    Background { light_id: Option<usize>, radiance: Spectrum },
    /// Hit non-emissive geometry; contributes nothing.
    Occluded,
}

/// Contractual interface onto the scene/geometry collaborator (out of
/// scope per spec.md section 1): visibility testing and auxiliary-ray
/// intersection.
pub trait SceneQuery {
    fn occluded(&self, point: Vec3, dir: Vec3, distance: f32) -> bool;
    fn trace_auxiliary(&self, point: Vec3, dir: Vec3) -> AuxiliaryHit;
}

pub struct DirectIllumination {
    pub heuristic: MisHeuristic,
}

impl DirectIllumination {
    /// Estimates direct illumination at `point` for outgoing direction
    /// `view` (pointing away from the surface, towards the sensor), given
    /// the shading `normal`, the surface's `bsdf`, and the scene's
    /// `lights`. Emission of the primary intersection itself, if any, is
    /// passed in as `self_emission` and added without MIS weighting.
    ///
    /// Pure function of its arguments plus `rng`; holds no state across
    /// calls.
    pub fn estimate(
        &self,
        point: Vec3,
        normal: Vec3,
        view: Vec3,
        bsdf: &dyn Bsdf,
        self_emission: Spectrum,
        lights: &[Light],
        scene: &dyn SceneQuery,
        rng: &mut RngState,
    ) -> Spectrum {
        let mut result = self_emission;

        result += self.light_sampling_contribution(point, normal, view, bsdf, lights, scene, rng);
        result += self.bsdf_sampling_contribution(point, normal, view, bsdf, lights, scene, rng);

        if !result.is_finite() {
            return Spectrum::ZERO;
        }
        result
    }

    fn light_sampling_contribution(
        &self,
        point: Vec3,
        normal: Vec3,
        view: Vec3,
        bsdf: &dyn Bsdf,
        lights: &[Light],
        scene: &dyn SceneQuery,
        rng: &mut RngState,
    ) -> Spectrum {
        let mut ctx = LightPickContext::new();
        let Some(light_sample) =
            LightPicker::sample_lights_single(lights, &mut ctx, point, normal, bsdf, view, rng)
        else {
            return Spectrum::ZERO;
        };

        if light_sample.radiance.max_component() <= 0.0 {
            return Spectrum::ZERO;
        }
        if scene.occluded(point, light_sample.dir, light_sample.distance) {
            return Spectrum::ZERO;
        }

        // `f` already bakes the shading-point cosine (see `bsdf::Lambertian`),
        // so `light_sample.radiance` must stay bare — applying it again here
        // would double-count the cosine term.
        let f = bsdf.evaluate(view, normal, light_sample.dir, Lobe::Diffuse);

        if light_sample.pdf_w.is_infinite() {
            // Dirac light: the planar integral was already collapsed
            // analytically, so there is no BSDF-sampling strategy to
            // combine against.
            if light_sample.pick_prob <= PDF_EPSILON {
                return Spectrum::ZERO;
            }
            return light_sample.radiance * f / light_sample.pick_prob;
        }

        let p_self = light_sample.pdf_w * light_sample.pick_prob;
        if p_self <= PDF_EPSILON {
            return Spectrum::ZERO;
        }
        let bsdf_pdf = bsdf.pdf(view, normal, light_sample.dir, Lobe::Diffuse);
        let weight = self.heuristic.weight(p_self, bsdf_pdf);

        light_sample.radiance * f * (weight / p_self)
    }

    fn bsdf_sampling_contribution(
        &self,
        point: Vec3,
        normal: Vec3,
        view: Vec3,
        bsdf: &dyn Bsdf,
        lights: &[Light],
        scene: &dyn SceneQuery,
        rng: &mut RngState,
    ) -> Spectrum {
        let bsdf_sample = bsdf.sample(view, normal, rng);
        if bsdf_sample.f.max_component() <= 0.0 || bsdf_sample.pdf <= PDF_EPSILON {
            return Spectrum::ZERO;
        }

        match scene.trace_auxiliary(point, bsdf_sample.direction) {
            AuxiliaryHit::Occluded => Spectrum::ZERO,
            AuxiliaryHit::Background { light_id: None, radiance } => {
                if radiance.max_component() <= 0.0 {
                    return Spectrum::ZERO;
                }
                // No competing light-sampling strategy for this light: the
                // BSDF strategy is the only one that could have produced
                // this sample, so it carries the full weight.
                radiance * bsdf_sample.f / bsdf_sample.pdf
            }
            AuxiliaryHit::Emitter { light_id, radiance } | AuxiliaryHit::Background { light_id: Some(light_id), radiance } => {
                if radiance.max_component() <= 0.0 {
                    return Spectrum::ZERO;
                }
                let light_pdf_w = lights[light_id].pdf_w(point, normal, bsdf_sample.direction);

                let mut ctx = LightPickContext::new();
                let pick_prob = LightPicker::pick_probability(lights, &mut ctx, point, normal, bsdf, view, rng, light_id);

                let weight = self.heuristic.weight(bsdf_sample.pdf, light_pdf_w * pick_prob);
                radiance * bsdf_sample.f * (weight / bsdf_sample.pdf)
            }
        }
    }
}
