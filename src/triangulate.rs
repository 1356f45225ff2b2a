//! Triangulation builder (C5): adaptive geodesic subdivision of the sphere,
//! driven by piecewise-linear approximation error against the environment
//! image's true luminance.
//!
//! Grounded in `examples/original_source/src/em_steerable_sampler.hxx`
//! (`RefineEmTriangulation`, `TriangleHasToBeSubdividedImpl`,
//! `SubdivTestSamplesPerDim`, `SubdivideTriangle`, `IsEstimationErrorTooLarge`).

use std::collections::VecDeque;
use std::f32::consts::PI;

use glam::Vec3;

use crate::config::BuildParameters;
use crate::env_image::EnvImage;
use crate::sphere::{barycentric_coords, interpolate, unit_icosahedron};
use crate::steerable::SteerableValue;
use crate::tree::TriangleNode;
use crate::vertex::{Vertex, VertexIndex, VertexStorage};

struct WorklistTriangle {
    node: TriangleNode,
    dir0: Vec3,
    dir1: Vec3,
    dir2: Vec3,
}

fn new_vertex(storage: &mut VertexStorage, dir: Vec3, em: &EnvImage) -> VertexIndex {
    let luminance = em.eval_dir(dir).luminance();
    let weight = SteerableValue::spherical_harmonics(dir, luminance);
    storage.push(Vertex { dir, weight })
}

/// Builds the committed triangle list and the vertex arena backing it, by
/// adaptively subdividing an icosahedron seed mesh against `em`.
pub fn build(em: &EnvImage, params: &BuildParameters) -> (VertexStorage, Vec<TriangleNode>) {
    let mut storage = VertexStorage::new();
    let (ico_vertices, ico_faces) = unit_icosahedron();

    let base_indices: Vec<VertexIndex> =
        ico_vertices.iter().map(|&d| new_vertex(&mut storage, d, em)).collect();

    let mut worklist: VecDeque<WorklistTriangle> = VecDeque::new();
    for face in ico_faces {
        let v0 = base_indices[face[0] as usize];
        let v1 = base_indices[face[1] as usize];
        let v2 = base_indices[face[2] as usize];
        worklist.push_back(WorklistTriangle {
            node: TriangleNode::new(v0, v1, v2, 0, &storage),
            dir0: storage.get(v0).dir,
            dir1: storage.get(v1).dir,
            dir2: storage.get(v2).dir,
        });
    }

    let mut committed = Vec::new();
    while let Some(current) = worklist.pop_front() {
        if has_to_be_subdivided(&current, em, params) {
            for child in subdivide(&current, &mut storage, em) {
                worklist.push_front(child);
            }
        } else {
            committed.push(current.node);
        }
    }

    (storage, committed)
}

fn has_to_be_subdivided(triangle: &WorklistTriangle, em: &EnvImage, params: &BuildParameters) -> bool {
    if triangle.node.subdiv_level < params.min_subdiv {
        return true;
    }
    if triangle.node.subdiv_level >= params.max_subdiv {
        return false;
    }

    let sin_theta = |d: Vec3| (1.0 - d.z * d.z).max(0.0).sqrt();
    subdivision_predicate(
        triangle.dir0,
        sin_theta(triangle.dir0),
        triangle.dir1,
        sin_theta(triangle.dir1),
        triangle.dir2,
        sin_theta(triangle.dir2),
        triangle,
        em,
        params,
    )
}

#[allow(clippy::too_many_arguments)]
fn subdivision_predicate(
    v0: Vec3,
    sin0: f32,
    v1: Vec3,
    sin1: f32,
    v2: Vec3,
    sin2: f32,
    whole: &WorklistTriangle,
    em: &EnvImage,
    params: &BuildParameters,
) -> bool {
    let planar_centroid = (v0 + v1 + v2) / 3.0;
    let edge01 = ((v0 + v1) / 2.0).normalize();
    let edge12 = ((v1 + v2) / 2.0).normalize();
    let edge20 = ((v2 + v0) / 2.0).normalize();
    let centroid_dir = planar_centroid.normalize();

    let sin_theta = |d: Vec3| (1.0 - d.z * d.z).max(0.0).sqrt();
    let sin01 = sin_theta(edge01);
    let sin12 = sin_theta(edge12);
    let sin20 = sin_theta(edge20);
    let sin_c = sin_theta(centroid_dir);

    let min_sin = [sin0, sin1, sin2, sin01, sin12, sin20, sin_c]
        .into_iter()
        .fold(f32::INFINITY, f32::min);
    let max_sin = [sin0, sin1, sin2, sin01, sin12, sin20, sin_c]
        .into_iter()
        .fold(f32::NEG_INFINITY, f32::max);

    let pole_pixel_sin = (0.5 * (PI / 2.0) / em.height() as f32).sin();
    let min_sin_clamped = min_sin.max(pole_pixel_sin);
    let max_sin_clamped = max_sin.max(pole_pixel_sin);

    let (min_samples, max_samples) =
        subdiv_test_samples_per_dim(v0, v1, v2, em, planar_centroid, min_sin_clamped, max_sin_clamped, params);

    let span = max_samples / min_samples;
    if span >= params.max_triangle_span && max_samples > 32.0 {
        let corner0 = WorklistTriangle {
            node: whole.node.clone(),
            dir0: v0,
            dir1: edge01,
            dir2: edge20,
        };
        let corner1 = WorklistTriangle {
            node: whole.node.clone(),
            dir0: v1,
            dir1: edge12,
            dir2: edge01,
        };
        let corner2 = WorklistTriangle {
            node: whole.node.clone(),
            dir0: v2,
            dir1: edge20,
            dir2: edge12,
        };
        let center = WorklistTriangle {
            node: whole.node.clone(),
            dir0: edge01,
            dir1: edge12,
            dir2: edge20,
        };

        subdivision_predicate(v0, sin0, edge01, sin01, edge20, sin20, &corner0, em, params)
            || subdivision_predicate(v1, sin1, edge12, sin12, edge01, sin01, &corner1, em, params)
            || subdivision_predicate(v2, sin2, edge20, sin20, edge12, sin12, &corner2, em, params)
            || subdivision_predicate(edge01, sin01, edge12, sin12, edge20, sin20, &center, em, params)
    } else {
        is_estimation_error_too_large(whole, v0, v1, v2, max_samples.ceil() as u32, em, params)
    }
}

fn subdiv_test_samples_per_dim(
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    em: &EnvImage,
    planar_centroid: Vec3,
    min_sin_clamped: f32,
    max_sin_clamped: f32,
    params: &BuildParameters,
) -> (f32, f32) {
    let (w, h) = (em.width() as f32, em.height() as f32);

    let min_em_pixel_angular = (PI / h, min_sin_clamped * 2.0 * PI / w);
    let max_em_pixel_angular = (PI / h, max_sin_clamped * 2.0 * PI / w);
    let pixel_angular_low_bound = (min_em_pixel_angular.0.min(min_em_pixel_angular.1), max_em_pixel_angular.0.min(max_em_pixel_angular.1));

    let angular_sample_up_bound = (
        (pixel_angular_low_bound.0 / 2.0).min(PI / 2.0 - 0.1),
        (pixel_angular_low_bound.1 / 2.0).min(PI / 2.0 - 0.1),
    );

    let triangle_dist_est = planar_centroid.length();
    let planar_sample_up_bound =
        (angular_sample_up_bound.0.tan() * triangle_dist_est, angular_sample_up_bound.1.tan() * triangle_dist_est);

    let edge0_len_sqr = (v0 - v1).length_squared();
    let edge1_len_sqr = (v1 - v2).length_squared();
    let edge2_len_sqr = (v2 - v0).length_squared();
    let avg_edge_len_sqr = (edge0_len_sqr + edge1_len_sqr + edge2_len_sqr) / 3.0;

    let planar_bin_size_sqr = (planar_sample_up_bound.0 * planar_sample_up_bound.0 / 2.0, planar_sample_up_bound.1 * planar_sample_up_bound.1 / 2.0);
    let rect_samples_sqr = (avg_edge_len_sqr / planar_bin_size_sqr.0, avg_edge_len_sqr / planar_bin_size_sqr.1);
    let samples_sqr = (rect_samples_sqr.0 / 2.0, rect_samples_sqr.1 / 2.0);

    let mut samples = (samples_sqr.0.max(0.0).sqrt(), samples_sqr.1.max(0.0).sqrt());
    samples.0 *= params.oversampling;
    samples.1 *= params.oversampling;

    (samples.1, samples.0)
}

fn is_estimation_error_too_large(
    whole: &WorklistTriangle,
    sub0: Vec3,
    sub1: Vec3,
    sub2: Vec3,
    samples_per_dim: u32,
    em: &EnvImage,
    params: &BuildParameters,
) -> bool {
    if samples_per_dim == 0 {
        return false;
    }
    let bin_size = 1.0 / samples_per_dim as f32;

    for i in 0..=samples_per_dim {
        for j in 0..=samples_per_dim {
            // `sqrt_u` is the square root of the low-discrepancy stride
            // `(i/N)^2`, i.e. just `i/N`; see SampleTriangleFFunction-style
            // uniform-triangle sampling.
            let sqrt_u = i as f32 * bin_size;
            let t = j as f32 * bin_size;

            let point = interpolate(sub0, sub1, sub2, (sqrt_u * (1.0 - t), sqrt_u * t));
            let (bu, bv) = barycentric_coords(point, whole.dir0, whole.dir1, whole.dir2);
            let bu = bu.clamp(0.0, 1.0);
            let bv = bv.clamp(0.0, 1.0);
            let bw = (1.0 - bu - bv).clamp(0.0, 1.0);

            let lum0 = em.eval_dir(whole.dir0).luminance();
            let lum1 = em.eval_dir(whole.dir1).luminance();
            let lum2 = em.eval_dir(whole.dir2).luminance();
            let approx = bu * lum0 + bv * lum1 + bw * lum2;

            let sample_dir = point.normalize();
            let true_luminance = em.eval_dir(sample_dir).luminance();

            let diff = (true_luminance - approx).abs();
            let threshold = (params.max_approx_error * true_luminance).max(0.001);
            if diff > threshold {
                return true;
            }
        }
    }

    false
}

fn subdivide(triangle: &WorklistTriangle, storage: &mut VertexStorage, em: &EnvImage) -> [WorklistTriangle; 4] {
    let mid01 = ((triangle.dir0 + triangle.dir1) / 2.0).normalize();
    let mid12 = ((triangle.dir1 + triangle.dir2) / 2.0).normalize();
    let mid20 = ((triangle.dir2 + triangle.dir0) / 2.0).normalize();

    let i01 = new_vertex(storage, mid01, em);
    let i12 = new_vertex(storage, mid12, em);
    let i20 = new_vertex(storage, mid20, em);

    let next_level = triangle.node.subdiv_level + 1;
    let old = triangle.node.vertex_indices();

    let center = WorklistTriangle {
        node: TriangleNode::new(i01, i12, i20, next_level, storage),
        dir0: mid01,
        dir1: mid12,
        dir2: mid20,
    };
    let corner0 = WorklistTriangle {
        node: TriangleNode::new(old[0], i01, i20, next_level, storage),
        dir0: triangle.dir0,
        dir1: mid01,
        dir2: mid20,
    };
    let corner1 = WorklistTriangle {
        node: TriangleNode::new(i01, old[1], i12, next_level, storage),
        dir0: mid01,
        dir1: triangle.dir1,
        dir2: mid12,
    };
    let corner2 = WorklistTriangle {
        node: TriangleNode::new(i12, old[2], i20, next_level, storage),
        dir0: mid12,
        dir1: triangle.dir2,
        dir2: mid20,
    };

    [center, corner0, corner1, corner2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env_image::EnvImage;

    fn const_white_image() -> EnvImage {
        // 8x4 uniform white image, matching the "Const white 8x4" test fixture.
        crate::env_image::test_support::uniform(8, 4, crate::spectrum::Spectrum::splat(1.0))
    }

    #[test]
    fn covers_the_sphere_with_non_overlapping_triangles() {
        let em = const_white_image();
        let params = BuildParameters { min_subdiv: 1, max_subdiv: 2, ..Default::default() };
        let (storage, triangles) = build(&em, &params);
        assert!(!triangles.is_empty());

        let mut total_area = 0.0;
        for t in &triangles {
            let a = storage.get(t.v0).dir;
            let b = storage.get(t.v1).dir;
            let c = storage.get(t.v2).dir;
            total_area += crate::sphere::spherical_triangle_solid_angle(a, b, c);
        }
        assert!((total_area - 4.0 * std::f32::consts::PI).abs() < 0.2);
    }

    #[test]
    fn minimum_subdivision_level_is_respected() {
        let em = const_white_image();
        let params = BuildParameters { min_subdiv: 2, max_subdiv: 2, ..Default::default() };
        let (_storage, triangles) = build(&em, &params);
        assert!(triangles.iter().all(|t| t.subdiv_level == 2));
        assert_eq!(triangles.len(), 20 * 16);
    }
}
