//! Sphere geometry helpers (C2): direction<->lat-long mapping, spherical
//! triangle helpers, and the geodesic icosahedron seed mesh.
//!
//! Grounded in `examples/original_source/src/geom.hxx` (`Geom::UnitIcosahedron`,
//! `Geom::Triangle::BarycentricCoords`/`SurfaceArea`) and `em_image.hxx`'s
//! lat-long direction mapping.

use glam::Vec3;
use std::f32::consts::PI;

/// `(u,v) -> (phi,theta) -> direction`, per the GLOSSARY's lat-long map.
pub fn uv_to_direction(u: f32, v: f32) -> Vec3 {
    let phi = -(u - 0.5) * 2.0 * PI;
    let theta = v * PI;
    let (sin_theta, cos_theta) = theta.sin_cos();
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta)
}

/// Inverse of [`uv_to_direction`]. `dir` need not be normalised.
pub fn direction_to_uv(dir: Vec3) -> (f32, f32) {
    let dir = dir.normalize();
    let theta = dir.z.clamp(-1.0, 1.0).acos();
    let phi = dir.y.atan2(dir.x);
    let v = theta / PI;
    let mut u = 0.5 - phi / (2.0 * PI);
    u -= u.floor();
    (u, v)
}

/// Planar (not spherical-excess) area of the 3D triangle `(a,b,c)`.
///
/// This is deliberately the flat-triangle area, matching the
/// `TriangleNode.weight` invariant in spec.md section 3, which calls for
/// "the planar area of the 3D triangle" even though the vertices sit on the
/// unit sphere.
pub fn planar_triangle_area(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    0.5 * (b - a).cross(c - a).length()
}

/// Spherical excess (solid angle) of the triangle with unit-vector corners
/// `(a,b,c)`, via the Van Oosterom-Strackee formula. Offered as the
/// "spherical-triangle area" helper named in C2; not used by the
/// `TriangleNode` weight invariant, which uses the planar area instead.
pub fn spherical_triangle_solid_angle(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    let numerator = a.dot(b.cross(c)).abs();
    let denominator = 1.0 + a.dot(b) + b.dot(c) + c.dot(a);
    2.0 * numerator.atan2(denominator)
}

pub fn barycentric_coords(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> (f32, f32) {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denom = d00 * d11 - d01 * d01;
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    (v, w)
}

pub fn interpolate(a: Vec3, b: Vec3, c: Vec3, bary: (f32, f32)) -> Vec3 {
    let (v, w) = bary;
    let u = 1.0 - v - w;
    a * u + b * v + c * w
}

pub fn centroid(a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    (a + b + c) / 3.0
}

/// Vertices and faces of a unit-radius regular icosahedron centred at the
/// origin. Based on David Eberly's "Platonic Solids" construction, as in
/// `Geom::UnitIcosahedron`.
pub fn unit_icosahedron() -> ([Vec3; 12], [[u32; 3]; 20]) {
    let t = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let s = (1.0 + t * t).sqrt();
    let s_inv = 1.0 / s;

    let vertices = [
        Vec3::new(t, 1.0, 0.0) * s_inv,
        Vec3::new(-t, 1.0, 0.0) * s_inv,
        Vec3::new(t, -1.0, 0.0) * s_inv,
        Vec3::new(-t, -1.0, 0.0) * s_inv,
        Vec3::new(1.0, 0.0, t) * s_inv,
        Vec3::new(1.0, 0.0, -t) * s_inv,
        Vec3::new(-1.0, 0.0, t) * s_inv,
        Vec3::new(-1.0, 0.0, -t) * s_inv,
        Vec3::new(0.0, t, 1.0) * s_inv,
        Vec3::new(0.0, -t, 1.0) * s_inv,
        Vec3::new(0.0, t, -1.0) * s_inv,
        Vec3::new(0.0, -t, -1.0) * s_inv,
    ];

    let faces = [
        [0, 8, 4], [1, 10, 7], [2, 9, 11], [7, 3, 1],
        [0, 5, 10], [3, 9, 6], [3, 11, 9], [8, 6, 4],
        [2, 4, 9], [3, 7, 11], [4, 2, 0], [9, 4, 6],
        [2, 11, 5], [0, 10, 8], [5, 0, 2], [10, 5, 7],
        [1, 6, 8], [1, 8, 10], [6, 1, 3], [11, 7, 5],
    ];

    (vertices, faces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latlong_round_trips() {
        for i in 0..16 {
            for j in 1..16 {
                let u = i as f32 / 16.0;
                let v = j as f32 / 16.0;
                let dir = uv_to_direction(u, v);
                let (u2, v2) = direction_to_uv(dir);
                assert!((v - v2).abs() < 1e-4, "v {} vs {}", v, v2);
                let mut du = (u - u2).abs();
                if du > 0.5 {
                    du = 1.0 - du;
                }
                assert!(du < 1e-3, "u {} vs {}", u, u2);
            }
        }
    }

    #[test]
    fn icosahedron_vertices_are_unit() {
        let (vertices, _) = unit_icosahedron();
        for v in vertices {
            assert!((v.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn icosahedron_edges_have_expected_length() {
        let (vertices, faces) = unit_icosahedron();
        let expected = 4.0 / (10.0 + 2.0 * 5.0_f32.sqrt()).sqrt();
        let mut edges = std::collections::HashSet::new();
        for f in faces {
            for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
                edges.insert((a.min(b), a.max(b)));
            }
        }
        assert_eq!(edges.len(), 30);
        for (a, b) in edges {
            let len = (vertices[a as usize] - vertices[b as usize]).length();
            assert!((len - expected).abs() < 1e-4, "edge len {} vs {}", len, expected);
        }
    }

    #[test]
    fn icosahedron_faces_are_unique_and_outward_facing() {
        let (vertices, faces) = unit_icosahedron();
        let mut seen = std::collections::HashSet::new();
        for f in faces {
            let mut sorted = f;
            sorted.sort_unstable();
            assert!(seen.insert(sorted), "duplicate face {:?}", f);

            let a = vertices[f[0] as usize];
            let b = vertices[f[1] as usize];
            let c = vertices[f[2] as usize];
            let normal = (b - a).cross(c - a);
            let centroid = centroid(a, b, c);
            assert!(normal.dot(centroid) > 0.0);
        }
    }

    #[test]
    fn barycentric_round_trip() {
        let a = Vec3::new(0.0, 0.0, 1.0);
        let b = Vec3::new(1.0, 0.0, 0.2).normalize();
        let c = Vec3::new(0.0, 1.0, 0.2).normalize();
        for _ in 0..100 {
            let bary = (0.3, 0.4);
            let p = interpolate(a, b, c, bary);
            let recovered = barycentric_coords(p, a, b, c);
            assert!((bary.0 - recovered.0).abs() < 1e-4);
            assert!((bary.1 - recovered.1).abs() < 1e-4);
        }
    }
}
