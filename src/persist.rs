//! Persistence layer (C7): deterministic little-endian save/load of
//! [`VertexStorage`] and the aggregation [`TreeNode`], keyed by build
//! parameters and the header string.
//!
//! Grounded in `examples/original_source/src/em_steerable_sampler.hxx`'s
//! `Load`/`Save` pair (constant header string, packed field layout). The
//! teacher's own crate carries no (de)serialization dependency — this
//! format is read and written with plain `std::io`, matching the
//! teacher's preference for direct control over GPU-kernel-adjacent data
//! rather than reaching for `serde`/`bincode` where the original doesn't
//! either.

use std::io::{self, Read, Write};

use glam::Vec3;

use crate::config::BuildParameters;
use crate::error::{Error, Result};
use crate::steerable::SteerableValue;
use crate::tree::{SetNode, TreeNode, TriangleNode};
use crate::vertex::{Vertex, VertexIndex, VertexStorage};

pub const HEADER: &str = "Environment Map Steerable Sampler Data, format ver. 1.1";

fn write_f32(w: &mut impl Write, v: f32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u32(w: &mut impl Write, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u8(w: &mut impl Write, v: u8) -> io::Result<()> {
    w.write_all(&[v])
}

fn read_f32(r: &mut impl Read, context: &'static str) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|_| Error::CacheTruncated { context })?;
    Ok(f32::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read, context: &'static str) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|_| Error::CacheTruncated { context })?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u8(r: &mut impl Read, context: &'static str) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(|_| Error::CacheTruncated { context })?;
    Ok(buf[0])
}

fn write_vec3(w: &mut impl Write, v: Vec3) -> io::Result<()> {
    write_f32(w, v.x)?;
    write_f32(w, v.y)?;
    write_f32(w, v.z)
}

fn read_vec3(r: &mut impl Read, context: &'static str) -> Result<Vec3> {
    Ok(Vec3::new(read_f32(r, context)?, read_f32(r, context)?, read_f32(r, context)?))
}

fn write_steerable(w: &mut impl Write, s: &SteerableValue) -> io::Result<()> {
    for c in s.coeffs {
        write_f32(w, c)?;
    }
    Ok(())
}

fn read_steerable(r: &mut impl Read, context: &'static str) -> Result<SteerableValue> {
    let mut coeffs = [0.0f32; 9];
    for c in coeffs.iter_mut() {
        *c = read_f32(r, context)?;
    }
    Ok(SteerableValue { coeffs })
}

fn count_nodes(node: &TreeNode) -> (u32, u32) {
    match node {
        TreeNode::Leaf(_) => (0, 1),
        TreeNode::Set(set) => {
            let (sl, tl) = count_nodes(&set.left);
            let (sr, tr) = count_nodes(&set.right);
            (sl + sr + 1, tl + tr)
        }
    }
}

fn write_node(w: &mut impl Write, node: &TreeNode) -> io::Result<()> {
    match node {
        TreeNode::Leaf(t) => {
            write_u8(w, 1)?;
            write_u32(w, t.subdiv_level)?;
            for idx in t.vertex_indices() {
                write_u32(w, idx.0)?;
            }
            Ok(())
        }
        TreeNode::Set(set) => {
            write_u8(w, 0)?;
            write_node(w, &set.left)?;
            write_node(w, &set.right)
        }
    }
}

fn read_node(r: &mut impl Read, storage: &VertexStorage) -> Result<Box<TreeNode>> {
    let tag = read_u8(r, "tree node tag")?;
    if tag == 1 {
        let subdiv_level = read_u32(r, "triangle subdiv level")?;
        let v0 = VertexIndex(read_u32(r, "triangle vertex index")?);
        let v1 = VertexIndex(read_u32(r, "triangle vertex index")?);
        let v2 = VertexIndex(read_u32(r, "triangle vertex index")?);
        Ok(Box::new(TreeNode::Leaf(TriangleNode::new(v0, v1, v2, subdiv_level, storage))))
    } else {
        let left = read_node(r, storage)?;
        let right = read_node(r, storage)?;
        let weight = left.weight() + right.weight();
        Ok(Box::new(TreeNode::Set(SetNode { weight, left, right })))
    }
}

/// Serialises `storage`/`root` under `params`, per spec.md section 4.5.
pub fn save(w: &mut impl Write, params: &BuildParameters, storage: &VertexStorage, root: &TreeNode) -> Result<()> {
    let io_err = |source: io::Error| Error::Io { path: "<cache output>".to_string(), source };

    w.write_all(HEADER.as_bytes()).map_err(io_err)?;

    write_f32(w, params.max_approx_error).map_err(io_err)?;
    write_u32(w, params.min_subdiv).map_err(io_err)?;
    write_u32(w, params.max_subdiv).map_err(io_err)?;
    write_f32(w, params.max_triangle_span).map_err(io_err)?;
    write_f32(w, params.oversampling).map_err(io_err)?;

    write_u32(w, storage.len() as u32).map_err(io_err)?;
    for vertex in storage.iter() {
        write_vec3(w, vertex.dir).map_err(io_err)?;
        write_steerable(w, &vertex.weight).map_err(io_err)?;
    }

    let (set_count, triangle_count) = count_nodes(root);
    write_u32(w, set_count).map_err(io_err)?;
    write_u32(w, triangle_count).map_err(io_err)?;

    write_node(w, root).map_err(io_err)
}

/// Deserialises a [`VertexStorage`]/[`TreeNode`] pair, rejecting on header
/// mismatch, build-parameter divergence, truncation, trailing bytes, or a
/// recomputed node count that disagrees with the header.
pub fn load(r: &mut impl Read, params: &BuildParameters) -> Result<(VertexStorage, Box<TreeNode>)> {
    let mut header_bytes = vec![0u8; HEADER.len()];
    r.read_exact(&mut header_bytes).map_err(|_| Error::CacheTruncated { context: "header" })?;
    let found = String::from_utf8_lossy(&header_bytes).into_owned();
    if found != HEADER {
        return Err(Error::CacheHeaderMismatch { expected: HEADER.to_string(), found });
    }

    let loaded = BuildParameters {
        max_approx_error: read_f32(r, "max_approx_error")?,
        min_subdiv: read_u32(r, "min_subdiv")?,
        max_subdiv: read_u32(r, "max_subdiv")?,
        max_triangle_span: read_f32(r, "max_triangle_span")?,
        oversampling: read_f32(r, "oversampling")?,
    };
    if loaded != *params {
        return Err(Error::CacheParamsMismatch);
    }

    let vertex_count = read_u32(r, "vertex_count")?;
    let mut storage = VertexStorage::new();
    for _ in 0..vertex_count {
        let dir = read_vec3(r, "vertex direction")?;
        let weight = read_steerable(r, "vertex weight")?;
        storage.push(Vertex { dir, weight });
    }

    let set_count_header = read_u32(r, "set_count")?;
    let triangle_count_header = read_u32(r, "triangle_count")?;

    let root = read_node(r, &storage)?;
    let (set_count, triangle_count) = count_nodes(&root);

    if set_count != set_count_header {
        return Err(Error::CacheCountMismatch { what: "set", header: set_count_header, recomputed: set_count });
    }
    if triangle_count != triangle_count_header {
        return Err(Error::CacheCountMismatch {
            what: "triangle",
            header: triangle_count_header,
            recomputed: triangle_count,
        });
    }

    let mut trailing = [0u8; 1];
    match r.read(&mut trailing) {
        Ok(0) => {}
        Ok(_) => return Err(Error::CacheTrailingBytes { extra: 1 }),
        Err(_) => {}
    }

    Ok((storage, root))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_storage_and_tree() -> (VertexStorage, Box<TreeNode>) {
        let mut storage = VertexStorage::new();
        let dirs = [Vec3::X, Vec3::Y, Vec3::Z, -Vec3::X, -Vec3::Y, -Vec3::Z];
        let mut indices = Vec::new();
        for (i, d) in dirs.iter().enumerate() {
            let w = SteerableValue::spherical_harmonics(*d, 1.0 + i as f32);
            indices.push(storage.push(Vertex { dir: *d, weight: w }));
        }

        let triangles = vec![
            TriangleNode::new(indices[0], indices[1], indices[2], 0, &storage),
            TriangleNode::new(indices[1], indices[3], indices[2], 1, &storage),
        ];
        let root = crate::tree::build_balanced(triangles).unwrap();
        (storage, root)
    }

    #[test]
    fn round_trips_through_a_byte_buffer() {
        let (storage, root) = sample_storage_and_tree();
        let params = BuildParameters::default();

        let mut buf = Vec::new();
        save(&mut buf, &params, &storage, &root).unwrap();

        let (loaded_storage, loaded_root) = load(&mut &buf[..], &params).unwrap();
        assert_eq!(loaded_storage.len(), storage.len());
        let (set_count, triangle_count) = count_nodes(&loaded_root);
        let (expected_set, expected_triangle) = count_nodes(&root);
        assert_eq!(set_count, expected_set);
        assert_eq!(triangle_count, expected_triangle);
    }

    #[test]
    fn rejects_a_mismatched_header() {
        let (storage, root) = sample_storage_and_tree();
        let params = BuildParameters::default();
        let mut buf = Vec::new();
        save(&mut buf, &params, &storage, &root).unwrap();
        buf[0] = b'X';

        let result = load(&mut &buf[..], &params);
        assert!(matches!(result, Err(Error::CacheHeaderMismatch { .. })));
    }

    #[test]
    fn rejects_divergent_build_parameters() {
        let (storage, root) = sample_storage_and_tree();
        let params = BuildParameters::default();
        let mut buf = Vec::new();
        save(&mut buf, &params, &storage, &root).unwrap();

        let other_params = BuildParameters { min_subdiv: params.min_subdiv + 1, ..params };
        let result = load(&mut &buf[..], &other_params);
        assert!(matches!(result, Err(Error::CacheParamsMismatch)));
    }

    #[test]
    fn rejects_truncated_input() {
        let (storage, root) = sample_storage_and_tree();
        let params = BuildParameters::default();
        let mut buf = Vec::new();
        save(&mut buf, &params, &storage, &root).unwrap();
        buf.truncate(buf.len() - 4);

        let result = load(&mut &buf[..], &params);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let (storage, root) = sample_storage_and_tree();
        let params = BuildParameters::default();
        let mut buf = Vec::new();
        save(&mut buf, &params, &storage, &root).unwrap();
        buf.push(0xAB);

        let result = load(&mut &buf[..], &params);
        assert!(matches!(result, Err(Error::CacheTrailingBytes { .. })));
    }
}
