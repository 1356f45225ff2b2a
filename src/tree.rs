//! Aggregation tree (C6): a balanced binary tree over committed triangles,
//! propagating steerable moments and supporting O(log N) proportional
//! picking.
//!
//! Grounded in `examples/original_source/src/em_steerable_sampler.hxx`
//! (`TreeNodeBase`, `TriangleSetNode`, `TriangleNode`, `BuildTriangleTree`,
//! `PickTriangle`), re-expressed as the tagged-variant + owning-box redesign
//! called for in spec.md section 9 in place of the original's polymorphic
//! `TreeNodeBase*` hierarchy.

use std::collections::VecDeque;

use crate::sphere::planar_triangle_area;
use crate::steerable::SteerableValue;
use crate::vertex::{VertexIndex, VertexStorage};

#[derive(Clone, Debug)]
pub struct TriangleNode {
    pub v0: VertexIndex,
    pub v1: VertexIndex,
    pub v2: VertexIndex,
    pub weight: SteerableValue,
    pub subdiv_level: u32,
}

impl TriangleNode {
    /// `weight = area(v0,v1,v2) * (Y(v0)*L(v0) + Y(v1)*L(v1) + Y(v2)*L(v2)) / 3`.
    pub fn new(v0: VertexIndex, v1: VertexIndex, v2: VertexIndex, subdiv_level: u32, storage: &VertexStorage) -> Self {
        let weight = Self::compute_weight(v0, v1, v2, storage);
        Self { v0, v1, v2, weight, subdiv_level }
    }

    fn compute_weight(v0: VertexIndex, v1: VertexIndex, v2: VertexIndex, storage: &VertexStorage) -> SteerableValue {
        let a = storage.get(v0);
        let b = storage.get(v1);
        let c = storage.get(v2);
        let area = planar_triangle_area(a.dir, b.dir, c.dir);
        (a.weight + b.weight + c.weight) * (area / 3.0)
    }

    pub fn vertex_indices(&self) -> [VertexIndex; 3] {
        [self.v0, self.v1, self.v2]
    }
}

#[derive(Clone, Debug)]
pub struct SetNode {
    pub weight: SteerableValue,
    pub left: Box<TreeNode>,
    pub right: Box<TreeNode>,
}

#[derive(Clone, Debug)]
pub enum TreeNode {
    Leaf(TriangleNode),
    Set(SetNode),
}

impl TreeNode {
    pub fn weight(&self) -> SteerableValue {
        match self {
            TreeNode::Leaf(t) => t.weight,
            TreeNode::Set(s) => s.weight,
        }
    }

    pub fn integral(&self, clamped_cos_coeffs: &SteerableValue) -> f32 {
        self.weight().dot(clamped_cos_coeffs)
    }
}

/// Builds a balanced binary tree bottom-up from an unordered list of leaves,
/// repeatedly pairing the front two entries of the current layer and
/// carrying an odd tail forward.
pub fn build_balanced(leaves: Vec<TriangleNode>) -> Option<Box<TreeNode>> {
    let mut layer: VecDeque<Box<TreeNode>> =
        leaves.into_iter().map(|t| Box::new(TreeNode::Leaf(t))).collect();

    while layer.len() >= 2 {
        let left = layer.pop_front().unwrap();
        let right = layer.pop_front().unwrap();
        let weight = left.weight() + right.weight();
        layer.push_back(Box::new(TreeNode::Set(SetNode { weight, left, right })));
    }

    layer.pop_front()
}

/// Descends the tree choosing left/right proportional to each side's
/// integral against `clamped_cos_coeffs`, consuming and rescaling `u` so it
/// remains uniform on `[0,1)`. Falls back to a 50/50 choice whenever a
/// subtree's integral is zero, to preserve reachability of zero-weight
/// triangles.
pub fn pick<'a>(root: &'a TreeNode, clamped_cos_coeffs: &SteerableValue, mut u: f32) -> (&'a TriangleNode, f32) {
    let mut node = root;
    loop {
        match node {
            TreeNode::Leaf(triangle) => return (triangle, u),
            TreeNode::Set(set) => {
                let left_integral = set.left.integral(clamped_cos_coeffs);
                let right_integral = set.right.integral(clamped_cos_coeffs);
                let total = left_integral + right_integral;

                let threshold = if total > 0.0 { left_integral / total } else { 0.5 };

                if u < threshold {
                    node = &set.left;
                    u = if threshold > 0.0 { u / threshold } else { 0.0 };
                } else {
                    node = &set.right;
                    u = if threshold < 1.0 { (u - threshold) / (1.0 - threshold) } else { 0.0 };
                }
                u = u.clamp(0.0, 1.0 - f32::EPSILON);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::Vertex;
    use glam::Vec3;

    fn sample_storage() -> (VertexStorage, Vec<TriangleNode>) {
        let mut storage = VertexStorage::new();
        let dirs = [
            Vec3::X,
            Vec3::Y,
            Vec3::Z,
            -Vec3::X,
            -Vec3::Y,
            -Vec3::Z,
        ];
        let mut indices = Vec::new();
        for (i, d) in dirs.iter().enumerate() {
            let w = SteerableValue::spherical_harmonics(*d, 1.0 + i as f32);
            indices.push(storage.push(Vertex { dir: *d, weight: w }));
        }

        let triangles = vec![
            TriangleNode::new(indices[0], indices[1], indices[2], 0, &storage),
            TriangleNode::new(indices[1], indices[3], indices[2], 0, &storage),
            TriangleNode::new(indices[3], indices[4], indices[2], 0, &storage),
        ];
        (storage, triangles)
    }

    #[test]
    fn internal_node_weight_is_sum_of_children() {
        let (_storage, triangles) = sample_storage();
        let root = build_balanced(triangles).unwrap();
        if let TreeNode::Set(set) = root.as_ref() {
            let expected = set.left.weight() + set.right.weight();
            assert!(set.weight.equals_delta(&expected, 1e-4));
        }
    }

    #[test]
    fn picking_with_zero_integral_falls_back_to_uniform() {
        let (_storage, triangles) = sample_storage();
        let root = build_balanced(triangles).unwrap();
        let zero_coeffs = SteerableValue::ZERO;
        let (triangle, residual) = pick(&root, &zero_coeffs, 0.42);
        assert!(residual >= 0.0 && residual <= 1.0);
        let _ = triangle;
    }
}
