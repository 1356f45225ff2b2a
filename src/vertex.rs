//! Vertex storage (part of C5/C9): an append-only arena of triangulation
//! vertices addressed by 32-bit index, per the tagged-variant/arena redesign
//! in spec.md section 9 (replacing the teacher's reference-shared handles).

use glam::Vec3;

use crate::steerable::SteerableValue;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    pub dir: Vec3,
    pub weight: SteerableValue,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexIndex(pub u32);

/// Append-only arena of [`Vertex`] values. Owns every vertex produced during
/// triangulation; the tree built over it stores only indices.
#[derive(Default)]
pub struct VertexStorage {
    vertices: Vec<Vertex>,
}

impl VertexStorage {
    pub fn new() -> Self {
        Self { vertices: Vec::new() }
    }

    pub fn push(&mut self, vertex: Vertex) -> VertexIndex {
        let index = self.vertices.len() as u32;
        self.vertices.push(vertex);
        VertexIndex(index)
    }

    pub fn get(&self, index: VertexIndex) -> &Vertex {
        &self.vertices[index.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushed_vertices_are_addressable_by_returned_index() {
        let mut storage = VertexStorage::new();
        let a = storage.push(Vertex { dir: Vec3::X, weight: SteerableValue::ZERO });
        let b = storage.push(Vertex { dir: Vec3::Y, weight: SteerableValue::ZERO });
        assert_eq!(storage.get(a).dir, Vec3::X);
        assert_eq!(storage.get(b).dir, Vec3::Y);
        assert_eq!(storage.len(), 2);
    }
}
