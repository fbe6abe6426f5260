//! Collision shape preparation: triangle mesh cooking and height-field samples.

use nalgebra::{DMatrix, Point3, Vector3};
use parry3d::shape::TriMesh;

use crate::error::{PhysicsError, Result};

/// A vertex record that carries a position.
///
/// Implement this for custom vertex types instead of relying on their memory
/// layout.
pub trait VertexPosition {
    /// Position of the vertex.
    fn position(&self) -> Point3<f32>;
}

impl VertexPosition for [f32; 3] {
    fn position(&self) -> Point3<f32> {
        Point3::new(self[0], self[1], self[2])
    }
}

impl VertexPosition for (f32, f32, f32) {
    fn position(&self) -> Point3<f32> {
        Point3::new(self.0, self.1, self.2)
    }
}

impl VertexPosition for Point3<f32> {
    fn position(&self) -> Point3<f32> {
        *self
    }
}

impl VertexPosition for Vector3<f32> {
    fn position(&self) -> Point3<f32> {
        Point3::from(*self)
    }
}

/// A cooked triangle mesh, ready to be instanced as static geometry.
#[derive(Debug, Clone)]
pub struct CookedMesh {
    trimesh: TriMesh,
}

impl CookedMesh {
    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.trimesh.indices().len()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.trimesh.vertices().len()
    }

    /// The mesh scaled per axis.
    pub(crate) fn scaled(&self, scale: &Vector3<f32>) -> TriMesh {
        self.trimesh.clone().scaled(scale)
    }
}

/// Validate mesh input and cook it into a [`CookedMesh`].
///
/// The index count must be a multiple of 3 and every index must address a
/// vertex; nothing is cooked otherwise.
pub fn cook_triangle_mesh<V, I>(vertices: &[V], indices: &[I]) -> Result<CookedMesh>
where
    V: VertexPosition,
    I: Copy + Into<u32>,
{
    if indices.len() % 3 != 0 {
        return Err(PhysicsError::InvalidMesh(format!(
            "index count must be a multiple of 3, got {}",
            indices.len()
        )));
    }
    if indices.is_empty() {
        return Err(PhysicsError::InvalidMesh("no triangles in mesh".into()));
    }
    if vertices.is_empty() {
        return Err(PhysicsError::InvalidMesh("no vertices in mesh".into()));
    }

    let vertex_count = vertices.len();
    let triangles: Vec<[u32; 3]> = indices
        .chunks_exact(3)
        .map(|tri| [tri[0].into(), tri[1].into(), tri[2].into()])
        .collect();

    if let Some(bad) = triangles
        .iter()
        .flatten()
        .find(|&&i| i as usize >= vertex_count)
    {
        return Err(PhysicsError::InvalidMesh(format!(
            "index {} out of range for {} vertices",
            bad, vertex_count
        )));
    }

    let points: Vec<Point3<f32>> = vertices.iter().map(VertexPosition::position).collect();
    if points.iter().any(|p| !p.coords.iter().all(|c| c.is_finite())) {
        return Err(PhysicsError::InvalidMesh("vertex positions must be finite".into()));
    }

    match TriMesh::new(points, triangles) {
        Ok(trimesh) => Ok(CookedMesh { trimesh }),
        Err(e) => Err(PhysicsError::InvalidMesh(format!(
            "failed to cook trimesh: {:?}",
            e
        ))),
    }
}

/// Convert a row-major normalized height-map into a height matrix.
///
/// Sample `(x, y)` is `samples[y * width + x]` and lands at matrix entry
/// `(y, x)`; Parry maps matrix columns to X and rows to Z. Values in `[0, 1]`
/// map linearly onto `[min_z, max_z]`.
pub fn terrain_heights(
    width: usize,
    height: usize,
    min_z: f32,
    max_z: f32,
    samples: &[f32],
) -> Result<DMatrix<f32>> {
    if width < 2 || height < 2 {
        return Err(PhysicsError::InvalidTerrain(format!(
            "height-field needs at least 2x2 samples, got {}x{}",
            width, height
        )));
    }
    let expected = width
        .checked_mul(height)
        .ok_or_else(|| PhysicsError::InvalidTerrain("sample grid too large".into()))?;
    if samples.len() != expected {
        return Err(PhysicsError::InvalidTerrain(format!(
            "expected {} samples for {}x{}, got {}",
            expected,
            width,
            height,
            samples.len()
        )));
    }
    if !min_z.is_finite() || !max_z.is_finite() {
        return Err(PhysicsError::InvalidTerrain(
            "height range must be finite".into(),
        ));
    }
    if let Some(bad) = samples.iter().find(|s| !s.is_finite()) {
        return Err(PhysicsError::InvalidTerrain(format!(
            "non-finite height sample {}",
            bad
        )));
    }

    let range = max_z - min_z;
    Ok(DMatrix::from_fn(height, width, |row, col| {
        range * samples[row * width + col] + min_z
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_quad() -> (Vec<[f32; 3]>, Vec<u32>) {
        (
            vec![
                [-1.0, 0.0, -1.0],
                [-1.0, 0.0, 1.0],
                [1.0, 0.0, -1.0],
                [1.0, 0.0, 1.0],
            ],
            vec![3, 2, 0, 3, 0, 1],
        )
    }

    #[test]
    fn test_cook_quad() {
        let (vertices, indices) = unit_quad();
        let mesh = cook_triangle_mesh(&vertices, &indices).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn test_index_count_not_multiple_of_three() {
        let (vertices, _) = unit_quad();
        let err = cook_triangle_mesh(&vertices, &[0u32, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidMesh(_)));
    }

    #[test]
    fn test_index_out_of_range() {
        let (vertices, _) = unit_quad();
        let err = cook_triangle_mesh(&vertices, &[0u16, 1, 4]).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_custom_vertex_type() {
        struct Vertex {
            uv: [f32; 2],
            pos: [f32; 3],
        }
        impl VertexPosition for Vertex {
            fn position(&self) -> Point3<f32> {
                self.pos.position()
            }
        }

        let vertices: Vec<Vertex> = unit_quad()
            .0
            .into_iter()
            .map(|pos| Vertex { uv: [0.0; 2], pos })
            .collect();
        assert_eq!(vertices[0].uv, [0.0, 0.0]);
        let mesh = cook_triangle_mesh(&vertices, &[0u8, 1, 2]).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn test_scaled_mesh() {
        let (vertices, indices) = unit_quad();
        let mesh = cook_triangle_mesh(&vertices, &indices).unwrap();
        let scaled = mesh.scaled(&Vector3::new(10.0, 1.0, 5.0));
        let max_x = scaled.vertices().iter().map(|p| p.x).fold(f32::MIN, f32::max);
        let max_z = scaled.vertices().iter().map(|p| p.z).fold(f32::MIN, f32::max);
        assert_relative_eq!(max_x, 10.0);
        assert_relative_eq!(max_z, 5.0);
    }

    #[test]
    fn test_constant_heightmap() {
        let samples = vec![0.25; 4 * 3];
        let heights = terrain_heights(4, 3, -2.0, 6.0, &samples).unwrap();
        assert_eq!(heights.nrows(), 3);
        assert_eq!(heights.ncols(), 4);
        for h in heights.iter() {
            assert_relative_eq!(*h, (6.0 - -2.0) * 0.25 + -2.0);
        }
    }

    #[test]
    fn test_heightmap_layout() {
        // 3 columns (x), 2 rows (y), each sample tagged by position.
        let samples = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5];
        let heights = terrain_heights(3, 2, 0.0, 10.0, &samples).unwrap();
        assert_relative_eq!(heights[(0, 2)], 2.0, epsilon = 1e-5);
        assert_relative_eq!(heights[(1, 0)], 3.0, epsilon = 1e-5);
        assert_relative_eq!(heights[(1, 2)], 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_heightmap_size_mismatch() {
        let err = terrain_heights(4, 4, 0.0, 1.0, &[0.0; 15]).unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidTerrain(_)));
        assert!(terrain_heights(1, 4, 0.0, 1.0, &[0.0; 4]).is_err());
    }
}
