use serde::Serialize;

use super::core::{BBox, Point3, Tolerance};
use super::metrics::GeomMetrics;

/// Indexed triangle mesh produced by the tessellator.
///
/// All per-vertex buffers have the same length; `indices` is a triangle list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeomMesh {
    pub positions: Vec<[f64; 3]>,
    /// Unit normals, one per vertex.
    pub normals: Vec<[f64; 3]>,
    pub uvs: Vec<[f64; 2]>,
    pub indices: Vec<u32>,
}

impl GeomMesh {
    #[must_use]
    pub fn new(
        positions: Vec<[f64; 3]>,
        normals: Vec<[f64; 3]>,
        uvs: Vec<[f64; 2]>,
        indices: Vec<u32>,
    ) -> Self {
        Self {
            positions,
            normals,
            uvs,
            indices,
        }
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Iterates triangles as index triples.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    #[must_use]
    pub fn position(&self, index: u32) -> Point3 {
        Point3::from_array(self.positions[index as usize])
    }

    /// Returns true if any vertex position contains NaN or Inf values.
    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.positions
            .iter()
            .any(|p| !p[0].is_finite() || !p[1].is_finite() || !p[2].is_finite())
    }

    /// Returns true if all vertex indices are within bounds.
    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = self.positions.len();
        self.indices.iter().all(|&i| (i as usize) < n)
    }

    #[must_use]
    pub fn has_valid_attribute_lengths(&self) -> bool {
        let n = self.positions.len();
        self.normals.len() == n && self.uvs.len() == n
    }

    /// Returns true if every normal is finite and unit length within `tol`.
    #[must_use]
    pub fn has_unit_normals(&self, tol: Tolerance) -> bool {
        self.normals.iter().all(|n| {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            len.is_finite() && (len - 1.0).abs() <= tol.eps
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err("mesh indices are not a triangle list (len % 3 != 0)".to_string());
        }
        if self.has_invalid_vertices() {
            return Err("mesh has invalid vertex coordinates (NaN/Inf)".to_string());
        }
        if !self.has_valid_indices() {
            return Err("mesh has out-of-bounds vertex indices".to_string());
        }
        if !self.has_valid_attribute_lengths() {
            return Err("mesh attribute buffers do not match vertex count".to_string());
        }
        if !self.has_unit_normals(Tolerance::new(1e-6)) {
            return Err("mesh has non-unit normals".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn bounds(&self) -> Option<BBox> {
        BBox::from_points(self.positions.iter().copied().map(Point3::from_array))
    }

    /// Position buffer as a flat slice: `[x0, y0, z0, x1, y1, z1, ...]`.
    #[must_use]
    pub fn positions_flat(&self) -> &[f64] {
        self.positions.as_flattened()
    }

    #[must_use]
    pub fn normals_flat(&self) -> &[f64] {
        self.normals.as_flattened()
    }

    #[must_use]
    pub fn uvs_flat(&self) -> &[f64] {
        self.uvs.as_flattened()
    }

    /// Packs the mesh into single-precision buffers ready for GPU upload.
    #[must_use]
    pub fn to_buffers(&self) -> MeshBuffers {
        MeshBuffers {
            positions: to_f32(self.positions_flat()),
            normals: to_f32(self.normals_flat()),
            uvs: to_f32(self.uvs_flat()),
            indices: self.indices.clone(),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|&v| v as f32).collect()
}

/// Flat vertex/index buffers handed to the rendering harness.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshBuffers {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
}

#[derive(Debug)]
pub struct GeomContext {
    pub tolerance: Tolerance,
    pub metrics: GeomMetrics,
}

impl GeomContext {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tolerance: Tolerance::ZERO_LENGTH,
            metrics: GeomMetrics::default(),
        }
    }
}

impl Default for GeomContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad() -> GeomMesh {
        GeomMesh::new(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
            vec![[0.0, 0.0, 1.0]; 4],
            vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
            vec![0, 1, 2, 2, 1, 3],
        )
    }

    #[test]
    fn quad_validates_and_flattens() {
        let mesh = unit_quad();
        mesh.validate().expect("valid quad");
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.positions_flat().len(), 12);
        assert_eq!(mesh.uvs_flat()[2..4], [1.0, 0.0]);
        assert_eq!(mesh.triangles().nth(1), Some([2, 1, 3]));
    }

    #[test]
    fn validate_rejects_bad_buffers() {
        let mut mesh = unit_quad();
        mesh.indices.push(0);
        assert!(mesh.validate().is_err());

        let mut mesh = unit_quad();
        mesh.indices[5] = 4;
        assert!(mesh.validate().is_err());

        let mut mesh = unit_quad();
        mesh.uvs.pop();
        assert!(mesh.validate().is_err());

        let mut mesh = unit_quad();
        mesh.normals[0] = [0.0, 0.0, 2.0];
        assert!(mesh.validate().is_err());

        let mut mesh = unit_quad();
        mesh.positions[3][1] = f64::NAN;
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn buffers_are_single_precision_copies() {
        let buffers = unit_quad().to_buffers();
        assert_eq!(buffers.positions.len(), 12);
        assert_eq!(buffers.normals[2], 1.0_f32);
        assert_eq!(buffers.uvs.len(), 8);
        assert_eq!(buffers.indices, vec![0, 1, 2, 2, 1, 3]);
    }

    #[test]
    fn bounds_cover_all_positions() {
        let bounds = unit_quad().bounds().unwrap();
        assert_eq!(bounds.min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(bounds.max, Point3::new(1.0, 1.0, 0.0));
        assert!(GeomMesh::default().bounds().is_none());
    }
}
