//! Regular-grid tessellation of parametric surfaces.
//!
//! The unit parameter square is sampled on a `(slices + 1) × (stacks + 1)`
//! grid with `u_i = i / slices` and `v_j = j / stacks`. Each sample carries
//! its position, a unit normal derived from the surface tangents and a UV
//! coordinate scaled by the texture repeat factor. Every grid cell is split
//! into two triangles whose winding agrees with the `dv × du` normal.
//!
//! ```ignore
//! use klein_engine::geom::{KleinFigure, TessellationOptions, tessellate};
//!
//! let (mesh, diagnostics) = tessellate(&KleinFigure, TessellationOptions::new(15, 15))?;
//! assert_eq!(mesh.vertex_count(), 256);
//! assert_eq!(mesh.triangle_count(), 450);
//! ```
//!
//! # Degenerate normals
//!
//! Where the tangent cross product vanishes (a pole of the parameterization)
//! the normal is replaced by the normalized average of the valid normals of
//! the four grid neighbours. If none of them is usable either, `+Z` is used.
//! Both cases are counted in [`GeomMeshDiagnostics`] and never fail the call.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::core::{Point3, Tolerance, Vec3};
use super::diagnostics::GeomMeshDiagnostics;
use super::mesh::{GeomContext, GeomMesh};
use super::metrics::TimingBucket;
use super::surface::ParametricSurface;

/// Resolution and texture scaling for [`tessellate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TessellationOptions {
    /// Number of cells along `u`. Must be at least 1.
    pub slices: usize,
    /// Number of cells along `v`. Must be at least 1.
    pub stacks: usize,
    /// UVs span `[0, uv_repeat]` on both axes.
    pub uv_repeat: f64,
}

impl Default for TessellationOptions {
    fn default() -> Self {
        Self {
            slices: 15,
            stacks: 15,
            uv_repeat: 1.0,
        }
    }
}

impl TessellationOptions {
    #[must_use]
    pub const fn new(slices: usize, stacks: usize) -> Self {
        Self {
            slices,
            stacks,
            uv_repeat: 1.0,
        }
    }

    #[must_use]
    pub const fn with_uv_repeat(mut self, uv_repeat: f64) -> Self {
        self.uv_repeat = uv_repeat;
        self
    }

    /// Number of vertices the grid produces, or `None` on overflow.
    #[must_use]
    pub fn vertex_count(&self) -> Option<usize> {
        self.slices.checked_add(1)?.checked_mul(self.stacks.checked_add(1)?)
    }

    #[must_use]
    pub fn triangle_count(&self) -> Option<usize> {
        self.slices.checked_mul(self.stacks)?.checked_mul(2)
    }

    pub fn validate(&self) -> Result<(), TessellationError> {
        if self.slices < 1 {
            return Err(TessellationError::invalid("slices", "must be at least 1"));
        }
        if self.stacks < 1 {
            return Err(TessellationError::invalid("stacks", "must be at least 1"));
        }
        if !self.uv_repeat.is_finite() || self.uv_repeat <= 0.0 {
            return Err(TessellationError::invalid(
                "uv_repeat",
                format!("must be finite and > 0, got {}", self.uv_repeat),
            ));
        }
        let fits = self
            .vertex_count()
            .is_some_and(|count| u32::try_from(count).is_ok())
            && self.triangle_count().is_some();
        if !fits {
            return Err(TessellationError::invalid(
                "slices/stacks",
                format!(
                    "a {}x{} grid does not fit 32-bit indices",
                    self.slices, self.stacks
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TessellationError {
    #[error("invalid tessellation argument `{argument}`: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },
}

impl TessellationError {
    fn invalid(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }
}

/// Tessellates `surface` into a fresh mesh.
pub fn tessellate(
    surface: &(impl ParametricSurface + Sync),
    options: TessellationOptions,
) -> Result<(GeomMesh, GeomMeshDiagnostics), TessellationError> {
    let mut ctx = GeomContext::new();
    tessellate_with_context(surface, options, &mut ctx)
}

pub fn tessellate_with_context(
    surface: &(impl ParametricSurface + Sync),
    options: TessellationOptions,
    ctx: &mut GeomContext,
) -> Result<(GeomMesh, GeomMeshDiagnostics), TessellationError> {
    options.validate()?;
    ctx.metrics.begin();

    let TessellationOptions {
        slices,
        stacks,
        uv_repeat,
    } = options;
    let mut diagnostics = GeomMeshDiagnostics::new();

    let samples = ctx
        .metrics
        .time(TimingBucket::Sampling, || sample_grid(surface, slices, stacks));

    let (positions, raw_normals): (Vec<[f64; 3]>, Vec<Vec3>) = samples
        .into_iter()
        .map(|(p, n)| (p.to_array(), n))
        .unzip();

    let tolerance = ctx.tolerance;
    let normals = ctx.metrics.time(TimingBucket::Normals, || {
        resolve_normals(&raw_normals, slices, stacks, tolerance, &mut diagnostics)
    });

    let uvs = grid_uvs(slices, stacks, uv_repeat);
    let indices = ctx
        .metrics
        .time(TimingBucket::Triangulation, || triangulate_grid(slices, stacks));

    let mesh = GeomMesh::new(positions, normals, uvs, indices);

    ctx.metrics.time(TimingBucket::Diagnostics, || {
        diagnostics.vertex_count = mesh.vertex_count();
        diagnostics.triangle_count = mesh.triangle_count();
        if mesh.has_invalid_vertices() {
            diagnostics.add_warning("surface produced non-finite positions");
        }
    });
    diagnostics.timing = ctx.metrics.end();

    log::debug!("tessellated {slices}x{stacks} grid: {}", diagnostics.summary());

    Ok((mesh, diagnostics))
}

/// Evaluates position and unnormalized normal at every grid sample, row by row.
///
/// Rows are independent; with the `parallel` feature they are evaluated on
/// the rayon pool and concatenated in row order.
fn sample_grid(
    surface: &(impl ParametricSurface + Sync),
    slices: usize,
    stacks: usize,
) -> Vec<(Point3, Vec3)> {
    let row = |j: usize| -> Vec<(Point3, Vec3)> {
        let v = grid_param(j, stacks);
        (0..=slices)
            .map(|i| {
                let u = grid_param(i, slices);
                (surface.position(u, v), surface.normal(u, v))
            })
            .collect()
    };

    #[cfg(feature = "parallel")]
    let rows: Vec<Vec<(Point3, Vec3)>> = (0..=stacks).into_par_iter().map(row).collect();

    #[cfg(not(feature = "parallel"))]
    let rows: Vec<Vec<(Point3, Vec3)>> = (0..=stacks).map(row).collect();

    rows.into_iter().flatten().collect()
}

#[allow(clippy::cast_precision_loss)]
fn grid_param(index: usize, count: usize) -> f64 {
    index as f64 / count as f64
}

fn grid_uvs(slices: usize, stacks: usize, uv_repeat: f64) -> Vec<[f64; 2]> {
    let mut uvs = Vec::with_capacity((slices + 1) * (stacks + 1));
    for j in 0..=stacks {
        let v = grid_param(j, stacks) * uv_repeat;
        for i in 0..=slices {
            uvs.push([grid_param(i, slices) * uv_repeat, v]);
        }
    }
    uvs
}

/// Normalizes grid normals, substituting neighbour averages at degenerate samples.
fn resolve_normals(
    raw: &[Vec3],
    slices: usize,
    stacks: usize,
    tol: Tolerance,
    diagnostics: &mut GeomMeshDiagnostics,
) -> Vec<[f64; 3]> {
    let stride = slices + 1;
    let unit: Vec<Option<Vec3>> = raw
        .iter()
        .map(|&n| {
            if tol.is_zero_vec3(n) || !n.is_finite() {
                None
            } else {
                n.normalized()
            }
        })
        .collect();

    let mut normals = Vec::with_capacity(unit.len());
    for (index, normal) in unit.iter().enumerate() {
        if let Some(n) = normal {
            normals.push(n.to_array());
            continue;
        }

        diagnostics.degenerate_normal_count += 1;
        let (i, j) = (index % stride, index / stride);
        let mut neighbours = Vec::with_capacity(4);
        if i > 0 {
            neighbours.push(index - 1);
        }
        if i < slices {
            neighbours.push(index + 1);
        }
        if j > 0 {
            neighbours.push(index - stride);
        }
        if j < stacks {
            neighbours.push(index + stride);
        }

        let sum = neighbours
            .into_iter()
            .filter_map(|k| unit[k])
            .fold(Vec3::ZERO, |acc, n| acc + n);

        let fallback = if tol.is_zero_vec3(sum) {
            None
        } else {
            sum.normalized()
        };
        let n = fallback.unwrap_or_else(|| {
            diagnostics.unresolved_normal_count += 1;
            Vec3::Z
        });
        normals.push(n.to_array());
    }

    if diagnostics.degenerate_normal_count > 0 {
        log::warn!(
            "substituted {} degenerate normals ({} without usable neighbours)",
            diagnostics.degenerate_normal_count,
            diagnostics.unresolved_normal_count
        );
        let averaged = diagnostics.degenerate_normal_count - diagnostics.unresolved_normal_count;
        if averaged > 0 {
            diagnostics.add_warning(format!(
                "{averaged} degenerate normals replaced by neighbour averages"
            ));
        }
        if diagnostics.unresolved_normal_count > 0 {
            diagnostics.add_warning(format!(
                "{} degenerate normals fell back to +Z",
                diagnostics.unresolved_normal_count
            ));
        }
    }

    normals
}

/// Index buffer for a `slices × stacks` grid of cells.
///
/// Vertices are laid out row-major, `index = j * (slices + 1) + i`. For the
/// cell at `(i, j)` the triangles are `(i,j) (i,j+1) (i+1,j)` and
/// `(i,j+1) (i+1,j+1) (i+1,j)`, so the face normal follows `dv × du`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn triangulate_grid(slices: usize, stacks: usize) -> Vec<u32> {
    let stride = slices + 1;
    let mut indices = Vec::with_capacity(slices * stacks * 6);

    for j in 0..stacks {
        for i in 0..slices {
            let i0 = (j * stride + i) as u32;
            let i1 = (j * stride + i + 1) as u32;
            let i2 = ((j + 1) * stride + i) as u32;
            let i3 = ((j + 1) * stride + i + 1) as u32;

            indices.extend_from_slice(&[i0, i2, i1]);
            indices.extend_from_slice(&[i2, i3, i1]);
        }
    }

    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_to_reference_resolution() {
        let options = TessellationOptions::default();
        assert_eq!(options.slices, 15);
        assert_eq!(options.stacks, 15);
        assert_eq!(options.vertex_count(), Some(256));
        assert_eq!(options.triangle_count(), Some(450));
    }

    #[test]
    fn options_reject_zero_and_bad_repeat() {
        assert!(matches!(
            TessellationOptions::new(0, 4).validate(),
            Err(TessellationError::InvalidArgument { argument: "slices", .. })
        ));
        assert!(matches!(
            TessellationOptions::new(4, 0).validate(),
            Err(TessellationError::InvalidArgument { argument: "stacks", .. })
        ));
        for repeat in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(TessellationOptions::new(2, 2).with_uv_repeat(repeat).validate().is_err());
        }
        assert!(TessellationOptions::new(usize::MAX, 2).validate().is_err());
        assert!(TessellationOptions::new(70_000, 70_000).validate().is_err());
    }

    #[test]
    fn triangulate_single_cell() {
        // 2x2 vertices: 0 1 / 2 3
        assert_eq!(triangulate_grid(1, 1), vec![0, 2, 1, 2, 3, 1]);
    }

    #[test]
    fn triangulate_uses_row_major_stride() {
        let indices = triangulate_grid(3, 2);
        assert_eq!(indices.len(), 3 * 2 * 6);
        // cell (2, 1): base index 1 * 4 + 2
        let cell = &indices[(3 + 2) * 6..(3 + 2) * 6 + 6];
        assert_eq!(cell, &[6, 10, 7, 10, 11, 7]);
        assert!(indices.iter().all(|&i| i < 12));
    }

    #[test]
    fn uvs_scale_with_repeat() {
        let uvs = grid_uvs(2, 4, 3.0);
        assert_eq!(uvs.len(), 15);
        assert_eq!(uvs[0], [0.0, 0.0]);
        assert_eq!(uvs[2], [3.0, 0.0]);
        assert_eq!(uvs[14], [3.0, 3.0]);
        assert_eq!(uvs[3], [0.0, 0.75]);
    }

    #[test]
    fn resolve_normals_averages_valid_neighbours() {
        // 2x1 cells -> 3x2 vertices, middle of the bottom row degenerate.
        let raw = vec![
            Vec3::new(0.0, 0.0, 2.0),
            Vec3::ZERO,
            Vec3::new(0.0, 3.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let mut diag = GeomMeshDiagnostics::new();
        let normals = resolve_normals(&raw, 2, 1, Tolerance::ZERO_LENGTH, &mut diag);

        assert_eq!(diag.degenerate_normal_count, 1);
        assert_eq!(diag.unresolved_normal_count, 0);
        // neighbours: +Z, +Y, +Z
        let expected = Vec3::new(0.0, 1.0, 2.0).normalized().unwrap();
        let n = Vec3::new(normals[1][0], normals[1][1], normals[1][2]);
        assert!((n - expected).length() < 1e-12);
        assert_eq!(normals[2], [0.0, 1.0, 0.0]);
        assert_eq!(diag.warnings.len(), 1);
    }

    #[test]
    fn resolve_normals_falls_back_to_z_without_neighbours() {
        let raw = vec![Vec3::ZERO; 4];
        let mut diag = GeomMeshDiagnostics::new();
        let normals = resolve_normals(&raw, 1, 1, Tolerance::ZERO_LENGTH, &mut diag);

        assert!(normals.iter().all(|n| *n == [0.0, 0.0, 1.0]));
        assert_eq!(diag.degenerate_normal_count, 4);
        assert_eq!(diag.unresolved_normal_count, 4);
        assert_eq!(diag.warnings, vec!["4 degenerate normals fell back to +Z".to_string()]);
    }
}
