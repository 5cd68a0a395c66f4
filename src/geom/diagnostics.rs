//! Mesh diagnostics for the tessellator.
//!
//! Diagnostics are returned alongside every mesh and record what the
//! tessellator had to repair locally, most notably normals that could not be
//! derived from the tangents at a sample (parametric poles).
//!
//! # Example
//!
//! ```ignore
//! use klein_engine::geom::{KleinFigure, TessellationOptions, tessellate};
//!
//! let (mesh, diagnostics) = tessellate(&KleinFigure, TessellationOptions::default())?;
//! if diagnostics.has_warnings() {
//!     for warning in &diagnostics.warnings {
//!         log::warn!("{warning}");
//!     }
//! }
//! ```

use std::fmt;

/// Diagnostics collected while building a mesh.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GeomMeshDiagnostics {
    /// Total number of vertices in the final mesh.
    pub vertex_count: usize,

    /// Total number of triangles in the final mesh.
    pub triangle_count: usize,

    /// Samples whose tangent cross product was (nearly) zero.
    ///
    /// Each of these received a substituted normal instead of the analytic one.
    pub degenerate_normal_count: usize,

    /// Degenerate samples with no usable grid neighbour.
    ///
    /// These fell back to the fixed `+Z` direction.
    pub unresolved_normal_count: usize,

    /// Optional timing breakdown by operation category.
    ///
    /// Only populated when the `mesh_metrics` feature is enabled
    /// and the target is not WASM.
    pub timing: Option<super::metrics::GeomTimingReport>,

    /// Human-readable warnings about repairs performed.
    pub warnings: Vec<String>,
}

impl GeomMeshDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if every normal came straight from the surface tangents.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.degenerate_normal_count == 0 && self.warnings.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// One-line summary for logs and the CLI.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!(
            "vertices={} triangles={} degenerate_normals={}",
            self.vertex_count, self.triangle_count, self.degenerate_normal_count
        );
        if self.unresolved_normal_count > 0 {
            out.push_str(&format!(" unresolved_normals={}", self.unresolved_normal_count));
        }
        if let Some(timing) = self.timing.as_ref() {
            out.push_str(&format!(" time_ms={:.3}", timing.total_ms()));
        }
        out
    }
}

impl fmt::Display for GeomMeshDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())?;
        for warning in &self.warnings {
            write!(f, "\n  warning: {warning}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_clean() {
        let diag = GeomMeshDiagnostics::new();
        assert!(diag.is_clean());
        assert!(!diag.has_warnings());
    }

    #[test]
    fn summary_mentions_unresolved_only_when_present() {
        let mut diag = GeomMeshDiagnostics {
            vertex_count: 4,
            triangle_count: 2,
            degenerate_normal_count: 1,
            ..GeomMeshDiagnostics::default()
        };
        assert_eq!(diag.summary(), "vertices=4 triangles=2 degenerate_normals=1");
        assert!(!diag.is_clean());

        diag.unresolved_normal_count = 1;
        diag.add_warning("normal fallback at (0, 0)");
        assert!(diag.summary().ends_with("unresolved_normals=1"));
        assert!(diag.to_string().contains("warning: normal fallback"));
    }
}
