mod core;
mod diagnostics;
mod klein;
mod mesh;
mod metrics;
mod surface;
mod tessellation;

pub use core::{BBox, Point3, Tolerance, Vec3};
pub use diagnostics::GeomMeshDiagnostics;
pub use klein::KleinFigure;
pub use mesh::{GeomContext, GeomMesh, MeshBuffers};
pub use metrics::{GeomMetrics, GeomTimingReport, TimingBucket};
pub use surface::{ParametricSurface, TangentPair, wrap_unit};
pub use tessellation::{
    TessellationError, TessellationOptions, tessellate, tessellate_with_context,
    triangulate_grid,
};
