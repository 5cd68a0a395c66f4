//! The Klein figure: a self-intersecting, bottle-like closed surface.
//!
//! Both parameters are scaled by `2π` into angles `a` (around the figure) and
//! `b` (around the tube). The shape is piecewise in `a`: the first half is a
//! tube swept around a twisted centreline, the second half is the handle whose
//! cross-section stays horizontal. The two halves meet exactly at `a = π`.
//! The tube radius is `r(a) = 2 − cos a` on both halves.

use std::f64::consts::{PI, TAU};

use super::core::{Point3, Vec3};
use super::surface::{ParametricSurface, TangentPair, wrap_unit};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KleinFigure;

impl KleinFigure {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parameter → angle pair `(a, b)`.
    fn angles(u: f64, v: f64) -> (f64, f64) {
        (TAU * wrap_unit(u), TAU * v)
    }
}

impl ParametricSurface for KleinFigure {
    /// Periodic in `v` everywhere and in `u` everywhere except at exactly
    /// `u = 1`, which is evaluated at `a = 2π` on the handle branch and lands
    /// on `P(0, 1/2 - v)`. Whole numbers other than 1 wrap to `u = 0`.
    fn position(&self, u: f64, v: f64) -> Point3 {
        let (a, b) = Self::angles(u, v);
        let (sin_a, cos_a) = a.sin_cos();
        let (sin_b, cos_b) = b.sin_cos();
        let r = 2.0 - cos_a;
        let spine = 3.0 * cos_a * (1.0 + sin_a);

        let y = -r * sin_b;
        if a < PI {
            Point3::new(
                spine + r * cos_a * cos_b,
                y,
                -8.0 * sin_a - r * sin_a * cos_b,
            )
        } else {
            Point3::new(spine + r * (b + PI).cos(), y, -8.0 * sin_a)
        }
    }

    /// Analytic partials with respect to the angles `a` and `b`.
    ///
    /// Multiply by `2π` to get derivatives with respect to the unit
    /// parameters; the normal direction is the same either way.
    fn tangents(&self, u: f64, v: f64) -> TangentPair {
        let (a, b) = Self::angles(u, v);
        let (sin_a, cos_a) = a.sin_cos();
        let (sin_b, cos_b) = b.sin_cos();
        let r = 2.0 - cos_a;
        let dr = sin_a;
        let dspine = -3.0 * sin_a + 3.0 * (2.0 * a).cos();

        let dy_da = -dr * sin_b;
        let dy_db = -r * cos_b;

        if a < PI {
            let du = Vec3::new(
                dspine + (dr * cos_a - r * sin_a) * cos_b,
                dy_da,
                -8.0 * cos_a - (dr * sin_a + r * cos_a) * cos_b,
            );
            let dv = Vec3::new(-r * cos_a * sin_b, dy_db, r * sin_a * sin_b);
            TangentPair::new(du, dv)
        } else {
            let du = Vec3::new(dspine - dr * cos_b, dy_da, -8.0 * cos_a);
            let dv = Vec3::new(r * sin_b, dy_db, 0.0);
            TangentPair::new(du, dv)
        }
    }
}
