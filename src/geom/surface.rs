use super::core::{Point3, Tolerance, Vec3};

/// Maps a parameter into the unit domain.
///
/// Values inside the closed square `[0, 1]` are returned unchanged so the
/// far edge `t = 1` keeps its own branch; anything else is reduced modulo 1.
#[must_use]
pub fn wrap_unit(t: f64) -> f64 {
    if (0.0..=1.0).contains(&t) {
        t
    } else {
        t.rem_euclid(1.0)
    }
}

/// The two partial derivatives of a surface at one parameter sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentPair {
    /// ∂P/∂u
    pub du: Vec3,
    /// ∂P/∂v
    pub dv: Vec3,
}

impl TangentPair {
    #[must_use]
    pub const fn new(du: Vec3, dv: Vec3) -> Self {
        Self { du, dv }
    }

    /// Unnormalized surface normal `dv × du`.
    ///
    /// The operand order fixes the outward orientation the tessellator's
    /// winding is built around.
    #[must_use]
    pub const fn normal(self) -> Vec3 {
        self.dv.cross(self.du)
    }
}

/// A closed-form mapping from the unit parameter square to 3D space.
///
/// Implementors only have to provide [`position`](Self::position); the default
/// [`tangents`](Self::tangents) falls back to central differences. Evaluation is
/// expected to be pure so grid rows can be sampled on separate threads.
pub trait ParametricSurface {
    fn position(&self, u: f64, v: f64) -> Point3;

    /// Partial derivatives at `(u, v)`.
    ///
    /// Closed-form surfaces should override this with their analytic
    /// derivatives. The default differentiates `position` numerically with
    /// respect to the unit parameters.
    #[must_use]
    fn tangents(&self, u: f64, v: f64) -> TangentPair {
        let h = Tolerance::DERIVATIVE.relative_to(1.0);
        let du = self
            .position(u + h, v)
            .sub_point(self.position(u - h, v))
            .mul_scalar(0.5 / h);
        let dv = self
            .position(u, v + h)
            .sub_point(self.position(u, v - h))
            .mul_scalar(0.5 / h);
        TangentPair::new(du, dv)
    }

    /// Unnormalized normal at `(u, v)`. May be zero at parametric poles.
    #[must_use]
    fn normal(&self, u: f64, v: f64) -> Vec3 {
        self.tangents(u, v).normal()
    }

    /// Unit normal, or `None` where the tangents are (nearly) parallel.
    #[must_use]
    fn unit_normal(&self, u: f64, v: f64) -> Option<Vec3> {
        let n = self.normal(u, v);
        if Tolerance::ZERO_LENGTH.is_zero_vec3(n) {
            return None;
        }
        n.normalized()
    }
}

impl<S: ParametricSurface + ?Sized> ParametricSurface for &S {
    fn position(&self, u: f64, v: f64) -> Point3 {
        (**self).position(u, v)
    }

    fn tangents(&self, u: f64, v: f64) -> TangentPair {
        (**self).tangents(u, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Paraboloid;

    impl ParametricSurface for Paraboloid {
        fn position(&self, u: f64, v: f64) -> Point3 {
            Point3::new(u, v, u * u + v * v)
        }
    }

    #[test]
    fn wrap_unit_keeps_closed_domain() {
        assert_eq!(wrap_unit(0.0), 0.0);
        assert_eq!(wrap_unit(0.25), 0.25);
        assert_eq!(wrap_unit(1.0), 1.0);
        assert!((wrap_unit(1.25) - 0.25).abs() < 1e-12);
        assert!((wrap_unit(-0.25) - 0.75).abs() < 1e-12);
        assert!((wrap_unit(7.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn default_tangents_use_central_differences() {
        let t = Paraboloid.tangents(0.5, -1.0);
        assert!((t.du.x - 1.0).abs() < 1e-6);
        assert!((t.du.z - 1.0).abs() < 1e-6);
        assert!((t.dv.y - 1.0).abs() < 1e-6);
        assert!((t.dv.z + 2.0).abs() < 1e-6);
    }

    #[test]
    fn normal_is_dv_cross_du() {
        let pair = TangentPair::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(pair.normal(), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn unit_normal_rejects_parallel_tangents() {
        struct Line;
        impl ParametricSurface for Line {
            fn position(&self, u: f64, _v: f64) -> Point3 {
                Point3::new(u, 0.0, 0.0)
            }
        }

        assert!(Line.unit_normal(0.3, 0.3).is_none());
        let n = Paraboloid.unit_normal(0.0, 0.0).unwrap();
        assert!((n.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn references_forward_to_the_surface() {
        let surface = &Paraboloid;
        assert_eq!(surface.position(1.0, 2.0), Point3::new(1.0, 2.0, 5.0));
    }
}
