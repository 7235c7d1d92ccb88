//! Pole detection and protection.
//!
//! A pole is a parameter value where a surface collapses to a point or a
//! line (cone apex, sphere pole, generatrix touching the axis). Derivatives
//! across a pole are meaningless, so parameters arriving from outside the
//! domain are stopped at the pole instead of crossing it.

use gkern_math::ParamInterval;
use smallvec::SmallVec;
use tracing::trace;

/// Pole parameter values of one surface direction.
pub type Poles = SmallVec<[f64; 2]>;

/// Outcome of a pole check.
///
/// The adjustment is part of the type so callers cannot silently drop it.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoleCheck {
    /// The parameter needs no protection.
    Unchanged(f64),
    /// The parameter crossed a pole and was moved onto it.
    Adjusted(f64),
}

impl PoleCheck {
    /// The (possibly adjusted) parameter.
    pub fn value(self) -> f64 {
        match self {
            Self::Unchanged(t) | Self::Adjusted(t) => t,
        }
    }

    /// Whether the parameter was moved.
    pub fn was_adjusted(self) -> bool {
        matches!(self, Self::Adjusted(_))
    }
}

/// Stop `param` at `pole` if reaching it from the domain requires crossing
/// the pole.
///
/// Parameters inside `domain` are never touched, nor are parameters outside
/// it that do not lie beyond a pole sitting at or past the nearer bound.
pub fn check_pole_param(param: f64, domain: &ParamInterval, pole: f64) -> PoleCheck {
    if domain.contains(param, 0.0) || !pole.is_finite() {
        return PoleCheck::Unchanged(param);
    }
    let crossed = (pole <= domain.min && param < pole) || (pole >= domain.max && param > pole);
    if crossed {
        trace!(param, pole, "parameter stopped at pole");
        PoleCheck::Adjusted(pole)
    } else {
        PoleCheck::Unchanged(param)
    }
}

/// Run [`check_pole_param`] against each pole, stopping at the first
/// adjustment.
pub fn check_poles(param: f64, domain: &ParamInterval, poles: &[f64]) -> PoleCheck {
    for &pole in poles {
        let check = check_pole_param(param, domain, pole);
        if check.was_adjusted() {
            return check;
        }
    }
    PoleCheck::Unchanged(param)
}

/// Whether `pole` lies strictly inside `(a, b)` with margin `tol` on each
/// side. The bounds may come in either order.
pub fn is_pole_inside(a: f64, b: f64, pole: f64, tol: f64) -> bool {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    pole > lo + tol && pole < hi - tol
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> ParamInterval {
        ParamInterval::unit()
    }

    #[test]
    fn test_inside_domain_untouched() {
        assert_eq!(check_pole_param(0.3, &unit(), -0.5), PoleCheck::Unchanged(0.3));
        assert_eq!(check_pole_param(0.0, &unit(), 0.0), PoleCheck::Unchanged(0.0));
    }

    #[test]
    fn test_crossing_below_min() {
        let c = check_pole_param(-0.7, &unit(), -0.5);
        assert_eq!(c, PoleCheck::Adjusted(-0.5));
        assert!(c.was_adjusted());
        // outside the domain but short of the pole
        assert_eq!(check_pole_param(-0.2, &unit(), -0.5), PoleCheck::Unchanged(-0.2));
        // pole below, parameter above the domain
        assert_eq!(check_pole_param(3.0, &unit(), -0.5), PoleCheck::Unchanged(3.0));
    }

    #[test]
    fn test_crossing_above_max() {
        assert_eq!(check_pole_param(2.5, &unit(), 2.0), PoleCheck::Adjusted(2.0));
        assert_eq!(check_pole_param(1.5, &unit(), 2.0), PoleCheck::Unchanged(1.5));
        // pole exactly on the bound
        assert_eq!(check_pole_param(1.1, &unit(), 1.0), PoleCheck::Adjusted(1.0));
    }

    #[test]
    fn test_check_poles_first_hit() {
        let d = ParamInterval::bounded(-1.0, 1.0).unwrap();
        let poles = [-1.0, 1.0];
        assert_eq!(check_poles(-3.0, &d, &poles).value(), -1.0);
        assert_eq!(check_poles(3.0, &d, &poles).value(), 1.0);
        assert!(!check_poles(0.5, &d, &poles).was_adjusted());
        assert!(!check_poles(5.0, &d, &[]).was_adjusted());
    }

    #[test]
    fn test_is_pole_inside() {
        assert!(is_pole_inside(-1.0, 1.0, -0.5, 1e-9));
        assert!(is_pole_inside(1.0, -1.0, -0.5, 1e-9));
        assert!(!is_pole_inside(-1.0, 1.0, -1.0, 1e-9));
        assert!(!is_pole_inside(-1.0, 1.0, 0.99, 0.1));
        assert!(!is_pole_inside(0.0, 1.0, -0.5, 0.0));
    }
}
