//! Pose Projector.
//!
//! The physics simulator reports the vehicle's centre of mass; the traffic
//! simulator places vehicles by their front bumper.  The difference is
//! approximated by a constant lookahead along the heading, independent of the
//! actual vehicle length.

/// Offset `(x, y)` by `lookahead` along `heading_rad` (counter-clockwise from
/// +x).
pub fn project(x: f64, y: f64, heading_rad: f64, lookahead: f64) -> (f64, f64) {
    let (sin, cos) = heading_rad.sin_cos();
    (x + lookahead * cos, y + lookahead * sin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    const TOL: f64 = 1e-9;

    #[test]
    fn heading_zero_moves_along_x() {
        let (x, y) = project(10.0, 5.0, 0.0, 2.0);
        assert!((x - 12.0).abs() < TOL);
        assert!((y - 5.0).abs() < TOL);
    }

    #[test]
    fn heading_ninety_moves_along_y() {
        let (x, y) = project(10.0, 5.0, FRAC_PI_2, 2.0);
        assert!((x - 10.0).abs() < TOL);
        assert!((y - 7.0).abs() < TOL);
    }

    #[test]
    fn heading_one_eighty_moves_backwards() {
        let (x, y) = project(10.0, 5.0, PI, 2.0);
        assert!((x - 8.0).abs() < TOL);
        assert!((y - 5.0).abs() < TOL);
    }

    #[test]
    fn zero_lookahead_is_identity() {
        assert_eq!(project(-3.5, 4.25, 1.1, 0.0), (-3.5, 4.25));
    }
}
