//! Approach geometry
//!
//! Both entities move along straight rays that meet at the convergence point,
//! so a signed distance per entity plus the fixed angle between the rays is
//! enough to recover their separation. Full positions are only needed for
//! display.

use glam::DVec3;

/// Separation between two points at signed distances `a` and `b` along rays
/// meeting at `angle_deg` (law of cosines)
#[inline]
pub fn separation(a: f64, b: f64, angle_deg: f64) -> f64 {
    let cos = angle_deg.to_radians().cos();
    // Rounding can push the radicand a hair below zero when the points coincide
    (a * a + b * b - 2.0 * a * b * cos).max(0.0).sqrt()
}

/// Display positions (subject, target) for the current distances.
///
/// The target travels along the x axis toward the origin; the subject's ray
/// is rotated by the approach angle in the ground (x/z) plane.
pub fn positions(
    subject_distance: f64,
    target_distance: f64,
    angle_deg: f64,
    height: f64,
) -> (DVec3, DVec3) {
    let angle = angle_deg.to_radians();
    let subject = DVec3::new(
        -angle.cos() * subject_distance,
        height,
        angle.sin() * subject_distance,
    );
    let target = DVec3::new(-target_distance, height, 0.0);
    (subject, target)
}
