use glam::{Mat4, Vec3};

use crate::camera::Frustum;

/// Length of one full turn, in milliseconds.
pub const ROTATION_PERIOD_MS: u64 = 4000;

/// 360 degrees spread over one period: 0.09 degrees per millisecond.
pub const DEGREES_PER_MS: f32 = 360.0 / ROTATION_PERIOD_MS as f32;

/// Shapes spin around the axis pointing into the screen.
pub const ROTATION_AXIS: Vec3 = Vec3::NEG_Z;

pub const EYE: Vec3 = Vec3::new(0.0, 0.0, -3.0);
pub const LOOK_TARGET: Vec3 = Vec3::ZERO;
pub const UP: Vec3 = Vec3::Y;

/// Saw-tooth rotation angle in `[0, 360)` degrees.
pub fn rotation_angle_degrees(elapsed_ms: u64) -> f32 {
    (elapsed_ms % ROTATION_PERIOD_MS) as f32 * DEGREES_PER_MS
}

/// Builds the rotation about [`ROTATION_AXIS`] for the given elapsed time.
pub fn rotation_matrix(elapsed_ms: u64) -> Mat4 {
    Mat4::from_axis_angle(ROTATION_AXIS, rotation_angle_degrees(elapsed_ms).to_radians())
}

/// The fixed camera: eye on the -Z axis looking back at the origin.
pub fn view_matrix() -> Mat4 {
    Mat4::look_at_rh(EYE, LOOK_TARGET, UP)
}

/// `projection * view * model`.
///
/// Column vectors, so the right-most factor is applied to the vertex first.
/// Swapping any two factors gives a different (wrong) image.
pub fn compose(projection: Mat4, view: Mat4, model: Mat4) -> Mat4 {
    projection * view * model
}

/// Everything the composer derived for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTransform {
    pub angle_degrees: f32,
    pub rotation: Mat4,
    pub combined: Mat4,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum ComposerState {
    /// No surface size received yet, so there is no projection.
    Uninitialized,
    Ready { frustum: Frustum, projection: Mat4 },
}

/// Owns the long-lived matrices and produces the combined transform each frame.
#[derive(Clone, Debug)]
pub struct TransformComposer {
    state: ComposerState,
    view: Mat4,
    model: Mat4,
}

impl Default for TransformComposer {
    fn default() -> Self {
        Self {
            state: ComposerState::Uninitialized,
            view: view_matrix(),
            model: Mat4::IDENTITY,
        }
    }
}

impl TransformComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ComposerState::Ready { .. })
    }

    /// Handles a surface-size event. Moves the composer to `Ready` and
    /// replaces the projection on every later call.
    pub fn on_viewport(&mut self, width: u32, height: u32) -> Frustum {
        let frustum = Frustum::from_viewport(width, height);
        let projection = frustum.compute_projection_matrix();

        log::debug!(
            "viewport {}x{} -> aspect {:.3}, frustum x in [{:.3}, {:.3}]",
            width,
            height,
            frustum.aspect_ratio(),
            frustum.left,
            frustum.right
        );

        self.state = ComposerState::Ready {
            frustum,
            projection,
        };
        frustum
    }

    /// Forgets the projection. Called when a new surface replaces the old
    /// one, whose size no longer applies.
    pub fn reset(&mut self) {
        self.state = ComposerState::Uninitialized;
    }

    pub fn frustum(&self) -> Option<Frustum> {
        match self.state {
            ComposerState::Ready { frustum, .. } => Some(frustum),
            ComposerState::Uninitialized => None,
        }
    }

    pub fn projection(&self) -> Option<Mat4> {
        match self.state {
            ComposerState::Ready { projection, .. } => Some(projection),
            ComposerState::Uninitialized => None,
        }
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    /// Returns `None` until the first [`Self::on_viewport`].
    pub fn compose(&self, elapsed_ms: u64) -> Option<FrameTransform> {
        let projection = self.projection()?;

        let angle_degrees = rotation_angle_degrees(elapsed_ms);
        let rotation = rotation_matrix(elapsed_ms);
        let combined = compose(projection, self.view, self.model * rotation);

        Some(FrameTransform {
            angle_degrees,
            rotation,
            combined,
        })
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;

    #[test]
    fn angle_is_periodic() {
        for t in [0_u64, 1, 999, 2000, 3999, 12_345, 987_654_321] {
            assert_eq!(rotation_angle_degrees(t), rotation_angle_degrees(t % 4000));
            assert_eq!(
                rotation_angle_degrees(t),
                rotation_angle_degrees(t + 3 * ROTATION_PERIOD_MS)
            );
        }
    }

    #[test]
    fn angle_stays_in_range() {
        for t in (0..20_000_u64).step_by(7) {
            let angle = rotation_angle_degrees(t);
            assert!((0.0..360.0).contains(&angle), "t={t} angle={angle}");
        }
    }

    #[test]
    fn angle_is_continuous_at_wrap() {
        assert_eq!(rotation_angle_degrees(0), 0.0);
        assert_eq!(rotation_angle_degrees(ROTATION_PERIOD_MS), 0.0);

        let before_wrap = rotation_angle_degrees(ROTATION_PERIOD_MS - 1);
        assert!((360.0 - before_wrap) <= DEGREES_PER_MS + 1e-4);

        // As matrices, one millisecond either side of the wrap is one small step.
        let before = rotation_matrix(ROTATION_PERIOD_MS - 1);
        let after = rotation_matrix(ROTATION_PERIOD_MS);
        assert!(before.abs_diff_eq(after, 2e-3));
    }

    #[test]
    fn half_period_is_half_turn() {
        assert!((rotation_angle_degrees(2000) - 180.0).abs() < 1e-4);
        assert!((rotation_angle_degrees(1000) - 90.0).abs() < 1e-4);
    }

    #[test]
    fn composition_order_matters() {
        let projection = Frustum::symmetric(1.6667).compute_projection_matrix();
        let view = view_matrix();
        let model = rotation_matrix(500);

        let canonical = compose(projection, view, model);
        let swapped = compose(view, projection, model);

        assert!(!canonical.abs_diff_eq(swapped, 1e-3));
        assert!(canonical.abs_diff_eq(projection * (view * model), 1e-6));
    }

    #[test]
    fn compose_requires_viewport() {
        let mut composer = TransformComposer::new();
        assert!(!composer.is_ready());
        assert!(composer.compose(100).is_none());

        composer.on_viewport(100, 100);
        assert!(composer.is_ready());
        assert!(composer.compose(100).is_some());
    }

    #[test]
    fn reset_waits_for_next_viewport() {
        let mut composer = TransformComposer::new();
        composer.on_viewport(800, 480);
        composer.reset();

        assert!(!composer.is_ready());
        assert!(composer.projection().is_none());
        assert!(composer.compose(100).is_none());

        composer.on_viewport(480, 800);
        assert!((composer.frustum().unwrap().right - 0.6).abs() < 1e-6);
    }

    #[test]
    fn later_viewport_replaces_projection() {
        let mut composer = TransformComposer::new();
        composer.on_viewport(800, 480);
        let wide = composer.projection().unwrap();

        composer.on_viewport(480, 800);
        let tall = composer.projection().unwrap();

        assert_ne!(wide, tall);
        assert!((composer.frustum().unwrap().right - 0.6).abs() < 1e-6);
    }

    #[test]
    fn view_places_origin_three_units_ahead() {
        let eye_space = view_matrix() * Vec4::W;
        assert!(eye_space.abs_diff_eq(Vec4::new(0.0, 0.0, -3.0, 1.0), 1e-6));
    }

    #[test]
    fn end_to_end_800_by_480() {
        let mut composer = TransformComposer::new();
        let frustum = composer.on_viewport(800, 480);

        assert!((frustum.right - 1.6667).abs() < 1e-3);
        assert!((frustum.left + 1.6667).abs() < 1e-3);
        assert_eq!(frustum.top, 1.0);
        assert_eq!(frustum.bottom, -1.0);

        let frame = composer.compose(2000).unwrap();
        assert!((frame.angle_degrees - 180.0).abs() < 1e-4);

        // Rotation about the view axis fixes the origin, so only the view moves it.
        let projection = composer.projection().unwrap();
        let expected = projection * (composer.view() * Vec4::W);
        assert!((frame.combined * Vec4::W).abs_diff_eq(expected, 1e-5));

        // A half turn about -Z flips x and y.
        let flipped = frame.rotation * Vec4::new(1.0, 0.5, 0.0, 1.0);
        assert!(flipped.abs_diff_eq(Vec4::new(-1.0, -0.5, 0.0, 1.0), 1e-5));
    }
}
