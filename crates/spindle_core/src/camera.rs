use glam::{Mat4, Vec4};

/// Distance from the eye to the near clipping plane.
pub const NEAR_PLANE: f32 = 3.0;
/// Distance from the eye to the far clipping plane.
pub const FAR_PLANE: f32 = 7.0;
/// Vertical half-extent of the near plane. The horizontal half-extent is the aspect ratio.
pub const HALF_HEIGHT: f32 = 1.0;

/// The six planes of a perspective view volume, in eye space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

impl Frustum {
    /// A frustum centred on the view axis with `right = aspect_ratio` and `top = 1`.
    pub fn symmetric(aspect_ratio: f32) -> Self {
        Self {
            left: -aspect_ratio * HALF_HEIGHT,
            right: aspect_ratio * HALF_HEIGHT,
            bottom: -HALF_HEIGHT,
            top: HALF_HEIGHT,
            near: NEAR_PLANE,
            far: FAR_PLANE,
        }
    }

    /// Builds the frustum for a surface of the given size in pixels.
    ///
    /// A zero dimension is treated as 1 so a minimised surface never divides by zero.
    pub fn from_viewport(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self::symmetric(width as f32 / height as f32)
    }

    pub fn aspect_ratio(&self) -> f32 {
        (self.right - self.left) / (self.top - self.bottom)
    }

    /// Computes the "Projection Matrix" (Eye -> Clip)
    ///
    /// Same column-major layout as `glFrustum`, so the result can be uploaded
    /// with `transpose = false`.
    pub fn compute_projection_matrix(&self) -> Mat4 {
        let width = self.right - self.left;
        let height = self.top - self.bottom;
        let depth = self.far - self.near;

        Mat4::from_cols(
            Vec4::new(2.0 * self.near / width, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * self.near / height, 0.0, 0.0),
            Vec4::new(
                (self.right + self.left) / width,
                (self.top + self.bottom) / height,
                -(self.far + self.near) / depth,
                -1.0,
            ),
            Vec4::new(0.0, 0.0, -2.0 * self.far * self.near / depth, 0.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;

    fn to_ndc(projection: Mat4, point: Vec3) -> Vec3 {
        let clip = projection * point.extend(1.0);
        clip.truncate() / clip.w
    }

    #[test]
    fn bounds_follow_aspect_ratio() {
        for ratio in [0.25_f32, 0.6, 1.0, 1.6667, 2.4, 10.0] {
            let frustum = Frustum::symmetric(ratio);
            assert_eq!(frustum.left, -ratio);
            assert_eq!(frustum.right, ratio);
            assert_eq!(frustum.bottom, -1.0);
            assert_eq!(frustum.top, 1.0);
            assert_eq!(frustum.near, 3.0);
            assert_eq!(frustum.far, 7.0);
            assert!((frustum.aspect_ratio() - ratio).abs() < 1e-5);
        }
    }

    #[test]
    fn near_plane_corners_map_to_ndc_corners() {
        for ratio in [0.5_f32, 1.0, 1.6667, 3.0] {
            let projection = Frustum::symmetric(ratio).compute_projection_matrix();

            let top_right = to_ndc(projection, Vec3::new(ratio, 1.0, -NEAR_PLANE));
            assert!(top_right.abs_diff_eq(Vec3::new(1.0, 1.0, -1.0), 1e-5));

            let bottom_left = to_ndc(projection, Vec3::new(-ratio, -1.0, -NEAR_PLANE));
            assert!(bottom_left.abs_diff_eq(Vec3::new(-1.0, -1.0, -1.0), 1e-5));
        }
    }

    #[test]
    fn far_plane_maps_to_plus_one_depth() {
        let ratio = 1.5;
        let projection = Frustum::symmetric(ratio).compute_projection_matrix();
        let scale = FAR_PLANE / NEAR_PLANE;

        let corner = to_ndc(projection, Vec3::new(ratio * scale, scale, -FAR_PLANE));
        assert!(corner.abs_diff_eq(Vec3::new(1.0, 1.0, 1.0), 1e-4));
    }

    #[test]
    fn projection_matches_gl_frustum_layout() {
        let projection = Frustum::symmetric(2.0).compute_projection_matrix();

        assert_eq!(projection.w_axis, Vec4::new(0.0, 0.0, -2.0 * 7.0 * 3.0 / 4.0, 0.0));
        assert_eq!(projection.z_axis.w, -1.0);
        assert_eq!(projection.x_axis.x, 2.0 * 3.0 / 4.0);
        assert_eq!(projection.y_axis.y, 3.0);
    }

    #[test]
    fn zero_height_viewport_is_clamped() {
        let frustum = Frustum::from_viewport(640, 0);
        assert_eq!(frustum.right, 640.0);
        assert!(frustum.compute_projection_matrix().is_finite());

        let frustum = Frustum::from_viewport(0, 0);
        assert_eq!(frustum.right, 1.0);
    }
}
