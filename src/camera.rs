use glam::Mat4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Perspective,
    Orthographic,
}

/// Projection parameters. The view side comes from the entity's transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Vertical extent of the view volume for orthographic projection.
    pub ortho_height: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Projection::Perspective,
            near: 0.1,
            far: 100.0,
            fov_y: 45f32.to_radians(),
            ortho_height: 10.0,
        }
    }
}

impl Camera {
    pub fn perspective(fov_y: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Perspective,
            near,
            far,
            fov_y,
            ..Default::default()
        }
    }

    pub fn orthographic(height: f32, near: f32, far: f32) -> Self {
        Self {
            projection: Projection::Orthographic,
            near,
            far,
            ortho_height: height,
            ..Default::default()
        }
    }

    /// Right-handed projection with a 0..1 depth range.
    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        match self.projection {
            Projection::Perspective => {
                Mat4::perspective_rh(self.fov_y, aspect_ratio, self.near, self.far)
            }
            Projection::Orthographic => {
                let half_height = self.ortho_height * 0.5;
                let half_width = half_height * aspect_ratio;
                Mat4::orthographic_rh(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.near,
                    self.far,
                )
            }
        }
    }
}
