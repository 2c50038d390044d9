// Copyright (c) 2024-present Tundra project contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! First-person camera that walks the terrain. The look direction is a
//! yaw/pitch pair; a constant tilt is composed into the view matrix on top
//! of it, so mouse look never fights the tilt.

use crate::config::CameraSettings;
use nalgebra::{Matrix4, Point3, Rotation3, Vector3};

/// Movement request for one frame, each axis in -1..=1.
#[derive(Copy, Clone, Default, PartialEq, Debug)]
pub struct CameraInput {
    pub forward: f32,
    pub side: f32,
    pub vertical: f32,
}

impl CameraInput {
    pub fn is_moving(&self) -> bool {
        self.forward != 0.0 || self.side != 0.0 || self.vertical != 0.0
    }
}

pub struct Camera {
    position: Vector3<f32>,
    yaw: f32,
    pitch: f32,
    tilt: f32,
    speed: f32,
    base_speed: f32,
    max_speed: f32,
    acceleration: f32,
    eye_height: f32,
    sensitivity: f32,
}

impl Camera {
    pub fn new(settings: &CameraSettings) -> Self {
        let position = Vector3::from(settings.position);
        let target = Vector3::from(settings.target);
        let direction = (target - position).normalize();

        Self {
            position,
            yaw: direction.x.atan2(-direction.z),
            pitch: direction.y.clamp(-1.0, 1.0).asin(),
            tilt: settings.tilt_degrees.to_radians(),
            speed: settings.base_speed,
            base_speed: settings.base_speed,
            max_speed: settings.max_speed,
            acceleration: settings.acceleration,
            eye_height: settings.eye_height,
            sensitivity: settings.mouse_sensitivity,
        }
    }

    #[cfg(test)]
    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    /// Look direction before the tilt is applied.
    pub fn forward(&self) -> Vector3<f32> {
        Vector3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            -self.yaw.cos() * self.pitch.cos(),
        )
    }

    /// Applies a mouse motion delta to the look direction. Pitch is clamped
    /// short of straight up and down so the view never flips.
    pub fn rotate(&mut self, delta_x: f32, delta_y: f32) {
        self.yaw += delta_x * self.sensitivity;
        self.pitch = (self.pitch - delta_y * self.sensitivity).clamp(-1.5, 1.5);
    }

    /// Moves the camera and glues it to the ground: the eye never sinks
    /// below the terrain surface or the water surface, whichever is higher.
    pub fn update(
        &mut self,
        input: CameraInput,
        dt: f32,
        ground_height: impl Fn(f32, f32) -> f32,
        water_level: f32,
    ) {
        if input.is_moving() {
            self.speed = (self.speed * self.acceleration.powf(dt)).min(self.max_speed);
        } else {
            self.speed = self.base_speed;
        }

        let forward = self.forward();
        let up = Vector3::y();
        let right = forward.cross(&up).normalize();

        self.position +=
            (forward * input.forward + right * input.side + up * input.vertical) * self.speed * dt;

        let floor =
            ground_height(self.position.x, self.position.z).max(water_level) + self.eye_height;
        if self.position.y < floor {
            self.position.y = floor;
        }
    }

    /// View matrix with the constant tilt composed in.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let eye = Point3::from(self.position);
        let target = eye + self.forward();
        let look_at = Matrix4::look_at_rh(&eye, &target, &Vector3::y());
        let tilt = Rotation3::from_axis_angle(&Vector3::x_axis(), -self.tilt).to_homogeneous();
        tilt * look_at
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::CameraSettings;

    fn flat_ground(_x: f32, _z: f32) -> f32 {
        10.0
    }

    #[test]
    fn initial_look_direction_matches_settings() {
        let camera = Camera::new(&CameraSettings::default());
        // Default target lies straight down negative Z from the position.
        let forward = camera.forward();
        assert!(forward.x.abs() < 1e-6);
        assert!(forward.y.abs() < 1e-6);
        assert!((forward.z + 1.0).abs() < 1e-6);
    }

    #[test]
    fn eye_stays_above_ground_and_water() {
        let settings = CameraSettings {
            position: [0.0, 0.0, 0.0],
            target: [0.0, 0.0, -1.0],
            eye_height: 0.4,
            ..Default::default()
        };
        let mut camera = Camera::new(&settings);

        camera.update(CameraInput::default(), 0.016, flat_ground, 0.0);
        assert_eq!(camera.position().y, 10.4);

        // Water higher than the terrain wins.
        camera.update(CameraInput::default(), 0.016, flat_ground, 28.2);
        assert_eq!(camera.position().y, 28.6);
    }

    #[test]
    fn speed_accelerates_while_moving_and_resets_when_idle() {
        let settings = CameraSettings {
            position: [0.0, 100.0, 0.0],
            target: [0.0, 100.0, -1.0],
            base_speed: 4.0,
            acceleration: 2.0,
            max_speed: 10.0,
            ..Default::default()
        };
        let mut camera = Camera::new(&settings);

        let moving = CameraInput {
            forward: 1.0,
            ..Default::default()
        };
        for _ in 0..600 {
            camera.update(moving, 0.016, |_, _| 0.0, 0.0);
        }
        assert_eq!(camera.speed, 10.0);

        camera.update(CameraInput::default(), 0.016, |_, _| 0.0, 0.0);
        assert_eq!(camera.speed, 4.0);
    }

    #[test]
    fn view_matrix_sends_the_look_target_down_negative_z() {
        let settings = CameraSettings {
            position: [1.0, 2.0, 3.0],
            target: [1.0, 2.0, -7.0],
            tilt_degrees: 0.0,
            ..Default::default()
        };
        let camera = Camera::new(&settings);
        let view = camera.view_matrix();
        let transformed = view.transform_point(&Point3::new(1.0, 2.0, -7.0));
        assert!(transformed.x.abs() < 1e-4);
        assert!(transformed.y.abs() < 1e-4);
        assert!((transformed.z + 10.0).abs() < 1e-4);
    }
}
