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

//! Stateless GPU particle systems. All per-particle data (spawn position,
//! velocity, birth time) is generated once and uploaded; the vertex shader
//! replays every particle from the global clock, wrapping ages by the
//! emitter lifetime, so nothing is touched per frame.

use crate::{config::ParticleSettings, error::TundraError, terrain::standard_location};
use rand::Rng;
use tundra_graphics::{
    geometry_buffer::{
        AttributeDefinition, AttributeKind, BufferBuilder, GeometryBuffer, GeometryBufferBuilder,
    },
    program::{GpuProgram, StandardAttribute},
    server::GraphicsServer,
    BufferUsage, ElementKind, ElementRange,
};

#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct ParticleVertex {
    pub spawn_position: [f32; 3],
    pub velocity: [f32; 3],
    pub start_time: f32,
}

// Snowflakes spawn in this height band and fall through the whole valley
// before their age wraps.
const SNOW_SPAWN_HEIGHT: (f32, f32) = (70.0, 100.0);

/// Snowfall filling a square column of `box_size` around the origin.
/// Each flake picks one fall speed; the fixed sideways skew gives the
/// whole curtain a common wind drift.
pub fn snow_vertices(settings: &ParticleSettings, rng: &mut impl Rng) -> Vec<ParticleVertex> {
    let half = settings.snow_box_size * 0.5;
    let count = settings.snow.particle_count();
    (0..count)
        .map(|i| {
            let speed = rng.gen_range(2.5..2.7);
            ParticleVertex {
                spawn_position: [
                    rng.gen_range(-half..half),
                    rng.gen_range(SNOW_SPAWN_HEIGHT.0..SNOW_SPAWN_HEIGHT.1),
                    rng.gen_range(-half..half),
                ],
                velocity: [-0.5 * speed, -speed, 0.25 * speed],
                start_time: i as f32 * settings.snow.period,
            }
        })
        .collect()
}

/// Flames rising from the fire patch.
pub fn fire_vertices(settings: &ParticleSettings, rng: &mut impl Rng) -> Vec<ParticleVertex> {
    let min = settings.fire_patch_min;
    let max = settings.fire_patch_max;
    let count = settings.fire.particle_count();
    (0..count)
        .map(|i| ParticleVertex {
            spawn_position: [
                rng.gen_range(min[0]..max[0]),
                min[1],
                rng.gen_range(min[2]..max[2]),
            ],
            velocity: [
                rng.gen_range(-0.05..0.05),
                rng.gen_range(0.8..1.7),
                rng.gen_range(-0.05..0.05),
            ],
            start_time: i as f32 * settings.fire.period,
        })
        .collect()
}

// Half-angle of the smoke plume, measured from straight up.
const SMOKE_CONE_ANGLE: f32 = 2.0 * std::f32::consts::FRAC_PI_3;

/// Smoke drifting up from a point just above the fire. Directions are
/// drawn from a spherical cap around +Y so the plume stays cone-shaped.
pub fn smoke_vertices(settings: &ParticleSettings, rng: &mut impl Rng) -> Vec<ParticleVertex> {
    let origin = settings.smoke_origin;
    let count = settings.smoke.particle_count();
    (0..count)
        .map(|i| {
            let theta = rng.gen_range(0.0..SMOKE_CONE_ANGLE);
            let phi = rng.gen_range(0.0..std::f32::consts::TAU);
            let speed = rng.gen_range(0.1..0.2);
            ParticleVertex {
                spawn_position: [
                    origin[0] + rng.gen_range(-0.05..0.05),
                    origin[1],
                    origin[2] + rng.gen_range(-0.05..0.05),
                ],
                velocity: [
                    speed * theta.sin() * phi.cos(),
                    speed * theta.cos(),
                    speed * theta.sin() * phi.sin(),
                ],
                start_time: i as f32 * settings.smoke.period,
            }
        })
        .collect()
}

/// A fixed set of point sprites drawn as a single point list.
pub struct ParticleSystem {
    geometry: GeometryBuffer,
    pub lifetime: f32,
}

impl ParticleSystem {
    /// Uploads the particle set, wiring the spawn position to the standard
    /// vertex slot and velocity/birth time to named attributes.
    pub fn new(
        server: &GraphicsServer,
        program: &GpuProgram,
        vertices: &[ParticleVertex],
        lifetime: f32,
    ) -> Result<Self, TundraError> {
        let velocity_location = program.attribute_location("aVelocity").ok_or_else(|| {
            TundraError::Custom(format!(
                "Program {} did not resolve the aVelocity attribute",
                program.name()
            ))
        })?;
        let start_time_location = program.attribute_location("aStartTime").ok_or_else(|| {
            TundraError::Custom(format!(
                "Program {} did not resolve the aStartTime attribute",
                program.name()
            ))
        })?;

        let geometry = GeometryBufferBuilder::new(ElementKind::Point)
            .with_buffer_builder(
                BufferBuilder::new(BufferUsage::StaticDraw, vertices)
                    .with_attribute(AttributeDefinition {
                        location: standard_location(program, StandardAttribute::Vertex)?,
                        kind: AttributeKind::Float3,
                        normalized: false,
                        divisor: 0,
                    })
                    .with_attribute(AttributeDefinition {
                        location: velocity_location,
                        kind: AttributeKind::Float3,
                        normalized: false,
                        divisor: 0,
                    })
                    .with_attribute(AttributeDefinition {
                        location: start_time_location,
                        kind: AttributeKind::Float,
                        normalized: false,
                        divisor: 0,
                    }),
            )
            .build(server)?;

        let indices: Vec<u32> = (0..vertices.len() as u32).collect();
        geometry.bind(server).set_points(&indices);

        Ok(Self {
            geometry,
            lifetime,
        })
    }

    pub fn draw(&self, server: &GraphicsServer) -> Result<(), TundraError> {
        self.geometry.bind(server).draw(ElementRange::Full)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn settings() -> ParticleSettings {
        ParticleSettings::default()
    }

    #[test]
    fn snow_fills_the_configured_box() {
        let settings = settings();
        let mut rng = StdRng::seed_from_u64(1);
        let vertices = snow_vertices(&settings, &mut rng);
        assert_eq!(vertices.len(), settings.snow.particle_count());

        let half = settings.snow_box_size * 0.5;
        for vertex in &vertices {
            assert!(vertex.spawn_position[0].abs() <= half);
            assert!(vertex.spawn_position[2].abs() <= half);
            assert!(vertex.spawn_position[1] >= SNOW_SPAWN_HEIGHT.0);
            assert!(vertex.spawn_position[1] <= SNOW_SPAWN_HEIGHT.1);
            // Snow always falls.
            assert!(vertex.velocity[1] < 0.0);
        }
    }

    #[test]
    fn snow_shares_a_common_wind_drift() {
        let settings = settings();
        let mut rng = StdRng::seed_from_u64(4);
        for vertex in snow_vertices(&settings, &mut rng) {
            let fall_speed = -vertex.velocity[1];
            assert!((2.5..2.7).contains(&fall_speed));
            // Sideways components are a fixed skew of the fall speed, so
            // every flake drifts the same way.
            assert!((vertex.velocity[0] - -0.5 * fall_speed).abs() < 1e-5);
            assert!((vertex.velocity[2] - 0.25 * fall_speed).abs() < 1e-5);
        }
    }

    #[test]
    fn fire_stays_on_its_patch_and_rises() {
        let settings = settings();
        let mut rng = StdRng::seed_from_u64(2);
        for vertex in fire_vertices(&settings, &mut rng) {
            assert!(vertex.spawn_position[0] >= settings.fire_patch_min[0]);
            assert!(vertex.spawn_position[0] <= settings.fire_patch_max[0]);
            assert_eq!(vertex.spawn_position[1], settings.fire_patch_min[1]);
            assert!(vertex.velocity[1] > 0.0);
        }
    }

    #[test]
    fn smoke_directions_stay_inside_the_cone() {
        let settings = settings();
        let mut rng = StdRng::seed_from_u64(5);
        let min_cos = SMOKE_CONE_ANGLE.cos();
        let mut spread = false;
        for vertex in smoke_vertices(&settings, &mut rng) {
            let [x, y, z] = vertex.velocity;
            let speed = (x * x + y * y + z * z).sqrt();
            assert!((0.1..0.2).contains(&speed));
            // The polar angle from +Y never exceeds the cone half-angle.
            assert!(y / speed >= min_cos - 1e-5);
            if x.hypot(z) > 1e-3 {
                spread = true;
            }
        }
        assert!(spread, "plume collapsed onto the vertical axis");
    }

    #[test]
    fn birth_times_are_spaced_by_the_emitter_period() {
        let settings = settings();
        let mut rng = StdRng::seed_from_u64(3);
        let vertices = smoke_vertices(&settings, &mut rng);
        for (i, pair) in vertices.windows(2).enumerate() {
            let delta = pair[1].start_time - pair[0].start_time;
            assert!(
                (delta - settings.smoke.period).abs() < 1e-4,
                "particle {i}: delta {delta}"
            );
        }
        // The last birth happens just before the first particle respawns.
        let last = vertices.last().unwrap().start_time;
        assert!(last < settings.smoke.lifetime);
    }
}
