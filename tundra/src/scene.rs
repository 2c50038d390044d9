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

//! The winter valley itself: loads every program and asset at startup, then
//! renders each frame in two passes. The first pass captures the world into
//! a cube map from a fixed point above the lake, the second draws the world
//! from the camera with the water surface reflecting that cube map.

use crate::{
    config::Settings,
    error::TundraError,
    particles::{fire_vertices, smoke_vertices, snow_vertices, ParticleSystem},
    skybox::SkyBox,
    terrain::{standard_location, Terrain},
};
use nalgebra::{Matrix4, Point3, Vector3};
use std::path::Path;
use tundra_graphics::{
    geometry_buffer::{
        AttributeDefinition, AttributeKind, BufferBuilder, GeometryBuffer, GeometryBufferBuilder,
        TriangleDefinition,
    },
    program::{GpuProgram, SlotAliases, StandardAttribute, StandardUniform},
    server::{GraphicsServer, Viewport},
    texture::{CubeMapFace, GpuTexture, TextureFilter, WrapMode},
    BufferUsage, ElementKind, ElementRange,
};

/// Seconds for snowfall to fully fade in or out after the toggle.
const SNOW_TRANSITION_TIME: f32 = 2.0;

fn load_texture(
    server: &GraphicsServer,
    path: &Path,
    filter: TextureFilter,
    wrap: WrapMode,
) -> Result<GpuTexture, TundraError> {
    let image = image::open(path)?.into_rgba8();
    let (width, height) = image.dimensions();
    Ok(GpuTexture::rgba8(
        server,
        width as usize,
        height as usize,
        image.as_raw(),
        filter,
        wrap,
    )?)
}

#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct WaterVertex {
    position: [f32; 3],
    tex_coord: [f32; 2],
}

fn water_quad(
    server: &GraphicsServer,
    program: &GpuProgram,
    level: f32,
    half_extent: f32,
) -> Result<GeometryBuffer, TundraError> {
    let h = half_extent;
    let vertices = [
        WaterVertex {
            position: [-h, level, -h],
            tex_coord: [0.0, 0.0],
        },
        WaterVertex {
            position: [h, level, -h],
            tex_coord: [1.0, 0.0],
        },
        WaterVertex {
            position: [h, level, h],
            tex_coord: [1.0, 1.0],
        },
        WaterVertex {
            position: [-h, level, h],
            tex_coord: [0.0, 1.0],
        },
    ];

    let geometry = GeometryBufferBuilder::new(ElementKind::Triangle)
        .with_buffer_builder(
            BufferBuilder::new(BufferUsage::StaticDraw, &vertices)
                .with_attribute(AttributeDefinition {
                    location: standard_location(program, StandardAttribute::Vertex)?,
                    kind: AttributeKind::Float3,
                    normalized: false,
                    divisor: 0,
                })
                .with_attribute(AttributeDefinition {
                    location: standard_location(program, StandardAttribute::TexCoord)?,
                    kind: AttributeKind::Float2,
                    normalized: false,
                    divisor: 0,
                }),
        )
        .build(server)?;

    geometry.bind(server).set_triangles(&[
        TriangleDefinition([0, 2, 1]),
        TriangleDefinition([0, 3, 2]),
    ]);

    Ok(geometry)
}

// View matrices for rendering into each cube map face, in face order.
fn cube_face_view(origin: Vector3<f32>, face: CubeMapFace) -> Matrix4<f32> {
    let (dir, up) = match face {
        CubeMapFace::PositiveX => (Vector3::x(), -Vector3::y()),
        CubeMapFace::NegativeX => (-Vector3::x(), -Vector3::y()),
        CubeMapFace::PositiveY => (Vector3::y(), Vector3::z()),
        CubeMapFace::NegativeY => (-Vector3::y(), -Vector3::z()),
        CubeMapFace::PositiveZ => (Vector3::z(), -Vector3::y()),
        CubeMapFace::NegativeZ => (-Vector3::z(), -Vector3::y()),
    };
    let eye = Point3::from(origin);
    Matrix4::look_at_rh(&eye, &(eye + dir), &up)
}

struct ScenePrograms {
    basic: GpuProgram,
    terrain: GpuProgram,
    water: GpuProgram,
    snow: GpuProgram,
    fire: GpuProgram,
    smoke: GpuProgram,
}

impl ScenePrograms {
    fn load(server: &GraphicsServer, shaders_dir: &Path) -> Result<Self, TundraError> {
        let aliases = SlotAliases::default();
        let load = |name: &str| -> Result<GpuProgram, TundraError> {
            Ok(GpuProgram::from_source_files(
                server,
                name,
                &shaders_dir.join(format!("{name}.vert")),
                &shaders_dir.join(format!("{name}.frag")),
                &aliases,
            )?)
        };

        Ok(Self {
            basic: load("basic")?,
            terrain: load("terrain")?,
            water: load("water")?,
            snow: load("snow")?,
            fire: load("fire")?,
            smoke: load("smoke")?,
        })
    }
}

pub struct Scene {
    programs: ScenePrograms,
    terrain: Terrain,
    terrain_geometry: GeometryBuffer,
    water_geometry: GeometryBuffer,
    skybox: SkyBox,
    grass_texture: GpuTexture,
    rock_texture: GpuTexture,
    snow_texture: GpuTexture,
    reflection_map: GpuTexture,
    snow_particles: ParticleSystem,
    fire_particles: ParticleSystem,
    smoke_particles: ParticleSystem,
    projection: Matrix4<f32>,
    reflection_projection: Matrix4<f32>,
    frame_size: (u32, u32),
    snowing: bool,
    snow_opacity: f32,
    settings: Settings,
}

impl Scene {
    pub fn new(
        server: &GraphicsServer,
        settings: &Settings,
        data_dir: &Path,
    ) -> Result<Self, TundraError> {
        let programs = ScenePrograms::load(server, &data_dir.join("shaders"))?;

        let terrain = Terrain::from_heightmap(data_dir, &settings.terrain)?;
        let terrain_geometry = terrain.build_geometry(server, &programs.terrain)?;

        let water_half_extent = terrain.half_extent_x().max(terrain.half_extent_z()) * 4.0;
        let water_geometry = water_quad(
            server,
            &programs.water,
            settings.environment.water_level,
            water_half_extent,
        )?;

        let mut sky_textures = Vec::with_capacity(6);
        for face in &settings.environment.skybox {
            sky_textures.push(load_texture(
                server,
                &data_dir.join(face),
                TextureFilter::Linear,
                WrapMode::ClampToEdge,
            )?);
        }
        let sky_textures: [GpuTexture; 6] = sky_textures
            .try_into()
            .map_err(|_| TundraError::Custom("skybox needs exactly six faces".to_owned()))?;
        let skybox = SkyBox::new(server, &programs.basic, sky_textures)?;

        let grass_texture = load_texture(
            server,
            &data_dir.join(&settings.terrain.grass_texture),
            TextureFilter::Trilinear,
            WrapMode::Repeat,
        )?;
        let rock_texture = load_texture(
            server,
            &data_dir.join(&settings.terrain.rock_texture),
            TextureFilter::Trilinear,
            WrapMode::Repeat,
        )?;
        let snow_texture = load_texture(
            server,
            &data_dir.join(&settings.terrain.snow_texture),
            TextureFilter::Trilinear,
            WrapMode::Repeat,
        )?;

        let reflection_map = GpuTexture::cube_rgba8(
            server,
            settings.reflection.size as usize,
            None,
            TextureFilter::Linear,
        )?;

        let mut rng = rand::thread_rng();
        let snow_particles = ParticleSystem::new(
            server,
            &programs.snow,
            &snow_vertices(&settings.particles, &mut rng),
            settings.particles.snow.lifetime,
        )?;
        let fire_particles = ParticleSystem::new(
            server,
            &programs.fire,
            &fire_vertices(&settings.particles, &mut rng),
            settings.particles.fire.lifetime,
        )?;
        let smoke_particles = ParticleSystem::new(
            server,
            &programs.smoke,
            &smoke_vertices(&settings.particles, &mut rng),
            settings.particles.smoke.lifetime,
        )?;

        let camera = &settings.camera;
        let reflection_projection = Matrix4::new_perspective(
            1.0,
            90.0f32.to_radians(),
            camera.z_near,
            camera.z_far,
        );

        server.set_depth_test(true);

        let mut scene = Self {
            programs,
            terrain,
            terrain_geometry,
            water_geometry,
            skybox,
            grass_texture,
            rock_texture,
            snow_texture,
            reflection_map,
            snow_particles,
            fire_particles,
            smoke_particles,
            projection: Matrix4::identity(),
            reflection_projection,
            frame_size: (settings.window.width, settings.window.height),
            snowing: false,
            snow_opacity: 0.0,
            settings: settings.clone(),
        };
        scene.resize(settings.window.width, settings.window.height);
        Ok(scene)
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn water_level(&self) -> f32 {
        self.settings.environment.water_level
    }

    pub fn toggle_snowing(&mut self) {
        self.snowing = !self.snowing;
        log::info!("Snow {}", if self.snowing { "on" } else { "off" });
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.frame_size = (width.max(1), height.max(1));
        let camera = &self.settings.camera;
        self.projection = Matrix4::new_perspective(
            self.frame_size.0 as f32 / self.frame_size.1 as f32,
            camera.fov_degrees.to_radians(),
            camera.z_near,
            camera.z_far,
        );
    }

    /// Advances time-dependent state; snowfall fades in and out instead of
    /// popping.
    pub fn update(&mut self, dt: f32) {
        let target = if self.snowing { 1.0 } else { 0.0 };
        let step = dt / SNOW_TRANSITION_TIME;
        if self.snow_opacity < target {
            self.snow_opacity = (self.snow_opacity + step).min(target);
        } else {
            self.snow_opacity = (self.snow_opacity - step).max(target);
        }
    }

    pub fn render(
        &self,
        server: &GraphicsServer,
        view: &Matrix4<f32>,
        elapsed: f32,
    ) -> Result<(), TundraError> {
        let fog = self.settings.environment.fog_color;
        server.set_clear_color([fog[0], fog[1], fog[2], 1.0]);

        // Pass 1: capture the world around the reflection origin into the
        // cube map, one face at a time, through the back buffer.
        let size = self.settings.reflection.size as i32;
        let origin = Vector3::from(self.settings.reflection.origin);
        server.set_viewport(Viewport::new(0, 0, size, size));
        for face in CubeMapFace::ALL {
            server.clear();
            let face_view = cube_face_view(origin, face);
            self.render_world(
                server,
                &face_view,
                &self.reflection_projection,
                elapsed,
                false,
            )?;
            self.reflection_map.copy_face_from_back_buffer(server, face)?;
        }

        // Pass 2: the visible frame.
        server.set_viewport(Viewport::new(
            0,
            0,
            self.frame_size.0 as i32,
            self.frame_size.1 as i32,
        ));
        server.clear();
        self.render_world(server, view, &self.projection, elapsed, true)
    }

    fn render_world(
        &self,
        server: &GraphicsServer,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
        elapsed: f32,
        with_water: bool,
    ) -> Result<(), TundraError> {
        let env = &self.settings.environment;
        let fog_color = Vector3::from(env.fog_color);
        let fog_density = env.snow_fog_density * self.snow_opacity;

        // Skybox, centered on the viewer by dropping the view translation.
        // It is pure emission so fog and lighting leave it alone.
        server.set_depth_write(false);
        {
            let mut sky_view = *view;
            sky_view[(0, 3)] = 0.0;
            sky_view[(1, 3)] = 0.0;
            sky_view[(2, 3)] = 0.0;

            let binding = self.programs.basic.bind(server);
            binding
                .set_matrix4("matrixProjection", projection)
                .set_standard_matrix4(StandardUniform::ModelView, &sky_view)
                .set_standard_vector3(StandardUniform::MatEmissive, &Vector3::new(1.0, 1.0, 1.0))
                .set_standard_vector3(StandardUniform::MatAmbient, &Vector3::zeros())
                .set_standard_vector3(StandardUniform::MatDiffuse, &Vector3::zeros())
                .set_i32("texture0", 0)
                .set_vector3("fogColor", &fog_color)
                .set_f32("fogDensity", fog_density);
            self.skybox.draw(server)?;
        }
        server.set_depth_write(true);

        // Terrain.
        {
            let binding = self.programs.terrain.bind(server);
            binding
                .set_matrix4("matrixProjection", projection)
                .set_standard_matrix4(StandardUniform::ModelView, view)
                .set_i32("textureGrass", 0)
                .set_i32("textureRock", 1)
                .set_i32("textureSnow", 2)
                .set_f32("waterLevel", env.water_level)
                .set_f32("grassLevel", env.grass_level)
                .set_f32("snowLevel", env.snow_level)
                .set_f32("snowCoverage", self.snow_opacity)
                .set_vector3("fogColor", &fog_color)
                .set_f32("fogDensity", fog_density);
            self.grass_texture.bind(server, 0);
            self.rock_texture.bind(server, 1);
            self.snow_texture.bind(server, 2);
            self.terrain_geometry.bind(server).draw(ElementRange::Full)?;
        }

        // Particles render as point sprites without writing depth, so they
        // never punch holes into each other.
        server.set_program_point_size(true);
        server.set_blend(true);
        server.set_depth_write(false);

        {
            server.set_alpha_blend_func();
            let binding = self.programs.smoke.bind(server);
            binding
                .set_matrix4("matrixProjection", projection)
                .set_standard_matrix4(StandardUniform::ModelView, view)
                .set_f32("time", elapsed)
                .set_f32("particleLifetime", self.smoke_particles.lifetime)
                .set_vector3("fogColor", &fog_color)
                .set_f32("fogDensity", fog_density);
            self.smoke_particles.draw(server)?;
        }

        {
            server.set_additive_blend_func();
            // Two incommensurate sine waves make the flame flicker without
            // a visible repeat.
            let intensity =
                0.85 + 0.1 * (elapsed * 17.0).sin() + 0.05 * (elapsed * 29.0).sin();
            let binding = self.programs.fire.bind(server);
            binding
                .set_matrix4("matrixProjection", projection)
                .set_standard_matrix4(StandardUniform::ModelView, view)
                .set_f32("time", elapsed)
                .set_f32("particleLifetime", self.fire_particles.lifetime)
                .set_f32("intensity", intensity);
            self.fire_particles.draw(server)?;
        }

        if self.snow_opacity > 0.0 {
            server.set_alpha_blend_func();
            let binding = self.programs.snow.bind(server);
            binding
                .set_matrix4("matrixProjection", projection)
                .set_standard_matrix4(StandardUniform::ModelView, view)
                .set_f32("time", elapsed)
                .set_f32("particleLifetime", self.snow_particles.lifetime)
                .set_f32("opacity", self.snow_opacity);
            self.snow_particles.draw(server)?;
        }

        server.set_depth_write(true);
        server.set_program_point_size(false);

        // Water is last so the reflection blends over everything behind it.
        if with_water {
            server.set_alpha_blend_func();
            let camera_position = view
                .try_inverse()
                .map(|inv| Vector3::new(inv[(0, 3)], inv[(1, 3)], inv[(2, 3)]))
                .unwrap_or_default();

            let binding = self.programs.water.bind(server);
            binding
                .set_matrix4("matrixProjection", projection)
                .set_standard_matrix4(StandardUniform::ModelView, view)
                .set_i32("textureReflection", 0)
                .set_f32("reflectionPower", self.settings.reflection.power)
                .set_vector3("waterColor", &Vector3::from(env.water_color))
                .set_vector3("cameraPosition", &camera_position)
                .set_vector3("fogColor", &fog_color)
                .set_f32("fogDensity", fog_density);
            self.reflection_map.bind(server, 0);
            self.water_geometry.bind(server).draw(ElementRange::Full)?;
        }

        server.set_blend(false);

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cube_face_views_look_along_their_axes() {
        let origin = Vector3::new(0.0, 30.0, 0.0);
        for face in CubeMapFace::ALL {
            let view = cube_face_view(origin, face);
            // The capture origin maps to the eye.
            let eye = view.transform_point(&Point3::from(origin));
            assert!(eye.coords.norm() < 1e-4);
        }

        // Looking down +X, a point further along +X is straight ahead.
        let view = cube_face_view(origin, CubeMapFace::PositiveX);
        let ahead = view.transform_point(&Point3::new(5.0, 30.0, 0.0));
        assert!(ahead.x.abs() < 1e-4);
        assert!(ahead.y.abs() < 1e-4);
        assert!((ahead.z + 5.0).abs() < 1e-4);
    }

    #[test]
    fn snow_opacity_ramps_and_saturates() {
        let target_on = 1.0f32;
        let mut opacity = 0.0f32;
        for _ in 0..300 {
            let step = 0.016 / SNOW_TRANSITION_TIME;
            opacity = (opacity + step).min(target_on);
        }
        assert_eq!(opacity, 1.0);
    }
}
