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

//! Demo settings, stored next to the data directory as a RON file. Every
//! field has a default, so a settings file only needs to mention what it
//! overrides.

use crate::error::TundraError;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub vsync: bool,
    pub msaa_sample_count: Option<u8>,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "Tundra".to_owned(),
            vsync: true,
            msaa_sample_count: Some(4),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct CameraSettings {
    pub position: [f32; 3],
    pub target: [f32; 3],
    /// Constant downward tilt applied on top of the look direction, degrees.
    pub tilt_degrees: f32,
    pub fov_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub eye_height: f32,
    pub base_speed: f32,
    /// Per-second speed multiplier while a movement key is held.
    pub acceleration: f32,
    pub max_speed: f32,
    pub mouse_sensitivity: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            position: [4.0, 0.4, 30.0],
            target: [4.0, 0.4, 0.0],
            tilt_degrees: 15.0,
            fov_degrees: 60.0,
            z_near: 0.02,
            z_far: 1000.0,
            eye_height: 0.4,
            base_speed: 4.0,
            acceleration: 1.6,
            max_speed: 40.0,
            mouse_sensitivity: 0.0025,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct TerrainSettings {
    pub heightmap: PathBuf,
    pub max_height: f32,
    /// World-space spacing between adjacent heightmap samples.
    pub cell_size: f32,
    pub grass_texture: PathBuf,
    pub rock_texture: PathBuf,
    pub snow_texture: PathBuf,
    /// Texture repeats per heightmap cell.
    pub texture_tiling: f32,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            heightmap: "textures/heightmap.png".into(),
            max_height: 80.0,
            cell_size: 1.0,
            grass_texture: "textures/grass.png".into(),
            rock_texture: "textures/rock.png".into(),
            snow_texture: "textures/snow.png".into(),
            texture_tiling: 0.25,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct EnvironmentSettings {
    pub water_level: f32,
    pub grass_level: f32,
    pub snow_level: f32,
    pub fog_color: [f32; 3],
    /// Fog density used while it is snowing; zero otherwise.
    pub snow_fog_density: f32,
    /// Skybox face images ordered front, back, left, right, up, down.
    pub skybox: [PathBuf; 6],
    pub water_color: [f32; 3],
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            water_level: 28.2,
            grass_level: 33.0,
            snow_level: 60.0,
            fog_color: [0.55, 0.6, 0.65],
            snow_fog_density: 0.03,
            skybox: [
                "textures/sky_ft.png".into(),
                "textures/sky_bk.png".into(),
                "textures/sky_lf.png".into(),
                "textures/sky_rt.png".into(),
                "textures/sky_up.png".into(),
                "textures/sky_dn.png".into(),
            ],
            water_color: [0.2, 0.22, 0.2],
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct ReflectionSettings {
    /// Resolution of each cube map face, pixels.
    pub size: u32,
    /// World-space point the environment is captured from.
    pub origin: [f32; 3],
    /// Blend factor of the reflection in the water surface.
    pub power: f32,
}

impl Default for ReflectionSettings {
    fn default() -> Self {
        Self {
            size: 256,
            origin: [0.0, 30.0, 0.0],
            power: 0.6,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct EmitterSettings {
    /// Seconds between consecutive particle births.
    pub period: f32,
    /// Seconds each particle lives before respawning.
    pub lifetime: f32,
}

impl EmitterSettings {
    /// Amount of particles alive at any time.
    pub fn particle_count(&self) -> usize {
        (self.lifetime / self.period).round() as usize
    }
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            period: 0.001,
            lifetime: 1.0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(default)]
pub struct ParticleSettings {
    pub snow: EmitterSettings,
    /// Horizontal extent of the snowfall volume, centered on the origin.
    pub snow_box_size: f32,
    pub fire: EmitterSettings,
    /// Axis-aligned patch the flames rise from.
    pub fire_patch_min: [f32; 3],
    pub fire_patch_max: [f32; 3],
    pub smoke: EmitterSettings,
    pub smoke_origin: [f32; 3],
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            snow: EmitterSettings {
                period: 0.001,
                lifetime: 26.6,
            },
            snow_box_size: 160.0,
            fire: EmitterSettings {
                period: 0.001,
                lifetime: 1.2,
            },
            fire_patch_min: [17.0, 29.72, -17.5],
            fire_patch_max: [17.3, 29.72, -17.2],
            smoke: EmitterSettings {
                period: 0.0025,
                lifetime: 15.0,
            },
            smoke_origin: [17.15, 29.9, -17.35],
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
#[serde(default)]
pub struct Settings {
    pub window: WindowSettings,
    pub camera: CameraSettings,
    pub terrain: TerrainSettings,
    pub environment: EnvironmentSettings,
    pub reflection: ReflectionSettings,
    pub particles: ParticleSettings,
}

impl Settings {
    /// Loads settings from a RON file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, TundraError> {
        if path.exists() {
            let text = std::fs::read_to_string(path)?;
            Ok(ron::from_str(&text)?)
        } else {
            info!(
                "Settings file {} not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_describe_the_winter_valley() {
        let settings = Settings::default();
        assert_eq!(settings.environment.water_level, 28.2);
        assert_eq!(settings.environment.grass_level, 33.0);
        assert_eq!(settings.environment.snow_level, 60.0);
        assert_eq!(settings.reflection.size, 256);
        assert_eq!(settings.reflection.power, 0.6);
    }

    #[test]
    fn particle_counts_derive_from_period_and_lifetime() {
        let particles = ParticleSettings::default();
        assert_eq!(particles.snow.particle_count(), 26600);
        assert_eq!(particles.fire.particle_count(), 1200);
        assert_eq!(particles.smoke.particle_count(), 6000);
    }

    #[test]
    fn partial_settings_file_overrides_only_named_fields() {
        let settings: Settings =
            ron::from_str("(environment: (water_level: 12.5), window: (vsync: false))").unwrap();
        assert_eq!(settings.environment.water_level, 12.5);
        assert!(!settings.window.vsync);
        // Everything not mentioned keeps its default.
        assert_eq!(settings.environment.snow_level, 60.0);
        assert_eq!(settings.window.width, 1280);
    }
}
