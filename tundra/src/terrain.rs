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

//! Heightmap terrain: a grayscale image becomes a regular grid of heights
//! centered on the world origin. The grid is triangulated once at startup;
//! the heights stay on the CPU side for ground queries.

use crate::{config::TerrainSettings, error::TundraError};
use std::path::Path;
use tundra_graphics::{
    error::FrameworkError,
    geometry_buffer::{
        AttributeDefinition, AttributeKind, BufferBuilder, GeometryBuffer, GeometryBufferBuilder,
        TriangleDefinition,
    },
    program::{GpuProgram, StandardAttribute},
    server::GraphicsServer,
    BufferUsage, ElementKind,
};

#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct TerrainVertex {
    position: [f32; 3],
    normal: [f32; 3],
    tex_coord: [f32; 2],
}

pub struct Terrain {
    heights: Vec<f32>,
    cols: usize,
    rows: usize,
    cell_size: f32,
    texture_tiling: f32,
}

impl Terrain {
    /// Builds the height grid from a grayscale heightmap image: full white
    /// maps to `max_height`, black to zero.
    pub fn from_heightmap(
        data_dir: &Path,
        settings: &TerrainSettings,
    ) -> Result<Self, TundraError> {
        let path = data_dir.join(&settings.heightmap);
        let image = image::open(&path)?.into_luma8();

        let cols = image.width() as usize;
        let rows = image.height() as usize;
        if cols < 2 || rows < 2 {
            return Err(TundraError::Custom(format!(
                "Heightmap {} is too small: {cols}x{rows}",
                path.display()
            )));
        }

        let heights = image
            .pixels()
            .map(|pixel| pixel.0[0] as f32 / 255.0 * settings.max_height)
            .collect();

        Ok(Self {
            heights,
            cols,
            rows,
            cell_size: settings.cell_size,
            texture_tiling: settings.texture_tiling,
        })
    }

    /// Builds a flat terrain of the given grid size.
    #[cfg(test)]
    pub fn flat(cols: usize, rows: usize, height: f32, cell_size: f32) -> Self {
        Self {
            heights: vec![height; cols * rows],
            cols,
            rows,
            cell_size,
            texture_tiling: 1.0,
        }
    }

    fn sample(&self, col: isize, row: isize) -> f32 {
        let col = col.clamp(0, self.cols as isize - 1) as usize;
        let row = row.clamp(0, self.rows as isize - 1) as usize;
        self.heights[row * self.cols + col]
    }

    fn origin_x(&self) -> f32 {
        -((self.cols - 1) as f32) * 0.5 * self.cell_size
    }

    fn origin_z(&self) -> f32 {
        -((self.rows - 1) as f32) * 0.5 * self.cell_size
    }

    /// Bilinearly interpolated terrain height at a world-space point.
    /// Points outside the grid take the height of the nearest edge.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let gx = (x - self.origin_x()) / self.cell_size;
        let gz = (z - self.origin_z()) / self.cell_size;

        let col = gx.floor();
        let row = gz.floor();
        let fx = gx - col;
        let fz = gz - row;

        let col = col as isize;
        let row = row as isize;

        let h00 = self.sample(col, row);
        let h10 = self.sample(col + 1, row);
        let h01 = self.sample(col, row + 1);
        let h11 = self.sample(col + 1, row + 1);

        let bottom = h00 + (h10 - h00) * fx;
        let top = h01 + (h11 - h01) * fx;
        bottom + (top - bottom) * fz
    }

    fn normal_at(&self, col: isize, row: isize) -> [f32; 3] {
        let left = self.sample(col - 1, row);
        let right = self.sample(col + 1, row);
        let back = self.sample(col, row - 1);
        let front = self.sample(col, row + 1);

        let normal = nalgebra::Vector3::new(left - right, 2.0 * self.cell_size, back - front);
        normal.normalize().into()
    }

    fn vertices(&self) -> Vec<TerrainVertex> {
        let mut vertices = Vec::with_capacity(self.cols * self.rows);
        for row in 0..self.rows {
            for col in 0..self.cols {
                vertices.push(TerrainVertex {
                    position: [
                        self.origin_x() + col as f32 * self.cell_size,
                        self.heights[row * self.cols + col],
                        self.origin_z() + row as f32 * self.cell_size,
                    ],
                    normal: self.normal_at(col as isize, row as isize),
                    tex_coord: [
                        col as f32 * self.texture_tiling,
                        row as f32 * self.texture_tiling,
                    ],
                });
            }
        }
        vertices
    }

    fn triangles(&self) -> Vec<TriangleDefinition> {
        let mut triangles = Vec::with_capacity((self.cols - 1) * (self.rows - 1) * 2);
        for row in 0..self.rows - 1 {
            for col in 0..self.cols - 1 {
                let i00 = (row * self.cols + col) as u32;
                let i10 = i00 + 1;
                let i01 = i00 + self.cols as u32;
                let i11 = i01 + 1;
                triangles.push(TriangleDefinition([i00, i01, i10]));
                triangles.push(TriangleDefinition([i10, i01, i11]));
            }
        }
        triangles
    }

    /// Uploads the triangulated grid, wiring vertex attributes to the
    /// standard slots the terrain program resolved.
    pub fn build_geometry(
        &self,
        server: &GraphicsServer,
        program: &GpuProgram,
    ) -> Result<GeometryBuffer, TundraError> {
        let geometry = GeometryBufferBuilder::new(ElementKind::Triangle)
            .with_buffer_builder(
                BufferBuilder::new(BufferUsage::StaticDraw, &self.vertices())
                    .with_attribute(AttributeDefinition {
                        location: standard_location(program, StandardAttribute::Vertex)?,
                        kind: AttributeKind::Float3,
                        normalized: false,
                        divisor: 0,
                    })
                    .with_attribute(AttributeDefinition {
                        location: standard_location(program, StandardAttribute::Normal)?,
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

        geometry.bind(server).set_triangles(&self.triangles());

        Ok(geometry)
    }

    pub fn half_extent_x(&self) -> f32 {
        -self.origin_x()
    }

    pub fn half_extent_z(&self) -> f32 {
        -self.origin_z()
    }
}

/// Location of a standard attribute slot the program must have resolved.
pub fn standard_location(
    program: &GpuProgram,
    role: StandardAttribute,
) -> Result<u32, TundraError> {
    program
        .standard_attribute(role)
        .map(|slot| slot.location)
        .ok_or_else(|| {
            TundraError::Graphics(FrameworkError::Custom(format!(
                "Program {} did not resolve the {:?} attribute",
                program.name(),
                role
            )))
        })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flat_terrain_has_constant_height_everywhere() {
        let terrain = Terrain::flat(16, 16, 7.5, 1.0);
        assert_eq!(terrain.height_at(0.0, 0.0), 7.5);
        assert_eq!(terrain.height_at(3.3, -2.7), 7.5);
        // Outside the grid the edge height is used.
        assert_eq!(terrain.height_at(1000.0, -1000.0), 7.5);
    }

    #[test]
    fn height_interpolates_between_samples() {
        let mut terrain = Terrain::flat(2, 2, 0.0, 1.0);
        terrain.heights = vec![0.0, 10.0, 0.0, 10.0];
        // Grid spans x in [-0.5, 0.5]; halfway between columns.
        assert!((terrain.height_at(0.0, 0.0) - 5.0).abs() < 1e-5);
        assert!((terrain.height_at(-0.25, 0.0) - 2.5).abs() < 1e-5);
    }

    #[test]
    fn grid_is_centered_on_the_origin() {
        let terrain = Terrain::flat(11, 21, 0.0, 2.0);
        assert_eq!(terrain.half_extent_x(), 10.0);
        assert_eq!(terrain.half_extent_z(), 20.0);
        let vertices = terrain.vertices();
        assert_eq!(vertices[0].position[0], -10.0);
        assert_eq!(vertices.last().unwrap().position[0], 10.0);
    }

    #[test]
    fn triangulation_covers_every_cell() {
        let terrain = Terrain::flat(4, 3, 0.0, 1.0);
        let triangles = terrain.triangles();
        assert_eq!(triangles.len(), 3 * 2 * 2);
        let max_index = triangles
            .iter()
            .flat_map(|t| t.0)
            .max()
            .unwrap();
        assert_eq!(max_index as usize, 4 * 3 - 1);
    }

    #[test]
    fn flat_ground_has_upward_normals() {
        let terrain = Terrain::flat(8, 8, 3.0, 1.0);
        for vertex in terrain.vertices() {
            assert!((vertex.normal[1] - 1.0).abs() < 1e-6);
        }
    }
}
