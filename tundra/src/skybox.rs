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

//! Skybox: six inward-facing quads, one image per face, drawn around the
//! camera with depth writes off so everything else renders in front of it.

use crate::{error::TundraError, terrain::standard_location};
use tundra_graphics::{
    geometry_buffer::{
        AttributeDefinition, AttributeKind, BufferBuilder, GeometryBuffer, GeometryBufferBuilder,
        TriangleDefinition,
    },
    program::{GpuProgram, StandardAttribute},
    server::GraphicsServer,
    texture::GpuTexture,
    BufferUsage, ElementKind, ElementRange,
};

const HALF_EXTENT: f32 = 400.0;

#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct SkyVertex {
    position: [f32; 3],
    tex_coord: [f32; 2],
}

// One quad per face, inward winding, face order front, back, left, right,
// up, down to match the settings file.
fn face_quads() -> Vec<SkyVertex> {
    let h = HALF_EXTENT;
    let quad = |corners: [[f32; 3]; 4]| {
        [
            SkyVertex {
                position: corners[0],
                tex_coord: [0.0, 1.0],
            },
            SkyVertex {
                position: corners[1],
                tex_coord: [1.0, 1.0],
            },
            SkyVertex {
                position: corners[2],
                tex_coord: [1.0, 0.0],
            },
            SkyVertex {
                position: corners[3],
                tex_coord: [0.0, 0.0],
            },
        ]
    };

    let mut vertices = Vec::with_capacity(24);
    // Front (-Z).
    vertices.extend(quad([
        [-h, -h, -h],
        [h, -h, -h],
        [h, h, -h],
        [-h, h, -h],
    ]));
    // Back (+Z).
    vertices.extend(quad([[h, -h, h], [-h, -h, h], [-h, h, h], [h, h, h]]));
    // Left (-X).
    vertices.extend(quad([
        [-h, -h, h],
        [-h, -h, -h],
        [-h, h, -h],
        [-h, h, h],
    ]));
    // Right (+X).
    vertices.extend(quad([[h, -h, -h], [h, -h, h], [h, h, h], [h, h, -h]]));
    // Up (+Y).
    vertices.extend(quad([[-h, h, -h], [h, h, -h], [h, h, h], [-h, h, h]]));
    // Down (-Y).
    vertices.extend(quad([
        [-h, -h, h],
        [h, -h, h],
        [h, -h, -h],
        [-h, -h, -h],
    ]));
    vertices
}

fn face_triangles() -> Vec<TriangleDefinition> {
    (0..6u32)
        .flat_map(|face| {
            let base = face * 4;
            [
                TriangleDefinition([base, base + 1, base + 2]),
                TriangleDefinition([base, base + 2, base + 3]),
            ]
        })
        .collect()
}

pub struct SkyBox {
    geometry: GeometryBuffer,
    textures: [GpuTexture; 6],
}

impl SkyBox {
    pub fn new(
        server: &GraphicsServer,
        program: &GpuProgram,
        textures: [GpuTexture; 6],
    ) -> Result<Self, TundraError> {
        let geometry = GeometryBufferBuilder::new(ElementKind::Triangle)
            .with_buffer_builder(
                BufferBuilder::new(BufferUsage::StaticDraw, &face_quads())
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

        geometry.bind(server).set_triangles(&face_triangles());

        Ok(Self { geometry, textures })
    }

    /// Draws all six faces, binding each face texture to sampler unit 0.
    /// The program must already be bound with its uniforms set.
    pub fn draw(&self, server: &GraphicsServer) -> Result<(), TundraError> {
        for (face, texture) in self.textures.iter().enumerate() {
            texture.bind(server, 0);
            self.geometry.bind(server).draw(ElementRange::Specific {
                offset: face * 2,
                count: 2,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn six_faces_of_four_corners_each() {
        assert_eq!(face_quads().len(), 24);
        assert_eq!(face_triangles().len(), 12);
    }

    #[test]
    fn every_corner_sits_on_the_box_shell() {
        for vertex in face_quads() {
            assert!(vertex
                .position
                .iter()
                .any(|c| c.abs() == HALF_EXTENT));
        }
    }

    #[test]
    fn face_triangles_only_reference_their_own_quad() {
        for (face, pair) in face_triangles().chunks(2).enumerate() {
            let base = face as u32 * 4;
            for triangle in pair {
                for index in triangle.0 {
                    assert!(index >= base && index < base + 4);
                }
            }
        }
    }
}
