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

//! Vertex array objects with their backing vertex and index buffers. A
//! geometry buffer owns one or more vertex buffers (each with its own
//! attribute layout) plus an index buffer, and draws through a binding
//! guard so the right VAO is always bound.

use crate::{
    error::FrameworkError, server::GraphicsServer, BufferUsage, ElementKind, ElementRange,
    ToGlConstant,
};
use glow::HasContext;
use std::{cell::Cell, marker::PhantomData, mem::size_of, rc::Weak};

/// A single triangle of a triangle list, as three indices into the vertex
/// buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(transparent)]
pub struct TriangleDefinition(pub [u32; 3]);

#[derive(Copy, Clone, PartialEq, Eq)]
enum BufferKind {
    Vertex,
    Index,
}

impl ToGlConstant for BufferKind {
    fn into_gl(self) -> u32 {
        match self {
            Self::Vertex => glow::ARRAY_BUFFER,
            Self::Index => glow::ELEMENT_ARRAY_BUFFER,
        }
    }
}

struct NativeBuffer {
    state: Weak<GraphicsServer>,
    id: glow::Buffer,
    kind: BufferKind,
    usage: BufferUsage,
    size: Cell<usize>,
}

impl NativeBuffer {
    fn new(
        server: &GraphicsServer,
        kind: BufferKind,
        usage: BufferUsage,
    ) -> Result<Self, FrameworkError> {
        Ok(Self {
            state: server.weak(),
            id: unsafe { server.gl.create_buffer()? },
            kind,
            usage,
            size: Cell::new(0),
        })
    }

    fn write_data(&self, data: &[u8], usage: BufferUsage) {
        if let Some(server) = self.state.upgrade() {
            let target = self.kind.into_gl();
            unsafe {
                server.gl.bind_buffer(target, Some(self.id));
                if data.len() <= self.size.get() && usage == self.usage {
                    server.gl.buffer_sub_data_u8_slice(target, 0, data);
                } else {
                    server.gl.buffer_data_u8_slice(target, data, usage.into_gl());
                    self.size.set(data.len());
                }
            }
        }
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                state.gl.delete_buffer(self.id);
            }
        }
    }
}

/// Data type and arity of a single vertex attribute.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AttributeKind {
    Float,
    Float2,
    Float3,
    Float4,

    UnsignedByte4,
    UnsignedInt4,
}

/// Describes one attribute of a vertex buffer. Attributes are laid out
/// sequentially within a vertex, in the order they are added to the builder.
pub struct AttributeDefinition {
    pub location: u32,
    pub kind: AttributeKind,
    pub normalized: bool,
    pub divisor: u32,
}

impl AttributeKind {
    pub fn size_bytes(self) -> usize {
        match self {
            AttributeKind::Float => size_of::<f32>(),
            AttributeKind::Float2 => size_of::<f32>() * 2,
            AttributeKind::Float3 => size_of::<f32>() * 3,
            AttributeKind::Float4 => size_of::<f32>() * 4,

            AttributeKind::UnsignedByte4 => size_of::<u8>() * 4,
            AttributeKind::UnsignedInt4 => size_of::<u32>() * 4,
        }
    }

    fn get_type(self) -> u32 {
        match self {
            AttributeKind::Float
            | AttributeKind::Float2
            | AttributeKind::Float3
            | AttributeKind::Float4 => glow::FLOAT,

            AttributeKind::UnsignedByte4 => glow::UNSIGNED_BYTE,
            AttributeKind::UnsignedInt4 => glow::UNSIGNED_INT,
        }
    }

    fn length(self) -> usize {
        match self {
            AttributeKind::Float => 1,
            AttributeKind::Float2 => 2,
            AttributeKind::Float3 => 3,
            AttributeKind::Float4 | AttributeKind::UnsignedByte4 | AttributeKind::UnsignedInt4 => 4,
        }
    }
}

// Byte offset of each attribute within a vertex, or an error when the
// attributes do not fit in the declared vertex size.
fn layout_offsets(
    attributes: &[AttributeDefinition],
    element_size: usize,
) -> Result<Vec<usize>, FrameworkError> {
    let mut offsets = Vec::with_capacity(attributes.len());
    let mut offset = 0usize;
    for definition in attributes {
        offsets.push(offset);
        offset += definition.kind.size_bytes();
        if offset > element_size {
            return Err(FrameworkError::InvalidAttributeDescriptor { element_size });
        }
    }
    Ok(offsets)
}

/// Vertex array object together with its vertex buffers and index buffer.
pub struct GeometryBuffer {
    state: Weak<GraphicsServer>,
    vertex_array_object: glow::VertexArray,
    buffers: Vec<NativeBuffer>,
    element_buffer: NativeBuffer,
    element_count: Cell<usize>,
    element_kind: ElementKind,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

/// A bound geometry buffer; the only way to upload indices or issue draw
/// calls for it.
pub struct GeometryBufferBinding<'a> {
    server: &'a GraphicsServer,
    buffer: &'a GeometryBuffer,
}

impl GeometryBufferBinding<'_> {
    pub fn set_triangles(self, triangles: &[TriangleDefinition]) -> Self {
        assert_eq!(self.buffer.element_kind, ElementKind::Triangle);
        self.buffer.element_count.set(triangles.len());
        self.set_elements(bytemuck::cast_slice(triangles));
        self
    }

    pub fn set_lines(self, lines: &[[u32; 2]]) -> Self {
        assert_eq!(self.buffer.element_kind, ElementKind::Line);
        self.buffer.element_count.set(lines.len());
        self.set_elements(bytemuck::cast_slice(lines));
        self
    }

    pub fn set_points(self, points: &[u32]) -> Self {
        assert_eq!(self.buffer.element_kind, ElementKind::Point);
        self.buffer.element_count.set(points.len());
        self.set_elements(bytemuck::cast_slice(points));
        self
    }

    fn set_elements(&self, data: &[u8]) {
        self.buffer
            .element_buffer
            .write_data(data, BufferUsage::StaticDraw)
    }

    /// Draws a range of elements through the index buffer. The range is
    /// checked against the buffer's element count before any GL call.
    pub fn draw(&self, element_range: ElementRange) -> Result<(), FrameworkError> {
        let (offset, count) = match element_range {
            ElementRange::Full => (0, self.buffer.element_count.get()),
            ElementRange::Specific { offset, count } => (offset, count),
        };

        let last_element_index = offset + count;

        if last_element_index > self.buffer.element_count.get() {
            Err(FrameworkError::InvalidElementRange {
                start: offset,
                end: last_element_index,
                total: self.buffer.element_count.get(),
            })
        } else {
            let index_per_element = self.buffer.element_kind.index_per_element();
            let start_index = offset * index_per_element;
            let index_count = count * index_per_element;

            if index_count > 0 {
                let indices = (start_index * size_of::<u32>()) as i32;
                unsafe {
                    self.server.gl.draw_elements(
                        self.buffer.element_kind.into_gl(),
                        index_count as i32,
                        glow::UNSIGNED_INT,
                        indices,
                    );
                }
            }

            Ok(())
        }
    }
}

impl GeometryBuffer {
    /// Overwrites the contents of one of the vertex buffers.
    pub fn set_buffer_data<T: bytemuck::Pod>(&mut self, buffer: usize, data: &[T]) {
        self.buffers[buffer].write_data(bytemuck::cast_slice(data), self.buffers[buffer].usage);
    }

    pub fn bind<'a>(&'a self, server: &'a GraphicsServer) -> GeometryBufferBinding<'a> {
        server.set_vertex_array_object(Some(self.vertex_array_object));

        GeometryBufferBinding {
            server,
            buffer: self,
        }
    }

    pub fn element_count(&self) -> usize {
        self.element_count.get()
    }
}

impl Drop for GeometryBuffer {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                self.buffers.clear();
                state.gl.delete_vertex_array(self.vertex_array_object);
            }
        }
    }
}

/// Describes one vertex buffer of a geometry buffer: its initial data,
/// usage hint and attribute layout.
pub struct BufferBuilder {
    element_size: usize,
    usage: BufferUsage,
    attributes: Vec<AttributeDefinition>,
    data: Vec<u8>,
}

impl BufferBuilder {
    pub fn new<T: bytemuck::Pod>(usage: BufferUsage, data: &[T]) -> Self {
        Self {
            usage,
            attributes: Default::default(),
            element_size: size_of::<T>(),
            data: bytemuck::cast_slice(data).to_vec(),
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeDefinition) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn build(self, server: &GraphicsServer) -> Result<NativeBuffer, FrameworkError> {
        let offsets = layout_offsets(&self.attributes, self.element_size)?;

        let native_buffer = NativeBuffer::new(server, BufferKind::Vertex, self.usage)?;
        if !self.data.is_empty() {
            native_buffer.write_data(&self.data, self.usage);
        }

        unsafe {
            server
                .gl
                .bind_buffer(glow::ARRAY_BUFFER, Some(native_buffer.id));

            for (definition, offset) in self.attributes.iter().zip(offsets) {
                server.gl.vertex_attrib_pointer_f32(
                    definition.location,
                    definition.kind.length() as i32,
                    definition.kind.get_type(),
                    definition.normalized,
                    self.element_size as i32,
                    offset as i32,
                );
                server
                    .gl
                    .vertex_attrib_divisor(definition.location, definition.divisor);
                server.gl.enable_vertex_attrib_array(definition.location);
            }
        }

        Ok(native_buffer)
    }
}

/// Builds a geometry buffer from one or more vertex buffer descriptions.
pub struct GeometryBufferBuilder {
    element_kind: ElementKind,
    buffers: Vec<BufferBuilder>,
}

impl GeometryBufferBuilder {
    pub fn new(element_kind: ElementKind) -> Self {
        Self {
            element_kind,
            buffers: Default::default(),
        }
    }

    pub fn with_buffer_builder(mut self, builder: BufferBuilder) -> Self {
        self.buffers.push(builder);
        self
    }

    pub fn build(self, server: &GraphicsServer) -> Result<GeometryBuffer, FrameworkError> {
        let vao = unsafe { server.gl.create_vertex_array()? };

        server.set_vertex_array_object(Some(vao));

        let element_buffer =
            NativeBuffer::new(server, BufferKind::Index, BufferUsage::StaticDraw)?;

        let mut buffers = Vec::new();
        for builder in self.buffers {
            buffers.push(builder.build(server)?);
        }

        server.set_vertex_array_object(None);

        Ok(GeometryBuffer {
            state: server.weak(),
            vertex_array_object: vao,
            buffers,
            element_buffer,
            element_count: Cell::new(0),
            element_kind: self.element_kind,
            thread_mark: PhantomData,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn attribute_sizes_match_lengths() {
        for kind in [
            AttributeKind::Float,
            AttributeKind::Float2,
            AttributeKind::Float3,
            AttributeKind::Float4,
        ] {
            assert_eq!(kind.size_bytes(), kind.length() * size_of::<f32>());
        }
        assert_eq!(AttributeKind::UnsignedByte4.size_bytes(), 4);
        assert_eq!(AttributeKind::UnsignedInt4.size_bytes(), 16);
    }

    #[test]
    fn layout_offsets_are_sequential() {
        let attributes = [
            AttributeDefinition {
                location: 0,
                kind: AttributeKind::Float3,
                normalized: false,
                divisor: 0,
            },
            AttributeDefinition {
                location: 1,
                kind: AttributeKind::Float3,
                normalized: false,
                divisor: 0,
            },
            AttributeDefinition {
                location: 2,
                kind: AttributeKind::Float2,
                normalized: false,
                divisor: 0,
            },
        ];
        let offsets = layout_offsets(&attributes, 8 * size_of::<f32>()).unwrap();
        assert_eq!(offsets, [0, 12, 24]);
    }

    #[test]
    fn oversized_layout_is_rejected() {
        let attributes = [AttributeDefinition {
            location: 0,
            kind: AttributeKind::Float4,
            normalized: false,
            divisor: 0,
        }];
        assert!(matches!(
            layout_offsets(&attributes, size_of::<f32>() * 3),
            Err(FrameworkError::InvalidAttributeDescriptor { .. })
        ));
    }

    #[test]
    fn triangle_definitions_cast_to_plain_indices() {
        let triangles = [TriangleDefinition([0, 1, 2]), TriangleDefinition([2, 1, 3])];
        let raw: &[u8] = bytemuck::cast_slice(&triangles);
        assert_eq!(raw.len(), 2 * 3 * size_of::<u32>());
    }
}
