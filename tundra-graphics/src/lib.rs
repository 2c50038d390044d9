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

//! A thin OpenGL abstraction layer: graphics server with cached pipeline
//! state, shader program management with standard-slot alias resolution,
//! geometry buffers and textures. Every GPU resource releases its native
//! object on drop while the server is alive.

pub mod error;
pub mod geometry_buffer;
pub mod program;
pub mod server;
pub mod texture;

/// Kind of elements a geometry buffer is made of.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ElementKind {
    Triangle,
    Line,
    Point,
}

impl ElementKind {
    pub(crate) fn index_per_element(self) -> usize {
        match self {
            ElementKind::Triangle => 3,
            ElementKind::Line => 2,
            ElementKind::Point => 1,
        }
    }
}

/// A portion of elements of a geometry buffer to draw.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum ElementRange {
    #[default]
    Full,
    Specific {
        offset: usize,
        count: usize,
    },
}

/// Expected usage pattern of a GPU buffer.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BufferUsage {
    StaticDraw,
    DynamicDraw,
    StreamDraw,
}

pub(crate) trait ToGlConstant {
    fn into_gl(self) -> u32;
}

impl ToGlConstant for BufferUsage {
    fn into_gl(self) -> u32 {
        match self {
            Self::StaticDraw => glow::STATIC_DRAW,
            Self::DynamicDraw => glow::DYNAMIC_DRAW,
            Self::StreamDraw => glow::STREAM_DRAW,
        }
    }
}

impl ToGlConstant for ElementKind {
    fn into_gl(self) -> u32 {
        match self {
            Self::Triangle => glow::TRIANGLES,
            Self::Line => glow::LINES,
            Self::Point => glow::POINTS,
        }
    }
}
