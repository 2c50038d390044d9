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

//! Errors that may occur during initialization of the graphics server or
//! while creating GPU resources.

/// Set of possible graphics framework errors.
#[derive(Debug, thiserror::Error)]
pub enum FrameworkError {
    /// Compilation of a shader has failed, the exact reason is in `error_message`.
    #[error("Compilation of \"{shader_name}\" shader has failed: {error_message}")]
    ShaderCompilationFailed {
        /// Name of the shader.
        shader_name: String,
        /// Compilation error message pulled from the driver's info log.
        error_message: String,
    },
    /// Shader source was empty or could not be read.
    #[error("Shader \"{0}\" has no source code")]
    EmptyShaderSource(String),
    /// Program link stage failed, the exact reason is in `error_message`.
    #[error("Linking program \"{program_name}\" failed: {error_message}")]
    ProgramLinkingFailed {
        /// Name of the program.
        program_name: String,
        /// Linking error message pulled from the driver's info log.
        error_message: String,
    },
    /// Driver-side program validation reported a problem.
    #[error("Validation of program \"{program_name}\" failed: {error_message}")]
    ProgramValidationFailed {
        /// Name of the program.
        program_name: String,
        /// Validation log.
        error_message: String,
    },
    /// An attribute descriptor tried to define an attribute that does not fit
    /// in the vertex it describes.
    #[error("An attribute descriptor does not fit in the vertex of {element_size} bytes")]
    InvalidAttributeDescriptor {
        /// Size of a single vertex in bytes.
        element_size: usize,
    },
    /// Tried to draw an element range that the geometry buffer does not have.
    #[error("Invalid element range: start {start}, end {end}, total {total}")]
    InvalidElementRange {
        /// First element index.
        start: usize,
        /// Past-the-end element index.
        end: usize,
        /// Total amount of elements in the buffer.
        total: usize,
    },
    /// Custom error. Usually used for windowing and context creation failures.
    #[error("Custom error: {0}")]
    Custom(String),
}

impl From<String> for FrameworkError {
    fn from(v: String) -> Self {
        Self::Custom(v)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<glutin::error::Error> for FrameworkError {
    fn from(err: glutin::error::Error) -> Self {
        Self::Custom(format!("{err:?}"))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl From<Box<dyn std::error::Error>> for FrameworkError {
    fn from(err: Box<dyn std::error::Error>) -> Self {
        Self::Custom(format!("{err:?}"))
    }
}

impl From<std::io::Error> for FrameworkError {
    fn from(err: std::io::Error) -> Self {
        Self::Custom(err.to_string())
    }
}
