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

//! RGBA8 textures: ordinary 2D textures and cube maps. A cube map can be
//! filled face by face from the back buffer, which is how the environment
//! reflection is captured.

use crate::{error::FrameworkError, server::GraphicsServer, ToGlConstant};
use glow::HasContext;
use std::{marker::PhantomData, rc::Rc, rc::Weak};

/// Kind and dimensions of a texture.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TextureKind {
    Rectangle { width: usize, height: usize },
    Cube { size: usize },
}

impl TextureKind {
    fn gl_texture_target(self) -> u32 {
        match self {
            Self::Rectangle { .. } => glow::TEXTURE_2D,
            Self::Cube { .. } => glow::TEXTURE_CUBE_MAP,
        }
    }
}

/// Texture filtering mode, applied to both minification and magnification.
/// Mipmaps are generated only for the trilinear mode.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TextureFilter {
    Nearest,
    Linear,
    Trilinear,
}

impl TextureFilter {
    fn min_filter_gl(self) -> u32 {
        match self {
            Self::Nearest => glow::NEAREST,
            Self::Linear => glow::LINEAR,
            Self::Trilinear => glow::LINEAR_MIPMAP_LINEAR,
        }
    }

    fn mag_filter_gl(self) -> u32 {
        match self {
            Self::Nearest => glow::NEAREST,
            Self::Linear | Self::Trilinear => glow::LINEAR,
        }
    }
}

/// Texture coordinate wrapping mode.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum WrapMode {
    Repeat,
    ClampToEdge,
}

impl ToGlConstant for WrapMode {
    fn into_gl(self) -> u32 {
        match self {
            Self::Repeat => glow::REPEAT,
            Self::ClampToEdge => glow::CLAMP_TO_EDGE,
        }
    }
}

/// A face of a cube map.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CubeMapFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeMapFace {
    pub const ALL: [CubeMapFace; 6] = [
        CubeMapFace::PositiveX,
        CubeMapFace::NegativeX,
        CubeMapFace::PositiveY,
        CubeMapFace::NegativeY,
        CubeMapFace::PositiveZ,
        CubeMapFace::NegativeZ,
    ];

    fn into_gl(self) -> u32 {
        match self {
            Self::PositiveX => glow::TEXTURE_CUBE_MAP_POSITIVE_X,
            Self::NegativeX => glow::TEXTURE_CUBE_MAP_NEGATIVE_X,
            Self::PositiveY => glow::TEXTURE_CUBE_MAP_POSITIVE_Y,
            Self::NegativeY => glow::TEXTURE_CUBE_MAP_NEGATIVE_Y,
            Self::PositiveZ => glow::TEXTURE_CUBE_MAP_POSITIVE_Z,
            Self::NegativeZ => glow::TEXTURE_CUBE_MAP_NEGATIVE_Z,
        }
    }
}

// Scratch unit for texture parameter setup and data uploads, unbound when
// the temp binding drops so sampler bindings of the frame stay intact.
const SCRATCH_UNIT: u32 = 15;

struct TempBinding {
    server: Rc<GraphicsServer>,
    target: u32,
}

impl TempBinding {
    fn new(server: Rc<GraphicsServer>, texture: &GpuTexture) -> Self {
        let target = texture.kind.gl_texture_target();
        server.set_texture(SCRATCH_UNIT, target, Some(texture.texture));
        Self { server, target }
    }

    fn set_filter(&mut self, filter: TextureFilter) {
        unsafe {
            self.server.gl.tex_parameter_i32(
                self.target,
                glow::TEXTURE_MIN_FILTER,
                filter.min_filter_gl() as i32,
            );
            self.server.gl.tex_parameter_i32(
                self.target,
                glow::TEXTURE_MAG_FILTER,
                filter.mag_filter_gl() as i32,
            );
        }
    }

    fn set_wrap(&mut self, wrap: WrapMode) {
        unsafe {
            self.server
                .gl
                .tex_parameter_i32(self.target, glow::TEXTURE_WRAP_S, wrap.into_gl() as i32);
            self.server
                .gl
                .tex_parameter_i32(self.target, glow::TEXTURE_WRAP_T, wrap.into_gl() as i32);
            if self.target == glow::TEXTURE_CUBE_MAP {
                self.server
                    .gl
                    .tex_parameter_i32(self.target, glow::TEXTURE_WRAP_R, wrap.into_gl() as i32);
            }
        }
    }
}

impl Drop for TempBinding {
    fn drop(&mut self) {
        self.server.set_texture(SCRATCH_UNIT, self.target, None);
    }
}

fn check_data_size(kind: &str, expected: usize, actual: usize) -> Result<(), FrameworkError> {
    if expected != actual {
        Err(FrameworkError::Custom(format!(
            "Invalid {kind} texture data size: expected {expected} bytes, got {actual}"
        )))
    } else {
        Ok(())
    }
}

/// A GPU texture, released on drop.
pub struct GpuTexture {
    state: Weak<GraphicsServer>,
    texture: glow::Texture,
    kind: TextureKind,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

impl GpuTexture {
    fn alloc(server: &GraphicsServer, kind: TextureKind) -> Result<Self, FrameworkError> {
        Ok(Self {
            state: server.weak(),
            texture: unsafe { server.gl.create_texture()? },
            kind,
            thread_mark: PhantomData,
        })
    }

    /// Creates a 2D texture from tightly packed RGBA8 pixels.
    pub fn rgba8(
        server: &GraphicsServer,
        width: usize,
        height: usize,
        pixels: &[u8],
        filter: TextureFilter,
        wrap: WrapMode,
    ) -> Result<Self, FrameworkError> {
        check_data_size("2D", width * height * 4, pixels.len())?;

        let texture = Self::alloc(server, TextureKind::Rectangle { width, height })?;

        let mut binding = texture.make_temp_binding();
        unsafe {
            binding.server.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(pixels)),
            );
            if filter == TextureFilter::Trilinear {
                binding.server.gl.generate_mipmap(glow::TEXTURE_2D);
            }
        }
        binding.set_filter(filter);
        binding.set_wrap(wrap);
        drop(binding);

        Ok(texture)
    }

    /// Creates a cube map. When `faces` is `None` every face is allocated
    /// empty, the layout used for render-to-cube-map capture. Faces are
    /// ordered +X, -X, +Y, -Y, +Z, -Z.
    pub fn cube_rgba8(
        server: &GraphicsServer,
        size: usize,
        faces: Option<&[&[u8]; 6]>,
        filter: TextureFilter,
    ) -> Result<Self, FrameworkError> {
        if let Some(faces) = faces {
            for face in faces {
                check_data_size("cube face", size * size * 4, face.len())?;
            }
        }

        let texture = Self::alloc(server, TextureKind::Cube { size })?;

        let mut binding = texture.make_temp_binding();
        unsafe {
            for (index, face) in CubeMapFace::ALL.iter().enumerate() {
                binding.server.gl.tex_image_2d(
                    face.into_gl(),
                    0,
                    glow::RGBA8 as i32,
                    size as i32,
                    size as i32,
                    0,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    glow::PixelUnpackData::Slice(faces.map(|faces| faces[index])),
                );
            }
        }
        binding.set_filter(filter);
        binding.set_wrap(WrapMode::ClampToEdge);
        drop(binding);

        Ok(texture)
    }

    /// 1x1 opaque white texture, the stand-in for any missing image.
    pub fn white_dummy(server: &GraphicsServer) -> Result<Self, FrameworkError> {
        Self::rgba8(
            server,
            1,
            1,
            &[255, 255, 255, 255],
            TextureFilter::Nearest,
            WrapMode::Repeat,
        )
    }

    /// Copies a `size`x`size` region of the back buffer into one face of
    /// this cube map. The read area starts at the lower-left corner of the
    /// viewport.
    pub fn copy_face_from_back_buffer(
        &self,
        server: &GraphicsServer,
        face: CubeMapFace,
    ) -> Result<(), FrameworkError> {
        let TextureKind::Cube { size } = self.kind else {
            return Err(FrameworkError::Custom(
                "Cube map face copy requested on a 2D texture".to_owned(),
            ));
        };

        server.set_texture(SCRATCH_UNIT, glow::TEXTURE_CUBE_MAP, Some(self.texture));
        unsafe {
            server.gl.copy_tex_image_2d(
                face.into_gl(),
                0,
                glow::RGBA8,
                0,
                0,
                size as i32,
                size as i32,
                0,
            );
        }
        server.set_texture(SCRATCH_UNIT, glow::TEXTURE_CUBE_MAP, None);

        Ok(())
    }

    /// Binds the texture to the given sampler unit.
    pub fn bind(&self, server: &GraphicsServer, sampler_index: u32) {
        server.set_texture(
            sampler_index,
            self.kind.gl_texture_target(),
            Some(self.texture),
        );
    }

    fn make_temp_binding(&self) -> TempBinding {
        let server = self.state.upgrade().unwrap();
        TempBinding::new(server, self)
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                state.gl.delete_texture(self.texture);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cube_faces_follow_gl_order() {
        for pair in CubeMapFace::ALL.windows(2) {
            assert_eq!(pair[0].into_gl() + 1, pair[1].into_gl());
        }
    }

    #[test]
    fn data_size_validation() {
        assert!(check_data_size("2D", 16, 16).is_ok());
        assert!(check_data_size("2D", 16, 12).is_err());
    }

    #[test]
    fn upload_payload_wraps_an_optional_slice() {
        // Uploads go through PixelUnpackData; an absent slice allocates
        // storage without filling it, which the cube map capture relies on.
        let pixels = [255u8; 4];
        assert!(matches!(
            glow::PixelUnpackData::Slice(Some(&pixels[..])),
            glow::PixelUnpackData::Slice(Some(_))
        ));
        assert!(matches!(
            glow::PixelUnpackData::Slice(None),
            glow::PixelUnpackData::Slice(None)
        ));
    }

    #[test]
    fn trilinear_implies_mipmapped_minification() {
        assert_eq!(
            TextureFilter::Trilinear.min_filter_gl(),
            glow::LINEAR_MIPMAP_LINEAR
        );
        assert_eq!(TextureFilter::Trilinear.mag_filter_gl(), glow::LINEAR);
    }
}
