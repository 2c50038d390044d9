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

//! Graphics server: owns the OpenGL context and window surface and caches
//! pipeline state so redundant state switches never reach the driver.

use crate::error::FrameworkError;
use glow::HasContext;
use log::{info, warn};
use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};
#[cfg(not(target_arch = "wasm32"))]
use glutin::{
    config::ConfigTemplateBuilder,
    context::{
        ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentGlContext,
        PossiblyCurrentContext, Version,
    },
    display::{GetGlDisplay, GlDisplay},
    surface::{GlSurface, Surface, SwapInterval, WindowSurface},
};
#[cfg(not(target_arch = "wasm32"))]
use glutin_winit::{DisplayBuilder, GlWindow};
#[cfg(not(target_arch = "wasm32"))]
use raw_window_handle::HasRawWindowHandle;
#[cfg(not(target_arch = "wasm32"))]
use std::{ffi::CString, num::NonZeroU32};
use winit::{
    event_loop::EventLoopWindowTarget,
    window::{Window, WindowBuilder},
};

/// Flavour of the underlying GL API the context was created with.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub enum GlKind {
    OpenGL,
    OpenGLES,
}

/// Viewport rectangle in window pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Copy, Clone, Default)]
struct TextureUnit {
    texture_2d: Option<glow::Texture>,
    texture_cube: Option<glow::Texture>,
}

pub(crate) struct InnerState {
    blend: bool,
    blend_func: (u32, u32),

    depth_test: bool,
    depth_write: bool,

    clear_color: [f32; 4],
    program_point_size: bool,

    program: Option<glow::Program>,
    vao: Option<glow::VertexArray>,
    viewport: Viewport,

    active_unit: u32,
    texture_units: [TextureUnit; 16],

    gl_kind: GlKind,

    #[cfg(not(target_arch = "wasm32"))]
    gl_context: PossiblyCurrentContext,
    #[cfg(not(target_arch = "wasm32"))]
    gl_surface: Surface<WindowSurface>,
}

impl InnerState {
    fn new(
        gl_kind: GlKind,
        #[cfg(not(target_arch = "wasm32"))] gl_context: PossiblyCurrentContext,
        #[cfg(not(target_arch = "wasm32"))] gl_surface: Surface<WindowSurface>,
    ) -> Self {
        Self {
            blend: false,
            blend_func: (glow::ONE, glow::ZERO),
            depth_test: false,
            depth_write: true,
            clear_color: [0.0, 0.0, 0.0, 0.0],
            program_point_size: false,
            program: None,
            vao: None,
            viewport: Viewport::new(0, 0, 1, 1),
            active_unit: 0,
            texture_units: Default::default(),
            gl_kind,
            #[cfg(not(target_arch = "wasm32"))]
            gl_context,
            #[cfg(not(target_arch = "wasm32"))]
            gl_surface,
        }
    }
}

pub struct GraphicsServer {
    pub gl: glow::Context,
    pub(crate) state: RefCell<InnerState>,
    this: RefCell<Option<Weak<GraphicsServer>>>,
}

pub type SharedGraphicsServer = Rc<GraphicsServer>;

impl GraphicsServer {
    /// Creates a window together with a GL 3.3 core context (with a GLES 3.0
    /// fallback) and wraps it in a shared graphics server.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        vsync: bool,
        msaa_sample_count: Option<u8>,
        window_target: &EventLoopWindowTarget<()>,
        window_builder: WindowBuilder,
    ) -> Result<(Window, SharedGraphicsServer), FrameworkError> {
        let (window, gl_context, gl_surface, context, gl_kind) = {
            let mut template = ConfigTemplateBuilder::new()
                .prefer_hardware_accelerated(Some(true))
                .with_depth_size(24);

            if let Some(sample_count) = msaa_sample_count {
                template = template.with_multisampling(sample_count);
            }

            let (opt_window, gl_config) = DisplayBuilder::new()
                .with_window_builder(Some(window_builder))
                .build(window_target, template, |mut configs| {
                    configs.next().unwrap()
                })?;

            let window = opt_window
                .ok_or_else(|| FrameworkError::Custom("no window was created".to_string()))?;

            let raw_window_handle = window.raw_window_handle();
            let gl_display = gl_config.display();

            let gl3_3_core_context_attributes = ContextAttributesBuilder::new()
                .with_profile(GlProfile::Core)
                .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
                .build(Some(raw_window_handle));

            let gles3_context_attributes = ContextAttributesBuilder::new()
                .with_profile(GlProfile::Core)
                .with_context_api(ContextApi::Gles(Some(Version::new(3, 0))))
                .build(Some(raw_window_handle));

            unsafe {
                let attrs = window.build_surface_attributes(Default::default());

                let gl_surface = gl_config
                    .display()
                    .create_window_surface(&gl_config, &attrs)?;

                let (non_current_gl_context, gl_kind) = if let Ok(gl3_3_core_context) =
                    gl_display.create_context(&gl_config, &gl3_3_core_context_attributes)
                {
                    (gl3_3_core_context, GlKind::OpenGL)
                } else {
                    (
                        gl_display.create_context(&gl_config, &gles3_context_attributes)?,
                        GlKind::OpenGLES,
                    )
                };

                let gl_context = non_current_gl_context.make_current(&gl_surface)?;

                if vsync {
                    if let Err(err) = gl_surface
                        .set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::MIN))
                    {
                        warn!("Failed to enable vsync: {err:?}");
                    }
                }

                (
                    window,
                    gl_context,
                    gl_surface,
                    glow::Context::from_loader_function(|s| {
                        gl_display.get_proc_address(&CString::new(s).unwrap())
                    }),
                    gl_kind,
                )
            }
        };

        gl_surface.resize(
            &gl_context,
            NonZeroU32::new(window.inner_size().width).unwrap_or(NonZeroU32::MIN),
            NonZeroU32::new(window.inner_size().height).unwrap_or(NonZeroU32::MIN),
        );

        unsafe {
            info!(
                "GL vendor: {}, renderer: {}, version: {}",
                context.get_parameter_string(glow::VENDOR),
                context.get_parameter_string(glow::RENDERER),
                context.get_parameter_string(glow::VERSION),
            );
        }

        let state = Self {
            gl: context,
            state: RefCell::new(InnerState::new(gl_kind, gl_context, gl_surface)),
            this: Default::default(),
        };

        let shared = Rc::new(state);

        *shared.this.borrow_mut() = Some(Rc::downgrade(&shared));

        Ok((window, shared))
    }

    pub fn weak(&self) -> Weak<Self> {
        self.this.borrow().as_ref().unwrap().clone()
    }

    pub fn gl_kind(&self) -> GlKind {
        self.state.borrow().gl_kind
    }

    pub(crate) fn set_program(&self, program: Option<glow::Program>) {
        let mut state = self.state.borrow_mut();
        if state.program != program {
            state.program = program;

            unsafe {
                self.gl.use_program(state.program);
            }
        }
    }

    pub(crate) fn set_vertex_array_object(&self, vao: Option<glow::VertexArray>) {
        let mut state = self.state.borrow_mut();
        if state.vao != vao {
            state.vao = vao;

            unsafe {
                self.gl.bind_vertex_array(state.vao);
            }
        }
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        let mut state = self.state.borrow_mut();
        if state.viewport != viewport {
            state.viewport = viewport;

            unsafe {
                self.gl.viewport(
                    state.viewport.x,
                    state.viewport.y,
                    state.viewport.width,
                    state.viewport.height,
                );
            }
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.state.borrow().viewport
    }

    pub fn set_blend(&self, blend: bool) {
        let mut state = self.state.borrow_mut();
        if state.blend != blend {
            state.blend = blend;

            unsafe {
                if state.blend {
                    self.gl.enable(glow::BLEND);
                } else {
                    self.gl.disable(glow::BLEND);
                }
            }
        }
    }

    /// Standard alpha blending (`SRC_ALPHA`, `ONE_MINUS_SRC_ALPHA`).
    pub fn set_alpha_blend_func(&self) {
        let mut state = self.state.borrow_mut();
        let func = (glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
        if state.blend_func != func {
            state.blend_func = func;

            unsafe {
                self.gl.blend_func(func.0, func.1);
            }
        }
    }

    /// Additive blending for glowing effects (`SRC_ALPHA`, `ONE`).
    pub fn set_additive_blend_func(&self) {
        let mut state = self.state.borrow_mut();
        let func = (glow::SRC_ALPHA, glow::ONE);
        if state.blend_func != func {
            state.blend_func = func;

            unsafe {
                self.gl.blend_func(func.0, func.1);
            }
        }
    }

    pub fn set_depth_test(&self, depth_test: bool) {
        let mut state = self.state.borrow_mut();
        if state.depth_test != depth_test {
            state.depth_test = depth_test;

            unsafe {
                if state.depth_test {
                    self.gl.enable(glow::DEPTH_TEST);
                } else {
                    self.gl.disable(glow::DEPTH_TEST);
                }
            }
        }
    }

    pub fn set_depth_write(&self, depth_write: bool) {
        let mut state = self.state.borrow_mut();
        if state.depth_write != depth_write {
            state.depth_write = depth_write;

            unsafe {
                self.gl.depth_mask(state.depth_write);
            }
        }
    }

    /// Lets vertex shaders control point sprite size via `gl_PointSize`.
    pub fn set_program_point_size(&self, enabled: bool) {
        let mut state = self.state.borrow_mut();
        if state.program_point_size != enabled {
            state.program_point_size = enabled;

            unsafe {
                if state.program_point_size {
                    self.gl.enable(glow::PROGRAM_POINT_SIZE);
                } else {
                    self.gl.disable(glow::PROGRAM_POINT_SIZE);
                }
            }
        }
    }

    pub fn set_clear_color(&self, color: [f32; 4]) {
        let mut state = self.state.borrow_mut();
        if state.clear_color != color {
            state.clear_color = color;

            unsafe {
                self.gl
                    .clear_color(color[0], color[1], color[2], color[3]);
            }
        }
    }

    /// Clears the color and depth buffers of the current framebuffer.
    pub fn clear(&self) {
        unsafe {
            self.gl
                .clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }
    }

    pub(crate) fn set_texture(&self, unit_index: u32, target: u32, texture: Option<glow::Texture>) {
        let mut state_guard = self.state.borrow_mut();
        let state = &mut *state_guard;

        let unit = &mut state.texture_units[unit_index as usize];
        let binding = match target {
            glow::TEXTURE_CUBE_MAP => &mut unit.texture_cube,
            _ => &mut unit.texture_2d,
        };

        if *binding != texture || state.active_unit != unit_index {
            *binding = texture;

            if state.active_unit != unit_index {
                state.active_unit = unit_index;
                unsafe {
                    self.gl.active_texture(glow::TEXTURE0 + unit_index);
                }
            }

            unsafe {
                self.gl.bind_texture(target, texture);
            }
        }
    }

    pub fn swap_buffers(&self) -> Result<(), FrameworkError> {
        let state = self.state.borrow();
        Ok(state.gl_surface.swap_buffers(&state.gl_context)?)
    }

    pub fn set_frame_size(&self, new_size: (u32, u32)) {
        let state = self.state.borrow();
        state.gl_surface.resize(
            &state.gl_context,
            NonZeroU32::new(new_size.0).unwrap_or(NonZeroU32::MIN),
            NonZeroU32::new(new_size.1).unwrap_or(NonZeroU32::MIN),
        );
    }
}
