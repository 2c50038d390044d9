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

//! Shader and program management.
//!
//! Shader source files written by different authors use different spellings
//! for the same vertex attributes and material uniforms. After a successful
//! link the program probes an ordered candidate-name list for each standard
//! role and keeps the first name that resolves to a valid location, so the
//! same rendering code works against heterogeneous shader sources. Arbitrary
//! names are resolved on demand and memoized; a name that never resolves
//! degrades to a silent no-op on send rather than aborting the frame.

use crate::{error::FrameworkError, server::GraphicsServer};
use fxhash::FxHashMap;
use glow::HasContext;
use log::{info, warn};
use nalgebra::{Matrix4, Vector2, Vector3, Vector4};
use std::{
    cell::RefCell,
    marker::PhantomData,
    path::Path,
    rc::Weak,
};
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{AsRefStr, EnumCount as EnumCountMacro, EnumIter};

/// Kind of a GPU shader object.
#[derive(Copy, Clone, PartialEq, Eq, Debug, AsRefStr)]
pub enum ShaderKind {
    Vertex,
    Fragment,
}

impl ShaderKind {
    fn into_gl(self) -> u32 {
        match self {
            ShaderKind::Vertex => glow::VERTEX_SHADER,
            ShaderKind::Fragment => glow::FRAGMENT_SHADER,
        }
    }

    /// Human-readable name used in log and error messages.
    pub fn display_name(self) -> &'static str {
        match self {
            ShaderKind::Vertex => "Vertex Shader",
            ShaderKind::Fragment => "Fragment Shader",
        }
    }
}

/// A single GPU shader object with its source text. The underlying GL object
/// is released on drop; it may be dropped as soon as every program that needs
/// it has been linked.
pub struct GpuShader {
    state: Weak<GraphicsServer>,
    pub(crate) id: glow::Shader,
    name: String,
    kind: ShaderKind,
    source: String,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

impl GpuShader {
    /// Allocates a new shader object of the given kind.
    pub fn new(
        server: &GraphicsServer,
        name: &str,
        kind: ShaderKind,
    ) -> Result<Self, FrameworkError> {
        let id = unsafe { server.gl.create_shader(kind.into_gl())? };
        Ok(Self {
            state: server.weak(),
            id,
            name: name.to_owned(),
            kind,
            source: String::new(),
            thread_mark: PhantomData,
        })
    }

    /// Uploads source text to the shader object. Fails if the text is empty,
    /// otherwise always succeeds once the GL call is issued.
    pub fn set_source(&mut self, source: &str) -> Result<(), FrameworkError> {
        if source.is_empty() {
            return Err(FrameworkError::EmptyShaderSource(self.name.clone()));
        }
        self.source = source.to_owned();
        if let Some(server) = self.state.upgrade() {
            unsafe {
                server.gl.shader_source(self.id, &self.source);
            }
        }
        Ok(())
    }

    /// Reads the whole file into the source text. An unreadable file leaves
    /// the source empty, which `set_source` reports as a failure.
    pub fn set_source_from_file(&mut self, path: &Path) -> Result<(), FrameworkError> {
        let source = std::fs::read_to_string(path).unwrap_or_default();
        self.set_source(&source)
    }

    /// Compiles the shader. On failure the error carries the driver's
    /// compile log.
    pub fn compile(&self) -> Result<(), FrameworkError> {
        let server = self.state.upgrade().unwrap();

        unsafe {
            server.gl.compile_shader(self.id);

            let status = server.gl.get_shader_compile_status(self.id);
            let compilation_message = server.gl.get_shader_info_log(self.id);

            if !status {
                Err(FrameworkError::ShaderCompilationFailed {
                    shader_name: self.name.clone(),
                    error_message: compilation_message,
                })
            } else {
                if compilation_message.chars().all(|c| c.is_whitespace()) {
                    info!("{} {} compiled successfully!", self.kind.display_name(), self.name);
                } else {
                    info!(
                        "{} {} compiled successfully!\nAdditional info: {}",
                        self.kind.display_name(),
                        self.name,
                        compilation_message
                    );
                }
                Ok(())
            }
        }
    }

    /// Creates, loads and compiles a shader in one go.
    pub fn from_source(
        server: &GraphicsServer,
        name: &str,
        kind: ShaderKind,
        source: &str,
    ) -> Result<Self, FrameworkError> {
        let mut shader = Self::new(server, name, kind)?;
        shader.set_source(source)?;
        shader.compile()?;
        Ok(shader)
    }

    /// Creates, loads and compiles a shader from a source file.
    pub fn from_file(
        server: &GraphicsServer,
        name: &str,
        kind: ShaderKind,
        path: &Path,
    ) -> Result<Self, FrameworkError> {
        let mut shader = Self::new(server, name, kind)?;
        shader.set_source_from_file(path)?;
        shader.compile()?;
        Ok(shader)
    }

    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl Drop for GpuShader {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                state.gl.delete_shader(self.id);
            }
        }
    }
}

/// Standard vertex attribute roles that rendering code accesses by role
/// rather than by shader-specific name.
#[derive(Copy, Clone, PartialEq, Eq, Debug, AsRefStr, EnumCountMacro, EnumIter)]
pub enum StandardAttribute {
    Vertex,
    Normal,
    TexCoord,
    Tangent,
    Bitangent,
    Color,
    BoneId,
    BoneWeight,
}

/// Standard uniform roles.
#[derive(Copy, Clone, PartialEq, Eq, Debug, AsRefStr, EnumCountMacro, EnumIter)]
pub enum StandardUniform {
    ModelView,
    MatAmbient,
    MatDiffuse,
    MatSpecular,
    MatEmissive,
    MatShininess,
}

// Historical alias sets, in probing order. These accumulated over years of
// student shader sources and must keep their exact order: the first name
// that resolves to a valid location wins.

const VERTEX_ALIASES: &[&str] = &["a_vertex", "a_Vertex", "aVertex", "avertex", "vertex", "Vertex"];

const NORMAL_ALIASES: &[&str] = &["a_normal", "a_Normal", "aNormal", "anormal", "normal", "Normal"];

const TEXCOORD_ALIASES: &[&str] = &[
    "a_texcoord", "a_TexCoord", "aTexCoord", "atexcoord", "texcoord", "TexCoord",
];

const TANGENT_ALIASES: &[&str] = &[
    "a_tangent", "a_Tangent", "aTangent", "atangent", "tangent", "Tangent",
];

const BITANGENT_ALIASES: &[&str] = &[
    "a_bitangent", "a_Bitangent", "aBitangent", "abitangent", "bitangent", "Bitangent",
    "a_biTangent", "a_BiTangent", "aBiTangent", "abiTangent", "biTangent", "BiTangent",
];

const COLOR_ALIASES: &[&str] = &["a_color", "a_Color", "aColor", "acolor", "color", "Color"];

const BONE_ID_ALIASES: &[&str] = &[
    "a_boneid", "a_Boneid", "aBoneid", "aboneid", "boneid", "Boneid",
    "a_boneId", "a_BoneId", "aBoneId", "aboneId", "boneId", "BoneId",
    "a_boneids", "a_Boneids", "aBoneids", "aboneids", "boneids", "Boneids",
    "a_boneIds", "a_BoneIds", "aBoneIds", "aboneIds", "boneIds", "BoneIds",
];

const BONE_WEIGHT_ALIASES: &[&str] = &[
    "a_boneweight", "a_Boneweight", "aBoneweight", "aboneweight", "boneweight", "Boneweight",
    "a_boneWeight", "a_BoneWeight", "aBoneWeight", "aboneWeight", "boneWeight", "BoneWeight",
    "a_weight", "aweight", "weight", "a_Weight", "aWeight", "Weight",
    "a_boneweights", "a_Boneweights", "aBoneweights", "aboneweights", "boneweights", "Boneweights",
    "a_boneWeights", "a_BoneWeights", "aBoneWeights", "aboneWeights", "boneWeights", "BoneWeights",
    "a_weights", "aweights", "weights", "a_Weights", "aWeights", "Weights",
];

const MODEL_VIEW_ALIASES: &[&str] = &[
    "modelview_matrix", "modelView_matrix", "ModelView_matrix", "Modelview_matrix",
    "modelview_Matrix", "modelView_Matrix", "ModelView_Matrix", "Modelview_Matrix",
    "matrix_modelview", "matrix_modelView", "matrix_ModelView", "matrix_Modelview",
    "Matrix_modelview", "Matrix_modelView", "Matrix_ModelView", "Matrix_Modelview",
    "modelviewmatrix", "modelViewmatrix", "ModelViewmatrix", "Modelviewmatrix",
    "modelviewMatrix", "modelViewMatrix", "ModelViewMatrix", "ModelviewMatrix",
    "matrixmodelview", "matrixmodelView", "matrixModelView", "matrixModelview",
    "Matrixmodelview", "MatrixmodelView", "MatrixModelView", "MatrixModelview",
];

const MAT_AMBIENT_ALIASES: &[&str] = &[
    "mat_ambient", "material_ambient", "mat_Ambient", "material_Ambient",
    "matambient", "materialambient", "matAmbient", "materialAmbient",
];

const MAT_DIFFUSE_ALIASES: &[&str] = &[
    "mat_diffuse", "material_diffuse", "mat_Diffuse", "material_Diffuse",
    "matdiffuse", "materialdiffuse", "matDiffuse", "materialDiffuse",
];

const MAT_SPECULAR_ALIASES: &[&str] = &[
    "mat_specular", "material_specular", "mat_Specular", "material_Specular",
    "matspecular", "materialspecular", "matSpecular", "materialSpecular",
];

const MAT_EMISSIVE_ALIASES: &[&str] = &[
    "mat_emissive", "material_emissive", "mat_Emissive", "material_Emissive",
    "matemissive", "materialemissive", "matEmissive", "materialEmissive",
];

const MAT_SHININESS_ALIASES: &[&str] = &[
    "shininess", "Shininess", "mat_shininess", "material_shininess",
    "mat_Shininess", "material_Shininess", "matshininess", "materialshininess",
    "matShininess", "materialShininess",
];

impl StandardAttribute {
    /// Built-in ordered candidate names for this role.
    pub fn default_aliases(self) -> &'static [&'static str] {
        match self {
            StandardAttribute::Vertex => VERTEX_ALIASES,
            StandardAttribute::Normal => NORMAL_ALIASES,
            StandardAttribute::TexCoord => TEXCOORD_ALIASES,
            StandardAttribute::Tangent => TANGENT_ALIASES,
            StandardAttribute::Bitangent => BITANGENT_ALIASES,
            StandardAttribute::Color => COLOR_ALIASES,
            StandardAttribute::BoneId => BONE_ID_ALIASES,
            StandardAttribute::BoneWeight => BONE_WEIGHT_ALIASES,
        }
    }
}

impl StandardUniform {
    /// Built-in ordered candidate names for this role.
    pub fn default_aliases(self) -> &'static [&'static str] {
        match self {
            StandardUniform::ModelView => MODEL_VIEW_ALIASES,
            StandardUniform::MatAmbient => MAT_AMBIENT_ALIASES,
            StandardUniform::MatDiffuse => MAT_DIFFUSE_ALIASES,
            StandardUniform::MatSpecular => MAT_SPECULAR_ALIASES,
            StandardUniform::MatEmissive => MAT_EMISSIVE_ALIASES,
            StandardUniform::MatShininess => MAT_SHININESS_ALIASES,
        }
    }
}

/// Per-role candidate-name overrides for standard slot resolution. A role
/// with no override falls back to its built-in alias list.
#[derive(Default, Clone, Debug)]
pub struct SlotAliases {
    attributes: [Option<Vec<String>>; StandardAttribute::COUNT],
    uniforms: [Option<Vec<String>>; StandardUniform::COUNT],
}

fn parse_alias_spec<const N: usize>(spec: &str) -> [Option<Vec<String>>; N] {
    let mut roles: [Option<Vec<String>>; N] = std::array::from_fn(|_| None);
    for (role, field) in spec.split(';').take(N).enumerate() {
        let aliases = field
            .split('|')
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect::<Vec<_>>();
        if !aliases.is_empty() {
            roles[role] = Some(aliases);
        }
    }
    roles
}

impl SlotAliases {
    /// Parses the external spec grammar: one `;`-separated field per role in
    /// role order, each field a `|`-separated alias list. An empty field
    /// keeps the built-in defaults for that role; excess fields are ignored.
    pub fn from_specs(attribute_spec: &str, uniform_spec: &str) -> Self {
        Self {
            attributes: parse_alias_spec(attribute_spec),
            uniforms: parse_alias_spec(uniform_spec),
        }
    }

    /// Replaces the candidate list for a single attribute role.
    pub fn with_attribute<S: Into<String>>(
        mut self,
        role: StandardAttribute,
        aliases: impl IntoIterator<Item = S>,
    ) -> Self {
        self.attributes[role as usize] = Some(aliases.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the candidate list for a single uniform role.
    pub fn with_uniform<S: Into<String>>(
        mut self,
        role: StandardUniform,
        aliases: impl IntoIterator<Item = S>,
    ) -> Self {
        self.uniforms[role as usize] = Some(aliases.into_iter().map(Into::into).collect());
        self
    }

    fn attribute_candidates(&self, role: StandardAttribute) -> Vec<&str> {
        match &self.attributes[role as usize] {
            Some(aliases) => aliases.iter().map(String::as_str).collect(),
            None => role.default_aliases().to_vec(),
        }
    }

    fn uniform_candidates(&self, role: StandardUniform) -> Vec<&str> {
        match &self.uniforms[role as usize] {
            Some(aliases) => aliases.iter().map(String::as_str).collect(),
            None => role.default_aliases().to_vec(),
        }
    }
}

/// Outcome of a successful standard slot resolution: which candidate name
/// matched and the location it resolved to. An unresolved role stays `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedSlot<T> {
    pub name: String,
    pub location: T,
}

/// Probes candidates in order and keeps the first that resolves to a valid
/// location. Pure over the lookup closure so it is testable without a
/// GL context.
fn resolve_slot<T>(
    candidates: &[&str],
    mut lookup: impl FnMut(&str) -> Option<T>,
) -> Option<ResolvedSlot<T>> {
    for name in candidates {
        if let Some(location) = lookup(name) {
            return Some(ResolvedSlot {
                name: (*name).to_owned(),
                location,
            });
        }
    }
    None
}

/// Memoizing lookup: the fetch closure runs only for names not seen before;
/// misses are cached as `None` so they are fetched (and warned about) once.
fn fetch_cached<T: Clone>(
    cache: &RefCell<FxHashMap<String, Option<T>>>,
    name: &str,
    fetch: impl FnOnce(&str) -> Option<T>,
) -> Option<T> {
    let mut cache = cache.borrow_mut();
    if let Some(cached) = cache.get(name) {
        cached.clone()
    } else {
        let location = fetch(name);
        cache.insert(name.to_owned(), location.clone());
        location
    }
}

/// Location of a uniform within a linked program.
#[derive(Clone, Debug)]
pub struct UniformLocation {
    pub(crate) id: glow::UniformLocation,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

/// Builds the indexed uniform name `base[index]` used to address uniform
/// array elements through the ordinary name cache.
pub fn indexed_uniform_name(base: &str, index: u32) -> String {
    format!("{base}[{index}]")
}

/// Incremental program construction: create, attach shaders, link. The
/// allocated program object is released if the builder is dropped without
/// a successful link.
pub struct ProgramBuilder<'a> {
    server: &'a GraphicsServer,
    name: String,
    id: Option<glow::Program>,
}

impl<'a> ProgramBuilder<'a> {
    /// Allocates a new program object.
    pub fn new(server: &'a GraphicsServer, name: &str) -> Result<Self, FrameworkError> {
        let id = unsafe { server.gl.create_program()? };
        Ok(Self {
            server,
            name: name.to_owned(),
            id: Some(id),
        })
    }

    /// Attaches a compiled shader.
    pub fn attach(self, shader: &GpuShader) -> Self {
        unsafe {
            self.server.gl.attach_shader(self.id.unwrap(), shader.id);
        }
        self
    }

    /// Links the program and resolves standard attribute and uniform slots.
    /// Link failure carries the driver's link log.
    pub fn link(mut self, aliases: &SlotAliases) -> Result<GpuProgram, FrameworkError> {
        let server = self.server;
        let id = self.id.take().unwrap();

        unsafe {
            server.gl.link_program(id);

            let status = server.gl.get_program_link_status(id);
            let link_message = server.gl.get_program_info_log(id);

            if !status {
                server.gl.delete_program(id);
                return Err(FrameworkError::ProgramLinkingFailed {
                    program_name: self.name.clone(),
                    error_message: link_message,
                });
            }

            if link_message.chars().all(|c| c.is_whitespace()) {
                info!("Program {} linked successfully!", self.name);
            } else {
                info!(
                    "Program {} linked successfully!\nAdditional info: {}",
                    self.name, link_message
                );
            }
        }

        let mut standard_attributes: [Option<ResolvedSlot<u32>>; StandardAttribute::COUNT] =
            std::array::from_fn(|_| None);
        for role in StandardAttribute::iter() {
            let slot = resolve_slot(&aliases.attribute_candidates(role), |name| unsafe {
                server.gl.get_attrib_location(id, name)
            });
            if let Some(slot) = &slot {
                info!(
                    "Program {}: {} attribute bound to \"{}\" at location {}",
                    self.name,
                    role.as_ref(),
                    slot.name,
                    slot.location
                );
            }
            standard_attributes[role as usize] = slot;
        }

        let mut standard_uniforms: [Option<ResolvedSlot<UniformLocation>>; StandardUniform::COUNT] =
            std::array::from_fn(|_| None);
        for role in StandardUniform::iter() {
            let slot = resolve_slot(&aliases.uniform_candidates(role), |name| unsafe {
                server
                    .gl
                    .get_uniform_location(id, name)
                    .map(|id| UniformLocation {
                        id,
                        thread_mark: PhantomData,
                    })
            });
            if let Some(slot) = &slot {
                info!(
                    "Program {}: {} uniform bound to \"{}\"",
                    self.name,
                    role.as_ref(),
                    slot.name
                );
            }
            standard_uniforms[role as usize] = slot;
        }

        Ok(GpuProgram {
            state: server.weak(),
            id,
            name: self.name.clone(),
            thread_mark: PhantomData,
            uniform_locations: Default::default(),
            attribute_locations: Default::default(),
            standard_attributes,
            standard_uniforms,
        })
    }
}

impl Drop for ProgramBuilder<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            unsafe {
                self.server.gl.delete_program(id);
            }
        }
    }
}

/// A linked shader program with resolved standard slots and memoizing
/// name→location caches.
pub struct GpuProgram {
    state: Weak<GraphicsServer>,
    pub(crate) id: glow::Program,
    name: String,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
    uniform_locations: RefCell<FxHashMap<String, Option<UniformLocation>>>,
    attribute_locations: RefCell<FxHashMap<String, Option<u32>>>,
    standard_attributes: [Option<ResolvedSlot<u32>>; StandardAttribute::COUNT],
    standard_uniforms: [Option<ResolvedSlot<UniformLocation>>; StandardUniform::COUNT],
}

impl GpuProgram {
    /// Compiles both shaders and links them into a program; the shorthand
    /// startup path of the scene driver.
    pub fn from_source_files(
        server: &GraphicsServer,
        name: &str,
        vertex_path: &Path,
        fragment_path: &Path,
        aliases: &SlotAliases,
    ) -> Result<Self, FrameworkError> {
        let vertex_shader =
            GpuShader::from_file(server, name, ShaderKind::Vertex, vertex_path)?;
        let fragment_shader =
            GpuShader::from_file(server, name, ShaderKind::Fragment, fragment_path)?;
        ProgramBuilder::new(server, name)?
            .attach(&vertex_shader)
            .attach(&fragment_shader)
            .link(aliases)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved slot for a standard attribute role, `None` when no candidate
    /// name matched (the "not found" sentinel).
    pub fn standard_attribute(&self, role: StandardAttribute) -> Option<&ResolvedSlot<u32>> {
        self.standard_attributes[role as usize].as_ref()
    }

    /// Resolved slot for a standard uniform role.
    pub fn standard_uniform(
        &self,
        role: StandardUniform,
    ) -> Option<&ResolvedSlot<UniformLocation>> {
        self.standard_uniforms[role as usize].as_ref()
    }

    /// Resolves a uniform location by exact name and memoizes the result.
    /// A miss is logged once as a non-fatal warning; sends to the missing
    /// name become silent no-ops.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        let server = self.state.upgrade().unwrap();
        fetch_cached(&self.uniform_locations, name, |name| {
            let location = unsafe {
                server
                    .gl
                    .get_uniform_location(self.id, name)
                    .map(|id| UniformLocation {
                        id,
                        thread_mark: PhantomData,
                    })
            };
            if location.is_none() {
                warn!("Program {}: uniform location not found: {}", self.name, name);
            }
            location
        })
    }

    /// Resolves an attribute location by exact name and memoizes the result.
    /// Misses warn once, same policy as uniforms.
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        let server = self.state.upgrade().unwrap();
        fetch_cached(&self.attribute_locations, name, |name| {
            let location = unsafe { server.gl.get_attrib_location(self.id, name) };
            if location.is_none() {
                warn!(
                    "Program {}: attribute location not found: {}",
                    self.name, name
                );
            }
            location
        })
    }

    /// Binds this program and returns the guard through which uniform values
    /// are sent. There is no implicit rebind anywhere else: a send without a
    /// live binding does not compile.
    pub fn bind<'a>(&'a self, server: &'a GraphicsServer) -> ProgramBinding<'a> {
        server.set_program(Some(self.id));
        ProgramBinding {
            server,
            program: self,
        }
    }

    /// Binds the program and additionally runs driver-side validation,
    /// returning the validation log, or `"OK"` when the driver has nothing
    /// to report.
    pub fn bind_validated<'a>(
        &'a self,
        server: &'a GraphicsServer,
    ) -> (ProgramBinding<'a>, String) {
        let binding = self.bind(server);
        let message = unsafe {
            server.gl.validate_program(self.id);
            let log = server.gl.get_program_info_log(self.id);
            if log.chars().all(|c| c.is_whitespace()) {
                "OK".to_owned()
            } else {
                log
            }
        };
        info!("Program {} validation result: {}", self.name, message);
        (binding, message)
    }
}

impl Drop for GpuProgram {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                state.gl.delete_program(self.id);
            }
        }
    }
}

/// An explicitly bound program. Every uniform send goes through this guard,
/// so the target program is always the one currently bound. Sends to names
/// that never resolved are silent no-ops.
pub struct ProgramBinding<'a> {
    server: &'a GraphicsServer,
    program: &'a GpuProgram,
}

impl ProgramBinding<'_> {
    pub fn program(&self) -> &GpuProgram {
        self.program
    }

    fn location(&self, name: &str) -> Option<UniformLocation> {
        self.program.uniform_location(name)
    }

    #[inline(always)]
    pub fn set_i32_at(&self, location: Option<&UniformLocation>, value: i32) -> &Self {
        if let Some(location) = location {
            unsafe {
                self.server.gl.uniform_1_i32(Some(&location.id), value);
            }
        }
        self
    }

    #[inline(always)]
    pub fn set_u32_at(&self, location: Option<&UniformLocation>, value: u32) -> &Self {
        if let Some(location) = location {
            unsafe {
                self.server.gl.uniform_1_u32(Some(&location.id), value);
            }
        }
        self
    }

    #[inline(always)]
    pub fn set_f32_at(&self, location: Option<&UniformLocation>, value: f32) -> &Self {
        if let Some(location) = location {
            unsafe {
                self.server.gl.uniform_1_f32(Some(&location.id), value);
            }
        }
        self
    }

    #[inline(always)]
    pub fn set_vector2_at(&self, location: Option<&UniformLocation>, value: &Vector2<f32>) -> &Self {
        if let Some(location) = location {
            unsafe {
                self.server
                    .gl
                    .uniform_2_f32(Some(&location.id), value.x, value.y);
            }
        }
        self
    }

    #[inline(always)]
    pub fn set_vector3_at(&self, location: Option<&UniformLocation>, value: &Vector3<f32>) -> &Self {
        if let Some(location) = location {
            unsafe {
                self.server
                    .gl
                    .uniform_3_f32(Some(&location.id), value.x, value.y, value.z);
            }
        }
        self
    }

    #[inline(always)]
    pub fn set_vector4_at(&self, location: Option<&UniformLocation>, value: &Vector4<f32>) -> &Self {
        if let Some(location) = location {
            unsafe {
                self.server.gl.uniform_4_f32(
                    Some(&location.id),
                    value.x,
                    value.y,
                    value.z,
                    value.w,
                );
            }
        }
        self
    }

    #[inline(always)]
    pub fn set_matrix4_at(&self, location: Option<&UniformLocation>, value: &Matrix4<f32>) -> &Self {
        if let Some(location) = location {
            unsafe {
                self.server.gl.uniform_matrix_4_f32_slice(
                    Some(&location.id),
                    false,
                    value.as_slice(),
                );
            }
        }
        self
    }

    #[inline(always)]
    pub fn set_f32_slice_at(&self, location: Option<&UniformLocation>, value: &[f32]) -> &Self {
        if let Some(location) = location {
            if !value.is_empty() {
                unsafe {
                    self.server
                        .gl
                        .uniform_1_f32_slice(Some(&location.id), value);
                }
            }
        }
        self
    }

    #[inline(always)]
    pub fn set_vector3_slice_at(
        &self,
        location: Option<&UniformLocation>,
        value: &[Vector3<f32>],
    ) -> &Self {
        if let Some(location) = location {
            if !value.is_empty() {
                unsafe {
                    self.server.gl.uniform_3_f32_slice(
                        Some(&location.id),
                        std::slice::from_raw_parts(value.as_ptr() as *const f32, value.len() * 3),
                    );
                }
            }
        }
        self
    }

    pub fn set_i32(&self, name: &str, value: i32) -> &Self {
        self.set_i32_at(self.location(name).as_ref(), value)
    }

    pub fn set_u32(&self, name: &str, value: u32) -> &Self {
        self.set_u32_at(self.location(name).as_ref(), value)
    }

    pub fn set_f32(&self, name: &str, value: f32) -> &Self {
        self.set_f32_at(self.location(name).as_ref(), value)
    }

    pub fn set_vector2(&self, name: &str, value: &Vector2<f32>) -> &Self {
        self.set_vector2_at(self.location(name).as_ref(), value)
    }

    pub fn set_vector3(&self, name: &str, value: &Vector3<f32>) -> &Self {
        self.set_vector3_at(self.location(name).as_ref(), value)
    }

    pub fn set_vector4(&self, name: &str, value: &Vector4<f32>) -> &Self {
        self.set_vector4_at(self.location(name).as_ref(), value)
    }

    pub fn set_matrix4(&self, name: &str, value: &Matrix4<f32>) -> &Self {
        self.set_matrix4_at(self.location(name).as_ref(), value)
    }

    pub fn set_f32_slice(&self, name: &str, value: &[f32]) -> &Self {
        self.set_f32_slice_at(self.location(name).as_ref(), value)
    }

    pub fn set_vector3_slice(&self, name: &str, value: &[Vector3<f32>]) -> &Self {
        self.set_vector3_slice_at(self.location(name).as_ref(), value)
    }

    /// Sends to the uniform array element `base[index]`.
    pub fn set_indexed_f32(&self, base: &str, index: u32, value: f32) -> &Self {
        self.set_f32(&indexed_uniform_name(base, index), value)
    }

    /// Sends to the uniform array element `base[index]`.
    pub fn set_indexed_vector3(&self, base: &str, index: u32, value: &Vector3<f32>) -> &Self {
        self.set_vector3(&indexed_uniform_name(base, index), value)
    }

    /// Sends to a standard uniform slot; no-op when the role is unresolved.
    pub fn set_standard_f32(&self, role: StandardUniform, value: f32) -> &Self {
        let location = self.program.standard_uniform(role).map(|slot| &slot.location);
        self.set_f32_at(location, value)
    }

    /// Sends to a standard uniform slot; no-op when the role is unresolved.
    pub fn set_standard_vector3(&self, role: StandardUniform, value: &Vector3<f32>) -> &Self {
        let location = self.program.standard_uniform(role).map(|slot| &slot.location);
        self.set_vector3_at(location, value)
    }

    /// Sends to a standard uniform slot; no-op when the role is unresolved.
    pub fn set_standard_matrix4(&self, role: StandardUniform, value: &Matrix4<f32>) -> &Self {
        let location = self.program.standard_uniform(role).map(|slot| &slot.location);
        self.set_matrix4_at(location, value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn standard_role_counts() {
        assert_eq!(StandardAttribute::COUNT, 8);
        assert_eq!(StandardUniform::COUNT, 6);
    }

    #[test]
    fn default_alias_tables_start_with_canonical_names() {
        assert_eq!(StandardAttribute::Vertex.default_aliases()[0], "a_vertex");
        assert_eq!(StandardAttribute::Normal.default_aliases()[0], "a_normal");
        assert_eq!(
            StandardUniform::ModelView.default_aliases()[0],
            "modelview_matrix"
        );
        assert_eq!(
            StandardUniform::MatShininess.default_aliases()[0],
            "shininess"
        );
    }

    #[test]
    fn every_role_has_a_non_empty_alias_table() {
        for role in StandardAttribute::iter() {
            assert!(!role.default_aliases().is_empty());
        }
        for role in StandardUniform::iter() {
            assert!(!role.default_aliases().is_empty());
        }
    }

    #[test]
    fn resolve_slot_takes_first_match() {
        let slot = resolve_slot(&["first", "second", "third"], |name| {
            if name == "second" || name == "third" {
                Some(7u32)
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(slot.name, "second");
        assert_eq!(slot.location, 7);
    }

    #[test]
    fn resolve_slot_probes_in_listed_order() {
        let mut probed = Vec::new();
        let slot = resolve_slot(&["a", "b", "c"], |name| {
            probed.push(name.to_owned());
            (name == "c").then_some(1u32)
        })
        .unwrap();
        assert_eq!(probed, ["a", "b", "c"]);
        assert_eq!(slot.name, "c");
    }

    #[test]
    fn resolve_slot_keeps_sentinel_when_nothing_matches() {
        let slot: Option<ResolvedSlot<u32>> =
            resolve_slot(StandardAttribute::Vertex.default_aliases(), |_| None);
        assert!(slot.is_none());
    }

    #[test]
    fn alias_spec_overrides_are_positional() {
        let aliases = SlotAliases::from_specs("position|pos;;my_normal", "");
        assert_eq!(
            aliases.attribute_candidates(StandardAttribute::Vertex),
            ["position", "pos"]
        );
        // Empty field keeps the built-in defaults.
        assert_eq!(
            aliases.attribute_candidates(StandardAttribute::Normal),
            StandardAttribute::Normal.default_aliases()
        );
        assert_eq!(
            aliases.attribute_candidates(StandardAttribute::TexCoord),
            ["my_normal"]
        );
        assert_eq!(
            aliases.uniform_candidates(StandardUniform::ModelView),
            StandardUniform::ModelView.default_aliases()
        );
    }

    #[test]
    fn alias_spec_ignores_excess_fields() {
        let spec = "a;b;c;d;e;f;g;h;extra;more";
        let aliases = SlotAliases::from_specs(spec, "");
        assert_eq!(
            aliases.attribute_candidates(StandardAttribute::BoneWeight),
            ["h"]
        );
    }

    #[test]
    fn fetch_cached_queries_driver_once_per_name() {
        let cache = RefCell::new(FxHashMap::default());
        let mut fetches = 0;
        for _ in 0..3 {
            let value = fetch_cached(&cache, "matrixModelView", |_| {
                fetches += 1;
                Some(42u32)
            });
            assert_eq!(value, Some(42));
        }
        assert_eq!(fetches, 1);
    }

    #[test]
    fn fetch_cached_memoizes_misses() {
        let cache = RefCell::new(FxHashMap::default());
        let mut fetches = 0;
        for _ in 0..3 {
            let value = fetch_cached(&cache, "no_such_uniform", |_| {
                fetches += 1;
                None::<u32>
            });
            assert_eq!(value, None);
        }
        assert_eq!(fetches, 1);
    }

    #[test]
    fn indexed_names_follow_bracket_convention() {
        assert_eq!(indexed_uniform_name("lightPoint", 0), "lightPoint[0]");
        assert_eq!(indexed_uniform_name("weights", 12), "weights[12]");
    }
}
