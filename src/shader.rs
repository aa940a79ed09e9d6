//! Snow shader sources and the typed program contract.
//!
//! The vertex and fragment stages are separate WGSL modules. Each is parsed
//! and validated with naga on its own, then "linked" by checking that every
//! fragment input is produced by the vertex stage. Attribute locations and
//! resource bindings are resolved by name once, so the GPU backend never
//! hard-codes them.
//!
//! # Vertex stage
//!
//! - `t = time % lifetime` replays each flake's fall.
//! - Position is `center_offset + t * (0, velocity, 0)`.
//! - Wind drift sums history samples `1..=floor(t * ticks_per_second)`
//!   scaled by `wind_scale`, pushing the flake along X.
//! - The quad is expanded along the camera's right/up vectors, taken from
//!   the first two rows of the view matrix.
//!
//! The fragment stage samples the snowflake texture and returns it unlit.

use std::fmt;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::ShaderError;

/// Render vertex shader.
pub const SNOW_VERTEX_WGSL: &str = r#"
const WIND_HISTORY_LEN: u32 = 800u;

struct FrameUniforms {
    projection: mat4x4<f32>,
    view: mat4x4<f32>,
    time: f32,
    billboard_size: f32,
    wind_scale: f32,
    ticks_per_second: f32,
};

@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

// 800 samples packed four per vec4 to satisfy uniform array stride.
@group(0) @binding(1)
var<uniform> wind_history: array<vec4<f32>, 200>;

struct VertexInput {
    @location(0) lifetime: f32,
    @location(1) tex_coords: vec2<f32>,
    @location(2) tri_corner: vec2<f32>,
    @location(3) center_offset: vec3<f32>,
    @location(4) velocity: f32,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

fn wind_sample(i: u32) -> f32 {
    return wind_history[i / 4u][i % 4u];
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    let t = frame.time % in.lifetime;
    let tick = min(u32(floor(max(t, 0.0) * frame.ticks_per_second)), WIND_HISTORY_LEN - 1u);

    var position = in.center_offset + vec3<f32>(0.0, t * in.velocity, 0.0);

    var drift = 0.0;
    for (var j = tick; j >= 1u; j = j - 1u) {
        drift += wind_sample(j);
    }
    position.x += drift * frame.wind_scale;

    let camera_right = vec3<f32>(frame.view[0].x, frame.view[1].x, frame.view[2].x);
    let camera_up = vec3<f32>(frame.view[0].y, frame.view[1].y, frame.view[2].y);
    position += (camera_right * in.tri_corner.x + camera_up * in.tri_corner.y) * frame.billboard_size;

    var out: VertexOutput;
    out.clip_position = frame.projection * frame.view * vec4<f32>(position, 1.0);
    out.uv = in.tex_coords;
    return out;
}
"#;

/// Render fragment shader.
pub const SNOW_FRAGMENT_WGSL: &str = r#"
struct FragmentInput {
    @location(0) uv: vec2<f32>,
};

@group(1) @binding(0)
var snowflake: texture_2d<f32>;

@group(1) @binding(1)
var snowflake_sampler: sampler;

@fragment
fn fs_main(in: FragmentInput) -> @location(0) vec4<f32> {
    return textureSample(snowflake, snowflake_sampler, in.uv);
}
"#;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Pipeline stage a shader module belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    fn naga(self) -> naga::ShaderStage {
        match self {
            Stage::Vertex => naga::ShaderStage::Vertex,
            Stage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => write!(f, "vertex"),
            Stage::Fragment => write!(f, "fragment"),
        }
    }
}

/// A vertex attribute the program requires, by name and buffer format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub format: wgpu::VertexFormat,
}

/// Attributes in vertex buffer slot order. Matches
/// [`crate::geometry::ATTRIBUTE_NAMES`].
pub const SNOW_ATTRIBUTES: [AttributeSpec; 5] = [
    AttributeSpec {
        name: "lifetime",
        format: wgpu::VertexFormat::Float32,
    },
    AttributeSpec {
        name: "tex_coords",
        format: wgpu::VertexFormat::Float32x2,
    },
    AttributeSpec {
        name: "tri_corner",
        format: wgpu::VertexFormat::Float32x2,
    },
    AttributeSpec {
        name: "center_offset",
        format: wgpu::VertexFormat::Float32x3,
    },
    AttributeSpec {
        name: "velocity",
        format: wgpu::VertexFormat::Float32,
    },
];

pub const FRAME_UNIFORMS: &str = "frame";
pub const WIND_HISTORY: &str = "wind_history";
pub const SNOWFLAKE_TEXTURE: &str = "snowflake";
pub const SNOWFLAKE_SAMPLER: &str = "snowflake_sampler";

/// Resolved vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeHandle {
    pub name: &'static str,
    pub location: u32,
    pub format: wgpu::VertexFormat,
}

/// Resolved resource binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingHandle {
    pub name: &'static str,
    pub group: u32,
    pub binding: u32,
}

/// A compiled, linked vertex + fragment program with resolved handles.
#[derive(Debug)]
pub struct ShaderProgram {
    vertex_source: String,
    fragment_source: String,
    attributes: Vec<AttributeHandle>,
    vertex_attributes: Vec<wgpu::VertexAttribute>,
    frame_uniforms: BindingHandle,
    wind_history: BindingHandle,
    texture: BindingHandle,
    sampler: BindingHandle,
}

impl ShaderProgram {
    /// The built-in snow program.
    pub fn snow() -> Result<Self, ShaderError> {
        Self::compile(SNOW_VERTEX_WGSL, SNOW_FRAGMENT_WGSL)
    }

    /// Compile both stages, link them and resolve every handle.
    ///
    /// Any failure carries the compiler diagnostic; there is no fallback
    /// program.
    pub fn compile(vertex_source: &str, fragment_source: &str) -> Result<Self, ShaderError> {
        let vertex = compile_stage(Stage::Vertex, vertex_source)?;
        let fragment = compile_stage(Stage::Fragment, fragment_source)?;

        let vs = entry_point(&vertex, Stage::Vertex, VERTEX_ENTRY)?;
        let fs = entry_point(&fragment, Stage::Fragment, FRAGMENT_ENTRY)?;
        link(&vertex, vs, &fragment, fs)?;

        let inputs = input_locations(&vertex, vs);
        let mut attributes = Vec::with_capacity(SNOW_ATTRIBUTES.len());
        for spec in SNOW_ATTRIBUTES {
            let (location, inner) = inputs
                .iter()
                .find(|input| input.0 == spec.name)
                .map(|input| (input.1, input.2))
                .ok_or(ShaderError::MissingAttribute(spec.name))?;
            if vertex_format(inner) != Some(spec.format) {
                return Err(ShaderError::AttributeFormat {
                    name: spec.name,
                    expected: spec.format,
                    found: format!("{inner:?}"),
                });
            }
            attributes.push(AttributeHandle {
                name: spec.name,
                location,
                format: spec.format,
            });
        }

        let vertex_attributes = attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                offset: 0,
                shader_location: a.location,
                format: a.format,
            })
            .collect();

        let program = Self {
            vertex_source: vertex_source.to_owned(),
            fragment_source: fragment_source.to_owned(),
            attributes,
            vertex_attributes,
            frame_uniforms: resolve_binding(&vertex, Stage::Vertex, FRAME_UNIFORMS)?,
            wind_history: resolve_binding(&vertex, Stage::Vertex, WIND_HISTORY)?,
            texture: resolve_binding(&fragment, Stage::Fragment, SNOWFLAKE_TEXTURE)?,
            sampler: resolve_binding(&fragment, Stage::Fragment, SNOWFLAKE_SAMPLER)?,
        };
        log::debug!(
            "shader program linked with {} attributes",
            program.attributes.len()
        );
        Ok(program)
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    /// Attributes in vertex buffer slot order.
    pub fn attributes(&self) -> &[AttributeHandle] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeHandle> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn frame_uniforms(&self) -> BindingHandle {
        self.frame_uniforms
    }

    pub fn wind_history(&self) -> BindingHandle {
        self.wind_history
    }

    pub fn texture(&self) -> BindingHandle {
        self.texture
    }

    pub fn sampler(&self) -> BindingHandle {
        self.sampler
    }

    /// One tightly packed buffer per attribute, slot `i` holding attribute `i`.
    pub fn vertex_buffer_layouts(&self) -> Vec<wgpu::VertexBufferLayout<'_>> {
        self.vertex_attributes
            .iter()
            .map(|attribute| wgpu::VertexBufferLayout {
                array_stride: attribute.format.size(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: std::slice::from_ref(attribute),
            })
            .collect()
    }
}

fn compile_stage(stage: Stage, source: &str) -> Result<naga::Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
        stage,
        log: e.emit_to_string(source),
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::empty())
        .validate(&module)
        .map_err(|e| ShaderError::Validation {
            stage,
            log: e.emit_to_string(source),
        })?;

    Ok(module)
}

fn entry_point<'m>(
    module: &'m naga::Module,
    stage: Stage,
    name: &'static str,
) -> Result<&'m naga::Function, ShaderError> {
    module
        .entry_points
        .iter()
        .find(|ep| ep.name == name && ep.stage == stage.naga())
        .map(|ep| &ep.function)
        .ok_or(ShaderError::MissingEntryPoint { stage, name })
}

/// `(name, location, type)` for every located input, flattening struct arguments.
fn input_locations<'m>(
    module: &'m naga::Module,
    function: &'m naga::Function,
) -> Vec<(&'m str, u32, &'m naga::TypeInner)> {
    let mut inputs = Vec::new();
    for argument in &function.arguments {
        let inner = &module.types[argument.ty].inner;
        match (&argument.binding, inner) {
            (Some(naga::Binding::Location { location, .. }), _) => {
                inputs.push((argument.name.as_deref().unwrap_or(""), *location, inner));
            }
            (None, naga::TypeInner::Struct { members, .. }) => {
                for member in members {
                    if let Some(naga::Binding::Location { location, .. }) = member.binding {
                        inputs.push((
                            member.name.as_deref().unwrap_or(""),
                            location,
                            &module.types[member.ty].inner,
                        ));
                    }
                }
            }
            _ => {}
        }
    }
    inputs
}

fn output_locations(module: &naga::Module, function: &naga::Function) -> Vec<u32> {
    let Some(result) = &function.result else {
        return Vec::new();
    };
    match (&result.binding, &module.types[result.ty].inner) {
        (Some(naga::Binding::Location { location, .. }), _) => vec![*location],
        (None, naga::TypeInner::Struct { members, .. }) => members
            .iter()
            .filter_map(|member| match member.binding {
                Some(naga::Binding::Location { location, .. }) => Some(location),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Every fragment input must be written by the vertex stage.
fn link(
    vertex: &naga::Module,
    vs: &naga::Function,
    fragment: &naga::Module,
    fs: &naga::Function,
) -> Result<(), ShaderError> {
    let outputs = output_locations(vertex, vs);
    let missing: Vec<String> = input_locations(fragment, fs)
        .into_iter()
        .filter(|input| !outputs.contains(&input.1))
        .map(|(name, location, _)| {
            format!("fragment input `{name}` at location {location} is not written by the vertex stage")
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ShaderError::Link {
            log: missing.join("\n"),
        })
    }
}

fn resolve_binding(
    module: &naga::Module,
    stage: Stage,
    name: &'static str,
) -> Result<BindingHandle, ShaderError> {
    module
        .global_variables
        .iter()
        .find(|(_, var)| var.name.as_deref() == Some(name))
        .and_then(|(_, var)| var.binding.as_ref())
        .map(|rb| BindingHandle {
            name,
            group: rb.group,
            binding: rb.binding,
        })
        .ok_or(ShaderError::MissingBinding { stage, name })
}

fn vertex_format(inner: &naga::TypeInner) -> Option<wgpu::VertexFormat> {
    match *inner {
        naga::TypeInner::Scalar(naga::Scalar::F32) => Some(wgpu::VertexFormat::Float32),
        naga::TypeInner::Vector {
            size,
            scalar: naga::Scalar::F32,
        } => Some(match size {
            naga::VectorSize::Bi => wgpu::VertexFormat::Float32x2,
            naga::VectorSize::Tri => wgpu::VertexFormat::Float32x3,
            naga::VectorSize::Quad => wgpu::VertexFormat::Float32x4,
        }),
        _ => None,
    }
}
