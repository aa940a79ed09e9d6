//! Error types for snowfall.
//!
//! Errors fall into three groups: initialization failures that stop the
//! effect from ever starting (shader compile/link, GPU setup), invalid
//! configuration rejected before any GPU upload, and texture problems that
//! are reported but recovered from with a generated flake.

use std::path::PathBuf;

use thiserror::Error;

use crate::shader::Stage;

/// Rejected particle geometry.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    /// Particle count must be at least one.
    #[error("invalid particle count {0}: at least one particle is required")]
    InvalidParticleCount(u32),
    /// Four vertices per particle no longer fit a 32-bit index.
    #[error("{0} particles exceed the 32-bit vertex index range")]
    TooManyParticles(u32),
    /// A per-vertex attribute array has the wrong number of entries.
    #[error("attribute `{attribute}` has {actual} entries, expected {expected}")]
    LengthMismatch {
        attribute: &'static str,
        expected: usize,
        actual: usize,
    },
    /// An index points past the last vertex.
    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        position: usize,
        index: u32,
        vertex_count: usize,
    },
}

/// Shader compilation, reflection and linking failures.
#[derive(Debug, Error)]
pub enum ShaderError {
    /// The WGSL source did not parse. `log` holds the compiler diagnostic.
    #[error("{stage} shader failed to compile:\n{log}")]
    Parse { stage: Stage, log: String },
    /// The module parsed but failed validation.
    #[error("{stage} shader failed validation:\n{log}")]
    Validation { stage: Stage, log: String },
    /// The expected entry point is absent.
    #[error("{stage} shader has no `{name}` entry point")]
    MissingEntryPoint { stage: Stage, name: &'static str },
    /// A required vertex attribute is not declared by the vertex stage.
    #[error("vertex shader does not declare attribute `{0}`")]
    MissingAttribute(&'static str),
    /// A vertex attribute is declared with a different shape than the buffer provides.
    #[error("attribute `{name}` is declared as {found}, expected {expected:?}")]
    AttributeFormat {
        name: &'static str,
        expected: wgpu::VertexFormat,
        found: String,
    },
    /// A required resource binding is not declared.
    #[error("{stage} shader does not declare binding `{name}`")]
    MissingBinding { stage: Stage, name: &'static str },
    /// Vertex outputs and fragment inputs do not agree, or pipeline creation failed.
    #[error("shader program failed to link:\n{log}")]
    Link { log: String },
}

/// Errors raised while producing snowflake pixels.
#[derive(Debug, Error)]
pub enum TextureError {
    /// The file could not be decoded as an image.
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    /// Raw RGBA data does not match the stated dimensions.
    #[error("RGBA data has {actual} bytes, expected {expected} for {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    /// Zero-sized images cannot be uploaded.
    #[error("image has zero width or height")]
    Empty,
    /// Larger than the device's 2D texture limit.
    #[error("image is {width}x{height}, device limit is {max} per side")]
    TooLarge { width: u32, height: u32, max: u32 },
}

/// Errors that can occur during GPU initialization.
#[derive(Debug, Error)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found; a Vulkan/Metal/DX12/WebGPU capable device is required")]
    NoAdapter,
    /// Failed to create GPU device.
    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),
    /// The surface reports no usable formats for this adapter.
    #[error("surface is not supported by the selected adapter")]
    UnsupportedSurface,
}

/// Configuration values rejected before anything is created.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("wind interval must be greater than zero")]
    ZeroWindInterval,
    #[error("billboard size must be positive, got {0}")]
    BillboardSize(f32),
    #[error("invalid clip planes: near {near}, far {far}")]
    ClipPlanes { near: f32, far: f32 },
    #[error("field of view must lie in (0, PI), got {0}")]
    FieldOfView(f32),
    #[error("window size must be non-zero, got {0}x{1}")]
    WindowSize(u32, u32),
}

/// Errors that can stop the effect from running.
#[derive(Debug, Error)]
pub enum SnowfallError {
    #[error("failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Texture(#[from] TextureError),
}
