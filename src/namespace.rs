//! The closed set of resource kinds a declaration can belong to.

use crate::token::TokenTag;
use strum::EnumString;

/// A resource namespace. Several surface keywords alias to the same member
/// (e.g. `pipeline` and `renderPipeline` both lex to [`Namespace::RenderPipeline`]
/// — see [`crate::lexer`] — so by the time a token reaches this enum the
/// aliasing has already been folded away).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum Namespace {
    Wgsl,
    Buffer,
    Texture,
    Sampler,
    BindGroup,
    BindGroupLayout,
    PipelineLayout,
    RenderPipeline,
    ComputePipeline,
    RenderPass,
    ComputePass,
    Frame,
    ShaderModule,
    Data,
    Define,
    Queue,
    ImageBitmap,
    WasmCall,
    QuerySet,
    TextureView,
    Animation,
}

pub const NAMESPACE_COUNT: usize = 21;

impl Namespace {
    /// The namespace a macro-declaration keyword token introduces, or
    /// `None` for tokens that aren't namespace keywords (e.g. `#define`,
    /// `#import`, which follow a different grammar production).
    pub fn from_keyword(tag: TokenTag) -> Option<Namespace> {
        use Namespace::*;
        Some(match tag {
            TokenTag::KwWgsl => Wgsl,
            TokenTag::KwBuffer => Buffer,
            TokenTag::KwTexture => Texture,
            TokenTag::KwSampler => Sampler,
            TokenTag::KwBindGroup => BindGroup,
            TokenTag::KwBindGroupLayout => BindGroupLayout,
            TokenTag::KwPipelineLayout => PipelineLayout,
            TokenTag::KwRenderPipeline => RenderPipeline,
            TokenTag::KwComputePipeline => ComputePipeline,
            TokenTag::KwRenderPass => RenderPass,
            TokenTag::KwComputePass => ComputePass,
            TokenTag::KwFrame => Frame,
            TokenTag::KwShaderModule => ShaderModule,
            TokenTag::KwData => Data,
            TokenTag::KwQueue => Queue,
            TokenTag::KwImageBitmap => ImageBitmap,
            TokenTag::KwWasmCall => WasmCall,
            TokenTag::KwQuerySet => QuerySet,
            TokenTag::KwTextureView => TextureView,
            TokenTag::KwAnimation => Animation,
            _ => return None,
        })
    }

    /// Parses an explicit-reference namespace segment (`$ns.name`). This is
    /// the `EnumString` impl, keyed on the same spelling used in source
    /// (camelCase for multi-word namespaces, e.g. `bindGroup`).
    pub fn from_reference_name(s: &str) -> Option<Namespace> {
        use std::str::FromStr;
        Namespace::from_str(s).ok()
    }

    pub fn display_name(self) -> &'static str {
        use Namespace::*;
        match self {
            Wgsl => "wgsl",
            Buffer => "buffer",
            Texture => "texture",
            Sampler => "sampler",
            BindGroup => "bindGroup",
            BindGroupLayout => "bindGroupLayout",
            PipelineLayout => "pipelineLayout",
            RenderPipeline => "renderPipeline",
            ComputePipeline => "computePipeline",
            RenderPass => "renderPass",
            ComputePass => "computePass",
            Frame => "frame",
            ShaderModule => "shaderModule",
            Data => "data",
            Define => "define",
            Queue => "queue",
            ImageBitmap => "imageBitmap",
            WasmCall => "wasmCall",
            QuerySet => "querySet",
            TextureView => "textureView",
            Animation => "animation",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Property names that trigger bare-identifier resolution, each with an
/// ordered list of namespaces to search (first match wins). Data-driven so
/// adding a property context never requires a new code fork.
pub const PROPERTY_CONTEXTS: &[(&str, &[Namespace])] = {
    use Namespace::*;
    &[
        ("module", &[ShaderModule, Wgsl]),
        ("pipeline", &[RenderPipeline, ComputePipeline]),
        ("view", &[Texture]),
        ("resolveTarget", &[Texture]),
        ("buffer", &[Buffer]),
        ("layout", &[PipelineLayout, BindGroupLayout]),
        ("sampler", &[Sampler]),
        ("perform", &[RenderPass, ComputePass, Queue]),
        ("before", &[RenderPass, ComputePass, Queue]),
        ("after", &[RenderPass, ComputePass, Queue]),
        ("bindGroups", &[BindGroup]),
        ("vertexBuffers", &[Buffer]),
        ("imports", &[Wgsl, ShaderModule]),
        ("frame", &[Frame]),
        ("data", &[Data]),
        ("mappedAtCreation", &[Data]),
    ]
};

pub fn property_context(property_name: &str) -> Option<&'static [Namespace]> {
    PROPERTY_CONTEXTS
        .iter()
        .find(|(name, _)| *name == property_name)
        .map(|(_, ns)| *ns)
}

/// Words that look like identifiers in a resolvable property context but are
/// never looked up as resource names.
pub const RESERVED_WORDS: &[&str] = &[
    "auto",
    "contextCurrentTexture",
    "load",
    "clear",
    "store",
    "discard",
    "point-list",
    "line-list",
    "line-strip",
    "triangle-list",
    "triangle-strip",
    "none",
    "front",
    "back",
    "nearest",
    "linear",
    "clamp-to-edge",
    "repeat",
    "mirror-repeat",
    "never",
    "less",
    "equal",
    "less-equal",
    "greater",
    "not-equal",
    "greater-equal",
    "always",
    "rgba8unorm",
    "rgba8unorm-srgb",
    "bgra8unorm",
    "bgra8unorm-srgb",
    "r8unorm",
    "rg8unorm",
    "depth24plus",
    "depth24plus-stencil8",
    "depth32float",
];

pub fn is_reserved_word(s: &str) -> bool {
    RESERVED_WORDS.contains(&s)
}

/// Macro kinds that require a minimum set of properties, and what those
/// properties are. Missing ones produce `missing_required_property`.
pub const REQUIRED_PROPERTIES: &[(Namespace, &[&str])] = {
    use Namespace::*;
    &[
        (Buffer, &["size", "usage"]),
        (Texture, &["format", "usage"]),
        (RenderPipeline, &["vertex"]),
        (ShaderModule, &["code"]),
        (Wgsl, &["value"]),
        (BindGroupLayout, &["entries"]),
    ]
};

pub fn required_properties(ns: Namespace) -> &'static [&'static str] {
    REQUIRED_PROPERTIES
        .iter()
        .find(|(n, _)| *n == ns)
        .map(|(_, props)| *props)
        .unwrap_or(&[])
}
