//! The emitter: walks an analyzed [`Ast`] and writes a bytecode module.
//!
//! Requires an error-free [`AnalysisResult`] (asserted on entry). Resource
//! IDs are assigned sequentially per namespace, starting at 0, in the fixed
//! pass order below — later groups depend on IDs assigned by earlier ones,
//! so the order is load-bearing.

use std::collections::HashMap;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::analyzer::{eval_expr, AnalysisResult};
use crate::ast::{extra_slice, Ast, NodeTag};
use crate::descriptor;
use crate::format::{self, ModuleHeader, Opcode};
use crate::limits::Limits;
use crate::namespace::Namespace;
use tracing::{debug, instrument};

/// Allocates sequential per-namespace resource IDs and remembers them by
/// name, so a later pass can look up an earlier one's ID by the name a
/// reference or bare identifier resolved to.
#[derive(Default)]
struct IdTable {
    ids: HashMap<Namespace, IndexMap<SmolStr, u32>>,
}

impl IdTable {
    fn alloc(&mut self, ns: Namespace, name: &SmolStr) -> u32 {
        let table = self.ids.entry(ns).or_default();
        if let Some(&id) = table.get(name) {
            return id;
        }
        let id = table.len() as u32;
        table.insert(name.clone(), id);
        id
    }

    fn get(&self, ns: Namespace, name: &SmolStr) -> Option<u32> {
        self.ids.get(&ns).and_then(|t| t.get(name)).copied()
    }
}

/// Accumulates the three output sections: bytecode, data blobs, and
/// interned strings.
struct Builder {
    bytecode: Vec<u8>,
    data: Vec<Vec<u8>>,
    strings: Vec<String>,
    string_cache: HashMap<String, u16>,
}

impl Builder {
    fn new() -> Builder {
        Builder {
            bytecode: Vec::new(),
            data: Vec::new(),
            strings: Vec::new(),
            string_cache: HashMap::new(),
        }
    }

    fn op(&mut self, op: Opcode) {
        self.bytecode.push(op.as_byte());
    }

    fn varint(&mut self, value: u64) {
        format::write_varint(&mut self.bytecode, value);
    }

    fn push_data(&mut self, bytes: Vec<u8>) -> u16 {
        let id = self.data.len() as u16;
        self.data.push(bytes);
        id
    }

    fn intern_string(&mut self, s: &str) -> u16 {
        if let Some(&id) = self.string_cache.get(s) {
            return id;
        }
        let id = self.strings.len() as u16;
        self.strings.push(s.to_string());
        self.string_cache.insert(s.to_string(), id);
        id
    }

    fn finish(self) -> Vec<u8> {
        let mut data_section = Vec::new();
        data_section.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        for blob in &self.data {
            data_section.extend_from_slice(&(blob.len() as u32).to_le_bytes());
            data_section.extend_from_slice(blob);
        }

        let mut strings_section = Vec::new();
        strings_section.extend_from_slice(&(self.strings.len() as u32).to_le_bytes());
        for s in &self.strings {
            let bytes = s.as_bytes();
            strings_section.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            strings_section.extend_from_slice(bytes);
        }

        let header = ModuleHeader {
            version: format::VERSION,
            bytecode_offset: 0,
            bytecode_len: self.bytecode.len() as u32,
            data_offset: self.bytecode.len() as u32,
            data_len: data_section.len() as u32,
            strings_offset: (self.bytecode.len() + data_section.len()) as u32,
            strings_len: strings_section.len() as u32,
        };

        let mut out = Vec::with_capacity(4 + format::HEADER_LEN + self.bytecode.len() + data_section.len() + strings_section.len());
        header.write_to(&mut out);
        out.extend_from_slice(&self.bytecode);
        out.extend_from_slice(&data_section);
        out.extend_from_slice(&strings_section);
        out
    }
}

/// Runs the full pipeline's last stage: turns an error-free analysis into a
/// finished module beginning with the "PNGB" magic.
#[instrument(skip_all)]
pub fn emit(ast: &Ast, result: &AnalysisResult) -> Vec<u8> {
    assert!(!result.has_errors(), "emitter requires an error-free analysis result");

    let mut builder = Builder::new();
    let mut ids = IdTable::default();
    let defines = collect_defines(ast, result);

    emit_shaders(ast, result, &mut builder, &mut ids, &defines);
    emit_buffers(ast, result, &mut builder, &mut ids);
    emit_textures(ast, result, &mut builder, &mut ids);
    emit_samplers(ast, result, &mut builder, &mut ids);
    emit_render_pipelines(ast, result, &mut builder, &mut ids);
    emit_compute_pipelines(ast, result, &mut builder, &mut ids);
    emit_bind_group_layouts(ast, result, &mut builder, &mut ids);
    emit_pipeline_layouts(ast, result, &mut builder, &mut ids);
    emit_bind_groups(ast, result, &mut builder, &mut ids);

    if let Some(table) = result.symbols_in(Namespace::Queue) {
        for name in table.keys().cloned().collect::<Vec<_>>() {
            ids.alloc(Namespace::Queue, &name);
        }
    }
    let queue_actions = collect_queue_actions(ast, result, &ids);

    emit_pass_namespace(ast, result, &mut builder, &mut ids, Namespace::RenderPass, PassKind::Render);
    emit_pass_namespace(ast, result, &mut builder, &mut ids, Namespace::ComputePass, PassKind::Compute);

    emit_frames(ast, result, &mut builder, &mut ids, &queue_actions);

    let module = builder.finish();
    debug!(bytes = module.len(), "module emitted");
    module
}

// ---------------------------------------------------------------------
// shared helpers
// ---------------------------------------------------------------------

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s)
}

/// Finds a named property inside a declaration or nested object's child
/// range and returns its value node. Declarations and `ObjectValue`s share
/// the same `SubRange`-of-`Property` shape, so one function covers both.
fn find_field(ast: &Ast, container: u32, name: &str) -> Option<u32> {
    let node = ast.nodes.get(container);
    extra_slice(&ast.extra_data, node.as_sub_range())
        .iter()
        .copied()
        .find(|&p| ast.node_source(p) == name)
        .map(|p| ast.nodes.get(p).as_node())
}

fn find_string_field(ast: &Ast, container: u32, name: &str) -> Option<String> {
    find_field(ast, container, name).map(|v| {
        let value = ast.nodes.get(v);
        strip_quotes(ast.tokens.loc(value.main_token).slice(&ast.source_text)).to_string()
    })
}

fn find_number_field(ast: &Ast, container: u32, name: &str, default: f64) -> f64 {
    find_field(ast, container, name)
        .and_then(|v| eval_expr(ast, v, &Limits::default()))
        .unwrap_or(default)
}

/// Resolves a value node that should name another resource: either a bare
/// identifier already resolved by pass 4, or an explicit `$ns.name`
/// reference.
fn resolve_value_ns_name(ast: &Ast, result: &AnalysisResult, value_node: u32) -> Option<(Namespace, SmolStr)> {
    let node = ast.nodes.get(value_node);
    match node.tag {
        NodeTag::IdentifierValue => result
            .resolved_identifiers
            .get(&value_node)
            .map(|r| (r.namespace, r.name.clone())),
        NodeTag::ReferenceValue => {
            let ns_text = ast.tokens.loc(node.main_token).slice(&ast.source_text);
            let ns = Namespace::from_reference_name(ns_text)?;
            let (name_token, _) = node.as_token_pair();
            if name_token == u32::MAX {
                return None;
            }
            let name = ast.tokens.loc(name_token).slice(&ast.source_text);
            Some((ns, SmolStr::new(name)))
        }
        _ => None,
    }
}

fn resolve_resource_id(ast: &Ast, result: &AnalysisResult, ids: &IdTable, value_node: u32) -> Option<u32> {
    let (ns, name) = resolve_value_ns_name(ast, result, value_node)?;
    ids.get(ns, &name)
}

// ---------------------------------------------------------------------
// `#define` substitution
// ---------------------------------------------------------------------

#[instrument(skip_all)]
fn collect_defines(ast: &Ast, result: &AnalysisResult) -> IndexMap<SmolStr, SmolStr> {
    let mut out = IndexMap::new();
    let Some(table) = result.symbols_in(Namespace::Define) else {
        return out;
    };
    for (name, info) in table {
        let decl = ast.nodes.get(info.node);
        let value_node = ast.nodes.get(decl.as_node());
        let text = match value_node.tag {
            NodeTag::StringValue | NodeTag::RuntimeInterpolationValue => {
                strip_quotes(ast.tokens.loc(value_node.main_token).slice(&ast.source_text))
            }
            _ => ast.tokens.loc(value_node.main_token).slice(&ast.source_text),
        };
        out.insert(name.clone(), SmolStr::new(text));
    }
    out
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Whole-word, single-pass substitution: a define's expansion is never
/// itself re-scanned, so a define naming another define stays literal in
/// the output.
fn substitute_defines(source: &str, defines: &IndexMap<SmolStr, SmolStr>) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_alphabetic() || chars[i] == '_' {
            let start = i;
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            match defines.get(word.as_str()) {
                Some(value) => out.push_str(value),
                None => out.push_str(&word),
            }
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

// ---------------------------------------------------------------------
// pass 1: shaders
// ---------------------------------------------------------------------

fn shader_source_text(ast: &Ast, decl_node: u32, prop_name: &str) -> String {
    find_string_field(ast, decl_node, prop_name).unwrap_or_default()
}

#[instrument(skip_all)]
fn emit_shaders(ast: &Ast, result: &AnalysisResult, builder: &mut Builder, ids: &mut IdTable, defines: &IndexMap<SmolStr, SmolStr>) {
    for (ns, prop_name) in [(Namespace::Wgsl, "value"), (Namespace::ShaderModule, "code")] {
        let Some(table) = result.symbols_in(ns) else { continue };
        for name in table.keys().cloned().collect::<Vec<_>>() {
            let decl_node = result.symbols[&ns][&name].node;
            let raw = shader_source_text(ast, decl_node, prop_name);
            let substituted = substitute_defines(&raw, defines);
            let data_id = builder.push_data(substituted.into_bytes());
            let shader_id = ids.alloc(ns, &name);
            builder.op(Opcode::CreateShaderModule);
            builder.varint(shader_id as u64);
            builder.varint(data_id as u64);
        }
    }
}

// ---------------------------------------------------------------------
// pass 2: buffers
// ---------------------------------------------------------------------

const BUFFER_USAGE_FLAGS: &[(&str, u32)] = &[
    ("VERTEX", 1 << 0),
    ("INDEX", 1 << 1),
    ("UNIFORM", 1 << 2),
    ("STORAGE", 1 << 3),
    ("COPY_SRC", 1 << 4),
    ("COPY_DST", 1 << 5),
    ("MAP_READ", 1 << 6),
    ("MAP_WRITE", 1 << 7),
];

fn parse_flag_array(ast: &Ast, decl_node: u32, property: &str, table: &[(&str, u32)]) -> u32 {
    let mut bits = 0u32;
    if let Some(value_node) = find_field(ast, decl_node, property) {
        let value = ast.nodes.get(value_node);
        if value.tag == NodeTag::ArrayValue {
            for &el in extra_slice(&ast.extra_data, value.as_sub_range()) {
                let name = ast.node_source(el);
                if let Some(&(_, bit)) = table.iter().find(|(n, _)| *n == name) {
                    bits |= bit;
                }
            }
        }
    }
    bits
}

#[instrument(skip_all)]
fn emit_buffers(ast: &Ast, result: &AnalysisResult, builder: &mut Builder, ids: &mut IdTable) {
    let Some(table) = result.symbols_in(Namespace::Buffer) else { return };
    for name in table.keys().cloned().collect::<Vec<_>>() {
        let decl_node = result.symbols[&Namespace::Buffer][&name].node;
        let size = find_number_field(ast, decl_node, "size", 0.0) as u32;
        let usage = parse_flag_array(ast, decl_node, "usage", BUFFER_USAGE_FLAGS);
        let buffer_id = ids.alloc(Namespace::Buffer, &name);
        builder.op(Opcode::CreateBuffer);
        builder.varint(buffer_id as u64);
        builder.varint(size as u64);
        builder.varint(usage as u64);
    }
}

// ---------------------------------------------------------------------
// pass 3: textures
// ---------------------------------------------------------------------

fn parse_texture_usage(ast: &Ast, decl_node: u32) -> descriptor::TextureUsage {
    let mut usage = descriptor::TextureUsage::empty();
    if let Some(value_node) = find_field(ast, decl_node, "usage") {
        let value = ast.nodes.get(value_node);
        if value.tag == NodeTag::ArrayValue {
            for &el in extra_slice(&ast.extra_data, value.as_sub_range()) {
                usage |= match ast.node_source(el) {
                    "COPY_SRC" => descriptor::TextureUsage::COPY_SRC,
                    "COPY_DST" => descriptor::TextureUsage::COPY_DST,
                    "TEXTURE_BINDING" => descriptor::TextureUsage::TEXTURE_BINDING,
                    "STORAGE_BINDING" => descriptor::TextureUsage::STORAGE_BINDING,
                    "RENDER_ATTACHMENT" => descriptor::TextureUsage::RENDER_ATTACHMENT,
                    _ => descriptor::TextureUsage::empty(),
                };
            }
        }
    }
    usage
}

#[instrument(skip_all)]
fn emit_textures(ast: &Ast, result: &AnalysisResult, builder: &mut Builder, ids: &mut IdTable) {
    let Some(table) = result.symbols_in(Namespace::Texture) else { return };
    for name in table.keys().cloned().collect::<Vec<_>>() {
        let decl_node = result.symbols[&Namespace::Texture][&name].node;
        let format = find_string_field(ast, decl_node, "format")
            .as_deref()
            .and_then(descriptor::TextureFormat::from_name)
            .unwrap_or(descriptor::TextureFormat::Rgba8Unorm);
        let usage = parse_texture_usage(ast, decl_node);

        let blob = if let Some(bitmap_value) = find_field(ast, decl_node, "imageBitmap") {
            let id = resolve_resource_id(ast, result, ids, bitmap_value).unwrap_or(0);
            descriptor::encode_texture_from_image_bitmap(id, format, usage)
        } else if let (Some(w), Some(h)) = (find_field(ast, decl_node, "width"), find_field(ast, decl_node, "height")) {
            let width = eval_expr(ast, w, &Limits::default()).unwrap_or(0.0) as u32;
            let height = eval_expr(ast, h, &Limits::default()).unwrap_or(0.0) as u32;
            descriptor::encode_texture_explicit(width, height, format, usage)
        } else {
            descriptor::encode_texture_canvas_sized(format, usage)
        };

        let data_id = builder.push_data(blob);
        let texture_id = ids.alloc(Namespace::Texture, &name);
        builder.op(Opcode::CreateTexture);
        builder.varint(texture_id as u64);
        builder.varint(data_id as u64);
    }
}

// ---------------------------------------------------------------------
// pass 4: samplers
// ---------------------------------------------------------------------

#[instrument(skip_all)]
fn emit_samplers(ast: &Ast, result: &AnalysisResult, builder: &mut Builder, ids: &mut IdTable) {
    let Some(table) = result.symbols_in(Namespace::Sampler) else { return };
    for name in table.keys().cloned().collect::<Vec<_>>() {
        let decl_node = result.symbols[&Namespace::Sampler][&name].node;
        let mag = find_string_field(ast, decl_node, "magFilter")
            .as_deref()
            .and_then(descriptor::FilterMode::from_name)
            .unwrap_or(descriptor::FilterMode::Nearest);
        let min = find_string_field(ast, decl_node, "minFilter")
            .as_deref()
            .and_then(descriptor::FilterMode::from_name)
            .unwrap_or(descriptor::FilterMode::Nearest);
        let address = find_string_field(ast, decl_node, "addressMode")
            .as_deref()
            .and_then(descriptor::AddressMode::from_name)
            .unwrap_or(descriptor::AddressMode::ClampToEdge);

        let blob = descriptor::encode_sampler(mag, min, address);
        let data_id = builder.push_data(blob);
        let sampler_id = ids.alloc(Namespace::Sampler, &name);
        builder.op(Opcode::CreateSampler);
        builder.varint(sampler_id as u64);
        builder.varint(data_id as u64);
    }
}

// ---------------------------------------------------------------------
// pass 5: pipelines
// ---------------------------------------------------------------------

fn stage_entry_point(ast: &Ast, stage_node: u32) -> String {
    find_string_field(ast, stage_node, "entryPoint")
        .or_else(|| find_string_field(ast, stage_node, "entrypoint"))
        .unwrap_or_else(|| "main".to_string())
}

fn stage_shader_id(ast: &Ast, result: &AnalysisResult, ids: &IdTable, stage_node: u32) -> u32 {
    find_field(ast, stage_node, "module")
        .and_then(|v| resolve_resource_id(ast, result, ids, v))
        .unwrap_or(0)
}

#[instrument(skip_all)]
fn emit_render_pipelines(ast: &Ast, result: &AnalysisResult, builder: &mut Builder, ids: &mut IdTable) {
    let Some(table) = result.symbols_in(Namespace::RenderPipeline) else { return };
    for name in table.keys().cloned().collect::<Vec<_>>() {
        let decl_node = result.symbols[&Namespace::RenderPipeline][&name].node;
        let vertex_node = match find_field(ast, decl_node, "vertex") {
            Some(v) => v,
            None => continue,
        };
        let shader_id = stage_shader_id(ast, result, ids, vertex_node);
        let entry = stage_entry_point(ast, vertex_node);
        let mut json = format!(r#"{{"vertex":{{"shader":{shader_id},"entryPoint":"{entry}"}}"#);
        if let Some(fragment_node) = find_field(ast, decl_node, "fragment") {
            let fragment_shader_id = stage_shader_id(ast, result, ids, fragment_node);
            let fragment_entry = stage_entry_point(ast, fragment_node);
            json.push_str(&format!(r#","fragment":{{"shader":{fragment_shader_id},"entryPoint":"{fragment_entry}"}}"#));
        }
        json.push('}');

        let data_id = builder.push_data(json.into_bytes());
        let pipeline_id = ids.alloc(Namespace::RenderPipeline, &name);
        builder.op(Opcode::CreateRenderPipeline);
        builder.varint(pipeline_id as u64);
        builder.varint(data_id as u64);
    }
}

#[instrument(skip_all)]
fn emit_compute_pipelines(ast: &Ast, result: &AnalysisResult, builder: &mut Builder, ids: &mut IdTable) {
    let Some(table) = result.symbols_in(Namespace::ComputePipeline) else { return };
    for name in table.keys().cloned().collect::<Vec<_>>() {
        let decl_node = result.symbols[&Namespace::ComputePipeline][&name].node;
        let compute_node = match find_field(ast, decl_node, "compute") {
            Some(v) => v,
            None => continue,
        };
        let shader_id = stage_shader_id(ast, result, ids, compute_node);
        let entry = stage_entry_point(ast, compute_node);
        let json = format!(r#"{{"compute":{{"shader":{shader_id},"entryPoint":"{entry}"}}}}"#);

        let data_id = builder.push_data(json.into_bytes());
        let pipeline_id = ids.alloc(Namespace::ComputePipeline, &name);
        builder.op(Opcode::CreateComputePipeline);
        builder.varint(pipeline_id as u64);
        builder.varint(data_id as u64);
    }
}

// ---------------------------------------------------------------------
// pass 6: bind group layouts, pipeline layouts, bind groups
// ---------------------------------------------------------------------

#[instrument(skip_all)]
fn emit_bind_group_layouts(ast: &Ast, result: &AnalysisResult, builder: &mut Builder, ids: &mut IdTable) {
    let Some(table) = result.symbols_in(Namespace::BindGroupLayout) else { return };
    for name in table.keys().cloned().collect::<Vec<_>>() {
        let decl_node = result.symbols[&Namespace::BindGroupLayout][&name].node;
        let mut bindings = Vec::new();
        if let Some(entries_node) = find_field(ast, decl_node, "entries") {
            let value = ast.nodes.get(entries_node);
            if value.tag == NodeTag::ArrayValue {
                for &el in extra_slice(&ast.extra_data, value.as_sub_range()) {
                    bindings.push(find_number_field(ast, el, "binding", 0.0) as u32);
                }
            }
        }
        let blob = descriptor::encode_bind_group_layout_descriptor(&bindings);
        let data_id = builder.push_data(blob);
        let layout_id = ids.alloc(Namespace::BindGroupLayout, &name);
        builder.op(Opcode::CreateBindGroupLayout);
        builder.varint(layout_id as u64);
        builder.varint(data_id as u64);
    }
}

#[instrument(skip_all)]
fn emit_pipeline_layouts(ast: &Ast, result: &AnalysisResult, builder: &mut Builder, ids: &mut IdTable) {
    let Some(table) = result.symbols_in(Namespace::PipelineLayout) else { return };
    for name in table.keys().cloned().collect::<Vec<_>>() {
        let decl_node = result.symbols[&Namespace::PipelineLayout][&name].node;
        let mut bind_group_layout_ids = Vec::new();
        if let Some(layouts_node) = find_field(ast, decl_node, "bindGroupLayouts") {
            let value = ast.nodes.get(layouts_node);
            if value.tag == NodeTag::ArrayValue {
                for &el in extra_slice(&ast.extra_data, value.as_sub_range()) {
                    if let Some((ns, ref_name)) = resolve_value_ns_name(ast, result, el) {
                        if let Some(id) = ids.get(ns, &ref_name) {
                            bind_group_layout_ids.push(id);
                        }
                    }
                }
            }
        }
        let blob = descriptor::encode_pipeline_layout_descriptor(&bind_group_layout_ids);
        let data_id = builder.push_data(blob);
        let pipeline_layout_id = ids.alloc(Namespace::PipelineLayout, &name);
        builder.op(Opcode::CreatePipelineLayout);
        builder.varint(pipeline_layout_id as u64);
        builder.varint(data_id as u64);
    }
}

/// Resolves a bind group's `layout` property to `(layout_id, group_index)`.
/// `layout={pipeline=... index=...}` derives the layout from a specific
/// pipeline's auto layout at `index`; `layout=auto` leaves both at their
/// sentinel zero; any other form is a direct reference into
/// [`Namespace::PipelineLayout`] or [`Namespace::BindGroupLayout`], and by
/// the time emission runs that reference must already have a materialized
/// id — analysis wouldn't have resolved it otherwise.
fn layout_pipeline_and_index(ast: &Ast, result: &AnalysisResult, ids: &IdTable, decl_node: u32) -> (u32, u32) {
    let Some(layout_node) = find_field(ast, decl_node, "layout") else {
        return (0, 0);
    };
    let layout = ast.nodes.get(layout_node);
    match layout.tag {
        NodeTag::ObjectValue => {
            let pipeline_id = find_field(ast, layout_node, "pipeline")
                .and_then(|v| resolve_resource_id(ast, result, ids, v))
                .unwrap_or(0);
            let index = find_number_field(ast, layout_node, "index", 0.0) as u32;
            (pipeline_id, index)
        }
        NodeTag::IdentifierValue if ast.node_source(layout_node) == "auto" => (0, 0),
        _ => {
            let layout_id = resolve_resource_id(ast, result, ids, layout_node)
                .expect("a layout reference resolved by analysis must have a materialized id by emission time");
            (layout_id, 0)
        }
    }
}

#[instrument(skip_all)]
fn emit_bind_groups(ast: &Ast, result: &AnalysisResult, builder: &mut Builder, ids: &mut IdTable) {
    let Some(table) = result.symbols_in(Namespace::BindGroup) else { return };
    for name in table.keys().cloned().collect::<Vec<_>>() {
        let decl_node = result.symbols[&Namespace::BindGroup][&name].node;
        let (pipeline_id, group_index) = layout_pipeline_and_index(ast, result, ids, decl_node);

        let mut entries = Vec::new();
        if let Some(entries_node) = find_field(ast, decl_node, "entries") {
            let value = ast.nodes.get(entries_node);
            if value.tag == NodeTag::ArrayValue {
                for &el in extra_slice(&ast.extra_data, value.as_sub_range()) {
                    let binding = find_number_field(ast, el, "binding", 0.0) as u32;
                    let offset = find_number_field(ast, el, "offset", 0.0) as u32;
                    let resource_id = ["buffer", "texture", "sampler"]
                        .iter()
                        .find_map(|field| find_field(ast, el, field))
                        .and_then(|v| resolve_resource_id(ast, result, ids, v))
                        .unwrap_or(0);
                    entries.push(descriptor::BindGroupEntry { binding, resource_id, offset });
                }
            }
        }

        let blob = descriptor::encode_bind_group_descriptor(group_index, &entries);
        let data_id = builder.push_data(blob);
        let bind_group_id = ids.alloc(Namespace::BindGroup, &name);
        builder.op(Opcode::CreateBindGroup);
        builder.varint(bind_group_id as u64);
        builder.varint(pipeline_id as u64);
        builder.varint(data_id as u64);
    }
}

// ---------------------------------------------------------------------
// pass 7: queues (no bytecode of their own; inlined at frame time)
// ---------------------------------------------------------------------

/// `{buffer_id, offset, data}` for one inlined `write_buffer`.
type QueueAction = (u32, u32, Vec<u8>);

fn encode_write_data(ast: &Ast, data_node: u32) -> Option<Vec<u8>> {
    let value = ast.nodes.get(data_node);
    match value.tag {
        NodeTag::ArrayValue => {
            let mut bytes = Vec::new();
            for &el in extra_slice(&ast.extra_data, value.as_sub_range()) {
                let f = eval_expr(ast, el, &Limits::default())? as f32;
                bytes.extend_from_slice(&f.to_le_bytes());
            }
            Some(bytes)
        }
        NodeTag::StringValue | NodeTag::RuntimeInterpolationValue => {
            let text = ast.tokens.loc(value.main_token).slice(&ast.source_text);
            let content = strip_quotes(text);
            if content.starts_with('$') {
                None // runtime-interpolated: populated by the runtime, not emitted here
            } else {
                Some(content.as_bytes().to_vec())
            }
        }
        _ => None,
    }
}

fn collect_queue_actions(ast: &Ast, result: &AnalysisResult, ids: &IdTable) -> HashMap<SmolStr, Vec<QueueAction>> {
    let mut out = HashMap::new();
    let Some(table) = result.symbols_in(Namespace::Queue) else {
        return out;
    };
    for (name, info) in table {
        let mut actions = Vec::new();
        if let Some(write_buffer_node) = find_field(ast, info.node, "writeBuffer") {
            let buffer_id = find_field(ast, write_buffer_node, "buffer")
                .and_then(|v| resolve_resource_id(ast, result, ids, v))
                .unwrap_or(0);
            let offset = find_number_field(ast, write_buffer_node, "bufferOffset", 0.0) as u32;
            if let Some(data_node) = find_field(ast, write_buffer_node, "data") {
                if let Some(bytes) = encode_write_data(ast, data_node) {
                    actions.push((buffer_id, offset, bytes));
                }
            }
        }
        out.insert(name.clone(), actions);
    }
    out
}

// ---------------------------------------------------------------------
// pass 8: render/compute passes
// ---------------------------------------------------------------------

#[derive(Copy, Clone)]
enum PassKind {
    Render,
    Compute,
}

impl PassKind {
    fn as_u64(self) -> u64 {
        match self {
            PassKind::Render => 0,
            PassKind::Compute => 1,
        }
    }
}

fn pass_descriptor_blob(ast: &Ast, decl_node: u32, kind: PassKind) -> Vec<u8> {
    match kind {
        // No descriptor fields are specified for compute passes in this
        // core; the data blob exists so the opcode stream stays uniform.
        PassKind::Compute => Vec::new(),
        PassKind::Render => {
            let load_op = match find_string_field(ast, decl_node, "loadOp").as_deref() {
                Some("load") => descriptor::LoadOp::Load,
                _ => descriptor::LoadOp::Clear,
            };
            let store_op = match find_string_field(ast, decl_node, "storeOp").as_deref() {
                Some("discard") => descriptor::StoreOp::Discard,
                _ => descriptor::StoreOp::Store,
            };
            let mut clear_color = [0.0f32, 0.0, 0.0, 1.0];
            if let Some(clear_node) = find_field(ast, decl_node, "clearColor") {
                let value = ast.nodes.get(clear_node);
                if value.tag == NodeTag::ArrayValue {
                    for (i, &el) in extra_slice(&ast.extra_data, value.as_sub_range()).iter().take(4).enumerate() {
                        clear_color[i] = eval_expr(ast, el, &Limits::default()).unwrap_or(0.0) as f32;
                    }
                }
            }
            descriptor::encode_render_pass_descriptor(load_op, store_op, clear_color)
        }
    }
}

#[instrument(skip_all)]
fn emit_pass_namespace(ast: &Ast, result: &AnalysisResult, builder: &mut Builder, ids: &mut IdTable, ns: Namespace, kind: PassKind) {
    let Some(table) = result.symbols_in(ns) else { return };
    for name in table.keys().cloned().collect::<Vec<_>>() {
        let decl_node = result.symbols[&ns][&name].node;

        let desc_blob = pass_descriptor_blob(ast, decl_node, kind);
        let data_id = builder.push_data(desc_blob);
        let pass_id = ids.alloc(ns, &name);
        builder.op(Opcode::DefinePass);
        builder.varint(pass_id as u64);
        builder.varint(kind.as_u64());
        builder.varint(data_id as u64);

        builder.op(match kind {
            PassKind::Render => Opcode::BeginRenderPass,
            PassKind::Compute => Opcode::BeginComputePass,
        });

        if let Some(v) = find_field(ast, decl_node, "pipeline") {
            if let Some(pipeline_id) = resolve_resource_id(ast, result, ids, v) {
                builder.op(Opcode::SetPipeline);
                builder.varint(pipeline_id as u64);
            }
        }
        if let Some(bind_groups_node) = find_field(ast, decl_node, "bindGroups") {
            let value = ast.nodes.get(bind_groups_node);
            if value.tag == NodeTag::ArrayValue {
                for (index, &el) in extra_slice(&ast.extra_data, value.as_sub_range()).iter().enumerate() {
                    if let Some(bind_group_id) = resolve_resource_id(ast, result, ids, el) {
                        builder.op(Opcode::SetBindGroup);
                        builder.varint(index as u64);
                        builder.varint(bind_group_id as u64);
                    }
                }
            }
        }
        if let Some(vbs_node) = find_field(ast, decl_node, "vertexBuffers") {
            let value = ast.nodes.get(vbs_node);
            if value.tag == NodeTag::ArrayValue {
                for (slot, &el) in extra_slice(&ast.extra_data, value.as_sub_range()).iter().enumerate() {
                    if let Some(buffer_id) = resolve_resource_id(ast, result, ids, el) {
                        builder.op(Opcode::SetVertexBuffer);
                        builder.varint(slot as u64);
                        builder.varint(buffer_id as u64);
                    }
                }
            }
        }
        if let Some(v) = find_field(ast, decl_node, "indexBuffer") {
            if let Some(buffer_id) = resolve_resource_id(ast, result, ids, v) {
                builder.op(Opcode::SetIndexBuffer);
                builder.varint(buffer_id as u64);
            }
        }
        if let Some(v) = find_field(ast, decl_node, "draw") {
            let count = eval_expr(ast, v, &Limits::default()).unwrap_or(0.0) as u64;
            builder.op(Opcode::Draw);
            builder.varint(count);
        }
        if let Some(v) = find_field(ast, decl_node, "drawIndexed") {
            let count = eval_expr(ast, v, &Limits::default()).unwrap_or(0.0) as u64;
            builder.op(Opcode::DrawIndexed);
            builder.varint(count);
        }
        if let Some(dispatch_node) = find_field(ast, decl_node, "dispatch") {
            let value = ast.nodes.get(dispatch_node);
            if value.tag == NodeTag::ArrayValue {
                let elements = extra_slice(&ast.extra_data, value.as_sub_range());
                let axis = |i: usize| elements.get(i).and_then(|&e| eval_expr(ast, e, &Limits::default())).unwrap_or(1.0) as u64;
                builder.op(Opcode::Dispatch);
                builder.varint(axis(0));
                builder.varint(axis(1));
                builder.varint(axis(2));
            }
        }

        builder.op(Opcode::EndPass);
        builder.op(Opcode::EndPassDef);
    }
}

// ---------------------------------------------------------------------
// pass 9: frames
// ---------------------------------------------------------------------

#[instrument(skip_all)]
fn emit_frames(ast: &Ast, result: &AnalysisResult, builder: &mut Builder, ids: &mut IdTable, queue_actions: &HashMap<SmolStr, Vec<QueueAction>>) {
    let Some(table) = result.symbols_in(Namespace::Frame) else { return };
    for name in table.keys().cloned().collect::<Vec<_>>() {
        let decl_node = result.symbols[&Namespace::Frame][&name].node;
        let frame_id = ids.alloc(Namespace::Frame, &name);
        let name_string_id = builder.intern_string(&name);
        builder.op(Opcode::DefineFrame);
        builder.varint(frame_id as u64);
        builder.varint(name_string_id as u64);

        if let Some(perform_node) = find_field(ast, decl_node, "perform") {
            let value = ast.nodes.get(perform_node);
            if value.tag == NodeTag::ArrayValue {
                for &el in extra_slice(&ast.extra_data, value.as_sub_range()) {
                    let Some((ns, ref_name)) = resolve_value_ns_name(ast, result, el) else { continue };
                    if ns == Namespace::Queue {
                        if let Some(actions) = queue_actions.get(&ref_name) {
                            for (buffer_id, offset, data) in actions {
                                let data_id = builder.push_data(data.clone());
                                builder.op(Opcode::WriteBuffer);
                                builder.varint(*buffer_id as u64);
                                builder.varint(*offset as u64);
                                builder.varint(data_id as u64);
                            }
                        }
                        continue;
                    }
                    if let Some(pass_id) = ids.get(ns, &ref_name) {
                        builder.op(Opcode::ExecPass);
                        builder.varint(pass_id as u64);
                    }
                }
            }
        }

        builder.op(Opcode::Submit);
        builder.op(Opcode::EndFrame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;
    use crate::parser::parse;

    fn compile(src: &str) -> Vec<u8> {
        let ast = parse(src.to_string(), Limits::default()).expect("parse");
        let result = analyze(&ast, &Limits::default());
        assert!(!result.has_errors(), "unexpected analysis errors: {:?}", result.errors);
        emit(&ast, &result)
    }

    fn find_opcode(bytecode: &[u8], op: Opcode) -> bool {
        bytecode.contains(&op.as_byte())
    }

    #[test]
    fn module_begins_with_magic() {
        let module = compile(r#"#frame main { perform=[] }"#);
        assert_eq!(&module[0..4], b"PNGB");
    }

    #[test]
    fn shader_pipeline_pass_frame_emits_draw_sequence() {
        let module = compile(
            r#"
            #wgsl shader { value="@vertex fn vs() {}" }
            #renderPipeline pipe { vertex={ module=$wgsl.shader } }
            #renderPass pass { pipeline=$renderPipeline.pipe draw=3 }
            #frame main { perform=[$renderPass.pass] }
            "#,
        );
        assert!(find_opcode(&module, Opcode::CreateShaderModule));
        assert!(find_opcode(&module, Opcode::CreateRenderPipeline));
        assert!(find_opcode(&module, Opcode::BeginRenderPass));
        assert!(find_opcode(&module, Opcode::SetPipeline));
        assert!(find_opcode(&module, Opcode::Draw));
        assert!(find_opcode(&module, Opcode::EndPass));
    }

    #[test]
    fn buffer_usage_flags_are_combined() {
        let ast = parse(r#"#buffer vertices { size=1024 usage=[VERTEX COPY_DST] }"#.to_string(), Limits::default()).unwrap();
        let result = analyze(&ast, &Limits::default());
        let decl_node = result.lookup(Namespace::Buffer, "vertices").unwrap().node;
        let bits = parse_flag_array(&ast, decl_node, "usage", BUFFER_USAGE_FLAGS);
        assert_eq!(bits, (1 << 0) | (1 << 5));
    }

    #[test]
    fn define_substitution_is_whole_word() {
        let mut defines = IndexMap::new();
        defines.insert(SmolStr::new("FOV"), SmolStr::new("1.2"));
        let out = substitute_defines("let x = FOV; let y = FOVIATION;", &defines);
        assert_eq!(out, "let x = 1.2; let y = FOVIATION;");
    }

    #[test]
    fn queue_write_buffer_inlines_at_frame_time() {
        let module = compile(
            r#"
            #buffer u { size=4 usage=[UNIFORM COPY_DST] }
            #queue w { writeBuffer={ buffer=u data=[0.5] } }
            #frame main { perform=[w] }
            "#,
        );
        assert!(find_opcode(&module, Opcode::WriteBuffer));
        assert!(!find_opcode(&module, Opcode::ExecPass));
    }

    #[test]
    fn compute_pipeline_and_dispatch_are_emitted() {
        let module = compile(
            r#"
            #wgsl cs { value="@compute fn main() {}" }
            #computePipeline pipe { compute={ module=$wgsl.cs } }
            #computePass pass { pipeline=$computePipeline.pipe dispatch=[8 8 1] }
            #frame main { perform=[$computePass.pass] }
            "#,
        );
        assert!(find_opcode(&module, Opcode::CreateComputePipeline));
        assert!(find_opcode(&module, Opcode::Dispatch));
    }

    #[test]
    fn bind_group_layout_and_pipeline_layout_materialize_before_bind_groups() {
        let module = compile(
            r#"
            #bindGroupLayout bgl { entries=[{binding=0}] }
            #pipelineLayout pl { bindGroupLayouts=[$bindGroupLayout.bgl] }
            #bindGroup bg { layout=$pipelineLayout.pl entries=[] }
            #frame main { perform=[] }
            "#,
        );
        assert!(find_opcode(&module, Opcode::CreateBindGroupLayout));
        assert!(find_opcode(&module, Opcode::CreatePipelineLayout));
        assert!(find_opcode(&module, Opcode::CreateBindGroup));

        let bgl_pos = module.iter().position(|&b| b == Opcode::CreateBindGroupLayout.as_byte()).unwrap();
        let pl_pos = module.iter().position(|&b| b == Opcode::CreatePipelineLayout.as_byte()).unwrap();
        let bg_pos = module.iter().position(|&b| b == Opcode::CreateBindGroup.as_byte()).unwrap();
        assert!(bgl_pos < pl_pos && pl_pos < bg_pos);

        // CreateBindGroup's args are (bind_group_id, layout_id, data_id); the
        // layout reference must have resolved to a real id, not the 0
        // sentinel `layout=auto` would also produce, so assert it resolves
        // to the pipeline layout's own allocated id.
        let (_bind_group_id, after_first) = format::read_varint(&module, bg_pos + 1);
        let (layout_id, _) = format::read_varint(&module, after_first);
        let (pipeline_layout_id, _) = format::read_varint(&module, pl_pos + 1);
        assert_eq!(layout_id, pipeline_layout_id);
    }
}
