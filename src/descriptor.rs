//! Binary descriptor encoder.
//!
//! Each GPU resource kind gets a compact, append-only binary encoding:
//! `type_tag: u8`, `field_count: u8` (patched after encoding), then
//! `field_count` entries of `{field_id: u8, value_type: u8, value}`.
//! Field IDs are a stable, append-only contract — see the `*_FIELD_*`
//! constants below; never renumber one, only add new ones at the end of
//! their descriptor's list.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use byteorder::{WriteBytesExt, LE};

/// Discriminates which descriptor a blob holds. Append-only, same rule as
/// field IDs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum DescriptorType {
    Texture = 1,
    Sampler = 2,
    BindGroup = 3,
    BindGroupLayout = 4,
    RenderPipeline = 5,
    ComputePipeline = 6,
    RenderPass = 7,
    PipelineLayout = 8,
}

/// Tags the shape of one field's value. `Nested` wraps another fully-encoded
/// descriptor blob (length-prefixed); `Array` is a u8 element count followed
/// by that many values of a single, field-specific shape.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ValueType {
    U32 = 1,
    F32 = 2,
    StringId = 3,
    Array = 4,
    Nested = 5,
    Bool = 6,
    U16 = 7,
    Enum = 8,
}

bitflags! {
    /// One byte of usage flags for a texture. Compile-time size-asserted
    /// below so the binary shape can't silently drift.
    pub struct TextureUsage: u8 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const TEXTURE_BINDING = 1 << 2;
        const STORAGE_BINDING = 1 << 3;
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

const _: () = assert!(std::mem::size_of::<TextureUsage>() == 1);

/// One resolved bind group entry: which binding slot, which resource, and
/// an optional byte offset into it. Fixed 12-byte layout, asserted below.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct BindGroupEntry {
    pub binding: u32,
    pub resource_id: u32,
    pub offset: u32,
}

const _: () = assert!(std::mem::size_of::<BindGroupEntry>() == 12);

/// Stable, single-byte enum codes used inside descriptor fields. Values are
/// an implementation contract; append-only.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum TextureFormat {
    Rgba8Unorm = 1,
    Rgba8UnormSrgb = 2,
    Bgra8Unorm = 3,
    Bgra8UnormSrgb = 4,
    R8Unorm = 5,
    Rg8Unorm = 6,
    Depth24Plus = 7,
    Depth24PlusStencil8 = 8,
    Depth32Float = 9,
}

impl TextureFormat {
    pub fn from_name(name: &str) -> Option<TextureFormat> {
        use TextureFormat::*;
        Some(match name {
            "rgba8unorm" => Rgba8Unorm,
            "rgba8unorm-srgb" => Rgba8UnormSrgb,
            "bgra8unorm" => Bgra8Unorm,
            "bgra8unorm-srgb" => Bgra8UnormSrgb,
            "r8unorm" => R8Unorm,
            "rg8unorm" => Rg8Unorm,
            "depth24plus" => Depth24Plus,
            "depth24plus-stencil8" => Depth24PlusStencil8,
            "depth32float" => Depth32Float,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum FilterMode {
    Nearest = 1,
    Linear = 2,
}

impl FilterMode {
    pub fn from_name(name: &str) -> Option<FilterMode> {
        match name {
            "nearest" => Some(FilterMode::Nearest),
            "linear" => Some(FilterMode::Linear),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum AddressMode {
    ClampToEdge = 1,
    Repeat = 2,
    MirrorRepeat = 3,
}

impl AddressMode {
    pub fn from_name(name: &str) -> Option<AddressMode> {
        match name {
            "clamp-to-edge" => Some(AddressMode::ClampToEdge),
            "repeat" => Some(AddressMode::Repeat),
            "mirror-repeat" => Some(AddressMode::MirrorRepeat),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum LoadOp {
    Load = 1,
    Clear = 2,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum StoreOp {
    Store = 1,
    Discard = 2,
}

/// Accumulates `{field_id, value_type, value}` entries for one descriptor
/// and produces the final `[type_tag, field_count, entries...]` blob.
pub struct DescriptorBuilder {
    type_tag: DescriptorType,
    fields: Vec<u8>,
    field_count: u8,
}

impl DescriptorBuilder {
    pub fn new(type_tag: DescriptorType) -> DescriptorBuilder {
        DescriptorBuilder {
            type_tag,
            fields: Vec::new(),
            field_count: 0,
        }
    }

    fn field_header(&mut self, field_id: u8, value_type: ValueType) {
        self.fields.push(field_id);
        self.fields.push(value_type as u8);
        self.field_count += 1;
    }

    pub fn u32(&mut self, field_id: u8, value: u32) -> &mut Self {
        self.field_header(field_id, ValueType::U32);
        self.fields.write_u32::<LE>(value).expect("write to Vec never fails");
        self
    }

    pub fn u16(&mut self, field_id: u8, value: u16) -> &mut Self {
        self.field_header(field_id, ValueType::U16);
        self.fields.write_u16::<LE>(value).expect("write to Vec never fails");
        self
    }

    pub fn f32(&mut self, field_id: u8, value: f32) -> &mut Self {
        self.field_header(field_id, ValueType::F32);
        self.fields.write_f32::<LE>(value).expect("write to Vec never fails");
        self
    }

    pub fn bool(&mut self, field_id: u8, value: bool) -> &mut Self {
        self.field_header(field_id, ValueType::Bool);
        self.fields.push(value as u8);
        self
    }

    pub fn string_id(&mut self, field_id: u8, id: u16) -> &mut Self {
        self.field_header(field_id, ValueType::StringId);
        self.fields.write_u16::<LE>(id).expect("write to Vec never fails");
        self
    }

    pub fn enum_byte(&mut self, field_id: u8, value: u8) -> &mut Self {
        self.field_header(field_id, ValueType::Enum);
        self.fields.push(value);
        self
    }

    /// Appends a fixed-width array: one u8 count, then `count` little-endian
    /// u32 elements.
    pub fn u32_array(&mut self, field_id: u8, values: &[u32]) -> &mut Self {
        self.field_header(field_id, ValueType::Array);
        self.fields.push(values.len() as u8);
        for &v in values {
            self.fields.write_u32::<LE>(v).expect("write to Vec never fails");
        }
        self
    }

    /// Appends an already-encoded child descriptor blob, length-prefixed so
    /// a reader can skip it without decoding.
    pub fn nested(&mut self, field_id: u8, blob: &[u8]) -> &mut Self {
        self.field_header(field_id, ValueType::Nested);
        self.fields.write_u32::<LE>(blob.len() as u32).expect("write to Vec never fails");
        self.fields.extend_from_slice(blob);
        self
    }

    /// Appends an array of raw `BindGroupEntry` records, each 12 bytes.
    pub fn bind_group_entries(&mut self, field_id: u8, entries: &[BindGroupEntry]) -> &mut Self {
        self.field_header(field_id, ValueType::Array);
        self.fields.push(entries.len() as u8);
        for entry in entries {
            self.fields.extend_from_slice(bytemuck::bytes_of(entry));
        }
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.fields.len());
        out.push(self.type_tag as u8);
        out.push(self.field_count);
        out.extend(self.fields);
        out
    }
}

// --- append-only field id tables, one block per descriptor kind ---

pub mod texture_fields {
    pub const WIDTH: u8 = 0;
    pub const HEIGHT: u8 = 1;
    pub const FORMAT: u8 = 2;
    pub const USAGE: u8 = 3;
    pub const CANVAS_SIZED: u8 = 4;
    pub const IMAGE_BITMAP_ID: u8 = 5;
}

pub mod sampler_fields {
    pub const MAG_FILTER: u8 = 0;
    pub const MIN_FILTER: u8 = 1;
    pub const ADDRESS_MODE_U: u8 = 2;
    pub const ADDRESS_MODE_V: u8 = 3;
}

pub mod bind_group_fields {
    pub const GROUP_INDEX: u8 = 0;
    pub const ENTRIES: u8 = 1;
}

pub mod render_pass_fields {
    pub const LOAD_OP: u8 = 0;
    pub const STORE_OP: u8 = 1;
    pub const CLEAR_COLOR: u8 = 2;
}

pub mod bind_group_layout_fields {
    pub const ENTRIES: u8 = 0;
}

pub mod pipeline_layout_fields {
    pub const BIND_GROUP_LAYOUTS: u8 = 0;
}

/// An explicitly sized texture (`width`/`height` given in source).
pub fn encode_texture_explicit(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Vec<u8> {
    let mut builder = DescriptorBuilder::new(DescriptorType::Texture);
    builder
        .u32(texture_fields::WIDTH, width)
        .u32(texture_fields::HEIGHT, height)
        .enum_byte(texture_fields::FORMAT, format as u8)
        .enum_byte(texture_fields::USAGE, usage.bits());
    builder.finish()
}

/// A texture sized to match the output canvas; width/height are omitted and
/// resolved by the runtime at creation time.
pub fn encode_texture_canvas_sized(format: TextureFormat, usage: TextureUsage) -> Vec<u8> {
    let mut builder = DescriptorBuilder::new(DescriptorType::Texture);
    builder
        .bool(texture_fields::CANVAS_SIZED, true)
        .enum_byte(texture_fields::FORMAT, format as u8)
        .enum_byte(texture_fields::USAGE, usage.bits());
    builder.finish()
}

/// A texture sized from a previously-created `ImageBitmap` resource.
pub fn encode_texture_from_image_bitmap(image_bitmap_id: u32, format: TextureFormat, usage: TextureUsage) -> Vec<u8> {
    let mut builder = DescriptorBuilder::new(DescriptorType::Texture);
    builder
        .u32(texture_fields::IMAGE_BITMAP_ID, image_bitmap_id)
        .enum_byte(texture_fields::FORMAT, format as u8)
        .enum_byte(texture_fields::USAGE, usage.bits());
    builder.finish()
}

pub fn encode_sampler(mag_filter: FilterMode, min_filter: FilterMode, address_mode: AddressMode) -> Vec<u8> {
    let mut builder = DescriptorBuilder::new(DescriptorType::Sampler);
    builder
        .enum_byte(sampler_fields::MAG_FILTER, mag_filter as u8)
        .enum_byte(sampler_fields::MIN_FILTER, min_filter as u8)
        .enum_byte(sampler_fields::ADDRESS_MODE_U, address_mode as u8)
        .enum_byte(sampler_fields::ADDRESS_MODE_V, address_mode as u8);
    builder.finish()
}

pub fn encode_bind_group_descriptor(group_index: u32, entries: &[BindGroupEntry]) -> Vec<u8> {
    let mut builder = DescriptorBuilder::new(DescriptorType::BindGroup);
    builder
        .u32(bind_group_fields::GROUP_INDEX, group_index)
        .bind_group_entries(bind_group_fields::ENTRIES, entries);
    builder.finish()
}

pub fn encode_render_pass_descriptor(load_op: LoadOp, store_op: StoreOp, clear_color: [f32; 4]) -> Vec<u8> {
    let mut builder = DescriptorBuilder::new(DescriptorType::RenderPass);
    builder
        .enum_byte(render_pass_fields::LOAD_OP, load_op as u8)
        .enum_byte(render_pass_fields::STORE_OP, store_op as u8);
    builder.field_header(render_pass_fields::CLEAR_COLOR, ValueType::Array);
    builder.fields.push(4);
    for component in clear_color {
        builder.fields.write_f32::<LE>(component).expect("write to Vec never fails");
    }
    builder.finish()
}

pub fn encode_bind_group_layout_descriptor(entry_bindings: &[u32]) -> Vec<u8> {
    let mut builder = DescriptorBuilder::new(DescriptorType::BindGroupLayout);
    builder.u32_array(bind_group_layout_fields::ENTRIES, entry_bindings);
    builder.finish()
}

pub fn encode_pipeline_layout_descriptor(bind_group_layout_ids: &[u32]) -> Vec<u8> {
    let mut builder = DescriptorBuilder::new(DescriptorType::PipelineLayout);
    builder.u32_array(pipeline_layout_fields::BIND_GROUP_LAYOUTS, bind_group_layout_ids);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_group_entry_is_twelve_bytes() {
        assert_eq!(std::mem::size_of::<BindGroupEntry>(), 12);
    }

    #[test]
    fn texture_usage_is_one_byte() {
        assert_eq!(std::mem::size_of::<TextureUsage>(), 1);
    }

    #[test]
    fn explicit_texture_encodes_type_tag_and_field_count() {
        let blob = encode_texture_explicit(640, 480, TextureFormat::Rgba8Unorm, TextureUsage::TEXTURE_BINDING);
        assert_eq!(blob[0], DescriptorType::Texture as u8);
        assert_eq!(blob[1], 4); // width, height, format, usage
    }

    #[test]
    fn canvas_sized_texture_omits_explicit_dimensions() {
        let blob = encode_texture_canvas_sized(TextureFormat::Bgra8Unorm, TextureUsage::RENDER_ATTACHMENT);
        assert_eq!(blob[1], 3); // canvas_sized, format, usage
    }

    #[test]
    fn bind_group_descriptor_embeds_raw_entries() {
        let entries = [
            BindGroupEntry { binding: 0, resource_id: 7, offset: 0 },
            BindGroupEntry { binding: 1, resource_id: 8, offset: 16 },
        ];
        let blob = encode_bind_group_descriptor(2, &entries);
        assert_eq!(blob[0], DescriptorType::BindGroup as u8);
        // group_index field (6 bytes: id+type+u32) + entries field header (2) + count(1) + 2*12
        assert_eq!(blob.len(), 2 + 6 + 2 + 1 + 24);
    }

    #[test]
    fn render_pass_descriptor_carries_four_clear_components() {
        let blob = encode_render_pass_descriptor(LoadOp::Clear, StoreOp::Store, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(blob[0], DescriptorType::RenderPass as u8);
        assert_eq!(blob[1], 3);
    }

    #[test]
    fn texture_format_round_trips_known_names() {
        assert_eq!(TextureFormat::from_name("rgba8unorm"), Some(TextureFormat::Rgba8Unorm));
        assert_eq!(TextureFormat::from_name("depth32float"), Some(TextureFormat::Depth32Float));
        assert_eq!(TextureFormat::from_name("bogus"), None);
    }

    #[test]
    fn bind_group_layout_descriptor_embeds_binding_slots() {
        let blob = encode_bind_group_layout_descriptor(&[0, 1, 2]);
        assert_eq!(blob[0], DescriptorType::BindGroupLayout as u8);
        assert_eq!(blob[1], 1); // entries
        // field header (2) + array count (1) + 3 * u32
        assert_eq!(blob.len(), 2 + 2 + 1 + 3 * 4);
    }

    #[test]
    fn pipeline_layout_descriptor_embeds_bind_group_layout_ids() {
        let blob = encode_pipeline_layout_descriptor(&[5, 9]);
        assert_eq!(blob[0], DescriptorType::PipelineLayout as u8);
        assert_eq!(blob[1], 1); // bindGroupLayouts
        assert_eq!(blob.len(), 2 + 2 + 1 + 2 * 4);
    }
}
