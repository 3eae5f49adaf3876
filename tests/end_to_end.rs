//! Compile-and-inspect scenarios covering one resource combination each:
//! a render pipeline driven by a bare-identifier pipeline reference, a
//! buffer with combined usage flags, an import cycle that must stop before
//! emission, bare-name resolution through `layout=auto`, a compute
//! pipeline with a multi-axis dispatch, and queue write-buffer inlining
//! combined with `#define` substitution.

use pngc::analyzer::analyze;
use pngc::AnalysisErrorKind;
use pngc::emitter::emit;
use pngc::format::{read_varint, Opcode};
use pngc::limits::Limits;
use pngc::parser::parse;

fn compile_ok(src: &str) -> Vec<u8> {
    let ast = parse(src.to_string(), Limits::default()).expect("parse");
    let result = analyze(&ast, &Limits::default());
    assert!(!result.has_errors(), "unexpected analysis errors: {:?}", result.errors);
    emit(&ast, &result)
}

/// Decodes opcode bytes with a fixed number of varint args each, skipping
/// over the header/data/string sections this test doesn't care about. Only
/// understands the opcodes these scenarios actually emit.
fn decode_bytecode(module: &[u8]) -> Vec<(Opcode, Vec<u64>)> {
    let bytecode_len = u32::from_le_bytes(module[9..13].try_into().unwrap()) as usize;
    let start = 4 + pngc::format::HEADER_LEN;
    let bytecode = &module[start..start + bytecode_len];

    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytecode.len() {
        let byte = bytecode[pos];
        pos += 1;
        let (op, arg_count) = match byte {
            b if b == Opcode::CreateShaderModule.as_byte() => (Opcode::CreateShaderModule, 2),
            b if b == Opcode::CreateBuffer.as_byte() => (Opcode::CreateBuffer, 3),
            b if b == Opcode::CreateTexture.as_byte() => (Opcode::CreateTexture, 2),
            b if b == Opcode::CreateSampler.as_byte() => (Opcode::CreateSampler, 2),
            b if b == Opcode::CreateRenderPipeline.as_byte() => (Opcode::CreateRenderPipeline, 2),
            b if b == Opcode::CreateComputePipeline.as_byte() => (Opcode::CreateComputePipeline, 2),
            b if b == Opcode::CreateBindGroup.as_byte() => (Opcode::CreateBindGroup, 3),
            b if b == Opcode::DefinePass.as_byte() => (Opcode::DefinePass, 3),
            b if b == Opcode::EndPassDef.as_byte() => (Opcode::EndPassDef, 0),
            b if b == Opcode::BeginRenderPass.as_byte() => (Opcode::BeginRenderPass, 0),
            b if b == Opcode::BeginComputePass.as_byte() => (Opcode::BeginComputePass, 0),
            b if b == Opcode::SetPipeline.as_byte() => (Opcode::SetPipeline, 1),
            b if b == Opcode::SetBindGroup.as_byte() => (Opcode::SetBindGroup, 2),
            b if b == Opcode::SetVertexBuffer.as_byte() => (Opcode::SetVertexBuffer, 2),
            b if b == Opcode::SetIndexBuffer.as_byte() => (Opcode::SetIndexBuffer, 1),
            b if b == Opcode::Draw.as_byte() => (Opcode::Draw, 1),
            b if b == Opcode::DrawIndexed.as_byte() => (Opcode::DrawIndexed, 1),
            b if b == Opcode::Dispatch.as_byte() => (Opcode::Dispatch, 3),
            b if b == Opcode::EndPass.as_byte() => (Opcode::EndPass, 0),
            b if b == Opcode::DefineFrame.as_byte() => (Opcode::DefineFrame, 2),
            b if b == Opcode::ExecPass.as_byte() => (Opcode::ExecPass, 1),
            b if b == Opcode::WriteBuffer.as_byte() => (Opcode::WriteBuffer, 3),
            b if b == Opcode::Submit.as_byte() => (Opcode::Submit, 0),
            b if b == Opcode::EndFrame.as_byte() => (Opcode::EndFrame, 0),
            other => panic!("unknown opcode byte {other}"),
        };
        let mut args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            let (value, next) = read_varint(bytecode, pos);
            args.push(value);
            pos = next;
        }
        out.push((op, args));
    }
    out
}

fn data_blob(module: &[u8], data_id: u16) -> Vec<u8> {
    let bytecode_len = u32::from_le_bytes(module[9..13].try_into().unwrap()) as usize;
    let data_offset = 4 + pngc::format::HEADER_LEN + bytecode_len;
    let mut pos = data_offset + 4; // skip blob count
    for _ in 0..data_id {
        let len = u32::from_le_bytes(module[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4 + len;
    }
    let len = u32::from_le_bytes(module[pos..pos + 4].try_into().unwrap()) as usize;
    pos += 4;
    module[pos..pos + len].to_vec()
}

#[test]
fn s1_shader_pipeline_pass_frame() {
    let module = compile_ok(
        r#"
        #wgsl shader { value="@vertex fn vs() {}" }
        #renderPipeline pipe { vertex={ module=$wgsl.shader } }
        #renderPass pass { pipeline=$renderPipeline.pipe draw=3 }
        #frame main { perform=[$renderPass.pass] }
        "#,
    );
    let ops = decode_bytecode(&module);
    let opcodes: Vec<Opcode> = ops.iter().map(|(op, _)| *op).collect();

    let begin = opcodes.iter().position(|&o| o == Opcode::BeginRenderPass).unwrap();
    let set_pipeline = opcodes.iter().position(|&o| o == Opcode::SetPipeline).unwrap();
    let draw = opcodes.iter().position(|&o| o == Opcode::Draw).unwrap();
    let end = opcodes.iter().position(|&o| o == Opcode::EndPass).unwrap();
    assert!(begin < set_pipeline && set_pipeline < draw && draw < end);

    let (_, draw_args) = ops.iter().find(|(op, _)| *op == Opcode::Draw).unwrap();
    assert_eq!(draw_args[0], 3);
}

#[test]
fn s2_buffer_with_usage_flags() {
    let module = compile_ok(
        r#"
        #buffer vertices { size=1024 usage=[VERTEX COPY_DST] }
        #frame main { perform=[] }
        "#,
    );
    let ops = decode_bytecode(&module);
    let (_, args) = ops.iter().find(|(op, _)| *op == Opcode::CreateBuffer).unwrap();
    assert_eq!(args[1], 1024);
    let vertex_bit = 1u64 << 0;
    let copy_dst_bit = 1u64 << 5;
    assert_eq!(args[2] & vertex_bit, vertex_bit);
    assert_eq!(args[2] & copy_dst_bit, copy_dst_bit);
}

#[test]
fn s3_import_cycle_stops_before_emission() {
    let ast = parse(
        r#"
        #wgsl a { imports=[$wgsl.b] value="" }
        #wgsl b { imports=[$wgsl.a] value="" }
        "#
        .to_string(),
        Limits::default(),
    )
    .expect("parse");
    let result = analyze(&ast, &Limits::default());
    assert!(result.errors.iter().any(|e| e.kind == AnalysisErrorKind::CircularDependency));
    assert!(result.has_errors(), "emitter must not run on a failed analysis");
}

#[test]
fn s4_bare_name_resolution_and_layout_auto() {
    let module = compile_ok(
        r#"
        #wgsl shader { value="@vertex fn vs() {}" }
        #renderPipeline myPipeline { vertex={ module=$wgsl.shader } }
        #renderPass pass { pipeline=myPipeline draw=3 }
        #frame main { perform=[$renderPass.pass] }
        "#,
    );
    let ops = decode_bytecode(&module);
    assert!(ops.iter().any(|(op, _)| *op == Opcode::SetPipeline));
}

#[test]
fn s5_compute_pipeline_with_dispatch() {
    let module = compile_ok(
        r#"
        #wgsl cs { value="@compute fn main() {}" }
        #computePipeline pipe { compute={ module=$wgsl.cs } }
        #computePass pass { pipeline=$computePipeline.pipe dispatch=[8 8 1] }
        #frame main { perform=[$computePass.pass] }
        "#,
    );
    let ops = decode_bytecode(&module);
    assert!(ops.iter().any(|(op, _)| *op == Opcode::CreateComputePipeline));
    let (_, dispatch_args) = ops.iter().find(|(op, _)| *op == Opcode::Dispatch).unwrap();
    assert_eq!(dispatch_args, &vec![8, 8, 1]);
}

#[test]
fn s6_queue_inlining_and_define_substitution() {
    let module = compile_ok(
        r#"
        #define K="1.0"
        #buffer u { size=4 usage=[UNIFORM COPY_DST] }
        #shaderModule code { code="fn t() { let x = K; }" }
        #queue w { writeBuffer={ buffer=u data=[0.5] } }
        #frame main { perform=[w] }
        "#,
    );
    let ops = decode_bytecode(&module);

    let (_, shader_args) = ops.iter().find(|(op, _)| *op == Opcode::CreateShaderModule).unwrap();
    let shader_blob = data_blob(&module, shader_args[1] as u16);
    let shader_text = String::from_utf8(shader_blob).unwrap();
    assert!(shader_text.contains("1.0"));
    assert!(!shader_text.contains('K'));

    let (_, write_args) = ops.iter().find(|(op, _)| *op == Opcode::WriteBuffer).unwrap();
    assert_eq!(write_args[0], 0); // buffer u is the only buffer, id 0
    assert_eq!(write_args[1], 0); // default offset
    let write_blob = data_blob(&module, write_args[2] as u16);
    assert_eq!(write_blob, 0.5f32.to_le_bytes());
    assert_eq!(ops.iter().filter(|(op, _)| *op == Opcode::WriteBuffer).count(), 1);
}
