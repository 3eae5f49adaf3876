//! Multi-pass semantic analysis.
//!
//! Seven ordered passes over a parsed [`Ast`], followed by a constant
//! expression evaluator used by the emitter (not one of the seven — see
//! [`eval_expr`]). Every pass collects into a shared [`AnalysisResult`]
//! instead of stopping at the first problem, so one run reports everything
//! it can. None of the passes mutate the AST.

use std::collections::HashMap;

use indexmap::IndexMap;
use regex::Regex;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::ast::{extra_slice, Ast, NodeTag};
use crate::error::{AnalysisError, AnalysisErrorKind};
use crate::limits::Limits;
use crate::namespace::{self, Namespace};
use tracing::{debug, instrument};

/// What the analyzer knows about one declared name.
#[derive(Debug, Clone)]
pub struct SymbolInfo {
    pub node: u32,
    pub data_id: Option<u16>,
    pub dependencies: SmallVec<[SmolStr; 4]>,
}

/// How a bare identifier in a resolvable property context was interpreted.
#[derive(Debug, Clone)]
pub struct ResolvedIdentifier {
    pub namespace: Namespace,
    pub name: SmolStr,
}

/// The `{size, bind_group, binding}` metadata for one `module.var` access.
#[derive(Debug, Clone)]
pub struct ResolvedUniform {
    pub size: u32,
    pub bind_group: u32,
    pub binding: u32,
    pub module_name: SmolStr,
    pub var_name: SmolStr,
}

/// A deduplicated `#wgsl` body, content-addressed by a 64-bit hash.
#[derive(Debug, Clone)]
pub struct ShaderFragment {
    pub name: SmolStr,
    pub content_hash: u64,
    pub data_id: u16,
}

/// Everything the seven passes produce, transferred wholesale to the caller.
#[derive(Debug, Default)]
pub struct AnalysisResult {
    pub symbols: HashMap<Namespace, IndexMap<SmolStr, SymbolInfo>>,
    pub global_names: HashMap<SmolStr, (Namespace, u32)>,
    pub shader_fragments: Vec<ShaderFragment>,
    pub errors: Vec<AnalysisError>,
    pub resolved_identifiers: HashMap<u32, ResolvedIdentifier>,
    pub resolved_uniforms: HashMap<u32, ResolvedUniform>,
}

impl AnalysisResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn symbols_in(&self, namespace: Namespace) -> Option<&IndexMap<SmolStr, SymbolInfo>> {
        self.symbols.get(&namespace)
    }

    pub fn lookup(&self, namespace: Namespace, name: &str) -> Option<&SymbolInfo> {
        self.symbols.get(&namespace).and_then(|t| t.get(name))
    }
}

/// Runs all seven passes over `ast` and returns the accumulated result. The
/// error count is monotonic across passes; nothing here can remove an error
/// a prior pass recorded.
#[instrument(skip_all)]
pub fn analyze(ast: &Ast, limits: &Limits) -> AnalysisResult {
    let mut result = AnalysisResult::default();
    collect_declarations(ast, &mut result);
    debug!(count = result.global_names.len(), "declarations collected");
    validate_required_properties(ast, &mut result);
    resolve_explicit_references(ast, &mut result);
    resolve_bare_identifiers(ast, &mut result);
    detect_import_cycles(ast, &mut result, limits);
    dedup_shaders(ast, &mut result);
    debug!(count = result.shader_fragments.len(), "shader fragments deduped");
    resolve_uniform_accesses(ast, &mut result);
    debug!(errors = result.errors.len(), "analysis finished");
    result
}

// ---------------------------------------------------------------------
// Pass 1: collect declarations
// ---------------------------------------------------------------------

#[instrument(skip_all)]
fn collect_declarations(ast: &Ast, result: &mut AnalysisResult) {
    for &node in ast.root_declarations() {
        let n = ast.nodes.get(node);
        let namespace = match n.tag {
            NodeTag::Declaration => {
                let keyword = ast.tokens.tag(ast.keyword_token(node));
                match Namespace::from_keyword(keyword) {
                    Some(ns) => ns,
                    None => continue,
                }
            }
            NodeTag::Define => Namespace::Define,
            _ => continue, // #import declares nothing
        };
        let name = SmolStr::new(ast.node_source(node));
        if let Some(&(existing_ns, _)) = result.global_names.get(&name) {
            result.errors.push(AnalysisError::new(
                AnalysisErrorKind::DuplicateDefinition,
                node,
                format!("'{name}' is already declared in namespace '{existing_ns}'"),
            ));
            continue;
        }
        result.global_names.insert(name.clone(), (namespace, node));
        result.symbols.entry(namespace).or_default().insert(
            name,
            SymbolInfo {
                node,
                data_id: None,
                dependencies: SmallVec::new(),
            },
        );
    }
}

// ---------------------------------------------------------------------
// Pass 2: required properties
// ---------------------------------------------------------------------

#[instrument(skip_all)]
fn validate_required_properties(ast: &Ast, result: &mut AnalysisResult) {
    let checks: Vec<(u32, &'static [&'static str])> = result
        .symbols
        .iter()
        .flat_map(|(&namespace, table)| {
            let required = namespace::required_properties(namespace);
            table.values().filter_map(move |info| {
                if required.is_empty() {
                    None
                } else {
                    Some((info.node, required))
                }
            })
        })
        .collect();

    for (node, required) in checks {
        let decl = ast.nodes.get(node);
        if decl.tag != NodeTag::Declaration {
            continue;
        }
        let props = extra_slice(&ast.extra_data, decl.as_sub_range());
        for &name in required {
            let present = props.iter().any(|&p| ast.node_source(p) == name);
            if !present {
                result
                    .errors
                    .push(AnalysisError::new(AnalysisErrorKind::MissingRequiredProperty, node, name));
            }
        }
    }
}

// ---------------------------------------------------------------------
// Pass 3: explicit references
// ---------------------------------------------------------------------

#[instrument(skip_all)]
fn resolve_explicit_references(ast: &Ast, result: &mut AnalysisResult) {
    for i in 0..ast.nodes.len() as u32 {
        let node = ast.nodes.get(i);
        if node.tag != NodeTag::ReferenceValue {
            continue;
        }
        let namespace_text = ast.tokens.loc(node.main_token).slice(&ast.source_text);
        let namespace = match Namespace::from_reference_name(namespace_text) {
            Some(ns) => ns,
            None => {
                result.errors.push(AnalysisError::new(
                    AnalysisErrorKind::InvalidReferenceNamespace,
                    i,
                    namespace_text.to_string(),
                ));
                continue;
            }
        };
        let (name_token, _) = node.as_token_pair();
        if name_token == u32::MAX {
            result
                .errors
                .push(AnalysisError::new(AnalysisErrorKind::UndefinedReference, i, "reference has no name segment"));
            continue;
        }
        let name = ast.tokens.loc(name_token).slice(&ast.source_text);
        let found = result.symbols.get(&namespace).is_some_and(|t| t.contains_key(name));
        if !found {
            result.errors.push(AnalysisError::new(
                AnalysisErrorKind::UndefinedReference,
                i,
                format!("'{name}' not found in namespace '{namespace}'"),
            ));
        }
    }
}

// ---------------------------------------------------------------------
// Pass 4: bare identifier resolution by property context
// ---------------------------------------------------------------------

#[instrument(skip_all)]
fn resolve_bare_identifiers(ast: &Ast, result: &mut AnalysisResult) {
    for i in 0..ast.nodes.len() as u32 {
        let node = ast.nodes.get(i);
        if node.tag != NodeTag::Property {
            continue;
        }
        let property_name = ast.node_source(i);
        let search = match namespace::property_context(property_name) {
            Some(list) => list,
            None => continue,
        };
        let value = ast.nodes.get(node.as_node());
        match value.tag {
            NodeTag::IdentifierValue => {
                resolve_one_identifier(ast, result, node.as_node(), search, property_name);
            }
            NodeTag::ArrayValue => {
                for &element in extra_slice(&ast.extra_data, value.as_sub_range()) {
                    if ast.nodes.get(element).tag == NodeTag::IdentifierValue {
                        resolve_one_identifier(ast, result, element, search, property_name);
                    }
                }
            }
            _ => {}
        }
    }
}

fn resolve_one_identifier(ast: &Ast, result: &mut AnalysisResult, id_node: u32, search: &[Namespace], property_name: &str) {
    let name = ast.node_source(id_node);
    if namespace::is_reserved_word(name) {
        return;
    }
    for &ns in search {
        if result.symbols.get(&ns).is_some_and(|t| t.contains_key(name)) {
            result
                .resolved_identifiers
                .insert(id_node, ResolvedIdentifier { namespace: ns, name: SmolStr::new(name) });
            return;
        }
    }
    result.errors.push(AnalysisError::new(
        AnalysisErrorKind::UndefinedReference,
        id_node,
        format!("'{name}' not found for property '{property_name}'"),
    ));
}

// ---------------------------------------------------------------------
// Pass 5: shader import cycle detection
// ---------------------------------------------------------------------

#[derive(Copy, Clone, Eq, PartialEq)]
enum VisitState {
    Visiting,
    Visited,
}

#[instrument(skip_all)]
fn detect_import_cycles(ast: &Ast, result: &mut AnalysisResult, limits: &Limits) {
    let wgsl = match result.symbols.get(&Namespace::Wgsl) {
        Some(table) => table.clone(),
        None => return,
    };

    let mut graph: IndexMap<SmolStr, Vec<SmolStr>> = IndexMap::new();
    for (name, info) in wgsl.iter() {
        let deps = collect_import_names(ast, info.node);
        if !deps.is_empty() {
            graph.insert(name.clone(), deps);
        }
    }

    let mut state: HashMap<SmolStr, VisitState> = HashMap::new();
    let roots: Vec<SmolStr> = graph.keys().cloned().collect();
    for root in roots {
        if state.get(&root) == Some(&VisitState::Visited) {
            continue;
        }
        // Explicit stack of {name, next_dep_index}: no recursion, bounded by
        // MAX_DFS_DEPTH.
        let mut stack: Vec<(SmolStr, usize)> = vec![(root.clone(), 0)];
        state.insert(root, VisitState::Visiting);
        while let Some((name, next_idx)) = stack.last().cloned() {
            let deps = graph.get(&name).cloned().unwrap_or_default();
            if next_idx >= deps.len() {
                state.insert(name, VisitState::Visited);
                stack.pop();
                continue;
            }
            stack.last_mut().unwrap().1 += 1;
            let dep = deps[next_idx].clone();
            match state.get(&dep) {
                Some(VisitState::Visiting) => {
                    if let Some(info) = wgsl.get(&name) {
                        result.errors.push(AnalysisError::new(
                            AnalysisErrorKind::CircularDependency,
                            info.node,
                            format!("import of '{dep}' closes a cycle"),
                        ));
                    }
                }
                Some(VisitState::Visited) => {}
                None => {
                    if stack.len() >= limits.max_dfs_depth {
                        panic!("analyzer: import graph DFS exceeded MAX_DFS_DEPTH");
                    }
                    state.insert(dep.clone(), VisitState::Visiting);
                    stack.push((dep, 0));
                }
            }
        }
    }
}

fn collect_import_names(ast: &Ast, decl_node: u32) -> Vec<SmolStr> {
    let decl = ast.nodes.get(decl_node);
    for &p in extra_slice(&ast.extra_data, decl.as_sub_range()) {
        if ast.node_source(p) != "imports" {
            continue;
        }
        let value = ast.nodes.get(ast.nodes.get(p).as_node());
        if value.tag != NodeTag::ArrayValue {
            continue;
        }
        let mut names = Vec::new();
        for &element in extra_slice(&ast.extra_data, value.as_sub_range()) {
            let el = ast.nodes.get(element);
            if el.tag == NodeTag::ReferenceValue {
                let (name_token, _) = el.as_token_pair();
                if name_token != u32::MAX {
                    names.push(SmolStr::new(ast.tokens.loc(name_token).slice(&ast.source_text)));
                }
            }
        }
        return names;
    }
    Vec::new()
}

// ---------------------------------------------------------------------
// Pass 6: content-addressed shader dedup
// ---------------------------------------------------------------------

/// FNV-1a, 64-bit: small, dependency-free, and fine for content addressing
/// (collision resistance against adversarial input is not a requirement for
/// deduplicating shader fragments).
fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s)
}

fn shader_value_content(ast: &Ast, decl_node: u32) -> Option<String> {
    let decl = ast.nodes.get(decl_node);
    for &p in extra_slice(&ast.extra_data, decl.as_sub_range()) {
        if ast.node_source(p) != "value" {
            continue;
        }
        let value = ast.nodes.get(ast.nodes.get(p).as_node());
        if !matches!(value.tag, NodeTag::StringValue | NodeTag::RuntimeInterpolationValue) {
            continue;
        }
        let raw = ast.tokens.loc(value.main_token).slice(&ast.source_text);
        return Some(strip_quotes(raw).to_string());
    }
    None
}

#[instrument(skip_all)]
fn dedup_shaders(ast: &Ast, result: &mut AnalysisResult) {
    let names: Vec<SmolStr> = match result.symbols.get(&Namespace::Wgsl) {
        Some(table) => table.keys().cloned().collect(),
        None => return,
    };

    let mut hash_to_id: HashMap<u64, u16> = HashMap::new();
    let mut next_id: u16 = 0;

    for name in names {
        let node = result.symbols[&Namespace::Wgsl][&name].node;
        let content = match shader_value_content(ast, node) {
            Some(c) => c,
            None => continue,
        };
        let hash = fnv1a64(content.as_bytes());
        let data_id = match hash_to_id.get(&hash) {
            Some(&id) => id,
            None => {
                let id = next_id;
                next_id += 1;
                hash_to_id.insert(hash, id);
                id
            }
        };
        result
            .symbols
            .get_mut(&Namespace::Wgsl)
            .unwrap()
            .get_mut(&name)
            .unwrap()
            .data_id = Some(data_id);
        result.shader_fragments.push(ShaderFragment {
            name,
            content_hash: hash,
            data_id,
        });
    }
}

// ---------------------------------------------------------------------
// Pass 7: uniform access resolution
// ---------------------------------------------------------------------

const DEFAULT_UNIFORM_SIZE: u32 = 12; // time + canvas dimensions

#[instrument(skip_all)]
fn resolve_uniform_accesses(ast: &Ast, result: &mut AnalysisResult) {
    for i in 0..ast.nodes.len() as u32 {
        let node = ast.nodes.get(i);
        if node.tag != NodeTag::UniformAccessValue {
            continue;
        }
        let module_name = ast.tokens.loc(node.main_token).slice(&ast.source_text);
        let (var_token, _) = node.as_token_pair();
        let var_name = ast.tokens.loc(var_token).slice(&ast.source_text);

        let module_node = result
            .lookup(Namespace::ShaderModule, module_name)
            .or_else(|| result.lookup(Namespace::Wgsl, module_name))
            .map(|info| info.node);

        let module_node = match module_node {
            Some(n) => n,
            None => {
                result.errors.push(AnalysisError::new(
                    AnalysisErrorKind::UndefinedReference,
                    i,
                    format!("shader module '{module_name}' not found"),
                ));
                continue;
            }
        };

        let source = shader_value_content(ast, module_node).unwrap_or_default();
        let (bind_group, binding, size) =
            scan_uniform_declaration(&source, var_name).unwrap_or_else(|| uniform_from_array_property(ast, module_node, var_name));

        result.resolved_uniforms.insert(
            i,
            ResolvedUniform {
                size,
                bind_group,
                binding,
                module_name: SmolStr::new(module_name),
                var_name: SmolStr::new(var_name),
            },
        );
    }
}

/// Preferred path: scan shader source text for `@group(G) @binding(B)
/// var<uniform> name : T;`, tolerating a little whitespace/formatting noise
/// between the three parts. This is a heuristic, not a WGSL parser; the
/// nearness constants below are picked to tolerate realistic formatting
/// without false-matching unrelated declarations.
const UNIFORM_GROUP_BINDING_NEARNESS: usize = 20;
const UNIFORM_BINDING_VAR_NEARNESS: usize = 30;

fn scan_uniform_declaration(source: &str, var_name: &str) -> Option<(u32, u32, u32)> {
    let pattern = format!(
        r"@group\((\d+)\)[\s\S]{{0,{g}}}@binding\((\d+)\)[\s\S]{{0,{b}}}var\s*<\s*uniform\s*>\s*{v}\b",
        g = UNIFORM_GROUP_BINDING_NEARNESS,
        b = UNIFORM_BINDING_VAR_NEARNESS,
        v = regex::escape(var_name),
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(source)?;
    let group: u32 = caps.get(1)?.as_str().parse().ok()?;
    let binding: u32 = caps.get(2)?.as_str().parse().ok()?;
    Some((group, binding, DEFAULT_UNIFORM_SIZE))
}

/// Fallback path: an explicit `uniforms` array property on the shader
/// declaration, each element an object with a `var` field.
fn uniform_from_array_property(ast: &Ast, module_node: u32, var_name: &str) -> (u32, u32, u32) {
    let decl = ast.nodes.get(module_node);
    for &p in extra_slice(&ast.extra_data, decl.as_sub_range()) {
        if ast.node_source(p) != "uniforms" {
            continue;
        }
        let value = ast.nodes.get(ast.nodes.get(p).as_node());
        if value.tag != NodeTag::ArrayValue {
            continue;
        }
        for &element in extra_slice(&ast.extra_data, value.as_sub_range()) {
            let entry = ast.nodes.get(element);
            if entry.tag != NodeTag::ObjectValue {
                continue;
            }
            let mut group = 0u32;
            let mut binding = 0u32;
            let mut matches_var = false;
            for &field in extra_slice(&ast.extra_data, entry.as_sub_range()) {
                let field_name = ast.node_source(field);
                let field_value = ast.nodes.get(ast.nodes.get(field).as_node());
                match field_name {
                    "var" if field_value.tag == NodeTag::StringValue || field_value.tag == NodeTag::IdentifierValue => {
                        let text = ast.tokens.loc(field_value.main_token).slice(&ast.source_text);
                        matches_var = strip_quotes(text) == var_name;
                    }
                    "group" if field_value.tag == NodeTag::NumberValue => {
                        let value_node = ast.nodes.get(field).as_node();
                        group = eval_expr(ast, value_node, &Limits::default()).unwrap_or(0.0) as u32;
                    }
                    "binding" if field_value.tag == NodeTag::NumberValue => {
                        let value_node = ast.nodes.get(field).as_node();
                        binding = eval_expr(ast, value_node, &Limits::default()).unwrap_or(0.0) as u32;
                    }
                    _ => {}
                }
            }
            if matches_var {
                return (group, binding, DEFAULT_UNIFORM_SIZE);
            }
        }
    }
    (0, 0, DEFAULT_UNIFORM_SIZE)
}

// ---------------------------------------------------------------------
// Constant expression evaluation (used by the emitter, not numbered above)
// ---------------------------------------------------------------------

/// Folds a `#define`/numeric-property expression tree (or a bare number or
/// `PI`/`E`/`TAU` identifier) to an `f64`. Iterative with explicit work and
/// value stacks, bounded by `MAX_EXPR_DEPTH`. Returns `None` on division by
/// zero or depth overflow.
pub fn eval_expr(ast: &Ast, node: u32, limits: &Limits) -> Option<f64> {
    enum Work {
        Visit(u32),
        ApplyAdd,
        ApplySub,
        ApplyMul,
        ApplyDiv,
        ApplyNeg,
    }

    let mut work: Vec<Work> = vec![Work::Visit(node)];
    let mut values: Vec<f64> = Vec::new();
    let mut steps = 0usize;

    while let Some(task) = work.pop() {
        steps += 1;
        if steps > limits.max_iterations || work.len() > limits.max_expr_depth {
            return None;
        }
        match task {
            Work::Visit(n) => {
                let n_data = ast.nodes.get(n);
                match n_data.tag {
                    NodeTag::NumberValue => values.push(parse_number_literal(ast.node_source(n))?),
                    NodeTag::IdentifierValue => values.push(parse_named_constant(ast.node_source(n))?),
                    NodeTag::Negate => {
                        work.push(Work::ApplyNeg);
                        work.push(Work::Visit(n_data.as_node()));
                    }
                    NodeTag::Add | NodeTag::Subtract | NodeTag::Multiply | NodeTag::Divide => {
                        let (lhs, rhs) = n_data.as_node_pair();
                        let apply = match n_data.tag {
                            NodeTag::Add => Work::ApplyAdd,
                            NodeTag::Subtract => Work::ApplySub,
                            NodeTag::Multiply => Work::ApplyMul,
                            _ => Work::ApplyDiv,
                        };
                        work.push(apply);
                        work.push(Work::Visit(rhs));
                        work.push(Work::Visit(lhs));
                    }
                    _ => return None,
                }
            }
            Work::ApplyNeg => {
                let v = values.pop()?;
                values.push(-v);
            }
            Work::ApplyAdd => {
                let (b, a) = (values.pop()?, values.pop()?);
                values.push(a + b);
            }
            Work::ApplySub => {
                let (b, a) = (values.pop()?, values.pop()?);
                values.push(a - b);
            }
            Work::ApplyMul => {
                let (b, a) = (values.pop()?, values.pop()?);
                values.push(a * b);
            }
            Work::ApplyDiv => {
                let (b, a) = (values.pop()?, values.pop()?);
                if b == 0.0 {
                    return None;
                }
                values.push(a / b);
            }
        }
    }

    if values.len() == 1 {
        values.pop()
    } else {
        None
    }
}

fn parse_named_constant(name: &str) -> Option<f64> {
    match name {
        "PI" => Some(std::f64::consts::PI),
        "E" => Some(std::f64::consts::E),
        "TAU" => Some(std::f64::consts::TAU),
        _ => None,
    }
}

fn parse_number_literal(text: &str) -> Option<f64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use crate::parser::parse;

    fn analyze_source(src: &str) -> (Ast, AnalysisResult) {
        let ast = parse(src.to_string(), Limits::default()).expect("parse");
        let result = analyze(&ast, &Limits::default());
        (ast, result)
    }

    #[test]
    fn collects_declarations_into_per_namespace_tables() {
        let (_, result) = analyze_source(r#"#buffer b { size=4 usage=[] }"#);
        assert!(result.lookup(Namespace::Buffer, "b").is_some());
        assert!(!result.has_errors());
    }

    #[test]
    fn duplicate_names_across_namespaces_are_rejected() {
        let (_, result) = analyze_source(
            r#"
            #buffer x { size=4 usage=[] }
            #texture x { format="rgba8unorm" usage=[] }
            "#,
        );
        assert!(result.errors.iter().any(|e| e.kind == AnalysisErrorKind::DuplicateDefinition));
    }

    #[test]
    fn missing_required_property_is_reported() {
        let (_, result) = analyze_source(r#"#buffer b { usage=[] }"#);
        assert!(result
            .errors
            .iter()
            .any(|e| e.kind == AnalysisErrorKind::MissingRequiredProperty && e.message == "size"));
    }

    #[test]
    fn undefined_explicit_reference_is_reported() {
        let (_, result) = analyze_source(r#"#frame main { perform=[$renderPass.missing] }"#);
        assert!(result.errors.iter().any(|e| e.kind == AnalysisErrorKind::UndefinedReference));
    }

    #[test]
    fn invalid_reference_namespace_is_reported() {
        let (_, result) = analyze_source(r#"#define K = $bogus.name"#);
        assert!(result.errors.iter().any(|e| e.kind == AnalysisErrorKind::InvalidReferenceNamespace));
    }

    #[test]
    fn bare_identifier_resolves_by_property_context() {
        let (ast, result) = analyze_source(
            r#"
            #renderPipeline myPipeline { vertex={ module=0 } }
            #renderPass pass { pipeline=myPipeline draw=3 }
            "#,
        );
        let pass_decl = result.lookup(Namespace::RenderPass, "pass").unwrap().node;
        let decl = ast.nodes.get(pass_decl);
        let props = extra_slice(&ast.extra_data, decl.as_sub_range());
        let pipeline_prop = props.iter().find(|&&p| ast.node_source(p) == "pipeline").unwrap();
        let value_node = ast.nodes.get(*pipeline_prop).as_node();
        assert!(result.resolved_identifiers.contains_key(&value_node));
    }

    #[test]
    fn reserved_words_are_never_resolved_as_identifiers() {
        let (_, result) = analyze_source(r#"#renderPass pass { before=auto draw=1 }"#);
        assert!(!result.errors.iter().any(|e| e.kind == AnalysisErrorKind::UndefinedReference));
    }

    #[test]
    fn import_cycle_is_detected() {
        let (_, result) = analyze_source(
            r#"
            #wgsl a { imports=[$wgsl.b] value="" }
            #wgsl b { imports=[$wgsl.a] value="" }
            "#,
        );
        assert!(result.errors.iter().any(|e| e.kind == AnalysisErrorKind::CircularDependency));
    }

    #[test]
    fn identical_shader_bodies_share_a_data_id() {
        let (_, result) = analyze_source(
            r#"
            #wgsl a { value="@vertex fn vs() {}" }
            #wgsl b { value="@vertex fn vs() {}" }
            "#,
        );
        let id_a = result.lookup(Namespace::Wgsl, "a").unwrap().data_id;
        let id_b = result.lookup(Namespace::Wgsl, "b").unwrap().data_id;
        assert!(id_a.is_some());
        assert_eq!(id_a, id_b);
        assert_eq!(result.shader_fragments.len(), 2);
    }

    #[test]
    fn distinct_shader_bodies_get_distinct_data_ids() {
        let (_, result) = analyze_source(
            r#"
            #wgsl a { value="@vertex fn a() {}" }
            #wgsl b { value="@vertex fn b() {}" }
            "#,
        );
        let id_a = result.lookup(Namespace::Wgsl, "a").unwrap().data_id;
        let id_b = result.lookup(Namespace::Wgsl, "b").unwrap().data_id;
        assert_ne!(id_a, id_b);
    }

    #[test]
    fn uniform_access_scans_shader_source_for_group_and_binding() {
        let (ast, result) = analyze_source(
            r#"#wgsl s { value="@group(1) @binding(2) var<uniform> time : f32;" }
               #define K = s.time"#,
        );
        let define = ast.nodes.get(ast.root_declarations()[1]);
        let access_node = {
            let mut found = None;
            for i in 0..ast.nodes.len() as u32 {
                if ast.nodes.get(i).tag == NodeTag::UniformAccessValue {
                    found = Some(i);
                }
            }
            found.unwrap()
        };
        assert_eq!(define.as_node(), access_node);
        let resolved = result.resolved_uniforms.get(&access_node).unwrap();
        assert_eq!(resolved.bind_group, 1);
        assert_eq!(resolved.binding, 2);
    }

    #[test]
    fn eval_expr_applies_precedence_and_unary_minus() {
        let ast = parse("#define K = -2 * (3 + 4)".to_string(), Limits::default()).unwrap();
        let define = ast.nodes.get(ast.root_declarations()[0]);
        let value = eval_expr(&ast, define.as_node(), &Limits::default());
        assert_eq!(value, Some(-14.0));
    }

    #[test]
    fn eval_expr_division_by_zero_yields_none() {
        let ast = parse("#define K = 1 / 0".to_string(), Limits::default()).unwrap();
        let define = ast.nodes.get(ast.root_declarations()[0]);
        assert_eq!(eval_expr(&ast, define.as_node(), &Limits::default()), None);
    }

    #[test]
    fn eval_expr_understands_named_constants_in_bare_values() {
        let ast = parse("#define K = TAU".to_string(), Limits::default()).unwrap();
        let define = ast.nodes.get(ast.root_declarations()[0]);
        assert_eq!(eval_expr(&ast, define.as_node(), &Limits::default()), Some(std::f64::consts::TAU));
    }

    #[test]
    fn eval_expr_parses_hex_literals() {
        let ast = parse("#define K = 0xFF".to_string(), Limits::default()).unwrap();
        let define = ast.nodes.get(ast.root_declarations()[0]);
        assert_eq!(eval_expr(&ast, define.as_node(), &Limits::default()), Some(255.0));
    }
}
