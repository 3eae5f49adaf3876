//! Token stream → AST.
//!
//! No recursive descent: container values (arrays, objects) are parsed with
//! an explicit stack of [`Container`] frames, and arithmetic expressions
//! with their own explicit operator/operand stacks in [`parse_expr`]. The
//! call stack never grows with source nesting depth; [`Limits::max_nesting_depth`]
//! bounds frame-stack depth directly.

use crate::ast::{Ast, Node, NodeData, NodeList, NodeTag, SubRange, ROOT};
use crate::error::ParseError;
use crate::lexer::Lexer;
use crate::limits::Limits;
use crate::source::Source;
use crate::token::{TokenList, TokenTag};

/// Parses a complete source string into an [`Ast`], or the first structural
/// error encountered. On error, no partial AST is returned.
pub fn parse(source_text: String, limits: Limits) -> Result<Ast, ParseError> {
    let source = Source::new(&source_text);
    let mut lexer = Lexer::with_limits(&source, limits);
    let estimated_tokens = (source.len() / 8).max(32);
    let mut tokens = TokenList::with_capacity(estimated_tokens);
    loop {
        let token = lexer.next();
        let is_eof = token.tag == TokenTag::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        limits,
        nodes: NodeList::new(),
        extra_data: Vec::with_capacity(estimated_tokens / 2),
        scratch: Vec::new(),
        iterations: 0,
    };

    // Node 0 is reserved for the root up front so every other node gets a
    // higher index; its real payload is patched in once we know the
    // top-level declaration range.
    parser.nodes.push(Node::new(NodeTag::Root, 0, NodeData::None));
    let declarations = parser.parse_file()?;
    if !parser.check(TokenTag::Eof) {
        return Err(ParseError::UnexpectedToken { token: parser.pos });
    }
    parser
        .nodes
        .set(ROOT, Node::new(NodeTag::Root, 0, NodeData::SubRange(declarations)));

    let Parser { nodes, extra_data, .. } = parser;
    Ok(Ast {
        source_text,
        tokens,
        nodes,
        extra_data,
    })
}

struct Parser<'t> {
    tokens: &'t TokenList,
    pos: u32,
    limits: Limits,
    nodes: NodeList,
    extra_data: Vec<u32>,
    /// Children being accumulated for whichever container is currently
    /// open. Each container records its start offset into this vector on
    /// entry and splices `scratch[start..]` into `extra_data` on exit.
    scratch: Vec<u32>,
    iterations: usize,
}

impl<'t> Parser<'t> {
    fn tag(&self) -> TokenTag {
        self.tokens.tag(self.pos)
    }

    fn check(&self, tag: TokenTag) -> bool {
        self.tag() == tag
    }

    fn bump(&mut self) -> u32 {
        let at = self.pos;
        if self.tokens.tag(self.pos) != TokenTag::Eof {
            self.pos += 1;
        }
        at
    }

    fn eat(&mut self, tag: TokenTag) -> bool {
        if self.check(tag) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tag: TokenTag, name: &'static str) -> Result<u32, ParseError> {
        if self.check(tag) {
            Ok(self.bump())
        } else {
            Err(ParseError::Expected {
                expected: name,
                token: self.pos,
            })
        }
    }

    /// Charges one step against `MAX_PARSE_ITERATIONS`. Called once per
    /// iteration of every otherwise-unbounded loop in this module.
    fn tick(&mut self) -> Result<(), ParseError> {
        self.iterations += 1;
        if self.iterations > self.limits.max_parse_iterations {
            return Err(ParseError::TooManyIterations);
        }
        Ok(())
    }

    fn push_node(&mut self, tag: NodeTag, main_token: u32, data: NodeData) -> u32 {
        self.nodes.push(Node::new(tag, main_token, data))
    }

    /// Moves everything in `scratch[start..]` into `extra_data` and returns
    /// the range it now occupies there.
    fn splice_scratch(&mut self, start: usize) -> SubRange {
        let extra_start = self.extra_data.len() as u32;
        self.extra_data.extend(self.scratch.drain(start..));
        SubRange {
            start: extra_start,
            end: self.extra_data.len() as u32,
        }
    }

    fn parse_file(&mut self) -> Result<SubRange, ParseError> {
        let start = self.scratch.len();
        let mut count = 0usize;
        while !self.check(TokenTag::Eof) {
            self.tick()?;
            count += 1;
            if count > self.limits.max_macros {
                return Err(ParseError::TooManyMacros);
            }
            let node = self.parse_macro()?;
            self.scratch.push(node);
        }
        Ok(self.splice_scratch(start))
    }

    fn parse_macro(&mut self) -> Result<u32, ParseError> {
        match self.tag() {
            TokenTag::KwDefine => self.parse_define(),
            TokenTag::KwImport => self.parse_import(),
            tag if tag.is_namespace_keyword() => self.parse_declaration(),
            _ => Err(ParseError::UnexpectedToken { token: self.pos }),
        }
    }

    fn parse_define(&mut self) -> Result<u32, ParseError> {
        self.bump(); // '#define'
        let name = self.expect(TokenTag::Identifier, "identifier")?;
        self.expect(TokenTag::Equals, "=")?;
        let value = self.parse_value()?;
        Ok(self.push_node(NodeTag::Define, name, NodeData::Node(value)))
    }

    fn parse_import(&mut self) -> Result<u32, ParseError> {
        self.bump(); // '#import'
        let path = self.expect(TokenTag::StringLiteral, "string")?;
        Ok(self.push_node(NodeTag::Import, path, NodeData::None))
    }

    fn parse_declaration(&mut self) -> Result<u32, ParseError> {
        self.bump(); // namespace keyword
        let name = self.expect(TokenTag::Identifier, "identifier")?;
        self.expect(TokenTag::LBrace, "{")?;
        let start = self.scratch.len();
        let mut count = 0usize;
        while !self.check(TokenTag::RBrace) {
            self.tick()?;
            count += 1;
            if count > self.limits.max_properties {
                return Err(ParseError::TooManyProperties);
            }
            let property = self.parse_property()?;
            self.scratch.push(property);
        }
        self.bump(); // '}'
        let range = self.splice_scratch(start);
        Ok(self.push_node(NodeTag::Declaration, name, NodeData::SubRange(range)))
    }

    fn parse_property(&mut self) -> Result<u32, ParseError> {
        let name = self.expect(TokenTag::Identifier, "identifier")?;
        self.expect(TokenTag::Equals, "=")?;
        let value = self.parse_value()?;
        Ok(self.push_node(NodeTag::Property, name, NodeData::Node(value)))
    }

    /// Parses a value (string, number, boolean, identifier, reference,
    /// array, object, or arithmetic expression). Arrays and objects push a
    /// [`Container`] frame instead of recursing; the loop runs until the
    /// outermost frame — which may be zero frames deep, for a plain scalar
    /// — has produced a node.
    fn parse_value(&mut self) -> Result<u32, ParseError> {
        let mut stack: Vec<Container> = Vec::new();
        let mut finished: Option<u32> = None;
        loop {
            self.tick()?;
            match stack.last() {
                None => {
                    if let Some(node) = finished {
                        return Ok(node);
                    }
                    self.step_start(&mut stack, &mut finished)?;
                }
                Some(Container::Array { .. }) => self.step_array(&mut stack, &mut finished)?,
                Some(Container::Object { pending_key, .. }) => {
                    if pending_key.is_none() {
                        self.step_object_key(&mut stack, &mut finished)?;
                    } else {
                        self.step_object_value(&mut stack, &mut finished)?;
                    }
                }
            }
        }
    }

    fn push_container(&mut self, stack: &mut Vec<Container>, started: StartedValue) -> Result<(), ParseError> {
        match started {
            StartedValue::Complete(_) => unreachable!("caller handles Complete directly"),
            StartedValue::Array(main_token) => {
                if stack.len() >= self.limits.max_nesting_depth {
                    return Err(ParseError::NestingTooDeep);
                }
                stack.push(Container::Array {
                    scratch_start: self.scratch.len(),
                    main_token,
                });
            }
            StartedValue::Object(main_token) => {
                if stack.len() >= self.limits.max_nesting_depth {
                    return Err(ParseError::NestingTooDeep);
                }
                stack.push(Container::Object {
                    scratch_start: self.scratch.len(),
                    main_token,
                    pending_key: None,
                });
            }
        }
        Ok(())
    }

    fn step_start(&mut self, stack: &mut Vec<Container>, finished: &mut Option<u32>) -> Result<(), ParseError> {
        match self.start_value()? {
            StartedValue::Complete(node) => {
                *finished = Some(node);
                Ok(())
            }
            started => self.push_container(stack, started),
        }
    }

    fn step_array(&mut self, stack: &mut Vec<Container>, finished: &mut Option<u32>) -> Result<(), ParseError> {
        let (scratch_start, main_token) = match stack.last() {
            Some(Container::Array { scratch_start, main_token }) => (*scratch_start, *main_token),
            _ => unreachable!(),
        };
        if self.eat(TokenTag::RBracket) {
            stack.pop();
            let range = self.splice_scratch(scratch_start);
            let node = self.push_node(NodeTag::ArrayValue, main_token, NodeData::SubRange(range));
            self.attach(stack, finished, node);
            return Ok(());
        }
        self.eat(TokenTag::Comma);
        if self.check(TokenTag::RBracket) {
            return Ok(());
        }
        match self.start_value()? {
            StartedValue::Complete(node) => self.scratch.push(node),
            started => self.push_container(stack, started)?,
        }
        Ok(())
    }

    fn step_object_key(&mut self, stack: &mut Vec<Container>, finished: &mut Option<u32>) -> Result<(), ParseError> {
        let (scratch_start, main_token) = match stack.last() {
            Some(Container::Object { scratch_start, main_token, .. }) => (*scratch_start, *main_token),
            _ => unreachable!(),
        };
        if self.eat(TokenTag::RBrace) {
            stack.pop();
            let range = self.splice_scratch(scratch_start);
            let node = self.push_node(NodeTag::ObjectValue, main_token, NodeData::SubRange(range));
            self.attach(stack, finished, node);
            return Ok(());
        }
        self.eat(TokenTag::Comma);
        if self.check(TokenTag::RBrace) {
            return Ok(());
        }
        let key = self.expect(TokenTag::Identifier, "identifier")?;
        self.expect(TokenTag::Equals, "=")?;
        if let Some(Container::Object { pending_key, .. }) = stack.last_mut() {
            *pending_key = Some(key);
        }
        Ok(())
    }

    fn step_object_value(&mut self, stack: &mut Vec<Container>, finished: &mut Option<u32>) -> Result<(), ParseError> {
        match self.start_value()? {
            StartedValue::Complete(node) => self.attach(stack, finished, node),
            started => self.push_container(stack, started)?,
        }
        Ok(())
    }

    /// Attaches a just-completed value node to whatever is now on top of
    /// `stack`: pushed into the parent array's scratch, wrapped as a
    /// `Property` into the parent object's scratch, or — if `stack` is
    /// empty — recorded as the overall result.
    fn attach(&mut self, stack: &mut Vec<Container>, finished: &mut Option<u32>, node: u32) {
        match stack.last_mut() {
            None => *finished = Some(node),
            Some(Container::Array { .. }) => self.scratch.push(node),
            Some(Container::Object { pending_key, .. }) => {
                let key = pending_key.take().expect("object frame awaiting a value");
                let property = self.push_node(NodeTag::Property, key, NodeData::Node(node));
                self.scratch.push(property);
            }
        }
    }

    fn start_value(&mut self) -> Result<StartedValue, ParseError> {
        match self.tag() {
            TokenTag::StringLiteral => {
                let t = self.bump();
                Ok(StartedValue::Complete(self.push_node(NodeTag::StringValue, t, NodeData::None)))
            }
            TokenTag::RuntimeInterpolationString => {
                let t = self.bump();
                Ok(StartedValue::Complete(self.push_node(
                    NodeTag::RuntimeInterpolationValue,
                    t,
                    NodeData::None,
                )))
            }
            TokenTag::BooleanLiteral => {
                let t = self.bump();
                Ok(StartedValue::Complete(self.push_node(NodeTag::BoolValue, t, NodeData::None)))
            }
            TokenTag::Identifier => {
                let t = self.bump();
                // A bare `module.var` (no leading '$') encodes a uniform
                // access rather than a plain identifier value — see
                // DESIGN.md for why this grammar extension exists.
                if self.check(TokenTag::Dot) {
                    self.bump();
                    let var = self.expect(TokenTag::Identifier, "identifier")?;
                    Ok(StartedValue::Complete(self.push_node(
                        NodeTag::UniformAccessValue,
                        t,
                        NodeData::TokenPair(var, 0),
                    )))
                } else {
                    Ok(StartedValue::Complete(self.push_node(NodeTag::IdentifierValue, t, NodeData::None)))
                }
            }
            TokenTag::Dollar => Ok(StartedValue::Complete(self.parse_reference()?)),
            TokenTag::LBracket => {
                let t = self.bump();
                Ok(StartedValue::Array(t))
            }
            TokenTag::LBrace => {
                let t = self.bump();
                Ok(StartedValue::Object(t))
            }
            TokenTag::NumberLiteral | TokenTag::Minus | TokenTag::LParen => {
                Ok(StartedValue::Complete(self.parse_expr()?))
            }
            _ => Err(ParseError::UnexpectedToken { token: self.pos }),
        }
    }

    /// `'$' identifier ('.' identifier)*`. Only the namespace and the first
    /// segment after the dot are kept; trailing segments are consumed for
    /// correct tokenization but otherwise discarded.
    fn parse_reference(&mut self) -> Result<u32, ParseError> {
        self.bump(); // '$'
        let namespace_token = self.expect(TokenTag::Identifier, "identifier")?;
        let mut name_token = u32::MAX;
        if self.eat(TokenTag::Dot) {
            name_token = self.expect(TokenTag::Identifier, "identifier")?;
            let mut extra_segments = 0usize;
            while self.eat(TokenTag::Dot) {
                self.expect(TokenTag::Identifier, "identifier")?;
                extra_segments += 1;
                if extra_segments > self.limits.max_nesting_depth {
                    return Err(ParseError::TooManyIterations);
                }
            }
        }
        Ok(self.push_node(NodeTag::ReferenceValue, namespace_token, NodeData::TokenPair(name_token, 0)))
    }

    /// Arithmetic expressions (`expr`/`term`/`factor`), parsed iteratively
    /// with an explicit operator-precedence stack per nesting level of
    /// parentheses (`frames`), rather than recursive descent. `frames.len()`
    /// is bounded by `MAX_NESTING_DEPTH`.
    fn parse_expr(&mut self) -> Result<u32, ParseError> {
        let mut frames: Vec<ExprFrame> = vec![ExprFrame::new()];
        let mut expect_operand = true;
        loop {
            self.tick()?;
            if expect_operand {
                match self.tag() {
                    TokenTag::Minus => {
                        let t = self.bump();
                        frames.last_mut().unwrap().pending_negs.push(t);
                    }
                    TokenTag::LParen => {
                        self.bump();
                        if frames.len() >= self.limits.max_nesting_depth {
                            return Err(ParseError::NestingTooDeep);
                        }
                        frames.push(ExprFrame::new());
                    }
                    TokenTag::NumberLiteral => {
                        let t = self.bump();
                        let node = self.push_node(NodeTag::NumberValue, t, NodeData::None);
                        let frame = frames.last_mut().unwrap();
                        let node = self.apply_pending_negs(frame, node);
                        frame.operands.push(node);
                        expect_operand = false;
                    }
                    _ => return Err(ParseError::UnexpectedToken { token: self.pos }),
                }
            } else {
                match self.tag() {
                    TokenTag::Plus | TokenTag::Minus | TokenTag::Star | TokenTag::Slash => {
                        let bin_tag = self.tag();
                        let t = self.bump();
                        let op = BinOp::from_tag(bin_tag).unwrap();
                        let frame = frames.last_mut().unwrap();
                        self.push_operator(frame, op, t)?;
                        expect_operand = true;
                    }
                    TokenTag::RParen => {
                        self.bump();
                        let mut frame = frames.pop().ok_or(ParseError::UnexpectedToken { token: self.pos })?;
                        self.drain_operators(&mut frame)?;
                        if frame.operands.len() != 1 {
                            return Err(ParseError::UnexpectedToken { token: self.pos });
                        }
                        let node = frame.operands.pop().unwrap();
                        if frames.is_empty() {
                            return Err(ParseError::UnexpectedToken { token: self.pos });
                        }
                        let outer = frames.last_mut().unwrap();
                        let node = self.apply_pending_negs(outer, node);
                        outer.operands.push(node);
                        expect_operand = false;
                    }
                    _ => break,
                }
            }
        }

        if frames.len() != 1 {
            return Err(ParseError::UnexpectedToken { token: self.pos });
        }
        let mut frame = frames.pop().unwrap();
        self.drain_operators(&mut frame)?;
        if frame.operands.len() != 1 {
            return Err(ParseError::UnexpectedToken { token: self.pos });
        }
        Ok(frame.operands.pop().unwrap())
    }

    fn apply_binop(&mut self, frame: &mut ExprFrame, op: BinOp, token: u32) -> Result<(), ParseError> {
        let rhs = frame.operands.pop().ok_or(ParseError::UnexpectedToken { token })?;
        let lhs = frame.operands.pop().ok_or(ParseError::UnexpectedToken { token })?;
        let node = self.push_node(op.node_tag(), token, NodeData::NodePair(lhs, rhs));
        frame.operands.push(node);
        Ok(())
    }

    /// Pops and applies lower-or-equal precedence operators before pushing
    /// `op`, giving standard left-associative precedence climbing.
    fn push_operator(&mut self, frame: &mut ExprFrame, op: BinOp, token: u32) -> Result<(), ParseError> {
        while let Some(&(top_op, top_token)) = frame.operators.last() {
            if top_op.precedence() >= op.precedence() {
                frame.operators.pop();
                self.apply_binop(frame, top_op, top_token)?;
            } else {
                break;
            }
        }
        frame.operators.push((op, token));
        Ok(())
    }

    fn drain_operators(&mut self, frame: &mut ExprFrame) -> Result<(), ParseError> {
        while let Some((op, token)) = frame.operators.pop() {
            self.apply_binop(frame, op, token)?;
        }
        Ok(())
    }

    /// Wraps `node` in `Negate` once per pending unary minus, innermost
    /// (closest to the atom) first.
    fn apply_pending_negs(&mut self, frame: &mut ExprFrame, mut node: u32) -> u32 {
        while let Some(token) = frame.pending_negs.pop() {
            node = self.push_node(NodeTag::Negate, token, NodeData::Node(node));
        }
        node
    }
}

/// A container frame on the explicit value-parsing stack.
enum Container {
    Array {
        scratch_start: usize,
        main_token: u32,
    },
    Object {
        scratch_start: usize,
        main_token: u32,
        pending_key: Option<u32>,
    },
}

enum StartedValue {
    Complete(u32),
    Array(u32),
    Object(u32),
}

#[derive(Copy, Clone)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    fn from_tag(tag: TokenTag) -> Option<BinOp> {
        match tag {
            TokenTag::Plus => Some(BinOp::Add),
            TokenTag::Minus => Some(BinOp::Sub),
            TokenTag::Star => Some(BinOp::Mul),
            TokenTag::Slash => Some(BinOp::Div),
            _ => None,
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOp::Add | BinOp::Sub => 1,
            BinOp::Mul | BinOp::Div => 2,
        }
    }

    fn node_tag(self) -> NodeTag {
        match self {
            BinOp::Add => NodeTag::Add,
            BinOp::Sub => NodeTag::Subtract,
            BinOp::Mul => NodeTag::Multiply,
            BinOp::Div => NodeTag::Divide,
        }
    }
}

struct ExprFrame {
    operators: Vec<(BinOp, u32)>,
    operands: Vec<u32>,
    pending_negs: Vec<u32>,
}

impl ExprFrame {
    fn new() -> ExprFrame {
        ExprFrame {
            operators: Vec::new(),
            operands: Vec::new(),
            pending_negs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeTag;

    fn parse_ok(src: &str) -> Ast {
        parse(src.to_string(), Limits::default()).expect("parse should succeed")
    }

    #[test]
    fn empty_source_parses_to_root_only() {
        let ast = parse_ok("");
        assert_eq!(ast.nodes.get(ROOT).tag, NodeTag::Root);
        assert!(ast.root_declarations().is_empty());
    }

    #[test]
    fn minimal_frame_declaration() {
        let ast = parse_ok(r#"#frame main { perform=[] }"#);
        let decls = ast.root_declarations();
        assert_eq!(decls.len(), 1);
        let decl = ast.nodes.get(decls[0]);
        assert_eq!(decl.tag, NodeTag::Declaration);
        assert_eq!(ast.node_source(decls[0]), "main");
        assert_eq!(ast.tokens.tag(ast.keyword_token(decls[0])), TokenTag::KwFrame);
    }

    #[test]
    fn nested_array_and_object_values() {
        let ast = parse_ok(r#"#buffer b { usage=[VERTEX COPY_DST] extra={ a=1 b=2 } }"#);
        let decl = ast.nodes.get(ast.root_declarations()[0]);
        let props = crate::ast::extra_slice(&ast.extra_data, decl.as_sub_range());
        assert_eq!(props.len(), 2);
        let usage_value = ast.nodes.get(ast.nodes.get(props[0]).as_node());
        assert_eq!(usage_value.tag, NodeTag::ArrayValue);
        let extra_value = ast.nodes.get(ast.nodes.get(props[1]).as_node());
        assert_eq!(extra_value.tag, NodeTag::ObjectValue);
        let nested_props = crate::ast::extra_slice(&ast.extra_data, extra_value.as_sub_range());
        assert_eq!(nested_props.len(), 2);
    }

    #[test]
    fn arithmetic_precedence_and_unary_minus() {
        let ast = parse_ok("#define K = 1 + 2 * 3");
        let define = ast.nodes.get(ast.root_declarations()[0]);
        assert_eq!(define.tag, NodeTag::Define);
        let top = ast.nodes.get(define.as_node());
        assert_eq!(top.tag, NodeTag::Add); // + binds loosest: Add(1, Multiply(2,3))
        let (_, rhs) = top.as_node_pair();
        assert_eq!(ast.nodes.get(rhs).tag, NodeTag::Multiply);
    }

    #[test]
    fn double_unary_minus() {
        let ast = parse_ok("#define K = --5");
        let define = ast.nodes.get(ast.root_declarations()[0]);
        let outer = ast.nodes.get(define.as_node());
        assert_eq!(outer.tag, NodeTag::Negate);
        let inner = ast.nodes.get(outer.as_node());
        assert_eq!(inner.tag, NodeTag::Negate);
    }

    #[test]
    fn parenthesized_expression() {
        let ast = parse_ok("#define K = (1 + 2) * 3");
        let define = ast.nodes.get(ast.root_declarations()[0]);
        let top = ast.nodes.get(define.as_node());
        assert_eq!(top.tag, NodeTag::Multiply);
        let (lhs, _) = top.as_node_pair();
        assert_eq!(ast.nodes.get(lhs).tag, NodeTag::Add);
    }

    #[test]
    fn runtime_interpolation_value_is_tagged() {
        let ast = parse_ok(r#"#wgsl s { value="$hello" }"#);
        let decl = ast.nodes.get(ast.root_declarations()[0]);
        let props = crate::ast::extra_slice(&ast.extra_data, decl.as_sub_range());
        let value = ast.nodes.get(ast.nodes.get(props[0]).as_node());
        assert_eq!(value.tag, NodeTag::RuntimeInterpolationValue);
    }

    #[test]
    fn explicit_reference_keeps_namespace_and_first_segment() {
        let ast = parse_ok("#define K = $wgsl.shader.inputs");
        let define = ast.nodes.get(ast.root_declarations()[0]);
        let reference = ast.nodes.get(define.as_node());
        assert_eq!(reference.tag, NodeTag::ReferenceValue);
        assert_eq!(ast.tokens.loc(reference.main_token).slice(&ast.source_text), "wgsl");
        let (name_token, _) = reference.as_token_pair();
        assert_eq!(ast.tokens.loc(name_token).slice(&ast.source_text), "shader");
    }

    #[test]
    fn bare_dotted_identifier_is_uniform_access() {
        let ast = parse_ok("#define K = shader.time");
        let define = ast.nodes.get(ast.root_declarations()[0]);
        let value = ast.nodes.get(define.as_node());
        assert_eq!(value.tag, NodeTag::UniformAccessValue);
        assert_eq!(ast.tokens.loc(value.main_token).slice(&ast.source_text), "shader");
        let (var_token, _) = value.as_token_pair();
        assert_eq!(ast.tokens.loc(var_token).slice(&ast.source_text), "time");
    }

    #[test]
    fn malformed_declaration_is_a_parse_error() {
        let result = parse("#buffer { size=1 }".to_string(), Limits::default());
        assert!(result.is_err());
    }

    #[test]
    fn trailing_garbage_after_root_is_rejected() {
        let result = parse("#frame main { perform=[] } )".to_string(), Limits::default());
        assert!(result.is_err());
    }
}
