//! Byte-stream tokenizer.
//!
//! A labeled state machine: `start`, `after_hash`, `identifier`, `number`,
//! `string`, `line_comment`. `next()` returns one token and advances the
//! cursor; once EOF is produced, every further call keeps returning EOF.
//! The lexer never fails: malformed bytes become [`TokenTag::Invalid`]
//! tokens for the parser to reject.

use crate::limits::Limits;
use crate::source::Source;
use crate::token::{Loc, Token, TokenTag};

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn is_hex_digit(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

/// Maps a `#name` macro keyword to its token tag. A miss is not an error
/// here: the caller emits `Invalid` and the parser rejects it.
fn lookup_macro_keyword(name: &str) -> Option<TokenTag> {
    use TokenTag::*;
    Some(match name {
        "wgsl" => KwWgsl,
        "buffer" => KwBuffer,
        "texture" => KwTexture,
        "sampler" => KwSampler,
        "bindGroup" => KwBindGroup,
        "bindGroupLayout" => KwBindGroupLayout,
        "pipelineLayout" => KwPipelineLayout,
        "renderPipeline" | "pipeline" => KwRenderPipeline,
        "computePipeline" => KwComputePipeline,
        "renderPass" | "pass" => KwRenderPass,
        "computePass" => KwComputePass,
        "frame" => KwFrame,
        "shaderModule" => KwShaderModule,
        "data" => KwData,
        "define" => KwDefine,
        "queue" => KwQueue,
        "imageBitmap" | "imageBitmaps" => KwImageBitmap,
        "wasmCall" => KwWasmCall,
        "querySet" => KwQuerySet,
        "textureView" => KwTextureView,
        "animation" => KwAnimation,
        "import" => KwImport,
        _ => return None,
    })
}

pub struct Lexer<'s> {
    source: &'s Source,
    index: usize,
    limits: Limits,
    done: bool,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s Source) -> Lexer<'s> {
        Lexer::with_limits(source, Limits::default())
    }

    pub fn with_limits(source: &'s Source, limits: Limits) -> Lexer<'s> {
        Lexer {
            source,
            index: 0,
            limits,
            done: false,
        }
    }

    fn peek(&self) -> u8 {
        self.source.byte_at(self.index)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        let i = self.index + offset;
        if i <= self.source.len() {
            self.source.byte_at(i)
        } else {
            0
        }
    }

    fn bump(&mut self) {
        self.index += 1;
    }

    fn at_eof(&self) -> bool {
        self.index >= self.source.len()
    }

    fn tok(&self, tag: TokenTag, start: usize) -> Token {
        Token {
            tag,
            loc: Loc::new(start as u32, self.index as u32),
        }
    }

    /// Produces the next token. After EOF, keeps returning an EOF token
    /// anchored at `source.len()`.
    pub fn next(&mut self) -> Token {
        if self.done {
            return Token {
                tag: TokenTag::Eof,
                loc: Loc::new(self.source.len() as u32, self.source.len() as u32),
            };
        }

        // skip whitespace
        loop {
            match self.peek() {
                b' ' | b'\t' | b'\r' | b'\n' => self.bump(),
                _ => break,
            }
        }

        let start = self.index;

        if self.at_eof() {
            self.done = true;
            return Token {
                tag: TokenTag::Eof,
                loc: Loc::new(self.source.len() as u32, self.source.len() as u32),
            };
        }

        let c = self.peek();
        match c {
            b'#' => self.lex_hash(start),
            b'"' => self.lex_string(start),
            b'/' if self.peek_at(1) == b'/' => self.lex_line_comment(start),
            b'0'..=b'9' => self.lex_number(start),
            b if is_ident_start(b) => self.lex_identifier(start),
            b'{' => self.single(TokenTag::LBrace, start),
            b'}' => self.single(TokenTag::RBrace, start),
            b'[' => self.single(TokenTag::LBracket, start),
            b']' => self.single(TokenTag::RBracket, start),
            b'(' => self.single(TokenTag::LParen, start),
            b')' => self.single(TokenTag::RParen, start),
            b'=' => self.single(TokenTag::Equals, start),
            b',' => self.single(TokenTag::Comma, start),
            b'.' => self.single(TokenTag::Dot, start),
            b'$' => self.single(TokenTag::Dollar, start),
            b'+' => self.single(TokenTag::Plus, start),
            b'-' => self.single(TokenTag::Minus, start),
            b'*' => self.single(TokenTag::Star, start),
            b'/' => self.single(TokenTag::Slash, start),
            _ => self.single(TokenTag::Invalid, start),
        }
    }

    fn single(&mut self, tag: TokenTag, start: usize) -> Token {
        self.bump();
        self.tok(tag, start)
    }

    /// `after_hash` state: `#` plus an identifier, looked up in the macro
    /// keyword table. A miss yields `Invalid`.
    fn lex_hash(&mut self, start: usize) -> Token {
        self.bump(); // consume '#'
        if !is_ident_start(self.peek()) {
            return self.tok(TokenTag::Invalid, start);
        }
        let name_start = self.index;
        let mut steps = 0usize;
        while is_ident_continue(self.peek()) {
            self.bump();
            steps += 1;
            if steps > self.limits.max_token_len {
                panic!("lexer: identifier exceeds MAX_TOKEN_LEN");
            }
        }
        let name = &self.source.as_str()[name_start..self.index];
        match lookup_macro_keyword(name) {
            Some(tag) => self.tok(tag, start),
            None => self.tok(TokenTag::Invalid, start),
        }
    }

    /// `identifier` state. Reclassifies the literal words `true`/`false` as
    /// boolean literals after scanning.
    fn lex_identifier(&mut self, start: usize) -> Token {
        let mut steps = 0usize;
        while is_ident_continue(self.peek()) {
            self.bump();
            steps += 1;
            if steps > self.limits.max_token_len {
                panic!("lexer: identifier exceeds MAX_TOKEN_LEN");
            }
        }
        let text = &self.source.as_str()[start..self.index];
        if text == "true" || text == "false" {
            self.tok(TokenTag::BooleanLiteral, start)
        } else {
            self.tok(TokenTag::Identifier, start)
        }
    }

    /// `number` state: `0x`/`0X` hex, or decimal with optional `.` fraction.
    /// A leading `-` is always lexed as a separate `Minus` token.
    fn lex_number(&mut self, start: usize) -> Token {
        if self.peek() == b'0' && (self.peek_at(1) == b'x' || self.peek_at(1) == b'X') {
            self.bump();
            self.bump();
            let mut digits = 0usize;
            while is_hex_digit(self.peek()) {
                self.bump();
                digits += 1;
                if digits > self.limits.max_token_len {
                    panic!("lexer: number exceeds MAX_TOKEN_LEN");
                }
            }
            return self.tok(TokenTag::NumberLiteral, start);
        }

        let mut steps = 0usize;
        while self.peek().is_ascii_digit() {
            self.bump();
            steps += 1;
            if steps > self.limits.max_token_len {
                panic!("lexer: number exceeds MAX_TOKEN_LEN");
            }
        }
        if self.peek() == b'.' && self.peek_at(1).is_ascii_digit() {
            self.bump();
            while self.peek().is_ascii_digit() {
                self.bump();
                steps += 1;
                if steps > self.limits.max_token_len {
                    panic!("lexer: number exceeds MAX_TOKEN_LEN");
                }
            }
        }
        self.tok(TokenTag::NumberLiteral, start)
    }

    /// `string` state: double-quoted, `\`-escapes the next byte.
    /// Unterminated strings before EOF are `Invalid`. Any content containing
    /// `$` is a runtime-interpolation string instead of a plain one.
    fn lex_string(&mut self, start: usize) -> Token {
        self.bump(); // opening quote
        let content_start = self.index;
        let mut steps = 0usize;
        loop {
            if self.at_eof() {
                return self.tok(TokenTag::Invalid, start);
            }
            match self.peek() {
                b'"' => break,
                b'\\' => {
                    self.bump();
                    if self.at_eof() {
                        return self.tok(TokenTag::Invalid, start);
                    }
                    self.bump();
                }
                _ => self.bump(),
            }
            steps += 1;
            if steps > self.limits.max_token_len {
                panic!("lexer: string exceeds MAX_TOKEN_LEN");
            }
        }
        let content_end = self.index;
        self.bump(); // closing quote
        let content = &self.source.as_str()[content_start..content_end];
        if content.contains('$') {
            self.tok(TokenTag::RuntimeInterpolationString, start)
        } else {
            self.tok(TokenTag::StringLiteral, start)
        }
    }

    /// `line_comment` state: `//` to newline/EOF; `///` is a doc comment.
    fn lex_line_comment(&mut self, start: usize) -> Token {
        self.bump();
        self.bump();
        let is_doc = self.peek() == b'/';
        let mut steps = 0usize;
        while !self.at_eof() && self.peek() != b'\n' {
            self.bump();
            steps += 1;
            if steps > self.limits.max_token_len {
                panic!("lexer: comment exceeds MAX_TOKEN_LEN");
            }
        }
        let tag = if is_doc {
            TokenTag::DocComment
        } else {
            TokenTag::LineComment
        };
        self.tok(tag, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(src: &str) -> Vec<TokenTag> {
        let source = Source::new(src);
        let mut lexer = Lexer::new(&source);
        let mut tags = vec![];
        loop {
            let t = lexer.next();
            tags.push(t.tag);
            if t.tag == TokenTag::Eof {
                break;
            }
        }
        tags
    }

    #[test]
    fn empty_source_yields_single_eof() {
        assert_eq!(lex_all(""), vec![TokenTag::Eof]);
    }

    #[test]
    fn eof_is_terminal() {
        let source = Source::new("x");
        let mut lexer = Lexer::new(&source);
        let _ = lexer.next(); // identifier
        let a = lexer.next();
        let b = lexer.next();
        assert_eq!(a.tag, TokenTag::Eof);
        assert_eq!(b.tag, TokenTag::Eof);
        assert_eq!(a.loc, b.loc);
    }

    #[test]
    fn hyphenated_identifier_is_one_token() {
        assert_eq!(
            lex_all("triangle-list"),
            vec![TokenTag::Identifier, TokenTag::Eof]
        );
    }

    #[test]
    fn macro_keyword_lookup() {
        assert_eq!(
            lex_all("#buffer"),
            vec![TokenTag::KwBuffer, TokenTag::Eof]
        );
        assert_eq!(
            lex_all("#bogus"),
            vec![TokenTag::Invalid, TokenTag::Eof]
        );
    }

    #[test]
    fn pipeline_and_pass_aliases_share_tag() {
        assert_eq!(lex_all("#pipeline"), vec![TokenTag::KwRenderPipeline, TokenTag::Eof]);
        assert_eq!(
            lex_all("#renderPipeline"),
            vec![TokenTag::KwRenderPipeline, TokenTag::Eof]
        );
        assert_eq!(lex_all("#pass"), vec![TokenTag::KwRenderPass, TokenTag::Eof]);
    }

    #[test]
    fn hex_and_decimal_numbers() {
        assert_eq!(
            lex_all("0xFF 0X123ABC 42 3.14"),
            vec![
                TokenTag::NumberLiteral,
                TokenTag::NumberLiteral,
                TokenTag::NumberLiteral,
                TokenTag::NumberLiteral,
                TokenTag::Eof
            ]
        );
    }

    #[test]
    fn leading_minus_is_separate_token() {
        assert_eq!(
            lex_all("-0xFF"),
            vec![TokenTag::Minus, TokenTag::NumberLiteral, TokenTag::Eof]
        );
    }

    #[test]
    fn unterminated_string_is_invalid() {
        assert_eq!(lex_all("\"abc"), vec![TokenTag::Invalid, TokenTag::Eof]);
    }

    #[test]
    fn string_with_dollar_is_runtime_interpolation() {
        assert_eq!(
            lex_all("\"$foo\""),
            vec![TokenTag::RuntimeInterpolationString, TokenTag::Eof]
        );
        assert_eq!(
            lex_all("\"plain\""),
            vec![TokenTag::StringLiteral, TokenTag::Eof]
        );
    }

    #[test]
    fn line_and_doc_comments() {
        assert_eq!(
            lex_all("// hi\n/// doc"),
            vec![TokenTag::LineComment, TokenTag::DocComment, TokenTag::Eof]
        );
    }

    #[test]
    fn boolean_literals() {
        assert_eq!(
            lex_all("true false"),
            vec![TokenTag::BooleanLiteral, TokenTag::BooleanLiteral, TokenTag::Eof]
        );
    }
}
