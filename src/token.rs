//! Token tags and source locations.
//!
//! Tokens carry no string data of their own: callers re-slice `loc` out of
//! the original source. This keeps a [`Token`] at two `u32`s plus a tag byte.

/// Byte offsets into the source buffer. `end >= start` always holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Default)]
pub struct Loc {
    pub start: u32,
    pub end: u32,
}

impl Loc {
    pub fn new(start: u32, end: u32) -> Loc {
        debug_assert!(end >= start);
        Loc { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn slice<'s>(&self, source: &'s str) -> &'s str {
        &source[self.start as usize..self.end as usize]
    }
}

/// One-byte token discriminator.
///
/// Families: end-of-file / invalid; literals; one keyword per declarable
/// namespace plus `define`/`import`; punctuation; arithmetic operators;
/// comments.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(u8)]
pub enum TokenTag {
    Eof = 0,
    Invalid,

    Identifier,
    StringLiteral,
    RuntimeInterpolationString,
    NumberLiteral,
    BooleanLiteral,

    // --- macro keywords, one per namespace, plus `define`/`import` ---
    KwWgsl,
    KwBuffer,
    KwTexture,
    KwSampler,
    KwBindGroup,
    KwBindGroupLayout,
    KwPipelineLayout,
    KwRenderPipeline,
    KwComputePipeline,
    KwRenderPass,
    KwComputePass,
    KwFrame,
    KwShaderModule,
    KwData,
    KwDefine,
    KwQueue,
    KwImageBitmap,
    KwWasmCall,
    KwQuerySet,
    KwTextureView,
    KwAnimation,
    KwImport,

    // --- punctuation ---
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Equals,
    Comma,
    Dot,
    Dollar,

    // --- arithmetic operators ---
    Plus,
    Minus,
    Star,
    Slash,

    // --- comments ---
    LineComment,
    DocComment,
}

impl TokenTag {
    /// `true` for the keyword tags that introduce a macro declaration body
    /// (i.e. every namespace keyword, excluding `define`/`import` which have
    /// their own grammar productions).
    pub fn is_namespace_keyword(self) -> bool {
        use TokenTag::*;
        matches!(
            self,
            KwWgsl
                | KwBuffer
                | KwTexture
                | KwSampler
                | KwBindGroup
                | KwBindGroupLayout
                | KwPipelineLayout
                | KwRenderPipeline
                | KwComputePipeline
                | KwRenderPass
                | KwComputePass
                | KwFrame
                | KwShaderModule
                | KwData
                | KwQueue
                | KwImageBitmap
                | KwWasmCall
                | KwQuerySet
                | KwTextureView
                | KwAnimation
        )
    }
}

/// A single lexed token: a tag plus the source range it covers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Token {
    pub tag: TokenTag,
    pub loc: Loc,
}

/// Column-oriented storage for a run of tokens, so a walk that only touches
/// `tag` (e.g. a quick lookahead) doesn't have to load `loc` into cache.
#[derive(Debug, Default)]
pub struct TokenList {
    tags: Vec<TokenTag>,
    starts: Vec<u32>,
    ends: Vec<u32>,
}

impl TokenList {
    pub fn new() -> TokenList {
        TokenList::default()
    }

    pub fn with_capacity(cap: usize) -> TokenList {
        TokenList {
            tags: Vec::with_capacity(cap),
            starts: Vec::with_capacity(cap),
            ends: Vec::with_capacity(cap),
        }
    }

    pub fn push(&mut self, token: Token) -> u32 {
        let index = self.tags.len() as u32;
        self.tags.push(token.tag);
        self.starts.push(token.loc.start);
        self.ends.push(token.loc.end);
        index
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn tag(&self, index: u32) -> TokenTag {
        self.tags[index as usize]
    }

    pub fn loc(&self, index: u32) -> Loc {
        Loc::new(self.starts[index as usize], self.ends[index as usize])
    }

    pub fn get(&self, index: u32) -> Token {
        Token {
            tag: self.tag(index),
            loc: self.loc(index),
        }
    }
}
