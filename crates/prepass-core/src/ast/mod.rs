// Syntax tree for the contract language subset the prepass rewrites.
// Every node records the byte span it was parsed from; spans are only
// meaningful for the exact source version that was parsed.

pub mod visit;
pub use visit::{walk, FnVisitor, Node, Scope, Visitor};

use std::fmt;
use std::ops::Range;

use serde::Serialize;

/// Half-open byte range into one source version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Zero-width span used for insertions
    pub fn point(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn encloses(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn slice<'s>(&self, text: &'s str) -> &'s str {
        &text[self.start..self.end]
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

/// One parsed file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    pub items: Vec<SourceItem>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceItem {
    Pragma(Span),
    Import(ImportDirective),
    Contract(ContractDefinition),
    /// File-level struct, enum, free function and similar items kept as text
    Other(OpaqueItem),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueItem {
    /// Leading keyword (`struct`, `function`, `uint256`, ...)
    pub keyword: String,
    /// Declared name for struct, enum, event, error, type and function items
    pub name: Option<String>,
    pub span: Span,
}

impl SourceUnit {
    pub fn contracts(&self) -> impl Iterator<Item = &ContractDefinition> {
        self.items.iter().filter_map(|item| match item {
            SourceItem::Contract(contract) => Some(contract),
            _ => None,
        })
    }

    pub fn imports(&self) -> impl Iterator<Item = &ImportDirective> {
        self.items.iter().filter_map(|item| match item {
            SourceItem::Import(import) => Some(import),
            _ => None,
        })
    }

    pub fn contract(&self, name: &str) -> Option<&ContractDefinition> {
        self.contracts().find(|c| c.name == name)
    }

    /// Names declared by file-level items other than contracts
    pub fn free_names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            SourceItem::Other(OpaqueItem { name: Some(name), .. }) => Some(name.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDirective {
    /// Path exactly as written between the quotes
    pub path: String,
    pub path_span: Span,
    /// `import "p" as X;` or `import * as X from "p";`
    pub unit_alias: Option<String>,
    /// `import {A, B as C} from "p";`
    pub symbols: Vec<(String, Option<String>)>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    Contract,
    Interface,
    Library,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractDefinition {
    pub name: String,
    pub name_span: Span,
    pub kind: ContractKind,
    pub is_abstract: bool,
    pub bases: Vec<InheritanceSpecifier>,
    pub variables: Vec<VariableDeclaration>,
    pub functions: Vec<FunctionDefinition>,
    /// Struct, enum, event and error names declared in the contract body
    pub type_names: Vec<String>,
    /// From the opening brace to the closing brace, inclusive
    pub body_span: Span,
    pub span: Span,
}

impl ContractDefinition {
    pub fn constructor(&self) -> Option<&FunctionDefinition> {
        self.functions
            .iter()
            .find(|f| f.kind == FunctionKind::Constructor)
    }

    pub fn functions_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a FunctionDefinition> + 'a {
        self.functions
            .iter()
            .filter(move |f| f.kind == FunctionKind::Function && f.name == name)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDeclaration> {
        self.variables
            .iter()
            .find(|v| v.name.as_deref() == Some(name))
    }

    /// Concrete contracts are the only ones that get deployed
    pub fn is_concrete(&self) -> bool {
        self.kind == ContractKind::Contract && !self.is_abstract
    }
}

/// `Name(args)` used either in a modifier position or in an `is` list
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierInvocation {
    pub name: String,
    pub name_span: Span,
    pub arguments: Option<Vec<Expression>>,
    /// Parentheses included
    pub args_span: Option<Span>,
    /// Calls made while evaluating the arguments
    pub calls: Vec<FunctionCall>,
    pub span: Span,
}

pub type InheritanceSpecifier = ModifierInvocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    Constructor,
    Function,
    Fallback,
    Receive,
    Modifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    External,
    Internal,
    Private,
    /// No visibility keyword; legacy sources treat this as public
    Unspecified,
}

impl Visibility {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "public" => Some(Self::Public),
            "external" => Some(Self::External),
            "internal" => Some(Self::Internal),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// Keyword attribute in a function header (visibility, mutability, virtual, override)
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub text: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub kind: FunctionKind,
    /// `constructor`, `fallback` and `receive` for the unnamed kinds
    pub name: String,
    pub name_span: Option<Span>,
    pub parameters: Vec<VariableDeclaration>,
    /// Parentheses included
    pub params_span: Span,
    pub returns: Vec<VariableDeclaration>,
    pub visibility: Visibility,
    pub mutability: Option<String>,
    pub attributes: Vec<Attribute>,
    pub modifiers: Vec<ModifierInvocation>,
    pub body: Option<Block>,
    pub span: Span,
}

impl FunctionDefinition {
    pub fn parameter_types(&self) -> Vec<String> {
        self.parameters
            .iter()
            .map(|p| p.type_name.text.clone())
            .collect()
    }

    /// `name(type1,type2)` with normalized parameter types
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.parameter_types().join(","))
    }

    /// Finds a parameter, return value or local by name
    pub fn declaration(&self, name: &str) -> Option<&VariableDeclaration> {
        let locals = self.body.iter().flat_map(|b| b.locals.iter());
        self.parameters
            .iter()
            .chain(self.returns.iter())
            .chain(locals)
            .find(|v| v.name.as_deref() == Some(name))
    }
}

/// Function body plus the nodes found inside it
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    /// Braces included
    pub span: Span,
    pub locals: Vec<VariableDeclaration>,
    pub calls: Vec<FunctionCall>,
    pub identifiers: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub name: Option<String>,
    pub name_span: Option<Span>,
    pub type_name: TypeName,
    /// `memory`, `storage` or `calldata`
    pub location: Option<String>,
    pub visibility: Option<Visibility>,
    pub is_constant: bool,
    pub is_immutable: bool,
    /// Calls in a state variable initializer; locals keep theirs in the body
    pub calls: Vec<FunctionCall>,
    pub span: Span,
}

/// Type with its normalized spelling (`uint` is stored as `uint256`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    pub text: String,
    pub span: Span,
}

impl TypeName {
    /// Innermost type once every array suffix is removed
    pub fn base(&self) -> &str {
        base_type(&self.text)
    }

    pub fn is_array(&self) -> bool {
        self.text.ends_with(']')
    }

    pub fn is_mapping(&self) -> bool {
        self.text.starts_with("mapping(")
    }
}

/// Strips trailing `[..]` groups from a normalized type
pub fn base_type(text: &str) -> &str {
    let mut base = text;
    while base.ends_with(']') {
        match base.rfind('[') {
            Some(open) => base = &base[..open],
            None => break,
        }
    }
    base
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

/// What sits left of the dot in a member call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Receiver {
    /// `f(...)`
    None,
    /// `this.f(...)`
    This,
    /// `super.f(...)`
    Super,
    /// `x.f(...)`
    Named(String),
    /// `X(expr).f(...)`
    Cast(String),
    /// Anything more complex (`a[i].f()`, `g().h()`)
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub callee: String,
    pub callee_span: Span,
    pub receiver: Receiver,
    pub arguments: Vec<Expression>,
    /// From the callee name to the closing parenthesis
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionKind {
    Number,
    Str,
    Bool,
    Identifier(String),
    Other,
}

/// Expression kept as a source region with a coarse classification
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub span: Span,
    /// Non-member identifiers inside the expression, in source order
    pub identifiers: Vec<Identifier>,
}

impl Expression {
    /// Renders the expression, replacing identifiers found in `substitute`
    pub fn render(&self, text: &str, substitute: &dyn Fn(&str) -> Option<String>) -> String {
        let mut out = String::new();
        let mut cursor = self.span.start;
        for ident in &self.identifiers {
            if let Some(replacement) = substitute(&ident.name) {
                out.push_str(&text[cursor..ident.span.start]);
                out.push_str(&replacement);
                cursor = ident.span.end;
            }
        }
        out.push_str(&text[cursor..self.span.end]);
        out
    }

    /// Literals and single identifiers can be substituted without parentheses
    pub fn is_atomic(&self) -> bool {
        !matches!(self.kind, ExpressionKind::Other)
    }
}
