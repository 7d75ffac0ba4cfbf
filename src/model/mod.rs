//! Language-neutral model of one source unit: a token stream plus a coarse
//! structural tree. Detectors only ever see this model, never the raw text
//! or the grammar-specific syntax tree.

pub mod builder;
pub mod expr;
pub mod node_types;
pub mod tokens;

pub use builder::ModelBuilder;
pub use node_types::{NodeCategory, NodeTypes};

use serde::Serialize;

use crate::source::{Language, SourceUnit, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Identifier,
    StringLiteral,
    NumericLiteral,
    Operator,
    Keyword,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, TokenKind::StringLiteral | TokenKind::NumericLiteral)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    List,
    Array,
    Set,
    Map,
    Tuple,
}

impl CollectionKind {
    /// Containers whose membership test is a linear scan.
    pub fn is_linear(&self) -> bool {
        matches!(self, Self::List | Self::Array | Self::Tuple)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprShape {
    StringLiteral { value: String },
    NumberLiteral,
    Constant,
    Identifier,
    Member,
    Index,
    Concatenation { literals: Vec<String>, dynamic: usize },
    Interpolation { literals: Vec<String>, dynamic: usize },
    Call { callee: String, receiver: Option<String> },
    Construct { type_name: String },
    Collection { kind: CollectionKind, elements: usize },
    Other,
}

/// A summarised expression: enough shape for pattern rules, no evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub shape: ExprShape,
    pub text: String,
    pub span: Span,
    pub identifiers: Vec<String>,
}

impl Expr {
    pub fn is_string_literal(&self) -> bool {
        matches!(self.shape, ExprShape::StringLiteral { .. })
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.shape,
            ExprShape::StringLiteral { .. } | ExprShape::NumberLiteral | ExprShape::Constant
        )
    }

    pub fn string_value(&self) -> Option<&str> {
        match &self.shape {
            ExprShape::StringLiteral { value } => Some(value),
            _ => None,
        }
    }

    /// String building with at least one non-literal operand.
    pub fn is_dynamic_string(&self) -> bool {
        match &self.shape {
            ExprShape::Concatenation { dynamic, .. } | ExprShape::Interpolation { dynamic, .. } => {
                *dynamic > 0
            }
            _ => false,
        }
    }

    /// Literal fragments of a concatenation, interpolation or plain literal.
    pub fn literal_parts(&self) -> Vec<&str> {
        match &self.shape {
            ExprShape::StringLiteral { value } => vec![value.as_str()],
            ExprShape::Concatenation { literals, .. } | ExprShape::Interpolation { literals, .. } => {
                literals.iter().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn references(&self, name: &str) -> bool {
        self.identifiers.iter().any(|id| id == name)
    }

    /// Text with all whitespace removed, for shape comparisons like `n-1`.
    pub fn compact(&self) -> String {
        self.text.chars().filter(|c| !c.is_whitespace()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    pub params: Vec<Param>,
    pub decorators: Vec<String>,
    pub modifiers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Struct,
    Record,
    Interface,
    Enum,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeShape {
    pub kind: TypeKind,
    pub methods: Vec<String>,
    pub decorators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub keyword: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    /// Final name segment, e.g. `executeQuery`.
    pub callee: String,
    /// Text of the receiver or qualifier, e.g. `stmt` or `MessageDigest`.
    pub receiver: Option<String>,
    /// Full callee text, e.g. `Runtime.getRuntime().exec`.
    pub path: String,
    pub arguments: Vec<Argument>,
    /// `new T(...)` or an equivalent constructor form.
    pub constructor: bool,
}

impl CallSite {
    pub fn first_argument(&self) -> Option<&Expr> {
        self.arguments.first().map(|a| &a.value)
    }

    pub fn receiver_root(&self) -> Option<&str> {
        self.receiver
            .as_deref()
            .map(|r| r.split(['.', '(', '[', ':']).next().unwrap_or(r).trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// A declaration, with or without an initializer.
    Bind,
    Assign,
    /// `+=`
    Append,
    Compound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingScope {
    Local,
    Member,
    Module,
    /// Keyword argument or object-literal pair.
    Keyword,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub target: String,
    pub op: AssignOp,
    pub value: Option<Expr>,
    pub declared_type: Option<String>,
    pub modifiers: Vec<String>,
    pub scope: BindingScope,
}

impl Binding {
    /// Last dotted segment of the first target, e.g. `self.conn, x` -> `conn`.
    pub fn target_name(&self) -> &str {
        let first = self.target.split(',').next().unwrap_or("").trim();
        first
            .rsplit(['.', ':'])
            .next()
            .unwrap_or(first)
            .trim_start_matches(['*', '&'])
            .trim()
    }

    pub fn is_member_target(&self) -> bool {
        let t = self.target.trim();
        t.starts_with("this.") || t.starts_with("self.") || self.scope == BindingScope::Member
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementShape {
    /// `pass`, `;` or an empty block.
    Empty,
    Return(Option<Expr>),
    Throw,
    Call(String),
    /// `break` / `continue`.
    Jump,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandlerClause {
    /// Caught type text; `None` for a bare `except:` or untyped `catch`.
    pub caught: Option<String>,
    pub binding: Option<String>,
    pub body: Vec<StatementShape>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Function(Signature),
    Type(TypeShape),
    Block,
    Call(CallSite),
    Conditional {
        condition: Option<Expr>,
        /// `else if` continuation; does not add nesting.
        chained: bool,
    },
    Loop {
        header: Option<Expr>,
    },
    Membership {
        element: Expr,
        container: Expr,
    },
    TryRegion {
        resources: Vec<Expr>,
    },
    Handler(HandlerClause),
    Cleanup {
        deferred: bool,
    },
    ScopedResource {
        resources: Vec<Expr>,
    },
    Assignment(Binding),
    Return(Option<Expr>),
    Throw,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Function(_) | Self::Type(_) => "declaration",
            Self::Block => "block",
            Self::Call(_) => "call-expression",
            Self::Conditional { .. } => "conditional",
            Self::Loop { .. } => "loop",
            Self::Membership { .. } => "membership",
            Self::TryRegion { .. } | Self::Handler(_) | Self::Cleanup { .. } => "try-catch",
            Self::ScopedResource { .. } => "scoped-resource",
            Self::Assignment(_) => "assignment",
            Self::Return(_) => "return",
            Self::Throw => "throw",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuralNode {
    pub kind: NodeKind,
    pub span: Span,
    pub name: Option<String>,
    pub children: Vec<StructuralNode>,
}

impl StructuralNode {
    pub fn new(kind: NodeKind, span: Span) -> Self {
        Self {
            kind,
            span,
            name: None,
            children: Vec::new(),
        }
    }

    pub fn named(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Attaches `child` if its span lies inside this node's span. Containment
    /// is what keeps the tree acyclic, so a child that violates it is handed
    /// back to the caller instead.
    pub fn adopt(&mut self, child: StructuralNode) -> Result<(), StructuralNode> {
        if self.span.contains(&child.span) {
            self.children.push(child);
            Ok(())
        } else {
            Err(child)
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, NodeKind::Function(_))
    }

    pub fn as_call(&self) -> Option<&CallSite> {
        match &self.kind {
            NodeKind::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn as_binding(&self) -> Option<&Binding> {
        match &self.kind {
            NodeKind::Assignment(binding) => Some(binding),
            _ => None,
        }
    }

    /// Pre-order iterator over this node and all descendants.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Pre-order iterator that does not enter nested functions or types.
    pub fn scope_descendants(&self) -> ScopeDescendants<'_> {
        ScopeDescendants {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Visits every node with its chain of ancestors (outermost first).
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a StructuralNode, &[&'a StructuralNode]),
    {
        let mut ancestors = Vec::new();
        self.walk_inner(visit, &mut ancestors);
    }

    fn walk_inner<'a, F>(&'a self, visit: &mut F, ancestors: &mut Vec<&'a StructuralNode>)
    where
        F: FnMut(&'a StructuralNode, &[&'a StructuralNode]),
    {
        visit(self, ancestors);
        ancestors.push(self);
        for child in &self.children {
            child.walk_inner(visit, ancestors);
        }
        ancestors.pop();
    }

    pub fn calls(&self) -> impl Iterator<Item = (&StructuralNode, &CallSite)> {
        self.descendants()
            .filter_map(|node| node.as_call().map(|call| (node, call)))
    }

    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(|c| c.depth()).max().unwrap_or(0)
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a StructuralNode>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a StructuralNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

pub struct ScopeDescendants<'a> {
    stack: Vec<&'a StructuralNode>,
}

impl<'a> Iterator for ScopeDescendants<'a> {
    type Item = &'a StructuralNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if !matches!(node.kind, NodeKind::Function(_) | NodeKind::Type(_)) {
            self.stack.extend(node.children.iter().rev());
        }
        Some(node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFeature {
    Tokens,
    Structure,
}

/// Everything detectors may look at for one unit.
#[derive(Debug)]
pub struct Model<'u> {
    pub unit: &'u SourceUnit,
    pub tokens: Vec<Token>,
    pub root: StructuralNode,
    /// Spans of syntax the grammar could not parse.
    pub parse_errors: Vec<Span>,
    /// Set when the parser produced no tree at all.
    pub unparsed: bool,
    /// Set when syntax nested past the modelled depth was left out.
    pub truncated: bool,
}

impl<'u> Model<'u> {
    /// A model with no tokens and no structure beneath the root.
    pub fn without_structure(unit: &'u SourceUnit) -> Self {
        Self {
            unit,
            tokens: Vec::new(),
            root: StructuralNode::new(NodeKind::Root, unit.span(0, unit.text().len())),
            parse_errors: Vec::new(),
            unparsed: true,
            truncated: false,
        }
    }

    pub fn language(&self) -> Language {
        self.unit.language()
    }

    pub fn is_partial(&self) -> bool {
        self.unparsed || self.truncated || !self.parse_errors.is_empty()
    }

    pub fn has_feature(&self, feature: ModelFeature) -> bool {
        match feature {
            ModelFeature::Tokens => !self.unparsed,
            ModelFeature::Structure => !self.unparsed,
        }
    }

    /// Tokens whose start lies inside `span`.
    pub fn tokens_in(&self, span: &Span) -> &[Token] {
        let start = self
            .tokens
            .partition_point(|t| t.span.start_byte < span.start_byte);
        let end = self
            .tokens
            .partition_point(|t| t.span.start_byte < span.end_byte);
        &self.tokens[start..end.max(start)]
    }

    /// Innermost function whose span contains `span`.
    pub fn enclosing_function(&self, span: &Span) -> Option<&StructuralNode> {
        self.root
            .descendants()
            .filter(|n| n.is_function() && n.span.contains(span))
            .min_by_key(|n| n.span.len())
    }

    pub fn functions(&self) -> impl Iterator<Item = &StructuralNode> {
        self.root.descendants().filter(|n| n.is_function())
    }

    pub fn text(&self, span: &Span) -> &str {
        self.unit.slice(span)
    }
}
