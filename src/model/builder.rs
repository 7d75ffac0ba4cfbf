use tracing::{debug, trace, warn};
use tree_sitter::{Node, Parser};

use super::expr::{unwrap_parens, ExprReader};
use super::node_types::{NodeCategory, NodeTypes};
use super::tokens::tokenize;
use super::{
    AssignOp, Binding, BindingScope, Expr, HandlerClause, Model, NodeKind, Param, Signature,
    StatementShape, StructuralNode, TypeKind, TypeShape,
};
use crate::source::{Language, SourceUnit, Span};

/// Subtrees nested deeper than this are left out of the structural tree.
pub const MAX_DEPTH: usize = 256;

/// Builds the token stream and structural tree for a unit.
#[derive(Debug, Clone, Copy)]
pub struct ModelBuilder {
    language: Language,
    types: NodeTypes,
}

impl ModelBuilder {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            types: NodeTypes::new(language),
        }
    }

    pub fn for_unit(unit: &SourceUnit) -> Self {
        Self::new(unit.language())
    }

    /// Never fails: a unit the grammar cannot handle yields an empty model
    /// flagged as unparsed, and recoverable syntax errors are recorded in
    /// `parse_errors` while the rest of the unit is modelled normally.
    pub fn build<'u>(&self, unit: &'u SourceUnit) -> Model<'u> {
        let mut parser = Parser::new();
        if let Err(e) = parser.set_language(&self.language.grammar()) {
            warn!(unit = unit.name(), error = %e, "grammar rejected by parser");
            return Model::without_structure(unit);
        }
        let Some(tree) = parser.parse(unit.text(), None) else {
            warn!(unit = unit.name(), "parser produced no tree");
            return Model::without_structure(unit);
        };

        let root = tree.root_node();
        let tokens = tokenize(root, unit, &self.types);
        let parse_errors = collect_errors(root, unit);
        if !parse_errors.is_empty() {
            debug!(
                unit = unit.name(),
                errors = parse_errors.len(),
                "unit parsed with errors"
            );
        }

        let mut walker = StructureWalker {
            unit,
            types: self.types,
            reader: ExprReader::new(unit, self.types),
            scopes: Vec::new(),
            truncated: false,
        };
        let mut top = StructuralNode::new(NodeKind::Root, unit.span(0, unit.text().len()));
        walker.visit_children(root, &mut top, 0);
        let truncated = walker.truncated || walker.reader.truncated();
        if truncated {
            debug!(unit = unit.name(), "nesting past the depth limit left unmodelled");
        }

        trace!(
            unit = unit.name(),
            tokens = tokens.len(),
            nodes = top.descendants().count(),
            "model built"
        );

        Model {
            unit,
            tokens,
            root: top,
            parse_errors,
            unparsed: false,
            truncated,
        }
    }
}

/// Spans of ERROR and MISSING nodes, outermost only.
fn collect_errors(root: Node<'_>, unit: &SourceUnit) -> Vec<Span> {
    let mut errors = Vec::new();
    if !root.has_error() {
        return errors;
    }
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        let is_error = node.is_error() || node.is_missing();
        if is_error {
            errors.push(unit.span(node.start_byte(), node.end_byte()));
        }
        if !is_error && node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return errors;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Function,
    Type,
}

struct StructureWalker<'a> {
    unit: &'a SourceUnit,
    types: NodeTypes,
    reader: ExprReader<'a>,
    scopes: Vec<Scope>,
    truncated: bool,
}

impl<'a> StructureWalker<'a> {
    fn language(&self) -> Language {
        self.types.language()
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        self.reader.text(node)
    }

    fn is(&self, node: Node<'_>, category: NodeCategory) -> bool {
        self.types.is_category(node.kind(), category)
    }

    fn visit_children(&mut self, node: Node<'_>, parent: &mut StructuralNode, depth: usize) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child, parent, depth + 1);
        }
    }

    fn visit(&mut self, node: Node<'_>, parent: &mut StructuralNode, depth: usize) {
        if depth > MAX_DEPTH {
            trace!(kind = node.kind(), "structure depth limit reached");
            self.truncated = true;
            return;
        }
        if self.is(node, NodeCategory::Comment) {
            return;
        }

        let kind = self
            .types
            .structural_category(node.kind())
            .and_then(|category| self.node_kind(node, category).map(|k| (category, k)));
        let Some((category, kind)) = kind else {
            self.visit_children(node, parent, depth);
            return;
        };

        let span = self.unit.span(node.start_byte(), node.end_byte());
        let mut built = StructuralNode::new(kind, span).named(self.declared_name(node, category));

        let scope = match category {
            NodeCategory::FunctionDeclaration => Some(Scope::Function),
            NodeCategory::TypeDeclaration => Some(Scope::Type),
            _ => None,
        };
        if let Some(scope) = scope {
            self.scopes.push(scope);
        }
        self.visit_children(node, &mut built, depth);
        if scope.is_some() {
            self.scopes.pop();
        }

        if matches!(built.kind, NodeKind::Type(_)) {
            let methods: Vec<String> = built
                .scope_descendants()
                .filter(|n| n.is_function())
                .filter_map(|n| n.name.clone())
                .collect();
            if let NodeKind::Type(shape) = &mut built.kind {
                shape.methods = methods;
            }
        }

        if let Err(orphan) = parent.adopt(built) {
            warn!(
                kind = orphan.kind.label(),
                line = orphan.span.start_line,
                "dropping structural node outside its parent"
            );
        }
    }

    fn node_kind(&self, node: Node<'_>, category: NodeCategory) -> Option<NodeKind> {
        match category {
            NodeCategory::FunctionDeclaration => Some(NodeKind::Function(self.signature(node))),
            NodeCategory::TypeDeclaration => self.type_shape(node).map(NodeKind::Type),
            NodeCategory::CallExpression => self.reader.call_site(node).map(NodeKind::Call),
            NodeCategory::NewExpression => match self.language() {
                Language::Java | Language::JavaScript | Language::TypeScript | Language::Tsx => {
                    self.reader.call_site(node).map(NodeKind::Call)
                }
                _ => None,
            },
            NodeCategory::IfStatement => Some(NodeKind::Conditional {
                condition: self.field_expr(node, &["condition"]),
                chained: self.is_chained(node),
            }),
            NodeCategory::SwitchStatement => Some(NodeKind::Conditional {
                condition: self.field_expr(node, &["value", "condition", "subject"]),
                chained: false,
            }),
            NodeCategory::Loop => Some(NodeKind::Loop {
                header: self.loop_header(node),
            }),
            NodeCategory::TryStatement => Some(NodeKind::TryRegion {
                resources: self.try_resources(node),
            }),
            NodeCategory::CatchClause => Some(NodeKind::Handler(self.handler(node))),
            NodeCategory::FinallyClause => Some(NodeKind::Cleanup { deferred: false }),
            NodeCategory::DeferStatement => Some(NodeKind::Cleanup { deferred: true }),
            NodeCategory::ScopedResource => Some(NodeKind::ScopedResource {
                resources: self.with_resources(node),
            }),
            NodeCategory::VariableDeclarator
            | NodeCategory::Assignment
            | NodeCategory::AugmentedAssignment
            | NodeCategory::KeywordArgument => {
                self.binding(node, category).map(NodeKind::Assignment)
            }
            NodeCategory::ComparisonExpression => self.membership(node),
            NodeCategory::ReturnStatement => Some(NodeKind::Return(
                first_named(node).map(|value| self.reader.read(value)),
            )),
            NodeCategory::ThrowStatement => Some(NodeKind::Throw),
            NodeCategory::Block => Some(NodeKind::Block),
            _ => None,
        }
    }

    fn field_expr(&self, node: Node<'_>, fields: &[&str]) -> Option<Expr> {
        fields
            .iter()
            .find_map(|field| node.child_by_field_name(field))
            .map(|child| self.reader.read(child))
    }

    fn declared_name(&self, node: Node<'_>, category: NodeCategory) -> Option<String> {
        if !matches!(
            category,
            NodeCategory::FunctionDeclaration | NodeCategory::TypeDeclaration
        ) {
            return None;
        }
        if let Some(name) = node.child_by_field_name("name") {
            return Some(self.text(name).to_string());
        }
        // Anonymous functions take the name they are bound to.
        let parent = node.parent()?;
        let binder = parent
            .child_by_field_name("name")
            .or_else(|| parent.child_by_field_name("key"))
            .or_else(|| parent.child_by_field_name("left"))?;
        (binder.id() != node.id()).then(|| self.text(binder).to_string())
    }

    /// `else if` / `elif` continuations of an enclosing conditional.
    fn is_chained(&self, node: Node<'_>) -> bool {
        if node.kind() == "elif_clause" {
            return true;
        }
        let Some(parent) = node.parent() else {
            return false;
        };
        let (owner, branch) = if parent.kind() == "else_clause" {
            match parent.parent() {
                Some(grandparent) => (grandparent, parent),
                None => return false,
            }
        } else {
            (parent, node)
        };
        self.is(owner, NodeCategory::IfStatement)
            && owner
                .child_by_field_name("alternative")
                .map(|alt| alt.id() == branch.id())
                .unwrap_or(false)
    }

    fn loop_header(&self, node: Node<'_>) -> Option<Expr> {
        if let Some(header) = self.field_expr(node, &["right", "value", "condition"]) {
            return Some(header);
        }
        find_named(node, "range_clause")
            .and_then(|clause| clause.child_by_field_name("right"))
            .map(|right| self.reader.read(right))
    }

    fn try_resources(&self, node: Node<'_>) -> Vec<Expr> {
        let Some(spec) = node.child_by_field_name("resources") else {
            return Vec::new();
        };
        let mut cursor = spec.walk();
        spec.named_children(&mut cursor)
            .filter(|r| r.kind() == "resource")
            .map(|r| {
                let value = r.child_by_field_name("value").unwrap_or(r);
                self.reader.read(value)
            })
            .collect()
    }

    fn with_resources(&self, node: Node<'_>) -> Vec<Expr> {
        let Some(clause) = find_named(node, "with_clause") else {
            return Vec::new();
        };
        let mut cursor = clause.walk();
        clause
            .named_children(&mut cursor)
            .filter(|item| item.kind() == "with_item")
            .filter_map(|item| item.child_by_field_name("value"))
            .map(|value| {
                let value = if value.kind() == "as_pattern" {
                    value.named_child(0).unwrap_or(value)
                } else {
                    value
                };
                self.reader.read(value)
            })
            .collect()
    }

    fn handler(&self, node: Node<'_>) -> HandlerClause {
        let (caught, binding) = match self.language() {
            Language::Java => {
                let param = find_named(node, "catch_formal_parameter");
                let caught = param
                    .and_then(|p| find_named(p, "catch_type"))
                    .map(|t| self.text(t).to_string());
                let binding = param
                    .and_then(|p| p.child_by_field_name("name"))
                    .map(|n| self.text(n).to_string());
                (caught, binding)
            }
            Language::Python => {
                let clause = {
                    let mut cursor = node.walk();
                    let found = node
                        .named_children(&mut cursor)
                        .find(|c| c.kind() != "block" && !self.is(*c, NodeCategory::Comment));
                    found
                };
                match clause {
                    Some(c) if c.kind() == "as_pattern" => (
                        c.named_child(0).map(|t| self.text(t).to_string()),
                        c.child_by_field_name("alias")
                            .map(|a| self.text(a).to_string()),
                    ),
                    Some(c) => (Some(self.text(c).to_string()), None),
                    None => (None, None),
                }
            }
            _ => (
                None,
                node.child_by_field_name("parameter")
                    .map(|p| self.text(p).to_string()),
            ),
        };

        let body = node
            .child_by_field_name("body")
            .or_else(|| find_named(node, "block"));
        HandlerClause {
            caught,
            binding,
            body: body.map(|b| self.statements(b)).unwrap_or_default(),
        }
    }

    fn statements(&self, block: Node<'_>) -> Vec<StatementShape> {
        let mut cursor = block.walk();
        block
            .named_children(&mut cursor)
            .filter(|s| !self.is(*s, NodeCategory::Comment))
            .map(|s| self.statement_shape(s))
            .collect()
    }

    fn statement_shape(&self, node: Node<'_>) -> StatementShape {
        if self.is(node, NodeCategory::ReturnStatement) {
            return StatementShape::Return(first_named(node).map(|v| self.reader.read(v)));
        }
        if self.is(node, NodeCategory::ThrowStatement) {
            return StatementShape::Throw;
        }
        match node.kind() {
            "pass_statement" | "empty_statement" => StatementShape::Empty,
            "break_statement" | "continue_statement" => StatementShape::Jump,
            "expression_statement" => match first_named(node).map(unwrap_parens) {
                Some(inner) if self.is(inner, NodeCategory::CallExpression) => self
                    .reader
                    .call_site(inner)
                    .map(|call| StatementShape::Call(call.path))
                    .unwrap_or(StatementShape::Other),
                _ => StatementShape::Other,
            },
            _ if self.is(node, NodeCategory::CallExpression) => self
                .reader
                .call_site(node)
                .map(|call| StatementShape::Call(call.path))
                .unwrap_or(StatementShape::Other),
            _ => StatementShape::Other,
        }
    }

    fn membership(&self, node: Node<'_>) -> Option<NodeKind> {
        let has_in = {
            let mut cursor = node.walk();
            let found = node
                .children(&mut cursor)
                .any(|c| !c.is_named() && matches!(c.kind(), "in" | "not in"));
            found
        };
        if !has_in {
            return None;
        }
        let element = node.named_child(0)?;
        let container = node.named_child(1)?;
        Some(NodeKind::Membership {
            element: self.reader.read(element),
            container: self.reader.read(container),
        })
    }

    fn binding(&self, node: Node<'_>, category: NodeCategory) -> Option<Binding> {
        let scope = self.binding_scope(node, category);

        if category == NodeCategory::KeywordArgument {
            let target = node
                .child_by_field_name("name")
                .or_else(|| node.child_by_field_name("key"))
                .or_else(|| node.child_by_field_name("field"))
                .or_else(|| node.named_child(0))?;
            let value = node
                .child_by_field_name("value")
                .or_else(|| node.named_child(1));
            return Some(Binding {
                target: self.reader.read(target).text.trim_matches(['"', '\'']).to_string(),
                op: AssignOp::Bind,
                value: value.map(|v| self.reader.read(v)),
                declared_type: None,
                modifiers: Vec::new(),
                scope,
            });
        }

        let target = node
            .child_by_field_name("name")
            .or_else(|| node.child_by_field_name("left"))
            .or_else(|| node.child_by_field_name("pattern"))
            .or_else(|| node.child_by_field_name("property"))?;
        let value = node
            .child_by_field_name("value")
            .or_else(|| node.child_by_field_name("right"))
            .map(first_of_list);
        let operator = node
            .child_by_field_name("operator")
            .map(|op| self.text(op))
            .unwrap_or("=");
        let op = if category == NodeCategory::VariableDeclarator {
            AssignOp::Bind
        } else {
            match operator {
                "=" | ":=" => AssignOp::Assign,
                "+=" => AssignOp::Append,
                _ => AssignOp::Compound,
            }
        };

        // Java and TS keep the declared type and modifiers on the declaration
        // that owns the declarator.
        let owner = match node.kind() {
            "variable_declarator" => node.parent().unwrap_or(node),
            _ => node,
        };
        let declared_type = node
            .child_by_field_name("type")
            .or_else(|| owner.child_by_field_name("type"))
            .map(|t| self.text(t).trim_start_matches(':').trim().to_string());

        let mut modifiers = self.modifiers(owner);
        match node.kind() {
            "const_spec" | "const_item" => modifiers.push("const".to_string()),
            "static_item" => modifiers.push("static".to_string()),
            _ => {}
        }
        if owner.kind() == "lexical_declaration" || owner.kind() == "variable_declaration" {
            if let Some(keyword) = owner.child(0) {
                modifiers.push(self.text(keyword).to_string());
            }
        }

        Some(Binding {
            target: self.text(target).to_string(),
            op,
            value: value.map(|v| self.reader.read(v)),
            declared_type,
            modifiers,
            scope,
        })
    }

    fn binding_scope(&self, node: Node<'_>, category: NodeCategory) -> BindingScope {
        if category == NodeCategory::KeywordArgument {
            return BindingScope::Keyword;
        }
        let is_field = matches!(node.kind(), "public_field_definition" | "field_definition")
            || node
                .parent()
                .map(|p| p.kind() == "field_declaration")
                .unwrap_or(false);
        if is_field {
            return BindingScope::Member;
        }
        match self.scopes.last() {
            None => BindingScope::Module,
            Some(Scope::Type) => BindingScope::Member,
            Some(Scope::Function) => BindingScope::Local,
        }
    }

    fn signature(&self, node: Node<'_>) -> Signature {
        let params = match node
            .child_by_field_name("parameters")
            .or_else(|| node.child_by_field_name("parameter"))
        {
            Some(single) if self.is(single, NodeCategory::Identifier) => vec![Param {
                name: self.text(single).to_string(),
                type_name: None,
            }],
            Some(list) => self.params(list),
            None => Vec::new(),
        };
        Signature {
            params,
            decorators: self.decorators(node),
            modifiers: self.modifiers(node),
        }
    }

    fn params(&self, list: Node<'_>) -> Vec<Param> {
        let mut params = Vec::new();
        let mut cursor = list.walk();
        for child in list.named_children(&mut cursor) {
            if self.is(child, NodeCategory::Comment) {
                continue;
            }
            let type_name = child
                .child_by_field_name("type")
                .map(|t| self.text(t).trim_start_matches(':').trim().to_string());
            match child.kind() {
                "keyword_separator" | "positional_separator" | "receiver_parameter"
                | "attribute_item" => {}
                "list_splat_pattern" | "dictionary_splat_pattern" | "rest_pattern" => {
                    params.push(Param {
                        name: self.text(child).to_string(),
                        type_name,
                    });
                }
                "parameter_declaration" | "variadic_parameter_declaration" => {
                    let mut names = child.walk();
                    let before = params.len();
                    params.extend(child.children_by_field_name("name", &mut names).map(|n| {
                        Param {
                            name: self.text(n).to_string(),
                            type_name: type_name.clone(),
                        }
                    }));
                    if params.len() == before {
                        params.push(Param {
                            name: String::new(),
                            type_name,
                        });
                    }
                }
                _ => {
                    let name_node = child
                        .child_by_field_name("name")
                        .or_else(|| child.child_by_field_name("pattern"))
                        .or_else(|| child.child_by_field_name("left"))
                        .or_else(|| {
                            if self.is(child, NodeCategory::Identifier) {
                                None
                            } else {
                                child.named_child(0).filter(|c| self.is(*c, NodeCategory::Identifier))
                            }
                        })
                        .unwrap_or(child);
                    params.push(Param {
                        name: self.text(name_node).to_string(),
                        type_name,
                    });
                }
            }
        }
        params
    }

    fn decorators(&self, node: Node<'_>) -> Vec<String> {
        let mut out = Vec::new();

        if let Some(parent) = node.parent() {
            if parent.kind() == "decorated_definition" {
                let mut cursor = parent.walk();
                out.extend(
                    parent
                        .named_children(&mut cursor)
                        .filter(|c| self.is(*c, NodeCategory::Decorator))
                        .map(|c| self.text(c).to_string()),
                );
            }
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if self.is(child, NodeCategory::Decorator) {
                out.push(self.text(child).to_string());
            } else if child.kind() == "modifiers" {
                let mut inner = child.walk();
                out.extend(
                    child
                        .named_children(&mut inner)
                        .filter(|m| self.is(*m, NodeCategory::Decorator))
                        .map(|m| self.text(m).to_string()),
                );
            }
        }

        let mut prev = node.prev_named_sibling();
        while let Some(sibling) = prev {
            if sibling.kind() == "attribute_item" {
                out.push(self.text(sibling).to_string());
            } else if !self.is(sibling, NodeCategory::Comment) {
                break;
            }
            prev = sibling.prev_named_sibling();
        }
        out
    }

    fn modifiers(&self, node: Node<'_>) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "modifiers" => {
                    let mut inner = child.walk();
                    out.extend(
                        child
                            .children(&mut inner)
                            .filter(|m| !self.is(*m, NodeCategory::Decorator))
                            .map(|m| self.text(m).to_string()),
                    );
                }
                "visibility_modifier" | "accessibility_modifier" | "mutable_specifier" => {
                    out.push(self.text(child).to_string());
                }
                "static" | "readonly" | "abstract" | "async" if !child.is_named() => {
                    out.push(child.kind().to_string());
                }
                _ => {}
            }
        }
        out
    }

    fn type_shape(&self, node: Node<'_>) -> Option<TypeShape> {
        let kind = match node.kind() {
            "struct_item" => TypeKind::Struct,
            "record_declaration" => TypeKind::Record,
            "interface_declaration" => TypeKind::Interface,
            "enum_declaration" | "enum_item" => TypeKind::Enum,
            "type_spec" => match node.child_by_field_name("type").map(|t| t.kind()) {
                Some("struct_type") => TypeKind::Struct,
                Some("interface_type") => TypeKind::Interface,
                _ => return None,
            },
            _ => TypeKind::Class,
        };
        Some(TypeShape {
            kind,
            methods: Vec::new(),
            decorators: self.decorators(node),
        })
    }
}

fn first_named(node: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|c| !c.kind().contains("comment"));
    found
}

fn find_named<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| c.kind() == kind);
    found
}

/// Go declares and assigns through expression lists; the first element stands for the list.
fn first_of_list(node: Node<'_>) -> Node<'_> {
    if node.kind() == "expression_list" {
        node.named_child(0).unwrap_or(node)
    } else {
        node
    }
}
