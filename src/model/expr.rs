use std::cell::Cell;
use tree_sitter::Node;

use super::node_types::{NodeCategory, NodeTypes};
use super::{Argument, CallSite, CollectionKind, Expr, ExprShape};
use crate::source::{Language, SourceUnit};
use crate::utils::string::{strip_generics, unquote_string};

/// Sub-expressions nested deeper than this are summarised as [`ExprShape::Other`].
pub const MAX_EXPR_DEPTH: usize = 32;

/// Reads grammar expressions into language-neutral [`Expr`] summaries.
pub struct ExprReader<'a> {
    unit: &'a SourceUnit,
    types: NodeTypes,
    truncated: Cell<bool>,
}

impl<'a> ExprReader<'a> {
    pub fn new(unit: &'a SourceUnit, types: NodeTypes) -> Self {
        Self {
            unit,
            types,
            truncated: Cell::new(false),
        }
    }

    /// Whether any read hit [`MAX_EXPR_DEPTH`].
    pub fn truncated(&self) -> bool {
        self.truncated.get()
    }

    fn language(&self) -> Language {
        self.types.language()
    }

    pub fn text(&self, node: Node<'_>) -> &'a str {
        self.unit
            .text()
            .get(node.start_byte()..node.end_byte())
            .unwrap_or("")
    }

    fn is(&self, node: Node<'_>, category: NodeCategory) -> bool {
        self.types.is_category(node.kind(), category)
    }

    pub fn read(&self, node: Node<'_>) -> Expr {
        self.read_at(node, 0)
    }

    fn read_at(&self, node: Node<'_>, depth: usize) -> Expr {
        let node = unwrap_parens(node);
        Expr {
            shape: self.shape(node, depth),
            text: self.text(node).to_string(),
            span: self.unit.span(node.start_byte(), node.end_byte()),
            identifiers: self.identifiers(node),
        }
    }

    fn shape(&self, node: Node<'_>, depth: usize) -> ExprShape {
        if depth > MAX_EXPR_DEPTH {
            self.truncated.set(true);
            return ExprShape::Other;
        }
        if self.is(node, NodeCategory::StringLiteral) {
            return self.string_shape(node);
        }
        if self.is(node, NodeCategory::NumberLiteral) {
            return ExprShape::NumberLiteral;
        }
        if self.is(node, NodeCategory::ConstantLiteral) {
            return ExprShape::Constant;
        }
        if self.is(node, NodeCategory::Identifier) {
            return ExprShape::Identifier;
        }
        if self.is(node, NodeCategory::SelectorExpression) {
            return ExprShape::Member;
        }
        if self.is(node, NodeCategory::IndexExpression) {
            return ExprShape::Index;
        }
        if self.is(node, NodeCategory::BinaryExpression) {
            return self.binary_shape(node, depth);
        }
        if self.is(node, NodeCategory::CollectionLiteral) {
            return self.collection_shape(node);
        }
        if self.is(node, NodeCategory::NewExpression) {
            return self.construct_shape(node);
        }
        if self.is(node, NodeCategory::CallExpression) {
            return self.call_shape(node, depth);
        }
        match node.kind() {
            "await_expression" | "await" | "spread_element" | "reference_expression"
            | "unary_expression" | "cast_expression" | "as_expression"
            | "non_null_expression" | "try_expression" => node
                .named_child(node.named_child_count().saturating_sub(1))
                .map(|inner| self.shape(unwrap_parens(inner), depth + 1))
                .unwrap_or(ExprShape::Other),
            _ => ExprShape::Other,
        }
    }

    fn string_shape(&self, node: Node<'_>) -> ExprShape {
        let mut literals = Vec::new();
        let mut dynamic = 0;
        self.collect_string_parts(node, &mut literals, &mut dynamic);

        if dynamic > 0 {
            ExprShape::Interpolation { literals, dynamic }
        } else if node.kind() == "concatenated_string" {
            ExprShape::StringLiteral {
                value: literals.concat(),
            }
        } else {
            ExprShape::StringLiteral {
                value: unquote_string(self.text(node)),
            }
        }
    }

    fn collect_string_parts(&self, node: Node<'_>, literals: &mut Vec<String>, dynamic: &mut usize) {
        let mut cursor = node.walk();
        let mut current = String::new();
        let children: Vec<_> = node.named_children(&mut cursor).collect();

        if children.is_empty() {
            literals.push(unquote_string(self.text(node)));
            return;
        }
        for child in children {
            if self.is(child, NodeCategory::Interpolation) {
                *dynamic += 1;
                if !current.is_empty() {
                    literals.push(std::mem::take(&mut current));
                }
            } else if self.is(child, NodeCategory::StringLiteral) {
                self.collect_string_parts(child, literals, dynamic);
            } else if matches!(
                child.kind(),
                "string_content" | "string_fragment" | "escape_sequence"
            ) {
                current.push_str(self.text(child));
            }
        }
        if !current.is_empty() {
            literals.push(current);
        }
    }

    fn binary_shape(&self, node: Node<'_>, depth: usize) -> ExprShape {
        let operator = node
            .child_by_field_name("operator")
            .map(|op| self.text(op))
            .unwrap_or("");

        match operator {
            "+" => {
                let mut literals = Vec::new();
                let mut dynamic = 0;
                let mut has_string = false;
                for operand in self.plus_operands(node) {
                    match self.shape(operand, depth + 1) {
                        ExprShape::StringLiteral { value } => {
                            has_string = true;
                            literals.push(value);
                        }
                        ExprShape::Interpolation {
                            literals: inner,
                            dynamic: d,
                        } => {
                            has_string = true;
                            literals.extend(inner);
                            dynamic += d;
                        }
                        ExprShape::NumberLiteral | ExprShape::Constant => {}
                        _ => dynamic += 1,
                    }
                }
                if has_string {
                    ExprShape::Concatenation { literals, dynamic }
                } else {
                    ExprShape::Other
                }
            }
            "%" if self.language() == Language::Python => {
                match node
                    .child_by_field_name("left")
                    .map(|l| self.shape(unwrap_parens(l), depth + 1))
                {
                    Some(ExprShape::StringLiteral { value }) => ExprShape::Interpolation {
                        literals: vec![value],
                        dynamic: 1,
                    },
                    _ => ExprShape::Other,
                }
            }
            _ => ExprShape::Other,
        }
    }

    fn collection_shape(&self, node: Node<'_>) -> ExprShape {
        let kind = match (self.language(), node.kind()) {
            (Language::Python, "list" | "list_comprehension") => CollectionKind::List,
            (Language::Python, "tuple") => CollectionKind::Tuple,
            (Language::Python, "set" | "set_comprehension") => CollectionKind::Set,
            (Language::Python, _) => CollectionKind::Map,
            (_, "object") => CollectionKind::Map,
            (_, "array") => CollectionKind::List,
            (_, "tuple_expression") => CollectionKind::Tuple,
            _ => CollectionKind::Array,
        };
        ExprShape::Collection {
            kind,
            elements: node.named_child_count(),
        }
    }

    fn construct_shape(&self, node: Node<'_>) -> ExprShape {
        let type_node = node
            .child_by_field_name("type")
            .or_else(|| node.child_by_field_name("constructor"))
            .or_else(|| node.child_by_field_name("name"));
        let Some(type_node) = type_node else {
            return ExprShape::Other;
        };
        match type_node.kind() {
            "slice_type" => ExprShape::Collection {
                kind: CollectionKind::List,
                elements: literal_elements(node),
            },
            "array_type" | "implicit_length_array_type" => ExprShape::Collection {
                kind: CollectionKind::Array,
                elements: literal_elements(node),
            },
            "map_type" => ExprShape::Collection {
                kind: CollectionKind::Map,
                elements: literal_elements(node),
            },
            _ => ExprShape::Construct {
                type_name: strip_generics(self.text(type_node)).to_string(),
            },
        }
    }

    fn call_shape(&self, node: Node<'_>, depth: usize) -> ExprShape {
        let Some(call) = self.call_site_at(node, depth) else {
            return ExprShape::Other;
        };

        if call.callee == "vec" && node.kind() == "macro_invocation" {
            return ExprShape::Collection {
                kind: CollectionKind::List,
                elements: call.arguments.len(),
            };
        }

        if let Some(shape) = self.formatting_shape(node, &call) {
            return shape;
        }

        ExprShape::Call {
            callee: call.callee,
            receiver: call.receiver,
        }
    }

    /// `"..".format(x)`, `String.format(..)`, `fmt.Sprintf(..)`, `format!(..)`.
    fn formatting_shape(&self, node: Node<'_>, call: &CallSite) -> Option<ExprShape> {
        match (self.language(), call.callee.as_str()) {
            (Language::Python, "format") => {
                let receiver = node
                    .child_by_field_name("function")
                    .and_then(|f| f.child_by_field_name("object"))?;
                if !self.is(receiver, NodeCategory::StringLiteral) {
                    return None;
                }
                let dynamic = call.arguments.iter().filter(|a| !a.value.is_literal()).count();
                Some(ExprShape::Interpolation {
                    literals: vec![unquote_string(self.text(receiver))],
                    dynamic,
                })
            }
            (Language::Java, "format" | "formatted")
            | (Language::Go, "Sprintf" | "Errorf")
            | (Language::Rust, "format") => {
                let (format, rest) = call.arguments.split_first()?;
                let template = format.value.string_value()?.to_string();
                let mut dynamic = rest.iter().filter(|a| !a.value.is_literal()).count();
                if self.language() == Language::Rust && has_inline_capture(&template) {
                    dynamic += 1;
                }
                Some(ExprShape::Interpolation {
                    literals: vec![template],
                    dynamic,
                })
            }
            _ => None,
        }
    }

    /// Callee, receiver and arguments of a call or constructor node.
    pub fn call_site(&self, node: Node<'_>) -> Option<CallSite> {
        self.call_site_at(node, 0)
    }

    fn call_site_at(&self, node: Node<'_>, depth: usize) -> Option<CallSite> {
        if self.is(node, NodeCategory::NewExpression) {
            let type_node = node
                .child_by_field_name("type")
                .or_else(|| node.child_by_field_name("constructor"))
                .or_else(|| node.child_by_field_name("name"))?;
            let path = strip_generics(self.text(type_node)).to_string();
            let callee = path.rsplit(['.', ':']).next().unwrap_or(&path).to_string();
            return Some(CallSite {
                callee,
                receiver: None,
                path,
                arguments: self.arguments(node, depth),
                constructor: true,
            });
        }

        let (callee, receiver, path) = match (self.language(), node.kind()) {
            (Language::Java, _) => {
                let name = self.text(node.child_by_field_name("name")?).to_string();
                let receiver = node
                    .child_by_field_name("object")
                    .map(|o| self.text(o).to_string());
                let path = match &receiver {
                    Some(r) => format!("{r}.{name}"),
                    None => name.clone(),
                };
                (name, receiver, path)
            }
            (Language::Rust, "macro_invocation") => {
                let name = self.text(node.child_by_field_name("macro")?).to_string();
                let callee = name.rsplit("::").next().unwrap_or(&name).to_string();
                (callee, None, format!("{name}!"))
            }
            _ => {
                let function = node.child_by_field_name("function")?;
                let path = self.text(function).to_string();
                let (callee, receiver) = self.split_callee(unwrap_parens(function));
                (callee, receiver, path)
            }
        };

        Some(CallSite {
            callee,
            receiver,
            path,
            arguments: self.arguments(node, depth),
            constructor: false,
        })
    }

    fn split_callee(&self, mut function: Node<'_>) -> (String, Option<String>) {
        let fields: &[(&str, &str)] = &[
            ("attribute", "object"),
            ("property", "object"),
            ("field", "operand"),
            ("field", "value"),
            ("name", "path"),
        ];
        loop {
            for (member, owner) in fields {
                if let (Some(m), Some(o)) = (
                    function.child_by_field_name(member),
                    function.child_by_field_name(owner),
                ) {
                    return (self.text(m).to_string(), Some(self.text(o).to_string()));
                }
            }
            // Rust turbofish `parse::<T>` and TS generic calls keep only the base name.
            match function.child_by_field_name("function") {
                Some(inner) => function = inner,
                None => return (self.text(function).to_string(), None),
            }
        }
    }

    fn arguments(&self, node: Node<'_>, depth: usize) -> Vec<Argument> {
        let Some(list) = node
            .child_by_field_name("arguments")
            .or_else(|| find_child(node, "token_tree"))
        else {
            return Vec::new();
        };

        let mut cursor = list.walk();
        list.named_children(&mut cursor)
            .filter(|child| !self.is(*child, NodeCategory::Comment))
            .map(|child| {
                if child.kind() == "keyword_argument" {
                    let keyword = child
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string());
                    let value = child
                        .child_by_field_name("value")
                        .map(|v| self.read_at(v, depth + 1))
                        .unwrap_or_else(|| self.read_at(child, depth + 1));
                    Argument { keyword, value }
                } else {
                    Argument {
                        keyword: None,
                        value: self.read_at(child, depth + 1),
                    }
                }
            })
            .collect()
    }

    /// Identifier texts referenced by `node`, including inside interpolations.
    pub fn identifiers(&self, node: Node<'_>) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_identifiers(node, &mut out);
        out
    }

    fn collect_identifiers(&self, node: Node<'_>, out: &mut Vec<String>) {
        let mut stack = vec![node];
        let mut children = Vec::new();
        while let Some(node) = stack.pop() {
            if self.is(node, NodeCategory::Identifier) {
                out.push(self.text(node).to_string());
                continue;
            }
            // Only interpolated parts of a string literal reference anything.
            let in_string = self.is(node, NodeCategory::StringLiteral);
            let mut cursor = node.walk();
            children.extend(node.named_children(&mut cursor).filter(|child| {
                !in_string
                    || self.is(*child, NodeCategory::Interpolation)
                    || self.is(*child, NodeCategory::StringLiteral)
            }));
            stack.extend(children.drain(..).rev());
        }
    }

    fn is_plus(&self, node: Node<'_>) -> bool {
        self.is(node, NodeCategory::BinaryExpression)
            && node
                .child_by_field_name("operator")
                .map(|op| self.text(op) == "+")
                .unwrap_or(false)
    }

    /// Operands of a `+` chain in source order, however long the chain.
    fn plus_operands<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut operands = Vec::new();
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            let node = unwrap_parens(node);
            if !self.is_plus(node) {
                operands.push(node);
                continue;
            }
            if let Some(right) = node.child_by_field_name("right") {
                stack.push(right);
            }
            if let Some(left) = node.child_by_field_name("left") {
                stack.push(left);
            }
        }
        operands
    }
}

pub fn unwrap_parens(mut node: Node<'_>) -> Node<'_> {
    while matches!(node.kind(), "parenthesized_expression" | "parenthesized_list_splat") {
        match node.named_child(0) {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

fn find_child<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn literal_elements(node: Node<'_>) -> usize {
    node.child_by_field_name("body")
        .map(|body| body.named_child_count())
        .unwrap_or(0)
}

fn has_inline_capture(template: &str) -> bool {
    template
        .split('{')
        .skip(1)
        .any(|part| part.chars().next().map(|c| c.is_alphabetic() || c == '_').unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{Parser, Tree};

    fn parse(language: Language, text: &str) -> (SourceUnit, Tree) {
        let unit = SourceUnit::new("t", language, text);
        let mut parser = Parser::new();
        parser.set_language(&language.grammar()).unwrap();
        let tree = parser.parse(text, None).unwrap();
        (unit, tree)
    }

    fn find<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
        if node.kind() == kind {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        children.into_iter().find_map(|c| find(c, kind))
    }

    #[test]
    fn test_java_concatenation() {
        let (unit, tree) = parse(
            Language::Java,
            "class A { void f(String id) { q = \"SELECT * FROM t WHERE id = \" + id + \";\"; } }",
        );
        let reader = ExprReader::new(&unit, NodeTypes::new(Language::Java));
        let binary = find(tree.root_node(), "binary_expression").unwrap();
        let expr = reader.read(binary);
        assert!(expr.is_dynamic_string());
        assert_eq!(expr.literal_parts()[0], "SELECT * FROM t WHERE id = ");
        assert!(expr.references("id"));
    }

    #[test]
    fn test_python_fstring_is_interpolation() {
        let (unit, tree) = parse(Language::Python, "q = f\"SELECT * FROM users WHERE id={uid}\"\n");
        let reader = ExprReader::new(&unit, NodeTypes::new(Language::Python));
        let string = find(tree.root_node(), "string").unwrap();
        let expr = reader.read(string);
        match &expr.shape {
            ExprShape::Interpolation { literals, dynamic } => {
                assert_eq!(*dynamic, 1);
                assert!(literals[0].starts_with("SELECT"));
            }
            other => panic!("unexpected shape {other:?}"),
        }
        assert_eq!(expr.identifiers, vec!["uid".to_string()]);
    }

    #[test]
    fn test_plain_string_is_literal() {
        let (unit, tree) = parse(Language::Python, "x = 'hello'\n");
        let reader = ExprReader::new(&unit, NodeTypes::new(Language::Python));
        let string = find(tree.root_node(), "string").unwrap();
        assert_eq!(reader.read(string).string_value(), Some("hello"));
    }

    #[test]
    fn test_go_sprintf_is_interpolation() {
        let (unit, tree) = parse(
            Language::Go,
            "package main\nfunc f(id string) { q := fmt.Sprintf(\"SELECT %s\", id) }\n",
        );
        let reader = ExprReader::new(&unit, NodeTypes::new(Language::Go));
        let call = find(tree.root_node(), "call_expression").unwrap();
        let expr = reader.read(call);
        assert!(expr.is_dynamic_string());
    }

    #[test]
    fn test_call_site_receiver() {
        let (unit, tree) = parse(
            Language::JavaScript,
            "db.query('SELECT 1', params);",
        );
        let reader = ExprReader::new(&unit, NodeTypes::new(Language::JavaScript));
        let call = find(tree.root_node(), "call_expression").unwrap();
        let site = reader.call_site(call).unwrap();
        assert_eq!(site.callee, "query");
        assert_eq!(site.receiver.as_deref(), Some("db"));
        assert_eq!(site.path, "db.query");
        assert_eq!(site.arguments.len(), 2);
    }

    #[test]
    fn test_java_constructor_call_site() {
        let (unit, tree) = parse(
            Language::Java,
            "class A { void f() { r = new BufferedReader(new FileReader(path)); } }",
        );
        let reader = ExprReader::new(&unit, NodeTypes::new(Language::Java));
        let call = find(tree.root_node(), "object_creation_expression").unwrap();
        let site = reader.call_site(call).unwrap();
        assert!(site.constructor);
        assert_eq!(site.callee, "BufferedReader");
        assert!(matches!(
            site.arguments[0].value.shape,
            ExprShape::Construct { ref type_name } if type_name == "FileReader"
        ));
    }

    #[test]
    fn test_python_keyword_arguments() {
        let (unit, tree) = parse(Language::Python, "subprocess.run(cmd, shell=True)\n");
        let reader = ExprReader::new(&unit, NodeTypes::new(Language::Python));
        let call = find(tree.root_node(), "call").unwrap();
        let site = reader.call_site(call).unwrap();
        assert_eq!(site.callee, "run");
        assert_eq!(site.arguments[1].keyword.as_deref(), Some("shell"));
        assert_eq!(site.arguments[1].value.shape, ExprShape::Constant);
    }

    #[test]
    fn test_long_plus_chain_is_flattened() {
        let text = format!("q = \"a\"{}\n", " + b".repeat(50_000));
        let (unit, tree) = parse(Language::Python, &text);
        let reader = ExprReader::new(&unit, NodeTypes::new(Language::Python));
        let binary = find(tree.root_node(), "binary_operator").unwrap();
        let expr = reader.read(binary);
        assert_eq!(
            expr.shape,
            ExprShape::Concatenation {
                literals: vec!["a".to_string()],
                dynamic: 50_000
            }
        );
        assert_eq!(expr.identifiers.len(), 50_000);
        assert!(!reader.truncated());
    }

    #[test]
    fn test_deeply_nested_calls_are_cut_off() {
        let depth = 200;
        let text = format!("x = {}y{}\n", "f(".repeat(depth), ")".repeat(depth));
        let (unit, tree) = parse(Language::Python, &text);
        let reader = ExprReader::new(&unit, NodeTypes::new(Language::Python));
        let call = find(tree.root_node(), "call").unwrap();
        let expr = reader.read(call);
        assert!(matches!(expr.shape, ExprShape::Call { ref callee, .. } if callee == "f"));
        assert_eq!(expr.identifiers.len(), depth + 1);
        assert!(reader.truncated());
    }

    #[test]
    fn test_python_list_literal() {
        let (unit, tree) = parse(Language::Python, "xs = [1, 2, 3]\n");
        let reader = ExprReader::new(&unit, NodeTypes::new(Language::Python));
        let list = find(tree.root_node(), "list").unwrap();
        assert_eq!(
            reader.read(list).shape,
            ExprShape::Collection {
                kind: CollectionKind::List,
                elements: 3
            }
        );
    }
}
