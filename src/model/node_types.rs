use crate::source::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    Comment,
    StringLiteral,
    NumberLiteral,
    ConstantLiteral,
    Identifier,
    BinaryExpression,
    ComparisonExpression,
    CallExpression,
    NewExpression,
    SelectorExpression,
    IndexExpression,
    CollectionLiteral,
    Interpolation,
    FunctionDeclaration,
    TypeDeclaration,
    VariableDeclarator,
    Assignment,
    AugmentedAssignment,
    KeywordArgument,
    Block,
    IfStatement,
    SwitchStatement,
    Loop,
    TryStatement,
    CatchClause,
    FinallyClause,
    ScopedResource,
    DeferStatement,
    ReturnStatement,
    ThrowStatement,
    Decorator,
}

/// Categories the structural builder dispatches on, in lookup order.
const STRUCTURAL: &[NodeCategory] = &[
    NodeCategory::FunctionDeclaration,
    NodeCategory::TypeDeclaration,
    NodeCategory::CallExpression,
    NodeCategory::NewExpression,
    NodeCategory::IfStatement,
    NodeCategory::SwitchStatement,
    NodeCategory::Loop,
    NodeCategory::TryStatement,
    NodeCategory::CatchClause,
    NodeCategory::FinallyClause,
    NodeCategory::ScopedResource,
    NodeCategory::DeferStatement,
    NodeCategory::VariableDeclarator,
    NodeCategory::Assignment,
    NodeCategory::AugmentedAssignment,
    NodeCategory::KeywordArgument,
    NodeCategory::ComparisonExpression,
    NodeCategory::ReturnStatement,
    NodeCategory::ThrowStatement,
    NodeCategory::Block,
];

/// Grammar node kinds per language, grouped by what they mean to the model.
#[derive(Debug, Clone, Copy)]
pub struct NodeTypes {
    language: Language,
}

impl NodeTypes {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn is_category(&self, kind: &str, category: NodeCategory) -> bool {
        self.get_node_types(category).contains(&kind)
    }

    /// First structural category `kind` belongs to, if any.
    pub fn structural_category(&self, kind: &str) -> Option<NodeCategory> {
        STRUCTURAL
            .iter()
            .copied()
            .find(|category| self.is_category(kind, *category))
    }

    /// Kinds that are emitted as a single token regardless of their children.
    pub fn is_atomic_token(&self, kind: &str) -> bool {
        self.is_category(kind, NodeCategory::StringLiteral)
            || self.is_category(kind, NodeCategory::Comment)
    }

    pub fn get_node_types(&self, category: NodeCategory) -> &'static [&'static str] {
        match category {
            NodeCategory::Comment => self.comment_types(),
            NodeCategory::StringLiteral => self.string_literal_types(),
            NodeCategory::NumberLiteral => self.number_literal_types(),
            NodeCategory::ConstantLiteral => self.constant_literal_types(),
            NodeCategory::Identifier => self.identifier_types(),
            NodeCategory::BinaryExpression => self.binary_expression_types(),
            NodeCategory::ComparisonExpression => self.comparison_expression_types(),
            NodeCategory::CallExpression => self.call_expression_types(),
            NodeCategory::NewExpression => self.new_expression_types(),
            NodeCategory::SelectorExpression => self.selector_expression_types(),
            NodeCategory::IndexExpression => self.index_expression_types(),
            NodeCategory::CollectionLiteral => self.collection_literal_types(),
            NodeCategory::Interpolation => self.interpolation_types(),
            NodeCategory::FunctionDeclaration => self.function_declaration_types(),
            NodeCategory::TypeDeclaration => self.type_declaration_types(),
            NodeCategory::VariableDeclarator => self.variable_declarator_types(),
            NodeCategory::Assignment => self.assignment_types(),
            NodeCategory::AugmentedAssignment => self.augmented_assignment_types(),
            NodeCategory::KeywordArgument => self.keyword_argument_types(),
            NodeCategory::Block => self.block_types(),
            NodeCategory::IfStatement => self.if_statement_types(),
            NodeCategory::SwitchStatement => self.switch_statement_types(),
            NodeCategory::Loop => self.loop_types(),
            NodeCategory::TryStatement => self.try_statement_types(),
            NodeCategory::CatchClause => self.catch_clause_types(),
            NodeCategory::FinallyClause => self.finally_clause_types(),
            NodeCategory::ScopedResource => self.scoped_resource_types(),
            NodeCategory::DeferStatement => self.defer_statement_types(),
            NodeCategory::ReturnStatement => self.return_statement_types(),
            NodeCategory::ThrowStatement => self.throw_statement_types(),
            NodeCategory::Decorator => self.decorator_types(),
        }
    }

    fn comment_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java | Language::Rust => &["line_comment", "block_comment"],
            Language::Python | Language::Go => &["comment"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                &["comment", "html_comment"]
            }
        }
    }

    fn string_literal_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["string_literal", "character_literal", "text_block"],
            Language::Python => &["string", "concatenated_string"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                &["string", "template_string", "regex"]
            }
            Language::Go => &[
                "interpreted_string_literal",
                "raw_string_literal",
                "rune_literal",
            ],
            Language::Rust => &["string_literal", "raw_string_literal", "char_literal"],
        }
    }

    fn number_literal_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &[
                "decimal_integer_literal",
                "hex_integer_literal",
                "octal_integer_literal",
                "binary_integer_literal",
                "decimal_floating_point_literal",
                "hex_floating_point_literal",
            ],
            Language::Python => &["integer", "float"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &["number"],
            Language::Go => &["int_literal", "float_literal", "imaginary_literal"],
            Language::Rust => &["integer_literal", "float_literal"],
        }
    }

    fn constant_literal_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["true", "false", "null_literal"],
            Language::Python => &["true", "false", "none"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                &["true", "false", "null", "undefined"]
            }
            Language::Go => &["true", "false", "nil", "iota"],
            Language::Rust => &["boolean_literal"],
        }
    }

    fn identifier_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["identifier", "type_identifier"],
            Language::Python => &["identifier"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &[
                "identifier",
                "property_identifier",
                "shorthand_property_identifier",
                "type_identifier",
            ],
            Language::Go => &[
                "identifier",
                "field_identifier",
                "package_identifier",
                "type_identifier",
            ],
            Language::Rust => &[
                "identifier",
                "field_identifier",
                "type_identifier",
                "primitive_type",
            ],
        }
    }

    fn binary_expression_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Python => &["binary_operator", "boolean_operator"],
            _ => &["binary_expression"],
        }
    }

    fn comparison_expression_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Python => &["comparison_operator"],
            _ => &[],
        }
    }

    fn call_expression_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["method_invocation"],
            Language::Python => &["call"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &["call_expression"],
            Language::Go => &["call_expression"],
            Language::Rust => &["call_expression", "macro_invocation"],
        }
    }

    fn new_expression_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["object_creation_expression"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &["new_expression"],
            Language::Go => &["composite_literal"],
            Language::Rust => &["struct_expression"],
            Language::Python => &[],
        }
    }

    fn selector_expression_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["field_access"],
            Language::Python => &["attribute"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &["member_expression"],
            Language::Go => &["selector_expression"],
            Language::Rust => &["field_expression", "scoped_identifier"],
        }
    }

    fn index_expression_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["array_access"],
            Language::Python => &["subscript"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                &["subscript_expression"]
            }
            Language::Go | Language::Rust => &["index_expression"],
        }
    }

    fn collection_literal_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["array_initializer", "array_creation_expression"],
            Language::Python => &[
                "list",
                "tuple",
                "set",
                "dictionary",
                "list_comprehension",
                "set_comprehension",
                "dictionary_comprehension",
            ],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &["array", "object"],
            Language::Go => &[],
            Language::Rust => &["array_expression", "tuple_expression"],
        }
    }

    fn interpolation_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Python => &["interpolation"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                &["template_substitution"]
            }
            _ => &[],
        }
    }

    fn function_declaration_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["method_declaration", "constructor_declaration"],
            Language::Python => &["function_definition"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &[
                "function_declaration",
                "generator_function_declaration",
                "function_expression",
                "function",
                "method_definition",
                "arrow_function",
            ],
            Language::Go => &["function_declaration", "method_declaration", "func_literal"],
            Language::Rust => &["function_item"],
        }
    }

    fn type_declaration_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &[
                "class_declaration",
                "interface_declaration",
                "enum_declaration",
                "record_declaration",
            ],
            Language::Python => &["class_definition"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &[
                "class_declaration",
                "class",
                "abstract_class_declaration",
                "interface_declaration",
            ],
            Language::Go => &["type_spec"],
            Language::Rust => &["struct_item", "enum_item"],
        }
    }

    fn variable_declarator_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["variable_declarator"],
            Language::Python => &[],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &[
                "variable_declarator",
                "public_field_definition",
                "field_definition",
            ],
            Language::Go => &["var_spec", "const_spec", "short_var_declaration"],
            Language::Rust => &["let_declaration", "static_item", "const_item"],
        }
    }

    fn assignment_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["assignment_expression"],
            Language::Python => &["assignment"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                &["assignment_expression"]
            }
            Language::Go => &["assignment_statement"],
            Language::Rust => &["assignment_expression"],
        }
    }

    fn augmented_assignment_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Python => &["augmented_assignment"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                &["augmented_assignment_expression"]
            }
            Language::Rust => &["compound_assignment_expr"],
            // Java and Go share one node for `=` and `+=`; the operator tells them apart.
            Language::Java | Language::Go => &[],
        }
    }

    fn keyword_argument_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Python => &["keyword_argument"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &["pair"],
            Language::Go => &["keyed_element"],
            Language::Rust => &["field_initializer"],
            Language::Java => &[],
        }
    }

    fn block_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["block", "constructor_body"],
            Language::Python => &["block"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &["statement_block"],
            Language::Go => &["block"],
            Language::Rust => &["block"],
        }
    }

    fn if_statement_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Python => &["if_statement", "elif_clause"],
            Language::Rust => &["if_expression"],
            _ => &["if_statement"],
        }
    }

    fn switch_statement_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["switch_expression", "switch_statement"],
            Language::Python => &["match_statement"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &["switch_statement"],
            Language::Go => &[
                "expression_switch_statement",
                "type_switch_statement",
                "select_statement",
            ],
            Language::Rust => &["match_expression"],
        }
    }

    fn loop_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &[
                "for_statement",
                "enhanced_for_statement",
                "while_statement",
                "do_statement",
            ],
            Language::Python => &["for_statement", "while_statement"],
            Language::JavaScript | Language::TypeScript | Language::Tsx => &[
                "for_statement",
                "for_in_statement",
                "while_statement",
                "do_statement",
            ],
            Language::Go => &["for_statement"],
            Language::Rust => &["for_expression", "while_expression", "loop_expression"],
        }
    }

    fn try_statement_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["try_statement", "try_with_resources_statement"],
            Language::Python | Language::JavaScript | Language::TypeScript | Language::Tsx => {
                &["try_statement"]
            }
            Language::Go | Language::Rust => &[],
        }
    }

    fn catch_clause_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java | Language::JavaScript | Language::TypeScript | Language::Tsx => {
                &["catch_clause"]
            }
            Language::Python => &["except_clause", "except_group_clause"],
            Language::Go | Language::Rust => &[],
        }
    }

    fn finally_clause_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Go | Language::Rust => &[],
            _ => &["finally_clause"],
        }
    }

    fn scoped_resource_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Python => &["with_statement"],
            _ => &[],
        }
    }

    fn defer_statement_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Go => &["defer_statement"],
            _ => &[],
        }
    }

    fn return_statement_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Rust => &["return_expression"],
            _ => &["return_statement"],
        }
    }

    fn throw_statement_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Python => &["raise_statement"],
            Language::Go | Language::Rust => &[],
            _ => &["throw_statement"],
        }
    }

    fn decorator_types(&self) -> &'static [&'static str] {
        match self.language {
            Language::Java => &["marker_annotation", "annotation"],
            Language::Python | Language::JavaScript | Language::TypeScript | Language::Tsx => {
                &["decorator"]
            }
            Language::Rust => &["attribute_item"],
            Language::Go => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_string_literal() {
        let java = NodeTypes::new(Language::Java);
        assert!(java.is_category("string_literal", NodeCategory::StringLiteral));
        assert!(java.is_category("text_block", NodeCategory::StringLiteral));

        let python = NodeTypes::new(Language::Python);
        assert!(python.is_category("string", NodeCategory::StringLiteral));

        let js = NodeTypes::new(Language::JavaScript);
        assert!(js.is_category("template_string", NodeCategory::StringLiteral));

        let go = NodeTypes::new(Language::Go);
        assert!(go.is_category("raw_string_literal", NodeCategory::StringLiteral));
    }

    #[test]
    fn test_call_expression_kinds() {
        let java = NodeTypes::new(Language::Java);
        assert!(java.is_category("method_invocation", NodeCategory::CallExpression));
        assert!(!java.is_category("call_expression", NodeCategory::CallExpression));

        let python = NodeTypes::new(Language::Python);
        assert!(python.is_category("call", NodeCategory::CallExpression));

        let rust = NodeTypes::new(Language::Rust);
        assert!(rust.is_category("macro_invocation", NodeCategory::CallExpression));
    }

    #[test]
    fn test_try_kinds_absent_for_go_and_rust() {
        for language in [Language::Go, Language::Rust] {
            let types = NodeTypes::new(language);
            assert!(types.get_node_types(NodeCategory::TryStatement).is_empty());
            assert!(types.get_node_types(NodeCategory::CatchClause).is_empty());
        }
        let go = NodeTypes::new(Language::Go);
        assert!(go.is_category("defer_statement", NodeCategory::DeferStatement));
    }

    #[test]
    fn test_typescript_shares_javascript_tables() {
        let ts = NodeTypes::new(Language::TypeScript);
        let tsx = NodeTypes::new(Language::Tsx);
        assert!(ts.is_category("arrow_function", NodeCategory::FunctionDeclaration));
        assert!(tsx.is_category("for_in_statement", NodeCategory::Loop));
    }

    #[test]
    fn test_structural_category_prefers_declarations() {
        let python = NodeTypes::new(Language::Python);
        assert_eq!(
            python.structural_category("function_definition"),
            Some(NodeCategory::FunctionDeclaration)
        );
        assert_eq!(
            python.structural_category("elif_clause"),
            Some(NodeCategory::IfStatement)
        );
        assert_eq!(python.structural_category("identifier"), None);
    }

    #[test]
    fn test_atomic_tokens() {
        let java = NodeTypes::new(Language::Java);
        assert!(java.is_atomic_token("block_comment"));
        assert!(java.is_atomic_token("string_literal"));
        assert!(!java.is_atomic_token("identifier"));
    }
}
