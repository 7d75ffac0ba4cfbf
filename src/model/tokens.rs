use tree_sitter::Node;

use super::node_types::{NodeCategory, NodeTypes};
use super::{Token, TokenKind};
use crate::source::SourceUnit;

/// Flattens the syntax tree into a token stream in source order.
///
/// String literals and comments become one token each, so rules that look at
/// identifiers never match text inside them. Zero-width nodes inserted by
/// error recovery are dropped.
pub fn tokenize(root: Node<'_>, unit: &SourceUnit, types: &NodeTypes) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cursor = root.walk();

    loop {
        let node = cursor.node();
        let atomic = types.is_atomic_token(node.kind());

        if node.start_byte() < node.end_byte() && !node.is_missing() {
            if atomic {
                tokens.push(make_token(node, unit, types, true));
            } else if node.child_count() == 0 {
                tokens.push(make_token(node, unit, types, false));
            }
        }

        if !atomic && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return tokens;
            }
        }
    }
}

fn make_token(node: Node<'_>, unit: &SourceUnit, types: &NodeTypes, atomic: bool) -> Token {
    let span = unit.span(node.start_byte(), node.end_byte());
    let text = unit.slice(&span).to_string();
    let kind = if atomic {
        if types.is_category(node.kind(), NodeCategory::Comment) {
            TokenKind::Comment
        } else {
            TokenKind::StringLiteral
        }
    } else {
        classify_leaf(node, &text, types)
    };
    Token { kind, text, span }
}

fn classify_leaf(node: Node<'_>, text: &str, types: &NodeTypes) -> TokenKind {
    let kind = node.kind();
    if types.is_category(kind, NodeCategory::NumberLiteral) {
        return TokenKind::NumericLiteral;
    }
    if types.is_category(kind, NodeCategory::ConstantLiteral) {
        return TokenKind::Keyword;
    }
    if types.is_category(kind, NodeCategory::Comment) {
        return TokenKind::Comment;
    }
    if types.is_category(kind, NodeCategory::StringLiteral) {
        return TokenKind::StringLiteral;
    }
    if !is_word(text) {
        return TokenKind::Operator;
    }
    if node.is_named() || types.is_category(kind, NodeCategory::Identifier) {
        TokenKind::Identifier
    } else {
        TokenKind::Keyword
    }
}

fn is_word(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Language;
    use tree_sitter::Parser;

    fn tokens_for(language: Language, text: &str) -> Vec<Token> {
        let unit = SourceUnit::new("t", language, text);
        let mut parser = Parser::new();
        parser.set_language(&language.grammar()).unwrap();
        let tree = parser.parse(text, None).unwrap();
        tokenize(tree.root_node(), &unit, &NodeTypes::new(language))
    }

    #[test]
    fn test_string_literal_is_one_token() {
        let tokens = tokens_for(Language::Java, "class A { String s = \"a b c\"; }");
        let strings: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::StringLiteral)
            .collect();
        assert_eq!(strings.len(), 1);
        assert_eq!(strings[0].text, "\"a b c\"");
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = tokens_for(Language::Python, "def run(x):\n    return x + 1\n");
        let kinds: Vec<_> = tokens.iter().map(|t| (t.kind, t.text.as_str())).collect();
        assert!(kinds.contains(&(TokenKind::Keyword, "def")));
        assert!(kinds.contains(&(TokenKind::Identifier, "run")));
        assert!(kinds.contains(&(TokenKind::Keyword, "return")));
        assert!(kinds.contains(&(TokenKind::Operator, "+")));
        assert!(kinds.contains(&(TokenKind::NumericLiteral, "1")));
    }

    #[test]
    fn test_comment_token_hides_contents() {
        let tokens = tokens_for(Language::Go, "package main\n// password := \"x\"\n");
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Comment));
        assert!(!tokens
            .iter()
            .any(|t| t.kind == TokenKind::Identifier && t.text == "password"));
    }

    #[test]
    fn test_tokens_are_in_source_order() {
        let tokens = tokens_for(Language::JavaScript, "let a = b.c(1, 'x');");
        let starts: Vec<_> = tokens.iter().map(|t| t.span.start_byte).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);
        assert_eq!(tokens[0].span.start_line, 1);
        assert_eq!(tokens[0].span.start_column, 1);
    }
}
