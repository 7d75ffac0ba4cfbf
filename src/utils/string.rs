use std::collections::HashMap;

/// Strips quotes from a literal's source text, including Python string
/// prefixes, triple quotes, Java text blocks and Rust raw strings.
pub fn unquote_string(s: &str) -> String {
    let s = s.trim();
    let s = strip_literal_prefix(s);

    for fence in ["\"\"\"", "'''"] {
        if s.len() >= 6 && s.starts_with(fence) && s.ends_with(fence) {
            return s[3..s.len() - 3].to_string();
        }
    }

    if let Some(raw) = s.strip_prefix('r') {
        let hashes = raw.chars().take_while(|c| *c == '#').count();
        let closing = format!("\"{}", "#".repeat(hashes));
        let body = &raw[hashes..];
        if hashes > 0 && body.starts_with('"') && body.ends_with(&closing) {
            return body[1..body.len() - closing.len()].to_string();
        }
    }

    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\''))
            || (s.starts_with('`') && s.ends_with('`')))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

fn strip_literal_prefix(s: &str) -> &str {
    let prefix_len = s
        .chars()
        .take_while(|c| matches!(c, 'r' | 'R' | 'b' | 'B' | 'f' | 'F' | 'u' | 'U'))
        .count();
    if prefix_len > 0 && prefix_len <= 2 {
        let rest = &s[prefix_len..];
        if rest.starts_with('"') || rest.starts_with('\'') {
            return rest;
        }
    }
    s
}

pub fn extract_last_segment(path: &str) -> String {
    path.rsplit(['/', '.', ':'])
        .next()
        .unwrap_or(path)
        .to_string()
}

/// Drops generic arguments and array suffixes: `List<String>[]` -> `List`.
pub fn strip_generics(type_name: &str) -> &str {
    let end = type_name.find(['<', '[']).unwrap_or(type_name.len());
    type_name[..end].trim()
}

/// Lowercases and removes `_`/`-` so `API_KEY`, `apiKey` and `api-key` compare equal.
pub fn normalize_identifier(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Shannon entropy in bits per character.
pub fn shannon_entropy(s: &str) -> f64 {
    let total = s.chars().count();
    if total == 0 {
        return 0.0;
    }
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *counts.entry(c).or_insert(0) += 1;
    }
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote_double_quotes() {
        assert_eq!(unquote_string("\"hello\""), "hello");
    }

    #[test]
    fn test_unquote_single_quotes() {
        assert_eq!(unquote_string("'hello'"), "hello");
    }

    #[test]
    fn test_unquote_backticks() {
        assert_eq!(unquote_string("`hello`"), "hello");
    }

    #[test]
    fn test_unquote_no_quotes() {
        assert_eq!(unquote_string("hello"), "hello");
    }

    #[test]
    fn test_unquote_prefixed_and_fenced() {
        assert_eq!(unquote_string("f\"x={x}\""), "x={x}");
        assert_eq!(unquote_string("rb'raw'"), "raw");
        assert_eq!(unquote_string("\"\"\"doc\"\"\""), "doc");
        assert_eq!(unquote_string("r#\"a \"b\"\"#"), "a \"b\"");
    }

    #[test]
    fn test_extract_last_segment() {
        assert_eq!(extract_last_segment("crypto/md5"), "md5");
        assert_eq!(extract_last_segment("std::collections::HashMap"), "HashMap");
        assert_eq!(extract_last_segment("hashlib.md5"), "md5");
        assert_eq!(extract_last_segment("hashlib"), "hashlib");
    }

    #[test]
    fn test_strip_generics() {
        assert_eq!(strip_generics("List<String>"), "List");
        assert_eq!(strip_generics("int[]"), "int");
        assert_eq!(strip_generics("ArrayList"), "ArrayList");
    }

    #[test]
    fn test_normalize_identifier() {
        assert_eq!(normalize_identifier("API_KEY"), "apikey");
        assert_eq!(normalize_identifier("apiKey"), "apikey");
        assert_eq!(normalize_identifier("db-password"), "dbpassword");
    }

    #[test]
    fn test_shannon_entropy() {
        assert_eq!(shannon_entropy(""), 0.0);
        assert_eq!(shannon_entropy("aaaa"), 0.0);
        assert!((shannon_entropy("abcd") - 2.0).abs() < 1e-9);
        assert!(shannon_entropy("sk-1234567890abcdef") > 3.0);
    }
}
