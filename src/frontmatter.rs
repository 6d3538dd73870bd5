//! YAML frontmatter handling for vault notes.
//!
//! Splits a note into its metadata block and body, parses the block into an
//! order-preserving mapping, and reassembles the two without disturbing
//! unrelated content. Malformed frontmatter yields "no data" instead of an
//! error; callers decide whether that is fatal.

use serde_yaml::{Mapping, Value};

const DELIMITER: &str = "---";

/// Split note text into a raw frontmatter block and body.
///
/// The block must start on the first line. Returns `None` when there is no
/// well-delimited block at all.
pub fn split(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix(DELIMITER)?;
    let rest = rest.strip_prefix('\n').or_else(|| {
        rest.strip_prefix("\r\n")
    })?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let block = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((block, body));
        }
        offset += line.len();
    }
    None
}

/// Parse note text into (frontmatter mapping, body).
///
/// Returns `(None, full_text)` when the note has no frontmatter block or the
/// block is not valid YAML.
pub fn parse(text: &str) -> (Option<Mapping>, &str) {
    match split(text) {
        Some((block, body)) => match serde_yaml::from_str::<Value>(block) {
            Ok(Value::Mapping(mapping)) => (Some(mapping), body),
            _ => (None, text),
        },
        None => (None, text),
    }
}

/// Reassemble a note from a frontmatter mapping and body.
///
/// `serde_yaml::Mapping` preserves insertion order, so a parse/update/dump
/// round trip keeps fields where the author put them.
pub fn dump(frontmatter: &Mapping, body: &str) -> String {
    let yaml = serde_yaml::to_string(frontmatter).unwrap_or_default();
    let body = body.trim_start_matches('\n');
    format!("{DELIMITER}\n{yaml}{DELIMITER}\n\n{body}")
}

/// Fetch a string-valued field, stringifying scalars like dates and numbers.
pub fn get_str(frontmatter: &Mapping, key: &str) -> Option<String> {
    match frontmatter.get(Value::from(key))? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Fetch a list-valued field as strings, skipping non-scalar entries.
pub fn get_str_list(frontmatter: &Mapping, key: &str) -> Option<Vec<String>> {
    match frontmatter.get(Value::from(key))? {
        Value::Sequence(items) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}

/// True when the field exists at all, regardless of shape.
pub fn has_key(frontmatter: &Mapping, key: &str) -> bool {
    frontmatter.contains_key(Value::from(key))
}

pub fn set_str(frontmatter: &mut Mapping, key: &str, value: &str) {
    frontmatter.insert(Value::from(key), Value::from(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: &str = "---\nid: algo-001\ntitle: Hash Map / Хеш-таблица\nsubtopics:\n  - hashing\n---\n\n# Question (EN)\n\n> What is a hash map?\n";

    #[test]
    fn test_split_extracts_block_and_body() {
        let (block, body) = split(NOTE).unwrap();
        assert!(block.contains("id: algo-001"));
        assert!(body.contains("# Question (EN)"));
    }

    #[test]
    fn test_parse_returns_mapping() {
        let (fm, body) = parse(NOTE);
        let fm = fm.unwrap();
        assert_eq!(get_str(&fm, "id").as_deref(), Some("algo-001"));
        assert_eq!(
            get_str_list(&fm, "subtopics").unwrap(),
            vec!["hashing".to_string()]
        );
        assert!(body.contains("hash map"));
    }

    #[test]
    fn test_parse_without_frontmatter() {
        let (fm, body) = parse("# Just a heading\n");
        assert!(fm.is_none());
        assert_eq!(body, "# Just a heading\n");
    }

    #[test]
    fn test_parse_unterminated_block() {
        let (fm, _) = parse("---\nid: algo-001\nno closing delimiter\n");
        assert!(fm.is_none());
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let (fm, body) = parse("---\n: [unbalanced\n---\nbody\n");
        assert!(fm.is_none());
        assert!(body.contains("body"));
    }

    #[test]
    fn test_dump_round_trip_preserves_field_order() {
        let (fm, body) = parse(NOTE);
        let dumped = dump(&fm.unwrap(), body);
        let id_pos = dumped.find("id:").unwrap();
        let title_pos = dumped.find("title:").unwrap();
        let sub_pos = dumped.find("subtopics:").unwrap();
        assert!(id_pos < title_pos && title_pos < sub_pos);
        assert!(dumped.contains("> What is a hash map?"));
    }

    #[test]
    fn test_set_str_updates_in_place() {
        let (fm, _) = parse(NOTE);
        let mut fm = fm.unwrap();
        set_str(&mut fm, "id", "algo-002");
        assert_eq!(get_str(&fm, "id").as_deref(), Some("algo-002"));
    }
}
