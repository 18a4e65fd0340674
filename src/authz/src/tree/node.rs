//! Permission node string parsing
//!
//! A node string is a dot-separated path. The terminal segment decides the
//! node flavour:
//! - `towny.chat.*` (wildcard, non-leaf, grants every descendant)
//! - `towny.chat.town` (plain leaf)
//! - `towny.wild.build.<x>` (leaf carrying a payload)

use crate::error::{AuthzError, Result};

/// Node string of the implicit tree root
pub const ROOT_NODE: &str = "*";

/// Terminal segment of a payload leaf
pub const PAYLOAD_SEGMENT: &str = "<x>";

const SEPARATOR: char = '.';
const WILDCARD: &str = "*";

/// Parsed registration request for a single node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    /// Full node id, e.g. `towny.chat.*`
    pub id: String,
    /// Segments leading from the root to the parent wildcard
    pub parent_path: Vec<String>,
    /// Name of this node below its parent (`chat`, `town`, `<x>`)
    pub key: String,
    /// Whether the node is a leaf
    pub is_leaf: bool,
    /// Whether the node requires a payload
    pub has_payload: bool,
}

impl NodeSpec {
    /// Parses a node string for registration
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidNode`] for empty strings or segments,
    /// wildcards or payload placeholders anywhere but in the last segment,
    /// and payload placeholders other than `<x>`.
    pub fn parse(node: &str) -> Result<Self> {
        let invalid = |reason: &str| AuthzError::InvalidNode {
            node: node.to_string(),
            reason: reason.to_string(),
        };

        if node.is_empty() {
            return Err(invalid("node cannot be empty"));
        }
        if node == ROOT_NODE {
            return Err(AuthzError::DuplicateNode {
                node: node.to_string(),
            });
        }

        let segments: Vec<&str> = node.split(SEPARATOR).collect();
        let (last, body) = match segments.split_last() {
            Some(split) => split,
            None => return Err(invalid("node cannot be empty")),
        };

        for segment in body {
            validate_literal(segment).map_err(|reason| invalid(&reason))?;
        }

        let spec = match *last {
            WILDCARD => {
                let (key, parent_path) = match body.split_last() {
                    Some(split) => split,
                    None => return Err(invalid("a wildcard needs at least one named segment")),
                };
                Self {
                    id: node.to_string(),
                    parent_path: to_owned(parent_path),
                    key: key.to_string(),
                    is_leaf: false,
                    has_payload: false,
                }
            }
            PAYLOAD_SEGMENT => Self {
                id: node.to_string(),
                parent_path: to_owned(body),
                key: PAYLOAD_SEGMENT.to_string(),
                is_leaf: true,
                has_payload: true,
            },
            segment if segment.starts_with('<') && segment.ends_with('>') => {
                return Err(invalid("payload placeholders must be written as `<x>`"));
            }
            segment => {
                validate_literal(segment).map_err(|reason| invalid(&reason))?;
                Self {
                    id: node.to_string(),
                    parent_path: to_owned(body),
                    key: segment.to_string(),
                    is_leaf: true,
                    has_payload: false,
                }
            }
        };

        Ok(spec)
    }

    /// Node id of the wildcard this node hangs below
    pub fn parent_id(&self) -> String {
        wildcard_id(&self.parent_path)
    }
}

/// Node id of the wildcard for a segment path (`[]` is the root)
pub fn wildcard_id(path: &[String]) -> String {
    if path.is_empty() {
        ROOT_NODE.to_string()
    } else {
        format!("{}{}{}", path.join("."), SEPARATOR, WILDCARD)
    }
}

/// Splits a possibly payload-bearing node string
///
/// `towny.wild.build.<dirt>` becomes (`towny.wild.build.<x>`, `Some("dirt")`).
/// Node segments never contain `<`, so the first `<` opening the terminal
/// segment starts the payload, which may itself contain dots.
pub fn split_payload(node: &str) -> (String, Option<String>) {
    if node.ends_with('>') {
        if let Some(pos) = node.find('<') {
            let at_segment_start = pos == 0 || node[..pos].ends_with(SEPARATOR);
            if at_segment_start && pos + 1 < node.len() {
                let payload = &node[pos + 1..node.len() - 1];
                return (
                    format!("{}{}", &node[..pos], PAYLOAD_SEGMENT),
                    Some(payload.to_string()),
                );
            }
        }
    }
    (node.to_string(), None)
}

/// Joins a payload leaf id with a concrete payload
pub fn embed_payload(node: &str, payload: &str) -> String {
    match node.strip_suffix(PAYLOAD_SEGMENT) {
        Some(prefix) => format!("{}<{}>", prefix, payload),
        None => node.to_string(),
    }
}

fn validate_literal(segment: &str) -> std::result::Result<(), String> {
    if segment.is_empty() {
        return Err("node segments cannot be empty".to_string());
    }
    if segment == WILDCARD {
        return Err("a wildcard can only appear as the last segment".to_string());
    }
    if segment == PAYLOAD_SEGMENT {
        return Err("a payload placeholder can only appear as the last segment".to_string());
    }
    if segment.contains(['*', '<', '>']) {
        return Err(format!("segment `{}` contains a reserved character", segment));
    }
    Ok(())
}

fn to_owned(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wildcard() {
        let spec = NodeSpec::parse("towny.chat.*").unwrap();
        assert_eq!(spec.key, "chat");
        assert_eq!(spec.parent_path, vec!["towny".to_string()]);
        assert_eq!(spec.parent_id(), "towny.*");
        assert!(!spec.is_leaf);
        assert!(!spec.has_payload);
    }

    #[test]
    fn test_parse_top_level_wildcard() {
        let spec = NodeSpec::parse("towny.*").unwrap();
        assert_eq!(spec.key, "towny");
        assert!(spec.parent_path.is_empty());
        assert_eq!(spec.parent_id(), ROOT_NODE);
    }

    #[test]
    fn test_parse_leaf_and_payload() {
        let leaf = NodeSpec::parse("towny.chat.town").unwrap();
        assert!(leaf.is_leaf && !leaf.has_payload);
        assert_eq!(leaf.parent_id(), "towny.chat.*");

        let payload = NodeSpec::parse("towny.wild.build.<x>").unwrap();
        assert!(payload.is_leaf && payload.has_payload);
        assert_eq!(payload.key, PAYLOAD_SEGMENT);
        assert_eq!(payload.parent_id(), "towny.wild.build.*");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "a..b", "*.a", "a.*.b", "a.<x>.b", "a.<y>", "a.b*", ".a"] {
            let result = NodeSpec::parse(bad);
            assert!(
                matches!(result, Err(AuthzError::InvalidNode { .. })),
                "expected `{}` to be rejected, got {:?}",
                bad,
                result
            );
        }
    }

    #[test]
    fn test_parse_root_is_duplicate() {
        assert!(matches!(
            NodeSpec::parse("*"),
            Err(AuthzError::DuplicateNode { .. })
        ));
    }

    #[test]
    fn test_split_payload() {
        assert_eq!(
            split_payload("towny.wild.build.<dirt>"),
            ("towny.wild.build.<x>".to_string(), Some("dirt".to_string()))
        );
        assert_eq!(
            split_payload("a.<v1.2>"),
            ("a.<x>".to_string(), Some("v1.2".to_string()))
        );
        assert_eq!(split_payload("towny.chat.town"), ("towny.chat.town".to_string(), None));
        assert_eq!(split_payload("a.*"), ("a.*".to_string(), None));
    }

    #[test]
    fn test_embed_payload() {
        assert_eq!(embed_payload("towny.wild.build.<x>", "gold"), "towny.wild.build.<gold>");
        assert_eq!(embed_payload("towny.chat.town", "gold"), "towny.chat.town");
    }
}
