//! Name resolution and type descriptors for PHP declarations

use std::collections::HashMap;

use tree_sitter::Node;

use crate::store::{Document, NodeId};

/// Types that are written as `const` descriptors instead of class names
const BUILTIN_TYPES: &[&str] = &[
    "array", "bool", "callable", "false", "float", "int", "iterable", "mixed", "never", "null",
    "object", "string", "true", "void",
];

/// Names that refer to the enclosing class and are kept verbatim
const RELATIVE_NAMES: &[&str] = &["self", "static", "parent"];

/// Current namespace and `use` imports of a PHP file
#[derive(Debug, Clone, Default)]
pub struct NameScope {
    namespace: String,
    /// Lowercased alias -> fully-qualified name
    imports: HashMap<String, String>,
}

impl NameScope {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.trim_matches('\\').to_string(),
            imports: HashMap::new(),
        }
    }

    pub fn import(&mut self, alias: &str, fqn: &str) {
        self.imports
            .insert(alias.to_lowercase(), fqn.trim_start_matches('\\').to_string());
    }

    /// Fully-qualified name of a declaration made in this scope
    pub fn qualify(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}\\{}", self.namespace, name)
        }
    }

    /// Fully-qualified name of a class referenced from this scope
    pub fn resolve(&self, name: &str) -> String {
        let name = name.trim();
        if let Some(absolute) = name.strip_prefix('\\') {
            return absolute.to_string();
        }
        if RELATIVE_NAMES.iter().any(|r| r.eq_ignore_ascii_case(name)) {
            return name.to_string();
        }
        if let Some(rest) = name.strip_prefix("namespace\\") {
            return self.qualify(rest);
        }

        let (first, rest) = match name.split_once('\\') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };
        match (self.imports.get(&first.to_lowercase()), rest) {
            (Some(target), Some(rest)) => format!("{}\\{}", target, rest),
            (Some(target), None) => target.clone(),
            (None, _) => self.qualify(name),
        }
    }
}

/// Append descriptors for the type expression `node` under `parent`:
/// `nullable` for `?T`, `const` for built-in types, `named` for classes.
/// Union and intersection members are appended in source order.
pub fn append_type(doc: &mut Document, parent: NodeId, node: Node, source: &[u8], scope: &NameScope) {
    match node.kind() {
        "optional_type" => {
            doc.add_element(parent, "nullable");
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                append_type(doc, parent, child, source, scope);
            }
        }
        "named_type" | "primitive_type" | "bottom_type" | "name" | "qualified_name" | "relative_scope" => {
            let text = node.utf8_text(source).unwrap_or_default().trim();
            let lower = text.to_lowercase();
            if BUILTIN_TYPES.contains(&lower.as_str()) {
                doc.add_child(parent, "const", [("name", lower)]);
            } else {
                doc.add_child(parent, "named", [("name", scope.resolve(text))]);
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                append_type(doc, parent, child, source, scope);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify() {
        assert_eq!(NameScope::default().qualify("A"), "A");
        assert_eq!(NameScope::new("App\\Model").qualify("User"), "App\\Model\\User");
    }

    #[test]
    fn test_resolve_against_imports_and_namespace() {
        let mut scope = NameScope::new("App");
        scope.import("Http", "\\Vendor\\Http");
        scope.import("Client", "Vendor\\Http\\Client");

        assert_eq!(scope.resolve("\\Countable"), "Countable");
        assert_eq!(scope.resolve("client"), "Vendor\\Http\\Client");
        assert_eq!(scope.resolve("Http\\Request"), "Vendor\\Http\\Request");
        assert_eq!(scope.resolve("Local"), "App\\Local");
        assert_eq!(scope.resolve("Sub\\Local"), "App\\Sub\\Local");
        assert_eq!(scope.resolve("namespace\\Local"), "App\\Local");
        assert_eq!(scope.resolve("self"), "self");
        assert_eq!(scope.resolve("Parent"), "Parent");
    }
}
