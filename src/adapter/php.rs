//! PHP declaration extractor
//!
//! Parses a file with tree-sitter and records its classes, interfaces,
//! traits and functions. Class, interface and trait names, `extends`,
//! `implements`, trait `use` edges, attributes and type names are resolved to
//! fully-qualified names through the file's namespace and `use` imports.

use std::fs;
use std::path::Path;

use tree_sitter::{Node, Parser};

use super::framework::Extractor;
use super::types::{append_type, NameScope};
use crate::store::{Document, NodeId};
use crate::{Error, Result};

const MAGIC_METHODS: &[&str] = &[
    "__construct", "__destruct", "__call", "__callstatic", "__get", "__set", "__isset", "__unset",
    "__sleep", "__wakeup", "__serialize", "__unserialize", "__tostring", "__invoke", "__set_state",
    "__clone", "__debuginfo",
];

/// PHP extractor
#[derive(Debug, Default)]
pub struct PhpExtractor;

impl PhpExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for PhpExtractor {
    fn name(&self) -> &str {
        "php"
    }

    fn extensions(&self) -> &[&str] {
        &["php"]
    }

    fn extract(&self, path: &Path, doc: &mut Document, file_node: NodeId) -> Result<()> {
        let source = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        extract_source(path, &source, doc, file_node)
    }
}

/// Extract declarations from PHP `source` into `file_node`
pub fn extract_source(path: &Path, source: &str, doc: &mut Document, file_node: NodeId) -> Result<()> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_php::LANGUAGE_PHP.into())
        .map_err(|e| Error::extraction(path, e.to_string()))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::extraction(path, "parser returned no tree"))?;
    let root = tree.root_node();

    if root.has_error() {
        let line = first_error(root).map(|n| n.start_position().row + 1).unwrap_or(1);
        return Err(Error::extraction(path, format!("syntax error on line {}", line)));
    }

    let mut walker = Walker {
        source: source.as_bytes(),
        scope: NameScope::default(),
        doc,
    };
    walker.statements(root, file_node);
    Ok(())
}

fn first_error(root: Node) -> Option<Node> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev().filter(|c| c.has_error() || c.is_missing()));
    }
    None
}

fn find_child<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| c.kind() == kind);
    found
}

fn has_child(node: Node, kind: &str) -> bool {
    find_child(node, kind).is_some()
}

fn is_name(node: &Node) -> bool {
    matches!(node.kind(), "name" | "qualified_name" | "namespace_name")
}

fn flag(enabled: bool, key: &'static str, attrs: &mut Vec<(&'static str, String)>) {
    if enabled {
        attrs.push((key, "true".to_string()));
    }
}

struct Walker<'s, 'd> {
    source: &'s [u8],
    scope: NameScope,
    doc: &'d mut Document,
}

impl<'s> Walker<'s, '_> {
    fn text(&self, node: Node) -> &'s str {
        node.utf8_text(self.source).unwrap_or_default()
    }

    /// Variable name without the `$` sigil or a by-ref `&`
    fn variable(&self, node: Node) -> String {
        self.text(node)
            .trim_start_matches(|c: char| c == '&' || c == '$' || c.is_whitespace())
            .to_string()
    }

    fn visibility(&self, node: Node) -> String {
        if let Some(modifier) = find_child(node, "visibility_modifier") {
            return self.text(modifier).to_lowercase();
        }
        "public".to_string()
    }

    fn statements(&mut self, node: Node, parent: NodeId) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "namespace_definition" => self.namespace(child, parent),
                "namespace_use_declaration" => self.imports(child),
                "function_definition" => self.function(child, parent),
                "class_declaration" => self.class(child, parent),
                "interface_declaration" => self.interface(child, parent),
                "trait_declaration" => self.declared_trait(child, parent),
                _ => {}
            }
        }
    }

    fn namespace(&mut self, node: Node, parent: NodeId) {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or_default();

        match node.child_by_field_name("body") {
            Some(body) => {
                let outer = std::mem::replace(&mut self.scope, NameScope::new(name));
                self.statements(body, parent);
                self.scope = outer;
            }
            None => self.scope = NameScope::new(name),
        }
    }

    // ========== Imports ==========

    fn imports(&mut self, node: Node) {
        // `use function` / `use const` import no class names
        if node.child_by_field_name("type").is_some() {
            return;
        }

        let mut prefix = String::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "namespace_name" => prefix = self.text(child).to_string(),
                "namespace_use_clause" => self.import_clause(child, ""),
                "namespace_use_group" => {
                    let mut group_cursor = child.walk();
                    for clause in child.named_children(&mut group_cursor) {
                        self.import_clause(clause, &prefix);
                    }
                }
                _ => {}
            }
        }
    }

    fn import_clause(&mut self, clause: Node, prefix: &str) {
        if clause.child_by_field_name("type").is_some() {
            return;
        }

        let mut cursor = clause.walk();
        let Some(target) = clause.named_children(&mut cursor).find(is_name) else {
            return;
        };
        let target = self.text(target).trim_start_matches('\\');
        let fqn = if prefix.is_empty() {
            target.to_string()
        } else {
            format!("{}\\{}", prefix.trim_matches('\\'), target)
        };

        let alias = clause
            .child_by_field_name("alias")
            .or_else(|| {
                find_child(clause, "namespace_aliasing_clause").and_then(|c| find_child(c, "name"))
            })
            .map(|n| self.text(n).to_string())
            .unwrap_or_else(|| fqn.rsplit('\\').next().unwrap_or_default().to_string());

        self.scope.import(&alias, &fqn);
    }

    // ========== Declarations ==========

    fn class(&mut self, node: Node, parent: NodeId) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };

        let mut attrs = vec![("name", self.scope.qualify(self.text(name)))];
        flag(has_child(node, "final_modifier"), "final", &mut attrs);
        flag(has_child(node, "abstract_modifier"), "abstract", &mut attrs);
        flag(has_child(node, "readonly_modifier"), "readonly", &mut attrs);

        if let Some(base) = find_child(node, "base_clause") {
            let mut cursor = base.walk();
            if let Some(extends) = base.named_children(&mut cursor).find(is_name) {
                attrs.push(("extends", self.scope.resolve(self.text(extends))));
            }
        }

        let class = self.doc.add_child(parent, "class", attrs);

        if let Some(interfaces) = find_child(node, "class_interface_clause") {
            self.name_list(interfaces, class, "implements");
        }
        self.attributes(node, class);
        if let Some(body) = node.child_by_field_name("body") {
            self.members(body, class);
        }
    }

    fn interface(&mut self, node: Node, parent: NodeId) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let qualified = self.scope.qualify(self.text(name));
        let interface = self.doc.add_child(parent, "interface", [("name", qualified)]);

        if let Some(base) = find_child(node, "base_clause") {
            self.name_list(base, interface, "extends");
        }
        self.attributes(node, interface);
        if let Some(body) = node.child_by_field_name("body") {
            self.members(body, interface);
        }
    }

    fn declared_trait(&mut self, node: Node, parent: NodeId) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let qualified = self.scope.qualify(self.text(name));
        let declared = self.doc.add_child(parent, "trait", [("name", qualified)]);

        self.attributes(node, declared);
        if let Some(body) = node.child_by_field_name("body") {
            self.members(body, declared);
        }
    }

    fn function(&mut self, node: Node, parent: NodeId) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name);
        let function = self.doc.add_child(parent, "function", [("name", name)]);

        self.attributes(node, function);
        self.parameters(node, function);
        self.return_type(node, function);

        // Declarations inside the body nest under the function
        if let Some(body) = node.child_by_field_name("body") {
            self.statements(body, function);
        }
    }

    /// One `label` child per class name listed under `node`
    fn name_list(&mut self, node: Node, owner: NodeId, label: &str) {
        let mut cursor = node.walk();
        for name in node.named_children(&mut cursor).filter(is_name) {
            let resolved = self.scope.resolve(self.text(name));
            self.doc.add_child(owner, label, [("name", resolved)]);
        }
    }

    // ========== Members ==========

    fn members(&mut self, body: Node, owner: NodeId) {
        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            match child.kind() {
                "use_declaration" => self.name_list(child, owner, "use"),
                "property_declaration" => self.properties(child, owner),
                "method_declaration" => self.method(child, owner),
                _ => {}
            }
        }
    }

    fn method(&mut self, node: Node, owner: NodeId) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name);

        let mut attrs = vec![("name", name.to_string()), ("visibility", self.visibility(node))];
        flag(has_child(node, "static_modifier"), "static", &mut attrs);
        flag(has_child(node, "final_modifier"), "final", &mut attrs);
        flag(
            has_child(node, "abstract_modifier") || node.child_by_field_name("body").is_none(),
            "abstract",
            &mut attrs,
        );
        flag(
            MAGIC_METHODS.contains(&name.to_lowercase().as_str()),
            "magic",
            &mut attrs,
        );

        let method = self.doc.add_child(owner, "method", attrs);
        self.attributes(node, method);
        self.parameters(node, method);
        self.return_type(node, method);
    }

    fn properties(&mut self, node: Node, owner: NodeId) {
        let mut attrs = vec![("visibility", self.visibility(node))];
        flag(has_child(node, "static_modifier"), "static", &mut attrs);
        flag(has_child(node, "final_modifier"), "final", &mut attrs);
        flag(has_child(node, "readonly_modifier"), "readonly", &mut attrs);
        let declared_type = node.child_by_field_name("type");

        let mut cursor = node.walk();
        for element in node.named_children(&mut cursor) {
            if element.kind() != "property_element" {
                continue;
            }
            let Some(variable) = find_child(element, "variable_name") else {
                continue;
            };

            let mut property_attrs = attrs.clone();
            property_attrs.insert(0, ("name", self.variable(variable)));
            let property = self.doc.add_child(owner, "property", property_attrs);

            self.attributes(node, property);
            if let Some(type_node) = declared_type {
                let descriptor = self.doc.add_element(property, "type");
                append_type(self.doc, descriptor, type_node, self.source, &self.scope);
            }
        }
    }

    fn parameters(&mut self, node: Node, owner: NodeId) {
        let Some(params) = node.child_by_field_name("parameters") else {
            return;
        };

        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let kind = param.kind();
            if !matches!(
                kind,
                "simple_parameter" | "variadic_parameter" | "property_promotion_parameter"
            ) {
                continue;
            }
            let Some(name) = param.child_by_field_name("name") else {
                continue;
            };

            let mut attrs = vec![("name", self.variable(name))];
            flag(
                has_child(param, "reference_modifier") || name.kind() == "by_ref",
                "byRef",
                &mut attrs,
            );
            flag(kind == "variadic_parameter", "variadic", &mut attrs);
            flag(kind == "property_promotion_parameter", "promoted", &mut attrs);

            let param_node = self.doc.add_child(owner, "param", attrs);
            self.attributes(param, param_node);
            if let Some(type_node) = param.child_by_field_name("type") {
                let descriptor = self.doc.add_element(param_node, "type");
                append_type(self.doc, descriptor, type_node, self.source, &self.scope);
            }
        }
    }

    fn return_type(&mut self, node: Node, owner: NodeId) {
        if let Some(type_node) = node.child_by_field_name("return_type") {
            let descriptor = self.doc.add_element(owner, "return");
            append_type(self.doc, descriptor, type_node, self.source, &self.scope);
        }
    }

    // ========== Attributes ==========

    fn attributes(&mut self, node: Node, owner: NodeId) {
        let Some(list) = node
            .child_by_field_name("attributes")
            .or_else(|| find_child(node, "attribute_list"))
        else {
            return;
        };

        let mut cursor = list.walk();
        for group in list.named_children(&mut cursor) {
            let mut group_cursor = group.walk();
            for attribute in group.named_children(&mut group_cursor) {
                if attribute.kind() == "attribute" {
                    self.attribute(attribute, owner);
                }
            }
        }
    }

    fn attribute(&mut self, node: Node, owner: NodeId) {
        let mut cursor = node.walk();
        let Some(name) = node.named_children(&mut cursor).find(is_name) else {
            return;
        };
        let resolved = self.scope.resolve(self.text(name));
        let attribute = self.doc.add_child(owner, "attribute", [("name", resolved)]);

        let Some(arguments) = node.child_by_field_name("parameters") else {
            return;
        };
        let mut arg_cursor = arguments.walk();
        for argument in arguments.named_children(&mut arg_cursor) {
            if argument.kind() != "argument" {
                continue;
            }
            let arg_name = argument
                .child_by_field_name("name")
                .map(|n| self.text(n))
                .unwrap_or_default();

            let mut attrs = vec![("name", arg_name.to_string())];
            flag(has_child(argument, "reference_modifier"), "byRef", &mut attrs);
            flag(has_child(argument, "variadic_unpacking"), "unpack", &mut attrs);
            self.doc.add_child(attribute, "argument", attrs);
        }
    }
}
