//! Trait composition
//!
//! Copies the methods and properties a class receives through `use` edges
//! into the class itself, tagging every copy with `fromTrait`. Earlier copies
//! are dropped first, so running the linker again after traits change never
//! leaves stale members behind.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::store::{literal, Document, NodeId};
use crate::Result;

/// Attribute marking a member copied in from a trait
pub const PROVENANCE_ATTR: &str = "fromTrait";

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct LinkStats {
    /// Composed members dropped from the previous run
    pub removed: usize,
    /// Classes using at least one known trait
    pub classes: usize,
    /// Members copied into classes
    pub composed: usize,
}

impl fmt::Display for LinkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trait Linker Stats:")?;
        writeln!(f, "  Classes using traits: {}", self.classes)?;
        writeln!(f, "  Composed members: {}", self.composed)?;
        writeln!(f, "  Stale members removed: {}", self.removed)
    }
}

#[derive(Debug, Default)]
struct TraitMembers {
    methods: Vec<NodeId>,
    properties: Vec<NodeId>,
}

pub struct TraitLinker<'a> {
    doc: &'a mut Document,
}

impl<'a> TraitLinker<'a> {
    pub fn new(doc: &'a mut Document) -> Self {
        Self { doc }
    }

    pub fn run(mut self) -> Result<LinkStats> {
        let mut stats = LinkStats {
            removed: self.remove_composed()?,
            ..Default::default()
        };

        let traits = self.traits_by_name()?;
        let classes: Vec<NodeId> = self.doc.query("//class")?.nodes().collect();

        for class in classes {
            let uses: Vec<String> = self
                .use_edges(class)?
                .into_iter()
                .filter(|name| traits.contains_key(name))
                .collect();
            if uses.is_empty() {
                continue;
            }
            stats.classes += 1;

            for trait_name in uses {
                let members = self.collect_members(&traits, &trait_name)?;
                for member in members.methods.into_iter().chain(members.properties) {
                    if self.append_if_missing(class, member, &trait_name)? {
                        stats.composed += 1;
                    }
                }
            }
        }

        debug!(
            "Trait composition: {} members into {} classes ({} stale removed)",
            stats.composed, stats.classes, stats.removed
        );
        Ok(stats)
    }

    fn remove_composed(&mut self) -> Result<usize> {
        let stale: Vec<NodeId> = self
            .doc
            .query(&format!("//class/*[@{}]", PROVENANCE_ATTR))?
            .nodes()
            .collect();
        for node in &stale {
            self.doc.remove_node(*node);
        }
        Ok(stale.len())
    }

    /// First declaration in document order wins for duplicate names
    fn traits_by_name(&self) -> Result<HashMap<String, NodeId>> {
        let mut traits = HashMap::new();
        for node in self.doc.query("//trait[@name]")?.nodes() {
            let name = self.doc.attribute(node, "name").unwrap_or_default();
            if !name.is_empty() {
                traits.entry(name.to_string()).or_insert(node);
            }
        }
        Ok(traits)
    }

    /// Names on the node's direct `use` children, in declaration order
    fn use_edges(&self, node: NodeId) -> Result<Vec<String>> {
        Ok(self
            .doc
            .query_from(node, "./use[@name]")?
            .nodes()
            .filter_map(|edge| self.doc.attribute(edge, "name"))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Depth-first walk over `start` and the traits it uses, in pre-order.
    /// Each trait contributes once even when the use graph has cycles.
    fn collect_members(&self, traits: &HashMap<String, NodeId>, start: &str) -> Result<TraitMembers> {
        let mut members = TraitMembers::default();
        let mut visited = HashSet::new();
        let mut stack = vec![start.to_string()];

        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let Some(&node) = traits.get(&name) else {
                continue;
            };

            members
                .methods
                .extend(self.doc.query_from(node, "./method[@name]")?.nodes());
            members
                .properties
                .extend(self.doc.query_from(node, "./property[@name]")?.nodes());

            let nested = self.use_edges(node)?;
            stack.extend(nested.into_iter().rev().filter(|n| traits.contains_key(n)));
        }

        Ok(members)
    }

    fn append_if_missing(&mut self, class: NodeId, member: NodeId, trait_name: &str) -> Result<bool> {
        let name = self.doc.attribute(member, "name").unwrap_or_default();
        if name.is_empty() {
            return Ok(false);
        }

        let existing = format!("./{}[@name={}]", self.doc.label(member), literal(name));
        if self.doc.query_from(class, &existing)?.first().is_some() {
            return Ok(false);
        }

        let copy = self.doc.deep_copy(member, class);
        self.doc.set_attribute(copy, PROVENANCE_ATTR, trait_name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_trait(doc: &mut Document, name: &str, uses: &[&str], methods: &[&str], properties: &[&str]) -> NodeId {
        let root = doc.root();
        let file = doc.add_child(root, "file", [("path", format!("{}.php", name))]);
        let node = doc.add_child(file, "trait", [("name", name)]);
        for used in uses {
            doc.add_child(node, "use", [("name", *used)]);
        }
        for method in methods {
            doc.add_child(node, "method", [("name", *method)]);
        }
        for property in properties {
            doc.add_child(node, "property", [("name", *property)]);
        }
        node
    }

    fn add_class(doc: &mut Document, name: &str, uses: &[&str]) -> NodeId {
        let root = doc.root();
        let file = doc.add_child(root, "file", [("path", format!("{}.php", name))]);
        let node = doc.add_child(file, "class", [("name", name)]);
        for used in uses {
            doc.add_child(node, "use", [("name", *used)]);
        }
        node
    }

    fn link(doc: &mut Document) -> LinkStats {
        TraitLinker::new(doc).run().unwrap()
    }

    fn members(doc: &Document, class: NodeId) -> Vec<(String, String, String)> {
        doc.children(class)
            .iter()
            .filter(|c| doc.label(**c) != "use")
            .map(|c| {
                (
                    doc.label(*c).to_string(),
                    doc.attribute(*c, "name").unwrap_or_default().to_string(),
                    doc.attribute(*c, PROVENANCE_ATTR).unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    fn member(label: &str, name: &str, from: &str) -> (String, String, String) {
        (label.to_string(), name.to_string(), from.to_string())
    }

    #[test]
    fn test_composes_property_with_provenance() {
        let mut doc = Document::new("files");
        add_trait(&mut doc, "T", &[], &[], &["p"]);
        add_class(&mut doc, "C", &["T"]);

        let stats = link(&mut doc);
        assert_eq!(stats.classes, 1);
        assert_eq!(stats.composed, 1);

        let found = doc.query("//class[@name='C']/property[@name='p']").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            doc.first_string("//class[@name='C']/property[@name='p']/@fromTrait").unwrap(),
            "T"
        );
    }

    #[test]
    fn test_methods_before_properties_in_preorder() {
        let mut doc = Document::new("files");
        add_trait(&mut doc, "A", &["B"], &["a"], &["pa"]);
        add_trait(&mut doc, "B", &[], &["b"], &["pb"]);
        let class = add_class(&mut doc, "C", &["A"]);

        link(&mut doc);
        assert_eq!(
            members(&doc, class),
            vec![
                member("method", "a", "A"),
                member("method", "b", "A"),
                member("property", "pa", "A"),
                member("property", "pb", "A"),
            ]
        );
    }

    #[test]
    fn test_cyclic_uses_terminate_without_duplicates() {
        let mut doc = Document::new("files");
        add_trait(&mut doc, "A", &["B", "A"], &["a"], &[]);
        add_trait(&mut doc, "B", &["A"], &["b"], &[]);
        let class = add_class(&mut doc, "C", &["A", "B"]);

        link(&mut doc);
        assert_eq!(
            members(&doc, class),
            vec![member("method", "a", "A"), member("method", "b", "A")]
        );
    }

    #[test]
    fn test_native_members_take_precedence() {
        let mut doc = Document::new("files");
        add_trait(&mut doc, "T", &[], &["m", "n"], &[]);
        let class = add_class(&mut doc, "C", &["T"]);
        doc.add_child(class, "method", [("name", "m"), ("visibility", "private")]);

        link(&mut doc);
        assert_eq!(
            members(&doc, class),
            vec![member("method", "m", ""), member("method", "n", "T")]
        );
        assert_eq!(
            doc.first_string("//class/method[@name='m']/@visibility").unwrap(),
            "private"
        );
    }

    #[test]
    fn test_first_used_trait_wins() {
        let mut doc = Document::new("files");
        add_trait(&mut doc, "T1", &[], &["m"], &[]);
        add_trait(&mut doc, "T2", &[], &["m"], &["p"]);
        let class = add_class(&mut doc, "C", &["T1", "T2"]);

        link(&mut doc);
        assert_eq!(
            members(&doc, class),
            vec![member("method", "m", "T1"), member("property", "p", "T2")]
        );
    }

    #[test]
    fn test_relinking_is_idempotent_and_drops_stale_members() {
        let mut doc = Document::new("files");
        let t = add_trait(&mut doc, "T", &[], &["keep", "drop"], &[]);
        let class = add_class(&mut doc, "C", &["T"]);

        link(&mut doc);
        let second = link(&mut doc);
        assert_eq!(second.removed, 2);
        assert_eq!(members(&doc, class).len(), 2);

        let dropped = doc.query_from(t, "./method[@name='drop']").unwrap().nodes().next().unwrap();
        doc.remove_node(dropped);

        link(&mut doc);
        assert_eq!(members(&doc, class), vec![member("method", "keep", "T")]);
    }

    #[test]
    fn test_unknown_traits_and_quoted_names() {
        let mut doc = Document::new("files");
        add_trait(&mut doc, "T", &[], &[r#"we'ird"name"#], &[]);
        let class = add_class(&mut doc, "C", &["Missing", "T"]);

        let stats = link(&mut doc);
        assert_eq!(stats.composed, 1);
        link(&mut doc);
        assert_eq!(members(&doc, class), vec![member("method", r#"we'ird"name"#, "T")]);
    }

    #[test]
    fn test_duplicate_trait_names_use_first_declaration() {
        let mut doc = Document::new("files");
        add_trait(&mut doc, "T", &[], &["first"], &[]);
        add_trait(&mut doc, "T", &[], &["second"], &[]);
        let class = add_class(&mut doc, "C", &["T"]);

        link(&mut doc);
        assert_eq!(members(&doc, class), vec![member("method", "first", "T")]);
    }
}
