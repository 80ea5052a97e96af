//! Python-specific extraction details.
//!
//! On top of the query-driven defs, Python gets: class fields and
//! annotated assignments as definitions (with canonicalized type
//! strings), decorator awareness (`@property` flips the def kind),
//! attribute-chain anchor groups, and advisory dynamic-access facts
//! for `getattr`/`eval`/`exec` and non-literal subscripts. Chained
//! calls (`foo().bar`) are skipped rather than speculatively resolved.

use std::collections::HashMap;
use tree_sitter::Node;

use super::{
    DefFact, DynamicAccessFact, FactBundle, MAX_WALK_DEPTH, def_uid, node_range, node_text,
};
use crate::types::DefKind;

/// Enrich a Python bundle with field, annotation, decorator, and
/// dynamic-access facts.
pub fn extract_python_details(
    bundle: &mut FactBundle,
    root: Node,
    content: &str,
    file_path: &str,
    name_ranges: &mut HashMap<(u32, u16), usize>,
) {
    apply_decorators(bundle, root, content, file_path);
    collect_assignments(bundle, root, content, file_path, name_ranges, 0);
    collect_dynamic_access(bundle, root, content, 0);
}

/// `@property` turns a method into a property def. Other well-known
/// decorators (`@staticmethod`, `@classmethod`, `@abstractmethod`)
/// surface in the signature so consumers can render them.
fn apply_decorators(bundle: &mut FactBundle, root: Node, content: &str, file_path: &str) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "decorated_definition" {
            let decorators: Vec<String> = node
                .children(&mut node.walk())
                .filter(|c| c.kind() == "decorator")
                .map(|c| node_text(c, content).to_string())
                .collect();
            if let Some(definition) = node.child_by_field_name("definition") {
                if definition.kind() == "function_definition" {
                    if let Some(name_node) = definition.child_by_field_name("name") {
                        let pos = (
                            name_node.start_position().row as u32 + 1,
                            name_node.start_position().column as u16,
                        );
                        if let Some(def) = bundle.defs.iter_mut().find(|d| {
                            pos.0 >= d.range.start_line
                                && pos.0 <= d.range.end_line
                                && d.name == node_text(name_node, content)
                        }) {
                            if decorators.iter().any(|d| d == "@property") {
                                def.kind = DefKind::Property;
                                def.def_uid =
                                    def_uid(file_path, &def.lexical_path, DefKind::Property);
                            }
                            if !decorators.is_empty() {
                                let sig = def.signature.take().unwrap_or_default();
                                def.signature = Some(format!("{} {sig}", decorators.join(" ")));
                            }
                        }
                    }
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push(child);
        }
    }
}

/// Class-body assignments become field defs; module-level annotated
/// assignments become variable defs. Type annotations are canonicalized.
fn collect_assignments(
    bundle: &mut FactBundle,
    node: Node,
    content: &str,
    file_path: &str,
    name_ranges: &mut HashMap<(u32, u16), usize>,
    depth: usize,
) {
    if depth > MAX_WALK_DEPTH {
        return;
    }

    if node.kind() == "assignment" {
        if let Some(left) = node.child_by_field_name("left") {
            if left.kind() == "identifier" {
                let annotation = node
                    .child_by_field_name("type")
                    .map(|t| canonicalize_type(node_text(t, content)));
                match enclosing_definition(node) {
                    Enclosing::Class(class_node) => {
                        let class_name = class_node
                            .child_by_field_name("name")
                            .map(|n| node_text(n, content))
                            .unwrap_or("");
                        push_def(
                            bundle,
                            name_ranges,
                            file_path,
                            left,
                            content,
                            DefKind::Field,
                            &format!("{class_name}.{}", node_text(left, content)),
                            annotation,
                            node_range(node),
                        );
                    }
                    Enclosing::Module if annotation.is_some() => {
                        push_def(
                            bundle,
                            name_ranges,
                            file_path,
                            left,
                            content,
                            DefKind::Variable,
                            node_text(left, content),
                            annotation,
                            node_range(node),
                        );
                    }
                    _ => {}
                }
            }
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_assignments(bundle, child, content, file_path, name_ranges, depth + 1);
    }
}

enum Enclosing<'t> {
    Class(Node<'t>),
    Function,
    Module,
}

fn enclosing_definition(node: Node) -> Enclosing<'_> {
    let mut current = node.parent();
    while let Some(parent) = current {
        match parent.kind() {
            "class_definition" => return Enclosing::Class(parent),
            "function_definition" => return Enclosing::Function,
            _ => current = parent.parent(),
        }
    }
    Enclosing::Module
}

#[allow(clippy::too_many_arguments)]
fn push_def(
    bundle: &mut FactBundle,
    name_ranges: &mut HashMap<(u32, u16), usize>,
    file_path: &str,
    name_node: Node,
    content: &str,
    kind: DefKind,
    lexical_path: &str,
    signature: Option<String>,
    range: crate::types::Range,
) {
    if bundle.defs.iter().any(|d| d.lexical_path == lexical_path) {
        return;
    }
    let name = node_text(name_node, content).to_string();
    let key = (
        name_node.start_position().row as u32 + 1,
        name_node.start_position().column as u16,
    );
    name_ranges.insert(key, bundle.defs.len());
    bundle.defs.push(DefFact {
        def_uid: def_uid(file_path, lexical_path, kind),
        kind,
        name,
        lexical_path: lexical_path.to_string(),
        range,
        signature,
    });
}

/// `getattr(obj, ...)`, `eval`/`exec` calls, and bracket access with a
/// non-literal key are advisory metadata, not references.
fn collect_dynamic_access(bundle: &mut FactBundle, node: Node, content: &str, depth: usize) {
    if depth > MAX_WALK_DEPTH {
        return;
    }

    match node.kind() {
        "call" => {
            if let Some(function) = node.child_by_field_name("function") {
                if function.kind() == "identifier" {
                    let name = node_text(function, content);
                    if matches!(name, "getattr" | "setattr" | "eval" | "exec") {
                        bundle.dynamic_accesses.push(DynamicAccessFact {
                            mechanism: match name {
                                "getattr" => "getattr",
                                "setattr" => "setattr",
                                "eval" => "eval",
                                _ => "exec",
                            },
                            detail: node_text(node, content).chars().take(120).collect(),
                            range: node_range(node),
                        });
                    }
                }
            }
        }
        "subscript" => {
            if let Some(index) = node.child_by_field_name("subscript") {
                let literal = matches!(
                    index.kind(),
                    "string" | "integer" | "float" | "true" | "false" | "none"
                );
                if !literal {
                    bundle.dynamic_accesses.push(DynamicAccessFact {
                        mechanism: "subscript",
                        detail: node_text(node, content).chars().take(120).collect(),
                        range: node_range(node),
                    });
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_dynamic_access(bundle, child, content, depth + 1);
    }
}

/// Attribute-access anchor groups. For `a.b.c` the member is `c` and
/// the receiver shape is `a.b`; receivers that are call results are
/// skipped.
pub fn collect_attribute_anchors(
    root: Node,
    content: &str,
    counts: &mut HashMap<(String, Option<String>), u32>,
) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind() == "attribute" {
            if let (Some(object), Some(attribute)) = (
                node.child_by_field_name("object"),
                node.child_by_field_name("attribute"),
            ) {
                let receiver = match object.kind() {
                    "identifier" | "attribute" => Some(node_text(object, content).to_string()),
                    _ => None,
                };
                if receiver.is_some() {
                    let member = node_text(attribute, content).to_string();
                    *counts.entry((member, receiver)).or_insert(0) += 1;
                }
            }
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push(child);
        }
    }
}

/// Canonicalize a Python type annotation string:
/// `List[T]` → `list[T]`, `Optional[T]` → `opt[T]`, `typing.` prefixes
/// dropped, whitespace collapsed.
pub fn canonicalize_type(annotation: &str) -> String {
    let mut t: String = annotation.split_whitespace().collect::<Vec<_>>().join(" ");
    t = t.replace("typing.", "");
    for (from, to) in [
        ("List[", "list["),
        ("Dict[", "dict["),
        ("Set[", "set["),
        ("FrozenSet[", "frozenset["),
        ("Tuple[", "tuple["),
        ("Optional[", "opt["),
        ("Union[", "union["),
        ("Sequence[", "seq["),
        ("Iterable[", "iter["),
    ] {
        t = t.replace(from, to);
    }
    if t == "Text" {
        t = "str".to_string();
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;
    use crate::parsing::SourceParser;

    fn extract_from(source: &str) -> FactBundle {
        let mut parser = SourceParser::new();
        let parsed = parser.parse("a.py", source.as_bytes()).unwrap();
        extract(&parsed, source, "a.py")
    }

    #[test]
    fn test_canonicalize_type() {
        assert_eq!(canonicalize_type("List[int]"), "list[int]");
        assert_eq!(canonicalize_type("Optional[str]"), "opt[str]");
        assert_eq!(
            canonicalize_type("typing.Dict[str, List[int]]"),
            "dict[str, list[int]]"
        );
        assert_eq!(canonicalize_type("Union[int,  str]"), "union[int, str]");
        assert_eq!(canonicalize_type("int"), "int");
    }

    #[test]
    fn test_class_fields() {
        let bundle = extract_from(
            "class User:\n    name: str = \"\"\n    age: Optional[int] = None\n",
        );
        let field = bundle
            .defs
            .iter()
            .find(|d| d.lexical_path == "User.name")
            .unwrap();
        assert_eq!(field.kind, DefKind::Field);
        assert_eq!(field.signature.as_deref(), Some("str"));

        let age = bundle
            .defs
            .iter()
            .find(|d| d.lexical_path == "User.age")
            .unwrap();
        assert_eq!(age.signature.as_deref(), Some("opt[int]"));
    }

    #[test]
    fn test_module_level_annotated_assignment() {
        let bundle = extract_from("count: int = 0\nplain = 1\n");
        let var = bundle.defs.iter().find(|d| d.name == "count").unwrap();
        assert_eq!(var.kind, DefKind::Variable);
        assert_eq!(var.signature.as_deref(), Some("int"));
        // Plain module-level assignments bind locally but are not defs.
        assert!(!bundle.defs.iter().any(|d| d.name == "plain"));
    }

    #[test]
    fn test_property_decorator() {
        let bundle = extract_from(
            "class C:\n    @property\n    def value(self):\n        return self._v\n",
        );
        let prop = bundle.defs.iter().find(|d| d.name == "value").unwrap();
        assert_eq!(prop.kind, DefKind::Property);
        assert!(prop.signature.as_deref().unwrap().contains("@property"));
    }

    #[test]
    fn test_staticmethod_keeps_kind() {
        let bundle = extract_from(
            "class C:\n    @staticmethod\n    def make():\n        return C()\n",
        );
        let m = bundle.defs.iter().find(|d| d.name == "make").unwrap();
        assert_eq!(m.kind, DefKind::Method);
        assert!(m.signature.as_deref().unwrap().contains("@staticmethod"));
    }

    #[test]
    fn test_attribute_chain_anchors() {
        let bundle = extract_from("v = config.database.host\n");
        let host = bundle
            .anchors
            .iter()
            .find(|a| a.member_token == "host")
            .unwrap();
        assert_eq!(host.receiver_shape.as_deref(), Some("config.database"));
    }

    #[test]
    fn test_chained_call_skipped() {
        let bundle = extract_from("v = factory().build\n");
        assert!(!bundle.anchors.iter().any(|a| a.member_token == "build"));
    }

    #[test]
    fn test_dynamic_access_facts() {
        let bundle = extract_from(
            "x = getattr(obj, name)\neval(code)\nd[key]\nd[\"literal\"]\n",
        );
        let mechanisms: Vec<&str> = bundle
            .dynamic_accesses
            .iter()
            .map(|d| d.mechanism)
            .collect();
        assert!(mechanisms.contains(&"getattr"));
        assert!(mechanisms.contains(&"eval"));
        assert!(mechanisms.contains(&"subscript"));
        // Literal-keyed subscripts are not dynamic.
        assert_eq!(
            mechanisms.iter().filter(|m| **m == "subscript").count(),
            1
        );
    }
}
