//! Fact extraction: turning parse trees into typed facts.
//!
//! One [`extract`] call per file produces a [`FactBundle`]: the scope
//! tree, definitions with stable UIDs, identifier occurrences,
//! local bindings, imports, the export surface, anchor groups, and
//! (for Python) dynamic-access advisories. Nothing in the bundle
//! retains the parse tree; cross-file linkage is by UID and path only.

pub mod imports;
pub mod python;
pub mod scopes;

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Node, Query, QueryCursor};

use crate::parsing::queries::{LanguageQueryConfig, query_config};
use crate::parsing::{ParsedFile, parser::grammar_for};
use crate::types::{
    BindTargetKind, Certainty, DefKind, Range, RefRole, RefTier, ScopeKind,
};

/// Maximum recursion depth for tree walks, mirroring the parser-side
/// guard against pathological nesting.
pub(crate) const MAX_WALK_DEPTH: usize = 500;

/// A definition fact.
#[derive(Debug, Clone, PartialEq)]
pub struct DefFact {
    pub def_uid: String,
    pub kind: DefKind,
    pub name: String,
    /// Dotted path inside the file, e.g. `Outer.Inner.method`.
    pub lexical_path: String,
    pub range: Range,
    pub signature: Option<String>,
}

/// An identifier occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct RefFact {
    pub token_text: String,
    pub range: Range,
    pub role: RefRole,
    pub tier: RefTier,
    pub certainty: Certainty,
    pub target_def_uid: Option<String>,
}

/// A lexical scope. `index` is the scope's position in the bundle's
/// scope vector; `parent` points into the same vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeFact {
    pub index: usize,
    pub parent: Option<usize>,
    pub kind: ScopeKind,
    pub range: Range,
}

/// A name bound in a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalBindFact {
    pub scope_index: usize,
    pub name: String,
    pub target_kind: BindTargetKind,
    pub target_uid: Option<String>,
    pub certainty: Certainty,
    pub reason_code: &'static str,
}

/// An import clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportFact {
    pub import_uid: String,
    /// Bound local name, `*` for wildcard or side-effect imports.
    pub imported_name: String,
    pub alias: Option<String>,
    /// Raw right-hand side, verbatim from source.
    pub source_literal: String,
    pub kind: crate::types::ImportKind,
    /// Filled at index time by the resolver.
    pub resolved_path: Option<String>,
    pub certainty: Certainty,
    pub range: Range,
}

/// One entry of a context's export surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportEntry {
    pub exported_name: String,
    pub def_uid: String,
}

/// Per-file contribution to a `(member_token, receiver_shape)` anchor
/// bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorGroupFact {
    pub member_token: String,
    pub receiver_shape: Option<String>,
    pub count: u32,
}

/// Advisory record of dynamic member access (`getattr`, `eval`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicAccessFact {
    pub mechanism: &'static str,
    pub detail: String,
    pub range: Range,
}

/// Everything extracted from one file.
#[derive(Debug, Clone, Default)]
pub struct FactBundle {
    pub file_path: String,
    pub language: &'static str,
    /// Module the file announces in-source (Go package, Java package,
    /// C# namespace...). Config-augmented for Go/Rust in a later pass.
    pub declared_module: Option<String>,
    pub scopes: Vec<ScopeFact>,
    pub defs: Vec<DefFact>,
    pub refs: Vec<RefFact>,
    pub binds: Vec<LocalBindFact>,
    pub imports: Vec<ImportFact>,
    pub exports: Vec<ExportEntry>,
    pub anchors: Vec<AnchorGroupFact>,
    pub dynamic_accesses: Vec<DynamicAccessFact>,
    /// Hash over sorted (kind, name, signature) triples; dependents use
    /// it to detect interface changes.
    pub interface_hash: String,
}

/// Stable definition UID: truncated sha-256 over file path, lexical
/// path, and kind. Signature and body changes leave it untouched; a
/// rename or re-parenting changes it.
pub fn def_uid(file_path: &str, lexical_path: &str, kind: DefKind) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update([0]);
    hasher.update(lexical_path.as_bytes());
    hasher.update([0]);
    hasher.update(kind.as_str().as_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 16)
}

/// Stable import UID: position- and literal-derived.
pub fn import_uid(file_path: &str, source_literal: &str, imported_name: &str, range: Range) -> String {
    let mut hasher = Sha256::new();
    hasher.update(file_path.as_bytes());
    hasher.update([0]);
    hasher.update(source_literal.as_bytes());
    hasher.update([0]);
    hasher.update(imported_name.as_bytes());
    hasher.update([0]);
    hasher.update(range.start_line.to_le_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 16)
}

fn hex_prefix(digest: &[u8], chars: usize) -> String {
    let mut out = String::with_capacity(chars);
    for byte in digest {
        use std::fmt::Write;
        write!(out, "{byte:02x}").unwrap();
        if out.len() >= chars {
            out.truncate(chars);
            break;
        }
    }
    out
}

/// Structural hash of a definition's header tokens (name + signature).
pub fn signature_hash(def: &DefFact) -> String {
    let mut hasher = Sha256::new();
    hasher.update(def.name.as_bytes());
    hasher.update([0]);
    hasher.update(def.signature.as_deref().unwrap_or("").as_bytes());
    hex_prefix(&hasher.finalize(), 16)
}

/// Hash of a definition's body span within the given content.
pub fn body_hash(def: &DefFact, content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = (def.range.start_line.saturating_sub(1)) as usize;
    let end = (def.range.end_line as usize).min(lines.len());
    let mut hasher = Sha256::new();
    for line in lines.iter().take(end).skip(start) {
        hasher.update(line.as_bytes());
        hasher.update([b'\n']);
    }
    hex_prefix(&hasher.finalize(), 16)
}

/// Extract all facts from one parsed file.
pub fn extract(parsed: &ParsedFile, content: &str, file_path: &str) -> FactBundle {
    let language = parsed.language;
    let root = parsed.root_node();

    let mut bundle = FactBundle {
        file_path: file_path.to_string(),
        language,
        ..Default::default()
    };

    bundle.scopes = scopes::build_scope_tree(root, language);
    bundle.declared_module = imports::declared_module(root, language, content);
    let (import_facts, import_spans) = imports::extract_imports(root, language, content, file_path);
    bundle.imports = import_facts;

    let mut name_ranges: HashMap<(u32, u16), usize> = HashMap::new();
    if let Some(config) = query_config(language) {
        extract_defs(&mut bundle, config, root, content, file_path, &mut name_ranges);
    }

    if language == "python" {
        python::extract_python_details(&mut bundle, root, content, file_path, &mut name_ranges);
    }

    collect_binds(&mut bundle);
    let site_binds = scopes::collect_binding_sites(root, language, content, &bundle.scopes);
    bundle.binds.extend(site_binds);
    collect_refs(&mut bundle, root, language, content, &name_ranges, &import_spans);
    collect_anchors(&mut bundle, root, language, content);

    // Export surface: the file's top-level definitions.
    bundle.exports = bundle
        .defs
        .iter()
        .filter(|d| !d.lexical_path.contains('.'))
        .map(|d| ExportEntry {
            exported_name: d.name.clone(),
            def_uid: d.def_uid.clone(),
        })
        .collect();

    bundle.interface_hash = interface_hash(&bundle.defs);
    bundle
}

/// Hash over the sorted public interface, for dependency change
/// detection.
pub fn interface_hash(defs: &[DefFact]) -> String {
    let mut parts: Vec<String> = defs
        .iter()
        .map(|d| {
            format!(
                "{}:{}:{}",
                d.kind.as_str(),
                d.lexical_path,
                d.signature.as_deref().unwrap_or("")
            )
        })
        .collect();
    parts.sort();
    let digest = Sha256::digest(parts.join("\n").as_bytes());
    format!("{digest:x}")
}

pub(crate) fn node_range(node: Node) -> Range {
    Range::new(
        node.start_position().row as u32 + 1,
        node.start_position().column as u16,
        node.end_position().row as u32 + 1,
        node.end_position().column as u16,
    )
}

pub(crate) fn node_text<'a>(node: Node, content: &'a str) -> &'a str {
    node.utf8_text(content.as_bytes()).unwrap_or("")
}

/// Run the language's def query and emit DefFacts with lexical paths
/// built from the container chain.
fn extract_defs(
    bundle: &mut FactBundle,
    config: &LanguageQueryConfig,
    root: Node,
    content: &str,
    file_path: &str,
    name_ranges: &mut HashMap<(u32, u16), usize>,
) {
    let Some(grammar) = grammar_for(bundle.language) else {
        return;
    };
    let Ok(query) = Query::new(&grammar, config.query_text) else {
        return;
    };
    let capture_names: Vec<&str> = query.capture_names().to_vec();

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, root, content.as_bytes());
    while let Some(query_match) = matches.next() {
        let Some(pattern) = config.patterns.get(query_match.pattern_index) else {
            continue;
        };
        let mut name_node: Option<Node> = None;
        let mut main_node: Option<Node> = None;
        let mut params_node: Option<Node> = None;
        for capture in query_match.captures {
            match capture_names.get(capture.index as usize).copied() {
                Some("name") => name_node = Some(capture.node),
                Some("params") => params_node = Some(capture.node),
                Some("node") => main_node = Some(capture.node),
                _ => {}
            }
        }
        let (Some(name_node), Some(main_node)) = (name_node, main_node) else {
            continue;
        };
        let name = node_text(name_node, content).to_string();
        if name.is_empty() {
            continue;
        }

        let container_path = container_chain(main_node, config, content);
        let kind = if container_path.is_empty() {
            pattern.kind
        } else {
            pattern.nested_kind.unwrap_or(pattern.kind)
        };
        let lexical_path = if container_path.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", container_path.join("."), name)
        };

        let signature = params_node.map(|p| format!("{}{}", name, node_text(p, content)));
        let uid = def_uid(file_path, &lexical_path, kind);

        let def = DefFact {
            def_uid: uid,
            kind,
            name,
            lexical_path,
            range: node_range(main_node),
            signature,
        };
        let key = (
            name_node.start_position().row as u32 + 1,
            name_node.start_position().column as u16,
        );
        name_ranges.insert(key, bundle.defs.len());
        bundle.defs.push(def);
    }
}

/// Names of the containers enclosing a node, outermost first.
fn container_chain(node: Node, config: &LanguageQueryConfig, content: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = node.parent();
    while let Some(parent) = current {
        if let Some(container) = config
            .containers
            .iter()
            .find(|c| c.node_kind == parent.kind())
        {
            if let Some(name_node) = parent.child_by_field_name(container.name_field) {
                chain.push(node_text(name_node, content).to_string());
            }
        }
        current = parent.parent();
    }
    chain.reverse();
    chain
}

/// Populate binds from defs, imports, and parameters. Defs bind in the
/// scope enclosing their node; imports bind at file scope.
fn collect_binds(bundle: &mut FactBundle) {
    for def in &bundle.defs {
        let scope_index = scopes::enclosing_scope(&bundle.scopes, def.range);
        bundle.binds.push(LocalBindFact {
            scope_index,
            name: def.name.clone(),
            target_kind: BindTargetKind::Def,
            target_uid: Some(def.def_uid.clone()),
            certainty: Certainty::Certain,
            reason_code: "def",
        });
    }
    for import in &bundle.imports {
        let bound = import.alias.as_deref().unwrap_or(&import.imported_name);
        if bound == "*" {
            continue;
        }
        bundle.binds.push(LocalBindFact {
            scope_index: 0,
            name: bound.to_string(),
            target_kind: BindTargetKind::Import,
            target_uid: None,
            certainty: Certainty::Certain,
            reason_code: "import",
        });
    }
}

/// Walk the tree and emit one RefFact per identifier occurrence,
/// resolving same-file bindings to the proven tier.
fn collect_refs(
    bundle: &mut FactBundle,
    root: Node,
    language: &str,
    content: &str,
    name_ranges: &HashMap<(u32, u16), usize>,
    import_spans: &[Range],
) {
    let mut refs = Vec::new();
    walk_identifiers(root, language, content, 0, &mut |node, text| {
        let range = node_range(node);
        let key = (range.start_line, range.start_column);

        if let Some(&def_index) = name_ranges.get(&key) {
            refs.push(RefFact {
                token_text: text.to_string(),
                range,
                role: RefRole::Definition,
                tier: RefTier::Proven,
                certainty: Certainty::Certain,
                target_def_uid: Some(bundle.defs[def_index].def_uid.clone()),
            });
            return;
        }

        if import_spans.iter().any(|span| span.contains_lines(&range)) {
            refs.push(RefFact {
                token_text: text.to_string(),
                range,
                role: RefRole::Import,
                tier: RefTier::Unknown,
                certainty: Certainty::Uncertain,
                target_def_uid: None,
            });
            return;
        }

        let role = if is_assignment_target(node, language) {
            RefRole::Write
        } else {
            RefRole::Reference
        };

        // Proven-tier resolution: innermost-out scope chain walk.
        let scope = scopes::enclosing_scope_at(&bundle.scopes, range.start_line, range.start_column);
        let resolved = scopes::resolve_in_chain(&bundle.scopes, &bundle.binds, scope, text);
        match resolved {
            Some(bind) if bind.target_uid.is_some() => refs.push(RefFact {
                token_text: text.to_string(),
                range,
                role,
                tier: RefTier::Proven,
                certainty: Certainty::Certain,
                target_def_uid: bind.target_uid.clone(),
            }),
            Some(_) => refs.push(RefFact {
                token_text: text.to_string(),
                range,
                role,
                tier: RefTier::Proven,
                certainty: Certainty::Uncertain,
                target_def_uid: None,
            }),
            None => refs.push(RefFact {
                token_text: text.to_string(),
                range,
                role,
                tier: RefTier::Unknown,
                certainty: Certainty::Uncertain,
                target_def_uid: None,
            }),
        }
    });
    bundle.refs = refs;
}

/// Invoke the callback for every identifier-like node.
fn walk_identifiers<'t>(
    node: Node<'t>,
    language: &str,
    content: &str,
    depth: usize,
    f: &mut impl FnMut(Node<'t>, &str),
) {
    if depth > MAX_WALK_DEPTH {
        return;
    }
    let kind = node.kind();
    let is_identifier = kind == "identifier"
        || kind.ends_with("_identifier")
        || (language == "php" && kind == "name")
        || (language == "ruby" && kind == "constant");
    if is_identifier {
        let text = node_text(node, content);
        if !text.is_empty() {
            f(node, text);
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_identifiers(child, language, content, depth + 1, f);
    }
}

/// Is this identifier the target of an assignment?
fn is_assignment_target(node: Node, language: &str) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match (language, parent.kind()) {
        ("python", "assignment" | "augmented_assignment")
        | ("javascript" | "typescript" | "tsx", "assignment_expression")
        | ("go", "assignment_statement")
        | ("lua", "assignment_statement") => parent
            .child_by_field_name("left")
            .is_some_and(|left| left.id() == node.id()),
        _ => false,
    }
}

/// Member-access anchor groups: `(member_token, receiver_shape)` counts.
fn collect_anchors(bundle: &mut FactBundle, root: Node, language: &str, content: &str) {
    let mut counts: HashMap<(String, Option<String>), u32> = HashMap::new();
    match language {
        "python" => python::collect_attribute_anchors(root, content, &mut counts),
        "javascript" | "typescript" | "tsx" => {
            collect_member_anchors(root, content, 0, &mut counts)
        }
        _ => {}
    }
    let mut anchors: Vec<AnchorGroupFact> = counts
        .into_iter()
        .map(|((member_token, receiver_shape), count)| AnchorGroupFact {
            member_token,
            receiver_shape,
            count,
        })
        .collect();
    anchors.sort_by(|a, b| a.member_token.cmp(&b.member_token));

    // Refs participating in an anchor bucket upgrade from unknown.
    for r in &mut bundle.refs {
        if r.tier == RefTier::Unknown
            && anchors
                .iter()
                .any(|a| a.member_token == r.token_text && a.receiver_shape.is_some())
        {
            r.tier = RefTier::Anchored;
        }
    }
    bundle.anchors = anchors;
}

/// JS/TS member_expression anchors. Receivers that are themselves calls
/// are skipped rather than speculatively resolved.
fn collect_member_anchors(
    node: Node,
    content: &str,
    depth: usize,
    counts: &mut HashMap<(String, Option<String>), u32>,
) {
    if depth > MAX_WALK_DEPTH {
        return;
    }
    if node.kind() == "member_expression" {
        if let Some(property) = node.child_by_field_name("property") {
            let receiver = node.child_by_field_name("object").and_then(|obj| {
                match obj.kind() {
                    "identifier" | "member_expression" | "this" => {
                        Some(node_text(obj, content).to_string())
                    }
                    _ => None,
                }
            });
            if receiver.is_some() {
                let member = node_text(property, content).to_string();
                *counts.entry((member, receiver)).or_insert(0) += 1;
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_member_anchors(child, content, depth + 1, counts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::SourceParser;

    fn extract_from(path: &str, source: &str) -> FactBundle {
        let mut parser = SourceParser::new();
        let parsed = parser.parse(path, source.as_bytes()).unwrap();
        extract(&parsed, source, path)
    }

    #[test]
    fn test_def_uid_stability() {
        let a = def_uid("src/a.py", "f", DefKind::Function);
        let b = def_uid("src/a.py", "f", DefKind::Function);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, def_uid("src/a.py", "g", DefKind::Function));
        assert_ne!(a, def_uid("src/b.py", "f", DefKind::Function));
        assert_ne!(a, def_uid("src/a.py", "f", DefKind::Method));
    }

    #[test]
    fn test_body_change_keeps_uid() {
        let v1 = extract_from("a.py", "def f():\n    return 1\n");
        let v2 = extract_from("a.py", "def f():\n    return 2 + 2\n");
        assert_eq!(v1.defs[0].def_uid, v2.defs[0].def_uid);
        assert_ne!(
            body_hash(&v1.defs[0], "def f():\n    return 1\n"),
            body_hash(&v2.defs[0], "def f():\n    return 2 + 2\n")
        );
    }

    #[test]
    fn test_rename_changes_uid() {
        let v1 = extract_from("a.py", "def f():\n    pass\n");
        let v2 = extract_from("a.py", "def g():\n    pass\n");
        assert_ne!(v1.defs[0].def_uid, v2.defs[0].def_uid);
    }

    #[test]
    fn test_python_method_lexical_path() {
        let bundle = extract_from(
            "a.py",
            "class Greeter:\n    def greet(self, name):\n        return name\n",
        );
        let class = bundle.defs.iter().find(|d| d.name == "Greeter").unwrap();
        assert_eq!(class.kind, DefKind::Class);
        let method = bundle.defs.iter().find(|d| d.name == "greet").unwrap();
        assert_eq!(method.kind, DefKind::Method);
        assert_eq!(method.lexical_path, "Greeter.greet");
        assert_eq!(method.signature.as_deref(), Some("greet(self, name)"));
    }

    #[test]
    fn test_rust_impl_method() {
        let source = "struct S;\nimpl S {\n    fn go(&self) {}\n}\n";
        let bundle = extract_from("a.rs", source);
        let method = bundle.defs.iter().find(|d| d.name == "go").unwrap();
        assert_eq!(method.kind, DefKind::Method);
        assert_eq!(method.lexical_path, "S.go");
    }

    #[test]
    fn test_proven_local_reference() {
        let bundle = extract_from("a.py", "def f():\n    pass\n\nf()\n");
        let call_ref = bundle
            .refs
            .iter()
            .find(|r| r.token_text == "f" && r.role == RefRole::Reference)
            .unwrap();
        assert_eq!(call_ref.tier, RefTier::Proven);
        assert_eq!(
            call_ref.target_def_uid.as_deref(),
            Some(bundle.defs[0].def_uid.as_str())
        );
    }

    #[test]
    fn test_unknown_reference() {
        let bundle = extract_from("a.py", "undefined_name()\n");
        let r = bundle
            .refs
            .iter()
            .find(|r| r.token_text == "undefined_name")
            .unwrap();
        assert_eq!(r.tier, RefTier::Unknown);
        assert!(r.target_def_uid.is_none());
    }

    #[test]
    fn test_definition_role_ref() {
        let bundle = extract_from("a.py", "def f():\n    pass\n");
        let def_ref = bundle
            .refs
            .iter()
            .find(|r| r.role == RefRole::Definition)
            .unwrap();
        assert_eq!(def_ref.token_text, "f");
        assert_eq!(def_ref.tier, RefTier::Proven);
    }

    #[test]
    fn test_write_role() {
        let bundle = extract_from("a.py", "x = 1\nx = 2\n");
        assert!(
            bundle
                .refs
                .iter()
                .any(|r| r.token_text == "x" && r.role == RefRole::Write)
        );
    }

    #[test]
    fn test_export_surface_top_level_only() {
        let bundle = extract_from(
            "a.py",
            "class C:\n    def m(self):\n        pass\n\ndef f():\n    pass\n",
        );
        let exported: Vec<&str> = bundle
            .exports
            .iter()
            .map(|e| e.exported_name.as_str())
            .collect();
        assert!(exported.contains(&"C"));
        assert!(exported.contains(&"f"));
        assert!(!exported.contains(&"m"));
    }

    #[test]
    fn test_interface_hash_ignores_body() {
        let v1 = extract_from("a.py", "def f(a, b):\n    return a\n");
        let v2 = extract_from("a.py", "def f(a, b):\n    return b * 2\n");
        assert_eq!(v1.interface_hash, v2.interface_hash);

        let v3 = extract_from("a.py", "def f(a, b, c):\n    return a\n");
        assert_ne!(v1.interface_hash, v3.interface_hash);
    }

    #[test]
    fn test_js_member_anchors() {
        let bundle = extract_from("a.js", "const s = obj.helper;\nobj.helper();\n");
        let anchor = bundle
            .anchors
            .iter()
            .find(|a| a.member_token == "helper")
            .unwrap();
        assert_eq!(anchor.receiver_shape.as_deref(), Some("obj"));
        assert_eq!(anchor.count, 2);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let source = "class A:\n    def m(self):\n        return other(self.x)\n";
        let a = extract_from("a.py", source);
        let b = extract_from("a.py", source);
        assert_eq!(a.defs, b.defs);
        assert_eq!(a.refs, b.refs);
        assert_eq!(a.interface_hash, b.interface_hash);
    }
}
