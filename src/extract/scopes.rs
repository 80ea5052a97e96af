//! Scope tree construction and binding-site collection.
//!
//! Every file gets exactly one root scope of kind `file` spanning the
//! whole tree; nodes whose kind the language maps to a scope kind open
//! child scopes. Name resolution walks the chain innermost-out and the
//! first matching binding wins; hoisting subtleties are not modeled and
//! unresolved names stay at the unknown tier.

use tree_sitter::Node;

use super::{LocalBindFact, MAX_WALK_DEPTH, ScopeFact, node_range, node_text};
use crate::parsing::queries::scope_kind_for;
use crate::types::{BindTargetKind, Certainty, Range, ScopeKind};

/// Build the scope tree for a file. Index 0 is always the file scope.
pub fn build_scope_tree(root: Node, language: &str) -> Vec<ScopeFact> {
    let mut scopes = vec![ScopeFact {
        index: 0,
        parent: None,
        kind: ScopeKind::File,
        range: node_range(root),
    }];
    walk(root, language, 0, 0, &mut scopes);
    scopes
}

fn walk(node: Node, language: &str, parent: usize, depth: usize, scopes: &mut Vec<ScopeFact>) {
    if depth > MAX_WALK_DEPTH {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let child_parent = match scope_kind_for(language, child.kind()) {
            Some(kind) => {
                let index = scopes.len();
                scopes.push(ScopeFact {
                    index,
                    parent: Some(parent),
                    kind,
                    range: node_range(child),
                });
                index
            }
            None => parent,
        };
        walk(child, language, child_parent, depth + 1, scopes);
    }
}

/// Innermost scope containing the point.
pub fn enclosing_scope_at(scopes: &[ScopeFact], line: u32, column: u16) -> usize {
    let mut best = 0usize;
    let mut best_span = u32::MAX;
    for scope in scopes {
        if scope.range.contains_point(line, column) {
            let span = scope.range.end_line - scope.range.start_line;
            if span <= best_span {
                best = scope.index;
                best_span = span;
            }
        }
    }
    best
}

/// Innermost scope containing the range, excluding a scope that *is* the
/// range (a definition's name binds in the scope around it, not in the
/// scope its own body opens).
pub fn enclosing_scope(scopes: &[ScopeFact], range: Range) -> usize {
    let mut best = 0usize;
    let mut best_span = u32::MAX;
    for scope in scopes {
        if scope.range == range {
            continue;
        }
        if scope.range.contains_lines(&range) {
            let span = scope.range.end_line - scope.range.start_line;
            if span <= best_span {
                best = scope.index;
                best_span = span;
            }
        }
    }
    best
}

/// Scope whose range equals the given range (a definition node's own
/// scope), if one exists.
pub fn scope_matching(scopes: &[ScopeFact], range: Range) -> Option<usize> {
    scopes
        .iter()
        .find(|s| s.range == range)
        .map(|s| s.index)
}

/// Walk the scope chain innermost-out; first binding for `name` wins.
pub fn resolve_in_chain<'a>(
    scopes: &[ScopeFact],
    binds: &'a [LocalBindFact],
    mut scope: usize,
    name: &str,
) -> Option<&'a LocalBindFact> {
    loop {
        if let Some(bind) = binds
            .iter()
            .find(|b| b.scope_index == scope && b.name == name)
        {
            return Some(bind);
        }
        match scopes.get(scope).and_then(|s| s.parent) {
            Some(parent) => scope = parent,
            None => return None,
        }
    }
}

/// Collect parameter and local-assignment bindings.
///
/// Parameters bind into the scope their function node opens; assignment
/// targets bind into the scope enclosing the assignment.
pub fn collect_binding_sites(
    root: Node,
    language: &str,
    content: &str,
    scopes: &[ScopeFact],
) -> Vec<LocalBindFact> {
    let mut binds = Vec::new();
    collect(root, language, content, scopes, 0, &mut binds);
    binds
}

fn collect(
    node: Node,
    language: &str,
    content: &str,
    scopes: &[ScopeFact],
    depth: usize,
    binds: &mut Vec<LocalBindFact>,
) {
    if depth > MAX_WALK_DEPTH {
        return;
    }

    if scope_kind_for(language, node.kind()) == Some(ScopeKind::Function) {
        if let Some(params) = node.child_by_field_name("parameters") {
            let scope = scope_matching(scopes, node_range(node))
                .unwrap_or_else(|| enclosing_scope_at(scopes, node_range(node).start_line, 0));
            bind_parameter_names(params, content, scope, binds);
        }
    }

    match (language, node.kind()) {
        ("python", "assignment") => {
            if let Some(left) = node.child_by_field_name("left") {
                if left.kind() == "identifier" {
                    push_local(binds, scopes, left, content, "assign");
                }
            }
        }
        ("javascript" | "typescript" | "tsx", "variable_declarator") => {
            if let Some(name) = node.child_by_field_name("name") {
                if name.kind() == "identifier" {
                    push_local(binds, scopes, name, content, "declare");
                }
            }
        }
        ("rust", "let_declaration") => {
            if let Some(pattern) = node.child_by_field_name("pattern") {
                if pattern.kind() == "identifier" {
                    push_local(binds, scopes, pattern, content, "let");
                }
            }
        }
        ("go", "short_var_declaration") => {
            if let Some(left) = node.child_by_field_name("left") {
                let mut cursor = left.walk();
                for child in left.children(&mut cursor) {
                    if child.kind() == "identifier" {
                        push_local(binds, scopes, child, content, "declare");
                    }
                }
            }
        }
        ("lua", "variable_declaration") => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "assignment_statement" {
                    collect(child, language, content, scopes, depth + 1, binds);
                }
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect(child, language, content, scopes, depth + 1, binds);
    }
}

/// Bind plain `identifier` children of a parameter list. Type names in
/// typed languages surface as `type_identifier` and stay out.
fn bind_parameter_names(
    params: Node,
    content: &str,
    scope: usize,
    binds: &mut Vec<LocalBindFact>,
) {
    let mut stack = vec![params];
    while let Some(node) = stack.pop() {
        if node.kind() == "identifier" {
            let name = node_text(node, content);
            if !name.is_empty() && !binds.iter().any(|b| b.scope_index == scope && b.name == name)
            {
                binds.push(LocalBindFact {
                    scope_index: scope,
                    name: name.to_string(),
                    target_kind: BindTargetKind::Parameter,
                    target_uid: None,
                    certainty: Certainty::Certain,
                    reason_code: "param",
                });
            }
            continue;
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            stack.push(child);
        }
    }
}

fn push_local(
    binds: &mut Vec<LocalBindFact>,
    scopes: &[ScopeFact],
    name_node: Node,
    content: &str,
    reason: &'static str,
) {
    let name = node_text(name_node, content);
    if name.is_empty() {
        return;
    }
    let range = node_range(name_node);
    let scope = enclosing_scope_at(scopes, range.start_line, range.start_column);
    if binds
        .iter()
        .any(|b| b.scope_index == scope && b.name == name)
    {
        return;
    }
    binds.push(LocalBindFact {
        scope_index: scope,
        name: name.to_string(),
        target_kind: BindTargetKind::Local,
        target_uid: None,
        certainty: Certainty::Certain,
        reason_code: reason,
    });
}
