//! Per-language import extraction and declared-module detection.
//!
//! Emits one [`ImportFact`] per import clause, preserving wildcards and
//! aliases verbatim so consumers can render the original semantics.
//! The walk covers the whole tree, so imports nested inside namespaces
//! (C#) or functions (Python, JS `require`) are found too.

use tree_sitter::Node;

use super::{ImportFact, MAX_WALK_DEPTH, import_uid, node_range, node_text};
use crate::types::{Certainty, ImportKind, Range};

/// Extract import facts and the source spans of the import statements
/// themselves (used to tag identifier occurrences with the import role).
pub fn extract_imports(
    root: Node,
    language: &str,
    content: &str,
    file_path: &str,
) -> (Vec<ImportFact>, Vec<Range>) {
    let mut facts = Vec::new();
    let mut spans = Vec::new();
    walk(root, language, content, file_path, 0, &mut facts, &mut spans);
    (facts, spans)
}

fn walk(
    node: Node,
    language: &str,
    content: &str,
    file_path: &str,
    depth: usize,
    facts: &mut Vec<ImportFact>,
    spans: &mut Vec<Range>,
) {
    if depth > MAX_WALK_DEPTH {
        return;
    }

    let before = facts.len();
    match (language, node.kind()) {
        ("python", "import_statement") => python_import(node, content, file_path, facts),
        ("python", "import_from_statement") => python_from(node, content, file_path, facts),
        ("javascript" | "typescript" | "tsx", "import_statement") => {
            js_import(node, content, file_path, facts)
        }
        ("javascript" | "typescript" | "tsx", "call_expression") => {
            js_call(node, content, file_path, facts)
        }
        ("go", "import_spec") => go_import(node, content, file_path, facts),
        ("rust", "use_declaration") => rust_use(node, content, file_path, facts),
        ("c" | "cpp", "preproc_include") => c_include(node, content, file_path, facts),
        ("csharp", "using_directive") => csharp_using(node, content, file_path, facts),
        ("ruby", "call") => ruby_require(node, content, file_path, facts),
        ("php", "namespace_use_declaration") => php_use(node, content, file_path, facts),
        ("lua", "function_call") => lua_require(node, content, file_path, facts),
        _ => {}
    }
    if facts.len() > before {
        spans.push(node_range(node));
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, language, content, file_path, depth + 1, facts, spans);
    }
}

fn push(
    facts: &mut Vec<ImportFact>,
    file_path: &str,
    kind: ImportKind,
    source_literal: &str,
    imported_name: &str,
    alias: Option<String>,
    range: Range,
) {
    facts.push(ImportFact {
        import_uid: import_uid(file_path, source_literal, imported_name, range),
        imported_name: imported_name.to_string(),
        alias,
        source_literal: source_literal.to_string(),
        kind,
        resolved_path: None,
        certainty: Certainty::Certain,
        range,
    });
}

/// Strip string delimiters: quotes, and angle brackets for C system
/// includes.
fn unquote(text: &str) -> &str {
    let t = text.trim();
    if t.len() >= 2 {
        let bytes = t.as_bytes();
        let (first, last) = (bytes[0], bytes[t.len() - 1]);
        if (first == b'"' && last == b'"')
            || (first == b'\'' && last == b'\'')
            || (first == b'<' && last == b'>')
            || (first == b'`' && last == b'`')
        {
            return &t[1..t.len() - 1];
        }
    }
    t
}

fn last_segment<'a>(path: &'a str, separator: &str) -> &'a str {
    path.rsplit(separator).next().unwrap_or(path)
}

// ----- Python -----

/// `import a.b as c` / `import a.b, d`
fn python_import(node: Node, content: &str, file_path: &str, facts: &mut Vec<ImportFact>) {
    let range = node_range(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "dotted_name" => {
                let name = node_text(child, content);
                push(facts, file_path, ImportKind::PythonImport, name, name, None, range);
            }
            "aliased_import" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name_node, content);
                let alias = child
                    .child_by_field_name("alias")
                    .map(|a| node_text(a, content).to_string());
                push(facts, file_path, ImportKind::PythonImport, name, name, alias, range);
            }
            _ => {}
        }
    }
}

/// `from pkg import x, y as z` / `from . import *`
fn python_from(node: Node, content: &str, file_path: &str, facts: &mut Vec<ImportFact>) {
    let range = node_range(node);
    let Some(module_node) = node.child_by_field_name("module_name") else {
        return;
    };
    let module = node_text(module_node, content);

    let mut cursor = node.walk();
    let mut past_module = false;
    for child in node.children(&mut cursor) {
        if child.id() == module_node.id() {
            past_module = true;
            continue;
        }
        if !past_module {
            continue;
        }
        match child.kind() {
            "dotted_name" | "identifier" => {
                let name = node_text(child, content);
                push(facts, file_path, ImportKind::PythonFrom, module, name, None, range);
            }
            "aliased_import" => {
                let Some(name_node) = child.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name_node, content);
                let alias = child
                    .child_by_field_name("alias")
                    .map(|a| node_text(a, content).to_string());
                push(facts, file_path, ImportKind::PythonFrom, module, name, alias, range);
            }
            "wildcard_import" => {
                push(facts, file_path, ImportKind::PythonFrom, module, "*", None, range);
            }
            _ => {}
        }
    }
}

// ----- JavaScript / TypeScript -----

/// `import X from './p'` / `import {a, b as c} from './p'` /
/// `import * as N from './p'` / side-effect `import './p'`
fn js_import(node: Node, content: &str, file_path: &str, facts: &mut Vec<ImportFact>) {
    let range = node_range(node);
    let Some(source_node) = node.child_by_field_name("source") else {
        return;
    };
    let source = unquote(node_text(source_node, content)).to_string();

    let mut bound_any = false;
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current.kind() {
            "import_clause" | "named_imports" | "namespace_import" => {
                let mut cursor = current.walk();
                for child in current.children(&mut cursor) {
                    stack.push(child);
                }
                if current.kind() == "namespace_import" {
                    // `* as N`
                    if let Some(alias) = current
                        .children(&mut current.walk())
                        .find(|c| c.kind() == "identifier")
                    {
                        push(
                            facts,
                            file_path,
                            ImportKind::JsImport,
                            &source,
                            "*",
                            Some(node_text(alias, content).to_string()),
                            range,
                        );
                        bound_any = true;
                    }
                }
            }
            "import_specifier" => {
                let Some(name_node) = current.child_by_field_name("name") else {
                    continue;
                };
                let name = node_text(name_node, content);
                let alias = current
                    .child_by_field_name("alias")
                    .map(|a| node_text(a, content).to_string());
                push(facts, file_path, ImportKind::JsImport, &source, name, alias, range);
                bound_any = true;
            }
            "identifier" if current.parent().is_some_and(|p| p.kind() == "import_clause") => {
                // Default import
                let name = node_text(current, content);
                push(facts, file_path, ImportKind::JsImport, &source, name, None, range);
                bound_any = true;
            }
            _ if current.id() == node.id() => {
                let mut cursor = current.walk();
                for child in current.children(&mut cursor) {
                    stack.push(child);
                }
            }
            _ => {}
        }
    }

    if !bound_any {
        push(facts, file_path, ImportKind::JsImport, &source, "*", None, range);
    }
}

/// `require('./p')` and `await import('./p')`
fn js_call(node: Node, content: &str, file_path: &str, facts: &mut Vec<ImportFact>) {
    let Some(function) = node.child_by_field_name("function") else {
        return;
    };
    let kind = match (function.kind(), node_text(function, content)) {
        ("identifier", "require") => ImportKind::JsRequire,
        ("import", _) => ImportKind::JsDynamicImport,
        _ => return,
    };
    let Some(args) = node.child_by_field_name("arguments") else {
        return;
    };
    let Some(arg) = args
        .children(&mut args.walk())
        .find(|c| c.kind() == "string")
    else {
        return;
    };
    let source = unquote(node_text(arg, content)).to_string();
    let range = node_range(node);

    // `const x = require('./p')` binds the declarator name.
    let bound = node
        .parent()
        .filter(|p| p.kind() == "variable_declarator")
        .and_then(|p| p.child_by_field_name("name"))
        .map(|n| node_text(n, content).to_string());

    match bound {
        Some(name) => push(facts, file_path, kind, &source, &name, None, range),
        None => push(facts, file_path, kind, &source, "*", None, range),
    }
}

// ----- Go -----

/// `import "example.com/x/y"` / `import alias "example.com/x/y"`
fn go_import(node: Node, content: &str, file_path: &str, facts: &mut Vec<ImportFact>) {
    let range = node_range(node);
    let Some(path_node) = node.child_by_field_name("path") else {
        return;
    };
    let source = unquote(node_text(path_node, content)).to_string();
    let alias = node
        .child_by_field_name("name")
        .map(|n| node_text(n, content).to_string())
        .filter(|n| n != "_" && n != ".");
    let imported = last_segment(&source, "/").to_string();
    push(
        facts,
        file_path,
        ImportKind::GoImport,
        &source,
        &imported,
        alias,
        range,
    );
}

// ----- Rust -----

/// `use crate::a::b as c;` with `use_list`/`use_wildcard` expansion.
/// Relative prefixes (`crate::`, `self::`, `super::`) stay verbatim in
/// the source literal; the resolver rewrites them.
fn rust_use(node: Node, content: &str, file_path: &str, facts: &mut Vec<ImportFact>) {
    let range = node_range(node);
    let Some(argument) = node.child_by_field_name("argument") else {
        return;
    };
    flatten_use_tree(argument, content, file_path, "", range, facts);
}

fn flatten_use_tree(
    node: Node,
    content: &str,
    file_path: &str,
    prefix: &str,
    range: Range,
    facts: &mut Vec<ImportFact>,
) {
    let joined = |leaf: &str| -> String {
        if prefix.is_empty() {
            leaf.to_string()
        } else {
            format!("{prefix}::{leaf}")
        }
    };
    match node.kind() {
        "identifier" | "scoped_identifier" | "crate" | "super" | "self" => {
            let path = joined(node_text(node, content));
            let name = last_segment(&path, "::").to_string();
            push(facts, file_path, ImportKind::RustUse, &path, &name, None, range);
        }
        "use_as_clause" => {
            let Some(path_node) = node.child_by_field_name("path") else {
                return;
            };
            let path = joined(node_text(path_node, content));
            let name = last_segment(&path, "::").to_string();
            let alias = node
                .child_by_field_name("alias")
                .map(|a| node_text(a, content).to_string());
            push(facts, file_path, ImportKind::RustUse, &path, &name, alias, range);
        }
        "use_wildcard" => {
            let inner = node
                .children(&mut node.walk())
                .find(|c| matches!(c.kind(), "identifier" | "scoped_identifier" | "crate" | "super" | "self"))
                .map(|c| node_text(c, content).to_string())
                .unwrap_or_default();
            let path = if inner.is_empty() {
                prefix.to_string()
            } else {
                joined(&inner)
            };
            push(facts, file_path, ImportKind::RustUse, &path, "*", None, range);
        }
        "scoped_use_list" => {
            let new_prefix = node
                .child_by_field_name("path")
                .map(|p| joined(node_text(p, content)))
                .unwrap_or_else(|| prefix.to_string());
            if let Some(list) = node.child_by_field_name("list") {
                flatten_use_tree(list, content, file_path, &new_prefix, range, facts);
            }
        }
        "use_list" => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.is_named() {
                    flatten_use_tree(child, content, file_path, prefix, range, facts);
                }
            }
        }
        _ => {}
    }
}

// ----- C / C++ -----

/// `#include "x.h"` / `#include <x.h>`
fn c_include(node: Node, content: &str, file_path: &str, facts: &mut Vec<ImportFact>) {
    let range = node_range(node);
    let Some(path_node) = node.child_by_field_name("path") else {
        return;
    };
    let source = unquote(node_text(path_node, content)).to_string();
    let imported = crate::paths::file_stem(&source).to_string();
    push(facts, file_path, ImportKind::CInclude, &source, &imported, None, range);
}

// ----- C# -----

/// The three directive forms: `using X;`, `using static X;`,
/// `using A = X;`. Nested namespace bodies are covered by the tree walk.
fn csharp_using(node: Node, content: &str, file_path: &str, facts: &mut Vec<ImportFact>) {
    let range = node_range(node);
    let mut is_static = false;
    let mut alias: Option<String> = None;
    let mut name: Option<String> = None;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "static" => is_static = true,
            "name_equals" => {
                alias = child
                    .children(&mut child.walk())
                    .find(|c| c.kind() == "identifier")
                    .map(|c| node_text(c, content).to_string());
            }
            "qualified_name" | "identifier" => {
                name = Some(node_text(child, content).to_string());
            }
            _ => {}
        }
    }

    let Some(source) = name else {
        return;
    };
    let kind = if is_static {
        ImportKind::CsharpUsingStatic
    } else if alias.is_some() {
        ImportKind::CsharpUsingAlias
    } else {
        ImportKind::CsharpUsing
    };
    let imported = last_segment(&source, ".").to_string();
    push(facts, file_path, kind, &source, &imported, alias, range);
}

// ----- Ruby -----

/// `require "x"` vs `require_relative "./x"` are distinct kinds.
fn ruby_require(node: Node, content: &str, file_path: &str, facts: &mut Vec<ImportFact>) {
    let Some(method) = node.child_by_field_name("method") else {
        return;
    };
    let kind = match node_text(method, content) {
        "require" => ImportKind::RubyRequire,
        "require_relative" => ImportKind::RubyRequireRelative,
        _ => return,
    };
    let Some(args) = node.child_by_field_name("arguments") else {
        return;
    };
    let Some(arg) = args
        .children(&mut args.walk())
        .find(|c| c.kind() == "string")
    else {
        return;
    };
    let source = unquote(node_text(arg, content)).to_string();
    let imported = crate::paths::file_stem(&source).to_string();
    push(facts, file_path, kind, &source, &imported, None, node_range(node));
}

// ----- PHP -----

/// `use A\B\C;`. Namespace separators normalize to dots so the
/// declaration matcher shares the JVM separator.
fn php_use(node: Node, content: &str, file_path: &str, facts: &mut Vec<ImportFact>) {
    let range = node_range(node);
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "namespace_use_clause" {
            let name = current
                .children(&mut current.walk())
                .find(|c| matches!(c.kind(), "qualified_name" | "name"))
                .map(|c| node_text(c, content).replace('\\', "."));
            let Some(source) = name else {
                continue;
            };
            let alias = current
                .children(&mut current.walk())
                .find(|c| c.kind() == "namespace_aliasing_clause")
                .and_then(|a| {
                    a.children(&mut a.walk())
                        .find(|c| c.kind() == "name")
                        .map(|c| node_text(c, content).to_string())
                });
            let imported = last_segment(&source, ".").to_string();
            push(facts, file_path, ImportKind::PhpUse, &source, &imported, alias, range);
            continue;
        }
        let mut cursor = current.walk();
        for child in current.children(&mut cursor) {
            stack.push(child);
        }
    }
}

// ----- Lua -----

/// `require("a.b.c")`
fn lua_require(node: Node, content: &str, file_path: &str, facts: &mut Vec<ImportFact>) {
    let Some(name) = node.child_by_field_name("name") else {
        return;
    };
    if node_text(name, content) != "require" {
        return;
    }
    let Some(args) = node.child_by_field_name("arguments") else {
        return;
    };
    let Some(arg) = args
        .children(&mut args.walk())
        .find(|c| c.kind() == "string")
    else {
        return;
    };
    let source = unquote(node_text(arg, content)).to_string();
    let imported = last_segment(&source, ".").to_string();
    push(
        facts,
        file_path,
        ImportKind::LuaRequire,
        &source,
        &imported,
        None,
        node_range(node),
    );
}

// ----- Declared modules -----

/// The module/namespace a file announces in-source: Go `package`, Java
/// `package`, C# `namespace` (block and file-scoped), PHP `namespace`,
/// Ruby's top-level module or class. Go returns the short package name,
/// which the config resolver later replaces with the module path.
pub fn declared_module(root: Node, language: &str, content: &str) -> Option<String> {
    match language {
        "go" => find_child(root, "package_clause")
            .and_then(|n| find_child(n, "package_identifier"))
            .map(|n| node_text(n, content).to_string()),
        "java" => find_child(root, "package_declaration").and_then(|n| {
            n.children(&mut n.walk())
                .find(|c| matches!(c.kind(), "scoped_identifier" | "identifier"))
                .map(|c| node_text(c, content).to_string())
        }),
        "csharp" => {
            let ns = find_deep(root, "file_scoped_namespace_declaration", 3)
                .or_else(|| find_deep(root, "namespace_declaration", 3))?;
            ns.child_by_field_name("name")
                .map(|n| node_text(n, content).to_string())
        }
        "php" => find_deep(root, "namespace_definition", 3).and_then(|n| {
            n.child_by_field_name("name")
                .map(|name| node_text(name, content).replace('\\', "."))
        }),
        "ruby" => root
            .children(&mut root.walk())
            .find(|c| matches!(c.kind(), "module" | "class"))
            .and_then(|n| n.child_by_field_name("name"))
            .map(|n| node_text(n, content).to_string()),
        _ => None,
    }
}

fn find_child<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    node.children(&mut node.walk()).find(|c| c.kind() == kind)
}

fn find_deep<'t>(node: Node<'t>, kind: &str, max_depth: usize) -> Option<Node<'t>> {
    if node.kind() == kind {
        return Some(node);
    }
    if max_depth == 0 {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_deep(child, kind, max_depth - 1) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::SourceParser;

    fn imports_from(path: &str, source: &str) -> Vec<ImportFact> {
        let mut parser = SourceParser::new();
        let parsed = parser.parse(path, source.as_bytes()).unwrap();
        extract_imports(parsed.root_node(), parsed.language, source, path).0
    }

    fn module_of(path: &str, source: &str) -> Option<String> {
        let mut parser = SourceParser::new();
        let parsed = parser.parse(path, source.as_bytes()).unwrap();
        declared_module(parsed.root_node(), parsed.language, source)
    }

    #[test]
    fn test_python_import_with_alias() {
        let facts = imports_from("a.py", "import a.b as c\n");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].imported_name, "a.b");
        assert_eq!(facts[0].alias.as_deref(), Some("c"));
        assert_eq!(facts[0].source_literal, "a.b");
        assert_eq!(facts[0].kind, ImportKind::PythonImport);
    }

    #[test]
    fn test_python_from_import() {
        let facts = imports_from("a.py", "from pkg import x, y as z\n");
        assert_eq!(facts.len(), 2);
        assert!(facts.iter().all(|f| f.source_literal == "pkg"));
        assert!(facts.iter().all(|f| f.kind == ImportKind::PythonFrom));
        assert_eq!(facts[0].imported_name, "x");
        assert_eq!(facts[1].imported_name, "y");
        assert_eq!(facts[1].alias.as_deref(), Some("z"));
    }

    #[test]
    fn test_python_relative_wildcard() {
        let facts = imports_from("pkg/a.py", "from . import *\n");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].imported_name, "*");
        assert_eq!(facts[0].source_literal, ".");
    }

    #[test]
    fn test_js_import_forms() {
        let facts = imports_from(
            "a.js",
            "import X from './p';\nimport {a, b as c} from './p';\nimport * as N from './p';\n",
        );
        assert_eq!(facts.len(), 4);
        assert!(facts.iter().all(|f| f.source_literal == "./p"));
        assert!(facts.iter().any(|f| f.imported_name == "X"));
        assert!(
            facts
                .iter()
                .any(|f| f.imported_name == "b" && f.alias.as_deref() == Some("c"))
        );
        assert!(
            facts
                .iter()
                .any(|f| f.imported_name == "*" && f.alias.as_deref() == Some("N"))
        );
    }

    #[test]
    fn test_js_require_and_dynamic_import() {
        let facts = imports_from(
            "a.js",
            "const util = require('./util');\nasync function f() {\n  await import('./lazy');\n}\n",
        );
        let require = facts
            .iter()
            .find(|f| f.kind == ImportKind::JsRequire)
            .unwrap();
        assert_eq!(require.imported_name, "util");
        assert_eq!(require.source_literal, "./util");
        let dynamic = facts
            .iter()
            .find(|f| f.kind == ImportKind::JsDynamicImport)
            .unwrap();
        assert_eq!(dynamic.source_literal, "./lazy");
    }

    #[test]
    fn test_go_import() {
        let facts = imports_from(
            "m.go",
            "package main\n\nimport (\n\t\"example.com/app/pkg/util\"\n\tx \"example.com/app/other\"\n)\n",
        );
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].kind, ImportKind::GoImport);
        assert_eq!(facts[0].source_literal, "example.com/app/pkg/util");
        assert_eq!(facts[0].imported_name, "util");
        assert_eq!(facts[1].alias.as_deref(), Some("x"));
    }

    #[test]
    fn test_rust_use_forms() {
        let facts = imports_from(
            "a.rs",
            "use crate::a::b as c;\nuse std::collections::{HashMap, HashSet};\nuse super::util::*;\n",
        );
        let aliased = facts.iter().find(|f| f.alias.is_some()).unwrap();
        assert_eq!(aliased.source_literal, "crate::a::b");
        assert_eq!(aliased.alias.as_deref(), Some("c"));
        assert!(
            facts
                .iter()
                .any(|f| f.source_literal == "std::collections::HashMap")
        );
        assert!(
            facts
                .iter()
                .any(|f| f.source_literal == "std::collections::HashSet")
        );
        assert!(
            facts
                .iter()
                .any(|f| f.imported_name == "*" && f.source_literal == "super::util")
        );
    }

    #[test]
    fn test_c_include_forms() {
        let facts = imports_from("a.c", "#include \"x.h\"\n#include <stdio.h>\n");
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].source_literal, "x.h");
        assert_eq!(facts[1].source_literal, "stdio.h");
        assert!(facts.iter().all(|f| f.kind == ImportKind::CInclude));
    }

    #[test]
    fn test_csharp_using_forms() {
        let source = "using System;\nusing static System.Math;\nusing IO = System.IO;\n\nnamespace App {\n  using System.Text;\n  class C {}\n}\n";
        let facts = imports_from("a.cs", source);
        assert!(facts.iter().any(|f| f.kind == ImportKind::CsharpUsing
            && f.source_literal == "System"));
        assert!(facts.iter().any(|f| f.kind == ImportKind::CsharpUsingStatic
            && f.source_literal == "System.Math"));
        assert!(facts.iter().any(|f| f.kind == ImportKind::CsharpUsingAlias
            && f.alias.as_deref() == Some("IO")));
        // The using nested inside the namespace body is found too.
        assert!(facts.iter().any(|f| f.source_literal == "System.Text"));
    }

    #[test]
    fn test_ruby_require_kinds() {
        let facts = imports_from("a.rb", "require \"json\"\nrequire_relative \"./helper\"\n");
        assert!(facts.iter().any(|f| f.kind == ImportKind::RubyRequire
            && f.source_literal == "json"));
        assert!(
            facts
                .iter()
                .any(|f| f.kind == ImportKind::RubyRequireRelative
                    && f.source_literal == "./helper")
        );
    }

    #[test]
    fn test_php_use() {
        let facts = imports_from("a.php", "<?php\nuse App\\Models\\User;\n");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].kind, ImportKind::PhpUse);
        assert_eq!(facts[0].source_literal, "App.Models.User");
        assert_eq!(facts[0].imported_name, "User");
    }

    #[test]
    fn test_lua_require() {
        let facts = imports_from("a.lua", "local m = require(\"a.b.c\")\n");
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].kind, ImportKind::LuaRequire);
        assert_eq!(facts[0].source_literal, "a.b.c");
    }

    #[test]
    fn test_declared_modules() {
        assert_eq!(
            module_of("m.go", "package util\n\nfunc F() {}\n").as_deref(),
            Some("util")
        );
        assert_eq!(
            module_of("A.java", "package com.example.app;\n\nclass A {}\n").as_deref(),
            Some("com.example.app")
        );
        assert_eq!(
            module_of("A.cs", "namespace App.Core;\n\nclass A {}\n").as_deref(),
            Some("App.Core")
        );
        assert_eq!(
            module_of("A.cs", "namespace App.Core {\n  class A {}\n}\n").as_deref(),
            Some("App.Core")
        );
        assert_eq!(
            module_of("a.php", "<?php\nnamespace App\\Models;\n").as_deref(),
            Some("App.Models")
        );
        assert_eq!(module_of("a.py", "x = 1\n"), None);
    }
}

