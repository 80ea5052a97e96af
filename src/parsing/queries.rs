//! Per-language tree-sitter query configurations for fact extraction.
//!
//! Each language defines:
//! - `query_text`: S-expression patterns with `@name`, `@node`, and
//!   optionally `@params` captures
//! - `patterns`: ordered table mapping pattern index to def kind (and the
//!   kind used when the match sits inside a container)
//! - `containers`: node kinds that establish lexical-path context, with
//!   the field carrying their name
//!
//! Capture conventions:
//! - `@node`  -- the whole definition node (line/column span)
//! - `@name`  -- the name node (decoded for the symbol name)
//! - `@params` -- parameter list node (decoded for the signature)

use crate::types::{DefKind, ScopeKind};

/// Maps a query pattern index to def extraction metadata.
#[derive(Debug, Clone, Copy)]
pub struct SymbolPattern {
    pub kind: DefKind,
    /// Kind used when the definition sits inside a container.
    pub nested_kind: Option<DefKind>,
}

impl SymbolPattern {
    const fn of(kind: DefKind) -> Self {
        Self {
            kind,
            nested_kind: None,
        }
    }

    const fn nested(kind: DefKind, nested: DefKind) -> Self {
        Self {
            kind,
            nested_kind: Some(nested),
        }
    }
}

/// A container node kind and the field its name lives in.
#[derive(Debug, Clone, Copy)]
pub struct ContainerDef {
    pub node_kind: &'static str,
    pub name_field: &'static str,
}

/// Complete query configuration for one language.
#[derive(Debug, Clone, Copy)]
pub struct LanguageQueryConfig {
    pub query_text: &'static str,
    pub patterns: &'static [SymbolPattern],
    pub containers: &'static [ContainerDef],
}

const PYTHON: LanguageQueryConfig = LanguageQueryConfig {
    query_text: r#"
        (function_definition
            name: (identifier) @name
            parameters: (parameters) @params) @node
        (class_definition
            name: (identifier) @name) @node
    "#,
    patterns: &[
        SymbolPattern::nested(DefKind::Function, DefKind::Method),
        SymbolPattern::of(DefKind::Class),
    ],
    containers: &[ContainerDef {
        node_kind: "class_definition",
        name_field: "name",
    }],
};

const JAVASCRIPT: LanguageQueryConfig = LanguageQueryConfig {
    query_text: r#"
        (function_declaration
            name: (identifier) @name
            parameters: (formal_parameters) @params) @node
        (generator_function_declaration
            name: (identifier) @name
            parameters: (formal_parameters) @params) @node
        (class_declaration
            name: (identifier) @name) @node
        (method_definition
            name: (property_identifier) @name
            parameters: (formal_parameters) @params) @node
    "#,
    patterns: &[
        SymbolPattern::of(DefKind::Function),
        SymbolPattern::of(DefKind::Function),
        SymbolPattern::of(DefKind::Class),
        SymbolPattern::of(DefKind::Method),
    ],
    containers: &[ContainerDef {
        node_kind: "class_declaration",
        name_field: "name",
    }],
};

const TYPESCRIPT: LanguageQueryConfig = LanguageQueryConfig {
    query_text: r#"
        (function_declaration
            name: (identifier) @name
            parameters: (formal_parameters) @params) @node
        (generator_function_declaration
            name: (identifier) @name
            parameters: (formal_parameters) @params) @node
        (class_declaration
            name: (type_identifier) @name) @node
        (method_definition
            name: (property_identifier) @name
            parameters: (formal_parameters) @params) @node
        (interface_declaration
            name: (type_identifier) @name) @node
        (type_alias_declaration
            name: (type_identifier) @name) @node
        (enum_declaration
            name: (identifier) @name) @node
    "#,
    patterns: &[
        SymbolPattern::of(DefKind::Function),
        SymbolPattern::of(DefKind::Function),
        SymbolPattern::of(DefKind::Class),
        SymbolPattern::of(DefKind::Method),
        SymbolPattern::of(DefKind::Interface),
        SymbolPattern::of(DefKind::TypeAlias),
        SymbolPattern::of(DefKind::Enum),
    ],
    containers: &[ContainerDef {
        node_kind: "class_declaration",
        name_field: "name",
    }],
};

const GO: LanguageQueryConfig = LanguageQueryConfig {
    query_text: r#"
        (function_declaration
            name: (identifier) @name
            parameters: (parameter_list) @params) @node
        (method_declaration
            name: (field_identifier) @name
            parameters: (parameter_list) @params) @node
        (type_declaration
            (type_spec
                name: (type_identifier) @name) @node)
    "#,
    patterns: &[
        SymbolPattern::of(DefKind::Function),
        SymbolPattern::of(DefKind::Method),
        SymbolPattern::of(DefKind::Struct),
    ],
    containers: &[],
};

const RUST: LanguageQueryConfig = LanguageQueryConfig {
    query_text: r#"
        (function_item
            name: (identifier) @name
            parameters: (parameters) @params) @node
        (struct_item
            name: (type_identifier) @name) @node
        (enum_item
            name: (type_identifier) @name) @node
        (trait_item
            name: (type_identifier) @name) @node
        (type_item
            name: (type_identifier) @name) @node
        (const_item
            name: (identifier) @name) @node
        (static_item
            name: (identifier) @name) @node
        (mod_item
            name: (identifier) @name) @node
    "#,
    patterns: &[
        SymbolPattern::nested(DefKind::Function, DefKind::Method),
        SymbolPattern::of(DefKind::Struct),
        SymbolPattern::of(DefKind::Enum),
        SymbolPattern::of(DefKind::Trait),
        SymbolPattern::of(DefKind::TypeAlias),
        SymbolPattern::of(DefKind::Constant),
        SymbolPattern::of(DefKind::Variable),
        SymbolPattern::of(DefKind::Module),
    ],
    containers: &[
        ContainerDef {
            node_kind: "impl_item",
            name_field: "type",
        },
        ContainerDef {
            node_kind: "trait_item",
            name_field: "name",
        },
        ContainerDef {
            node_kind: "mod_item",
            name_field: "name",
        },
    ],
};

const JAVA: LanguageQueryConfig = LanguageQueryConfig {
    query_text: r#"
        (class_declaration
            name: (identifier) @name) @node
        (interface_declaration
            name: (identifier) @name) @node
        (enum_declaration
            name: (identifier) @name) @node
        (record_declaration
            name: (identifier) @name
            parameters: (formal_parameters) @params) @node
        (method_declaration
            name: (identifier) @name
            parameters: (formal_parameters) @params) @node
        (constructor_declaration
            name: (identifier) @name
            parameters: (formal_parameters) @params) @node
        (enum_constant
            name: (identifier) @name) @node
    "#,
    patterns: &[
        SymbolPattern::of(DefKind::Class),
        SymbolPattern::of(DefKind::Interface),
        SymbolPattern::of(DefKind::Enum),
        SymbolPattern::of(DefKind::Record),
        SymbolPattern::of(DefKind::Method),
        SymbolPattern::of(DefKind::Constructor),
        SymbolPattern::of(DefKind::EnumConstant),
    ],
    containers: &[
        ContainerDef {
            node_kind: "class_declaration",
            name_field: "name",
        },
        ContainerDef {
            node_kind: "interface_declaration",
            name_field: "name",
        },
        ContainerDef {
            node_kind: "enum_declaration",
            name_field: "name",
        },
    ],
};

const CSHARP: LanguageQueryConfig = LanguageQueryConfig {
    query_text: r#"
        (class_declaration
            name: (identifier) @name) @node
        (interface_declaration
            name: (identifier) @name) @node
        (struct_declaration
            name: (identifier) @name) @node
        (enum_declaration
            name: (identifier) @name) @node
        (record_declaration
            name: (identifier) @name) @node
        (method_declaration
            name: (identifier) @name
            parameters: (parameter_list) @params) @node
        (constructor_declaration
            name: (identifier) @name
            parameters: (parameter_list) @params) @node
        (property_declaration
            name: (identifier) @name) @node
    "#,
    patterns: &[
        SymbolPattern::of(DefKind::Class),
        SymbolPattern::of(DefKind::Interface),
        SymbolPattern::of(DefKind::Struct),
        SymbolPattern::of(DefKind::Enum),
        SymbolPattern::of(DefKind::Record),
        SymbolPattern::of(DefKind::Method),
        SymbolPattern::of(DefKind::Constructor),
        SymbolPattern::of(DefKind::Property),
    ],
    containers: &[
        ContainerDef {
            node_kind: "class_declaration",
            name_field: "name",
        },
        ContainerDef {
            node_kind: "interface_declaration",
            name_field: "name",
        },
        ContainerDef {
            node_kind: "struct_declaration",
            name_field: "name",
        },
        ContainerDef {
            node_kind: "namespace_declaration",
            name_field: "name",
        },
        ContainerDef {
            node_kind: "file_scoped_namespace_declaration",
            name_field: "name",
        },
    ],
};

const C: LanguageQueryConfig = LanguageQueryConfig {
    query_text: r#"
        (function_definition
            declarator: (function_declarator
                declarator: (identifier) @name
                parameters: (parameter_list) @params)) @node
        (struct_specifier
            name: (type_identifier) @name) @node
        (enum_specifier
            name: (type_identifier) @name) @node
        (type_definition
            declarator: (type_identifier) @name) @node
    "#,
    patterns: &[
        SymbolPattern::of(DefKind::Function),
        SymbolPattern::of(DefKind::Struct),
        SymbolPattern::of(DefKind::Enum),
        SymbolPattern::of(DefKind::TypeAlias),
    ],
    containers: &[],
};

const CPP: LanguageQueryConfig = LanguageQueryConfig {
    query_text: r#"
        (function_definition
            declarator: (function_declarator
                declarator: (identifier) @name
                parameters: (parameter_list) @params)) @node
        (class_specifier
            name: (type_identifier) @name) @node
        (struct_specifier
            name: (type_identifier) @name) @node
        (enum_specifier
            name: (type_identifier) @name) @node
        (namespace_definition
            name: (namespace_identifier) @name) @node
    "#,
    patterns: &[
        SymbolPattern::nested(DefKind::Function, DefKind::Method),
        SymbolPattern::of(DefKind::Class),
        SymbolPattern::of(DefKind::Struct),
        SymbolPattern::of(DefKind::Enum),
        SymbolPattern::of(DefKind::Module),
    ],
    containers: &[
        ContainerDef {
            node_kind: "class_specifier",
            name_field: "name",
        },
        ContainerDef {
            node_kind: "struct_specifier",
            name_field: "name",
        },
        ContainerDef {
            node_kind: "namespace_definition",
            name_field: "name",
        },
    ],
};

const RUBY: LanguageQueryConfig = LanguageQueryConfig {
    query_text: r#"
        (method
            name: (identifier) @name) @node
        (singleton_method
            name: (identifier) @name) @node
        (class
            name: (constant) @name) @node
        (module
            name: (constant) @name) @node
    "#,
    patterns: &[
        SymbolPattern::nested(DefKind::Function, DefKind::Method),
        SymbolPattern::of(DefKind::Method),
        SymbolPattern::of(DefKind::Class),
        SymbolPattern::of(DefKind::Module),
    ],
    containers: &[
        ContainerDef {
            node_kind: "class",
            name_field: "name",
        },
        ContainerDef {
            node_kind: "module",
            name_field: "name",
        },
    ],
};

const PHP: LanguageQueryConfig = LanguageQueryConfig {
    query_text: r#"
        (function_definition
            name: (name) @name
            parameters: (formal_parameters) @params) @node
        (method_declaration
            name: (name) @name
            parameters: (formal_parameters) @params) @node
        (class_declaration
            name: (name) @name) @node
        (interface_declaration
            name: (name) @name) @node
        (trait_declaration
            name: (name) @name) @node
        (enum_declaration
            name: (name) @name) @node
    "#,
    patterns: &[
        SymbolPattern::of(DefKind::Function),
        SymbolPattern::of(DefKind::Method),
        SymbolPattern::of(DefKind::Class),
        SymbolPattern::of(DefKind::Interface),
        SymbolPattern::of(DefKind::Trait),
        SymbolPattern::of(DefKind::Enum),
    ],
    containers: &[
        ContainerDef {
            node_kind: "class_declaration",
            name_field: "name",
        },
        ContainerDef {
            node_kind: "trait_declaration",
            name_field: "name",
        },
    ],
};

const LUA: LanguageQueryConfig = LanguageQueryConfig {
    query_text: r#"
        (function_declaration
            name: (_) @name) @node
    "#,
    patterns: &[SymbolPattern::of(DefKind::Function)],
    containers: &[],
};

/// Query configuration for a grammar-level language name. TSX reuses
/// the TypeScript patterns.
pub fn query_config(language: &str) -> Option<&'static LanguageQueryConfig> {
    Some(match language {
        "python" => &PYTHON,
        "javascript" => &JAVASCRIPT,
        "typescript" | "tsx" => &TYPESCRIPT,
        "go" => &GO,
        "rust" => &RUST,
        "java" => &JAVA,
        "csharp" => &CSHARP,
        "c" => &C,
        "cpp" => &CPP,
        "ruby" => &RUBY,
        "php" => &PHP,
        "lua" => &LUA,
        _ => return None,
    })
}

/// Scope kind for a node, per language. Nodes not listed open no scope.
pub fn scope_kind_for(language: &str, node_kind: &str) -> Option<ScopeKind> {
    let kind = match (language, node_kind) {
        ("python", "function_definition") | ("python", "lambda") => ScopeKind::Function,
        ("python", "class_definition") => ScopeKind::Class,
        (
            "python",
            "list_comprehension" | "set_comprehension" | "dictionary_comprehension"
            | "generator_expression",
        ) => ScopeKind::Comprehension,
        (
            "javascript" | "typescript" | "tsx",
            "function_declaration" | "generator_function_declaration" | "function_expression"
            | "arrow_function" | "method_definition",
        ) => ScopeKind::Function,
        ("javascript" | "typescript" | "tsx", "class_declaration") => ScopeKind::Class,
        ("javascript" | "typescript" | "tsx", "statement_block") => ScopeKind::Block,
        ("go", "function_declaration" | "method_declaration" | "func_literal") => {
            ScopeKind::Function
        }
        ("go", "block") => ScopeKind::Block,
        ("rust", "function_item" | "closure_expression") => ScopeKind::Function,
        ("rust", "impl_item" | "trait_item") => ScopeKind::Class,
        ("rust", "mod_item") => ScopeKind::Module,
        ("rust", "block") => ScopeKind::Block,
        ("java", "method_declaration" | "constructor_declaration" | "lambda_expression") => {
            ScopeKind::Function
        }
        ("java", "class_declaration" | "interface_declaration" | "enum_declaration") => {
            ScopeKind::Class
        }
        ("java", "block") => ScopeKind::Block,
        (
            "csharp",
            "method_declaration" | "constructor_declaration" | "local_function_statement",
        ) => ScopeKind::Function,
        ("csharp", "class_declaration" | "interface_declaration" | "struct_declaration") => {
            ScopeKind::Class
        }
        ("csharp", "namespace_declaration" | "file_scoped_namespace_declaration") => {
            ScopeKind::Module
        }
        ("csharp", "block") => ScopeKind::Block,
        ("c" | "cpp", "function_definition") => ScopeKind::Function,
        ("cpp", "class_specifier") => ScopeKind::Class,
        ("cpp", "namespace_definition") => ScopeKind::Module,
        ("c" | "cpp", "compound_statement") => ScopeKind::Block,
        ("ruby", "method" | "singleton_method" | "block" | "do_block") => ScopeKind::Function,
        ("ruby", "class") => ScopeKind::Class,
        ("ruby", "module") => ScopeKind::Module,
        ("php", "function_definition" | "method_declaration" | "anonymous_function") => {
            ScopeKind::Function
        }
        ("php", "class_declaration" | "trait_declaration") => ScopeKind::Class,
        ("php", "namespace_definition") => ScopeKind::Module,
        ("lua", "function_declaration" | "function_definition") => ScopeKind::Function,
        ("lua", "block") => ScopeKind::Block,
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parser::grammar_for;
    use tree_sitter::Query;

    #[test]
    fn test_pattern_tables_align_with_queries() {
        for language in [
            "python",
            "javascript",
            "typescript",
            "go",
            "rust",
            "java",
            "csharp",
            "c",
            "cpp",
            "ruby",
            "php",
            "lua",
        ] {
            let config = query_config(language).unwrap();
            let grammar = grammar_for(language).unwrap();
            let query = Query::new(&grammar, config.query_text)
                .unwrap_or_else(|e| panic!("bad query for {language}: {e}"));
            assert_eq!(
                query.pattern_count(),
                config.patterns.len(),
                "pattern table out of sync for {language}"
            );
        }
    }

    #[test]
    fn test_tsx_shares_typescript_config() {
        let ts = query_config("typescript").unwrap();
        let tsx = query_config("tsx").unwrap();
        assert!(std::ptr::eq(ts, tsx));
    }

    #[test]
    fn test_scope_kinds() {
        assert_eq!(
            scope_kind_for("python", "function_definition"),
            Some(ScopeKind::Function)
        );
        assert_eq!(
            scope_kind_for("python", "list_comprehension"),
            Some(ScopeKind::Comprehension)
        );
        assert_eq!(scope_kind_for("rust", "mod_item"), Some(ScopeKind::Module));
        assert_eq!(scope_kind_for("python", "call"), None);
        assert_eq!(scope_kind_for("cobol", "anything"), None);
    }
}
