//! Core identifier and fact types shared across the index.
//!
//! Ids are newtypes over `NonZeroU32` so that `Option<Id>` stays
//! pointer-sized and zero can never masquerade as a valid row id.
//! All enums that end up in the relational store round-trip through
//! stable lowercase strings via `as_str`/`parse`.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(NonZeroU32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(NonZeroU32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(NonZeroU32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EpochId(NonZeroU32);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            pub fn new(value: u32) -> Option<Self> {
                NonZeroU32::new(value).map(Self)
            }

            pub fn value(&self) -> u32 {
                self.0.get()
            }

            /// Convert to i64 for SQLite binding.
            pub fn as_i64(&self) -> i64 {
                i64::from(self.0.get())
            }

            /// Build from a SQLite rowid; returns None for non-positive values.
            pub fn from_i64(value: i64) -> Option<Self> {
                u32::try_from(value).ok().and_then(Self::new)
            }
        }
    };
}

impl_id!(FileId);
impl_id!(ContextId);
impl_id!(ScopeId);
impl_id!(EpochId);

impl EpochId {
    pub const FIRST: EpochId = EpochId(NonZeroU32::new(1).unwrap());

    /// The epoch following this one.
    pub fn next(&self) -> EpochId {
        EpochId(NonZeroU32::new(self.0.get() + 1).expect("epoch counter overflow"))
    }
}

/// Source span, 1-indexed lines, 0-indexed columns (tree-sitter convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub start_column: u16,
    pub end_line: u32,
    pub end_column: u16,
}

impl Range {
    pub fn new(start_line: u32, start_column: u16, end_line: u32, end_column: u16) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// True when `other` lies entirely within this range, line-wise.
    pub fn contains_lines(&self, other: &Range) -> bool {
        self.start_line <= other.start_line && other.end_line <= self.end_line
    }

    pub fn contains_point(&self, line: u32, column: u16) -> bool {
        if line < self.start_line || line > self.end_line {
            return false;
        }
        if line == self.start_line && column < self.start_column {
            return false;
        }
        if line == self.end_line && column > self.end_column {
            return false;
        }
        true
    }
}

/// Kind of a definition fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefKind {
    Function,
    Method,
    Class,
    Struct,
    Enum,
    Trait,
    Interface,
    TypeAlias,
    Constant,
    Variable,
    Module,
    Record,
    Constructor,
    Property,
    Field,
    Impl,
    EnumConstant,
}

impl DefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Enum => "enum",
            Self::Trait => "trait",
            Self::Interface => "interface",
            Self::TypeAlias => "type_alias",
            Self::Constant => "constant",
            Self::Variable => "variable",
            Self::Module => "module",
            Self::Record => "record",
            Self::Constructor => "constructor",
            Self::Property => "property",
            Self::Field => "field",
            Self::Impl => "impl",
            Self::EnumConstant => "enum_constant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "function" => Self::Function,
            "method" => Self::Method,
            "class" => Self::Class,
            "struct" => Self::Struct,
            "enum" => Self::Enum,
            "trait" => Self::Trait,
            "interface" => Self::Interface,
            "type_alias" => Self::TypeAlias,
            "constant" => Self::Constant,
            "variable" => Self::Variable,
            "module" => Self::Module,
            "record" => Self::Record,
            "constructor" => Self::Constructor,
            "property" => Self::Property,
            "field" => Self::Field,
            "impl" => Self::Impl,
            "enum_constant" => Self::EnumConstant,
            _ => return None,
        })
    }
}

/// Role of an identifier occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefRole {
    Definition,
    Reference,
    Import,
    Write,
    Read,
}

impl RefRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::Reference => "reference",
            Self::Import => "import",
            Self::Write => "write",
            Self::Read => "read",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "definition" => Self::Definition,
            "reference" => Self::Reference,
            "import" => Self::Import,
            "write" => Self::Write,
            "read" => Self::Read,
            _ => return None,
        })
    }
}

/// Provenance tier of a reference.
///
/// Proven: resolvable from the syntax tree alone (same-file binding chain).
/// Strong: cross-file via exact declared-module or import-target match.
/// Anchored: narrowed through an anchor group to a small candidate set.
/// Unknown: unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RefTier {
    Proven,
    Strong,
    Anchored,
    Unknown,
}

impl RefTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proven => "proven",
            Self::Strong => "strong",
            Self::Anchored => "anchored",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "proven" => Self::Proven,
            "strong" => Self::Strong,
            "anchored" => Self::Anchored,
            "unknown" => Self::Unknown,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Certainty {
    Certain,
    Uncertain,
}

impl Certainty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Certain => "certain",
            Self::Uncertain => "uncertain",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "certain" => Self::Certain,
            "uncertain" => Self::Uncertain,
            _ => return None,
        })
    }
}

/// Kind of a lexical scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    File,
    Module,
    Class,
    Function,
    Block,
    Comprehension,
    Other,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::Block => "block",
            Self::Comprehension => "comprehension",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "file" => Self::File,
            "module" => Self::Module,
            "class" => Self::Class,
            "function" => Self::Function,
            "block" => Self::Block,
            "comprehension" => Self::Comprehension,
            "other" => Self::Other,
            _ => return None,
        })
    }
}

/// What a local binding points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindTargetKind {
    Def,
    Import,
    Parameter,
    Local,
}

impl BindTargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Def => "def",
            Self::Import => "import",
            Self::Parameter => "parameter",
            Self::Local => "local",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "def" => Self::Def,
            "import" => Self::Import,
            "parameter" => Self::Parameter,
            "local" => Self::Local,
            _ => return None,
        })
    }
}

/// Classification of an import clause. The variant decides the resolution
/// strategy (declaration match, path rewrite, relative path, require probe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportKind {
    PythonImport,
    PythonFrom,
    JsImport,
    JsRequire,
    JsDynamicImport,
    CInclude,
    RustUse,
    GoImport,
    JavaImport,
    KotlinImport,
    ScalaImport,
    CsharpUsing,
    CsharpUsingStatic,
    CsharpUsingAlias,
    PhpUse,
    RubyRequire,
    RubyRequireRelative,
    LuaRequire,
    ElixirAlias,
    HaskellImport,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PythonImport => "python_import",
            Self::PythonFrom => "python_from",
            Self::JsImport => "js_import",
            Self::JsRequire => "js_require",
            Self::JsDynamicImport => "js_dynamic_import",
            Self::CInclude => "c_include",
            Self::RustUse => "rust_use",
            Self::GoImport => "go_import",
            Self::JavaImport => "java_import",
            Self::KotlinImport => "kotlin_import",
            Self::ScalaImport => "scala_import",
            Self::CsharpUsing => "csharp_using",
            Self::CsharpUsingStatic => "csharp_using_static",
            Self::CsharpUsingAlias => "csharp_using_alias",
            Self::PhpUse => "php_use",
            Self::RubyRequire => "ruby_require",
            Self::RubyRequireRelative => "ruby_require_relative",
            Self::LuaRequire => "lua_require",
            Self::ElixirAlias => "elixir_alias",
            Self::HaskellImport => "haskell_import",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "python_import" => Self::PythonImport,
            "python_from" => Self::PythonFrom,
            "js_import" => Self::JsImport,
            "js_require" => Self::JsRequire,
            "js_dynamic_import" => Self::JsDynamicImport,
            "c_include" => Self::CInclude,
            "rust_use" => Self::RustUse,
            "go_import" => Self::GoImport,
            "java_import" => Self::JavaImport,
            "kotlin_import" => Self::KotlinImport,
            "scala_import" => Self::ScalaImport,
            "csharp_using" => Self::CsharpUsing,
            "csharp_using_static" => Self::CsharpUsingStatic,
            "csharp_using_alias" => Self::CsharpUsingAlias,
            "php_use" => Self::PhpUse,
            "ruby_require" => Self::RubyRequire,
            "ruby_require_relative" => Self::RubyRequireRelative,
            "lua_require" => Self::LuaRequire,
            "elixir_alias" => Self::ElixirAlias,
            "haskell_import" => Self::HaskellImport,
            _ => return None,
        })
    }
}

/// Probe status of a context candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeStatus {
    Pending,
    Valid,
    Detached,
    Invalid,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Valid => "valid",
            Self::Detached => "detached",
            Self::Invalid => "invalid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => Self::Pending,
            "valid" => Self::Valid,
            "detached" => Self::Detached,
            "invalid" => Self::Invalid,
            _ => return None,
        })
    }
}

/// Authority tier of a context. `None` on a candidate means ambient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContextTier {
    Workspace = 1,
    Package = 2,
    RootFallback = 3,
}

impl ContextTier {
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Workspace),
            2 => Some(Self::Package),
            3 => Some(Self::RootFallback),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        assert!(FileId::new(0).is_none());
        let id = FileId::new(42).unwrap();
        assert_eq!(id.value(), 42);
        assert_eq!(id.as_i64(), 42);
        assert_eq!(FileId::from_i64(42), Some(id));
        assert_eq!(FileId::from_i64(-1), None);
    }

    #[test]
    fn test_epoch_next() {
        let e = EpochId::FIRST;
        assert_eq!(e.value(), 1);
        assert_eq!(e.next().value(), 2);
    }

    #[test]
    fn test_range_containment() {
        let outer = Range::new(1, 0, 20, 0);
        let inner = Range::new(5, 4, 10, 0);
        assert!(outer.contains_lines(&inner));
        assert!(!inner.contains_lines(&outer));
        assert!(outer.contains_point(1, 0));
        assert!(!outer.contains_point(21, 0));
    }

    #[test]
    fn test_enum_round_trips() {
        for kind in [
            DefKind::Function,
            DefKind::Method,
            DefKind::Class,
            DefKind::TypeAlias,
            DefKind::EnumConstant,
        ] {
            assert_eq!(DefKind::parse(kind.as_str()), Some(kind));
        }
        for tier in [
            RefTier::Proven,
            RefTier::Strong,
            RefTier::Anchored,
            RefTier::Unknown,
        ] {
            assert_eq!(RefTier::parse(tier.as_str()), Some(tier));
        }
        for kind in [
            ImportKind::PythonFrom,
            ImportKind::RubyRequireRelative,
            ImportKind::CsharpUsingStatic,
        ] {
            assert_eq!(ImportKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(DefKind::parse("no_such_kind"), None);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(ContextTier::Workspace < ContextTier::Package);
        assert_eq!(ContextTier::from_u8(3), Some(ContextTier::RootFallback));
        assert_eq!(ContextTier::from_u8(0), None);
    }
}
