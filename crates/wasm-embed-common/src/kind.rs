//! Kind vocabulary shared by values, types and errors.
//!
//! - [`ValKind`]: discriminant of a WebAssembly value
//! - [`ExternKind`]: discriminant of an importable/exportable item
//! - [`Mutability`]: whether a global may be written

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of a WebAssembly value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValKind {
    /// 32-bit integer.
    I32,
    /// 64-bit integer.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// 128-bit SIMD vector.
    V128,
    /// Nullable function reference.
    FuncRef,
    /// Nullable host reference.
    ExternRef,
}

impl ValKind {
    /// Returns `true` for the reference kinds.
    pub fn is_ref(self) -> bool {
        matches!(self, ValKind::FuncRef | ValKind::ExternRef)
    }
}

impl fmt::Display for ValKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValKind::I32 => write!(f, "i32"),
            ValKind::I64 => write!(f, "i64"),
            ValKind::F32 => write!(f, "f32"),
            ValKind::F64 => write!(f, "f64"),
            ValKind::V128 => write!(f, "v128"),
            ValKind::FuncRef => write!(f, "funcref"),
            ValKind::ExternRef => write!(f, "externref"),
        }
    }
}

/// The kind of an extern (import or export) item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternKind {
    /// A function.
    Func,
    /// A global variable.
    Global,
    /// A table of references.
    Table,
    /// A linear memory.
    Memory,
}

impl fmt::Display for ExternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternKind::Func => write!(f, "func"),
            ExternKind::Global => write!(f, "global"),
            ExternKind::Table => write!(f, "table"),
            ExternKind::Memory => write!(f, "memory"),
        }
    }
}

/// Mutability of a global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    /// Immutable after initialization.
    Const,
    /// Writable from host and guest.
    Var,
}

impl fmt::Display for Mutability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutability::Const => write!(f, "const"),
            Mutability::Var => write!(f, "var"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_val_kind_display() {
        assert_eq!(ValKind::I32.to_string(), "i32");
        assert_eq!(ValKind::V128.to_string(), "v128");
        assert_eq!(ValKind::ExternRef.to_string(), "externref");
    }

    #[test]
    fn test_val_kind_classes() {
        assert!(ValKind::FuncRef.is_ref());
        assert!(ValKind::ExternRef.is_ref());
        assert!(!ValKind::V128.is_ref());
        assert!(!ValKind::I64.is_ref());
    }

    #[test]
    fn test_extern_kind_display() {
        assert_eq!(ExternKind::Func.to_string(), "func");
        assert_eq!(ExternKind::Memory.to_string(), "memory");
    }

    #[test]
    fn test_kind_deserialization() {
        let kinds: Vec<ValKind> = serde_json::from_str(r#"["i32", "f64", "funcref"]"#).unwrap();
        assert_eq!(kinds, vec![ValKind::I32, ValKind::F64, ValKind::FuncRef]);
    }
}
