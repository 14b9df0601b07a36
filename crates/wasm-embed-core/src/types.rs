//! Type descriptors for functions, globals, tables, memories and
//! module imports/exports.
//!
//! These are plain host values. Conversion to native descriptors happens
//! only when the engine needs one (creating a function, a global, ...), and
//! the native descriptor is released right after the call.

use std::fmt;

use wasm_embed_common::{ExternKind, Mutability, RuntimeError, ValKind};
use wasm_embed_sys as sys;

use crate::handle::{FuncTypeHandle, GlobalTypeHandle, MemoryTypeHandle, TableTypeHandle, ValTypeHandle};
use crate::val::{kind_from_valtype, kind_to_valtype};
use crate::vec::{ValTypeVec, name_to_string, valtype_kinds};

/// Signature of a function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FuncType {
    params: Vec<ValKind>,
    results: Vec<ValKind>,
}

impl FuncType {
    /// Create a signature.
    pub fn new(
        params: impl IntoIterator<Item = ValKind>,
        results: impl IntoIterator<Item = ValKind>,
    ) -> Self {
        Self {
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
        }
    }

    /// Parameter kinds, in order.
    pub fn params(&self) -> &[ValKind] {
        &self.params
    }

    /// Result kinds, in order.
    pub fn results(&self) -> &[ValKind] {
        &self.results
    }

    pub(crate) fn to_native(&self) -> Result<FuncTypeHandle, RuntimeError> {
        let params = ValTypeVec::from_kinds(&self.params)?;
        let results = ValTypeVec::from_kinds(&self.results)?;
        let mut params = params.into_native();
        let mut results = results.into_native();
        // SAFETY: both vectors are owned and move into the new function type.
        unsafe { FuncTypeHandle::from_raw(sys::wasm_functype_new(&raw mut params, &raw mut results)) }
    }

    /// # Safety
    ///
    /// `ty` must point to a live function type.
    pub(crate) unsafe fn from_native(ty: *const sys::wasm_functype_t) -> Result<Self, RuntimeError> {
        // SAFETY: guaranteed by the caller; the vectors are borrowed from `ty`.
        unsafe {
            Ok(Self {
                params: valtype_kinds(sys::wasm_functype_params(ty))?,
                results: valtype_kinds(sys::wasm_functype_results(ty))?,
            })
        }
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, kinds: &[ValKind]) -> fmt::Result {
            write!(f, "(")?;
            for (i, kind) in kinds.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{kind}")?;
            }
            write!(f, ")")
        }

        list(f, &self.params)?;
        write!(f, " -> ")?;
        list(f, &self.results)
    }
}

/// Type of a global variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalType {
    content: ValKind,
    mutability: Mutability,
}

impl GlobalType {
    /// Create a global type.
    pub fn new(content: ValKind, mutability: Mutability) -> Self {
        Self {
            content,
            mutability,
        }
    }

    /// Kind of the stored value.
    pub fn content(&self) -> ValKind {
        self.content
    }

    /// Whether the global can be written.
    pub fn mutability(&self) -> Mutability {
        self.mutability
    }

    pub(crate) fn to_native(self) -> Result<GlobalTypeHandle, RuntimeError> {
        let mut content = new_valtype(self.content)?;
        let mutability = match self.mutability {
            Mutability::Const => sys::WASM_CONST,
            Mutability::Var => sys::WASM_VAR,
        };
        // SAFETY: the content valtype moves into the global type.
        unsafe { GlobalTypeHandle::from_raw(sys::wasm_globaltype_new(content.take()?, mutability)) }
    }

    /// # Safety
    ///
    /// `ty` must point to a live global type.
    pub(crate) unsafe fn from_native(ty: *const sys::wasm_globaltype_t) -> Result<Self, RuntimeError> {
        // SAFETY: guaranteed by the caller.
        let (content, mutability) = unsafe {
            (
                sys::wasm_valtype_kind(sys::wasm_globaltype_content(ty)),
                sys::wasm_globaltype_mutability(ty),
            )
        };
        Ok(Self {
            content: kind_from_valtype(content)?,
            mutability: if mutability == sys::WASM_VAR {
                Mutability::Var
            } else {
                Mutability::Const
            },
        })
    }
}

/// Size limits of a table (in elements) or memory (in pages).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limits {
    /// Initial size.
    pub min: u32,
    /// Maximum size, if bounded.
    pub max: Option<u32>,
}

impl Limits {
    /// Create limits.
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    fn to_native(self) -> sys::wasm_limits_t {
        sys::wasm_limits_t {
            min: self.min,
            max: self.max.unwrap_or(sys::wasm_limits_max_default),
        }
    }

    fn from_native(limits: sys::wasm_limits_t) -> Self {
        Self {
            min: limits.min,
            max: (limits.max != sys::wasm_limits_max_default).then_some(limits.max),
        }
    }
}

/// Type of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableType {
    element: ValKind,
    limits: Limits,
}

impl TableType {
    /// Create a table type. `element` must be a reference kind.
    pub fn new(element: ValKind, limits: Limits) -> Self {
        Self { element, limits }
    }

    /// Element kind.
    pub fn element(&self) -> ValKind {
        self.element
    }

    /// Size limits in elements.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub(crate) fn to_native(self) -> Result<TableTypeHandle, RuntimeError> {
        if !self.element.is_ref() {
            return Err(RuntimeError::type_mismatch("a reference kind", self.element));
        }
        let mut element = new_valtype(self.element)?;
        let limits = self.limits.to_native();
        // SAFETY: the element valtype moves into the table type; limits are copied.
        unsafe { TableTypeHandle::from_raw(sys::wasm_tabletype_new(element.take()?, &raw const limits)) }
    }

    /// # Safety
    ///
    /// `ty` must point to a live table type.
    pub(crate) unsafe fn from_native(ty: *const sys::wasm_tabletype_t) -> Result<Self, RuntimeError> {
        // SAFETY: guaranteed by the caller.
        let (element, limits) = unsafe {
            (
                sys::wasm_valtype_kind(sys::wasm_tabletype_element(ty)),
                *sys::wasm_tabletype_limits(ty),
            )
        };
        Ok(Self {
            element: kind_from_valtype(element)?,
            limits: Limits::from_native(limits),
        })
    }
}

/// Type of a linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryType {
    limits: Limits,
}

impl MemoryType {
    /// Create a memory type with limits in 64 KiB pages.
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    /// Size limits in pages.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub(crate) fn to_native(self) -> Result<MemoryTypeHandle, RuntimeError> {
        let limits = self.limits.to_native();
        // SAFETY: limits are copied by the constructor.
        unsafe { MemoryTypeHandle::from_raw(sys::wasm_memorytype_new(&raw const limits)) }
    }

    /// # Safety
    ///
    /// `ty` must point to a live memory type.
    pub(crate) unsafe fn from_native(ty: *const sys::wasm_memorytype_t) -> Self {
        // SAFETY: guaranteed by the caller.
        let limits = unsafe { *sys::wasm_memorytype_limits(ty) };
        Self {
            limits: Limits::from_native(limits),
        }
    }
}

/// Type of any importable or exportable item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternType {
    /// A function signature.
    Func(FuncType),
    /// A global type.
    Global(GlobalType),
    /// A table type.
    Table(TableType),
    /// A memory type.
    Memory(MemoryType),
}

impl ExternType {
    /// The extern kind.
    pub fn kind(&self) -> ExternKind {
        match self {
            ExternType::Func(_) => ExternKind::Func,
            ExternType::Global(_) => ExternKind::Global,
            ExternType::Table(_) => ExternKind::Table,
            ExternType::Memory(_) => ExternKind::Memory,
        }
    }

    /// The function signature, if this is a function.
    pub fn func(&self) -> Option<&FuncType> {
        match self {
            ExternType::Func(ty) => Some(ty),
            _ => None,
        }
    }

    /// # Safety
    ///
    /// `ty` must point to a live extern type.
    pub(crate) unsafe fn from_native(ty: *const sys::wasm_externtype_t) -> Result<Self, RuntimeError> {
        // SAFETY: guaranteed by the caller; each cast matches the kind tag.
        unsafe {
            match sys::wasm_externtype_kind(ty) {
                sys::WASM_EXTERN_FUNC => Ok(ExternType::Func(FuncType::from_native(
                    sys::wasm_externtype_as_functype_const(ty),
                )?)),
                sys::WASM_EXTERN_GLOBAL => Ok(ExternType::Global(GlobalType::from_native(
                    sys::wasm_externtype_as_globaltype_const(ty),
                )?)),
                sys::WASM_EXTERN_TABLE => Ok(ExternType::Table(TableType::from_native(
                    sys::wasm_externtype_as_tabletype_const(ty),
                )?)),
                sys::WASM_EXTERN_MEMORY => Ok(ExternType::Memory(MemoryType::from_native(
                    sys::wasm_externtype_as_memorytype_const(ty),
                ))),
                tag => Err(RuntimeError::UnknownExternKind { tag }),
            }
        }
    }
}

impl fmt::Display for ExternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternType::Func(ty) => write!(f, "func {ty}"),
            ExternType::Global(ty) => write!(f, "global {} {}", ty.mutability, ty.content),
            ExternType::Table(ty) => write!(f, "table {} {}", ty.limits.min, ty.element),
            ExternType::Memory(ty) => write!(f, "memory {}", ty.limits.min),
        }
    }
}

/// An import descriptor: where the item comes from and its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportType {
    module: String,
    name: String,
    ty: ExternType,
}

impl ImportType {
    /// Module namespace of the import.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Field name of the import.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn ty(&self) -> &ExternType {
        &self.ty
    }

    /// # Safety
    ///
    /// `ty` must point to a live import type.
    pub(crate) unsafe fn from_native(ty: *const sys::wasm_importtype_t) -> Result<Self, RuntimeError> {
        // SAFETY: guaranteed by the caller; names and type are borrowed.
        unsafe {
            Ok(Self {
                module: name_to_string(sys::wasm_importtype_module(ty)),
                name: name_to_string(sys::wasm_importtype_name(ty)),
                ty: ExternType::from_native(sys::wasm_importtype_type(ty))?,
            })
        }
    }
}

/// An export descriptor: the exported name and its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportType {
    name: String,
    ty: ExternType,
}

impl ExportType {
    /// Exported name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn ty(&self) -> &ExternType {
        &self.ty
    }

    /// # Safety
    ///
    /// `ty` must point to a live export type.
    pub(crate) unsafe fn from_native(ty: *const sys::wasm_exporttype_t) -> Result<Self, RuntimeError> {
        // SAFETY: guaranteed by the caller; name and type are borrowed.
        unsafe {
            Ok(Self {
                name: name_to_string(sys::wasm_exporttype_name(ty)),
                ty: ExternType::from_native(sys::wasm_exporttype_type(ty))?,
            })
        }
    }
}

fn new_valtype(kind: ValKind) -> Result<ValTypeHandle, RuntimeError> {
    // SAFETY: the constructor returns an owned valtype.
    unsafe { ValTypeHandle::from_raw(sys::wasm_valtype_new(kind_to_valtype(kind))) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_func_type_native_round_trip() {
        let ty = FuncType::new([ValKind::I32, ValKind::F64], [ValKind::ExternRef]);
        let native = ty.to_native().unwrap();
        let back = unsafe { FuncType::from_native(native.as_ptr().unwrap()) }.unwrap();
        assert_eq!(back, ty);
    }

    #[test]
    fn test_func_type_display() {
        let ty = FuncType::new([ValKind::I32, ValKind::I32], [ValKind::I32]);
        assert_eq!(ty.to_string(), "(i32, i32) -> (i32)");
        assert_eq!(FuncType::new([], []).to_string(), "() -> ()");
    }

    #[test]
    fn test_global_type_native_round_trip() {
        let ty = GlobalType::new(ValKind::I64, Mutability::Var);
        let native = ty.to_native().unwrap();
        let back = unsafe { GlobalType::from_native(native.as_ptr().unwrap()) }.unwrap();
        assert_eq!(back, ty);
    }

    #[test]
    fn test_table_type_requires_reference() {
        let ty = TableType::new(ValKind::I32, Limits::new(1, None));
        assert!(matches!(
            ty.to_native(),
            Err(RuntimeError::TypeMismatch { .. })
        ));

        let ty = TableType::new(ValKind::FuncRef, Limits::new(2, Some(10)));
        let native = ty.to_native().unwrap();
        let back = unsafe { TableType::from_native(native.as_ptr().unwrap()) }.unwrap();
        assert_eq!(back, ty);
    }

    #[test]
    fn test_memory_limits_unbounded() {
        let ty = MemoryType::new(Limits::new(1, None));
        let native = ty.to_native().unwrap();
        let back = unsafe { MemoryType::from_native(native.as_ptr().unwrap()) };
        assert_eq!(back.limits(), Limits::new(1, None));
    }
}
