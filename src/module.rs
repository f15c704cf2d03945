//! The module data model: [`Preamble`], [`FuncType`], the five section
//! types this codec understands, and the [`WasmModule`] aggregate that
//! threads through `encode`/`decode`/`disassemble`.
//!
//! Every constructor that accepts a bounded integer validates it; sections
//! own their entries, which are plain value aggregates with no shared
//! mutability.

use thiserror::Error;

use crate::primitives;
use crate::types::{ExternalKind, Opcode, SectionCode, Type, ValueType};

/// Magic number at the start of every module: `00 61 73 6d`.
pub const MAGIC: u32 = 0x6d73_6100;

/// The only version this codec speaks. An older pre-MVP revision of the
/// format used `0x0d`; that value is never accepted here — only the MVP
/// constant is authoritative.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum WasmVersion {
	Mvp,
}

impl WasmVersion {
	fn numeric(self) -> u32 {
		match self {
			WasmVersion::Mvp => 1,
		}
	}

	fn from_numeric(v: u32) -> Option<Self> {
		match v {
			1 => Some(WasmVersion::Mvp),
			_ => None,
		}
	}
}

/// A violated structural invariant of the module data model.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ModelError {
	#[error("FuncType can have at most one return type, got {0}")]
	TooManyReturnTypes(usize),

	#[error("FunctionBody code must be non-empty and end with 0x0b, got {0:?}")]
	MissingTrailingEnd(Vec<u8>),

	#[error("ExportEntry of kind {kind:?} must have index 0, got {index}")]
	NonZeroSingletonIndex { kind: ExternalKind, index: u32 },

	#[error("code unit {0:#x} is not ASCII")]
	NonAsciiCodeUnit(u8),

	#[error("unsupported version {0:?}")]
	UnsupportedVersion(u32),
}

/// The fixed 8-byte header at the start of every module.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Preamble {
	pub magic_number: u32,
	pub version: WasmVersion,
}

impl Preamble {
	pub fn new(version: WasmVersion) -> Self {
		Preamble {
			magic_number: MAGIC,
			version,
		}
	}

	pub(crate) fn from_numeric_version(version: u32) -> Result<Self, ModelError> {
		let version =
			WasmVersion::from_numeric(version).ok_or(ModelError::UnsupportedVersion(version))?;
		Ok(Preamble::new(version))
	}

	pub(crate) fn numeric_version(&self) -> u32 {
		self.version.numeric()
	}
}

impl Default for Preamble {
	fn default() -> Self {
		Preamble::new(WasmVersion::Mvp)
	}
}

/// ASCII-only name/string wrapper, per spec's "full UTF-8 support" Non-goal.
fn assert_ascii(s: &str) -> Result<(), ModelError> {
	for &b in s.as_bytes() {
		if b >= 0x80 {
			return Err(ModelError::NonAsciiCodeUnit(b));
		}
	}
	Ok(())
}

/// A function signature: ordered parameter types plus 0 or 1 return type.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FuncType {
	pub param_types: Vec<ValueType>,
	pub return_types: Vec<ValueType>,
}

impl FuncType {
	pub fn new(
		param_types: Vec<ValueType>,
		return_types: Vec<ValueType>,
	) -> Result<Self, ModelError> {
		if return_types.len() > 1 {
			return Err(ModelError::TooManyReturnTypes(return_types.len()));
		}
		primitives::assert_uint32(param_types.len() as i64)
			.expect("param list too long to be representable");
		Ok(FuncType {
			param_types,
			return_types,
		})
	}

	/// The implicit leading tag every encoded `func_type` carries.
	pub fn form(&self) -> Type {
		Type::Func
	}
}

/// A section ignored by consumers that do not understand it: an opaque
/// name and payload. Empty name and empty payload are both valid.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct CustomSection {
	pub name: String,
	pub payload_data: Vec<u8>,
}

impl CustomSection {
	pub const ID: SectionCode = SectionCode::Custom;

	pub fn new(name: String, payload_data: Vec<u8>) -> Result<Self, ModelError> {
		assert_ascii(&name)?;
		Ok(CustomSection { name, payload_data })
	}
}

/// Ordered list of [`FuncType`] entries.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct TypeSection {
	pub entries: Vec<FuncType>,
}

impl TypeSection {
	pub const ID: SectionCode = SectionCode::Type;

	pub fn new() -> Self {
		TypeSection::default()
	}

	/// Appends `signature` and returns its index.
	pub fn add(&mut self, signature: FuncType) -> u32 {
		self.entries.push(signature);
		(self.entries.len() - 1) as u32
	}
}

/// Ordered list of `uint32` indices into the type section.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct FunctionSection {
	pub entries: Vec<u32>,
}

impl FunctionSection {
	pub const ID: SectionCode = SectionCode::Function;

	pub fn new() -> Self {
		FunctionSection::default()
	}

	/// Appends a type index and returns the function index it was assigned.
	pub fn add(&mut self, type_index: u32) -> u32 {
		self.entries.push(type_index);
		(self.entries.len() - 1) as u32
	}
}

/// A single export: name, kind, and the index of the exported entity.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ExportEntry {
	pub name: String,
	pub kind: ExternalKind,
	pub index: u32,
}

impl ExportEntry {
	pub fn new(name: String, kind: ExternalKind, index: u32) -> Result<Self, ModelError> {
		assert_ascii(&name)?;
		if matches!(kind, ExternalKind::Memory | ExternalKind::Global) && index != 0 {
			return Err(ModelError::NonZeroSingletonIndex { kind, index });
		}
		Ok(ExportEntry { name, kind, index })
	}
}

/// Ordered list of [`ExportEntry`].
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ExportSection {
	pub entries: Vec<ExportEntry>,
}

impl ExportSection {
	pub const ID: SectionCode = SectionCode::Export;

	pub fn new() -> Self {
		ExportSection::default()
	}

	pub fn add(&mut self, entry: ExportEntry) {
		self.entries.push(entry);
	}
}

/// A run-length encoding of local variable declarations: a count and a type.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct LocalEntry {
	pub count: u32,
	pub value_type: ValueType,
}

impl LocalEntry {
	pub fn new(count: u32, value_type: ValueType) -> Self {
		LocalEntry { count, value_type }
	}
}

/// Locals plus a sequence of opcode bytes ending with `end` (`0x0b`).
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FunctionBody {
	pub locals: Vec<LocalEntry>,
	pub code: Vec<u8>,
}

impl FunctionBody {
	pub fn new(locals: Vec<LocalEntry>, code: Vec<u8>) -> Result<Self, ModelError> {
		match code.last() {
			Some(&last) if last == Opcode::End as u8 => Ok(FunctionBody { locals, code }),
			_ => Err(ModelError::MissingTrailingEnd(code)),
		}
	}
}

/// Ordered list of [`FunctionBody`].
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct CodeSection {
	pub entries: Vec<FunctionBody>,
}

impl CodeSection {
	pub const ID: SectionCode = SectionCode::Code;

	pub fn new() -> Self {
		CodeSection::default()
	}

	pub fn add(&mut self, body: FunctionBody) -> u32 {
		self.entries.push(body);
		(self.entries.len() - 1) as u32
	}
}

/// A full parsed/constructed module: the preamble plus whichever of the
/// five sections this codec understands are present.
///
/// Sections are emitted in ascending id order (Type, Function, Export,
/// Code); `custom_sections` may logically appear anywhere in the real
/// format but this codec never emits any implicitly, so they are
/// collected separately and, when present, written last.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct WasmModule {
	pub preamble: Preamble,
	pub custom_sections: Vec<CustomSection>,
	pub types: TypeSection,
	pub functions: FunctionSection,
	pub exports: ExportSection,
	pub code: CodeSection,
}

impl Default for WasmModule {
	fn default() -> Self {
		WasmModule {
			preamble: Preamble::default(),
			custom_sections: Vec::new(),
			types: TypeSection::new(),
			functions: FunctionSection::new(),
			exports: ExportSection::new(),
			code: CodeSection::new(),
		}
	}
}

impl WasmModule {
	pub fn new() -> Self {
		WasmModule::default()
	}

	/// Declares a function: a name, ordered `(symbol, value_type)` params
	/// (the symbol is discarded — this codec has no local-name debug
	/// info), 0 or 1 return types, and whether it is exported. Returns the
	/// function index.
	pub fn declare_function(
		&mut self,
		name: &str,
		params: Vec<ValueType>,
		returns: Vec<ValueType>,
		exported: bool,
	) -> Result<u32, ModelError> {
		let signature = FuncType::new(params, returns)?;
		let type_index = self.types.add(signature);
		let function_index = self.functions.add(type_index);
		if exported {
			let entry =
				ExportEntry::new(name.to_owned(), ExternalKind::Function, function_index)?;
			self.exports.add(entry);
		}
		Ok(function_index)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn func_type_rejects_multiple_returns() {
		let err = FuncType::new(vec![], vec![ValueType::I32, ValueType::I32]).unwrap_err();
		assert_eq!(err, ModelError::TooManyReturnTypes(2));
	}

	#[test]
	fn function_body_requires_trailing_end() {
		let err = FunctionBody::new(vec![], vec![0x0f]).unwrap_err();
		assert!(matches!(err, ModelError::MissingTrailingEnd(_)));
		assert!(FunctionBody::new(vec![], vec![0x0b]).is_ok());
	}

	#[test]
	fn export_entry_rejects_nonzero_memory_index() {
		let err = ExportEntry::new("mem".into(), ExternalKind::Memory, 1).unwrap_err();
		assert!(matches!(err, ModelError::NonZeroSingletonIndex { .. }));
		assert!(ExportEntry::new("mem".into(), ExternalKind::Memory, 0).is_ok());
	}

	#[test]
	fn type_section_add_returns_index() {
		let mut types = TypeSection::new();
		let sig = FuncType::new(vec![ValueType::F64, ValueType::F64], vec![ValueType::F64]).unwrap();
		assert_eq!(types.add(sig), 0);
	}

	#[test]
	fn preamble_rejects_pre_mvp_version() {
		assert!(Preamble::from_numeric_version(0x0d).is_err());
		assert!(Preamble::from_numeric_version(1).is_ok());
	}
}
