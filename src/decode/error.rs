//! Decoder failure modes, grounded directly on the teacher's
//! `parse/error.rs::ParsingError`: one variant per closed enumeration,
//! wrapping `num_enum::TryFromPrimitiveError` with `#[from]`, plus the
//! buffer/version/magic/form/model violations spec §7 enumerates.

use num_enum::TryFromPrimitiveError;
use thiserror::Error;

use crate::module::ModelError;
use crate::primitives::PrimitiveError;
use crate::types::{ExternalKind, Opcode, SectionCode, Type};

#[derive(Debug, Error)]
pub enum DecodeError {
	#[error("module does not start with the magic constant 0x6d736100")]
	NotAWasmModule,

	#[error("unknown section id: {0}")]
	UnknownSectionId(#[from] TryFromPrimitiveError<SectionCode>),

	#[error("unsupported section id: {0:?}")]
	UnsupportedSectionId(SectionCode),

	#[error("unknown type: {0}")]
	UnknownType(#[from] TryFromPrimitiveError<Type>),

	#[error("unsupported type section form: {0:?} (expected Func)")]
	UnsupportedForm(Type),

	#[error("unknown export kind: {0}")]
	UnknownExportKind(#[from] TryFromPrimitiveError<ExternalKind>),

	#[error("unknown opcode: {0}")]
	UnknownOpcode(#[from] TryFromPrimitiveError<Opcode>),

	#[error(transparent)]
	PrimitiveRange(#[from] PrimitiveError),

	#[error(transparent)]
	Model(#[from] ModelError),

	#[error("utf8 code unit {0:#x} is not ASCII")]
	NonAsciiCodeUnit(u8),

	#[error("tried to read {wanted} bytes with only {remaining} remaining at offset {offset}")]
	UnexpectedEof {
		wanted: usize,
		remaining: usize,
		offset: usize,
	},

	#[error("varuint32/varint32 exceeded the 5-byte LEB128 limit")]
	Leb128TooLong,
}
