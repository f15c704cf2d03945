//! Cursor over an immutable byte slice with primitive/structural reads
//! mirroring the [`Encoder`](crate::encode::Encoder). Unrecognized section
//! ids and malformed scalars are fatal: there is no partial decode (spec
//! §4.D, §7).
//!
//! The read loop is the state machine spec §4.D names: *expect_preamble* →
//! *expect_section* → *done*, with no backtracking — directly mirrored on
//! the teacher's `Parser::parse_module_internal` `while let Ok(section_id)`
//! loop, generalized from a `Read` stream to a borrowed cursor so the
//! disassembler can reuse decoded offsets for its hex dump.

pub mod error;

pub use error::DecodeError;
use tracing::trace;

use crate::module::{
	CodeSection, CustomSection, ExportEntry, ExportSection, FuncType, FunctionBody,
	FunctionSection, LocalEntry, Preamble, TypeSection, WasmModule,
};
use crate::primitives;
use crate::types::{ExternalKind, Opcode, SectionCode, Type, ValueType};

/// Read cursor over a borrowed byte slice. Only ever moves forward.
pub struct Decoder<'a> {
	bytes: &'a [u8],
	offset: usize,
}

impl<'a> Decoder<'a> {
	pub fn new(bytes: &'a [u8]) -> Self {
		Decoder { bytes, offset: 0 }
	}

	pub fn offset(&self) -> usize {
		self.offset
	}

	pub fn remaining(&self) -> usize {
		self.bytes.len() - self.offset
	}

	pub fn all_bytes(&self) -> &'a [u8] {
		self.bytes
	}

	fn require(&self, n: usize) -> Result<(), DecodeError> {
		if self.remaining() < n {
			Err(DecodeError::UnexpectedEof {
				wanted: n,
				remaining: self.remaining(),
				offset: self.offset,
			})
		} else {
			Ok(())
		}
	}

	// ---- primitives -----------------------------------------------------

	pub fn uint8(&mut self) -> Result<u8, DecodeError> {
		self.require(1)?;
		let b = self.bytes[self.offset];
		self.offset += 1;
		Ok(b)
	}

	pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
		self.require(n)?;
		let slice = &self.bytes[self.offset..self.offset + n];
		self.offset += n;
		Ok(slice)
	}

	pub fn uint32(&mut self) -> Result<u32, DecodeError> {
		let bytes = self.bytes(4)?;
		Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
	}

	pub fn float64(&mut self) -> Result<f64, DecodeError> {
		let bytes = self.bytes(8)?;
		Ok(f64::from_le_bytes(bytes.try_into().unwrap()))
	}

	/// LEB128 unsigned: accumulate 7-bit groups left-shifted by
	/// `shift` (0, 7, 14, ...), halting when the high bit clears. Fails if
	/// the accumulated result does not fit in 32 bits, or after 5 bytes.
	pub fn varuint32(&mut self) -> Result<u32, DecodeError> {
		let mut result: u64 = 0;
		let mut shift = 0u32;
		loop {
			if shift >= 35 {
				return Err(DecodeError::Leb128TooLong);
			}
			let byte = self.uint8()?;
			result |= ((byte & 0x7f) as u64) << shift;
			shift += 7;
			if byte & 0x80 == 0 {
				break;
			}
		}
		primitives::assert_uint32(result as i64)?;
		Ok(result as u32)
	}

	pub fn varuint1(&mut self) -> Result<u8, DecodeError> {
		let v = self.varuint32()?;
		primitives::assert_uint1(v as i64)?;
		Ok(v as u8)
	}

	pub fn varuint7(&mut self) -> Result<u8, DecodeError> {
		let v = self.varuint32()?;
		primitives::assert_uint7(v as i64)?;
		Ok(v as u8)
	}

	/// LEB128 signed. After the continuation loop, if the final byte's
	/// `0x40` bit is set and the total shift is less than 32, sign-extend
	/// by OR'ing in `(-1) << shift`. The `shift < 32` guard avoids
	/// corrupting an already-sign-extended 5-byte encoding (spec §9).
	pub fn varint32(&mut self) -> Result<i32, DecodeError> {
		let mut result: i64 = 0;
		let mut shift = 0u32;
		let mut byte;
		loop {
			if shift >= 35 {
				return Err(DecodeError::Leb128TooLong);
			}
			byte = self.uint8()?;
			result |= ((byte & 0x7f) as i64) << shift;
			shift += 7;
			if byte & 0x80 == 0 {
				break;
			}
		}
		if shift < 32 && byte & 0x40 != 0 {
			result |= -1i64 << shift;
		}
		Ok(result as i32)
	}

	pub fn varint7(&mut self) -> Result<i8, DecodeError> {
		let v = self.varint32()?;
		primitives::assert_int7(v as i64)?;
		Ok(v as i8)
	}

	/// Reads `varuint32 len` then that many bytes, decoded as ASCII.
	pub fn utf8(&mut self) -> Result<String, DecodeError> {
		let len = self.varuint32()? as usize;
		let bytes = self.bytes(len)?;
		for &b in bytes {
			if b >= 0x80 {
				return Err(DecodeError::NonAsciiCodeUnit(b));
			}
		}
		Ok(String::from_utf8(bytes.to_vec()).expect("validated ASCII is valid UTF-8"))
	}

	pub fn op(&mut self) -> Result<Opcode, DecodeError> {
		Ok(Opcode::try_from(self.uint8()?)?)
	}

	pub fn r#type(&mut self) -> Result<Type, DecodeError> {
		Ok(Type::try_from(self.varint7()?)?)
	}

	pub fn value_type(&mut self) -> Result<ValueType, DecodeError> {
		let ty = self.r#type()?;
		Ok(ValueType::try_from(ty).map_err(|_| DecodeError::UnsupportedForm(ty))?)
	}

	pub fn external_kind(&mut self) -> Result<ExternalKind, DecodeError> {
		Ok(ExternalKind::try_from(self.uint8()?)?)
	}

	pub fn section_code(&mut self) -> Result<SectionCode, DecodeError> {
		Ok(SectionCode::try_from(self.varuint7()?)?)
	}

	/// Reads `uint32 magic` (failing with a diagnostic citing the expected
	/// magic constant on mismatch), then `uint32 version`.
	pub fn module_preamble(&mut self) -> Result<Preamble, DecodeError> {
		let magic = self.uint32()?;
		if magic != crate::module::MAGIC {
			return Err(DecodeError::NotAWasmModule);
		}
		let version = self.uint32()?;
		Ok(Preamble::from_numeric_version(version)?)
	}

	pub fn func_type(&mut self) -> Result<FuncType, DecodeError> {
		let form = self.r#type()?;
		if form != Type::Func {
			return Err(DecodeError::UnsupportedForm(form));
		}
		let num_params = self.varuint32()?;
		let mut params = Vec::with_capacity(num_params as usize);
		for _ in 0..num_params {
			params.push(self.value_type()?);
		}
		let num_returns = self.varuint1()?;
		let mut returns = Vec::with_capacity(num_returns as usize);
		for _ in 0..num_returns {
			returns.push(self.value_type()?);
		}
		Ok(FuncType::new(params, returns)?)
	}

	pub fn export_entry(&mut self) -> Result<ExportEntry, DecodeError> {
		let name = self.utf8()?;
		let kind = self.external_kind()?;
		let index = self.varuint32()?;
		Ok(ExportEntry::new(name, kind, index)?)
	}

	pub fn local_entry(&mut self) -> Result<LocalEntry, DecodeError> {
		let count = self.varuint32()?;
		let value_type = self.value_type()?;
		Ok(LocalEntry::new(count, value_type))
	}

	/// Reads `varuint32 body_size`, records the cursor, reads
	/// `varuint32 local_count` and that many [`LocalEntry`], then reads
	/// `body_size - (offset - start_of_locals)` bytes as `code`.
	pub fn function_body(&mut self) -> Result<FunctionBody, DecodeError> {
		let body_size = self.varuint32()? as usize;
		let start = self.offset;
		let num_locals = self.varuint32()?;
		let mut locals = Vec::with_capacity(num_locals as usize);
		for _ in 0..num_locals {
			locals.push(self.local_entry()?);
		}
		let consumed = self.offset - start;
		let code_len = body_size
			.checked_sub(consumed)
			.ok_or(DecodeError::UnexpectedEof {
				wanted: body_size,
				remaining: consumed,
				offset: self.offset,
			})?;
		let code = self.bytes(code_len)?.to_vec();
		Ok(FunctionBody::new(locals, code)?)
	}

	fn type_section(&mut self) -> Result<TypeSection, DecodeError> {
		let count = self.varuint32()?;
		let mut section = TypeSection::new();
		for _ in 0..count {
			section.add(self.func_type()?);
		}
		Ok(section)
	}

	fn function_section(&mut self) -> Result<FunctionSection, DecodeError> {
		let count = self.varuint32()?;
		let mut section = FunctionSection::new();
		for _ in 0..count {
			section.add(self.varuint32()?);
		}
		Ok(section)
	}

	fn export_section(&mut self) -> Result<ExportSection, DecodeError> {
		let count = self.varuint32()?;
		let mut section = ExportSection::new();
		for _ in 0..count {
			section.add(self.export_entry()?);
		}
		Ok(section)
	}

	fn code_section(&mut self) -> Result<CodeSection, DecodeError> {
		let count = self.varuint32()?;
		let mut section = CodeSection::new();
		for _ in 0..count {
			section.add(self.function_body()?);
		}
		Ok(section)
	}

	/// The payload length bounds the remainder of the custom section: the
	/// body is `payload_len - (offset after name - offset before name)`
	/// bytes.
	fn custom_section(&mut self, payload_len: u32) -> Result<CustomSection, DecodeError> {
		let start = self.offset;
		let name = self.utf8()?;
		let consumed = self.offset - start;
		let remaining = (payload_len as usize)
			.checked_sub(consumed)
			.ok_or(DecodeError::UnexpectedEof {
				wanted: payload_len as usize,
				remaining: consumed,
				offset: self.offset,
			})?;
		let payload_data = self.bytes(remaining)?.to_vec();
		Ok(CustomSection::new(name, payload_data)?)
	}

	/// Reads one section: `section_code`, `varuint32 payload_len`, then
	/// dispatches on id. Returns `None` once `remaining() == 0`
	/// (*expect_section* → *done*).
	fn section(&mut self, module: &mut WasmModule) -> Result<bool, DecodeError> {
		if self.remaining() == 0 {
			return Ok(false);
		}
		let id = self.section_code()?;
		let payload_len = self.varuint32()?;
		trace!(?id, payload_len, "decoding section");
		match id {
			SectionCode::Custom => module.custom_sections.push(self.custom_section(payload_len)?),
			SectionCode::Type => module.types = self.type_section()?,
			SectionCode::Function => module.functions = self.function_section()?,
			SectionCode::Export => module.exports = self.export_section()?,
			SectionCode::Code => module.code = self.code_section()?,
			other => return Err(DecodeError::UnsupportedSectionId(other)),
		}
		Ok(true)
	}
}

/// Decodes a full module byte slice: preamble, then sections until the
/// buffer is exhausted.
pub fn decode_module(bytes: &[u8]) -> Result<WasmModule, DecodeError> {
	let mut decoder = Decoder::new(bytes);
	let preamble = decoder.module_preamble()?;
	let mut module = WasmModule {
		preamble,
		..WasmModule::default()
	};
	while decoder.section(&mut module)? {}
	Ok(module)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::encode::Encoder;

	#[test]
	fn preamble_round_trips() {
		let mut enc = Encoder::new();
		enc.module_preamble(&Preamble::default());
		let bytes = enc.into_bytes();
		let mut dec = Decoder::new(&bytes);
		let p = dec.module_preamble().unwrap();
		assert_eq!(p, Preamble::default());
	}

	#[test]
	fn preamble_rejects_bad_magic() {
		let bytes = [0xBA, 0xDA, 0xDA, 0xBA, 0x00, 0x00, 0x00, 0x00];
		let mut dec = Decoder::new(&bytes);
		assert!(matches!(
			dec.module_preamble().unwrap_err(),
			DecodeError::NotAWasmModule
		));
	}

	#[test]
	fn varuint32_round_trip_across_leb128_boundaries() {
		for &v in &[0x3fu32, 0x40, 0x7f, 0x80, 0x1fff, 0x2000, 0x3fff, 0x4000, 0xfffff, 0x100000, 0x1fffff, 0x200000, 0x7ffffff, 0x8000000, 0x0fffffff, 0x10000000, u32::MAX] {
			let mut enc = Encoder::new();
			enc.varuint32(v);
			let bytes = enc.into_bytes();
			let mut dec = Decoder::new(&bytes);
			assert_eq!(dec.varuint32().unwrap(), v);
			assert_eq!(dec.remaining(), 0);
		}
	}

	#[test]
	fn varint32_round_trip_across_leb128_boundaries() {
		for &v in &[-0x40i32, -0x41, 0x3f, 0x40, -0x2000, -0x2001, 0x1fff, 0x2000, i32::MIN, i32::MAX, -1, 0, 1] {
			let mut enc = Encoder::new();
			enc.varint32(v);
			let bytes = enc.into_bytes();
			let mut dec = Decoder::new(&bytes);
			assert_eq!(dec.varint32().unwrap(), v);
			assert_eq!(dec.remaining(), 0);
		}
	}

	#[test]
	fn custom_section_round_trips_with_empty_name_and_payload() {
		let section = CustomSection::new(String::new(), Vec::new()).unwrap();
		let mut enc = Encoder::new();
		enc.custom_section(&section);
		let bytes = enc.into_bytes();
		let mut dec = Decoder::new(&bytes);
		let id = dec.section_code().unwrap();
		assert_eq!(id, SectionCode::Custom);
		let payload_len = dec.varuint32().unwrap();
		let decoded = dec.custom_section(payload_len).unwrap();
		assert_eq!(decoded, section);
	}

	#[test]
	fn unsupported_section_id_is_fatal() {
		let mut enc = Encoder::new();
		enc.section_code(SectionCode::Table);
		enc.varuint32(0);
		let bytes = enc.into_bytes();
		let mut dec = Decoder::new(&bytes);
		let mut module = WasmModule::new();
		assert!(matches!(
			dec.section(&mut module).unwrap_err(),
			DecodeError::UnsupportedSectionId(SectionCode::Table)
		));
	}
}
