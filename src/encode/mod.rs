//! Append-only byte sink with one operation per primitive, type, and
//! section of the binary format.
//!
//! Every encoding failure here is a programmer error (spec §4.C): the
//! encoder's contract assumes its inputs were already validated by the
//! model constructors in [`crate::module`]. Width violations are
//! `assert!`-class panics, not `Result`s — mirrored on the teacher's own
//! `assert!`-guarded invariants in `exec/memory.rs::Memory::grow`.

pub mod op_encoder;

use tracing::trace;

use crate::module::{
	CodeSection, CustomSection, ExportEntry, ExportSection, FuncType, FunctionBody,
	FunctionSection, LocalEntry, Preamble, TypeSection,
};
use crate::primitives::{is_int7, is_uint1, is_uint7};
use crate::types::{ExternalKind, Opcode, SectionCode, Type, ValueType};

pub use op_encoder::OpEncoder;

/// A growing byte buffer, built up one primitive at a time.
#[derive(Default, Debug)]
pub struct Encoder {
	buf: Vec<u8>,
}

impl Encoder {
	pub fn new() -> Self {
		Encoder::default()
	}

	/// Consumes the encoder, returning the bytes written so far.
	pub fn into_bytes(self) -> Vec<u8> {
		self.buf
	}

	pub fn bytes_written(&self) -> &[u8] {
		&self.buf
	}

	// ---- primitives -----------------------------------------------------

	pub fn uint8(&mut self, v: u8) {
		self.buf.push(v);
	}

	pub fn bytes(&mut self, bs: &[u8]) {
		self.buf.extend_from_slice(bs);
	}

	pub fn uint32(&mut self, v: u32) {
		self.buf.extend_from_slice(&v.to_le_bytes());
	}

	pub fn float64(&mut self, v: f64) {
		self.buf.extend_from_slice(&v.to_le_bytes());
	}

	/// LEB128 unsigned, 5-byte maximum for a `uint32`.
	pub fn varuint32(&mut self, v: u32) {
		let mut v = v;
		loop {
			let byte = (v & 0x7f) as u8;
			v >>= 7;
			if v != 0 {
				self.buf.push(0x80 | byte);
			} else {
				self.buf.push(byte);
				break;
			}
		}
	}

	pub fn varuint7(&mut self, v: u8) {
		assert!(is_uint7(v as i64), "'value' must be a uint7.");
		self.buf.push(v);
	}

	pub fn varuint1(&mut self, v: u8) {
		assert!(is_uint1(v as i64), "'value' must be a uint1.");
		self.buf.push(v);
	}

	/// LEB128 signed, sign-bit-sensitive termination.
	pub fn varint32(&mut self, v: i32) {
		let mut v = v;
		loop {
			let byte = (v & 0x7f) as u8;
			v >>= 7;
			let done = (v == 0 && byte & 0x40 == 0) || (v == -1 && byte & 0x40 != 0);
			if done {
				self.buf.push(byte);
				break;
			} else {
				self.buf.push(0x80 | byte);
			}
		}
	}

	pub fn varint7(&mut self, v: i8) {
		assert!(is_int7(v as i64), "'value' must be a int7.");
		self.buf.push((v as u8) & 0x7f);
	}

	/// Emits `varuint32(len)` followed by the code units. Only ASCII
	/// (`< 0x80`) code units are supported in this revision.
	pub fn utf8(&mut self, s: &str) {
		assert!(
			s.bytes().all(|b| b < 0x80),
			"'value' must be ASCII: {:?}",
			s
		);
		self.varuint32(s.len() as u32);
		self.buf.extend_from_slice(s.as_bytes());
	}

	pub fn op(&mut self, op: Opcode) {
		self.uint8(op.into());
	}

	pub fn r#type(&mut self, t: Type) {
		self.varint7(t.into());
	}

	pub fn value_type(&mut self, t: ValueType) {
		self.r#type(t.into());
	}

	pub fn external_kind(&mut self, k: ExternalKind) {
		self.uint8(k.into());
	}

	pub fn section_code(&mut self, c: SectionCode) {
		self.varuint7(c.into());
	}

	pub fn func_type(&mut self, f: &FuncType) {
		self.r#type(f.form());
		self.varuint32(f.param_types.len() as u32);
		for &param in &f.param_types {
			self.value_type(param);
		}
		self.varuint1(f.return_types.len() as u8);
		for &ret in &f.return_types {
			self.value_type(ret);
		}
	}

	pub fn module_preamble(&mut self, p: &Preamble) {
		self.uint32(p.magic_number);
		self.uint32(p.numeric_version());
	}

	pub fn export_entry(&mut self, e: &ExportEntry) {
		self.utf8(&e.name);
		self.external_kind(e.kind);
		self.varuint32(e.index);
	}

	pub fn local_entry(&mut self, l: &LocalEntry) {
		self.varuint32(l.count);
		self.value_type(l.value_type);
	}

	pub fn function_body(&mut self, b: &FunctionBody) {
		debug_assert_eq!(b.code.last().copied(), Some(Opcode::End as u8));
		let mut payload = Encoder::new();
		payload.varuint32(b.locals.len() as u32);
		for local in &b.locals {
			payload.local_entry(local);
		}
		payload.bytes(&b.code);
		let payload = payload.into_bytes();
		self.varuint32(payload.len() as u32);
		self.bytes(&payload);
	}

	/// Encodes the payload written by `write_payload` into a fresh
	/// sub-encoder, measures its length, then writes
	/// `section_code(id) | varuint32(payload_len) | payload`. If
	/// `write_payload` reports the section is empty and `elide_if_empty` is
	/// true, nothing is emitted and `false` is returned.
	fn section<F>(&mut self, id: SectionCode, elide_if_empty: bool, write_payload: F) -> bool
	where
		F: FnOnce(&mut Encoder) -> bool,
	{
		let mut payload = Encoder::new();
		let not_empty = write_payload(&mut payload);
		if !not_empty && elide_if_empty {
			trace!(?id, "section elided (empty)");
			return false;
		}
		let payload = payload.into_bytes();
		trace!(?id, payload_len = payload.len(), "writing section");
		self.section_code(id);
		self.varuint32(payload.len() as u32);
		self.bytes(&payload);
		not_empty
	}

	/// Custom sections always report "not empty": their presence is
	/// meaningful even with an empty name and payload.
	pub fn custom_section(&mut self, s: &CustomSection) {
		self.section(CustomSection::ID, false, |enc| {
			enc.utf8(&s.name);
			enc.bytes(&s.payload_data);
			true
		});
	}

	pub fn type_section(&mut self, s: &TypeSection, elide_if_empty: bool) -> bool {
		self.section(TypeSection::ID, elide_if_empty, |enc| {
			enc.varuint32(s.entries.len() as u32);
			for entry in &s.entries {
				enc.func_type(entry);
			}
			!s.entries.is_empty()
		})
	}

	pub fn function_section(&mut self, s: &FunctionSection, elide_if_empty: bool) -> bool {
		self.section(FunctionSection::ID, elide_if_empty, |enc| {
			enc.varuint32(s.entries.len() as u32);
			for &index in &s.entries {
				enc.varuint32(index);
			}
			!s.entries.is_empty()
		})
	}

	pub fn export_section(&mut self, s: &ExportSection, elide_if_empty: bool) -> bool {
		self.section(ExportSection::ID, elide_if_empty, |enc| {
			enc.varuint32(s.entries.len() as u32);
			for entry in &s.entries {
				enc.export_entry(entry);
			}
			!s.entries.is_empty()
		})
	}

	pub fn code_section(&mut self, s: &CodeSection, elide_if_empty: bool) -> bool {
		self.section(CodeSection::ID, elide_if_empty, |enc| {
			enc.varuint32(s.entries.len() as u32);
			for body in &s.entries {
				enc.function_body(body);
			}
			!s.entries.is_empty()
		})
	}
}

/// Encodes a full module: preamble, then `Type`/`Function`/`Export`/`Code`
/// sections in ascending id order, each elided if empty, then any custom
/// sections (this codec never emits one implicitly, so their presence is
/// always meaningful and always written last; spec §9 "Ordering of
/// sections on emit").
pub fn encode_module(module: &crate::module::WasmModule) -> Vec<u8> {
	let mut enc = Encoder::new();
	enc.module_preamble(&module.preamble);
	enc.type_section(&module.types, true);
	enc.function_section(&module.functions, true);
	enc.export_section(&module.exports, true);
	enc.code_section(&module.code, true);
	for custom in &module.custom_sections {
		enc.custom_section(custom);
	}
	enc.into_bytes()
}
