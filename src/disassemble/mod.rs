//! Streams a decoded module as annotated text: a full hex dump, the
//! preamble, then one block per section with its raw bytes and a
//! pretty-printed payload.
//!
//! The decoder and the hex dump stay synchronized through an internal
//! "decoded mark": the offset recorded at the last call to [`Self::decoded`],
//! which yields the slice of bytes consumed since (spec §4.F). This is the
//! reference disassembler used to materialize the codec's own output as
//! text for test baselines — it is not a general-purpose WASM disassembler.

use std::fmt::Write as _;

use crate::decode::{DecodeError, Decoder};
use crate::module::{ExportEntry, FuncType, FunctionBody, LocalEntry};
use crate::primitives;
use crate::types::{ExternalKind, Opcode, SectionCode, Type, ValueType};

const COMMENT_COLUMN: usize = 30;
const BYTES_PER_LINE: usize = 16;

/// The newline convention a dump is rendered with. Spec §4.F's one ambient
/// configuration knob.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Newline {
	Lf,
	CrLf,
}

impl Newline {
	fn as_str(self) -> &'static str {
		match self {
			Newline::Lf => "\n",
			Newline::CrLf => "\r\n",
		}
	}
}

impl Default for Newline {
	fn default() -> Self {
		Newline::Lf
	}
}

fn hex_dump(bytes: &[u8]) -> String {
	bytes
		.iter()
		.map(|&b| primitives::hex8(b as i64))
		.collect::<Vec<_>>()
		.join(" ")
}

/// Eight hex digits of `v.to_bits()`'s high and low halves, composing
/// [`primitives::hex32`] since the format's hex helpers top out at 32 bits
/// (spec §4.A).
fn hex64(v: u64) -> String {
	format!(
		"{}{}",
		primitives::hex32((v >> 32) as u32 as i64),
		primitives::hex32(v as u32 as i64)
	)
}

fn value_type_name(t: ValueType) -> &'static str {
	match t {
		ValueType::I32 => "i32",
		ValueType::I64 => "i64",
		ValueType::F32 => "f32",
		ValueType::F64 => "f64",
	}
}

fn kind_name(k: ExternalKind) -> &'static str {
	match k {
		ExternalKind::Function => "function",
		ExternalKind::Table => "table",
		ExternalKind::Memory => "memory",
		ExternalKind::Global => "global",
	}
}

fn section_name(id: SectionCode) -> &'static str {
	match id {
		SectionCode::Custom => "Custom",
		SectionCode::Type => "Type",
		SectionCode::Import => "Import",
		SectionCode::Function => "Function",
		SectionCode::Table => "Table",
		SectionCode::Memory => "Memory",
		SectionCode::Global => "Global",
		SectionCode::Export => "Export",
		SectionCode::Start => "Start",
		SectionCode::Element => "Element",
		SectionCode::Code => "Code",
		SectionCode::Data => "Data",
	}
}

fn func_type_signature(f: &FuncType) -> String {
	let params = f
		.param_types
		.iter()
		.map(|&t| value_type_name(t))
		.collect::<Vec<_>>()
		.join(",");
	let ret = f
		.return_types
		.first()
		.map(|&t| value_type_name(t).to_owned())
		.unwrap_or_else(|| "void".to_owned());
	format!("({}) => {}", params, ret)
}

/// One decoded instruction's disassembled text and, when the opcode
/// carries an immediate worth annotating, an inline comment.
struct InstructionLine {
	text: String,
	comment: Option<String>,
}

fn push_aligned(out: &mut String, indent: &str, line: &InstructionLine) {
	let body = format!("{}{}", indent, line.text);
	match &line.comment {
		None => {
			out.push_str(&body);
		}
		Some(comment) => {
			out.push_str(&body);
			if body.len() < COMMENT_COLUMN {
				out.push_str(&" ".repeat(COMMENT_COLUMN - body.len()));
			} else {
				out.push(' ');
			}
			let _ = write!(out, "// {}", comment);
		}
	}
}

/// Decodes one function body's `code` into disassembled lines. Best-effort:
/// opcodes without an immediate schema specified here still print their
/// mnemonic; unrecognized trailing bytes are not expected to occur since
/// `code` was already accepted by [`FunctionBody::new`].
fn disassemble_instructions(code: &[u8]) -> Result<Vec<InstructionLine>, DecodeError> {
	let mut dec = Decoder::new(code);
	let mut lines = Vec::new();
	while dec.remaining() > 0 {
		let op = dec.op()?;
		let mnemonic = opcode_mnemonic(op);
		let (text, comment) = match op {
			Opcode::Block | Opcode::Loop | Opcode::If => {
				let block_type = dec.r#type()?;
				(
					format!("{} {:?}", mnemonic, block_type),
					None,
				)
			}
			Opcode::Br | Opcode::BrIf => {
				let label = dec.varuint32()?;
				(format!("{} {}", mnemonic, label), None)
			}
			Opcode::BrTable => {
				let count = dec.varuint32()?;
				let mut targets = Vec::with_capacity(count as usize);
				for _ in 0..count {
					targets.push(dec.varuint32()?);
				}
				let default = dec.varuint32()?;
				(
					format!("{} {:?} default={}", mnemonic, targets, default),
					None,
				)
			}
			Opcode::Call => {
				let index = dec.varuint32()?;
				(format!("{} {}", mnemonic, index), Some(format!("function #{}", index)))
			}
			Opcode::CallIndirect => {
				let type_index = dec.varuint32()?;
				let table_index = dec.varuint32()?;
				(
					format!("{} {} {}", mnemonic, type_index, table_index),
					None,
				)
			}
			Opcode::LocalGet | Opcode::LocalSet | Opcode::LocalTee => {
				let index = dec.varuint32()?;
				(format!("{} {}", mnemonic, index), Some(format!("${}", index)))
			}
			Opcode::GlobalGet | Opcode::GlobalSet => {
				let index = dec.varuint32()?;
				(format!("{} {}", mnemonic, index), None)
			}
			Opcode::I32Load
			| Opcode::I64Load
			| Opcode::F32Load
			| Opcode::F64Load
			| Opcode::I32Load8S
			| Opcode::I32Load8U
			| Opcode::I32Load16S
			| Opcode::I32Load16U
			| Opcode::I64Load8S
			| Opcode::I64Load8U
			| Opcode::I64Load16S
			| Opcode::I64Load16U
			| Opcode::I64Load32S
			| Opcode::I64Load32U
			| Opcode::I32Store
			| Opcode::I64Store
			| Opcode::F32Store
			| Opcode::F64Store
			| Opcode::I32Store8
			| Opcode::I32Store16
			| Opcode::I64Store8
			| Opcode::I64Store16
			| Opcode::I64Store32 => {
				let align = dec.varuint32()?;
				let offset = dec.varuint32()?;
				(
					format!("{} align={} offset={}", mnemonic, align, offset),
					None,
				)
			}
			Opcode::MemorySize | Opcode::MemoryGrow => {
				let reserved = dec.varuint1()?;
				(format!("{} {}", mnemonic, reserved), None)
			}
			Opcode::I32Const => {
				let v = dec.varint32()?;
				(format!("{} {}", mnemonic, v), Some(format!("{:#x}", v)))
			}
			Opcode::F32Const => {
				let bytes = dec.bytes(4)?;
				let v = f32::from_le_bytes(bytes.try_into().unwrap());
				(
					format!("{} 0x{}", mnemonic, primitives::hex32(v.to_bits() as i64)),
					Some(format!("{}", v)),
				)
			}
			Opcode::F64Const => {
				let v = dec.float64()?;
				(
					format!("{} 0x{}", mnemonic, hex64(v.to_bits())),
					Some(format!("{}", v)),
				)
			}
			_ => (mnemonic.to_owned(), None),
		};
		lines.push(InstructionLine { text, comment });
	}
	Ok(lines)
}

fn opcode_mnemonic(op: Opcode) -> &'static str {
	match op {
		Opcode::Unreachable => "unreachable",
		Opcode::Nop => "nop",
		Opcode::Block => "block",
		Opcode::Loop => "loop",
		Opcode::If => "if",
		Opcode::Else => "else",
		Opcode::End => "end",
		Opcode::Br => "br",
		Opcode::BrIf => "br_if",
		Opcode::BrTable => "br_table",
		Opcode::Return => "return",
		Opcode::Call => "call",
		Opcode::CallIndirect => "call_indirect",
		Opcode::Drop => "drop",
		Opcode::Select => "select",
		Opcode::LocalGet => "get_local",
		Opcode::LocalSet => "set_local",
		Opcode::LocalTee => "tee_local",
		Opcode::GlobalGet => "get_global",
		Opcode::GlobalSet => "set_global",
		Opcode::I32Const => "i32.const",
		Opcode::F32Const => "f32.const",
		Opcode::F64Const => "f64.const",
		Opcode::MemorySize => "current_memory",
		Opcode::MemoryGrow => "grow_memory",
		Opcode::I32Load => "i32.load",
		Opcode::I64Load => "i64.load",
		Opcode::F32Load => "f32.load",
		Opcode::F64Load => "f64.load",
		Opcode::I32Store => "i32.store",
		Opcode::I64Store => "i64.store",
		Opcode::F32Store => "f32.store",
		Opcode::F64Store => "f64.store",
		Opcode::I32Add => "i32.add",
		Opcode::I32Sub => "i32.sub",
		Opcode::I32Mul => "i32.mul",
		Opcode::I64Add => "i64.add",
		Opcode::I64Sub => "i64.sub",
		Opcode::I64Mul => "i64.mul",
		Opcode::F64Add => "f64.add",
		Opcode::F64Sub => "f64.sub",
		Opcode::F64Mul => "f64.mul",
		Opcode::F64Div => "f64.div",
		_ => opcode_fallback_mnemonic(op),
	}
}

/// Covers the remaining comparison/conversion/bitwise opcodes with a
/// mechanical `prefix.suffix` mnemonic derived from the variant name.
fn opcode_fallback_mnemonic(op: Opcode) -> &'static str {
	match op {
		Opcode::I32Eqz => "i32.eqz",
		Opcode::I32Eq => "i32.eq",
		Opcode::I32Ne => "i32.ne",
		Opcode::I32LtS => "i32.lt_s",
		Opcode::I32LtU => "i32.lt_u",
		Opcode::I32GtS => "i32.gt_s",
		Opcode::I32GtU => "i32.gt_u",
		Opcode::I32LeS => "i32.le_s",
		Opcode::I32LeU => "i32.le_u",
		Opcode::I32GeS => "i32.ge_s",
		Opcode::I32GeU => "i32.ge_u",
		Opcode::I64Eqz => "i64.eqz",
		Opcode::I64Eq => "i64.eq",
		Opcode::I64Ne => "i64.ne",
		Opcode::F64Eq => "f64.eq",
		Opcode::F64Ne => "f64.ne",
		Opcode::F64Lt => "f64.lt",
		Opcode::F64Gt => "f64.gt",
		Opcode::F64Le => "f64.le",
		Opcode::F64Ge => "f64.ge",
		Opcode::I32And => "i32.and",
		Opcode::I32Or => "i32.or",
		Opcode::I32Xor => "i32.xor",
		Opcode::I32Shl => "i32.shl",
		Opcode::I32ShrS => "i32.shr_s",
		Opcode::I32ShrU => "i32.shr_u",
		Opcode::I32WrapI64 => "i32.wrap/i64",
		Opcode::I64ExtendI32S => "i64.extend_s/i32",
		Opcode::I64ExtendI32U => "i64.extend_u/i32",
		Opcode::F64ConvertI32S => "f64.convert_s/i32",
		Opcode::F64ConvertI32U => "f64.convert_u/i32",
		_ => "<opcode>",
	}
}

/// Builder for a module's text dump.
pub struct Disassembler<'a> {
	bytes: &'a [u8],
	decoder: Decoder<'a>,
	newline: Newline,
	mark: usize,
	out: String,
	/// State accumulated from sections already disassembled, so the Code
	/// section can render each body's parameter list and resolve which
	/// export names point at it. Populated as `Type`/`Function`/`Export`
	/// are read; valid because this codec always emits those sections,
	/// when present, before `Code` (spec §9).
	types: Vec<FuncType>,
	function_type_indices: Vec<u32>,
	exports: Vec<ExportEntry>,
}

impl<'a> Disassembler<'a> {
	pub fn new(bytes: &'a [u8], newline: Newline) -> Self {
		Disassembler {
			bytes,
			decoder: Decoder::new(bytes),
			newline,
			mark: 0,
			out: String::new(),
			types: Vec::new(),
			function_type_indices: Vec::new(),
			exports: Vec::new(),
		}
	}

	fn nl(&mut self) {
		let nl = self.newline.as_str();
		self.out.push_str(nl);
	}

	fn line(&mut self, s: &str) {
		self.out.push_str(s);
		self.nl();
	}

	/// Returns the slice of bytes consumed since the last call, advancing
	/// the mark to the decoder's current offset.
	fn decoded(&mut self) -> &'a [u8] {
		let start = self.mark;
		let end = self.decoder.offset();
		self.mark = end;
		&self.bytes[start..end]
	}

	fn full_hex_dump(&mut self) {
		for (i, chunk) in self.bytes.chunks(BYTES_PER_LINE).enumerate() {
			let offset = i * BYTES_PER_LINE;
			self.line(&format!("{}: {}", primitives::hex32(offset as i64), hex_dump(chunk)));
		}
	}

	fn indented_hex_dump(&mut self, bytes: &[u8], indent: &str) {
		for chunk in bytes.chunks(BYTES_PER_LINE) {
			self.line(&format!("{}{}", indent, hex_dump(chunk)));
		}
	}

	pub fn disassemble(mut self) -> Result<String, DecodeError> {
		self.full_hex_dump();
		self.nl();

		let preamble = self.decoder.module_preamble()?;
		let preamble_bytes = self.decoded().to_vec();
		let version: u32 = match preamble.version {
			crate::module::WasmVersion::Mvp => 1,
		};
		self.line(&format!("  module version {}", version));
		self.indented_hex_dump(&preamble_bytes, "    ");

		loop {
			if self.decoder.remaining() == 0 {
				break;
			}
			self.section()?;
		}

		Ok(self.out)
	}

	fn section(&mut self) -> Result<(), DecodeError> {
		let id = self.decoder.section_code()?;
		let payload_len = self.decoder.varuint32()?;
		let payload_start = self.decoder.offset();

		let payload_text = match id {
			SectionCode::Custom => {
				let section = self.decoder.custom_section(payload_len)?;
				format!(
					"{} = {{ {} }}",
					section.name,
					hex_dump(&section.payload_data)
				)
			}
			SectionCode::Type => {
				let count = self.decoder.varuint32()?;
				let mut text = String::new();
				for i in 0..count {
					let f = self.decoder.func_type()?;
					let _ = writeln!(text, "[{}] func_type: {}", i, func_type_signature(&f));
					self.types.push(f);
				}
				text.trim_end().to_owned()
			}
			SectionCode::Function => {
				let count = self.decoder.varuint32()?;
				let mut text = String::new();
				for i in 0..count {
					let type_index = self.decoder.varuint32()?;
					let _ = writeln!(text, "[{}] {}", i, type_index);
					self.function_type_indices.push(type_index);
				}
				text.trim_end().to_owned()
			}
			SectionCode::Export => {
				let count = self.decoder.varuint32()?;
				let mut text = String::new();
				for i in 0..count {
					let entry = self.decoder.export_entry()?;
					let _ = writeln!(
						text,
						"[{}] '{}' {} index: {}",
						i,
						entry.name,
						kind_name(entry.kind),
						entry.index
					);
					self.exports.push(entry);
				}
				text.trim_end().to_owned()
			}
			SectionCode::Code => {
				let count = self.decoder.varuint32()?;
				let mut bodies = Vec::with_capacity(count as usize);
				for _ in 0..count {
					bodies.push(self.decoder.function_body()?);
				}
				self.code_section_text(&bodies)?
			}
			other => return Err(DecodeError::UnsupportedSectionId(other)),
		};

		let section_bytes = self.decoded().to_vec();
		self.line(&format!("{} Section (id={})", section_name(id), id as u8));
		self.indented_hex_dump(&section_bytes, "  ");
		for text_line in payload_text.lines() {
			self.line(&format!("  {}", text_line));
		}
		let _ = payload_start;
		Ok(())
	}

	/// `exports` is not threaded through separately: the export entries
	/// whose index matches a code body are only known once the export
	/// section has been disassembled. Since this codec requires Type,
	/// Function, Export, Code to be emitted in that fixed order (spec §9),
	/// by the time Code is reached `self.exported_functions` has already
	/// been populated by [`Self::section`]'s Export branch.
	fn code_section_text(&mut self, bodies: &[FunctionBody]) -> Result<String, DecodeError> {
		let mut text = String::new();
		for (index, body) in bodies.iter().enumerate() {
			let index = index as u32;
			let export_names = self.exported_function_names(index);
			if !export_names.is_empty() {
				let _ = writeln!(text, "{}", export_names.join(" ... "));
			}
			let signature = self
				.function_type_indices
				.get(index as usize)
				.and_then(|&type_index| self.types.get(type_index as usize));
			let _ = writeln!(
				text,
				"func_type: {}",
				signature
					.map(func_type_signature)
					.unwrap_or_else(|| "(unknown)".to_owned())
			);
			let _ = writeln!(text, "params:");
			if let Some(f) = signature {
				for (i, &ty) in f.param_types.iter().enumerate() {
					let _ = writeln!(text, "  ${}: {}", i, value_type_name(ty));
				}
			}
			let _ = writeln!(text, "locals:");
			for_each_expanded_local(&body.locals, |i, ty| {
				let _ = writeln!(text, "  ${}: {}", i, value_type_name(ty));
			});
			let _ = writeln!(text, "code:");
			for instr in disassemble_instructions(&body.code)? {
				let mut line_buf = String::new();
				push_aligned(&mut line_buf, "  ", &instr);
				let _ = writeln!(text, "{}", line_buf);
			}
		}
		Ok(text.trim_end().to_owned())
	}

	/// Export entries whose `index` matches `function_index`, rendered
	/// `'name' kind`. By the time `Code` is reached, `self.exports` has
	/// already been populated by `Self::section`'s `Export` branch (spec §9:
	/// Type, Function, Export, Code are always emitted in that order).
	fn exported_function_names(&self, function_index: u32) -> Vec<String> {
		self.exports
			.iter()
			.filter(|e| e.kind == ExternalKind::Function && e.index == function_index)
			.map(|e| format!("'{}' {}", e.name, kind_name(e.kind)))
			.collect()
	}
}

fn for_each_expanded_local(locals: &[LocalEntry], mut f: impl FnMut(u32, ValueType)) {
	let mut index = 0u32;
	for local in locals {
		for _ in 0..local.count {
			f(index, local.value_type);
			index += 1;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::encode::{encode_module, OpEncoder};
	use crate::module::{FunctionBody, WasmModule};
	use crate::types::ValueType;

	fn pi_module_bytes() -> Vec<u8> {
		let mut module = WasmModule::new();
		module
			.declare_function("pi", vec![], vec![ValueType::F64], true)
			.unwrap();
		let mut body = OpEncoder::new();
		body.f64_const(std::f64::consts::PI);
		body.r#return();
		body.end();
		module
			.code
			.add(FunctionBody::new(vec![], body.into_bytes()).unwrap());
		encode_module(&module)
	}

	#[test]
	fn disassembly_contains_hex_dump_header() {
		let bytes = pi_module_bytes();
		let text = Disassembler::new(&bytes, Newline::Lf).disassemble().unwrap();
		assert!(text.starts_with("00000000: 00 61 73 6d"));
	}

	#[test]
	fn disassembly_contains_module_version_line() {
		let bytes = pi_module_bytes();
		let text = Disassembler::new(&bytes, Newline::Lf).disassemble().unwrap();
		assert!(text.contains("module version 1"));
	}

	#[test]
	fn disassembly_contains_type_function_and_export_entries() {
		let bytes = pi_module_bytes();
		let text = Disassembler::new(&bytes, Newline::Lf).disassemble().unwrap();
		assert!(text.contains("func_type: () => f64"));
		assert!(text.contains("[0] 0"));
		assert!(text.contains("'pi' function index: 0"));
	}

	#[test]
	fn disassembly_contains_f64_const_return_end_in_order() {
		let bytes = pi_module_bytes();
		let text = Disassembler::new(&bytes, Newline::Lf).disassemble().unwrap();
		let const_pos = text.find("f64.const").unwrap();
		let return_pos = text.find("return").unwrap();
		let end_pos = text.rfind("end").unwrap();
		assert!(const_pos < return_pos);
		assert!(return_pos < end_pos);
		assert!(text.contains("0x400921fb54442d18"));
	}
}
