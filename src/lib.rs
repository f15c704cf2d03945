//! Binary codec and reference disassembler for WebAssembly (MVP) modules.
//!
//! [`module`] defines the in-memory data model, [`encode`] and [`decode`]
//! are the symmetric halves of the binary codec, and [`disassemble`]
//! renders a decoded module as annotated text. [`primitives`] and [`types`]
//! are the shared building blocks everything else is built from.

pub mod decode;
pub mod disassemble;
pub mod encode;
pub mod module;
pub mod primitives;
pub mod types;

pub use decode::{decode_module, DecodeError};
pub use encode::{encode_module, Encoder, OpEncoder};
pub use module::WasmModule;
