use std::error::Error;
use std::fs;
use std::process::ExitCode;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wasm_mvp_codec::decode::decode_module;
use wasm_mvp_codec::disassemble::{Disassembler, Newline};

/// Reads a module from the path given as the first argument, decodes it,
/// and prints its disassembly to stdout. Only ever reads a module; never
/// constructs one.
fn main() -> ExitCode {
	tracing_subscriber::registry()
		.with(tracing_tree::HierarchicalLayer::new(2))
		.init();

	match run() {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("error: {}", e);
			ExitCode::FAILURE
		}
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let path = std::env::args()
		.nth(1)
		.ok_or("usage: wasm_mvp_codec <module.wasm>")?;
	let bytes = fs::read(&path)?;
	let module = decode_module(&bytes)?;
	tracing::debug!(?module, "decoded module");
	let text = Disassembler::new(&bytes, Newline::Lf).disassemble()?;
	print!("{}", text);
	Ok(())
}
