/*!
  MicroASM: a small register-machine interpreter for a compact bytecode, usable from Rust and,
  through the `masm_*` functions in `ffi`, from any host that can call C.

  ```no_run
  use microasm::{assemble, Interpreter, InterpreterConfig};

  let program = assemble("MOVI R0, 42\nHLT").unwrap();
  let mut interpreter = Interpreter::new(InterpreterConfig::new(4096)).unwrap();
  interpreter.load_bytes(&program.image).unwrap();
  interpreter.execute::<&str>(&[]).unwrap();
  assert_eq!(interpreter.get_register(0).unwrap(), 42);
  ```
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod bytecode;
pub mod config;
pub mod error;
pub mod ffi;
pub mod interpreter;
pub mod loader;
pub mod memory;
pub mod registers;
pub mod registry;
pub mod symboltable;
pub mod trace;
mod engine;

pub use bytecode::assembly::{assemble, Assembly, AssemblyError};
pub use config::InterpreterConfig;
pub use error::{Fault, FaultKind, MasmError, MasmResult, ResultCode};
pub use interpreter::{Interpreter, State};
pub use loader::ByteSource;
pub use trace::{CollectingTrace, TableTrace, TraceRecord, TraceSink};
