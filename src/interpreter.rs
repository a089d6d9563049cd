//! An interpreter instance: one isolated machine made of RAM, a register file, and execution
//! status. Loading lives in `loader`, running in `engine`.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::io::{self, Write};

use strum_macros::Display as StrumDisplay;

use crate::config::InterpreterConfig;
use crate::error::{ErrorChannel, MasmResult};
use crate::memory::Memory;
use crate::registers::RegisterFile;
use crate::trace::{TableTrace, TraceSink};

/// Execution status. `Halted` and `Faulted` end a run; loading returns the instance to `Ready`.
#[derive(StrumDisplay, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum State {
  /// Created, nothing loaded yet.
  Empty,
  Ready,
  Running,
  Halted,
  Faulted,
}

pub struct Interpreter {
  pub(crate) config    : InterpreterConfig,
  pub(crate) memory    : Memory,
  pub(crate) registers : RegisterFile,
  pub(crate) pc        : u32,
  pub(crate) state     : State,
  /// Result of the latest `CMP`/`CMPI`, consumed by conditional jumps.
  pub(crate) compare   : Ordering,
  /// Instructions dispatched by the latest run.
  pub(crate) steps     : u64,
  pub(crate) trace     : Box<dyn TraceSink>,
  pub(crate) output    : Box<dyn Write + Send>,
  errors               : ErrorChannel,
}

impl Interpreter {

  pub fn new(config: InterpreterConfig) -> MasmResult<Interpreter> {
    config.validate()?;
    let memory = Memory::new(config.ram_size, config.code_region_size)?;

    log::debug!(
      "created interpreter: {} bytes of RAM ({} code), {} registers, debug {}",
      config.ram_size, config.code_region_size, config.register_count, config.debug
    );

    Ok(Interpreter {
      registers : RegisterFile::new(config.register_count),
      memory,
      pc        : 0,
      state     : State::Empty,
      compare   : Ordering::Equal,
      steps     : 0,
      trace     : Box::new(TableTrace::stderr()),
      output    : Box::new(io::stdout()),
      errors    : ErrorChannel::new(),
      config,
    })
  }

  // region Accessors

  pub fn config(&self) -> &InterpreterConfig {
    &self.config
  }

  pub fn state(&self) -> State {
    self.state
  }

  pub fn pc(&self) -> u32 {
    self.pc
  }

  pub fn steps(&self) -> u64 {
    self.steps
  }

  pub fn registers(&self) -> &RegisterFile {
    &self.registers
  }

  pub fn memory(&self) -> &Memory {
    &self.memory
  }

  pub fn error_channel(&self) -> &ErrorChannel {
    &self.errors
  }

  /// The message of the most recent failure recorded for this instance.
  pub fn last_error(&self) -> Option<String> {
    self.errors.message()
  }

  // endregion

  // region Host-side inspection and mutation

  pub fn get_register(&self, index: i64) -> MasmResult<i32> {
    self.registers.get(index)
  }

  pub fn set_register(&mut self, index: i64, value: i32) -> MasmResult<()> {
    self.registers.set(index, value)
  }

  pub fn read_memory_int(&self, address: i64) -> MasmResult<i32> {
    Ok(self.memory.read_int(address)?)
  }

  pub fn write_memory_int(&mut self, address: i64, value: i32) -> MasmResult<()> {
    Ok(self.memory.write_int(address, value)?)
  }

  // endregion

  // region Settings

  pub fn set_debug(&mut self, debug: bool) {
    self.config.debug = debug;
  }

  /// Replaces the sink that receives trace records while debugging is enabled.
  pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
    self.trace = sink;
  }

  /// Replaces the writer `OUT` and `OUTC` print to.
  pub fn set_output(&mut self, output: Box<dyn Write + Send>) {
    self.output = output;
  }

  pub fn set_instruction_limit(&mut self, limit: Option<u64>) {
    self.config.instruction_limit = limit;
  }

  // endregion
}

impl Display for Interpreter {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "state {}  pc {:#06x}  steps {}\n{}",
      self.state, self.pc, self.steps, self.registers
    )
  }
}
