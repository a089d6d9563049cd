//! Creation parameters of an interpreter instance. These are fixed for the instance's lifetime.

use crate::error::{MasmError, MasmResult};

/// Upper bound on RAM. Addresses are signed 32-bit values in the instruction set, and a host
/// asking for more than this is almost certainly passing garbage.
pub const MAX_RAM_SIZE: usize = 256 * 1024 * 1024;
pub const DEFAULT_RAM_SIZE: usize = 64 * 1024;
pub const DEFAULT_REGISTER_COUNT: usize = 16;
/// Register operands are a single byte.
pub const MAX_REGISTER_COUNT: usize = 256;
/// `R0` and `R1` carry the invocation arguments and the last register is the stack pointer.
pub const MIN_REGISTER_COUNT: usize = 3;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InterpreterConfig {
  /// Size of RAM in bytes.
  pub ram_size          : usize,
  pub register_count    : usize,
  /// Size of the reserved low region `[0, code_region_size)` that programs are loaded into.
  pub code_region_size  : usize,
  /// Emit a trace record for every dispatched instruction.
  pub debug             : bool,
  /// Maximum number of instructions a single `execute` may dispatch. `None` is unbounded.
  pub instruction_limit : Option<u64>,
}

impl InterpreterConfig {

  /// A configuration for `ram_size` bytes of RAM with the code region taking the lower half.
  pub fn new(ram_size: usize) -> InterpreterConfig {
    InterpreterConfig {
      ram_size,
      register_count    : DEFAULT_REGISTER_COUNT,
      code_region_size  : (ram_size / 2).max(1),
      debug             : false,
      instruction_limit : None,
    }
  }

  pub fn with_debug(mut self, debug: bool) -> InterpreterConfig {
    self.debug = debug;
    self
  }

  pub fn with_register_count(mut self, register_count: usize) -> InterpreterConfig {
    self.register_count = register_count;
    self
  }

  pub fn with_code_region_size(mut self, code_region_size: usize) -> InterpreterConfig {
    self.code_region_size = code_region_size;
    self
  }

  pub fn with_instruction_limit(mut self, limit: Option<u64>) -> InterpreterConfig {
    self.instruction_limit = limit;
    self
  }

  pub fn validate(&self) -> MasmResult<()> {
    if self.ram_size == 0 || self.ram_size > MAX_RAM_SIZE {
      return Err(MasmError::InvalidArgument(format!(
        "RAM size {} is outside 1..={}", self.ram_size, MAX_RAM_SIZE
      )));
    }
    if self.register_count < MIN_REGISTER_COUNT || self.register_count > MAX_REGISTER_COUNT {
      return Err(MasmError::InvalidArgument(format!(
        "register count {} is outside {}..={}",
        self.register_count, MIN_REGISTER_COUNT, MAX_REGISTER_COUNT
      )));
    }
    if self.code_region_size == 0 || self.code_region_size > self.ram_size {
      return Err(MasmError::InvalidArgument(format!(
        "code region of {} bytes does not fit RAM of {} bytes",
        self.code_region_size, self.ram_size
      )));
    }
    Ok(())
  }
}

impl Default for InterpreterConfig {
  fn default() -> InterpreterConfig {
    InterpreterConfig::new(DEFAULT_RAM_SIZE)
  }
}
