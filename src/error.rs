/*!
  Outcome classification for every fallible operation.

  Internally operations fail with a `MasmError`, which carries enough context to produce a
  useful message. At the C boundary each error collapses to exactly one `ResultCode`, and the
  message is kept on the side in the instance's error channel.
*/

use std::ffi::CString;
use std::io;
use std::os::raw::c_char;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display as StrumDisplay, IntoStaticStr};
use thiserror::Error;

/**
  The closed set of outcome codes. The numeric values are part of the foreign interface and
  must not change.
*/
#[derive(
  StrumDisplay, IntoStaticStr, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,               PartialEq,     Debug, Hash
)]
#[repr(i32)]
pub enum ResultCode {
  Ok              =  0,
  GeneralError    = -1,
  InvalidHandle   = -2,
  LoadFailed      = -3,
  ExecutionFailed = -4,
  InvalidArgument = -5,
  MemoryFault     = -6,
}

impl ResultCode {
  pub fn code(&self) -> i32 {
    Into::<i32>::into(*self)
  }

  /// Unknown numbers classify as `GeneralError`.
  pub fn from_code(code: i32) -> ResultCode {
    use std::convert::TryFrom;
    ResultCode::try_from(code).unwrap_or(ResultCode::GeneralError)
  }
}

/// An access to `[address, address + width)` that does not lie inside memory of `size` bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("{width}-byte access at address {address} is outside memory of {size} bytes")]
pub struct OutOfRange {
  pub address : i64,
  pub width   : usize,
  pub size    : usize,
}

/// Why a running program stopped abnormally.
#[derive(Debug, Error)]
pub enum FaultKind {
  #[error("invalid opcode {0:#04x}")]
  InvalidOpcode(u8),

  #[error("instruction needs {width} bytes but only {available} remain in memory")]
  TruncatedInstruction { width: usize, available: usize },

  #[error("program counter {0} is outside memory")]
  PcOutOfRange(i64),

  #[error("register R{index} does not exist ({count} registers)")]
  InvalidRegister { index: u8, count: usize },

  #[error("{width}-byte access at address {address} is outside memory of {size} bytes")]
  MemoryViolation { address: i64, width: usize, size: usize },

  #[error("division by zero")]
  DivisionByZero,

  #[error("instruction limit of {0} exceeded")]
  InstructionLimit(u64),

  #[error("cannot write program output: {0}")]
  Output(#[source] io::Error),
}

/// An abnormal termination, pinned to the instruction that caused it.
#[derive(Debug, Error)]
#[error("fault at {pc:#06x}{}: {kind}", instruction_suffix(.instruction))]
pub struct Fault {
  pub pc          : u32,
  /// Disassembled text of the faulting instruction, when it could be decoded.
  pub instruction : Option<String>,
  pub kind        : FaultKind,
}

fn instruction_suffix(instruction: &Option<String>) -> String {
  match instruction {
    Some(text) => format!(" ({})", text),
    None       => String::new(),
  }
}

#[derive(Debug, Error)]
pub enum MasmError {
  #[error("invalid interpreter handle {0:#x}")]
  InvalidHandle(u64),

  #[error("interpreter is busy executing a program")]
  Busy,

  #[error("register index {index} out of range, valid registers are 0..{count}")]
  RegisterOutOfRange { index: i64, count: usize },

  #[error("{width}-byte access at address {address} is outside memory of {size} bytes")]
  MemoryOutOfRange { address: i64, width: usize, size: usize },

  #[error("cannot read bytecode from '{path}': {source}")]
  Unreadable {
    path   : String,
    #[source]
    source : io::Error,
  },

  #[error("bytecode image is empty")]
  EmptyImage,

  #[error("bytecode image of {len} bytes does not fit the {limit}-byte code region")]
  ImageTooLarge { len: usize, limit: usize },

  #[error("no program has been loaded")]
  NoProgram,

  #[error(transparent)]
  Fault(#[from] Fault),

  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("{0}")]
  General(String),
}

impl MasmError {
  /// Classifies the error into the outcome code reported across the foreign boundary.
  pub fn code(&self) -> ResultCode {
    match self {
      | MasmError::InvalidHandle(_)
      | MasmError::Busy                        => ResultCode::InvalidHandle,

      | MasmError::RegisterOutOfRange { .. }
      | MasmError::InvalidArgument(_)          => ResultCode::InvalidArgument,

      MasmError::MemoryOutOfRange { .. }       => ResultCode::MemoryFault,

      | MasmError::Unreadable { .. }
      | MasmError::EmptyImage
      | MasmError::ImageTooLarge { .. }        => ResultCode::LoadFailed,

      | MasmError::NoProgram
      | MasmError::Fault(_)                    => ResultCode::ExecutionFailed,

      MasmError::General(_)                    => ResultCode::GeneralError,
    }
  }
}

pub type MasmResult<T> = Result<T, MasmError>;

impl From<OutOfRange> for MasmError {
  fn from(OutOfRange { address, width, size }: OutOfRange) -> MasmError {
    MasmError::MemoryOutOfRange { address, width, size }
  }
}

impl From<OutOfRange> for FaultKind {
  fn from(OutOfRange { address, width, size }: OutOfRange) -> FaultKind {
    FaultKind::MemoryViolation { address, width, size }
  }
}

/**
  Holds the message of the most recent failure. A failing call overwrites it; a successful
  call leaves it alone, so a host can still fetch the explanation for a fault while it
  inspects registers afterwards.

  Clones share the same holder. The registry keeps a clone next to each instance so that it
  can report failures without waiting for the instance itself, which may be busy running.
*/
#[derive(Clone, Default)]
pub struct ErrorChannel {
  message: Arc<Mutex<Option<CString>>>,
}

impl ErrorChannel {

  pub fn new() -> ErrorChannel {
    ErrorChannel::default()
  }

  fn holder(&self) -> MutexGuard<'_, Option<CString>> {
    match self.message.lock() {
      Ok(guard)     => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  pub fn record(&self, error: &MasmError) {
    // Interior NULs cannot cross the C boundary.
    let text = error.to_string().replace('\0', "\\0");
    *self.holder() = Some(CString::new(text).unwrap_or_default());
  }

  pub fn message(&self) -> Option<String> {
    self.holder().as_ref().map(|text| text.to_string_lossy().into_owned())
  }

  /**
    A pointer to the current message as a C string, or null if nothing has failed yet. The
    pointer stays valid until the next failure is recorded on this channel or the channel is
    dropped.
  */
  pub fn as_ptr(&self) -> *const c_char {
    match self.holder().as_ref() {
      Some(text) => text.as_ptr(),
      None       => ptr::null(),
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn codes_match_host_binding() {
    assert_eq!(ResultCode::Ok.code(), 0);
    assert_eq!(ResultCode::GeneralError.code(), -1);
    assert_eq!(ResultCode::InvalidHandle.code(), -2);
    assert_eq!(ResultCode::LoadFailed.code(), -3);
    assert_eq!(ResultCode::ExecutionFailed.code(), -4);
    assert_eq!(ResultCode::InvalidArgument.code(), -5);
    assert_eq!(ResultCode::MemoryFault.code(), -6);
  }

  #[test]
  fn unknown_code_is_general_error() {
    assert_eq!(ResultCode::from_code(-6), ResultCode::MemoryFault);
    assert_eq!(ResultCode::from_code(42), ResultCode::GeneralError);
  }

  #[test]
  fn fault_message_names_instruction_and_address() {
    let error: MasmError = Fault {
      pc          : 0x12,
      instruction : Some("DIV R1, R2".to_string()),
      kind        : FaultKind::DivisionByZero,
    }.into();

    assert_eq!(error.code(), ResultCode::ExecutionFailed);
    assert_eq!(error.to_string(), "fault at 0x0012 (DIV R1, R2): division by zero");
  }

  #[test]
  fn error_channel_keeps_the_latest_failure() {
    let channel = ErrorChannel::new();
    assert_eq!(channel.message(), None);
    assert!(channel.as_ptr().is_null());

    channel.record(&MasmError::EmptyImage);
    channel.record(&MasmError::NoProgram);

    let shared = channel.clone();
    assert_eq!(shared.message().as_deref(), Some("no program has been loaded"));
    assert!(!shared.as_ptr().is_null());
  }

  #[test]
  fn error_channel_survives_interior_nul() {
    let channel = ErrorChannel::new();
    channel.record(&MasmError::InvalidArgument("a\0b".to_string()));
    assert_eq!(channel.message().as_deref(), Some("invalid argument: a\\0b"));
  }

  #[test]
  fn range_errors_keep_their_coordinates() {
    let range = OutOfRange { address: 4094, width: 4, size: 4096 };

    let error: MasmError = range.into();
    assert_eq!(error.code(), ResultCode::MemoryFault);
    assert_eq!(error.to_string(), range.to_string());

    let kind: FaultKind = range.into();
    assert!(matches!(kind, FaultKind::MemoryViolation { address: 4094, width: 4, size: 4096 }));
  }

  #[test]
  fn busy_is_a_handle_error() {
    assert_eq!(MasmError::Busy.code(), ResultCode::InvalidHandle);
    assert_eq!(MasmError::EmptyImage.code(), ResultCode::LoadFailed);
  }
}
