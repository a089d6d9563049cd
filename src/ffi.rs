/*!
  The C-linkage surface. Every entry point returns a `ResultCode` number (or a handle, for
  creation), never unwinds into the caller, and leaves an explanation of any failure for
  `masm_get_last_error`.

  ```c
  uint64_t    masm_create_interpreter(int32_t ram_size, int32_t debug);
  void        masm_destroy_interpreter(uint64_t handle);
  int32_t     masm_load_bytecode(uint64_t handle, const char *path);
  int32_t     masm_load_bytecode_buffer(uint64_t handle, const uint8_t *bytes, size_t len);
  int32_t     masm_execute(uint64_t handle, int32_t argc, const char *const *argv);
  int32_t     masm_get_register(uint64_t handle, int32_t index, int32_t *value);
  int32_t     masm_set_register(uint64_t handle, int32_t index, int32_t value);
  int32_t     masm_read_ram_int(uint64_t handle, int32_t address, int32_t *value);
  int32_t     masm_write_ram_int(uint64_t handle, int32_t address, int32_t value);
  int32_t     masm_set_instruction_limit(uint64_t handle, uint64_t limit);
  const char *masm_get_last_error(uint64_t handle);
  size_t      masm_copy_last_error(uint64_t handle, char *buffer, size_t len);
  ```

  A zero handle means creation failed. Pointers passed in are only read for the duration of
  the call. The string returned by `masm_get_last_error` belongs to the library and is freed
  by the next failure recorded in the same place. A host that shares an instance between
  threads should use `masm_copy_last_error`, since another thread's failure on that instance
  can free the string while it is being read.
*/

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::ptr;
use std::slice;

use crate::config::InterpreterConfig;
use crate::error::{MasmError, MasmResult, ResultCode};
use crate::registry::{record_thread_error, Handle, REGISTRY};

/// Runs `call`, turning a panic into `fallback` and a recorded `GeneralError`.
fn guarded<T, F: FnOnce() -> T>(handle: Handle, fallback: T, call: F) -> T {
  match panic::catch_unwind(AssertUnwindSafe(call)) {
    Ok(value) => value,
    Err(_)    => {
      let error = MasmError::General("internal error: the interpreter panicked".to_string());
      log::error!("{}", error);
      REGISTRY.record(handle, &error);
      fallback
    }
  }
}

fn status<T>(result: MasmResult<T>) -> i32 {
  match result {
    Ok(_)      => ResultCode::Ok.code(),
    Err(error) => error.code().code(),
  }
}

fn null_argument(name: &str) -> MasmError {
  MasmError::InvalidArgument(format!("{} is a null pointer", name))
}

unsafe fn c_str<'a>(text: *const c_char, name: &str) -> MasmResult<&'a str> {
  if text.is_null() {
    return Err(null_argument(name));
  }
  CStr::from_ptr(text)
    .to_str()
    .map_err(|_| MasmError::InvalidArgument(format!("{} is not valid UTF-8", name)))
}

/// File names are bytes on unix and need not be UTF-8.
#[cfg(unix)]
unsafe fn c_path<'a>(text: *const c_char, name: &str) -> MasmResult<&'a Path> {
  use std::ffi::OsStr;
  use std::os::unix::ffi::OsStrExt;

  if text.is_null() {
    return Err(null_argument(name));
  }
  Ok(Path::new(OsStr::from_bytes(CStr::from_ptr(text).to_bytes())))
}

#[cfg(not(unix))]
unsafe fn c_path<'a>(text: *const c_char, name: &str) -> MasmResult<&'a Path> {
  c_str(text, name).map(Path::new)
}

unsafe fn write_out(target: *mut i32, value: i32) -> MasmResult<()> {
  match target.is_null() {
    true  => Err(null_argument("output value")),
    false => {
      *target = value;
      Ok(())
    }
  }
}

// region Lifecycle

/// Creates an instance with `ram_size` bytes of RAM. Returns 0 on failure.
#[no_mangle]
pub extern "C" fn masm_create_interpreter(ram_size: i32, debug: i32) -> u64 {
  guarded(0, 0, || {
    if ram_size <= 0 {
      record_thread_error(&MasmError::InvalidArgument(format!(
        "RAM size must be positive, got {}", ram_size
      )));
      return 0;
    }
    let config = InterpreterConfig::new(ram_size as usize).with_debug(debug != 0);
    REGISTRY.create(config).unwrap_or(0)
  })
}

#[no_mangle]
pub extern "C" fn masm_destroy_interpreter(handle: u64) {
  guarded(handle, (), || {
    // A stale handle is recorded for `masm_get_last_error`; there is nothing to return.
    let _ = REGISTRY.destroy(handle);
  })
}

// endregion

// region Loading and execution

/// # Safety
/// `path` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn masm_load_bytecode(handle: u64, path: *const c_char) -> i32 {
  guarded(handle, ResultCode::GeneralError.code(), || {
    status(REGISTRY.with(handle, |interpreter| {
      let path = c_path(path, "bytecode path")?;
      interpreter.load_file(path)
    }))
  })
}

/// # Safety
/// `bytes` must be null or point to `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn masm_load_bytecode_buffer(handle: u64, bytes: *const u8, len: usize) -> i32 {
  guarded(handle, ResultCode::GeneralError.code(), || {
    status(REGISTRY.with(handle, |interpreter| {
      let image =
        match (bytes.is_null(), len) {
          (true, 0)  => &[][..],
          (true, _)  => return Err(null_argument("bytecode buffer")),
          (false, _) => slice::from_raw_parts(bytes, len),
        };
      interpreter.load_bytes(image)
    }))
  })
}

/**
  Runs the loaded program with `argc` arguments from `argv`.

  # Safety
  `argv` must be null (only when `argc` is 0) or point to `argc` pointers to NUL-terminated
  strings.
*/
#[no_mangle]
pub unsafe extern "C" fn masm_execute(handle: u64, argc: i32, argv: *const *const c_char) -> i32 {
  guarded(handle, ResultCode::GeneralError.code(), || {
    status(REGISTRY.with(handle, |interpreter| {
      if argc < 0 {
        return Err(MasmError::InvalidArgument(format!("negative argument count {}", argc)));
      }
      if argc > 0 && argv.is_null() {
        return Err(null_argument("argument vector"));
      }

      let mut args = Vec::with_capacity(argc as usize);
      for i in 0..argc as usize {
        args.push(c_str(*argv.add(i), "argument")?);
      }
      interpreter.execute(&args)
    }))
  })
}

// endregion

// region Registers and memory

/// # Safety
/// `value` must be null or point to a writable `int32_t`.
#[no_mangle]
pub unsafe extern "C" fn masm_get_register(handle: u64, index: i32, value: *mut i32) -> i32 {
  guarded(handle, ResultCode::GeneralError.code(), || {
    status(REGISTRY.with(handle, |interpreter| {
      let register = interpreter.get_register(i64::from(index))?;
      write_out(value, register)
    }))
  })
}

#[no_mangle]
pub extern "C" fn masm_set_register(handle: u64, index: i32, value: i32) -> i32 {
  guarded(handle, ResultCode::GeneralError.code(), || {
    status(REGISTRY.with(handle, |interpreter| interpreter.set_register(i64::from(index), value)))
  })
}

/// # Safety
/// `value` must be null or point to a writable `int32_t`.
#[no_mangle]
pub unsafe extern "C" fn masm_read_ram_int(handle: u64, address: i32, value: *mut i32) -> i32 {
  guarded(handle, ResultCode::GeneralError.code(), || {
    status(REGISTRY.with(handle, |interpreter| {
      let word = interpreter.read_memory_int(i64::from(address))?;
      write_out(value, word)
    }))
  })
}

#[no_mangle]
pub extern "C" fn masm_write_ram_int(handle: u64, address: i32, value: i32) -> i32 {
  guarded(handle, ResultCode::GeneralError.code(), || {
    status(REGISTRY.with(handle, |interpreter| interpreter.write_memory_int(i64::from(address), value)))
  })
}

// endregion

// region Settings and diagnostics

/// Bounds the number of instructions a single execution may dispatch. 0 removes the bound.
#[no_mangle]
pub extern "C" fn masm_set_instruction_limit(handle: u64, limit: u64) -> i32 {
  guarded(handle, ResultCode::GeneralError.code(), || {
    status(REGISTRY.with(handle, |interpreter| {
      interpreter.set_instruction_limit(Some(limit).filter(|&limit| limit > 0));
      Ok(())
    }))
  })
}

/**
  The message of the most recent failure on `handle`. For a handle that is not live (including
  0), the message of the most recent failed call made on the calling thread, whichever instance
  it concerned. Null if there is none.
*/
#[no_mangle]
pub extern "C" fn masm_get_last_error(handle: u64) -> *const c_char {
  guarded(handle, ptr::null(), || REGISTRY.last_error_ptr(handle))
}

/**
  Copies the message `masm_get_last_error` would return into `buffer`, truncated to fit and
  always NUL-terminated when `len > 0`. Returns the full length of the message without the
  terminator, so a return value of `len` or more means the copy was truncated.

  # Safety
  `buffer` must be null or point to `len` writable bytes.
*/
#[no_mangle]
pub unsafe extern "C" fn masm_copy_last_error(handle: u64, buffer: *mut c_char, len: usize) -> usize {
  guarded(handle, 0, || {
    let message = REGISTRY.last_error(handle).unwrap_or_default();
    if !buffer.is_null() && len > 0 {
      let copied = message.len().min(len - 1);
      ptr::copy_nonoverlapping(message.as_ptr() as *const c_char, buffer, copied);
      *buffer.add(copied) = 0;
    }
    message.len()
  })
}

// endregion
