/*!
  Instances live in a generational arena and are addressed by opaque `u64` handles:

  ```text
    63          32 31           0
    [ generation ][  slot + 1   ]
  ```

  The low half is never zero, so `0` is never a valid handle and can signal failure across the
  C boundary. Destroying an instance bumps its slot's generation, so a handle that outlived its
  instance is recognized as stale instead of reaching whatever occupies the slot next.

  Each instance sits behind its own lock. Operations take it with `try_lock`: an instance that
  is already executing, on another thread or re-entered from a trace sink, answers `Busy`.

  Failures are recorded on the instance's error channel, a clone of which the registry keeps
  next to the instance so that a busy instance can still report. Every failure is also recorded
  on a thread-local channel, which answers for hosts that ask without a handle. Threads never see
  each other's failures there.
*/

use std::os::raw::c_char;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use crate::config::InterpreterConfig;
use crate::error::{ErrorChannel, MasmError, MasmResult};
use crate::interpreter::Interpreter;

pub type Handle = u64;

thread_local! {
  static THREAD_ERRORS: ErrorChannel = ErrorChannel::new();
}

lazy_static! {
  /// The registry behind the C-linkage surface.
  pub static ref REGISTRY: Registry = Registry::new();
}

/// Records a failure as the most recent one on the calling thread.
pub fn record_thread_error(error: &MasmError) {
  THREAD_ERRORS.with(|channel| channel.record(error));
}

pub fn thread_error() -> Option<String> {
  THREAD_ERRORS.with(|channel| channel.message())
}

#[derive(Clone)]
struct Entry {
  instance : Arc<Mutex<Interpreter>>,
  errors   : ErrorChannel,
}

struct Slot {
  generation : u32,
  entry      : Option<Entry>,
}

#[derive(Default)]
struct Slots {
  slots : Vec<Slot>,
  free  : Vec<usize>,
}

fn make_handle(slot: usize, generation: u32) -> Handle {
  (u64::from(generation) << 32) | (slot as u64 + 1)
}

fn split_handle(handle: Handle) -> Option<(usize, u32)> {
  let low = handle & 0xFFFF_FFFF;
  match low {
    0 => None,
    _ => Some(((low - 1) as usize, (handle >> 32) as u32)),
  }
}

#[derive(Default)]
pub struct Registry {
  inner: Mutex<Slots>,
}

impl Registry {

  pub fn new() -> Registry {
    Registry::default()
  }

  fn slots(&self) -> MutexGuard<'_, Slots> {
    // Slot bookkeeping never panics halfway through an update.
    match self.inner.lock() {
      Ok(guard)     => guard,
      Err(poisoned) => poisoned.into_inner(),
    }
  }

  fn entry(&self, handle: Handle) -> MasmResult<Entry> {
    let slots = self.slots();
    split_handle(handle)
      .and_then(|(index, generation)| {
        slots.slots
             .get(index)
             .filter(|slot| slot.generation == generation)
             .and_then(|slot| slot.entry.clone())
      })
      .ok_or(MasmError::InvalidHandle(handle))
  }

  /// Creates an instance and returns its handle.
  pub fn create(&self, config: InterpreterConfig) -> MasmResult<Handle> {
    let interpreter = Interpreter::new(config).map_err(|error| {
      record_thread_error(&error);
      error
    })?;
    let entry = Entry {
      errors   : interpreter.error_channel().clone(),
      instance : Arc::new(Mutex::new(interpreter)),
    };

    let mut slots = self.slots();
    let index =
      match slots.free.pop() {
        Some(index) => index,
        None        => {
          slots.slots.push(Slot { generation: 0, entry: None });
          slots.slots.len() - 1
        }
      };
    let slot   = &mut slots.slots[index];
    slot.entry = Some(entry);

    let handle = make_handle(index, slot.generation);
    log::debug!("created instance {:#x}", handle);
    Ok(handle)
  }

  /**
    Destroys the instance behind `handle` and invalidates the handle. If the instance is still
    executing on another thread, its memory is released once that run returns.
  */
  pub fn destroy(&self, handle: Handle) -> MasmResult<()> {
    let removed = {
      let mut slots = self.slots();
      let found =
        split_handle(handle).and_then(|(index, generation)| {
          match slots.slots.get_mut(index) {
            Some(slot) if slot.generation == generation && slot.entry.is_some() => {
              slot.generation = slot.generation.wrapping_add(1);
              slot.entry.take().map(|entry| (index, entry))
            }
            _ => None,
          }
        });
      if let Some((index, _)) = &found {
        slots.free.push(*index);
      }
      found
    };

    match removed {
      Some(_) => {
        log::debug!("destroyed instance {:#x}", handle);
        Ok(())
      }
      None => {
        let error = MasmError::InvalidHandle(handle);
        log::warn!("{}", error);
        record_thread_error(&error);
        Err(error)
      }
    }
  }

  /**
    Runs `operation` on the instance behind `handle`. Failures, including a stale handle or a
    busy instance, are recorded where `last_error` will find them.
  */
  pub fn with<T, F>(&self, handle: Handle, operation: F) -> MasmResult<T>
    where F: FnOnce(&mut Interpreter) -> MasmResult<T>
  {
    let entry = match self.entry(handle) {
      Ok(entry)  => entry,
      Err(error) => {
        log::warn!("{}", error);
        record_thread_error(&error);
        return Err(error);
      }
    };

    let result =
      match entry.instance.try_lock() {
        Ok(mut interpreter)            => operation(&mut *interpreter),
        Err(TryLockError::WouldBlock)  => Err(MasmError::Busy),
        Err(TryLockError::Poisoned(_)) => Err(MasmError::General(
          "instance is unusable after a panic during an earlier call".to_string()
        )),
      };

    if let Err(error) = &result {
      if let MasmError::Busy = error {
        log::warn!("instance {:#x}: {}", handle, error);
      }
      entry.errors.record(error);
      record_thread_error(error);
    }
    result
  }

  /// Records `error` for the calling thread and, if `handle` is live, for its instance.
  pub fn record(&self, handle: Handle, error: &MasmError) {
    if let Ok(entry) = self.entry(handle) {
      entry.errors.record(error);
    }
    record_thread_error(error);
  }

  /**
    The most recent failure on the instance behind `handle`. If `handle` is not live (0
    included), the most recent failure of any call made on the calling thread.
  */
  pub fn last_error(&self, handle: Handle) -> Option<String> {
    match self.entry(handle) {
      Ok(entry) => entry.errors.message(),
      Err(_)    => thread_error(),
    }
  }

  /**
    Like `last_error`, as a C string. The pointer stays valid until the next failure is
    recorded in the same place or the instance is destroyed.
  */
  pub fn last_error_ptr(&self, handle: Handle) -> *const c_char {
    match self.entry(handle) {
      Ok(entry) => entry.errors.as_ptr(),
      Err(_)    => THREAD_ERRORS.with(|channel| channel.as_ptr()),
    }
  }

  /// Number of live instances.
  pub fn len(&self) -> usize {
    self.slots().slots.iter().filter(|slot| slot.entry.is_some()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
