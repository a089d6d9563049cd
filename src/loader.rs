/*!
  The bytecode loader. An image is raw instruction bytes with no header; it is validated only
  for being non-empty and fitting the code region, then copied to address 0.
*/

use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{MasmError, MasmResult};
use crate::interpreter::{Interpreter, State};

/// Where a bytecode image comes from.
#[derive(Clone, Copy, Debug)]
pub enum ByteSource<'a> {
  File(&'a Path),
  Buffer(&'a [u8]),
}

fn unreadable(path: &Path, source: std::io::Error) -> MasmError {
  MasmError::Unreadable { path: path.display().to_string(), source }
}

/**
  Reads the image behind `source`. Files larger than `limit` are rejected from their metadata
  without being read in full.
*/
pub fn read_image<'a>(source: ByteSource<'a>, limit: usize) -> MasmResult<Cow<'a, [u8]>> {
  match source {

    ByteSource::Buffer(bytes) => Ok(Cow::Borrowed(bytes)),

    ByteSource::File(path) => {
      let file = File::open(path).map_err(|e| unreadable(path, e))?;
      let len  = file.metadata().map_err(|e| unreadable(path, e))?.len();
      if len > limit as u64 {
        return Err(MasmError::ImageTooLarge { len: len as usize, limit });
      }

      let mut image = Vec::with_capacity(len as usize);
      file
        .take(limit as u64 + 1)
        .read_to_end(&mut image)
        .map_err(|e| unreadable(path, e))?;
      Ok(Cow::Owned(image))
    }

  }
}

pub fn check_image(image: &[u8], code_region_size: usize) -> MasmResult<()> {
  if image.is_empty() {
    return Err(MasmError::EmptyImage);
  }
  if image.len() > code_region_size {
    return Err(MasmError::ImageTooLarge { len: image.len(), limit: code_region_size });
  }
  Ok(())
}

impl Interpreter {

  /**
    Loads a program, replacing any previous one. The code region is cleared first; registers
    and memory above the code region keep their contents, so a freshly loaded program can see
    what the previous one left behind.
  */
  pub fn load(&mut self, source: ByteSource) -> MasmResult<()> {
    if self.state == State::Running {
      return Err(MasmError::Busy);
    }
    let limit = self.memory.code_region_size();
    let image = read_image(source, limit)?;
    check_image(&image, limit)?;

    self.memory.load_code(&image)?;
    self.pc    = 0;
    self.steps = 0;
    self.state = State::Ready;

    log::debug!("loaded {} bytes of bytecode", image.len());
    Ok(())
  }

  pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> MasmResult<()> {
    self.load(ByteSource::File(path.as_ref()))
  }

  pub fn load_bytes(&mut self, image: &[u8]) -> MasmResult<()> {
    self.load(ByteSource::Buffer(image))
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  use crate::config::InterpreterConfig;
  use crate::error::ResultCode;

  fn interpreter() -> Interpreter {
    Interpreter::new(InterpreterConfig::new(64).with_code_region_size(16)).unwrap()
  }

  #[test]
  fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[0x01]).unwrap();

    let mut interpreter = interpreter();
    interpreter.load_file(file.path()).unwrap();

    assert_eq!(interpreter.state(), State::Ready);
    assert_eq!(interpreter.memory().read_byte(0).unwrap(), 0x01);
  }

  #[test]
  fn missing_file_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let mut interpreter = interpreter();

    let error = interpreter.load_file(dir.path().join("missing.bin")).unwrap_err();
    assert_eq!(error.code(), ResultCode::LoadFailed);
    assert!(error.to_string().contains("missing.bin"));
    assert_eq!(interpreter.state(), State::Empty);
  }

  #[test]
  fn empty_and_oversized_images_fail() {
    let mut interpreter = interpreter();
    assert!(matches!(interpreter.load_bytes(&[]), Err(MasmError::EmptyImage)));
    assert!(matches!(
      interpreter.load_bytes(&[0x02; 17]),
      Err(MasmError::ImageTooLarge { len: 17, limit: 16 })
    ));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[0x02; 40]).unwrap();
    assert!(matches!(
      interpreter.load_file(file.path()),
      Err(MasmError::ImageTooLarge { len: 40, limit: 16 })
    ));
  }

  #[test]
  fn reload_keeps_registers_and_data() {
    let mut interpreter = interpreter();
    interpreter.load_bytes(&[0x02, 0x02, 0x02, 0x01]).unwrap();
    interpreter.set_register(3, 77).unwrap();
    interpreter.write_memory_int(32, 5).unwrap();

    interpreter.load_bytes(&[0x01]).unwrap();

    assert_eq!(interpreter.memory().slice(0, 4).unwrap(), &[0x01, 0, 0, 0]);
    assert_eq!(interpreter.get_register(3).unwrap(), 77);
    assert_eq!(interpreter.read_memory_int(32).unwrap(), 5);
  }

  #[test]
  fn reload_after_a_run_resets_execution_state() {
    let mut interpreter = interpreter();
    interpreter.load_bytes(&[0x02, 0x01]).unwrap();
    interpreter.execute::<&str>(&[]).unwrap();
    assert_eq!(interpreter.state(), State::Halted);
    assert_eq!(interpreter.pc(), 1);
    assert_eq!(interpreter.steps(), 2);

    interpreter.load_bytes(&[0x01]).unwrap();
    assert_eq!(interpreter.state(), State::Ready);
    assert_eq!(interpreter.pc(), 0);
    assert_eq!(interpreter.steps(), 0);
    interpreter.execute::<&str>(&[]).unwrap();
    assert_eq!(interpreter.state(), State::Halted);
    assert_eq!(interpreter.steps(), 1);
  }

  #[test]
  fn reload_after_a_fault_resets_execution_state() {
    let mut interpreter = interpreter();
    interpreter.load_bytes(&[0x02, 0xEE]).unwrap();
    assert!(interpreter.execute::<&str>(&[]).is_err());
    assert_eq!(interpreter.state(), State::Faulted);
    assert_eq!(interpreter.pc(), 1);

    interpreter.load_bytes(&[0x01]).unwrap();
    assert_eq!(interpreter.state(), State::Ready);
    assert_eq!(interpreter.pc(), 0);
    assert_eq!(interpreter.steps(), 0);
    interpreter.execute::<&str>(&[]).unwrap();
    assert_eq!(interpreter.state(), State::Halted);
  }
}
