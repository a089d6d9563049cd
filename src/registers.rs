//! The register file: a fixed bank of signed 32-bit registers, indexed from zero.

use std::fmt::{Display, Formatter};

use crate::error::{MasmError, MasmResult};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegisterFile {
  registers: Box<[i32]>,
}

impl RegisterFile {

  /// A register file of `count` registers, all zero.
  pub fn new(count: usize) -> RegisterFile {
    RegisterFile {
      registers: vec![0; count].into_boxed_slice()
    }
  }

  pub fn len(&self) -> usize {
    self.registers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.registers.is_empty()
  }

  /// The index of the stack pointer, which is the last register.
  pub fn stack_pointer(&self) -> usize {
    self.registers.len() - 1
  }

  fn slot(&self, index: i64) -> MasmResult<usize> {
    if index < 0 || index as u64 >= self.registers.len() as u64 {
      return Err(MasmError::RegisterOutOfRange { index, count: self.registers.len() });
    }
    Ok(index as usize)
  }

  pub fn get(&self, index: i64) -> MasmResult<i32> {
    let slot = self.slot(index)?;
    Ok(self.registers[slot])
  }

  /// Stores `value` in register `index`. Nothing is written if the index is out of range.
  pub fn set(&mut self, index: i64, value: i32) -> MasmResult<()> {
    let slot = self.slot(index)?;
    self.registers[slot] = value;
    Ok(())
  }

  pub fn as_slice(&self) -> &[i32] {
    &self.registers
  }
}

impl Display for RegisterFile {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{}",
      self.registers
          .iter()
          .enumerate()
          .map(|(i, value)| format!("R{}={}", i, value))
          .collect::<Vec<String>>()
          .join(" ")
    )
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn starts_zeroed() {
    let registers = RegisterFile::new(16);
    assert_eq!(registers.len(), 16);
    assert!(registers.as_slice().iter().all(|&r| r == 0));
    assert_eq!(registers.stack_pointer(), 15);
  }

  #[test]
  fn get_and_set() {
    let mut registers = RegisterFile::new(4);
    registers.set(3, -7).unwrap();
    assert_eq!(registers.get(3).unwrap(), -7);
    assert_eq!(registers.get(0).unwrap(), 0);
  }

  #[test]
  fn out_of_range_indices_fail_without_mutation() {
    let mut registers = RegisterFile::new(4);
    for &index in &[-1i64, 4, 255, i64::from(i32::MIN)] {
      assert!(matches!(
        registers.get(index),
        Err(MasmError::RegisterOutOfRange { count: 4, .. })
      ));
      assert!(registers.set(index, 1).is_err());
    }
    assert_eq!(registers.as_slice(), &[0, 0, 0, 0]);
  }

  #[test]
  fn display_lists_every_register() {
    let mut registers = RegisterFile::new(3);
    registers.set(1, 5).unwrap();
    assert_eq!(registers.to_string(), "R0=0 R1=5 R2=0");
  }
}
