/*!
  This module is responsible for the encoding and decoding of binary instructions.

*/
use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use super::{Format, Immediate, Instruction, Opcode};
use crate::error::FaultKind;
use crate::symboltable::SymbolTable;

fn immediate_at(bytes: &[u8], offset: usize) -> Immediate {
  let mut word = [0u8; 4];
  word.copy_from_slice(&bytes[offset..offset + 4]);
  Immediate::from_le_bytes(word)
}

/**
  Decodes the instruction at the start of `bytes`. Trailing bytes beyond the instruction's
  width are ignored.
*/
pub fn try_decode_instruction(bytes: &[u8]) -> Result<Instruction, FaultKind> {
  let first = match bytes.first() {
    Some(byte) => *byte,
    None       => return Err(FaultKind::TruncatedInstruction { width: 1, available: 0 })
  };
  let opcode = Opcode::try_from(first).map_err(|_| FaultKind::InvalidOpcode(first))?;

  let width = opcode.width();
  if bytes.len() < width {
    return Err(FaultKind::TruncatedInstruction { width, available: bytes.len() });
  }

  let instruction =
    match opcode.format() {
      Format::Nullary => Instruction::Nullary(opcode),

      Format::Register => Instruction::Register {
        opcode,
        register: bytes[1]
      },

      Format::RegisterPair => Instruction::RegisterPair {
        opcode,
        first  : bytes[1],
        second : bytes[2]
      },

      Format::RegisterImmediate => Instruction::RegisterImmediate {
        opcode,
        register  : bytes[1],
        immediate : immediate_at(bytes, 2)
      },

      Format::Immediate => Instruction::Immediate {
        opcode,
        immediate: immediate_at(bytes, 1)
      },
    };

  Ok(instruction)
}

/**
  Appends the encoding of `instruction` to `code`. The variant must match the opcode's format;
  `Instruction` values built by the assembler or the decoder always do.
*/
pub fn encode_instruction(instruction: &Instruction, code: &mut Vec<u8>) {
  code.push(instruction.opcode().code());
  match *instruction {

    Instruction::Nullary(_) => {}

    Instruction::Register { register, .. } => {
      code.push(register);
    }

    Instruction::RegisterPair { first, second, .. } => {
      code.push(first);
      code.push(second);
    }

    Instruction::RegisterImmediate { register, immediate, .. } => {
      code.push(register);
      code.extend_from_slice(&immediate.to_le_bytes());
    }

    Instruction::Immediate { immediate, .. } => {
      code.extend_from_slice(&immediate.to_le_bytes());
    }

  }
}

/// Encodes a sequence of instructions into a bytecode image.
pub fn encode_program(instructions: &[Instruction]) -> Vec<u8> {
  let mut code = Vec::with_capacity(instructions.iter().map(Instruction::width).sum());
  for instruction in instructions {
    encode_instruction(instruction, &mut code);
  }
  code
}

/// One line of a disassembly listing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DisassembledLine {
  pub address : u32,
  pub label   : Option<String>,
  /// Either a decoded instruction or the byte that could not be decoded.
  pub item    : Result<Instruction, u8>,
  /// Symbolic jump target, if the instruction branches to a labeled address.
  pub target  : Option<String>,
}

impl Display for DisassembledLine {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    if let Some(label) = &self.label {
      writeln!(f, "{}:", label)?;
    }
    write!(f, "{:#06x}:  ", self.address)?;
    match (&self.item, &self.target) {
      (Ok(Instruction::Immediate { opcode, .. }), Some(target)) => write!(f, "{} {}", opcode, target),
      (Ok(instruction), _)                                      => write!(f, "{}", instruction),
      (Err(byte), _)                                            => write!(f, ".byte {:#04x}", byte),
    }
  }
}

/**
  Linearly decodes `image`. Bytes that do not start a valid instruction (data, padding) are
  reported one at a time so decoding can resynchronize on the next byte.
*/
pub fn disassemble(image: &[u8], symbols: Option<&SymbolTable>) -> Vec<DisassembledLine> {
  let mut lines  = vec![];
  let mut offset = 0usize;

  while offset < image.len() {
    let address = offset as u32;
    let label   = symbols.and_then(|table| table.get_symbol(address)).map(|s| s.to_string());

    match try_decode_instruction(&image[offset..]) {

      Ok(instruction) => {
        let target = match instruction {
          Instruction::Immediate { opcode, immediate } if opcode.is_branch() && immediate >= 0 => {
            symbols.and_then(|table| table.get_symbol(immediate as u32)).map(|s| s.to_string())
          }
          _ => None
        };
        lines.push(DisassembledLine { address, label, item: Ok(instruction), target });
        offset += instruction.width();
      }

      Err(_) => {
        lines.push(DisassembledLine { address, label, item: Err(image[offset]), target: None });
        offset += 1;
      }

    }
  }

  lines
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decode_each_format() {
    let program = vec![
      Instruction::Nullary(Opcode::Nop),
      Instruction::Register { opcode: Opcode::Push, register: 7 },
      Instruction::RegisterPair { opcode: Opcode::Sub, first: 1, second: 15 },
      Instruction::RegisterImmediate { opcode: Opcode::Movi, register: 0, immediate: i32::MIN },
      Instruction::Immediate { opcode: Opcode::Jne, immediate: 0x0102_0304 },
      Instruction::Nullary(Opcode::Hlt),
    ];
    let image = encode_program(&program);
    assert_eq!(image.len(), 1 + 2 + 3 + 6 + 5 + 1);

    let mut offset = 0;
    for expected in &program {
      let decoded = try_decode_instruction(&image[offset..]).unwrap();
      assert_eq!(&decoded, expected);
      offset += decoded.width();
    }
  }

  #[test]
  fn immediates_are_little_endian() {
    let image = encode_program(&[Instruction::Immediate { opcode: Opcode::Jmp, immediate: 0x11223344 }]);
    assert_eq!(image, vec![0x50, 0x44, 0x33, 0x22, 0x11]);
  }

  #[test]
  fn invalid_opcode() {
    assert!(matches!(try_decode_instruction(&[0x00]), Err(FaultKind::InvalidOpcode(0))));
    assert!(matches!(try_decode_instruction(&[0x3F, 0, 0]), Err(FaultKind::InvalidOpcode(0x3F))));
  }

  #[test]
  fn truncated_instruction() {
    assert!(matches!(
      try_decode_instruction(&[0x40, 1, 2]),
      Err(FaultKind::TruncatedInstruction { width: 6, available: 3 })
    ));
    assert!(matches!(
      try_decode_instruction(&[]),
      Err(FaultKind::TruncatedInstruction { available: 0, .. })
    ));
  }

  #[test]
  fn disassembly_resynchronizes_after_data() {
    let mut image = encode_program(&[Instruction::Nullary(Opcode::Hlt)]);
    image.push(0x00);
    image.push(Opcode::Ret.code());

    let lines = disassemble(&image, None);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1].item, Err(0x00));
    assert_eq!(lines[2].address, 2);
    assert_eq!(lines[2].to_string(), "0x0002:  RET");
  }

  #[test]
  fn disassembly_uses_labels() {
    let image = encode_program(&[
      Instruction::Nullary(Opcode::Nop),
      Instruction::Immediate { opcode: Opcode::Jmp, immediate: 0 },
    ]);
    let mut symbols = SymbolTable::new();
    symbols.insert("top", 0).unwrap();

    let listing: Vec<String> = disassemble(&image, Some(&symbols)).iter().map(|l| l.to_string()).collect();
    assert_eq!(listing, vec!["top:\n0x0000:  NOP".to_string(), "0x0001:  JMP top".to_string()]);
  }
}
