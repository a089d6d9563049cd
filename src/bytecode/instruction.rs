use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};

/// A register operand, `R0` through `R255`.
pub type Register = u8;
/// An immediate operand: a constant, an absolute address, or a jump target.
pub type Immediate = i32;

/**
  Opcodes of the virtual machine.

  The high nibble of an opcode determines the operand layout of the instruction, so a decoder
  knows an instruction's width from its first byte alone. Consequently, the numbering below is
  significant. Order-dependencies:
      ```
      Opcode::format()
      binary::try_decode_instruction()
      ```
  Byte `0x00` is not an opcode.
*/
#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq, Debug,          Hash
)]
#[repr(u8)]
pub enum Opcode {
  // Nullary, [Opcode:8] //
  #[strum(serialize = "HLT")]    Hlt    = 0x01,
  #[strum(serialize = "NOP")]    Nop    = 0x02,
  #[strum(serialize = "RET")]    Ret    = 0x03,

  // Register, [Opcode:8][Register:8] //
  #[strum(serialize = "INC")]    Inc    = 0x10,
  #[strum(serialize = "DEC")]    Dec    = 0x11,
  #[strum(serialize = "NEG")]    Neg    = 0x12,
  #[strum(serialize = "NOT")]    Not    = 0x13,
  #[strum(serialize = "PUSH")]   Push   = 0x14,
  #[strum(serialize = "POP")]    Pop    = 0x15,
  #[strum(serialize = "OUT")]    Out    = 0x16,
  #[strum(serialize = "OUTC")]   Outc   = 0x17,

  // Register pair, [Opcode:8][Register:8][Register:8] //
  #[strum(serialize = "MOV")]    Mov    = 0x20,
  #[strum(serialize = "ADD")]    Add    = 0x21,
  #[strum(serialize = "SUB")]    Sub    = 0x22,
  #[strum(serialize = "MUL")]    Mul    = 0x23,
  #[strum(serialize = "DIV")]    Div    = 0x24,
  #[strum(serialize = "MOD")]    Mod    = 0x25,
  #[strum(serialize = "AND")]    And    = 0x26,
  #[strum(serialize = "OR")]     Or     = 0x27,
  #[strum(serialize = "XOR")]    Xor    = 0x28,
  #[strum(serialize = "SHL")]    Shl    = 0x29,
  #[strum(serialize = "SHR")]    Shr    = 0x2A,
  #[strum(serialize = "CMP")]    Cmp    = 0x2B,
  #[strum(serialize = "LOAD")]   Load   = 0x2C,
  #[strum(serialize = "STORE")]  Store  = 0x2D,
  #[strum(serialize = "LOADB")]  Loadb  = 0x2E,
  #[strum(serialize = "STOREB")] Storeb = 0x2F,

  // Register and immediate, [Opcode:8][Register:8][Immediate:32] //
  #[strum(serialize = "MOVI")]   Movi   = 0x40,
  #[strum(serialize = "ADDI")]   Addi   = 0x41,
  #[strum(serialize = "SUBI")]   Subi   = 0x42,
  #[strum(serialize = "MULI")]   Muli   = 0x43,
  #[strum(serialize = "CMPI")]   Cmpi   = 0x44,
  #[strum(serialize = "LDA")]    Lda    = 0x45,
  #[strum(serialize = "STA")]    Sta    = 0x46,

  // Immediate, [Opcode:8][Immediate:32] //
  #[strum(serialize = "JMP")]    Jmp    = 0x50,
  #[strum(serialize = "JE")]     Je     = 0x51,
  #[strum(serialize = "JNE")]    Jne    = 0x52,
  #[strum(serialize = "JL")]     Jl     = 0x53,
  #[strum(serialize = "JLE")]    Jle    = 0x54,
  #[strum(serialize = "JG")]     Jg     = 0x55,
  #[strum(serialize = "JGE")]    Jge    = 0x56,
  #[strum(serialize = "CALL")]   Call   = 0x57,
}

/// Operand layout of an instruction.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Format {
  Nullary,
  Register,
  RegisterPair,
  RegisterImmediate,
  Immediate,
}

impl Format {
  /// Encoded width in bytes, opcode included.
  pub fn width(&self) -> usize {
    match self {
      Format::Nullary           => 1,
      Format::Register          => 2,
      Format::RegisterPair      => 3,
      Format::RegisterImmediate => 6,
      Format::Immediate         => 5,
    }
  }

  /// Number of assembly operands.
  pub fn arity(&self) -> usize {
    match self {
      Format::Nullary                      => 0,
      Format::Register | Format::Immediate => 1,
      _                                    => 2,
    }
  }
}

impl Opcode {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn format(&self) -> Format {
    match self.code() >> 4 {
      0x0 => Format::Nullary,
      0x1 => Format::Register,
      0x2 => Format::RegisterPair,
      0x4 => Format::RegisterImmediate,
      _   => Format::Immediate,
    }
  }

  pub fn width(&self) -> usize {
    self.format().width()
  }

  /// Whether the immediate operand of this opcode is a code address.
  pub fn is_branch(&self) -> bool {
    self.format() == Format::Immediate
  }
}

/// Holds the unencoded components of an instruction. As such, it enumerates the possible
/// operand combinations.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Instruction {
  /// [Opcode:8]
  Nullary(Opcode),
  /// [Opcode:8][Register:8]
  Register {
    opcode   : Opcode,
    register : Register
  },
  /// [Opcode:8][Register:8][Register:8]
  RegisterPair {
    opcode : Opcode,
    first  : Register,
    second : Register
  },
  /// [Opcode:8][Register:8][Immediate:32]
  RegisterImmediate {
    opcode    : Opcode,
    register  : Register,
    immediate : Immediate
  },
  /// [Opcode:8][Immediate:32]
  Immediate {
    opcode    : Opcode,
    immediate : Immediate
  },
}

impl Instruction {
  pub fn opcode(&self) -> Opcode {
    match self {
      | Instruction::Nullary(opcode)
      | Instruction::Register { opcode, .. }
      | Instruction::RegisterPair { opcode, .. }
      | Instruction::RegisterImmediate { opcode, .. }
      | Instruction::Immediate { opcode, .. } => *opcode
    }
  }

  pub fn width(&self) -> usize {
    self.opcode().width()
  }

  /// The register the instruction writes to, if any. Used to highlight trace output.
  pub fn destination(&self) -> Option<Register> {
    match self {
      Instruction::Register { opcode, register } => match opcode {
        Opcode::Push | Opcode::Out | Opcode::Outc => None,
        _                                         => Some(*register)
      },
      Instruction::RegisterPair { opcode, first, .. } => match opcode {
        Opcode::Cmp | Opcode::Store | Opcode::Storeb => None,
        _                                            => Some(*first)
      },
      Instruction::RegisterImmediate { opcode, register, .. } => match opcode {
        Opcode::Cmpi | Opcode::Sta => None,
        _                          => Some(*register)
      },
      _ => None
    }
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      Instruction::Nullary(opcode) => {
        write!(f, "{}", opcode)
      }

      Instruction::Register { opcode, register } => {
        write!(f, "{} R{}", opcode, register)
      }

      Instruction::RegisterPair { opcode, first, second } => {
        write!(f, "{} R{}, R{}", opcode, first, second)
      }

      Instruction::RegisterImmediate { opcode, register, immediate } => {
        write!(f, "{} R{}, {}", opcode, register, immediate)
      }

      Instruction::Immediate { opcode, immediate } => {
        write!(f, "{} {}", opcode, immediate)
      }

    }
  }
}
