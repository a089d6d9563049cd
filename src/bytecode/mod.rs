/*!

  Instructions are variable width and byte aligned, so a program image is a plain byte string
  copied to address 0 of RAM. Multi-byte immediates are 32 bit little-endian. The first byte
  is the opcode; its high nibble fixes the operand layout:

    0x0_   nullary              [Opcode:8]                             1 byte
    0x1_   register             [Opcode:8][Register:8]                 2 bytes
    0x2_   register pair        [Opcode:8][Register:8][Register:8]     3 bytes
    0x4_   register, immediate  [Opcode:8][Register:8][Immediate:32]   6 bytes
    0x5_   immediate            [Opcode:8][Immediate:32]               5 bytes

  Registers are a single byte, so an instruction can name any of up to 256 registers; whether
  that register exists is checked when the instruction executes, against the register count of
  the instance running it. Likewise immediates used as addresses are only checked on use.

  An enum is used for the opcode itself and a separate `Instruction` enum for the decoded
  operand combinations, rather than one variant per opcode, so that the decoder and the
  assembler each handle five shapes instead of forty-odd opcodes.

*/

mod binary;
mod instruction;
pub mod assembly;

pub use binary::{disassemble, encode_instruction, encode_program, try_decode_instruction, DisassembledLine};
pub use instruction::{Format, Immediate, Instruction, Opcode, Register};
