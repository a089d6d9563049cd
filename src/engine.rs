/*!
  The execution engine: argument seeding and the fetch-decode-execute loop.

  A run starts at address 0 and continues until `HLT` or a fault. Each iteration checks the
  instruction limit, fetches and decodes the instruction at the program counter, reports it to
  the trace sink if debugging is on, and dispatches it. A handler either falls through to the
  next instruction, jumps, or halts.

  Faults stop the run immediately. Whatever earlier instructions wrote to registers or memory
  stays written, as on a real machine.

  Invocation arguments are seeded as follows:

    R0      argument count
    R1      address of the argument table, which sits at the bottom of the data region
            (right above the code region): one 32-bit address per argument, followed by
            the NUL-terminated argument strings
    R<last> stack pointer, set to the end of RAM; the stack grows downward
*/

use std::cmp::Ordering;
use std::io::Write;

use crate::bytecode::{try_decode_instruction, Instruction, Opcode, Register};
use crate::error::{Fault, FaultKind, MasmError, MasmResult};
use crate::interpreter::{Interpreter, State};
use crate::memory::WORD_SIZE;
use crate::trace::TraceRecord;

/// What the loop does after an instruction.
enum Flow {
  Next,
  Jump(i32),
  Halt,
}

impl Interpreter {

  /**
    Runs the loaded program to completion with `args` as its invocation arguments. Returns
    `Ok` once `HLT` executes; a fault is returned as `MasmError::Fault` and leaves the
    instance in `State::Faulted`, with registers, memory, and program counter as they were
    at the faulting instruction.
  */
  pub fn execute<S: AsRef<str>>(&mut self, args: &[S]) -> MasmResult<()> {
    match self.state {
      State::Empty   => return Err(MasmError::NoProgram),
      State::Running => return Err(MasmError::Busy),
      _              => {}
    }

    self.seed_arguments(args)?;
    self.pc      = 0;
    self.steps   = 0;
    self.compare = Ordering::Equal;
    self.state   = State::Running;
    log::debug!("executing with {} argument(s)", args.len());

    let outcome = self.run();
    // Output is flushed whatever the outcome; a failing flush does not change it.
    if let Err(error) = self.output.flush() {
      log::warn!("cannot flush program output: {}", error);
    }

    match outcome {

      Ok(()) => {
        self.state = State::Halted;
        log::debug!("halted after {} instruction(s)", self.steps);
        Ok(())
      }

      Err(fault) => {
        self.state = State::Faulted;
        log::warn!("{}", fault);
        Err(fault.into())
      }

    }
  }

  /// Writes the argument table and strings above the code region and sets `R0`, `R1`, and the
  /// stack pointer. Nothing is written unless everything fits.
  fn seed_arguments<S: AsRef<str>>(&mut self, args: &[S]) -> MasmResult<()> {
    let base     = self.memory.code_region_size();
    let table    = WORD_SIZE * args.len();
    let strings  = args.iter().map(|arg| arg.as_ref().len() + 1).sum::<usize>();
    let required = base + table + strings;

    if required > self.memory.size() {
      return Err(MasmError::InvalidArgument(format!(
        "{} argument(s) need {} bytes above the code region but only {} are available",
        args.len(), table + strings, self.memory.size() - base
      )));
    }

    let mut cursor = base + table;
    for (i, arg) in args.iter().enumerate() {
      let bytes = arg.as_ref().as_bytes();
      self.memory.write_int((base + WORD_SIZE * i) as i64, cursor as i32)?;
      self.memory.write_bytes(cursor as i64, bytes)?;
      self.memory.write_byte((cursor + bytes.len()) as i64, 0)?;
      cursor += bytes.len() + 1;
    }

    let stack_pointer = self.registers.stack_pointer() as i64;
    self.registers.set(0, args.len() as i32)?;
    self.registers.set(1, base as i32)?;
    self.registers.set(stack_pointer, self.memory.size() as i32)?;
    Ok(())
  }

  fn fault(&self, instruction: Option<&Instruction>, kind: FaultKind) -> Fault {
    Fault {
      pc          : self.pc,
      instruction : instruction.map(Instruction::to_string),
      kind,
    }
  }

  fn run(&mut self) -> Result<(), Fault> {
    loop {
      if let Some(limit) = self.config.instruction_limit {
        if self.steps >= limit {
          return Err(self.fault(None, FaultKind::InstructionLimit(limit)));
        }
      }

      // Every transfer of control is checked, so `pc` is always inside memory here.
      let pc = self.pc;
      let instruction =
        try_decode_instruction(self.memory.tail(pc))
          .map_err(|kind| self.fault(None, kind))?;

      if self.config.debug {
        let record = TraceRecord {
          step      : self.steps,
          pc,
          instruction,
          registers : self.registers.as_slice().to_vec(),
        };
        self.trace.record(&record);
      }
      self.steps += 1;

      match self.dispatch(&instruction) {

        Ok(Flow::Next) => {
          let next = i64::from(pc) + instruction.width() as i64;
          self.pc  = self.check_target(next).map_err(|kind| self.fault(Some(&instruction), kind))?;
        }

        Ok(Flow::Jump(target)) => {
          self.pc = self.check_target(i64::from(target))
                        .map_err(|kind| self.fault(Some(&instruction), kind))?;
        }

        Ok(Flow::Halt) => return Ok(()),

        Err(kind) => return Err(self.fault(Some(&instruction), kind)),

      }
    }
  }

  /// A program counter value is valid if it addresses a byte of memory.
  fn check_target(&self, target: i64) -> Result<u32, FaultKind> {
    match target >= 0 && target < self.memory.size() as i64 {
      true  => Ok(target as u32),
      false => Err(FaultKind::PcOutOfRange(target)),
    }
  }

  // region Operand access

  fn read(&self, register: Register) -> Result<i32, FaultKind> {
    self.registers
        .get(i64::from(register))
        .map_err(|_| FaultKind::InvalidRegister { index: register, count: self.registers.len() })
  }

  fn write(&mut self, register: Register, value: i32) -> Result<(), FaultKind> {
    let count = self.registers.len();
    self.registers
        .set(i64::from(register), value)
        .map_err(|_| FaultKind::InvalidRegister { index: register, count })
  }

  fn load_word(&self, address: i32) -> Result<i32, FaultKind> {
    Ok(self.memory.read_int(i64::from(address))?)
  }

  fn store_word(&mut self, address: i32, value: i32) -> Result<(), FaultKind> {
    Ok(self.memory.write_int(i64::from(address), value)?)
  }

  fn stack_pointer(&self) -> Register {
    self.registers.stack_pointer() as Register
  }

  fn push(&mut self, value: i32) -> Result<(), FaultKind> {
    let sp  = self.stack_pointer();
    let top = self.read(sp)?.wrapping_sub(WORD_SIZE as i32);
    self.store_word(top, value)?;
    self.write(sp, top)
  }

  fn pop(&mut self) -> Result<i32, FaultKind> {
    let sp    = self.stack_pointer();
    let top   = self.read(sp)?;
    let value = self.load_word(top)?;
    self.write(sp, top.wrapping_add(WORD_SIZE as i32))?;
    Ok(value)
  }

  fn print(&mut self, bytes: &[u8]) -> Result<(), FaultKind> {
    self.output.write_all(bytes).map_err(FaultKind::Output)
  }

  // endregion

  // region Dispatch

  fn dispatch(&mut self, instruction: &Instruction) -> Result<Flow, FaultKind> {
    match *instruction {
      Instruction::Nullary(opcode)                                => self.nullary(opcode),
      Instruction::Register { opcode, register }                  => self.unary(opcode, register),
      Instruction::RegisterPair { opcode, first, second }         => self.binary(opcode, first, second),
      Instruction::RegisterImmediate { opcode, register, immediate } => {
        self.with_immediate(opcode, register, immediate)
      }
      Instruction::Immediate { opcode, immediate }                => self.branch(opcode, immediate),
    }
  }

  fn nullary(&mut self, opcode: Opcode) -> Result<Flow, FaultKind> {
    match opcode {
      Opcode::Hlt => Ok(Flow::Halt),
      Opcode::Ret => Ok(Flow::Jump(self.pop()?)),
      _           => Ok(Flow::Next),
    }
  }

  fn unary(&mut self, opcode: Opcode, register: Register) -> Result<Flow, FaultKind> {
    match opcode {

      Opcode::Pop => {
        // Validate the destination before the stack pointer moves.
        self.read(register)?;
        let value = self.pop()?;
        self.write(register, value)?;
      }

      Opcode::Push => {
        let value = self.read(register)?;
        self.push(value)?;
      }

      Opcode::Out => {
        let value = self.read(register)?;
        self.print(format!("{}\n", value).as_bytes())?;
      }

      Opcode::Outc => {
        let value = self.read(register)?;
        self.print(&[value as u8])?;
      }

      _ => {
        let value = self.read(register)?;
        let result = match opcode {
          Opcode::Inc => value.wrapping_add(1),
          Opcode::Dec => value.wrapping_sub(1),
          Opcode::Neg => value.wrapping_neg(),
          _           => !value,
        };
        self.write(register, result)?;
      }

    }
    Ok(Flow::Next)
  }

  fn binary(&mut self, opcode: Opcode, first: Register, second: Register) -> Result<Flow, FaultKind> {
    let a = self.read(first)?;
    let b = self.read(second)?;

    let result = match opcode {
      Opcode::Mov => b,
      Opcode::Add => a.wrapping_add(b),
      Opcode::Sub => a.wrapping_sub(b),
      Opcode::Mul => a.wrapping_mul(b),
      Opcode::Div | Opcode::Mod if b == 0 => return Err(FaultKind::DivisionByZero),
      Opcode::Div => a.wrapping_div(b),
      Opcode::Mod => a.wrapping_rem(b),
      Opcode::And => a & b,
      Opcode::Or  => a | b,
      Opcode::Xor => a ^ b,
      Opcode::Shl => a.wrapping_shl(b as u32),
      Opcode::Shr => a.wrapping_shr(b as u32),

      Opcode::Cmp => {
        self.compare = a.cmp(&b);
        return Ok(Flow::Next);
      }

      Opcode::Load  => self.load_word(b)?,
      Opcode::Loadb => i32::from(self.memory.read_byte(i64::from(b))?),

      Opcode::Store => {
        self.store_word(a, b)?;
        return Ok(Flow::Next);
      }

      _ => {
        self.memory.write_byte(i64::from(a), b as u8)?;
        return Ok(Flow::Next);
      }
    };

    self.write(first, result)?;
    Ok(Flow::Next)
  }

  fn with_immediate(&mut self, opcode: Opcode, register: Register, immediate: i32) -> Result<Flow, FaultKind> {
    let value = self.read(register)?;

    let result = match opcode {
      Opcode::Movi => immediate,
      Opcode::Addi => value.wrapping_add(immediate),
      Opcode::Subi => value.wrapping_sub(immediate),
      Opcode::Muli => value.wrapping_mul(immediate),
      Opcode::Lda  => self.load_word(immediate)?,

      Opcode::Cmpi => {
        self.compare = value.cmp(&immediate);
        return Ok(Flow::Next);
      }

      _ => {
        self.store_word(immediate, value)?;
        return Ok(Flow::Next);
      }
    };

    self.write(register, result)?;
    Ok(Flow::Next)
  }

  fn branch(&mut self, opcode: Opcode, target: i32) -> Result<Flow, FaultKind> {
    let taken = match opcode {
      Opcode::Jmp => true,
      Opcode::Je  => self.compare == Ordering::Equal,
      Opcode::Jne => self.compare != Ordering::Equal,
      Opcode::Jl  => self.compare == Ordering::Less,
      Opcode::Jle => self.compare != Ordering::Greater,
      Opcode::Jg  => self.compare == Ordering::Greater,
      Opcode::Jge => self.compare != Ordering::Less,

      _ => {
        // A bad target faults before the return address is pushed.
        self.check_target(i64::from(target))?;
        let return_address = self.pc as i32 + Opcode::Call.width() as i32;
        self.push(return_address)?;
        true
      }
    };

    match taken {
      true  => Ok(Flow::Jump(target)),
      false => Ok(Flow::Next),
    }
  }

  // endregion
}


#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::{Arc, Mutex};

  use crate::bytecode::assembly::assemble;
  use crate::config::InterpreterConfig;
  use crate::error::ResultCode;
  use crate::trace::CollectingTrace;

  /// A writer whose contents stay readable after it is handed to an interpreter.
  #[derive(Clone, Default)]
  struct SharedOutput(Arc<Mutex<Vec<u8>>>);

  impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
      Ok(())
    }
  }

  impl SharedOutput {
    fn text(&self) -> String {
      String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
  }

  fn machine(source: &str) -> Interpreter {
    let mut interpreter = Interpreter::new(InterpreterConfig::new(4096)).unwrap();
    interpreter.load_bytes(&assemble(source).unwrap().image).unwrap();
    interpreter
  }

  fn run(source: &str) -> Interpreter {
    let mut interpreter = machine(source);
    interpreter.execute::<&str>(&[]).unwrap();
    interpreter
  }

  fn fault_of(interpreter: &mut Interpreter) -> Fault {
    match interpreter.execute::<&str>(&[]) {
      Err(MasmError::Fault(fault)) => fault,
      other                        => panic!("expected a fault, got {:?}", other),
    }
  }

  #[test]
  fn halt_only_program() {
    let interpreter = run("HLT");
    assert_eq!(interpreter.state(), State::Halted);
    assert_eq!(interpreter.steps(), 1);
    assert_eq!(interpreter.pc(), 0);
  }

  #[test]
  fn execute_without_program() {
    let mut interpreter = Interpreter::new(InterpreterConfig::new(64)).unwrap();
    let error = interpreter.execute::<&str>(&[]).unwrap_err();
    assert!(matches!(error, MasmError::NoProgram));
    assert_eq!(error.code(), ResultCode::ExecutionFailed);
  }

  #[test]
  fn loop_sums_one_to_ten() {
    let interpreter = run("
          MOVI R0, 0
          MOVI R2, 10
    loop: ADD  R0, R2
          DEC  R2
          CMPI R2, 0
          JNE  loop
          HLT
    ");
    assert_eq!(interpreter.get_register(0).unwrap(), 55);
    assert_eq!(interpreter.get_register(2).unwrap(), 0);
  }

  #[test]
  fn arithmetic_wraps() {
    let interpreter = run("
      MOVI R2, 0x7FFFFFFF
      INC  R2
      MOVI R3, -7
      MOVI R4, 2
      DIV  R3, R4
      MOVI R5, -7
      MOD  R5, R4
      MOVI R6, -16
      SHR  R6, R4
      MOVI R7, 1
      MOVI R8, 33
      SHL  R7, R8
      HLT
    ");
    assert_eq!(interpreter.get_register(2).unwrap(), i32::MIN);
    assert_eq!(interpreter.get_register(3).unwrap(), -3);
    assert_eq!(interpreter.get_register(5).unwrap(), -1);
    assert_eq!(interpreter.get_register(6).unwrap(), -4);
    assert_eq!(interpreter.get_register(7).unwrap(), 2);
  }

  #[test]
  fn conditional_jumps_follow_compare() {
    let interpreter = run("
          MOVI R2, 3
          MOVI R3, 5
          CMP  R2, R3
          JGE  wrong
          JL   right
    wrong: MOVI R4, -1
          HLT
    right: MOVI R4, 1
          HLT
    ");
    assert_eq!(interpreter.get_register(4).unwrap(), 1);
  }

  #[test]
  fn memory_instructions() {
    let interpreter = run("
      MOVI  R2, 3000
      MOVI  R3, -559038737
      STORE R2, R3
      LOAD  R4, R2
      STA   R3, 3004
      LDA   R5, 3004
      MOVI  R6, 0x1FF
      STOREB R2, R6
      LOADB R7, R2
      HLT
    ");
    assert_eq!(interpreter.get_register(4).unwrap(), -559038737);
    assert_eq!(interpreter.get_register(5).unwrap(), -559038737);
    assert_eq!(interpreter.get_register(7).unwrap(), 0xFF);
    assert_eq!(interpreter.memory().read_byte(3000).unwrap(), 0xFF);
  }

  #[test]
  fn call_and_return_use_the_stack() {
    let interpreter = run("
          MOVI R2, 4
          CALL double
          CALL double
          HLT
    double:
          PUSH R2
          POP  R3
          ADD  R2, R3
          RET
    ");
    assert_eq!(interpreter.get_register(2).unwrap(), 16);
    assert_eq!(interpreter.get_register(15).unwrap(), 4096);
    // The second call's return address is left below the stack pointer.
    assert_eq!(interpreter.read_memory_int(4092).unwrap(), 16);
  }

  #[test]
  fn arguments_are_seeded() {
    let mut interpreter = machine("
      LOAD   R2, R1
      LOADB  R3, R2
      HLT
    ");
    interpreter.execute(&["go", "x"]).unwrap();

    let base = interpreter.config().code_region_size as i32;
    assert_eq!(interpreter.get_register(0).unwrap(), 2);
    assert_eq!(interpreter.get_register(1).unwrap(), base);
    assert_eq!(interpreter.get_register(2).unwrap(), base + 8);
    assert_eq!(interpreter.get_register(3).unwrap(), i32::from(b'g'));
    assert_eq!(interpreter.read_memory_int(i64::from(base) + 4).unwrap(), base + 11);
    assert_eq!(interpreter.memory().slice(i64::from(base) + 8, 5).unwrap(), b"go\0x\0");
  }

  #[test]
  fn oversized_arguments_are_rejected_before_running() {
    let mut interpreter = Interpreter::new(InterpreterConfig::new(16).with_code_region_size(8)).unwrap();
    interpreter.load_bytes(&[Opcode::Hlt.code()]).unwrap();

    let error = interpreter.execute(&["far too long"]).unwrap_err();
    assert_eq!(error.code(), ResultCode::InvalidArgument);
    assert_eq!(interpreter.state(), State::Ready);
    assert_eq!(interpreter.get_register(0).unwrap(), 0);
  }

  #[test]
  fn invalid_opcode_faults() {
    let mut interpreter = machine("NOP\n.byte 0xEE");
    let fault = fault_of(&mut interpreter);
    assert_eq!(fault.pc, 1);
    assert!(matches!(fault.kind, FaultKind::InvalidOpcode(0xEE)));
    assert_eq!(interpreter.state(), State::Faulted);
    assert_eq!(interpreter.pc(), 1);
  }

  #[test]
  fn running_off_the_program_hits_zeroed_memory() {
    let mut interpreter = machine("NOP");
    let fault = fault_of(&mut interpreter);
    assert!(matches!(fault.kind, FaultKind::InvalidOpcode(0)));
  }

  #[test]
  fn bad_register_faults_and_names_the_instruction() {
    let mut interpreter = machine("MOVI R2, 5\nMOV R2, R99");
    let error = interpreter.execute::<&str>(&[]).unwrap_err();
    assert_eq!(error.code(), ResultCode::ExecutionFailed);
    assert_eq!(
      error.to_string(),
      "fault at 0x0006 (MOV R2, R99): register R99 does not exist (16 registers)"
    );
    // Prior effects persist.
    assert_eq!(interpreter.get_register(2).unwrap(), 5);
  }

  #[test]
  fn memory_violation_faults() {
    let mut interpreter = machine("MOVI R2, 4094\nLOAD R3, R2");
    let fault = fault_of(&mut interpreter);
    assert!(matches!(fault.kind, FaultKind::MemoryViolation { address: 4094, width: 4, size: 4096 }));
  }

  #[test]
  fn division_by_zero_faults() {
    let mut interpreter = machine("MOVI R2, 1\nDIV R2, R3");
    let fault = fault_of(&mut interpreter);
    assert!(matches!(fault.kind, FaultKind::DivisionByZero));
    assert_eq!(fault.instruction.as_deref(), Some("DIV R2, R3"));
  }

  #[test]
  fn jumps_outside_memory_fault() {
    let mut interpreter = machine("NOP\nJMP 5000");
    let fault = fault_of(&mut interpreter);
    assert!(matches!(fault.kind, FaultKind::PcOutOfRange(5000)));
    assert_eq!(fault.pc, 1);
    assert_eq!(fault.instruction.as_deref(), Some("JMP 5000"));
    assert_eq!(interpreter.pc(), 1);

    let mut interpreter = machine("NOP\nJMP -4");
    let fault = fault_of(&mut interpreter);
    assert!(matches!(fault.kind, FaultKind::PcOutOfRange(-4)));
    assert_eq!(fault.pc, 1);
    assert_eq!(fault.instruction.as_deref(), Some("JMP -4"));
  }

  #[test]
  fn call_outside_memory_leaves_the_stack_alone() {
    let mut interpreter = machine("CALL 5000");
    let fault = fault_of(&mut interpreter);
    assert!(matches!(fault.kind, FaultKind::PcOutOfRange(5000)));
    assert_eq!(fault.instruction.as_deref(), Some("CALL 5000"));
    assert_eq!(interpreter.get_register(15).unwrap(), 4096);
    assert_eq!(interpreter.read_memory_int(4092).unwrap(), 0);
  }

  #[test]
  fn running_off_the_end_of_memory_faults_at_the_last_instruction() {
    let mut interpreter = Interpreter::new(InterpreterConfig::new(8).with_code_region_size(8)).unwrap();
    interpreter.load_bytes(&[0x02; 8]).unwrap();
    let fault = fault_of(&mut interpreter);
    assert!(matches!(fault.kind, FaultKind::PcOutOfRange(8)));
    assert_eq!(fault.pc, 7);
    assert_eq!(fault.instruction.as_deref(), Some("NOP"));
    assert_eq!(interpreter.pc(), 7);
    assert_eq!(interpreter.steps(), 8);
  }

  #[test]
  fn truncated_instruction_at_end_of_memory_faults() {
    let mut interpreter = Interpreter::new(InterpreterConfig::new(8).with_code_region_size(8)).unwrap();
    interpreter.load_bytes(&[0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x40]).unwrap();
    let fault = fault_of(&mut interpreter);
    assert!(matches!(fault.kind, FaultKind::TruncatedInstruction { width: 6, available: 1 }));
  }

  #[test]
  fn instruction_limit_stops_runaway_programs() {
    let mut interpreter = machine("spin: JMP spin");
    interpreter.set_instruction_limit(Some(1000));
    let fault = fault_of(&mut interpreter);
    assert!(matches!(fault.kind, FaultKind::InstructionLimit(1000)));
    assert_eq!(interpreter.steps(), 1000);
  }

  #[test]
  fn program_output() {
    let output = SharedOutput::default();
    let mut interpreter = machine("
      MOVI R2, -42
      OUT  R2
      MOVI R3, 0x41
      OUTC R3
      HLT
    ");
    interpreter.set_output(Box::new(output.clone()));
    interpreter.execute::<&str>(&[]).unwrap();
    assert_eq!(output.text(), "-42\nA");
  }

  struct UnflushableOutput;

  impl Write for UnflushableOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
      Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
      Err(std::io::Error::new(std::io::ErrorKind::Other, "closed"))
    }
  }

  #[test]
  fn failed_final_flush_does_not_change_the_outcome() {
    let mut interpreter = machine("MOVI R0, 7\nHLT");
    interpreter.set_output(Box::new(UnflushableOutput));
    interpreter.execute::<&str>(&[]).unwrap();
    assert_eq!(interpreter.state(), State::Halted);
    assert_eq!(interpreter.get_register(0).unwrap(), 7);
  }

  #[test]
  fn self_modifying_code() {
    // Overwrites the NOP at address 15 with HLT before reaching it.
    let interpreter = run("
      MOVI   R2, 15
      MOVI   R3, 1
      STOREB R2, R3
      NOP
      MOVI   R4, 9
      HLT
    ");
    assert_eq!(interpreter.get_register(4).unwrap(), 0);
  }

  #[test]
  fn rerun_after_halt() {
    let mut interpreter = machine("INC R5\nHLT");
    interpreter.execute::<&str>(&[]).unwrap();
    interpreter.execute::<&str>(&[]).unwrap();
    assert_eq!(interpreter.get_register(5).unwrap(), 2);
  }

  #[test]
  fn debug_trace_does_not_change_the_outcome() {
    let source = "MOVI R2, 7\nADDI R2, 1\nHLT";
    let plain  = run(source);

    let trace = CollectingTrace::new();
    let mut traced = machine(source);
    traced.set_debug(true);
    traced.set_trace_sink(Box::new(trace.clone()));
    traced.execute::<&str>(&[]).unwrap();

    assert_eq!(traced.registers(), plain.registers());
    assert_eq!(traced.state(), State::Halted);

    let records = trace.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].pc, 6);
    assert_eq!(records[1].instruction.to_string(), "ADDI R2, 1");
    assert_eq!(records[1].registers[2], 7);
    assert_eq!(records[2].step, 2);
  }

  #[test]
  fn no_trace_without_debug() {
    let trace = CollectingTrace::new();
    let mut interpreter = machine("HLT");
    interpreter.set_trace_sink(Box::new(trace.clone()));
    interpreter.execute::<&str>(&[]).unwrap();
    assert!(trace.records().is_empty());
  }
}
