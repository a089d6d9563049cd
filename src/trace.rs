/*!
  The debug side channel. When an instance runs with debugging enabled, the engine hands a
  `TraceRecord` to the instance's `TraceSink` before dispatching each instruction. Sinks return
  nothing, so whatever a sink does cannot change the outcome of the run.
*/

use std::fmt::{Display, Formatter};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use prettytable::{format as TableFormat, Table};

use crate::bytecode::Instruction;

/// Machine state at the moment an instruction is dispatched.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TraceRecord {
  /// Number of instructions dispatched before this one in the current run.
  pub step        : u64,
  pub pc          : u32,
  pub instruction : Instruction,
  /// Register values before the instruction executes.
  pub registers   : Vec<i32>,
}

pub trait TraceSink: Send {
  fn record(&mut self, record: &TraceRecord);
}

lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

fn make_register_table(registers: &[i32], highlight: Option<usize>, start: usize) -> Table {
  let mut table = Table::new();

  table.set_format(*TABLE_DISPLAY_FORMAT);
  table.set_titles(row![ubr->"Register", ubl->"Contents"]);

  for (i, value) in registers.iter().enumerate() {
    match Some(i + start) == highlight {

      true  => {
        table.add_row(row![r->format!("* --> R{} =", i + start), format!("{}", value)]);
      }

      false => {
        table.add_row(row![r->format!("R{} =", i + start), format!("{}", value)]);
      }

    }
  }
  table
}

impl Display for TraceRecord {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let highlight = self.instruction.destination().map(usize::from);
    let half      = (self.registers.len() + 1) / 2;

    let low_table  = make_register_table(&self.registers[..half], highlight, 0);
    let high_table = make_register_table(&self.registers[half..], highlight, half);

    let mut combined_table = table!([low_table, high_table]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(
      f,
      "step {}  pc {:#06x}  {}\n{}",
      self.step, self.pc, self.instruction, combined_table
    )
  }
}

/// Renders each record as a register table on a writer, standard error by default.
pub struct TableTrace<W: Write + Send> {
  out: W,
}

impl TableTrace<io::Stderr> {
  pub fn stderr() -> TableTrace<io::Stderr> {
    TableTrace { out: io::stderr() }
  }
}

impl<W: Write + Send> TableTrace<W> {
  pub fn new(out: W) -> TableTrace<W> {
    TableTrace { out }
  }

  pub fn into_inner(self) -> W {
    self.out
  }
}

impl<W: Write + Send> TraceSink for TableTrace<W> {
  fn record(&mut self, record: &TraceRecord) {
    // A broken diagnostics stream must not disturb the program.
    let _ = writeln!(self.out, "{}", record);
  }
}

/// Keeps every record in memory. Clones share the same buffer, so a host can keep one clone
/// and hand the other to an interpreter.
#[derive(Clone, Default)]
pub struct CollectingTrace {
  records: Arc<Mutex<Vec<TraceRecord>>>,
}

impl CollectingTrace {
  pub fn new() -> CollectingTrace {
    CollectingTrace::default()
  }

  pub fn records(&self) -> Vec<TraceRecord> {
    match self.records.lock() {
      Ok(records)   => records.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }
}

impl TraceSink for CollectingTrace {
  fn record(&mut self, record: &TraceRecord) {
    let mut records = match self.records.lock() {
      Ok(records)   => records,
      Err(poisoned) => poisoned.into_inner(),
    };
    records.push(record.clone());
  }
}
