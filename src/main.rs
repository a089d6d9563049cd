//! `masm`: assemble, run, and disassemble MicroASM programs from the command line.

use std::fs;
use std::path::Path;
use std::process;
use std::str::FromStr;

use argh::FromArgs;
use log::{LevelFilter, Log, Metadata, Record};
use thiserror::Error;

use microasm::bytecode::disassemble;
use microasm::config::DEFAULT_RAM_SIZE;
use microasm::symboltable::SymbolTable;
use microasm::{assemble, AssemblyError, Interpreter, InterpreterConfig, MasmError};

/// Assemble, run, and disassemble MicroASM programs.
#[derive(FromArgs)]
struct Arguments {
  /// log library events to stderr at debug level (overrides MASM_LOG)
  #[argh(switch, short = 'v')]
  verbose: bool,

  #[argh(subcommand)]
  command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
  Asm(AsmCommand),
  Run(RunCommand),
  Disasm(DisasmCommand),
}

/// Assemble a source file into a bytecode image.
#[derive(FromArgs)]
#[argh(subcommand, name = "asm")]
struct AsmCommand {
  /// the assembly source
  #[argh(positional)]
  input: String,

  /// the image to write, the input with a `.bin` extension if not given
  #[argh(option, short = 'o')]
  output: Option<String>,
}

/// Run a bytecode image, or an assembly source ending in `.masm`.
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
  /// the program to run
  #[argh(positional)]
  program: String,

  /// arguments passed to the program
  #[argh(positional)]
  args: Vec<String>,

  /// bytes of RAM
  #[argh(option, default = "DEFAULT_RAM_SIZE")]
  ram: usize,

  /// print a register table before every instruction
  #[argh(switch)]
  debug: bool,

  /// stop with a fault after this many instructions
  #[argh(option)]
  limit: Option<u64>,
}

/// Print the instructions of a bytecode image, or of an assembly source ending in `.masm`.
#[derive(FromArgs)]
#[argh(subcommand, name = "disasm")]
struct DisasmCommand {
  /// the program to disassemble
  #[argh(positional)]
  program: String,
}

#[derive(Debug, Error)]
enum CliError {
  #[error("cannot read '{path}': {source}")]
  Read {
    path   : String,
    #[source]
    source : std::io::Error,
  },

  #[error("cannot write '{path}': {source}")]
  Write {
    path   : String,
    #[source]
    source : std::io::Error,
  },

  #[error("{path}: {source}")]
  Assembly {
    path   : String,
    #[source]
    source : AssemblyError,
  },

  #[error(transparent)]
  Interpreter(#[from] MasmError),
}

// region Logging

/// Writes log records to stderr. The level is set once at startup through `log::set_max_level`.
struct StderrLogger;

impl Log for StderrLogger {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= log::max_level()
  }

  fn log(&self, record: &Record) {
    if self.enabled(record.metadata()) {
      eprintln!("[{}] {}", record.level(), record.args());
    }
  }

  fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn install_logger(verbose: bool) {
  let level =
    match verbose {
      true  => LevelFilter::Debug,
      false => std::env::var("MASM_LOG")
        .ok()
        .and_then(|level| LevelFilter::from_str(&level).ok())
        .unwrap_or(LevelFilter::Warn),
    };
  if log::set_logger(&LOGGER).is_ok() {
    log::set_max_level(level);
  }
}

// endregion

fn is_source(path: &str) -> bool {
  Path::new(path).extension().map_or(false, |extension| extension == "masm")
}

fn assemble_file(path: &str) -> Result<(Vec<u8>, SymbolTable), CliError> {
  let text = fs::read_to_string(path)
    .map_err(|source| CliError::Read { path: path.to_string(), source })?;
  let assembly = assemble(&text)
    .map_err(|source| CliError::Assembly { path: path.to_string(), source })?;
  Ok((assembly.image, assembly.symbols))
}

fn run_asm(command: AsmCommand) -> Result<(), CliError> {
  let (image, _) = assemble_file(&command.input)?;
  let output =
    match command.output {
      Some(output) => output,
      None         => Path::new(&command.input).with_extension("bin").display().to_string(),
    };
  fs::write(&output, &image).map_err(|source| CliError::Write { path: output.clone(), source })?;
  log::info!("wrote {} bytes to {}", image.len(), output);
  Ok(())
}

fn run_program(command: RunCommand) -> Result<(), CliError> {
  let config =
    InterpreterConfig::new(command.ram)
      .with_debug(command.debug)
      .with_instruction_limit(command.limit);
  let mut interpreter = Interpreter::new(config)?;

  match is_source(&command.program) {
    true  => {
      let (image, _) = assemble_file(&command.program)?;
      interpreter.load_bytes(&image)?;
    }
    false => interpreter.load_file(&command.program)?,
  }

  let outcome = interpreter.execute(&command.args);
  if command.debug {
    eprintln!("{}", interpreter);
  }
  outcome?;

  println!("R0 = {}", interpreter.get_register(0)?);
  Ok(())
}

fn run_disasm(command: DisasmCommand) -> Result<(), CliError> {
  let (image, symbols) =
    match is_source(&command.program) {
      true  => {
        let (image, symbols) = assemble_file(&command.program)?;
        (image, Some(symbols))
      }
      false => {
        let image = fs::read(&command.program)
          .map_err(|source| CliError::Read { path: command.program.clone(), source })?;
        (image, None)
      }
    };

  for line in disassemble(&image, symbols.as_ref()) {
    println!("{}", line);
  }
  Ok(())
}

fn main() {
  let arguments = argh::from_env::<Arguments>();
  install_logger(arguments.verbose);

  let result =
    match arguments.command {
      Command::Asm(command)    => run_asm(command),
      Command::Run(command)    => run_program(command),
      Command::Disasm(command) => run_disasm(command),
    };

  if let Err(error) = result {
    eprintln!("masm: {}", error);
    process::exit(1);
  }
}
