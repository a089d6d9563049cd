/*!
  The human readable textual form of bytecode is called assembly. This module parses assembly
  with `nom` and uses the `strum` derives of `Opcode` to map mnemonics to opcodes.

  ```text
  ; sum the numbers 1..=10 into R0
          MOVI R0, 0
          MOVI R2, 10
  loop:   ADD  R0, R2
          DEC  R2
          CMPI R2, 0
          JNE  loop
          HLT
  greeting: .string "hi\n"
  ```

  One statement per line: an optional `label:`, then either a mnemonic with comma-separated
  operands or a directive. Operands are registers (`R0`..`R255`), integers (decimal or `0x`
  hex, optionally negative), or label names. Directives are `.int`, `.byte`, and `.string`,
  which appends a NUL terminator. Comments start with `;` or `#`.
*/

use std::str::FromStr;

use nom::{
  branch::alt,
  bytes::complete::{tag, tag_no_case, take_while},
  character::complete::{
    alpha1,
    char as one_char,
    digit1,
    hex_digit1,
    one_of,
    space0
  },
  combinator::{map, opt, recognize, rest},
  multi::separated_list,
  sequence::{delimited, pair, preceded, terminated, tuple},
  IResult
};
use thiserror::Error;

use crate::bytecode::{encode_instruction, Format, Immediate, Instruction, Opcode, Register};
use crate::symboltable::SymbolTable;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum AssemblyError {
  #[error("line {line}: cannot parse `{text}`")]
  Syntax { line: usize, text: String },

  #[error("line {line}: {name} is not an operation")]
  NotAnOperation { line: usize, name: String },

  #[error("line {line}: .{name} is not a directive")]
  NotADirective { line: usize, name: String },

  #[error("line {line}: {operation} expects {expected}")]
  WrongOperands { line: usize, operation: Opcode, expected: &'static str },

  #[error("line {line}: bad literal `{text}`")]
  BadLiteral { line: usize, text: String },

  #[error("line {line}: register {text} does not exist")]
  InvalidRegister { line: usize, text: String },

  #[error("line {line}: label `{name}` is already defined")]
  DuplicateLabel { line: usize, name: String },

  #[error("line {line}: undefined label `{name}`")]
  UndefinedLabel { line: usize, name: String },

  #[error("program of {0} bytes exceeds the addressable range")]
  TooLarge(usize),
}

/// The product of assembling a source text.
pub struct Assembly {
  pub image   : Vec<u8>,
  pub symbols : SymbolTable,
}

// region Syntax

#[derive(Clone, Debug, Eq, PartialEq)]
enum Operand<'a> {
  Register(&'a str),
  Number(&'a str),
  Label(&'a str),
  Text(&'a str),
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Statement<'a> {
  Operation {
    name     : &'a str,
    operands : Vec<Operand<'a>>
  },
  Directive {
    name     : &'a str,
    operands : Vec<Operand<'a>>
  },
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Line<'a> {
  label     : Option<&'a str>,
  statement : Option<Statement<'a>>,
}

fn blank(input: &str) -> IResult<&str, &str> {
  space0(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
  recognize(pair(
    alt((alpha1, tag("_"))),
    take_while(|c: char| c.is_alphanumeric() || c == '_')
  ))(input)
}

fn number(input: &str) -> IResult<&str, &str> {
  recognize(tuple((
    opt(one_char('-')),
    alt((recognize(preceded(tag_no_case("0x"), hex_digit1)), digit1))
  )))(input)
}

fn string_literal(input: &str) -> IResult<&str, &str> {
  delimited(one_char('"'), take_while(|c: char| c != '"'), one_char('"'))(input)
}

/// `R` followed only by digits names a register; any other identifier is a label.
fn classify(name: &str) -> Operand {
  let mut chars = name.chars();
  let is_register =
    matches!(chars.next(), Some('r') | Some('R'))
      && name.len() > 1
      && chars.all(|c| c.is_ascii_digit());
  match is_register {
    true  => Operand::Register(name),
    false => Operand::Label(name),
  }
}

fn operand(input: &str) -> IResult<&str, Operand> {
  alt((
    map(string_literal, Operand::Text),
    map(number, Operand::Number),
    map(identifier, classify),
  ))(input)
}

fn operands(input: &str) -> IResult<&str, Vec<Operand>> {
  separated_list(delimited(space0, one_char(','), space0), operand)(input)
}

fn statement(input: &str) -> IResult<&str, Statement> {
  alt((
    map(
      pair(preceded(one_char('.'), identifier), preceded(space0, operands)),
      |(name, operands)| Statement::Directive { name, operands }
    ),
    map(
      pair(identifier, preceded(space0, operands)),
      |(name, operands)| Statement::Operation { name, operands }
    ),
  ))(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
  preceded(one_of(";#"), rest)(input)
}

fn line(input: &str) -> IResult<&str, Line> {
  let (input, _)         = blank(input)?;
  let (input, label)     = opt(terminated(identifier, preceded(space0, one_char(':'))))(input)?;
  let (input, _)         = blank(input)?;
  let (input, statement) = opt(statement)(input)?;
  let (input, _)         = blank(input)?;
  let (input, _)         = opt(comment)(input)?;
  Ok((input, Line { label, statement }))
}

fn parse_line(number: usize, text: &str) -> Result<Line, AssemblyError> {
  match line(text) {
    Ok(("", parsed)) => Ok(parsed),
    _                => Err(AssemblyError::Syntax { line: number, text: text.trim().to_string() }),
  }
}

// endregion

// region Encoding

fn parse_number(line: usize, text: &str) -> Result<i64, AssemblyError> {
  let bad_literal = || AssemblyError::BadLiteral { line, text: text.to_string() };
  let (negative, digits) = match text.strip_prefix('-') {
    Some(digits) => (true, digits),
    None         => (false, text),
  };
  let magnitude =
    match digits.get(..2) {
      Some("0x") | Some("0X") => i64::from_str_radix(&digits[2..], 16),
      _                       => digits.parse::<i64>(),
    }.map_err(|_| bad_literal())?;
  Ok(if negative { -magnitude } else { magnitude })
}

/// Integers are accepted if they fit in 32 bits either as signed or as unsigned.
fn to_immediate(line: usize, text: &str) -> Result<Immediate, AssemblyError> {
  let value = parse_number(line, text)?;
  if value < i64::from(i32::MIN) || value > i64::from(u32::MAX) {
    return Err(AssemblyError::BadLiteral { line, text: text.to_string() });
  }
  Ok(value as u32 as Immediate)
}

fn to_register(line: usize, text: &str) -> Result<Register, AssemblyError> {
  text[1..]
    .parse::<u8>()
    .map_err(|_| AssemblyError::InvalidRegister { line, text: text.to_string() })
}

fn expected_operands(format: Format) -> &'static str {
  match format {
    Format::Nullary           => "no operands",
    Format::Register          => "a register",
    Format::RegisterPair      => "two registers",
    Format::RegisterImmediate => "a register and a value",
    Format::Immediate         => "a value",
  }
}

fn unescape(text: &str) -> Vec<u8> {
  let mut bytes = Vec::with_capacity(text.len() + 1);
  let mut chars = text.chars();
  while let Some(c) = chars.next() {
    let c = match c {
      '\\' => match chars.next() {
        Some('n')   => '\n',
        Some('t')   => '\t',
        Some('0')   => '\0',
        Some(other) => other,
        None        => '\\',
      },
      other => other,
    };
    let mut buffer = [0u8; 4];
    bytes.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
  }
  bytes.push(0);
  bytes
}

struct Encoder<'s> {
  symbols : &'s SymbolTable,
  line    : usize,
}

impl<'s> Encoder<'s> {

  fn value(&self, operand: &Operand) -> Option<Result<Immediate, AssemblyError>> {
    match operand {
      Operand::Number(text) => Some(to_immediate(self.line, text)),
      Operand::Label(name)  => Some(
        self.symbols
            .get_address(name)
            .map(|address| address as Immediate)
            .ok_or_else(|| AssemblyError::UndefinedLabel { line: self.line, name: name.to_string() })
      ),
      _ => None
    }
  }

  fn register(&self, operand: &Operand) -> Option<Result<Register, AssemblyError>> {
    match operand {
      Operand::Register(text) => Some(to_register(self.line, text)),
      _                       => None
    }
  }

  fn instruction(&self, opcode: Opcode, operands: &[Operand]) -> Result<Instruction, AssemblyError> {
    let format = opcode.format();
    let wrong  = || AssemblyError::WrongOperands {
      line      : self.line,
      operation : opcode,
      expected  : expected_operands(format)
    };
    if operands.len() != format.arity() {
      return Err(wrong());
    }

    let instruction =
      match format {
        Format::Nullary => Instruction::Nullary(opcode),

        Format::Register => Instruction::Register {
          opcode,
          register: self.register(&operands[0]).ok_or_else(wrong)??
        },

        Format::RegisterPair => Instruction::RegisterPair {
          opcode,
          first  : self.register(&operands[0]).ok_or_else(wrong)??,
          second : self.register(&operands[1]).ok_or_else(wrong)??
        },

        Format::RegisterImmediate => Instruction::RegisterImmediate {
          opcode,
          register  : self.register(&operands[0]).ok_or_else(wrong)??,
          immediate : self.value(&operands[1]).ok_or_else(wrong)??
        },

        Format::Immediate => Instruction::Immediate {
          opcode,
          immediate: self.value(&operands[0]).ok_or_else(wrong)??
        },
      };
    Ok(instruction)
  }

  fn directive(&self, name: &str, operands: &[Operand], image: &mut Vec<u8>) -> Result<(), AssemblyError> {
    let not_a_directive = || AssemblyError::NotADirective { line: self.line, name: name.to_string() };
    match name {

      "int" => {
        for operand in operands {
          let value = self.value(operand).ok_or_else(not_a_directive)??;
          image.extend_from_slice(&value.to_le_bytes());
        }
      }

      "byte" => {
        for operand in operands {
          let value = self.value(operand).ok_or_else(not_a_directive)??;
          image.push(value as u8);
        }
      }

      "string" => {
        for operand in operands {
          match operand {
            Operand::Text(text) => image.extend_from_slice(&unescape(text)),
            _                   => return Err(not_a_directive()),
          }
        }
      }

      _ => return Err(not_a_directive()),
    }
    Ok(())
  }
}

/// Size in bytes a statement occupies in the image, without resolving labels.
fn statement_size(line: usize, statement: &Statement) -> Result<usize, AssemblyError> {
  match statement {

    Statement::Operation { name, .. } => {
      let opcode = Opcode::from_str(&name.to_uppercase())
        .map_err(|_| AssemblyError::NotAnOperation { line, name: name.to_string() })?;
      Ok(opcode.width())
    }

    Statement::Directive { name, operands } => match *name {
      "int"    => Ok(4 * operands.len()),
      "byte"   => Ok(operands.len()),
      "string" => Ok(
        operands
          .iter()
          .map(|operand| match operand {
            Operand::Text(text) => unescape(text).len(),
            _                   => 0,
          })
          .sum()
      ),
      _ => Err(AssemblyError::NotADirective { line, name: name.to_string() }),
    },

  }
}

// endregion

/**
  Assembles `text` into a bytecode image. The first pass assigns addresses to labels, the
  second encodes statements with labels resolved, so forward references work.
*/
pub fn assemble(text: &str) -> Result<Assembly, AssemblyError> {
  let mut symbols = SymbolTable::new();
  let mut parsed  = vec![];
  let mut address = 0usize;

  for (index, source) in text.lines().enumerate() {
    let number = index + 1;
    let line   = parse_line(number, source)?;

    if let Some(label) = line.label {
      symbols
        .insert(label, address as u32)
        .map_err(|_| AssemblyError::DuplicateLabel { line: number, name: label.to_string() })?;
    }
    if let Some(statement) = &line.statement {
      address += statement_size(number, statement)?;
    }
    if address > i32::MAX as usize {
      return Err(AssemblyError::TooLarge(address));
    }
    parsed.push((number, line));
  }

  let mut image = Vec::with_capacity(address);
  for (number, line) in parsed {
    let encoder = Encoder { symbols: &symbols, line: number };
    match line.statement {

      Some(Statement::Operation { name, operands }) => {
        let opcode = Opcode::from_str(&name.to_uppercase())
          .map_err(|_| AssemblyError::NotAnOperation { line: number, name: name.to_string() })?;
        let instruction = encoder.instruction(opcode, &operands)?;
        encode_instruction(&instruction, &mut image);
      }

      Some(Statement::Directive { name, operands }) => {
        encoder.directive(name, &operands, &mut image)?;
      }

      None => {}
    }
  }

  Ok(Assembly { image, symbols })
}
