/*!
  Linear, byte-addressable RAM, zero-initialized at creation.

  The low `[0, code_region_size)` bytes are the code region: programs are loaded there and
  execution starts at address 0. Code and data share one address space, so a program may read
  or overwrite its own instructions. The boundary only matters to the loader (an image must fit
  below it) and to argument seeding (arguments are placed right above it).

  Integers are stored little-endian.
*/

use crate::error::{MasmError, MasmResult, OutOfRange};

pub const WORD_SIZE: usize = 4;

pub struct Memory {
  bytes            : Vec<u8>,
  code_region_size : usize,
}

impl Memory {

  /// Allocates `size` zeroed bytes. Allocation failure is reported, not aborted on.
  pub fn new(size: usize, code_region_size: usize) -> MasmResult<Memory> {
    let mut bytes: Vec<u8> = Vec::new();
    bytes.try_reserve_exact(size).map_err(|e| {
      MasmError::General(format!("cannot allocate {} bytes of RAM: {}", size, e))
    })?;
    bytes.resize(size, 0);

    Ok(Memory {
      bytes,
      code_region_size: code_region_size.min(size),
    })
  }

  pub fn size(&self) -> usize {
    self.bytes.len()
  }

  pub fn code_region_size(&self) -> usize {
    self.code_region_size
  }

  /// Checks that `[address, address + width)` lies inside memory and returns its start index.
  fn range(&self, address: i64, width: usize) -> Result<usize, OutOfRange> {
    let in_range =
      address >= 0 && (address as u64).saturating_add(width as u64) <= self.bytes.len() as u64;
    match in_range {
      true  => Ok(address as usize),
      false => Err(OutOfRange { address, width, size: self.bytes.len() })
    }
  }

  pub fn read_int(&self, address: i64) -> Result<i32, OutOfRange> {
    let start = self.range(address, WORD_SIZE)?;
    let mut word = [0u8; WORD_SIZE];
    word.copy_from_slice(&self.bytes[start..start + WORD_SIZE]);
    Ok(i32::from_le_bytes(word))
  }

  pub fn write_int(&mut self, address: i64, value: i32) -> Result<(), OutOfRange> {
    let start = self.range(address, WORD_SIZE)?;
    self.bytes[start..start + WORD_SIZE].copy_from_slice(&value.to_le_bytes());
    Ok(())
  }

  pub fn read_byte(&self, address: i64) -> Result<u8, OutOfRange> {
    let start = self.range(address, 1)?;
    Ok(self.bytes[start])
  }

  pub fn write_byte(&mut self, address: i64, value: u8) -> Result<(), OutOfRange> {
    let start = self.range(address, 1)?;
    self.bytes[start] = value;
    Ok(())
  }

  /// Borrows `len` bytes starting at `address`.
  pub fn slice(&self, address: i64, len: usize) -> Result<&[u8], OutOfRange> {
    let start = self.range(address, len)?;
    Ok(&self.bytes[start..start + len])
  }

  pub fn write_bytes(&mut self, address: i64, data: &[u8]) -> Result<(), OutOfRange> {
    let start = self.range(address, data.len())?;
    self.bytes[start..start + data.len()].copy_from_slice(data);
    Ok(())
  }

  /// The bytes from `address` to the end of memory, or nothing if `address` is outside.
  pub fn tail(&self, address: u32) -> &[u8] {
    self.bytes.get(address as usize..).unwrap_or(&[])
  }

  /**
    Clears the code region and copies `image` to address 0. Memory above the code region is
    left untouched.
  */
  pub fn load_code(&mut self, image: &[u8]) -> MasmResult<()> {
    if image.len() > self.code_region_size {
      return Err(MasmError::ImageTooLarge { len: image.len(), limit: self.code_region_size });
    }
    let code_region = &mut self.bytes[..self.code_region_size];
    for byte in code_region.iter_mut() {
      *byte = 0;
    }
    code_region[..image.len()].copy_from_slice(image);
    Ok(())
  }
}
