use std::collections::HashMap;

use bimap::BiMap;
use string_cache::DefaultAtom;

/**
  A symbol table maps assembly labels to addresses in the bytecode image. It is mostly a
  convenience wrapper around a BiMap, so the disassembler can go from an address back to its
  label. An address may carry several labels; only the first is recorded in the bimap, the
  rest are aliases that resolve by name only.
*/
pub struct SymbolTable {
  table   : BiMap<DefaultAtom, u32>,
  aliases : HashMap<DefaultAtom, u32>,
}

impl SymbolTable {

  pub fn new() -> SymbolTable {
    SymbolTable {
      table   : BiMap::new(),
      aliases : HashMap::new(),
    }
  }

  pub fn get_symbol(&self, address: u32) -> Option<DefaultAtom> {
    self.table.get_by_right(&address).cloned()
  }

  pub fn get_address(&self, name: &str) -> Option<u32> {
    let name = DefaultAtom::from(name);
    self.table
        .get_by_left(&name)
        .or_else(|| self.aliases.get(&name))
        .cloned()
  }

  /// Records `name` at `address`. Fails, returning the address already bound, if the name is
  /// taken.
  pub fn insert(&mut self, name: &str, address: u32) -> Result<(), u32> {
    if let Some(existing) = self.get_address(name) {
      return Err(existing);
    }
    let name = DefaultAtom::from(name);
    if let Err((name, address)) = self.table.insert_no_overwrite(name, address) {
      self.aliases.insert(name, address);
    }
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.table.len() + self.aliases.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl Default for SymbolTable {
  fn default() -> SymbolTable {
    SymbolTable::new()
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_both_ways() {
    let mut symbols = SymbolTable::new();
    symbols.insert("main", 0).unwrap();
    symbols.insert("loop", 12).unwrap();

    assert_eq!(symbols.get_address("loop"), Some(12));
    assert_eq!(symbols.get_symbol(0), Some(DefaultAtom::from("main")));
    assert_eq!(symbols.get_symbol(4), None);
  }

  #[test]
  fn duplicate_names_are_rejected() {
    let mut symbols = SymbolTable::new();
    symbols.insert("main", 0).unwrap();
    assert_eq!(symbols.insert("main", 8), Err(0));
  }

  #[test]
  fn aliases_share_an_address() {
    let mut symbols = SymbolTable::new();
    symbols.insert("start", 4).unwrap();
    symbols.insert("entry", 4).unwrap();

    assert_eq!(symbols.get_address("entry"), Some(4));
    assert_eq!(symbols.get_symbol(4), Some(DefaultAtom::from("start")));
    assert_eq!(symbols.len(), 2);
    assert_eq!(symbols.insert("entry", 9), Err(4));
  }
}
