use crate::console::Terminal;
use crate::Error;
use alloc::collections::BTreeMap;
use alloc::string::String;

/// `MacroTable` maps macro numbers to a name and whatever the owning mode
/// needs to run the macro.
///
/// Macro 0 is reserved for listing the table.
pub struct MacroTable<A> {
    entries: BTreeMap<u8, (String, A)>,
}

impl<A: Copy> MacroTable<A> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, key: u8, name: impl Into<String>, action: A) {
        self.entries.insert(key, (name.into(), action));
    }

    pub fn remove(&mut self, key: u8) {
        self.entries.remove(&key);
    }

    /// `resolve` looks up macro `key`. Macro 0 prints the menu and an unknown
    /// key prints a hint; in both cases there is nothing to run.
    pub fn resolve(&self, key: u8, term: &mut dyn Terminal) -> Result<Option<A>, Error> {
        if key == 0 {
            writeln!(term, "0. Macro menu")?;
            for (key, (name, _)) in &self.entries {
                writeln!(term, "{}. {}", key, name)?;
            }
            return Ok(None);
        }
        match self.entries.get(&key) {
            Some((_, action)) => Ok(Some(*action)),
            None => {
                writeln!(term, "Unknown macro, try ? or (0) for help")?;
                Ok(None)
            }
        }
    }
}

impl<A: Copy> Default for MacroTable<A> {
    fn default() -> Self {
        Self::new()
    }
}
