use crate::chain_event::Hash160;
use crate::ledger_utils::address_mapper::AddressMapper;
use anyhow::Context;
use rustc_hash::FxHashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Optional admission filter for the address ledger. An empty set admits
/// every identity.
#[derive(Default, Clone)]
pub struct RestrictSet {
    identities: FxHashSet<Hash160>,
}

impl RestrictSet {
    pub fn new(identities: impl IntoIterator<Item = Hash160>) -> Self {
        Self {
            identities: identities.into_iter().collect(),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.identities.is_empty()
    }

    pub fn admits(&self, identity: &Hash160) -> bool {
        !self.is_active() || self.identities.contains(identity)
    }

    pub fn contains(&self, identity: &Hash160) -> bool {
        self.identities.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Adds the addresses listed in `path`, one per line, in any text form
    /// the mapper decodes. Blank lines and `#` comments are skipped.
    pub fn load_from_file<Mapper: AddressMapper>(
        &mut self,
        path: &Path,
        mapper: &Mapper,
    ) -> anyhow::Result<usize> {
        let file = File::open(path)
            .with_context(|| format!("can't open address list {path}", path = path.display()))?;
        let mut loaded = 0;
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let entry = line.split('#').next().unwrap_or_default().trim();
            if entry.is_empty() {
                continue;
            }
            let identity = mapper.decode_address(entry).with_context(|| {
                format!("{path}:{line}", path = path.display(), line = number + 1)
            })?;
            self.identities.insert(identity);
            loaded += 1;
        }
        Ok(loaded)
    }
}
