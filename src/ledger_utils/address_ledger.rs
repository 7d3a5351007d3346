use crate::chain_event::{Hash160, Hash256};
use crate::ledger_utils::address_mapper::AddressMapper;
use crate::ledger_utils::restrict_set::RestrictSet;
use crate::ledger_utils::utxo_table::OutputKey;
use rustc_hash::FxHashMap;

/// Stable handle of a record inside the ledger's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpendRef {
    pub tx_hash: Hash256,
    pub input_index: u32,
}

/// One balance change of an address. `spending` is set when the change
/// consumes `funding`, unset when `funding` is a new output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Movement {
    pub value: i64,
    pub time: u32,
    pub funding: OutputKey,
    pub spending: Option<SpendRef>,
}

/// Amounts above `i64::MAX` satoshis saturate instead of wrapping.
fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl Movement {
    pub fn received(value: u64, time: u32, funding: OutputKey) -> Self {
        Self {
            value: signed(value),
            time,
            funding,
            spending: None,
        }
    }

    pub fn spent(value: u64, time: u32, funding: OutputKey, spending: SpendRef) -> Self {
        Self {
            value: -signed(value),
            time,
            funding,
            spending: Some(spending),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressRecord {
    pub hash: Hash160,
    pub balance: i64,
    pub received_count: u64,
    pub spent_count: u64,
    pub last_received: u32,
    pub last_spent: u32,
    /// Kept only in detailed mode.
    pub movements: Option<Vec<Movement>>,
}

impl AddressRecord {
    fn new(hash: Hash160, detailed: bool) -> Self {
        Self {
            hash,
            balance: 0,
            received_count: 0,
            spent_count: 0,
            last_received: 0,
            last_spent: 0,
            movements: detailed.then(Vec::new),
        }
    }

    fn apply(&mut self, movement: Movement) {
        self.balance += movement.value;
        // a zero valued movement books as outbound
        if movement.value > 0 {
            self.received_count += 1;
            self.last_received = movement.time;
        } else {
            self.spent_count += 1;
            self.last_spent = movement.time;
        }
        if let Some(movements) = self.movements.as_mut() {
            movements.push(movement);
        }
    }
}

pub struct AddressLedger {
    records: Vec<AddressRecord>,
    by_hash: FxHashMap<Hash160, AddressId>,
    restrict: RestrictSet,
    detailed: bool,
}

impl AddressLedger {
    pub fn new(restrict: RestrictSet, detailed: bool, capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            by_hash: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            restrict,
            detailed,
        }
    }

    /// Resolves `script` and books `movement` on the identity it pays to.
    /// Unrecognized scripts and identities outside the restrict set are
    /// dropped without touching the ledger.
    pub fn move_funds<Mapper: AddressMapper>(
        &mut self,
        mapper: &Mapper,
        script: &[u8],
        movement: Movement,
    ) -> Option<AddressId> {
        let hash = mapper.resolve_script(script)?;
        self.record(hash, movement)
    }

    pub fn record(&mut self, hash: Hash160, movement: Movement) -> Option<AddressId> {
        if !self.restrict.admits(&hash) {
            return None;
        }
        let id = match self.by_hash.get(&hash) {
            Some(id) => *id,
            None => {
                let id = AddressId(self.records.len() as u32);
                self.records.push(AddressRecord::new(hash, self.detailed));
                self.by_hash.insert(hash, id);
                id
            }
        };
        self.records[id.0 as usize].apply(movement);
        Some(id)
    }

    pub fn get(&self, id: AddressId) -> &AddressRecord {
        &self.records[id.0 as usize]
    }

    pub fn lookup(&self, hash: &Hash160) -> Option<&AddressRecord> {
        self.by_hash.get(hash).map(|id| self.get(*id))
    }

    pub fn records(&self) -> &[AddressRecord] {
        &self.records
    }

    pub fn restrict(&self) -> &RestrictSet {
        &self.restrict
    }

    pub fn is_detailed(&self) -> bool {
        self.detailed
    }

    pub fn nonzero_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.balance != 0)
            .count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
