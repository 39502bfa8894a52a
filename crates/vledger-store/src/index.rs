//! # Composite-Key Index Maintainer
//!
//! Secondary indices are stored as keys in the `index` partition:
//!
//! ```text
//! \0owner~vin\0<email>\0<VIN>\0   →  "<VIN>"
//! \0plate~vin\0<PLATE>\0<VIN>\0   →  "<VIN>"
//! ```
//!
//! The leading NUL keeps composite keys out of the simple-key space, and the
//! NUL between components makes every prefix scan exact. Identifier
//! newtypes reject NUL, so no component can forge a separator.
//!
//! ## Invariants
//!
//! - A record with an owner has exactly one `owner~vin` entry; a record with
//!   a plate has exactly one `plate~vin` entry.
//! - No entry names a VIN that has no record.
//!
//! Both hold only if every owner or plate change stages the old-key delete
//! and the new-key put into the same [`WriteBatch`] as the record itself.

use vledger_core::{OwnerEmail, PlateNumber, Vin};

use crate::error::StoreError;
use crate::kv::{KvStore, Partition, WriteBatch};

/// Owner → VIN index name.
pub const OWNER_INDEX: &str = "owner~vin";
/// Plate → VIN index name.
pub const PLATE_INDEX: &str = "plate~vin";

const SEP: char = '\u{0}';

/// A deterministic composite key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeKey(String);

impl CompositeKey {
    /// Build `\0<index>\0<c1>\0<c2>..\0`.
    pub fn new(index: &str, components: &[&str]) -> Self {
        let mut key = String::with_capacity(
            2 + index.len() + components.iter().map(|c| c.len() + 1).sum::<usize>(),
        );
        key.push(SEP);
        key.push_str(index);
        key.push(SEP);
        for c in components {
            key.push_str(c);
            key.push(SEP);
        }
        Self(key)
    }

    /// The raw key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // NUL is unprintable; render it as the conventional `\0`.
        f.write_str(&self.0.replace(SEP, "\\0"))
    }
}

/// Split a composite key into its index name and components.
///
/// Returns `None` for keys not of composite form.
pub fn parse_composite_key(key: &str) -> Option<(String, Vec<String>)> {
    let rest = key.strip_prefix(SEP)?.strip_suffix(SEP)?;
    let mut parts = rest.split(SEP).map(str::to_string);
    let index = parts.next()?;
    Some((index, parts.collect()))
}

/// The `owner~vin` entry for one vehicle.
pub fn owner_index_key(email: &OwnerEmail, vin: &Vin) -> CompositeKey {
    CompositeKey::new(OWNER_INDEX, &[email.as_str(), vin.as_str()])
}

/// The `plate~vin` entry for one vehicle.
pub fn plate_index_key(plate: &PlateNumber, vin: &Vin) -> CompositeKey {
    CompositeKey::new(PLATE_INDEX, &[plate.as_str(), vin.as_str()])
}

/// Stage the owner-index change for `vin`: delete the old entry, put the
/// new one. Either side may be `None` (registration, deletion).
pub fn stage_owner_change(
    batch: &mut WriteBatch,
    vin: &Vin,
    old: Option<&OwnerEmail>,
    new: Option<&OwnerEmail>,
) -> Result<(), StoreError> {
    if old == new {
        return Ok(());
    }
    if let Some(old) = old {
        batch.delete(Partition::Index, owner_index_key(old, vin).0);
    }
    if let Some(new) = new {
        batch.put(Partition::Index, owner_index_key(new, vin).0, &vin)?;
    }
    Ok(())
}

/// Stage the plate-index change for `vin`.
pub fn stage_plate_change(
    batch: &mut WriteBatch,
    vin: &Vin,
    old: Option<&PlateNumber>,
    new: Option<&PlateNumber>,
) -> Result<(), StoreError> {
    if old == new {
        return Ok(());
    }
    if let Some(old) = old {
        batch.delete(Partition::Index, plate_index_key(old, vin).0);
    }
    if let Some(new) = new {
        batch.put(Partition::Index, plate_index_key(new, vin).0, &vin)?;
    }
    Ok(())
}

fn vins_under(store: &KvStore, index: &str, component: &str) -> Vec<Vin> {
    let prefix = CompositeKey::new(index, &[component]);
    store
        .keys_with_prefix(Partition::Index, prefix.as_str())
        .into_iter()
        .filter_map(|k| {
            let (_, parts) = parse_composite_key(&k)?;
            Vin::new(parts.get(1)?).ok()
        })
        .collect()
}

/// VINs currently owned by `email`, in VIN order.
pub fn vins_by_owner(store: &KvStore, email: &OwnerEmail) -> Vec<Vin> {
    vins_under(store, OWNER_INDEX, email.as_str())
}

/// The VIN carrying `plate`, if any.
///
/// Plates are unique in practice; if several VINs claim one, the first in
/// VIN order is returned and the duplicate is logged.
pub fn vin_by_plate(store: &KvStore, plate: &PlateNumber) -> Option<Vin> {
    let mut vins = vins_under(store, PLATE_INDEX, plate.as_str());
    if vins.len() > 1 {
        tracing::warn!(plate = %plate, count = vins.len(), "plate index has several VINs");
    }
    if vins.is_empty() {
        None
    } else {
        Some(vins.swap_remove(0))
    }
}
