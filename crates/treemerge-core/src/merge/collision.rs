//! Entry-name collisions in a merged tree.
//!
//! Two different identities can end up under one directory with one name,
//! e.g. both sides create `README` independently, or one side renames into
//! a name the other side just used. Identity-keyed merging keeps both
//! entries; the apply layer needs to know before it writes a working copy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::gid::Gid;
use crate::model::snapshot::Snapshot;

/// Two or more entries sharing a parent and a name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrynameCollision {
    pub parent: Gid,
    pub name: String,
    /// Colliding identities, ascending.
    pub gids: Vec<Gid>,
}

/// Every name collision in `snapshot`, ordered by parent then name.
#[must_use]
pub fn find_collisions(snapshot: &Snapshot) -> Vec<EntrynameCollision> {
    let mut by_slot: BTreeMap<(Gid, &str), Vec<Gid>> = BTreeMap::new();
    for entry in snapshot.entries() {
        if let Some(parent) = entry.parent {
            by_slot
                .entry((parent, entry.name.as_str()))
                .or_default()
                .push(entry.gid);
        }
    }
    by_slot
        .into_iter()
        .filter(|(_, gids)| gids.len() > 1)
        .map(|((parent, name), mut gids)| {
            gids.sort_unstable();
            EntrynameCollision {
                parent,
                name: name.to_owned(),
                gids,
            }
        })
        .collect()
}
