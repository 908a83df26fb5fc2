use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use muster_core::alert::Fingerprint;
use muster_ports::outbound::Marker;

/// In-memory silence and inhibition state.
#[derive(Debug, Default)]
pub struct MemMarker {
    silenced: RwLock<HashMap<Fingerprint, u64>>,
    inhibited: RwLock<HashSet<Fingerprint>>,
}

impl MemMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_silenced(&self, fp: Fingerprint, silence_id: u64) {
        self.silenced
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fp, silence_id);
    }

    pub fn set_inhibited(&self, fp: Fingerprint, inhibited: bool) {
        let mut set = self.inhibited.write().unwrap_or_else(PoisonError::into_inner);
        if inhibited {
            set.insert(fp);
        } else {
            set.remove(&fp);
        }
    }

    /// Clears both silencing and inhibition for the alert.
    pub fn unset(&self, fp: &Fingerprint) {
        self.silenced
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(fp);
        self.inhibited
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(fp);
    }
}

impl Marker for MemMarker {
    fn silenced(&self, fp: &Fingerprint) -> Option<u64> {
        self.silenced
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(fp)
            .copied()
    }

    fn inhibited(&self, fp: &Fingerprint) -> bool {
        self.inhibited
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(fp)
    }
}
