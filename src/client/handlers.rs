use std::sync::Mutex;

use crate::{log_warn, PacketHandler, PacketTypeId};

/// Table of persistently registered handlers, indexed by packet type.
///
/// The packet catalog is closed at configuration time, so the table is a
/// dense vector sized once at construction rather than a keyed map: lookup
/// is an array access.
///
/// Multiple handlers per type are allowed; all of them fire on a matching
/// packet, in registration order. Entries persist until explicitly cleared
/// via [`unregister_all`](Self::unregister_all).
pub(crate) struct HandlerTable {
    // ---
    slots: Mutex<Vec<Vec<PacketHandler>>>,
}

impl HandlerTable {
    // ---
    /// Create a table covering `table_len` type identifiers.
    pub fn new(table_len: usize) -> Self {
        Self {
            slots: Mutex::new(vec![Vec::new(); table_len]),
        }
    }

    /// Append a handler to the type's list.
    ///
    /// An out-of-catalog type identifier is a programming error; the
    /// registration is dropped with a warning.
    pub fn register(&self, type_id: PacketTypeId, handler: PacketHandler) {
        // ---
        let mut slots = lock(&self.slots);

        match slots.get_mut(type_id.index()) {
            Some(list) => list.push(handler),
            None => {
                debug_assert!(false, "packet type {type_id} is outside the catalog");
                log_warn!("ignoring handler registration for unknown packet type {type_id}");
            }
        }
    }

    /// Clear every type's handler list, restoring the initial empty state.
    pub fn unregister_all(&self) {
        // ---
        let mut slots = lock(&self.slots);
        for list in slots.iter_mut() {
            list.clear();
        }
    }

    /// Snapshot the handlers for `type_id`, in registration order.
    ///
    /// Returns clones so no lock is held while handlers run.
    pub fn lookup(&self, type_id: PacketTypeId) -> Vec<PacketHandler> {
        // ---
        let slots = lock(&self.slots);
        slots.get(type_id.index()).cloned().unwrap_or_default()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    // Handler lists carry no cross-field invariants; continue past poison.
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::Packet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_registration_order_preserved() {
        // ---
        let table = HandlerTable::new(2);
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..3u32 {
            let order = order.clone();
            table.register(
                PacketTypeId(1),
                Arc::new(move |_| {
                    order.lock().unwrap().push(tag);
                }),
            );
        }

        let packet = Packet::plain(PacketTypeId(1), bytes::Bytes::new());
        for handler in table.lookup(PacketTypeId(1)) {
            handler(packet.clone());
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unregister_all() {
        // ---
        let table = HandlerTable::new(3);
        let hits = Arc::new(AtomicUsize::new(0));

        let h = hits.clone();
        table.register(
            PacketTypeId(0),
            Arc::new(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(table.lookup(PacketTypeId(0)).len(), 1);

        table.unregister_all();
        assert!(table.lookup(PacketTypeId(0)).is_empty());

        // Table dimensions survive a reset; re-registration still works.
        table.register(PacketTypeId(2), Arc::new(|_| {}));
        assert_eq!(table.lookup(PacketTypeId(2)).len(), 1);
    }

    #[test]
    fn test_lookup_unknown_type_is_empty() {
        // ---
        let table = HandlerTable::new(1);
        assert!(table.lookup(PacketTypeId(7)).is_empty());
    }
}
