use std::sync::{Arc, Mutex};

use crate::client::callbacks::CallbackRegistry;
use crate::client::handlers::HandlerTable;
use crate::{log_debug, Packet, PacketTypeId};

/// General observer invoked with every decoded inbound packet.
pub(crate) type ReceivedObserver = Arc<dyn Fn(&Packet) + Send + Sync>;

/// Routes one decoded inbound packet.
///
/// Callback packets (correlation ID present) go to the callback registry;
/// everything else fans out to the handler table. Independently of either,
/// the general received observer sees every packet first.
///
/// No registry or table lock is held while a handler runs, so handlers are
/// free to call back into the client (send, register) without deadlocking.
pub(crate) struct Dispatcher {
    // ---
    callbacks: Arc<CallbackRegistry>,
    handlers: Arc<HandlerTable>,
    observer: Mutex<Option<ReceivedObserver>>,
}

impl Dispatcher {
    // ---
    pub fn new(callbacks: Arc<CallbackRegistry>, handlers: Arc<HandlerTable>) -> Self {
        Self {
            callbacks,
            handlers,
            observer: Mutex::new(None),
        }
    }

    /// Install the general received observer, replacing any previous one.
    pub fn set_observer(&self, observer: ReceivedObserver) {
        // ---
        let mut slot = match self.observer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(observer);
    }

    /// Route one inbound packet.
    ///
    /// Handler failures are not caught here: a panicking handler unwinds
    /// into the dispatch task. The observer has already fired by then, and
    /// an unmatched callback packet is an expected outcome (late arrival
    /// after a sweep, duplicate delivery, fire-and-forget response), not an
    /// error.
    pub fn dispatch(&self, packet: Packet, type_id: PacketTypeId) {
        // ---
        let observer = {
            let slot = match self.observer.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.clone()
        };
        if let Some(observer) = observer {
            observer(&packet);
        }

        if let Some(cid) = packet.correlation_id {
            match self.callbacks.resolve(cid) {
                Some(handler) => handler(packet),
                None => log_debug!("dropping unmatched callback packet (correlation id {cid})"),
            }
            return;
        }

        for handler in self.handlers.lookup(type_id) {
            handler(packet.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::CorrelationId;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn dispatcher() -> Dispatcher {
        let callbacks = Arc::new(CallbackRegistry::new(
            Duration::from_secs(300),
            Duration::from_secs(60),
        ));
        let handlers = Arc::new(HandlerTable::new(4));
        Dispatcher::new(callbacks, handlers)
    }

    #[test]
    fn test_plain_dispatch_hits_every_handler_in_order() {
        // ---
        let d = dispatcher();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..2u32 {
            let order = order.clone();
            d.handlers.register(
                PacketTypeId(1),
                Arc::new(move |_| order.lock().unwrap().push(tag)),
            );
        }

        d.dispatch(Packet::plain(PacketTypeId(1), Bytes::new()), PacketTypeId(1));

        assert_eq!(*order.lock().unwrap(), vec![0, 1]);
        // Plain routing never touches the callback registry.
        assert_eq!(d.callbacks.len(), 0);
    }

    #[test]
    fn test_callback_dispatch_resolves_once() {
        // ---
        let d = dispatcher();
        let hits = Arc::new(AtomicUsize::new(0));

        let cid = CorrelationId::from(5);
        let h = hits.clone();
        d.callbacks.register(
            cid,
            Box::new(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let packet = Packet::callback(PacketTypeId(0), cid, Bytes::new());
        d.dispatch(packet.clone(), PacketTypeId(0));
        // Duplicate delivery: entry already consumed, dropped silently.
        d.dispatch(packet, PacketTypeId(0));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_observer_fires_for_every_packet() {
        // ---
        let d = dispatcher();
        let seen = Arc::new(AtomicUsize::new(0));

        let s = seen.clone();
        d.set_observer(Arc::new(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        }));

        // Plain packet with no handlers registered.
        d.dispatch(Packet::plain(PacketTypeId(2), Bytes::new()), PacketTypeId(2));

        // Callback packet with no registry entry: still observed, no panic.
        let cid = CorrelationId::from(77);
        d.dispatch(
            Packet::callback(PacketTypeId(0), cid, Bytes::new()),
            PacketTypeId(0),
        );

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
