use std::{collections::HashMap, fmt, sync::Mutex};

/// Reason code attached to `disconnect` notifications, per the EIP-1193
/// provider error conventions.
pub const DISCONNECTED: u64 = 4900;

/// A connectivity notification emitted by [`crate::RpcHttpProvider`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The provider resolved the remote chain identity and considers itself
    /// connected
    Connect {
        /// The chain identity reported by the endpoint
        chain_id: String,
    },
    /// A previously connected provider observed a refused connection
    Disconnect {
        /// Always [`DISCONNECTED`]
        code: u64,
    },
    /// The resolved chain identity differs from the last known one
    ChainChanged(String),
}

impl ProviderEvent {
    /// The notification kind this event belongs to
    pub fn kind(&self) -> EventKind {
        match self {
            ProviderEvent::Connect { .. } => EventKind::Connect,
            ProviderEvent::Disconnect { .. } => EventKind::Disconnect,
            ProviderEvent::ChainChanged(_) => EventKind::ChainChanged,
        }
    }
}

/// The three notification kinds listeners can register for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `connect`
    Connect,
    /// `disconnect`
    Disconnect,
    /// `chainChanged`
    ChainChanged,
}

type Listener = Box<dyn Fn(&ProviderEvent) + Send + Sync>;

/// Maps an event kind to the ordered list of its registered listeners.
///
/// Listeners are invoked synchronously, in registration order, while the
/// registry lock is held; a listener must not register further listeners
/// from within its callback.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Mutex<HashMap<EventKind, Vec<Listener>>>,
}

impl ListenerRegistry {
    pub(crate) fn on(
        &self,
        kind: EventKind,
        listener: impl Fn(&ProviderEvent) + Send + Sync + 'static,
    ) {
        self.listeners
            .lock()
            .expect("listener registry lock poisoned")
            .entry(kind)
            .or_default()
            .push(Box::new(listener));
    }

    pub(crate) fn emit(&self, event: &ProviderEvent) {
        let listeners = self.listeners.lock().expect("listener registry lock poisoned");
        if let Some(registered) = listeners.get(&event.kind()) {
            for listener in registered {
                listener(event);
            }
        }
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock().expect("listener registry lock poisoned");
        let mut debug = f.debug_map();
        for (kind, registered) in listeners.iter() {
            debug.entry(kind, &registered.len());
        }
        debug.finish()
    }
}
