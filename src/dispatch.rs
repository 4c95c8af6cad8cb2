//! Ordered, error-isolated fan-out of [`Event`]s.
//!
//! Every event reaches every registered observer before the next event is
//! delivered. An observer that returns an error or panics is reported with
//! a `warn` event; the failure never propagates back into the caller.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, info, warn};

use crate::event::Event;

/// Error type observers may return.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Receives events.
pub trait Observer: Send {
    /// Handle one event.
    fn notify(&mut self, event: &Event) -> Result<(), ObserverError>;

    /// Whether this observer can no longer receive anything and should be
    /// dropped.
    fn is_closed(&self) -> bool {
        false
    }
}

impl<F> Observer for F
where
    F: FnMut(&Event) -> Result<(), ObserverError> + Send,
{
    fn notify(&mut self, event: &Event) -> Result<(), ObserverError> {
        self(event)
    }
}

/// Observer that forwards events into a tokio channel.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct EventSender(pub tokio::sync::mpsc::UnboundedSender<Event>);

#[cfg(feature = "tokio")]
impl Observer for EventSender {
    fn notify(&mut self, event: &Event) -> Result<(), ObserverError> {
        self.0.send(event.clone()).map_err(|e| e.to_string().into())
    }

    fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// Handle returned by [`EventDispatcher::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) u64);

/// Registered observers, in registration order.
#[derive(Default)]
pub struct EventDispatcher {
    observers: Vec<(ObserverId, Box<dyn Observer>)>,
    next_id: u64,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer under a fresh id.
    pub fn subscribe(&mut self, observer: Box<dyn Observer>) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.insert(id, observer);
        id
    }

    /// Register an observer under an id allocated elsewhere.
    pub(crate) fn insert(&mut self, id: ObserverId, observer: Box<dyn Observer>) {
        self.next_id = self.next_id.max(id.0 + 1);
        self.observers.push((id, observer));
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver `event` to every observer, then report any observer failure
    /// as a `warn` event.
    pub fn dispatch(&mut self, event: Event) {
        log_event(&event);
        self.observers.retain(|(_, obs)| !obs.is_closed());

        let failures = self.deliver(&event);
        for failure in failures {
            let report = Event::Warn(failure);
            log_event(&report);
            for nested in self.deliver(&report) {
                error!(error = %nested, "observer failed while handling an observer warning");
            }
        }
    }

    fn deliver(&mut self, event: &Event) -> Vec<String> {
        let mut failures = Vec::new();
        for (id, observer) in &mut self.observers {
            match catch_unwind(AssertUnwindSafe(|| observer.notify(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(format!(
                    "observer {} failed on {}: {}",
                    id.0,
                    event.name(),
                    e
                )),
                Err(panic) => failures.push(format!(
                    "observer {} panicked on {}: {}",
                    id.0,
                    event.name(),
                    panic_message(&*panic)
                )),
            }
        }
        failures
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn log_event(event: &Event) {
    match event {
        Event::Debug(info) => debug!(target: "tmi_client::event", "{}", info),
        Event::Warn(info) => warn!(target: "tmi_client::event", "{}", info),
        Event::Error(err) => error!(target: "tmi_client::event", error = %err, "client error"),
        Event::Disconnect(reason) => match reason {
            Some(err) => info!(target: "tmi_client::event", error = %err, "disconnected"),
            None => info!(target: "tmi_client::event", "disconnected"),
        },
        other => debug!(target: "tmi_client::event", event = other.name(), "{}", other),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recorder(log: Arc<Mutex<Vec<String>>>, tag: &'static str) -> Box<dyn Observer> {
        Box::new(move |event: &Event| -> Result<(), ObserverError> {
            log.lock().unwrap().push(format!("{}:{}", tag, event.name()));
            Ok(())
        })
    }

    #[test]
    fn test_events_reach_all_observers_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.subscribe(recorder(log.clone(), "a"));
        dispatcher.subscribe(recorder(log.clone(), "b"));

        dispatcher.dispatch(Event::Debug("one".into()));
        dispatcher.dispatch(Event::disconnect(None));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:debug", "b:debug", "a:disconnect", "b:disconnect"]
        );
    }

    #[test]
    fn test_failing_observer_is_reported_as_warn() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.subscribe(Box::new(|event: &Event| -> Result<(), ObserverError> {
            match event {
                Event::Debug(_) => Err("boom".into()),
                _ => Ok(()),
            }
        }));
        dispatcher.subscribe(recorder(log.clone(), "ok"));

        dispatcher.dispatch(Event::Debug("x".into()));
        assert_eq!(*log.lock().unwrap(), vec!["ok:debug", "ok:warn"]);
    }

    #[test]
    fn test_panicking_observer_is_contained() {
        let warnings = Arc::new(Mutex::new(Vec::new()));
        let sink = warnings.clone();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.subscribe(Box::new(|event: &Event| -> Result<(), ObserverError> {
            if let Event::Debug(_) = event {
                panic!("observer bug");
            }
            Ok(())
        }));
        dispatcher.subscribe(Box::new(move |event: &Event| -> Result<(), ObserverError> {
            if let Event::Warn(text) = event {
                sink.lock().unwrap().push(text.clone());
            }
            Ok(())
        }));

        dispatcher.dispatch(Event::Debug("x".into()));

        let warnings = warnings.lock().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("panicked"));
        assert!(warnings[0].contains("observer bug"));
    }

    #[test]
    fn test_unsubscribe() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        let id = dispatcher.subscribe(recorder(log.clone(), "a"));
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));

        dispatcher.dispatch(Event::Debug("x".into()));
        assert!(log.lock().unwrap().is_empty());
    }

    #[cfg(feature = "tokio")]
    #[test]
    fn test_closed_sender_is_pruned() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let mut dispatcher = EventDispatcher::new();
        dispatcher.subscribe(Box::new(EventSender(tx)));
        drop(rx);

        dispatcher.dispatch(Event::Debug("x".into()));
        assert!(dispatcher.is_empty());
    }
}
