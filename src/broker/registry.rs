//! Process-wide list of running brokers
//!
//! Servers register their broker when they start so that one call at process
//! exit stops all of them.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Broker, BrokerError};

static GLOBAL: ProcessRegistry = ProcessRegistry::new();

#[derive(Debug)]
pub struct ProcessRegistry {
    brokers: Mutex<Vec<Arc<Broker>>>,
}

impl ProcessRegistry {
    pub const fn new() -> Self {
        Self {
            brokers: Mutex::new(Vec::new()),
        }
    }

    /// The registry shared by the whole process
    pub fn global() -> &'static ProcessRegistry {
        &GLOBAL
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Broker>>> {
        self.brokers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, broker: Arc<Broker>) {
        let mut brokers = self.lock();
        if brokers.iter().any(|b| Arc::ptr_eq(b, &broker)) {
            return;
        }
        tracing::debug!("Registered broker '{}'", broker.name());
        brokers.push(broker);
    }

    pub fn unregister(&self, broker: &Broker) -> bool {
        let mut brokers = self.lock();
        let before = brokers.len();
        brokers.retain(|b| !std::ptr::eq(Arc::as_ptr(b), broker));
        brokers.len() != before
    }

    pub fn contains(&self, broker: &Broker) -> bool {
        self.lock()
            .iter()
            .any(|b| std::ptr::eq(Arc::as_ptr(b), broker))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stop and forget every registered broker.
    ///
    /// A broker that fails to stop cleanly is logged and does not prevent the
    /// others from stopping. Returns how many brokers were drained.
    pub fn shutdown(&self) -> usize {
        let brokers: Vec<Arc<Broker>> = self.lock().drain(..).collect();

        for broker in &brokers {
            match broker.stop() {
                Ok(()) => {}
                Err(BrokerError::NotRunning) => {
                    tracing::debug!("Broker '{}' already stopped", broker.name());
                }
                Err(e) => tracing::error!("Broker '{}' did not stop cleanly: {}", broker.name(), e),
            }
        }

        if !brokers.is_empty() {
            tracing::info!("Shut down {} brokers", brokers.len());
        }
        brokers.len()
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}
