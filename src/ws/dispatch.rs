use std::sync::{Arc, PoisonError, RwLock};

use super::traits::Handler;
use crate::Result;
use crate::error::{Error, Kind};
use crate::types::Parameters;

/// Ordered, append-only set of application handlers.
#[derive(Default)]
pub(crate) struct Dispatcher {
    handlers: RwLock<Vec<Arc<dyn Handler>>>,
}

impl Dispatcher {
    pub fn add(&self, handler: Arc<dyn Handler>) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Invoke every handler in registration order.
    ///
    /// The first handler error stops delivery of this message and is returned.
    pub fn dispatch(&self, message_type: &str, parameters: &Parameters) -> Result<()> {
        // Snapshot so a handler may register further handlers without deadlocking.
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for handler in handlers {
            handler
                .handle(message_type, parameters)
                .map_err(|e| Error::from_boxed(Kind::Handler, e))?;
        }
        Ok(())
    }
}
