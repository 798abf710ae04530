use crate::error::{CodecError, Result};
use crate::service::{Handler, Message, Service};

const SLOTS: usize = 1 << u8::BITS;

/// Service-ID keyed dispatch table with one slot per possible ID.
pub struct ServiceRegistry<C> {
    services: Vec<Option<Box<dyn Service<C>>>>,
}

impl<C> ServiceRegistry<C> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            services: (0..SLOTS).map(|_| None).collect(),
        }
    }

    /// Register a service.
    ///
    /// # Panics
    ///
    /// Panics if the service ID is already taken. Duplicate IDs are a setup
    /// bug, not something to recover from at runtime.
    pub fn register(&mut self, service: impl Service<C> + 'static) {
        if let Err(err) = self.try_register(service) {
            panic!("{err}");
        }
    }

    /// Register a service, reporting a duplicate ID as an error.
    pub fn try_register(&mut self, service: impl Service<C> + 'static) -> Result<()> {
        let id = service.service_id();
        let slot = &mut self.services[usize::from(id)];
        if slot.is_some() {
            return Err(CodecError::DuplicateService { service: id });
        }
        tracing::debug!(service = id, "registered service");
        *slot = Some(Box::new(service));
        Ok(())
    }

    /// Produce a fresh message and handler for a frame's IDs.
    pub fn lookup(
        &self,
        service_id: u8,
        message_id: u8,
    ) -> Result<(Box<dyn Message>, Handler<C>)> {
        let service = self.services[usize::from(service_id)]
            .as_deref()
            .ok_or(CodecError::UnknownService {
                service: service_id,
            })?;
        service
            .resolve(message_id)
            .ok_or(CodecError::UnknownMessage {
                service: service_id,
                message: message_id,
            })
    }

    /// True if a service is registered under `service_id`.
    pub fn contains(&self, service_id: u8) -> bool {
        self.services[usize::from(service_id)].is_some()
    }

    /// IDs of all registered services, ascending.
    pub fn service_ids(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(move |id| self.contains(*id))
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.iter().filter(|slot| slot.is_some()).count()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C> Default for ServiceRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ServiceTable;
    use crate::testing::{sample_service, Trace};

    #[test]
    fn lookup_resolves_registered_message() {
        let mut registry = ServiceRegistry::new();
        registry.register(sample_service());

        let (message, handler) = registry.lookup(1, 2).unwrap();
        assert_eq!((message.service_id(), message.message_id()), (1, 2));

        let mut trace = Trace::default();
        handler(&mut trace, message);
        assert_eq!(trace.entries.len(), 1);
    }

    #[test]
    fn duplicate_service_is_an_error() {
        let mut registry = ServiceRegistry::<Trace>::new();
        registry.try_register(ServiceTable::new(7)).unwrap();
        let err = registry.try_register(ServiceTable::new(7)).unwrap_err();
        assert!(matches!(err, CodecError::DuplicateService { service: 7 }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    #[should_panic(expected = "duplicate service ID: 7")]
    fn duplicate_service_panics_on_register() {
        let mut registry = ServiceRegistry::<Trace>::new();
        registry.register(ServiceTable::new(7));
        registry.register(ServiceTable::new(7));
    }

    #[test]
    fn all_service_ids_can_be_registered() {
        let mut registry = ServiceRegistry::<Trace>::new();
        for id in 0..=u8::MAX {
            registry.register(ServiceTable::new(id));
        }
        assert_eq!(registry.len(), 256);
        assert_eq!(registry.service_ids().count(), 256);
    }

    #[test]
    fn unknown_service_is_reported() {
        let registry = ServiceRegistry::<Trace>::new();
        let err = registry.lookup(42, 0).err().expect("lookup must fail");
        assert!(matches!(err, CodecError::UnknownService { service: 42 }));
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn unknown_message_is_reported() {
        let mut registry = ServiceRegistry::new();
        registry.register(sample_service());
        let err = registry.lookup(1, 99).err().expect("lookup must fail");
        assert!(matches!(
            err,
            CodecError::UnknownMessage {
                service: 1,
                message: 99
            }
        ));
    }
}
