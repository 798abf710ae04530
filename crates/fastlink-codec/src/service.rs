//! Message and service capabilities consumed by the codec.
//!
//! Concrete message types live outside this crate. The codec only calls the
//! methods below and never looks at message fields.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Type-erasure helpers so handlers can recover concrete message types.
///
/// Implemented for every `'static + Send` type; there is no need to
/// implement it by hand.
pub trait AsAny: Any + Send {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Any + Send> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// A message that can travel inside a frame.
pub trait Message: AsAny {
    /// ID of the service this message belongs to.
    fn service_id(&self) -> u8;

    /// ID of this message within its service.
    fn message_id(&self) -> u8;

    /// Exact number of payload bytes [`Message::marshal`] writes.
    fn binary_size(&self) -> usize;

    /// Serialize into `buf`, which is exactly `binary_size()` bytes long.
    fn marshal(&self, buf: &mut [u8]);

    /// Deserialize from `buf`.
    ///
    /// `buf` may point into the decoder's read-ahead buffer and is only valid
    /// for the duration of this call. Copy out anything worth keeping.
    fn unmarshal(&mut self, buf: &[u8]) -> Result<()>;
}

impl fmt::Debug for dyn Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("service_id", &self.service_id())
            .field("message_id", &self.message_id())
            .field("binary_size", &self.binary_size())
            .finish()
    }
}

impl dyn Message {
    /// Borrow the concrete message, if it is an `M`.
    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }
}

/// Handles one decoded message with a caller-chosen context (usually the
/// session owning the connection).
pub type Handler<C> = Arc<dyn Fn(&mut C, Box<dyn Message>) + Send + Sync>;

/// Wrap a typed handler into a [`Handler`].
///
/// If the service pairs the handler with a message of another type, the
/// mismatch is logged and the message is dropped.
pub fn handler_fn<M, C, F>(f: F) -> Handler<C>
where
    M: Message,
    C: 'static,
    F: Fn(&mut C, M) + Send + Sync + 'static,
{
    Arc::new(move |ctx: &mut C, message: Box<dyn Message>| {
        let (service, id) = (message.service_id(), message.message_id());
        match message.into_any().downcast::<M>() {
            Ok(message) => f(ctx, *message),
            Err(_) => tracing::error!(
                service,
                message = id,
                expected = std::any::type_name::<M>(),
                "handler received unexpected message type"
            ),
        }
    })
}

/// A namespace of related messages.
pub trait Service<C>: Send + Sync {
    /// This service's ID, unique within a registry.
    fn service_id(&self) -> u8;

    /// Produce a fresh message and its handler for `message_id`.
    ///
    /// Returns `None` when the service does not define that message.
    fn resolve(&self, message_id: u8) -> Option<(Box<dyn Message>, Handler<C>)>;
}

struct Route<C> {
    make: fn() -> Box<dyn Message>,
    handler: Handler<C>,
}

/// Table-driven [`Service`] built from message routes.
///
/// ```ignore
/// let service = ServiceTable::new(1)
///     .route(|session: &mut Session, msg: Login| session.login(msg))
///     .route(|session: &mut Session, msg: Logout| session.logout(msg));
/// ```
pub struct ServiceTable<C> {
    id: u8,
    routes: Vec<Option<Route<C>>>,
}

impl<C: 'static> ServiceTable<C> {
    /// Create an empty table for service `id`.
    pub fn new(id: u8) -> Self {
        Self {
            id,
            routes: (0..=u8::MAX).map(|_| None).collect(),
        }
    }

    /// Route message type `M` to `handler`.
    ///
    /// The message ID is taken from `M::default()`.
    ///
    /// # Panics
    ///
    /// Panics if `M` belongs to another service or its ID is already routed.
    pub fn route<M, F>(self, handler: F) -> Self
    where
        M: Message + Default,
        F: Fn(&mut C, M) + Send + Sync + 'static,
    {
        let probe = M::default();
        assert_eq!(
            probe.service_id(),
            self.id,
            "{} belongs to service {}, not {}",
            std::any::type_name::<M>(),
            probe.service_id(),
            self.id
        );
        self.route_with(probe.message_id(), make_default::<M>, handler_fn(handler))
    }

    /// Route `message_id` to an explicit constructor and handler.
    ///
    /// # Panics
    ///
    /// Panics if `message_id` is already routed.
    pub fn route_with(
        mut self,
        message_id: u8,
        make: fn() -> Box<dyn Message>,
        handler: Handler<C>,
    ) -> Self {
        let slot = &mut self.routes[usize::from(message_id)];
        assert!(
            slot.is_none(),
            "duplicate message ID {message_id} in service {}",
            self.id
        );
        *slot = Some(Route { make, handler });
        self
    }

    /// Number of routed message IDs.
    pub fn len(&self) -> usize {
        self.routes.iter().filter(|route| route.is_some()).count()
    }

    /// True when no message is routed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C: 'static> Service<C> for ServiceTable<C> {
    fn service_id(&self) -> u8 {
        self.id
    }

    fn resolve(&self, message_id: u8) -> Option<(Box<dyn Message>, Handler<C>)> {
        self.routes[usize::from(message_id)]
            .as_ref()
            .map(|route| ((route.make)(), Arc::clone(&route.handler)))
    }
}

fn make_default<M: Message + Default>() -> Box<dyn Message> {
    Box::new(M::default())
}
