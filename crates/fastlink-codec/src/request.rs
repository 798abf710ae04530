use std::fmt;

use crate::service::{Handler, Message};

/// A decoded message paired with the handler its service chose for it.
///
/// Produced by every successful decode and consumed by [`Request::process`].
pub struct Request<C> {
    message: Box<dyn Message>,
    handler: Handler<C>,
}

impl<C> Request<C> {
    /// Pair a decoded message with its handler.
    pub fn new(message: Box<dyn Message>, handler: Handler<C>) -> Self {
        Self { message, handler }
    }

    /// Run the handler with `ctx`.
    pub fn process(self, ctx: &mut C) {
        (self.handler)(ctx, self.message)
    }

    /// Service ID of the decoded message.
    pub fn service_id(&self) -> u8 {
        self.message.service_id()
    }

    /// Message ID of the decoded message.
    pub fn message_id(&self) -> u8 {
        self.message.message_id()
    }

    /// Borrow the decoded message.
    pub fn message(&self) -> &dyn Message {
        self.message.as_ref()
    }

    /// Split into message and handler.
    pub fn into_parts(self) -> (Box<dyn Message>, Handler<C>) {
        (self.message, self.handler)
    }
}

impl<C> fmt::Debug for Request<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::handler_fn;
    use crate::testing::{Note, Trace};

    #[test]
    fn process_invokes_handler_once_with_context() {
        let handler = handler_fn(|trace: &mut Trace, msg: Note| trace.push(msg.text));
        let request = Request::new(Box::new(Note::new("hello")), handler);
        assert_eq!((request.service_id(), request.message_id()), (1, 1));

        let mut trace = Trace::default();
        request.process(&mut trace);
        assert_eq!(trace.entries, vec!["hello".to_string()]);
    }

    #[test]
    fn into_parts_returns_message() {
        let handler = handler_fn(|_: &mut Trace, _: Note| {});
        let request = Request::new(Box::new(Note::new("kept")), handler);
        let (message, _) = request.into_parts();
        assert_eq!(message.downcast_ref::<Note>().unwrap().text, "kept");
    }
}
