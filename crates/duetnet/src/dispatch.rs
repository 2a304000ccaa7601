//! Tag-keyed handler lists.
//!
//! Every message kind has an ordered list of subscribers. Dispatching a
//! message calls each subscriber for its tag in registration order. A tag
//! nobody subscribed to is a no-op: that is how unknown or uninteresting
//! messages are dropped at the top level.

use std::collections::HashMap;
use std::fmt;

use duetnet_protocol::{Message, Tag};
use duetnet_transport::ConnectionId;

/// A subscriber. The message is `None` only for the Delete event the node
/// synthesizes when a connection drops.
pub type Handler<C> = Box<dyn FnMut(&mut C, ConnectionId, Option<&Message>) + Send>;

/// Returned by [`DispatchTable::register`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

/// Handler lists over a context type `C` that every handler mutates.
pub struct DispatchTable<C> {
    handlers: HashMap<Tag, Vec<(HandlerId, Handler<C>)>>,
    next_id: u64,
}

impl<C> DispatchTable<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Appends `handler` to the list for `tag`.
    pub fn register<F>(&mut self, tag: Tag, handler: F) -> HandlerId
    where
        F: FnMut(&mut C, ConnectionId, Option<&Message>) + Send + 'static,
    {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers
            .entry(tag)
            .or_default()
            .push((id, Box::new(handler)));
        tracing::trace!(%tag, %id, "handler registered");
        id
    }

    /// Removes one handler. Returns `false` if it was not registered for
    /// `tag`.
    pub fn unregister(&mut self, tag: Tag, id: HandlerId) -> bool {
        let Some(list) = self.handlers.get_mut(&tag) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(&tag);
        }
        removed
    }

    /// Calls every handler registered for `tag`, in order, and returns how
    /// many ran.
    pub fn dispatch(
        &mut self,
        ctx: &mut C,
        tag: Tag,
        conn: ConnectionId,
        msg: Option<&Message>,
    ) -> usize {
        let Some(list) = self.handlers.get_mut(&tag) else {
            tracing::trace!(%tag, %conn, "no handler, message dropped");
            return 0;
        };
        for (_, handler) in list.iter_mut() {
            handler(ctx, conn, msg);
        }
        list.len()
    }

    pub fn handler_count(&self, tag: Tag) -> usize {
        self.handlers.get(&tag).map_or(0, Vec::len)
    }

    pub fn is_registered(&self, tag: Tag) -> bool {
        self.handler_count(tag) > 0
    }
}

impl<C> Default for DispatchTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for DispatchTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<(Tag, usize)> = self
            .handlers
            .iter()
            .map(|(&tag, list)| (tag, list.len()))
            .collect();
        counts.sort_by_key(|&(tag, _)| tag.as_u16());
        f.debug_struct("DispatchTable")
            .field("handlers", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duetnet_protocol::{Chat, PeerId};

    type Log = Vec<String>;

    fn chat() -> Message {
        Message::from(Chat {
            sender: PeerId(1),
            text: "hi".into(),
        })
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let mut table = DispatchTable::<Log>::new();
        table.register(Tag::Chat, |log, _, _| log.push("first".into()));
        table.register(Tag::Chat, |log, _, _| log.push("second".into()));

        let mut log = Log::new();
        let ran = table.dispatch(&mut log, Tag::Chat, ConnectionId::new(1), Some(&chat()));
        assert_eq!(ran, 2);
        assert_eq!(log, vec!["first", "second"]);
    }

    #[test]
    fn test_unregistered_tag_is_a_no_op() {
        let mut table = DispatchTable::<Log>::new();
        table.register(Tag::Chat, |log, _, _| log.push("chat".into()));

        let mut log = Log::new();
        let ran = table.dispatch(&mut log, Tag::Spawn, ConnectionId::new(1), None);
        assert_eq!(ran, 0);
        assert!(log.is_empty());
        assert_eq!(table.handler_count(Tag::Chat), 1);
    }

    #[test]
    fn test_unregister_removes_only_that_handler() {
        let mut table = DispatchTable::<Log>::new();
        let a = table.register(Tag::Chat, |log, _, _| log.push("a".into()));
        table.register(Tag::Chat, |log, _, _| log.push("b".into()));

        assert!(table.unregister(Tag::Chat, a));
        assert!(!table.unregister(Tag::Chat, a));
        assert!(!table.unregister(Tag::Ping, a));

        let mut log = Log::new();
        table.dispatch(&mut log, Tag::Chat, ConnectionId::new(1), Some(&chat()));
        assert_eq!(log, vec!["b"]);
    }

    #[test]
    fn test_handler_sees_connection_and_payload() {
        let mut table = DispatchTable::<Log>::new();
        table.register(Tag::Delete, |log, conn, msg| {
            log.push(format!("{conn} {}", msg.is_some()));
        });

        let mut log = Log::new();
        table.dispatch(&mut log, Tag::Delete, ConnectionId::new(9), None);
        assert_eq!(log, vec!["conn-9 false"]);
    }
}
