//! Event publication contract.

use crate::events::DomainEvent;

/// Fire-and-forget event publication.
///
/// Implementations must never block the caller and must swallow
/// delivery failures; session state changes are already durable in the
/// store before any event is published.
pub trait EventPublisher: Send + Sync + std::fmt::Debug + 'static {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: DomainEvent);
}
