//! JSON-RPC dispatch: pending-request correlation, inbound method routing,
//! and cooperative cancellation.

mod cancellation;
mod dispatcher;
mod filter;
mod handler;
mod pending;

pub use cancellation::{CancellationFlag, CancellationRegistry};
pub use dispatcher::Dispatcher;
pub use filter::MessageFilter;
pub use handler::{FnNotificationHandler, FnRequestHandler, NotificationHandler, RequestHandler};
pub use pending::{PendingRequests, PendingResult};
