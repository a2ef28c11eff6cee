pub mod session;
pub mod transport;

pub use session::{EventSender, SessionContext, StreamEvent};
pub use transport::{ConnectionState, TransportSelector};
