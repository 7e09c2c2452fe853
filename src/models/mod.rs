pub mod attendance;
pub mod event;
pub mod message;
pub mod session;
pub mod user;

pub use attendance::Attendance;
pub use event::{Event, EventCapacity, EventListing, EventStatus};
pub use message::{Message, MessageThread, MessageType, Reply, ReplyView};
pub use session::Session;
pub use user::{PublicUser, User};
