//! WebSocket support for presence and change notifications.
//!
//! Clients connect via WebSocket, authenticate once per connection and then
//! receive presence changes of other users and `record_changed` pushes for
//! watched collections.

mod manager;
mod protocol;

pub use manager::ConnectionManager;
pub use protocol::*;
