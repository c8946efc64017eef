//! WebSocket Real-Time Streaming
//!
//! Pushes live posture telemetry to dashboard clients via WebSocket.
//!
//! ## Architecture
//!
//! - **ClientRegistry**: The set of open connections
//! - **BroadcastRelay**: Fans each upstream payload out to a registry snapshot
//! - **Handler**: Handles WebSocket upgrade and the connection lifecycle
//! - **Messages**: Outbound frames and the zero-state record
//!
//! ## Usage
//!
//! Clients connect to `/ws` (or the server root). The first frame is the
//! zero-state record; every later frame is a telemetry payload exactly as
//! the sensor published it. Anything the client sends is ignored.
//!
//! ## Example
//!
//! ```javascript
//! // Browser
//! const ws = new WebSocket(`ws://${window.location.hostname}:3000`);
//!
//! ws.onmessage = (event) => {
//!   const reading = JSON.parse(event.data);
//!   console.log('Posture:', reading.postureStatus);
//! };
//! ```

mod handler;
mod messages;
mod registry;
mod relay;

pub use handler::{root_handler, websocket_handler};
pub use messages::{Frame, ZeroState};
pub use registry::{ClientRegistry, ConnectionId, FrameSender, CLIENT_QUEUE_CAPACITY};
pub use relay::{BroadcastRelay, BroadcastReport};
