//! Wire Protocol
//!
//! Every frame is an object with a `type` tag.
//!
//! # Client to server
//!
//! | type          | fields                                  |
//! |---------------|-----------------------------------------|
//! | `event`       | `handler`, `data`, `value?`, `path?`    |
//! | `form_submit` | `handler`, `formId`, `data`, `path?`    |
//! | `navigate`    | `path`                                  |
//!
//! # Server to client
//!
//! | type               | fields                             |
//! |--------------------|------------------------------------|
//! | `update`           | `id`, `content`                    |
//! | `navigate_content` | `path`, `content`                  |
//! | `navigate`         | `path` or `url`                    |
//! | `toast`            | `message`, `variant`, `duration`   |
//! | `alert`            | `message`                          |
//! | `refresh`          |                                    |
//!
//! Frames are JSON text by default. A connection opened with
//! `?format=msgpack` exchanges the same shapes as MessagePack maps in binary
//! frames.

mod codec;
mod message;

pub use codec::{Frame, WireFormat};
pub use message::{Action, ClientMessage, Outgoing, ServerMessage, ToastVariant};
