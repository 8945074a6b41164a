//! Wire protocol and the TCP RPC server.
//!
//! Every call is one length-prefixed frame carrying a postcard-encoded
//! [`Request`](messages::Request), answered by one frame carrying the
//! matching [`Response`](messages::Response) variant.

pub mod framing;
pub mod messages;
pub mod rpc;
pub mod server;

pub use framing::{read_frame, write_frame, FrameError, FrameLimit};
pub use messages::{Request, Response, PROTOCOL_VERSION};
pub use rpc::{handle_request, RpcOptions};
pub use server::{RpcServer, RpcServerConfig, spawn_session_cleanup, spawn_anchor_maintenance};
