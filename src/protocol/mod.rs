//! WebSocket protocol core (RFC 6455).

pub mod close;
pub mod frame;
pub mod framer;
pub mod headers;
pub mod mask;
pub mod opcode;

pub use close::CloseCode;
pub use frame::{Frame, MAXIMUM_ALLOWED_FRAME_SIZE, RESERVED, RSV1, RSV2, RSV3};
pub use framer::{FrameKind, FrameTable, Framer};
pub use headers::{accept_digest, generate_key};
pub use mask::{MaskGenerator, apply_mask};
pub use opcode::OpCode;
