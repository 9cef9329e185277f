//! Endpoint implementations. Only the in-process transport lives in this
//! crate; real message-queue transports implement the same traits.

pub mod inproc;
