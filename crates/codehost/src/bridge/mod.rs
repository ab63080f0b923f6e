//! Frame channel between the front-end and this host.
//!
//! # Architecture
//!
//! - **protocol**: Message types (Request, Response, ExecutionResult)
//! - **codec**: Length-prefixed JSON framing codec for AsyncRead/AsyncWrite
//! - **channel**: Sequential read-one/write-one driver over stdin/stdout

pub mod channel;
pub mod codec;
pub mod protocol;
