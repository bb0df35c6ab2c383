//! Streaming Response Decoding
//!
//! Chat-completion responses arrive as a chunked body of newline-delimited
//! `data: ` records. This module reassembles those records across arbitrary
//! read boundaries and turns them into [`StreamEvent`]s.
//!
//! ```text
//!  ByteStream ──► RecordDecoder (framing) ──► StreamEvent::{Delta, StreamEnd, Malformed}
//!       ▲                                            │
//!       └──────── StreamDecoder (cancellation) ◄─────┘
//! ```
//!
//! [`RecordDecoder`] is purely synchronous and can be driven by hand;
//! [`StreamDecoder`] wraps it around an async byte source and a
//! cancellation token.

mod decoder;

pub use decoder::{
    DecodeError, RecordDecoder, StreamDecoder, StreamEvent, DATA_PREFIX, DONE_SENTINEL,
};
