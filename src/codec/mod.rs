//! Frame-level reading and writing over async byte streams.
//!
//! The read half and write half of a transport are driven by different
//! tasks, so the codec is split into a [`FrameReader`] and a [`FrameWriter`].

mod framed;

pub use framed::{FrameReader, FrameWriter, read_http_head};
