
//! Encode and decode RemoteFX tiles, the wavelet image codec
//! of the Remote Desktop Protocol.
//!
//! Create a `Context` for each side of a connection.
//! A decoder context composes the tiles of received messages into a pixel buffer,
//! an encoder context turns rectangles of an image into messages.
//!
//! All tiles of a message are processed on a thread pool, unless disabled in the `ContextOptions`.
//! Malformed messages return an error, but never leave the context unusable.

#![forbid(unsafe_code)]
#![warn(missing_docs)]


pub mod io;
pub mod math;
pub mod compression;
pub mod meta;
pub mod block;
pub mod decode;
pub mod encode;
pub mod context;
pub mod error;


/// Export the most important items from `rfx`.
/// _Note: This includes a type called `Result`, possibly overwriting the default `std::Result` type usage._
pub mod prelude {

    // main exports
    pub use crate::context::{Context, ContextOptions, Role, DecodedMessage, EncoderState};
    pub use crate::decode::DecoderState;
    pub use crate::encode::{FrameMessage, Source};
    pub use crate::block::compose::{Destination, Region};
    pub use crate::block::scheduler::Threading;

    // core data types
    pub use crate::compression::{EntropyAlgorithm, Transform};
    pub use crate::compression::backend::BackendChoice;
    pub use crate::compression::color::PixelFormat;
    pub use crate::compression::quantize::QuantTable;
    pub use crate::meta::properties::CodecFlags;
    pub use crate::math::{Rect, Vec2};

    // secondary data types
    pub use crate::error::{self, Error, Result};
}
