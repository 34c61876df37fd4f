
//! Describes the blocks of a RemoteFX message:
//! the block headers, the header blocks that configure a channel,
//! and the blocks that make up a frame.

pub mod properties;
pub mod header;
pub mod frame;

use std::convert::TryFrom;
use crate::io::*;
use crate::error::*;


/// The type of each block, the first field of every block header.
pub mod block_type {

    /// Magic number and version, starts a stream.
    pub const SYNC: u16 = 0xCCC0;

    /// The codec versions supported by the sender.
    pub const CODEC_VERSIONS: u16 = 0xCCC1;

    /// Size of the frame.
    pub const CHANNELS: u16 = 0xCCC2;

    /// Tile size and entropy algorithm.
    pub const CONTEXT: u16 = 0xCCC3;

    /// Opens a frame.
    pub const FRAME_BEGIN: u16 = 0xCCC4;

    /// Closes a frame.
    pub const FRAME_END: u16 = 0xCCC5;

    /// The rectangles that a frame updates.
    pub const REGION: u16 = 0xCCC6;

    /// Contains a tileset.
    pub const EXTENSION: u16 = 0xCCC7;

    /// Subtype of a region block.
    pub const CBT_REGION: u16 = 0xCAC1;

    /// Subtype of an extension block.
    pub const CBT_TILESET: u16 = 0xCAC2;

    /// A tile inside a tileset.
    pub const CBT_TILE: u16 = 0xCAC3;

    /// Whether the type is followed by the codec and channel fields.
    pub fn has_codec_channel(kind: u16) -> bool {
        (CONTEXT ..= EXTENSION).contains(&kind)
    }

    /// A name for logging.
    pub fn name(kind: u16) -> &'static str {
        match kind {
            SYNC => "sync",
            CODEC_VERSIONS => "codec versions",
            CHANNELS => "channels",
            CONTEXT => "context",
            FRAME_BEGIN => "frame begin",
            FRAME_END => "frame end",
            REGION => "region",
            EXTENSION => "tileset",
            CBT_TILE => "tile",
            _ => "unknown",
        }
    }
}


/// The only codec id used in a RemoteFX stream.
pub const CODEC_ID: u8 = 1;

/// The codec version announced in sync and codec version blocks.
pub const CODEC_VERSION: u16 = 0x0100;

/// The channel id of context blocks.
pub const CONTEXT_CHANNEL_ID: u8 = 0xFF;

/// The channel id of all blocks of a frame.
pub const FRAME_CHANNEL_ID: u8 = 0x00;


/// The first six bytes of every block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {

    /// One of the constants in `block_type`.
    pub kind: u16,

    /// Number of bytes of the whole block, including this header.
    pub length: u32,
}

impl BlockHeader {

    /// Number of bytes of a block header.
    pub const BYTE_SIZE: usize = 6;

    /// Number of bytes of a block header followed by codec and channel ids.
    pub const CODEC_CHANNEL_BYTE_SIZE: usize = Self::BYTE_SIZE + 2;

    /// Split the next block off the remaining bytes.
    /// Returns the header and the body of the block, which excludes the header.
    pub fn split_next<'s>(remaining: &mut &'s [u8]) -> Result<(Self, &'s [u8])> {
        if remaining.len() < Self::BYTE_SIZE {
            return Err(Error::invalid("block header truncated"));
        }

        let mut read = *remaining;
        let kind = u16::read(&mut read)?;
        let length = u32::read(&mut read)?;

        let byte_size = usize::try_from(length)
            .map_err(|_| Error::invalid("block length"))?;

        if byte_size < Self::BYTE_SIZE {
            return Err(Error::invalid("block length smaller than block header"));
        }

        let block = take_n(remaining, byte_size)
            .map_err(|_| Error::invalid("block length exceeds message"))?;

        Ok((BlockHeader { kind, length }, &block[Self::BYTE_SIZE ..]))
    }

    /// Write a block header for a block with the specified number of bytes, including the header.
    pub fn write(kind: u16, byte_size: usize, write: &mut impl Write) -> UnitResult {
        kind.write(write)?;
        u32_from_usize(byte_size, "block length")?.write(write)
    }
}


/// Read and validate the codec and channel ids that follow the header of some blocks.
pub fn read_codec_channel(kind: u16, body: &mut &[u8]) -> UnitResult {
    let codec_id = u8::read(body)?;
    let channel_id = u8::read(body)?;

    if codec_id != CODEC_ID {
        return Err(Error::invalid("codec id"));
    }

    let expected_channel = if kind == block_type::CONTEXT { CONTEXT_CHANNEL_ID } else { FRAME_CHANNEL_ID };
    if channel_id != expected_channel {
        return Err(Error::invalid("channel id"));
    }

    Ok(())
}

/// Write the codec and channel ids that follow the header of some blocks.
pub fn write_codec_channel(kind: u16, write: &mut impl Write) -> UnitResult {
    CODEC_ID.write(write)?;

    if kind == block_type::CONTEXT { CONTEXT_CHANNEL_ID.write(write) }
    else { FRAME_CHANNEL_ID.write(write) }
}


/// Which of the four header blocks have been received.
/// Frames can only be decoded after all of them arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderBlocks {

    /// A valid sync block was received.
    pub sync: bool,

    /// A valid codec versions block was received.
    pub codec_versions: bool,

    /// A channels block with at least one channel was received.
    pub channels: bool,

    /// A valid context block was received.
    pub context: bool,
}

impl HeaderBlocks {

    /// Whether all header blocks have been received.
    pub fn complete(self) -> bool {
        self.sync && self.codec_versions && self.channels && self.context
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_blocks(){
        let mut bytes = Vec::new();
        BlockHeader::write(block_type::FRAME_END, 8, &mut bytes).unwrap();
        write_codec_channel(block_type::FRAME_END, &mut bytes).unwrap();
        BlockHeader::write(block_type::SYNC, 7, &mut bytes).unwrap();
        bytes.push(42);

        let mut remaining = bytes.as_slice();
        let (header, mut body) = BlockHeader::split_next(&mut remaining).unwrap();
        assert_eq!(header, BlockHeader { kind: block_type::FRAME_END, length: 8 });
        read_codec_channel(header.kind, &mut body).unwrap();
        assert!(body.is_empty());

        let (header, body) = BlockHeader::split_next(&mut remaining).unwrap();
        assert_eq!(header.kind, block_type::SYNC);
        assert_eq!(body, &[42]);
        assert!(remaining.is_empty());
    }

    #[test]
    fn reject_bad_lengths(){
        for &length in &[0_u32, 5, 9, u32::MAX] {
            let mut bytes = Vec::new();
            block_type::SYNC.write(&mut bytes).unwrap();
            length.write(&mut bytes).unwrap();
            bytes.extend_from_slice(&[0, 0]);

            let mut remaining = bytes.as_slice();
            assert!(matches!(BlockHeader::split_next(&mut remaining), Err(Error::Invalid(_))), "length {}", length);
        }

        let mut fragment: &[u8] = &[0xC0, 0xCC, 0x06];
        assert!(BlockHeader::split_next(&mut fragment).is_err());
    }

    #[test]
    fn channel_ids(){
        let mut body: &[u8] = &[1, 0xFF];
        assert!(read_codec_channel(block_type::CONTEXT, &mut body).is_ok());

        let mut body: &[u8] = &[1, 0xFF];
        assert!(read_codec_channel(block_type::REGION, &mut body).is_err());

        let mut body: &[u8] = &[2, 0];
        assert!(read_codec_channel(block_type::FRAME_BEGIN, &mut body).is_err());

        assert!(block_type::has_codec_channel(block_type::EXTENSION));
        assert!(!block_type::has_codec_channel(block_type::CHANNELS));
    }

    #[test]
    fn header_bookkeeping(){
        let mut seen = HeaderBlocks::default();
        assert!(!seen.complete());

        seen.sync = true;
        seen.codec_versions = true;
        seen.channels = true;
        assert!(!seen.complete());

        seen.context = true;
        assert!(seen.complete());
    }
}
