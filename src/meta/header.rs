
//! The four header blocks that configure a channel before any frame can be decoded.
//! Each block is read from its body, which excludes the block header,
//! and written completely, including the block header.

use crate::io::*;
use crate::error::*;
use crate::math::Vec2;
use super::{BlockHeader, block_type, CODEC_ID, CODEC_VERSION, read_codec_channel, write_codec_channel};
use super::properties::ContextProperties;
use crate::compression::TILE_SIZE;


/// The sync block, which starts every stream.
pub mod sync {
    use super::*;

    /// Identifies a RemoteFX stream.
    pub const MAGIC: u32 = 0xCACCACCA;

    /// Number of bytes of the complete block.
    pub const BYTE_SIZE: usize = BlockHeader::BYTE_SIZE + 6;

    /// Validate the magic number and the version.
    pub fn read(body: &mut &[u8]) -> UnitResult {
        let magic = u32::read(body)?;
        let version = u16::read(body)?;

        if magic != MAGIC { return Err(Error::invalid("sync magic number")); }
        if version != CODEC_VERSION { return Err(Error::invalid("sync version")); }
        Ok(())
    }

    /// Write the complete block.
    pub fn write(write: &mut impl Write) -> UnitResult {
        BlockHeader::write(block_type::SYNC, BYTE_SIZE, write)?;
        MAGIC.write(write)?;
        CODEC_VERSION.write(write)
    }
}

/// The codec versions block, which lists the single supported codec.
pub mod codec_versions {
    use super::*;

    /// Number of bytes of the complete block.
    pub const BYTE_SIZE: usize = BlockHeader::BYTE_SIZE + 4;

    /// Validate that exactly the RemoteFX codec in version 1.0 is announced.
    pub fn read(body: &mut &[u8]) -> UnitResult {
        let codec_count = u8::read(body)?;
        if codec_count != 1 {
            return Err(Error::invalid("number of codecs"));
        }

        let codec_id = u8::read(body)?;
        let version = u16::read(body)?;

        if codec_id != CODEC_ID { return Err(Error::invalid("codec id")); }
        if version != CODEC_VERSION { return Err(Error::invalid("codec version")); }
        Ok(())
    }

    /// Write the complete block.
    pub fn write(write: &mut impl Write) -> UnitResult {
        BlockHeader::write(block_type::CODEC_VERSIONS, BYTE_SIZE, write)?;
        1_u8.write(write)?;
        CODEC_ID.write(write)?;
        CODEC_VERSION.write(write)
    }
}

/// The channels block, which defines the frame size.
pub mod channels {
    use super::*;

    /// Number of bytes of one channel entry.
    pub const CHANNEL_BYTE_SIZE: usize = 5;

    /// Number of bytes of the complete block with one channel.
    pub const BYTE_SIZE: usize = BlockHeader::BYTE_SIZE + 1 + CHANNEL_BYTE_SIZE;

    /// Returns the size of the first channel, or `None` if the block contains no channels.
    /// All channel entries are validated, but only the first one is used.
    pub fn read(body: &mut &[u8]) -> Result<Option<Vec2<usize>>> {
        let channel_count = usize::from(u8::read(body)?);
        let mut entries = take_n(body, channel_count * CHANNEL_BYTE_SIZE)?;

        let mut first = None;
        for _ in 0 .. channel_count {
            let channel_id = u8::read(&mut entries)?;
            let width = u16::read(&mut entries)?;
            let height = u16::read(&mut entries)?;

            if channel_id != 0 {
                return Err(Error::invalid("channel id"));
            }

            first.get_or_insert(Vec2(usize::from(width), usize::from(height)));
        }

        Ok(first)
    }

    /// Write the complete block with one channel.
    pub fn write(size: Vec2<usize>, write: &mut impl Write) -> UnitResult {
        BlockHeader::write(block_type::CHANNELS, BYTE_SIZE, write)?;
        1_u8.write(write)?;
        0_u8.write(write)?;
        u16_from_usize(size.width(), "frame width")?.write(write)?;
        u16_from_usize(size.height(), "frame height")?.write(write)
    }
}


/// The context block, which selects tile size and entropy coder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextHeader {

    /// Identifies the context. Always zero in practice.
    pub id: u8,

    /// The properties, including the entropy algorithm.
    pub properties: ContextProperties,
}

impl ContextHeader {

    /// Number of bytes of the complete block.
    pub const BYTE_SIZE: usize = BlockHeader::CODEC_CHANNEL_BYTE_SIZE + 5;

    /// Read the body of a context block, starting with the codec and channel ids.
    pub fn read(body: &mut &[u8]) -> Result<Self> {
        read_codec_channel(block_type::CONTEXT, body)?;

        let id = u8::read(body)?;
        let tile_size = u16::read(body)?;
        let properties = u16::read(body)?;

        if usize::from(tile_size) != TILE_SIZE {
            return Err(Error::invalid("tile size"));
        }

        Ok(ContextHeader { id, properties: ContextProperties::from_bits(properties)? })
    }

    /// Write the complete block.
    pub fn write(&self, write: &mut impl Write) -> UnitResult {
        BlockHeader::write(block_type::CONTEXT, Self::BYTE_SIZE, write)?;
        write_codec_channel(block_type::CONTEXT, write)?;
        self.id.write(write)?;
        (TILE_SIZE as u16).write(write)?;
        self.properties.to_bits().write(write)
    }
}


/// Write all four header blocks, in the order sync, context, codec versions, channels.
pub fn write_all(context: &ContextHeader, size: Vec2<usize>, write: &mut impl Write) -> UnitResult {
    sync::write(write)?;
    context.write(write)?;
    codec_versions::write(write)?;
    channels::write(size, write)
}

/// Number of bytes of all four header blocks.
pub const ALL_BYTE_SIZE: usize = sync::BYTE_SIZE + ContextHeader::BYTE_SIZE + codec_versions::BYTE_SIZE + channels::BYTE_SIZE;


#[cfg(test)]
mod test {
    use super::*;
    use crate::compression::EntropyAlgorithm;
    use crate::meta::properties::CodecFlags;

    fn body_of(bytes: &[u8]) -> &[u8] {
        let mut remaining = bytes;
        let (_, body) = BlockHeader::split_next(&mut remaining).unwrap();
        assert!(remaining.is_empty());
        body
    }

    #[test]
    fn block_sizes(){
        let context = ContextHeader {
            id: 0,
            properties: ContextProperties { flags: CodecFlags(0), entropy: EntropyAlgorithm::Rlgr1 },
        };

        let mut bytes = Vec::new();
        write_all(&context, Vec2(1024, 768), &mut bytes).unwrap();
        assert_eq!(bytes.len(), 12 + 13 + 10 + 12);
        assert_eq!(bytes.len(), ALL_BYTE_SIZE);
    }

    #[test]
    fn sync_validation(){
        let mut bytes = Vec::new();
        sync::write(&mut bytes).unwrap();
        assert_eq!(bytes, [0xC0, 0xCC, 12, 0, 0, 0, 0xCA, 0xAC, 0xCC, 0xCA, 0x00, 0x01]);
        assert!(sync::read(&mut body_of(&bytes)).is_ok());

        bytes[6] = 0;
        assert!(sync::read(&mut body_of(&bytes)).is_err());
    }

    #[test]
    fn codec_versions_validation(){
        let mut bytes = Vec::new();
        codec_versions::write(&mut bytes).unwrap();
        assert!(codec_versions::read(&mut body_of(&bytes)).is_ok());

        let mut two_codecs: &[u8] = &[2, 1, 0, 1, 1, 0, 1];
        assert!(codec_versions::read(&mut two_codecs).is_err());

        let mut old_version: &[u8] = &[1, 1, 0, 2];
        assert!(codec_versions::read(&mut old_version).is_err());
    }

    #[test]
    fn channels(){
        let mut bytes = Vec::new();
        channels::write(Vec2(1920, 1080), &mut bytes).unwrap();
        assert_eq!(channels::read(&mut body_of(&bytes)).unwrap(), Some(Vec2(1920, 1080)));

        let mut empty: &[u8] = &[0];
        assert_eq!(channels::read(&mut empty).unwrap(), None);

        let mut second_ignored: &[u8] = &[2, 0, 64, 0, 32, 0, 0, 1, 0, 1, 0];
        assert_eq!(channels::read(&mut second_ignored).unwrap(), Some(Vec2(64, 32)));

        let mut truncated: &[u8] = &[2, 0, 64, 0, 32, 0];
        assert!(channels::read(&mut truncated).is_err());

        let mut bad_id: &[u8] = &[1, 3, 64, 0, 32, 0];
        assert!(channels::read(&mut bad_id).is_err());

        assert!(channels::write(Vec2(70000, 1), &mut Vec::new()).is_err());
    }

    #[test]
    fn context(){
        let context = ContextHeader {
            id: 0,
            properties: ContextProperties { flags: CodecFlags::IMAGE_MODE, entropy: EntropyAlgorithm::Rlgr3 },
        };

        let mut bytes = Vec::new();
        context.write(&mut bytes).unwrap();
        assert_eq!(ContextHeader::read(&mut body_of(&bytes)).unwrap(), context);

        // tile size of 32
        bytes[9] = 32;
        assert!(ContextHeader::read(&mut body_of(&bytes)).is_err());
    }
}
