
//! The blocks of a frame: frame begin, region, tileset with its tiles, and frame end.

use crate::io::*;
use crate::error::*;
use crate::math::{Rect, Vec2};
use crate::compression::TILE_SIZE;
use crate::compression::quantize::QuantTable;
use super::{BlockHeader, block_type, read_codec_channel, write_codec_channel};


/// Opens a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBegin {

    /// Index of the frame, chosen by the encoder.
    pub index: u32,

    /// Number of region blocks in the frame. Always one.
    pub region_count: u16,
}

impl FrameBegin {

    /// Number of bytes of the complete block.
    pub const BYTE_SIZE: usize = BlockHeader::CODEC_CHANNEL_BYTE_SIZE + 6;

    /// Read the body, starting with the codec and channel ids.
    pub fn read(body: &mut &[u8]) -> Result<Self> {
        read_codec_channel(block_type::FRAME_BEGIN, body)?;

        Ok(FrameBegin {
            index: u32::read(body)?,
            region_count: u16::read(body)?,
        })
    }

    /// Write the complete block.
    pub fn write(&self, write: &mut impl Write) -> UnitResult {
        BlockHeader::write(block_type::FRAME_BEGIN, Self::BYTE_SIZE, write)?;
        write_codec_channel(block_type::FRAME_BEGIN, write)?;
        self.index.write(write)?;
        self.region_count.write(write)
    }
}


/// Closes a frame.
pub mod frame_end {
    use super::*;

    /// Number of bytes of the complete block.
    pub const BYTE_SIZE: usize = BlockHeader::CODEC_CHANNEL_BYTE_SIZE;

    /// Validate the body, which only contains the codec and channel ids.
    pub fn read(body: &mut &[u8]) -> UnitResult {
        read_codec_channel(block_type::FRAME_END, body)
    }

    /// Write the complete block.
    pub fn write(write: &mut impl Write) -> UnitResult {
        BlockHeader::write(block_type::FRAME_END, BYTE_SIZE, write)?;
        write_codec_channel(block_type::FRAME_END, write)
    }
}


/// The rectangles of the frame that are updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionHeader {

    /// The rectangles as stored in the block. May be empty.
    pub rects: Vec<Rect>,
}

impl RegionHeader {

    /// Number of bytes of one rectangle.
    pub const RECT_BYTE_SIZE: usize = 8;

    /// Number of bytes of the complete block.
    pub fn byte_size(rect_count: usize) -> usize {
        BlockHeader::CODEC_CHANNEL_BYTE_SIZE + 7 + rect_count * Self::RECT_BYTE_SIZE
    }

    /// Read the body, starting with the codec and channel ids.
    /// A wrong region type is tolerated, a wrong number of tilesets is not.
    pub fn read(body: &mut &[u8]) -> Result<Self> {
        read_codec_channel(block_type::REGION, body)?;

        let _region_flags = u8::read(body)?;
        let rect_count = usize::from(u16::read(body)?);
        let mut rect_bytes = take_n(body, rect_count * Self::RECT_BYTE_SIZE)?;

        let mut rects = Vec::new();
        rects.try_reserve_exact(rect_count)?;

        for _ in 0 .. rect_count {
            let mut components = [0_u16; 4];
            u16::read_slice(&mut rect_bytes, &mut components)?;
            rects.push(Rect::from_u16(components));
        }

        let region_type = u16::read(body)?;
        let tileset_count = u16::read(body)?;

        if region_type != block_type::CBT_REGION {
            log::warn!("ignoring region type {:#06x}", region_type);
        }

        if tileset_count != 1 {
            return Err(Error::invalid("number of tilesets"));
        }

        Ok(RegionHeader { rects })
    }

    /// Write the complete block.
    pub fn write(rects: &[Rect], write: &mut impl Write) -> UnitResult {
        let rect_count = u16_from_usize(rects.len(), "number of rectangles")?;
        BlockHeader::write(block_type::REGION, Self::byte_size(rects.len()), write)?;
        write_codec_channel(block_type::REGION, write)?;

        1_u8.write(write)?;
        rect_count.write(write)?;

        for rect in rects {
            u16::write_slice(write, &rect.to_u16()?)?;
        }

        block_type::CBT_REGION.write(write)?;
        1_u16.write(write)
    }
}


/// The fields of a tileset block that precede the quantization tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilesetHeader {

    /// Index of the tileset. Always zero.
    pub index: u16,

    /// The packed tileset properties.
    pub properties: u16,

    /// Number of quantization tables that follow.
    pub quant_count: u8,

    /// Number of tiles that follow the quantization tables.
    pub tile_count: u16,

    /// Number of bytes of all tile blocks.
    pub tiles_data_size: u32,
}

impl TilesetHeader {

    /// Number of bytes of the block without quantization tables and tiles.
    pub const BYTE_SIZE: usize = BlockHeader::CODEC_CHANNEL_BYTE_SIZE + 14;

    /// Number of bytes of the complete block.
    pub fn byte_size(quant_count: usize, tiles_data_size: usize) -> usize {
        Self::BYTE_SIZE + quant_count * QuantTable::BYTE_SIZE + tiles_data_size
    }

    /// Read the body up to the quantization tables, starting with the codec and channel ids.
    pub fn read(body: &mut &[u8]) -> Result<Self> {
        read_codec_channel(block_type::EXTENSION, body)?;

        if u16::read(body)? != block_type::CBT_TILESET {
            return Err(Error::invalid("tileset subtype"));
        }

        let index = u16::read(body)?;
        let properties = u16::read(body)?;
        let quant_count = u8::read(body)?;
        let tile_size = u8::read(body)?;
        let tile_count = u16::read(body)?;
        let tiles_data_size = u32::read(body)?;

        if usize::from(tile_size) != TILE_SIZE {
            return Err(Error::invalid("tileset tile size"));
        }

        Ok(TilesetHeader { index, properties, quant_count, tile_count, tiles_data_size })
    }

    /// Write the block header and the fields up to the quantization tables.
    pub fn write(&self, write: &mut impl Write) -> UnitResult {
        let byte_size = Self::byte_size(usize::from(self.quant_count), self.tiles_data_size as usize);
        BlockHeader::write(block_type::EXTENSION, byte_size, write)?;
        write_codec_channel(block_type::EXTENSION, write)?;

        block_type::CBT_TILESET.write(write)?;
        self.index.write(write)?;
        self.properties.write(write)?;
        self.quant_count.write(write)?;
        (TILE_SIZE as u8).write(write)?;
        self.tile_count.write(write)?;
        self.tiles_data_size.write(write)
    }
}


/// The fields of a tile block that precede the compressed components.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHeader {

    /// Index into the quantization tables of the tileset, for Y, Cb and Cr.
    pub quant_indices: [u8; 3],

    /// Column and row of the tile in the tile grid.
    pub grid_position: Vec2<usize>,

    /// Number of bytes of the Y, Cb and Cr components.
    pub component_sizes: [usize; 3],
}

impl TileHeader {

    /// Number of bytes of the block without the components.
    pub const BYTE_SIZE: usize = BlockHeader::BYTE_SIZE + 13;

    /// Split the next tile block off the tiles of a tileset.
    /// Returns the header and the bytes that follow it inside the block.
    /// As the following tile cannot be located without a valid length,
    /// a length smaller than the header or beyond the remaining bytes is a protocol error.
    pub fn split_next<'s>(remaining: &mut &'s [u8]) -> Result<(Self, &'s [u8])> {
        let (header, mut body) = BlockHeader::split_next(remaining)?;

        if header.kind != block_type::CBT_TILE {
            return Err(Error::invalid("tile block type"));
        }

        if (header.length as usize) < Self::BYTE_SIZE {
            return Err(Error::invalid("tile block length"));
        }

        let mut quant_indices = [0_u8; 3];
        u8::read_slice(&mut body, &mut quant_indices)?;

        let x = usize::from(u16::read(&mut body)?);
        let y = usize::from(u16::read(&mut body)?);

        let mut component_sizes = [0_u16; 3];
        u16::read_slice(&mut body, &mut component_sizes)?;

        let tile = TileHeader {
            quant_indices,
            grid_position: Vec2(x, y),
            component_sizes: [
                usize::from(component_sizes[0]),
                usize::from(component_sizes[1]),
                usize::from(component_sizes[2]),
            ],
        };

        Ok((tile, body))
    }

    /// Number of bytes of the complete block.
    pub fn block_size(&self) -> usize {
        Self::BYTE_SIZE + self.component_sizes.iter().sum::<usize>()
    }

    /// Write the complete block, including the components.
    pub fn write(&self, components: [&[u8]; 3], write: &mut impl Write) -> UnitResult {
        debug_assert!(components.iter().zip(self.component_sizes.iter()).all(|(data, &size)| data.len() == size));

        BlockHeader::write(block_type::CBT_TILE, self.block_size(), write)?;
        u8::write_slice(write, &self.quant_indices)?;
        u16_from_usize(self.grid_position.x(), "tile column")?.write(write)?;
        u16_from_usize(self.grid_position.y(), "tile row")?.write(write)?;

        for &size in &self.component_sizes {
            u16_from_usize(size, "tile component size")?.write(write)?;
        }

        for data in components.iter() {
            u8::write_slice(write, data)?;
        }

        Ok(())
    }
}
