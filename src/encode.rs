
//! Selects the tiles of a frame, splits encoded frames into messages of limited size,
//! and writes messages as blocks.

use std::convert::TryFrom;
use std::sync::Arc;
use crate::block::EncodedTile;
use crate::compression::TILE_SIZE;
use crate::compression::quantize::QuantTable;
use crate::error::{Error, Result, UnitResult, u16_from_usize, u32_from_usize};
use crate::io::Write;
use crate::math::{Rect, RoundingMode, Vec2};
use crate::meta::frame::{FrameBegin, frame_end, RegionHeader, TilesetHeader};
use crate::meta::header::{self, ContextHeader};


/// The pixels of a frame that should be encoded,
/// in the pixel format of the context.
#[derive(Debug, Clone, Copy)]
pub struct Source<'b> {

    /// The pixels, with `stride` bytes per row.
    pub pixels: &'b [u8],

    /// Number of pixels per row.
    pub width: usize,

    /// Number of rows.
    pub height: usize,

    /// Number of bytes from one row to the next.
    pub stride: usize,
}

impl<'b> Source<'b> {

    /// Describe an image in the pixel format of the context.
    pub fn new(pixels: &'b [u8], width: usize, height: usize, stride: usize) -> Self {
        Source { pixels, width, height, stride }
    }

    /// The pixels that can be read.
    pub fn bounds(&self) -> Rect {
        Rect::from_dimensions((self.width, self.height))
    }
}


/// The grid positions of all tiles that one of the rectangles touches,
/// each position once, in row-major order.
/// Rectangles are clamped to the frame.
pub fn tile_cells(rects: &[Rect], frame: Rect) -> Result<Vec<Vec2<usize>>> {
    let columns = RoundingMode::Up.divide(frame.size.width(), TILE_SIZE);
    let rows = RoundingMode::Up.divide(frame.size.height(), TILE_SIZE);

    let mut touched = Vec::new();
    touched.try_reserve_exact(columns * rows)?;
    touched.resize(columns * rows, false);

    for rect in rects.iter().filter_map(|rect| rect.intersect(frame)) {
        let start = rect.position.map(|coordinate| coordinate / TILE_SIZE);
        let end = rect.end().map(|coordinate| RoundingMode::Up.divide(coordinate, TILE_SIZE));

        for y in start.y() .. end.y() {
            for x in start.x() .. end.x() {
                touched[y * columns + x] = true;
            }
        }
    }

    let mut cells = Vec::new();
    cells.try_reserve_exact(touched.iter().filter(|&&touched| touched).count())?;

    cells.extend(
        touched.iter().enumerate()
            .filter(|(_, touched)| **touched)
            .map(|(index, _)| Vec2(index % columns, index / columns))
    );

    Ok(cells)
}


/// An encoded frame, ready to be written.
/// Messages that were split from one frame share their rectangles and quantization tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMessage {
    frame_index: u32,
    rects: Arc<[Rect]>,
    quant_tables: Arc<[QuantTable]>,
    tiles: Vec<EncodedTile>,
}

impl FrameMessage {

    /// Bundle encoded tiles with the rectangles they update.
    pub fn new(frame_index: u32, rects: Arc<[Rect]>, quant_tables: Arc<[QuantTable]>, tiles: Vec<EncodedTile>) -> Self {
        FrameMessage { frame_index, rects, quant_tables, tiles }
    }

    /// The index written to the frame begin block.
    pub fn frame_index(&self) -> u32 { self.frame_index }

    /// The rectangles written to the region block.
    pub fn rects(&self) -> &[Rect] { &self.rects }

    /// The quantization tables written to the tileset block.
    pub fn quant_tables(&self) -> &[QuantTable] { &self.quant_tables }

    /// The encoded tiles.
    pub fn tiles(&self) -> &[EncodedTile] { &self.tiles }

    /// Number of bytes of all tile blocks.
    pub fn tiles_data_size(&self) -> usize {
        self.tiles.iter().map(EncodedTile::block_size).sum()
    }

    /// Number of bytes of the written message,
    /// optionally including the header blocks.
    pub fn serialized_size(&self, with_headers: bool) -> usize {
        frame_overhead(self.rects.len(), self.quant_tables.len(), with_headers) + self.tiles_data_size()
    }

    /// Write all blocks of the frame, preceded by the header blocks if a frame size is specified.
    /// The tileset properties are derived from the context block.
    pub fn write(&self, context: &ContextHeader, headers: Option<Vec2<usize>>, write: &mut impl Write) -> UnitResult {
        if let Some(size) = headers {
            header::write_all(context, size, write)?;
        }

        FrameBegin { index: self.frame_index, region_count: 1 }.write(write)?;
        RegionHeader::write(&self.rects, write)?;

        let quant_count = u8::try_from(self.quant_tables.len())
            .map_err(|_| Error::unsupported("more than 255 quantization tables"))?;

        let tileset = TilesetHeader {
            index: 0,
            properties: context.properties.tileset_properties().to_bits(),
            quant_count,
            tile_count: u16_from_usize(self.tiles.len(), "number of tiles")?,
            tiles_data_size: u32_from_usize(self.tiles_data_size(), "tiles data size")?,
        };

        tileset.write(write)?;

        for table in self.quant_tables.iter() {
            table.write(write)?;
        }

        for tile in &self.tiles {
            tile.write(write)?;
        }

        frame_end::write(write)
    }
}

/// Number of bytes of a message without any tiles.
pub fn frame_overhead(rect_count: usize, quant_count: usize, with_headers: bool) -> usize {
    let headers = if with_headers { header::ALL_BYTE_SIZE } else { 0 };

    headers + FrameBegin::BYTE_SIZE + RegionHeader::byte_size(rect_count)
        + TilesetHeader::byte_size(quant_count, 0) + frame_end::BYTE_SIZE
}


/// Distribute the tiles of a frame over as few messages as possible,
/// so that no message exceeds the maximum size.
/// Only the first message contains the header blocks, if they are pending.
/// A tile that does not fit into an empty message travels alone.
/// Each message takes the next frame index from `next_frame_index`.
pub fn split_tiles(
    tiles: Vec<EncodedTile>, rects: Arc<[Rect]>, quant_tables: Arc<[QuantTable]>,
    headers_pending: bool, max_message_size: usize, next_frame_index: &mut impl FnMut() -> u32,
) -> Vec<FrameMessage>
{
    let mut messages = Vec::new();
    let mut batch: Vec<EncodedTile> = Vec::new();
    let mut with_headers = headers_pending;
    let mut batch_size = frame_overhead(rects.len(), quant_tables.len(), with_headers);

    for tile in tiles {
        let tile_size = tile.block_size();

        if !batch.is_empty() && batch_size + tile_size > max_message_size {
            let full = std::mem::take(&mut batch);
            messages.push(FrameMessage::new(next_frame_index(), rects.clone(), quant_tables.clone(), full));

            with_headers = false;
            batch_size = frame_overhead(rects.len(), quant_tables.len(), with_headers);
        }

        batch_size += tile_size;
        batch.push(tile);
    }

    if !batch.is_empty() || messages.is_empty() {
        messages.push(FrameMessage::new(next_frame_index(), rects, quant_tables, batch));
    }

    log::debug!("split frame into {} messages of at most {} bytes", messages.len(), max_message_size);
    messages
}
