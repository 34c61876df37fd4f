
//! Parses the blocks of a received message into frames.
//! The frames contain views of the tiles, which are decoded afterwards.

use std::fmt;
use crate::block::TileBlock;
use crate::compression::quantize::QuantTable;
use crate::error::{Error, Result, UnitResult};
use crate::math::{Rect, Vec2};
use crate::meta::{BlockHeader, HeaderBlocks, block_type};
use crate::meta::header::{sync, codec_versions, channels, ContextHeader};
use crate::meta::frame::{FrameBegin, frame_end, RegionHeader, TilesetHeader, TileHeader};
use crate::meta::properties::{CodecFlags, ContextProperties, TilesetProperties};


/// The data block that the decoder expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderState {

    /// Between frames. Header blocks are only accepted in this state.
    AwaitFrameBegin,

    /// A frame was opened.
    AwaitRegion,

    /// The region of the open frame was received.
    AwaitTileset,

    /// The tileset of the open frame was received.
    AwaitFrameEnd,
}

impl Default for DecoderState {
    fn default() -> Self { DecoderState::AwaitFrameBegin }
}

impl fmt::Display for DecoderState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            DecoderState::AwaitFrameBegin => "frame begin",
            DecoderState::AwaitRegion => "region",
            DecoderState::AwaitTileset => "tileset",
            DecoderState::AwaitFrameEnd => "frame end",
        })
    }
}


/// What the header blocks negotiated, and where the decoder is in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamState {

    /// Which header blocks were received.
    pub headers: HeaderBlocks,

    /// The block that is expected next.
    pub state: DecoderState,

    /// Width and height of the frame.
    pub size: Vec2<usize>,

    /// Flags and entropy coder variant.
    pub properties: ContextProperties,
}

impl StreamState {

    /// A stream without any header blocks.
    pub fn new(size: Vec2<usize>, properties: ContextProperties) -> Self {
        StreamState { headers: HeaderBlocks::default(), state: DecoderState::AwaitFrameBegin, size, properties }
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new(Vec2(0, 0), ContextProperties { flags: CodecFlags::default(), entropy: Default::default() })
    }
}


/// A completely received frame. The tiles are views into the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame<'m> {

    /// The index chosen by the encoder.
    pub index: u32,

    /// The context properties in effect when the frame began.
    /// Header blocks between later frames do not change them.
    pub properties: ContextProperties,

    /// The rectangles the frame updates, in frame coordinates.
    pub rects: Vec<Rect>,

    /// The quantization tables the tiles refer to.
    pub quant_tables: Vec<QuantTable>,

    /// The tiles that could be located.
    pub tiles: Vec<TileBlock<'m>>,

    /// Number of tiles that were skipped because they were corrupt.
    pub skipped_tiles: usize,
}

impl ParsedFrame<'_> {
    fn new(index: u32, properties: ContextProperties) -> Self {
        ParsedFrame { index, properties, rects: Vec::new(), quant_tables: Vec::new(), tiles: Vec::new(), skipped_tiles: 0 }
    }
}


/// Parse all blocks of a message.
/// Returns the frames that were completed by the message.
/// On error, the open frame is discarded and the decoder waits for the next frame,
/// header blocks that were already accepted remain valid.
pub fn parse_message<'m>(stream: &mut StreamState, bytes: &'m [u8]) -> Result<Vec<ParsedFrame<'m>>> {
    let result = parse_blocks(stream, bytes);

    if let Err(error) = &result {
        log::debug!("discarding message: {}", error);
        stream.state = DecoderState::AwaitFrameBegin;
    }

    result
}

fn parse_blocks<'m>(stream: &mut StreamState, bytes: &'m [u8]) -> Result<Vec<ParsedFrame<'m>>> {
    let mut remaining = bytes;
    let mut frames = Vec::new();
    let mut open_frame: Option<ParsedFrame<'m>> = None;

    while !remaining.is_empty() {
        let (header, body) = BlockHeader::split_next(&mut remaining)?;
        log::debug!("{} block ({:#06x}) of {} bytes", block_type::name(header.kind), header.kind, header.length);

        match header.kind {
            block_type::SYNC | block_type::CODEC_VERSIONS | block_type::CHANNELS | block_type::CONTEXT => {
                if stream.state != DecoderState::AwaitFrameBegin {
                    return Err(Error::invalid("header block inside a frame"));
                }

                parse_header_block(stream, header.kind, body)?;
            },

            block_type::FRAME_BEGIN | block_type::REGION | block_type::EXTENSION | block_type::FRAME_END => {
                if !stream.headers.complete() {
                    return Err(Error::invalid("frame data before all header blocks"));
                }

                parse_frame_block(stream, header.kind, body, &mut open_frame, &mut frames)?;
            },

            unknown => return Err(Error::invalid(format!("unknown block type {:#06x}", unknown))),
        }
    }

    if stream.state != DecoderState::AwaitFrameBegin {
        return Err(Error::invalid(format!("message ends while waiting for {}", stream.state)));
    }

    Ok(frames)
}

/// Each header block is parsed completely before the stream state is updated.
fn parse_header_block(stream: &mut StreamState, kind: u16, mut body: &[u8]) -> UnitResult {
    match kind {
        block_type::SYNC => {
            sync::read(&mut body)?;
            stream.headers.sync = true;
        },

        block_type::CODEC_VERSIONS => {
            codec_versions::read(&mut body)?;
            stream.headers.codec_versions = true;
        },

        block_type::CHANNELS => match channels::read(&mut body)? {
            Some(size) => {
                log::debug!("channel of {}x{} pixels", size.width(), size.height());
                stream.size = size;
                stream.headers.channels = true;
            },

            None => log::warn!("ignoring channels block without channels"),
        },

        _ => {
            let context = ContextHeader::read(&mut body)?;
            log::debug!("context {} with {} and flags {:#04x}", context.id, context.properties.entropy, context.properties.flags.0);
            stream.properties = context.properties;
            stream.headers.context = true;
        },
    }

    Ok(())
}

fn parse_frame_block<'m>(
    stream: &mut StreamState, kind: u16, mut body: &'m [u8],
    open_frame: &mut Option<ParsedFrame<'m>>, frames: &mut Vec<ParsedFrame<'m>>,
) -> UnitResult
{
    match (kind, stream.state) {
        (block_type::FRAME_BEGIN, DecoderState::AwaitFrameBegin) => {
            let begin = FrameBegin::read(&mut body)?;
            log::debug!("frame {} with {} regions", begin.index, begin.region_count);

            *open_frame = Some(ParsedFrame::new(begin.index, stream.properties));
            stream.state = DecoderState::AwaitRegion;
        },

        (block_type::REGION, DecoderState::AwaitRegion) => {
            let region = RegionHeader::read(&mut body)?;
            let frame = expect_open(open_frame)?;

            // a region without rectangles covers the whole frame
            frame.rects = if region.rects.is_empty() { vec![Rect::from_dimensions(stream.size)] }
                else { region.rects };

            stream.state = DecoderState::AwaitTileset;
        },

        (block_type::EXTENSION, DecoderState::AwaitTileset) => {
            let frame = expect_open(open_frame)?;
            parse_tileset(body, frame)?;
            stream.state = DecoderState::AwaitFrameEnd;
        },

        (block_type::FRAME_END, DecoderState::AwaitFrameEnd) => {
            frame_end::read(&mut body)?;

            let frame = open_frame.take().ok_or_else(|| Error::invalid("frame end without frame"))?;
            frames.push(frame);
            stream.state = DecoderState::AwaitFrameBegin;
        },

        (kind, state) => return Err(Error::invalid(format!(
            "{} block while waiting for {}", block_type::name(kind), state
        ))),
    }

    Ok(())
}

fn expect_open<'f, 'm>(open_frame: &'f mut Option<ParsedFrame<'m>>) -> Result<&'f mut ParsedFrame<'m>> {
    open_frame.as_mut().ok_or_else(|| Error::invalid("frame data without frame begin"))
}

fn parse_tileset<'m>(mut body: &'m [u8], frame: &mut ParsedFrame<'m>) -> UnitResult {
    let tileset = TilesetHeader::read(&mut body)?;
    log::debug!(
        "tileset {} with {} quantization tables and {} tiles of {} bytes",
        tileset.index, tileset.quant_count, tileset.tile_count, tileset.tiles_data_size
    );

    match TilesetProperties::from_bits(tileset.properties) {
        Ok(properties) if properties.entropy != frame.properties.entropy => log::warn!(
            "tileset announces {}, decoding with {} of the context",
            properties.entropy, frame.properties.entropy
        ),

        Err(error) => log::warn!("ignoring tileset properties {:#06x}: {}", tileset.properties, error),
        Ok(_) => {},
    }

    let quant_count = usize::from(tileset.quant_count);
    frame.quant_tables.try_reserve_exact(quant_count)?;

    for _ in 0 .. quant_count {
        frame.quant_tables.push(QuantTable::read(&mut body)?);
    }

    let tile_count = usize::from(tileset.tile_count);
    if tile_count == 0 {
        return Ok(());
    }

    if quant_count == 0 {
        return Err(Error::invalid("tiles without quantization tables"));
    }

    if body.len() != tileset.tiles_data_size as usize {
        log::debug!("tiles occupy {} bytes, tileset announces {}", body.len(), tileset.tiles_data_size);
    }

    frame.tiles.try_reserve_exact(tile_count)?;

    for _ in 0 .. tile_count {
        let (tile_header, data) = TileHeader::split_next(&mut body)?;

        match TileBlock::from_header(tile_header, data, quant_count) {
            Ok(tile) => frame.tiles.push(tile),

            Err(error) => {
                log::warn!("skipping tile at {:?}: {}", tile_header.grid_position, error);
                frame.skipped_tiles += 1;
            },
        }
    }

    Ok(())
}
