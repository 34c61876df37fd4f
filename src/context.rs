
//! The codec context, which owns the configuration and the state of one side of a connection.
//!
//! A decoder context receives messages with `Context::process_message`,
//! which writes the decoded pixels to a caller buffer.
//! An encoder context turns rectangles of an image into `FrameMessage`s
//! with `Context::encode_message` and writes them with `Context::write_message`.

use std::sync::Arc;
use crate::block::{self, TilePools, TileBlock, DecodedTile};
use crate::block::compose::{self, Destination, Region};
use crate::block::scheduler::{Scheduler, Threading};
use crate::compression::{EntropyAlgorithm, TileSettings, Transform};
use crate::compression::backend::{BackendChoice, TransformBackend};
use crate::compression::color::PixelFormat;
use crate::compression::quantize::QuantTable;
use crate::decode::{self, DecoderState, ParsedFrame, StreamState};
use crate::encode::{self, FrameMessage, Source};
use crate::error::{Error, Result, UnitResult, u16_from_usize};
use crate::io::Write;
use crate::math::{Rect, Vec2};
use crate::meta::header::ContextHeader;
use crate::meta::properties::{CodecFlags, ContextProperties};


/// Whether a context encodes or decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {

    /// Produces messages from images.
    Encoder,

    /// Produces images from messages.
    Decoder,
}


/// Whether the encoder still has to send the header blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderState {

    /// The next written message starts with the header blocks.
    SendHeaders,

    /// The header blocks were sent.
    SendFrameData,
}


/// Configures how a context processes tiles.
/// Cannot be changed after the context was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextOptions {

    /// Process tiles on a thread pool or on the calling thread.
    pub threading: Threading,

    /// The subband layout that a decoder expects.
    /// Encoders always use the legacy layout.
    pub transform: Transform,

    /// How the transform backend is chosen.
    pub backend: BackendChoice,
}

impl ContextOptions {

    /// Process all tiles on the calling thread.
    pub fn non_parallel(self) -> Self {
        ContextOptions { threading: Threading::Sequential, .. self }
    }

    /// Process tiles on a thread pool with the specified number of threads.
    pub fn with_threads(self, threads: usize) -> Self {
        ContextOptions { threading: Threading::Parallel { threads: Some(threads) }, .. self }
    }

    /// Decode tiles with the specified subband layout.
    pub fn with_transform(self, transform: Transform) -> Self {
        ContextOptions { transform, .. self }
    }

    /// Choose the transform backend.
    pub fn with_backend(self, backend: BackendChoice) -> Self {
        ContextOptions { backend, .. self }
    }
}


/// What a call to `Context::process_message` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodedMessage {

    /// Number of frames the message completed.
    pub frames: usize,

    /// Number of rectangles of all completed frames.
    pub rects: usize,

    /// Number of tiles that were decoded and composed.
    pub decoded_tiles: usize,

    /// Number of tiles that were skipped because their data was corrupt.
    pub skipped_tiles: usize,
}


/// One side of a RemoteFX connection.
#[derive(Debug)]
pub struct Context {
    role: Role,
    options: ContextOptions,
    format: PixelFormat,

    stream: StreamState,
    encoder_state: EncoderState,
    frame_index: u32,

    quant_tables: Arc<[QuantTable]>,
    quant_indices: [u8; 3],

    pools: TilePools,
    backend: Box<dyn TransformBackend>,
    scheduler: Scheduler,
}

impl Context {

    /// A context with default options.
    pub fn new(role: Role) -> Self {
        Self::with_options(role, ContextOptions::default())
    }

    /// A context with the specified options. Does not create any threads yet.
    pub fn with_options(role: Role, options: ContextOptions) -> Self {
        let backend = options.backend.select();
        log::debug!("created {:?} context with the {} backend", role, backend.name());

        Context {
            role, options,
            format: PixelFormat::default(),

            stream: StreamState::default(),
            encoder_state: EncoderState::SendHeaders,
            frame_index: 0,

            quant_tables: Arc::from(vec![QuantTable::DEFAULT]),
            quant_indices: [0; 3],

            pools: TilePools::new(),
            backend,
            scheduler: Scheduler::new(options.threading),
        }
    }

    /// Set the frame size. The encoder sends the header blocks again,
    /// and frame indices start at zero.
    pub fn reset(&mut self, width: usize, height: usize) -> UnitResult {
        u16_from_usize(width, "frame width")?;
        u16_from_usize(height, "frame height")?;

        self.stream.size = Vec2(width, height);
        self.stream.state = DecoderState::AwaitFrameBegin;
        self.encoder_state = EncoderState::SendHeaders;
        self.frame_index = 0;
        Ok(())
    }

    /// Set the format of the encoder input.
    pub fn set_pixel_format(&mut self, format: PixelFormat) {
        self.format = format;
    }

    /// Set the entropy coder variant of the encoder.
    /// The encoder sends the header blocks again if the variant changes.
    pub fn set_entropy_algorithm(&mut self, entropy: EntropyAlgorithm) {
        if self.stream.properties.entropy != entropy {
            self.stream.properties.entropy = entropy;
            self.encoder_state = EncoderState::SendHeaders;
        }
    }

    /// Set the codec flags of the encoder, for example `CodecFlags::IMAGE_MODE`.
    /// The encoder sends the header blocks again if the flags change.
    pub fn set_flags(&mut self, flags: CodecFlags) {
        if self.stream.properties.flags != flags {
            self.stream.properties.flags = flags;
            self.encoder_state = EncoderState::SendHeaders;
        }
    }

    /// Set the quantization tables of the encoder,
    /// and which of them is used for the Y, Cb and Cr components.
    pub fn set_quant_tables(&mut self, tables: Vec<QuantTable>, indices: [u8; 3]) -> UnitResult {
        if tables.is_empty() || tables.len() > usize::from(u8::MAX) {
            return Err(Error::invalid("number of quantization tables must be within 1 and 255"));
        }

        if indices.iter().any(|&index| usize::from(index) >= tables.len()) {
            return Err(Error::invalid("quantization table index out of range"));
        }

        for table in &tables {
            table.validate()?;
        }

        self.quant_tables = Arc::from(tables);
        self.quant_indices = indices;
        Ok(())
    }

    /// Whether this context encodes or decodes.
    pub fn role(&self) -> Role { self.role }

    /// The options this context was created with.
    pub fn options(&self) -> ContextOptions { self.options }

    /// The frame width, as set by `reset` or the last channels block.
    pub fn width(&self) -> usize { self.stream.size.width() }

    /// The frame height, as set by `reset` or the last channels block.
    pub fn height(&self) -> usize { self.stream.size.height() }

    /// The format of the encoder input.
    pub fn pixel_format(&self) -> PixelFormat { self.format }

    /// The entropy coder variant, as set or negotiated.
    pub fn entropy_algorithm(&self) -> EntropyAlgorithm { self.stream.properties.entropy }

    /// The codec flags, as set or negotiated.
    pub fn flags(&self) -> CodecFlags { self.stream.properties.flags }

    /// The quantization tables of the encoder.
    pub fn quant_tables(&self) -> &[QuantTable] { &self.quant_tables }

    /// Which quantization table the encoder uses for the Y, Cb and Cr components.
    pub fn quant_indices(&self) -> [u8; 3] { self.quant_indices }

    /// The index of the next frame the encoder produces.
    pub fn frame_index(&self) -> u32 { self.frame_index }

    /// The name of the transform backend, for example `"scalar"`.
    pub fn backend_name(&self) -> &'static str { self.backend.name() }

    /// The block the decoder expects next.
    pub fn decoder_state(&self) -> DecoderState { self.stream.state }

    /// Whether the encoder still has to send the header blocks.
    pub fn encoder_state(&self) -> EncoderState { self.encoder_state }

    /// Whether the decoder received all header blocks.
    pub fn headers_received(&self) -> bool { self.stream.headers.complete() }

    /// Whether tiles are processed on worker threads.
    pub fn is_parallel(&self) -> bool { self.scheduler.is_parallel() }

    fn require(&self, role: Role) -> UnitResult {
        if self.role == role { Ok(()) }
        else { Err(Error::unsupported(format!("operation requires a {:?} context", role))) }
    }

    fn context_header(&self) -> ContextHeader {
        ContextHeader {
            id: 0,
            properties: ContextProperties { flags: self.stream.properties.flags, entropy: self.stream.properties.entropy },
        }
    }

    fn next_frame_index(&mut self) -> u32 {
        let index = self.frame_index;
        self.frame_index = self.frame_index.wrapping_add(1);
        index
    }
}


/// Decoding.
impl Context {

    /// Parse a message, decode its tiles and compose them into the destination.
    /// The area that was written is added to `invalid`.
    /// Tiles with corrupt data are skipped, the destination keeps its pixels there.
    pub fn process_message(&mut self, bytes: &[u8], destination: &mut Destination<'_>, invalid: &mut Region) -> Result<DecodedMessage> {
        self.require(Role::Decoder)?;
        destination.validate()?;

        let frames = decode::parse_message(&mut self.stream, bytes)?;

        let mut report = DecodedMessage::default();
        for frame in &frames {
            self.decode_frame(frame, destination, invalid, &mut report)?;
        }

        Ok(report)
    }

    fn decode_frame(
        &self, frame: &ParsedFrame<'_>, destination: &mut Destination<'_>,
        invalid: &mut Region, report: &mut DecodedMessage,
    ) -> UnitResult
    {
        let settings = TileSettings {
            entropy: frame.properties.entropy,
            transform: self.options.transform,
            format: destination.format,
        };

        let backend = self.backend.as_ref();
        let pools = &self.pools;
        let quant_tables = frame.quant_tables.as_slice();

        log::trace!("decoding {} tiles of frame {}", frame.tiles.len(), frame.index);

        let results = self.scheduler.run(frame.tiles.iter().collect(), |tile: &TileBlock<'_>| {
            block::decode_tile(tile, quant_tables, settings, backend, pools)
                .map_err(|error| (tile.grid_position, error))
        })?;

        let clips = compose::clipping_rects(&frame.rects, destination.offset, destination.bounds());

        report.frames += 1;
        report.rects += frame.rects.len();
        report.skipped_tiles += frame.skipped_tiles;

        for result in results {
            match result {
                Ok(DecodedTile { position, pixels }) => {
                    compose::compose_tile(&pixels, position, &clips, destination, invalid);
                    report.decoded_tiles += 1;
                },

                Err((grid_position, error)) if matches!(error, Error::Corrupt(_) | Error::Resource(_)) => {
                    log::warn!("skipping tile at {:?}: {}", grid_position, error);
                    report.skipped_tiles += 1;
                },

                Err((_, error)) => return Err(error),
            }
        }

        Ok(())
    }
}


/// Encoding.
impl Context {

    /// Encode all tiles that the rectangles touch into one message.
    /// The rectangles are clamped to the frame size set by `reset`.
    pub fn encode_message(&mut self, rects: &[Rect], source: &Source<'_>) -> Result<FrameMessage> {
        let (rects, tiles) = self.encode_tiles(rects, source)?;
        let index = self.next_frame_index();
        Ok(FrameMessage::new(index, rects, self.quant_tables.clone(), tiles))
    }

    /// Encode all tiles that the rectangles touch into messages
    /// that each contain at most `max_message_size` bytes when written.
    /// A single tile that exceeds the limit is sent in a message of its own.
    pub fn encode_messages(&mut self, rects: &[Rect], source: &Source<'_>, max_message_size: usize) -> Result<Vec<FrameMessage>> {
        let (rects, tiles) = self.encode_tiles(rects, source)?;
        let headers_pending = self.encoder_state == EncoderState::SendHeaders;
        let quant_tables = self.quant_tables.clone();

        Ok(encode::split_tiles(
            tiles, rects, quant_tables, headers_pending, max_message_size,
            &mut || self.next_frame_index()
        ))
    }

    /// Write a message, preceded by the header blocks if they were not sent yet.
    pub fn write_message(&mut self, message: &FrameMessage) -> Result<Vec<u8>> {
        let with_headers = self.encoder_state == EncoderState::SendHeaders;

        let mut bytes = Vec::new();
        bytes.try_reserve_exact(message.serialized_size(with_headers))?;

        self.write_message_to(message, &mut bytes)?;
        Ok(bytes)
    }

    /// Write a message to a writer, preceded by the header blocks if they were not sent yet.
    pub fn write_message_to(&mut self, message: &FrameMessage, mut write: impl Write) -> UnitResult {
        self.require(Role::Encoder)?;

        let headers = match self.encoder_state {
            EncoderState::SendHeaders => Some(self.stream.size),
            EncoderState::SendFrameData => None,
        };

        message.write(&self.context_header(), headers, &mut write)?;
        self.encoder_state = EncoderState::SendFrameData;
        Ok(())
    }

    fn encode_tiles(&self, rects: &[Rect], source: &Source<'_>) -> Result<(Arc<[Rect]>, Vec<block::EncodedTile>)> {
        self.require(Role::Encoder)?;

        let frame = Rect::from_dimensions(self.stream.size);
        let bounds = frame.intersect(source.bounds())
            .ok_or_else(|| Error::invalid("frame size not set or source image empty"))?;

        let clamped: Vec<Rect> = rects.iter().filter_map(|rect| rect.intersect(frame)).collect();
        if clamped.is_empty() {
            return Err(Error::invalid("no rectangle intersects the frame"));
        }

        let [y, cb, cr] = self.quant_indices;
        let quant = |index: u8| self.quant_tables.get(usize::from(index))
            .ok_or_else(|| Error::invalid("quantization table index out of range"));

        let job = block::EncodeJob {
            source: source.pixels,
            stride: source.stride,
            format: self.format,
            bounds,
            entropy: self.stream.properties.entropy,
            quants: [quant(y)?, quant(cb)?, quant(cr)?],
            quant_indices: self.quant_indices,
        };

        let cells = encode::tile_cells(&clamped, frame)?;
        log::trace!("encoding {} tiles", cells.len());

        let backend = self.backend.as_ref();
        let pools = &self.pools;

        let tiles = self.scheduler.run(cells, |cell| block::encode_tile(&job, cell, backend, pools))?
            .into_iter().collect::<Result<Vec<_>>>()?;

        Ok((Arc::from(clamped), tiles))
    }
}


#[cfg(test)]
mod test {
    use super::*;

    fn grey_source(width: usize, height: usize, grey: u8) -> Vec<u8> {
        vec![grey; width * height * 4]
    }

    fn encoder(width: usize, height: usize) -> Context {
        let mut encoder = Context::with_options(Role::Encoder, ContextOptions::default().non_parallel());
        encoder.reset(width, height).unwrap();
        encoder
    }

    #[test]
    fn roles_are_checked(){
        let mut decoder = Context::new(Role::Decoder);
        decoder.reset(64, 64).unwrap();

        let pixels = grey_source(64, 64, 0);
        let source = Source::new(&pixels, 64, 64, 256);
        assert!(matches!(decoder.encode_message(&[Rect::from_dimensions((64, 64))], &source), Err(Error::NotSupported(_))));

        let mut encoder = encoder(64, 64);
        let mut buffer = vec![0_u8; 64 * 64 * 4];
        let mut destination = Destination::new(&mut buffer, PixelFormat::Bgra32, 256, 64);
        let result = encoder.process_message(&[], &mut destination, &mut Region::new());
        assert!(matches!(result, Err(Error::NotSupported(_))));
    }

    #[test]
    fn headers_are_sent_once(){
        let mut encoder = encoder(64, 64);
        let pixels = grey_source(64, 64, 10);
        let source = Source::new(&pixels, 64, 64, 256);

        let first = encoder.encode_message(&[Rect::from_dimensions((64, 64))], &source).unwrap();
        let second = encoder.encode_message(&[Rect::from_dimensions((64, 64))], &source).unwrap();
        assert_eq!((first.frame_index(), second.frame_index()), (0, 1));

        let first_bytes = encoder.write_message(&first).unwrap();
        assert_eq!(first_bytes.len(), first.serialized_size(true));
        assert_eq!(encoder.encoder_state(), EncoderState::SendFrameData);

        let second_bytes = encoder.write_message(&second).unwrap();
        assert_eq!(second_bytes.len(), second.serialized_size(false));

        encoder.set_entropy_algorithm(EntropyAlgorithm::Rlgr3);
        assert_eq!(encoder.encoder_state(), EncoderState::SendHeaders);

        encoder.reset(128, 64).unwrap();
        assert_eq!(encoder.frame_index(), 0);
    }

    #[test]
    fn quant_table_configuration(){
        let mut encoder = encoder(64, 64);
        assert!(encoder.set_quant_tables(Vec::new(), [0; 3]).is_err());
        assert!(encoder.set_quant_tables(vec![QuantTable::DEFAULT], [0, 0, 1]).is_err());
        assert!(encoder.set_quant_tables(vec![QuantTable([16; 10])], [0; 3]).is_err());

        encoder.set_quant_tables(vec![QuantTable::DEFAULT, QuantTable([6; 10])], [0, 1, 1]).unwrap();
        assert_eq!(encoder.quant_indices(), [0, 1, 1]);
        assert_eq!(encoder.quant_tables().len(), 2);
    }

    #[test]
    fn rects_are_clamped_to_the_frame(){
        let mut encoder = encoder(100, 70);
        let pixels = grey_source(100, 70, 50);
        let source = Source::new(&pixels, 100, 70, 400);

        let message = encoder.encode_message(&[Rect::new((90, 60), (1000, 1000))], &source).unwrap();
        assert_eq!(message.rects(), &[Rect::new((90, 60), (10, 10))]);
        assert_eq!(message.tiles().len(), 2);

        assert!(encoder.encode_message(&[Rect::new((100, 0), (10, 10))], &source).is_err());
    }

    #[test]
    fn reset_checks_wire_limits(){
        let mut context = Context::new(Role::Encoder);
        assert!(context.reset(65536, 1).is_err());
        assert!(context.reset(65535, 1).is_ok());
        assert_eq!(context.width(), 65535);
    }
}
