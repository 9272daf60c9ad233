//! FLV tag scanner
//!
//! Walks the tag sequence of an FLV stream with two cursors. The full-parse
//! cursor reads payloads and produces frames; the index cursor only looks at
//! tag prefixes to record cue points ahead of playback. Both cursors hold the
//! offset of the `PreviousTagSize` field in front of a tag, so the tag itself
//! starts four bytes later.

use super::tag::{probe_dimensions, AudioFlags, VideoFlags, SEQUENCE_HEADER};
use super::{
    read_u24, FlvHeader, FlvTagHeader, FlvTagType, AMF0_OBJECT_END, AMF0_STRING_MARKER,
    HEADER_SIZE, PREV_TAG_SIZE_LEN, TAG_PREFIX_SIZE,
};
use crate::error::{Error, Result};
use crate::io::ByteSource;
use crate::media::{
    AudioInfo, ContainerParser, CuePoint, CuePointIndex, EncodedAudioFrame, EncodedVideoFrame,
    ExtraInfo, MediaParser, ParseStep, ParserConfig, ParserContext, VideoInfo,
};
use crate::util::{Buffer, BufferRef, MediaType};
use tracing::{debug, error, trace, warn};

/// Bytes a cursor moves past one tag: size field, tag header and body
const fn tag_advance(data_size: u32) -> u64 {
    (PREV_TAG_SIZE_LEN + TAG_PREFIX_SIZE - 1) as u64 + data_size as u64
}

/// FLV container parser
pub struct FlvParser<S: ByteSource> {
    source: S,
    header: FlvHeader,
    last_parsed_position: u64,
    next_pos_to_index: u64,
    cue_points: CuePointIndex,
    video_frame_count: u32,
    warned_audio: bool,
    warned_video: bool,
}

impl<S: ByteSource> FlvParser<S> {
    /// Read and validate the file header.
    ///
    /// Fails with [`Error::InvalidHeader`] when fewer than 9 bytes are
    /// available or the magic is not `FLV`.
    pub fn new(mut source: S) -> Result<Self> {
        source.seek(0)?;
        let mut bytes = [0u8; HEADER_SIZE];
        let read = source.read(&mut bytes)?;
        if read < HEADER_SIZE {
            return Err(Error::invalid_header(format!(
                "need {} bytes for FLV header, got {}",
                HEADER_SIZE, read
            )));
        }
        let header = FlvHeader::parse(&bytes)?;

        debug!(
            "FLV version {}, audio: {}, video: {}",
            header.version, header.has_audio, header.has_video
        );

        Ok(FlvParser {
            source,
            header,
            last_parsed_position: HEADER_SIZE as u64,
            next_pos_to_index: HEADER_SIZE as u64,
            cue_points: CuePointIndex::new(),
            video_frame_count: 0,
            warned_audio: false,
            warned_video: false,
        })
    }

    pub fn header(&self) -> &FlvHeader {
        &self.header
    }

    /// Offset of the next tag the index cursor will look at
    pub fn index_position(&self) -> u64 {
        self.next_pos_to_index
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Record an audio cue point.
    ///
    /// Audio is only indexed when the file has no video, and then sparsely.
    pub fn index_audio_tag(&mut self, ctx: &ParserContext, timestamp: u32, offset: u64) -> bool {
        if self.header.has_video {
            return false;
        }
        let added = self
            .cue_points
            .insert_spaced(timestamp, offset, ctx.config().audio_cue_gap_ms);
        if added {
            debug!("audio cue point at {}ms -> offset {}", timestamp, offset);
        }
        added
    }

    /// Record a cue point for a video key frame
    pub fn index_video_tag(&mut self, timestamp: u32, offset: u64, keyframe: bool) -> bool {
        if !keyframe {
            return false;
        }
        self.cue_points.insert(timestamp, offset);
        trace!("video cue point at {}ms -> offset {}", timestamp, offset);
        true
    }

    /// Read `size` payload bytes into a padded audio frame
    pub fn read_audio_frame(
        &mut self,
        ctx: &ParserContext,
        size: u32,
        timestamp: u32,
    ) -> Result<EncodedAudioFrame> {
        let data = self.read_payload(ctx, size)?;
        Ok(EncodedAudioFrame::new(data, timestamp))
    }

    /// Read `size` payload bytes into a padded video frame and number it.
    ///
    /// Sequence headers consume a number too.
    pub fn read_video_frame(
        &mut self,
        ctx: &ParserContext,
        size: u32,
        timestamp: u32,
    ) -> Result<EncodedVideoFrame> {
        let data = self.read_payload(ctx, size)?;
        let frame = EncodedVideoFrame::new(data, timestamp, self.video_frame_count);
        self.video_frame_count = self.video_frame_count.wrapping_add(1);
        Ok(frame)
    }

    /// A short read keeps what arrived; the rest stays zero.
    fn read_payload(&mut self, ctx: &ParserContext, size: u32) -> Result<Buffer> {
        let size = size as usize;
        let mut buf = BufferRef::zeroed(size, ctx.config().padding_bytes);
        let read = self.source.read(&mut buf.as_mut()[..size])?;
        if read < size {
            warn!("could only read {}/{} bytes of tag payload", read, size);
        }
        Ok(buf.freeze(read))
    }

    fn mark_complete(&mut self, ctx: &ParserContext, index_only: bool) {
        if index_only {
            debug!("indexing complete at offset {}", self.next_pos_to_index);
            ctx.set_indexing_complete();
        } else {
            debug!("parsing complete at offset {}", self.last_parsed_position);
            ctx.set_parsing_complete(true);
            if self.next_pos_to_index <= self.last_parsed_position {
                ctx.set_indexing_complete();
            }
        }
    }

    fn warn_unadvertised(&mut self, kind: MediaType) {
        let (advertised, warned) = match kind {
            MediaType::Audio => (self.header.has_audio, &mut self.warned_audio),
            _ => (self.header.has_video, &mut self.warned_video),
        };
        if !advertised && !*warned {
            warn!("{} tag found in a file whose header advertises no {} stream", kind, kind);
            *warned = true;
        }
    }

    fn check_trailing_size(&mut self, tag: &FlvTagHeader) {
        let mut bytes = [0u8; PREV_TAG_SIZE_LEN];
        match self.source.read(&mut bytes) {
            Ok(PREV_TAG_SIZE_LEN) => {
                let trailing = u32::from_be_bytes(bytes);
                let expected = tag.expected_trailing_size();
                if trailing != expected {
                    warn!(
                        "trailing tag size {} does not match header size {} + 11",
                        trailing, tag.data_size
                    );
                }
            }
            Ok(_) => trace!("no trailing size after last tag"),
            Err(e) => debug!("could not read trailing size: {}", e),
        }
    }

    fn parse_tag(
        &mut self,
        ctx: &ParserContext,
        tag: &FlvTagHeader,
        offset: u64,
        do_index: bool,
        index_only: bool,
    ) -> Result<ParseStep> {
        match tag.kind() {
            Some(FlvTagType::Audio) => self.parse_audio_tag(ctx, tag, offset, do_index, index_only),
            Some(FlvTagType::Video) => self.parse_video_tag(ctx, tag, offset, do_index, index_only),
            Some(FlvTagType::ScriptData) if index_only => Ok(ParseStep::Advanced),
            Some(FlvTagType::ScriptData) => self.parse_script_tag(ctx, tag),
            None => {
                error!("unknown FLV tag type {} at offset {}", tag.tag_type, offset);
                Ok(ParseStep::Skipped(tag.tag_type))
            }
        }
    }

    fn parse_audio_tag(
        &mut self,
        ctx: &ParserContext,
        tag: &FlvTagHeader,
        offset: u64,
        do_index: bool,
        index_only: bool,
    ) -> Result<ParseStep> {
        let flags = AudioFlags::from_byte(tag.first_byte);
        self.warn_unadvertised(MediaType::Audio);

        if do_index {
            self.index_audio_tag(ctx, tag.timestamp, offset);
        }
        if index_only {
            return Ok(ParseStep::Advanced);
        }

        let mut remaining = tag.data_size - 1;
        let mut sequence_header = false;
        if flags.codec_header_len() > 0 {
            if remaining < flags.codec_header_len() {
                warn!("audio tag at offset {} too short for its codec header", offset);
                return Ok(ParseStep::Advanced);
            }
            sequence_header = self.source.read_byte()? == SEQUENCE_HEADER;
            remaining -= flags.codec_header_len();
        }

        let frame = self.read_audio_frame(ctx, remaining, tag.timestamp)?;
        self.check_trailing_size(tag);

        if ctx.audio_info().is_none() {
            let info = AudioInfo {
                codec_id: flags.codec_id,
                sample_rate: flags.sample_rate,
                sample_size: flags.sample_size,
                stereo: flags.stereo,
                duration: 0,
                extra: sequence_header.then(|| ExtraInfo::Flv(frame.data().clone())),
            };
            debug!("audio stream: {}", info);
            ctx.set_audio_info(info);
        } else if sequence_header {
            debug!("ignoring repeated audio sequence header at {}ms", tag.timestamp);
        }

        if sequence_header {
            return Ok(ParseStep::Advanced);
        }
        trace!("audio frame at {}ms, {} bytes", tag.timestamp, frame.size());
        Ok(ParseStep::Audio(frame))
    }

    fn parse_video_tag(
        &mut self,
        ctx: &ParserContext,
        tag: &FlvTagHeader,
        offset: u64,
        do_index: bool,
        index_only: bool,
    ) -> Result<ParseStep> {
        let flags = VideoFlags::from_byte(tag.first_byte);
        self.warn_unadvertised(MediaType::Video);

        if do_index {
            self.index_video_tag(tag.timestamp, offset, flags.is_keyframe());
        }
        if index_only {
            return Ok(ParseStep::Advanced);
        }

        let mut remaining = tag.data_size - 1;
        let header_len = flags.codec_header_len();
        let mut sequence_header = false;
        if header_len > 0 {
            if remaining < header_len {
                warn!("video tag at offset {} too short for its codec header", offset);
                return Ok(ParseStep::Advanced);
            }
            let mut codec_header = [0u8; 4];
            let wanted = header_len as usize;
            if self.source.read(&mut codec_header[..wanted])? < wanted {
                return Err(Error::EndOfStream);
            }
            sequence_header = flags.has_packet_type() && codec_header[0] == SEQUENCE_HEADER;
            remaining -= header_len;
        }

        let frame = self
            .read_video_frame(ctx, remaining, tag.timestamp)?
            .with_keyframe(flags.is_keyframe());
        self.check_trailing_size(tag);

        if ctx.video_info().is_none() {
            let (width, height) =
                probe_dimensions(flags.codec(), frame.data().as_slice()).unwrap_or((0, 0));
            let info = VideoInfo {
                codec_id: flags.codec_id,
                width,
                height,
                frame_rate: 0,
                duration: 0,
                extra: sequence_header.then(|| ExtraInfo::Flv(frame.data().clone())),
            };
            debug!("video stream: {}", info);
            ctx.set_video_info(info);
        } else if sequence_header {
            debug!("ignoring repeated video sequence header at {}ms", tag.timestamp);
        }

        if sequence_header {
            return Ok(ParseStep::Advanced);
        }
        trace!("{}", frame);
        Ok(ParseStep::Video(frame))
    }

    fn parse_script_tag(&mut self, ctx: &ParserContext, tag: &FlvTagHeader) -> Result<ParseStep> {
        if tag.first_byte != AMF0_STRING_MARKER {
            warn!(
                "script data at {}ms starts with AMF0 marker {:#04x}, not a string",
                tag.timestamp, tag.first_byte
            );
        }

        let size = tag.data_size as usize;
        let mut body = BufferRef::zeroed(size, 0);
        body.as_mut()[0] = tag.first_byte;
        let read = self.source.read(&mut body.as_mut()[1..size])?;
        if read < size - 1 {
            warn!("could only read {}/{} bytes of script data", read + 1, size);
            return Err(Error::Truncated {
                need: size,
                have: read + 1,
            });
        }
        let body = body.freeze(size);

        if size >= 3 && read_u24(&body.as_slice()[size - 3..]) != AMF0_OBJECT_END {
            warn!("script data at {}ms lacks an AMF0 object end marker", tag.timestamp);
        }
        self.check_trailing_size(tag);

        debug!("script data at {}ms, {} bytes", tag.timestamp, size);
        ctx.insert_meta_tag(tag.timestamp, body);
        Ok(ParseStep::Advanced)
    }
}

/// Buffering engine over an FLV stream
pub type FlvMediaParser<S> = MediaParser<FlvParser<S>>;

impl<S: ByteSource + 'static> MediaParser<FlvParser<S>> {
    /// Validate the FLV header of `source` and start buffering it
    pub fn open_flv(source: S, config: ParserConfig) -> Result<Self> {
        MediaParser::new(FlvParser::new(source)?, config)
    }
}

impl<S: ByteSource + 'static> ContainerParser for FlvParser<S> {
    fn parse_next_tag(&mut self, ctx: &ParserContext, index_only: bool) -> ParseStep {
        if ctx.parsing_completed() || (index_only && ctx.indexing_completed()) {
            return ParseStep::Idle;
        }

        let offset = if index_only {
            self.next_pos_to_index
        } else {
            self.last_parsed_position
        };

        if let Err(e) = self.source.seek(offset + PREV_TAG_SIZE_LEN as u64) {
            debug!("cannot seek to tag at offset {}: {}", offset, e);
            self.mark_complete(ctx, index_only);
            return ParseStep::Idle;
        }

        let mut prefix = [0u8; TAG_PREFIX_SIZE];
        let read = match self.source.read(&mut prefix) {
            Ok(n) => n,
            Err(e) => {
                warn!("reading tag at offset {} failed: {}", offset, e);
                0
            }
        };
        let tag = match FlvTagHeader::parse(&prefix[..read]) {
            Ok(tag) => tag,
            Err(_) => {
                if read > 0 {
                    error!(
                        "can't read tag info (needed {} bytes, only got {})",
                        TAG_PREFIX_SIZE, read
                    );
                }
                self.mark_complete(ctx, index_only);
                ctx.update_bytes_loaded(self.source.tell());
                return ParseStep::Idle;
            }
        };

        let advance = tag_advance(tag.data_size);
        let do_index = if index_only {
            self.next_pos_to_index += advance;
            ctx.update_bytes_loaded(self.next_pos_to_index);
            true
        } else {
            self.last_parsed_position += advance;
            ctx.update_bytes_loaded(self.last_parsed_position);
            let lagging =
                self.last_parsed_position + ctx.config().index_lag_bytes > self.next_pos_to_index;
            if lagging {
                self.next_pos_to_index = self.last_parsed_position;
            }
            lagging
        };

        if tag.data_size == 0 {
            debug!("empty tag of type {} at offset {}", tag.tag_type, offset);
            return ParseStep::Advanced;
        }

        match self.parse_tag(ctx, &tag, offset, do_index, index_only) {
            Ok(step) => step,
            Err(e) if e.is_end_of_stream() => {
                debug!("stream ended inside tag at offset {}: {}", offset, e);
                self.mark_complete(ctx, index_only);
                ParseStep::Idle
            }
            Err(e) => {
                error!("reading tag at offset {} failed: {}", offset, e);
                self.mark_complete(ctx, index_only);
                ParseStep::Idle
            }
        }
    }

    fn find_cue_point(&self, time: u32) -> Option<CuePoint> {
        self.cue_points.lower_bound(time)
    }

    fn reposition(&mut self, offset: u64) {
        self.last_parsed_position = offset;
    }

    fn position(&self) -> u64 {
        self.last_parsed_position
    }

    fn cue_points(&self) -> Vec<CuePoint> {
        self.cue_points.to_vec()
    }

    fn has_audio(&self) -> bool {
        self.header.has_audio
    }

    fn has_video(&self) -> bool {
        self.header.has_video
    }

    fn bytes_total(&self) -> Option<u64> {
        self.source.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::flv::tag::FrameType;
    use crate::format::flv::{FlvAudioCodec, FlvVideoCodec, FlvWriter};
    use crate::io::ReadSeekSource;
    use crate::media::TimedFrame;

    fn context() -> ParserContext {
        ParserContext::new(ParserConfig::default())
    }

    fn parser(bytes: Vec<u8>) -> FlvParser<ReadSeekSource<std::io::Cursor<Vec<u8>>>> {
        FlvParser::new(ReadSeekSource::from_bytes(bytes)).unwrap()
    }

    fn video_file(keyframes: &[(u32, bool)]) -> Vec<u8> {
        let mut w = FlvWriter::new(Vec::new(), true, false);
        w.write_header().unwrap();
        for &(ts, key) in keyframes {
            let ft = if key { FrameType::Key } else { FrameType::Inter };
            w.write_video(VideoFlags::new(ft, FlvVideoCodec::VP6), &[0xAB; 16], ts)
                .unwrap();
        }
        w.into_inner().unwrap()
    }

    #[test]
    fn test_bad_magic() {
        let result = FlvParser::new(ReadSeekSource::from_bytes(b"FLX\x01\x05\0\0\0\x09".to_vec()));
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_short_header() {
        let result = FlvParser::new(ReadSeekSource::from_bytes(b"FLV\x01".to_vec()));
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_header_only_file_completes() {
        let mut p = parser(video_file(&[]));
        let ctx = context();
        assert!(matches!(p.parse_next_tag(&ctx, false), ParseStep::Idle));
        assert!(ctx.parsing_completed());
        assert_eq!(ctx.bytes_loaded(), 13);
        assert!(p.cue_points().is_empty());
    }

    #[test]
    fn test_video_frames_and_cursor() {
        let mut p = parser(video_file(&[(0, true), (40, false)]));
        let ctx = context();

        let frame = match p.parse_next_tag(&ctx, false) {
            ParseStep::Video(frame) => frame,
            other => panic!("expected video, got {:?}", other),
        };
        assert_eq!(frame.timestamp(), 0);
        assert_eq!(frame.frame_num(), 0);
        // flags byte and VP6 adjustment byte are stripped
        assert_eq!(frame.size(), 16);
        assert!(frame.data().padded_slice()[16..24].iter().all(|&b| b == 0));
        // 9 + 4 + 11 + 18
        assert_eq!(p.position(), 9 + 15 + 18);

        match p.parse_next_tag(&ctx, false) {
            ParseStep::Video(frame) => assert_eq!(frame.frame_num(), 1),
            other => panic!("expected video, got {:?}", other),
        }
        assert!(matches!(p.parse_next_tag(&ctx, false), ParseStep::Idle));
        assert!(ctx.parsing_completed());
        assert_eq!(p.cue_points(), vec![CuePoint { timestamp: 0, offset: 9 }]);
        assert_eq!(ctx.video_info().map(|i| i.codec_id), Some(4));
    }

    #[test]
    fn test_index_only_scans_ahead() {
        let mut p = parser(video_file(&[(0, true), (500, false), (1000, true)]));
        let ctx = context();
        for _ in 0..3 {
            assert!(matches!(p.parse_next_tag(&ctx, true), ParseStep::Advanced));
        }
        assert!(matches!(p.parse_next_tag(&ctx, true), ParseStep::Idle));
        assert!(ctx.indexing_completed());
        assert!(!ctx.parsing_completed());
        assert_eq!(p.position(), 9);
        assert!(ctx.video_info().is_none());

        let cues: Vec<u32> = p.cue_points().iter().map(|c| c.timestamp).collect();
        assert_eq!(cues, vec![0, 1000]);
        assert_eq!(p.find_cue_point(1).map(|c| c.offset), Some(9 + 2 * 33));
    }

    #[test]
    fn test_aac_sequence_header_becomes_extra() {
        let mut w = FlvWriter::new(Vec::new(), false, true);
        w.write_header().unwrap();
        let flags = AudioFlags::new(FlvAudioCodec::AAC, 44100, 2, true);
        w.write_aac_sequence_header(flags, &[0x12, 0x10], 0).unwrap();
        w.write_audio(flags, &[1, 2, 3, 4], 0).unwrap();
        let mut p = parser(w.into_inner().unwrap());
        let ctx = context();

        assert!(matches!(p.parse_next_tag(&ctx, false), ParseStep::Advanced));
        let info = ctx.audio_info().unwrap();
        let extra = info.extra.as_ref().and_then(ExtraInfo::as_flv).unwrap();
        assert_eq!(extra.as_slice(), &[0x12, 0x10]);

        match p.parse_next_tag(&ctx, false) {
            ParseStep::Audio(frame) => assert_eq!(frame.data().as_slice(), &[1, 2, 3, 4]),
            other => panic!("expected audio, got {:?}", other),
        }
    }

    #[test]
    fn test_audio_indexed_sparsely_without_video() {
        let mut w = FlvWriter::new(Vec::new(), false, true);
        w.write_header().unwrap();
        let flags = AudioFlags::new(FlvAudioCodec::MP3, 44100, 2, true);
        for ts in (0..12_000).step_by(1000) {
            w.write_audio(flags, &[0u8; 4], ts).unwrap();
        }
        let mut p = parser(w.into_inner().unwrap());
        let ctx = context();
        while p.parse_next_tag(&ctx, false).made_progress() {}

        let cues: Vec<u32> = p.cue_points().iter().map(|c| c.timestamp).collect();
        assert_eq!(cues, vec![0, 5000, 10000]);
    }

    #[test]
    fn test_unknown_tag_skipped() {
        let mut w = FlvWriter::new(Vec::new(), true, false);
        w.write_header().unwrap();
        w.write_raw_tag(0x0F, &[1, 2, 3], 0, 14).unwrap();
        w.write_video(VideoFlags::new(FrameType::Key, FlvVideoCodec::H263), &[0; 8], 40)
            .unwrap();
        let mut p = parser(w.into_inner().unwrap());
        let ctx = context();

        assert!(matches!(p.parse_next_tag(&ctx, false), ParseStep::Skipped(0x0F)));
        match p.parse_next_tag(&ctx, false) {
            ParseStep::Video(frame) => assert_eq!(frame.timestamp(), 40),
            other => panic!("expected video, got {:?}", other),
        }
    }

    #[test]
    fn test_script_data_stored() {
        use crate::format::flv::{Amf0Value, ScriptData};

        let mut w = FlvWriter::new(Vec::new(), false, false);
        w.write_header().unwrap();
        let script = ScriptData::new(
            "onMetaData",
            Amf0Value::EcmaArray(vec![("duration".into(), Amf0Value::Number(3.0))]),
        );
        w.write_script_data(&script, 0).unwrap();
        let mut p = parser(w.into_inner().unwrap());
        let ctx = context();

        assert!(matches!(p.parse_next_tag(&ctx, false), ParseStep::Advanced));
        let tags = ctx.fetch_meta_tags(0);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].decode().unwrap(), script);
    }
}
