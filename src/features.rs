//! Decoded audio features and the decoder seam.
//!
//! The store only depends on the [`Decoder`] trait; [`SymphoniaDecoder`] is
//! the file-backed implementation. Decoded features are immutable once
//! produced and are shared behind `Arc` by the store.

use std::fs::File;
use std::path::Path;

use log::debug;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Decoded mono waveform for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFeatures {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioFeatures {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode failure taxonomy.
///
/// `NoAudioTrack` is the benign kind: the source exists but carries no
/// audio stream, so the item simply stays silent. Everything else is a
/// real failure worth logging.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("no audio track in source")]
    NoAudioTrack,
    #[error("failed to open source: {0}")]
    Open(#[from] std::io::Error),
    #[error("unsupported or unrecognized format: {0}")]
    Unsupported(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Capability contract for producing [`AudioFeatures`] from a source locator.
pub trait Decoder: Send + Sync {
    fn decode(&self, src: &str) -> Result<AudioFeatures, DecodeError>;
}

/// Symphonia-backed decoder for local files.
///
/// Probes by extension hint, picks the first non-null track, tolerates
/// corrupt packets mid-stream, and downmixes interleaved channels to mono.
#[derive(Debug, Default)]
pub struct SymphoniaDecoder;

impl Decoder for SymphoniaDecoder {
    fn decode(&self, src: &str) -> Result<AudioFeatures, DecodeError> {
        decode_file(Path::new(src))
    }
}

fn decode_file(path: &Path) -> Result<AudioFeatures, DecodeError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Unsupported("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Corrupt packet mid-stream, keep going
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        let mut buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        let interleaved = buf.samples();

        if channels <= 1 {
            samples.extend_from_slice(interleaved);
        } else {
            for frame in interleaved.chunks(channels) {
                samples.push(frame.iter().sum::<f32>() / channels as f32);
            }
        }
    }

    debug!(
        "decoded {}: {} samples @ {} Hz ({:.1}s)",
        path.display(),
        samples.len(),
        sample_rate,
        samples.len() as f32 / sample_rate as f32
    );

    Ok(AudioFeatures {
        samples,
        sample_rate,
    })
}
