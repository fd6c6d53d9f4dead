//! Media file decoding with Symphonia

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::channel::Sender;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;

use super::{encode_samples, StreamInfo, StreamMessage, StreamSource};
use crate::error::{DecodeError, DecodeResult};
use crate::types::WaveFormat;

/// Decoded audio between two progress reports
const PROGRESS_INTERVAL_MS: f64 = 1000.0;

/// Decodes the audio tracks of a media file
pub struct SymphoniaSource {
    path: PathBuf,
    session: Option<OpenStream>,
}

struct OpenStream {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: Option<TimeBase>,
    output: WaveFormat,
    length_millis: Option<u64>,
}

impl SymphoniaSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            session: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StreamSource for SymphoniaSource {
    fn open(&mut self, stream_index: usize, requested: &WaveFormat) -> DecodeResult<StreamInfo> {
        let file = File::open(&self.path).map_err(|e| DecodeError::open(self.path.display(), e.to_string()))?;
        let file_bytes = file.metadata().ok().map(|m| m.len());
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = self.path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::open(self.path.display(), e.to_string()))?;
        let reader = probed.format;

        let audio_tracks: Vec<_> = reader
            .tracks()
            .iter()
            .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .collect();
        if audio_tracks.is_empty() {
            return Err(DecodeError::no_audio_track());
        }
        let track = audio_tracks
            .get(stream_index)
            .ok_or_else(|| DecodeError::stream_index(stream_index, audio_tracks.len()))?;

        let params = &track.codec_params;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| DecodeError::unsupported("unknown sample rate"))?;
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(2);
        let output = WaveFormat::new(sample_rate, channels, requested.bits_per_sample, requested.is_integer);
        output.validate()?;

        let length_millis = match params.n_frames {
            Some(frames) => Some(frames * 1000 / sample_rate as u64),
            None => {
                let bits = params.bits_per_coded_sample.or(params.bits_per_sample);
                let estimate = estimate_length_millis(file_bytes, sample_rate, channels, bits);
                log::debug!(
                    "{} has no frame count, estimated length {:?} ms",
                    self.path.display(),
                    estimate
                );
                estimate
            }
        };

        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| DecodeError::unsupported(e.to_string()))?;

        log::info!(
            "Opened {} (audio stream {} of {}): {}, {:?} ms",
            self.path.display(),
            stream_index,
            audio_tracks.len(),
            output,
            length_millis
        );

        let track_id = track.id;
        let time_base = params.time_base;
        self.session = Some(OpenStream {
            reader,
            decoder,
            track_id,
            time_base,
            output,
            length_millis,
        });

        Ok(StreamInfo { format: output, length_millis })
    }

    fn run(&mut self, tx: &Sender<StreamMessage>, interrupt: &AtomicBool) {
        let Some(stream) = self.session.as_mut() else {
            let _ = tx.send(StreamMessage::Error(DecodeError::io("stream was not opened")));
            return;
        };

        let rate = stream.output.sample_rate as f64;
        let length_millis = stream.length_millis.unwrap_or(0);
        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut buf_frames = 0u64;
        let mut decoded_frames = 0u64;
        let mut last_progress = f64::NEG_INFINITY;

        loop {
            if interrupt.load(Ordering::Relaxed) {
                log::debug!("Decoding of {} interrupted", self.path.display());
                return;
            }

            let packet = match stream.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => {
                    log::warn!("Error reading packet from {}: {}", self.path.display(), e);
                    let _ = tx.send(StreamMessage::Error(DecodeError::io(e.to_string())));
                    return;
                }
            };

            if packet.track_id() != stream.track_id {
                continue;
            }

            let decoded = match stream.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Error decoding packet: {}", e);
                    continue;
                }
                Err(e) => {
                    let _ = tx.send(StreamMessage::Error(DecodeError::io(e.to_string())));
                    return;
                }
            };

            let frames = decoded.frames() as u64;
            if frames == 0 {
                continue;
            }
            if sample_buf.is_none() || decoded.capacity() as u64 > buf_frames {
                buf_frames = decoded.capacity() as u64;
                sample_buf = Some(SampleBuffer::new(buf_frames, *decoded.spec()));
            }
            let Some(buf) = sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            let start_millis = match stream.time_base {
                Some(tb) => {
                    let time = tb.calc_time(packet.ts());
                    (time.seconds as f64 + time.frac) * 1000.0
                }
                None => decoded_frames as f64 * 1000.0 / rate,
            };
            decoded_frames += frames;

            if start_millis - last_progress >= PROGRESS_INTERVAL_MS {
                last_progress = start_millis;
                let progress = StreamMessage::Progress {
                    position_millis: start_millis.max(0.0) as u64,
                    length_millis,
                };
                if tx.send(progress).is_err() {
                    return;
                }
            }

            let mut data = Vec::with_capacity(buf.samples().len() * stream.output.bytes_per_sample());
            encode_samples(buf.samples().iter().copied(), &stream.output, &mut data);
            let message = StreamMessage::AudioData {
                data,
                format: stream.output,
                start_millis,
                duration_millis: frames as f64 * 1000.0 / rate,
            };
            if tx.send(message).is_err() {
                return;
            }
        }

        let position_millis = decoded_frames * 1000 / stream.output.sample_rate.max(1) as u64;
        let _ = tx.send(StreamMessage::Progress {
            position_millis,
            length_millis: length_millis.max(position_millis),
        });
        let _ = tx.send(StreamMessage::Finished);
        log::info!("Finished decoding {}", self.path.display());
    }
}

/// Length of uncompressed audio filling `file_bytes`
///
/// Container headers make this a slight overestimate. `None` when the coded
/// sample size is unknown (compressed streams).
fn estimate_length_millis(
    file_bytes: Option<u64>,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: Option<u32>,
) -> Option<u64> {
    let bytes_per_second = sample_rate as u64 * channels as u64 * bits_per_sample? as u64 / 8;
    if bytes_per_second == 0 {
        return None;
    }
    Some(file_bytes? * 1000 / bytes_per_second)
}
