//! PCM buffers and the WAV container codec.
//!
//! Samples are `f32` in `-1.0..=1.0` regardless of the bit depth they were
//! decoded from. Encoding always produces 16-bit integer PCM.

use std::io::Cursor;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Sample rate the enhancement model operates at.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Mono PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Decoded audio with channels still interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct InterleavedAudio {
    pub channels: u16,
    pub sample_rate: u32,
    /// `frames * channels` samples, frame-major.
    pub samples: Vec<f32>,
}

impl InterleavedAudio {
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }
}

/// Decode a WAV file held in memory.
///
/// Integer PCM of any width hound supports and 32-bit float PCM are
/// accepted.
pub fn decode_wav(bytes: &[u8]) -> Result<InterleavedAudio, hound::Error> {
    let mut reader = WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 2f32.powi(i32::from(spec.bits_per_sample) - 1);
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(InterleavedAudio {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        samples,
    })
}

/// Decode a WAV file that must be mono.
pub fn decode_mono_wav(bytes: &[u8]) -> Result<AudioBuffer, crate::EnhanceError> {
    let audio = decode_wav(bytes)?;
    if audio.channels != 1 {
        return Err(crate::EnhanceError::MalformedOutput(format!(
            "expected mono audio, got {} channels",
            audio.channels
        )));
    }
    Ok(AudioBuffer::new(audio.samples, audio.sample_rate))
}

/// Encode mono audio as a 16-bit PCM WAV file.
pub fn encode_wav(audio: &AudioBuffer) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + audio.samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in &audio.samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * f32::from(i16::MAX)) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
