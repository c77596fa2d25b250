//! Input conditioning and output validation around the model call.

use clearwave_enhancer::buffer::{decode_wav, InterleavedAudio};
use clearwave_enhancer::{AudioBuffer, TARGET_SAMPLE_RATE};

/// Why audio could not be prepared for, or accepted from, the model.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("could not decode WAV: {0}")]
    Decode(#[from] hound::Error),

    #[error("file contains no audio samples")]
    Empty,

    #[error("unsupported format: {0}")]
    Unsupported(String),

    #[error("{0}")]
    InvalidOutput(String),
}

/// Decode a stored upload into the model's input shape: mono at
/// [`TARGET_SAMPLE_RATE`].
pub fn prepare(bytes: &[u8]) -> Result<AudioBuffer, AudioError> {
    let decoded = decode_wav(bytes)?;
    if decoded.channels == 0 {
        return Err(AudioError::Unsupported("zero channels".into()));
    }
    if decoded.sample_rate == 0 {
        return Err(AudioError::Unsupported("zero sample rate".into()));
    }
    if decoded.frames() == 0 {
        return Err(AudioError::Empty);
    }

    let mono = downmix(&decoded);
    Ok(resample(&mono, TARGET_SAMPLE_RATE))
}

/// Average interleaved channels into one.
pub fn downmix(audio: &InterleavedAudio) -> AudioBuffer {
    let channels = usize::from(audio.channels.max(1));
    if channels == 1 {
        return AudioBuffer::new(audio.samples.clone(), audio.sample_rate);
    }
    let samples = audio
        .samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();
    AudioBuffer::new(samples, audio.sample_rate)
}

/// Linear-interpolation resampler.
pub fn resample(audio: &AudioBuffer, target_rate: u32) -> AudioBuffer {
    if audio.sample_rate == target_rate || audio.samples.is_empty() {
        return AudioBuffer::new(audio.samples.clone(), target_rate);
    }

    let ratio = f64::from(audio.sample_rate) / f64::from(target_rate);
    let out_len = ((audio.samples.len() as f64) / ratio).round().max(1.0) as usize;
    let last = audio.samples.len() - 1;

    let samples = (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            if idx >= last {
                return audio.samples[last];
            }
            let frac = (pos - idx as f64) as f32;
            let a = audio.samples[idx];
            let b = audio.samples[idx + 1];
            a + (b - a) * frac
        })
        .collect();

    AudioBuffer::new(samples, target_rate)
}

/// Check that the model's answer is usable before it is stored.
pub fn validate_output(audio: &AudioBuffer) -> Result<(), AudioError> {
    if audio.is_empty() {
        return Err(AudioError::InvalidOutput("Model returned no audio".into()));
    }
    if audio.sample_rate != TARGET_SAMPLE_RATE {
        return Err(AudioError::InvalidOutput(format!(
            "Model returned audio at {} Hz, expected {TARGET_SAMPLE_RATE} Hz",
            audio.sample_rate
        )));
    }
    if audio.samples.iter().any(|s| !s.is_finite()) {
        return Err(AudioError::InvalidOutput(
            "Model returned non-finite samples".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use hound::{SampleFormat, WavSpec, WavWriter};

    use super::*;

    fn wav(channels: u16, sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn downmix_averages_channels() {
        let audio = InterleavedAudio {
            channels: 2,
            sample_rate: 8_000,
            samples: vec![1.0, 0.0, -0.5, -0.5, 0.2, 0.4],
        };
        let mono = downmix(&audio);
        assert_eq!(mono.sample_rate, 8_000);
        assert_eq!(mono.samples.len(), 3);
        assert!((mono.samples[0] - 0.5).abs() < 1e-6);
        assert!((mono.samples[1] + 0.5).abs() < 1e-6);
        assert!((mono.samples[2] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn resample_halves_length_from_32k() {
        let audio = AudioBuffer::new((0..320).map(|i| i as f32 / 320.0).collect(), 32_000);
        let out = resample(&audio, TARGET_SAMPLE_RATE);
        assert_eq!(out.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(out.samples.len(), 160);
        // Every other input sample survives exactly.
        assert!((out.samples[10] - audio.samples[20]).abs() < 1e-6);
    }

    #[test]
    fn resample_upsamples_by_interpolation() {
        let audio = AudioBuffer::new(vec![0.0, 1.0], 8_000);
        let out = resample(&audio, TARGET_SAMPLE_RATE);
        assert_eq!(out.samples.len(), 4);
        assert!((out.samples[1] - 0.5).abs() < 1e-6);
        assert!((out.samples[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn resample_at_target_is_identity() {
        let audio = AudioBuffer::new(vec![0.1, 0.2, 0.3], TARGET_SAMPLE_RATE);
        assert_eq!(resample(&audio, TARGET_SAMPLE_RATE), audio);
    }

    #[test]
    fn prepare_stereo_44k_yields_mono_16k() {
        let samples: Vec<i16> = (0..4_410).flat_map(|_| [1_000i16, 3_000]).collect();
        let out = prepare(&wav(2, 44_100, &samples)).unwrap();

        assert_eq!(out.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(out.samples.len(), 1_600);
        let expected = 2_000.0 / 32_768.0;
        assert!(out.samples.iter().all(|s| (s - expected).abs() < 1e-4));
    }

    #[test]
    fn prepare_rejects_garbage_and_silence() {
        assert!(matches!(prepare(b"not a wav"), Err(AudioError::Decode(_))));
        assert!(matches!(prepare(&wav(1, 16_000, &[])), Err(AudioError::Empty)));
    }

    #[test]
    fn output_validation() {
        assert!(validate_output(&AudioBuffer::new(vec![0.0], TARGET_SAMPLE_RATE)).is_ok());

        let err = validate_output(&AudioBuffer::new(vec![], TARGET_SAMPLE_RATE)).unwrap_err();
        assert_eq!(err.to_string(), "Model returned no audio");

        assert!(validate_output(&AudioBuffer::new(vec![0.0], 22_050)).is_err());
        assert!(validate_output(&AudioBuffer::new(vec![f32::NAN], TARGET_SAMPLE_RATE)).is_err());
    }
}
