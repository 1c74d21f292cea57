//! [`AudioClip`] — the encoded recording handed to a transcription path.
//!
//! A clip is always 16 kHz mono f32 PCM (the recorder converts on stop).
//! The local path feeds the samples straight into whisper; the remote path
//! wraps them in a 16-bit WAV container via [`AudioClip::to_wav_bytes`].

use std::io::Cursor;

// ---------------------------------------------------------------------------
// AudioClip
// ---------------------------------------------------------------------------

/// A finished recording, ready for transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioClip {
    /// Wrap mono PCM samples at `sample_rate` Hz.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Mono PCM samples in `[-1.0, 1.0]`.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Clip length in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Encode the clip as a mono 16-bit PCM WAV file in memory.
    ///
    /// Samples are clamped to `[-1.0, 1.0]` before quantisation so an
    /// overdriven microphone cannot wrap around.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>, hound::Error> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &s in &self.samples {
                let clamped = s.clamp(-1.0, 1.0);
                writer.write_sample((clamped * i16::MAX as f32) as i16)?;
            }
            writer.finalize()?;
        }

        Ok(cursor.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
