//! Channel downmix and sample-rate conversion.
//!
//! The STT engine consumes **16 kHz mono `f32`** audio while microphones
//! deliver whatever the device prefers (typically 44.1/48 kHz, often stereo).
//! [`downmix_to_mono`] and [`resample`] bridge that gap at recording-stop
//! time.
//!
//! The resampler is plain linear interpolation, which is plenty for speech
//! input.  `rubato` (`SincFixedIn`) is listed in `Cargo.toml` as the upgrade
//! path should music-grade quality ever be needed.

// ---------------------------------------------------------------------------
// downmix_to_mono
// ---------------------------------------------------------------------------

/// Mix interleaved multi-channel audio down to mono by averaging each frame.
///
/// The output length is `samples.len() / channels`.  Mono input is returned
/// as an owned copy without averaging; zero channels yields an empty vector.
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

// ---------------------------------------------------------------------------
// resample
// ---------------------------------------------------------------------------

/// Resample mono `samples` from `source_rate` Hz to `target_rate` Hz using
/// linear interpolation.
///
/// When `source_rate == target_rate` the input is copied through unchanged.
/// The output length is approximately
/// `samples.len() * target_rate / source_rate`.
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if source_rate == target_rate {
        return samples.to_vec();
    }

    if samples.is_empty() {
        return Vec::new();
    }

    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac as f32) + samples[idx + 1] * frac as f32
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
