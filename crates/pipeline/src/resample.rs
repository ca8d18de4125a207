//! Inline linear PCM resampler.
//!
//! The telephony leg runs at 8 kHz while the STT and TTS services want
//! 16 kHz (and vice versa). This is a deliberately small node: linear
//! interpolation over i16 samples with fractional position carried
//! across chunks, so chunk boundaries do not click. It depends on no
//! audio library internals.

/// Streaming linear resampler between two fixed rates.
#[derive(Debug)]
pub struct LinearResampler {
    ratio: f64,
    /// Fractional read position into the previous + current chunk.
    pos: f64,
    /// Last sample of the previous chunk, for interpolation across
    /// the boundary.
    carry: Option<i16>,
}

impl LinearResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Self {
        Self {
            ratio: input_rate as f64 / output_rate as f64,
            pos: 0.0,
            carry: None,
        }
    }

    /// Resample one chunk, carrying interpolation state to the next.
    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        if input.is_empty() {
            return Vec::new();
        }
        if (self.ratio - 1.0).abs() < f64::EPSILON {
            return input.to_vec();
        }

        // Stitch the carried sample in front so interpolation can cross
        // the chunk boundary.
        let offset = usize::from(self.carry.is_some());
        let mut samples = Vec::with_capacity(input.len() + offset);
        if let Some(c) = self.carry {
            samples.push(c);
        }
        samples.extend_from_slice(input);

        let mut out = Vec::with_capacity((input.len() as f64 / self.ratio) as usize + 2);
        while self.pos + 1.0 < samples.len() as f64 {
            let idx = self.pos as usize;
            let frac = self.pos - idx as f64;
            let a = samples[idx] as f64;
            let b = samples[idx + 1] as f64;
            out.push((a + (b - a) * frac).round() as i16);
            self.pos += self.ratio;
        }

        self.carry = samples.last().copied();
        // Rebase the position onto the next chunk: everything before the
        // carried sample is gone.
        self.pos -= (samples.len() - 1) as f64;

        out
    }

    /// Drop carried state (e.g. on call end).
    pub fn reset(&mut self) {
        self.pos = 0.0;
        self.carry = None;
    }
}
