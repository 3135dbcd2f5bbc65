//! Heuristic voice activity detection.
//!
//! Energy separates sound from silence; zero-crossing rate separates voiced
//! speech (low ZCR) from broadband noise and fricatives (high ZCR). Not a
//! trained classifier.

#[derive(Debug, thiserror::Error)]
pub enum VadError {
    #[error("invalid threshold {name}: {value}")]
    InvalidThreshold { name: &'static str, value: f32 },
}

pub type Result<T> = std::result::Result<T, VadError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    Silence,
    /// Loud enough but too noisy to be speech.
    Noise,
    Voice,
}

impl VadDecision {
    pub fn is_voice(&self) -> bool {
        matches!(self, VadDecision::Voice)
    }
}

/// Measurements behind one decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadAnalysis {
    pub energy: f32,
    /// Not computed for silent chunks.
    pub zcr: Option<f32>,
    pub decision: VadDecision,
}

/// Mean squared amplitude after normalizing to `-1..1`.
pub fn energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|s| {
            let x = *s as f64 / 32768.0;
            x * x
        })
        .sum();
    (sum / samples.len() as f64) as f32
}

/// Mean absolute difference of consecutive signs.
///
/// Zero samples have sign 0, so a full crossing counts 2 and a touch of zero
/// counts 1, matching the `mean(|diff(sign(x))|)` formulation.
pub fn zero_crossing_rate(samples: &[i16]) -> f32 {
    if samples.len() < 2 {
        return 0.0;
    }
    let total: u64 = samples
        .windows(2)
        .map(|w| (sign(w[1]) - sign(w[0])).unsigned_abs() as u64)
        .sum();
    total as f32 / (samples.len() - 1) as f32
}

fn sign(s: i16) -> i8 {
    s.signum() as i8
}

/// Classify one chunk.
///
/// Energy below `energy_threshold` is always silence; otherwise the chunk is
/// voice iff its ZCR is at or below `zcr_threshold`.
pub fn classify(samples: &[i16], energy_threshold: f32, zcr_threshold: f32) -> VadAnalysis {
    let energy = energy(samples);
    if energy < energy_threshold {
        return VadAnalysis {
            energy,
            zcr: None,
            decision: VadDecision::Silence,
        };
    }

    let zcr = zero_crossing_rate(samples);
    let decision = if zcr <= zcr_threshold {
        VadDecision::Voice
    } else {
        VadDecision::Noise
    };

    VadAnalysis {
        energy,
        zcr: Some(zcr),
        decision,
    }
}

pub trait VoiceActivityDetector: Send {
    fn detect(&mut self, chunk: &[i16]) -> VadAnalysis;
    fn reset(&mut self);
}

/// Stateless detector over fixed thresholds.
#[derive(Debug, Clone, Copy)]
pub struct EnergyZcrVad {
    energy_threshold: f32,
    zcr_threshold: f32,
}

impl EnergyZcrVad {
    pub fn new(energy_threshold: f32, zcr_threshold: f32) -> Result<Self> {
        if !energy_threshold.is_finite() || energy_threshold < 0.0 {
            return Err(VadError::InvalidThreshold {
                name: "energy_threshold",
                value: energy_threshold,
            });
        }
        if !zcr_threshold.is_finite() || zcr_threshold < 0.0 {
            return Err(VadError::InvalidThreshold {
                name: "zcr_threshold",
                value: zcr_threshold,
            });
        }
        Ok(Self {
            energy_threshold,
            zcr_threshold,
        })
    }

    pub fn energy_threshold(&self) -> f32 {
        self.energy_threshold
    }

    pub fn zcr_threshold(&self) -> f32 {
        self.zcr_threshold
    }
}

impl VoiceActivityDetector for EnergyZcrVad {
    fn detect(&mut self, chunk: &[i16]) -> VadAnalysis {
        let analysis = classify(chunk, self.energy_threshold, self.zcr_threshold);
        tracing::trace!(
            energy = analysis.energy,
            zcr = ?analysis.zcr,
            decision = ?analysis.decision,
            "vad"
        );
        analysis
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENERGY: f32 = 0.001;
    const ZCR: f32 = 0.35;

    /// Square-ish wave alternating sign every `period` samples.
    fn wave(amplitude: i16, period: usize, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| if (i / period) % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn test_silence_is_never_voice() {
        // Low energy, very low ZCR: would be voice if energy were ignored.
        let quiet = wave(10, 64, 512);
        let analysis = classify(&quiet, ENERGY, ZCR);
        assert_eq!(analysis.decision, VadDecision::Silence);
        assert_eq!(analysis.zcr, None);
    }

    #[test]
    fn test_high_zcr_is_noise() {
        let hiss = wave(8000, 1, 512);
        let analysis = classify(&hiss, ENERGY, ZCR);
        assert_eq!(analysis.decision, VadDecision::Noise);
        assert!(analysis.zcr.unwrap() > ZCR);
    }

    #[test]
    fn test_loud_low_zcr_is_voice() {
        let hum = wave(8000, 32, 512);
        let analysis = classify(&hum, ENERGY, ZCR);
        assert_eq!(analysis.decision, VadDecision::Voice);
        assert!(analysis.energy >= ENERGY);
    }

    #[test]
    fn test_energy_normalization() {
        let full = vec![i16::MIN; 4];
        assert_eq!(energy(&full), 1.0);
        assert_eq!(energy(&[]), 0.0);
    }

    #[test]
    fn test_zcr_counts_sign_steps() {
        // signs: 1, -1, 0, 1 -> |diffs| 2, 1, 1 -> 4 / 3
        let zcr = zero_crossing_rate(&[5, -5, 0, 5]);
        assert!((zcr - 4.0 / 3.0).abs() < 1e-6);
        assert_eq!(zero_crossing_rate(&[5]), 0.0);
    }

    #[test]
    fn test_rejects_invalid_thresholds() {
        assert!(EnergyZcrVad::new(-1.0, ZCR).is_err());
        assert!(EnergyZcrVad::new(ENERGY, f32::NAN).is_err());
        assert!(EnergyZcrVad::new(ENERGY, ZCR).is_ok());
    }

    #[test]
    fn test_detector_matches_classify() {
        let mut vad = EnergyZcrVad::new(ENERGY, ZCR).unwrap();
        let hum = wave(8000, 32, 512);
        assert_eq!(vad.detect(&hum), classify(&hum, ENERGY, ZCR));
    }
}
