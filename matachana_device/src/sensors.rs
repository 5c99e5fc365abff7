//! Chamber sensor readings and the per-phase setpoints they move toward.

use crate::parameters::Parameters;
use crate::phase::Phase;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const AMBIENT_TEMPERATURE_C: f64 = 25.0;
pub const ATMOSPHERIC_PRESSURE_HPA: f64 = 1013.0;

const VACUUM_PRESSURE_HPA: f64 = 50.0;
const INJECTION_PRESSURE_HPA: f64 = 300.0;
const PREPARING_TEMPERATURE_C: f64 = 30.0;
const COOLED_TEMPERATURE_C: f64 = 35.0;
const STERILANT_PPM: f64 = 200.0;

// Noise amplitude per unit of `sensor_noise`.
const PRESSURE_NOISE_HPA: f64 = 2.0;
const H2O2_NOISE_PPM: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReadings {
    pub temperature_c: f64,
    pub pressure_hpa: f64,
    pub h2o2_ppm: f64,
}

impl Default for SensorReadings {
    fn default() -> Self {
        Self::baseline()
    }
}

impl SensorReadings {
    /// Readings of an idle chamber at room conditions.
    pub fn baseline() -> Self {
        Self {
            temperature_c: AMBIENT_TEMPERATURE_C,
            pressure_hpa: ATMOSPHERIC_PRESSURE_HPA,
            h2o2_ppm: 0.0,
        }
    }

    /// Setpoints reached at the end of `phase`. `None` for phases that hold their readings.
    pub fn phase_target(phase: Phase, params: &Parameters) -> Option<Self> {
        let target = match phase {
            Phase::Preparing => Self {
                temperature_c: PREPARING_TEMPERATURE_C,
                pressure_hpa: VACUUM_PRESSURE_HPA,
                h2o2_ppm: 0.0,
            },
            Phase::Heating => Self {
                temperature_c: params.target_temperature_c,
                pressure_hpa: VACUUM_PRESSURE_HPA,
                h2o2_ppm: 0.0,
            },
            Phase::Sterilizing => Self {
                temperature_c: params.target_temperature_c,
                pressure_hpa: INJECTION_PRESSURE_HPA,
                h2o2_ppm: STERILANT_PPM,
            },
            // Cooling never ends above the temperature it starts from.
            Phase::Cooling => Self {
                temperature_c: COOLED_TEMPERATURE_C.min(params.target_temperature_c),
                pressure_hpa: ATMOSPHERIC_PRESSURE_HPA,
                h2o2_ppm: 0.0,
            },
            Phase::Idle | Phase::Complete | Phase::Fault => return None,
        };
        Some(target)
    }

    /// Linear interpolation between `from` and `to`; `progress` is clamped to `[0, 1]`.
    pub fn lerp(from: &Self, to: &Self, progress: f64) -> Self {
        let t = progress.clamp(0.0, 1.0);
        Self {
            temperature_c: lerp(from.temperature_c, to.temperature_c, t),
            pressure_hpa: lerp(from.pressure_hpa, to.pressure_hpa, t),
            h2o2_ppm: lerp(from.h2o2_ppm, to.h2o2_ppm, t),
        }
    }

    /// Perturb pressure and H2O2 by bounded noise. Temperature stays exact.
    pub fn with_noise<R: Rng + ?Sized>(mut self, amplitude: f64, rng: &mut R) -> Self {
        if amplitude <= 0.0 {
            return self;
        }
        let pressure = PRESSURE_NOISE_HPA * amplitude;
        let h2o2 = H2O2_NOISE_PPM * amplitude;
        self.pressure_hpa += rng.random_range(-pressure..=pressure);
        self.h2o2_ppm = (self.h2o2_ppm + rng.random_range(-h2o2..=h2o2)).max(0.0);
        self
    }
}

fn lerp(v0: f64, v1: f64, t: f64) -> f64 {
    v0 + t * (v1 - v0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_lerp_endpoints_and_clamp() {
        let from = SensorReadings::baseline();
        let to = SensorReadings::phase_target(Phase::Preparing, &Parameters::default()).unwrap();
        assert_eq!(SensorReadings::lerp(&from, &to, 0.0), from);
        assert_eq!(SensorReadings::lerp(&from, &to, 1.0), to);
        assert_eq!(SensorReadings::lerp(&from, &to, 3.0), to);
        let mid = SensorReadings::lerp(&from, &to, 0.5);
        assert_eq!(mid.temperature_c, 27.5);
        assert_eq!(mid.pressure_hpa, 531.5);
    }

    #[test]
    fn test_heating_target_follows_parameter() {
        let params = Parameters {
            target_temperature_c: 60.0,
            ..Parameters::default()
        };
        let target = SensorReadings::phase_target(Phase::Heating, &params).unwrap();
        assert_eq!(target.temperature_c, 60.0);
        assert!(SensorReadings::phase_target(Phase::Complete, &params).is_none());
    }

    #[test]
    fn test_cooling_never_warms_a_cool_chamber() {
        let params = Parameters {
            target_temperature_c: 32.0,
            ..Parameters::default()
        };
        let sterilizing = SensorReadings::phase_target(Phase::Sterilizing, &params).unwrap();
        let cooled = SensorReadings::phase_target(Phase::Cooling, &params).unwrap();
        assert_eq!(cooled.temperature_c, 32.0);
        assert!(cooled.temperature_c <= sterilizing.temperature_c);

        let hot = SensorReadings::phase_target(Phase::Cooling, &Parameters::default()).unwrap();
        assert_eq!(hot.temperature_c, COOLED_TEMPERATURE_C);
    }

    #[test]
    fn test_noise_is_bounded_and_keeps_temperature() {
        let mut rng = StdRng::seed_from_u64(7);
        let base = SensorReadings::baseline();
        for _ in 0..200 {
            let noisy = base.with_noise(1.0, &mut rng);
            assert_eq!(noisy.temperature_c, base.temperature_c);
            assert!((noisy.pressure_hpa - base.pressure_hpa).abs() <= PRESSURE_NOISE_HPA);
            assert!(noisy.h2o2_ppm >= 0.0 && noisy.h2o2_ppm <= H2O2_NOISE_PPM);
        }
        assert_eq!(base.with_noise(0.0, &mut rng), base);
    }
}
