//! Altitude from pressure, relative to a fixed baseline.

/// Standard atmosphere temperature lapse rate, in K/m.
const LAPSE_RATE: f32 = 0.0065;
/// Ideal gas constant, in J/(mol·K).
const GAS_CONSTANT: f32 = 8.314;
/// Gravitational acceleration, in m/s².
const GRAVITY: f32 = 9.80665;
/// Molar mass of dry air, in kg/mol.
const MOLAR_MASS_AIR: f32 = 0.028964;

/// Exponent of the barometric formula, R·L / (g·M).
const BAROMETRIC_EXPONENT: f32 = GAS_CONSTANT * LAPSE_RATE / (GRAVITY * MOLAR_MASS_AIR);

/// Offset from degrees Celsius to Kelvin.
pub(crate) const KELVIN_OFFSET: f32 = 273.15;

/// Altitude in meters of `pressure_hpa` relative to the location where the
/// baseline pair was captured.
///
/// `baseline_temperature_k` is the baseline temperature in Kelvin. The
/// result is zero at the baseline location, positive above it.
pub fn estimate_altitude(
    pressure_hpa: f32,
    baseline_pressure_hpa: f32,
    baseline_temperature_k: f32,
) -> f32 {
    (baseline_temperature_k / LAPSE_RATE)
        * (1.0 - (pressure_hpa / baseline_pressure_hpa).powf(BAROMETRIC_EXPONENT))
}
