//! Unit conversions applied once, when reanalysis values enter the crate.

const SECONDS_PER_DAY: f64 = 86_400.0;
const KELVIN_OFFSET: f64 = 273.15;

/// W/m2 averaged over a day to MJ/m2/day
pub fn watts_to_megajoules_per_day(value: f64) -> f64 {
    value * SECONDS_PER_DAY / 1_000_000.0
}

pub fn kelvin_to_celsius(value: f64) -> f64 {
    value - KELVIN_OFFSET
}

/// kg/m2/s precipitation flux to mm/day
pub fn flux_to_millimetres_per_day(value: f64) -> f64 {
    value * SECONDS_PER_DAY
}

/// m/s to km/day
pub fn metres_per_second_to_km_per_day(value: f64) -> f64 {
    value * 86.4
}

pub fn round1(value: f64) -> f64 {
    round_to(value, 1)
}

/// Round the exact binary value to `decimals` places, ties to even.
///
/// Float formatting is exact, so 0.15 (stored just below the half) gives 0.1
/// and the true tie 2.25 gives 2.2.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}
