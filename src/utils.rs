//! Utility functions for the smoker-mqtt-bridge crate.

/// Convert Celsius to Fahrenheit.
///
/// # Arguments
///
/// * `celsius` - Temperature in degrees Celsius
///
/// # Returns
///
/// Temperature in degrees Fahrenheit
///
/// # Example
///
/// ```
/// use smoker_mqtt_bridge::celsius_to_fahrenheit;
///
/// let fahrenheit = celsius_to_fahrenheit(100.0);
/// assert!((fahrenheit - 212.0).abs() < 0.001);
/// ```
#[inline]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert a reading in tenths of a degree Celsius to Fahrenheit.
#[inline]
pub fn tenths_celsius_to_fahrenheit(tenths: u16) -> f64 {
    celsius_to_fahrenheit(f64::from(tenths) / 10.0)
}

/// Format a temperature with exactly one fractional digit.
///
/// ```
/// use smoker_mqtt_bridge::utils::format_one_decimal;
///
/// assert_eq!(format_one_decimal(212.0), "212.0");
/// assert_eq!(format_one_decimal(32.18), "32.2");
/// ```
pub fn format_one_decimal(value: f64) -> String {
    format!("{:.1}", value)
}
