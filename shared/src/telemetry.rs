//! Polled hardware telemetry.

/// Source of a board temperature reading.
///
/// `read_temperature` must not block and returns `None` when the reading fails.
pub trait TemperatureSource {
    fn read_temperature(&mut self) -> Option<f64>;
}

/// Temperature source used when no sensor is present.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTemperature;

impl TemperatureSource for NoTemperature {
    fn read_temperature(&mut self) -> Option<f64> {
        None
    }
}
