//! Unit conversions for device readings.

use serde::{Deserialize, Serialize};

/// Pressure units. Transducers report in torr.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureUnits {
    Torr,
    Psi,
    Atmosphere,
    Pascal,
    Bar,
}

impl PressureUnits {
    /// How many of `self` make up one torr.
    fn per_torr(self) -> f64 {
        match self {
            PressureUnits::Torr => 1.0,
            PressureUnits::Psi => 0.019_336_78,
            PressureUnits::Atmosphere => 1.0 / 760.0,
            PressureUnits::Pascal => 133.322_368,
            PressureUnits::Bar => 0.001_333_224,
        }
    }

    /// Factor that converts a value in `from` into `to`.
    pub fn conversion(from: PressureUnits, to: PressureUnits) -> f64 {
        to.per_torr() / from.per_torr()
    }

    pub fn convert(value: f64, from: PressureUnits, to: PressureUnits) -> f64 {
        value * Self::conversion(from, to)
    }

    /// Index used for `AccessorData::units`.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Converts every present value, keeping gaps.
pub fn convert_pressure_values(
    values: &[Option<f64>],
    from: PressureUnits,
    to: PressureUnits,
) -> Vec<Option<f64>> {
    let k = PressureUnits::conversion(from, to);
    values.iter().map(|v| v.map(|v| v * k)).collect()
}

/// Weight units. Balances report in grams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightUnits {
    Grams,
    Milligrams,
    Kilograms,
}

impl WeightUnits {
    /// How many of `self` make up one gram.
    pub fn per_gram(self) -> f64 {
        match self {
            WeightUnits::Grams => 1.0,
            WeightUnits::Milligrams => 1000.0,
            WeightUnits::Kilograms => 0.001,
        }
    }

    pub fn convert_grams(self, grams: f64) -> f64 {
        grams * self.per_gram()
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Mass flow units. Meters report in uL/min.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MassFlowUnits {
    UlMin,
    MlMin,
    UlHr,
    MlHr,
}

impl MassFlowUnits {
    /// How many of `self` make up one uL/min.
    fn per_ul_min(self) -> f64 {
        match self {
            MassFlowUnits::UlMin => 1.0,
            MassFlowUnits::MlMin => 0.001,
            MassFlowUnits::UlHr => 60.0,
            MassFlowUnits::MlHr => 0.06,
        }
    }

    /// Factor that converts a value in `from` into `to`.
    pub fn conversion(from: MassFlowUnits, to: MassFlowUnits) -> f64 {
        to.per_ul_min() / from.per_ul_min()
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Temperature units. Probes report in degrees Celsius.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnits {
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnits {
    /// Size of one degree of `self` in Celsius degrees. Applies to
    /// differences (rates of change, noise), not absolute readings.
    pub fn degree_in_celsius(self) -> f64 {
        match self {
            TemperatureUnits::Celsius | TemperatureUnits::Kelvin => 1.0,
            TemperatureUnits::Fahrenheit => 5.0 / 9.0,
        }
    }

    pub fn to_celsius(self, value: f64) -> f64 {
        match self {
            TemperatureUnits::Celsius => value,
            TemperatureUnits::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
            TemperatureUnits::Kelvin => value - 273.15,
        }
    }

    pub fn convert_celsius(self, celsius: f64) -> f64 {
        match self {
            TemperatureUnits::Celsius => celsius,
            TemperatureUnits::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
            TemperatureUnits::Kelvin => celsius + 273.15,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}
