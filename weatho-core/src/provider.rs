//! The fixed set of supported weather APIs and the per-provider tables that
//! drive address building and normalization.

use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt::Debug};

use crate::model::CanonicalField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    DarkSky,
    #[serde(rename = "owm")]
    OpenWeather,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::DarkSky => "darksky",
            ProviderId::OpenWeather => "owm",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::DarkSky, ProviderId::OpenWeather]
    }

    /// The static configuration record for this provider.
    pub fn spec(&self) -> &'static ProviderSpec {
        match self {
            ProviderId::DarkSky => &DARKSKY,
            ProviderId::OpenWeather => &OPENWEATHER,
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "darksky" => Ok(ProviderId::DarkSky),
            "owm" | "openweather" | "openweathermap" => Ok(ProviderId::OpenWeather),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: darksky, owm."
            )),
        }
    }
}

/// How a provider expects location, time, units and key to be laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressGrammar {
    /// `{base}{key}/{lat},{lon}[,{time}]?units={units}`
    PathEmbedded { base: &'static str, units: &'static str },
    /// `{base}[{history}]?lat=..&lon=..[&dt=..]&appid=..&units=..`
    QueryString {
        base: &'static str,
        history: &'static str,
        units: &'static str,
    },
}

/// Unit or shape conversion applied to one raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Epoch seconds, rendered in the payload's declared timezone.
    Timestamp,
    Number,
    /// A fraction in [0, 1] reported as percent.
    Fraction,
    /// A speed in m/s reported as km/h.
    MetersPerSecond,
    /// Precipitation: a plain rate, or a mapping of accumulation windows
    /// from which the 1 hour bucket is taken. Absent means zero.
    Accumulation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: CanonicalField,
    pub raw_key: &'static str,
    pub conversion: Conversion,
}

const fn field(field: CanonicalField, raw_key: &'static str, conversion: Conversion) -> FieldSpec {
    FieldSpec { field, raw_key, conversion }
}

/// Everything that differs between two providers.
#[derive(Debug)]
pub struct ProviderSpec {
    pub id: ProviderId,
    /// Prefix of cache file names.
    pub file_prefix: &'static str,
    pub grammar: AddressGrammar,
    pub timezone_key: &'static str,
    pub current_key: &'static str,
    pub hourly_path: &'static [&'static str],
    pub fields: &'static [FieldSpec],
}

impl ProviderSpec {
    pub fn time_key(&self) -> Option<&'static str> {
        self.fields
            .iter()
            .find(|f| f.conversion == Conversion::Timestamp)
            .map(|f| f.raw_key)
    }
}

pub static DARKSKY: ProviderSpec = ProviderSpec {
    id: ProviderId::DarkSky,
    file_prefix: "DarkSky",
    // `ca` is SI with wind in km/h
    grammar: AddressGrammar::PathEmbedded {
        base: "https://api.darksky.net/forecast/",
        units: "ca",
    },
    timezone_key: "timezone",
    current_key: "currently",
    hourly_path: &["hourly", "data"],
    fields: &[
        field(CanonicalField::Time, "time", Conversion::Timestamp),
        field(CanonicalField::Temperature, "temperature", Conversion::Number),
        field(CanonicalField::Humidity, "humidity", Conversion::Fraction),
        field(CanonicalField::Pressure, "pressure", Conversion::Number),
        field(CanonicalField::WindSpeed, "windSpeed", Conversion::Number),
        field(CanonicalField::WindGust, "windGust", Conversion::Number),
        field(CanonicalField::WindDirection, "windBearing", Conversion::Number),
        field(CanonicalField::Rain, "precipIntensity", Conversion::Accumulation),
        field(CanonicalField::Visibility, "visibility", Conversion::Number),
        field(CanonicalField::Clouds, "cloudCover", Conversion::Fraction),
    ],
};

pub static OPENWEATHER: ProviderSpec = ProviderSpec {
    id: ProviderId::OpenWeather,
    file_prefix: "OWM",
    grammar: AddressGrammar::QueryString {
        base: "https://api.openweathermap.org/data/2.5/onecall",
        history: "/timemachine",
        units: "metric",
    },
    timezone_key: "timezone",
    current_key: "current",
    hourly_path: &["hourly"],
    fields: &[
        field(CanonicalField::Time, "dt", Conversion::Timestamp),
        field(CanonicalField::Temperature, "temp", Conversion::Number),
        field(CanonicalField::Humidity, "humidity", Conversion::Number),
        field(CanonicalField::Pressure, "pressure", Conversion::Number),
        field(CanonicalField::WindSpeed, "wind_speed", Conversion::MetersPerSecond),
        field(CanonicalField::WindGust, "wind_gust", Conversion::MetersPerSecond),
        field(CanonicalField::WindDirection, "wind_deg", Conversion::Number),
        field(CanonicalField::Rain, "rain", Conversion::Accumulation),
        field(CanonicalField::Visibility, "visibility", Conversion::Number),
        field(CanonicalField::Clouds, "clouds", Conversion::Number),
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn provider_aliases() {
        assert_eq!(ProviderId::try_from("OpenWeatherMap").unwrap(), ProviderId::OpenWeather);
        assert_eq!(ProviderId::try_from("DarkSky").unwrap(), ProviderId::DarkSky);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn every_table_maps_every_canonical_field_once() {
        for id in ProviderId::all() {
            let spec = id.spec();
            assert_eq!(spec.id, *id);
            for canonical in CanonicalField::ALL {
                let count = spec.fields.iter().filter(|f| f.field == canonical).count();
                assert_eq!(count, 1, "{id} maps {canonical} {count} times");
            }
        }
    }

    #[test]
    fn time_keys() {
        assert_eq!(DARKSKY.time_key(), Some("time"));
        assert_eq!(OPENWEATHER.time_key(), Some("dt"));
    }
}
