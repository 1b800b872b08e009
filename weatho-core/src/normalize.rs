//! Conversion of provider payloads into [`CanonicalPoint`]s.
//!
//! Everything provider-specific comes from the [`ProviderSpec`] field table;
//! nothing in here branches on the provider.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::warn;

use crate::{
    error::{Result, WeatherError},
    model::{CanonicalField, CanonicalPoint, CanonicalSeries, RawDay},
    provider::{Conversion, ProviderSpec},
};

/// Rain bucket used when precipitation is reported per accumulation window.
const RAIN_WINDOW: &str = "1h";

enum Converted {
    Instant(DateTime<FixedOffset>),
    Number(Option<f64>),
}

#[derive(Default)]
struct PointBuilder {
    t: Option<DateTime<FixedOffset>>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    pressure: Option<f64>,
    wind_speed: Option<f64>,
    wind_gust: Option<f64>,
    wind_direction: Option<f64>,
    rain: Option<f64>,
    visibility: Option<f64>,
    clouds: Option<f64>,
}

impl PointBuilder {
    fn set(&mut self, field: CanonicalField, value: Converted) {
        let number = match value {
            Converted::Instant(t) => {
                self.t = Some(t);
                return;
            }
            Converted::Number(n) => n,
        };

        let slot = match field {
            CanonicalField::Time => return,
            CanonicalField::Temperature => &mut self.temperature,
            CanonicalField::Humidity => &mut self.humidity,
            CanonicalField::Pressure => &mut self.pressure,
            CanonicalField::WindSpeed => &mut self.wind_speed,
            CanonicalField::WindGust => &mut self.wind_gust,
            CanonicalField::WindDirection => &mut self.wind_direction,
            CanonicalField::Rain => &mut self.rain,
            CanonicalField::Visibility => &mut self.visibility,
            CanonicalField::Clouds => &mut self.clouds,
        };
        *slot = number;
    }

    fn finish(self, provider: &ProviderSpec) -> Result<CanonicalPoint> {
        let t = self.t.ok_or_else(|| malformed(provider, "point has no timestamp"))?;

        Ok(CanonicalPoint {
            t,
            temperature: self.temperature,
            humidity: self.humidity,
            pressure: self.pressure,
            wind_speed: self.wind_speed,
            wind_gust: self.wind_gust,
            wind_direction: self.wind_direction,
            rain: self.rain.unwrap_or(0.0),
            visibility: self.visibility,
            clouds: self.clouds,
        })
    }
}

/// Normalizes one raw point (a current-conditions object or one hourly
/// entry). Timestamps are rendered in `tz`, the zone declared by the day the
/// point belongs to.
pub fn normalize(raw_point: &Value, provider: &ProviderSpec, tz: Tz) -> Result<CanonicalPoint> {
    let object = raw_point
        .as_object()
        .ok_or_else(|| malformed(provider, "point is not an object"))?;

    let mut builder = PointBuilder::default();
    for spec in provider.fields {
        let value = convert(object.get(spec.raw_key), spec.conversion, tz, provider)?;
        builder.set(spec.field, value);
    }

    builder.finish(provider)
}

fn convert(raw: Option<&Value>, conversion: Conversion, tz: Tz, provider: &ProviderSpec) -> Result<Converted> {
    let number = raw.and_then(Value::as_f64);

    let converted = match conversion {
        Conversion::Timestamp => {
            let secs = raw
                .and_then(epoch_seconds)
                .ok_or_else(|| malformed(provider, "missing or non-numeric timestamp"))?;
            let instant = tz
                .timestamp_opt(secs, 0)
                .single()
                .ok_or_else(|| malformed(provider, &format!("timestamp {secs} out of range")))?;
            Converted::Instant(instant.fixed_offset())
        }
        Conversion::Number => Converted::Number(number),
        Conversion::Fraction => Converted::Number(number.map(|x| x * 100.0)),
        Conversion::MetersPerSecond => Converted::Number(number.map(|x| x * 3.6)),
        Conversion::Accumulation => Converted::Number(Some(accumulation(raw))),
    };

    Ok(converted)
}

fn epoch_seconds(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f.trunc() as i64))
}

fn accumulation(raw: Option<&Value>) -> f64 {
    match raw {
        Some(Value::Object(windows)) => windows.get(RAIN_WINDOW).and_then(Value::as_f64).unwrap_or(0.0),
        Some(value) => value.as_f64().unwrap_or(0.0),
        None => 0.0,
    }
}

/// The IANA timezone the day declares for itself.
pub fn timezone(raw: &RawDay, provider: &ProviderSpec) -> Result<Tz> {
    let name = raw
        .get(provider.timezone_key)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(provider, "missing timezone"))?;

    name.parse::<Tz>()
        .map_err(|e| malformed(provider, &format!("unknown timezone '{name}': {e}")))
}

/// Normalizes the current-conditions object of `raw`.
pub fn normalize_current(raw: &RawDay, provider: &ProviderSpec) -> Result<CanonicalPoint> {
    let tz = timezone(raw, provider)?;
    let current = raw
        .get(provider.current_key)
        .ok_or_else(|| malformed(provider, &format!("missing '{}' object", provider.current_key)))?;

    normalize(current, provider, tz)
}

/// Normalizes every hourly entry of `raw`, or `None` when the day carries no
/// hourly breakdown.
pub fn normalize_hourly(raw: &RawDay, provider: &ProviderSpec) -> Result<Option<CanonicalSeries>> {
    let tz = timezone(raw, provider)?;

    let Some(entries) = raw.get_path(provider.hourly_path).and_then(Value::as_array) else {
        warn!(
            provider = %provider.id,
            day = %describe_day(raw, provider, tz),
            "No hourly data"
        );
        return Ok(None);
    };

    entries
        .iter()
        .map(|entry| normalize(entry, provider, tz))
        .collect::<Result<CanonicalSeries>>()
        .map(Some)
}

/// Local calendar date the day covers: its current-conditions timestamp,
/// read on the wall clock of its declared timezone.
pub fn local_date(raw: &RawDay, provider: &ProviderSpec) -> Result<NaiveDate> {
    let tz = timezone(raw, provider)?;
    local_date_in(raw, provider, tz).ok_or_else(|| {
        malformed(provider, &format!("'{}' object has no usable timestamp", provider.current_key))
    })
}

fn local_date_in(raw: &RawDay, provider: &ProviderSpec, tz: Tz) -> Option<NaiveDate> {
    raw.get(provider.current_key)
        .and_then(|current| current.get(provider.time_key()?))
        .and_then(epoch_seconds)
        .and_then(|secs| tz.timestamp_opt(secs, 0).single())
        .map(|dt| dt.date_naive())
}

fn describe_day(raw: &RawDay, provider: &ProviderSpec, tz: Tz) -> String {
    local_date_in(raw, provider, tz)
        .map(|date| date.to_string())
        .unwrap_or_else(|| "unknown day".to_string())
}

fn malformed(provider: &ProviderSpec, reason: &str) -> WeatherError {
    WeatherError::MalformedPayload {
        provider: provider.id,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DARKSKY, OPENWEATHER};
    use serde_json::json;

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    fn paris() -> Tz {
        "Europe/Paris".parse().unwrap()
    }

    #[test]
    fn darksky_fractions_become_percent() {
        let point = json!({
            "time": 1612393200,
            "temperature": 3.2,
            "humidity": 0.42,
            "cloudCover": 0.5,
            "windSpeed": 12.0,
            "windBearing": 270,
        });

        let out = normalize(&point, &DARKSKY, paris()).unwrap();
        assert!(close(out.humidity, 42.0));
        assert!(close(out.clouds, 50.0));
        // `ca` units already report km/h
        assert!(close(out.wind_speed, 12.0));
        assert!(close(out.wind_direction, 270.0));
        assert!(close(out.temperature, 3.2));
    }

    #[test]
    fn owm_wind_becomes_kmh_and_percent_is_kept() {
        let point = json!({
            "dt": 1612393200,
            "temp": 3.2,
            "humidity": 42,
            "clouds": 75,
            "wind_speed": 5.0,
            "wind_gust": 10.0,
        });

        let out = normalize(&point, &OPENWEATHER, paris()).unwrap();
        assert!(close(out.wind_speed, 18.0));
        assert!(close(out.wind_gust, 36.0));
        assert!(close(out.humidity, 42.0));
        assert!(close(out.clouds, 75.0));
    }

    #[test]
    fn missing_fields_are_none_not_errors() {
        let point = json!({ "time": 1612393200, "temperature": 1.0 });

        let out = normalize(&point, &DARKSKY, paris()).unwrap();
        assert_eq!(out.wind_direction, None);
        assert_eq!(out.humidity, None);
        assert_eq!(out.visibility, None);
        assert_eq!(out.rain, 0.0);
    }

    #[test]
    fn rain_takes_one_hour_bucket() {
        let with_1h = json!({ "dt": 1612393200, "rain": { "1h": 0.8 } });
        let only_3h = json!({ "dt": 1612393200, "rain": { "3h": 2.4 } });

        assert_eq!(normalize(&with_1h, &OPENWEATHER, paris()).unwrap().rain, 0.8);
        assert_eq!(normalize(&only_3h, &OPENWEATHER, paris()).unwrap().rain, 0.0);

        let plain = json!({ "time": 1612393200, "precipIntensity": 1.5 });
        assert_eq!(normalize(&plain, &DARKSKY, paris()).unwrap().rain, 1.5);
    }

    #[test]
    fn timestamp_uses_declared_timezone() {
        let point = json!({ "time": 1612393200 });

        let out = normalize(&point, &DARKSKY, paris()).unwrap();
        assert_eq!(out.t.to_rfc3339(), "2021-02-04T00:00:00+01:00");

        let tokyo: Tz = "Asia/Tokyo".parse().unwrap();
        let out = normalize(&point, &DARKSKY, tokyo).unwrap();
        assert_eq!(out.t.to_rfc3339(), "2021-02-04T08:00:00+09:00");
    }

    #[test]
    fn missing_timestamp_is_malformed() {
        let err = normalize(&json!({ "temperature": 1.0 }), &DARKSKY, paris()).unwrap_err();
        assert!(matches!(err, WeatherError::MalformedPayload { .. }));
    }

    #[test]
    fn hourly_absent_is_none() {
        let raw = RawDay::from_value(json!({
            "timezone": "Europe/Paris",
            "currently": { "time": 1612393200 },
        }))
        .unwrap();

        assert_eq!(normalize_hourly(&raw, &DARKSKY).unwrap(), None);
    }

    #[test]
    fn hourly_and_current_follow_provider_layout() {
        let raw = RawDay::from_value(json!({
            "timezone": "Europe/Paris",
            "current": { "dt": 1612393200, "temp": 2.0 },
            "hourly": [
                { "dt": 1612393200, "temp": 2.0 },
                { "dt": 1612396800, "temp": 2.5 },
            ],
        }))
        .unwrap();

        let series = normalize_hourly(&raw, &OPENWEATHER).unwrap().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.temperature, vec![Some(2.0), Some(2.5)]);

        let current = normalize_current(&raw, &OPENWEATHER).unwrap();
        assert_eq!(current.temperature, Some(2.0));
    }

    #[test]
    fn unknown_timezone_is_malformed() {
        let raw = RawDay::from_value(json!({ "timezone": "Mars/Olympus", "currently": {} })).unwrap();
        let err = normalize_current(&raw, &DARKSKY).unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus"));
    }

    #[test]
    fn local_date_reads_current_time_in_declared_zone() {
        // 2021-07-14 12:00 UTC
        let raw = RawDay::from_value(json!({
            "timezone": "Pacific/Auckland",
            "currently": { "time": 1626264000 },
        }))
        .unwrap();
        assert_eq!(local_date(&raw, &DARKSKY).unwrap(), NaiveDate::from_ymd_opt(2021, 7, 15).unwrap());

        let raw = RawDay::from_value(json!({
            "timezone": "Europe/Paris",
            "current": { "dt": 1626264000 },
        }))
        .unwrap();
        assert_eq!(local_date(&raw, &OPENWEATHER).unwrap(), NaiveDate::from_ymd_opt(2021, 7, 14).unwrap());

        let raw = RawDay::from_value(json!({ "timezone": "Europe/Paris" })).unwrap();
        assert!(matches!(local_date(&raw, &DARKSKY), Err(WeatherError::MalformedPayload { .. })));
    }
}
