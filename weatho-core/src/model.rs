use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Result, WeatherError};

/// Geographic coordinate, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    lat: f64,
    lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);

        if !valid {
            return Err(WeatherError::InvalidLocation { lat, lon });
        }

        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    /// `lat,lon` with both coordinates at full precision.
    pub fn coordinates(&self) -> String {
        format!("{},{}", format_coordinate(self.lat), format_coordinate(self.lon))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.coordinates())
    }
}

/// Shortest round-trip representation, in the same shape as the file names
/// of existing caches: a trailing `.0` on integral values (`45.0`) and
/// scientific notation with a two-digit exponent below 1e-4 (`5e-05`).
pub(crate) fn format_coordinate(value: f64) -> String {
    if value.fract() == 0.0 {
        return format!("{value:.1}");
    }
    if value.abs() >= 1e-4 {
        return format!("{value}");
    }

    let sci = format!("{value:e}");
    match sci.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => sci,
    }
}

/// What point in time a request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moment {
    /// Live conditions plus the provider's forecast for today.
    Current,
    At(DateTime<Utc>),
}

impl Moment {
    /// Instant used to request a whole calendar day when the location's zone
    /// is not known yet.
    ///
    /// Noon UTC lands on the same local date for any offset strictly within
    /// 12 hours; see [`Moment::local_noon`] for the other zones.
    pub fn day(date: NaiveDate) -> Self {
        Moment::At(date.and_time(noon()).and_utc())
    }

    /// Noon of `date` on the wall clock of `tz`.
    ///
    /// Falls back to [`Moment::day`] for a date the zone skipped entirely.
    pub fn local_noon(date: NaiveDate, tz: Tz) -> Self {
        match tz.from_local_datetime(&date.and_time(noon())).earliest() {
            Some(local) => Moment::At(local.with_timezone(&Utc)),
            None => Moment::day(date),
        }
    }

    /// Provider-native epoch seconds, or `None` for [`Moment::Current`].
    pub fn epoch_seconds(&self) -> Option<i64> {
        match self {
            Moment::Current => None,
            Moment::At(dt) => Some(dt.timestamp()),
        }
    }
}

fn noon() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default()
}

impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Moment::Current => f.write_str("current conditions"),
            Moment::At(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M UTC")),
        }
    }
}

/// One day of provider data, exactly as returned over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawDay(Map<String, Value>);

impl RawDay {
    pub fn new(document: Map<String, Value>) -> Self {
        Self(document)
    }

    /// Wraps a parsed document, rejecting anything that is not a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Follows `path` through nested objects.
    pub fn get_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter().try_fold(self.0.get(*first)?, |value, key| value.get(key))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Canonical, provider-independent field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Time,
    Temperature,
    Humidity,
    Pressure,
    WindSpeed,
    WindGust,
    WindDirection,
    Rain,
    Visibility,
    Clouds,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 10] = [
        CanonicalField::Time,
        CanonicalField::Temperature,
        CanonicalField::Humidity,
        CanonicalField::Pressure,
        CanonicalField::WindSpeed,
        CanonicalField::WindGust,
        CanonicalField::WindDirection,
        CanonicalField::Rain,
        CanonicalField::Visibility,
        CanonicalField::Clouds,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::Time => "t",
            CanonicalField::Temperature => "T",
            CanonicalField::Humidity => "RH",
            CanonicalField::Pressure => "P",
            CanonicalField::WindSpeed => "wind speed",
            CanonicalField::WindGust => "wind gust",
            CanonicalField::WindDirection => "wind direction",
            CanonicalField::Rain => "rain",
            CanonicalField::Visibility => "visibility",
            CanonicalField::Clouds => "clouds",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single normalized reading.
///
/// Units: °C, %, km/h, degrees, mm/h. Missing readings are `None`, except
/// rain which defaults to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPoint {
    pub t: DateTime<FixedOffset>,
    #[serde(rename = "T")]
    pub temperature: Option<f64>,
    #[serde(rename = "RH")]
    pub humidity: Option<f64>,
    #[serde(rename = "P")]
    pub pressure: Option<f64>,
    #[serde(rename = "wind speed")]
    pub wind_speed: Option<f64>,
    #[serde(rename = "wind gust")]
    pub wind_gust: Option<f64>,
    #[serde(rename = "wind direction")]
    pub wind_direction: Option<f64>,
    pub rain: f64,
    pub visibility: Option<f64>,
    pub clouds: Option<f64>,
}

impl CanonicalPoint {
    /// Numeric value of `field`; `None` for [`CanonicalField::Time`].
    pub fn value(&self, field: CanonicalField) -> Option<f64> {
        match field {
            CanonicalField::Time => None,
            CanonicalField::Temperature => self.temperature,
            CanonicalField::Humidity => self.humidity,
            CanonicalField::Pressure => self.pressure,
            CanonicalField::WindSpeed => self.wind_speed,
            CanonicalField::WindGust => self.wind_gust,
            CanonicalField::WindDirection => self.wind_direction,
            CanonicalField::Rain => Some(self.rain),
            CanonicalField::Visibility => self.visibility,
            CanonicalField::Clouds => self.clouds,
        }
    }
}

/// Column-oriented time series; every vector has the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSeries {
    pub t: Vec<DateTime<FixedOffset>>,
    #[serde(rename = "T")]
    pub temperature: Vec<Option<f64>>,
    #[serde(rename = "RH")]
    pub humidity: Vec<Option<f64>>,
    #[serde(rename = "P")]
    pub pressure: Vec<Option<f64>>,
    #[serde(rename = "wind speed")]
    pub wind_speed: Vec<Option<f64>>,
    #[serde(rename = "wind gust")]
    pub wind_gust: Vec<Option<f64>>,
    #[serde(rename = "wind direction")]
    pub wind_direction: Vec<Option<f64>>,
    pub rain: Vec<f64>,
    pub visibility: Vec<Option<f64>>,
    pub clouds: Vec<Option<f64>>,
}

impl CanonicalSeries {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn push(&mut self, point: CanonicalPoint) {
        self.t.push(point.t);
        self.temperature.push(point.temperature);
        self.humidity.push(point.humidity);
        self.pressure.push(point.pressure);
        self.wind_speed.push(point.wind_speed);
        self.wind_gust.push(point.wind_gust);
        self.wind_direction.push(point.wind_direction);
        self.rain.push(point.rain);
        self.visibility.push(point.visibility);
        self.clouds.push(point.clouds);
    }

    /// Appends `other` after the existing entries.
    pub fn append(&mut self, mut other: CanonicalSeries) {
        self.t.append(&mut other.t);
        self.temperature.append(&mut other.temperature);
        self.humidity.append(&mut other.humidity);
        self.pressure.append(&mut other.pressure);
        self.wind_speed.append(&mut other.wind_speed);
        self.wind_gust.append(&mut other.wind_gust);
        self.wind_direction.append(&mut other.wind_direction);
        self.rain.append(&mut other.rain);
        self.visibility.append(&mut other.visibility);
        self.clouds.append(&mut other.clouds);
    }

    /// Row `index` as a point.
    pub fn point(&self, index: usize) -> Option<CanonicalPoint> {
        Some(CanonicalPoint {
            t: *self.t.get(index)?,
            temperature: self.temperature[index],
            humidity: self.humidity[index],
            pressure: self.pressure[index],
            wind_speed: self.wind_speed[index],
            wind_gust: self.wind_gust[index],
            wind_direction: self.wind_direction[index],
            rain: self.rain[index],
            visibility: self.visibility[index],
            clouds: self.clouds[index],
        })
    }

    pub fn points(&self) -> impl Iterator<Item = CanonicalPoint> + '_ {
        (0..self.len()).filter_map(|i| self.point(i))
    }
}

impl FromIterator<CanonicalPoint> for CanonicalSeries {
    fn from_iter<I: IntoIterator<Item = CanonicalPoint>>(iter: I) -> Self {
        let mut series = CanonicalSeries::default();
        for point in iter {
            series.push(point);
        }
        series
    }
}

/// Hourly data for one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub enum DaySeries {
    Hourly(CanonicalSeries),
    /// The provider returned the day without an hourly breakdown.
    NoHourlyData { date: NaiveDate },
}

impl DaySeries {
    /// The hourly series, empty for a day without hourly data.
    pub fn into_series(self) -> CanonicalSeries {
        match self {
            DaySeries::Hourly(series) => series,
            DaySeries::NoHourlyData { .. } => CanonicalSeries::default(),
        }
    }
}

/// Several consecutive days concatenated in date order.
///
/// Days without hourly data contribute no rows, so `series.len()` can be
/// smaller than 24 × days; those dates are listed in `days_without_hourly`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiDaySeries {
    pub series: CanonicalSeries,
    pub days_without_hourly: Vec<NaiveDate>,
}

/// Calendar days selected by a start date plus either an inclusive end date
/// or a number of days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySpan {
    dates: Vec<NaiveDate>,
}

impl DaySpan {
    pub fn single(date: NaiveDate) -> Self {
        Self { dates: vec![date] }
    }

    pub fn days(start: NaiveDate, ndays: u32) -> Self {
        let dates = (0..ndays)
            .filter_map(|offset| start.checked_add_days(Days::new(u64::from(offset))))
            .collect();
        Self { dates }
    }

    pub fn until(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(WeatherError::InvalidSpan(format!(
                "end date {end} is before start date {start}"
            )));
        }
        let ndays = (end - start).num_days() + 1;
        let ndays = u32::try_from(ndays)
            .map_err(|_| WeatherError::InvalidSpan(format!("{ndays} days is too many")))?;
        Ok(Self::days(start, ndays))
    }

    /// `until` and `ndays` are mutually exclusive; neither means one day.
    pub fn from_options(start: NaiveDate, until: Option<NaiveDate>, ndays: Option<u32>) -> Result<Self> {
        match (until, ndays) {
            (None, None) => Ok(Self::single(start)),
            (Some(end), None) => Self::until(start, end),
            (None, Some(n)) => Ok(Self::days(start, n)),
            (Some(_), Some(_)) => Err(WeatherError::InvalidSpan(
                "cannot use `until` and `ndays` at the same time".to_string(),
            )),
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}
