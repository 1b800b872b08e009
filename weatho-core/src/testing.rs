//! In-memory transport and payload fixtures shared by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use crate::transport::{Transport, TransportError};

type Responder = Box<dyn Fn(&str, usize) -> Result<String, TransportError> + Send + Sync>;

/// Answers every GET through a closure that receives the address and how
/// many times that address was requested before.
pub struct ScriptedTransport {
    responder: Responder,
    delay: Duration,
    seen: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedTransport").field("delay", &self.delay).finish()
    }
}

impl ScriptedTransport {
    pub fn new(responder: impl Fn(&str, usize) -> Result<String, TransportError> + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            seen: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn total_calls(&self) -> usize {
        self.seen.lock().unwrap().values().sum()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, address: &str) -> Result<String, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let attempt = {
            let mut seen = self.seen.lock().unwrap();
            let count = seen.entry(address.to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = (self.responder)(address, attempt);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn server_error() -> TransportError {
    TransportError::Status {
        status: 503,
        body: "unavailable".to_string(),
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn zone(name: &str) -> Tz {
    name.parse().unwrap()
}

fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Tz> {
    tz.from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
        .single()
        .unwrap()
}

/// The instant an address asks for, from its epoch seconds.
pub fn requested_instant(address: &str) -> Option<DateTime<Utc>> {
    let epoch = if let Some((_, rest)) = address.split_once("dt=") {
        rest.split('&').next()?
    } else {
        let path = address.split('?').next()?;
        path.rsplit(',').next()?
    };

    DateTime::from_timestamp(epoch.parse().ok()?, 0)
}

/// The UTC calendar date an address asks for.
pub fn requested_date(address: &str) -> Option<NaiveDate> {
    requested_instant(address).map(|dt| dt.date_naive())
}

/// A DarkSky day in Europe/Paris with `hours` hourly entries.
pub fn darksky_day(date: NaiveDate, hours: usize) -> Value {
    darksky_day_in("Europe/Paris", date, hours)
}

/// A DarkSky day on the local calendar of `timezone`, its current
/// conditions at local noon.
pub fn darksky_day_in(timezone: &str, date: NaiveDate, hours: usize) -> Value {
    let start = local_midnight(zone(timezone), date).timestamp();
    let hourly: Vec<Value> = (0..hours as i64)
        .map(|h| {
            json!({
                "time": start + h * 3600,
                "temperature": 2.0 + h as f64 * 0.5,
                "humidity": 0.8,
                "pressure": 1013.2,
                "windSpeed": 12.0,
                "windGust": 20.5,
                "windBearing": 180,
                "precipIntensity": 0.1,
                "visibility": 16.09,
                "cloudCover": 0.25,
            })
        })
        .collect();

    json!({
        "latitude": 45.0,
        "longitude": 4.0,
        "timezone": timezone,
        "currently": {
            "time": start + 12 * 3600,
            "temperature": 6.0,
            "humidity": 0.6,
            "windSpeed": 10.0,
            "windGust": 18.0,
            "windBearing": 200,
            "cloudCover": 0.1,
        },
        "hourly": { "summary": "Clear", "data": hourly },
        "offset": 1,
    })
}

/// A DarkSky day with the hourly block missing entirely.
pub fn darksky_day_without_hourly(date: NaiveDate) -> Value {
    let mut day = darksky_day(date, 0);
    if let Some(map) = day.as_object_mut() {
        map.remove("hourly");
    }
    day
}

/// An OpenWeatherMap One Call day in Europe/Paris with `hours` entries.
pub fn owm_day(date: NaiveDate, hours: usize) -> Value {
    let start = local_midnight(zone("Europe/Paris"), date).timestamp();
    let hourly: Vec<Value> = (0..hours as i64)
        .map(|h| {
            json!({
                "dt": start + (h + 1) * 3600,
                "temp": 2.0,
                "humidity": 80,
                "pressure": 1013,
                "wind_speed": 5.0,
                "wind_gust": 7.5,
                "wind_deg": 90,
                "rain": { "1h": 0.3 },
                "visibility": 10000,
                "clouds": 40,
            })
        })
        .collect();

    json!({
        "lat": 45.0,
        "lon": 4.0,
        "timezone": "Europe/Paris",
        "timezone_offset": 3600,
        "current": {
            "dt": start + 12 * 3600,
            "temp": 5.0,
            "humidity": 55,
            "wind_speed": 2.5,
            "wind_deg": 45,
            "clouds": 20,
        },
        "hourly": hourly,
    })
}
