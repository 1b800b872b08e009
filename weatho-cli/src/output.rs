use chrono::NaiveDate;
use std::path::Path;
use weatho_core::{CanonicalPoint, CanonicalSeries, DownloadReport};

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".to_string())
}

/// 16 compass points, for wind bearings.
fn compass(degrees: Option<f64>) -> &'static str {
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW", "NNW",
    ];
    match degrees {
        Some(d) if d.is_finite() => {
            let index = ((d.rem_euclid(360.0) / 22.5).round() as usize) % POINTS.len();
            POINTS[index]
        }
        _ => "",
    }
}

pub fn print_point(point: &CanonicalPoint) {
    println!("Time:         {}", point.t.format("%Y-%m-%d %H:%M %:z"));
    println!("Temperature:  {} °C", cell(point.temperature));
    println!("Humidity:     {} %", cell(point.humidity));
    println!("Pressure:     {} hPa", cell(point.pressure));
    println!(
        "Wind:         {} km/h {} (gusts {} km/h)",
        cell(point.wind_speed),
        compass(point.wind_direction),
        cell(point.wind_gust)
    );
    println!("Rain:         {:.1} mm/h", point.rain);
    println!("Clouds:       {} %", cell(point.clouds));
    println!("Visibility:   {}", cell(point.visibility));
}

pub fn print_series(series: &CanonicalSeries) {
    println!(
        "{:<17} {:>6} {:>6} {:>7} {:>6} {:>6} {:>4} {:>5} {:>6}",
        "time", "T", "RH", "P", "wind", "gust", "dir", "rain", "clouds"
    );
    for point in series.points() {
        println!(
            "{:<17} {:>6} {:>6} {:>7} {:>6} {:>6} {:>4} {:>5.1} {:>6}",
            point.t.format("%Y-%m-%d %H:%M"),
            cell(point.temperature),
            cell(point.humidity),
            cell(point.pressure),
            cell(point.wind_speed),
            cell(point.wind_gust),
            compass(point.wind_direction),
            point.rain,
            cell(point.clouds),
        );
    }
}

pub fn print_days_without_hourly(dates: &[NaiveDate]) {
    for date in dates {
        eprintln!("Warning: no hourly data on {date}.");
    }
}

pub fn print_report(report: &DownloadReport, root: &Path) {
    let stored = report.requested.len() - report.missing.len();
    println!(
        "{stored}/{} day(s) stored in {} after {} pass(es).",
        report.requested.len(),
        root.display(),
        report.passes
    );
    for (date, reason) in &report.failures {
        let status = if report.missing.contains(date) { "missing" } else { "recovered" };
        println!("  {date}: {status} ({reason})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_show_dash_for_missing() {
        assert_eq!(cell(None), "-");
        assert_eq!(cell(Some(42.04)), "42.0");
    }

    #[test]
    fn compass_points() {
        assert_eq!(compass(Some(0.0)), "N");
        assert_eq!(compass(Some(359.0)), "N");
        assert_eq!(compass(Some(90.0)), "E");
        assert_eq!(compass(Some(225.0)), "SW");
        assert_eq!(compass(None), "");
    }
}
