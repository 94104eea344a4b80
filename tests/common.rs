// Shared JSON fixtures for provider-facing tests.

use serde_json::json;

/// Body for the current-conditions endpoint.
pub fn current_weather_body(city: &str, country: &str, temp: f64) -> String {
    json!({
        "name": city,
        "dt": chrono::Utc::now().timestamp(),
        "sys": {"country": country, "sunrise": 1752330000, "sunset": 1752388800},
        "main": {"temp": temp, "feels_like": temp - 0.8, "humidity": 64, "pressure": 1012},
        "wind": {"speed": 3.4, "deg": 210},
        "weather": [{"main": "Clouds", "description": "scattered clouds", "icon": "03d"}]
    })
    .to_string()
}

/// Body for the forecast endpoint: one 3-hour entry per `(dt, temp)` pair.
pub fn forecast_body(city: &str, country: &str, entries: &[(i64, f64)]) -> String {
    let list: Vec<serde_json::Value> = entries
        .iter()
        .map(|(dt, temp)| {
            json!({
                "dt": dt,
                "main": {"temp": temp, "feels_like": temp - 1.0, "humidity": 60, "pressure": 1010},
                "wind": {"speed": 4.2, "deg": 180},
                "weather": [{"main": "Rain", "description": "light rain", "icon": "10d"}],
                "pop": 0.4
            })
        })
        .collect();

    json!({
        "city": {"name": city, "country": country},
        "list": list
    })
    .to_string()
}

/// Forecast entries starting shortly after now, spaced three hours apart.
pub fn near_term_entries(count: usize, base_temp: f64) -> Vec<(i64, f64)> {
    let start = chrono::Utc::now().timestamp() + 3600;
    (0..count)
        .map(|i| (start + (i as i64) * 3 * 3600, base_temp + i as f64))
        .collect()
}
