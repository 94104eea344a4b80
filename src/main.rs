use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use weather_tracker::config::Config;
use weather_tracker::fetcher::WeatherFetcher;
use weather_tracker::geo::IpLocator;
use weather_tracker::models::{convert_temperature, Units};
use weather_tracker::storage::LocalStorage;
use weather_tracker::store::{ApplicationState, WeatherStore};

// The store is deliberately single-threaded, so the whole app runs on a
// current-thread runtime.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing with environment filter support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,weather_tracker=debug")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    info!("Using weather API at {}", config.api_base_url);

    let fetcher = WeatherFetcher::with_base_url(
        config.api_base_url.clone(),
        config.api_key.clone(),
        config.language.clone(),
    );
    let locator = IpLocator::with_config(config.geoip_base_url.clone(), config.geolocation_enabled);
    let storage = LocalStorage::new(config.storage_dir.clone());
    let store = WeatherStore::new(
        fetcher,
        locator,
        storage.clone(),
        config.units,
        &config.language,
    );

    store.subscribe(render);

    // Lookup target: explicit argument, then the last searched city, then
    // a geolocation guess.
    match std::env::args().nth(1).or_else(|| storage.load_last_city()) {
        Some(city) => {
            info!("Looking up weather for {}", city);
            store.fetch_weather(&city).await;
        }
        None => {
            info!("No city given; falling back to geolocation");
            store.fetch_weather_by_geolocation().await;
        }
    }

    if let Some(group) = store.get_selected_day_forecast() {
        let units = store.state().units;
        println!();
        println!("Detail for {}:", group.date_key);
        for slot in &group.samples {
            let temp = convert_temperature(f64::from(slot.temp), Units::Metric, units);
            println!(
                "  {}  {:>5.0}{}  {}  wind {:.1} m/s  precip {:.0}%",
                slot.time,
                temp,
                units.suffix(),
                slot.condition.description,
                slot.wind_speed,
                slot.precipitation_probability * 100.0,
            );
        }
    }

    Ok(())
}

fn render(state: &ApplicationState) {
    if state.is_loading {
        println!("Loading weather…");
        return;
    }
    if let Some(error) = &state.error {
        println!("Error: {error}");
        return;
    }

    if let Some(current) = &state.current_weather {
        let temp = convert_temperature(current.temperature, Units::Metric, state.units);
        let feels = convert_temperature(current.feels_like, Units::Metric, state.units);
        println!();
        println!(
            "{}, {}: {:.0}{} (feels like {:.0}{}) — {}",
            current.city,
            current.country,
            temp,
            state.units.suffix(),
            feels,
            state.units.suffix(),
            current.condition.description,
        );
        println!(
            "humidity {:.0}%  pressure {:.0} hPa  wind {:.1} m/s",
            current.humidity, current.pressure, current.wind_speed,
        );
    }

    if let Some(brief) = &state.brief_forecast {
        println!();
        for day in &brief.days {
            let high = convert_temperature(f64::from(day.max_temp), Units::Metric, state.units);
            let low = convert_temperature(f64::from(day.min_temp), Units::Metric, state.units);
            println!(
                "  {}  {:>3.0}{} / {:>3.0}{}  {}",
                day.display_date,
                high,
                state.units.suffix(),
                low,
                state.units.suffix(),
                day.primary_condition.main,
            );
        }
    }
}
