use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, Local, Utc};
use tracing::{debug, info, instrument, warn};

use crate::fetch_error::FetchError;
use crate::fetcher::WeatherFetcher;
use crate::forecast::{
    self, AggregateError, BriefForecast, DateKey, DetailedDayGroup, DetailedForecast,
};
use crate::geo::{GeolocationError, IpLocator};
use crate::models::{FavoriteCity, LocationInfo, Units, WeatherSample, WeatherSnapshot};
use crate::storage::LocalStorage;

type RawForecast = (LocationInfo, Vec<WeatherSample>);

/// Day horizon for the brief (overview) forecast.
pub const BRIEF_FORECAST_DAYS: usize = 3;
/// Day horizon for the detailed (per-slot) forecast.
pub const DETAILED_FORECAST_DAYS: i64 = 5;

/// The single application-state record. Subscribers receive cloned
/// snapshots of this on every mutation.
#[derive(Debug, Clone)]
pub struct ApplicationState {
    pub current_weather: Option<WeatherSnapshot>,
    pub brief_forecast: Option<BriefForecast>,
    pub detailed_forecast: Option<DetailedForecast>,
    pub selected_day: Option<DateKey>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub units: Units,
    pub language: String,
    pub last_update: Option<DateTime<Utc>>,
    pub favorite_cities: Vec<FavoriteCity>,
    pub current_city: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn Fn(&ApplicationState)>;

/// Anything that can sink a weather lookup. Collapses the provider,
/// aggregation, and geolocation failure domains at the store boundary,
/// where they become user-facing messages.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Geolocation(#[from] GeolocationError),
}

struct FetchedWeather {
    current: WeatherSnapshot,
    brief: BriefForecast,
    detailed: DetailedForecast,
}

/// Observable application-state store.
///
/// A cheaply clonable handle over shared single-threaded internals; all
/// operations take `&self` and no internal borrow is held across an await
/// point, so overlapping fetches interleave safely on one task.
#[derive(Clone)]
pub struct WeatherStore {
    state: Rc<RefCell<ApplicationState>>,
    subscribers: Rc<RefCell<Vec<(SubscriptionId, Subscriber)>>>,
    next_subscription: Rc<Cell<u64>>,
    fetch_seq: Rc<Cell<u64>>,
    fetcher: WeatherFetcher,
    locator: IpLocator,
    storage: LocalStorage,
}

impl WeatherStore {
    pub fn new(
        fetcher: WeatherFetcher,
        locator: IpLocator,
        storage: LocalStorage,
        units: Units,
        language: impl Into<String>,
    ) -> Self {
        let favorite_cities = storage.load_favorites();
        let state = ApplicationState {
            current_weather: None,
            brief_forecast: None,
            detailed_forecast: None,
            selected_day: None,
            is_loading: false,
            error: None,
            units,
            language: language.into(),
            last_update: None,
            favorite_cities,
            current_city: None,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
            subscribers: Rc::new(RefCell::new(Vec::new())),
            next_subscription: Rc::new(Cell::new(0)),
            fetch_seq: Rc::new(Cell::new(0)),
            fetcher,
            locator,
            storage,
        }
    }

    /// Register a callback invoked synchronously after every state
    /// mutation with the new state snapshot.
    pub fn subscribe(&self, callback: impl Fn(&ApplicationState) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.subscribers.borrow_mut().push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers
            .borrow_mut()
            .retain(|(existing, _)| *existing != id);
    }

    /// Current state snapshot.
    pub fn state(&self) -> ApplicationState {
        self.state.borrow().clone()
    }

    // Single mutation entry point: merge, stamp, notify. The snapshot is
    // cloned before the callbacks run, so a subscriber can re-read the
    // store without aliasing its internals.
    fn apply(&self, mutate: impl FnOnce(&mut ApplicationState)) {
        let snapshot = {
            let mut state = self.state.borrow_mut();
            mutate(&mut state);
            state.last_update = Some(Utc::now());
            state.clone()
        };
        for (_, callback) in self.subscribers.borrow().iter() {
            callback(&snapshot);
        }
    }

    /// Look up a city by name: current conditions plus brief and detailed
    /// forecasts. All three provider calls must succeed; any failure lands
    /// the store in the failed state with a user-facing message.
    #[instrument(skip(self), fields(city = %city))]
    pub async fn fetch_weather(&self, city: &str) {
        let token = self.begin_fetch();
        let outcome = self.lookup_city(city).await;
        self.finish_fetch(token, outcome);
    }

    /// Same as [`fetch_weather`](Self::fetch_weather), starting from a
    /// coordinate pair instead of a city name.
    #[instrument(skip(self))]
    pub async fn fetch_weather_by_coordinates(&self, latitude: f64, longitude: f64) {
        let token = self.begin_fetch();
        let outcome = self.lookup_coordinates(latitude, longitude).await;
        self.finish_fetch(token, outcome);
    }

    /// Resolve the device position, then fetch weather for it.
    #[instrument(skip(self))]
    pub async fn fetch_weather_by_geolocation(&self) {
        let token = self.begin_fetch();
        let outcome = match self.locator.current_coordinates().await {
            Ok(coords) => self.lookup_coordinates(coords.latitude, coords.longitude).await,
            Err(e) => Err(LookupError::Geolocation(e)),
        };
        self.finish_fetch(token, outcome);
    }

    /// Load a previously saved city. Same flow as a fresh search.
    pub async fn load_favorite_city(&self, name: &str) {
        self.fetch_weather(name).await;
    }

    /// Select a day in the detailed view. The key is stored as given;
    /// resolution against the loaded forecast happens in
    /// [`get_selected_day_forecast`](Self::get_selected_day_forecast).
    pub fn select_day(&self, day: DateKey) {
        self.apply(|state| state.selected_day = Some(day));
    }

    pub fn toggle_units(&self) {
        self.apply(|state| state.units = state.units.toggled());
    }

    pub fn change_language(&self, language: &str) {
        self.apply(|state| state.language = language.to_string());
    }

    pub fn clear_error(&self) {
        self.apply(|state| state.error = None);
    }

    /// The detailed day group for the current selection, or `None` when no
    /// forecast is loaded, nothing is selected, or the selection does not
    /// resolve against the loaded forecast.
    pub fn get_selected_day_forecast(&self) -> Option<DetailedDayGroup> {
        let state = self.state.borrow();
        let detailed = state.detailed_forecast.as_ref()?;
        let selected = state.selected_day.as_ref()?;
        detailed.day(selected).cloned()
    }

    /// Pin a city to the favorites set. Returns `false` without mutating
    /// anything when the city is already pinned.
    pub fn add_to_favorites(&self, snapshot: &WeatherSnapshot) -> bool {
        let favorite = FavoriteCity::from_snapshot(snapshot);
        {
            let state = self.state.borrow();
            if state.favorite_cities.iter().any(|f| f.id == favorite.id) {
                debug!("{} is already a favorite", favorite.id);
                return false;
            }
        }
        info!("Adding {} to favorites", favorite.id);
        self.apply(|state| state.favorite_cities.push(favorite));
        self.persist_favorites();
        true
    }

    /// Unpin a city. Idempotent: an unknown id still notifies and
    /// re-persists the (unchanged) set.
    pub fn remove_from_favorites(&self, id: &str) {
        info!("Removing {} from favorites", id);
        self.apply(|state| state.favorite_cities.retain(|f| f.id != id));
        self.persist_favorites();
    }

    pub fn is_favorite(&self, snapshot: &WeatherSnapshot) -> bool {
        let id = snapshot.favorite_id();
        self.state
            .borrow()
            .favorite_cities
            .iter()
            .any(|f| f.id == id)
    }

    // Fetch plumbing. Every fetch takes a sequence token; a terminal
    // update is applied only while its token is still the newest issued,
    // so a slow response can never overwrite the state of a later search.

    fn begin_fetch(&self) -> u64 {
        self.apply(|state| {
            state.is_loading = true;
            state.error = None;
        });
        let token = self.fetch_seq.get() + 1;
        self.fetch_seq.set(token);
        token
    }

    fn finish_fetch(&self, token: u64, outcome: Result<FetchedWeather, LookupError>) {
        if token != self.fetch_seq.get() {
            debug!("Discarding result of superseded fetch {}", token);
            return;
        }
        match outcome {
            Ok(fetched) => {
                let city = fetched.current.city.clone();
                info!("Weather loaded for {}", city);
                let current_city = city.clone();
                self.apply(move |state| {
                    state.selected_day = fetched.detailed.first_day_key();
                    state.current_weather = Some(fetched.current);
                    state.brief_forecast = Some(fetched.brief);
                    state.detailed_forecast = Some(fetched.detailed);
                    state.current_city = Some(current_city);
                    state.is_loading = false;
                    state.error = None;
                });
                self.remember_city(&city);
            }
            Err(e) => {
                warn!("Weather lookup failed: {}", e);
                let message = user_message(&e);
                self.apply(move |state| {
                    state.is_loading = false;
                    state.error = Some(message);
                });
            }
        }
    }

    async fn lookup_city(&self, city: &str) -> Result<FetchedWeather, LookupError> {
        let (current, brief_raw, detailed_raw) = futures::future::try_join3(
            self.fetcher.current_conditions(city),
            self.fetcher.forecast_samples(city),
            self.fetcher.forecast_samples(city),
        )
        .await?;
        self.assemble(current, brief_raw, detailed_raw)
    }

    async fn lookup_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<FetchedWeather, LookupError> {
        let current = self
            .fetcher
            .current_conditions_by_coordinates(latitude, longitude)
            .await?;
        let (brief_raw, detailed_raw) = futures::future::try_join(
            self.fetcher.forecast_samples(&current.city),
            self.fetcher.forecast_samples(&current.city),
        )
        .await?;
        self.assemble(current, brief_raw, detailed_raw)
    }

    fn assemble(
        &self,
        current: WeatherSnapshot,
        brief_raw: RawForecast,
        detailed_raw: RawForecast,
    ) -> Result<FetchedWeather, LookupError> {
        let (brief_location, brief_samples) = brief_raw;
        let (detailed_location, detailed_samples) = detailed_raw;
        let brief =
            forecast::aggregate_brief(&brief_samples, brief_location, BRIEF_FORECAST_DAYS, &Local)?;
        let detailed = forecast::aggregate_detailed(
            &detailed_samples,
            detailed_location,
            DETAILED_FORECAST_DAYS,
            Local::now(),
        )?;
        Ok(FetchedWeather {
            current,
            brief,
            detailed,
        })
    }

    fn remember_city(&self, city: &str) {
        if let Err(e) = self.storage.save_last_city(city) {
            warn!("Failed to persist last searched city: {}", e);
        }
        if let Err(e) = self.storage.record_search(city) {
            warn!("Failed to update search history: {}", e);
        }
    }

    fn persist_favorites(&self) {
        let favorites = self.state.borrow().favorite_cities.clone();
        if let Err(e) = self.storage.save_favorites(&favorites) {
            warn!("Failed to persist favorites: {}", e);
        }
    }
}

/// Map a lookup failure to the message shown to the user. Switches on the
/// structured error variants, never on message text.
pub fn user_message(error: &LookupError) -> String {
    match error {
        LookupError::Fetch(FetchError::Http { status: 404 }) => {
            "City not found. Check the spelling and try again."
        }
        LookupError::Fetch(FetchError::Http { status: 401 }) => {
            "The weather service rejected the API key. Check the configuration."
        }
        LookupError::Fetch(e) if e.is_transport() => {
            "Connection problem. Check your network and try again."
        }
        LookupError::Aggregate(AggregateError::NoSamples) => {
            "The weather service returned no forecast data. Try again later."
        }
        LookupError::Geolocation(GeolocationError::PermissionDenied) => {
            "Location access was denied. Allow geolocation and try again."
        }
        LookupError::Geolocation(GeolocationError::PositionUnavailable) => {
            "Your location could not be determined."
        }
        LookupError::Geolocation(GeolocationError::Timeout) => {
            "Timed out while determining your location."
        }
        LookupError::Geolocation(GeolocationError::Unsupported) => {
            "Geolocation is not available. Search for a city instead."
        }
        _ => "Something went wrong. Try again later.",
    }
    .to_string()
}
