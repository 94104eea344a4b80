// Tests for the IP geolocation collaborator.

use mockito::{Matcher, Server};
use weather_tracker::geo::{GeolocationError, IpLocator};

#[tokio::test]
async fn test_current_coordinates_success() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/json")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"status":"success","lat":59.91,"lon":10.75,"city":"Oslo","country":"Norway"}"#)
        .create_async()
        .await;

    let locator = IpLocator::with_base_url(server.url());
    let coords = locator.current_coordinates().await.unwrap();

    assert_eq!(coords.latitude, 59.91);
    assert_eq!(coords.longitude, 10.75);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_lookup_failure_status_maps_to_unavailable() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/json")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"status":"fail","message":"private range"}"#)
        .create_async()
        .await;

    let locator = IpLocator::with_base_url(server.url());
    let result = locator.current_coordinates().await;

    assert_eq!(result.unwrap_err(), GeolocationError::PositionUnavailable);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_http_403_maps_to_permission_denied() {
    let mut server = Server::new_async().await;

    let mock = server
        .mock("GET", "/json")
        .match_query(Matcher::Any)
        .with_status(403)
        .create_async()
        .await;

    let locator = IpLocator::with_base_url(server.url());
    let result = locator.current_coordinates().await;

    assert_eq!(result.unwrap_err(), GeolocationError::PermissionDenied);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_disabled_locator_is_unsupported() {
    let locator = IpLocator::new(false);
    let result = locator.current_coordinates().await;

    assert_eq!(result.unwrap_err(), GeolocationError::Unsupported);
}

#[tokio::test]
async fn test_transport_failure_maps_to_unavailable() {
    // Nothing is listening on this port.
    let locator = IpLocator::with_base_url("http://127.0.0.1:9".to_string());
    let result = locator.current_coordinates().await;

    assert_eq!(result.unwrap_err(), GeolocationError::PositionUnavailable);
}
