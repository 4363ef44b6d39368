use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::oauth::FitbitOAuth;
use crate::core::fitbit::{
    FitbitClient, FitbitError, MetricSeries, Period, TimeSeriesPoint, TokenStore, UserProfile,
};
use crate::core::sheet::DATE_FORMAT;

/// Fitbit Web API client. Exposes only the two calls the sync service needs.
pub struct FitbitApiClient<S: TokenStore> {
    client: Client,
    base_url: String,
    auth: FitbitOAuth<S>,
}

impl<S: TokenStore> FitbitApiClient<S> {
    pub fn new(base_url: impl Into<String>, auth: FitbitOAuth<S>) -> Result<Self, FitbitError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert(
            "User-Agent",
            HeaderValue::from_static("FitbitSheetSync/0.2"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| FitbitError::Api(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Sends an authorized GET. A 401 gets one retry with a freshly refreshed token.
    async fn get(&self, url: &str, locale: Option<&str>) -> Result<Response, FitbitError> {
        let token = self.auth.access_token().await?;
        let resp = self
            .request(url, locale)?
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| FitbitError::Api(e.to_string()))?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return Self::check_status(resp).await;
        }

        tracing::debug!("Fitbit rejected the access token, refreshing once");
        let token = self.auth.force_refresh().await?;
        let resp = self
            .request(url, locale)?
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| FitbitError::Api(e.to_string()))?;
        Self::check_status(resp).await
    }

    fn request(&self, url: &str, locale: Option<&str>) -> Result<RequestBuilder, FitbitError> {
        let mut req = self.client.get(url);
        if let Some(locale) = locale {
            let value = HeaderValue::from_str(locale)
                .map_err(|e| FitbitError::Api(format!("Invalid locale '{}': {}", locale, e)))?;
            req = req.header(ACCEPT_LANGUAGE, value);
        }
        Ok(req)
    }

    async fn check_status(resp: Response) -> Result<Response, FitbitError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(FitbitError::Status { status, body })
    }
}

#[async_trait]
impl<S: TokenStore> FitbitClient for FitbitApiClient<S> {
    async fn profile(&self) -> Result<UserProfile, FitbitError> {
        let url = format!("{}/1/user/-/profile.json", self.base_url);
        let resp = self.get(&url, None).await?;

        let body: ApiProfileResponse = resp
            .json()
            .await
            .map_err(|e| FitbitError::MalformedResponse(e.to_string()))?;
        let user = body.user;

        Ok(UserProfile {
            display_name: user
                .display_name
                .or(user.full_name)
                .unwrap_or_else(|| "Fitbit user".to_string()),
            date_of_birth: user.date_of_birth,
            country: user.country,
            avatar: user.avatar,
            foods_locale: user.foods_locale,
        })
    }

    async fn time_series(
        &self,
        resource: &str,
        period: Period,
        locale: Option<&str>,
    ) -> Result<MetricSeries, FitbitError> {
        let url = format!(
            "{}/1/user/-/{}/date/today/{}.json",
            self.base_url,
            resource.trim_matches('/'),
            period
        );
        let resp = self.get(&url, locale).await?;
        let text = resp
            .text()
            .await
            .map_err(|e| FitbitError::Api(e.to_string()))?;

        parse_time_series(&text)
    }
}

/// Decodes a time-series body such as
/// `{"activities-log-steps":[{"dateTime":"2024-01-10","value":"8421"}]}`.
///
/// Either every point decodes or the whole series is rejected, so a bad
/// response never leaves half a column behind.
pub fn parse_time_series(body: &str) -> Result<MetricSeries, FitbitError> {
    let malformed = |msg: String| FitbitError::MalformedResponse(msg);

    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| malformed("expected a JSON object".to_string()))?;

    let mut series = object.iter().filter(|(_, v)| v.is_array());
    let (key, points) = match (series.next(), series.next()) {
        (Some(entry), None) => entry,
        (None, _) => return Err(malformed("no time series in response".to_string())),
        (Some(_), Some(_)) => return Err(malformed("more than one time series".to_string())),
    };

    let raw: Vec<ApiPoint> =
        serde_json::from_value(points.clone()).map_err(|e| malformed(e.to_string()))?;

    let mut points = raw
        .into_iter()
        .map(|p| -> Result<TimeSeriesPoint, FitbitError> {
            let date = NaiveDate::parse_from_str(&p.date_time, DATE_FORMAT)
                .map_err(|_| malformed(format!("bad date '{}'", p.date_time)))?;
            let value = match &p.value {
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                serde_json::Value::Number(n) => n.as_f64(),
                _ => None,
            }
            .filter(|v| v.is_finite())
            .ok_or_else(|| malformed(format!("bad value {} on {}", p.value, p.date_time)))?;
            Ok(TimeSeriesPoint { date, value })
        })
        .collect::<Result<Vec<_>, _>>()?;
    points.sort_by_key(|p| p.date);

    Ok(MetricSeries {
        title: series_title(key),
        points,
    })
}

/// `activities-log-steps` → `steps`
fn series_title(key: &str) -> String {
    key.rsplit('-').next().unwrap_or(key).to_string()
}

#[derive(Debug, Deserialize)]
struct ApiProfileResponse {
    user: ApiUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUser {
    display_name: Option<String>,
    full_name: Option<String>,
    date_of_birth: Option<String>,
    country: Option<String>,
    avatar: Option<String>,
    foods_locale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPoint {
    #[serde(rename = "dateTime")]
    date_time: String,
    value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::fitbit::oauth::tests::{endpoints, MemoryTokenStore};

    fn client_for(
        server: &mockito::ServerGuard,
        store: MemoryTokenStore,
    ) -> FitbitApiClient<MemoryTokenStore> {
        let auth = FitbitOAuth::new("client", "secret", endpoints(&server.url()), store);
        FitbitApiClient::new(server.url(), auth).unwrap()
    }

    #[test]
    fn test_parse_steps_series() {
        let body = r#"{"activities-log-steps":[
            {"dateTime":"2024-01-11","value":"9500"},
            {"dateTime":"2024-01-10","value":"8421"}
        ]}"#;

        let series = parse_time_series(body).unwrap();
        assert_eq!(series.title, "steps");
        assert_eq!(
            series.points,
            vec![
                TimeSeriesPoint {
                    date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
                    value: 8421.0
                },
                TimeSeriesPoint {
                    date: NaiveDate::from_ymd_opt(2024, 1, 11).unwrap(),
                    value: 9500.0
                },
            ]
        );
    }

    #[test]
    fn test_numeric_values_are_accepted() {
        let body = r#"{"body-weight":[{"dateTime":"2024-01-10","value":72.5}]}"#;
        let series = parse_time_series(body).unwrap();
        assert_eq!(series.title, "weight");
        assert_eq!(series.points[0].value, 72.5);
    }

    #[test]
    fn test_empty_series_is_fine() {
        let series = parse_time_series(r#"{"sleep-minutesAsleep":[]}"#).unwrap();
        assert_eq!(series.title, "minutesAsleep");
        assert!(series.points.is_empty());
    }

    #[test]
    fn test_malformed_bodies_are_rejected() {
        let bodies = [
            "not json",
            "[1, 2]",
            r#"{"errors":{"message":"nope"}}"#,
            r#"{"a":[],"b":[]}"#,
            r#"{"body-fat":[{"dateTime":"10/01/2024","value":"20"}]}"#,
            r#"{"body-fat":[{"dateTime":"2024-01-10","value":"twenty"}]}"#,
            r#"{"body-fat":[{"value":"20"}]}"#,
            r#"{"body-fat":[{"dateTime":"2024-01-10","value":"NaN"}]}"#,
            r#"{"body-fat":[{"dateTime":"2024-01-10","value":"inf"}]}"#,
            r#"{"body-fat":[{"dateTime":"2024-01-10","value":"-infinity"}]}"#,
        ];

        for body in bodies {
            let result = parse_time_series(body);
            assert!(
                matches!(result, Err(FitbitError::MalformedResponse(_))),
                "{} should be rejected",
                body
            );
        }
    }

    #[tokio::test]
    async fn test_profile_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/1/user/-/profile.json")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"user":{"displayName":"Sam","dateOfBirth":"1990-04-01","country":"NZ",
                "avatar":"https://example.com/a.png","foodsLocale":"en_NZ","fullName":"Sam Smith"}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server, MemoryTokenStore::with("tok", "r", 3600));
        let profile = client.profile().await.unwrap();

        mock.assert_async().await;
        assert_eq!(profile.display_name, "Sam");
        assert_eq!(profile.date_of_birth.as_deref(), Some("1990-04-01"));
        assert_eq!(profile.foods_locale.as_deref(), Some("en_NZ"));
    }

    #[tokio::test]
    async fn test_time_series_request_uses_period_and_locale() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/1/user/-/activities/log/steps/date/today/7d.json")
            .match_header("authorization", "Bearer tok")
            .match_header("accept-language", "en_GB")
            .with_status(200)
            .with_body(r#"{"activities-log-steps":[{"dateTime":"2024-01-10","value":"8421"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server, MemoryTokenStore::with("tok", "r", 3600));
        let series = client
            .time_series("activities/log/steps", Period::SevenDays, Some("en_GB"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(series.title, "steps");
        assert_eq!(series.points.len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/1/user/-/body/fat/date/today/30d.json")
            .with_status(429)
            .with_body("Too Many Requests")
            .create_async()
            .await;

        let client = client_for(&server, MemoryTokenStore::with("tok", "r", 3600));
        let err = client
            .time_series("body/fat", Period::ThirtyDays, None)
            .await
            .unwrap_err();

        match err {
            FitbitError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "Too Many Requests");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_triggers_one_refresh() {
        let mut server = mockito::Server::new_async().await;
        let rejected = server
            .mock("GET", "/1/user/-/profile.json")
            .match_header("authorization", "Bearer revoked")
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let token = server
            .mock("POST", "/oauth2/token")
            .with_status(200)
            .with_body(
                r#"{"access_token":"fresh","refresh_token":"r2","expires_in":28800,"token_type":"Bearer"}"#,
            )
            .expect(1)
            .create_async()
            .await;
        let accepted = server
            .mock("GET", "/1/user/-/profile.json")
            .match_header("authorization", "Bearer fresh")
            .with_status(200)
            .with_body(r#"{"user":{"displayName":"Sam"}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server, MemoryTokenStore::with("revoked", "r1", 3600));
        let profile = client.profile().await.unwrap();

        rejected.assert_async().await;
        token.assert_async().await;
        accepted.assert_async().await;
        assert_eq!(profile.display_name, "Sam");
    }

    #[tokio::test]
    async fn test_no_tokens_fails_before_any_request() {
        let server = mockito::Server::new_async().await;
        let client = client_for(&server, MemoryTokenStore::default());

        let err = client.profile().await.unwrap_err();
        assert!(matches!(err, FitbitError::NotAuthorized));
    }
}
