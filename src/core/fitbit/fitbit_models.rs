// Fitbit domain types shared by the sync service and the HTTP client.
// Nothing in here knows about reqwest or JSON payload shapes.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Resources fetched when the user has not picked any.
pub const DEFAULT_LOGGABLES: [&str; 17] = [
    "activities/log/steps",
    "activities/log/distance",
    "activities/log/activeScore",
    "activities/log/activityCalories",
    "activities/log/calories",
    "foods/log/caloriesIn",
    "activities/log/minutesSedentary",
    "activities/log/minutesLightlyActive",
    "activities/log/minutesFairlyActive",
    "activities/log/minutesVeryActive",
    "sleep/timeInBed",
    "sleep/minutesAsleep",
    "sleep/minutesAwake",
    "sleep/awakeningsCount",
    "body/weight",
    "body/bmi",
    "body/fat",
];

/// Lookback window for a time-series request, ending today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[default]
    #[serde(rename = "30d")]
    ThirtyDays,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    pub const ALL: [Period; 9] = [
        Period::OneDay,
        Period::SevenDays,
        Period::ThirtyDays,
        Period::OneWeek,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::SixMonths,
        Period::OneYear,
        Period::Max,
    ];

    /// The code used in API paths, e.g. `30d`.
    pub fn code(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::SevenDays => "7d",
            Period::ThirtyDays => "30d",
            Period::OneWeek => "1w",
            Period::OneMonth => "1m",
            Period::ThreeMonths => "3m",
            Period::SixMonths => "6m",
            Period::OneYear => "1y",
            Period::Max => "max",
        }
    }
}

/// A period code that is not one Fitbit accepts.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Unknown period '{0}' (expected one of 1d, 7d, 30d, 1w, 1m, 3m, 6m, 1y, max)")]
pub struct InvalidPeriod(pub String);

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Period {
    type Err = InvalidPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Period::ALL
            .iter()
            .copied()
            .find(|p| p.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| InvalidPeriod(s.to_string()))
    }
}

/// One day of one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// A decoded time-series response: the column title and its points,
/// oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub title: String,
    pub points: Vec<TimeSeriesPoint>,
}

/// The parts of the Fitbit user profile written into the header row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub display_name: String,
    pub date_of_birth: Option<String>,
    pub country: Option<String>,
    pub avatar: Option<String>,
    pub foods_locale: Option<String>,
}

/// Access/refresh token pair obtained through the OAuth2 code flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl OAuthTokens {
    /// True when the access token is expired or will be within `margin_secs`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin_secs: i64) -> bool {
        self.expires_at <= now + chrono::Duration::seconds(margin_secs)
    }
}

#[derive(Debug, Error)]
pub enum FitbitError {
    #[error("Fitbit API error: {0}")]
    Api(String),
    #[error("Fitbit returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed Fitbit response: {0}")]
    MalformedResponse(String),
    #[error("Not authorized with Fitbit yet. Run `fitbit-sheet-sync authorize` first.")]
    NotAuthorized,
    #[error("OAuth token request failed: {0}")]
    Token(String),
    #[error("Failed to persist Fitbit tokens: {0}")]
    Store(String),
}

/// The Fitbit calls the sync service needs.
#[async_trait]
pub trait FitbitClient: Send + Sync {
    async fn profile(&self) -> Result<UserProfile, FitbitError>;

    /// Fetches `resource` (e.g. `activities/log/steps`) for `period` ending today.
    /// `locale` is sent as `Accept-Language` and selects the unit system.
    async fn time_series(
        &self,
        resource: &str,
        period: Period,
        locale: Option<&str>,
    ) -> Result<MetricSeries, FitbitError>;
}

/// Storage for the OAuth token pair.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<OAuthTokens>, FitbitError>;
    async fn save(&self, tokens: &OAuthTokens) -> Result<(), FitbitError>;
}
