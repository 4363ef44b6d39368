pub mod fitbit_models;

pub use fitbit_models::{
    FitbitClient, FitbitError, MetricSeries, OAuthTokens, Period, TimeSeriesPoint, TokenStore,
    UserProfile, DEFAULT_LOGGABLES,
};
