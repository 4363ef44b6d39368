// Refresh run: pulls every configured metric from Fitbit and merges it into
// the sheet, one column per metric and one row per day.
//
// Layout:
//   row 1  profile summary (name, country, loggables, period, avatar)
//   row 2  "Date" followed by one title per metric column
//   row 3+ data region, ordered by date

use thiserror::Error;

use crate::core::config::SyncConfig;
use crate::core::fitbit::{FitbitClient, FitbitError, MetricSeries, UserProfile};
use crate::core::sheet::{CellValue, RowCursor, Sheet, SheetError, DATE_COLUMN};

pub const HEADER_ROW: u32 = 1;
pub const TITLE_ROW: u32 = 2;
pub const FIRST_DATA_ROW: u32 = 3;

/// Column of the metric at `index` in the configured list.
pub fn metric_column(index: usize) -> u32 {
    DATE_COLUMN + 1 + index as u32
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Fitbit client id and secret are not configured. Run `fitbit-sheet-sync configure` first.")]
    NotConfigured,
    #[error("Could not load the Fitbit profile: {0}")]
    Profile(#[source] FitbitError),
    #[error(transparent)]
    Sheet(#[from] SheetError),
}

/// What happened to one metric during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricOutcome {
    Written {
        metric: String,
        title: String,
        column: u32,
        rows: usize,
    },
    Failed {
        metric: String,
        column: u32,
        reason: String,
    },
}

impl MetricOutcome {
    pub fn metric(&self) -> &str {
        match self {
            MetricOutcome::Written { metric, .. } | MetricOutcome::Failed { metric, .. } => metric,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, MetricOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub user: String,
    pub outcomes: Vec<MetricOutcome>,
}

impl RefreshReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }
}

pub struct SyncService<C: FitbitClient, S: Sheet> {
    client: C,
    sheet: S,
}

impl<C, S> SyncService<C, S>
where
    C: FitbitClient,
    S: Sheet,
{
    pub fn new(client: C, sheet: S) -> Self {
        Self { client, sheet }
    }

    /// Runs one refresh.
    ///
    /// Missing credentials or a failing profile call abort before anything is
    /// written. Once the header is in place nothing aborts the run: a metric
    /// that fails to fetch, decode or find its rows is recorded in the report
    /// and the run moves on to the next one.
    pub async fn refresh(&self, config: &SyncConfig) -> Result<RefreshReport, SyncError> {
        if !config.is_configured() {
            return Err(SyncError::NotConfigured);
        }

        tracing::info!("Refreshing time series data...");
        let profile = self.client.profile().await.map_err(SyncError::Profile)?;
        self.write_header(&profile, config).await?;

        let locale = profile.foods_locale.as_deref();
        let mut outcomes = Vec::with_capacity(config.metrics.len());

        for (index, metric) in config.metrics.iter().enumerate() {
            let column = metric_column(index);
            tracing::info!("Refreshing {}", metric);

            let series = match self.client.time_series(metric, config.period, locale).await {
                Ok(series) => series,
                Err(err) => {
                    tracing::warn!("Skipping {}: {}", metric, err);
                    outcomes.push(MetricOutcome::Failed {
                        metric: metric.clone(),
                        column,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let rows = match self.write_series(column, &series).await {
                Ok(rows) => rows,
                Err(err) => {
                    tracing::warn!("Could not write {}: {}", metric, err);
                    outcomes.push(MetricOutcome::Failed {
                        metric: metric.clone(),
                        column,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            tracing::debug!("Wrote {} rows of {} into column {}", rows, metric, column);
            outcomes.push(MetricOutcome::Written {
                metric: metric.clone(),
                title: series.title,
                column,
                rows,
            });
        }

        let report = RefreshReport {
            user: profile.display_name,
            outcomes,
        };
        tracing::info!(
            "Refresh finished: {} metrics written, {} failed",
            report.outcomes.len() - report.failures(),
            report.failures()
        );
        Ok(report)
    }

    async fn write_header(
        &self,
        profile: &UserProfile,
        config: &SyncConfig,
    ) -> Result<(), SheetError> {
        let sheet = &self.sheet;

        sheet
            .set_cell(HEADER_ROW, 1, CellValue::text(profile.display_name.as_str()))
            .await?;
        if let Some(dob) = &profile.date_of_birth {
            sheet.set_note(HEADER_ROW, 1, &format!("DOB:{}", dob)).await?;
        }
        sheet
            .set_cell(
                HEADER_ROW,
                2,
                CellValue::text(profile.country.clone().unwrap_or_default()),
            )
            .await?;
        sheet
            .set_cell(HEADER_ROW, 3, CellValue::text("Loggables:"))
            .await?;
        sheet
            .set_note(HEADER_ROW, 3, &config.metrics.join(","))
            .await?;
        sheet
            .set_cell(HEADER_ROW, 4, CellValue::text(format!("Period: {}", config.period)))
            .await?;
        sheet
            .set_cell(
                HEADER_ROW,
                5,
                CellValue::text(profile.avatar.clone().unwrap_or_default()),
            )
            .await?;

        sheet
            .set_cell(TITLE_ROW, DATE_COLUMN, CellValue::text("Date"))
            .await
    }

    /// Locates every point first and only then fills the column, so a series
    /// that cannot be placed leaves its column untouched. Date rows created
    /// before the failure stay, which keeps the date column ordered.
    async fn write_series(&self, column: u32, series: &MetricSeries) -> Result<usize, SheetError> {
        // Each metric locates its own rows; nothing carries over between columns.
        let mut cursor = RowCursor::new(FIRST_DATA_ROW);

        // In date order every insertion lands below the rows already located,
        // so the remembered row numbers stay valid until the values go in.
        let mut points = series.points.clone();
        points.sort_by_key(|p| p.date);

        let mut rows = Vec::with_capacity(points.len());
        for point in &points {
            rows.push(cursor.locate(&self.sheet, point.date).await?);
        }

        self.sheet
            .set_cell(TITLE_ROW, column, CellValue::text(series.title.as_str()))
            .await?;
        for (row, point) in rows.iter().zip(&points) {
            self.sheet
                .set_cell(*row, column, CellValue::Number(point.value))
                .await?;
        }
        Ok(series.points.len())
    }
}
