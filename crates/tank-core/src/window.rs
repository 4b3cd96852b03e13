//! Query ranges and aggregation windows

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Channel;

/// Closed time range for store reads; an absent bound is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Range covering whole UTC days, both ends inclusive
    pub fn from_dates(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self {
            from: from.map(start_of_day),
            to: to.map(end_of_day),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| ts >= from) && self.to.map_or(true, |to| ts <= to)
    }
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + Duration::days(1) - Duration::nanoseconds(1)
}

/// Start of the UTC hour containing `ts`
pub fn hour_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    let into_hour = ts.timestamp().rem_euclid(3600);
    ts - Duration::seconds(into_hour) - Duration::nanoseconds(i64::from(ts.timestamp_subsec_nanos()))
}

/// Last instant of the UTC hour containing `ts`
pub fn hour_end(ts: DateTime<Utc>) -> DateTime<Utc> {
    hour_start(ts) + Duration::hours(1) - Duration::nanoseconds(1)
}

/// Bucket size of an aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Daily,
    Hourly,
}

/// Which series an aggregation covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSelector {
    /// Level plus every temperature channel
    #[default]
    All,
    Level,
    Temp(Channel),
}

impl ChannelSelector {
    pub fn includes_level(self) -> bool {
        matches!(self, ChannelSelector::All | ChannelSelector::Level)
    }

    /// Temperature channel filter for store reads; `None` reads every channel
    pub fn temp_filter(self) -> Option<Channel> {
        match self {
            ChannelSelector::Temp(channel) => Some(channel),
            _ => None,
        }
    }

    pub fn includes_temps(self) -> bool {
        !matches!(self, ChannelSelector::Level)
    }
}

/// Closed window `[start, end]` of an aggregation query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity: Granularity,
    pub selector: ChannelSelector,
}

impl AggregationWindow {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: Granularity,
        selector: ChannelSelector,
    ) -> Self {
        Self {
            start,
            end,
            granularity,
            selector,
        }
    }

    /// Window of `length` ending at `end`; starts at the earliest
    /// representable instant when `length` reaches past it
    pub fn trailing(
        end: DateTime<Utc>,
        length: Duration,
        granularity: Granularity,
        selector: ChannelSelector,
    ) -> Self {
        let start = end.checked_sub_signed(length).unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::new(start, end, granularity, selector)
    }

    /// Window of the last `days` days ending at `end`, `None` when `days`
    /// does not fit a duration or reaches before the earliest instant
    pub fn last_days(end: DateTime<Utc>, days: i64, granularity: Granularity) -> Option<Self> {
        let start = end.checked_sub_signed(Duration::try_days(days)?)?;
        Some(Self::new(start, end, granularity, ChannelSelector::All))
    }

    /// Widen to whole buckets: UTC days for daily windows, UTC hours for
    /// hourly ones
    pub fn snapped(&self) -> Self {
        let (start, end) = match self.granularity {
            Granularity::Daily => (
                start_of_day(self.start.date_naive()),
                end_of_day(self.end.date_naive()),
            ),
            Granularity::Hourly => (hour_start(self.start), hour_end(self.end)),
        };
        Self::new(start, end, self.granularity, self.selector)
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }

    /// Same-length window ending at `end`
    pub fn shifted_to_end(&self, end: DateTime<Utc>) -> Self {
        Self::trailing(end, self.length(), self.granularity, self.selector)
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::between(self.start, self.end)
    }
}
