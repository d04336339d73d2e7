use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Europe::Madrid;
use serde::{Deserialize, Serialize};

/// Resolves the date a valuation is computed "as of".
///
/// An explicit `YYYY-MM-DD` argument wins; otherwise the calendar date in Madrid at `now_utc`.
pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return Ok(NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?);
    }
    Ok(now_utc.with_timezone(&Madrid).date_naive())
}

pub fn today_in_madrid() -> NaiveDate {
    Utc::now().with_timezone(&Madrid).date_naive()
}

/// Demand season of the coastal rental market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    /// June through August.
    Peak,
    /// April, May, September and October.
    Shoulder,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketTrend {
    Rising,
    Stable,
    Declining,
}

impl MarketTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Stable => "stable",
            Self::Declining => "declining",
        }
    }
}

impl Season {
    pub fn of(date: NaiveDate) -> Self {
        match date.month() {
            6..=8 => Self::Peak,
            4 | 5 | 9 | 10 => Self::Shoulder,
            _ => Self::Low,
        }
    }

    pub fn market_multiplier(self) -> f64 {
        match self {
            Self::Peak => 1.08,
            Self::Shoulder => 1.03,
            Self::Low => 0.98,
        }
    }

    pub fn market_trend(self) -> MarketTrend {
        match self {
            Self::Peak => MarketTrend::Rising,
            Self::Shoulder => MarketTrend::Stable,
            Self::Low => MarketTrend::Declining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn explicit_date_wins() {
        let now = Utc.with_ymd_and_hms(2026, 1, 3, 8, 0, 0).unwrap();
        let d = resolve_as_of_date(Some("2025-07-14"), now).unwrap();
        assert_eq!(d, date(2025, 7, 14));
    }

    #[test]
    fn rejects_malformed_date() {
        let now = Utc.with_ymd_and_hms(2026, 1, 3, 8, 0, 0).unwrap();
        assert!(resolve_as_of_date(Some("14/07/2025"), now).is_err());
    }

    #[test]
    fn uses_madrid_calendar_date() {
        // 23:30 UTC on Dec 31 is already Jan 1 in Madrid (UTC+1 in winter).
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 30, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, date(2026, 1, 1));
    }

    #[test]
    fn month_maps_to_season() {
        assert_eq!(Season::of(date(2025, 6, 1)), Season::Peak);
        assert_eq!(Season::of(date(2025, 8, 31)), Season::Peak);
        assert_eq!(Season::of(date(2025, 4, 10)), Season::Shoulder);
        assert_eq!(Season::of(date(2025, 10, 31)), Season::Shoulder);
        assert_eq!(Season::of(date(2025, 11, 1)), Season::Low);
        assert_eq!(Season::of(date(2025, 3, 31)), Season::Low);
    }

    #[test]
    fn season_multipliers() {
        assert_eq!(Season::Peak.market_multiplier(), 1.08);
        assert_eq!(Season::Shoulder.market_multiplier(), 1.03);
        assert_eq!(Season::Low.market_multiplier(), 0.98);
        assert_eq!(Season::Low.market_trend(), MarketTrend::Declining);
    }
}
