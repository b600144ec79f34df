//! History facade - paginated, filtered, read-only view of checks

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

use aml_core::{Check, CheckHistory, CheckStatus, Page, Pagination, ProviderId, UserId};
use aml_store::{CheckFilter, ScreeningStore};

use crate::error::{ScreeningError, ScreeningResult};

/// Query filters; dates are calendar days in the viewer's timezone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub user_id: Option<UserId>,
    pub provider: Option<ProviderId>,
    pub status: Option<CheckStatus>,
    /// First day included
    pub date_from: Option<NaiveDate>,
    /// Last day included
    pub date_to: Option<NaiveDate>,
}

/// A check with its full ordered audit trail
#[derive(Debug, Clone, PartialEq)]
pub struct CheckWithHistory {
    pub check: Check,
    pub history: Vec<CheckHistory>,
}

pub struct HistoryService {
    store: Arc<dyn ScreeningStore>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn ScreeningStore>) -> Self {
        Self { store }
    }

    /// Checks matching `filter`, newest first.
    ///
    /// Date bounds are resolved against `viewer`'s UTC offset; unknown users
    /// are treated as UTC.
    pub async fn get_check_history(
        &self,
        viewer: UserId,
        filter: &HistoryFilter,
        pagination: Pagination,
    ) -> ScreeningResult<Page<CheckWithHistory>> {
        let offset_secs = self.store.user_utc_offset(viewer).await?.unwrap_or(0);
        let offset = FixedOffset::east_opt(offset_secs).ok_or_else(|| {
            ScreeningError::InvalidInput(format!("utc offset out of range: {offset_secs}"))
        })?;

        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
            if from > to {
                return Err(ScreeningError::InvalidInput(format!(
                    "date_from {from} is after date_to {to}"
                )));
            }
        }

        let store_filter = CheckFilter {
            user_id: filter.user_id,
            provider: filter.provider,
            status: filter.status,
            created_from: filter
                .date_from
                .map(|day| start_of_day(day, &offset))
                .transpose()?,
            created_to: filter
                .date_to
                .map(|day| start_of_day(day + Duration::days(1), &offset))
                .transpose()?,
        };

        let (checks, total) = self
            .store
            .checks_page(&store_filter, pagination.offset(), pagination.limit())
            .await?;

        let ids: Vec<_> = checks.iter().map(|c| c.id).collect();
        let mut grouped: HashMap<_, Vec<CheckHistory>> = HashMap::new();
        for row in self.store.history_for(&ids).await? {
            grouped.entry(row.check_id).or_default().push(row);
        }

        let items = checks
            .into_iter()
            .map(|check| {
                let mut history = grouped.remove(&check.id).unwrap_or_default();
                history.sort_by_key(|h| h.attempt);
                CheckWithHistory { check, history }
            })
            .collect();

        Ok(Page {
            items,
            page: pagination.page(),
            per_page: pagination.per_page(),
            total,
        })
    }
}

/// Midnight of `day` in `offset`, as a UTC instant
fn start_of_day(day: NaiveDate, offset: &FixedOffset) -> ScreeningResult<DateTime<Utc>> {
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ScreeningError::InvalidInput(format!("invalid date {day}")))?;
    offset
        .from_local_datetime(&midnight)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| ScreeningError::InvalidInput(format!("invalid date {day}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_of_day_shifts_by_offset() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let utc = start_of_day(day, &FixedOffset::east_opt(0).unwrap()).unwrap();
        assert_eq!(utc.to_rfc3339(), "2024-03-10T00:00:00+00:00");

        // UTC+3 midnight is 21:00 the previous day in UTC
        let plus3 = start_of_day(day, &FixedOffset::east_opt(3 * 3600).unwrap()).unwrap();
        assert_eq!(plus3.to_rfc3339(), "2024-03-09T21:00:00+00:00");

        let minus5 = start_of_day(day, &FixedOffset::west_opt(5 * 3600).unwrap()).unwrap();
        assert_eq!(minus5.to_rfc3339(), "2024-03-10T05:00:00+00:00");
    }
}
