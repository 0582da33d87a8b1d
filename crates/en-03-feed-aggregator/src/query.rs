//! Feed read predicates.

use chrono::{DateTime, Utc};
use en_01_lifecycle::QueryFilter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared_types::{BooleanFilter, FilterParams, Status, Visibility};

/// Predicates of a feed read.
///
/// Unset `status` means PENDING, unset `visibility` means SHOW and unset
/// `expired` means not yet expired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub persistent: BooleanFilter,
    pub status: Option<Status>,
    pub visibility: Option<Visibility>,
    pub expired: Option<BooleanFilter>,
    pub filter_params: Option<FilterParams>,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self::new(BooleanFilter::Both)
    }
}

impl FeedQuery {
    pub fn new(persistent: BooleanFilter) -> Self {
        Self {
            persistent,
            status: None,
            visibility: None,
            expired: None,
            filter_params: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_expired(mut self, expired: BooleanFilter) -> Self {
        self.expired = Some(expired);
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_params = Some(FilterParams {
            labels: labels.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// The plain "show me my feed" read that may trigger default seeding.
    pub fn is_unfiltered(&self) -> bool {
        self.persistent == BooleanFilter::Both
            && self.status.is_none()
            && self.visibility.is_none()
            && self.expired.is_none()
            && self.filter_params.is_none()
    }

    fn labels(&self) -> &[String] {
        self.filter_params
            .as_ref()
            .map_or(&[], |params| params.labels.as_slice())
    }

    fn lifecycle_filters(&self, now: DateTime<Utc>) -> Vec<QueryFilter> {
        let status = self.status.unwrap_or(Status::Pending);
        let visibility = self.visibility.unwrap_or(Visibility::Show);
        let mut filters = vec![
            QueryFilter::eq("status", status.as_str()),
            QueryFilter::eq("visibility", visibility.as_str()),
        ];
        let now = Value::String(now.to_rfc3339());
        match self.expired.unwrap_or(BooleanFilter::False) {
            BooleanFilter::True => filters.push(QueryFilter::lte("expiry", now)),
            BooleanFilter::False => filters.push(QueryFilter::gte("expiry", now)),
            BooleanFilter::Both => {}
        }
        filters
    }

    pub fn item_filters(&self, now: DateTime<Utc>) -> Vec<QueryFilter> {
        let mut filters = self.lifecycle_filters(now);
        match self.persistent {
            BooleanFilter::True => filters.push(QueryFilter::eq("persistent", true)),
            BooleanFilter::False => filters.push(QueryFilter::eq("persistent", false)),
            BooleanFilter::Both => {}
        }
        let labels = self.labels();
        if !labels.is_empty() {
            filters.push(QueryFilter::one_of(
                "label",
                labels.iter().cloned().map(Value::String).collect(),
            ));
        }
        filters
    }

    /// Nudges share the status, visibility and expiry predicates.
    pub fn nudge_filters(&self, now: DateTime<Utc>) -> Vec<QueryFilter> {
        self.lifecycle_filters(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use en_01_lifecycle::FilterOp;

    #[test]
    fn test_defaults_filter_pending_shown_unexpired() {
        let filters = FeedQuery::default().item_filters(Utc::now());
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[0].value, Value::String("PENDING".into()));
        assert_eq!(filters[1].value, Value::String("SHOW".into()));
        assert_eq!(filters[2].op, FilterOp::Gte);
    }

    #[test]
    fn test_both_disables_dimension() {
        let query = FeedQuery::new(BooleanFilter::Both).with_expired(BooleanFilter::Both);
        let filters = query.item_filters(Utc::now());
        assert!(filters.iter().all(|f| f.field != "expiry"));
        assert!(filters.iter().all(|f| f.field != "persistent"));
        assert!(!query.is_unfiltered());
    }

    #[test]
    fn test_labels_are_or_matched() {
        let query = FeedQuery::new(BooleanFilter::True).with_labels(["WELCOME", "NEWS"]);
        let filters = query.item_filters(Utc::now());
        let label = filters.iter().find(|f| f.field == "label").unwrap();
        assert_eq!(label.op, FilterOp::In);
        assert_eq!(label.value.as_array().unwrap().len(), 2);
        assert!(query.nudge_filters(Utc::now()).iter().all(|f| f.field != "label"));
    }

    #[test]
    fn test_only_plain_read_is_unfiltered() {
        assert!(FeedQuery::default().is_unfiltered());
        assert!(!FeedQuery::new(BooleanFilter::True).is_unfiltered());
        assert!(!FeedQuery::default()
            .with_status(Status::Done)
            .is_unfiltered());
    }
}
