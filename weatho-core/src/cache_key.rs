use chrono::NaiveDate;

use crate::{model::Location, provider::ProviderId};

/// File name under which one day of `provider` data for `location` is kept:
/// `{prefix}_{lat},{lon},{YYYY-MM-DD}.json`.
pub fn cache_key(location: &Location, date: NaiveDate, provider: ProviderId) -> String {
    format!(
        "{}_{},{}.json",
        provider.spec().file_prefix,
        location.coordinates(),
        date.format("%Y-%m-%d")
    )
}
