// 🔎 Query/Filter Service - "my sheets" listing and person suggestions

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::access::Caller;
use crate::directory::PersonDirectory;
use crate::error::{DomainError, Result};
use crate::model::{PersonSummary, SheetSummary};
use crate::store::{SheetFilter, Store, TextNeedle};

/// Shortest term the suggestion feed answers
pub const SUGGEST_MIN_CHARS: usize = 2;
pub const SUGGEST_LIMIT: usize = 10;

/// Raw listing parameters as they arrive from the query string.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub text: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Clone)]
pub struct SheetQueries {
    store: Arc<dyn Store>,
    directory: PersonDirectory,
}

impl SheetQueries {
    pub fn new(store: Arc<dyn Store>) -> Self {
        SheetQueries {
            directory: PersonDirectory::new(store.clone()),
            store,
        }
    }

    /// Sheets where the caller is seller or buyer, newest first.
    pub fn list_for_caller(&self, caller: &Caller, query: &ListQuery) -> Result<Vec<SheetSummary>> {
        let Some(person_id) = caller.person_id else {
            debug!("Caller {} has no person, empty listing", caller.subject_id);
            return Ok(Vec::new());
        };

        let filter = SheetFilter {
            person_id,
            text: query.text.as_deref().and_then(TextNeedle::new),
            from: parse_bound(query.date_from.as_deref(), Bound::Start)?,
            to: parse_bound(query.date_to.as_deref(), Bound::End)?,
        };

        Ok(self.store.list_sheets(&filter)?)
    }

    pub fn suggest_persons(&self, term: &str) -> Result<Vec<PersonSummary>> {
        let term = term.trim();
        if term.chars().count() < SUGGEST_MIN_CHARS {
            return Ok(Vec::new());
        }
        self.directory.search(term, SUGGEST_LIMIT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    Start,
    End,
}

/// `YYYY-MM-DD` covers the whole UTC day (start or end of it depending on
/// the bound); a full RFC 3339 instant is used as is. Blank means no bound.
fn parse_bound(value: Option<&str>, bound: Bound) -> Result<Option<DateTime<Utc>>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let (h, m, s, ms) = match bound {
            Bound::Start => (0, 0, 0, 0),
            Bound::End => (23, 59, 59, 999),
        };
        let time = NaiveTime::from_hms_milli_opt(h, m, s, ms)
            .ok_or_else(|| DomainError::Internal("invalid day boundary".to_string()))?;
        return Ok(Some(date.and_time(time).and_utc()));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|_| {
            DomainError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", value))
        })
}
