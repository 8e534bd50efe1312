//! Home page loader: the site owner's current age plus cache headers.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Header attached to every page response.
pub const CACHE_CONTROL: (&str, &str) = ("cache-control", "public, max-age=3600");

/// The fixed birthday the age is computed from.
pub const BIRTHDAY: NaiveDate = match NaiveDate::from_ymd_opt(2006, 4, 7) {
    Some(date) => date,
    None => panic!("invalid birthday"),
};

/// Data handed to the home page template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomePage {
    pub age: u32,
}

/// A loader response: headers plus page data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResponse {
    pub headers: Vec<(String, String)>,
    pub data: HomePage,
}

/// Whole years between `born` and `today`; zero if `today` is earlier.
pub fn age_on(born: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Build the home page response for `today`.
pub fn load(today: NaiveDate) -> PageResponse {
    let (name, value) = CACHE_CONTROL;
    PageResponse {
        headers: vec![(name.to_string(), value.to_string())],
        data: HomePage {
            age: age_on(BIRTHDAY, today),
        },
    }
}
