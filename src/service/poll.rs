use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::schema::{Choice, ListWindow, Since, Test, DEFAULT_LIMIT};
use crate::db::TestStore;
use crate::error::{PollError, PollResult};
use crate::media::ImageStorage;

pub const NEED_CHOICES: &str = "We need multiple choices!";

/// Format of the `since` filter.
pub const SINCE_FORMAT: &str = "%Y-%m-%d %H:%M:%SZ";
const PUB_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f%:z";
const PUB_DATE_FORMAT_WHOLE: &str = "%Y-%m-%d %H:%M:%S%:z";

/// `2012-11-03 14:22:10.001500+00:00`, or `2012-11-03 14:22:10+00:00` on a
/// whole second.
pub fn format_pub_date(date: &DateTime<Utc>) -> String {
    if date.nanosecond() / 1_000 == 0 {
        date.format(PUB_DATE_FORMAT_WHOLE).to_string()
    } else {
        date.format(PUB_DATE_FORMAT).to_string()
    }
}

pub struct Upload {
    pub field: String,
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Raw listing parameters, as found in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub since: Option<String>,
    pub since_id: Option<String>,
    pub offset: Option<String>,
    pub limit: Option<String>,
}

fn parse_count(name: &str, value: Option<&str>, default: i64) -> PollResult<i64> {
    let value = match value {
        None => return Ok(default),
        Some(v) => v,
    };

    match value.trim().parse::<i64>() {
        Ok(v) if v >= 0 => Ok(v),
        _ => Err(PollError::Parse(format!("'{}' must be a non-negative integer; got '{}'.", name, value))),
    }
}

impl ListQuery {
    pub fn window(&self) -> PollResult<ListWindow> {
        // `since` takes precedence when both filters are given.
        let since = if let Some(since) = &self.since {
            let date = NaiveDateTime::parse_from_str(since, SINCE_FORMAT).map_err(|_| {
                PollError::Parse(format!("'since' must look like YYYY-MM-DD HH:MM:SSZ; got '{}'.", since))
            })?;
            Since::Date(Utc.from_utc_datetime(&date))
        } else if let Some(since_id) = &self.since_id {
            let id = since_id.trim().parse::<i32>().map_err(|_| {
                PollError::Parse(format!("'since_id' must be an integer; got '{}'.", since_id))
            })?;
            Since::Id(id)
        } else {
            Since::All
        };

        Ok(ListWindow {
            since,
            offset: parse_count("offset", self.offset.as_deref(), 0)?,
            limit: parse_count("limit", self.limit.as_deref(), DEFAULT_LIMIT)?,
        })
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ChoiceView {
    pub id: i32,
    pub image: String,
}

/// Public shape of a test; vote counts are left out.
#[derive(Debug, PartialEq, Serialize)]
pub struct TestView {
    pub id: i32,
    pub pub_date: String,
    pub question: String,
    pub choices: Vec<ChoiceView>,
}

impl From<&Choice> for ChoiceView {
    fn from(choice: &Choice) -> Self {
        Self {
            id: choice.id,
            image: choice.image.clone(),
        }
    }
}

impl From<&Test> for TestView {
    fn from(test: &Test) -> Self {
        let mut choices = test.choices.iter().collect::<Vec<&Choice>>();
        choices.sort_by_key(|c| (c.position, c.id));

        Self {
            id: test.id,
            pub_date: format_pub_date(&test.pub_date),
            question: test.question.clone(),
            choices: choices.into_iter().map(ChoiceView::from).collect(),
        }
    }
}

/// Keeps one upload per field name: the last file sent under a name, in the
/// position where that name first appeared.
pub fn dedupe_uploads(uploads: Vec<Upload>) -> Vec<Upload> {
    let mut result: Vec<Upload> = Vec::new();

    for upload in uploads {
        match result.iter_mut().find(|u| u.field == upload.field) {
            None => result.push(upload),
            Some(existing) => *existing = upload,
        }
    }

    result
}

pub async fn create_test(
    store: &dyn TestStore,
    images: &dyn ImageStorage,
    question: &str,
    uploads: Vec<Upload>,
) -> PollResult<Test> {
    let uploads = dedupe_uploads(uploads);

    if uploads.len() < 2 {
        info!(uploads = uploads.len(), "Rejected test with fewer than 2 choices");
        return Err(PollError::Validation(NEED_CHOICES));
    }

    let mut urls = Vec::new();
    for upload in &uploads {
        urls.push(images.save(&upload.file_name, &upload.data).await?);
    }

    let test = store.add_test(question, &urls).await?;

    info!(test_id = test.id, choices = test.choices.len(), "Created test");

    Ok(test)
}

pub async fn list_tests(store: &dyn TestStore, query: &ListQuery) -> PollResult<Vec<Test>> {
    let window = match query.window() {
        Ok(v) => v,
        Err(e) => {
            info!(error = %e, "Rejected test listing");
            return Err(e);
        }
    };

    Ok(store.list_tests(&window).await?)
}
