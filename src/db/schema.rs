use chrono::{DateTime, Utc};

#[derive(Clone, Debug)]
pub struct Test {
    pub id: i32,
    pub question: String,
    pub creation_date: DateTime<Utc>,
    pub pub_date: DateTime<Utc>,
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Choice {
    pub id: i32,
    pub id_test: i32,
    pub image: String,
    pub votes: i32,
    /// Creation order within the owning test.
    pub position: i32,
}

/// "Newer than" filter of a listing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Since {
    All,
    Date(DateTime<Utc>),
    Id(i32),
}

/// Page size when a listing does not ask for one.
pub const DEFAULT_LIMIT: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ListWindow {
    pub since: Since,
    pub offset: i64,
    pub limit: i64,
}

impl Default for ListWindow {
    fn default() -> Self {
        Self {
            since: Since::All,
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Since {
    pub fn admits(&self, test: &Test) -> bool {
        match self {
            Since::All => true,
            Since::Date(since) => test.creation_date > *since,
            Since::Id(since_id) => test.id > *since_id,
        }
    }
}
