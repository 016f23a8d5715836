pub mod catalog;
pub mod dbclient;
pub mod memory;
pub mod model;
pub mod schema;

use async_trait::async_trait;

use crate::db::schema::{Choice, ListWindow, Test};

/// Storage of tests and their choices.
///
/// A test and its choices become visible together, and `add_vote` must be a
/// single atomic increment so concurrent votes are never lost.
#[async_trait]
pub trait TestStore: Send + Sync {
    async fn add_test(&self, question: &str, images: &[String]) -> anyhow::Result<Test>;

    async fn list_tests(&self, window: &ListWindow) -> anyhow::Result<Vec<Test>>;

    async fn get_choice(&self, id: i32) -> anyhow::Result<Option<Choice>>;

    /// Ids of every choice belonging to the test.
    async fn test_choice_ids(&self, id_test: i32) -> anyhow::Result<Vec<i32>>;

    /// Returns the new vote count, or `None` if the choice does not exist.
    async fn add_vote(&self, id: i32) -> anyhow::Result<Option<i32>>;
}
