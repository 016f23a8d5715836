use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use itertools::Itertools;

use crate::db::schema::{Choice, ListWindow, Test};
use crate::db::TestStore;

/// In-process test store, used when no database is configured.
#[derive(Default)]
pub struct MemoryStore {
    tests: DashMap<i32, Test>,
    choices: DashMap<i32, Choice>,
    test_seq: AtomicI32,
    choice_seq: AtomicI32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Choices held on a stored test are creation snapshots; vote counts live in `choices`.
    fn current_choices(&self, test: &Test) -> Vec<Choice> {
        test.choices.iter()
            .filter_map(|c| self.choices.get(&c.id).map(|entry| entry.value().clone()))
            .collect()
    }
}

#[async_trait]
impl TestStore for MemoryStore {
    async fn add_test(&self, question: &str, images: &[String]) -> anyhow::Result<Test> {
        let id = self.test_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();

        let mut choices = Vec::new();
        for (position, image) in images.iter().enumerate() {
            let choice = Choice {
                id: self.choice_seq.fetch_add(1, Ordering::SeqCst) + 1,
                id_test: id,
                image: image.to_owned(),
                votes: 0,
                position: position as i32,
            };

            self.choices.insert(choice.id, choice.clone());
            choices.push(choice);
        }

        let test = Test {
            id,
            question: question.to_owned(),
            creation_date: now,
            pub_date: now,
            choices,
        };

        // The test is only listed once all of its choices exist.
        self.tests.insert(id, test.clone());

        Ok(test)
    }

    async fn list_tests(&self, window: &ListWindow) -> anyhow::Result<Vec<Test>> {
        let selected = self.tests.iter()
            .filter(|entry| window.since.admits(entry.value()))
            .map(|entry| entry.value().clone())
            .sorted_by_key(|t| (t.pub_date, t.id))
            .skip(window.offset as usize)
            .take(window.limit as usize)
            .collect::<Vec<Test>>();

        let mut result = Vec::new();
        for mut test in selected {
            test.choices = self.current_choices(&test);
            result.push(test);
        }

        Ok(result)
    }

    async fn get_choice(&self, id: i32) -> anyhow::Result<Option<Choice>> {
        Ok(self.choices.get(&id).map(|entry| entry.value().clone()))
    }

    async fn test_choice_ids(&self, id_test: i32) -> anyhow::Result<Vec<i32>> {
        let ids = match self.tests.get(&id_test) {
            None => Vec::new(),
            Some(test) => test.choices.iter().map(|c| c.id).collect(),
        };

        Ok(ids)
    }

    async fn add_vote(&self, id: i32) -> anyhow::Result<Option<i32>> {
        let votes = self.choices.get_mut(&id).map(|mut entry| {
            entry.votes += 1;
            entry.votes
        });

        Ok(votes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::schema::Since;

    fn images(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("/media/images/{}.png", i)).collect()
    }

    #[tokio::test]
    async fn test_add_test_assigns_ids_in_order() {
        let store = MemoryStore::new();

        let first = store.add_test("first", &images(2)).await.unwrap();
        let second = store.add_test("second", &images(3)).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(second.choices.iter().map(|c| c.id).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(second.choices.iter().map(|c| c.position).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(second.choices.iter().all(|c| c.votes == 0 && c.id_test == second.id));
    }

    #[tokio::test]
    async fn test_list_window() {
        let store = MemoryStore::new();
        for i in 0..8 {
            store.add_test(&format!("q{}", i), &images(2)).await.unwrap();
        }

        let page = store.list_tests(&ListWindow::default()).await.unwrap();
        assert_eq!(page.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

        let window = ListWindow { since: Since::Id(6), offset: 0, limit: 5 };
        let page = store.list_tests(&window).await.unwrap();
        assert_eq!(page.iter().map(|t| t.id).collect::<Vec<_>>(), vec![7, 8]);

        let window = ListWindow { since: Since::All, offset: 6, limit: 5 };
        let page = store.list_tests(&window).await.unwrap();
        assert_eq!(page.iter().map(|t| t.id).collect::<Vec<_>>(), vec![7, 8]);
    }

    #[tokio::test]
    async fn test_listing_reflects_votes() {
        let store = MemoryStore::new();
        let test = store.add_test("", &images(2)).await.unwrap();

        assert_eq!(store.add_vote(test.choices[1].id).await.unwrap(), Some(1));
        assert_eq!(store.add_vote(test.choices[1].id).await.unwrap(), Some(2));

        let listed = store.list_tests(&ListWindow::default()).await.unwrap();
        assert_eq!(listed[0].choices[1].votes, 2);
        assert_eq!(listed[0].choices[0].votes, 0);
    }

    #[tokio::test]
    async fn test_vote_on_missing_choice() {
        let store = MemoryStore::new();

        assert_eq!(store.add_vote(42).await.unwrap(), None);
        assert!(store.test_choice_ids(42).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_votes_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let test = store.add_test("", &images(2)).await.unwrap();
        let id = test.choices[0].id;

        let votes = (0..100).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.add_vote(id).await.unwrap() })
        });
        futures::future::join_all(votes).await;

        assert_eq!(store.get_choice(id).await.unwrap().unwrap().votes, 100);
    }
}
