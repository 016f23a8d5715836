use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{query, PgPool, Row};
use tokio_stream::StreamExt;

use crate::db::dbclient::DBClient;
use crate::db::schema::{Choice, ListWindow, Since, Test};
use crate::db::TestStore;

fn test_from_row(r: PgRow) -> Result<Test, sqlx::Error> {
    Ok(Test {
        id: r.try_get("id")?,
        question: r.try_get("question")?,
        creation_date: r.try_get("creation_date")?,
        pub_date: r.try_get("pub_date")?,
        choices: Vec::new(),
    })
}

fn choice_from_row(r: PgRow) -> Result<Choice, sqlx::Error> {
    Ok(Choice {
        id: r.try_get("id")?,
        id_test: r.try_get("id_test")?,
        image: r.try_get("image")?,
        votes: r.try_get("votes")?,
        position: r.try_get("position")?,
    })
}

pub async fn list_tests(conn: &PgPool, window: &ListWindow) -> anyhow::Result<Vec<Test>> {
    let (since_date, since_id) = match window.since {
        Since::All => (None, None),
        Since::Date(v) => (Some(v), None),
        Since::Id(v) => (None, Some(v)),
    };

    let mut stream = query(
        "SELECT id, question, creation_date, pub_date FROM test
         WHERE ($1::timestamptz IS NULL OR creation_date > $1)
           AND ($2::int4 IS NULL OR id > $2)
         ORDER BY pub_date, id
         OFFSET $3 LIMIT $4;")
        .bind(since_date)
        .bind(since_id)
        .bind(window.offset)
        .bind(window.limit)
        .try_map(test_from_row)
        .fetch(conn);

    let mut result = Vec::new();
    while let Some(mut row) = stream.try_next().await? {
        row.choices = get_test_choices(conn, row.id).await?;
        result.push(row);
    }

    Ok(result)
}

pub async fn get_test_choices(conn: &PgPool, id_test: i32) -> anyhow::Result<Vec<Choice>> {
    let choices = query("SELECT * FROM choice WHERE id_test=$1 ORDER BY position, id;")
        .bind(id_test)
        .try_map(choice_from_row)
        .fetch_all(conn)
        .await?;

    Ok(choices)
}

pub async fn add_test(conn: &PgPool, question: &str, images: &[String]) -> anyhow::Result<Test> {
    let mut tx = conn.begin().await?;

    let mut test = query(
        "INSERT INTO test (question, creation_date, pub_date)
         VALUES ($1, NOW(), NOW())
         RETURNING id, question, creation_date, pub_date;")
        .bind(question)
        .try_map(test_from_row)
        .fetch_one(&mut *tx)
        .await?;

    for (position, image) in images.iter().enumerate() {
        let choice = query(
            "INSERT INTO choice (id_test, image, votes, position)
             VALUES ($1, $2, 0, $3)
             RETURNING *;")
            .bind(test.id)
            .bind(image)
            .bind(position as i32)
            .try_map(choice_from_row)
            .fetch_one(&mut *tx)
            .await?;

        test.choices.push(choice);
    }

    tx.commit().await?;

    Ok(test)
}

pub async fn get_choice(conn: &PgPool, id: i32) -> anyhow::Result<Option<Choice>> {
    let r = query("SELECT * FROM choice WHERE id=$1;")
        .bind(id)
        .try_map(choice_from_row)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn get_test_choice_ids(conn: &PgPool, id_test: i32) -> anyhow::Result<Vec<i32>> {
    let ids = query("SELECT id FROM choice WHERE id_test=$1;")
        .bind(id_test)
        .try_map(|r: PgRow| r.try_get::<i32, _>("id"))
        .fetch_all(conn)
        .await?;

    Ok(ids)
}

pub async fn add_vote(conn: &PgPool, id: i32) -> anyhow::Result<Option<i32>> {
    let r = query("UPDATE choice SET votes = votes + 1 WHERE id=$1 RETURNING votes;")
        .bind(id)
        .try_map(|r: PgRow| r.try_get::<i32, _>("votes"))
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

#[async_trait]
impl TestStore for DBClient {
    async fn add_test(&self, question: &str, images: &[String]) -> anyhow::Result<Test> {
        add_test(self.conn(), question, images).await
    }

    async fn list_tests(&self, window: &ListWindow) -> anyhow::Result<Vec<Test>> {
        list_tests(self.conn(), window).await
    }

    async fn get_choice(&self, id: i32) -> anyhow::Result<Option<Choice>> {
        get_choice(self.conn(), id).await
    }

    async fn test_choice_ids(&self, id_test: i32) -> anyhow::Result<Vec<i32>> {
        get_test_choice_ids(self.conn(), id_test).await
    }

    async fn add_vote(&self, id: i32) -> anyhow::Result<Option<i32>> {
        add_vote(self.conn(), id).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::env;
    use std::sync::Arc;

    use super::*;
    use crate::db::TestStore;

    /// Connects to the database named by `PICPOLL_TEST_DATABASE_URL`, if any.
    pub(crate) async fn test_client() -> Option<DBClient> {
        let url = env::var("PICPOLL_TEST_DATABASE_URL").ok()?;

        let client = DBClient::new(&url).await.expect("failed to connect to test database");
        client.prepare().await.expect("failed to prepare test database");

        Some(client)
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let Some(db) = test_client().await else { return };

        let before = db.add_test("before", &["a.png".to_owned(), "b.png".to_owned()]).await.unwrap();
        let created = db.add_test("which?", &["c.png".to_owned(), "d.png".to_owned(), "e.png".to_owned()]).await.unwrap();

        assert_eq!(created.choices.len(), 3);
        assert!(created.choices.iter().all(|c| c.votes == 0 && c.id_test == created.id));

        let window = ListWindow { since: Since::Id(before.id), offset: 0, limit: 100 };
        let listed = db.list_tests(&window).await.unwrap();

        assert!(listed.iter().all(|t| t.id > before.id));
        let found = listed.iter().find(|t| t.id == created.id).unwrap();
        let images = found.choices.iter().map(|c| c.image.as_str()).collect::<Vec<_>>();
        assert_eq!(images, vec!["c.png", "d.png", "e.png"]);
    }

    #[tokio::test]
    async fn test_concurrent_votes_are_not_lost() {
        let Some(db) = test_client().await else { return };
        let db = Arc::new(db);

        let test = db.add_test("", &["x.png".to_owned(), "y.png".to_owned()]).await.unwrap();
        let id = test.choices[0].id;

        let votes = (0..20).map(|_| {
            let db = db.clone();
            tokio::spawn(async move { db.add_vote(id).await.unwrap() })
        });
        futures::future::join_all(votes).await;

        let choice = db.get_choice(id).await.unwrap().unwrap();
        assert_eq!(choice.votes, 20);
        assert_eq!(db.test_choice_ids(test.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_vote_on_missing_choice() {
        let Some(db) = test_client().await else { return };

        assert_eq!(db.add_vote(i32::MAX).await.unwrap(), None);
        assert!(db.get_choice(i32::MAX).await.unwrap().is_none());
    }
}
