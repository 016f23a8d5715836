use sqlx::postgres::PgRow;
use sqlx::{query, PgPool, Row};

use crate::catalog::{
    project_slug, validate_project, validate_tag, Image, Member, NewMember, NewProject, Project, Tag, User,
    UserAccount, UserProfile,
};

fn project_from_row(r: PgRow) -> Result<Project, sqlx::Error> {
    Ok(Project {
        id: r.try_get("id")?,
        title: r.try_get("title")?,
        created: r.try_get("created")?,
        id_created_by: r.try_get("id_created_by")?,
        slug: r.try_get("slug")?,
        description: r.try_get("description")?,
        period: r.try_get("period")?,
        start_time: r.try_get("start_time")?,
        end_time: r.try_get("end_time")?,
    })
}

fn member_from_row(r: PgRow) -> Result<Member, sqlx::Error> {
    Ok(Member {
        id: r.try_get("id")?,
        id_user: r.try_get("id_user")?,
        name: r.try_get("name")?,
        contact_info: r.try_get("contact_info")?,
    })
}

fn tag_from_row(r: PgRow) -> Result<Tag, sqlx::Error> {
    Ok(Tag {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
    })
}

fn image_from_row(r: PgRow) -> Result<Image, sqlx::Error> {
    Ok(Image {
        id: r.try_get("id")?,
        id_project: r.try_get("id_project")?,
        image: r.try_get("image")?,
    })
}

/// Creates a user and its profile in one transaction.
pub async fn create_user(conn: &PgPool, username: &str) -> anyhow::Result<UserAccount> {
    let mut tx = conn.begin().await?;

    let user = query("INSERT INTO app_user (username) VALUES ($1) RETURNING id, username;")
        .bind(username)
        .try_map(|r: PgRow| Ok(User {
            id: r.try_get("id")?,
            username: r.try_get("username")?,
        }))
        .fetch_one(&mut *tx)
        .await?;

    let profile = query("INSERT INTO user_profile (id_user, bio) VALUES ($1, '') RETURNING id, id_user, bio;")
        .bind(user.id)
        .try_map(|r: PgRow| Ok(UserProfile {
            id: r.try_get("id")?,
            id_user: r.try_get("id_user")?,
            bio: r.try_get("bio")?,
        }))
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(UserAccount {
        user,
        profile,
    })
}

pub async fn get_user_account(conn: &PgPool, id_user: i32) -> anyhow::Result<Option<UserAccount>> {
    let r = query(
        "SELECT u.id, u.username, p.id AS id_profile, p.bio
         FROM app_user u JOIN user_profile p ON p.id_user = u.id
         WHERE u.id=$1;")
        .bind(id_user)
        .try_map(|r: PgRow| Ok(UserAccount {
            user: User {
                id: r.try_get("id")?,
                username: r.try_get("username")?,
            },
            profile: UserProfile {
                id: r.try_get("id_profile")?,
                id_user: r.try_get("id")?,
                bio: r.try_get("bio")?,
            },
        }))
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn set_user_bio(conn: &PgPool, id_user: i32, bio: &str) -> anyhow::Result<bool> {
    let r = query("UPDATE user_profile SET bio=$2 WHERE id_user=$1;")
        .bind(id_user)
        .bind(bio)
        .execute(conn)
        .await?;

    Ok(r.rows_affected() > 0)
}

pub async fn add_project(conn: &PgPool, project: &NewProject) -> anyhow::Result<Project> {
    validate_project(&project.title, project.period.as_deref())?;

    let r = query(
        "INSERT INTO project (title, created, id_created_by, slug, description, period, start_time, end_time)
         VALUES ($1, NOW(), $2, $3, $4, $5, $6, $7)
         RETURNING *;")
        .bind(&project.title)
        .bind(project.id_created_by)
        .bind(project_slug(&project.title))
        .bind(&project.description)
        .bind(&project.period)
        .bind(project.start_time)
        .bind(project.end_time)
        .try_map(project_from_row)
        .fetch_one(conn)
        .await?;

    Ok(r)
}

/// Saves an edited project; the slug always follows the title.
pub async fn update_project(conn: &PgPool, project: &Project) -> anyhow::Result<Option<Project>> {
    validate_project(&project.title, project.period.as_deref())?;

    let r = query(
        "UPDATE project
         SET title=$2, slug=$3, description=$4, period=$5, start_time=$6, end_time=$7
         WHERE id=$1
         RETURNING *;")
        .bind(project.id)
        .bind(&project.title)
        .bind(project_slug(&project.title))
        .bind(&project.description)
        .bind(&project.period)
        .bind(project.start_time)
        .bind(project.end_time)
        .try_map(project_from_row)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn latest_project(conn: &PgPool) -> anyhow::Result<Option<Project>> {
    let r = query("SELECT * FROM project ORDER BY created DESC, id DESC LIMIT 1;")
        .try_map(project_from_row)
        .fetch_optional(conn)
        .await?;

    Ok(r)
}

pub async fn add_member(conn: &PgPool, member: &NewMember) -> anyhow::Result<Member> {
    member.validate()?;

    let r = query("INSERT INTO member (id_user, name, contact_info) VALUES ($1, $2, $3) RETURNING *;")
        .bind(member.id_user)
        .bind(&member.name)
        .bind(&member.contact_info)
        .try_map(member_from_row)
        .fetch_one(conn)
        .await?;

    Ok(r)
}

pub async fn add_tag(conn: &PgPool, name: &str) -> anyhow::Result<Tag> {
    validate_tag(name)?;

    let r = query("INSERT INTO tag (name) VALUES ($1) RETURNING *;")
        .bind(name)
        .try_map(tag_from_row)
        .fetch_one(conn)
        .await?;

    Ok(r)
}

pub async fn tag_project(conn: &PgPool, id_project: i32, id_tag: i32) -> anyhow::Result<()> {
    query("INSERT INTO project_tag (id_project, id_tag) VALUES ($1, $2) ON CONFLICT DO NOTHING;")
        .bind(id_project)
        .bind(id_tag)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn add_project_member(conn: &PgPool, id_project: i32, id_member: i32) -> anyhow::Result<()> {
    query("INSERT INTO project_member (id_project, id_member) VALUES ($1, $2) ON CONFLICT DO NOTHING;")
        .bind(id_project)
        .bind(id_member)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn add_project_image(conn: &PgPool, id_project: i32, image: &str) -> anyhow::Result<Image> {
    let r = query("INSERT INTO project_image (id_project, image) VALUES ($1, $2) RETURNING *;")
        .bind(id_project)
        .bind(image)
        .try_map(image_from_row)
        .fetch_one(conn)
        .await?;

    Ok(r)
}

pub async fn project_tags(conn: &PgPool, id_project: i32) -> anyhow::Result<Vec<Tag>> {
    let r = query(
        "SELECT t.* FROM tag t JOIN project_tag pt ON pt.id_tag = t.id
         WHERE pt.id_project=$1 ORDER BY t.id;")
        .bind(id_project)
        .try_map(tag_from_row)
        .fetch_all(conn)
        .await?;

    Ok(r)
}

pub async fn project_members(conn: &PgPool, id_project: i32) -> anyhow::Result<Vec<Member>> {
    let r = query(
        "SELECT m.* FROM member m JOIN project_member pm ON pm.id_member = m.id
         WHERE pm.id_project=$1 ORDER BY m.id;")
        .bind(id_project)
        .try_map(member_from_row)
        .fetch_all(conn)
        .await?;

    Ok(r)
}

/// Projects the member belongs to.
pub async fn member_projects(conn: &PgPool, id_member: i32) -> anyhow::Result<Vec<Project>> {
    let r = query(
        "SELECT p.* FROM project p JOIN project_member pm ON pm.id_project = p.id
         WHERE pm.id_member=$1 ORDER BY p.id;")
        .bind(id_member)
        .try_map(project_from_row)
        .fetch_all(conn)
        .await?;

    Ok(r)
}

pub async fn project_images(conn: &PgPool, id_project: i32) -> anyhow::Result<Vec<Image>> {
    let r = query("SELECT * FROM project_image WHERE id_project=$1 ORDER BY id;")
        .bind(id_project)
        .try_map(image_from_row)
        .fetch_all(conn)
        .await?;

    Ok(r)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::db::model::tests::test_client;

    #[tokio::test]
    async fn test_create_user_creates_profile() {
        let Some(db) = test_client().await else { return };
        let username = format!("user-{}", Uuid::new_v4().simple());

        let account = create_user(db.conn(), &username).await.unwrap();
        assert_eq!(account.profile.id_user, account.user.id);
        assert_eq!(account.to_string(), format!("{}'s profile", username));

        assert!(set_user_bio(db.conn(), account.user.id, "hi").await.unwrap());
        let loaded = get_user_account(db.conn(), account.user.id).await.unwrap().unwrap();
        assert_eq!(loaded.profile.bio, "hi");
    }

    #[tokio::test]
    async fn test_project_associations() {
        let Some(db) = test_client().await else { return };
        let owner = create_user(db.conn(), &format!("owner-{}", Uuid::new_v4().simple())).await.unwrap();

        let project = add_project(db.conn(), &NewProject::new("Image Polls, Again!", owner.user.id)).await.unwrap();
        assert_eq!(project.slug, "image-polls-again");
        assert_eq!(project.period.as_deref(), Some("fall2012"));
        assert_eq!(latest_project(db.conn()).await.unwrap().unwrap().id, project.id);

        let mut edited = project.clone();
        edited.title = "Renamed".to_owned();
        let edited = update_project(db.conn(), &edited).await.unwrap().unwrap();
        assert_eq!(edited.slug, "renamed");

        let tag = add_tag(db.conn(), "rust").await.unwrap();
        tag_project(db.conn(), project.id, tag.id).await.unwrap();
        tag_project(db.conn(), project.id, tag.id).await.unwrap();
        assert_eq!(project_tags(db.conn(), project.id).await.unwrap(), vec![tag]);

        let member = add_member(db.conn(), &NewMember {
            id_user: Some(owner.user.id),
            name: "Owner".to_owned(),
            contact_info: None,
        }).await.unwrap();
        add_project_member(db.conn(), project.id, member.id).await.unwrap();
        assert_eq!(project_members(db.conn(), project.id).await.unwrap(), vec![member.clone()]);
        assert_eq!(member_projects(db.conn(), member.id).await.unwrap()[0].id, project.id);

        let image = add_project_image(db.conn(), project.id, "/media/images/a.png").await.unwrap();
        assert_eq!(project_images(db.conn(), project.id).await.unwrap(), vec![image]);
    }

    #[tokio::test]
    async fn test_add_project_rejects_long_title() {
        let Some(db) = test_client().await else { return };

        assert!(add_project(db.conn(), &NewProject::new(&"x".repeat(141), 1)).await.is_err());
    }
}
