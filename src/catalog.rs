//! Project catalog: projects, their members, tags and images, and user
//! profiles. Persistence lives in [`crate::db::catalog`].

use std::fmt;

use anyhow::bail;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

pub const PROJECT_TITLE_MAX: usize = 140;
pub const PROJECT_PERIOD_MAX: usize = 100;
pub const MEMBER_NAME_MAX: usize = 140;
pub const CONTACT_INFO_MAX: usize = 256;
pub const TAG_NAME_MAX: usize = 30;
pub const SLUG_MAX: usize = 50;
pub const DEFAULT_PERIOD: &str = "fall2012";

static SLUG_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s-]").unwrap());
static SLUG_DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

/// URL slug of a title: lowercase ASCII words joined by `-`. Accented letters
/// keep their base letter; anything else outside ASCII is dropped.
pub fn slugify(value: &str) -> String {
    let value = value.nfkd()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_lowercase();

    let value = SLUG_STRIP.replace_all(&value, "");
    let value = SLUG_DASHES.replace_all(&value, "-");

    value.trim_matches(|c| c == '-' || c == '_').to_owned()
}

pub fn project_slug(title: &str) -> String {
    slugify(title).chars().take(SLUG_MAX).collect()
}

fn check_len(field: &str, value: &str, max: usize) -> anyhow::Result<()> {
    let len = value.chars().count();
    if len > max {
        bail!("{} is {} characters long; at most {} are allowed", field, len, max);
    }

    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: i32,
    pub username: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub id: i32,
    pub id_user: i32,
    pub bio: String,
}

/// A user together with its profile; one never exists without the other.
#[derive(Clone, Debug, PartialEq)]
pub struct UserAccount {
    pub user: User,
    pub profile: UserProfile,
}

impl fmt::Display for UserAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}'s profile", self.user.username)
    }
}

pub struct NewProject {
    pub title: String,
    pub id_created_by: i32,
    pub description: String,
    pub period: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl NewProject {
    pub fn new(title: &str, id_created_by: i32) -> Self {
        Self {
            title: title.to_owned(),
            id_created_by,
            description: String::new(),
            period: Some(DEFAULT_PERIOD.to_owned()),
            start_time: None,
            end_time: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Project {
    pub id: i32,
    pub title: String,
    pub created: DateTime<Utc>,
    pub id_created_by: i32,
    pub slug: String,
    pub description: String,
    pub period: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Project {
    pub fn absolute_url(&self) -> String {
        format!("?project={}", self.id)
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}

pub fn validate_project(title: &str, period: Option<&str>) -> anyhow::Result<()> {
    check_len("Project title", title, PROJECT_TITLE_MAX)?;
    if let Some(period) = period {
        check_len("Project period", period, PROJECT_PERIOD_MAX)?;
    }

    Ok(())
}

pub struct NewMember {
    pub id_user: Option<i32>,
    pub name: String,
    pub contact_info: Option<String>,
}

impl NewMember {
    pub fn validate(&self) -> anyhow::Result<()> {
        check_len("Member name", &self.name, MEMBER_NAME_MAX)?;
        if let Some(contact_info) = &self.contact_info {
            check_len("Member contact info", contact_info, CONTACT_INFO_MAX)?;
        }

        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    pub id: i32,
    pub id_user: Option<i32>,
    pub name: String,
    /// Email, website or any other handle.
    pub contact_info: Option<String>,
}

impl Member {
    pub fn absolute_url(&self) -> String {
        format!("?member={}", self.id)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.contact_info.as_deref() {
            Some(contact) if !contact.is_empty() => write!(f, "{} ({})", self.name, contact),
            _ => write!(f, "{}", self.name),
        }
    }
}

pub fn validate_tag(name: &str) -> anyhow::Result<()> {
    check_len("Tag name", name, TAG_NAME_MAX)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Tag {
    pub id: i32,
    pub name: String,
}

impl Tag {
    pub fn absolute_url(&self) -> String {
        format!("?tag={}", self.name)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub id: i32,
    pub id_project: i32,
    /// URL returned by the image storage.
    pub image: String,
}

impl Image {
    pub fn absolute_url(&self) -> &str {
        &self.image
    }

    pub fn file_name(&self) -> &str {
        self.image.rsplit('/').next().unwrap_or_default()
    }

    pub fn label(&self, project: &Project) -> String {
        format!("{}: {}", project.title, self.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(title: &str) -> Project {
        Project {
            id: 7,
            title: title.to_owned(),
            created: Utc::now(),
            id_created_by: 1,
            slug: project_slug(title),
            description: String::new(),
            period: Some(DEFAULT_PERIOD.to_owned()),
            start_time: None,
            end_time: None,
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  Rust & Python: a tale!  "), "rust-python-a-tale");
        assert_eq!(slugify("multi---dash  space"), "multi-dash-space");
        assert_eq!(slugify("_under_score_"), "under_score");
        assert_eq!(slugify("Café"), "cafe");
        assert_eq!(slugify("Café Crème"), "cafe-creme");
        assert_eq!(slugify("ﬁne Straße"), "fine-strae");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_project_slug_is_truncated() {
        let title = "word ".repeat(30);
        let slug = project_slug(&title);

        assert_eq!(slug.chars().count(), SLUG_MAX);
        assert!(slug.starts_with("word-word-"));
    }

    #[test]
    fn test_display_and_urls() {
        let p = project("Poll Pix");
        assert_eq!(p.to_string(), "Poll Pix");
        assert_eq!(p.absolute_url(), "?project=7");

        let mut m = Member { id: 3, id_user: None, name: "Ada".to_owned(), contact_info: None };
        assert_eq!(m.to_string(), "Ada");
        m.contact_info = Some("ada@example.com".to_owned());
        assert_eq!(m.to_string(), "Ada (ada@example.com)");
        assert_eq!(m.absolute_url(), "?member=3");

        let t = Tag { id: 1, name: "rust".to_owned() };
        assert_eq!(t.to_string(), "rust");
        assert_eq!(t.absolute_url(), "?tag=rust");

        let i = Image { id: 1, id_project: 7, image: "/media/images/abc-shot.png".to_owned() };
        assert_eq!(i.absolute_url(), "/media/images/abc-shot.png");
        assert_eq!(i.label(&p), "Poll Pix: abc-shot.png");

        let account = UserAccount {
            user: User { id: 1, username: "ada".to_owned() },
            profile: UserProfile { id: 1, id_user: 1, bio: String::new() },
        };
        assert_eq!(account.to_string(), "ada's profile");
    }

    #[test]
    fn test_field_limits() {
        assert!(validate_project(&"x".repeat(PROJECT_TITLE_MAX), None).is_ok());
        assert!(validate_project(&"x".repeat(PROJECT_TITLE_MAX + 1), None).is_err());
        assert!(validate_project("ok", Some("p".repeat(PROJECT_PERIOD_MAX + 1).as_str())).is_err());
        assert!(validate_tag(&"t".repeat(TAG_NAME_MAX + 1)).is_err());

        let member = NewMember { id_user: None, name: "n".to_owned(), contact_info: Some("c".repeat(CONTACT_INFO_MAX + 1)) };
        assert!(member.validate().is_err());
    }

    #[test]
    fn test_new_project_defaults() {
        let p = NewProject::new("Title", 4);

        assert_eq!(p.period.as_deref(), Some(DEFAULT_PERIOD));
        assert!(p.description.is_empty());
        assert_eq!(p.id_created_by, 4);
    }
}
