use crate::models::{Member, Role, SocialLinks, SpecialRole, Vertical};
use crate::validation::MemberDraft;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct MemberRow {
    id: Uuid,
    name: String,
    email: String,
    personal_email: Option<String>,
    profile_image: Option<String>,
    phone_number: Option<String>,
    whatsapp_number: Option<String>,
    roll_number: Option<i64>,
    branch: Option<String>,
    year: Option<i16>,
    vertical: Option<String>,
    subdomain: Option<String>,
    special_role: Option<String>,
    role: String,
    linkedin: String,
    github: String,
    instagram: String,
    other_societies: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        let vertical = row.vertical.as_deref().and_then(|v| {
            v.parse::<Vertical>()
                .map_err(|e| tracing::warn!("Member {} has {}", row.id, e))
                .ok()
        });
        let special_role = row.special_role.as_deref().and_then(|r| {
            r.parse::<SpecialRole>()
                .map_err(|e| tracing::warn!("Member {} has {}", row.id, e))
                .ok()
        });
        let role = row.role.parse::<Role>().unwrap_or_else(|e| {
            tracing::warn!("Member {} has {}, treating as member", row.id, e);
            Role::Member
        });

        Member {
            id: row.id,
            name: row.name,
            email: row.email,
            personal_email: row.personal_email,
            profile_image: row.profile_image,
            phone_number: row.phone_number,
            whatsapp_number: row.whatsapp_number,
            roll_number: row.roll_number,
            branch: row.branch,
            year: row.year,
            vertical,
            subdomain: row.subdomain,
            special_role,
            role,
            social_links: SocialLinks {
                linkedin: row.linkedin,
                github: row.github,
                instagram: row.instagram,
            },
            other_societies: row.other_societies,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Distinct non-empty values, sorted.
pub fn clean_distinct(values: Vec<Option<String>>) -> Vec<String> {
    let mut cleaned: Vec<String> = values
        .into_iter()
        .flatten()
        .filter(|v| !v.trim().is_empty())
        .collect();
    cleaned.sort();
    cleaned.dedup();
    cleaned
}

pub struct MemberRepository {
    pool: PgPool,
}

impl MemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<Member>, sqlx::Error> {
        let rows = sqlx::query_as::<_, MemberRow>("SELECT * FROM members ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Member::from).collect())
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Member>, sqlx::Error> {
        let row = sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Member::from))
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<Member>, sqlx::Error> {
        let row = sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE email = $1")
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Member::from))
    }

    pub async fn create(&self, member: &Member) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO members (id, name, email, personal_email, profile_image, phone_number,
                 whatsapp_number, roll_number, branch, year, vertical, subdomain, special_role,
                 role, linkedin, github, instagram, other_societies, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)"
        )
        .bind(member.id)
        .bind(&member.name)
        .bind(&member.email)
        .bind(&member.personal_email)
        .bind(&member.profile_image)
        .bind(&member.phone_number)
        .bind(&member.whatsapp_number)
        .bind(member.roll_number)
        .bind(&member.branch)
        .bind(member.year)
        .bind(member.vertical.map(|v| v.as_str()))
        .bind(&member.subdomain)
        .bind(member.special_role.map(|r| r.as_str()))
        .bind(member.role.as_str())
        .bind(&member.social_links.linkedin)
        .bind(&member.social_links.github)
        .bind(&member.social_links.instagram)
        .bind(&member.other_societies)
        .bind(member.created_at)
        .bind(member.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace every mutable field of the member with `id`. Role is never touched.
    pub async fn update(&self, id: Uuid, draft: &MemberDraft) -> Result<Option<Member>, sqlx::Error> {
        let row = sqlx::query_as::<_, MemberRow>(
            "UPDATE members
             SET name = $2, email = $3, personal_email = $4, profile_image = $5,
                 phone_number = $6, whatsapp_number = $7, roll_number = $8, branch = $9,
                 year = $10, vertical = $11, subdomain = $12, special_role = $13,
                 linkedin = $14, github = $15, instagram = $16, other_societies = $17,
                 updated_at = $18
             WHERE id = $1
             RETURNING *"
        )
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.email)
        .bind(&draft.personal_email)
        .bind(&draft.profile_image)
        .bind(&draft.phone_number)
        .bind(&draft.whatsapp_number)
        .bind(draft.roll_number)
        .bind(&draft.branch)
        .bind(draft.year)
        .bind(draft.vertical.map(|v| v.as_str()))
        .bind(&draft.subdomain)
        .bind(draft.special_role.map(|r| r.as_str()))
        .bind(&draft.social_links.linkedin)
        .bind(&draft.social_links.github)
        .bind(&draft.social_links.instagram)
        .bind(&draft.other_societies)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Member::from))
    }

    pub async fn set_role(&self, email: &str, role: Role) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE members SET role = $2, updated_at = $3 WHERE email = $1")
            .bind(email.to_lowercase())
            .bind(role.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn profile_images(&self, ids: &[Uuid]) -> Result<Vec<String>, sqlx::Error> {
        let images: Vec<(Option<String>,)> =
            sqlx::query_as("SELECT profile_image FROM members WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(&self.pool)
                .await?;
        Ok(images
            .into_iter()
            .filter_map(|(image,)| image)
            .filter(|image| !image.is_empty())
            .collect())
    }

    pub async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM members WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn distinct_branches(&self) -> Result<Vec<String>, sqlx::Error> {
        let values: Vec<(Option<String>,)> = sqlx::query_as("SELECT DISTINCT branch FROM members")
            .fetch_all(&self.pool)
            .await?;
        Ok(clean_distinct(values.into_iter().map(|(v,)| v).collect()))
    }

    pub async fn distinct_subdomains(&self) -> Result<Vec<String>, sqlx::Error> {
        let values: Vec<(Option<String>,)> = sqlx::query_as("SELECT DISTINCT subdomain FROM members")
            .fetch_all(&self.pool)
            .await?;
        Ok(clean_distinct(values.into_iter().map(|(v,)| v).collect()))
    }

    /// Returns the member and whether it was created by this call.
    pub async fn get_or_create(&self, name: String, email: String, image: Option<String>) -> Result<(Member, bool), sqlx::Error> {
        if let Some(member) = self.get_by_email(&email).await? {
            Ok((member, false))
        } else {
            let member = Member::from_sign_in(name, email, image);
            self.create(&member).await?;
            Ok((member, true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn member(email: &str, roll_number: Option<i64>) -> Member {
        let mut member = Member::from_sign_in("Test Member".into(), email.into(), None);
        member.roll_number = roll_number;
        member
    }

    async fn emails(repo: &MemberRepository) -> Vec<String> {
        repo.list_all().await.unwrap().into_iter().map(|m| m.email).collect()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_duplicate_email_is_a_conflict(pool: PgPool) {
        let repo = MemberRepository::new(pool);
        repo.create(&member("asha@kiit.ac.in", Some(2205001))).await.unwrap();

        let err = repo.create(&member("ASHA@kiit.ac.in", None)).await.unwrap_err();
        assert!(matches!(AppError::from_write(err, "taken"), AppError::Conflict(_)));
        assert_eq!(emails(&repo).await, vec!["asha@kiit.ac.in"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_duplicate_roll_number_is_a_conflict(pool: PgPool) {
        let repo = MemberRepository::new(pool);
        repo.create(&member("asha@kiit.ac.in", Some(2205001))).await.unwrap();

        let err = repo.create(&member("ravi@kiit.ac.in", Some(2205001))).await.unwrap_err();
        assert!(matches!(AppError::from_write(err, "taken"), AppError::Conflict(_)));
        assert_eq!(emails(&repo).await, vec!["asha@kiit.ac.in"]);

        // Members without a roll number do not collide with each other
        repo.create(&member("ravi@kiit.ac.in", None)).await.unwrap();
        repo.create(&member("meera@kiit.ac.in", None)).await.unwrap();
        assert_eq!(emails(&repo).await.len(), 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_delete_many_removes_only_given_ids(pool: PgPool) {
        let repo = MemberRepository::new(pool);
        let a = member("a@kiit.ac.in", Some(2205001));
        let b = member("b@kiit.ac.in", Some(2205002));
        let c = member("c@kiit.ac.in", Some(2205003));
        for m in [&a, &b, &c] {
            repo.create(m).await.unwrap();
        }

        assert_eq!(repo.delete_many(&[a.id, c.id, Uuid::new_v4()]).await.unwrap(), 2);
        assert_eq!(emails(&repo).await, vec!["b@kiit.ac.in"]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_get_or_create_only_creates_once(pool: PgPool) {
        let repo = MemberRepository::new(pool);
        let (first, created) = repo
            .get_or_create("Asha".into(), "Asha@kiit.ac.in".into(), None)
            .await
            .unwrap();
        assert!(created);

        let (second, created) = repo
            .get_or_create("Asha R".into(), "asha@kiit.ac.in".into(), None)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "Asha");
    }

    #[test]
    fn test_clean_distinct_drops_blanks_and_sorts() {
        let values = vec![
            Some("ECE".to_string()),
            None,
            Some("".to_string()),
            Some("CSE".to_string()),
            Some("  ".to_string()),
            Some("IT".to_string()),
            Some("CSE".to_string()),
        ];
        assert_eq!(clean_distinct(values), vec!["CSE", "ECE", "IT"]);
    }
}
