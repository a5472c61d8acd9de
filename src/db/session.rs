use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Sessions belong to a member row and disappear with it.
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, token: &str, member_id: Uuid, expires_at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO sessions (token, member_id, created_at, expires_at)
             VALUES ($1, $2, $3, $4)"
        )
        .bind(token)
        .bind(member_id)
        .bind(Utc::now())
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Member owning an unexpired session.
    pub async fn member_id(&self, token: &str) -> Result<Option<Uuid>, sqlx::Error> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT member_id FROM sessions WHERE token = $1 AND expires_at > $2"
        )
        .bind(token)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    pub async fn delete(&self, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::member::MemberRepository;
    use crate::models::Member;
    use chrono::Duration;

    async fn signed_up(pool: &PgPool, email: &str) -> Member {
        let member = Member::from_sign_in("Test Member".into(), email.into(), None);
        MemberRepository::new(pool.clone()).create(&member).await.unwrap();
        member
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_session_resolves_to_member(pool: PgPool) {
        let member = signed_up(&pool, "asha@kiit.ac.in").await;
        let sessions = SessionRepository::new(pool.clone());

        sessions.create("tok", member.id, Utc::now() + Duration::days(7)).await.unwrap();
        assert_eq!(sessions.member_id("tok").await.unwrap(), Some(member.id));
        assert_eq!(sessions.member_id("other").await.unwrap(), None);

        sessions.delete("tok").await.unwrap();
        assert_eq!(sessions.member_id("tok").await.unwrap(), None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_deleting_member_revokes_sessions(pool: PgPool) {
        let member = signed_up(&pool, "gone@kiit.ac.in").await;
        let sessions = SessionRepository::new(pool.clone());
        sessions.create("tok", member.id, Utc::now() + Duration::days(7)).await.unwrap();

        MemberRepository::new(pool.clone()).delete_many(&[member.id]).await.unwrap();
        assert_eq!(sessions.member_id("tok").await.unwrap(), None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_purge_removes_only_expired(pool: PgPool) {
        let member = signed_up(&pool, "priya@kiit.ac.in").await;
        let sessions = SessionRepository::new(pool.clone());
        sessions.create("old", member.id, Utc::now() - Duration::hours(1)).await.unwrap();
        sessions.create("live", member.id, Utc::now() + Duration::days(1)).await.unwrap();

        assert_eq!(sessions.member_id("old").await.unwrap(), None);
        assert_eq!(sessions.purge_expired().await.unwrap(), 1);
        assert_eq!(sessions.member_id("live").await.unwrap(), Some(member.id));
    }
}
