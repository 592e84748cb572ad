use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// User row. `password` holds a salted one-way hash; it and
/// `refresh_token` never leave the service.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub age: Option<i32>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    pub async fn create(
        db: &PgPool,
        email: &str,
        name: &str,
        password: &str,
        age: Option<i32>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, password, age)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, password, age, refresh_token, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(password)
        .bind(age)
        .fetch_one(db)
        .await
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password, age, refresh_token, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password, age, refresh_token, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn list(db: &PgPool) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password, age, refresh_token, created_at, updated_at
            FROM users
            "#,
        )
        .fetch_all(db)
        .await
    }

    /// Partial patch. Absent fields keep their current value; a colliding
    /// email surfaces as the store's uniqueness error.
    pub async fn update(
        db: &PgPool,
        id: i64,
        email: Option<&str>,
        name: Option<&str>,
        password: Option<&str>,
        age: Option<i32>,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                name = COALESCE($3, name),
                password = COALESCE($4, password),
                age = COALESCE($5, age),
                updated_at = now()
            WHERE id = $1
            RETURNING id, email, name, password, age, refresh_token, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(name)
        .bind(password)
        .bind(age)
        .fetch_optional(db)
        .await
    }

    /// RETURNING + fetch_one makes deleting a missing row a store error
    /// instead of a silent no-op.
    pub async fn delete(db: &PgPool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query_as::<_, (i64,)>("DELETE FROM users WHERE id = $1 RETURNING id")
            .bind(id)
            .fetch_one(db)
            .await?;
        Ok(())
    }

    pub async fn store_refresh_token(
        db: &PgPool,
        id: i64,
        token: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET refresh_token = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Single-use rotation: replaces the stored refresh token only when the
    /// caller presents the token currently in the slot. Returns false when
    /// nothing matched (rotated-out token, unknown user, or a lost race).
    pub async fn rotate_refresh_token(
        db: &PgPool,
        id: i64,
        current: &str,
        next: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $3, updated_at = now()
            WHERE id = $1 AND refresh_token = $2
            "#,
        )
        .bind(id)
        .bind(current)
        .bind(next)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn clear_refresh_token(db: &PgPool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET refresh_token = NULL, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Row-level behavior needs a live database; what must hold everywhere
    // is that serializing a full row never leaks the secret columns.
    #[test]
    fn serialized_row_omits_secret_columns() {
        let user = User {
            id: 1,
            email: "a@x.com".into(),
            name: "A".into(),
            password: "$argon2id$fake".into(),
            age: Some(30),
            refresh_token: Some("some-token".into()),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("refresh_token"));
        assert!(!json.contains("argon2id"));
        assert!(!json.contains("some-token"));
    }
}
