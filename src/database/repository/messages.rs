use sqlx::PgPool;

use crate::database::manager::DatabaseError;
use crate::database::models::{Message, MessageFilter, NewMessage};
use crate::database::pagination::{PageRequest, Paginated};
use crate::database::query_builder::{QueryBuilder, SortDirection};

#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, message: &NewMessage) -> Result<Message, DatabaseError> {
        let row = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (name, email, message) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&message.name)
        .bind(message.email.as_deref())
        .bind(&message.message)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_all(
        &self,
        filter: &MessageFilter,
        page: PageRequest,
    ) -> Result<Paginated<Message>, DatabaseError> {
        let mut query = QueryBuilder::table("messages");
        if let Some(approved) = filter.approved {
            query = query.where_eq("is_approved", approved);
        }
        query
            .order_by("created_at", SortDirection::Desc)
            .order_by("id", SortDirection::Desc)
            .paginate(&self.pool, page)
            .await
    }

    pub async fn set_approval(&self, id: i32, approved: bool) -> Result<Option<Message>, DatabaseError> {
        let row = sqlx::query_as::<_, Message>(
            "UPDATE messages SET is_approved = $1 WHERE id = $2 RETURNING *",
        )
        .bind(approved)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete(&self, id: i32) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `(total, awaiting approval)`
    pub async fn counts(&self) -> Result<(i64, i64), DatabaseError> {
        let total = QueryBuilder::table("messages").count(&self.pool).await?;
        let pending = QueryBuilder::table("messages")
            .filter(|p| {
                p.any_of(|g| {
                    g.equals("is_approved", false);
                    g.is_null("is_approved");
                });
            })
            .count(&self.pool)
            .await?;
        Ok((total, pending))
    }
}
