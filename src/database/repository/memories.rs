use sqlx::PgPool;

use crate::database::manager::DatabaseError;
use crate::database::models::{Memory, MemoryInput};
use crate::database::pagination::{PageRequest, Paginated};
use crate::database::query_builder::{QueryBuilder, SortDirection};

#[derive(Debug, Clone)]
pub struct MemoryRepository {
    pool: PgPool,
}

impl MemoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Timeline order: most recent date first.
    pub async fn find_all(&self, page: PageRequest) -> Result<Paginated<Memory>, DatabaseError> {
        QueryBuilder::table("memories")
            .order_by("date", SortDirection::Desc)
            .order_by("id", SortDirection::Desc)
            .paginate(&self.pool, page)
            .await
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Memory>, DatabaseError> {
        QueryBuilder::table("memories").where_eq("id", id).first(&self.pool).await
    }

    pub async fn create(&self, input: &MemoryInput) -> Result<Memory, DatabaseError> {
        let row = sqlx::query_as::<_, Memory>(
            r#"
            INSERT INTO memories (title, description, memory_content, date, images, comment)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&input.title)
        .bind(input.description.as_deref())
        .bind(&input.memory_content)
        .bind(input.date)
        .bind(&input.images)
        .bind(input.comment.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update(&self, id: i32, input: &MemoryInput) -> Result<Option<Memory>, DatabaseError> {
        let row = sqlx::query_as::<_, Memory>(
            r#"
            UPDATE memories
            SET title = $1, description = $2, memory_content = $3, date = $4,
                images = $5, comment = $6, updated_at = CURRENT_TIMESTAMP
            WHERE id = $7
            RETURNING *
            "#,
        )
        .bind(&input.title)
        .bind(input.description.as_deref())
        .bind(&input.memory_content)
        .bind(input.date)
        .bind(&input.images)
        .bind(input.comment.as_deref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete(&self, id: i32) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM memories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        QueryBuilder::table("memories").count(&self.pool).await
    }
}
