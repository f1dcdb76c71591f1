use chrono::NaiveTime;
use sqlx::PgPool;

use crate::database::manager::DatabaseError;
use crate::database::models::{DailyCount, NewVisit, PageCount, Visit, VisitFilter, VisitStats, VisitTotals};
use crate::database::pagination::{PageRequest, Paginated};
use crate::database::query_builder::{QueryBuilder, SortDirection};

#[derive(Debug, Clone)]
pub struct VisitRepository {
    pool: PgPool,
}

impl VisitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, visit: &NewVisit) -> Result<Visit, DatabaseError> {
        let row = sqlx::query_as::<_, Visit>(
            r#"
            INSERT INTO visits (ip_address, user_agent, page_url, referrer)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(visit.ip_address.as_deref())
        .bind(visit.user_agent.as_deref())
        .bind(visit.page_url.as_deref())
        .bind(visit.referrer.as_deref())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Newest first. `start_date` and `end_date` are inclusive calendar days.
    pub async fn find_all(
        &self,
        filter: &VisitFilter,
        page: PageRequest,
    ) -> Result<Paginated<Visit>, DatabaseError> {
        let mut query = QueryBuilder::table("visits");
        if let Some(start) = filter.start_date {
            query = query.where_gte("visit_date", start.and_time(NaiveTime::MIN));
        }
        if let Some(end) = filter.end_date {
            query = match end.succ_opt() {
                Some(next) => query.where_lt("visit_date", next.and_time(NaiveTime::MIN)),
                None => query,
            };
        }
        query
            .order_by("visit_date", SortDirection::Desc)
            .order_by("id", SortDirection::Desc)
            .paginate(&self.pool, page)
            .await
    }

    /// Totals, last-`days` activity, daily series and the ten busiest pages.
    pub async fn stats(&self, days: i32) -> Result<VisitStats, DatabaseError> {
        let total = QueryBuilder::table("visits").count(&self.pool).await?;

        let recent = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM visits WHERE visit_date >= NOW() - make_interval(days => $1)",
        )
        .bind(days)
        .fetch_one(&self.pool)
        .await?;

        let unique = sqlx::query_scalar::<_, i64>("SELECT COUNT(DISTINCT ip_address) FROM visits")
            .fetch_one(&self.pool)
            .await?;

        let daily = sqlx::query_as::<_, DailyCount>(
            r#"
            SELECT DATE(visit_date) AS date, COUNT(*) AS count
            FROM visits
            WHERE visit_date >= NOW() - make_interval(days => $1)
            GROUP BY DATE(visit_date)
            ORDER BY date DESC
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await?;

        let top_pages = sqlx::query_as::<_, PageCount>(
            r#"
            SELECT page_url, COUNT(*) AS count
            FROM visits
            WHERE page_url IS NOT NULL
            GROUP BY page_url
            ORDER BY count DESC, page_url
            LIMIT 10
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(VisitStats {
            stats: VisitTotals { total, recent, unique },
            daily,
            top_pages,
        })
    }

    /// `(total, today, distinct addresses)`
    pub async fn counts(&self) -> Result<(i64, i64, i64), DatabaseError> {
        let row = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE visit_date >= CURRENT_DATE),
                COUNT(DISTINCT ip_address)
            FROM visits
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
