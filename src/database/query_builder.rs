use sqlx::{postgres::PgRow, FromRow, PgConnection, PgPool};

use crate::database::manager::DatabaseError;
use crate::database::pagination::{PageRequest, Paginated};
use crate::database::params::{bind_query_as, bind_query_scalar, SqlValue, Statement};
use crate::database::predicate::Predicate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn to_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// Fluent SELECT assembler.
///
/// Clauses are emitted in a fixed order (SELECT, JOINs, WHERE, ORDER BY,
/// LIMIT, OFFSET). LIMIT and OFFSET take their placeholders last, on a copy
/// of the predicate's binder, so predicate placeholders keep their numbers
/// and the builder can be rendered any number of times.
///
/// [`QueryBuilder::to_count_statement`] shares the table, joins and
/// predicate of [`QueryBuilder::to_statement`] and drops columns, ordering
/// and paging, which keeps `total` consistent with the filtered list.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: &'static str,
    columns: Vec<&'static str>,
    joins: Vec<String>,
    predicate: Predicate,
    order_by: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl QueryBuilder {
    /// `table` may carry an alias, e.g. `"admins a"`.
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            joins: Vec::new(),
            predicate: Predicate::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn select(mut self, columns: &[&'static str]) -> Self {
        self.columns = columns.to_vec();
        self
    }

    pub fn join(self, table: &'static str, on: &'static str) -> Self {
        self.join_kind(JoinKind::Inner, table, on)
    }

    pub fn left_join(self, table: &'static str, on: &'static str) -> Self {
        self.join_kind(JoinKind::Left, table, on)
    }

    pub fn right_join(self, table: &'static str, on: &'static str) -> Self {
        self.join_kind(JoinKind::Right, table, on)
    }

    fn join_kind(mut self, kind: JoinKind, table: &'static str, on: &'static str) -> Self {
        self.joins.push(format!("{} {} ON {}", kind.to_sql(), table, on));
        self
    }

    pub fn where_eq(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.predicate.equals(column, value);
        self
    }

    pub fn where_ne(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.predicate.not_equals(column, value);
        self
    }

    pub fn where_gte(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.predicate.gte(column, value);
        self
    }

    pub fn where_lte(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.predicate.lte(column, value);
        self
    }

    pub fn where_lt(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.predicate.lt(column, value);
        self
    }

    pub fn where_like(mut self, column: &'static str, value: &str, case_insensitive: bool) -> Self {
        self.predicate.like(column, value, case_insensitive);
        self
    }

    pub fn where_in<I, V>(mut self, column: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.predicate.in_list(column, values);
        self
    }

    pub fn where_between(
        mut self,
        column: &'static str,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> Self {
        self.predicate.between(column, low, high);
        self
    }

    pub fn where_any(mut self, build: impl FnOnce(&mut Predicate)) -> Self {
        self.predicate.any_of(build);
        self
    }

    /// Direct access to the predicate for conditional filters.
    pub fn filter(mut self, build: impl FnOnce(&mut Predicate)) -> Self {
        build(&mut self.predicate);
        self
    }

    pub fn order_by(mut self, column: &'static str, direction: SortDirection) -> Self {
        self.order_by.push(format!("{} {}", column, direction.to_sql()));
        self
    }

    pub fn limit(mut self, count: i64) -> Self {
        self.limit = Some(count);
        self
    }

    pub fn offset(mut self, count: i64) -> Self {
        self.offset = Some(count);
        self
    }

    fn from_clause(&self) -> String {
        let mut sql = format!("FROM {}", self.table);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        sql.push_str(&self.predicate.where_clause());
        sql
    }

    pub fn to_statement(&self) -> Statement {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {} {}", columns, self.from_clause());

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        let mut binder = self.predicate.binder().clone();
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", binder.bind(limit)));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", binder.bind(offset)));
        }

        Statement { sql, params: binder.into_params() }
    }

    pub fn to_count_statement(&self) -> Statement {
        Statement {
            sql: format!("SELECT COUNT(*) AS total {}", self.from_clause()),
            params: self.predicate.params().to_vec(),
        }
    }

    pub async fn fetch_all<T>(&self, pool: &PgPool) -> Result<Vec<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut conn = pool.acquire().await?;
        fetch_rows(&self.to_statement(), &mut conn).await
    }

    pub async fn first<T>(&self, pool: &PgPool) -> Result<Option<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let rows = self.clone().limit(1).fetch_all(pool).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn count(&self, pool: &PgPool) -> Result<i64, DatabaseError> {
        let mut conn = pool.acquire().await?;
        count_rows(&self.to_count_statement(), &mut conn).await
    }

    /// Count plus one LIMIT/OFFSET page, read inside a single
    /// `REPEATABLE READ` transaction so both see the same snapshot.
    /// Any limit/offset already set on the builder is replaced.
    pub async fn paginate<T>(
        &self,
        pool: &PgPool,
        request: PageRequest,
    ) -> Result<Paginated<T>, DatabaseError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let count_statement = self.to_count_statement();
        let list_statement = self
            .clone()
            .limit(request.page_size())
            .offset(request.offset())
            .to_statement();

        let mut tx = pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        let total = count_rows(&count_statement, &mut tx).await?;
        let list = fetch_rows::<T>(&list_statement, &mut tx).await?;
        tx.commit().await?;

        tracing::debug!(
            table = self.table,
            total,
            page = request.page(),
            page_size = request.page_size(),
            "paginated query"
        );
        Ok(Paginated::new(list, total, request))
    }
}

async fn fetch_rows<T>(statement: &Statement, conn: &mut PgConnection) -> Result<Vec<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let q = bind_query_as(sqlx::query_as::<_, T>(&statement.sql), &statement.params);
    Ok(q.fetch_all(conn).await?)
}

async fn count_rows(statement: &Statement, conn: &mut PgConnection) -> Result<i64, DatabaseError> {
    let q = bind_query_scalar(sqlx::query_scalar::<_, i64>(&statement.sql), &statement.params);
    Ok(q.fetch_one(conn).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Numerals of every `$N` token in order of appearance.
    fn placeholders(sql: &str) -> Vec<usize> {
        let mut out = Vec::new();
        let mut chars = sql.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '$' {
                continue;
            }
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(|d| d.is_ascii_digit()) {
                digits.push(d);
                chars.next();
            }
            if let Ok(n) = digits.parse() {
                out.push(n);
            }
        }
        out
    }

    fn users_query() -> QueryBuilder {
        QueryBuilder::table("admins a")
            .select(&["a.id", "a.username", "a.email", "r.name AS role", "a.created_at"])
            .left_join("roles r", "a.role_id = r.id")
    }

    #[test]
    fn limit_and_offset_take_the_highest_placeholders() {
        let stmt = QueryBuilder::table("admins")
            .where_eq("role", "editor")
            .limit(10)
            .offset(20)
            .to_statement();
        assert_eq!(stmt.sql, "SELECT * FROM admins WHERE role = $1 LIMIT $2 OFFSET $3");
        assert_eq!(
            stmt.params,
            vec![SqlValue::Text("editor".into()), SqlValue::BigInt(10), SqlValue::BigInt(20)]
        );
    }

    #[test]
    fn limit_set_before_predicates_still_comes_last() {
        let stmt = QueryBuilder::table("visits")
            .limit(5)
            .offset(0)
            .where_gte("visit_date", "2024-01-01")
            .where_in("page_url", vec!["/", "/memories"])
            .to_statement();
        assert!(stmt.sql.ends_with("LIMIT $4 OFFSET $5"), "{}", stmt.sql);
        assert_eq!(placeholders(&stmt.sql), vec![1, 2, 3, 4, 5]);
        assert_eq!(stmt.params.len(), 5);
    }

    #[test]
    fn placeholder_numerals_match_positions() {
        let builds: Vec<QueryBuilder> = vec![
            users_query(),
            users_query().where_like("a.username", "ann", true),
            users_query()
                .where_any(|g| {
                    g.like("a.username", "x", true).like("a.email", "x", true);
                })
                .where_eq("r.name", "viewer")
                .where_between("a.id", 1, 50)
                .where_in("a.id", vec![1, 2, 3])
                .order_by("a.created_at", SortDirection::Desc)
                .limit(10)
                .offset(10),
            users_query().where_in("a.id", Vec::<i32>::new()).limit(1),
        ];

        for qb in builds {
            for stmt in [qb.to_statement(), qb.to_count_statement()] {
                let found = placeholders(&stmt.sql);
                let expected: Vec<usize> = (1..=stmt.params.len()).collect();
                assert_eq!(found, expected, "{}", stmt.sql);
            }
        }
    }

    #[test]
    fn no_predicates_means_no_where() {
        let qb = users_query().order_by("a.created_at", SortDirection::Desc).limit(10);
        assert!(!qb.to_statement().sql.contains("WHERE"));
        assert!(!qb.to_count_statement().sql.contains("WHERE"));
    }

    #[test]
    fn count_shares_joins_and_predicate_but_not_paging() {
        let qb = users_query()
            .where_eq("r.name", "editor")
            .order_by("a.created_at", SortDirection::Desc)
            .limit(10)
            .offset(30);
        let count = qb.to_count_statement();
        assert_eq!(
            count.sql,
            "SELECT COUNT(*) AS total FROM admins a LEFT JOIN roles r ON a.role_id = r.id WHERE r.name = $1"
        );
        assert_eq!(count.params, vec![SqlValue::Text("editor".into())]);

        let list = qb.to_statement();
        assert!(list.sql.contains(
            "FROM admins a LEFT JOIN roles r ON a.role_id = r.id WHERE r.name = $1 ORDER BY a.created_at DESC"
        ));
        assert_eq!(&list.params[..1], &count.params[..]);
    }

    #[test]
    fn joins_render_in_call_order() {
        let stmt = QueryBuilder::table("admins a")
            .join("roles r", "a.role_id = r.id")
            .right_join("role_permissions rp", "rp.role_id = r.id")
            .left_join("permissions p", "p.id = rp.permission_id")
            .to_statement();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM admins a INNER JOIN roles r ON a.role_id = r.id \
             RIGHT JOIN role_permissions rp ON rp.role_id = r.id \
             LEFT JOIN permissions p ON p.id = rp.permission_id"
        );
    }

    #[test]
    fn rendering_twice_is_stable() {
        let qb = QueryBuilder::table("messages").where_eq("is_approved", true).limit(5);
        assert_eq!(qb.to_statement(), qb.to_statement());
    }

    #[test]
    fn like_binds_wrapped_value() {
        let stmt = QueryBuilder::table("admins").where_like("username", "ann", true).to_statement();
        assert_eq!(stmt.params, vec![SqlValue::Text("%ann%".into())]);
    }
}
