use super::params::{ParamBinder, SqlValue};

/// Conjunctive WHERE builder.
///
/// Column names are `&'static str`: identifiers are written by the program,
/// never taken from a request, and are the only text interpolated into a
/// fragment. Values always go through the [`ParamBinder`].
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    fragments: Vec<String>,
    binder: ParamBinder,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = $n`
    pub fn equals(&mut self, column: &'static str, value: impl Into<SqlValue>) -> &mut Self {
        let token = self.binder.bind(value);
        self.fragments.push(format!("{} = {}", column, token));
        self
    }

    /// `column <> $n`
    pub fn not_equals(&mut self, column: &'static str, value: impl Into<SqlValue>) -> &mut Self {
        let token = self.binder.bind(value);
        self.fragments.push(format!("{} <> {}", column, token));
        self
    }

    pub fn gte(&mut self, column: &'static str, value: impl Into<SqlValue>) -> &mut Self {
        let token = self.binder.bind(value);
        self.fragments.push(format!("{} >= {}", column, token));
        self
    }

    pub fn lte(&mut self, column: &'static str, value: impl Into<SqlValue>) -> &mut Self {
        let token = self.binder.bind(value);
        self.fragments.push(format!("{} <= {}", column, token));
        self
    }

    pub fn lt(&mut self, column: &'static str, value: impl Into<SqlValue>) -> &mut Self {
        let token = self.binder.bind(value);
        self.fragments.push(format!("{} < {}", column, token));
        self
    }

    /// Substring match. The bound value is always `%value%`; `%` and `_`
    /// typed by the caller are escaped so they match literally.
    pub fn like(&mut self, column: &'static str, value: &str, case_insensitive: bool) -> &mut Self {
        let operator = if case_insensitive { "ILIKE" } else { "LIKE" };
        let token = self.binder.bind(format!("%{}%", escape_like(value)));
        self.fragments.push(format!("{} {} {}", column, operator, token));
        self
    }

    /// `column IN ($a, $b, ...)`. An empty list matches no rows.
    pub fn in_list<I, V>(&mut self, column: &'static str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        let tokens = self.binder.bind_all(values);
        if tokens.is_empty() {
            self.fragments.push("1=0".to_string());
        } else {
            self.fragments.push(format!("{} IN ({})", column, tokens.join(", ")));
        }
        self
    }

    pub fn between(
        &mut self,
        column: &'static str,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> &mut Self {
        let low = self.binder.bind(low);
        let high = self.binder.bind(high);
        self.fragments.push(format!("{} BETWEEN {} AND {}", column, low, high));
        self
    }

    pub fn is_null(&mut self, column: &'static str) -> &mut Self {
        self.fragments.push(format!("{} IS NULL", column));
        self
    }

    /// Parenthesised OR group. Conditions added inside `build` share this
    /// predicate's binder, so their placeholders continue the same sequence.
    /// An empty group adds nothing.
    pub fn any_of(&mut self, build: impl FnOnce(&mut Predicate)) -> &mut Self {
        let mut group = Predicate {
            fragments: Vec::new(),
            binder: std::mem::take(&mut self.binder),
        };
        build(&mut group);
        self.binder = group.binder;

        match group.fragments.len() {
            0 => {}
            1 => self.fragments.extend(group.fragments),
            _ => self.fragments.push(format!("({})", group.fragments.join(" OR "))),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Predicate text without the `WHERE` keyword; empty when nothing was added.
    pub fn to_sql(&self) -> String {
        self.fragments.join(" AND ")
    }

    /// ` WHERE ...` or nothing at all.
    pub fn where_clause(&self) -> String {
        if self.fragments.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.to_sql())
        }
    }

    pub fn binder(&self) -> &ParamBinder {
        &self.binder
    }

    pub fn params(&self) -> &[SqlValue] {
        self.binder.params()
    }
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_predicate_has_no_where() {
        let p = Predicate::new();
        assert!(p.is_empty());
        assert_eq!(p.to_sql(), "");
        assert_eq!(p.where_clause(), "");
    }

    #[test]
    fn like_wraps_value_in_wildcards() {
        let mut p = Predicate::new();
        p.like("username", "ann", true);
        assert_eq!(p.to_sql(), "username ILIKE $1");
        assert_eq!(p.params(), &[SqlValue::Text("%ann%".to_string())]);
    }

    #[test]
    fn like_escapes_caller_wildcards() {
        let mut p = Predicate::new();
        p.like("username", "50%_off", false);
        assert_eq!(p.to_sql(), "username LIKE $1");
        assert_eq!(p.params(), &[SqlValue::Text("%50\\%\\_off%".to_string())]);
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let mut p = Predicate::new();
        p.in_list("id", Vec::<i32>::new());
        assert_eq!(p.where_clause(), " WHERE 1=0");
        assert!(p.params().is_empty());
    }

    #[test]
    fn in_and_between_number_placeholders_in_order() {
        let mut p = Predicate::new();
        p.equals("status", "open")
            .in_list("id", vec![4, 5, 6])
            .between("created_at", 1_i64, 9_i64);
        assert_eq!(
            p.to_sql(),
            "status = $1 AND id IN ($2, $3, $4) AND created_at BETWEEN $5 AND $6"
        );
        assert_eq!(p.params().len(), 6);
    }

    #[test]
    fn any_of_groups_with_shared_numbering() {
        let mut p = Predicate::new();
        p.any_of(|g| {
            g.like("a.username", "ann", true).like("a.email", "ann", true);
        })
        .equals("r.name", "editor");
        assert_eq!(
            p.to_sql(),
            "(a.username ILIKE $1 OR a.email ILIKE $2) AND r.name = $3"
        );
        assert_eq!(p.params().len(), 3);
    }

    #[test]
    fn any_of_with_one_condition_is_not_wrapped() {
        let mut p = Predicate::new();
        p.any_of(|g| {
            g.is_null("deleted_at");
        });
        p.any_of(|_| {});
        assert_eq!(p.to_sql(), "deleted_at IS NULL");
    }
}
