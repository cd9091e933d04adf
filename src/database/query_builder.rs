use serde_json::Value;
use sqlx::{postgres::PgArguments, Arguments, FromRow, PgPool};

use crate::database::manager::DatabaseError;
use crate::filter::{Filter, FilterData, FilterOptions, SqlResult};

/// Runs the SQL a [`Filter`] renders against one entity type
pub struct QueryBuilder<T> {
    filter: Filter,
    _row: std::marker::PhantomData<T>,
}

impl<T> QueryBuilder<T>
where
    T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    pub fn new(table: &str, options: FilterOptions) -> Result<Self, DatabaseError> {
        Ok(Self {
            filter: Filter::new(table, options)?,
            _row: std::marker::PhantomData,
        })
    }

    pub fn filter(mut self, filter_data: FilterData) -> Result<Self, DatabaseError> {
        self.filter.assign(filter_data)?;
        Ok(self)
    }

    pub async fn select_all(self, pool: &PgPool) -> Result<Vec<T>, DatabaseError> {
        let (sql, args) = prepare(self.filter.to_sql()?);
        Ok(sqlx::query_as_with::<_, T, _>(&sql, args).fetch_all(pool).await?)
    }

    pub async fn select_optional(self, pool: &PgPool) -> Result<Option<T>, DatabaseError> {
        let (sql, args) = prepare(self.filter.to_sql()?);
        Ok(sqlx::query_as_with::<_, T, _>(&sql, args).fetch_optional(pool).await?)
    }

    pub async fn count(self, pool: &PgPool) -> Result<i64, DatabaseError> {
        let (sql, args) = prepare(self.filter.to_count_sql()?);
        Ok(sqlx::query_scalar_with::<_, i64, _>(&sql, args).fetch_one(pool).await?)
    }
}

/// Bind JSON parameters by their natural Postgres type; column casts in the
/// SQL text take care of uuid, numeric and timestamp columns.
fn prepare(sql_result: SqlResult) -> (String, PgArguments) {
    tracing::trace!(query = %sql_result.query, params = sql_result.params.len(), "filter query");

    let mut args = PgArguments::default();
    for value in sql_result.params {
        match value {
            Value::Null => args.add(None::<String>),
            Value::Bool(b) => args.add(b),
            Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => args.add(i),
                (None, Some(f)) => args.add(f),
                (None, None) => args.add(n.to_string()),
            },
            Value::String(s) => args.add(s),
            // Arrays are expanded by FilterWhere and objects never reach here
            other => args.add(other),
        }
    }
    (sql_result.query, args)
}
