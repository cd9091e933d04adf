use serde::Serialize;
use serde_json::{json, Value};
use sqlx::{postgres::PgRow, FromRow, PgPool};

use crate::database::manager::DatabaseError;
use crate::database::query_builder::QueryBuilder;
use crate::filter::{ColumnDef, DataTablePage, DataTableRequest, FilterData, FilterOptions};

/// A table the generic repository can page, search and filter
pub trait Entity: for<'r> FromRow<'r, PgRow> + Send + Unpin + Serialize {
    const TABLE: &'static str;
    /// Columns clients may filter and sort on
    const COLUMNS: &'static [ColumnDef];
    /// Columns matched by the DataTables search box
    const SEARCHABLE: &'static [&'static str];
    const DEFAULT_ORDER: &'static str;
    const SOFT_DELETE: bool = false;
    /// Human name used in not-found messages
    const LABEL: &'static str;
}

pub struct Repository<T> {
    pool: PgPool,
    max_limit: i32,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: Entity> Repository<T> {
    pub fn new(pool: PgPool, max_limit: i32) -> Self {
        Self {
            pool,
            max_limit,
            _phantom: std::marker::PhantomData,
        }
    }

    fn options(&self) -> FilterOptions {
        FilterOptions {
            columns: T::COLUMNS,
            soft_delete: T::SOFT_DELETE,
            max_limit: self.max_limit,
        }
    }

    fn builder(&self) -> Result<QueryBuilder<T>, DatabaseError> {
        QueryBuilder::<T>::new(T::TABLE, self.options())
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, DatabaseError> {
        self.builder()?.filter(filter_data)?.select_all(&self.pool).await
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<T>, DatabaseError> {
        let filter_data = FilterData { limit: Some(1), ..filter_data };
        self.builder()?.filter(filter_data)?.select_optional(&self.pool).await
    }

    pub async fn select_404(&self, id: impl Into<Value>) -> Result<T, DatabaseError> {
        let filter = FilterData {
            where_clause: Some(json!({ "id": id.into() })),
            ..Default::default()
        };
        self.select_one(filter)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} not found", T::LABEL)))
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<i64, DatabaseError> {
        self.builder()?.filter(filter_data)?.count(&self.pool).await
    }

    /// One DataTables page. `base` narrows both totals; the search box only
    /// narrows `recordsFiltered`.
    pub async fn page(&self, request: &DataTableRequest, base: Option<Value>) -> Result<DataTablePage<T>, DatabaseError> {
        let records_total = self
            .count(FilterData { where_clause: base.clone(), ..Default::default() })
            .await?;

        let filter_data = request.to_filter_data(base, T::SEARCHABLE, T::DEFAULT_ORDER);
        let records_filtered = if request.search.is_some() {
            self.count(FilterData { where_clause: filter_data.where_clause.clone(), ..Default::default() })
                .await?
        } else {
            records_total
        };

        let data = self.select_any(filter_data).await?;

        Ok(DataTablePage {
            draw: request.draw,
            records_total,
            records_filtered,
            data,
        })
    }
}
