use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{is_identifier, FilterWhere};
use super::types::{FilterData, FilterOptions, FilterOrderInfo, SqlResult};

pub struct Filter {
    table_name: String,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i32>,
    offset: Option<i32>,
    options: FilterOptions,
}

impl Filter {
    pub fn new(table_name: impl Into<String>, options: FilterOptions) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        if !is_identifier(&table_name) {
            return Err(FilterError::InvalidTableName(table_name));
        }
        Ok(Self {
            table_name,
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
            options,
        })
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause {
            self.where_clause(where_clause)?;
        }
        if let Some(order) = data.order {
            self.order(order)?;
        }
        if let Some(limit) = data.limit {
            self.limit(limit, data.offset)?;
        }
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(&order_spec, &self.options)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i32, offset: Option<i32>) -> Result<&mut Self, FilterError> {
        if limit < 0 {
            return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }

        let max_limit = self.options.max_limit;
        let applied_limit = if limit > max_limit {
            tracing::debug!("Limit {} exceeds max {}, capping to max", limit, max_limit);
            max_limit
        } else {
            limit
        };

        self.limit = Some(applied_limit);
        self.offset = offset;
        Ok(self)
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let order_clause = FilterOrder::generate(&self.order_data);
        let limit_clause = self.build_limit_clause();

        let query = [
            "SELECT *".to_string(),
            format!("FROM \"{}\"", self.table_name),
            if where_result.query.is_empty() { String::new() } else { format!("WHERE {}", where_result.query) },
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let (query, params) = FilterWhere::generate(self.where_data.as_ref(), &self.options)?;
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = if where_result.query.is_empty() {
            format!("SELECT COUNT(*) AS count FROM \"{}\"", self.table_name)
        } else {
            format!("SELECT COUNT(*) AS count FROM \"{}\" WHERE {}", self.table_name, where_result.query)
        };
        Ok(SqlResult { query, params: where_result.params })
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::types::{ColumnDef, ColumnKind};
    use serde_json::json;

    static COLUMNS: &[ColumnDef] = &[
        ColumnDef::new("name", ColumnKind::Text),
        ColumnDef::new("stock_quantity", ColumnKind::Integer),
    ];

    fn filter() -> Filter {
        Filter::new("products", FilterOptions { columns: COLUMNS, soft_delete: true, max_limit: 50 }).unwrap()
    }

    #[test]
    fn full_select_statement() {
        let mut f = filter();
        f.assign(FilterData {
            where_clause: Some(json!({ "stock_quantity": { "$lt": 5 } })),
            order: Some(json!("name asc")),
            limit: Some(10),
            offset: Some(20),
        })
        .unwrap();
        let sql = f.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"products\" WHERE \"deleted_at\" IS NULL AND \"stock_quantity\" < $1::bigint ORDER BY \"name\" ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(sql.params, vec![json!(5)]);
    }

    #[test]
    fn count_ignores_order_and_limit() {
        let mut f = filter();
        f.assign(FilterData { order: Some(json!("name")), limit: Some(5), ..Default::default() }).unwrap();
        assert_eq!(
            f.to_count_sql().unwrap().query,
            "SELECT COUNT(*) AS count FROM \"products\" WHERE \"deleted_at\" IS NULL"
        );
    }

    #[test]
    fn limit_is_capped_and_validated() {
        let mut f = filter();
        f.limit(500, None).unwrap();
        assert!(f.to_sql().unwrap().query.ends_with("LIMIT 50"));
        assert!(filter().limit(-1, None).is_err());
        assert!(filter().limit(1, Some(-3)).is_err());
    }

    #[test]
    fn table_name_is_validated() {
        assert!(Filter::new("products; --", FilterOptions::default()).is_err());
    }
}
