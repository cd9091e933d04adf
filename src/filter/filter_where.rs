use serde_json::Value;

use super::error::FilterError;
use super::types::{ColumnDef, ColumnKind, FilterOp, FilterOptions};

/// Translates the JSON filter language into a parameterised WHERE clause.
///
/// `{ "status": "pending", "total_amount": { "$gte": 100 } }` becomes
/// `"status" = $1 AND "total_amount" >= $2::numeric`.
pub struct FilterWhere<'a> {
    options: &'a FilterOptions,
    param_values: Vec<Value>,
    param_offset: usize,
}

impl<'a> FilterWhere<'a> {
    pub fn new(options: &'a FilterOptions, param_offset: usize) -> Self {
        Self {
            options,
            param_values: vec![],
            param_offset,
        }
    }

    pub fn generate(where_data: Option<&Value>, options: &FilterOptions) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = FilterWhere::new(options, 0);
        let clause = filter_where.build(where_data)?;
        Ok((clause, filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    fn build(&mut self, where_data: Option<&Value>) -> Result<String, FilterError> {
        let mut sql_conditions = vec![];
        if self.options.soft_delete {
            sql_conditions.push("\"deleted_at\" IS NULL".to_string());
        }
        if let Some(data) = where_data.filter(|v| !v.is_null()) {
            sql_conditions.extend(self.parse_group(data)?);
        }
        Ok(if sql_conditions.is_empty() { String::new() } else { sql_conditions.join(" AND ") })
    }

    /// An object is an implicit AND of its entries
    fn parse_group(&mut self, where_data: &Value) -> Result<Vec<String>, FilterError> {
        let obj = where_data
            .as_object()
            .ok_or_else(|| FilterError::InvalidWhereClause("Conditions must be objects".to_string()))?;

        let mut conditions = vec![];
        for (key, value) in obj {
            if key.starts_with('$') {
                conditions.push(self.parse_logical_operator(key, value)?);
            } else {
                conditions.extend(self.parse_field_condition(key, value)?);
            }
        }
        Ok(conditions)
    }

    fn parse_logical_operator(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                if arr.is_empty() {
                    return Ok(if op == "$and" { "1=1" } else { "1=0" }.to_string());
                }
                let mut sql_parts = Vec::with_capacity(arr.len());
                for v in arr {
                    let group = self.parse_group(v)?;
                    sql_parts.push(Self::wrap_group(group));
                }
                let joiner = if op == "$and" { " AND " } else { " OR " };
                Ok(format!("({})", sql_parts.join(joiner)))
            }
            "$not" => {
                let group = self.parse_group(value)?;
                Ok(format!("NOT {}", Self::wrap_group(group)))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn wrap_group(group: Vec<String>) -> String {
        if group.is_empty() {
            "(1=1)".to_string()
        } else {
            format!("({})", group.join(" AND "))
        }
    }

    fn parse_field_condition(&mut self, field: &str, value: &Value) -> Result<Vec<String>, FilterError> {
        let column = self.resolve_column(field)?;
        match value {
            Value::Object(obj) => obj
                .iter()
                .map(|(op_key, op_val)| {
                    let operator =
                        FilterOp::parse(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    self.build_sql_condition(&column, operator, op_val)
                })
                .collect(),
            // Implicit equality: { field: value }
            _ => Ok(vec![self.build_sql_condition(&column, FilterOp::Eq, value)?]),
        }
    }

    fn resolve_column(&self, field: &str) -> Result<ColumnDef, FilterError> {
        if !is_identifier(field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }
        self.options
            .column(field)
            .copied()
            .ok_or_else(|| FilterError::InvalidColumn(format!("Unknown column: {}", field)))
    }

    fn build_sql_condition(&mut self, column: &ColumnDef, operator: FilterOp, data: &Value) -> Result<String, FilterError> {
        let quoted_column = format!("\"{}\"", column.name);
        match operator {
            FilterOp::Eq => {
                if data.is_null() {
                    Ok(format!("{} IS NULL", quoted_column))
                } else {
                    Ok(format!("{} = {}", quoted_column, self.param(column, data)?))
                }
            }
            FilterOp::Ne => {
                if data.is_null() {
                    Ok(format!("{} IS NOT NULL", quoted_column))
                } else {
                    Ok(format!("{} <> {}", quoted_column, self.param(column, data)?))
                }
            }
            FilterOp::Gt => Ok(format!("{} > {}", quoted_column, self.param(column, data)?)),
            FilterOp::Gte => Ok(format!("{} >= {}", quoted_column, self.param(column, data)?)),
            FilterOp::Lt => Ok(format!("{} < {}", quoted_column, self.param(column, data)?)),
            FilterOp::Lte => Ok(format!("{} <= {}", quoted_column, self.param(column, data)?)),
            FilterOp::Like | FilterOp::ILike => {
                let pattern = data
                    .as_str()
                    .ok_or_else(|| FilterError::InvalidOperatorData("pattern must be a string".to_string()))?;
                let keyword = if operator == FilterOp::Like { "LIKE" } else { "ILIKE" };
                let text = ColumnDef { name: column.name, kind: ColumnKind::Text };
                Ok(format!(
                    "{}::text {} {}",
                    quoted_column,
                    keyword,
                    self.param(&text, &Value::String(pattern.to_string()))?
                ))
            }
            FilterOp::In | FilterOp::NIn => {
                let values = data
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$in/$nin require an array".to_string()))?;
                if values.is_empty() {
                    return Ok(if operator == FilterOp::In { "1=0" } else { "1=1" }.to_string());
                }
                let params = values
                    .iter()
                    .map(|v| self.param(column, v))
                    .collect::<Result<Vec<_>, _>>()?;
                let keyword = if operator == FilterOp::In { "IN" } else { "NOT IN" };
                Ok(format!("{} {} ({})", quoted_column, keyword, params.join(", ")))
            }
            FilterOp::Between => match data.as_array().map(Vec::as_slice) {
                Some([low, high]) => Ok(format!(
                    "{} BETWEEN {} AND {}",
                    quoted_column,
                    self.param(column, low)?,
                    self.param(column, high)?
                )),
                _ => Err(FilterError::InvalidOperatorData("$between requires exactly 2 values".to_string())),
            },
            FilterOp::Null => match data.as_bool() {
                Some(true) => Ok(format!("{} IS NULL", quoted_column)),
                Some(false) => Ok(format!("{} IS NOT NULL", quoted_column)),
                None => Err(FilterError::InvalidOperatorData("$null requires a boolean".to_string())),
            },
        }
    }

    fn param(&mut self, column: &ColumnDef, value: &Value) -> Result<String, FilterError> {
        if !column.kind.accepts(value) {
            return Err(FilterError::InvalidOperatorData(format!(
                "Value {} is not valid for column {}",
                value, column.name
            )));
        }
        self.param_values.push(value.clone());
        Ok(format!("${}{}", self.param_offset + self.param_values.len(), column.kind.cast()))
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}
