//! A small relational algebra over materialized rows.
//!
//! Column names are qualified by the alias given at scan time (`c.id`,
//! `r.container_id`) so joined relations never collide. Every operator keeps
//! row order deterministic: scans are in physical order, joins keep the left
//! side's order, `group_by` emits groups in first-occurrence order and
//! `order_by` is stable.

use crate::core::{DbError, Result, Row, Value};
use crate::storage::Table;
use std::collections::HashMap;

/// Pseudo-column carrying the store-assigned physical row id.
pub const ROW_ID: &str = "_rowid";

#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    columns: Vec<String>,
    rows: Vec<Row>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    /// Sum of non-NULL numeric inputs. INTEGER while every input is an
    /// integer, FLOAT otherwise. NULL when there are none.
    Sum,
    /// Largest non-NULL input. NULL when there are none.
    Max,
    /// Number of non-NULL inputs.
    Count,
    /// Value from the first row of the group.
    First,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub func: AggregateFn,
    pub column: String,
    pub alias: String,
}

impl Aggregate {
    pub fn new(func: AggregateFn, column: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            func,
            column: column.into(),
            alias: alias.into(),
        }
    }

    pub fn sum(column: &str, alias: &str) -> Self {
        Self::new(AggregateFn::Sum, column, alias)
    }

    pub fn max(column: &str, alias: &str) -> Self {
        Self::new(AggregateFn::Max, column, alias)
    }

    pub fn count(column: &str, alias: &str) -> Self {
        Self::new(AggregateFn::Count, column, alias)
    }

    /// Carries a column through unchanged. Used for columns functionally
    /// dependent on the group key.
    pub fn first(column: &str) -> Self {
        Self::new(AggregateFn::First, column, column)
    }
}

// Running state for one aggregate within one group.
#[derive(Debug, Clone)]
enum Accumulator {
    Sum(Option<Value>),
    Max(Option<Value>),
    Count(i64),
    First(Option<Value>),
}

impl Accumulator {
    fn new(func: AggregateFn) -> Self {
        match func {
            AggregateFn::Sum => Self::Sum(None),
            AggregateFn::Max => Self::Max(None),
            AggregateFn::Count => Self::Count(0),
            AggregateFn::First => Self::First(None),
        }
    }

    fn feed(&mut self, value: &Value, column: &str) -> Result<()> {
        match self {
            Self::Sum(total) => {
                if value.is_null() {
                    return Ok(());
                }
                let Some(n) = value.as_f64() else {
                    return Err(DbError::TypeMismatch(format!(
                        "SUM({}) over {} value",
                        column,
                        value.type_name()
                    )));
                };
                let next = match (total.take(), value) {
                    (None, Value::Integer(i)) => Value::Integer(*i),
                    (Some(Value::Integer(acc)), Value::Integer(i)) => acc
                        .checked_add(*i)
                        .map(Value::Integer)
                        .unwrap_or(Value::Float(acc as f64 + n)),
                    (acc, _) => Value::Float(acc.and_then(|a| a.as_f64()).unwrap_or(0.0) + n),
                };
                *total = Some(next);
            }
            Self::Max(max) => {
                if !value.is_null() && max.as_ref().is_none_or(|m| value > m) {
                    *max = Some(value.clone());
                }
            }
            Self::Count(count) => {
                if !value.is_null() {
                    *count += 1;
                }
            }
            Self::First(first) => {
                if first.is_none() {
                    *first = Some(value.clone());
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Self::Sum(total) => total.unwrap_or(Value::Null),
            Self::Max(max) => max.unwrap_or(Value::Null),
            Self::Count(count) => Value::Integer(count),
            Self::First(first) => first.unwrap_or(Value::Null),
        }
    }
}

impl Relation {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|r| r.len() != columns.len()) {
            return Err(DbError::ExecutionError(format!(
                "Row has {} values, relation has {} columns",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    fn qualified_columns(table: &Table, alias: &str) -> Vec<String> {
        table
            .schema()
            .schema()
            .columns()
            .iter()
            .map(|c| format!("{}.{}", alias, c.name))
            .chain(std::iter::once(format!("{}.{}", alias, ROW_ID)))
            .collect()
    }

    fn with_row_id(id: u64, row: &Row) -> Row {
        let mut out = Vec::with_capacity(row.len() + 1);
        out.extend(row.iter().cloned());
        out.push(Value::Integer(id as i64));
        out
    }

    /// Every row of `table` in physical order, plus `alias._rowid`.
    pub fn scan(table: &Table, alias: &str) -> Self {
        Self {
            columns: Self::qualified_columns(table, alias),
            rows: table.scan().map(|(id, row)| Self::with_row_id(id, row)).collect(),
        }
    }

    /// Rows of `table` where `column = value`, served by the primary key or a
    /// secondary index when there is one.
    pub fn scan_where(table: &Table, alias: &str, column: &str, value: &Value) -> Result<Self> {
        let rows = table
            .lookup(column, value)?
            .into_iter()
            .map(|(id, row)| Self::with_row_id(id, row))
            .collect();
        Ok(Self {
            columns: Self::qualified_columns(table, alias),
            rows,
        })
    }

    /// Rows of `table` where `column` equals any of `values`, one index
    /// lookup per value.
    pub fn scan_where_any<'v>(
        table: &Table,
        alias: &str,
        column: &str,
        values: impl IntoIterator<Item = &'v Value>,
    ) -> Result<Self> {
        let mut rows = Vec::new();
        for value in values {
            rows.extend(
                table
                    .lookup(column, value)?
                    .into_iter()
                    .map(|(id, row)| Self::with_row_id(id, row)),
            );
        }
        Ok(Self {
            columns: Self::qualified_columns(table, alias),
            rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| DbError::ColumnNotFound(name.to_string(), "relation".to_string()))
    }

    /// Replaces each column's qualifier with `alias`, or adds one.
    pub fn alias(mut self, alias: &str) -> Self {
        for column in &mut self.columns {
            let bare = column.rsplit_once('.').map_or(column.as_str(), |(_, c)| c);
            *column = format!("{}.{}", alias, bare);
        }
        self
    }

    pub fn filter(mut self, predicate: impl Fn(&Row) -> bool) -> Self {
        self.rows.retain(|row| predicate(row));
        self
    }

    /// Keeps rows whose `column` equals `value`.
    pub fn filter_eq(self, column: &str, value: &Value) -> Result<Self> {
        let idx = self.column_index(column)?;
        Ok(self.filter(|row| &row[idx] == value))
    }

    pub fn filter_null(self, column: &str) -> Result<Self> {
        let idx = self.column_index(column)?;
        Ok(self.filter(|row| row[idx].is_null()))
    }

    /// `self LEFT JOIN right ON self.left_key = right.right_key`.
    ///
    /// Every left row appears at least once. Left rows without a match (and
    /// rows whose key is NULL, which never matches) are padded with NULLs.
    pub fn left_join(self, right: Relation, left_key: &str, right_key: &str) -> Result<Self> {
        let left_idx = self.column_index(left_key)?;
        let right_idx = right.column_index(right_key)?;

        let mut by_key: HashMap<&Value, Vec<usize>> = HashMap::new();
        for (i, row) in right.rows.iter().enumerate() {
            let key = &row[right_idx];
            if !key.is_null() {
                by_key.entry(key).or_default().push(i);
            }
        }

        let right_width = right.columns.len();
        let mut rows = Vec::with_capacity(self.rows.len());
        for left in &self.rows {
            let matches = by_key.get(&left[left_idx]).filter(|_| !left[left_idx].is_null());
            match matches {
                Some(indices) => {
                    for &i in indices {
                        let mut joined = left.clone();
                        joined.extend(right.rows[i].iter().cloned());
                        rows.push(joined);
                    }
                }
                None => {
                    let mut joined = left.clone();
                    joined.extend(std::iter::repeat_n(Value::Null, right_width));
                    rows.push(joined);
                }
            }
        }

        let mut columns = self.columns;
        columns.extend(right.columns);
        Ok(Self { columns, rows })
    }

    /// Groups by `keys` and computes `aggregates` per group. Output columns
    /// are the keys followed by each aggregate's alias.
    ///
    /// With no keys the whole input is one group, and that group exists even
    /// when the input is empty.
    pub fn group_by(self, keys: &[&str], aggregates: &[Aggregate]) -> Result<Self> {
        let key_idx = keys
            .iter()
            .map(|k| self.column_index(k))
            .collect::<Result<Vec<_>>>()?;
        let agg_idx = aggregates
            .iter()
            .map(|a| self.column_index(&a.column))
            .collect::<Result<Vec<_>>>()?;

        let fresh = || -> Vec<Accumulator> {
            aggregates.iter().map(|a| Accumulator::new(a.func)).collect()
        };

        let mut groups: Vec<(Row, Vec<Accumulator>)> = Vec::new();
        let mut positions: HashMap<Row, usize> = HashMap::new();
        if keys.is_empty() {
            groups.push((Vec::new(), fresh()));
            positions.insert(Vec::new(), 0);
        }

        for row in &self.rows {
            let key: Row = key_idx.iter().map(|&i| row[i].clone()).collect();
            let pos = match positions.get(&key) {
                Some(&pos) => pos,
                None => {
                    groups.push((key.clone(), fresh()));
                    positions.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            let accumulators = &mut groups[pos].1;
            for ((acc, &idx), aggregate) in accumulators.iter_mut().zip(&agg_idx).zip(aggregates) {
                acc.feed(&row[idx], &aggregate.column)?;
            }
        }

        let columns = keys
            .iter()
            .map(|k| k.to_string())
            .chain(aggregates.iter().map(|a| a.alias.clone()))
            .collect();
        let rows = groups
            .into_iter()
            .map(|(mut key, accumulators)| {
                key.extend(accumulators.into_iter().map(Accumulator::finish));
                key
            })
            .collect();
        Ok(Self { columns, rows })
    }

    /// Stable ascending sort on `keys`, compared left to right.
    pub fn order_by(mut self, keys: &[&str]) -> Result<Self> {
        let idx = keys
            .iter()
            .map(|k| self.column_index(k))
            .collect::<Result<Vec<_>>>()?;
        self.rows.sort_by(|a, b| {
            idx.iter()
                .map(|&i| a[i].cmp(&b[i]))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(self)
    }

    /// Keeps `columns` in the given order. Each entry is either a column name
    /// or `(source, output_name)` via [`Relation::project_as`].
    pub fn project(self, columns: &[&str]) -> Result<Self> {
        let pairs: Vec<(&str, &str)> = columns.iter().map(|c| (*c, *c)).collect();
        self.project_as(&pairs)
    }

    pub fn project_as(self, columns: &[(&str, &str)]) -> Result<Self> {
        let idx = columns
            .iter()
            .map(|(source, _)| self.column_index(source))
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .rows
            .into_iter()
            .map(|row| idx.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Self {
            columns: columns.iter().map(|(_, out)| out.to_string()).collect(),
            rows,
        })
    }

    /// Rewrites every value of one column.
    pub fn map_column(mut self, column: &str, f: impl Fn(Value) -> Value) -> Result<Self> {
        let idx = self.column_index(column)?;
        for row in &mut self.rows {
            let value = std::mem::replace(&mut row[idx], Value::Null);
            row[idx] = f(value);
        }
        Ok(self)
    }

    /// Typed access to row `index`.
    pub fn row(&self, index: usize) -> Option<RelationRow<'_>> {
        self.rows.get(index).map(|row| RelationRow {
            relation: self,
            row,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = RelationRow<'_>> {
        self.rows.iter().map(move |row| RelationRow {
            relation: self,
            row,
        })
    }
}

/// One row of a relation with typed getters by column name. Type errors
/// surface as `DbError::Corrupted`: the stored data does not match the
/// catalog.
#[derive(Debug, Clone, Copy)]
pub struct RelationRow<'a> {
    relation: &'a Relation,
    row: &'a Row,
}

impl<'a> RelationRow<'a> {
    pub fn get(&self, column: &str) -> Result<&'a Value> {
        let idx = self.relation.column_index(column)?;
        Ok(&self.row[idx])
    }

    fn mismatch(column: &str, expected: &str, found: &Value) -> DbError {
        DbError::Corrupted(format!(
            "Column '{}' holds {}, expected {}",
            column,
            found.type_name(),
            expected
        ))
    }

    pub fn text(&self, column: &str) -> Result<String> {
        let value = self.get(column)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Self::mismatch(column, "TEXT", value))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>> {
        match self.get(column)? {
            Value::Null => Ok(None),
            _ => self.text(column).map(Some),
        }
    }

    pub fn float(&self, column: &str) -> Result<f64> {
        let value = self.get(column)?;
        value
            .as_f64()
            .ok_or_else(|| Self::mismatch(column, "FLOAT", value))
    }

    pub fn integer(&self, column: &str) -> Result<i64> {
        let value = self.get(column)?;
        value
            .as_i64()
            .ok_or_else(|| Self::mismatch(column, "INTEGER", value))
    }

    pub fn boolean(&self, column: &str) -> Result<bool> {
        match self.get(column)? {
            Value::Boolean(b) => Ok(*b),
            other => Err(Self::mismatch(column, "BOOLEAN", other)),
        }
    }

    pub fn values(&self) -> &'a Row {
        self.row
    }
}
