//! Count: number of matching rows, optionally grouped

use sea_query::{Asterisk, Expr, Func, Value};

use crate::driver::build_with;
use crate::error::{MapperError, MapperResult};
use crate::query::bake::locate_column;
use crate::query::Name;
use crate::session::Session;
use crate::value::TryGetable;

use super::{pull_builder, run, Pull, StatementState};

const COUNT_ALIAS: &str = "tidemap_count";

#[derive(Debug, Clone, PartialEq)]
pub enum CountResult {
    Total(u64),
    /// `(group value, count)` pairs in ascending group order
    Grouped(Vec<(Value, u64)>),
}

impl CountResult {
    /// Sum over every group
    pub fn total(&self) -> u64 {
        match self {
            CountResult::Total(n) => *n,
            CountResult::Grouped(groups) => groups.iter().map(|(_, n)| n).sum(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Count {
    pub(crate) pull: Pull,
    group_by: Option<String>,
}

pull_builder!(Count);

impl Count {
    pub fn new(entity: &str) -> Self {
        Self {
            pull: Pull::new(entity),
            group_by: None,
        }
    }

    /// Count per distinct value of a column property
    pub fn group_by(mut self, property: &str) -> Self {
        self.group_by = Some(property.to_string());
        self
    }

    pub fn to_sql(&mut self, session: &Session) -> MapperResult<(String, Vec<Value>)> {
        let schema = self.pull.resolve(session, "Count")?;
        let registry = session.registry();
        let mut select = self.pull.base_select(&schema, registry)?;
        if let Some(property) = &self.group_by {
            let Some(found) = locate_column(&schema, registry, property)? else {
                return Err(MapperError::ReferenceResolution(format!(
                    "cannot group {} by unknown property {property}",
                    schema.entity
                )));
            };
            let column = (Name::new(&found.table), Name::new(&found.item.name));
            select
                .expr_as(Expr::col(column.clone()), Name::new(&found.item.name))
                .group_by_col(column.clone())
                .order_by(column, sea_query::Order::Asc);
        }
        select.expr_as(Func::count(Expr::col(Asterisk)), Name::new(COUNT_ALIAS));
        let backend = session.database("Count")?.backend();
        self.pull.state = StatementState::QueryCompiled;
        Ok(build_with!(backend, select))
    }

    pub fn execute(&mut self, session: &Session) -> MapperResult<CountResult> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("count", entity = %self.pull.entity).entered();

        let group_column = match &self.group_by {
            Some(property) => {
                let schema = session.schema(&self.pull.entity)?;
                locate_column(&schema, session.registry(), property)?.map(|found| found.item.name)
            }
            None => None,
        };
        let (sql, values) = self.to_sql(session)?;
        let mut cursor = run(session, "Count", &sql, &values)?;
        let mut groups = Vec::new();
        while let Some(row) = cursor.fetch_next()? {
            let count = match row.get(COUNT_ALIAS) {
                Some(value) => u64::try_get(value.clone())?,
                None => 0,
            };
            let group = group_column
                .as_deref()
                .and_then(|column| row.get(column).cloned())
                .unwrap_or(Value::String(None));
            groups.push((group, count));
        }
        cursor.close();
        self.pull.state = StatementState::Executed;

        Ok(match self.group_by {
            Some(_) => CountResult::Grouped(groups),
            None => CountResult::Total(groups.first().map_or(0, |(_, n)| *n)),
        })
    }
}
