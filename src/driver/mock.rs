//! Scripted in-memory driver
//!
//! `SELECT` statements consume queued result sets in order; every other statement
//! consumes a queued affected-row count (default `1`). Every execution is logged with
//! its SQL and bound values. A cursor that is executed again returns the same rows
//! without consuming another result set, like a re-run prepared statement.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use sea_query::Value;

use crate::error::{MapperError, MapperResult};

use super::{Backend, Cursor, Database, Row};

/// One executed statement
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

impl LoggedStatement {
    pub fn is_select(&self) -> bool {
        is_select(&self.sql)
    }
}

#[derive(Debug, Default)]
struct MockState {
    query_results: VecDeque<Vec<Row>>,
    exec_results: VecDeque<u64>,
    insert_ids: VecDeque<i64>,
    next_insert_id: i64,
    last_insert_id: i64,
    log: Vec<LoggedStatement>,
    absolute_fetch: bool,
    hide_row_count: bool,
    transaction_depth: usize,
}

/// Mock database handle; clones share the same script and log
#[derive(Debug, Clone)]
pub struct MockDatabase {
    backend: Backend,
    state: Rc<RefCell<MockState>>,
}

fn is_select(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
}

impl MockDatabase {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            state: Rc::new(RefCell::new(MockState {
                next_insert_id: 1,
                ..MockState::default()
            })),
        }
    }

    /// Queue result sets for upcoming `SELECT` statements
    pub fn append_query_results(self, results: Vec<Vec<Row>>) -> Self {
        self.state.borrow_mut().query_results.extend(results);
        self
    }

    /// Queue affected-row counts for upcoming non-`SELECT` statements
    pub fn append_exec_results(self, results: Vec<u64>) -> Self {
        self.state.borrow_mut().exec_results.extend(results);
        self
    }

    /// Queue identifiers returned by `last_insert_id`; afterwards a counter takes over
    pub fn append_insert_ids(self, ids: Vec<i64>) -> Self {
        self.state.borrow_mut().insert_ids.extend(ids);
        self
    }

    /// First identifier handed out by the insert counter
    pub fn with_next_insert_id(self, id: i64) -> Self {
        self.state.borrow_mut().next_insert_id = id;
        self
    }

    pub fn with_absolute_fetch(self, enabled: bool) -> Self {
        self.state.borrow_mut().absolute_fetch = enabled;
        self
    }

    /// Make cursors report no row count, forcing a counting scan
    pub fn without_row_count(self) -> Self {
        self.state.borrow_mut().hide_row_count = true;
        self
    }

    /// Queue more `SELECT` results on a shared handle
    pub fn push_query_results(&self, results: Vec<Vec<Row>>) {
        self.state.borrow_mut().query_results.extend(results);
    }

    pub fn statements(&self) -> Vec<LoggedStatement> {
        self.state.borrow().log.clone()
    }

    /// Logged statements whose SQL starts with `prefix` (case-insensitive)
    pub fn statements_starting_with(&self, prefix: &str) -> Vec<LoggedStatement> {
        self.state
            .borrow()
            .log
            .iter()
            .filter(|s| {
                s.sql
                    .trim_start()
                    .get(..prefix.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
            })
            .cloned()
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.borrow_mut().log.clear();
    }

    pub fn pending_query_results(&self) -> usize {
        self.state.borrow().query_results.len()
    }

    pub fn transaction_depth(&self) -> usize {
        self.state.borrow().transaction_depth
    }
}

impl Database for MockDatabase {
    fn backend(&self) -> Backend {
        self.backend
    }

    fn prepare(&self, sql: &str) -> MapperResult<Box<dyn Cursor>> {
        if sql.trim().is_empty() {
            return Err(MapperError::Driver("cannot prepare an empty statement".into()));
        }
        Ok(Box::new(MockCursor {
            sql: sql.to_string(),
            state: self.state.clone(),
            rows: None,
            position: 0,
            closed: false,
        }))
    }

    fn last_insert_id(&self) -> MapperResult<i64> {
        Ok(self.state.borrow().last_insert_id)
    }

    fn begin(&self) -> MapperResult<()> {
        self.state.borrow_mut().transaction_depth += 1;
        Ok(())
    }

    fn commit(&self) -> MapperResult<()> {
        let mut state = self.state.borrow_mut();
        if state.transaction_depth == 0 {
            return Err(MapperError::Driver("commit without transaction".into()));
        }
        state.transaction_depth -= 1;
        Ok(())
    }

    fn rollback(&self) -> MapperResult<()> {
        let mut state = self.state.borrow_mut();
        if state.transaction_depth == 0 {
            return Err(MapperError::Driver("rollback without transaction".into()));
        }
        state.transaction_depth -= 1;
        Ok(())
    }

    fn supports_absolute_fetch(&self) -> bool {
        self.state.borrow().absolute_fetch
    }
}

struct MockCursor {
    sql: String,
    state: Rc<RefCell<MockState>>,
    rows: Option<Vec<Row>>,
    position: usize,
    closed: bool,
}

impl Cursor for MockCursor {
    fn execute(&mut self, params: &[Value]) -> MapperResult<u64> {
        let mut state = self.state.borrow_mut();
        state.log.push(LoggedStatement {
            sql: self.sql.clone(),
            values: params.to_vec(),
        });
        self.closed = false;
        self.position = 0;

        if is_select(&self.sql) {
            if self.rows.is_none() {
                self.rows = Some(state.query_results.pop_front().unwrap_or_default());
            }
            return Ok(self.rows.as_ref().map_or(0, Vec::len) as u64);
        }

        let affected = state.exec_results.pop_front().unwrap_or(1);
        if self.sql.trim_start().to_ascii_lowercase().starts_with("insert") {
            let id = match state.insert_ids.pop_front() {
                Some(id) => id,
                None => {
                    let id = state.next_insert_id;
                    state.next_insert_id += 1;
                    id
                }
            };
            state.last_insert_id = id;
        }
        Ok(affected)
    }

    fn fetch(&mut self, position: usize) -> MapperResult<Option<Row>> {
        if !self.state.borrow().absolute_fetch {
            return Err(MapperError::Driver(
                "absolute fetch is not supported by this connection".into(),
            ));
        }
        let row = self.current_rows()?.get(position).cloned();
        self.position = position + 1;
        Ok(row)
    }

    fn fetch_next(&mut self) -> MapperResult<Option<Row>> {
        let row = self.current_rows()?.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn row_count(&self) -> Option<usize> {
        if self.state.borrow().hide_row_count {
            return None;
        }
        self.rows.as_ref().map(Vec::len)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

impl MockCursor {
    fn current_rows(&self) -> MapperResult<&[Row]> {
        if self.closed {
            return Err(MapperError::Driver("fetch from a closed cursor".into()));
        }
        self.rows
            .as_deref()
            .ok_or_else(|| MapperError::Driver("fetch before execute".into()))
    }
}
