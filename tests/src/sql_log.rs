use crate::logging_driver::Statement;
use std::sync::{Arc, Mutex};

/// A wrapper around the statement log that provides a clean API for tests
pub struct SqlLog {
    statements: Arc<Mutex<Vec<Statement>>>,
}

impl SqlLog {
    pub(crate) fn new(statements: Arc<Mutex<Vec<Statement>>>) -> Self {
        Self { statements }
    }

    /// Get the number of logged statements
    pub fn len(&self) -> usize {
        self.statements.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.lock().unwrap().is_empty()
    }

    /// The SQL of every logged statement, oldest first
    pub fn sql(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|statement| statement.sql.clone())
            .collect()
    }

    /// Count statements whose SQL matches the given predicate
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .filter(|statement| predicate(&statement.sql))
            .count()
    }

    pub fn selects(&self) -> usize {
        self.count(|sql| sql.starts_with("SELECT"))
    }

    pub fn inserts(&self) -> usize {
        self.count(|sql| sql.starts_with("INSERT"))
    }

    pub fn updates(&self) -> usize {
        self.count(|sql| sql.starts_with("UPDATE"))
    }

    pub fn deletes(&self) -> usize {
        self.count(|sql| sql.starts_with("DELETE"))
    }

    pub fn clear(&mut self) {
        self.statements.lock().unwrap().clear();
    }

    /// Remove and return the oldest statement
    pub fn pop(&mut self) -> Option<Statement> {
        let mut statements = self.statements.lock().unwrap();
        if statements.is_empty() {
            None
        } else {
            Some(statements.remove(0))
        }
    }
}
