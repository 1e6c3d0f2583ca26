//! Test directory: a fixed set of known students.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use registrar_core::directory::{DirectoryClient, DirectoryError};
use registrar_core::ids::StudentId;

/// A directory that knows exactly the students it was built with.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    students: HashSet<String>,
    unavailable: AtomicBool,
}

impl StaticDirectory {
    /// Creates a directory that knows `students`.
    #[must_use]
    pub fn with_students(students: &[&str]) -> Self {
        Self {
            students: students.iter().map(|s| (*s).to_owned()).collect(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Makes every lookup fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl DirectoryClient for StaticDirectory {
    async fn student_exists(&self, student_id: &StudentId) -> Result<bool, DirectoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable("connection refused".into()));
        }
        Ok(self.students.contains(student_id.as_str()))
    }
}
