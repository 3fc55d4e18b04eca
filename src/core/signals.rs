//! Classifiers for records that signal rework or financial adjustments.
//!
//! Records carry an optional explicit `kind`. When it is absent the text is
//! matched instead, which is fragile and kept here so callers never match
//! strings themselves.
use crate::core::model::{ExpenseKind, Task, TaskKind};
use crate::core::normalize::ExpenseRow;

fn mentions(text: &str, needle: &str) -> bool {
    text.to_lowercase().contains(needle)
}

pub fn is_rework(task: &Task) -> bool {
    match task.kind {
        Some(kind) => kind == TaskKind::Rework,
        None => mentions(&task.title, "rework") || mentions(&task.description, "rework"),
    }
}

pub fn is_adjustment(expense: &ExpenseRow) -> bool {
    match expense.kind {
        Some(kind) => kind == ExpenseKind::Adjustment,
        None => {
            mentions(&expense.description, "adjustment")
                || mentions(&expense.category, "adjustment")
        }
    }
}
