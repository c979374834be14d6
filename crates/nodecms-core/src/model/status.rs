//! Node workflow status.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

use super::value::Value;
use crate::error::{Error, Result};

/// Publication status of a content node.
///
/// Statuses are totally ordered by their code, which is what visibility
/// comparisons (`status <= Published`, `status = Published`) rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Work in progress.
    Draft,
    /// Awaiting review.
    Pending,
    /// Publicly visible.
    Published,
    /// Withdrawn but kept.
    Archived,
    /// Logically deleted (trash).
    Deleted,
}

impl NodeStatus {
    /// All statuses in ascending order.
    pub const ALL: [NodeStatus; 5] = [
        NodeStatus::Draft,
        NodeStatus::Pending,
        NodeStatus::Published,
        NodeStatus::Archived,
        NodeStatus::Deleted,
    ];

    /// Stored integer code.
    pub fn code(self) -> i64 {
        match self {
            NodeStatus::Draft => 10,
            NodeStatus::Pending => 20,
            NodeStatus::Published => 30,
            NodeStatus::Archived => 40,
            NodeStatus::Deleted => 50,
        }
    }

    /// Decode a stored integer code.
    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Draft => "draft",
            NodeStatus::Pending => "pending",
            NodeStatus::Published => "published",
            NodeStatus::Archived => "archived",
            NodeStatus::Deleted => "deleted",
        }
    }

    /// Check whether the workflow allows moving from `self` to `to`.
    pub fn can_transition_to(self, to: NodeStatus) -> bool {
        use NodeStatus::*;
        matches!(
            (self, to),
            (Draft, Pending)
                | (Draft, Published)
                | (Pending, Published)
                | (Pending, Draft)
                | (Published, Archived)
                | (Published, Draft)
                | (Archived, Published)
                | (Deleted, Draft)
        ) || (to == Deleted && self != Deleted)
    }

    /// Validate a transition, returning the target status on success.
    pub fn transition(self, to: NodeStatus) -> Result<NodeStatus> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(Error::InvalidStatusTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code)
                .ok_or_else(|| Error::invalid_criterion("status", format!("unknown code {}", code)));
        }
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| Error::invalid_criterion("status", format!("unknown status '{}'", s)))
    }
}

impl From<NodeStatus> for Value {
    fn from(status: NodeStatus) -> Self {
        Value::Int64(status.code())
    }
}

impl ToSql for NodeStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for NodeStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_i64()?;
        Self::from_code(code).ok_or(FromSqlError::OutOfRange(code))
    }
}
