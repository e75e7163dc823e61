//! Records emitted when a block of study finishes naturally.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Planned,
    Free,
    Extended,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Planned => "planned",
            SessionKind::Free => "free",
            SessionKind::Extended => "extended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(SessionKind::Planned),
            "free" => Some(SessionKind::Free),
            "extended" => Some(SessionKind::Extended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub subject: String,
    pub duration_minutes: u32,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Receives finished study blocks, typically a history store.
pub trait SessionSink {
    fn record(&mut self, record: &SessionRecord) -> Result<()>;
}

/// Shared in-memory sink; clones see the same log.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Rc<RefCell<Vec<SessionRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.borrow().clone()
    }
}

impl SessionSink for MemorySink {
    fn record(&mut self, record: &SessionRecord) -> Result<()> {
        self.records.borrow_mut().push(record.clone());
        Ok(())
    }
}
