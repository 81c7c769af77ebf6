//! Roster Document - company profile and employee list
//!
//! Read-only view of the `{company, employees}` JSON document the admin
//! tool persists, plus per-employee copy selection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use crate::artifacts::CardId;
use crate::pipeline::PrintRequest;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid roster document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub accent_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    #[serde(default)]
    pub employee_id: String,
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub zone_color: Option<String>,
}

impl Employee {
    pub fn card_id(&self) -> CardId {
        CardId::new(self.id.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Roster {
    #[serde(default)]
    pub company: Company,
    #[serde(default)]
    pub employees: Vec<Employee>,
}

impl Roster {
    pub fn from_json(content: &str) -> Result<Self, RosterError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, RosterError> {
        let content = fs::read_to_string(path).map_err(|source| RosterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn get(&self, id: &str) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == id)
    }

    /// Flatten a selection into one entry per physical copy, in roster order.
    pub fn expand(&self, selection: &Selection) -> PrintRequest {
        for id in selection.counts.keys() {
            if self.get(id).is_none() {
                warn!(employee = %id, "Selection names an unknown employee, ignoring");
            }
        }

        PrintRequest::from_counts(
            self.employees
                .iter()
                .map(|e| (e.card_id(), selection.count(&e.id))),
        )
    }
}

/// Copies requested per employee id
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Selection {
    counts: BTreeMap<String, u32>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every employee with the same count
    pub fn all(roster: &Roster, copies: u32) -> Self {
        Self {
            counts: roster.employees.iter().map(|e| (e.id.clone(), copies)).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, RosterError> {
        let content = fs::read_to_string(path).map_err(|source| RosterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn set(&mut self, id: impl Into<String>, copies: u32) {
        self.counts.insert(id.into(), copies);
    }

    /// Add or remove copies, never going below zero
    pub fn adjust(&mut self, id: &str, delta: i64) {
        let current = i64::from(self.count(id));
        let updated = (current + delta).clamp(0, i64::from(u32::MAX)) as u32;
        self.counts.insert(id.to_string(), updated);
    }

    pub fn count(&self, id: &str) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().map(|&c| u64::from(c)).sum()
    }
}
