// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Non-fatal anomalies reported alongside results.
//!
//! Skipped features, degraded optional outputs and fallbacks are collected
//! here so the caller can report partial success. Repeated messages from the
//! same producer are folded into a single counted entry.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single advisory message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    /// Producer that raised it, e.g. "structure"
    pub source: String,
    pub message: String,
    /// How many times the same message was raised
    pub count: usize,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count > 1 {
            write!(f, "{}: {} (x{})", self.source, self.message, self.count)
        } else {
            write!(f, "{}: {}", self.source, self.message)
        }
    }
}

/// Ordered list of advisories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisories {
    entries: Vec<Advisory>,
}

impl Advisories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message, folding it into an existing identical entry
    pub fn push(&mut self, source: &str, message: impl Into<String>) {
        let message = message.into();
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|a| a.source == source && a.message == message)
        {
            existing.count += 1;
            return;
        }
        self.entries.push(Advisory {
            source: source.to_string(),
            message,
            count: 1,
        });
    }

    /// Appends all entries of another list, preserving order
    pub fn extend(&mut self, other: Advisories) {
        for advisory in other.entries {
            match self
                .entries
                .iter_mut()
                .find(|a| a.source == advisory.source && a.message == advisory.message)
            {
                Some(existing) => existing.count += advisory.count,
                None => self.entries.push(advisory),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Advisory> {
        self.entries.iter()
    }

    /// Rendered messages, one per entry
    pub fn messages(&self) -> Vec<String> {
        self.entries.iter().map(|a| a.to_string()).collect()
    }

    /// True if any entry from `source` contains `needle`
    pub fn mentions(&self, source: &str, needle: &str) -> bool {
        self.entries
            .iter()
            .any(|a| a.source == source && a.message.contains(needle))
    }
}
