//! Merging noisy OCR readings into one watermark string

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Text reported when no frame produced a candidate
pub const NOT_FOUND: &str = "No watermark found";

/// Outcome of watermark extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WatermarkReading {
    Found {
        text: String,
        /// Normalized OCR candidates in frame order
        candidates: Vec<String>,
    },
    NotFound {
        candidates: Vec<String>,
    },
}

impl WatermarkReading {
    pub fn is_found(&self) -> bool {
        matches!(self, WatermarkReading::Found { .. })
    }

    /// The recovered text, or the "No watermark found" sentinel
    pub fn text(&self) -> &str {
        match self {
            WatermarkReading::Found { text, .. } => text,
            WatermarkReading::NotFound { .. } => NOT_FOUND,
        }
    }

    pub fn candidates(&self) -> &[String] {
        match self {
            WatermarkReading::Found { candidates, .. }
            | WatermarkReading::NotFound { candidates } => candidates,
        }
    }
}

impl fmt::Display for WatermarkReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Collapse runs of whitespace into single spaces and trim
pub fn normalize(candidate: &str) -> String {
    candidate.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Pick the reading to deobfuscate.
///
/// `longest` is the first candidate of maximal length. `most_frequent` is the most common
/// candidate longer than `min_len` characters, first seen winning ties. The frequent one wins
/// when it is at least as long as the longest.
pub fn choose(candidates: &[String], min_len: usize) -> Option<&str> {
    let mut longest: Option<&str> = None;
    for candidate in candidates {
        if longest.map_or(true, |best| candidate.chars().count() > best.chars().count()) {
            longest = Some(candidate);
        }
    }
    let longest = longest?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for candidate in candidates.iter().filter(|c| c.chars().count() > min_len) {
        let count = counts.entry(candidate.as_str()).or_insert(0);
        if *count == 0 {
            order.push(candidate);
        }
        *count += 1;
    }
    let most_frequent = order
        .iter()
        .copied()
        .fold(None::<(&str, usize)>, |best, candidate| {
            let count = counts[candidate];
            match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((candidate, count)),
            }
        })
        .map(|(candidate, _)| candidate);

    match most_frequent {
        Some(frequent) if frequent.chars().count() >= longest.chars().count() => Some(frequent),
        _ => Some(longest),
    }
}
