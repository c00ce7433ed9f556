// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page-range grammar: turns expressions such as "1-3,5,7-9" or "all" into a
// validated, strictly increasing list of 1-based page indices.
//
// Grammar (tokens separated by commas, whitespace around tokens ignored):
//
//   token := "all" | N | A "-" B
//   N, A, B := ASCII digits
//
// A bare `0` is malformed; a range bound of `0` is out of range.  Resolution
// always happens against a known page count, so callers must load the
// document before selecting pages.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::error::{PexelError, Result};

/// Keyword selecting every page of the document.
const ALL_KEYWORD: &str = "all";

/// A normalised page selection: strictly increasing, deduplicated, every
/// index within `1..=page_count`.  Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRangeSpec {
    pages: Vec<u32>,
    page_count: u32,
}

/// Resolve `expression` against a document with `page_count` pages.
///
/// Fails fast on the first offending token; no partial selection is ever
/// returned.
pub fn resolve(expression: &str, page_count: u32) -> Result<PageRangeSpec> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(PexelError::EmptySelection);
    }

    let mut selected = BTreeSet::new();
    for raw in trimmed.split(',') {
        let token = raw.trim();

        if token.eq_ignore_ascii_case(ALL_KEYWORD) {
            selected.extend(1..=page_count);
            continue;
        }

        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_index(start.trim(), token)?;
                let end = parse_index(end.trim(), token)?;
                if start > end {
                    return Err(PexelError::InvertedRange { start, end });
                }
                if start == 0 {
                    return Err(PexelError::OutOfRange {
                        index: start,
                        page_count,
                    });
                }
                if end > page_count {
                    return Err(PexelError::OutOfRange {
                        index: end,
                        page_count,
                    });
                }
                selected.extend(start..=end);
            }
            None => {
                let index = parse_index(token, token)?;
                if index == 0 {
                    return Err(PexelError::MalformedToken(token.to_owned()));
                }
                if index > page_count {
                    return Err(PexelError::OutOfRange { index, page_count });
                }
                selected.insert(index);
            }
        }
    }

    // Only reachable through "all" on a zero-page document.
    if selected.is_empty() {
        return Err(PexelError::EmptySelection);
    }

    Ok(PageRangeSpec {
        pages: selected.into_iter().collect(),
        page_count,
    })
}

/// Parse one numeric component.  Signs, blanks, and anything beyond `u32`
/// make the whole token malformed.
fn parse_index(component: &str, token: &str) -> Result<u32> {
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PexelError::MalformedToken(token.to_owned()));
    }
    component
        .parse::<u32>()
        .map_err(|_| PexelError::MalformedToken(token.to_owned()))
}

impl PageRangeSpec {
    /// Selection covering every page, or `EmptySelection` for an empty
    /// document.
    pub fn all(page_count: u32) -> Result<Self> {
        resolve(ALL_KEYWORD, page_count)
    }

    /// The selected 1-based page indices in ascending order.
    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    /// Page count the selection was resolved against.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Always `false` for a successfully resolved selection.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Maximal runs of consecutive selected pages, e.g. `[1,2,3,5,7,8]` →
    /// `1..=3, 5..=5, 7..=8`.
    pub fn contiguous_runs(&self) -> Vec<RangeInclusive<u32>> {
        let mut runs: Vec<RangeInclusive<u32>> = Vec::new();
        for &page in &self.pages {
            match runs.last_mut() {
                Some(run) if *run.end() + 1 == page => *run = *run.start()..=page,
                _ => runs.push(page..=page),
            }
        }
        runs
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.iter().copied()
    }
}

impl fmt::Display for PageRangeSpec {
    /// Compact canonical form, e.g. `1-3,5,7-9`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, run) in self.contiguous_runs().iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if run.start() == run.end() {
                write!(f, "{}", run.start())?;
            } else {
                write!(f, "{}-{}", run.start(), run.end())?;
            }
        }
        Ok(())
    }
}
