use crate::barcode::{generate_variants, normalize_digits, BarcodeVariant};
use crate::pipeline::merge::merge_into;
use crate::types::{ProductLookupResult, SearchType};
use std::collections::BTreeSet;
use tracing::debug;

/// What happened to a result handed to [`PipelineContext::merge_result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Folded into the existing result at this index.
    Merged(usize),
    /// Appended as a new result at this index.
    Added(usize),
    /// No match and no room left under `max_results`.
    Dropped,
}

/// Per-query accumulator of results.
///
/// Owned by exactly one lookup and mutated by one plugin at a time, so it
/// carries no synchronization.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    query: String,
    search_type: SearchType,
    max_results: usize,
    results: Vec<ProductLookupResult>,
}

impl PipelineContext {
    pub fn new(query: impl Into<String>, search_type: SearchType, max_results: usize) -> Self {
        Self {
            query: query.into(),
            search_type,
            max_results,
            results: Vec::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn search_type(&self) -> SearchType {
        self.search_type
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn results(&self) -> &[ProductLookupResult] {
        &self.results
    }

    pub fn results_mut(&mut self) -> &mut [ProductLookupResult] {
        &mut self.results
    }

    pub fn into_results(self) -> Vec<ProductLookupResult> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn has_capacity(&self) -> bool {
        self.results.len() < self.max_results
    }

    /// Index of the first result matching `barcode`, or `name` when no
    /// barcode with digits is given.
    ///
    /// Barcodes match when their variant sets intersect or their digit
    /// strings are identical. Names match exactly, ignoring case and
    /// surrounding whitespace.
    pub fn find_matching_index(&self, barcode: Option<&str>, name: Option<&str>) -> Option<usize> {
        if let Some(digits) = barcode.map(normalize_digits).filter(|d| !d.is_empty()) {
            let wanted = generate_variants(&digits);
            return self.results.iter().position(|existing| {
                existing
                    .barcode
                    .as_deref()
                    .is_some_and(|other| barcodes_match(&digits, &wanted, other))
            });
        }

        if let Some(name) = name {
            let wanted = name.trim().to_lowercase();
            if wanted.is_empty() {
                return None;
            }
            return self.results.iter().position(|existing| {
                existing
                    .name
                    .as_deref()
                    .is_some_and(|other| other.trim().to_lowercase() == wanted)
            });
        }

        None
    }

    pub fn find_matching_result(
        &self,
        barcode: Option<&str>,
        name: Option<&str>,
    ) -> Option<&ProductLookupResult> {
        self.find_matching_index(barcode, name)
            .map(|index| &self.results[index])
    }

    pub fn find_matching_result_mut(
        &mut self,
        barcode: Option<&str>,
        name: Option<&str>,
    ) -> Option<&mut ProductLookupResult> {
        self.find_matching_index(barcode, name)
            .map(move |index| &mut self.results[index])
    }

    /// Append `result` if there is room. Returns `false` when it was dropped.
    ///
    /// Categories are deduplicated case-insensitively on the way in.
    pub fn add_result(&mut self, mut result: ProductLookupResult) -> bool {
        if !self.has_capacity() {
            debug!(
                max_results = self.max_results,
                "Result cap reached, dropping result"
            );
            return false;
        }
        for category in std::mem::take(&mut result.categories) {
            result.add_category(&category);
        }
        self.results.push(result);
        true
    }

    /// Fold `result` into its barcode/name match, or add it as a new entry.
    ///
    /// `source_id` is recorded in `dataSources` when the incoming result does
    /// not name any source itself. A barcode without digits is dropped so the
    /// result matches by name instead.
    pub fn merge_result(&mut self, source_id: &str, mut result: ProductLookupResult) -> MergeOutcome {
        if result
            .barcode
            .as_deref()
            .is_some_and(|barcode| normalize_digits(barcode).is_empty())
        {
            result.barcode = None;
        }
        if result.data_sources.is_empty() {
            let external_id = result
                .barcode
                .clone()
                .or_else(|| result.name.clone())
                .unwrap_or_default();
            result.data_sources.insert(source_id.to_string(), external_id);
        }

        let matched = self.find_matching_index(result.barcode.as_deref(), result.name.as_deref());
        match matched {
            Some(index) => {
                merge_into(&mut self.results[index], result);
                MergeOutcome::Merged(index)
            }
            None => {
                let index = self.results.len();
                if self.add_result(result) {
                    MergeOutcome::Added(index)
                } else {
                    MergeOutcome::Dropped
                }
            }
        }
    }
}

fn barcodes_match(digits: &str, wanted: &BTreeSet<BarcodeVariant>, other: &str) -> bool {
    let other_digits = normalize_digits(other);
    if other_digits.is_empty() {
        return false;
    }
    if other_digits == digits {
        return true;
    }
    if wanted.is_empty() {
        return false;
    }
    !wanted.is_disjoint(&generate_variants(&other_digits))
}
