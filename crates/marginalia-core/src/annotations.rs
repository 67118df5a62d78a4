//! Housekeeping over stored annotation lists.

use tracing::{info, warn};

use crate::offsets::{byte_to_utf16, utf16_len};
use crate::types::{AnnotationRecord, SourceRange};

/// Age after which an annotation whose payload was never filled in is dropped.
pub const DEFAULT_MAX_INCOMPLETE_AGE_MS: u64 = 60 * 1000;

/// Clean up a freshly loaded annotation list.
///
/// - incomplete records (no non-blank payload field) older than
///   `max_incomplete_age_ms` are dropped
/// - records with blank anchor text are dropped
/// - records without a range get the first occurrence of their text in
///   `source`, or are dropped if it does not occur
pub fn prune_records(
    records: Vec<AnnotationRecord>,
    source: &str,
    now_ms: u64,
    max_incomplete_age_ms: u64,
) -> Vec<AnnotationRecord> {
    records
        .into_iter()
        .filter(|record| {
            if record.is_incomplete()
                && now_ms.saturating_sub(record.timestamp) > max_incomplete_age_ms
            {
                info!(id = %record.id, "removing stale incomplete annotation");
                return false;
            }
            if record.text.trim().is_empty() {
                info!(id = %record.id, "removing annotation without text");
                return false;
            }
            true
        })
        .filter_map(|mut record| {
            if record.range.is_some() {
                return Some(record);
            }
            let Some(at) = source.find(record.text.as_str()) else {
                warn!(id = %record.id, text = %record.text, "could not migrate annotation");
                return None;
            };
            let start = byte_to_utf16(source, at);
            record.range = Some(SourceRange::new(start, start + utf16_len(&record.text)));
            Some(record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000_000;

    fn complete(id: &str, text: &str, range: SourceRange) -> AnnotationRecord {
        AnnotationRecord::new(id, text, range)
            .with_kind(Default::default(), vec!["note".into()])
            .with_timestamp(NOW - 10 * 60 * 1000)
    }

    #[test]
    fn drops_stale_incomplete_records() {
        let fresh = AnnotationRecord::new("fresh", "a", SourceRange::new(0, 1))
            .with_timestamp(NOW - 5_000);
        let stale = AnnotationRecord::new("stale", "a", SourceRange::new(0, 1))
            .with_timestamp(NOW - 120_000);
        let done = complete("done", "a", SourceRange::new(0, 1));
        let kept = prune_records(
            vec![fresh, stale, done],
            "a",
            NOW,
            DEFAULT_MAX_INCOMPLETE_AGE_MS,
        );
        let ids: Vec<_> = kept.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["fresh", "done"]);
    }

    #[test]
    fn drops_records_without_text() {
        let blank = complete("blank", "  ", SourceRange::new(0, 2));
        assert!(prune_records(vec![blank], "  ", NOW, DEFAULT_MAX_INCOMPLETE_AGE_MS).is_empty());
    }

    #[test]
    fn migrates_missing_ranges() {
        let mut legacy = complete("old", "wörld", SourceRange::new(0, 0));
        legacy.range = None;
        let mut lost = complete("lost", "absent", SourceRange::new(0, 0));
        lost.range = None;

        let kept = prune_records(
            vec![legacy, lost],
            "hellö wörld",
            NOW,
            DEFAULT_MAX_INCOMPLETE_AGE_MS,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].range, Some(SourceRange::new(6, 11)));
    }
}
