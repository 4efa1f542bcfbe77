use kaldb_types::{Offset, PartitionOffsets};

/// Intersects a recovery task's requested range with the range the upstream
/// log still retains.
///
/// Both ranges are inclusive. A partial overlap is clamped to the retained
/// side; `None` means no overlap at all, either because the data aged out
/// (task entirely before the retained range) or has not been produced yet
/// (task entirely after). A `None` classification is terminal for the task.
pub fn validate_offsets(
    log_earliest: Offset,
    log_latest: Offset,
    task_start: Offset,
    task_end: Offset,
) -> Option<PartitionOffsets> {
    debug_assert!(log_earliest <= log_latest);
    debug_assert!(task_start <= task_end);

    if task_end < log_earliest || task_start > log_latest {
        return None;
    }
    Some(PartitionOffsets::new(
        task_start.max(log_earliest),
        task_end.min(log_latest),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(ke: i64, kl: i64, ts: i64, te: i64) -> Option<(i64, i64)> {
        validate_offsets(Offset(ke), Offset(kl), Offset(ts), Offset(te))
            .map(|offsets| (offsets.start_offset.0, offsets.end_offset.0))
    }

    #[test]
    fn range_entirely_inside_is_unchanged() {
        assert_eq!(validate(100, 900, 200, 300), Some((200, 300)));
    }

    #[test]
    fn range_overlapping_the_beginning_is_clamped_up() {
        assert_eq!(validate(100, 900, 50, 300), Some((100, 300)));
    }

    #[test]
    fn range_overlapping_the_end_is_clamped_down() {
        assert_eq!(validate(100, 900, 800, 1000), Some((800, 900)));
    }

    #[test]
    fn range_entirely_before_is_unrecoverable() {
        assert_eq!(validate(100, 900, 1, 50), None);
    }

    #[test]
    fn range_entirely_after_is_unrecoverable() {
        assert_eq!(validate(100, 900, 1000, 5000), None);
    }

    #[test]
    fn exact_bounds_count_as_inside() {
        assert_eq!(validate(100, 900, 100, 900), Some((100, 900)));
    }

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        assert_eq!(validate(100, 900, 1, 99), None);
        assert_eq!(validate(100, 900, 901, 901), None);
    }

    #[test]
    fn single_offset_ranges_validate() {
        assert_eq!(validate(100, 900, 100, 100), Some((100, 100)));
        assert_eq!(validate(100, 900, 900, 900), Some((900, 900)));
    }
}
