//! 并发处理下的偏移量水位
//!
//! 同一分区的消息可能乱序处理完成；只有当某偏移量之前的消息
//! 全部处理完毕时才能存储它，否则进程崩溃会丢失尚未处理的消息。

use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct PartitionState {
    in_flight: BTreeSet<i64>,
    first_seen: Option<i64>,
    max_done: Option<i64>,
    stored: Option<i64>,
}

/// 按 (topic, partition) 跟踪处理中的偏移量
#[derive(Debug, Default)]
pub struct OffsetTracker {
    partitions: Mutex<HashMap<(String, i32), PartitionState>>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记一条开始处理的消息
    pub fn begin(&self, topic: &str, partition: i32, offset: i64) {
        let mut partitions = self.partitions.lock();
        let state = partitions.entry((topic.to_string(), partition)).or_default();
        state.in_flight.insert(offset);
        state.first_seen = Some(state.first_seen.map_or(offset, |first| first.min(offset)));
    }

    /// 标记处理完成，返回现在可以安全存储的偏移量（若有推进）
    pub fn complete(&self, topic: &str, partition: i32, offset: i64) -> Option<i64> {
        let mut partitions = self.partitions.lock();
        let state = partitions.get_mut(&(topic.to_string(), partition))?;

        state.in_flight.remove(&offset);
        state.max_done = Some(state.max_done.map_or(offset, |done| done.max(offset)));

        let max_done = state.max_done?;
        let safe = match state.in_flight.first() {
            Some(&lowest) => max_done.min(lowest - 1),
            None => max_done,
        };

        // 低于本进程收到的第一条消息的位置不需要存储
        if state.first_seen.is_none_or(|first| safe < first)
            || state.stored.is_some_and(|stored| stored >= safe)
        {
            return None;
        }
        state.stored = Some(safe);
        Some(safe)
    }

    /// 某分区处理中的消息数
    pub fn in_flight(&self, topic: &str, partition: i32) -> usize {
        self.partitions
            .lock()
            .get(&(topic.to_string(), partition))
            .map_or(0, |s| s.in_flight.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_completion_advances() {
        let tracker = OffsetTracker::new();
        tracker.begin("t", 0, 10);
        tracker.begin("t", 0, 11);

        assert_eq!(tracker.complete("t", 0, 10), Some(10));
        assert_eq!(tracker.complete("t", 0, 11), Some(11));
        assert_eq!(tracker.in_flight("t", 0), 0);
    }

    #[test]
    fn test_out_of_order_completion_waits_for_gap() {
        let tracker = OffsetTracker::new();
        for offset in 10..=12 {
            tracker.begin("t", 0, offset);
        }

        assert_eq!(tracker.complete("t", 0, 12), None);
        assert_eq!(tracker.complete("t", 0, 11), None);
        assert_eq!(tracker.complete("t", 0, 10), Some(12));
    }

    #[test]
    fn test_partial_progress_behind_slow_message() {
        let tracker = OffsetTracker::new();
        for offset in [3, 4, 5] {
            tracker.begin("t", 0, offset);
        }

        assert_eq!(tracker.complete("t", 0, 3), Some(3));
        assert_eq!(tracker.complete("t", 0, 5), None);
        assert_eq!(tracker.complete("t", 0, 4), Some(5));
    }

    #[test]
    fn test_partitions_are_independent() {
        let tracker = OffsetTracker::new();
        tracker.begin("t", 0, 7);
        tracker.begin("t", 1, 2);

        assert_eq!(tracker.complete("t", 1, 2), Some(2));
        assert_eq!(tracker.in_flight("t", 0), 1);
    }

    #[test]
    fn test_unknown_partition_is_ignored() {
        let tracker = OffsetTracker::new();
        assert_eq!(tracker.complete("t", 9, 1), None);
    }
}
