//! Point-in-Time Locator
//!
//! The only place that decides which history counts as "past". Everything
//! that reads a timeline for a target row goes through [`locate`].

use crate::models::EventTime;

/// Anything sorted on an event time
pub trait Timed {
    fn event_time(&self) -> EventTime;
}

/// Index of the last element with `event_time < query_time`
///
/// `timeline` must be sorted ascending by event time. Elements sharing
/// `query_time` are excluded, so a record is never its own predecessor.
/// Returns `None` when nothing lies strictly before `query_time`.
pub fn locate<T: Timed>(timeline: &[T], query_time: EventTime) -> Option<usize> {
    let boundary = timeline.partition_point(|e| e.event_time() < query_time);
    boundary.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point(EventTime);

    impl Timed for Point {
        fn event_time(&self) -> EventTime {
            self.0
        }
    }

    fn day(d: u32) -> EventTime {
        EventTime::from_ymd(2024, 1, d).unwrap()
    }

    fn points(days: &[u32]) -> Vec<Point> {
        days.iter().map(|&d| Point(day(d))).collect()
    }

    #[test]
    fn test_locate_empty() {
        let timeline: Vec<Point> = Vec::new();
        assert_eq!(locate(&timeline, day(10)), None);
    }

    #[test]
    fn test_locate_before_first() {
        let timeline = points(&[5, 10, 15]);
        assert_eq!(locate(&timeline, day(1)), None);
        assert_eq!(locate(&timeline, day(5)), None);
    }

    #[test]
    fn test_locate_strictly_less() {
        let timeline = points(&[5, 10, 15]);
        assert_eq!(locate(&timeline, day(10)), Some(0));
        assert_eq!(locate(&timeline, day(11)), Some(1));
        assert_eq!(locate(&timeline, day(30)), Some(2));
    }

    #[test]
    fn test_locate_excludes_all_ties() {
        let timeline = points(&[5, 10, 10, 10, 15]);
        assert_eq!(locate(&timeline, day(10)), Some(0));
        assert_eq!(locate(&timeline, day(11)), Some(3));
    }
}
