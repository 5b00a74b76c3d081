use std::collections::HashMap;

/// Message ids already processed, each kept with the time it may be forgotten from.
///
/// An id only needs remembering while its message could still pass the age
/// check. Retention starts when the id is first seen; a message dated ahead of
/// the clock extends it up to one more window, never further, so the set stays
/// bounded by the traffic of two windows whatever the payload claims.
#[derive(Debug)]
pub struct SeenMessages {
    entries: HashMap<i64, i64>,
    window_secs: i64,
    prune_threshold: usize,
}

impl SeenMessages {
    pub fn new(window_secs: i64, prune_threshold: usize) -> Self {
        Self {
            entries: HashMap::new(),
            window_secs: window_secs.max(0),
            prune_threshold,
        }
    }

    #[cfg(test)]
    pub fn has_seen(&self, id: i64) -> bool {
        self.entries.contains_key(&id)
    }

    /// Record `id`. Returns true when it was not recorded before.
    pub fn mark_seen(&mut self, id: i64, message_timestamp: i64, now: i64) -> bool {
        if self.entries.contains_key(&id) {
            return false;
        }
        if self.entries.len() >= self.prune_threshold {
            self.prune(now);
        }
        let retained_from =
            message_timestamp.clamp(now, now.saturating_add(self.window_secs));
        self.entries.insert(id, retained_from);
        true
    }

    /// Drop ids older than the window. Returns how many were removed.
    pub fn prune(&mut self, now: i64) -> usize {
        let before = self.entries.len();
        let cutoff = now.saturating_sub(self.window_secs);
        self.entries.retain(|_, retained_from| *retained_from >= cutoff);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_first_sighting_is_new() {
        let mut seen = SeenMessages::new(300, 100);
        assert!(!seen.has_seen(1));
        assert!(seen.mark_seen(1, NOW, NOW));
        assert!(seen.has_seen(1));
    }

    #[test]
    fn test_repeat_is_not_new() {
        let mut seen = SeenMessages::new(300, 100);
        assert!(seen.mark_seen(1, NOW, NOW));
        assert!(!seen.mark_seen(1, NOW, NOW + 10));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_prune_keeps_ids_inside_window() {
        let mut seen = SeenMessages::new(300, 100);
        seen.mark_seen(1, NOW - 400, NOW - 400);
        seen.mark_seen(2, NOW - 300, NOW - 300);
        seen.mark_seen(3, NOW - 10, NOW - 10);

        assert_eq!(seen.prune(NOW), 1);
        assert!(!seen.has_seen(1));
        assert!(seen.has_seen(2));
        assert!(seen.has_seen(3));
    }

    #[test]
    fn test_retention_starts_at_first_sighting() {
        let mut seen = SeenMessages::new(300, 100);
        // Already old when it arrives, but still remembered for a full window.
        seen.mark_seen(1, NOW - 1000, NOW);

        assert_eq!(seen.prune(NOW + 300), 0);
        assert_eq!(seen.prune(NOW + 301), 1);
    }

    #[test]
    fn test_future_dated_ids_are_still_pruned() {
        let mut seen = SeenMessages::new(300, 100);
        let ten_years = 10 * 365 * 24 * 3600;
        seen.mark_seen(1, NOW + ten_years, NOW);
        seen.mark_seen(2, i64::MAX, NOW);
        seen.mark_seen(3, NOW + 60, NOW);

        // Kept while the claimed date could still pass the age check...
        assert_eq!(seen.prune(NOW + 300), 0);
        assert_eq!(seen.prune(NOW + 360), 0);
        // ...but never beyond two windows after the first sighting.
        assert_eq!(seen.prune(NOW + 601), 3);
        assert_eq!(seen.len(), 0);
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let mut seen = SeenMessages::new(300, 100);
        assert!(seen.mark_seen(1, i64::MIN, i64::MIN));
        assert!(seen.mark_seen(2, i64::MAX, i64::MAX));
        assert_eq!(seen.prune(i64::MIN), 0);
        assert_eq!(seen.prune(i64::MAX), 1);
    }

    #[test]
    fn test_reaching_threshold_prunes_expired_entries() {
        let mut seen = SeenMessages::new(300, 2);
        seen.mark_seen(1, NOW - 1000, NOW - 1000);
        seen.mark_seen(2, NOW - 900, NOW - 900);

        assert!(seen.mark_seen(3, NOW, NOW));
        assert_eq!(seen.len(), 1);
        assert!(seen.has_seen(3));
    }

    #[test]
    fn test_threshold_never_evicts_live_ids() {
        let mut seen = SeenMessages::new(300, 2);
        seen.mark_seen(1, NOW, NOW);
        seen.mark_seen(2, NOW, NOW);
        seen.mark_seen(3, NOW, NOW);

        assert_eq!(seen.len(), 3);
        assert!(!seen.mark_seen(1, NOW, NOW));
    }
}
