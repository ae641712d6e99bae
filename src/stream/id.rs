//! Stream id allocation.

use crate::frame::MAX_STREAM_ID;

/// Hands out stream ids of one parity.
///
/// Clients use odd ids starting at 1 and servers even ids starting at 2.
/// Ids wrap within the 31-bit space; callers skip ids that are still live.
///
/// # Examples
///
/// ```
/// use rsframe::stream::StreamIdAllocator;
///
/// let mut ids = StreamIdAllocator::client();
/// assert_eq!(ids.allocate(|_| false), Some(1));
/// assert_eq!(ids.allocate(|id| id == 3), Some(5));
/// ```
#[derive(Clone, Debug)]
pub struct StreamIdAllocator {
    first: u32,
    next: u32,
}

impl StreamIdAllocator {
    /// Odd ids: 1, 3, 5, ...
    #[must_use]
    pub const fn client() -> Self { Self::starting_at(1) }

    /// Even ids: 2, 4, 6, ...
    #[must_use]
    pub const fn server() -> Self { Self::starting_at(2) }

    /// Allocator whose next candidate is `id`; its parity is kept.
    ///
    /// Ids outside `1..=MAX_STREAM_ID` restart at the smallest id of the same
    /// parity.
    #[must_use]
    pub const fn starting_at(id: u32) -> Self {
        let first = if id % 2 == 1 { 1 } else { 2 };
        let next = if id == 0 || id > MAX_STREAM_ID { first } else { id };
        Self { first, next }
    }

    /// Whether `id` has the parity this allocator hands out.
    #[must_use]
    pub const fn owns(&self, id: u32) -> bool { id != 0 && id % 2 == self.first % 2 }

    /// Next id for which `is_live` returns `false`.
    ///
    /// Returns `None` only when every id of this parity is live.
    pub fn allocate(&mut self, mut is_live: impl FnMut(u32) -> bool) -> Option<u32> {
        let space = MAX_STREAM_ID / 2 + 1;
        for _ in 0..space {
            let id = self.next;
            self.next = match id.checked_add(2) {
                Some(next) if next <= MAX_STREAM_ID => next,
                _ => self.first,
            };
            if !is_live(id) {
                return Some(id);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::rstest;

    use super::StreamIdAllocator;
    use crate::frame::MAX_STREAM_ID;

    #[rstest]
    #[case(StreamIdAllocator::client(), [1, 3, 5])]
    #[case(StreamIdAllocator::server(), [2, 4, 6])]
    fn ids_follow_parity(#[case] mut ids: StreamIdAllocator, #[case] expected: [u32; 3]) {
        let allocated = [(); 3].map(|()| ids.allocate(|_| false).expect("ids available"));
        assert_eq!(allocated, expected);
    }

    #[rstest]
    #[case(MAX_STREAM_ID, MAX_STREAM_ID, 1)]
    #[case(MAX_STREAM_ID - 1, MAX_STREAM_ID - 1, 2)]
    fn ids_wrap_within_31_bits(#[case] start: u32, #[case] first: u32, #[case] wrapped: u32) {
        let mut ids = StreamIdAllocator::starting_at(start);
        assert_eq!(ids.allocate(|_| false), Some(first));
        assert_eq!(ids.allocate(|_| false), Some(wrapped));
    }

    #[test]
    fn live_ids_are_skipped_after_wrapping() {
        let live: HashSet<u32> = [1, 3].into_iter().collect();
        let mut ids = StreamIdAllocator::starting_at(MAX_STREAM_ID);
        assert_eq!(ids.allocate(|id| live.contains(&id)), Some(MAX_STREAM_ID));
        assert_eq!(ids.allocate(|id| live.contains(&id)), Some(5));
    }

    #[test]
    fn ownership_follows_parity() {
        let client = StreamIdAllocator::client();
        assert!(client.owns(7));
        assert!(!client.owns(8));
        assert!(!client.owns(0));
        assert!(StreamIdAllocator::server().owns(8));
    }
}
