//! Page arithmetic for every paginated menu (households, members, options).
//!
//! Pages are numbered from 1. Entries are labelled with their absolute
//! 1-based position in the full list, so the second page of a four-per-page
//! list starts at `5:`.

/// Map a 1-based position on a 1-based page to the 0-based index in the full
/// list. Returns `None` for page 0, position 0 or a position past the page.
///
/// The result may still exceed the list length on the last page; callers
/// bound-check against the list.
pub fn resolve_index(page: usize, page_size: usize, local_index: usize) -> Option<usize> {
    if page == 0 || page_size == 0 || local_index == 0 || local_index > page_size {
        return None;
    }
    (page - 1)
        .checked_mul(page_size)?
        .checked_add(local_index - 1)
}

/// Number of pages needed for `len` entries. An empty list still has one page.
pub fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    len.div_ceil(page_size).max(1)
}

/// Page after `page`, staying on the last page.
pub fn next_page(page: usize, len: usize, page_size: usize) -> usize {
    (page + 1).min(page_count(len, page_size))
}

/// Page before `page`, staying on the first page.
pub fn previous_page(page: usize) -> usize {
    page.saturating_sub(1).max(1)
}

/// One page of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub number: usize,
    pub total_pages: usize,
    pub page_size: usize,
    pub items: &'a [T],
    /// Index of the first item in the full list.
    pub offset: usize,
}

impl<'a, T> Page<'a, T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.total_pages
    }

    /// Absolute 1-based label of the item at `position` on this page.
    pub fn label(&self, position: usize) -> usize {
        self.offset + position + 1
    }

    /// Items with their absolute labels.
    pub fn labelled(&self) -> impl Iterator<Item = (usize, &'a T)> + '_ {
        self.items
            .iter()
            .enumerate()
            .map(move |(i, item)| (self.label(i), item))
    }

    /// Resolve a numeric selection made on this page.
    ///
    /// Accepts either a label shown on the page or a page-local position;
    /// from page 2 onwards the two ranges cannot overlap.
    pub fn select(&self, number: usize) -> Option<&'a T> {
        let first_label = self.offset + 1;
        let last_label = self.offset + self.items.len();
        if (first_label..=last_label).contains(&number) {
            return self.items.get(number - first_label);
        }
        let absolute = resolve_index(self.number, self.page_size, number)?;
        let local = absolute.checked_sub(self.offset)?;
        self.items.get(local)
    }
}

/// Slice out `page` of `items`, clamping the page into range.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total_pages = page_count(items.len(), page_size);
    let number = page.clamp(1, total_pages);
    let offset = resolve_index(number, page_size, 1).unwrap_or(0);
    let end = (offset + page_size).min(items.len());
    let items = items.get(offset..end).unwrap_or(&[]);
    Page {
        number,
        total_pages,
        page_size,
        items,
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_index_first_and_later_pages() {
        assert_eq!(resolve_index(1, 4, 1), Some(0));
        assert_eq!(resolve_index(1, 4, 4), Some(3));
        assert_eq!(resolve_index(2, 4, 1), Some(4));
        assert_eq!(resolve_index(3, 3, 1), Some(6));
    }

    #[test]
    fn test_resolve_index_rejects_out_of_page() {
        assert_eq!(resolve_index(1, 4, 0), None);
        assert_eq!(resolve_index(1, 4, 5), None);
        assert_eq!(resolve_index(0, 4, 1), None);
        assert_eq!(resolve_index(1, 0, 1), None);
    }

    #[test]
    fn test_paginate_last_partial_page() {
        let items: Vec<u32> = (1..=7).collect();
        let page = paginate(&items, 3, 3);
        assert_eq!(page.items, &[7]);
        assert_eq!(page.offset, 6);
        assert!(page.has_previous());
        assert!(!page.has_next());
        assert_eq!(page.label(0), 7);
    }

    #[test]
    fn test_paginate_clamps_page() {
        let items: Vec<u32> = (1..=5).collect();
        assert_eq!(paginate(&items, 9, 4).number, 2);
        assert_eq!(paginate(&items, 0, 4).number, 1);
        let empty: Vec<u32> = Vec::new();
        let page = paginate(&empty, 1, 4);
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_select_accepts_label_or_local_position() {
        let items: Vec<char> = "abcdefg".chars().collect();
        let page = paginate(&items, 2, 3);
        assert_eq!(page.select(4), Some(&'d'));
        assert_eq!(page.select(1), Some(&'d'));
        assert_eq!(page.select(3), Some(&'f'));
        assert_eq!(page.select(7), None);
        assert_eq!(page.select(0), None);

        let last = paginate(&items, 3, 3);
        assert_eq!(last.select(7), Some(&'g'));
        assert_eq!(last.select(1), Some(&'g'));
        assert_eq!(last.select(2), None);
    }

    #[test]
    fn test_next_and_previous_page_stay_in_range() {
        assert_eq!(next_page(1, 7, 3), 2);
        assert_eq!(next_page(3, 7, 3), 3);
        assert_eq!(previous_page(1), 1);
        assert_eq!(previous_page(3), 2);
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            /// Every item is reachable through exactly one (page, position) pair.
            #[test]
            fn prop_resolve_index_covers_list(len in 1usize..40, page_size in 1usize..8) {
                let items: Vec<usize> = (0..len).collect();
                let mut seen = Vec::new();
                for page in 1..=page_count(len, page_size) {
                    let slice = paginate(&items, page, page_size);
                    for position in 1..=slice.items.len() {
                        let index = resolve_index(page, page_size, position).unwrap();
                        prop_assert_eq!(items[index], slice.items[position - 1]);
                        seen.push(index);
                    }
                }
                prop_assert_eq!(seen, (0..len).collect::<Vec<_>>());
            }

            /// Moving forward then back returns to the same page.
            #[test]
            fn prop_next_then_previous_round_trips(
                len in 1usize..40,
                page_size in 1usize..8,
                page in 1usize..10,
            ) {
                let total = page_count(len, page_size);
                let page = page.min(total);
                if page < total {
                    prop_assert_eq!(previous_page(next_page(page, len, page_size)), page);
                }
            }
        }
    }
}
