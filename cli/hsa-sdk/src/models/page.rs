use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(10).unwrap();

/// `limit`/`skip` pair sent upstream for a zero based page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PageRequest {
    pub limit: u32,
    pub skip: u64,
}

impl PageRequest {
    pub fn new(page: u32, page_size: NonZeroU32) -> Self {
        Self {
            limit: page_size.get(),
            skip: u64::from(page) * u64::from(page_size.get()),
        }
    }

    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("limit", self.limit.to_string()),
            ("skip", self.skip.to_string()),
        ]
    }
}

/// One page of records and the total number of records matching the filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPage<T> {
    pub records: Vec<T>,
    pub total: u64,
}

impl<T> Default for ResultPage<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            total: 0,
        }
    }
}

impl<T> ResultPage<T> {
    pub fn new(records: Vec<T>, total: u64) -> Self {
        Self { records, total }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop records beyond `limit`; upstream may ignore the limit we sent.
    pub fn truncated(mut self, limit: u32) -> Self {
        self.records.truncate(limit as usize);
        self
    }

    /// Number of pages needed to show `total` records, at least one.
    pub fn page_count(&self, page_size: NonZeroU32) -> u64 {
        self.total.div_ceil(u64::from(page_size.get())).max(1)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn skip_is_page_times_size(page in any::<u32>(), size in 1u32..=1000) {
            let size = NonZeroU32::new(size).unwrap();
            let request = PageRequest::new(page, size);
            prop_assert_eq!(request.limit, size.get());
            prop_assert_eq!(request.skip, u64::from(page) * u64::from(size.get()));
        }

        #[test]
        fn truncated_page_fits_limit(len in 0usize..40, limit in 1u32..20) {
            let page = ResultPage::new(vec![(); len], len as u64).truncated(limit);
            prop_assert!(page.records.len() <= limit as usize);
            prop_assert_eq!(page.total, len as u64);
        }
    }

    #[test]
    fn page_count_is_at_least_one() {
        let size = DEFAULT_PAGE_SIZE;
        assert_eq!(ResultPage::<()>::default().page_count(size), 1);
        assert_eq!(ResultPage::new(vec![(); 3], 208).page_count(size), 21);
        assert_eq!(ResultPage::new(vec![(); 3], 200).page_count(size), 20);
    }
}
