//! Output image naming.
//!
//! Every output image gets a name at extraction time and may be renamed
//! afterwards. Three modes:
//!
//! - **Sequential**: image `i` takes `pool[i]` when a name list is loaded
//!   and long enough, otherwise its zero-padded sequence number
//!   (`001`, `002`, …).
//! - **Manual**: names are picked per image with [`NameAssigner::assign`].
//! - **Custom**: free text per image with [`NameAssigner::set_custom`].
//!
//! The pool's used-set only tracks which list names are currently bound. It
//! is advisory: nothing stops two images from sharing a name.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NamingError {
    #[error("no output image at index {index} (have {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingMode {
    #[default]
    Sequential,
    Manual,
    Custom,
}

impl fmt::Display for NamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingMode::Sequential => write!(f, "sequential"),
            NamingMode::Manual => write!(f, "manual"),
            NamingMode::Custom => write!(f, "custom"),
        }
    }
}

/// Zero-padded 1-based sequence name for a 0-based index.
///
/// ```
/// assert_eq!(pageshot::naming::sequence_name(0), "001");
/// assert_eq!(pageshot::naming::sequence_name(1233), "1234");
/// ```
pub fn sequence_name(index: usize) -> String {
    format!("{:03}", index + 1)
}

/// Ordered list of names plus the set currently bound to images.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamePool {
    names: Vec<String>,
    used: HashSet<String>,
}

impl NamePool {
    /// Build from raw entries. Entries are trimmed and empty ones dropped.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self {
            names,
            used: HashSet::new(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn mark_used(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    pub fn unmark_used(&mut self, name: &str) {
        self.used.remove(name);
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    pub fn clear_used(&mut self) {
        self.used.clear();
    }

    /// Names not currently bound, in list order.
    pub fn available(&self) -> Vec<&str> {
        self.names
            .iter()
            .filter(|n| !self.used.contains(n.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Case-insensitive substring search, in list order.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();
        self.names
            .iter()
            .filter(|n| n.to_lowercase().contains(&query))
            .map(String::as_str)
            .collect()
    }

    pub fn reset(&mut self) {
        self.names.clear();
        self.used.clear();
    }
}

/// Anything that carries an assignable name.
pub trait Named {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
    /// Free-text name entered in custom mode, if any.
    fn set_custom_name(&mut self, _custom: Option<String>) {}
}

impl Named for String {
    fn name(&self) -> &str {
        self
    }

    fn set_name(&mut self, name: String) {
        *self = name;
    }
}

/// Binds names to output images according to the current mode.
#[derive(Debug, Clone, Default)]
pub struct NameAssigner {
    mode: NamingMode,
    pool: Option<NamePool>,
}

impl NameAssigner {
    pub fn new(mode: NamingMode) -> Self {
        Self { mode, pool: None }
    }

    pub fn mode(&self) -> NamingMode {
        self.mode
    }

    pub fn pool(&self) -> Option<&NamePool> {
        self.pool.as_ref()
    }

    /// Name for the image at `index` as it is extracted.
    ///
    /// Only sequential mode with a loaded list draws from the pool; the pool
    /// name is then marked used. Every other case is the sequence number.
    pub fn name_for(&mut self, index: usize) -> String {
        if self.mode == NamingMode::Sequential {
            if let Some(pool) = self.pool.as_mut() {
                if let Some(name) = pool.get(index).map(str::to_string) {
                    pool.mark_used(&name);
                    return name;
                }
            }
        }
        sequence_name(index)
    }

    /// Install a new name list. Any previous used-set is discarded, and in
    /// sequential mode existing images are renamed from the new list.
    pub fn load_pool<T: Named>(&mut self, pool: NamePool, items: &mut [T]) {
        let mut pool = pool;
        pool.clear_used();
        self.pool = Some(pool);
        if self.mode == NamingMode::Sequential {
            self.apply_sequential(items);
        }
    }

    /// Remove the name list. Every image falls back to its sequence number.
    pub fn clear_pool<T: Named>(&mut self, items: &mut [T]) {
        self.pool = None;
        for (index, item) in items.iter_mut().enumerate() {
            item.set_name(sequence_name(index));
            item.set_custom_name(None);
        }
    }

    /// Switch mode. With a list loaded the used-set is cleared; switching to
    /// sequential re-derives every name.
    pub fn set_mode<T: Named>(&mut self, mode: NamingMode, items: &mut [T]) {
        self.mode = mode;
        if let Some(pool) = self.pool.as_mut() {
            pool.clear_used();
        }
        if mode == NamingMode::Sequential {
            self.apply_sequential(items);
        }
    }

    /// Rename every image by position.
    pub fn apply_sequential<T: Named>(&mut self, items: &mut [T]) {
        for (index, item) in items.iter_mut().enumerate() {
            let name = self.name_for(index);
            item.set_name(name);
        }
    }

    /// Manually bind `name` to the image at `index`.
    ///
    /// The previous name is released from the used-set first. A blank name
    /// falls back to the sequence number.
    pub fn assign<T: Named>(
        &mut self,
        items: &mut [T],
        index: usize,
        name: &str,
    ) -> Result<String, NamingError> {
        let len = items.len();
        let item = items
            .get_mut(index)
            .ok_or(NamingError::IndexOutOfRange { index, len })?;

        if let Some(pool) = self.pool.as_mut() {
            pool.unmark_used(item.name());
        }

        let trimmed = name.trim();
        let bound = if trimmed.is_empty() {
            sequence_name(index)
        } else {
            if let Some(pool) = self.pool.as_mut() {
                pool.mark_used(trimmed);
            }
            trimmed.to_string()
        };
        item.set_name(bound.clone());
        Ok(bound)
    }

    /// Set a free-text name. Blank text falls back to the sequence number.
    /// The used-set is not touched.
    pub fn set_custom<T: Named>(
        &mut self,
        items: &mut [T],
        index: usize,
        text: &str,
    ) -> Result<String, NamingError> {
        let len = items.len();
        let item = items
            .get_mut(index)
            .ok_or(NamingError::IndexOutOfRange { index, len })?;

        let trimmed = text.trim();
        let (name, custom) = if trimmed.is_empty() {
            (sequence_name(index), None)
        } else {
            (trimmed.to_string(), Some(trimmed.to_string()))
        };
        item.set_custom_name(custom);
        item.set_name(name.clone());
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[String]) -> Vec<&str> {
        items.iter().map(String::as_str).collect()
    }

    fn extracted(assigner: &mut NameAssigner, count: usize) -> Vec<String> {
        (0..count).map(|i| assigner.name_for(i)).collect()
    }

    // =========================================================================
    // sequence_name / NamePool
    // =========================================================================

    #[test]
    fn sequence_names_padded() {
        assert_eq!(sequence_name(0), "001");
        assert_eq!(sequence_name(41), "042");
        assert_eq!(sequence_name(999), "1000");
    }

    #[test]
    fn pool_trims_and_drops_blank() {
        let pool = NamePool::new(["  Alice ", "", "   ", "Bob"]);
        assert_eq!(pool.names(), &["Alice".to_string(), "Bob".to_string()]);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn pool_available_excludes_used() {
        let mut pool = NamePool::new(["A", "B", "C"]);
        pool.mark_used("B");
        assert_eq!(pool.available(), vec!["A", "C"]);
        assert!(pool.is_used("B"));
        pool.unmark_used("B");
        assert_eq!(pool.available(), vec!["A", "B", "C"]);
    }

    #[test]
    fn pool_search_is_case_insensitive() {
        let pool = NamePool::new(["Chen Wei", "Lin Mei", "chang"]);
        assert_eq!(pool.search("CH"), vec!["Chen Wei", "chang"]);
        assert_eq!(pool.search("mei"), vec!["Lin Mei"]);
        assert!(pool.search("zzz").is_empty());
    }

    #[test]
    fn pool_reset_empties() {
        let mut pool = NamePool::new(["A"]);
        pool.mark_used("A");
        pool.reset();
        assert!(pool.is_empty());
        assert!(!pool.is_used("A"));
    }

    // =========================================================================
    // Sequential
    // =========================================================================

    #[test]
    fn sequential_without_pool_uses_numbers() {
        let mut assigner = NameAssigner::default();
        assert_eq!(extracted(&mut assigner, 3), vec!["001", "002", "003"]);
    }

    #[test]
    fn sequential_pool_shorter_than_outputs() {
        let mut assigner = NameAssigner::new(NamingMode::Sequential);
        assigner.load_pool::<String>(NamePool::new(["A", "B"]), &mut []);

        assert_eq!(extracted(&mut assigner, 3), vec!["A", "B", "003"]);
        let pool = assigner.pool().unwrap();
        assert!(pool.is_used("A") && pool.is_used("B"));
    }

    #[test]
    fn manual_mode_extracts_sequence_numbers() {
        let mut assigner = NameAssigner::new(NamingMode::Manual);
        assigner.load_pool::<String>(NamePool::new(["A", "B"]), &mut []);
        assert_eq!(extracted(&mut assigner, 2), vec!["001", "002"]);
    }

    #[test]
    fn loading_pool_renames_existing_in_sequential() {
        let mut assigner = NameAssigner::default();
        let mut items = extracted(&mut assigner, 3);

        assigner.load_pool(NamePool::new(["X", "Y", "Z", "W"]), &mut items);
        assert_eq!(names(&items), vec!["X", "Y", "Z"]);
        assert_eq!(assigner.pool().unwrap().available(), vec!["W"]);
    }

    #[test]
    fn clearing_pool_resets_to_numbers() {
        let mut assigner = NameAssigner::default();
        let mut items = vec![String::new(); 2];
        assigner.load_pool(NamePool::new(["X", "Y"]), &mut items);

        assigner.clear_pool(&mut items);
        assert_eq!(names(&items), vec!["001", "002"]);
        assert!(assigner.pool().is_none());
    }

    // =========================================================================
    // Manual
    // =========================================================================

    #[test]
    fn manual_assign_swaps_used_names() {
        let mut assigner = NameAssigner::new(NamingMode::Manual);
        let mut items = extracted(&mut assigner, 2);
        assigner.load_pool(NamePool::new(["A", "B", "C"]), &mut items);

        assigner.assign(&mut items, 0, "B").unwrap();
        assert!(assigner.pool().unwrap().is_used("B"));

        assigner.assign(&mut items, 0, "C").unwrap();
        let pool = assigner.pool().unwrap();
        assert!(!pool.is_used("B"));
        assert!(pool.is_used("C"));
        assert_eq!(names(&items), vec!["C", "002"]);
    }

    #[test]
    fn manual_blank_falls_back_and_releases() {
        let mut assigner = NameAssigner::new(NamingMode::Manual);
        let mut items = extracted(&mut assigner, 2);
        assigner.load_pool(NamePool::new(["A"]), &mut items);

        assigner.assign(&mut items, 1, " A ").unwrap();
        assert_eq!(items[1], "A");

        let name = assigner.assign(&mut items, 1, "   ").unwrap();
        assert_eq!(name, "002");
        assert!(!assigner.pool().unwrap().is_used("A"));
    }

    #[test]
    fn manual_used_set_is_advisory() {
        let mut assigner = NameAssigner::new(NamingMode::Manual);
        let mut items = extracted(&mut assigner, 2);
        assigner.load_pool(NamePool::new(["A"]), &mut items);

        assigner.assign(&mut items, 0, "A").unwrap();
        assigner.assign(&mut items, 1, "A").unwrap();
        assert_eq!(names(&items), vec!["A", "A"]);
    }

    #[test]
    fn assign_out_of_range() {
        let mut assigner = NameAssigner::new(NamingMode::Manual);
        let mut items = vec!["001".to_string()];
        assert_eq!(
            assigner.assign(&mut items, 3, "A"),
            Err(NamingError::IndexOutOfRange { index: 3, len: 1 })
        );
    }

    // =========================================================================
    // Custom / mode changes
    // =========================================================================

    #[test]
    fn custom_text_trimmed_or_sequence() {
        let mut assigner = NameAssigner::new(NamingMode::Custom);
        let mut items = extracted(&mut assigner, 2);

        assert_eq!(assigner.set_custom(&mut items, 0, "  front cover ").unwrap(), "front cover");
        assert_eq!(assigner.set_custom(&mut items, 1, "").unwrap(), "002");
        assert_eq!(names(&items), vec!["front cover", "002"]);
    }

    #[test]
    fn custom_does_not_touch_used_set() {
        let mut assigner = NameAssigner::new(NamingMode::Custom);
        let mut items = extracted(&mut assigner, 1);
        assigner.load_pool(NamePool::new(["A"]), &mut items);

        assigner.set_custom(&mut items, 0, "A").unwrap();
        assert!(!assigner.pool().unwrap().is_used("A"));
    }

    #[test]
    fn switching_to_sequential_reapplies_pool() {
        let mut assigner = NameAssigner::new(NamingMode::Manual);
        let mut items = extracted(&mut assigner, 2);
        assigner.load_pool(NamePool::new(["A", "B"]), &mut items);
        assigner.assign(&mut items, 0, "B").unwrap();

        assigner.set_mode(NamingMode::Sequential, &mut items);
        assert_eq!(names(&items), vec!["A", "B"]);
        let pool = assigner.pool().unwrap();
        assert!(pool.is_used("A") && pool.is_used("B"));
    }

    #[test]
    fn switching_to_manual_clears_used_set() {
        let mut assigner = NameAssigner::default();
        let mut items = vec![String::new(); 2];
        assigner.load_pool(NamePool::new(["A", "B"]), &mut items);

        assigner.set_mode(NamingMode::Manual, &mut items);
        assert_eq!(assigner.pool().unwrap().available(), vec!["A", "B"]);
        // Names stay as they were.
        assert_eq!(names(&items), vec!["A", "B"]);
    }
}
