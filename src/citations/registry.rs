use std::collections::HashMap;

/// Source url to reference number mapping for one compilation pass.
///
/// Numbers start at 1 and are handed out in first-seen order; they never
/// change until [`ReferenceRegistry::reset`].
#[derive(Debug, Default, Clone)]
pub struct ReferenceRegistry {
    by_url: HashMap<String, usize>,
    /// `urls[n - 1]` holds reference `n`.
    urls: Vec<String>,
    titles: HashMap<String, String>,
}

impl ReferenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number for `url`, assigning the next one on first sight.
    pub fn number_for(&mut self, url: &str) -> usize {
        if let Some(number) = self.by_url.get(url) {
            return *number;
        }
        self.urls.push(url.to_string());
        let number = self.urls.len();
        self.by_url.insert(url.to_string(), number);
        number
    }

    pub fn number(&self, url: &str) -> Option<usize> {
        self.by_url.get(url).copied()
    }

    pub fn url(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|idx| self.urls.get(idx))
            .map(String::as_str)
    }

    /// Remember a display title. Empty titles never overwrite a known one.
    pub fn set_title(&mut self, url: &str, title: &str) {
        let title = title.trim();
        if !title.is_empty() {
            self.titles.insert(url.to_string(), title.to_string());
        }
    }

    pub fn title(&self, url: &str) -> Option<&str> {
        self.titles.get(url).map(String::as_str)
    }

    /// `(number, url)` in ascending number order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &str)> {
        self.urls
            .iter()
            .enumerate()
            .map(|(idx, url)| (idx + 1, url.as_str()))
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Keep only the given reference numbers, renumbered 1.. in the order
    /// listed. Returns the old-to-new mapping; unknown and repeated numbers
    /// are skipped. Titles of dropped urls are kept.
    pub fn retain_in_order(&mut self, numbers: &[usize]) -> HashMap<usize, usize> {
        let mut mapping = HashMap::new();
        let mut urls = Vec::new();
        for &old in numbers {
            if mapping.contains_key(&old) {
                continue;
            }
            if let Some(url) = self.url(old) {
                urls.push(url.to_string());
                mapping.insert(old, urls.len());
            }
        }

        self.by_url = urls
            .iter()
            .enumerate()
            .map(|(idx, url)| (url.clone(), idx + 1))
            .collect();
        self.urls = urls;
        mapping
    }

    pub fn reset(&mut self) {
        self.by_url.clear();
        self.urls.clear();
        self.titles.clear();
    }
}
