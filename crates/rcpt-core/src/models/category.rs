//! Expense categories and the store that hands out immutable snapshots.

use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CategoryError, Result};

/// Name of the fallback category. Always present in a [`CategorySet`].
pub const FALLBACK_CATEGORY: &str = "Other";

/// A named category and its classification keywords.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Display name.
    pub name: String,

    /// Keywords matched case-insensitively against merchant and item text.
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Ordered category → keywords mapping.
///
/// Order is significant: classification ties go to the category configured
/// first. Edits return a new set and leave `self` untouched, so a set that
/// was handed to an in-flight classification never changes under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Category>", into = "Vec<Category>")]
pub struct CategorySet {
    categories: Vec<Category>,
}

impl CategorySet {
    /// Build a set from categories in configuration order.
    ///
    /// Later duplicates of a name are dropped, any spelling of the fallback
    /// name is renamed to [`FALLBACK_CATEGORY`], and the fallback category is
    /// appended if missing.
    pub fn new(categories: Vec<Category>) -> Self {
        let mut deduped: Vec<Category> = Vec::with_capacity(categories.len() + 1);
        for mut category in categories {
            if category.name.eq_ignore_ascii_case(FALLBACK_CATEGORY) {
                category.name = FALLBACK_CATEGORY.to_string();
            }
            if !deduped.iter().any(|c| c.name.eq_ignore_ascii_case(&category.name)) {
                deduped.push(category);
            }
        }
        if !deduped.iter().any(|c| c.name == FALLBACK_CATEGORY) {
            deduped.push(Category::new(FALLBACK_CATEGORY, &[]));
        }
        Self { categories: deduped }
    }

    /// Categories in configuration order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Category names in configuration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Name of the category used when nothing matches.
    pub fn fallback(&self) -> &str {
        FALLBACK_CATEGORY
    }

    /// A copy of this set with `name` added.
    ///
    /// New categories go before the fallback so they take part in ties
    /// ahead of it.
    pub fn with_category(&self, name: &str, keywords: &[&str]) -> std::result::Result<Self, CategoryError> {
        let name = name.trim();
        if self.contains(name) {
            return Err(CategoryError::Duplicate(name.to_string()));
        }

        let mut categories = self.categories.clone();
        let pos = categories
            .iter()
            .position(|c| c.name == FALLBACK_CATEGORY)
            .unwrap_or(categories.len());
        categories.insert(pos, Category::new(name, keywords));

        Ok(Self { categories })
    }

    /// A copy of this set without `name`.
    pub fn without_category(&self, name: &str) -> std::result::Result<Self, CategoryError> {
        if name.eq_ignore_ascii_case(FALLBACK_CATEGORY) {
            return Err(CategoryError::Reserved(FALLBACK_CATEGORY.to_string()));
        }
        if !self.contains(name) {
            return Err(CategoryError::NotFound(name.to_string()));
        }

        let categories = self
            .categories
            .iter()
            .filter(|c| !c.name.eq_ignore_ascii_case(name))
            .cloned()
            .collect();

        Ok(Self { categories })
    }

    /// A copy of this set with `keyword` appended to `category`.
    pub fn with_keyword(&self, category: &str, keyword: &str) -> std::result::Result<Self, CategoryError> {
        if !self.contains(category) {
            return Err(CategoryError::NotFound(category.to_string()));
        }

        let mut categories = self.categories.clone();
        for c in categories.iter_mut().filter(|c| c.name.eq_ignore_ascii_case(category)) {
            if !c.keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword)) {
                c.keywords.push(keyword.to_string());
            }
        }

        Ok(Self { categories })
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::new(vec![
            Category::new(
                "Food & Dining",
                &[
                    "restaurant", "餐廳", "cafe", "咖啡", "food", "食物", "dining", "meal", "飯店",
                    "pub", "酒吧", "mcdonalds", "starbucks", "subway", "麥當勞", "星巴克",
                ],
            ),
            Category::new(
                "Transportation",
                &[
                    "uber", "taxi", "計程車", "mrt", "捷運", "bus fare", "公車", "train", "火車",
                    "parking", "停車", "grab",
                ],
            ),
            Category::new(
                "Shopping",
                &[
                    "mart", "超市", "store", "商店", "shop", "購物", "market", "市場", "mall",
                    "商場", "7-eleven", "familymart", "walmart", "target", "全家", "7-11",
                ],
            ),
            Category::new(
                "Utilities",
                &[
                    "electric", "電力", "water bill", "水費", "gas station", "瓦斯", "internet", "網路",
                    "phone", "電話", "台電", "自來水", "中華電信",
                ],
            ),
            Category::new(
                "Healthcare",
                &[
                    "hospital", "醫院", "clinic", "診所", "pharmacy", "藥局", "doctor", "醫生",
                    "medical", "醫療",
                ],
            ),
            Category::new(
                "Entertainment",
                &[
                    "movie", "電影", "cinema", "戲院", "game", "遊戲", "book", "書", "music",
                    "音樂", "netflix", "spotify",
                ],
            ),
            Category::new(
                "Office Supplies",
                &[
                    "stationery", "文具", "office", "辦公", "paper", "紙張", "pens", "筆",
                    "computer", "電腦", "office depot", "staples",
                ],
            ),
            Category::new(FALLBACK_CATEGORY, &[]),
        ])
    }
}

impl From<Vec<Category>> for CategorySet {
    fn from(categories: Vec<Category>) -> Self {
        Self::new(categories)
    }
}

impl From<CategorySet> for Vec<Category> {
    fn from(set: CategorySet) -> Self {
        set.categories
    }
}

/// Holder of the current category set.
///
/// Readers take an `Arc` snapshot; writers build a new set and swap it in.
/// Receipts already classified against an older snapshot keep their category.
#[derive(Debug, Default)]
pub struct CategoryStore {
    current: RwLock<Arc<CategorySet>>,
}

impl CategoryStore {
    pub fn new(set: CategorySet) -> Self {
        Self {
            current: RwLock::new(Arc::new(set)),
        }
    }

    /// The set in effect right now.
    pub fn snapshot(&self) -> Arc<CategorySet> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Add a category with the given keywords.
    pub fn add(&self, name: &str, keywords: &[&str]) -> Result<Arc<CategorySet>> {
        self.update(|set| set.with_category(name, keywords))
    }

    /// Remove a category.
    pub fn remove(&self, name: &str) -> Result<Arc<CategorySet>> {
        self.update(|set| set.without_category(name))
    }

    /// Append a keyword to an existing category.
    pub fn add_keyword(&self, category: &str, keyword: &str) -> Result<Arc<CategorySet>> {
        self.update(|set| set.with_keyword(category, keyword))
    }

    /// Replace the whole set.
    pub fn replace(&self, set: CategorySet) -> Arc<CategorySet> {
        let set = Arc::new(set);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::clone(&set);
        set
    }

    fn update<F>(&self, edit: F) -> Result<Arc<CategorySet>>
    where
        F: FnOnce(&CategorySet) -> std::result::Result<CategorySet, CategoryError>,
    {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = Arc::new(edit(&guard)?);
        *guard = Arc::clone(&next);
        debug!("Category set updated: {} categories", next.len());
        Ok(next)
    }

    /// Load a store from a JSON file, or the default set if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No category file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let set: CategorySet = serde_json::from_str(&content)?;
        info!("Loaded {} categories from {}", set.len(), path.display());
        Ok(Self::new(set))
    }

    /// Save the current set as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self.snapshot().as_ref())?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
