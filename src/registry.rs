//! Category name to COCO category id assignment

use std::collections::HashMap;

use crate::coco::Category;
use crate::error::{ConvertError, Result};

#[derive(Debug, Clone)]
enum Numbering {
    /// Ids handed out in first-seen order, starting at 1
    FirstSeen,
    /// Ids fixed by 1-based position in a caller-supplied list
    Fixed(HashMap<String, u32>),
}

/// Stable name -> id mapping for one conversion run
///
/// Only names passed to [`CategoryRegistry::resolve`] end up in the snapshot,
/// so with a fixed order the emitted ids may be sparse.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    numbering: Numbering,
    resolved: HashMap<String, u32>,
}

impl CategoryRegistry {
    pub fn dynamic() -> Self {
        Self {
            numbering: Numbering::FirstSeen,
            resolved: HashMap::new(),
        }
    }

    pub fn with_order<S: AsRef<str>>(order: &[S]) -> Result<Self> {
        let mut positions = HashMap::with_capacity(order.len());
        for (index, name) in order.iter().enumerate() {
            let name = name.as_ref();
            if positions.insert(name.to_string(), index as u32 + 1).is_some() {
                return Err(ConvertError::DuplicateCategory(name.to_string()));
            }
        }
        Ok(Self {
            numbering: Numbering::Fixed(positions),
            resolved: HashMap::new(),
        })
    }

    /// Dynamic numbering when `order` is empty, fixed numbering otherwise
    pub fn from_order(order: &[String]) -> Result<Self> {
        if order.is_empty() {
            Ok(Self::dynamic())
        } else {
            Self::with_order(order)
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self.numbering, Numbering::Fixed(_))
    }

    /// Fail if `name` could never be resolved, without recording it
    pub fn check(&self, name: &str) -> Result<()> {
        match &self.numbering {
            Numbering::FirstSeen => Ok(()),
            Numbering::Fixed(positions) if positions.contains_key(name) => Ok(()),
            Numbering::Fixed(_) => Err(ConvertError::UnknownCategory(name.to_string())),
        }
    }

    pub fn resolve(&mut self, name: &str) -> Result<u32> {
        if let Some(&id) = self.resolved.get(name) {
            return Ok(id);
        }

        let id = match &self.numbering {
            Numbering::FirstSeen => self.resolved.len() as u32 + 1,
            Numbering::Fixed(positions) => *positions
                .get(name)
                .ok_or_else(|| ConvertError::UnknownCategory(name.to_string()))?,
        };
        self.resolved.insert(name.to_string(), id);
        Ok(id)
    }

    /// Every resolved category, sorted by id
    pub fn snapshot(&self) -> Vec<Category> {
        let mut categories: Vec<Category> = self
            .resolved
            .iter()
            .map(|(name, &id)| Category::new(id, name))
            .collect();
        categories.sort_by_key(|c| c.id);
        categories
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_first_seen() {
        let mut registry = CategoryRegistry::dynamic();
        assert_eq!(registry.resolve("cat").unwrap(), 1);
        assert_eq!(registry.resolve("dog").unwrap(), 2);
        assert_eq!(registry.resolve("cat").unwrap(), 1);

        let names: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        assert_eq!(names, vec![(1, "cat".to_string()), (2, "dog".to_string())]);
    }

    #[test]
    fn test_fixed_order_positions() {
        let mut registry = CategoryRegistry::with_order(&["dog", "cat"]).unwrap();
        assert_eq!(registry.resolve("cat").unwrap(), 2);
        match registry.resolve("bird") {
            Err(ConvertError::UnknownCategory(name)) => assert_eq!(name, "bird"),
            other => panic!("expected UnknownCategory, got {:?}", other),
        }
    }

    #[test]
    fn test_fixed_order_snapshot_only_seen() {
        let mut registry = CategoryRegistry::with_order(&["a", "b", "c"]).unwrap();
        registry.resolve("c").unwrap();
        registry.resolve("a").unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!((snapshot[0].id, snapshot[0].name.as_str()), (1, "a"));
        assert_eq!((snapshot[1].id, snapshot[1].name.as_str()), (3, "c"));
        assert_eq!(snapshot[1].supercategory, "c");
    }

    #[test]
    fn test_check_does_not_record() {
        let registry = CategoryRegistry::with_order(&["leaf"]).unwrap();
        assert!(registry.check("leaf").is_ok());
        assert!(matches!(
            registry.check("stem"),
            Err(ConvertError::UnknownCategory(_))
        ));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_duplicate_order_rejected() {
        assert!(matches!(
            CategoryRegistry::with_order(&["a", "b", "a"]),
            Err(ConvertError::DuplicateCategory(name)) if name == "a"
        ));
    }

    #[test]
    fn test_from_order_empty_is_dynamic() {
        assert!(!CategoryRegistry::from_order(&[]).unwrap().is_fixed());
        assert!(CategoryRegistry::from_order(&["x".to_string()])
            .unwrap()
            .is_fixed());
    }
}
