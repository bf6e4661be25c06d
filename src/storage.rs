use crate::core::answers::AnswerStore;
use crate::error::Result;
use log::debug;
use std::collections::HashMap;

/// Where the answers of a template are kept between sessions, keyed by the
/// template title.
pub trait AnswerStorage {
    fn load(&mut self, title: &str) -> Result<Option<AnswerStore>>;
    fn save(&mut self, title: &str, answers: &AnswerStore) -> Result<()>;
    fn delete(&mut self, title: &str) -> Result<()>;
    /// Forget the answers of every template.
    fn clear(&mut self) -> Result<()>;
}

/// Keeps answers for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: HashMap<String, AnswerStore>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl AnswerStorage for MemoryStorage {
    fn load(&mut self, title: &str) -> Result<Option<AnswerStore>> {
        Ok(self.tables.get(title).cloned())
    }

    fn save(&mut self, title: &str, answers: &AnswerStore) -> Result<()> {
        debug!("saving answers of {title}");
        self.tables.insert(title.to_string(), answers.clone());
        Ok(())
    }

    fn delete(&mut self, title: &str) -> Result<()> {
        self.tables.remove(title);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.tables.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::answers::SetOptions;
    use crate::core::index::Index;

    #[test]
    fn tables_are_kept_per_title() {
        let mut storage = MemoryStorage::new();
        let mut answers = AnswerStore::new();
        answers.set("a", true, Index::DEFAULT, SetOptions::default());

        storage.save("one", &answers).unwrap();
        storage.save("two", &AnswerStore::new()).unwrap();
        assert_eq!(storage.load("one").unwrap(), Some(answers));
        assert_eq!(storage.load("missing").unwrap(), None);

        storage.delete("one").unwrap();
        assert_eq!(storage.load("one").unwrap(), None);
        assert_eq!(storage.len(), 1);
        storage.clear().unwrap();
        assert!(storage.is_empty());
    }
}
