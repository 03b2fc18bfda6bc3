//! Quiz definition lookup
//!
//! The engine only ever reads quiz definitions; authoring lives in a
//! separate system. `QuizStore` is the seam to that system, and the
//! in-memory implementation here backs the server binary and the tests,
//! optionally loading definitions from a JSON file at startup.

use log::warn;
use shared::{Quiz, QuizItem, QuizRef};
use std::collections::HashMap;
use std::path::Path;

pub trait QuizStore: Send + Sync {
    /// Fetches a quiz definition by reference, or None if unknown.
    fn fetch(&self, quiz_ref: QuizRef) -> Option<Quiz>;
}

#[derive(Default)]
pub struct InMemoryQuizStore {
    quizzes: HashMap<QuizRef, Quiz>,
}

impl InMemoryQuizStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a quiz, refusing definitions whose answer key is unusable.
    pub fn insert(&mut self, quiz: Quiz) -> bool {
        if !quiz.validate() {
            warn!("Refusing quiz {} ({}): invalid answer key", quiz.id, quiz.title);
            return false;
        }
        self.quizzes.insert(quiz.id, quiz);
        true
    }

    /// Loads a JSON array of quiz definitions. Invalid entries are
    /// skipped with a warning rather than failing the whole file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let raw = std::fs::read_to_string(path)?;
        let quizzes: Vec<Quiz> = serde_json::from_str(&raw)?;

        let mut store = Self::new();
        for quiz in quizzes {
            store.insert(quiz);
        }
        Ok(store)
    }

    /// A built-in four-item quiz so the server is playable with no quiz
    /// file configured.
    pub fn with_demo_quiz() -> Self {
        let mut store = Self::new();
        store.insert(Quiz {
            id: 1,
            title: "Demo: order the seasons".to_string(),
            description: "Drag the seasons into calendar order.".to_string(),
            num_positions: 4,
            layout: "grid".to_string(),
            items: ["spring", "summer", "autumn", "winter"]
                .iter()
                .enumerate()
                .map(|(index, name)| QuizItem {
                    id: index as u32 + 1,
                    correct_position: index as u32 + 1,
                    image_url: format!("/img/{name}.webp"),
                    label: Some(name.to_string()),
                })
                .collect(),
        });
        store
    }

    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }
}

impl QuizStore for InMemoryQuizStore {
    fn fetch(&self, quiz_ref: QuizRef) -> Option<Quiz> {
        self.quizzes.get(&quiz_ref).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_store_serves_valid_quiz() {
        let store = InMemoryQuizStore::with_demo_quiz();

        let quiz = store.fetch(1).unwrap();
        assert!(quiz.validate());
        assert_eq!(quiz.num_positions, 4);
        assert!(store.fetch(42).is_none());
    }

    #[test]
    fn test_insert_rejects_broken_answer_key() {
        let mut store = InMemoryQuizStore::new();
        let mut quiz = InMemoryQuizStore::with_demo_quiz().fetch(1).unwrap();
        quiz.items[0].correct_position = 9;

        assert!(!store.insert(quiz));
        assert!(store.is_empty());
    }

    #[test]
    fn test_from_json_skips_invalid_entries() {
        let json = r#"[
            {
                "id": 1,
                "title": "Good",
                "num_positions": 2,
                "items": [
                    {"id": 1, "correct_position": 1, "image_url": "/a.webp", "label": null},
                    {"id": 2, "correct_position": 2, "image_url": "/b.webp", "label": "B"}
                ]
            },
            {
                "id": 2,
                "title": "Bad",
                "num_positions": 2,
                "items": [
                    {"id": 1, "correct_position": 1, "image_url": "/a.webp", "label": null}
                ]
            }
        ]"#;

        let dir = std::env::temp_dir().join("orderquiz-store-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("quizzes.json");
        std::fs::write(&path, json).unwrap();

        let store = InMemoryQuizStore::from_json_file(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.fetch(1).is_some());
        assert!(store.fetch(2).is_none());
    }
}
