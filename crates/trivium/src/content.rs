//! Loading game content from JSON files.
//!
//! A question file is a list of entries:
//!
//! ```json
//! [
//!   { "id": 1, "category": "Purple", "weight": 2.0,
//!     "prompt": "2 + 2 ?", "answer": 4 }
//! ]
//! ```
//!
//! `weight` defaults to 1. A category file is a list with one category
//! name per tile of the board.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use trivium_board::{Board, Category, TileCategories};
use trivium_room::{QuestionHandle, QuestionPool, StaticQuestion, WeightedQuestions};

use crate::TriviumError;

/// One entry of a question file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionEntry {
    pub id: i64,
    pub category: Category,
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub prompt: String,
    pub answer: Value,
}

fn default_weight() -> f64 {
    1.0
}

/// Builds a pool of exact-match questions from the text of a question
/// file.
///
/// Ids must be unique and every category must have at least one
/// question, otherwise a game could stall on an empty category.
pub fn parse_questions(text: &str) -> Result<QuestionPool, TriviumError> {
    let entries: Vec<QuestionEntry> = serde_json::from_str(text)?;

    let mut seen = HashSet::new();
    let mut by_category: BTreeMap<Category, (Vec<Arc<dyn QuestionHandle>>, Vec<f64>)> =
        BTreeMap::new();
    for entry in entries {
        if !seen.insert(entry.id) {
            return Err(TriviumError::Content(format!(
                "duplicate question id {}",
                entry.id
            )));
        }
        let (questions, weights) = by_category.entry(entry.category).or_default();
        questions.push(Arc::new(StaticQuestion::new(
            entry.id,
            entry.prompt,
            entry.answer,
        )));
        weights.push(entry.weight);
    }

    let mut pool = QuestionPool::new();
    for (category, (questions, weights)) in by_category {
        pool.insert(category, WeightedQuestions::new(questions, weights)?);
    }

    let missing = pool.missing_categories();
    if !missing.is_empty() {
        let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
        return Err(TriviumError::Content(format!(
            "no question for {}",
            names.join(", ")
        )));
    }
    tracing::debug!(questions = seen.len(), "question file parsed");
    Ok(pool)
}

pub async fn load_questions(path: &Path) -> Result<QuestionPool, TriviumError> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_questions(&text)
}

/// Parses a category table for `board`.
pub fn parse_categories(text: &str, board: &Board) -> Result<TileCategories, TriviumError> {
    let categories: Vec<Category> = serde_json::from_str(text)?;
    Ok(TileCategories::new(board, categories)?)
}

pub async fn load_categories(path: &Path, board: &Board) -> Result<TileCategories, TriviumError> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_categories(&text, board)
}

/// Colours the board by cycling through the categories in order.
///
/// Used when no category file is given.
pub fn cycled_categories(board: &Board) -> Result<TileCategories, TriviumError> {
    let categories = (0..board.len())
        .map(|tile| Category::ALL[tile % Category::ALL.len()])
        .collect();
    Ok(TileCategories::new(board, categories)?)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use trivium_room::QuestionProvider;
    use trivium_room::questions::AskedQuestions;

    use super::*;

    fn full_file() -> String {
        let entries: Vec<Value> = Category::ALL
            .iter()
            .enumerate()
            .map(|(i, category)| {
                serde_json::json!({
                    "id": i,
                    "category": category,
                    "prompt": format!("question {i}"),
                    "answer": i,
                })
            })
            .collect();
        serde_json::to_string(&entries).unwrap()
    }

    #[test]
    fn test_parse_questions_covers_every_category() {
        let pool = parse_questions(&full_file()).unwrap();
        assert!(pool.missing_categories().is_empty());

        let mut rng = StdRng::seed_from_u64(1);
        let handle = pool
            .sample(Category::Orange, &AskedQuestions::new(), &mut rng)
            .unwrap();
        let question = handle.instantiate();
        assert_eq!(question.body()["prompt"], "question 2");
        assert!(question.evaluate(&serde_json::json!(2)));
        assert!(!question.evaluate(&serde_json::json!("2")));
    }

    #[test]
    fn test_parse_questions_rejects_missing_category() {
        let text = r#"[{"id": 1, "category": "Blue", "prompt": "p", "answer": true}]"#;
        let err = parse_questions(text).err().unwrap();
        assert!(matches!(err, TriviumError::Content(_)));
        assert!(err.to_string().contains("Purple"));
    }

    #[test]
    fn test_parse_questions_rejects_duplicate_id() {
        let text = r#"[
            {"id": 1, "category": "Blue", "prompt": "a", "answer": 1},
            {"id": 1, "category": "Green", "prompt": "b", "answer": 2}
        ]"#;
        let err = parse_questions(text).err().unwrap();
        assert!(err.to_string().contains("duplicate question id 1"));
    }

    #[test]
    fn test_parse_questions_rejects_negative_weight() {
        let mut entries: Vec<Value> = serde_json::from_str(&full_file()).unwrap();
        entries[0]["weight"] = serde_json::json!(-1.0);
        let err = parse_questions(&serde_json::to_string(&entries).unwrap()).err().unwrap();
        assert!(matches!(err, TriviumError::Question(_)));
    }

    #[test]
    fn test_parse_questions_rejects_unknown_category() {
        let text = r#"[{"id": 1, "category": "Red", "prompt": "p", "answer": 1}]"#;
        assert!(matches!(
            parse_questions(text),
            Err(TriviumError::Json(_))
        ));
    }

    #[test]
    fn test_parse_categories_checks_length() {
        let board = Board::reference();
        let short = r#"["Purple", "Green"]"#;
        assert!(matches!(
            parse_categories(short, &board),
            Err(TriviumError::Board(_))
        ));

        let names: Vec<Category> = (0..board.len()).map(|_| Category::Yellow).collect();
        let table = parse_categories(&serde_json::to_string(&names).unwrap(), &board).unwrap();
        assert_eq!(table.category(7), Category::Yellow);
    }

    #[test]
    fn test_cycled_categories() {
        let board = Board::reference();
        let table = cycled_categories(&board).unwrap();
        assert_eq!(table.len(), board.len());
        assert_eq!(table.category(0), Category::Purple);
        assert_eq!(table.category(6), Category::Green);
    }
}
