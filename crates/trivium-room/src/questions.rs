//! Question bank abstraction and the weighted, history-aware sampler.
//!
//! The game never looks inside a question: it asks a
//! [`QuestionProvider`] for one, instantiates it, forwards its body to
//! clients and hands answers back to the instance for evaluation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rand::{Rng, RngCore};
use serde_json::Value;
use trivium_board::Category;
use trivium_protocol::QuestionId;

use crate::QuestionError;

/// How many times each question was drawn in the current game.
pub type AskedQuestions = HashMap<QuestionId, usize>;

/// A question ready to be shown: its body and the rule to grade answers.
pub trait QuestionInstance: Send + Sync {
    /// Payload sent to clients with
    /// [`ServerEvent::QuestionShown`](trivium_protocol::ServerEvent::QuestionShown).
    fn body(&self) -> Value;

    /// `true` if `answer` is correct for this instance.
    fn evaluate(&self, answer: &Value) -> bool;
}

/// An entry of the question bank.
pub trait QuestionHandle: Send + Sync {
    fn id(&self) -> QuestionId;

    /// Builds a fresh instance. Parameterized questions may draw new
    /// values on every call.
    fn instantiate(&self) -> Box<dyn QuestionInstance>;
}

/// Source of questions for a game.
pub trait QuestionProvider: Send + Sync {
    /// Picks a question of `category`, taking into account what the game
    /// already asked. `None` if the category has no question at all.
    fn sample(
        &self,
        category: Category,
        asked: &AskedQuestions,
        rng: &mut dyn RngCore,
    ) -> Option<Arc<dyn QuestionHandle>>;
}

// ---------------------------------------------------------------------------
// Weighted sampling
// ---------------------------------------------------------------------------

/// Picks an index with probability proportional to `weights`.
///
/// The weights need not be normalized. Falls back to the last index when
/// rounding leaves the draw past the final cumulative weight.
pub fn sample_index(weights: &[f64], rng: &mut dyn RngCore) -> usize {
    let total: f64 = weights.iter().sum();
    let draw = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, weight) in weights.iter().enumerate() {
        cumulative += weight;
        if draw < cumulative {
            return i;
        }
    }
    weights.len().saturating_sub(1)
}

/// Questions of one category with their relative weights.
#[derive(Clone)]
pub struct WeightedQuestions {
    questions: Vec<Arc<dyn QuestionHandle>>,
    weights: Vec<f64>,
}

impl WeightedQuestions {
    pub fn new(
        questions: Vec<Arc<dyn QuestionHandle>>,
        weights: Vec<f64>,
    ) -> Result<Self, QuestionError> {
        if questions.is_empty() {
            return Err(QuestionError::Empty);
        }
        if questions.len() != weights.len() {
            return Err(QuestionError::WeightCount {
                questions: questions.len(),
                weights: weights.len(),
            });
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(QuestionError::InvalidWeight(*bad));
        }
        if weights.iter().all(|w| *w == 0.0) {
            return Err(QuestionError::InvalidWeight(0.0));
        }
        Ok(Self { questions, weights })
    }

    /// Same weight for every question.
    pub fn uniform(questions: Vec<Arc<dyn QuestionHandle>>) -> Result<Self, QuestionError> {
        let weights = vec![1.0; questions.len()];
        Self::new(questions, weights)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Draws a question, favouring the least asked ones.
    ///
    /// Questions asked more often than the least asked question of the
    /// list get a zero weight, so the list is exhausted before anything
    /// repeats. If that leaves no weight at all, the original weights are
    /// used.
    pub fn sample(&self, asked: &AskedQuestions, rng: &mut dyn RngCore) -> Arc<dyn QuestionHandle> {
        let count = |q: &Arc<dyn QuestionHandle>| asked.get(&q.id()).copied().unwrap_or(0);
        let least = self.questions.iter().map(count).min().unwrap_or(0);

        let adjusted: Vec<f64> = self
            .questions
            .iter()
            .zip(&self.weights)
            .map(|(q, w)| if count(q) > least { 0.0 } else { *w })
            .collect();
        let weights = if adjusted.iter().sum::<f64>() > 0.0 {
            &adjusted
        } else {
            &self.weights
        };

        let index = sample_index(weights, rng);
        Arc::clone(&self.questions[index])
    }
}

/// A question bank split by category.
#[derive(Clone, Default)]
pub struct QuestionPool {
    categories: BTreeMap<Category, WeightedQuestions>,
}

impl QuestionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the questions of `category`, replacing any previous list.
    pub fn insert(&mut self, category: Category, questions: WeightedQuestions) {
        self.categories.insert(category, questions);
    }

    /// Categories with no question. A game landing on one of them
    /// cannot continue.
    pub fn missing_categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| !self.categories.contains_key(c))
            .collect()
    }
}

impl QuestionProvider for QuestionPool {
    fn sample(
        &self,
        category: Category,
        asked: &AskedQuestions,
        rng: &mut dyn RngCore,
    ) -> Option<Arc<dyn QuestionHandle>> {
        self.categories
            .get(&category)
            .map(|questions| questions.sample(asked, rng))
    }
}

// ---------------------------------------------------------------------------
// Static questions
// ---------------------------------------------------------------------------

/// A question with a fixed prompt and a single accepted answer, compared
/// as JSON values.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticQuestion {
    pub id: QuestionId,
    pub prompt: String,
    pub answer: Value,
}

impl StaticQuestion {
    pub fn new(id: i64, prompt: impl Into<String>, answer: impl Into<Value>) -> Self {
        Self {
            id: QuestionId(id),
            prompt: prompt.into(),
            answer: answer.into(),
        }
    }
}

impl QuestionHandle for StaticQuestion {
    fn id(&self) -> QuestionId {
        self.id
    }

    fn instantiate(&self) -> Box<dyn QuestionInstance> {
        Box::new(self.clone())
    }
}

impl QuestionInstance for StaticQuestion {
    fn body(&self) -> Value {
        serde_json::json!({ "prompt": self.prompt })
    }

    fn evaluate(&self, answer: &Value) -> bool {
        *answer == self.answer
    }
}
