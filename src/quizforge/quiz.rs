use crate::quizforge::gemini::{GenerateContent, GenerationError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

pub const QUESTIONS_PER_QUIZ: usize = 20;

const CACHE_TTL: Duration = Duration::from_secs(5 * 60);
const CACHE_CAPACITY: usize = 256;

struct CachedTopic {
    questions: String,
    created_at: Instant,
}

/// Builds prompts and drives the generation client for question
/// generation and grading.
pub struct QuizService {
    generator: Arc<dyn GenerateContent>,
    cache: Mutex<HashMap<String, CachedTopic>>,
}

/// The four text blocks produced by the grading chain, in call order.
pub struct GradingReport {
    pub answer_key: String,
    pub comparison: String,
    pub summary: String,
    pub suggestions: String,
}

impl QuizService {
    #[must_use]
    pub fn new(generator: Arc<dyn GenerateContent>) -> Self {
        Self {
            generator,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Generate a set of multiple-choice questions for a topic.
    ///
    /// The raw text is returned unparsed and cached by topic, last write
    /// wins.
    ///
    /// # Errors
    /// Returns an error if the generation call fails.
    pub async fn generate_questions(&self, topic: &str) -> Result<String, GenerationError> {
        let questions = self
            .generator
            .generate_content(&questions_prompt(topic))
            .await?;

        self.cache_questions(topic, &questions).await;

        Ok(questions)
    }

    /// Most recent questions generated for a topic, if still fresh.
    pub(crate) async fn cached_questions(&self, topic: &str) -> Option<String> {
        let cache = self.cache.lock().await;

        cache
            .get(topic)
            .filter(|entry| entry.created_at.elapsed() < CACHE_TTL)
            .map(|entry| entry.questions.clone())
    }

    async fn cache_questions(&self, topic: &str, questions: &str) {
        let mut cache = self.cache.lock().await;

        cache.retain(|_, entry| entry.created_at.elapsed() < CACHE_TTL);

        // Evict the oldest entry when a new topic would exceed capacity
        if !cache.contains_key(topic) && cache.len() >= CACHE_CAPACITY {
            let oldest = cache
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(topic, _)| topic.clone());
            if let Some(oldest) = oldest {
                debug!("Topic cache full, evicting {}", oldest);
                cache.remove(&oldest);
            }
        }

        cache.insert(
            topic.to_string(),
            CachedTopic {
                questions: questions.to_string(),
                created_at: Instant::now(),
            },
        );
    }

    /// Grade collected answers against a question set.
    ///
    /// Four dependent generation calls in fixed order, each prompt
    /// embedding the previous step's raw output: answer key, comparison,
    /// summary, learning suggestions. The chain is all-or-nothing, the
    /// first failure aborts and no partial result is returned.
    ///
    /// # Errors
    /// Returns an error if any of the four calls fails.
    pub async fn generate_result(
        &self,
        question_set: &str,
        collected_answers: &str,
    ) -> Result<GradingReport, GenerationError> {
        let answer_key = self
            .generator
            .generate_content(&answer_key_prompt(question_set))
            .await?;

        let comparison = self
            .generator
            .generate_content(&comparison_prompt(collected_answers, &answer_key))
            .await?;

        let summary = self
            .generator
            .generate_content(&summary_prompt(&comparison))
            .await?;

        let suggestions = self
            .generator
            .generate_content(&suggestions_prompt(question_set, collected_answers))
            .await?;

        Ok(GradingReport {
            answer_key,
            comparison,
            summary,
            suggestions,
        })
    }
}

fn questions_prompt(topic: &str) -> String {
    format!(
        "Generate {QUESTIONS_PER_QUIZ} multiple-choice questions related to the topic: {topic} without answer key"
    )
}

fn answer_key_prompt(question_set: &str) -> String {
    format!(
        "Provide the answer key for the following multiple-choice questions:\n{question_set}\nPlease provide the answers in capital letters (e.g., ABCD) in the format of a table."
    )
}

fn comparison_prompt(collected_answers: &str, answer_key: &str) -> String {
    format!(
        "Match the answers provided by the user {collected_answers} against the generated answer key {answer_key} and count the correct and incorrect answers. If no answer matches the key, all answers are incorrect."
    )
}

fn summary_prompt(comparison: &str) -> String {
    format!("Please provide a summarized result for:\n{comparison}")
}

fn suggestions_prompt(question_set: &str, collected_answers: &str) -> String {
    format!(
        "Based on the generated questions on the topic '{question_set}' and the collected answers {collected_answers}, provide some suggestions for further learning."
    )
}
