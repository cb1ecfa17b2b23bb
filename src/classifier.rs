//! Query classification
//!
//! Maps a raw user query to one of a closed set of intents. The model's
//! answer is untrusted free text, so it passes through markup cleaning and
//! a total decode into the enum before anything branches on it.

use crate::llm::CompletionBackend;
use crate::sanitize;
use tracing::{info, warn};

const CLASSIFY_MAX_TOKENS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    SqlGeneration,
    GeneralDbInfo,
    NarrowQuery,
    Unrecognized,
}

impl Intent {
    /// Total decode from cleaned model text: the first known label found
    /// wins, anything else is `Unrecognized`.
    pub fn parse(cleaned: &str) -> Self {
        if cleaned.contains("sql_generation") {
            Intent::SqlGeneration
        } else if cleaned.contains("general_db_info") {
            Intent::GeneralDbInfo
        } else if cleaned.contains("narrow_query") {
            Intent::NarrowQuery
        } else {
            Intent::Unrecognized
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Intent::SqlGeneration => "sql_generation",
            Intent::GeneralDbInfo => "general_db_info",
            Intent::NarrowQuery => "narrow_query",
            Intent::Unrecognized => "unrecognized",
        }
    }
}

pub struct QueryClassifier<'a> {
    backend: &'a dyn CompletionBackend,
}

impl<'a> QueryClassifier<'a> {
    pub fn new(backend: &'a dyn CompletionBackend) -> Self {
        Self { backend }
    }

    /// Classify a user query. Transport failures degrade to
    /// [`Intent::Unrecognized`]; this never errors to the caller.
    pub async fn classify(&self, query: &str) -> Intent {
        let prompt = build_classification_prompt(query);

        let raw = match self.backend.complete(&prompt, CLASSIFY_MAX_TOKENS).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Classification call failed: {}", e);
                return Intent::Unrecognized;
            }
        };

        let cleaned = sanitize::clean_text(&raw);
        let intent = Intent::parse(&cleaned);
        info!(label = intent.label(), "Query classified");
        intent
    }
}

fn build_classification_prompt(query: &str) -> String {
    format!(
        "You are an AI model designed to classify user queries about databases. \
Your goal is to analyze the query and categorize it with precision into one of the following categories:\n\
'sql_generation' - for requests to generate SQL queries from scratch;\n\
'general_db_info' - for general database information or theoretical knowledge about databases, \
which does not require running or analyzing specific queries;\n\
'narrow_query' - for detailed questions that require executing SQL queries or performing data analysis to provide an answer.\n\n\
Important: If the query asks for specific information that requires analyzing or extracting data from a database \
(such as a genre analysis or specific metrics), it should be classified as 'narrow_query'. \
General theoretical questions about databases fall under 'general_db_info'.\n\n\
User's query:\n{}\n\n\
Classify the query with precision. Output only one of the following: \
'sql_generation', 'general_db_info', or 'narrow_query'. No explanations or additional text.",
        query
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels_decode_to_their_intent() {
        assert_eq!(Intent::parse("sql_generation"), Intent::SqlGeneration);
        assert_eq!(Intent::parse("general_db_info"), Intent::GeneralDbInfo);
        assert_eq!(Intent::parse("narrow_query"), Intent::NarrowQuery);
    }

    #[test]
    fn unknown_text_decodes_to_unrecognized() {
        assert_eq!(Intent::parse(""), Intent::Unrecognized);
        assert_eq!(Intent::parse("I cannot classify this"), Intent::Unrecognized);
    }

    #[test]
    fn markup_around_label_is_cleaned_before_decode() {
        let cleaned = crate::sanitize::clean_text("sql_generation<|end|>");
        assert_eq!(cleaned, "sql_generation");
        assert_eq!(Intent::parse(&cleaned), Intent::SqlGeneration);
    }

    #[test]
    fn prompt_embeds_query_and_label_set() {
        let prompt = build_classification_prompt("list all customers");
        assert!(prompt.contains("list all customers"));
        assert!(prompt.contains("'sql_generation'"));
        assert!(prompt.contains("'general_db_info'"));
        assert!(prompt.contains("'narrow_query'"));
    }
}
