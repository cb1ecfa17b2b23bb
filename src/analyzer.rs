//! Result analysis
//!
//! Second model round-trip for narrow queries: the rows a statement
//! produced are serialized back into a prompt together with the user's
//! original question, and the model explains them in natural language.
//! An empty result set short-circuits to a fixed message so no tokens are
//! spent analyzing nothing.

use crate::error::{AgentError, Result};
use crate::llm::CompletionBackend;
use crate::sanitize::{self, END_OF_ANSWER};

const ANALYZE_MAX_TOKENS: u32 = 300;

/// Returned for an empty result set, without a model call.
pub const NO_DATA_MESSAGE: &str = "No data to analyze.";

pub struct ResultAnalyzer<'a> {
    backend: &'a dyn CompletionBackend,
}

impl<'a> ResultAnalyzer<'a> {
    pub fn new(backend: &'a dyn CompletionBackend) -> Self {
        Self { backend }
    }

    pub async fn analyze(&self, question: &str, rows: &[Vec<String>]) -> Result<String> {
        if rows.is_empty() {
            return Ok(NO_DATA_MESSAGE.to_string());
        }

        let prompt = build_analysis_prompt(question, rows);
        let raw = self.backend.complete(&prompt, ANALYZE_MAX_TOKENS).await?;

        let analysis = sanitize::clean_text(&raw);
        if analysis.is_empty() {
            return Err(AgentError::EmptyModelOutput);
        }
        Ok(analysis)
    }
}

fn build_analysis_prompt(question: &str, rows: &[Vec<String>]) -> String {
    let result_text = rows
        .iter()
        .map(|row| format!("({})", row.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a highly skilled database expert with deep knowledge of SQL queries and data analysis. \
Your task is to interpret the provided SQL query result and answer the user's question in a clear, precise, and concise manner.\n\n\
Here is the result of the SQL query:\n{result}\n\n\
The user's question is:\n{question}\n\n\
Based on the SQL query result, respond to the user with an accurate, concise, and contextually relevant explanation. \
Ensure your answer directly addresses the user's question.\n\n\
Consider the following guidelines when crafting your response:\n\
- If the query result contains data, provide a well-structured and insightful answer, highlighting key findings and patterns if necessary.\n\
- If the result set is empty or no relevant data is found, clearly explain that no data was retrieved, and offer potential reasons or next steps if appropriate.\n\
- Avoid including unnecessary technical jargon, focusing on clarity and simplicity.\n\
- If any additional assumptions or clarifications are needed to address the user's query, mention them explicitly in your answer.\n\
End your response with '{end}.'",
        result = result_text,
        question = question,
        end = END_OF_ANSWER,
    )
}
