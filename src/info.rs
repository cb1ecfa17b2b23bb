//! Schema-level question answering
//!
//! Answers descriptive questions about the database directly from the
//! schema model. No SQL is executed; the only side effect is the model
//! call.

use crate::error::{AgentError, Result};
use crate::llm::CompletionBackend;
use crate::sanitize::{self, END_OF_ANSWER};
use crate::schema::SchemaModel;

const INFO_MAX_TOKENS: u32 = 600;

pub struct InfoGenerator<'a> {
    backend: &'a dyn CompletionBackend,
}

impl<'a> InfoGenerator<'a> {
    pub fn new(backend: &'a dyn CompletionBackend) -> Self {
        Self { backend }
    }

    /// Answer a schema-level question. Fails fast on an empty schema
    /// without calling the model.
    pub async fn generate(&self, query: &str, schema: &SchemaModel) -> Result<String> {
        if schema.is_empty() {
            return Err(AgentError::EmptySchema);
        }

        let prompt = build_info_prompt(query, schema);
        let raw = self.backend.complete(&prompt, INFO_MAX_TOKENS).await?;

        let answer = sanitize::clean_text(&raw);
        if answer.is_empty() {
            return Err(AgentError::EmptyModelOutput);
        }
        Ok(answer)
    }
}

fn build_info_prompt(query: &str, schema: &SchemaModel) -> String {
    let structure = serde_json::to_string_pretty(&schema.structure_json())
        .unwrap_or_else(|_| "{}".to_string());

    format!(
        "You are an expert in relational database systems, specializing in analyzing and explaining database structures. \
Your task is to provide accurate and detailed answers to user questions about the given database based on its structure.\n\n\
Here is the structure of the database:\n<database_structure>\n{structure}\n</database_structure>\n\n\
Your task is to answer the user's question clearly and concisely. Follow these guidelines:\n\n\
1. Refer to only the tables and columns provided in the database structure.\n\
2. Ensure your answer is accurate and relevant to the user's question.\n\
3. Provide explanations where necessary to clarify the relationships between tables or data points.\n\
4. Use technical terms appropriately, but keep the explanation clear and easy to understand.\n\
5. Include examples or summaries if it helps to illustrate the answer.\n\n\
The user's question is:\n<user_question>\n{query}\n</user_question>\n\n\
Based on the database structure and the user's question, provide a detailed and accurate answer. \
Output only the answer without any additional comments or explanations outside of the context of the user's query. \
End your response with '{end}.'",
        structure = structure,
        query = query,
        end = END_OF_ANSWER,
    )
}
