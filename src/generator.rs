//! SQL generation
//!
//! Turns a natural-language request plus the schema model into executable
//! SQL statements. The prompt grounds the model strictly in the reflected
//! structure; the raw response goes through the sanitizer to recover
//! semicolon-delimited statements.

use crate::error::{AgentError, Result};
use crate::llm::CompletionBackend;
use crate::sanitize::{self, END_OF_ANSWER, SQL_PREFIX_MARKER};
use crate::schema::SchemaModel;
use tracing::{debug, info};

const GENERATE_MAX_TOKENS: u32 = 400;

pub struct SqlGenerator<'a> {
    backend: &'a dyn CompletionBackend,
}

impl<'a> SqlGenerator<'a> {
    pub fn new(backend: &'a dyn CompletionBackend) -> Self {
        Self { backend }
    }

    /// Generate SQL statements for `query` against `schema`.
    ///
    /// Fails fast on an empty schema without touching the model. The
    /// returned collection is deduplicated and unordered.
    pub async fn generate(&self, query: &str, schema: &SchemaModel) -> Result<Vec<String>> {
        if schema.is_empty() {
            return Err(AgentError::EmptySchema);
        }

        let prompt = build_generation_prompt(query, schema);
        let raw = self.backend.complete(&prompt, GENERATE_MAX_TOKENS).await?;
        debug!(raw_len = raw.len(), "Model response received");

        if raw.trim().is_empty() {
            return Err(AgentError::EmptyModelOutput);
        }

        let statements = sanitize::extract_statements(&raw);
        if statements.is_empty() {
            return Err(AgentError::NoStatements);
        }

        info!(count = statements.len(), "SQL statements recovered");
        Ok(statements)
    }
}

fn build_generation_prompt(query: &str, schema: &SchemaModel) -> String {
    let structure = serde_json::to_string_pretty(&schema.structure_json())
        .unwrap_or_else(|_| "{}".to_string());

    format!(
        "You are an expert SQL developer specializing in SQLite databases. \
Your task is to generate correct SQL queries based on the provided database structure in response to user queries.\n\n\
Database structure:\n<database_structure>\n{structure}\n</database_structure>\n\n\
Guidelines for generating the SQL query:\n\
1. Use only the tables and columns provided in the database structure.\n\
2. Ensure the query is syntactically correct for SQLite.\n\
3. Include appropriate JOIN clauses for multiple tables.\n\
4. Add WHERE clauses to filter results as needed.\n\
5. Utilize aggregation functions (COUNT, SUM, AVG, etc.) when relevant.\n\
6. Use ORDER BY for sorting results when applicable.\n\
7. Implement LIMIT if specified in the user's request.\n\
8. Terminate every statement with ';'.\n\n\
User's query:\n<user_query>\n{query}\n</user_query>\n\n\
Generate the appropriate SQL query based on the above information. \
Output only the SQL query without explanations or comments. \
Use the language and names that exist in the database. \
Place the marker '{marker}' before the SQL. \
End your response with '{end}.'",
        structure = structure,
        query = query,
        marker = SQL_PREFIX_MARKER,
        end = END_OF_ANSWER,
    )
}
