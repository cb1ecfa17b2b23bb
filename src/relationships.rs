//! Table-graph recovery and the diagram interface
//!
//! For diagram requests the model is asked to pick the tables relevant to
//! the user's question and the joins between them, returned as JSON. Like
//! SQL generation, the response is untrusted text and must pass a total
//! recovery step (trim to the JSON object, truncate trailing prose,
//! decode into closed types) before anything consumes it. Rendering the
//! recovered graph is behind a trait; the shipped implementation writes a
//! Graphviz DOT artifact and nothing flows back into the pipeline.

use crate::error::{AgentError, Result};
use crate::llm::CompletionBackend;
use crate::sanitize::{truncate_at_marker, END_OF_ANSWER};
use crate::schema::SchemaModel;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

const ANALYZE_MAX_TOKENS: u32 = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    pub name: String,
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelevantTable {
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<ColumnRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoiningColumns {
    pub table1_column: String,
    pub table2_column: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub table1: String,
    pub table2: String,
    #[serde(default)]
    pub relationship_type: Option<String>,
    pub joining_columns: JoiningColumns,
    #[serde(default)]
    pub intermediate_table: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// The structure the ER-diagram collaborator consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableGraph {
    #[serde(default)]
    pub relevant_tables: Vec<RelevantTable>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

pub struct RelationshipAnalyzer<'a> {
    backend: &'a dyn CompletionBackend,
}

impl<'a> RelationshipAnalyzer<'a> {
    pub fn new(backend: &'a dyn CompletionBackend) -> Self {
        Self { backend }
    }

    pub async fn analyze(&self, query: &str, schema: &SchemaModel) -> Result<TableGraph> {
        if schema.is_empty() {
            return Err(AgentError::EmptySchema);
        }

        let prompt = build_relationship_prompt(query, schema);
        let raw = self.backend.complete(&prompt, ANALYZE_MAX_TOKENS).await?;

        let graph = recover_table_graph(&raw)?;
        info!(
            tables = graph.relevant_tables.len(),
            relationships = graph.relationships.len(),
            "Table graph recovered"
        );
        Ok(graph)
    }
}

/// Recover the JSON object from raw model text: cut trailing markers,
/// skip any leading scratchpad prose, slice the first balanced object and
/// decode it. Never panics; all failures map to `UnparsableModelOutput`.
pub fn recover_table_graph(raw: &str) -> Result<TableGraph> {
    let truncated = truncate_at_marker(raw, END_OF_ANSWER);
    let truncated = truncate_at_marker(truncated, "</answer>");

    let start = truncated
        .find('{')
        .ok_or_else(|| AgentError::UnparsableModelOutput("no JSON object in response".to_string()))?;
    let candidate = &truncated[start..];

    let object = balanced_object(candidate).unwrap_or(candidate);
    serde_json::from_str(object)
        .map_err(|e| AgentError::UnparsableModelOutput(format!("invalid table graph JSON: {}", e)))
}

/// Slice of `text` covering the first balanced `{...}` object, string
/// literals respected. None when braces never balance.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[..=index]);
                }
            }
            _ => {}
        }
    }
    None
}

fn build_relationship_prompt(query: &str, schema: &SchemaModel) -> String {
    let structure = serde_json::to_string_pretty(&schema.structure_json())
        .unwrap_or_else(|_| "{}".to_string());

    format!(
        "You are an AI model specializing in database structure analysis. Your task is to determine and establish \
logical connections between tables based on a user query and the provided database structure.\n\n\
First, you will be given the database structure in JSON format:\n\
<database_structure>\n{structure}\n</database_structure>\n\n\
Next, you will receive a user query:\n<user_query>\n{query}\n</user_query>\n\n\
Analyze the database structure and the user query using the following rules:\n\
1. Prioritize direct connections through foreign keys if they exist.\n\
2. If there is no direct connection, look for indirect connections through intermediate tables.\n\
3. In the absence of explicit key-based connections, create logical connections based on the similarity of table and column names.\n\
4. All established connections must be logically justified and meaningful.\n\n\
After your analysis, return the result in the following JSON format:\n\
{{\n\
  \"relevant_tables\": [\n\
    {{\"table_name\": \"string\", \"columns\": [{{\"name\": \"string\", \"data_type\": \"string\"}}]}}\n\
  ],\n\
  \"relationships\": [\n\
    {{\n\
      \"table1\": \"string\",\n\
      \"table2\": \"string\",\n\
      \"relationship_type\": \"string\",\n\
      \"joining_columns\": {{\"table1_column\": \"string\", \"table2_column\": \"string\"}},\n\
      \"intermediate_table\": \"string\",\n\
      \"description\": \"string\"\n\
    }}\n\
  ]\n\
}}\n\n\
Additional instructions:\n\
1. If relevant tables or connections are not found, clearly indicate this in your response.\n\
2. Provide a brief description for each established connection in the 'description' field.\n\
3. If the connection is indirect (through an intermediate table), specify this table in the 'intermediate_table' field.\n\
4. Ensure that all established connections correspond to the context of the user query.\n\n\
After your analysis, provide your final output in the JSON format. \
End your response with '{end}.'",
        structure = structure,
        query = query,
        end = END_OF_ANSWER,
    )
}

/// ER-diagram collaborator boundary. Consumes a recovered [`TableGraph`]
/// and produces an image artifact; no data flows back.
pub trait DiagramRenderer {
    fn render(&self, graph: &TableGraph) -> Result<PathBuf>;
}

/// Writes the table graph as a Graphviz DOT file.
pub struct DotDiagramRenderer {
    output_path: PathBuf,
}

impl DotDiagramRenderer {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    fn edge_style(relationship_type: Option<&str>) -> (&'static str, &'static str) {
        match relationship_type {
            Some("indirect") => ("dashed", "green"),
            Some("logical") => ("dotted", "blue"),
            _ => ("solid", "black"),
        }
    }
}

impl DiagramRenderer for DotDiagramRenderer {
    fn render(&self, graph: &TableGraph) -> Result<PathBuf> {
        let mut dot = String::from("digraph er_diagram {\n  rankdir=LR;\n  node [shape=record];\n");

        for table in &graph.relevant_tables {
            let columns = table
                .columns
                .iter()
                .map(|c| format!("{} : {}", c.name, c.data_type.to_uppercase()))
                .collect::<Vec<_>>()
                .join("\\l");
            let _ = writeln!(
                dot,
                "  \"{}\" [label=\"{{{}|{}}}\"];",
                table.table_name, table.table_name, columns
            );
        }

        let relevant: Vec<&str> = graph
            .relevant_tables
            .iter()
            .map(|t| t.table_name.as_str())
            .collect();

        for relationship in &graph.relationships {
            // edges between tables the model did not select are dropped
            if !relevant.contains(&relationship.table1.as_str())
                || !relevant.contains(&relationship.table2.as_str())
            {
                continue;
            }
            let (style, color) = Self::edge_style(relationship.relationship_type.as_deref());
            let _ = writeln!(
                dot,
                "  \"{}\" -> \"{}\" [label=\"{}.{} -> {}.{}\", style={}, color={}];",
                relationship.table1,
                relationship.table2,
                relationship.table1,
                relationship.joining_columns.table1_column,
                relationship.table2,
                relationship.joining_columns.table2_column,
                style,
                color
            );
        }

        dot.push_str("}\n");
        std::fs::write(&self.output_path, dot)?;
        info!(path = %self.output_path.display(), "ER diagram written");
        Ok(self.output_path.clone())
    }
}

impl DotDiagramRenderer {
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRAPH_JSON: &str = r#"{
        "relevant_tables": [
            {"table_name": "albums", "columns": [{"name": "id", "data_type": "integer"}]},
            {"table_name": "artists", "columns": [{"name": "id", "data_type": "integer"}]}
        ],
        "relationships": [
            {
                "table1": "albums",
                "table2": "artists",
                "relationship_type": "direct",
                "joining_columns": {"table1_column": "artist_id", "table2_column": "id"},
                "description": "albums reference their artist"
            }
        ]
    }"#;

    #[test]
    fn graph_is_recovered_from_scratchpad_prose() {
        let raw = format!(
            "<scratchpad>thinking about joins...</scratchpad>\n{}\nAnswer complete.",
            GRAPH_JSON
        );
        let graph = recover_table_graph(&raw).unwrap();
        assert_eq!(graph.relevant_tables.len(), 2);
        assert_eq!(graph.relationships[0].joining_columns.table1_column, "artist_id");
    }

    #[test]
    fn trailing_prose_after_object_is_ignored() {
        let raw = format!("{} and that is the full graph.", GRAPH_JSON);
        assert!(recover_table_graph(&raw).is_ok());
    }

    #[test]
    fn response_without_json_is_unparsable() {
        let result = recover_table_graph("I could not find any related tables.");
        assert!(matches!(result, Err(AgentError::UnparsableModelOutput(_))));
    }

    #[test]
    fn malformed_json_is_unparsable() {
        let result = recover_table_graph("{\"relevant_tables\": [oops]}");
        assert!(matches!(result, Err(AgentError::UnparsableModelOutput(_))));
    }

    #[test]
    fn dot_renderer_writes_nodes_and_styled_edges() {
        let graph = recover_table_graph(GRAPH_JSON).unwrap();
        let path = std::env::temp_dir().join(format!("dbpilot_er_{}.dot", std::process::id()));
        let renderer = DotDiagramRenderer::new(&path);

        let written = renderer.render(&graph).unwrap();
        let dot = std::fs::read_to_string(&written).unwrap();
        std::fs::remove_file(&written).ok();

        assert!(dot.contains("\"albums\""));
        assert!(dot.contains("\"albums\" -> \"artists\""));
        assert!(dot.contains("albums.artist_id -> artists.id"));
        assert!(dot.contains("style=solid"));
    }

    #[test]
    fn edges_to_unselected_tables_are_dropped() {
        let mut graph = recover_table_graph(GRAPH_JSON).unwrap();
        graph.relationships[0].table2 = "tracks".to_string();

        let path = std::env::temp_dir().join(format!("dbpilot_er2_{}.dot", std::process::id()));
        let renderer = DotDiagramRenderer::new(&path);
        let written = renderer.render(&graph).unwrap();
        let dot = std::fs::read_to_string(&written).unwrap();
        std::fs::remove_file(&written).ok();

        assert!(!dot.contains("->"));
    }
}
