//! Query orchestration
//!
//! Routes one user query through the pipeline: classify, then dispatch to
//! generation + execution, schema info, or the narrow-query path that adds
//! a result analysis round-trip. Diagram requests bypass the classifier
//! entirely. Each query runs the states Idle -> Classified -> Routed ->
//! Done; nothing is carried across queries. Every failure ends as a
//! `QueryOutcome::Failed` diagnostic, never a panic or a retry.

use crate::analyzer::ResultAnalyzer;
use crate::classifier::{Intent, QueryClassifier};
use crate::executor::{SqlExecutor, StatementExecution, StatementOutcome};
use crate::generator::SqlGenerator;
use crate::info::InfoGenerator;
use crate::llm::CompletionBackend;
use crate::relationships::{DiagramRenderer, RelationshipAnalyzer};
use crate::schema::SchemaModel;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

/// Queries containing this word skip classification and go straight to the
/// diagram collaborator.
const DIAGRAM_KEYWORD: &str = "diagram";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueryOutcome {
    /// Per-statement execution report (sql_generation path)
    Statements(Vec<StatementExecution>),
    /// Schema-level answer (general_db_info path)
    Info(String),
    /// One analysis per executed statement (narrow_query path)
    Analyses(Vec<String>),
    /// Diagram artifact location (classifier bypass)
    Diagram(PathBuf),
    /// The classifier could not place the query
    Unrecognized,
    /// Pipeline failure diagnostic
    Failed(String),
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutcome::Statements(executions) => {
                for execution in executions {
                    writeln!(f, "=== {}", execution.statement)?;
                    write!(f, "{}", execution.outcome)?;
                }
                Ok(())
            }
            QueryOutcome::Info(text) => writeln!(f, "{}", text),
            QueryOutcome::Analyses(analyses) => {
                for analysis in analyses {
                    writeln!(f, "{}", analysis)?;
                }
                Ok(())
            }
            QueryOutcome::Diagram(path) => writeln!(f, "Diagram written to {}", path.display()),
            QueryOutcome::Unrecognized => writeln!(f, "Could not classify the query."),
            QueryOutcome::Failed(message) => writeln!(f, "Failed: {}", message),
        }
    }
}

pub struct Orchestrator<'a> {
    backend: &'a dyn CompletionBackend,
    schema: &'a SchemaModel,
    db_path: PathBuf,
    diagram_renderer: &'a dyn DiagramRenderer,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        backend: &'a dyn CompletionBackend,
        schema: &'a SchemaModel,
        db_path: impl Into<PathBuf>,
        diagram_renderer: &'a dyn DiagramRenderer,
    ) -> Self {
        Self {
            backend,
            schema,
            db_path: db_path.into(),
            diagram_renderer,
        }
    }

    /// Resolve one user query. Infallible by design: every internal
    /// failure is reported as a [`QueryOutcome`], never an error.
    pub async fn handle(&self, query: &str) -> QueryOutcome {
        // Fail fast on an empty database: no branch can do anything useful
        // and no model call should be spent finding that out.
        if self.schema.is_empty() {
            return QueryOutcome::Failed(crate::error::AgentError::EmptySchema.to_string());
        }

        if query.to_lowercase().contains(DIAGRAM_KEYWORD) {
            debug!("Diagram keyword found, bypassing classifier");
            return self.render_diagram(query).await;
        }

        let intent = QueryClassifier::new(self.backend).classify(query).await;
        debug!(intent = intent.label(), "Routing query");

        match intent {
            Intent::SqlGeneration => self.generate_and_execute(query).await,
            Intent::GeneralDbInfo => self.describe(query).await,
            Intent::NarrowQuery => self.generate_execute_analyze(query).await,
            Intent::Unrecognized => QueryOutcome::Unrecognized,
        }
    }

    async fn render_diagram(&self, query: &str) -> QueryOutcome {
        let analyzer = RelationshipAnalyzer::new(self.backend);
        let graph = match analyzer.analyze(query, self.schema).await {
            Ok(graph) => graph,
            Err(e) => return QueryOutcome::Failed(e.to_string()),
        };
        match self.diagram_renderer.render(&graph) {
            Ok(path) => QueryOutcome::Diagram(path),
            Err(e) => QueryOutcome::Failed(e.to_string()),
        }
    }

    async fn generate_and_execute(&self, query: &str) -> QueryOutcome {
        let statements = match SqlGenerator::new(self.backend).generate(query, self.schema).await {
            Ok(statements) => statements,
            Err(e) => return QueryOutcome::Failed(e.to_string()),
        };

        match self.execute(&statements) {
            Ok(executions) => QueryOutcome::Statements(executions),
            Err(e) => QueryOutcome::Failed(e),
        }
    }

    async fn describe(&self, query: &str) -> QueryOutcome {
        match InfoGenerator::new(self.backend).generate(query, self.schema).await {
            Ok(text) => QueryOutcome::Info(text),
            Err(e) => QueryOutcome::Failed(e.to_string()),
        }
    }

    async fn generate_execute_analyze(&self, query: &str) -> QueryOutcome {
        let statements = match SqlGenerator::new(self.backend).generate(query, self.schema).await {
            Ok(statements) => statements,
            Err(e) => return QueryOutcome::Failed(e.to_string()),
        };

        let executions = match self.execute(&statements) {
            Ok(executions) => executions,
            Err(e) => return QueryOutcome::Failed(e),
        };

        let analyzer = ResultAnalyzer::new(self.backend);
        let mut analyses = Vec::with_capacity(executions.len());
        for execution in &executions {
            let empty = Vec::new();
            let rows = match &execution.outcome {
                StatementOutcome::Rows { rows, .. } => rows,
                _ => &empty,
            };
            let analysis = match analyzer.analyze(query, rows).await {
                Ok(text) => text,
                Err(e) => format!("Analysis failed: {}", e),
            };
            analyses.push(analysis);
        }

        info!(count = analyses.len(), "Narrow query analyses produced");
        QueryOutcome::Analyses(analyses)
    }

    /// Connection is acquired per batch and dropped when this returns,
    /// whether execution succeeded or not.
    fn execute(&self, statements: &[String]) -> Result<Vec<StatementExecution>, String> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| format!("could not open database: {}", e))?;
        Ok(SqlExecutor::new(&conn).execute_batch(statements))
    }
}
