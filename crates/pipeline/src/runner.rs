//! Stage runner
//!
//! Runs each stage against the shared pool, timing it and logging its
//! report. `run` executes the default sequence and stops at the first stage
//! that returns an error; stages that recover from item failures internally
//! do not stop it.

use crate::cli::Command;
use crate::validate::{ValidationReport, ValidationReporter};
use anyhow::Context;
use pubforge_common::db::{schema, DbPool, PublicationIndex};
use pubforge_common::metrics;
use pubforge_common::scholar::{ScholarSearch, SerpApiClient};
use pubforge_common::AppConfig;
use pubforge_enrichment::{
    CitationCollector, CitationReport, ClassifyReport, EnrichmentEngine, EnrichmentReport,
    PublicationClassifier,
};
use pubforge_ingestion::{CleanReport, Cleaner, IngestReport, IngestionProcessor};
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Report of one executed stage
#[derive(Debug, Serialize)]
#[serde(tag = "stage", content = "report", rename_all = "snake_case")]
pub enum StageReport {
    Ingest(IngestReport),
    Clean(CleanReport),
    Enrich(EnrichmentReport),
    Citations(CitationReport),
    Classify(ClassifyReport),
    Validate(ValidationReport),
    InitSchema,
}

pub struct PipelineRunner {
    config: Arc<AppConfig>,
    pool: DbPool,
    search: Option<Arc<dyn ScholarSearch>>,
}

async fn timed<T, F>(stage: &'static str, work: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    info!(stage = stage, "Stage started");
    let start = Instant::now();
    let result = work.await;
    let elapsed = start.elapsed();
    metrics::record_stage_duration(stage, elapsed);

    match &result {
        Ok(_) => info!(stage = stage, elapsed_ms = elapsed.as_millis() as u64, "Stage finished"),
        Err(e) => error!(stage = stage, elapsed_ms = elapsed.as_millis() as u64, error = %e, "Stage failed"),
    }
    result
}

impl PipelineRunner {
    pub fn new(config: Arc<AppConfig>, pool: DbPool) -> Self {
        Self {
            config,
            pool,
            search: None,
        }
    }

    /// Use this search client instead of building one from configuration
    pub fn with_search(mut self, search: Arc<dyn ScholarSearch>) -> Self {
        self.search = Some(search);
        self
    }

    fn search(&self) -> anyhow::Result<Arc<dyn ScholarSearch>> {
        if let Some(search) = &self.search {
            return Ok(search.clone());
        }
        let client = SerpApiClient::new(&self.config.search)?;
        Ok(Arc::new(client))
    }

    /// Execute a command, returning the report of every stage it ran
    pub async fn execute(&self, command: &Command) -> anyhow::Result<Vec<StageReport>> {
        let report = match command {
            Command::Ingest { dataset } => StageReport::Ingest(self.ingest(dataset.as_deref()).await?),
            Command::Clean => StageReport::Clean(self.clean().await?),
            Command::Enrich { cycles } => StageReport::Enrich(self.enrich(*cycles).await?),
            Command::Citations => StageReport::Citations(self.citations().await?),
            Command::Classify => StageReport::Classify(self.classify().await?),
            Command::Validate => StageReport::Validate(self.validate().await),
            Command::InitSchema => {
                self.init_schema().await?;
                StageReport::InitSchema
            }
            Command::Run => return self.run().await,
        };
        Ok(vec![report])
    }

    /// ingest, clean, enrich, citations, validate
    pub async fn run(&self) -> anyhow::Result<Vec<StageReport>> {
        let mut reports = Vec::with_capacity(5);
        reports.push(StageReport::Ingest(self.ingest(None).await?));
        reports.push(StageReport::Clean(self.clean().await?));
        reports.push(StageReport::Enrich(self.enrich(None).await?));
        reports.push(StageReport::Citations(self.citations().await?));
        reports.push(StageReport::Validate(self.validate().await));
        info!(stages = reports.len(), "Pipeline run completed");
        Ok(reports)
    }

    pub async fn ingest(&self, dataset: Option<&Path>) -> anyhow::Result<IngestReport> {
        let path = dataset
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.pipeline.dataset_path.clone().into());

        timed("ingest", async {
            let mut index = PublicationIndex::load(self.pool.conn()).await?;
            let report = IngestionProcessor::new(self.pool.clone())
                .ingest(&path, &mut index)
                .await
                .with_context(|| format!("ingesting {}", path.display()))?;
            Ok::<_, anyhow::Error>(report)
        })
        .await
    }

    pub async fn clean(&self) -> anyhow::Result<CleanReport> {
        timed("clean", async {
            let report = Cleaner::new(self.pool.clone(), &self.config.pipeline)
                .clean()
                .await?;
            Ok::<_, anyhow::Error>(report)
        })
        .await
    }

    pub async fn enrich(&self, cycles: Option<u32>) -> anyhow::Result<EnrichmentReport> {
        let cycles = cycles.unwrap_or(self.config.pipeline.enrichment_cycles);

        timed("enrich", async {
            let engine = EnrichmentEngine::new(
                self.pool.clone(),
                self.search()?,
                self.config.pipeline.per_category_limit,
            );
            let mut index = PublicationIndex::load(self.pool.conn()).await?;
            let report = engine.enrich(cycles, &mut index).await?;
            Ok::<_, anyhow::Error>(report)
        })
        .await
    }

    pub async fn citations(&self) -> anyhow::Result<CitationReport> {
        timed("citations", async {
            let report = CitationCollector::new(self.pool.clone(), self.search()?)
                .collect_citations()
                .await?;
            Ok::<_, anyhow::Error>(report)
        })
        .await
    }

    pub async fn classify(&self) -> anyhow::Result<ClassifyReport> {
        timed("classify", async {
            let report = PublicationClassifier::new(self.pool.clone(), self.search()?)
                .classify()
                .await?;
            Ok::<_, anyhow::Error>(report)
        })
        .await
    }

    /// Never fails; problems are recorded in the report
    pub async fn validate(&self) -> ValidationReport {
        let start = Instant::now();
        let report = ValidationReporter::new(self.pool.clone()).validate().await;
        metrics::record_stage_duration("validate", start.elapsed());
        report
    }

    pub async fn init_schema(&self) -> anyhow::Result<()> {
        timed("init-schema", async {
            schema::create_tables(self.pool.conn()).await?;
            Ok::<_, anyhow::Error>(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::ValidationStatus;
    use pubforge_common::db::testing::{memory_pool, scalar};
    use pubforge_common::scholar::{organic_result, MockSearchClient};
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    const DATASET: &str = r#"[
        {"id": "0704.0001", "submitter": "Pavel Nadolsky",
         "authors": "C. Balázs, E. L. Berger", "title": "Calculation of prompt diphoton production",
         "doi": "10.1103/PhysRevD.76.013009", "categories": "hep-ph", "abstract": "..."},
        {"id": "0704.0002", "submitter": "Louis Theran",
         "authors": "Ileana Streinu, Louis Theran", "title": "Sparsity-certifying Graph Decompositions",
         "doi": "10.1/sparsity", "categories": "math.CO cs.CG", "abstract": "..."},
        {"id": "0704.0003", "authors": "Someone", "title": "A",
         "doi": "10.1/short", "categories": "hep-th"}
    ]"#;

    fn dataset_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(DATASET.as_bytes()).unwrap();
        file
    }

    fn config_for(dataset: &Path) -> Arc<AppConfig> {
        let mut config = AppConfig::default();
        config.pipeline.dataset_path = dataset.display().to_string();
        Arc::new(config)
    }

    #[tokio::test]
    async fn test_full_run() {
        let file = dataset_file();
        let pool = memory_pool().await.unwrap();

        let search = Arc::new(MockSearchClient::new());
        search.respond_with(
            "Calculation of prompt diphoton production",
            vec![organic_result("Calculation of prompt diphoton production", "", &["C. Balázs"])],
        );
        search.respond_with(
            "Sparsity-certifying Graph Decompositions",
            vec![organic_result("Pebble game algorithms", "pg1", &["Ileana Streinu"])],
        );

        let runner = PipelineRunner::new(config_for(file.path()), pool.clone()).with_search(search);
        let reports = runner.execute(&Command::Run).await.unwrap();

        let stages: Vec<String> = reports
            .iter()
            .map(|r| serde_json::to_value(r).unwrap()["stage"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(stages, vec!["ingest", "clean", "enrich", "citations", "validate"]);

        match &reports[1] {
            StageReport::Clean(report) => assert_eq!(report.short_titles_deleted, 1),
            other => panic!("unexpected report {:?}", other),
        }
        match &reports[4] {
            StageReport::Validate(report) => assert_eq!(report.status, ValidationStatus::Clean),
            other => panic!("unexpected report {:?}", other),
        }

        let publications = scalar(&pool, "SELECT COUNT(*) FROM publications", vec![]).await.unwrap();
        assert_eq!(publications, 3);
        let doi = scalar(
            &pool,
            "SELECT COUNT(*) FROM publications WHERE doi = '10.1103/PhysRevD.76.013009'",
            vec![],
        )
        .await
        .unwrap();
        assert_eq!(doi, 1);
    }

    #[tokio::test]
    async fn test_run_stops_at_failing_stage() {
        let dir = tempfile::tempdir().unwrap();
        let pool = memory_pool().await.unwrap();
        let search = Arc::new(MockSearchClient::new());

        let runner = PipelineRunner::new(config_for(&dir.path().join("missing.json")), pool)
            .with_search(search.clone());

        assert_err!(runner.execute(&Command::Run).await);
        assert!(search.calls().is_empty());
    }

    #[tokio::test]
    async fn test_search_stages_require_api_key() {
        let pool = memory_pool().await.unwrap();
        let runner = PipelineRunner::new(Arc::new(AppConfig::default()), pool);

        assert_err!(runner.enrich(Some(1)).await);
        assert_ok!(runner.execute(&Command::Validate).await);
    }
}
