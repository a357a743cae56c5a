// ==============================================================================
// store.rs - Annotation Cache Store
// ==============================================================================
// Description: PostgreSQL-backed relational cache for variant and
//              transcript annotations
// Author: Matt Barham
// Created: 2026-06-26
// Modified: 2026-07-28
// Version: 1.1.0
// ==============================================================================

use std::collections::BTreeMap;

use annotation_core::models::{
    AnnotationRecord, Impact, Loftee, TranscriptRecord, VariantAnnotation,
};
use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Aggregated cache counters for the statistics endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatistics {
    pub total_records: i64,
    pub with_ml_score: i64,
    pub ml_score_fraction: f64,
    pub consequence_histogram: BTreeMap<String, i64>,
}

/// Relational store with one variant-level table (`annotation`) and one
/// transcript-level table (`transcript`). All writes for a batch share a
/// single transaction so the two tables stay referentially consistent.
#[derive(Clone)]
pub struct AnnotationStore {
    pool: PgPool,
}

impl AnnotationStore {
    /// Connect a pooled PostgreSQL client.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist. Idempotent; no
    /// destructive migration. HGVS notations and consequence lists are
    /// TEXT because they can exceed 255 characters.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS annotation (
                id BIGSERIAL PRIMARY KEY,
                variant_id VARCHAR(255) UNIQUE NOT NULL,
                gene VARCHAR(255),
                cadd DOUBLE PRECISION,
                ml_score DOUBLE PRECISION,
                most_severe_consequence VARCHAR(255),
                allele_freq DOUBLE PRECISION,
                max_allele_freq DOUBLE PRECISION,
                omim VARCHAR(255),
                clinsig TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create annotation table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transcript (
                id BIGSERIAL PRIMARY KEY,
                variant_id VARCHAR(255) NOT NULL
                    REFERENCES annotation(variant_id) ON DELETE CASCADE,
                transcript_id VARCHAR(255),
                polyphen DOUBLE PRECISION,
                protein_notation TEXT,
                revel DOUBLE PRECISION,
                splice_ai DOUBLE PRECISION,
                mane BOOLEAN NOT NULL DEFAULT FALSE,
                loftee VARCHAR(16),
                impact VARCHAR(16),
                gerp DOUBLE PRECISION,
                cdna_notation TEXT,
                consequences TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create transcript table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_transcript_variant ON transcript(variant_id)")
            .execute(&self.pool)
            .await
            .context("Failed to create transcript variant index")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_transcript_transcript ON transcript(transcript_id)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create transcript id index")?;

        info!("Annotation cache schema ready");
        Ok(())
    }

    /// Liveness probe for the health endpoint.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Fetch the cached annotation for a variant key, transcripts included.
    pub async fn get_annotation(&self, variant_key: &str) -> Result<Option<VariantAnnotation>> {
        type AnnotationRow = (
            Option<String>, // gene
            Option<f64>,    // cadd
            Option<f64>,    // ml_score
            Option<String>, // most_severe_consequence
            Option<f64>,    // allele_freq
            Option<f64>,    // max_allele_freq
            Option<String>, // omim
            Option<String>, // clinsig
        );

        let row: Option<AnnotationRow> = sqlx::query_as(
            r#"
            SELECT gene, cadd, ml_score, most_severe_consequence,
                   allele_freq, max_allele_freq, omim, clinsig
            FROM annotation
            WHERE variant_id = $1
            "#,
        )
        .bind(variant_key)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query annotation")?;

        let Some((gene, cadd, ml_score, most_severe_consequence, allele_freq, max_allele_freq, omim, clinsig)) =
            row
        else {
            return Ok(None);
        };

        type TranscriptRow = (
            Option<String>, // transcript_id
            Option<f64>,    // polyphen
            Option<String>, // protein_notation
            Option<f64>,    // revel
            Option<f64>,    // splice_ai
            bool,           // mane
            Option<String>, // loftee
            Option<String>, // impact
            Option<f64>,    // gerp
            Option<String>, // cdna_notation
            Option<String>, // consequences
        );

        let transcript_rows: Vec<TranscriptRow> = sqlx::query_as(
            r#"
            SELECT transcript_id, polyphen, protein_notation, revel, splice_ai,
                   mane, loftee, impact, gerp, cdna_notation, consequences
            FROM transcript
            WHERE variant_id = $1
            ORDER BY id
            "#,
        )
        .bind(variant_key)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query transcripts")?;

        let transcripts = transcript_rows
            .into_iter()
            .map(
                |(transcript_id, polyphen, protein_notation, revel, splice_ai, mane, loftee, impact, gerp, cdna_notation, consequences)| {
                    TranscriptRecord {
                        transcript_id: transcript_id.unwrap_or_default(),
                        polyphen,
                        protein_notation,
                        revel,
                        splice_ai,
                        mane,
                        loftee: loftee.as_deref().and_then(Loftee::parse),
                        impact: impact.as_deref().and_then(Impact::parse),
                        gerp,
                        cdna_notation,
                        consequences,
                    }
                },
            )
            .collect();

        Ok(Some(VariantAnnotation {
            record: AnnotationRecord {
                variant_key: variant_key.to_string(),
                gene,
                cadd,
                ml_score,
                most_severe_consequence,
                allele_freq,
                max_allele_freq,
                omim,
                clinsig,
            },
            transcripts,
        }))
    }

    /// Persist one batch in a single transaction. Per variant: existing
    /// transcript rows are deleted, the variant-level row is upserted, and
    /// the new transcript set is inserted. All-or-nothing.
    pub async fn write_batch(&self, batch: &[VariantAnnotation]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for annotation in batch {
            let record = &annotation.record;
            let key = record.variant_key.as_str();

            sqlx::query("DELETE FROM transcript WHERE variant_id = $1")
                .bind(key)
                .execute(&mut *tx)
                .await
                .context("Failed to clear transcript rows")?;

            sqlx::query(
                r#"
                INSERT INTO annotation (variant_id, gene, cadd, ml_score,
                                        most_severe_consequence, allele_freq,
                                        max_allele_freq, omim, clinsig)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (variant_id) DO UPDATE SET
                    gene = EXCLUDED.gene,
                    cadd = EXCLUDED.cadd,
                    ml_score = EXCLUDED.ml_score,
                    most_severe_consequence = EXCLUDED.most_severe_consequence,
                    allele_freq = EXCLUDED.allele_freq,
                    max_allele_freq = EXCLUDED.max_allele_freq,
                    omim = EXCLUDED.omim,
                    clinsig = EXCLUDED.clinsig
                "#,
            )
            .bind(key)
            .bind(record.gene.as_deref())
            .bind(record.cadd)
            .bind(record.ml_score)
            .bind(record.most_severe_consequence.as_deref())
            .bind(record.allele_freq)
            .bind(record.max_allele_freq)
            .bind(record.omim.as_deref())
            .bind(record.clinsig.as_deref())
            .execute(&mut *tx)
            .await
            .context("Failed to upsert annotation")?;

            for transcript in &annotation.transcripts {
                sqlx::query(
                    r#"
                    INSERT INTO transcript (variant_id, transcript_id, polyphen,
                                            protein_notation, revel, splice_ai,
                                            mane, loftee, impact, gerp,
                                            cdna_notation, consequences)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    "#,
                )
                .bind(key)
                .bind(transcript.transcript_id.as_str())
                .bind(transcript.polyphen)
                .bind(transcript.protein_notation.as_deref())
                .bind(transcript.revel)
                .bind(transcript.splice_ai)
                .bind(transcript.mane)
                .bind(transcript.loftee.map(|l| l.as_str()))
                .bind(transcript.impact.map(|i| i.as_str()))
                .bind(transcript.gerp)
                .bind(transcript.cdna_notation.as_deref())
                .bind(transcript.consequences.as_deref())
                .execute(&mut *tx)
                .await
                .context("Failed to insert transcript row")?;
            }
        }

        tx.commit().await.context("Failed to commit batch")?;
        info!("Stored batch of {} variant(s)", batch.len());
        Ok(())
    }

    /// Aggregated cache counters.
    pub async fn statistics(&self) -> Result<CacheStatistics> {
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM annotation")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count annotations")?;

        let (with_ml_score,): (i64,) = sqlx::query_as("SELECT COUNT(ml_score) FROM annotation")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count scored annotations")?;

        let histogram_rows: Vec<(Option<String>, i64)> = sqlx::query_as(
            r#"
            SELECT most_severe_consequence, COUNT(*)
            FROM annotation
            GROUP BY most_severe_consequence
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to build consequence histogram")?;

        let consequence_histogram = histogram_rows
            .into_iter()
            .map(|(consequence, count)| (consequence.unwrap_or_else(|| "unknown".to_string()), count))
            .collect();

        Ok(CacheStatistics {
            total_records: total,
            with_ml_score,
            ml_score_fraction: if total > 0 {
                with_ml_score as f64 / total as f64
            } else {
                0.0
            },
            consequence_histogram,
        })
    }
}
