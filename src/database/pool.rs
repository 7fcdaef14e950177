//! Database Connection Pool using sqlx

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::database::{StoreError, StoreResult};

pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    pub async fn new(connection_string: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(connection_string)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to PostgreSQL: {}", e)))?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> StoreResult<()> {
        info!("Initializing governance schema...");

        for (name, statement) in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(format!("Failed to create {}: {}", name, e)))?;
        }

        info!("Governance schema initialized");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const SCHEMA: &[(&str, &str)] = &[
    ("governance schema", "CREATE SCHEMA IF NOT EXISTS governance"),
    (
        "users table",
        r#"
        CREATE TABLE IF NOT EXISTS governance.users (
            id VARCHAR(255) PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            role VARCHAR(32) NOT NULL
        )
        "#,
    ),
    (
        "experts table",
        r#"
        CREATE TABLE IF NOT EXISTS governance.experts (
            id VARCHAR(255) PRIMARY KEY,
            name TEXT NOT NULL,
            industry TEXT NOT NULL DEFAULT '',
            sub_industry TEXT NOT NULL DEFAULT '',
            country TEXT NOT NULL DEFAULT '',
            region TEXT NOT NULL DEFAULT '',
            seniority_score DOUBLE PRECISION,
            years_experience DOUBLE PRECISION,
            predicted_rate DOUBLE PRECISION,
            past_employers JSONB NOT NULL DEFAULT '[]',
            skills JSONB NOT NULL DEFAULT '[]',
            contacts JSONB NOT NULL DEFAULT '[]',
            owner_id VARCHAR(255) REFERENCES governance.users(id),
            visibility_status VARCHAR(16) NOT NULL,
            private_expires_at TIMESTAMP WITH TIME ZONE,
            last_contact_update TIMESTAMP WITH TIME ZONE,
            reputation_score DOUBLE PRECISION NOT NULL DEFAULT 0,
            compliance_score DOUBLE PRECISION,
            mnpi_risk_level VARCHAR(16) NOT NULL DEFAULT 'LOW',
            professional_authority_index DOUBLE PRECISION,
            citation_count BIGINT CHECK (citation_count >= 0),
            patent_count BIGINT CHECK (patent_count >= 0),
            total_engagements BIGINT NOT NULL DEFAULT 0,
            average_actual_rate DOUBLE PRECISION NOT NULL DEFAULT 0,
            subject_frequency_map JSONB NOT NULL DEFAULT '{}',
            reliability_index DOUBLE PRECISION,
            contact_cloaked BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            CONSTRAINT private_requires_owner_and_expiry CHECK (
                visibility_status <> 'PRIVATE'
                OR (owner_id IS NOT NULL AND private_expires_at IS NOT NULL)
            )
        )
        "#,
    ),
    (
        "experts expiry index",
        "CREATE INDEX IF NOT EXISTS idx_experts_expiry ON governance.experts(visibility_status, private_expires_at)",
    ),
    (
        "tickets table",
        r#"
        CREATE TABLE IF NOT EXISTS governance.tickets (
            id VARCHAR(255) PRIMARY KEY,
            expert_id VARCHAR(255) NOT NULL REFERENCES governance.experts(id),
            requester_id VARCHAR(255) NOT NULL,
            owner_id VARCHAR(255),
            status VARCHAR(16) NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "single open ticket index",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_one_open ON governance.tickets(expert_id) WHERE status = 'OPEN'",
    ),
    (
        "audit_logs table",
        r#"
        CREATE TABLE IF NOT EXISTS governance.audit_logs (
            id VARCHAR(255) PRIMARY KEY,
            actor_id VARCHAR(255),
            target_id VARCHAR(255),
            action VARCHAR(64) NOT NULL,
            metadata JSONB NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "audit_logs index",
        "CREATE INDEX IF NOT EXISTS idx_audit_logs_created ON governance.audit_logs(created_at DESC)",
    ),
    (
        "contact_attempts table",
        r#"
        CREATE TABLE IF NOT EXISTS governance.contact_attempts (
            id VARCHAR(255) PRIMARY KEY,
            expert_id VARCHAR(255) NOT NULL REFERENCES governance.experts(id),
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "contact_attempts index",
        "CREATE INDEX IF NOT EXISTS idx_contact_attempts_window ON governance.contact_attempts(expert_id, created_at)",
    ),
    (
        "engagements table",
        r#"
        CREATE TABLE IF NOT EXISTS governance.engagements (
            id VARCHAR(255) PRIMARY KEY,
            expert_id VARCHAR(255) NOT NULL REFERENCES governance.experts(id),
            project_id VARCHAR(255) NOT NULL,
            subject_matter TEXT NOT NULL,
            actual_cost DOUBLE PRECISION NOT NULL,
            client_feedback_score SMALLINT NOT NULL,
            date TIMESTAMP WITH TIME ZONE NOT NULL,
            duration_minutes BIGINT NOT NULL
        )
        "#,
    ),
    (
        "engagements index",
        "CREATE INDEX IF NOT EXISTS idx_engagements_window ON governance.engagements(expert_id, date)",
    ),
    (
        "system_config table",
        r#"
        CREATE TABLE IF NOT EXISTS governance.system_config (
            key VARCHAR(128) PRIMARY KEY,
            value JSONB NOT NULL,
            updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "demand_signals table",
        r#"
        CREATE TABLE IF NOT EXISTS governance.demand_signals (
            id VARCHAR(255) PRIMARY KEY,
            title TEXT NOT NULL,
            industry TEXT NOT NULL DEFAULT '',
            sub_industry TEXT NOT NULL DEFAULT '',
            region TEXT NOT NULL DEFAULT '',
            status VARCHAR(16) NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        )
        "#,
    ),
];
