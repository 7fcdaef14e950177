//! PostgreSQL-backed governance store.
//!
//! Each [`WriteBatch`] runs in one transaction. Guarded expert rows are
//! locked up front in id order, then each guard re-reads its row with
//! `FOR UPDATE`, so the precondition still holds when the writes land. The
//! partial unique index on open tickets and the visibility CHECK constraint
//! back the same rules at the schema level. Deadlocks and serialization
//! failures surface as conflicts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::audit::{AuditAction, AuditEntry, AuditMetadata, AuditQuery};
use crate::database::{
    CommitReceipt, DatabasePool, ExpiringExpert, GovernanceStore, Guard, StoreError, StoreResult,
    Write, WriteBatch,
};
use crate::model::{
    new_id, Contact, DemandSignal, DemandStatus, Engagement, EngagementAggregates, Expert,
    ExpertProfile, MnpiRiskLevel, Role, SupplyProfile, Ticket, TicketStatus, User,
    VisibilityStatus,
};
use crate::reputation::{aggregate_engagements, score_expert};

const EXPERT_COLUMNS: &str = "id, name, industry, sub_industry, country, region, \
    seniority_score, years_experience, predicted_rate, past_employers, skills, contacts, \
    owner_id, visibility_status, private_expires_at, last_contact_update, reputation_score, \
    compliance_score, mnpi_risk_level, professional_authority_index, citation_count, \
    patent_count, total_engagements, average_actual_rate, subject_frequency_map, \
    reliability_index, contact_cloaked, created_at, updated_at";

const TICKET_COLUMNS: &str = "id, expert_id, requester_id, owner_id, status, created_at, updated_at";

const ENGAGEMENT_COLUMNS: &str = "id, expert_id, project_id, subject_matter, actual_cost, \
    client_feedback_score, date, duration_minutes";

const DEMAND_COLUMNS: &str = "id, title, industry, sub_industry, region, status, created_at";

/// Map a SQLSTATE to the store error it represents.
fn classify_sqlstate(code: Option<&str>, message: &str) -> Option<StoreError> {
    match code? {
        // unique_violation, deadlock_detected, serialization_failure
        "23505" | "40P01" | "40001" => Some(StoreError::Conflict(message.to_string())),
        "23514" => Some(StoreError::InvalidInput(message.to_string())),
        "23503" => Some(StoreError::NotFound(message.to_string())),
        _ => None,
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            sqlx::Error::Database(db) => classify_sqlstate(db.code().as_deref(), db.message())
                .unwrap_or_else(|| StoreError::Backend(err.to_string())),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

pub struct PgGovernanceStore {
    db: Arc<DatabasePool>,
}

impl PgGovernanceStore {
    pub fn new(db: Arc<DatabasePool>) -> Self {
        Self { db }
    }
}

fn parse_enum<T>(raw: String, parse: impl Fn(&str) -> Option<T>, what: &str) -> StoreResult<T> {
    parse(&raw).ok_or_else(|| StoreError::Serialization(format!("unknown {} '{}'", what, raw)))
}

/// Non-negative count column; out-of-range values are corrupt rows.
fn count(raw: i64, column: &str) -> StoreResult<u32> {
    u32::try_from(raw)
        .map_err(|_| StoreError::Serialization(format!("{} out of range: {}", column, raw)))
}

fn opt_count(row: &PgRow, column: &str) -> StoreResult<Option<u32>> {
    row.try_get::<Option<i64>, _>(column)?
        .map(|raw| count(raw, column))
        .transpose()
}

fn row_to_expert(row: &PgRow) -> StoreResult<Expert> {
    let Json(past_employers): Json<Vec<String>> = row.try_get("past_employers")?;
    let Json(skills): Json<Vec<String>> = row.try_get("skills")?;
    let Json(contacts): Json<Vec<Contact>> = row.try_get("contacts")?;
    let Json(subject_frequency_map): Json<BTreeMap<String, u32>> =
        row.try_get("subject_frequency_map")?;

    Ok(Expert {
        id: row.try_get("id")?,
        profile: ExpertProfile {
            name: row.try_get("name")?,
            industry: row.try_get("industry")?,
            sub_industry: row.try_get("sub_industry")?,
            country: row.try_get("country")?,
            region: row.try_get("region")?,
            seniority_score: row.try_get("seniority_score")?,
            years_experience: row.try_get("years_experience")?,
            predicted_rate: row.try_get("predicted_rate")?,
            past_employers,
            skills,
            contacts,
        },
        owner_id: row.try_get("owner_id")?,
        visibility_status: parse_enum(
            row.try_get("visibility_status")?,
            VisibilityStatus::parse,
            "visibility status",
        )?,
        private_expires_at: row.try_get("private_expires_at")?,
        last_contact_update: row.try_get("last_contact_update")?,
        reputation_score: row.try_get("reputation_score")?,
        compliance_score: row.try_get("compliance_score")?,
        mnpi_risk_level: parse_enum(
            row.try_get("mnpi_risk_level")?,
            MnpiRiskLevel::parse,
            "mnpi risk level",
        )?,
        professional_authority_index: row.try_get("professional_authority_index")?,
        citation_count: opt_count(row, "citation_count")?,
        patent_count: opt_count(row, "patent_count")?,
        aggregates: EngagementAggregates {
            total_engagements: count(row.try_get("total_engagements")?, "total_engagements")?,
            average_actual_rate: row.try_get("average_actual_rate")?,
            subject_frequency_map,
            reliability_index: row.try_get("reliability_index")?,
        },
        contact_cloaked: row.try_get("contact_cloaked")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_ticket(row: &PgRow) -> StoreResult<Ticket> {
    Ok(Ticket {
        id: row.try_get("id")?,
        expert_id: row.try_get("expert_id")?,
        requester_id: row.try_get("requester_id")?,
        owner_id: row.try_get("owner_id")?,
        status: parse_enum(row.try_get("status")?, TicketStatus::parse, "ticket status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_engagement(row: &PgRow) -> StoreResult<Engagement> {
    Ok(Engagement {
        id: row.try_get("id")?,
        expert_id: row.try_get("expert_id")?,
        project_id: row.try_get("project_id")?,
        subject_matter: row.try_get("subject_matter")?,
        actual_cost: row.try_get("actual_cost")?,
        client_feedback_score: row.try_get::<i16, _>("client_feedback_score")?.clamp(0, 255) as u8,
        date: row.try_get("date")?,
        duration_minutes: count(row.try_get("duration_minutes")?, "duration_minutes")?,
    })
}

fn row_to_demand(row: &PgRow) -> StoreResult<DemandSignal> {
    Ok(DemandSignal {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        industry: row.try_get("industry")?,
        sub_industry: row.try_get("sub_industry")?,
        region: row.try_get("region")?,
        status: parse_enum(row.try_get("status")?, DemandStatus::parse, "demand status")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_audit(row: &PgRow) -> StoreResult<AuditEntry> {
    let action: String = row.try_get("action")?;
    let Json(metadata): Json<Value> = row.try_get("metadata")?;
    let metadata: AuditMetadata = serde_json::from_value(metadata)?;

    Ok(AuditEntry {
        id: row.try_get("id")?,
        actor_id: row.try_get("actor_id")?,
        target_id: row.try_get("target_id")?,
        action: AuditAction::parse(&action),
        metadata,
        created_at: row.try_get("created_at")?,
    })
}

fn expected_one(rows_affected: u64, what: impl FnOnce() -> String) -> StoreResult<()> {
    if rows_affected == 0 {
        Err(StoreError::NotFound(what()))
    } else {
        Ok(())
    }
}

async fn lock_expert(conn: &mut PgConnection, expert_id: &str) -> StoreResult<Expert> {
    let sql = format!(
        "SELECT {} FROM governance.experts WHERE id = $1 FOR UPDATE",
        EXPERT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(expert_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("expert {}", expert_id)))?;
    row_to_expert(&row)
}

async fn check_guard(conn: &mut PgConnection, guard: &Guard) -> StoreResult<()> {
    match guard {
        Guard::Visibility {
            expert_id,
            expected,
        } => {
            let expert = lock_expert(conn, expert_id).await?;
            if expert.visibility_status != *expected {
                return Err(StoreError::Conflict(format!(
                    "expert {} is {}, expected {}",
                    expert_id, expert.visibility_status, expected
                )));
            }
        }
        Guard::Owner {
            expert_id,
            expected,
        } => {
            let expert = lock_expert(conn, expert_id).await?;
            if &expert.owner_id != expected {
                return Err(StoreError::Conflict(format!(
                    "owner of expert {} changed concurrently",
                    expert_id
                )));
            }
        }
        Guard::ExpiredBy { expert_id, at } => {
            let expert = lock_expert(conn, expert_id).await?;
            let expired =
                expert.is_private() && expert.private_expires_at.is_some_and(|t| t <= *at);
            if !expired {
                return Err(StoreError::Conflict(format!(
                    "expert {} is no longer expired",
                    expert_id
                )));
            }
        }
        Guard::AuthorityUnset { expert_id } => {
            let expert = lock_expert(conn, expert_id).await?;
            if expert.professional_authority_index.is_some() {
                return Err(StoreError::Conflict(format!(
                    "authority index of expert {} is already set",
                    expert_id
                )));
            }
        }
        Guard::TicketStatus {
            ticket_id,
            expected,
        } => {
            let status: String =
                sqlx::query("SELECT status FROM governance.tickets WHERE id = $1 FOR UPDATE")
                    .bind(ticket_id)
                    .fetch_optional(&mut *conn)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(format!("ticket {}", ticket_id)))?
                    .try_get("status")?;
            if status != expected.as_str() {
                return Err(StoreError::Conflict(format!(
                    "ticket {} is {}, expected {}",
                    ticket_id,
                    status,
                    expected.as_str()
                )));
            }
        }
        Guard::NoOpenTicket { expert_id } => {
            // Serialize ticket creation per expert on the expert row
            lock_expert(conn, expert_id).await?;
            let open = sqlx::query(
                "SELECT 1 FROM governance.tickets WHERE expert_id = $1 AND status = 'OPEN' LIMIT 1",
            )
            .bind(expert_id)
            .fetch_optional(&mut *conn)
            .await?;
            if open.is_some() {
                return Err(StoreError::Conflict(format!(
                    "expert {} already has an open ticket",
                    expert_id
                )));
            }
        }
    }
    Ok(())
}

async fn fetch_engagements(conn: &mut PgConnection, expert_id: &str) -> StoreResult<Vec<Engagement>> {
    let sql = format!(
        "SELECT {} FROM governance.engagements WHERE expert_id = $1 ORDER BY date ASC",
        ENGAGEMENT_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(expert_id).fetch_all(&mut *conn).await?;
    rows.iter().map(row_to_engagement).collect()
}

async fn insert_expert(conn: &mut PgConnection, expert: &Expert) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO governance.experts (
            id, name, industry, sub_industry, country, region,
            seniority_score, years_experience, predicted_rate,
            past_employers, skills, contacts,
            owner_id, visibility_status, private_expires_at, last_contact_update,
            reputation_score, compliance_score, mnpi_risk_level,
            professional_authority_index, citation_count, patent_count,
            total_engagements, average_actual_rate, subject_frequency_map, reliability_index,
            contact_cloaked, created_at, updated_at
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
            $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29
        )
        "#,
    )
    .bind(&expert.id)
    .bind(&expert.profile.name)
    .bind(&expert.profile.industry)
    .bind(&expert.profile.sub_industry)
    .bind(&expert.profile.country)
    .bind(&expert.profile.region)
    .bind(expert.profile.seniority_score)
    .bind(expert.profile.years_experience)
    .bind(expert.profile.predicted_rate)
    .bind(Json(expert.profile.past_employers.clone()))
    .bind(Json(expert.profile.skills.clone()))
    .bind(Json(expert.profile.contacts.clone()))
    .bind(&expert.owner_id)
    .bind(expert.visibility_status.as_str())
    .bind(expert.private_expires_at)
    .bind(expert.last_contact_update)
    .bind(expert.reputation_score)
    .bind(expert.compliance_score)
    .bind(expert.mnpi_risk_level.as_str())
    .bind(expert.professional_authority_index)
    .bind(expert.citation_count.map(i64::from))
    .bind(expert.patent_count.map(i64::from))
    .bind(i64::from(expert.aggregates.total_engagements))
    .bind(expert.aggregates.average_actual_rate)
    .bind(Json(expert.aggregates.subject_frequency_map.clone()))
    .bind(expert.aggregates.reliability_index)
    .bind(expert.contact_cloaked)
    .bind(expert.created_at)
    .bind(expert.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn apply_write(conn: &mut PgConnection, write: Write, now: DateTime<Utc>) -> StoreResult<()> {
    match write {
        Write::InsertUser(user) => {
            sqlx::query(
                "INSERT INTO governance.users (id, name, email, role) VALUES ($1, $2, $3, $4)",
            )
            .bind(&user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.role.as_str())
            .execute(&mut *conn)
            .await?;
        }
        Write::InsertExpert(expert) => insert_expert(conn, &expert).await?,
        Write::ReleaseToPool { expert_id, at } => {
            let result = sqlx::query(
                r#"
                UPDATE governance.experts
                SET visibility_status = 'GLOBAL_POOL', private_expires_at = $2, updated_at = $3
                WHERE id = $1
                "#,
            )
            .bind(&expert_id)
            .bind(at)
            .bind(now)
            .execute(&mut *conn)
            .await?;
            expected_one(result.rows_affected(), || format!("expert {}", expert_id))?;
        }
        Write::ClaimPrivate {
            expert_id,
            owner_id,
            expires_at,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE governance.experts
                SET visibility_status = 'PRIVATE', owner_id = $2, private_expires_at = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(&expert_id)
            .bind(&owner_id)
            .bind(expires_at)
            .bind(now)
            .execute(&mut *conn)
            .await?;
            expected_one(result.rows_affected(), || format!("expert {}", expert_id))?;
        }
        Write::SetOwner {
            expert_id,
            owner_id,
            expires_at,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE governance.experts
                SET owner_id = $2, private_expires_at = COALESCE($3, private_expires_at), updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(&expert_id)
            .bind(&owner_id)
            .bind(expires_at)
            .bind(now)
            .execute(&mut *conn)
            .await?;
            expected_one(result.rows_affected(), || format!("expert {}", expert_id))?;
        }
        Write::InsertTicket(ticket) => {
            let sql = format!(
                "INSERT INTO governance.tickets ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
                TICKET_COLUMNS
            );
            sqlx::query(&sql)
                .bind(&ticket.id)
                .bind(&ticket.expert_id)
                .bind(&ticket.requester_id)
                .bind(&ticket.owner_id)
                .bind(ticket.status.as_str())
                .bind(ticket.created_at)
                .bind(ticket.updated_at)
                .execute(&mut *conn)
                .await?;
        }
        Write::SetTicketStatus {
            ticket_id,
            status,
            owner_id,
            at,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE governance.tickets
                SET status = $2, owner_id = COALESCE($3, owner_id), updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(&ticket_id)
            .bind(status.as_str())
            .bind(&owner_id)
            .bind(at)
            .execute(&mut *conn)
            .await?;
            expected_one(result.rows_affected(), || format!("ticket {}", ticket_id))?;
        }
        Write::SetUserRole { user_id, role } => {
            let result = sqlx::query("UPDATE governance.users SET role = $2 WHERE id = $1")
                .bind(&user_id)
                .bind(role.as_str())
                .execute(&mut *conn)
                .await?;
            expected_one(result.rows_affected(), || format!("user {}", user_id))?;
        }
        Write::SetAuthority {
            expert_id,
            citation_count,
            patent_count,
            index,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE governance.experts
                SET citation_count = $2, patent_count = $3, professional_authority_index = $4, updated_at = $5
                WHERE id = $1
                "#,
            )
            .bind(&expert_id)
            .bind(i64::from(citation_count))
            .bind(i64::from(patent_count))
            .bind(index)
            .bind(now)
            .execute(&mut *conn)
            .await?;
            expected_one(result.rows_affected(), || format!("expert {}", expert_id))?;
        }
        Write::SetContactCloak { expert_id, cloaked } => {
            let result = sqlx::query(
                "UPDATE governance.experts SET contact_cloaked = $2, updated_at = $3 WHERE id = $1",
            )
            .bind(&expert_id)
            .bind(cloaked)
            .bind(now)
            .execute(&mut *conn)
            .await?;
            expected_one(result.rows_affected(), || format!("expert {}", expert_id))?;
        }
        Write::InsertContactAttempt(attempt) => {
            sqlx::query(
                "INSERT INTO governance.contact_attempts (id, expert_id, created_at) VALUES ($1, $2, $3)",
            )
            .bind(&attempt.id)
            .bind(&attempt.expert_id)
            .bind(attempt.created_at)
            .execute(&mut *conn)
            .await?;
        }
        Write::InsertEngagement(engagement) => {
            let sql = format!(
                "INSERT INTO governance.engagements ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                ENGAGEMENT_COLUMNS
            );
            sqlx::query(&sql)
                .bind(&engagement.id)
                .bind(&engagement.expert_id)
                .bind(&engagement.project_id)
                .bind(&engagement.subject_matter)
                .bind(engagement.actual_cost)
                .bind(engagement.client_feedback_score as i16)
                .bind(engagement.date)
                .bind(i64::from(engagement.duration_minutes))
                .execute(&mut *conn)
                .await?;
        }
        Write::RecomputeEngagementAggregates { expert_id } => {
            let aggregates = aggregate_engagements(&fetch_engagements(conn, &expert_id).await?);
            let result = sqlx::query(
                r#"
                UPDATE governance.experts
                SET total_engagements = $2, average_actual_rate = $3,
                    subject_frequency_map = $4, reliability_index = $5, updated_at = $6
                WHERE id = $1
                "#,
            )
            .bind(&expert_id)
            .bind(i64::from(aggregates.total_engagements))
            .bind(aggregates.average_actual_rate)
            .bind(Json(aggregates.subject_frequency_map))
            .bind(aggregates.reliability_index)
            .bind(now)
            .execute(&mut *conn)
            .await?;
            expected_one(result.rows_affected(), || format!("expert {}", expert_id))?;
        }
        Write::RecomputeReputation { expert_id } => {
            let expert = lock_expert(conn, &expert_id).await?;
            let statuses: Vec<String> =
                sqlx::query_scalar("SELECT status FROM governance.tickets WHERE expert_id = $1")
                    .bind(&expert_id)
                    .fetch_all(&mut *conn)
                    .await?;
            let statuses = statuses
                .into_iter()
                .map(|s| parse_enum(s, TicketStatus::parse, "ticket status"))
                .collect::<StoreResult<Vec<_>>>()?;
            let breakdown = score_expert(&expert, statuses);

            sqlx::query(
                "UPDATE governance.experts SET reputation_score = $2, updated_at = $3 WHERE id = $1",
            )
            .bind(&expert_id)
            .bind(breakdown.score)
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }
        Write::UpsertConfig { key, value } => {
            sqlx::query(
                r#"
                INSERT INTO governance.system_config (key, value, updated_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&key)
            .bind(Json(value))
            .bind(now)
            .execute(&mut *conn)
            .await?;
        }
        Write::InsertDemandSignal(signal) => {
            let sql = format!(
                "INSERT INTO governance.demand_signals ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)",
                DEMAND_COLUMNS
            );
            sqlx::query(&sql)
                .bind(&signal.id)
                .bind(&signal.title)
                .bind(&signal.industry)
                .bind(&signal.sub_industry)
                .bind(&signal.region)
                .bind(signal.status.as_str())
                .bind(signal.created_at)
                .execute(&mut *conn)
                .await?;
        }
        Write::SetDemandStatus { signal_id, status } => {
            let result =
                sqlx::query("UPDATE governance.demand_signals SET status = $2 WHERE id = $1")
                    .bind(&signal_id)
                    .bind(status.as_str())
                    .execute(&mut *conn)
                    .await?;
            expected_one(result.rows_affected(), || format!("demand signal {}", signal_id))?;
        }
    }
    Ok(())
}

#[async_trait]
impl GovernanceStore for PgGovernanceStore {
    async fn get_expert(&self, expert_id: &str) -> StoreResult<Option<Expert>> {
        let sql = format!("SELECT {} FROM governance.experts WHERE id = $1", EXPERT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(expert_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(row_to_expert).transpose()
    }

    async fn get_experts(&self, expert_ids: &[String]) -> StoreResult<Vec<Expert>> {
        let sql = format!(
            "SELECT {} FROM governance.experts WHERE id = ANY($1)",
            EXPERT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(expert_ids.to_vec())
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(row_to_expert).collect()
    }

    async fn count_private_expiring(
        &self,
        after: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM governance.experts
            WHERE visibility_status = 'PRIVATE'
              AND private_expires_at <= $2
              AND ($1::timestamptz IS NULL OR private_expires_at > $1)
            "#,
        )
        .bind(after)
        .bind(until)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn list_private_by_expiry(&self, limit: usize) -> StoreResult<Vec<ExpiringExpert>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, owner_id, private_expires_at FROM governance.experts
            WHERE visibility_status = 'PRIVATE' AND private_expires_at IS NOT NULL
            ORDER BY private_expires_at ASC, id ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ExpiringExpert {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    owner_id: row.try_get("owner_id")?,
                    private_expires_at: row.try_get("private_expires_at")?,
                })
            })
            .collect()
    }

    async fn find_expired_private(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Expert>> {
        let sql = format!(
            r#"
            SELECT {} FROM governance.experts
            WHERE visibility_status = 'PRIVATE'
              AND private_expires_at <= $1
              AND NOT EXISTS (
                  SELECT 1 FROM jsonb_array_elements(contacts) AS c
                  WHERE COALESCE((c->>'is_verified')::boolean, FALSE)
              )
            ORDER BY private_expires_at ASC
            LIMIT $2
            "#,
            EXPERT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .bind(limit as i64)
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(row_to_expert).collect()
    }

    async fn get_user(&self, user_id: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, role FROM governance.users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        match row {
            Some(row) => Ok(Some(User {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                email: row.try_get("email")?,
                role: parse_enum(row.try_get("role")?, Role::parse, "role")?,
            })),
            None => Ok(None),
        }
    }

    async fn get_ticket(&self, ticket_id: &str) -> StoreResult<Option<Ticket>> {
        let sql = format!("SELECT {} FROM governance.tickets WHERE id = $1", TICKET_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(ticket_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(row_to_ticket).transpose()
    }

    async fn tickets_for_expert(&self, expert_id: &str) -> StoreResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {} FROM governance.tickets WHERE expert_id = $1 ORDER BY created_at ASC",
            TICKET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(expert_id)
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(row_to_ticket).collect()
    }

    async fn open_tickets(&self, limit: usize) -> StoreResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {} FROM governance.tickets WHERE status = 'OPEN' ORDER BY created_at ASC LIMIT $1",
            TICKET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(row_to_ticket).collect()
    }

    async fn count_contact_attempts(
        &self,
        expert_id: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM governance.contact_attempts WHERE expert_id = $1 AND created_at >= $2",
        )
        .bind(expert_id)
        .bind(since)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn count_engagements(&self, expert_id: &str, since: DateTime<Utc>) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM governance.engagements WHERE expert_id = $1 AND date >= $2",
        )
        .bind(expert_id)
        .bind(since)
        .fetch_one(self.db.pool())
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn experts_contacted_since(&self, since: DateTime<Utc>) -> StoreResult<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT expert_id FROM governance.contact_attempts WHERE created_at >= $1 ORDER BY expert_id",
        )
        .bind(since)
        .fetch_all(self.db.pool())
        .await?;
        Ok(ids)
    }

    async fn engagements_for_expert(&self, expert_id: &str) -> StoreResult<Vec<Engagement>> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_engagements(&mut conn, expert_id).await
    }

    async fn pool_supply(&self) -> StoreResult<Vec<SupplyProfile>> {
        let rows = sqlx::query(
            "SELECT id, industry, sub_industry, region FROM governance.experts WHERE visibility_status = 'GLOBAL_POOL'",
        )
        .fetch_all(self.db.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(SupplyProfile {
                    expert_id: row.try_get("id")?,
                    industry: row.try_get("industry")?,
                    sub_industry: row.try_get("sub_industry")?,
                    region: row.try_get("region")?,
                })
            })
            .collect()
    }

    async fn active_demand_signals(&self) -> StoreResult<Vec<DemandSignal>> {
        let sql = format!(
            "SELECT {} FROM governance.demand_signals WHERE status IN ('PENDING', 'RUNNING') ORDER BY created_at ASC",
            DEMAND_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(self.db.pool()).await?;
        rows.iter().map(row_to_demand).collect()
    }

    async fn get_demand_signal(&self, signal_id: &str) -> StoreResult<Option<DemandSignal>> {
        let sql = format!(
            "SELECT {} FROM governance.demand_signals WHERE id = $1",
            DEMAND_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(signal_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(row_to_demand).transpose()
    }

    async fn get_config(&self, key: &str) -> StoreResult<Option<Value>> {
        let value: Option<Json<Value>> =
            sqlx::query_scalar("SELECT value FROM governance.system_config WHERE key = $1")
                .bind(key)
                .fetch_optional(self.db.pool())
                .await?;
        Ok(value.map(|Json(v)| v))
    }

    async fn query_audit(&self, query: &AuditQuery, limit: usize) -> StoreResult<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, actor_id, target_id, action, metadata, created_at
            FROM governance.audit_logs
            WHERE ($1::text IS NULL OR actor_id = $1)
              AND ($2::text IS NULL OR target_id = $2)
              AND ($3::text IS NULL OR action = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(&query.actor_id)
        .bind(&query.target_id)
        .bind(query.action.map(|a| a.as_str()))
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;
        rows.iter().map(row_to_audit).collect()
    }

    async fn commit(&self, batch: WriteBatch) -> StoreResult<CommitReceipt> {
        let mut tx = self.db.pool().begin().await?;
        let now = Utc::now();

        let lock_order = batch.locked_expert_ids();
        if !lock_order.is_empty() {
            sqlx::query("SELECT id FROM governance.experts WHERE id = ANY($1) ORDER BY id FOR UPDATE")
                .bind(&lock_order)
                .fetch_all(&mut *tx)
                .await?;
        }

        for guard in &batch.guards {
            check_guard(&mut tx, guard).await?;
        }

        for write in batch.writes {
            apply_write(&mut tx, write, now).await?;
        }

        let mut entries = Vec::with_capacity(batch.audit.len());
        for append in batch.audit {
            let entry = append.stamp(new_id(), now);
            sqlx::query(
                r#"
                INSERT INTO governance.audit_logs (id, actor_id, target_id, action, metadata, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.actor_id)
            .bind(&entry.target_id)
            .bind(entry.action.as_str())
            .bind(Json(serde_json::to_value(&entry.metadata)?))
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
            entries.push(entry);
        }

        tx.commit().await?;
        debug!(audit_rows = entries.len(), "Committed write batch");

        Ok(CommitReceipt { audit: entries })
    }
}
