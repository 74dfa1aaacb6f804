pub mod decimal;
pub mod ledger;
pub mod models;
pub mod schema;

use std::sync::Arc;

use chorepoints_shared::domain::{Chore as ChoreDef, Child as ChildDef, SettingSeed};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use decimal::DbDecimal;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use models::{Child, Chore, ChoreAssignment, ChoreClaim, NewChild, NewChore, NewSetting, PointLog, Setting};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, trace};

use crate::chores::{self, ClaimError, ClaimRequest};
use crate::settlement::{self, ClaimOutcome, RunLog, SettlementError, SettlementReport, snapshot};

/// Used for seeded chores when neither the chore nor the settings name one.
const DEFAULT_BONUS_END_TIME: i32 = 14;

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),

    /// The caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced row does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
    /// Serialises settlement runs within this process.
    settlement_lock: Arc<tokio::sync::Mutex<()>>,
}

impl Store {
    pub async fn connect_sqlite(path: &str) -> Result<Self, StorageError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(8).build(manager)?;

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        {
            let pool_clone = pool.clone();
            tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
                const MIGRATIONS: EmbeddedMigrations = embed_migrations!();
                let mut conn = pool_clone.get()?;
                configure_sqlite_conn(&mut conn)?;
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(())
            })
            .await??;
        }

        Ok(Store {
            pool,
            settlement_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Upserts children and chore definitions, inserts missing settings.
    ///
    /// Balances, chore availability and edited settings are left as they are.
    pub async fn seed_from_config(
        &self,
        cfg_children: &[ChildDef],
        cfg_chores: &[ChoreDef],
        cfg_settings: &[SettingSeed],
    ) -> Result<(), StorageError> {
        use schema::{chore_assignments, chores, children, settings};

        let pool = self.pool.clone();
        let children_owned = cfg_children.to_owned();
        let chores_owned = cfg_chores.to_owned();
        let settings_owned = cfg_settings.to_owned();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;

            conn.immediate_transaction(|conn| -> Result<(), StorageError> {
                for c in &children_owned {
                    let new_child = NewChild {
                        id: &c.id,
                        display_name: &c.display_name,
                    };
                    diesel::insert_into(children::table)
                        .values(&new_child)
                        .on_conflict(children::id)
                        .do_update()
                        .set(children::display_name.eq(new_child.display_name))
                        .execute(conn)?;
                }

                for s in &settings_owned {
                    let name = if s.name.is_empty() { &s.key } else { &s.name };
                    diesel::insert_into(settings::table)
                        .values(&NewSetting {
                            key: &s.key,
                            name,
                            value: DbDecimal(s.value),
                        })
                        .on_conflict_do_nothing()
                        .execute(conn)?;
                }

                let default_end = snapshot::read_one(conn, snapshot::BONUS_END_TIME)?
                    .and_then(|v| v.to_i32())
                    .unwrap_or(DEFAULT_BONUS_END_TIME);

                for t in &chores_owned {
                    let bonus_end_time = t.bonus_end_time.unwrap_or(default_end);
                    if !(0..=23).contains(&bonus_end_time) {
                        return Err(StorageError::InvalidInput(format!(
                            "chore {}: bonus_end_time {bonus_end_time} is not an hour",
                            t.id
                        )));
                    }
                    let new_chore = NewChore {
                        id: &t.id,
                        name: &t.name,
                        comment: &t.comment,
                        points: DbDecimal(t.points),
                        available: t.available,
                        daily: t.daily,
                        persistent: t.persistent,
                        assignment_type: t.assignment_type.as_str(),
                        early_bonus: t.early_bonus,
                        bonus_end_time,
                        available_time: t.available_time.0,
                    };
                    // availability is runtime state, keep it on re-seed
                    diesel::insert_into(chores::table)
                        .values(&new_chore)
                        .on_conflict(chores::id)
                        .do_update()
                        .set((
                            chores::name.eq(new_chore.name),
                            chores::comment.eq(new_chore.comment),
                            chores::points.eq(DbDecimal(t.points)),
                            chores::daily.eq(new_chore.daily),
                            chores::persistent.eq(new_chore.persistent),
                            chores::assignment_type.eq(new_chore.assignment_type),
                            chores::early_bonus.eq(new_chore.early_bonus),
                            chores::bonus_end_time.eq(new_chore.bonus_end_time),
                            chores::available_time.eq(new_chore.available_time),
                        ))
                        .execute(conn)?;

                    diesel::delete(
                        chore_assignments::table.filter(chore_assignments::chore_id.eq(&t.id)),
                    )
                    .execute(conn)?;
                    let rows: Vec<ChoreAssignment> = t
                        .assigned_children
                        .iter()
                        .map(|child| ChoreAssignment {
                            chore_id: t.id.clone(),
                            child_id: child.clone(),
                        })
                        .collect();
                    if !rows.is_empty() {
                        diesel::insert_into(chore_assignments::table)
                            .values(&rows)
                            .execute(conn)?;
                    }
                }
                Ok(())
            })?;

            info!(
                children = children_owned.len(),
                chores = chores_owned.len(),
                settings = settings_owned.len(),
                "seeded from config"
            );
            Ok(())
        })
        .await?
    }

    pub async fn list_children(&self) -> Result<Vec<Child>, StorageError> {
        use schema::children::dsl::*;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Child>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(children
                .order(display_name.asc())
                .select(Child::as_select())
                .load(&mut conn)?)
        })
        .await?
    }

    pub async fn get_child(&self, child: &str) -> Result<Child, StorageError> {
        let pool = self.pool.clone();
        let child_id = child.to_string();
        tokio::task::spawn_blocking(move || -> Result<Child, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            ledger::load_child(&mut conn, &child_id)
        })
        .await?
    }

    /// Every chore with the ids of the children it is assigned to.
    pub async fn list_chores(&self) -> Result<Vec<(Chore, Vec<String>)>, StorageError> {
        use schema::{chore_assignments, chores};
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<(Chore, Vec<String>)>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let all = chores::table
                .order(chores::name.asc())
                .select(Chore::as_select())
                .load(&mut conn)?;
            let assignments = chore_assignments::table
                .order((chore_assignments::chore_id.asc(), chore_assignments::child_id.asc()))
                .select(ChoreAssignment::as_select())
                .load(&mut conn)?;
            let mut by_chore: std::collections::HashMap<String, Vec<String>> =
                std::collections::HashMap::new();
            for a in assignments {
                by_chore.entry(a.chore_id).or_default().push(a.child_id);
            }
            Ok(all
                .into_iter()
                .map(|c| {
                    let assigned = by_chore.remove(&c.id).unwrap_or_default();
                    (c, assigned)
                })
                .collect())
        })
        .await?
    }

    pub async fn list_pending_claims(&self) -> Result<Vec<ChoreClaim>, StorageError> {
        use schema::chore_claims;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<ChoreClaim>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(chore_claims::table
                .order(chore_claims::claimed_at.desc())
                .select(ChoreClaim::as_select())
                .load(&mut conn)?
                .into_iter()
                .filter(|c| c.approved.0.is_zero())
                .collect())
        })
        .await?
    }

    /// Claims of one child that have not been cleared by a reset yet.
    pub async fn list_claims_for_child(&self, child: &str) -> Result<Vec<ChoreClaim>, StorageError> {
        use schema::chore_claims;
        let pool = self.pool.clone();
        let child = child.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<ChoreClaim>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(chore_claims::table
                .filter(chore_claims::child_id.eq(&child))
                .order(chore_claims::claimed_at.desc())
                .select(ChoreClaim::as_select())
                .load(&mut conn)?)
        })
        .await?
    }

    pub async fn submit_claim(
        &self,
        child: &str,
        request: ClaimRequest,
        now: DateTime<Tz>,
    ) -> Result<ChoreClaim, ClaimError> {
        let pool = self.pool.clone();
        let child_id = child.to_string();
        tokio::task::spawn_blocking(move || -> Result<ChoreClaim, ClaimError> {
            let mut conn = pool.get().map_err(StorageError::from)?;
            configure_sqlite_conn(&mut conn)?;
            chores::submit_claim(&mut conn, &child_id, &request, &now)
        })
        .await
        .map_err(StorageError::from)?
    }

    /// Approves a pending claim with `penalty_percent` withheld.
    pub async fn approve_claim(
        &self,
        claim_id: i32,
        penalty_percent: Decimal,
        approver: &str,
    ) -> Result<ClaimOutcome, SettlementError> {
        let pool = self.pool.clone();
        let approver = approver.to_string();
        tokio::task::spawn_blocking(move || -> Result<ClaimOutcome, SettlementError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            settlement::claims::resolve_claim(
                &mut conn,
                claim_id,
                penalty_percent,
                Some(&approver),
                Utc::now().naive_utc(),
            )
        })
        .await?
    }

    pub async fn reject_claim(&self, claim_id: i32, approver: &str) -> Result<bool, SettlementError> {
        let pool = self.pool.clone();
        let approver = approver.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, SettlementError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            settlement::claims::reject_claim(
                &mut conn,
                claim_id,
                Some(&approver),
                Utc::now().naive_utc(),
            )
        })
        .await?
    }

    /// Withdraws a pending claim of `child`. Returns `false` when the claim
    /// was already resolved.
    pub async fn return_claim(&self, claim_id: i32, child: &str) -> Result<bool, SettlementError> {
        let pool = self.pool.clone();
        let child = child.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, SettlementError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            settlement::claims::return_claim(&mut conn, claim_id, &child)
        })
        .await?
    }

    pub async fn list_ledger_for_child(
        &self,
        child: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<PointLog>, StorageError> {
        let pool = self.pool.clone();
        let child = child.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<PointLog>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            ledger::entries_for_child(&mut conn, &child, page, per_page)
        })
        .await?
    }

    /// Posts a manual point change. Returns the new balance.
    pub async fn adjust_points(
        &self,
        child: &str,
        points_change: Decimal,
        reason: &str,
        approver: &str,
    ) -> Result<Decimal, StorageError> {
        if reason.trim().is_empty() {
            return Err(StorageError::InvalidInput("reason must not be empty".into()));
        }
        let pool = self.pool.clone();
        let child = child.to_string();
        let reason = reason.trim().to_string();
        let approver = approver.to_string();
        tokio::task::spawn_blocking(move || -> Result<Decimal, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let balance = conn.immediate_transaction(|conn| {
                ledger::post(
                    conn,
                    &ledger::Entry {
                        approver: Some(&approver),
                        ..ledger::Entry::system(
                            &child,
                            points_change,
                            &reason,
                            Utc::now().naive_utc(),
                        )
                    },
                )
            })?;
            info!(child_id = %child, change = %points_change, %balance, by = %approver, "points adjusted");
            Ok(balance)
        })
        .await?
    }

    /// Returns the new pocket money amount.
    pub async fn adjust_pocket_money(
        &self,
        child: &str,
        amount: Decimal,
    ) -> Result<Decimal, StorageError> {
        let pool = self.pool.clone();
        let child = child.to_string();
        tokio::task::spawn_blocking(move || -> Result<Decimal, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let money = conn
                .immediate_transaction(|conn| ledger::add_pocket_money(conn, &child, amount))?;
            info!(child_id = %child, %amount, pocket_money = %money, "pocket money adjusted");
            Ok(money)
        })
        .await?
    }

    /// Converts points of `child` to pocket money on behalf of `requested_by`.
    /// Returns the new `(points_balance, pocket_money)`.
    pub async fn convert_points(
        &self,
        child: &str,
        requested_by: &str,
    ) -> Result<(Decimal, Decimal), StorageError> {
        let pool = self.pool.clone();
        let child = child.to_string();
        let requested_by = requested_by.to_string();
        tokio::task::spawn_blocking(move || -> Result<(Decimal, Decimal), StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let result = conn.immediate_transaction(|conn| -> Result<_, StorageError> {
                let max_points = required_setting(conn, snapshot::MAX_POINTS)?;
                let point_value = required_setting(conn, snapshot::POINT_VALUE)?;
                ledger::convert_to_pocket_money(
                    conn,
                    &child,
                    max_points,
                    point_value,
                    &requested_by,
                    Utc::now().naive_utc(),
                )
            })?;
            info!(
                child_id = %child,
                balance = %result.0,
                pocket_money = %result.1,
                by = %requested_by,
                "points converted"
            );
            Ok(result)
        })
        .await?
    }

    pub async fn list_settings(&self) -> Result<Vec<Setting>, StorageError> {
        use schema::settings;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<Setting>, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            Ok(settings::table
                .order(settings::key.asc())
                .select(Setting::as_select())
                .load(&mut conn)?)
        })
        .await?
    }

    /// Changes the value of an existing setting.
    pub async fn update_setting(&self, key: &str, value: Decimal) -> Result<Setting, StorageError> {
        use schema::settings;
        let pool = self.pool.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<Setting, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            let updated = diesel::update(settings::table.filter(settings::key.eq(&key)))
                .set(settings::value.eq(DbDecimal(value)))
                .returning(Setting::as_returning())
                .get_result(&mut conn)
                .optional()?;
            let setting = updated.ok_or_else(|| StorageError::NotFound {
                kind: "setting",
                id: key.clone(),
            })?;
            debug!(key = %setting.key, value = %setting.value, "setting updated");
            Ok(setting)
        })
        .await?
    }

    /// Runs the nightly settlement for the local date of `now`.
    ///
    /// Runs never overlap within one process; a second caller waits and then
    /// sees [`settlement::RunStatus::AlreadyRun`].
    pub async fn run_settlement(
        &self,
        job_code: &str,
        now: DateTime<Tz>,
    ) -> Result<SettlementReport, SettlementError> {
        let _guard = self.settlement_lock.lock().await;
        let pool = self.pool.clone();
        let job_code = job_code.to_string();
        trace!(%job_code, %now, "settlement requested");
        tokio::task::spawn_blocking(move || -> Result<SettlementReport, SettlementError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            settlement::settle(&mut conn, &job_code, now)
        })
        .await?
    }

    pub async fn run_recorded(&self, job_code: &str, date: NaiveDate) -> Result<bool, StorageError> {
        let pool = self.pool.clone();
        let job_code = job_code.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.has_run(&job_code, date)
        })
        .await?
    }
}

fn required_setting(conn: &mut SqliteConnection, key: &str) -> Result<Decimal, StorageError> {
    snapshot::read_one(conn, key)?
        .ok_or_else(|| StorageError::InvalidInput(format!("setting {key} is not configured")))
}

fn configure_sqlite_conn(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // Enable WAL for better read/write concurrency and set a busy timeout
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    Ok(())
}
