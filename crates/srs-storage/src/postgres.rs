//! PostgreSQL-backed result store.

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use srs_core::{
    CoopResult, Mode, Player, Rule, Scale, ScheduleDraft, ScheduleKey, Species, TextColor,
    UploaderStats, Wave, ENEMY_SLOTS,
};

use crate::error::{StoreError, StoreResult};
use crate::model::{
    count_from_db, count_to_db, tally_from_db, tally_to_db, EnemyTotals, GradeRecord, JobTotals,
    OutcomeBucket, ScenarioCodeFilter, ScenarioCodeSummary, ScenarioWave, StoredResult,
    StoredSchedule, UploaderPatch, UpsertOutcome, UpsertPlan, UpsertStatus, DB_UNKNOWN,
};
use crate::repos::{ResultRepo, ScheduleRepo, StatsRepo};
use crate::store::ResultStore;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        let mut opts = PgConnectOptions::from_str(url)?;
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{timeout_ms}ms"))]);
            tracing::info!(timeout_ms, "PostgreSQL statement_timeout set");
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(opts)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn decode_err(err: srs_core::UnknownVariant) -> StoreError {
    StoreError::Database(sqlx::Error::Decode(Box::new(err)))
}

fn small_to_u8(value: i16) -> u8 {
    u8::try_from(value).unwrap_or(0)
}

fn schedule_from_row(row: &PgRow) -> StoreResult<ScheduleKey> {
    let mode: String = row.try_get("mode")?;
    let rule: String = row.try_get("rule")?;
    Ok(ScheduleKey {
        stage_id: row.try_get("stage_id")?,
        weapon_list: row.try_get("weapon_list")?,
        mode: Mode::from_str(&mode).map_err(decode_err)?,
        rule: Rule::from_str(&rule).map_err(decode_err)?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
    })
}

async fn find_or_create_schedule_in(
    conn: &mut PgConnection,
    key: &ScheduleKey,
) -> StoreResult<i64> {
    let inserted: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO schedules (stage_id, weapon_list, mode, rule, start_time, end_time)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (stage_id, weapon_list, mode, rule, start_time, end_time) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(key.stage_id)
    .bind(&key.weapon_list)
    .bind(key.mode.as_str())
    .bind(key.rule.as_str())
    .bind(key.start_time)
    .bind(key.end_time)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        return Ok(id);
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        SELECT id FROM schedules
        WHERE stage_id = $1 AND weapon_list = $2 AND mode = $3 AND rule = $4
          AND start_time = $5 AND end_time = $6
        "#,
    )
    .bind(key.stage_id)
    .bind(&key.weapon_list)
    .bind(key.mode.as_str())
    .bind(key.rule.as_str())
    .bind(key.start_time)
    .bind(key.end_time)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

/// Returns `None` when another writer inserted the same match id first.
async fn insert_result(
    conn: &mut PgConnection,
    schedule_id: i64,
    result: &CoopResult,
) -> StoreResult<Option<i64>> {
    let boss_counts: Vec<i32> = result.boss_counts.iter().map(|c| count_to_db(*c)).collect();
    let boss_kill_counts: Vec<i32> = result
        .boss_kill_counts
        .iter()
        .map(|c| count_to_db(*c))
        .collect();

    let id: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO results (
            match_id, schedule_id, played_time, danger_rate, ikura_num, golden_ikura_num,
            golden_ikura_assist_num, boss_counts, boss_kill_counts, night_less, is_clear,
            failure_wave, is_boss_defeated, boss_id, scenario_code, members
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ON CONFLICT (match_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&result.match_id)
    .bind(schedule_id)
    .bind(result.played_time)
    .bind(result.danger_rate)
    .bind(count_to_db(result.ikura_num))
    .bind(count_to_db(result.golden_ikura_num))
    .bind(count_to_db(result.golden_ikura_assist_num))
    .bind(boss_counts)
    .bind(boss_kill_counts)
    .bind(result.night_less)
    .bind(result.is_clear)
    .bind(result.failure_wave.map(i16::from))
    .bind(result.is_boss_defeated)
    .bind(result.boss_id)
    .bind(&result.scenario_code)
    .bind(&result.members)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(id)
}

async fn insert_wave(conn: &mut PgConnection, result_id: i64, wave: &Wave) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO waves (
            result_id, wave_id, water_level, event_type, golden_ikura_num,
            golden_ikura_pop_num, quota_num, is_clear, special_usage
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(result_id)
    .bind(i16::from(wave.wave_number))
    .bind(i16::from(wave.water_level))
    .bind(i16::from(wave.event_type))
    .bind(wave.golden_ikura_num.map(count_to_db))
    .bind(count_to_db(wave.golden_ikura_pop_num))
    .bind(wave.quota_num.map(count_to_db))
    .bind(wave.is_clear)
    .bind(&wave.special_usage)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_player(conn: &mut PgConnection, result_id: i64, player: &Player) -> StoreResult<()> {
    let badges: Vec<i32> = player
        .badges
        .iter()
        .map(|b| b.unwrap_or(DB_UNKNOWN))
        .collect();
    let special_counts: Vec<i32> = player.special_counts.iter().map(|c| count_to_db(*c)).collect();
    let stats = &player.stats;

    sqlx::query(
        r#"
        INSERT INTO players (
            result_id, pid, is_myself, name, byname, name_id, badges, nameplate, text_color,
            uniform, species, weapon_list, special_id, special_counts, rescue_count,
            rescued_count, ikura_num, golden_ikura_num, golden_ikura_assist_num,
            defeat_enemy_count, boss_kill_counts, job_bonus, job_score, job_rate, kuma_point,
            grade_id, grade_point, smell_meter, gold_scale, silver_scale, bronze_scale
        )
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
            $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31
        )
        "#,
    )
    .bind(result_id)
    .bind(&player.pid)
    .bind(player.is_myself)
    .bind(&player.name)
    .bind(&player.byname)
    .bind(&player.name_id)
    .bind(badges)
    .bind(player.nameplate)
    .bind(player.text_color.to_rgba().to_vec())
    .bind(player.uniform)
    .bind(player.species.as_str())
    .bind(&player.weapon_list)
    .bind(player.special_id)
    .bind(special_counts)
    .bind(count_to_db(player.rescue_count))
    .bind(count_to_db(player.rescued_count))
    .bind(count_to_db(player.ikura_num))
    .bind(count_to_db(player.golden_ikura_num))
    .bind(count_to_db(player.golden_ikura_assist_num))
    .bind(count_to_db(player.defeat_enemy_count))
    .bind(tally_to_db(&player.boss_kill_counts))
    .bind(stats.job_bonus.map(count_to_db))
    .bind(stats.job_score.map(count_to_db))
    .bind(stats.job_rate)
    .bind(stats.kuma_point.map(count_to_db))
    .bind(stats.grade_id)
    .bind(stats.grade_point.map(count_to_db))
    .bind(stats.smell_meter.map(count_to_db))
    .bind(stats.scale.gold.map(count_to_db))
    .bind(stats.scale.silver.map(count_to_db))
    .bind(stats.scale.bronze.map(count_to_db))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn apply_patch(
    conn: &mut PgConnection,
    result_id: i64,
    match_id: &str,
    patch: &UploaderPatch,
) -> StoreResult<()> {
    let updated = sqlx::query(
        r#"
        UPDATE players
        SET boss_kill_counts = $3, grade_id = $4, grade_point = $5, job_bonus = $6,
            job_rate = $7, job_score = $8, kuma_point = $9, smell_meter = $10
        WHERE result_id = $1 AND pid = $2
        "#,
    )
    .bind(result_id)
    .bind(&patch.pid)
    .bind(tally_to_db(&patch.boss_kill_counts))
    .bind(patch.grade_id)
    .bind(patch.grade_point.map(count_to_db))
    .bind(patch.job_bonus.map(count_to_db))
    .bind(patch.job_rate)
    .bind(patch.job_score.map(count_to_db))
    .bind(patch.kuma_point.map(count_to_db))
    .bind(patch.smell_meter.map(count_to_db))
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!(
            "player {} in match {match_id}",
            patch.pid
        )));
    }
    Ok(())
}

async fn upsert_in(conn: &mut PgConnection, plan: &UpsertPlan) -> StoreResult<UpsertOutcome> {
    let result = &plan.create.result;
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM results WHERE match_id = $1")
        .bind(&result.match_id)
        .fetch_optional(&mut *conn)
        .await?;

    let sequence_id = match existing {
        Some(id) => id,
        None => {
            let schedule_id = find_or_create_schedule_in(&mut *conn, &plan.create.schedule).await?;
            match insert_result(&mut *conn, schedule_id, result).await? {
                Some(id) => {
                    for wave in &result.waves {
                        insert_wave(&mut *conn, id, wave).await?;
                    }
                    for player in &result.players {
                        insert_player(&mut *conn, id, player).await?;
                    }
                    return Ok(UpsertOutcome {
                        match_id: result.match_id.clone(),
                        sequence_id: id,
                        status: UpsertStatus::Created,
                    });
                }
                None => {
                    sqlx::query_scalar::<_, i64>("SELECT id FROM results WHERE match_id = $1")
                        .bind(&result.match_id)
                        .fetch_one(&mut *conn)
                        .await?
                }
            }
        }
    };

    apply_patch(&mut *conn, sequence_id, &result.match_id, &plan.on_conflict).await?;
    Ok(UpsertOutcome {
        match_id: result.match_id.clone(),
        sequence_id,
        status: UpsertStatus::Updated,
    })
}

fn wave_from_row(row: &PgRow) -> StoreResult<Wave> {
    let golden_ikura_num: Option<i32> = row.try_get("golden_ikura_num")?;
    let quota_num: Option<i32> = row.try_get("quota_num")?;
    Ok(Wave {
        wave_number: small_to_u8(row.try_get("wave_id")?),
        water_level: small_to_u8(row.try_get("water_level")?),
        event_type: small_to_u8(row.try_get("event_type")?),
        golden_ikura_num: golden_ikura_num.map(count_from_db),
        golden_ikura_pop_num: count_from_db(row.try_get("golden_ikura_pop_num")?),
        quota_num: quota_num.map(count_from_db),
        is_clear: row.try_get("is_clear")?,
        special_usage: row.try_get("special_usage")?,
    })
}

fn player_from_row(row: &PgRow) -> StoreResult<Player> {
    let badges: Vec<i32> = row.try_get("badges")?;
    let text_color: Vec<f64> = row.try_get("text_color")?;
    let species: String = row.try_get("species")?;
    let special_counts: Vec<i32> = row.try_get("special_counts")?;
    let boss_kill_counts: Vec<i32> = row.try_get("boss_kill_counts")?;
    let opt = |column: &str| -> StoreResult<Option<u32>> {
        let value: Option<i32> = row.try_get(column)?;
        Ok(value.map(count_from_db))
    };

    let mut badge_slots = [None; 3];
    for (slot, badge) in badge_slots.iter_mut().zip(&badges) {
        *slot = (*badge != DB_UNKNOWN).then_some(*badge);
    }
    let channel = |idx: usize| text_color.get(idx).copied().unwrap_or(0.0);

    Ok(Player {
        pid: row.try_get("pid")?,
        is_myself: row.try_get("is_myself")?,
        name: row.try_get("name")?,
        byname: row.try_get("byname")?,
        name_id: row.try_get("name_id")?,
        badges: badge_slots,
        nameplate: row.try_get("nameplate")?,
        text_color: TextColor {
            r: channel(0),
            g: channel(1),
            b: channel(2),
            a: channel(3),
        },
        uniform: row.try_get("uniform")?,
        species: Species::from_str(&species).map_err(decode_err)?,
        weapon_list: row.try_get("weapon_list")?,
        special_id: row.try_get("special_id")?,
        special_counts: special_counts.into_iter().map(count_from_db).collect(),
        rescue_count: count_from_db(row.try_get("rescue_count")?),
        rescued_count: count_from_db(row.try_get("rescued_count")?),
        ikura_num: count_from_db(row.try_get("ikura_num")?),
        golden_ikura_num: count_from_db(row.try_get("golden_ikura_num")?),
        golden_ikura_assist_num: count_from_db(row.try_get("golden_ikura_assist_num")?),
        defeat_enemy_count: count_from_db(row.try_get("defeat_enemy_count")?),
        boss_kill_counts: tally_from_db(&boss_kill_counts),
        stats: UploaderStats {
            job_bonus: opt("job_bonus")?,
            job_score: opt("job_score")?,
            job_rate: row.try_get("job_rate")?,
            kuma_point: opt("kuma_point")?,
            grade_id: row.try_get("grade_id")?,
            grade_point: opt("grade_point")?,
            smell_meter: opt("smell_meter")?,
            scale: Scale {
                gold: opt("gold_scale")?,
                silver: opt("silver_scale")?,
                bronze: opt("bronze_scale")?,
            },
        },
    })
}

fn slot_array(values: Vec<i32>) -> [u32; ENEMY_SLOTS] {
    let mut out = [0; ENEMY_SLOTS];
    for (slot, value) in out.iter_mut().zip(values) {
        *slot = count_from_db(value);
    }
    out
}

#[async_trait]
impl ScheduleRepo for PgResultStore {
    async fn find_or_create_schedule(&self, key: &ScheduleKey) -> StoreResult<i64> {
        let mut conn = self.pool.acquire().await?;
        find_or_create_schedule_in(&mut conn, key).await
    }

    async fn get_schedule(&self, schedule_id: i64) -> StoreResult<Option<StoredSchedule>> {
        let row = sqlx::query(
            "SELECT id, stage_id, weapon_list, mode, rule, start_time, end_time FROM schedules WHERE id = $1",
        )
        .bind(schedule_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(StoredSchedule {
                id: row.try_get("id")?,
                key: schedule_from_row(&row)?,
            })
        })
        .transpose()
    }

    async fn list_schedules(&self, limit: usize) -> StoreResult<Vec<StoredSchedule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, stage_id, weapon_list, mode, rule, start_time, end_time
            FROM schedules
            ORDER BY start_time DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(StoredSchedule {
                    id: row.try_get("id")?,
                    key: schedule_from_row(row)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ResultRepo for PgResultStore {
    async fn upsert_result(&self, plan: &UpsertPlan) -> StoreResult<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = upsert_in(&mut tx, plan).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn upsert_results_atomic(&self, plans: &[UpsertPlan]) -> StoreResult<Vec<UpsertOutcome>> {
        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(plans.len());
        for plan in plans {
            outcomes.push(upsert_in(&mut tx, plan).await?);
        }
        tx.commit().await?;
        Ok(outcomes)
    }

    async fn get_result(&self, match_id: &str) -> StoreResult<Option<StoredResult>> {
        let Some(row) = sqlx::query(
            r#"
            SELECT r.*, s.stage_id, s.weapon_list, s.mode, s.rule, s.start_time, s.end_time
            FROM results r
            JOIN schedules s ON s.id = r.schedule_id
            WHERE r.match_id = $1
            "#,
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let sequence_id: i64 = row.try_get("id")?;
        let schedule = schedule_from_row(&row)?;

        let waves = sqlx::query("SELECT * FROM waves WHERE result_id = $1 ORDER BY wave_id")
            .bind(sequence_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(wave_from_row)
            .collect::<StoreResult<Vec<_>>>()?;

        let players = sqlx::query(
            "SELECT * FROM players WHERE result_id = $1 ORDER BY is_myself DESC, pid",
        )
        .bind(sequence_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(player_from_row)
        .collect::<StoreResult<Vec<_>>>()?;

        let failure_wave: Option<i16> = row.try_get("failure_wave")?;
        let result = CoopResult {
            match_id: row.try_get("match_id")?,
            played_time: row.try_get("played_time")?,
            danger_rate: row.try_get("danger_rate")?,
            ikura_num: count_from_db(row.try_get("ikura_num")?),
            golden_ikura_num: count_from_db(row.try_get("golden_ikura_num")?),
            golden_ikura_assist_num: count_from_db(row.try_get("golden_ikura_assist_num")?),
            boss_counts: slot_array(row.try_get("boss_counts")?),
            boss_kill_counts: slot_array(row.try_get("boss_kill_counts")?),
            night_less: row.try_get("night_less")?,
            is_clear: row.try_get("is_clear")?,
            failure_wave: failure_wave.map(small_to_u8),
            is_boss_defeated: row.try_get("is_boss_defeated")?,
            boss_id: row.try_get("boss_id")?,
            scenario_code: row.try_get("scenario_code")?,
            schedule: ScheduleDraft {
                stage_id: schedule.stage_id,
                weapon_list: schedule.weapon_list,
                mode: schedule.mode,
                rule: schedule.rule,
                start_time: Some(schedule.start_time),
                end_time: Some(schedule.end_time),
            },
            waves,
            players,
            members: row.try_get("members")?,
        };

        Ok(Some(StoredResult {
            sequence_id,
            schedule_id: row.try_get("schedule_id")?,
            result,
        }))
    }

    async fn list_scenario_codes(
        &self,
        filter: &ScenarioCodeFilter,
    ) -> StoreResult<Vec<ScenarioCodeSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM (
                SELECT DISTINCT ON (r.scenario_code)
                    r.id, r.scenario_code, r.danger_rate, r.night_less, r.is_boss_defeated,
                    s.stage_id, s.weapon_list, s.mode, s.rule
                FROM results r
                JOIN schedules s ON s.id = r.schedule_id
                WHERE r.scenario_code IS NOT NULL
                  AND ($1::DOUBLE PRECISION IS NULL OR r.danger_rate >= $1)
                  AND ($2::BOOLEAN IS NULL OR (r.is_boss_defeated IS NOT NULL) = $2)
                  AND ($3::TEXT IS NULL OR s.mode = $3)
                  AND ($4::TEXT IS NULL OR s.rule = $4)
                  AND ($5::INTEGER IS NULL OR s.stage_id = $5)
                  AND s.weapon_list @> $6::INTEGER[]
                ORDER BY r.scenario_code, r.danger_rate DESC, r.id
            ) codes
            ORDER BY danger_rate DESC, scenario_code
            OFFSET $7 LIMIT $8
            "#,
        )
        .bind(filter.min_danger_rate)
        .bind(filter.has_extra_wave)
        .bind(filter.mode.map(|m| m.as_str()))
        .bind(filter.rule.map(|r| r.as_str()))
        .bind(filter.stage_id)
        .bind(&filter.weapons)
        .bind(i64::try_from(filter.offset).unwrap_or(i64::MAX))
        .bind(i64::try_from(filter.effective_limit()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = rows
            .iter()
            .map(|row| row.try_get("id"))
            .collect::<Result<_, _>>()?;
        let mut waves_by_result: HashMap<i64, Vec<ScenarioWave>> = HashMap::new();
        let wave_rows = sqlx::query(
            r#"
            SELECT result_id, water_level, event_type FROM waves
            WHERE result_id = ANY($1)
            ORDER BY result_id, wave_id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        for row in &wave_rows {
            waves_by_result
                .entry(row.try_get("result_id")?)
                .or_default()
                .push(ScenarioWave {
                    water_level: small_to_u8(row.try_get("water_level")?),
                    event_type: small_to_u8(row.try_get("event_type")?),
                });
        }

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id")?;
                let mode: String = row.try_get("mode")?;
                let rule: String = row.try_get("rule")?;
                let is_boss_defeated: Option<bool> = row.try_get("is_boss_defeated")?;
                Ok(ScenarioCodeSummary {
                    scenario_code: row.try_get("scenario_code")?,
                    stage_id: row.try_get("stage_id")?,
                    weapon_list: row.try_get("weapon_list")?,
                    danger_rate: row.try_get("danger_rate")?,
                    night_less: row.try_get("night_less")?,
                    has_extra_wave: is_boss_defeated.is_some(),
                    mode: Mode::from_str(&mode).map_err(decode_err)?,
                    rule: Rule::from_str(&rule).map_err(decode_err)?,
                    waves: waves_by_result.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl StatsRepo for PgResultStore {
    async fn outcome_buckets(&self, schedule_id: i64) -> StoreResult<Vec<OutcomeBucket>> {
        let rows = sqlx::query(
            r#"
            SELECT failure_wave, is_boss_defeated, COUNT(*) AS count
            FROM results
            WHERE schedule_id = $1
            GROUP BY failure_wave, is_boss_defeated
            ORDER BY failure_wave NULLS FIRST, is_boss_defeated NULLS FIRST
            "#,
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let failure_wave: Option<i16> = row.try_get("failure_wave")?;
                let count: i64 = row.try_get("count")?;
                Ok(OutcomeBucket {
                    failure_wave: failure_wave.map(small_to_u8),
                    is_boss_defeated: row.try_get("is_boss_defeated")?,
                    count: u64::try_from(count).unwrap_or(0),
                })
            })
            .collect()
    }

    async fn enemy_totals(&self, schedule_id: i64) -> StoreResult<EnemyTotals> {
        let rows = sqlx::query(
            r#"
            SELECT t.slot, SUM(t.appearances)::BIGINT AS appearances, SUM(t.kills)::BIGINT AS kills
            FROM results r,
                 unnest(r.boss_counts, r.boss_kill_counts) WITH ORDINALITY AS t(appearances, kills, slot)
            WHERE r.schedule_id = $1
            GROUP BY t.slot
            ORDER BY t.slot
            "#,
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        let mut totals = EnemyTotals::default();
        for row in &rows {
            let slot: i64 = row.try_get("slot")?;
            let Some(idx) = usize::try_from(slot - 1).ok().filter(|idx| *idx < ENEMY_SLOTS) else {
                continue;
            };
            let appearances: i64 = row.try_get("appearances")?;
            let kills: i64 = row.try_get("kills")?;
            totals.appearances[idx] = u64::try_from(appearances).unwrap_or(0);
            totals.team_kills[idx] = u64::try_from(kills).unwrap_or(0);
        }
        Ok(totals)
    }

    async fn job_totals(&self, schedule_id: i64) -> StoreResult<JobTotals> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS shifts,
                COUNT(*) FILTER (WHERE is_clear) AS clears,
                COALESCE(SUM(ikura_num), 0)::BIGINT AS ikura_num,
                COALESCE(SUM(golden_ikura_num), 0)::BIGINT AS golden_ikura_num,
                COALESCE(SUM(golden_ikura_assist_num), 0)::BIGINT AS golden_ikura_assist_num,
                COUNT(*) FILTER (WHERE is_boss_defeated IS NOT NULL) AS boss_appearances,
                COUNT(*) FILTER (WHERE is_boss_defeated) AS boss_defeats
            FROM results
            WHERE schedule_id = $1
            "#,
        )
        .bind(schedule_id)
        .fetch_one(&self.pool)
        .await?;

        let get = |column: &str| -> StoreResult<u64> {
            let value: i64 = row.try_get(column)?;
            Ok(u64::try_from(value).unwrap_or(0))
        };
        Ok(JobTotals {
            shifts: get("shifts")?,
            clears: get("clears")?,
            ikura_num: get("ikura_num")?,
            golden_ikura_num: get("golden_ikura_num")?,
            golden_ikura_assist_num: get("golden_ikura_assist_num")?,
            boss_appearances: get("boss_appearances")?,
            boss_defeats: get("boss_defeats")?,
        })
    }

    async fn best_grades(&self, schedule_id: i64, limit: usize) -> StoreResult<Vec<GradeRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT pid, name, grade_id, grade_point FROM (
                SELECT DISTINCT ON (p.pid)
                    p.pid, p.name, p.grade_id, COALESCE(p.grade_point, 0) AS grade_point
                FROM players p
                JOIN results r ON r.id = p.result_id
                WHERE r.schedule_id = $1 AND p.grade_id IS NOT NULL
                ORDER BY p.pid, p.grade_id DESC, COALESCE(p.grade_point, 0) DESC, r.id
            ) best
            ORDER BY grade_id DESC, grade_point DESC, pid
            LIMIT $2
            "#,
        )
        .bind(schedule_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(GradeRecord {
                    pid: row.try_get("pid")?,
                    name: row.try_get("name")?,
                    grade_id: row.try_get("grade_id")?,
                    grade_point: count_from_db(row.try_get("grade_point")?),
                })
            })
            .collect()
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn migrate(&self) -> StoreResult<()> {
        MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
