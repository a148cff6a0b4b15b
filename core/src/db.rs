use std::path::Path;

use chrono::{Local, NaiveDateTime};
use rusqlite::{Connection, params};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    BodyMovementReflection, CustomGoal, GoalReflection, LeaderboardEntry, NewReflection,
    Reflection, ScreenTimeReflection, Task, User, UserIdentity,
};
use crate::week::{WeekWindow, WindowKey};

const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";
const DAY_FORMAT: &str = "%Y-%m-%d";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE,
                    token TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    week_start TEXT NOT NULL,
                    week_end TEXT NOT NULL,
                    week_start_day TEXT NOT NULL,
                    week_end_day TEXT NOT NULL,
                    custom_goals TEXT NOT NULL,
                    screen_time_target REAL,
                    body_movement INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS reflections (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    week_start TEXT NOT NULL,
                    week_end TEXT NOT NULL,
                    week_start_day TEXT NOT NULL,
                    week_end_day TEXT NOT NULL,
                    custom_goal_reflections TEXT NOT NULL,
                    screen_time_reflection TEXT NOT NULL,
                    body_movement_reflection TEXT NOT NULL,
                    completion_percentage INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS leaderboard (
                    user_id INTEGER PRIMARY KEY REFERENCES users(id),
                    name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    score INTEGER NOT NULL DEFAULT 0,
                    last_updated TEXT NOT NULL
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_user_week
                    ON tasks(user_id, week_start_day);
                CREATE INDEX IF NOT EXISTS idx_tasks_user_week_end
                    ON tasks(user_id, week_end_day);
                CREATE UNIQUE INDEX IF NOT EXISTS idx_reflections_user_week
                    ON reflections(user_id, week_start_day);
                CREATE INDEX IF NOT EXISTS idx_reflections_user_week_end
                    ON reflections(user_id, week_end_day);
                CREATE INDEX IF NOT EXISTS idx_leaderboard_score
                    ON leaderboard(score DESC);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn parse_instant(idx: usize, value: &str) -> rusqlite::Result<NaiveDateTime> {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
    }

    fn parse_json<T: DeserializeOwned>(idx: usize, value: &str) -> rusqlite::Result<T> {
        serde_json::from_str(value).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
    }

    fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            uuid: row.get(1)?,
            name: row.get(2)?,
            email: row.get(3)?,
            token: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    // Expects columns:
    // 0: id, 1: uuid, 2: user_id, 3: week_start, 4: week_end,
    // 5: custom_goals, 6: screen_time_target, 7: body_movement,
    // 8: created_at, 9: updated_at
    fn task_from_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
        let week_start: String = row.get(3)?;
        let week_end: String = row.get(4)?;
        let goals_json: String = row.get(5)?;
        Ok(Task {
            id: row.get(0)?,
            uuid: row.get(1)?,
            user_id: row.get(2)?,
            week_start: Self::parse_instant(3, &week_start)?,
            week_end: Self::parse_instant(4, &week_end)?,
            custom_goals: Self::parse_json::<Vec<CustomGoal>>(5, &goals_json)?,
            screen_time_target: row.get(6)?,
            body_movement: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    // Expects columns:
    // 0: id, 1: uuid, 2: user_id, 3: week_start, 4: week_end,
    // 5: custom_goal_reflections, 6: screen_time_reflection,
    // 7: body_movement_reflection, 8: completion_percentage, 9: created_at
    fn reflection_from_row(row: &rusqlite::Row) -> rusqlite::Result<Reflection> {
        let week_start: String = row.get(3)?;
        let week_end: String = row.get(4)?;
        let goals_json: String = row.get(5)?;
        let screen_json: String = row.get(6)?;
        let movement_json: String = row.get(7)?;
        Ok(Reflection {
            id: row.get(0)?,
            uuid: row.get(1)?,
            user_id: row.get(2)?,
            week_start: Self::parse_instant(3, &week_start)?,
            week_end: Self::parse_instant(4, &week_end)?,
            custom_goal_reflections: Self::parse_json::<Vec<GoalReflection>>(5, &goals_json)?,
            screen_time_reflection: Self::parse_json::<ScreenTimeReflection>(6, &screen_json)?,
            body_movement_reflection: Self::parse_json::<BodyMovementReflection>(
                7,
                &movement_json,
            )?,
            completion_percentage: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn leaderboard_from_row(row: &rusqlite::Row) -> rusqlite::Result<LeaderboardEntry> {
        Ok(LeaderboardEntry {
            user_id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            score: row.get(3)?,
            last_updated: row.get(4)?,
        })
    }

    fn is_unique_violation(err: &rusqlite::Error) -> bool {
        matches!(
            err,
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }

    // --- Users ---

    pub fn insert_user(&self, name: &str, email: &str, token: &str) -> Result<User> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let result = self.conn.execute(
            "INSERT INTO users (uuid, name, email, token, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![uuid, name, email, token, now],
        );
        match result {
            Ok(_) => {}
            Err(e) if Self::is_unique_violation(&e) => {
                return Err(Error::validation(format!(
                    "A user with email '{email}' already exists"
                )));
            }
            Err(e) => return Err(e.into()),
        }
        let id = self.conn.last_insert_rowid();
        self.get_user_by_id(id)
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, uuid, name, email, token, created_at FROM users WHERE id = ?1",
                params![id],
                Self::user_from_row,
            )
            .map_err(|_| Error::not_found(format!("User {id} not found")))
    }

    pub fn get_user_by_token(&self, token: &str) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, name, email, token, created_at FROM users WHERE token = ?1",
        )?;
        let mut rows = stmt.query(params![token])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::user_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, name, email, token, created_at FROM users WHERE email = ?1",
        )?;
        let mut rows = stmt.query(params![email])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::user_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, name, email, token, created_at FROM users ORDER BY name",
        )?;
        let users = stmt
            .query_map([], Self::user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn delete_user(&self, email: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM users WHERE email = ?1", params![email])?;
        Ok(rows > 0)
    }

    // --- Window matcher ---

    /// Find the task whose stored week start (or, on the Sunday branch, week
    /// end) falls on the key's calendar day. At most one row can match — the
    /// one-task-per-(user, week) index guarantees it.
    pub fn find_task(&self, user_id: i64, key: WindowKey) -> Result<Option<Task>> {
        let (sql, day) = match key {
            WindowKey::Start(day) => (
                "SELECT id, uuid, user_id, week_start, week_end, custom_goals,
                        screen_time_target, body_movement, created_at, updated_at
                 FROM tasks WHERE user_id = ?1 AND week_start_day = ?2",
                day,
            ),
            WindowKey::End(day) => (
                "SELECT id, uuid, user_id, week_start, week_end, custom_goals,
                        screen_time_target, body_movement, created_at, updated_at
                 FROM tasks WHERE user_id = ?1 AND week_end_day = ?2",
                day,
            ),
        };
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params![user_id, day.format(DAY_FORMAT).to_string()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::task_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// Reflection counterpart of [`find_task`](Self::find_task).
    pub fn find_reflection(&self, user_id: i64, key: WindowKey) -> Result<Option<Reflection>> {
        let (sql, day) = match key {
            WindowKey::Start(day) => (
                "SELECT id, uuid, user_id, week_start, week_end, custom_goal_reflections,
                        screen_time_reflection, body_movement_reflection,
                        completion_percentage, created_at
                 FROM reflections WHERE user_id = ?1 AND week_start_day = ?2",
                day,
            ),
            WindowKey::End(day) => (
                "SELECT id, uuid, user_id, week_start, week_end, custom_goal_reflections,
                        screen_time_reflection, body_movement_reflection,
                        completion_percentage, created_at
                 FROM reflections WHERE user_id = ?1 AND week_end_day = ?2",
                day,
            ),
        };
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params![user_id, day.format(DAY_FORMAT).to_string()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::reflection_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    // --- Tasks ---

    pub fn get_task_by_id(&self, id: i64) -> Result<Task> {
        self.conn
            .query_row(
                "SELECT id, uuid, user_id, week_start, week_end, custom_goals,
                        screen_time_target, body_movement, created_at, updated_at
                 FROM tasks WHERE id = ?1",
                params![id],
                Self::task_from_row,
            )
            .map_err(|_| Error::not_found(format!("Task {id} not found")))
    }

    /// Create or update the task for the given window. Provided fields
    /// replace stored ones; absent fields are left untouched (an explicit
    /// null screen-time target clears it).
    pub fn upsert_task(
        &self,
        user_id: i64,
        window: WeekWindow,
        custom_goals: Option<&[CustomGoal]>,
        screen_time_target: Option<Option<f64>>,
    ) -> Result<Task> {
        let now = Local::now().to_rfc3339();

        if let Some(existing) = self.find_task(user_id, WindowKey::Start(window.start_day()))? {
            if let Some(goals) = custom_goals {
                let goals_json = serde_json::to_string(goals)?;
                self.conn.execute(
                    "UPDATE tasks SET custom_goals = ?1, updated_at = ?2 WHERE id = ?3",
                    params![goals_json, now, existing.id],
                )?;
            }
            if let Some(target) = screen_time_target {
                self.conn.execute(
                    "UPDATE tasks SET screen_time_target = ?1, updated_at = ?2 WHERE id = ?3",
                    params![target, now, existing.id],
                )?;
            }
            return self.get_task_by_id(existing.id);
        }

        let uuid = Uuid::new_v4().to_string();
        let goals = custom_goals.unwrap_or_default();
        let goals_json = serde_json::to_string(goals)?;
        self.conn.execute(
            "INSERT INTO tasks (uuid, user_id, week_start, week_end, week_start_day,
                                week_end_day, custom_goals, screen_time_target,
                                body_movement, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                uuid,
                user_id,
                window.start.format(INSTANT_FORMAT).to_string(),
                window.end.format(INSTANT_FORMAT).to_string(),
                window.start_day().format(DAY_FORMAT).to_string(),
                window.end_day().format(DAY_FORMAT).to_string(),
                goals_json,
                screen_time_target.flatten(),
                false,
                now,
                now,
            ],
        )?;
        self.get_task_by_id(self.conn.last_insert_rowid())
    }

    /// Replace a task's goal list in place (positional goal edits).
    pub fn set_task_goals(&self, task_id: i64, goals: &[CustomGoal]) -> Result<Task> {
        let now = Local::now().to_rfc3339();
        let goals_json = serde_json::to_string(goals)?;
        let rows = self.conn.execute(
            "UPDATE tasks SET custom_goals = ?1, updated_at = ?2 WHERE id = ?3",
            params![goals_json, now, task_id],
        )?;
        if rows == 0 {
            return Err(Error::not_found(format!("Task {task_id} not found")));
        }
        self.get_task_by_id(task_id)
    }

    // --- Reflections & scoring ---

    pub fn get_reflection_by_id(&self, id: i64) -> Result<Reflection> {
        self.conn
            .query_row(
                "SELECT id, uuid, user_id, week_start, week_end, custom_goal_reflections,
                        screen_time_reflection, body_movement_reflection,
                        completion_percentage, created_at
                 FROM reflections WHERE id = ?1",
                params![id],
                Self::reflection_from_row,
            )
            .map_err(|_| Error::not_found(format!("Reflection {id} not found")))
    }

    /// Insert a scored reflection and apply its percentage to the owner's
    /// leaderboard row as one transaction — a store failure commits neither.
    /// A concurrent submission for the same (user, week) loses on the unique
    /// index and surfaces as [`Error::DuplicateSubmission`].
    ///
    /// The leaderboard upsert refreshes the email on every application but
    /// backfills the name only when it was previously empty.
    pub fn insert_reflection_scored(
        &self,
        identity: &UserIdentity,
        window: WeekWindow,
        submission: &NewReflection,
        percentage: i64,
    ) -> Result<(Reflection, i64)> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let goals_json = serde_json::to_string(&submission.custom_goal_reflections)?;
        let screen_json = serde_json::to_string(&submission.screen_time_reflection)?;
        let movement_json = serde_json::to_string(&submission.body_movement_reflection)?;

        let tx = self.conn.unchecked_transaction()?;

        let inserted = tx.execute(
            "INSERT INTO reflections (uuid, user_id, week_start, week_end, week_start_day,
                                      week_end_day, custom_goal_reflections,
                                      screen_time_reflection, body_movement_reflection,
                                      completion_percentage, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                uuid,
                identity.user_id,
                window.start.format(INSTANT_FORMAT).to_string(),
                window.end.format(INSTANT_FORMAT).to_string(),
                window.start_day().format(DAY_FORMAT).to_string(),
                window.end_day().format(DAY_FORMAT).to_string(),
                goals_json,
                screen_json,
                movement_json,
                percentage,
                now,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if Self::is_unique_violation(&e) => return Err(Error::DuplicateSubmission),
            Err(e) => return Err(e.into()),
        }
        let reflection_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO leaderboard (user_id, name, email, score, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                 score = score + excluded.score,
                 email = excluded.email,
                 name = CASE WHEN name = '' THEN excluded.name ELSE name END,
                 last_updated = excluded.last_updated",
            params![identity.user_id, identity.name, identity.email, percentage, now],
        )?;
        let score: i64 = tx.query_row(
            "SELECT score FROM leaderboard WHERE user_id = ?1",
            params![identity.user_id],
            |row| row.get(0),
        )?;

        tx.commit()?;

        let reflection = self.get_reflection_by_id(reflection_id)?;
        Ok((reflection, score))
    }

    // --- Leaderboard ---

    pub fn get_leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, name, email, score, last_updated
             FROM leaderboard ORDER BY score DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], Self::leaderboard_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn get_leaderboard_entry(&self, user_id: i64) -> Result<Option<LeaderboardEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, name, email, score, last_updated
             FROM leaderboard WHERE user_id = ?1",
        )?;
        let mut rows = stmt.query(params![user_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::leaderboard_from_row(row)?))
        } else {
            Ok(None)
        }
    }
}
