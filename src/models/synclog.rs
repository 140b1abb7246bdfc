use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::result::Error;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncType {
    Characters,
    YearlyAppearances,
}

impl SyncType {
    pub const CHARACTERS_ID: i16 = 1;
    pub const YEARLY_APPEARANCES_ID: i16 = 2;

    pub fn id(self) -> i16 {
        match self {
            SyncType::Characters => SyncType::CHARACTERS_ID,
            SyncType::YearlyAppearances => SyncType::YEARLY_APPEARANCES_ID,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    Pending,
    InProgress,
    Fail,
    Success,
}

impl SyncStatus {
    pub const PENDING_ID: i16 = 1;
    pub const IN_PROGRESS_ID: i16 = 2;
    pub const FAIL_ID: i16 = 3;
    pub const SUCCESS_ID: i16 = 4;

    pub fn from_id(id: i16) -> Option<SyncStatus> {
        match id {
            SyncStatus::PENDING_ID => Some(SyncStatus::Pending),
            SyncStatus::IN_PROGRESS_ID => Some(SyncStatus::InProgress),
            SyncStatus::FAIL_ID => Some(SyncStatus::Fail),
            SyncStatus::SUCCESS_ID => Some(SyncStatus::Success),
            _ => None,
        }
    }

    pub fn id(self) -> i16 {
        match self {
            SyncStatus::Pending => SyncStatus::PENDING_ID,
            SyncStatus::InProgress => SyncStatus::IN_PROGRESS_ID,
            SyncStatus::Fail => SyncStatus::FAIL_ID,
            SyncStatus::Success => SyncStatus::SUCCESS_ID,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::InProgress => "in progress",
            SyncStatus::Fail => "fail",
            SyncStatus::Success => "success",
        }
    }

    /// Statuses a log can still move out of. The interrupt guard fails
    /// exactly these; fail and success are never rewritten.
    pub const NON_TERMINAL_IDS: [i16; 2] =
        [SyncStatus::PENDING_ID, SyncStatus::IN_PROGRESS_ID];

    pub fn is_terminal(self) -> bool {
        matches!(self, SyncStatus::Fail | SyncStatus::Success)
    }
}

/// The audit record of one character in one import run.
///
/// A log is created pending before any work starts, and every log of a
/// run ends up fail or success, even when the run is interrupted.
#[derive(Debug, Queryable)]
pub struct SyncLog {
    pub id: i32,
    pub status: i16,
    pub message: String,
    pub synced_at: Option<DateTime<Utc>>,
}

impl SyncLog {
    /// Create a pending log for a character.
    ///
    /// Unlike the transitions below, failure here is escalated: without
    /// a log there is no audit trail to mark failed later.
    pub async fn create(
        character_id: i32,
        kind: SyncType,
        db: &mut AsyncPgConnection,
    ) -> Result<SyncLog, Error> {
        use crate::schema::character_sync_logs::dsl as l;
        diesel::insert_into(l::character_sync_logs)
            .values((
                l::character_id.eq(character_id),
                l::sync_type.eq(kind.id()),
                l::status.eq(SyncStatus::Pending.id()),
                l::message.eq(""),
                l::created_at.eq(Utc::now()),
            ))
            .returning((l::id, l::status, l::message, l::synced_at))
            .get_result(db)
            .await
    }

    pub async fn start(&mut self, db: &mut AsyncPgConnection) {
        self.set_status(SyncStatus::InProgress, db).await;
    }

    pub async fn succeed(&mut self, count: i64, db: &mut AsyncPgConnection) {
        self.message = count.to_string();
        self.synced_at = Some(Utc::now());
        self.set_status(SyncStatus::Success, db).await;
    }

    pub async fn fail(&mut self, message: &str, db: &mut AsyncPgConnection) {
        self.message = message.to_string();
        self.set_status(SyncStatus::Fail, db).await;
    }

    /// Persist a transition, best-effort.
    ///
    /// The log is diagnostic, not authoritative data, so a persistence
    /// error here must not take an import run down with it.
    async fn set_status(&mut self, status: SyncStatus, db: &mut AsyncPgConnection) {
        use crate::schema::character_sync_logs::dsl as l;
        self.status = status.id();
        let result = diesel::update(l::character_sync_logs.find(self.id))
            .set((
                l::status.eq(self.status),
                l::message.eq(&self.message),
                l::synced_at.eq(self.synced_at),
            ))
            .execute(db)
            .await;
        if let Err(err) = result {
            warn!("Failed to persist sync log {} transition: {}", self.id, err);
        }
    }

    /// Mark every non-terminal log of a batch fail.
    ///
    /// Used by the interrupt handler, so an operator abort never leaves
    /// a character stuck pending or in progress.
    pub async fn fail_unfinished(
        ids: &[i32],
        message: &str,
        db: &mut AsyncPgConnection,
    ) -> Result<usize, Error> {
        use crate::schema::character_sync_logs::dsl as l;
        diesel::update(
            l::character_sync_logs
                .filter(l::id.eq_any(ids))
                .filter(l::status.eq_any(SyncStatus::NON_TERMINAL_IDS)),
        )
        .set((l::status.eq(SyncStatus::Fail.id()), l::message.eq(message)))
        .execute(db)
        .await
    }

    /// The latest log for a character, for the listing command.
    pub async fn latest_for(
        character_id: i32,
        db: &mut AsyncPgConnection,
    ) -> Result<Option<SyncLog>, Error> {
        use crate::schema::character_sync_logs::dsl as l;
        l::character_sync_logs
            .filter(l::character_id.eq(character_id))
            .order(l::created_at.desc())
            .select((l::id, l::status, l::message, l::synced_at))
            .first(db)
            .await
            .optional()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_status_is_terminal_or_guarded() {
        // The interrupt guard rewrites exactly the non-terminal
        // statuses, so a finished log is never overwritten and an
        // unfinished one is never left behind.
        for id in 1..=4 {
            let status = SyncStatus::from_id(id).unwrap();
            assert_eq!(
                status.is_terminal(),
                !SyncStatus::NON_TERMINAL_IDS.contains(&id),
                "status {:?} misclassified",
                status,
            );
        }
    }
}
