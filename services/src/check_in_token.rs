use chrono::{DateTime, Duration, Utc};
use common::config::{Config, MAX_TOKEN_MINUTES, MIN_TOKEN_MINUTES};
use db::models::{check_in_token, course};
use log::{info, warn};
use sea_orm::{ConnectionTrait, EntityTrait, TransactionTrait};
use serde::Serialize;
use validator::Validate;

use crate::clock::Clock;
use crate::error::{AppError, AppResult, RejectReason};

pub use db::models::check_in_token::Model as CheckInToken;

#[derive(Debug, Clone, Validate)]
pub struct CreateCheckInToken {
    pub course_id: i64,
    #[validate(length(min = 1, message = "course name cannot be empty"))]
    pub course_name: String,
    #[validate(range(
        min = MIN_TOKEN_MINUTES,
        max = MAX_TOKEN_MINUTES,
        message = "duration must be between 5 and 180 minutes"
    ))]
    pub duration_minutes: i64,
}

impl CreateCheckInToken {
    /// Uses the configured default lifetime.
    pub fn with_default_duration(course_id: i64, course_name: &str, config: &Config) -> Self {
        Self {
            course_id,
            course_name: course_name.to_owned(),
            duration_minutes: config.default_token_minutes,
        }
    }
}

/// A token annotated with whether it was still live when the history was read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenHistoryEntry {
    #[serde(flatten)]
    pub token: CheckInToken,
    pub active: bool,
}

pub struct CheckInTokenService;

impl CheckInTokenService {
    /// Expiry depends only on `expires_at` and `now`.
    pub fn is_expired(token: &CheckInToken, now: DateTime<Utc>) -> bool {
        now >= token.expires_at
    }

    /// Time left for a client-side countdown, floored at zero.
    pub fn remaining(token: &CheckInToken, now: DateTime<Utc>) -> Duration {
        (token.expires_at - now).max(Duration::zero())
    }

    /// Mints a token for the course, valid for `duration_minutes` from the clock's now.
    ///
    /// Fails with `Conflict` while another token for the course is still live.
    /// The live-token check and the insert share one transaction.
    pub async fn create_token<C>(
        db: &C,
        clock: &dyn Clock,
        params: CreateCheckInToken,
    ) -> AppResult<CheckInToken>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        params.validate()?;
        let now = clock.now();
        let txn = db.begin().await?;

        if course::Entity::find_by_id(params.course_id)
            .one(&txn)
            .await?
            .is_none()
        {
            return Err(AppError::not_found("course", params.course_id));
        }

        if let Some(active) = Self::get_active_token(&txn, params.course_id, now).await? {
            warn!(
                "refusing new token for course {}: token {} live until {}",
                params.course_id, active.id, active.expires_at
            );
            return Err(AppError::Conflict(format!(
                "course {} already has an active check-in token",
                params.course_id
            )));
        }

        let token = check_in_token::Model::create(
            &txn,
            params.course_id,
            &params.course_name,
            now,
            params.duration_minutes,
        )
        .await?;
        txn.commit().await?;

        info!(
            "issued check-in token {} for course {} ({} min)",
            token.id, token.course_id, params.duration_minutes
        );
        Ok(token)
    }

    /// Newest token for the course that is unexpired at `now`.
    pub async fn get_active_token<C>(
        db: &C,
        course_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<CheckInToken>>
    where
        C: ConnectionTrait,
    {
        Ok(check_in_token::Model::latest_live(db, course_id, now).await?)
    }

    pub async fn list_history<C>(
        db: &C,
        course_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<TokenHistoryEntry>>
    where
        C: ConnectionTrait,
    {
        let tokens = check_in_token::Model::all_for_course(db, course_id).await?;
        Ok(tokens
            .into_iter()
            .map(|token| {
                let active = !Self::is_expired(&token, now);
                TokenHistoryEntry { token, active }
            })
            .collect())
    }

    /// Looks up a scanned QR code and checks it is still live at `now`.
    pub async fn validate_code<C>(
        db: &C,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<CheckInToken>
    where
        C: ConnectionTrait,
    {
        let token = check_in_token::Model::find_by_code(db, code.trim())
            .await?
            .ok_or(AppError::CheckInRejected(RejectReason::TokenNotFound))?;

        if Self::is_expired(&token, now) {
            return Err(AppError::CheckInRejected(RejectReason::TokenExpired));
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::test_fixtures::{at, seed};
    use db::test_utils::setup_test_db;

    fn params(course_id: i64, minutes: i64) -> CreateCheckInToken {
        CreateCheckInToken {
            course_id,
            course_name: "Algorithms".into(),
            duration_minutes: minutes,
        }
    }

    #[tokio::test]
    async fn token_expires_after_its_duration() {
        let db = setup_test_db().await;
        let seeded = seed(&db).await;
        let clock = FixedClock::new(at(9, 0));

        let token = CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, 15))
            .await
            .unwrap();
        assert_eq!(token.expires_at, at(9, 15));
        assert_eq!(token.course_name, "Algorithms");
        assert_eq!(token.code.len(), check_in_token::CODE_LENGTH);

        let active = CheckInTokenService::get_active_token(&db, seeded.course.id, at(9, 10))
            .await
            .unwrap();
        assert_eq!(active.map(|t| t.id), Some(token.id));

        assert!(CheckInTokenService::is_expired(&token, at(9, 16)));
        assert!(CheckInTokenService::is_expired(&token, at(9, 15)));
        assert!(
            CheckInTokenService::get_active_token(&db, seeded.course.id, at(9, 16))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn duration_out_of_range_is_rejected() {
        let db = setup_test_db().await;
        let seeded = seed(&db).await;
        let clock = FixedClock::new(at(9, 0));

        for minutes in [4, 200] {
            let err = CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, minutes))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{minutes}: {err}");
        }
        for minutes in [5, 180] {
            clock.advance(Duration::minutes(181));
            CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, minutes))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn second_live_token_conflicts() {
        let db = setup_test_db().await;
        let seeded = seed(&db).await;
        let clock = FixedClock::new(at(9, 0));

        CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, 15))
            .await
            .unwrap();
        clock.advance(Duration::minutes(5));
        let err = CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, 15))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        clock.advance(Duration::minutes(11));
        CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, 15))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn active_lookup_skips_expired_history() {
        let db = setup_test_db().await;
        let seeded = seed(&db).await;
        let clock = FixedClock::new(at(7, 0));

        for _ in 0..4 {
            CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, 5))
                .await
                .unwrap();
            clock.advance(Duration::minutes(10));
        }
        let live = CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, 30))
            .await
            .unwrap();

        let found = CheckInTokenService::get_active_token(&db, seeded.course.id, clock.now())
            .await
            .unwrap();
        assert_eq!(found.map(|t| t.id), Some(live.id));

        assert!(
            CheckInTokenService::get_active_token(&db, seeded.course.id, live.expires_at)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn concurrent_creation_yields_one_token() {
        let db = setup_test_db().await;
        let seeded = seed(&db).await;
        let clock = FixedClock::new(at(9, 0));

        let (a, b) = tokio::join!(
            CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, 15)),
            CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, 15)),
        );
        let conflicts = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(AppError::Conflict(_))))
            .count();
        assert_eq!(conflicts, 1, "{a:?} / {b:?}");
        assert!(a.is_ok() || b.is_ok());

        let history = CheckInTokenService::list_history(&db, seeded.course.id, at(9, 1))
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let db = setup_test_db().await;
        let clock = FixedClock::new(at(9, 0));
        let err = CheckInTokenService::create_token(&db, &clock, params(999, 15))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound { entity: "course", .. }));
    }

    #[tokio::test]
    async fn history_is_newest_first_with_live_flag() {
        let db = setup_test_db().await;
        let seeded = seed(&db).await;
        let clock = FixedClock::new(at(8, 0));

        let first = CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, 10))
            .await
            .unwrap();
        clock.set(at(9, 0));
        let second = CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, 30))
            .await
            .unwrap();

        let history = CheckInTokenService::list_history(&db, seeded.course.id, at(9, 10))
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].token.id, second.id);
        assert!(history[0].active);
        assert_eq!(history[1].token.id, first.id);
        assert!(!history[1].active);
    }

    #[tokio::test]
    async fn validate_code_distinguishes_unknown_and_expired() {
        let db = setup_test_db().await;
        let seeded = seed(&db).await;
        let clock = FixedClock::new(at(9, 0));
        let token = CheckInTokenService::create_token(&db, &clock, params(seeded.course.id, 5))
            .await
            .unwrap();

        let ok = CheckInTokenService::validate_code(&db, &token.code, at(9, 4))
            .await
            .unwrap();
        assert_eq!(ok.id, token.id);

        let expired = CheckInTokenService::validate_code(&db, &token.code, at(9, 5))
            .await
            .unwrap_err();
        assert!(matches!(
            expired,
            AppError::CheckInRejected(RejectReason::TokenExpired)
        ));

        let unknown = CheckInTokenService::validate_code(&db, "nope", at(9, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            unknown,
            AppError::CheckInRejected(RejectReason::TokenNotFound)
        ));
    }

    #[test]
    fn default_duration_comes_from_config() {
        let config = Config {
            project_name: "attendance-engine".into(),
            log_level: "info".into(),
            log_file: "logs/test.log".into(),
            database_url: "sqlite::memory:".into(),
            default_token_minutes: 20,
        };
        let params = CreateCheckInToken::with_default_duration(3, "Algorithms", &config);
        assert_eq!(params.duration_minutes, 20);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn remaining_never_goes_negative() {
        let token = CheckInToken {
            id: 1,
            course_id: 1,
            course_name: "Algorithms".into(),
            code: "x".into(),
            created_at: at(9, 0),
            expires_at: at(9, 15),
        };
        assert_eq!(
            CheckInTokenService::remaining(&token, at(9, 5)),
            Duration::minutes(10)
        );
        assert_eq!(
            CheckInTokenService::remaining(&token, at(10, 0)),
            Duration::zero()
        );
        assert_eq!(
            CheckInTokenService::is_expired(&token, at(9, 14)),
            CheckInTokenService::is_expired(&token, at(9, 14))
        );
    }
}
