use chrono::Duration;
use kardio_db::models::SessionType;
use kardio_learning::{AttemptRecordRequest, ServiceError, SessionView};
use uuid::Uuid;

use crate::common::TestStateBuilder;

fn attempt(session_id: Uuid, vocabulary_id: Uuid, is_correct: bool) -> AttemptRecordRequest {
    AttemptRecordRequest {
        session_id,
        vocabulary_id,
        is_correct,
        response_time_ms: Some(1500),
    }
}

#[tokio::test]
async fn test_create_session_bumps_streak_and_module() {
    let app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus"]);

    let session = app
        .state
        .sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Flashcard)
        .await
        .unwrap();

    assert!(session.is_active);
    assert_eq!(session.start_time, app.now);
    assert_eq!(session.total_items, 0);
    assert_eq!(session.session_type, SessionType::Flashcard);

    let streak = app.state.streaks.get_streak(seeded.user_id).await.unwrap();
    assert_eq!(streak.current_streak, 1);
    assert!(streak.is_active_today);
    assert_eq!(app.store.module_last_studied_at(seeded.module_id), Some(app.now));
}

#[tokio::test]
async fn test_sessions_on_consecutive_days_extend_streak() {
    let mut app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus"]);

    for _ in 0..2 {
        app.state
            .sessions
            .create_session(seeded.user_id, seeded.module_id, SessionType::Learn)
            .await
            .unwrap();
        app.state
            .sessions
            .create_session(seeded.user_id, seeded.module_id, SessionType::Match)
            .await
            .unwrap();
        app.advance(Duration::days(1));
    }

    let streak = app.state.streaks.get_streak(seeded.user_id).await.unwrap();
    assert_eq!(streak.current_streak, 2);
    assert_eq!(streak.longest_streak, 2);
}

#[tokio::test]
async fn test_create_session_requires_user_and_module() {
    let app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus"]);

    let err = app
        .state
        .sessions
        .create_session(Uuid::new_v4(), seeded.module_id, SessionType::Test)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "user", .. }));

    let err = app
        .state
        .sessions
        .create_session(seeded.user_id, Uuid::new_v4(), SessionType::Test)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "module", .. }));
}

#[tokio::test]
async fn test_record_attempt_updates_session_and_progress() {
    let app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus", "Baum"]);
    let sessions = &app.state.sessions;
    let session = sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Learn)
        .await
        .unwrap();

    sessions
        .record_attempt(
            seeded.user_id,
            attempt(session.id, seeded.vocabulary_ids[0], true),
        )
        .await
        .unwrap();
    let view = sessions
        .record_attempt(
            seeded.user_id,
            attempt(session.id, seeded.vocabulary_ids[1], false),
        )
        .await
        .unwrap();

    assert_eq!(view.total_items, 2);
    assert_eq!(view.correct_items, 1);
    assert_eq!(view.accuracy_rate, 50.0);

    let progress = app
        .state
        .progress
        .get_progress(seeded.user_id, seeded.vocabulary_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(progress.correct_count, 1);
    assert_eq!(progress.next_review_at, Some(app.now + Duration::hours(4)));
}

#[tokio::test]
async fn test_progress_failure_does_not_fail_the_attempt() {
    let app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus"]);
    let session = app
        .state
        .sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Blast)
        .await
        .unwrap();

    app.store.fail_progress_writes(true);
    let view = app
        .state
        .sessions
        .record_attempt(
            seeded.user_id,
            attempt(session.id, seeded.vocabulary_ids[0], true),
        )
        .await
        .unwrap();

    assert_eq!(view.total_items, 1);
    assert_eq!(view.correct_items, 1);
    assert!(
        app.state
            .progress
            .get_progress(seeded.user_id, seeded.vocabulary_ids[0])
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_record_attempt_rejections() {
    let app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus"]);
    let other = app.seed_module(&["rot"]);
    let sessions = &app.state.sessions;
    let session = sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Test)
        .await
        .unwrap();
    let vocab = seeded.vocabulary_ids[0];

    // someone else's session
    let err = sessions
        .record_attempt(other.user_id, attempt(session.id, vocab, true))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));

    // vocabulary from another module
    let err = sessions
        .record_attempt(
            seeded.user_id,
            attempt(session.id, other.vocabulary_ids[0], true),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    // negative response time
    let mut request = attempt(session.id, vocab, true);
    request.response_time_ms = Some(-1);
    let err = sessions
        .record_attempt(seeded.user_id, request)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    // unknown session
    let err = sessions
        .record_attempt(seeded.user_id, attempt(Uuid::new_v4(), vocab, true))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "session", .. }));

    // ended session
    sessions
        .end_session(seeded.user_id, session.id)
        .await
        .unwrap();
    let err = sessions
        .record_attempt(seeded.user_id, attempt(session.id, vocab, true))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let stored = sessions.get_session(seeded.user_id, session.id).await.unwrap();
    assert_eq!(stored.total_items, 0);
}

#[tokio::test]
async fn test_end_session_is_idempotent() {
    let mut app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus"]);
    let session = app
        .state
        .sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Flashcard)
        .await
        .unwrap();

    app.advance(Duration::minutes(12));
    let ended = app
        .state
        .sessions
        .end_session(seeded.user_id, session.id)
        .await
        .unwrap();
    assert!(!ended.is_active);
    assert_eq!(ended.duration_seconds, Some(12 * 60));

    app.advance(Duration::minutes(30));
    let again = app
        .state
        .sessions
        .end_session(seeded.user_id, session.id)
        .await
        .unwrap();
    assert_eq!(again.end_time, ended.end_time);
}

#[tokio::test]
async fn test_active_sessions_and_delete() {
    let mut app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus"]);

    let first = app
        .state
        .sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Flashcard)
        .await
        .unwrap();
    app.advance(Duration::minutes(1));
    let second = app
        .state
        .sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Learn)
        .await
        .unwrap();
    app.advance(Duration::minutes(1));
    let third = app
        .state
        .sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Test)
        .await
        .unwrap();
    app.state
        .sessions
        .end_session(seeded.user_id, second.id)
        .await
        .unwrap();

    let active = app
        .state
        .sessions
        .active_sessions(seeded.user_id)
        .await
        .unwrap();
    let ids: Vec<Uuid> = active.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![third.id, first.id]);

    app.state
        .sessions
        .delete_session(seeded.user_id, first.id)
        .await
        .unwrap();
    let err = app
        .state
        .sessions
        .get_session(seeded.user_id, first.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "session", .. }));

    let err = app
        .state
        .sessions
        .active_sessions(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "user", .. }));
}

#[tokio::test]
async fn test_analyze_session() {
    let app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus", "Baum", "rot"]);
    let sessions = &app.state.sessions;
    let user = seeded.user_id;
    let session = sessions
        .create_session(user, seeded.module_id, SessionType::Test)
        .await
        .unwrap();

    let answers = [
        (0, true, Some(800)),
        (0, true, Some(1200)),
        (1, false, Some(4000)),
        (1, false, None),
        (2, true, None),
        (2, false, None),
    ];
    for (index, is_correct, response_time_ms) in answers {
        sessions
            .record_attempt(
                user,
                AttemptRecordRequest {
                    session_id: session.id,
                    vocabulary_id: seeded.vocabulary_ids[index],
                    is_correct,
                    response_time_ms,
                },
            )
            .await
            .unwrap();
    }

    let analysis = sessions.analyze_session(user, session.id).await.unwrap();
    assert_eq!(analysis.total_items, 6);
    assert_eq!(analysis.correct_items, 3);
    assert_eq!(analysis.accuracy_rate, 50.0);
    assert_eq!(analysis.average_response_time_ms, 2000.0);
    assert_eq!(analysis.mastered_terms, vec!["Haus".to_string()]);
    assert_eq!(analysis.difficult_terms, vec!["Baum".to_string()]);

    let other = app.store.add_user();
    let err = sessions.analyze_session(other, session.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn test_session_view_serializes_session_type() {
    let app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus"]);
    let session = app
        .state
        .sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Match)
        .await
        .unwrap();

    let json = serde_json::to_value(&session).unwrap();
    assert_eq!(json["session_type"], "MATCH");
    assert_eq!(json["is_active"], true);
}

#[tokio::test]
async fn test_streak_failure_does_not_fail_session_creation() {
    let app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus"]);
    app.store.fail_streak_writes(true);

    let session = app
        .state
        .sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Learn)
        .await
        .unwrap();

    let stored = app
        .state
        .sessions
        .get_session(seeded.user_id, session.id)
        .await
        .unwrap();
    assert_eq!(stored, session);
    assert!(stored.is_active);
    assert_eq!(app.store.module_last_studied_at(seeded.module_id), Some(app.now));

    let streak = app.state.streaks.get_streak(seeded.user_id).await.unwrap();
    assert_eq!(streak.current_streak, 0);
    assert_eq!(streak.last_activity_date, None);
}

#[tokio::test]
async fn test_streak_update_failure_after_record_exists() {
    let mut app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus"]);
    app.state
        .sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Learn)
        .await
        .unwrap();

    app.advance(Duration::days(1));
    app.store.fail_streak_writes(true);
    let session = app
        .state
        .sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Test)
        .await
        .unwrap();
    assert!(session.is_active);

    let streak = app.state.streaks.get_streak(seeded.user_id).await.unwrap();
    assert_eq!(streak.current_streak, 1);
    assert!(!streak.is_active_today);
}

#[tokio::test]
async fn test_session_history_listings() {
    let mut app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus"]);
    let user = seeded.user_id;
    let colours = app.store.add_module(user, "Colours");

    let first = app
        .state
        .sessions
        .create_session(user, seeded.module_id, SessionType::Flashcard)
        .await
        .unwrap();
    app.advance(Duration::minutes(1));
    let second = app
        .state
        .sessions
        .create_session(user, colours, SessionType::Learn)
        .await
        .unwrap();
    app.state.sessions.end_session(user, second.id).await.unwrap();
    app.advance(Duration::minutes(1));
    let third = app
        .state
        .sessions
        .create_session(user, seeded.module_id, SessionType::Learn)
        .await
        .unwrap();
    let stranger = app.seed_module(&["rot"]);

    let sessions = &app.state.sessions;
    let ids = |views: Vec<SessionView>| -> Vec<Uuid> {
        views.into_iter().map(|v| v.id).collect()
    };

    let history = sessions.session_history(user).await.unwrap();
    assert_eq!(ids(history), vec![third.id, second.id, first.id]);

    let in_module = sessions.module_sessions(user, seeded.module_id).await.unwrap();
    assert_eq!(ids(in_module), vec![third.id, first.id]);

    let learn = sessions
        .sessions_by_type(user, SessionType::Learn)
        .await
        .unwrap();
    assert_eq!(ids(learn), vec![third.id, second.id]);

    assert!(
        sessions
            .session_history(stranger.user_id)
            .await
            .unwrap()
            .is_empty()
    );

    let err = sessions
        .module_sessions(user, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "module", .. }));

    let err = sessions
        .sessions_by_type(Uuid::new_v4(), SessionType::Test)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "user", .. }));
}

#[tokio::test]
async fn test_session_detail_lists_answers() {
    let app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus", "Baum"]);
    let sessions = &app.state.sessions;
    let session = sessions
        .create_session(seeded.user_id, seeded.module_id, SessionType::Test)
        .await
        .unwrap();
    sessions
        .record_attempt(
            seeded.user_id,
            attempt(session.id, seeded.vocabulary_ids[0], true),
        )
        .await
        .unwrap();
    sessions
        .record_attempt(
            seeded.user_id,
            attempt(session.id, seeded.vocabulary_ids[1], false),
        )
        .await
        .unwrap();

    let detail = sessions
        .get_session_detail(seeded.user_id, session.id)
        .await
        .unwrap();
    assert_eq!(detail.session.total_items, 2);
    let terms: Vec<&str> = detail.items.iter().map(|i| i.term.as_str()).collect();
    assert_eq!(terms, vec!["Haus", "Baum"]);
    assert!(detail.items[0].is_correct);
    assert!(!detail.items[1].is_correct);

    let json = serde_json::to_value(&detail).unwrap();
    assert_eq!(json["total_items"], 2);
    assert_eq!(json["items"].as_array().map(Vec::len), Some(2));

    let other = app.store.add_user();
    let err = sessions
        .get_session_detail(other, session.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn test_total_study_time() {
    let mut app = TestStateBuilder::new().build();
    let seeded = app.seed_module(&["Haus"]);
    let user = seeded.user_id;
    let today = app.now.date_naive();

    let first = app
        .state
        .sessions
        .create_session(user, seeded.module_id, SessionType::Learn)
        .await
        .unwrap();
    app.advance(Duration::minutes(15));
    app.state.sessions.end_session(user, first.id).await.unwrap();
    app.state
        .sessions
        .create_session(user, seeded.module_id, SessionType::Match)
        .await
        .unwrap();
    app.advance(Duration::minutes(5));

    let sessions = &app.state.sessions;
    assert_eq!(
        sessions.total_study_time(user, today, today).await.unwrap(),
        20 * 60
    );

    let yesterday = today.pred_opt().unwrap();
    assert_eq!(
        sessions
            .total_study_time(user, yesterday, yesterday)
            .await
            .unwrap(),
        0
    );

    let err = sessions
        .total_study_time(user, today, yesterday)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = sessions
        .total_study_time(Uuid::new_v4(), today, today)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { entity: "user", .. }));
}
