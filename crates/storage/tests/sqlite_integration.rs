use chrono::Duration;
use exam_core::model::{
    Attempt, AttemptScope, ExerciseId, POINTS_PER_QUESTION, PartId, ThemeId, UserId,
};
use exam_core::time::fixed_now;
use storage::repository::{AttemptRepository, StorageError};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn attempt(
    user: UserId,
    exercise: u64,
    part: u64,
    theme: Option<u64>,
    correct: u32,
    minutes: i64,
) -> Attempt {
    Attempt::new(
        user,
        ExerciseId::new(exercise),
        PartId::new(part),
        theme.map(ThemeId::new),
        correct,
        5,
        POINTS_PER_QUESTION,
        fixed_now() + Duration::minutes(minutes),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrip_keeps_points_and_theme() {
    let repo = connect("memdb_attempt_roundtrip").await;
    let user = UserId::random();
    let original = attempt(user, 11, 2, Some(4), 4, 0);

    let id = repo.append_attempt(&original).await.unwrap();
    let fetched = repo.get_attempt(id).await.unwrap();

    assert_eq!(fetched, original);
    assert_eq!(fetched.obtained(), 20);
    assert_eq!(fetched.possible(), 25);
    assert_eq!(fetched.theme_id(), Some(ThemeId::new(4)));
}

#[tokio::test]
async fn sqlite_missing_attempt_is_not_found() {
    let repo = connect("memdb_attempt_missing").await;
    let err = repo.get_attempt(999).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_latest_practice_attempt_wins() {
    let repo = connect("memdb_attempt_latest_practice").await;
    let user = UserId::random();
    for (minutes, correct) in [(0, 1), (5, 2), (9, 3)] {
        repo.append_attempt(&attempt(user, 7, 1, None, correct, minutes))
            .await
            .unwrap();
    }
    repo.append_attempt(&attempt(user, 7, 1, Some(1), 5, 30))
        .await
        .unwrap();

    let latest = repo
        .list_latest_attempts(user, AttemptScope::Practice)
        .await
        .unwrap();

    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].attempt.correct_count(), 3);
    assert!(latest[0].attempt.is_practice());
}

#[tokio::test]
async fn sqlite_theme_scopes_group_by_part() {
    let repo = connect("memdb_attempt_theme_scope").await;
    let user = UserId::random();
    repo.append_attempt(&attempt(user, 1, 1, Some(2), 1, 0)).await.unwrap();
    repo.append_attempt(&attempt(user, 1, 1, Some(2), 4, 1)).await.unwrap();
    repo.append_attempt(&attempt(user, 2, 2, Some(2), 3, 2)).await.unwrap();
    repo.append_attempt(&attempt(user, 5, 1, Some(3), 2, 3)).await.unwrap();

    let theme = repo
        .list_latest_attempts(user, AttemptScope::Theme(ThemeId::new(2)))
        .await
        .unwrap();
    assert_eq!(theme.len(), 2);
    assert_eq!(theme[0].attempt.part_id(), PartId::new(2));
    assert_eq!(theme[1].attempt.correct_count(), 4);

    let all = repo
        .list_latest_attempts(user, AttemptScope::AllThemes)
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let history = repo
        .list_attempts(user, AttemptScope::Theme(ThemeId::new(2)))
        .await
        .unwrap();
    assert_eq!(history.len(), 3);
}
