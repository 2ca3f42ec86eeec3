//! Add-song session manager tests

mod helpers;

use helpers::memory_pool;
use songdrop_common::Error;
use songdrop_sd::engine::SessionManager;
use songdrop_sd::models::SessionState;

async fn manager() -> SessionManager {
    SessionManager::new(memory_pool().await)
}

async fn walk_one_song(sessions: &SessionManager, user_id: i64, title: &str) {
    sessions.submit_field(user_id, title).await.unwrap();
    sessions.submit_field(user_id, "The Artist").await.unwrap();
    sessions
        .submit_field(user_id, &format!("https://songs.test/{}", title))
        .await
        .unwrap();
    sessions.confirm(user_id).await.unwrap();
}

#[tokio::test]
async fn conversation_queues_songs_across_restart_boundary() {
    let sessions = manager().await;

    // Given a started conversation
    let session = sessions.start(7).await.unwrap();
    assert_eq!(session.state, SessionState::AwaitingTitle);

    // When two songs are walked through the FSM
    walk_one_song(&sessions, 7, "First").await;
    walk_one_song(&sessions, 7, "Second").await;

    // Then both are queued; state is persisted, so a fresh read agrees
    let queue = sessions.queue(7).await.unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].title, "First");
    let reloaded = sessions.get(7).await.unwrap();
    assert_eq!(reloaded.state, SessionState::AwaitingTitle);
}

#[tokio::test]
async fn starting_over_an_active_conversation_conflicts() {
    let sessions = manager().await;
    sessions.start(7).await.unwrap();
    sessions.submit_field(7, "Song").await.unwrap();

    assert!(matches!(
        sessions.start(7).await.unwrap_err(),
        Error::Conflict(_)
    ));
}

#[tokio::test]
async fn cancel_goes_idle_and_start_reuses_the_row() {
    let sessions = manager().await;
    sessions.start(7).await.unwrap();
    walk_one_song(&sessions, 7, "Kept").await;
    sessions.submit_field(7, "Abandoned").await.unwrap();

    // When the conversation is cancelled mid-draft
    let session = sessions.cancel(7).await.unwrap();
    assert_eq!(session.state, SessionState::Idle);

    // Then a new start reuses the row and the queue survives
    let restarted = sessions.start(7).await.unwrap();
    assert_eq!(restarted.state, SessionState::AwaitingTitle);
    assert_eq!(restarted.queue.len(), 1);
    assert_eq!(restarted.queue[0].title, "Kept");
}

#[tokio::test]
async fn clearing_the_queue_drains_it_and_ends_the_conversation() {
    let sessions = manager().await;
    sessions.start(7).await.unwrap();
    walk_one_song(&sessions, 7, "One").await;
    walk_one_song(&sessions, 7, "Two").await;

    let drained = sessions.take_queue(7).await.unwrap();
    assert_eq!(drained.len(), 2);
    assert!(sessions.queue(7).await.unwrap().is_empty());

    // The session ends up idle, not parked mid-conversation
    assert_eq!(sessions.get(7).await.unwrap().state, SessionState::Idle);
    // so a fresh start succeeds instead of conflicting
    let restarted = sessions.start(7).await.unwrap();
    assert_eq!(restarted.state, SessionState::AwaitingTitle);
}

#[tokio::test]
async fn invalid_field_leaves_state_unchanged() {
    let sessions = manager().await;
    sessions.start(7).await.unwrap();
    sessions.submit_field(7, "Song").await.unwrap();
    sessions.submit_field(7, "Artist").await.unwrap();

    assert!(matches!(
        sessions.submit_field(7, "not a url").await.unwrap_err(),
        Error::Validation(_)
    ));
    assert_eq!(
        sessions.get(7).await.unwrap().state,
        SessionState::AwaitingUrl
    );
}

#[tokio::test]
async fn users_have_independent_sessions() {
    let sessions = manager().await;
    sessions.start(1).await.unwrap();
    sessions.start(2).await.unwrap();
    walk_one_song(&sessions, 1, "Mine").await;

    assert_eq!(sessions.queue(1).await.unwrap().len(), 1);
    assert!(sessions.queue(2).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_user_session_is_not_found() {
    let sessions = manager().await;
    assert!(matches!(
        sessions.submit_field(99, "Song").await.unwrap_err(),
        Error::NotFound(_)
    ));
}
