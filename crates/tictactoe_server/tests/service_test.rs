//! End-to-end tests for league operations through `GameService`.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tictactoe_core::{GameError, GameId, Inactive};
use tictactoe_server::{
    GameRepository, GameService, GameView, Notifier, NotifyError, Reminder, ServiceError,
    send_reminders,
};

/// Creates a service over a fresh temporary database. The file handle must
/// stay in scope to keep the database alive.
fn setup_service() -> (NamedTempFile, GameService) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let repo = GameRepository::new(db_path).expect("Failed to create repository");
    repo.run_migrations().expect("Migrations failed");
    (db_file, GameService::new(repo))
}

fn register(svc: &GameService, names: &[&str]) {
    for name in names {
        svc.register_user(name, None).expect("Register failed");
    }
}

fn play(svc: &GameService, game: &GameView, moves: &[(&str, usize)]) -> GameView {
    let id = GameId::new(game.game_id);
    let mut view = game.clone();
    for (player, cell) in moves {
        view = svc.make_move(id, player, *cell).expect("Move failed");
    }
    view
}

#[test]
fn test_alice_wins_top_row() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice", "bob"]);

    let game = svc.new_game("alice", "bob").expect("New game failed");
    assert_eq!(game.message, "Good luck playing Tic Tac Toe");
    assert_eq!(game.next_to_move.as_deref(), Some("alice"));

    let view = play(&svc, &game, &[("alice", 0), ("bob", 4), ("alice", 1), ("bob", 5)]);
    assert_eq!(view.message, "Move accepted, waiting for alice");

    let view = svc
        .make_move(GameId::new(game.game_id), "alice", 2)
        .expect("Winning move failed");
    assert_eq!(view.message, "You won the game!");
    assert!(view.game_over);
    assert!(!view.tie);
    assert_eq!(view.winner.as_deref(), Some("alice"));
    assert_eq!(view.next_to_move, None);
    assert_eq!(view.remaining_moves, 0);
    assert_eq!(view.board, vec!["X", "X", "X", "", "O", "O", "", "", ""]);

    let rankings = svc.rankings().expect("Rankings failed");
    let alice = &rankings.users[0].user;
    let bob = &rankings.users[1].user;
    assert_eq!(alice.user_name, "alice");
    assert_eq!((alice.wins, alice.ties, alice.games_played), (1, 0, 1));
    assert_eq!(bob.user_name, "bob");
    assert_eq!((bob.wins, bob.ties, bob.losses, bob.games_played), (0, 0, 1, 1));

    let scores = svc.scores().expect("Scores failed");
    assert_eq!(scores.items.len(), 1);
    assert_eq!(scores.items[0].result, "player_x_won");
    assert_eq!(scores.items[0].winner.as_deref(), Some("alice"));

    let bob_scores = svc.user_scores("bob").expect("User scores failed");
    assert_eq!(bob_scores.items.len(), 1);
    assert_eq!(bob_scores.items[0].opponent, "alice");
    assert_eq!(bob_scores.items[0].outcome, "lost");
}

#[test]
fn test_full_board_without_line_is_a_tie() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice", "bob"]);
    let game = svc.new_game("alice", "bob").expect("New game failed");

    // X O X / X O O / O X X
    let view = play(
        &svc,
        &game,
        &[
            ("alice", 0),
            ("bob", 1),
            ("alice", 2),
            ("bob", 4),
            ("alice", 3),
            ("bob", 5),
            ("alice", 7),
            ("bob", 6),
            ("alice", 8),
        ],
    );
    assert_eq!(view.message, "Game tied!");
    assert!(view.game_over);
    assert!(view.tie);
    assert_eq!(view.winner, None);

    let rankings = svc.rankings().expect("Rankings failed");
    for entry in &rankings.users {
        assert_eq!(entry.user.ties, 1);
        assert_eq!(entry.user.wins, 0);
        assert_eq!(entry.user.games_played, 1);
        assert_eq!(entry.user.points, 1);
    }

    let scores = svc.user_scores("alice").expect("User scores failed");
    assert_eq!(scores.items[0].outcome, "tied");
}

#[test]
fn test_out_of_turn_leaves_board_unchanged() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice", "bob"]);
    let game = svc.new_game("alice", "bob").expect("New game failed");
    let id = GameId::new(game.game_id);

    let err = svc.make_move(id, "bob", 4).unwrap_err();
    assert!(matches!(err, ServiceError::Game(GameError::OutOfTurn { .. })));

    let after = svc.get_game(id).expect("Get failed");
    assert!(after.board.iter().all(String::is_empty));
    assert!(after.history.is_empty());
    assert_eq!(after.next_to_move.as_deref(), Some("alice"));
}

#[test]
fn test_cell_off_the_board_is_rejected() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice", "bob"]);
    let game = svc.new_game("alice", "bob").expect("New game failed");

    let err = svc
        .make_move(GameId::new(game.game_id), "alice", 9)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Game(GameError::OutOfRange(9))));
}

#[test]
fn test_move_on_cancelled_game_is_rejected() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice", "bob"]);
    let game = svc.new_game("alice", "bob").expect("New game failed");
    let id = GameId::new(game.game_id);
    play(&svc, &game, &[("alice", 4)]);

    let cancelled = svc.cancel_game(id).expect("Cancel failed");
    assert_eq!(cancelled.message, "Game cancelled!");
    assert!(cancelled.cancelled);

    let err = svc.make_move(id, "bob", 0).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Game(GameError::GameNotActive(Inactive::Cancelled))
    ));

    let after = svc.get_game(id).expect("Get failed");
    assert_eq!(after.board, cancelled.board);
    assert_eq!(after.history.len(), 1);
}

#[test]
fn test_occupied_cell_is_rejected() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice", "bob"]);
    let game = svc.new_game("alice", "bob").expect("New game failed");
    play(&svc, &game, &[("alice", 4)]);

    let err = svc
        .make_move(GameId::new(game.game_id), "bob", 4)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Game(GameError::CellOccupied(4))));
}

#[test]
fn test_move_after_win_is_rejected() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice", "bob"]);
    let game = svc.new_game("alice", "bob").expect("New game failed");
    play(
        &svc,
        &game,
        &[("alice", 0), ("bob", 4), ("alice", 1), ("bob", 5), ("alice", 2)],
    );

    let err = svc
        .make_move(GameId::new(game.game_id), "bob", 8)
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Game(GameError::GameNotActive(Inactive::Over))
    ));

    // settlement must not be applied twice
    let rankings = svc.rankings().expect("Rankings failed");
    assert_eq!(rankings.users[0].user.games_played, 1);
    assert_eq!(svc.scores().expect("Scores failed").items.len(), 1);
}

#[test]
fn test_cancel_is_idempotent() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice", "bob"]);
    let game = svc.new_game("alice", "bob").expect("New game failed");
    let id = GameId::new(game.game_id);

    assert_eq!(svc.cancel_game(id).unwrap().message, "Game cancelled!");
    assert_eq!(svc.cancel_game(id).unwrap().message, "Game already cancelled!");
    assert_eq!(svc.get_game(id).unwrap().message, "This game is cancelled");
}

#[test]
fn test_cancel_after_win_reports_over() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice", "bob"]);
    let game = svc.new_game("alice", "bob").expect("New game failed");
    play(
        &svc,
        &game,
        &[("alice", 0), ("bob", 4), ("alice", 1), ("bob", 5), ("alice", 2)],
    );

    let view = svc.cancel_game(GameId::new(game.game_id)).unwrap();
    assert_eq!(view.message, "Game already over!");
    assert!(!view.cancelled);
    assert_eq!(view.winner.as_deref(), Some("alice"));
}

#[test]
fn test_register_rejects_duplicates_and_blank_names() {
    let (_db, svc) = setup_service();
    let created = svc
        .register_user("alice", Some("alice@example.com"))
        .expect("Register failed");
    assert_eq!(created.message, "User alice created!");
    assert_eq!(created.user.games_played, 0);

    let err = svc.register_user("alice", None).unwrap_err();
    assert!(matches!(err, ServiceError::Game(GameError::Conflict(_))));

    let err = svc.register_user("   ", None).unwrap_err();
    assert!(matches!(err, ServiceError::Game(GameError::Validation(_))));
}

#[test]
fn test_new_game_requires_two_known_users() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice"]);

    let err = svc.new_game("alice", "nobody").unwrap_err();
    assert!(matches!(err, ServiceError::Game(GameError::NotFound(_))));

    let err = svc.new_game("alice", "alice").unwrap_err();
    assert!(matches!(err, ServiceError::Game(GameError::Validation(_))));
}

#[test]
fn test_unknown_game_is_not_found() {
    let (_db, svc) = setup_service();
    let err = svc.get_game(GameId::new(42)).unwrap_err();
    assert!(matches!(err, ServiceError::Game(GameError::NotFound(_))));
    let err = svc.cancel_game(GameId::new(42)).unwrap_err();
    assert!(matches!(err, ServiceError::Game(GameError::NotFound(_))));
}

#[test]
fn test_user_games_lists_both_seats() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice", "bob", "carol"]);
    svc.new_game("alice", "bob").unwrap();
    svc.new_game("carol", "alice").unwrap();
    svc.new_game("bob", "carol").unwrap();

    let games = svc.user_games("alice").expect("User games failed");
    assert_eq!(games.games.len(), 2);
    assert!(
        games
            .games
            .iter()
            .all(|g| g.player_x == "alice" || g.player_o == "alice")
    );
}

#[test]
fn test_rankings_order_by_points_then_name() {
    let (_db, svc) = setup_service();
    register(&svc, &["dave", "carol", "bob", "alice"]);

    let first = svc.new_game("alice", "bob").unwrap();
    play(
        &svc,
        &first,
        &[("alice", 0), ("bob", 4), ("alice", 1), ("bob", 5), ("alice", 2)],
    );
    let second = svc.new_game("bob", "carol").unwrap();
    play(
        &svc,
        &second,
        &[
            ("bob", 0),
            ("carol", 1),
            ("bob", 2),
            ("carol", 4),
            ("bob", 3),
            ("carol", 5),
            ("bob", 7),
            ("carol", 6),
            ("bob", 8),
        ],
    );

    let rankings = svc.rankings().expect("Rankings failed");
    let order: Vec<(usize, &str, u32)> = rankings
        .users
        .iter()
        .map(|e| (e.rank, e.user.user_name.as_str(), e.user.points))
        .collect();
    assert_eq!(
        order,
        vec![(1, "alice", 2), (2, "bob", 1), (3, "carol", 1), (4, "dave", 0)]
    );
}

#[test]
fn test_average_moves_cache() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice", "bob"]);
    assert_eq!(svc.average_moves_remaining().message, "");

    let game = svc.new_game("alice", "bob").unwrap();
    assert_eq!(
        svc.average_moves_remaining().message,
        "The average moves remaining is 9.00"
    );

    play(&svc, &game, &[("alice", 4)]);
    assert_eq!(svc.refresh_average_moves().unwrap(), Some(8.0));
    assert_eq!(
        svc.average_moves_remaining().message,
        "The average moves remaining is 8.00"
    );

    // no active games left: the previous value stays
    svc.cancel_game(GameId::new(game.game_id)).unwrap();
    assert_eq!(svc.refresh_average_moves().unwrap(), None);
    assert_eq!(
        svc.average_moves_remaining().message,
        "The average moves remaining is 8.00"
    );
}

#[test]
fn test_reminders_cover_active_and_cancelled_games() {
    let (_db, svc) = setup_service();
    svc.register_user("alice", Some("alice@example.com")).unwrap();
    svc.register_user("bob", None).unwrap();
    svc.register_user("carol", Some("carol@example.com")).unwrap();

    svc.new_game("alice", "bob").unwrap();
    let cancelled = svc.new_game("carol", "bob").unwrap();
    svc.cancel_game(GameId::new(cancelled.game_id)).unwrap();
    let finished = svc.new_game("alice", "carol").unwrap();
    play(
        &svc,
        &finished,
        &[("alice", 0), ("carol", 4), ("alice", 1), ("carol", 5), ("alice", 2)],
    );

    let mut reminders = svc.reminders().expect("Reminders failed");
    reminders.sort_by(|a, b| a.to().cmp(b.to()));
    assert_eq!(reminders.len(), 2);

    assert_eq!(reminders[0].to(), "alice@example.com");
    assert_eq!(reminders[0].subject(), "This is a reminder!");
    assert!(reminders[0].body().contains("against bob is waiting"));

    assert_eq!(reminders[1].to(), "carol@example.com");
    assert!(reminders[1].body().contains("was cancelled"));
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, Reminder)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, sender: &str, reminder: &Reminder) -> Result<(), NotifyError> {
        if reminder.to().starts_with("bounce") {
            return Err(NotifyError::new("mailbox unavailable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((sender.to_string(), reminder.clone()));
        Ok(())
    }
}

#[test]
fn test_concurrent_moves_by_same_player_apply_once() {
    let (_db, svc) = setup_service();
    register(&svc, &["alice", "bob"]);

    for _ in 0..10 {
        let id = GameId::new(svc.new_game("alice", "bob").expect("New game failed").game_id);
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [0, 8]
            .into_iter()
            .map(|cell| {
                let svc = svc.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    svc.make_move(id, "alice", cell)
                })
            })
            .collect();
        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("Thread panicked"))
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(ServiceError::Game(GameError::OutOfTurn { .. }))))
                .count(),
            1
        );

        let view = svc.get_game(id).expect("Get failed");
        assert_eq!(view.board.iter().filter(|c| !c.is_empty()).count(), 1);
        assert_eq!(view.next_to_move.as_deref(), Some("bob"));
        let stored = svc
            .repository()
            .load_game(id)
            .expect("Load failed")
            .expect("Game missing");
        assert_eq!(stored.game().history().len(), 1);
        assert_eq!(*stored.version(), 1);
    }
}

#[tokio::test]
async fn test_send_reminders_skips_failed_deliveries() {
    let (_db, svc) = setup_service();
    svc.register_user("alice", Some("alice@example.com")).unwrap();
    svc.register_user("bob", Some("bounce@example.com")).unwrap();
    svc.new_game("alice", "bob").unwrap();

    let notifier = RecordingNotifier::default();
    let sent = send_reminders(&svc, &notifier, "league@example.com")
        .await
        .expect("Reminder run failed");

    assert_eq!(sent, 1);
    let delivered = notifier.sent.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, "league@example.com");
    assert_eq!(delivered[0].1.to(), "alice@example.com");
}
