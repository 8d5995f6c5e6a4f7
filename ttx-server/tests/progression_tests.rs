//! Integration tests for the exercise progression engine
//!
//! Exercises the full stack below the HTTP layer: engine operations over
//! a real SQLite database, with events observed through the broadcast
//! gateway.

use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use ttx_common::events::ExerciseEvent;
use ttx_common::models::{
    Answer, AnswerOption, ExerciseStatus, Magnitude, Participant, ParticipantStatus, Phase,
    QuestionType,
};

use ttx_server::broadcast::{BroadcastGateway, Topic};
use ttx_server::db;
use ttx_server::engine::{
    Engine, ExerciseUpdate, JoinRequest, NewExercise, NewInject, PhaseAdvance, SubmitRequest,
};
use ttx_server::registry::SessionRegistry;
use ttx_server::Error;

struct Harness {
    _dir: TempDir,
    engine: Arc<Engine>,
    gateway: Arc<BroadcastGateway>,
    facilitator: Uuid,
}

async fn setup() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::init::create_pool(&dir.path().join("ttx.db")).await.unwrap();
    db::init::initialize_database(&pool).await.unwrap();
    let facilitator = db::facilitators::create(&pool, "test", "test-token").await.unwrap();

    let gateway = Arc::new(BroadcastGateway::new(64));
    let engine = Arc::new(Engine::new(pool, gateway.clone()));
    Harness {
        _dir: dir,
        engine,
        gateway,
        facilitator,
    }
}

fn option(id: &str, points: i64, magnitude: Magnitude) -> AnswerOption {
    AnswerOption {
        id: id.to_string(),
        text: format!("option {id}"),
        points,
        magnitude,
    }
}

fn phase(question_type: QuestionType, options: Vec<AnswerOption>) -> Phase {
    Phase {
        phase_number: 0, // assigned on insert
        phase_name: "decision".to_string(),
        question: "what do you do?".to_string(),
        question_type,
        options,
        correct_answer: Vec::new(),
        max_points: None,
    }
}

fn inject(title: &str, phases: Vec<Phase>) -> NewInject {
    NewInject {
        title: title.to_string(),
        narrative: "something happened".to_string(),
        artifacts: Vec::new(),
        phases,
    }
}

/// Three injects; the first has a multiple-choice phase (A=3, B=3, C=2,
/// D=2) and a single-choice phase (A=10 most effective, Z=0 least).
fn scenario() -> NewExercise {
    NewExercise {
        title: "Ransomware drill".to_string(),
        description: "quarterly".to_string(),
        max_participants: 50,
        injects: vec![
            inject(
                "Initial alert",
                vec![
                    phase(
                        QuestionType::Multiple,
                        vec![
                            option("A", 3, Magnitude::Effective),
                            option("B", 3, Magnitude::Effective),
                            option("C", 2, Magnitude::SomewhatEffective),
                            option("D", 2, Magnitude::SomewhatEffective),
                        ],
                    ),
                    phase(
                        QuestionType::Single,
                        vec![
                            option("A", 10, Magnitude::MostEffective),
                            option("Z", 0, Magnitude::LeastEffective),
                        ],
                    ),
                ],
            ),
            inject(
                "Escalation",
                vec![phase(
                    QuestionType::Single,
                    vec![option("A", 5, Magnitude::Effective)],
                )],
            ),
            inject("Recovery", vec![phase(QuestionType::Text, Vec::new())]),
        ],
        summary: Vec::new(),
    }
}

async fn admitted_participant(h: &Harness, exercise_id: Uuid, code: &str, name: &str) -> Participant {
    let joined = h
        .engine
        .join_exercise(JoinRequest {
            access_code: code.to_string(),
            name: name.to_string(),
            team: "blue".to_string(),
        })
        .await
        .unwrap();
    h.engine
        .update_participant_status(
            h.facilitator,
            exercise_id,
            joined.participant.participant_id,
            ParticipantStatus::Active,
        )
        .await
        .unwrap()
}

async fn reload(h: &Harness, participant_id: Uuid) -> Participant {
    reload_opt(h, participant_id).await.unwrap()
}

async fn reload_opt(h: &Harness, participant_id: Uuid) -> Option<Participant> {
    db::participants::load(h.engine.db(), participant_id)
        .await
        .unwrap()
}

fn submit(participant_id: Uuid, inject: u32, phase: u32, q: u32, answer: Answer) -> SubmitRequest {
    SubmitRequest {
        participant_id,
        inject_number: inject,
        phase_number: phase,
        question_index: q,
        answer,
    }
}

#[tokio::test]
async fn release_inject_hard_cuts_active_cursors() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();

    let mut ids = Vec::new();
    for name in ["alice", "bob", "carol"] {
        let p = admitted_participant(&h, ex.id, &ex.access_code, name).await;
        ids.push(p.participant_id);
    }

    // Scatter the cursors
    for (i, id) in ids.iter().enumerate() {
        let mut p = reload(&h, *id).await;
        p.current_inject = 1;
        p.current_phase = i as u32 + 1;
        db::participants::save(h.engine.db(), &p).await.unwrap();
    }

    let mut rx = h.gateway.subscribe(Topic::Exercise(ex.id));
    let released = h.engine.release_inject(h.facilitator, ex.id, 2).await.unwrap();

    assert!(released.is_active);
    assert!(released.responses_open);
    assert!(released.release_time.is_some());

    // Everyone is at (2, 1) regardless of where they were
    for id in &ids {
        let p = reload(&h, *id).await;
        assert_eq!(p.current_inject, 2);
        assert_eq!(p.current_phase, 1);
    }

    match rx.try_recv().unwrap() {
        ExerciseEvent::InjectReleased { inject_number, .. } => assert_eq!(inject_number, 2),
        other => panic!("unexpected event {}", other.event_type()),
    }

    // Releasing the same inject again is refused
    let err = h.engine.release_inject(h.facilitator, ex.id, 2).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn submission_scores_and_rejects_duplicates() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();
    let p = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;

    h.engine.release_inject(h.facilitator, ex.id, 1).await.unwrap();

    let mut rx = h.gateway.subscribe(Topic::Exercise(ex.id));

    // A + B + C = 8 points, effective by the threshold ladder
    let many = Answer::Many(vec!["A".into(), "B".into(), "C".into()]);
    let outcome = h
        .engine
        .submit_response(submit(p.participant_id, 1, 1, 0, many.clone()))
        .await
        .unwrap();
    assert_eq!(outcome.response.points_earned, 8);
    assert_eq!(outcome.response.magnitude, Magnitude::Effective);
    assert_eq!(outcome.total_score, 8);

    match rx.try_recv().unwrap() {
        ExerciseEvent::ScoreUpdate {
            points_earned,
            total_score,
            ..
        } => {
            assert_eq!(points_earned, 8);
            assert_eq!(total_score, 8);
        }
        other => panic!("unexpected event {}", other.event_type()),
    }

    // Same (inject, phase, question) is immutable
    let err = h
        .engine
        .submit_response(submit(p.participant_id, 1, 1, 0, many))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateResponse(_)));

    let p = reload(&h, p.participant_id).await;
    assert_eq!(p.total_score, 8);
    assert_eq!(p.responses.len(), 1);

    // Second phase of the same inject still accepts answers
    let outcome = h
        .engine
        .submit_response(submit(p.participant_id, 1, 2, 0, Answer::One("A".into())))
        .await
        .unwrap();
    assert_eq!(outcome.response.points_earned, 10);
    assert_eq!(outcome.response.magnitude, Magnitude::MostEffective);
    assert_eq!(outcome.total_score, 18);
}

#[tokio::test]
async fn submission_gate_blocks_when_closed() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();
    let p = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;

    // Never released: gate is closed
    let err = h
        .engine
        .submit_response(submit(p.participant_id, 1, 1, 0, Answer::One("A".into())))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotOpen(_)));

    // Release, close the gate, still blocked
    h.engine.release_inject(h.facilitator, ex.id, 1).await.unwrap();
    let open = h
        .engine
        .toggle_responses(h.facilitator, ex.id, 1, false)
        .await
        .unwrap();
    assert!(!open);

    let err = h
        .engine
        .submit_response(submit(p.participant_id, 1, 1, 0, Answer::One("A".into())))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotOpen(_)));

    // Reopen and it goes through
    let open = h
        .engine
        .toggle_responses(h.facilitator, ex.id, 1, true)
        .await
        .unwrap();
    assert!(open);
    h.engine
        .submit_response(submit(p.participant_id, 1, 2, 0, Answer::One("Z".into())))
        .await
        .unwrap();

    // Setting the current value is allowed and still broadcasts
    let mut rx = h.gateway.subscribe(Topic::Exercise(ex.id));
    h.engine
        .toggle_responses(h.facilitator, ex.id, 1, true)
        .await
        .unwrap();
    assert_eq!(rx.try_recv().unwrap().event_type(), "ResponsesToggled");
}

#[tokio::test]
async fn phase_advance_respects_lock_and_terminal_phase() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();
    let p = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;
    h.engine.release_inject(h.facilitator, ex.id, 1).await.unwrap();

    // Normal advance: 1 -> 2 of 2
    match h.engine.advance_phase(p.participant_id).await.unwrap() {
        PhaseAdvance::Advanced {
            current_phase,
            total_phases,
        } => {
            assert_eq!(current_phase, 2);
            assert_eq!(total_phases, 2);
        }
        PhaseAdvance::AllPhasesCompleted { .. } => panic!("expected advance"),
    }

    // At the last phase: reported complete, cursor unchanged
    match h.engine.advance_phase(p.participant_id).await.unwrap() {
        PhaseAdvance::AllPhasesCompleted { current_phase } => assert_eq!(current_phase, 2),
        PhaseAdvance::Advanced { .. } => panic!("expected completion"),
    }
    assert_eq!(reload(&h, p.participant_id).await.current_phase, 2);

    // Lock wins even at the last phase
    let locked = h
        .engine
        .toggle_phase_lock(h.facilitator, ex.id, 1, true)
        .await
        .unwrap();
    assert!(locked);
    let err = h.engine.advance_phase(p.participant_id).await.unwrap_err();
    assert!(matches!(err, Error::Locked(_)));
}

#[tokio::test]
async fn phase_lock_set_before_release_survives_it() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();
    let p = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;

    // Lock the inject while it is still unreleased
    h.engine
        .toggle_phase_lock(h.facilitator, ex.id, 1, true)
        .await
        .unwrap();

    // Release opens submissions but leaves the progression gate alone
    let released = h.engine.release_inject(h.facilitator, ex.id, 1).await.unwrap();
    assert!(released.responses_open);
    assert!(released.phase_progression_locked);

    let err = h.engine.advance_phase(p.participant_id).await.unwrap_err();
    assert!(matches!(err, Error::Locked(_)));

    h.engine
        .toggle_phase_lock(h.facilitator, ex.id, 1, false)
        .await
        .unwrap();
    assert!(matches!(
        h.engine.advance_phase(p.participant_id).await.unwrap(),
        PhaseAdvance::Advanced { .. }
    ));
}

#[tokio::test]
async fn concurrent_submissions_are_all_recorded() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();
    let alice = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;
    let bob = admitted_participant(&h, ex.id, &ex.access_code, "bob").await;
    h.engine.release_inject(h.facilitator, ex.id, 1).await.unwrap();

    // Both participants answer both phases of inject 1 at once
    let mut tasks = Vec::new();
    for pid in [alice.participant_id, bob.participant_id] {
        for phase in [1u32, 2] {
            let engine = h.engine.clone();
            let answer = match phase {
                1 => Answer::Many(vec!["A".to_string(), "B".to_string()]),
                _ => Answer::One("A".to_string()),
            };
            tasks.push(tokio::spawn(async move {
                engine.submit_response(submit(pid, 1, phase, 0, answer)).await
            }));
        }
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // No submission was lost to an interleaved write: 6 on the multiple
    // choice plus 10 on the single choice, for each of them
    for pid in [alice.participant_id, bob.participant_id] {
        let p = reload(&h, pid).await;
        assert_eq!(p.responses.len(), 2);
        assert_eq!(p.total_score, 16);
    }
}

#[tokio::test]
async fn reset_inject_strips_only_its_responses() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();
    let p = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;

    h.engine.release_inject(h.facilitator, ex.id, 1).await.unwrap();
    h.engine
        .submit_response(submit(p.participant_id, 1, 2, 0, Answer::One("A".into())))
        .await
        .unwrap();
    h.engine.release_inject(h.facilitator, ex.id, 2).await.unwrap();
    h.engine
        .submit_response(submit(p.participant_id, 2, 1, 0, Answer::One("A".into())))
        .await
        .unwrap();
    assert_eq!(reload(&h, p.participant_id).await.total_score, 15);

    h.engine.reset_inject(h.facilitator, ex.id, 2).await.unwrap();

    let p = reload(&h, p.participant_id).await;
    assert_eq!(p.responses.len(), 1);
    assert_eq!(p.responses[0].inject_number, 1);
    assert_eq!(p.total_score, 10);

    let ex = h.engine.get_exercise(h.facilitator, ex.id).await.unwrap();
    let second = ex.inject(2).unwrap();
    assert!(!second.is_active);
    assert!(second.release_time.is_none());
    // Inject 1 untouched
    assert!(ex.inject(1).unwrap().is_active);
}

#[tokio::test]
async fn reset_exercise_rewinds_everything() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();
    let p = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;

    h.engine.release_inject(h.facilitator, ex.id, 1).await.unwrap();
    h.engine
        .submit_response(submit(p.participant_id, 1, 2, 0, Answer::One("A".into())))
        .await
        .unwrap();

    let mut rx = h.gateway.subscribe(Topic::Exercise(ex.id));
    h.engine.reset_exercise(h.facilitator, ex.id).await.unwrap();

    let p = reload(&h, p.participant_id).await;
    assert!(p.responses.is_empty());
    assert_eq!(p.total_score, 0);
    assert_eq!(p.current_inject, 1);
    assert_eq!(p.current_phase, 1);
    // Enrollment survives the reset
    assert_eq!(p.status, ParticipantStatus::Active);

    let ex = h.engine.get_exercise(h.facilitator, ex.id).await.unwrap();
    assert!(ex.injects.iter().all(|i| !i.is_active && !i.responses_open));

    assert_eq!(rx.try_recv().unwrap().event_type(), "ExerciseReset");
}

#[tokio::test]
async fn delete_inject_renumbers_and_guards_responses() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();

    h.engine.delete_inject(h.facilitator, ex.id, 2).await.unwrap();
    let reloaded = h.engine.get_exercise(h.facilitator, ex.id).await.unwrap();
    let numbers: Vec<u32> = reloaded.injects.iter().map(|i| i.inject_number).collect();
    assert_eq!(numbers, vec![1, 2]);
    let titles: Vec<&str> = reloaded.injects.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Initial alert", "Recovery"]);

    // A recorded response pins its inject in place
    let p = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;
    h.engine.release_inject(h.facilitator, ex.id, 1).await.unwrap();
    h.engine
        .submit_response(submit(p.participant_id, 1, 1, 0, Answer::Many(vec!["A".into()])))
        .await
        .unwrap();

    let err = h.engine.delete_inject(h.facilitator, ex.id, 1).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn join_enforces_code_state_and_capacity() {
    let h = setup().await;
    let mut new = scenario();
    new.max_participants = 2;
    let ex = h.engine.create_exercise(h.facilitator, new).await.unwrap();

    // Unknown access code
    let err = h
        .engine
        .join_exercise(JoinRequest {
            access_code: "NOPE0000".to_string(),
            name: "x".to_string(),
            team: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    // Access code matching is case-insensitive
    let first = h
        .engine
        .join_exercise(JoinRequest {
            access_code: ex.access_code.to_lowercase(),
            name: "alice".to_string(),
            team: "blue".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(first.participant.status, ParticipantStatus::Waiting);
    assert_eq!(first.exercise_id, ex.id);

    h.engine
        .join_exercise(JoinRequest {
            access_code: ex.access_code.clone(),
            name: "bob".to_string(),
            team: "blue".to_string(),
        })
        .await
        .unwrap();

    // Full house: waiting participants hold slots
    let err = h
        .engine
        .join_exercise(JoinRequest {
            access_code: ex.access_code.clone(),
            name: "carol".to_string(),
            team: "blue".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CapacityExceeded(_)));

    // A departed participant frees their slot
    h.engine
        .update_participant_status(
            h.facilitator,
            ex.id,
            first.participant.participant_id,
            ParticipantStatus::Active,
        )
        .await
        .unwrap();
    h.engine
        .mark_disconnected(first.participant.participant_id)
        .await
        .unwrap();
    h.engine
        .join_exercise(JoinRequest {
            access_code: ex.access_code.clone(),
            name: "carol".to_string(),
            team: "blue".to_string(),
        })
        .await
        .unwrap();

    // Completed exercises stop accepting joins
    h.engine
        .update_exercise(
            h.facilitator,
            ex.id,
            ExerciseUpdate {
                status: Some(ExerciseStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let err = h
        .engine
        .join_exercise(JoinRequest {
            access_code: ex.access_code,
            name: "dave".to_string(),
            team: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[tokio::test]
async fn disconnect_and_reconnect_flip_presence() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();
    let p = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;

    let mut on_exercise = h.gateway.subscribe(Topic::Exercise(ex.id));
    let mut private = h.gateway.subscribe(Topic::Participant(p.participant_id));

    h.engine.mark_disconnected(p.participant_id).await.unwrap();
    assert_eq!(reload(&h, p.participant_id).await.status, ParticipantStatus::Left);
    assert_eq!(
        on_exercise.try_recv().unwrap().event_type(),
        "ParticipantDisconnected"
    );

    h.engine.mark_connected(p.participant_id).await.unwrap();
    assert_eq!(reload(&h, p.participant_id).await.status, ParticipantStatus::Active);
    assert_eq!(
        on_exercise.try_recv().unwrap().event_type(),
        "ParticipantRejoined"
    );
    match private.try_recv().unwrap() {
        ExerciseEvent::Reconnected { status, .. } => {
            assert_eq!(status, ParticipantStatus::Active)
        }
        other => panic!("unexpected event {}", other.event_type()),
    }

    // Waiting participants are not touched by a disconnect
    let waiting = h
        .engine
        .join_exercise(JoinRequest {
            access_code: ex.access_code.clone(),
            name: "bob".to_string(),
            team: String::new(),
        })
        .await
        .unwrap();
    h.engine
        .mark_disconnected(waiting.participant.participant_id)
        .await
        .unwrap();
    assert_eq!(
        reload(&h, waiting.participant.participant_id).await.status,
        ParticipantStatus::Waiting
    );
}

#[tokio::test]
async fn registry_flips_presence_on_last_session_only() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();
    let p = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;

    let registry = SessionRegistry::new(h.engine.clone());
    let first = registry.bind(p.participant_id).await.unwrap();
    let second = registry.bind(p.participant_id).await.unwrap();
    assert_eq!(registry.session_count().await, 2);

    // One tab closing does not mark the participant gone
    registry.unbind(first).await;
    assert_eq!(reload(&h, p.participant_id).await.status, ParticipantStatus::Active);

    registry.unbind(second).await;
    assert_eq!(reload(&h, p.participant_id).await.status, ParticipantStatus::Left);

    // A fresh session restores them
    registry.bind(p.participant_id).await.unwrap();
    assert_eq!(reload(&h, p.participant_id).await.status, ParticipantStatus::Active);

    // Unknown session ids are ignored
    registry.unbind(Uuid::new_v4()).await;
}

#[tokio::test]
async fn snapshot_shows_released_injects_without_answer_keys() {
    let h = setup().await;
    let mut new = scenario();
    new.injects[0].phases[1].correct_answer = vec!["A".to_string()];
    let ex = h.engine.create_exercise(h.facilitator, new).await.unwrap();
    let p = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;

    // Nothing released yet
    let snap = h
        .engine
        .exercise_snapshot(ex.id, p.participant_id)
        .await
        .unwrap();
    assert!(snap.injects.is_empty());

    h.engine.release_inject(h.facilitator, ex.id, 1).await.unwrap();
    let snap = h
        .engine
        .exercise_snapshot(ex.id, p.participant_id)
        .await
        .unwrap();
    assert_eq!(snap.injects.len(), 1);
    assert_eq!(snap.injects[0].inject_number, 1);
    assert!(snap.injects[0].phases.iter().all(|ph| ph.correct_answer.is_empty()));
    assert_eq!(snap.participant.participant_id, p.participant_id);
}

#[tokio::test]
async fn scoreboard_ranks_active_participants() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();
    let alice = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;
    let bob = admitted_participant(&h, ex.id, &ex.access_code, "bob").await;

    h.engine.release_inject(h.facilitator, ex.id, 1).await.unwrap();
    h.engine
        .submit_response(submit(alice.participant_id, 1, 2, 0, Answer::One("A".into())))
        .await
        .unwrap();
    h.engine
        .submit_response(submit(bob.participant_id, 1, 2, 0, Answer::One("Z".into())))
        .await
        .unwrap();

    let board = h.engine.scores(h.facilitator, ex.id).await.unwrap();
    assert_eq!(board.entries.len(), 2);
    assert_eq!(board.entries[0].name, "alice");
    assert_eq!(board.entries[0].total_score, 10);
    assert_eq!(board.entries[1].total_score, 0);
    assert!((board.average_score - 5.0).abs() < f64::EPSILON);
    assert_eq!(board.entries[0].inject_scores.len(), 1);
    assert_eq!(board.entries[0].inject_scores[0].points, 10);

    // Waiting participants stay off the board
    h.engine
        .join_exercise(JoinRequest {
            access_code: ex.access_code.clone(),
            name: "carol".to_string(),
            team: String::new(),
        })
        .await
        .unwrap();
    let board = h.engine.scores(h.facilitator, ex.id).await.unwrap();
    assert_eq!(board.entries.len(), 2);
}

#[tokio::test]
async fn remove_participant_frees_their_slot() {
    let h = setup().await;
    let mut new = scenario();
    new.max_participants = 1;
    let ex = h.engine.create_exercise(h.facilitator, new).await.unwrap();
    let p = admitted_participant(&h, ex.id, &ex.access_code, "alice").await;

    let err = h
        .engine
        .join_exercise(JoinRequest {
            access_code: ex.access_code.clone(),
            name: "bob".to_string(),
            team: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CapacityExceeded(_)));

    h.engine
        .remove_participant(h.facilitator, ex.id, p.participant_id)
        .await
        .unwrap();
    assert!(reload_opt(&h, p.participant_id).await.is_none());

    h.engine
        .join_exercise(JoinRequest {
            access_code: ex.access_code,
            name: "bob".to_string(),
            team: String::new(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn facilitator_ownership_is_enforced() {
    let h = setup().await;
    let ex = h.engine.create_exercise(h.facilitator, scenario()).await.unwrap();

    let other = db::facilitators::create(h.engine.db(), "other", "other-token")
        .await
        .unwrap();
    let err = h.engine.release_inject(other, ex.id, 1).await.unwrap_err();
    assert!(matches!(err, Error::NotAuthorized(_)));

    let err = h
        .engine
        .get_exercise(other, ex.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotAuthorized(_)));
}
