//! Integration tests for u-layout-session.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use u_layout_core::{
    ConstraintGraph, ContentDump, Error, FloorDump, GroupInfo, LayoutJson, Result, SolveOutcome,
    Solver,
};
use u_layout_session::{
    search_error, ApplyMode, CompletionStatus, DesignSearchQuery, IdentitySolver, InspirationData,
    LayoutSearchQuery, LayoutSession, ReplaySolver, RetryPolicy, RoomTypeEstimate, RoomTypeQuery,
    SearchOptions, SearchResult, SearchService, SessionConfig, SessionEvent, SessionPhase,
    ShuffleMode, ShuffleOutcome,
};

/// In-memory search service with switchable failure and latency.
#[derive(Default)]
struct FakeSearch {
    results: Vec<SearchResult>,
    fail: AtomicBool,
    delay_ms: u64,
    estimate: String,
    last_query: Mutex<Option<LayoutSearchQuery>>,
}

impl FakeSearch {
    fn new(results: Vec<SearchResult>) -> Self {
        Self {
            results,
            estimate: "Bedroom-7f3".to_string(),
            ..Default::default()
        }
    }

    fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    fn last_query(&self) -> Option<LayoutSearchQuery> {
        self.last_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchService for FakeSearch {
    async fn design_search(&self, _query: &DesignSearchQuery) -> Result<Vec<SearchResult>> {
        Ok(self.results.clone())
    }

    async fn estimate_room_type(&self, _query: &RoomTypeQuery) -> Result<Vec<RoomTypeEstimate>> {
        Ok(vec![RoomTypeEstimate {
            room_id: self.estimate.clone(),
        }])
    }

    async fn layout_search(&self, query: &LayoutSearchQuery) -> Result<Vec<SearchResult>> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        *self.last_query.lock().unwrap() = Some(query.clone());
        if self.fail.load(Ordering::SeqCst) {
            Err(search_error("service unavailable"))
        } else {
            Ok(self.results.clone())
        }
    }
}

/// Identity placement that fails on demand.
#[derive(Default)]
struct SwitchSolver {
    fail: AtomicBool,
}

#[async_trait]
impl Solver for SwitchSolver {
    async fn solve(&self, graph: &ConstraintGraph, room: &FloorDump) -> Result<SolveOutcome> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Solver("diverged".into()));
        }
        IdentitySolver.solve(graph, room).await
    }
}

fn bedroom(tag: &str, width: f64, depth: f64) -> FloorDump {
    FloorDump::rectangle(tag, "Bedroom", width, depth, 2.8).with_curve_tags(2, ["bedWallFace"])
}

fn bed() -> ContentDump {
    ContentDump::new("bed", "furniture/bed", [2.0, 2.0, 0.5])
        .with_position(3.0, 3.5, 0.0)
        .with_tag("bed")
        .with_host_tag("bedWallFace")
        .with_categories(["bed"])
}

fn nightstand() -> ContentDump {
    ContentDump::new("ns", "furniture/nightstand", [0.5, 0.5, 0.5])
        .with_position(4.55, 4.25, 0.0)
        .with_host_tag("bed")
        .with_categories(["nightstand"])
}

fn lamp() -> ContentDump {
    ContentDump::new("lamp", "lighting/floorlamp", [0.4, 0.4, 1.6])
        .with_position(1.0, 1.0, 0.0)
        .with_categories(["lamp"])
}

fn search_result(id: &str, items: Vec<ContentDump>) -> SearchResult {
    let layout = LayoutJson {
        floor_dump: bedroom("source-room", 6.0, 5.0),
        content_dumps: items,
    };
    SearchResult {
        id: id.to_string(),
        room_type: "Bedroom".to_string(),
        score: 0.9,
        layout_json_string: serde_json::to_string(&layout).unwrap(),
        images: vec![format!("{}.jpg", id)],
        result_image: Some(format!("{}-render.jpg", id)),
    }
}

fn config() -> SessionConfig {
    SessionConfig::new().with_retry(RetryPolicy::no_retry())
}

fn session_with(search: Arc<FakeSearch>) -> LayoutSession {
    LayoutSession::new(search, Arc::new(IdentitySolver), config())
}

mod lifecycle_tests {
    use super::*;
    use approx::assert_relative_eq;

    #[tokio::test]
    async fn test_search_apply_with_replay_solver() {
        let search = Arc::new(FakeSearch::new(vec![search_result(
            "a",
            vec![bed(), nightstand()],
        )]));
        let session = LayoutSession::new(search, Arc::new(ReplaySolver::new()), config());

        let target = bedroom("target-room", 8.0, 7.0);
        assert_eq!(session.search(target, SearchOptions::new()).await.unwrap(), 1);
        let result = session.apply(None, ApplyMode::Full).await.unwrap();

        assert_eq!(result.graph.num_constraints(), 6);
        assert!(result.report.unanchored.is_empty());
        let bed = result.outcome.placed("bed").unwrap();
        let ns = result.outcome.placed("ns").unwrap();
        assert_relative_eq!(bed.y, 5.5, epsilon = 1e-9);
        assert_relative_eq!(ns.x - bed.x, 1.55, epsilon = 1e-9);
        assert_relative_eq!(ns.y - bed.y, 0.75, epsilon = 1e-9);
        assert!(result.outcome.out_of_room.is_empty());
        assert_eq!(result.outcome.room_entity_object.id, "target-room");
        assert_eq!(session.phase(), SessionPhase::Applied);
    }

    #[tokio::test]
    async fn test_events_follow_phases() {
        let search = Arc::new(FakeSearch::new(vec![search_result("a", vec![bed()])]));
        let session = session_with(search);
        let mut rx = session.subscribe().unwrap();

        session
            .search(bedroom("r", 6.0, 5.0), SearchOptions::new())
            .await
            .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::PhaseChanged {
                from: SessionPhase::Idle,
                to: SessionPhase::Searching
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::PhaseChanged {
                from: SessionPhase::Searching,
                to: SessionPhase::Searched
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::SearchCompleted { results: 1 }
        );
    }

    #[tokio::test]
    async fn test_index_out_of_range() {
        let search = Arc::new(FakeSearch::new(vec![search_result("a", vec![bed()])]));
        let session = session_with(search);
        session
            .search(bedroom("r", 6.0, 5.0), SearchOptions::new())
            .await
            .unwrap();
        match session.apply(Some(4), ApplyMode::Full).await {
            Err(Error::IndexOutOfRange { index, len }) => {
                assert_eq!(index, 4);
                assert_eq!(len, 1);
            }
            other => panic!("unexpected: {:?}", other),
        }
        // Precondition errors leave the phase alone.
        assert_eq!(session.phase(), SessionPhase::Searched);
    }

    #[tokio::test]
    async fn test_dispose_is_checked() {
        let search = Arc::new(FakeSearch::new(Vec::new()));
        let session = session_with(search);
        let mut rx = session.subscribe().unwrap();

        session.dispose().unwrap();
        assert_eq!(session.phase(), SessionPhase::Disposed);
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::PhaseChanged {
                from: SessionPhase::Idle,
                to: SessionPhase::Disposed
            }
        );
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::broadcast::error::TryRecvError::Closed)
        ));

        let room = bedroom("r", 6.0, 5.0);
        assert!(matches!(
            session.search(room.clone(), SearchOptions::new()).await,
            Err(Error::SessionDisposed)
        ));
        assert!(matches!(
            session.apply(None, ApplyMode::Full).await,
            Err(Error::SessionDisposed)
        ));
        assert!(matches!(
            session.accept_proposed(),
            Err(Error::SessionDisposed)
        ));
        assert!(matches!(session.extract(&room, &[bed()]), Err(Error::SessionDisposed)));
        assert!(matches!(session.subscribe(), Err(Error::SessionDisposed)));
        assert!(matches!(session.clear(), Err(Error::SessionDisposed)));
        assert!(matches!(session.dispose(), Err(Error::SessionDisposed)));
    }

    #[tokio::test]
    async fn test_extract_and_load_through_session() {
        let session = session_with(Arc::new(FakeSearch::new(Vec::new())));
        let extraction = session
            .extract(&bedroom("r", 6.0, 5.0), &[bed(), nightstand()])
            .unwrap();
        let loaded = session
            .load_constraint_info_from_dump(extraction.dump())
            .unwrap();
        assert_eq!(loaded, extraction.graph);
    }
}

mod concurrency_tests {
    use super::*;

    #[tokio::test]
    async fn test_second_operation_is_rejected_while_in_flight() {
        let search = Arc::new(FakeSearch::new(vec![search_result("a", vec![bed()])]).with_delay(50));
        let session = session_with(search);
        let room = bedroom("r", 6.0, 5.0);

        let (searched, applied) = tokio::join!(session.search(room, SearchOptions::new()), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            session.apply(None, ApplyMode::Full).await
        });

        assert_eq!(searched.unwrap(), 1);
        assert!(matches!(applied, Err(Error::OperationInFlight("apply"))));

        // The guard is released once the search finished.
        assert!(session.apply(None, ApplyMode::Full).await.is_ok());
    }

    #[tokio::test]
    async fn test_sync_mutations_rejected_while_in_flight() {
        let search = Arc::new(FakeSearch::new(vec![search_result("a", vec![bed()])]).with_delay(50));
        let session = session_with(search);

        let (_, accepted) = tokio::join!(
            session.search(bedroom("r", 6.0, 5.0), SearchOptions::new()),
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                session.accept_proposed()
            }
        );
        assert!(matches!(
            accepted,
            Err(Error::OperationInFlight("accept_proposed"))
        ));
    }

    #[tokio::test]
    async fn test_clear_supersedes_running_search() {
        let search = Arc::new(FakeSearch::new(vec![search_result("a", vec![bed()])]).with_delay(50));
        let session = session_with(search);

        let (searched, cleared) = tokio::join!(
            session.search(bedroom("r", 6.0, 5.0), SearchOptions::new()),
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                session.clear()
            }
        );

        assert!(cleared.is_ok());
        assert!(matches!(searched, Err(Error::Superseded)));
        assert!(session.search_results().is_empty());
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_dropped_search_restores_phase() {
        let search = Arc::new(FakeSearch::new(vec![search_result("a", vec![bed()])]).with_delay(200));
        let session = session_with(search);
        let room = bedroom("r", 6.0, 5.0);

        let timed_out = tokio::time::timeout(
            Duration::from_millis(20),
            session.search(room.clone(), SearchOptions::new()),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.search_results().is_empty());

        // The abandoned search no longer blocks the session.
        assert!(session.accept_proposed().is_ok());
        assert_eq!(session.search(room, SearchOptions::new()).await.unwrap(), 1);
        assert_eq!(session.phase(), SessionPhase::Searched);
    }

    #[tokio::test]
    async fn test_shuffle_precondition_error_restores_phase() {
        let session = session_with(Arc::new(FakeSearch::new(Vec::new())));
        session
            .search(bedroom("r", 6.0, 5.0), SearchOptions::new())
            .await
            .unwrap();
        let mut rx = session.subscribe().unwrap();

        assert!(matches!(
            session.shuffle(ShuffleMode::NextCategory).await,
            Err(Error::NoSearchResults)
        ));
        assert_eq!(session.phase(), SessionPhase::Searched);
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::PhaseChanged {
                from: SessionPhase::Searched,
                to: SessionPhase::Shuffling
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::PhaseChanged {
                from: SessionPhase::Shuffling,
                to: SessionPhase::Searched
            }
        );
    }

    #[tokio::test]
    async fn test_failed_search_keeps_previous_results() {
        let search = Arc::new(FakeSearch::new(vec![
            search_result("a", vec![bed()]),
            search_result("b", vec![bed()]),
        ]));
        let session = session_with(search.clone());
        let room = bedroom("r", 6.0, 5.0);
        session.search(room.clone(), SearchOptions::new()).await.unwrap();
        session.apply(Some(1), ApplyMode::Full).await.unwrap();

        search.fail.store(true, Ordering::SeqCst);
        let failed = session.search(room, SearchOptions::new()).await;
        assert!(matches!(failed, Err(Error::Search(_))));
        assert_eq!(session.phase(), SessionPhase::SearchFailed);
        assert_eq!(session.search_results().len(), 2);
        assert_eq!(session.selected_layout_index(), 1);
        assert_eq!(session.last_result().unwrap().index, Some(1));
    }

    #[tokio::test]
    async fn test_failed_solve_keeps_last_result() {
        let search = Arc::new(FakeSearch::new(vec![
            search_result("a", vec![bed()]),
            search_result("b", vec![bed(), nightstand()]),
        ]));
        let solver = Arc::new(SwitchSolver::default());
        let session = LayoutSession::new(search, solver.clone(), config());
        session
            .search(bedroom("r", 6.0, 5.0), SearchOptions::new())
            .await
            .unwrap();
        let applied = session.apply(Some(1), ApplyMode::Full).await.unwrap();

        solver.fail.store(true, Ordering::SeqCst);
        let failed = session.apply(Some(0), ApplyMode::Full).await;
        assert!(matches!(failed, Err(Error::Solver(_))));
        assert_eq!(session.phase(), SessionPhase::ApplyFailed);
        assert_eq!(session.selected_layout_index(), 1);
        assert_eq!(session.last_result(), Some(applied));

        solver.fail.store(false, Ordering::SeqCst);
        assert_eq!(
            session.apply(Some(0), ApplyMode::Full).await.unwrap().index,
            Some(0)
        );
        assert_eq!(session.selected_layout_index(), 0);
    }
}

mod search_tests {
    use super::*;

    #[tokio::test]
    async fn test_room_type_is_estimated_when_missing() {
        let search = Arc::new(FakeSearch::new(Vec::new()));
        let session = session_with(search.clone());
        let room = FloorDump::rectangle("r", "", 4.0, 3.0, 2.8);

        session.search(room, SearchOptions::new()).await.unwrap();
        let query = search.last_query().unwrap();
        assert_eq!(query.room_types, vec!["Bedroom"]);
        assert_eq!(query.area, 12.0);
        assert_eq!(query.k, 5);
        assert_eq!(query.origin, "domestic");
        assert_eq!(query.floor_outer_wkt, "POLYGON((0 0, 4 0, 4 3, 0 3, 0 0))");
    }

    #[tokio::test]
    async fn test_options_override_room_and_config() {
        let search = Arc::new(FakeSearch::new(Vec::new()));
        let session = session_with(search.clone());

        session
            .search(
                bedroom("r", 6.0, 5.0),
                SearchOptions::new()
                    .with_room_types(["Study", "Bedroom"])
                    .with_k(2)
                    .with_strict_mode(true),
            )
            .await
            .unwrap();
        let query = search.last_query().unwrap();
        assert_eq!(query.room_types, vec!["Study", "Bedroom"]);
        assert_eq!(query.k, 2);
        assert!(query.strict_mode);
        assert_eq!(query.room_id, "r");
    }

    #[tokio::test]
    async fn test_design_search_leaves_state_alone() {
        let search = Arc::new(FakeSearch::new(vec![search_result("house", Vec::new())]));
        let session = session_with(search);
        let found = session
            .design_search(&DesignSearchQuery {
                k: 3,
                area: 90.0,
                bedroom_num: 2,
                livingroom_num: 1,
                bathroom_num: 1,
                excluded_region: Vec::new(),
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(session.search_results().is_empty());
        assert_eq!(session.phase(), SessionPhase::Idle);
    }
}

mod completion_tests {
    use super::*;

    async fn searched_session() -> LayoutSession {
        let search = Arc::new(FakeSearch::new(vec![
            search_result("a", vec![bed(), nightstand(), lamp()]),
            search_result("b", vec![bed()]),
        ]));
        let session = session_with(search);
        session
            .search(bedroom("r", 6.0, 5.0), SearchOptions::new())
            .await
            .unwrap();
        session
    }

    fn ids(dumps: &[ContentDump]) -> Vec<&str> {
        dumps.iter().map(|d| d.entity_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_complete_proposes_free_categories() {
        let session = searched_session().await;
        let ctx = session
            .complete_layout(bedroom("r", 6.0, 5.0), 0, vec![bed()])
            .await
            .unwrap();

        assert_eq!(ids(&ctx.fixed), vec!["bed"]);
        assert_eq!(ids(&ctx.proposed), vec!["ns", "lamp"]);
        assert!(!ctx.categories.contains(&"bed".to_string()));
        assert_eq!(ctx.images, vec!["a.jpg"]);
        assert_eq!(ctx.result_image.as_deref(), Some("a-render.jpg"));
        assert_eq!(session.completion_status("bed"), Some(CompletionStatus::Fixed));
        assert_eq!(session.completion_status("ns"), Some(CompletionStatus::Proposed));
        assert_eq!(session.phase(), SessionPhase::Completed);
    }

    #[tokio::test]
    async fn test_accept_then_refine() {
        let session = searched_session().await;
        let room = bedroom("r", 6.0, 5.0);
        session
            .complete_layout(room.clone(), 0, vec![bed()])
            .await
            .unwrap();

        assert_eq!(session.accept_proposed().unwrap(), 2);
        let ctx = session.completion_context();
        assert_eq!(ctx.fixed.len(), 3);
        assert!(ctx.proposed.is_empty());
        assert!(!ctx.categories.contains(&"lamp".to_string()));
        assert_eq!(session.completion_status("lamp"), Some(CompletionStatus::Fixed));

        // Everything is fixed: nothing left to propose.
        let fixed = ctx.fixed.clone();
        let ctx = session
            .complete_layout(room.clone(), 0, fixed)
            .await
            .unwrap();
        assert!(ctx.proposed.is_empty());

        // Unfixing the lamp releases its category again.
        let ctx = session
            .complete_layout(room, 0, vec![bed(), nightstand()])
            .await
            .unwrap();
        assert_eq!(ids(&ctx.proposed), vec!["lamp"]);
        assert_eq!(session.completion_status("lamp"), Some(CompletionStatus::Proposed));
        assert_eq!(ctx.images, vec!["a.jpg"]);
    }

    #[tokio::test]
    async fn test_clear_proposed_keeps_fixed() {
        let session = searched_session().await;
        session
            .complete_layout(bedroom("r", 6.0, 5.0), 0, vec![bed()])
            .await
            .unwrap();

        assert_eq!(session.clear_proposed().unwrap(), 2);
        let ctx = session.completion_context();
        assert_eq!(ids(&ctx.fixed), vec!["bed"]);
        assert!(ctx.proposed.is_empty());
        assert_eq!(session.completion_status("ns"), None);
        assert_eq!(session.completion_status("bed"), Some(CompletionStatus::Fixed));
    }

    #[tokio::test]
    async fn test_apply_in_completion_mode_skips_fixed_categories() {
        let session = searched_session().await;
        session
            .complete_layout(bedroom("r", 6.0, 5.0), 0, vec![bed()])
            .await
            .unwrap();
        let result = session.apply(Some(0), ApplyMode::Completion).await.unwrap();
        assert_eq!(ids(&result.outcome.target_cos), vec!["ns", "lamp"]);
    }

    #[tokio::test]
    async fn test_shuffle_next_category_focuses_one_group() {
        let session = searched_session().await;
        session
            .complete_layout(bedroom("r", 6.0, 5.0), 0, vec![bed()])
            .await
            .unwrap();

        match session.shuffle(ShuffleMode::NextCategory).await.unwrap() {
            ShuffleOutcome::Completed(ctx) => assert_eq!(ids(&ctx.proposed), vec!["ns"]),
            other => panic!("unexpected: {:?}", other),
        }
        match session.shuffle(ShuffleMode::NextCategory).await.unwrap() {
            ShuffleOutcome::Completed(ctx) => assert_eq!(ids(&ctx.proposed), vec!["lamp"]),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_accepted_focus_does_not_block_later_completion() {
        let session = searched_session().await;
        let room = bedroom("r", 6.0, 5.0);
        session
            .complete_layout(room.clone(), 0, vec![bed()])
            .await
            .unwrap();
        match session.shuffle(ShuffleMode::NextCategory).await.unwrap() {
            ShuffleOutcome::Completed(ctx) => assert_eq!(ids(&ctx.proposed), vec!["ns"]),
            other => panic!("unexpected: {:?}", other),
        }

        assert_eq!(session.accept_proposed().unwrap(), 1);
        let fixed = session.completion_context().fixed;
        let ctx = session.complete_layout(room, 0, fixed).await.unwrap();
        assert_eq!(ids(&ctx.proposed), vec!["lamp"]);
    }

    #[tokio::test]
    async fn test_fixing_focused_group_resets_focus() {
        let session = searched_session().await;
        let room = bedroom("r", 6.0, 5.0);
        session
            .complete_layout(room.clone(), 0, vec![bed()])
            .await
            .unwrap();
        session.shuffle(ShuffleMode::NextCategory).await.unwrap();

        // The nightstand is fixed directly instead of accepted.
        let ctx = session
            .complete_layout(room, 0, vec![bed(), nightstand()])
            .await
            .unwrap();
        assert_eq!(ids(&ctx.proposed), vec!["lamp"]);
    }

    #[tokio::test]
    async fn test_completion_carries_extraction_report() {
        let rug = ContentDump::new("rug", "rug", [2.0, 1.0, 0.0])
            .with_position(3.0, 2.0, 0.0)
            .with_categories(["rug"]);
        let search = Arc::new(FakeSearch::new(vec![search_result("a", vec![bed(), rug])]));
        let session = session_with(search);
        let room = bedroom("r", 6.0, 5.0);
        session.search(room.clone(), SearchOptions::new()).await.unwrap();

        let ctx = session.complete_layout(room, 0, vec![bed()]).await.unwrap();
        assert_eq!(ids(&ctx.proposed), vec!["rug"]);
        assert_eq!(ctx.report.unanchored, vec!["rug"]);
        assert!(!ctx.report.is_complete());
        assert_eq!(session.completion_context().report, ctx.report);
    }

    #[tokio::test]
    async fn test_empty_proposal_has_clean_report() {
        let session = searched_session().await;
        let ctx = session
            .complete_layout(bedroom("r", 6.0, 5.0), 1, vec![bed()])
            .await
            .unwrap();
        assert!(ctx.proposed.is_empty());
        assert!(ctx.report.is_complete());
    }

    #[tokio::test]
    async fn test_solver_failure_keeps_completion() {
        let search = Arc::new(FakeSearch::new(vec![search_result(
            "a",
            vec![bed(), nightstand(), lamp()],
        )]));
        let solver = Arc::new(SwitchSolver::default());
        let session = LayoutSession::new(search, solver.clone(), config());
        let room = bedroom("r", 6.0, 5.0);
        session.search(room.clone(), SearchOptions::new()).await.unwrap();
        let before = session
            .complete_layout(room.clone(), 0, vec![bed()])
            .await
            .unwrap();

        solver.fail.store(true, Ordering::SeqCst);
        let failed = session.complete_layout(room, 0, vec![bed(), lamp()]).await;
        assert!(matches!(failed, Err(Error::Solver(_))));
        assert_eq!(session.completion_context(), before);
        assert_eq!(session.completion_status("lamp"), Some(CompletionStatus::Proposed));
        assert_eq!(session.phase(), SessionPhase::ApplyFailed);
    }

    #[tokio::test]
    async fn test_shuffle_next_layout_applies() {
        let session = searched_session().await;
        match session.shuffle(ShuffleMode::NextLayout).await.unwrap() {
            ShuffleOutcome::Applied(result) => {
                assert_eq!(result.index, Some(1));
                assert_eq!(ids(&result.outcome.target_cos), vec!["bed"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(session.selected_layout_index(), 1);
    }
}

mod inspiration_tests {
    use super::*;

    fn inspiration() -> InspirationData {
        let curtain = ContentDump::new("curtain", "decor/curtain", [3.0, 0.1, 2.5])
            .with_position(3.0, 4.9, 0.0);
        InspirationData {
            layouts: vec![LayoutJson {
                floor_dump: bedroom("other-room", 6.0, 5.0),
                content_dumps: vec![bed(), nightstand(), curtain],
            }],
            group_infos: vec![GroupInfo {
                id: "sleep".to_string(),
                group_type: "Bed".to_string(),
                categories: vec!["bed".to_string(), "nightstand".to_string()],
                member_ids: vec!["bed".to_string(), "ns".to_string()],
                x_length: 2.55,
                y_length: 2.0,
            }],
        }
    }

    #[tokio::test]
    async fn test_special_types_are_dropped_by_default() {
        let session = session_with(Arc::new(FakeSearch::new(Vec::new())));
        let result = session
            .apply_inspiration(bedroom("r", 8.0, 7.0), inspiration(), None, false)
            .await
            .unwrap();
        assert_eq!(result.index, None);
        assert!(result.outcome.placed("curtain").is_none());
        assert!(result.outcome.placed("bed").is_some());
        assert_eq!(result.graph.group_infos, inspiration().group_infos);
        assert_eq!(session.room().unwrap().tag, "r");
    }

    #[tokio::test]
    async fn test_special_types_kept_on_request() {
        let session = session_with(Arc::new(FakeSearch::new(Vec::new())));
        let result = session
            .apply_inspiration(bedroom("r", 8.0, 7.0), inspiration(), Some(0), true)
            .await
            .unwrap();
        assert!(result.outcome.placed("curtain").is_some());

        assert!(matches!(
            session
                .apply_inspiration(bedroom("r", 8.0, 7.0), inspiration(), Some(3), true)
                .await,
            Err(Error::IndexOutOfRange { index: 3, len: 1 })
        ));
    }
}
