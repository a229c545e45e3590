//! The layout session orchestrator.
//!
//! A [`LayoutSession`] owns the state of one target room: search results,
//! the selected candidate, parsed layouts, the category manager and the
//! completion context. Asynchronous operations are serialized by an
//! in-flight guard and tagged with the session generation; results are
//! computed first and committed only if the generation is unchanged.

use crate::category::CategoryManager;
use crate::config::SessionConfig;
use crate::events::{SessionEvent, SessionPhase};
use crate::search::{
    destructure_room_id, DesignSearchQuery, LayoutSearchQuery, RetryingSearchService,
    RoomTypeQuery, SearchResult, SearchService,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use u_layout_core::{
    ConstraintGraph, ConstraintGraphDump, ContentDump, Error, Extraction, ExtractionReport,
    FloorDump, GroupInfo, LayoutJson, Result, SolveOutcome, Solver,
};
use u_layout_extract::ConstraintsExtractor;

/// Content types dropped from inspiration data unless explicitly handled.
const SPECIAL_TYPES: [&str; 2] = ["curtain", "ceilinglight"];

/// Which items of the selected layout are placed by [`LayoutSession::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// Every item.
    #[default]
    Full,
    /// Only items whose categories are neither fixed nor occupied.
    Completion,
}

/// What [`LayoutSession::shuffle`] varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShuffleMode {
    /// Apply the next search result.
    NextLayout,
    /// Apply a random other search result.
    Random,
    /// Focus the next free category group and redo the completion.
    NextCategory,
}

/// Completion status of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Fixed,
    Proposed,
}

/// Per-call search overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOptions {
    /// Room types to search for; empty means "derive from the room".
    pub room_types: Vec<String>,
    pub k: Option<usize>,
    pub strict_mode: Option<bool>,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_room_types<I, S>(mut self, room_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.room_types = room_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = Some(strict);
        self
    }
}

/// Fixed and proposed items of an iterative completion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionContext {
    pub fixed: Vec<ContentDump>,
    pub proposed: Vec<ContentDump>,
    /// Categories that may still be proposed.
    pub categories: Vec<String>,
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_image: Option<String>,
    /// Extraction report of the last proposal.
    #[serde(default)]
    pub report: ExtractionReport,
}

/// Outcome of an apply: the graph that was solved and the placements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    /// Search result index, `None` for inspiration data.
    pub index: Option<usize>,
    pub graph: ConstraintGraphDump,
    pub report: ExtractionReport,
    pub outcome: SolveOutcome,
}

/// Layouts taken from another room, used by [`LayoutSession::apply_inspiration`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspirationData {
    pub layouts: Vec<LayoutJson>,
    #[serde(default)]
    pub group_infos: Vec<GroupInfo>,
}

/// Result of a shuffle.
#[derive(Debug, Clone, PartialEq)]
pub enum ShuffleOutcome {
    Applied(ApplyResult),
    Completed(CompletionContext),
}

#[derive(Debug, Default)]
struct SessionState {
    phase: SessionPhase,
    room: Option<FloorDump>,
    search_results: Vec<SearchResult>,
    selected_layout_index: usize,
    layouts: HashMap<usize, LayoutJson>,
    category_manager: Option<CategoryManager>,
    /// Category group chosen by the last category shuffle.
    focus: Option<Vec<String>>,
    completion: CompletionContext,
    completion_map: BTreeMap<String, CompletionStatus>,
    completion_index: Option<usize>,
    last_result: Option<ApplyResult>,
}

/// Clears the in-flight flag when the operation ends, including on drop.
///
/// An operation dropped mid-flight leaves its busy phase behind; the guard
/// puts back the phase the session had before it started.
struct InFlight<'a> {
    session: &'a LayoutSession,
    generation: u64,
    prior: SessionPhase,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let session = self.session;
        let restored = {
            let mut s = session.lock_state();
            if !session.is_disposed()
                && session.generation() == self.generation
                && s.phase.is_busy()
            {
                Some(std::mem::replace(&mut s.phase, self.prior))
            } else {
                None
            }
        };
        if let Some(from) = restored {
            log::debug!("abandoned operation restores phase {} -> {}", from, self.prior);
            session.emit(SessionEvent::PhaseChanged {
                from,
                to: self.prior,
            });
        }
        session.in_flight.store(false, Ordering::Release);
    }
}

/// Inputs of a completion, snapshotted before any await.
struct CompletionInputs {
    results: Vec<SearchResult>,
    layouts: HashMap<usize, LayoutJson>,
    manager: Option<CategoryManager>,
    previous_fixed: Vec<ContentDump>,
    focus: Option<Vec<String>>,
    images: Vec<String>,
}

/// A computed completion, not yet committed.
struct CompletionPlan {
    layouts: HashMap<usize, LayoutJson>,
    manager: CategoryManager,
    focus: Option<Vec<String>>,
    context: CompletionContext,
}

/// Stateful orchestrator of search, apply, completion and shuffle for one
/// target room.
pub struct LayoutSession {
    config: SessionConfig,
    search: Arc<dyn SearchService>,
    solver: Arc<dyn Solver>,
    extractor: ConstraintsExtractor,
    state: Mutex<SessionState>,
    in_flight: AtomicBool,
    generation: AtomicU64,
    disposed: AtomicBool,
    events: Mutex<Option<broadcast::Sender<SessionEvent>>>,
    rng: Mutex<StdRng>,
}

impl LayoutSession {
    /// Creates a session. Search calls are retried per `config.retry`.
    pub fn new(
        search: Arc<dyn SearchService>,
        solver: Arc<dyn Solver>,
        config: SessionConfig,
    ) -> Self {
        let search: Arc<dyn SearchService> =
            Arc::new(RetryingSearchService::new(search, config.retry.clone()));
        let (tx, _) = broadcast::channel(config.event_capacity.max(1));
        log::debug!("creating layout session with solver '{}'", solver.name());
        Self {
            extractor: ConstraintsExtractor::new(config.extract.clone()),
            rng: Mutex::new(StdRng::seed_from_u64(config.shuffle_seed)),
            config,
            search,
            solver,
            state: Mutex::new(SessionState::default()),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
            events: Mutex::new(Some(tx)),
        }
    }

    /// Sets the initial target room.
    pub fn with_room(self, room: FloorDump) -> Self {
        self.lock_state().room = Some(room);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribes to session events. The channel closes on [`dispose`](Self::dispose).
    pub fn subscribe(&self) -> Result<broadcast::Receiver<SessionEvent>> {
        self.ensure_live()?;
        lock(&self.events)
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(Error::SessionDisposed)
    }

    pub fn phase(&self) -> SessionPhase {
        self.lock_state().phase
    }

    pub fn room(&self) -> Option<FloorDump> {
        self.lock_state().room.clone()
    }

    pub fn search_results(&self) -> Vec<SearchResult> {
        self.lock_state().search_results.clone()
    }

    pub fn selected_layout_index(&self) -> usize {
        self.lock_state().selected_layout_index
    }

    pub fn completion_context(&self) -> CompletionContext {
        self.lock_state().completion.clone()
    }

    pub fn completion_status(&self, item_id: &str) -> Option<CompletionStatus> {
        self.lock_state().completion_map.get(item_id).copied()
    }

    pub fn category_manager(&self) -> Option<CategoryManager> {
        self.lock_state().category_manager.clone()
    }

    pub fn last_result(&self) -> Option<ApplyResult> {
        self.lock_state().last_result.clone()
    }

    /// Current generation; bumped by [`clear`](Self::clear) and [`dispose`](Self::dispose).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Searches candidate layouts for `room` and makes it the target room.
    ///
    /// Returns the number of results. On failure the previous results stay
    /// in place.
    pub async fn search(&self, room: FloorDump, options: SearchOptions) -> Result<usize> {
        let (_guard, generation) = self.begin("search")?;
        self.transition(generation, SessionPhase::Searching);

        let results = match self.run_search(&room, &options).await {
            Ok(results) => results,
            Err(e) => return self.fail(generation, "search", SessionPhase::SearchFailed, e),
        };

        let count = results.len();
        self.commit(generation, |s| {
            s.room = Some(room);
            s.search_results = results;
            s.selected_layout_index = 0;
            s.layouts.clear();
            s.category_manager = None;
            s.focus = None;
            s.completion_index = None;
        })?;
        log::info!("search returned {} candidate layouts", count);
        self.transition(generation, SessionPhase::Searched);
        self.emit(SessionEvent::SearchCompleted { results: count });
        Ok(count)
    }

    /// Applies search result `index` (the selected one when `None`) to the
    /// target room.
    pub async fn apply(&self, index: Option<usize>, mode: ApplyMode) -> Result<ApplyResult> {
        let (_guard, generation) = self.begin("apply")?;
        self.apply_selected(generation, index, mode).await
    }

    /// Applies a layout from another room to `room`.
    pub async fn apply_inspiration(
        &self,
        room: FloorDump,
        data: InspirationData,
        index: Option<usize>,
        handle_special_types: bool,
    ) -> Result<ApplyResult> {
        let (_guard, generation) = self.begin("apply_inspiration")?;
        let index = index.unwrap_or(0);
        let layout = data.layouts.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: data.layouts.len(),
        })?;
        let dumps: Vec<ContentDump> = layout
            .content_dumps
            .iter()
            .filter(|d| handle_special_types || !is_special(d))
            .cloned()
            .collect();
        if dumps.len() < layout.content_dumps.len() {
            log::debug!(
                "dropped {} special items from inspiration",
                layout.content_dumps.len() - dumps.len()
            );
        }

        self.transition(generation, SessionPhase::Applying);
        let computed = self
            .solve_layout(&layout.floor_dump, &dumps, &room, &data.group_infos)
            .await;
        let result = match computed {
            Ok((graph, report, outcome)) => ApplyResult {
                index: None,
                graph,
                report,
                outcome,
            },
            Err(e) => {
                return self.fail(generation, "apply_inspiration", SessionPhase::ApplyFailed, e)
            }
        };

        let committed = result.clone();
        self.commit(generation, |s| {
            s.room = Some(room);
            s.last_result = Some(committed);
        })?;
        self.finish_apply(generation, &result);
        Ok(result)
    }

    /// Fills `room` with items of layout `index` around the `fixed` items.
    ///
    /// Repeated calls refine the same completion context: items no longer
    /// fixed have their categories released.
    pub async fn complete_layout(
        &self,
        room: FloorDump,
        index: usize,
        fixed: Vec<ContentDump>,
    ) -> Result<CompletionContext> {
        let (_guard, generation) = self.begin("complete_layout")?;
        self.complete_inner(generation, room, index, fixed, false)
            .await
    }

    /// Varies the current result without a new search.
    pub async fn shuffle(&self, mode: ShuffleMode) -> Result<ShuffleOutcome> {
        let (_guard, generation) = self.begin("shuffle")?;
        match mode {
            ShuffleMode::NextLayout | ShuffleMode::Random => {
                let index = self.shuffle_index(mode)?;
                log::debug!("shuffle {:?} selects layout {}", mode, index);
                self.transition(generation, SessionPhase::Shuffling);
                self.apply_selected(generation, Some(index), ApplyMode::Full)
                    .await
                    .map(ShuffleOutcome::Applied)
            }
            ShuffleMode::NextCategory => {
                let (room, index, fixed) = {
                    let s = self.lock_state();
                    let room = s.room.clone().ok_or(Error::NoTargetRoom)?;
                    let index = s.completion_index.unwrap_or(s.selected_layout_index);
                    (room, index, s.completion.fixed.clone())
                };
                self.transition(generation, SessionPhase::Shuffling);
                self.complete_inner(generation, room, index, fixed, true)
                    .await
                    .map(ShuffleOutcome::Completed)
            }
        }
    }

    /// Moves every proposed item to the fixed set. Returns how many moved.
    pub fn accept_proposed(&self) -> Result<usize> {
        self.ensure_idle("accept_proposed")?;
        let count = {
            let mut s = self.lock_state();
            let proposed = std::mem::take(&mut s.completion.proposed);
            let categories: Vec<String> = proposed
                .iter()
                .flat_map(|d| d.categories.iter().cloned())
                .collect();
            for dump in &proposed {
                s.completion_map
                    .insert(dump.entity_id.clone(), CompletionStatus::Fixed);
            }
            let count = proposed.len();
            s.completion.fixed.extend(proposed);
            if let Some(manager) = s.category_manager.as_mut() {
                manager.occupy_categories(&categories);
                let rest = manager.rest();
                s.completion.categories = rest;
            }
            let taken = match (&s.focus, &s.category_manager) {
                (Some(ids), Some(manager)) => !manager.all_free(ids),
                _ => false,
            };
            if taken {
                s.focus = None;
            }
            count
        };
        self.emit(SessionEvent::ProposedAccepted { count });
        Ok(count)
    }

    /// Discards every proposed item. Returns how many were dropped.
    pub fn clear_proposed(&self) -> Result<usize> {
        self.ensure_idle("clear_proposed")?;
        let count = {
            let mut s = self.lock_state();
            let count = std::mem::take(&mut s.completion.proposed).len();
            s.completion_map
                .retain(|_, status| *status != CompletionStatus::Proposed);
            count
        };
        self.emit(SessionEvent::ProposedCleared { count });
        Ok(count)
    }

    /// Extracts a constraint graph from raw dumps.
    pub fn extract(&self, floor: &FloorDump, dumps: &[ContentDump]) -> Result<Extraction> {
        self.ensure_live()?;
        self.extractor.execute_by_dumps(floor, dumps)
    }

    /// Rebuilds a constraint graph from its dump.
    pub fn load_constraint_info_from_dump(&self, dump: ConstraintGraphDump) -> Result<ConstraintGraph> {
        self.ensure_live()?;
        ConstraintGraph::load(dump)
    }

    /// Whole-house template lookup. Does not touch session state.
    pub async fn design_search(&self, query: &DesignSearchQuery) -> Result<Vec<SearchResult>> {
        self.ensure_live()?;
        self.search.design_search(query).await
    }

    /// Resets all results and completion state. The target room is kept.
    /// Operations still in flight are superseded.
    pub fn clear(&self) -> Result<()> {
        self.ensure_live()?;
        let from = {
            let mut s = self.lock_state();
            self.generation.fetch_add(1, Ordering::AcqRel);
            let from = s.phase;
            *s = SessionState {
                room: s.room.take(),
                ..SessionState::default()
            };
            from
        };
        log::debug!("session cleared");
        if from != SessionPhase::Idle {
            self.emit(SessionEvent::PhaseChanged {
                from,
                to: SessionPhase::Idle,
            });
        }
        self.emit(SessionEvent::Cleared);
        Ok(())
    }

    /// Releases state and closes the event channel. Every later call fails
    /// with [`Error::SessionDisposed`].
    pub fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(Error::SessionDisposed);
        }
        let from = {
            let mut s = self.lock_state();
            self.generation.fetch_add(1, Ordering::AcqRel);
            let from = s.phase;
            *s = SessionState {
                phase: SessionPhase::Disposed,
                ..SessionState::default()
            };
            from
        };
        if let Some(tx) = lock(&self.events).take() {
            let _ = tx.send(SessionEvent::PhaseChanged {
                from,
                to: SessionPhase::Disposed,
            });
        }
        log::debug!("session disposed");
        Ok(())
    }

    async fn run_search(&self, room: &FloorDump, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let room_types = self.resolve_room_types(room, options).await?;
        let query = LayoutSearchQuery {
            room_id: room.tag.clone(),
            room_types,
            floor_outer_wkt: room.outer_wkt(),
            area: room.area(),
            k: options.k.unwrap_or(self.config.k),
            strict_mode: options.strict_mode.unwrap_or(self.config.strict_mode),
            origin: self.config.origin.clone(),
        };
        log::debug!("layout search for room '{}' ({:?})", query.room_id, query.room_types);
        self.search.layout_search(&query).await
    }

    async fn resolve_room_types(&self, room: &FloorDump, options: &SearchOptions) -> Result<Vec<String>> {
        if !options.room_types.is_empty() {
            return Ok(options.room_types.clone());
        }
        if !room.room_type.is_empty() {
            return Ok(vec![room.room_type.clone()]);
        }
        let query = RoomTypeQuery {
            floor_outer_wkt: room.outer_wkt(),
            source: self.config.origin.clone(),
        };
        let estimates = self.search.estimate_room_type(&query).await?;
        let room_type = estimates
            .first()
            .map(|e| destructure_room_id(&e.room_id).room_type)
            .filter(|t| !t.is_empty());
        match &room_type {
            Some(t) => log::info!("estimated room type '{}' for room '{}'", t, room.tag),
            None => log::warn!("room type of '{}' could not be estimated", room.tag),
        }
        Ok(room_type.into_iter().collect())
    }

    async fn apply_selected(
        &self,
        generation: u64,
        index: Option<usize>,
        mode: ApplyMode,
    ) -> Result<ApplyResult> {
        let (room, index, cached, result, excluded) = {
            let s = self.lock_state();
            let room = s.room.clone().ok_or(Error::NoTargetRoom)?;
            if s.search_results.is_empty() {
                return Err(Error::NoSearchResults);
            }
            let index = index.unwrap_or(s.selected_layout_index);
            let result = s
                .search_results
                .get(index)
                .cloned()
                .ok_or(Error::IndexOutOfRange {
                    index,
                    len: s.search_results.len(),
                })?;
            let excluded = match mode {
                ApplyMode::Full => HashSet::new(),
                ApplyMode::Completion => occupied_categories(&s),
            };
            (room, index, s.layouts.get(&index).cloned(), result, excluded)
        };

        self.transition(generation, SessionPhase::Applying);
        let computed = async {
            let layout = match cached {
                Some(layout) => layout,
                None => result.layout()?,
            };
            let dumps: Vec<ContentDump> = layout
                .content_dumps
                .iter()
                .filter(|d| !d.categories.iter().any(|c| excluded.contains(c)))
                .cloned()
                .collect();
            let solved = self
                .solve_layout(&layout.floor_dump, &dumps, &room, &[])
                .await?;
            Ok::<_, Error>((layout, solved))
        }
        .await;

        let (layout, (graph, report, outcome)) = match computed {
            Ok(v) => v,
            Err(e) => return self.fail(generation, "apply", SessionPhase::ApplyFailed, e),
        };
        let result = ApplyResult {
            index: Some(index),
            graph,
            report,
            outcome,
        };

        let committed = result.clone();
        self.commit(generation, |s| {
            s.selected_layout_index = index;
            s.layouts.insert(index, layout);
            s.last_result = Some(committed);
        })?;
        self.finish_apply(generation, &result);
        Ok(result)
    }

    /// Extract, dump/load round trip, then solve against `room`.
    async fn solve_layout(
        &self,
        source_floor: &FloorDump,
        dumps: &[ContentDump],
        room: &FloorDump,
        group_infos: &[GroupInfo],
    ) -> Result<(ConstraintGraphDump, ExtractionReport, SolveOutcome)> {
        let extraction = self.extractor.execute_by_dumps(source_floor, dumps)?;
        if !extraction.report.is_complete() {
            log::warn!(
                "extraction left {} items unanchored, {} partial matches",
                extraction.report.unanchored.len(),
                extraction.report.partial_matches.len()
            );
        }
        let mut dump = extraction.graph.dump();
        if !group_infos.is_empty() {
            dump.group_infos = group_infos.to_vec();
        }
        let graph = ConstraintGraph::load(dump.clone())?;
        let outcome = self.solver.solve(&graph, room).await?;
        Ok((dump, extraction.report, outcome))
    }

    async fn complete_inner(
        &self,
        generation: u64,
        room: FloorDump,
        index: usize,
        fixed: Vec<ContentDump>,
        advance_focus: bool,
    ) -> Result<CompletionContext> {
        let inputs = {
            let s = self.lock_state();
            if s.search_results.is_empty() {
                return Err(Error::NoSearchResults);
            }
            if index >= s.search_results.len() {
                return Err(Error::IndexOutOfRange {
                    index,
                    len: s.search_results.len(),
                });
            }
            CompletionInputs {
                results: s.search_results.clone(),
                layouts: s.layouts.clone(),
                manager: s.category_manager.clone(),
                previous_fixed: s.completion.fixed.clone(),
                focus: s.focus.clone(),
                images: s.completion.images.clone(),
            }
        };

        self.transition(generation, SessionPhase::Completing);
        let plan = match self
            .plan_completion(inputs, &room, index, &fixed, advance_focus)
            .await
        {
            Ok(plan) => plan,
            Err(e) => {
                return self.fail(generation, "complete_layout", SessionPhase::ApplyFailed, e)
            }
        };

        let context = plan.context.clone();
        self.commit(generation, |s| {
            let fixed_ids: HashSet<&str> = plan
                .context
                .fixed
                .iter()
                .map(|d| d.entity_id.as_str())
                .collect();
            s.completion_map.retain(|id, status| {
                *status == CompletionStatus::Fixed && fixed_ids.contains(id.as_str())
            });
            for dump in &plan.context.fixed {
                s.completion_map
                    .insert(dump.entity_id.clone(), CompletionStatus::Fixed);
            }
            for dump in &plan.context.proposed {
                s.completion_map
                    .insert(dump.entity_id.clone(), CompletionStatus::Proposed);
            }
            s.room = Some(room);
            s.layouts = plan.layouts;
            s.category_manager = Some(plan.manager);
            s.focus = plan.focus;
            s.completion = plan.context;
            s.completion_index = Some(index);
        })?;

        log::info!(
            "completion of layout {}: {} fixed, {} proposed",
            index,
            context.fixed.len(),
            context.proposed.len()
        );
        self.transition(generation, SessionPhase::Completed);
        self.emit(SessionEvent::CompletionUpdated {
            fixed: context.fixed.len(),
            proposed: context.proposed.len(),
        });
        Ok(context)
    }

    async fn plan_completion(
        &self,
        inputs: CompletionInputs,
        room: &FloorDump,
        index: usize,
        fixed: &[ContentDump],
        advance_focus: bool,
    ) -> Result<CompletionPlan> {
        let CompletionInputs {
            results,
            mut layouts,
            manager,
            previous_fixed,
            mut focus,
            mut images,
        } = inputs;

        for (i, result) in results.iter().enumerate() {
            if !layouts.contains_key(&i) {
                layouts.insert(i, result.layout()?);
            }
        }
        let mut manager = match manager {
            Some(manager) => manager,
            None => CategoryManager::from_layouts((0..results.len()).filter_map(|i| layouts.get(&i))),
        };

        let fixed_ids: HashSet<&str> = fixed.iter().map(|d| d.entity_id.as_str()).collect();
        let fixed_categories: Vec<String> = fixed
            .iter()
            .flat_map(|d| d.categories.iter().cloned())
            .collect();
        let released: Vec<String> = previous_fixed
            .iter()
            .filter(|d| !fixed_ids.contains(d.entity_id.as_str()))
            .flat_map(|d| d.categories.iter().cloned())
            .filter(|c| !fixed_categories.contains(c))
            .collect();
        if !released.is_empty() {
            manager.release(&released);
        }
        manager.occupy_categories(&fixed_categories);
        if focus.as_ref().is_some_and(|ids| !manager.all_free(ids)) {
            log::debug!("focused categories {:?} are taken", focus);
            focus = None;
        }

        if advance_focus {
            focus = manager.next_free().map(|g| g.ids.clone());
            log::debug!("category shuffle focuses {:?}", focus);
        }

        let layout = layouts
            .get(&index)
            .ok_or_else(|| Error::Internal(format!("layout {} was not parsed", index)))?;
        let candidates: Vec<ContentDump> = layout
            .content_dumps
            .iter()
            .filter(|d| !fixed_ids.contains(d.entity_id.as_str()))
            .filter(|d| d.categories.iter().all(|c| manager.is_free(c)))
            .filter(|d| match &focus {
                Some(ids) => d.categories.iter().any(|c| ids.contains(c)),
                None => true,
            })
            .cloned()
            .collect();

        let (proposed, report) = if candidates.is_empty() {
            (Vec::new(), ExtractionReport::default())
        } else {
            let (_, report, outcome) = self
                .solve_layout(&layout.floor_dump, &candidates, room, &[])
                .await?;
            (outcome.target_cos, report)
        };

        let chosen = &results[index];
        for image in &chosen.images {
            if !images.contains(image) {
                images.push(image.clone());
            }
        }

        let context = CompletionContext {
            fixed: fixed.to_vec(),
            proposed,
            categories: manager.rest(),
            images,
            result_image: chosen.result_image.clone(),
            report,
        };
        Ok(CompletionPlan {
            layouts,
            manager,
            focus,
            context,
        })
    }

    fn shuffle_index(&self, mode: ShuffleMode) -> Result<usize> {
        let (len, current) = {
            let s = self.lock_state();
            if s.room.is_none() {
                return Err(Error::NoTargetRoom);
            }
            (s.search_results.len(), s.selected_layout_index)
        };
        if len == 0 {
            return Err(Error::NoSearchResults);
        }
        let index = match mode {
            ShuffleMode::Random if len > 1 => {
                let pick = lock(&self.rng).gen_range(0..len - 1);
                if pick >= current {
                    pick + 1
                } else {
                    pick
                }
            }
            ShuffleMode::Random => 0,
            _ => (current + 1) % len,
        };
        Ok(index)
    }

    fn finish_apply(&self, generation: u64, result: &ApplyResult) {
        log::info!(
            "applied layout {:?} with solver '{}': {} placed, {} outside the room",
            result.index,
            self.solver.name(),
            result.outcome.target_cos.len(),
            result.outcome.out_of_room.len()
        );
        self.transition(generation, SessionPhase::Applied);
        self.emit(SessionEvent::Applied {
            index: result.index,
            placed: result.outcome.target_cos.len(),
            out_of_room: result.outcome.out_of_room.len(),
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.state)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::SessionDisposed)
        } else {
            Ok(())
        }
    }

    /// Synchronous mutations must not interleave with a running operation.
    fn ensure_idle(&self, operation: &'static str) -> Result<()> {
        self.ensure_live()?;
        if self.in_flight.load(Ordering::Acquire) {
            return Err(Error::OperationInFlight(operation));
        }
        Ok(())
    }

    fn begin(&self, operation: &'static str) -> Result<(InFlight<'_>, u64)> {
        self.ensure_live()?;
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::OperationInFlight(operation))?;
        let prior = self.lock_state().phase;
        let generation = self.generation();
        let guard = InFlight {
            session: self,
            generation,
            prior,
        };
        Ok((guard, generation))
    }

    /// Applies `f` to the state unless the session moved on since `generation`.
    fn commit<T>(&self, generation: u64, f: impl FnOnce(&mut SessionState) -> T) -> Result<T> {
        let mut s = self.lock_state();
        if self.is_disposed() {
            return Err(Error::SessionDisposed);
        }
        if self.generation() != generation {
            log::debug!("discarding result of superseded generation {}", generation);
            return Err(Error::Superseded);
        }
        Ok(f(&mut s))
    }

    fn transition(&self, generation: u64, to: SessionPhase) {
        let from = {
            let mut s = self.lock_state();
            if self.is_disposed() || self.generation() != generation {
                return;
            }
            std::mem::replace(&mut s.phase, to)
        };
        if from != to {
            log::debug!("session phase {} -> {}", from, to);
            self.emit(SessionEvent::PhaseChanged { from, to });
        }
    }

    fn fail<T>(
        &self,
        generation: u64,
        operation: &str,
        phase: SessionPhase,
        error: Error,
    ) -> Result<T> {
        log::warn!("{} failed: {}", operation, error);
        self.transition(generation, phase);
        self.emit(SessionEvent::OperationFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        });
        Err(error)
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = lock(&self.events).as_ref() {
            // No receivers is not an error.
            let _ = tx.send(event);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_special(dump: &ContentDump) -> bool {
    SPECIAL_TYPES
        .iter()
        .any(|t| dump.content_type.is_type_of(t))
}

/// Categories of fixed items and of used category groups.
fn occupied_categories(state: &SessionState) -> HashSet<String> {
    let mut out: HashSet<String> = state
        .completion
        .fixed
        .iter()
        .flat_map(|d| d.categories.iter().cloned())
        .collect();
    if let Some(manager) = &state.category_manager {
        for group in manager.groups().iter().filter(|g| !g.is_free()) {
            out.extend(group.ids.iter().cloned());
        }
    }
    out
}
