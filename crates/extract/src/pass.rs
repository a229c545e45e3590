//! The extraction pass pipeline.
//!
//! Each pass consumes the partial graph of one region and returns the next
//! one. Items are keyed by id; an item that already carries constraints is
//! never touched again by a later pass.

use crate::body::{match_containers, MatchOutcome};
use crate::container::SpatialContainer;
use crate::rules::{FinderRegistry, ItemRule};
use std::collections::HashMap;
use u_layout_core::{
    AnchorPass, Constraint, ConstraintKind, ExtractConfig, ExtractionReport, ItemConstraintObject,
    PartialMatch, RegionObject, UnresolvedHost,
};

/// Read-only inputs shared by every pass of one region.
pub struct RegionContext<'a> {
    pub region: &'a RegionObject,
    pub room: &'a SpatialContainer,
    pub config: &'a ExtractConfig,
    pub rules: &'a [ItemRule],
    pub finders: &'a FinderRegistry,
}

/// The items of one region while passes run, plus the gaps found so far.
#[derive(Debug, Clone)]
pub struct PartialGraph {
    items: Vec<ItemConstraintObject>,
    index: HashMap<String, usize>,
    containers: HashMap<String, SpatialContainer>,
    pub report: ExtractionReport,
}

/// What a source item is measured against.
enum Target<'a> {
    Item(&'a str),
    Room,
}

impl PartialGraph {
    /// Starts a region's graph from its items.
    pub fn new(items: Vec<ItemConstraintObject>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.clone(), i))
            .collect();
        let containers = items
            .iter()
            .map(|item| (item.id.clone(), SpatialContainer::from_item(item)))
            .collect();
        Self {
            items,
            index,
            containers,
            report: ExtractionReport::default(),
        }
    }

    pub fn items(&self) -> &[ItemConstraintObject] {
        &self.items
    }

    pub fn item(&self, id: &str) -> Option<&ItemConstraintObject> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    /// Finishes the region: records unanchored items and hands back the items.
    pub fn finish(mut self) -> (Vec<ItemConstraintObject>, ExtractionReport) {
        self.report.unanchored = self
            .items
            .iter()
            .filter(|item| !item.has_constraints())
            .map(|item| item.id.clone())
            .collect();
        (self.items, self.report)
    }

    /// Ids of items that still need constraints, in region order.
    fn pending(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| !item.has_constraints())
            .map(|item| item.id.clone())
            .collect()
    }

    fn set_host(&mut self, id: &str, host_id: Option<String>) {
        if let Some(&i) = self.index.get(id) {
            self.items[i].host_id = host_id;
        }
    }

    /// Matches `source_id` against `target` and stores the three constraints
    /// on success. Returns true when the item was anchored.
    fn anchor(
        &mut self,
        ctx: &RegionContext<'_>,
        source_id: &str,
        target: Target<'_>,
        kind: &ConstraintKind,
        pass: AnchorPass,
    ) -> bool {
        let Some(source) = self.containers.get(source_id) else {
            return false;
        };
        let (target_container, target_id, face_owner) = match target {
            Target::Item(id) => match self.containers.get(id) {
                Some(c) => (c, id, id),
                None => return false,
            },
            Target::Room => (ctx.room, ctx.region.id.as_str(), ctx.room.id()),
        };

        let matches = match match_containers(source, target_container, ctx.config) {
            MatchOutcome::Complete(matches) => matches,
            MatchOutcome::Partial(axes) => {
                log::warn!(
                    "partial match {} -> {} on {:?}, discarded",
                    source_id,
                    target_id,
                    axes
                );
                self.report.partial_matches.push(PartialMatch {
                    source_id: source_id.to_string(),
                    target_id: target_id.to_string(),
                    matched_axes: axes,
                });
                return false;
            }
            MatchOutcome::Unmatchable => {
                log::warn!("no face pair matches {} -> {}", source_id, target_id);
                let tol = ctx.config.tolerance;
                for container in [source, target_container] {
                    let id = container.id().to_string();
                    if container.is_degenerate(tol)
                        && !self.report.degenerate_containers.contains(&id)
                    {
                        self.report.degenerate_containers.push(id);
                    }
                }
                return false;
            }
        };

        let constraints: Vec<Constraint> = matches
            .iter()
            .map(|m| {
                let mut c = Constraint::distance_as_is(
                    source_id,
                    target_id,
                    face_owner,
                    m.self_face,
                    m.target_face,
                    m.distance,
                );
                c.kind = kind.clone();
                c
            })
            .collect();

        match self.index.get(source_id) {
            Some(&i) => {
                let item = &mut self.items[i];
                item.constraints = constraints;
                item.anchor = Some(pass);
                true
            }
            None => false,
        }
    }
}

/// One stage of the pipeline.
pub trait ExtractionPass: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &RegionContext<'_>, graph: PartialGraph) -> PartialGraph;
}

/// Anchors items to the peer whose `tag` equals their `hostTag`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostPass;

impl ExtractionPass for HostPass {
    fn name(&self) -> &'static str {
        "host"
    }

    fn run(&self, ctx: &RegionContext<'_>, mut graph: PartialGraph) -> PartialGraph {
        for id in graph.pending() {
            let host = graph.item(&id).and_then(|item| {
                let host_tag = item.host_tag()?;
                graph
                    .items()
                    .iter()
                    .find(|other| other.id != id && other.tag() == Some(host_tag))
                    .map(|other| other.id.clone())
            });
            let Some(host_id) = host else {
                continue;
            };
            graph.set_host(&id, Some(host_id.clone()));
            graph.anchor(
                ctx,
                &id,
                Target::Item(&host_id),
                &ConstraintKind::DistanceAsIs,
                AnchorPass::Host,
            );
        }
        graph
    }
}

/// Anchors items to peers chosen by the rule table; the first rule that
/// produces constraints wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulePass;

impl ExtractionPass for RulePass {
    fn name(&self) -> &'static str {
        "rule"
    }

    fn run(&self, ctx: &RegionContext<'_>, mut graph: PartialGraph) -> PartialGraph {
        for rule in ctx.rules {
            for id in graph.pending() {
                let reference = {
                    let Some(item) = graph.item(&id) else {
                        continue;
                    };
                    if !rule.applies_to(item) {
                        continue;
                    }
                    let candidates: Vec<&ItemConstraintObject> = graph
                        .items()
                        .iter()
                        .filter(|other| other.id != id && rule.is_reference(other))
                        .collect();
                    ctx.finders
                        .select(rule, item, &candidates)
                        .map(|r| r.id.clone())
                };
                let Some(ref_id) = reference else {
                    continue;
                };
                if graph.anchor(ctx, &id, Target::Item(&ref_id), &rule.kind, AnchorPass::Item) {
                    let unset = graph.item(&id).is_some_and(|item| item.host_id.is_none());
                    if unset {
                        graph.set_host(&id, Some(ref_id));
                    }
                }
            }
        }
        graph
    }
}

/// Anchors every remaining item to the room.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionPass;

impl ExtractionPass for RegionPass {
    fn name(&self) -> &'static str {
        "region"
    }

    fn run(&self, ctx: &RegionContext<'_>, mut graph: PartialGraph) -> PartialGraph {
        let region = ctx.region;
        for id in graph.pending() {
            let host_tag = graph
                .item(&id)
                .and_then(|item| item.host_tag())
                .map(str::to_string);

            if let Some(tag) = host_tag {
                let names_item = graph
                    .items()
                    .iter()
                    .any(|other| other.id != id && other.tag() == Some(tag.as_str()));
                if region.is_face_tag(&tag) || !names_item {
                    match region.host_face_id(&tag) {
                        Some(face_id) => graph.set_host(&id, Some(face_id.to_string())),
                        None => {
                            log::warn!("item {} has unresolved host tag '{}'", id, tag);
                            graph.report.unresolved_hosts.push(UnresolvedHost {
                                item_id: id.clone(),
                                host_tag: tag.clone(),
                            });
                        }
                    }
                }
            }

            if graph.anchor(
                ctx,
                &id,
                Target::Room,
                &ConstraintKind::DistanceAsIs,
                AnchorPass::Region,
            ) {
                let unset = graph.item(&id).is_some_and(|item| item.host_id.is_none());
                if unset {
                    graph.set_host(&id, Some(ctx.room.id().to_string()));
                }
            }
        }
        graph
    }
}

/// The default pipeline: host, rule, region.
pub fn default_passes() -> Vec<Box<dyn ExtractionPass>> {
    vec![Box::new(HostPass), Box::new(RulePass), Box::new(RegionPass)]
}
