//! Constraint extractor: groups items into regions and runs the pass
//! pipeline over each region.

use crate::container::SpatialContainer;
use crate::pass::{default_passes, ExtractionPass, PartialGraph, RegionContext};
use crate::region::{room_face_tags, Grouping, TagGrouping};
use crate::rules::{bed_rules, FinderRegistry, ItemRule};
use rayon::prelude::*;
use std::collections::HashSet;
use u_layout_core::{
    ConstraintGraph, ContentDump, Error, ExtractConfig, Extraction, ExtractionReport, FloorDump,
    ItemConstraintObject, LayoutJson, RegionObject, RegionType, Result, RoomMeta,
};

/// Builds constraint graphs from a room and its items.
pub struct ConstraintsExtractor {
    config: ExtractConfig,
    grouping: Box<dyn Grouping>,
    rules: Vec<ItemRule>,
    finders: FinderRegistry,
    passes: Vec<Box<dyn ExtractionPass>>,
}

impl Default for ConstraintsExtractor {
    fn default() -> Self {
        Self::new(ExtractConfig::default())
    }
}

impl ConstraintsExtractor {
    /// Creates an extractor with tag grouping and the bed rule table.
    pub fn new(config: ExtractConfig) -> Self {
        Self {
            config,
            grouping: Box::new(TagGrouping),
            rules: bed_rules(),
            finders: FinderRegistry::default(),
            passes: default_passes(),
        }
    }

    /// Replaces the grouping collaborator.
    pub fn with_grouping(mut self, grouping: impl Grouping + 'static) -> Self {
        self.grouping = Box::new(grouping);
        self
    }

    /// Replaces the rule table.
    pub fn with_rules(mut self, rules: Vec<ItemRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Replaces the finder registry.
    pub fn with_finders(mut self, finders: FinderRegistry) -> Self {
        self.finders = finders;
        self
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Extracts a layout record.
    pub fn execute(&self, layout: &LayoutJson) -> Result<Extraction> {
        self.execute_by_dumps(&layout.floor_dump, &layout.content_dumps)
    }

    /// Extracts the constraint graph of `dumps` placed in `floor`.
    pub fn execute_by_dumps(&self, floor: &FloorDump, dumps: &[ContentDump]) -> Result<Extraction> {
        let mut seen = HashSet::new();
        for dump in dumps {
            if !seen.insert(dump.entity_id.as_str()) {
                return Err(Error::InvalidDump(format!(
                    "duplicate entity id '{}'",
                    dump.entity_id
                )));
            }
        }

        let grouped = self.grouping.group(floor, dumps, &self.config);
        log::info!(
            "grouped {} items of '{}' into {} regions",
            dumps.len(),
            floor.tag,
            grouped.groups.len()
        );

        let room = SpatialContainer::from_floor(floor, self.config.tolerance);
        let face_tags = room_face_tags(floor);
        let mut report = ExtractionReport::default();
        if room.is_degenerate(self.config.tolerance) {
            log::warn!("room '{}' has a degenerate boundary", floor.tag);
            report.degenerate_containers.push(room.id().to_string());
        }

        let mut graph = ConstraintGraph::new(RoomMeta::from_floor(floor));
        graph.set_group_infos(grouped.group_infos);
        let mut work: Vec<(RegionObject, Vec<ItemConstraintObject>)> = Vec::new();
        for group in grouped.groups {
            let mut region = RegionObject::new(group.id, group.region_type, floor.clone());
            region.face_tags = face_tags.clone();
            region.item_ids = group.dumps.iter().map(|d| d.entity_id.clone()).collect();
            let items = group
                .dumps
                .into_iter()
                .map(|d| ItemConstraintObject::new(region.id.clone(), d))
                .collect();
            graph.add_region(region.clone())?;
            work.push((region, items));
        }

        let extracted: Vec<(Vec<ItemConstraintObject>, ExtractionReport)> =
            if self.config.parallel_regions {
                work.into_par_iter()
                    .map(|(region, items)| self.extract_region(&region, &room, items))
                    .collect()
            } else {
                work.into_iter()
                    .map(|(region, items)| self.extract_region(&region, &room, items))
                    .collect()
            };

        for (items, region_report) in extracted {
            for item in items {
                graph.add_item(item)?;
            }
            report.merge(region_report);
        }

        log::info!(
            "extracted {} constraints for {} items ({} unanchored)",
            graph.dump().num_constraints(),
            graph.len(),
            report.unanchored.len()
        );
        Ok(Extraction { graph, report })
    }

    fn extract_region(
        &self,
        region: &RegionObject,
        room: &SpatialContainer,
        items: Vec<ItemConstraintObject>,
    ) -> (Vec<ItemConstraintObject>, ExtractionReport) {
        let mut graph = PartialGraph::new(items);
        if region.region_type != RegionType::Bed {
            log::warn!(
                "region '{}' has type '{}' without extraction rules",
                region.id,
                region.region_type
            );
            graph.report.unsupported_regions.push(region.id.clone());
            return graph.finish();
        }

        let ctx = RegionContext {
            region,
            room,
            config: &self.config,
            rules: &self.rules,
            finders: &self.finders,
        };
        for pass in &self.passes {
            graph = pass.run(&ctx, graph);
            log::debug!(
                "region '{}' after {} pass: {} anchored",
                region.id,
                pass.name(),
                graph.items().iter().filter(|i| i.has_constraints()).count()
            );
        }
        graph.finish()
    }
}
