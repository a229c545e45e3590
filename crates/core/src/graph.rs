//! Constraint graph: an arena of regions and items keyed by id, plus its
//! serializable dump.

use crate::constraint::{AxisGroup, Constraint};
use crate::dump::{ContentDump, ContentType, FloorDump, GroupInfo};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Functional type of a region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RegionType {
    /// A bed grouping (bed plus nightstands, bench, rug, ...).
    Bed,
    /// Any other region type; extracted without constraints.
    Other(String),
}

impl RegionType {
    pub fn as_str(&self) -> &str {
        match self {
            RegionType::Bed => "Bed",
            RegionType::Other(name) => name,
        }
    }
}

impl From<String> for RegionType {
    fn from(name: String) -> Self {
        if name.eq_ignore_ascii_case("bed") {
            RegionType::Bed
        } else {
            RegionType::Other(name)
        }
    }
}

impl From<&str> for RegionType {
    fn from(name: &str) -> Self {
        RegionType::from(name.to_string())
    }
}

impl From<RegionType> for String {
    fn from(region_type: RegionType) -> Self {
        region_type.as_str().to_string()
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The extraction pass that anchored an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnchorPass {
    /// Anchored to the item named by its host tag.
    Host,
    /// Anchored to a peer by an item rule.
    Item,
    /// Anchored to the room.
    Region,
}

/// A named cluster of items sharing one dependency structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionObject {
    pub id: String,
    pub region_type: RegionType,
    /// Boundary of the room the region lives in.
    pub floor: FloorDump,
    /// Member item ids, in input order.
    pub item_ids: Vec<String>,
    /// Symbolic face tag -> concrete room face id.
    #[serde(default)]
    pub face_tags: BTreeMap<String, String>,
}

impl RegionObject {
    /// Creates an empty region.
    pub fn new(id: impl Into<String>, region_type: RegionType, floor: FloorDump) -> Self {
        Self {
            id: id.into(),
            region_type,
            floor,
            item_ids: Vec::new(),
            face_tags: BTreeMap::new(),
        }
    }

    /// Id of the room container this region is measured against.
    pub fn room_id(&self) -> &str {
        &self.floor.tag
    }

    /// Resolves a symbolic face tag to a room face id.
    pub fn host_face_id(&self, tag: &str) -> Option<&str> {
        self.face_tags.get(tag).map(String::as_str)
    }

    /// Returns true when `tag` should be treated as a face tag rather than
    /// an item tag.
    pub fn is_face_tag(&self, tag: &str) -> bool {
        self.face_tags.contains_key(tag) || tag.contains("Face")
    }
}

/// One placeable item and the constraints it accumulated.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemConstraintObject {
    pub id: String,
    pub region_id: String,
    pub dump: ContentDump,
    pub constraints: Vec<Constraint>,
    pub host_id: Option<String>,
    pub anchor: Option<AnchorPass>,
}

impl ItemConstraintObject {
    /// Wraps a content dump; the entity id becomes the item id.
    pub fn new(region_id: impl Into<String>, dump: ContentDump) -> Self {
        Self {
            id: dump.entity_id.clone(),
            region_id: region_id.into(),
            dump,
            constraints: Vec::new(),
            host_id: None,
            anchor: None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        self.dump.tag.as_deref()
    }

    pub fn host_tag(&self) -> Option<&str> {
        self.dump.host_tag.as_deref()
    }

    pub fn content_type(&self) -> &ContentType {
        &self.dump.content_type
    }

    pub fn has_constraints(&self) -> bool {
        !self.constraints.is_empty()
    }

    /// The constraint on `group`, if any.
    pub fn constraint_on(&self, group: AxisGroup) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.axis_group() == group)
    }
}

/// Summary of the room the graph was extracted from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMeta {
    pub room_id: String,
    pub room_type: String,
    pub num_outer_curves: usize,
}

impl RoomMeta {
    pub fn from_floor(floor: &FloorDump) -> Self {
        Self {
            room_id: floor.tag.clone(),
            room_type: floor.room_type.clone(),
            num_outer_curves: floor.num_outer_curves(),
        }
    }
}

/// Serialized form of an item (constraints live in the dump's lists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemObjectDump {
    pub id: String,
    pub region_id: String,
    pub content: ContentDump,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
}

/// Serializable snapshot of a [`ConstraintGraph`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintGraphDump {
    #[serde(default)]
    pub room_meta: RoomMeta,
    #[serde(default)]
    pub region_objects: Vec<RegionObject>,
    #[serde(default)]
    pub item_objects: Vec<ItemObjectDump>,
    /// Constraints against host items.
    #[serde(default)]
    pub host_constraints: Vec<Constraint>,
    /// Constraints against rule-selected peers.
    #[serde(default)]
    pub item_constraints: Vec<Constraint>,
    /// Constraints against the room.
    #[serde(default)]
    pub region_constraints: Vec<Constraint>,
    #[serde(default)]
    pub group_infos: Vec<GroupInfo>,
}

impl ConstraintGraphDump {
    /// Total number of constraints in the three lists.
    pub fn num_constraints(&self) -> usize {
        self.host_constraints.len() + self.item_constraints.len() + self.region_constraints.len()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Arena of regions and items keyed by id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstraintGraph {
    room_meta: RoomMeta,
    regions: Vec<RegionObject>,
    items: Vec<ItemConstraintObject>,
    index: HashMap<String, usize>,
    group_infos: Vec<GroupInfo>,
}

impl ConstraintGraph {
    /// Creates an empty graph for a room.
    pub fn new(room_meta: RoomMeta) -> Self {
        Self {
            room_meta,
            ..Self::default()
        }
    }

    pub fn room_meta(&self) -> &RoomMeta {
        &self.room_meta
    }

    pub fn regions(&self) -> &[RegionObject] {
        &self.regions
    }

    pub fn region(&self, id: &str) -> Option<&RegionObject> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn items(&self) -> &[ItemConstraintObject] {
        &self.items
    }

    pub fn item(&self, id: &str) -> Option<&ItemConstraintObject> {
        self.index.get(id).map(|&i| &self.items[i])
    }

    pub fn item_mut(&mut self, id: &str) -> Option<&mut ItemConstraintObject> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.items[i]),
            None => None,
        }
    }

    pub fn group_infos(&self) -> &[GroupInfo] {
        &self.group_infos
    }

    pub fn set_group_infos(&mut self, group_infos: Vec<GroupInfo>) {
        self.group_infos = group_infos;
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Adds a region. Region ids must be unique.
    pub fn add_region(&mut self, region: RegionObject) -> Result<()> {
        if self.region(&region.id).is_some() {
            return Err(Error::InvalidDump(format!(
                "duplicate region id '{}'",
                region.id
            )));
        }
        self.regions.push(region);
        Ok(())
    }

    /// Adds an item. Item ids must be unique across all regions.
    pub fn add_item(&mut self, item: ItemConstraintObject) -> Result<()> {
        if self.index.contains_key(&item.id) {
            return Err(Error::InvalidDump(format!("duplicate item id '{}'", item.id)));
        }
        self.index.insert(item.id.clone(), self.items.len());
        self.items.push(item);
        Ok(())
    }

    /// Items of one region, in region order.
    pub fn region_items<'a>(
        &'a self,
        region: &'a RegionObject,
    ) -> impl Iterator<Item = &'a ItemConstraintObject> + 'a {
        region.item_ids.iter().filter_map(move |id| self.item(id))
    }

    /// All constraints anchored by `pass`, in item order.
    pub fn constraints_of(&self, pass: AnchorPass) -> impl Iterator<Item = &Constraint> {
        self.items
            .iter()
            .filter(move |item| item.anchor == Some(pass))
            .flat_map(|item| item.constraints.iter())
    }

    /// Ids of items left without constraints.
    pub fn unanchored(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|item| !item.has_constraints())
            .map(|item| item.id.as_str())
            .collect()
    }

    /// Snapshots the graph.
    pub fn dump(&self) -> ConstraintGraphDump {
        ConstraintGraphDump {
            room_meta: self.room_meta.clone(),
            region_objects: self.regions.clone(),
            item_objects: self
                .items
                .iter()
                .map(|item| ItemObjectDump {
                    id: item.id.clone(),
                    region_id: item.region_id.clone(),
                    content: item.dump.clone(),
                    host_id: item.host_id.clone(),
                })
                .collect(),
            host_constraints: self.constraints_of(AnchorPass::Host).cloned().collect(),
            item_constraints: self.constraints_of(AnchorPass::Item).cloned().collect(),
            region_constraints: self.constraints_of(AnchorPass::Region).cloned().collect(),
            group_infos: self.group_infos.clone(),
        }
    }

    /// Rebuilds a graph from a dump, rejecting duplicate ids and dangling
    /// references.
    pub fn load(dump: ConstraintGraphDump) -> Result<Self> {
        let mut graph = ConstraintGraph::new(dump.room_meta);
        graph.group_infos = dump.group_infos;

        for region in dump.region_objects {
            graph.add_region(region)?;
        }

        for object in dump.item_objects {
            if graph.region(&object.region_id).is_none() {
                return Err(Error::InvalidDump(format!(
                    "item '{}' references unknown region '{}'",
                    object.id, object.region_id
                )));
            }
            graph.add_item(ItemConstraintObject {
                id: object.id,
                region_id: object.region_id,
                dump: object.content,
                constraints: Vec::new(),
                host_id: object.host_id,
                anchor: None,
            })?;
        }

        for region in &graph.regions {
            for id in &region.item_ids {
                if !graph.index.contains_key(id) {
                    return Err(Error::InvalidDump(format!(
                        "region '{}' lists unknown item '{}'",
                        region.id, id
                    )));
                }
            }
        }

        let lists = [
            (AnchorPass::Host, dump.host_constraints),
            (AnchorPass::Item, dump.item_constraints),
            (AnchorPass::Region, dump.region_constraints),
        ];
        let mut seen = HashSet::new();
        for (pass, constraints) in lists {
            for constraint in constraints {
                if !seen.insert(constraint.id.clone()) {
                    return Err(Error::InvalidDump(format!(
                        "duplicate constraint id '{}'",
                        constraint.id
                    )));
                }
                graph.attach(pass, constraint)?;
            }
        }

        Ok(graph)
    }

    fn attach(&mut self, pass: AnchorPass, constraint: Constraint) -> Result<()> {
        let target_known = self.index.contains_key(&constraint.target_id)
            || self.region(&constraint.target_id).is_some();
        if !target_known {
            return Err(Error::InvalidDump(format!(
                "constraint '{}' targets unknown id '{}'",
                constraint.id, constraint.target_id
            )));
        }
        let item = self
            .item_mut(&constraint.source_id)
            .ok_or_else(|| Error::UnknownItem(constraint.source_id.clone()))?;
        if let Some(existing) = item.anchor {
            if existing != pass {
                return Err(Error::InvalidDump(format!(
                    "item '{}' has constraints from more than one pass",
                    item.id
                )));
            }
        }
        item.anchor = Some(pass);
        item.constraints.push(constraint);
        Ok(())
    }
}
