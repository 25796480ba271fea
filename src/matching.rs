//! Structural matching of graph regions up to identifier renaming.
//!
//! A [`Region`] is a closure inside some graph: a whole graph below its
//! sheet, or a selection and everything nested in it. Two regions match when
//! there is a bijection between their cuts, vertices and edges that
//! preserves nesting, constant names, relation names and argument
//! positions. Arguments that point outside a region are compared by the
//! ligature they belong to rather than by vertex.
//!
//! Identity edges are not matched one to one. Within each area they are
//! reduced to the blocks of vertices they join, so `x = y`, `y = x` and a
//! chain `x = y, y = z` against `=(x, y, z)` all compare equal.
//!
//! The search is a backtracking assignment of cuts (parents first) and then
//! vertices, pruned by id-free signatures: a bottom-up hash for each cut and
//! two rounds of colour refinement for each vertex. Once every vertex is
//! assigned, relation edges are matched as a multiset and identity blocks
//! as a set.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::canonical::canonical_hash;
use crate::error::EgiError;
use crate::graph::Egi;
use crate::ligature::LigatureIndex;
use crate::selection::Closure;
use crate::types::{ContextId, Edge, EdgeId, VertexId};

/// Area of an element relative to a region: `None` is the region's top
/// context, `Some(c)` a cut inside the region.
type Area = Option<ContextId>;

/// A region of a graph taking part in a match.
#[derive(Debug, Clone)]
pub(crate) struct Region<'a> {
    egi: &'a Egi,
    closure: Closure,
}

impl<'a> Region<'a> {
    pub fn new(egi: &'a Egi, closure: Closure) -> Self {
        Self { egi, closure }
    }

    /// Everything below the sheet.
    pub fn whole(egi: &'a Egi) -> Result<Self, EgiError> {
        Ok(Self::new(egi, Closure::of_area(egi, egi.root_id())?))
    }

    fn area_of(&self, owner: ContextId) -> Area {
        if owner == self.closure.top {
            None
        } else {
            Some(owner)
        }
    }

    fn parent_area(&self, cut: ContextId) -> Area {
        match self.egi.context(cut).ok().and_then(|c| c.parent) {
            Some(parent) => self.area_of(parent),
            None => None,
        }
    }

    fn vertex_area(&self, v: VertexId) -> Area {
        self.egi
            .vertex(v)
            .map(|x| self.area_of(x.context))
            .unwrap_or(None)
    }

    fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.closure
            .edges
            .iter()
            .filter_map(move |id| self.egi.edge(*id).ok())
    }

    fn relation_edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges().filter(|e| !e.identity)
    }

    fn identity_edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges().filter(|e| e.identity)
    }

    fn incident(&self, v: VertexId) -> impl Iterator<Item = &Edge> + '_ {
        self.egi
            .index()
            .incident(v)
            .iter()
            .filter(move |e| self.closure.edges.contains(*e))
            .filter_map(move |id| self.egi.edge(*id).ok())
    }
}

/// Extra constraints on a match.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MatchRules<'r> {
    /// Vertices in the top area must lie on the same ligature as their image.
    /// Only meaningful when both regions belong to the same graph.
    pub top_vertices_share_ligature: bool,
    /// Ligatures used for outside arguments and the top-vertex constraint.
    /// Defaults to each graph's own index.
    pub ligatures: Option<&'r LigatureIndex>,
}

/// A structure-preserving bijection between two regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    /// Context correspondence, including the two top contexts.
    pub contexts: BTreeMap<ContextId, ContextId>,
    /// Vertex correspondence.
    pub vertices: BTreeMap<VertexId, VertexId>,
    /// Relation edge correspondence. Identity edges are matched by the
    /// blocks of vertices they join and have no entry here.
    pub edges: BTreeMap<EdgeId, EdgeId>,
}

/// Id-free signatures of every cut and vertex of a region.
#[derive(Debug, Clone)]
pub(crate) struct Signatures {
    cuts: BTreeMap<ContextId, u64>,
    colours: BTreeMap<VertexId, u64>,
    top: u64,
}

#[derive(Serialize)]
struct EdgeShape<'a> {
    relation: &'a str,
    inner: Vec<bool>,
}

impl Signatures {
    pub fn compute<'g>(region: &Region<'g>) -> Self {
        let closure = &region.closure;
        let top = canonical_hash(&"top");

        let edge_shape = |edge: &'g Edge| EdgeShape {
            relation: edge.relation.as_str(),
            inner: edge.args.iter().map(|a| closure.contains_vertex(*a)).collect(),
        };

        // Cuts bottom-up: the closure lists parents before children.
        // Identity edges only count through the vertices they touch.
        let mut cuts: BTreeMap<ContextId, u64> = BTreeMap::new();
        for cut in closure.contexts.iter().rev() {
            let Ok(ctx) = region.egi.context(*cut) else { continue };
            let mut children: Vec<u64> = ctx.child_cuts().filter_map(|c| cuts.get(&c).copied()).collect();
            let mut vertices: Vec<&str> = Vec::new();
            let mut edges: Vec<u64> = Vec::new();
            for element in &ctx.area {
                if let Some(v) = element.as_vertex() {
                    if let Ok(vertex) = region.egi.vertex(v) {
                        vertices.push(vertex.name().unwrap_or(""));
                    }
                } else if let Some(e) = element.as_edge() {
                    if let Ok(edge) = region.egi.edge(e) {
                        if !edge.identity {
                            edges.push(canonical_hash(&edge_shape(edge)));
                        }
                    }
                }
            }
            children.sort_unstable();
            vertices.sort_unstable();
            edges.sort_unstable();
            cuts.insert(*cut, canonical_hash(&("cut", children, vertices, edges)));
        }

        let area_sig = |area: Area| match area {
            None => top,
            Some(c) => cuts.get(&c).copied().unwrap_or(0),
        };

        let mut round0: BTreeMap<VertexId, u64> = BTreeMap::new();
        for v in &closure.vertices {
            let Ok(vertex) = region.egi.vertex(*v) else { continue };
            let mut occurrences: Vec<(&str, usize, usize, u64)> = Vec::new();
            let mut identified_in: BTreeSet<u64> = BTreeSet::new();
            for edge in region.incident(*v) {
                if edge.identity {
                    identified_in.insert(area_sig(region.area_of(edge.context)));
                    continue;
                }
                for (position, arg) in edge.args.iter().enumerate() {
                    if arg == v {
                        occurrences.push((
                            edge.relation.as_str(),
                            edge.arity(),
                            position,
                            area_sig(region.area_of(edge.context)),
                        ));
                    }
                }
            }
            occurrences.sort_unstable();
            let own_area = area_sig(region.area_of(vertex.context));
            round0.insert(
                *v,
                canonical_hash(&(vertex.name().unwrap_or(""), own_area, occurrences, identified_in)),
            );
        }

        let mut colours: BTreeMap<VertexId, u64> = BTreeMap::new();
        for (v, base) in &round0 {
            let mut neighbourhood: Vec<(&str, usize, Vec<u64>)> = Vec::new();
            for edge in region.incident(*v).filter(|e| !e.identity) {
                for (position, arg) in edge.args.iter().enumerate() {
                    if arg == v {
                        let args = edge
                            .args
                            .iter()
                            .map(|a| round0.get(a).copied().unwrap_or(0))
                            .collect();
                        neighbourhood.push((edge.relation.as_str(), position, args));
                    }
                }
            }
            neighbourhood.sort_unstable();
            colours.insert(*v, canonical_hash(&(base, neighbourhood)));
        }

        Self { cuts, colours, top }
    }

    /// Sorted multiset of all signatures, for fingerprints and quick rejection.
    pub fn summary(&self, region: &Region<'_>) -> (Vec<u64>, Vec<u64>, Vec<u64>) {
        let mut cuts: Vec<u64> = self.cuts.values().copied().collect();
        let mut colours: Vec<u64> = self.colours.values().copied().collect();
        let mut edges: Vec<u64> = region
            .relation_edges()
            .map(|edge| {
                let args: Vec<u64> = edge
                    .args
                    .iter()
                    .map(|a| self.colours.get(a).copied().unwrap_or(0))
                    .collect();
                let area = match region.area_of(edge.context) {
                    None => self.top,
                    Some(c) => self.cuts.get(&c).copied().unwrap_or(0),
                };
                canonical_hash(&(edge.relation.as_str(), area, args))
            })
            .collect();
        cuts.sort_unstable();
        colours.sort_unstable();
        edges.sort_unstable();
        (cuts, colours, edges)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum ArgKey {
    Inner(VertexId),
    Outer(VertexId),
}

type EdgeKey = (Area, String, Vec<ArgKey>);

/// Identity blocks per area: each block is a set of arguments the area's
/// identity edges join, after merging edges that share an argument.
type IdentityBlocks = BTreeSet<(Area, BTreeSet<ArgKey>)>;

fn identity_blocks(edges: impl Iterator<Item = (Area, Vec<ArgKey>)>) -> IdentityBlocks {
    let mut by_area: BTreeMap<Area, Vec<BTreeSet<ArgKey>>> = BTreeMap::new();
    for (area, args) in edges {
        let mut merged: BTreeSet<ArgKey> = args.into_iter().collect();
        let blocks = by_area.entry(area).or_default();
        // Blocks are pairwise disjoint, so one pass absorbs every overlap.
        blocks.retain(|block| {
            if block.is_disjoint(&merged) {
                true
            } else {
                merged.extend(block.iter().cloned());
                false
            }
        });
        blocks.push(merged);
    }
    by_area
        .into_iter()
        .flat_map(|(area, blocks)| {
            blocks
                .into_iter()
                .filter(|block| block.len() > 1)
                .map(move |block| (area, block))
        })
        .collect()
}

struct Search<'s, 'a> {
    left: &'s Region<'a>,
    right: &'s Region<'a>,
    rules: MatchRules<'s>,
    left_sigs: Signatures,
    right_sigs: Signatures,
    cut_order: Vec<ContextId>,
    vertex_order: Vec<VertexId>,
    cut_map: BTreeMap<ContextId, ContextId>,
    cut_used: BTreeSet<ContextId>,
    vertex_map: BTreeMap<VertexId, VertexId>,
    vertex_used: BTreeSet<VertexId>,
}

impl<'s, 'a> Search<'s, 'a> {
    fn outer_key(&self, egi: &Egi, v: VertexId) -> ArgKey {
        let ligatures = match self.rules.ligatures {
            Some(ligatures) => ligatures,
            None => egi.ligatures(),
        };
        ArgKey::Outer(ligatures.representative(v).unwrap_or(v))
    }

    fn share_ligature(&self, a: VertexId, b: VertexId) -> bool {
        match self.rules.ligatures {
            Some(ligatures) => ligatures.same_class(a, b),
            None => self.left.egi.same_ligature(a, b),
        }
    }

    fn map_area(&self, area: Area) -> Option<Area> {
        match area {
            None => Some(None),
            Some(c) => self.cut_map.get(&c).map(|m| Some(*m)),
        }
    }

    fn cuts(&mut self, i: usize) -> Option<BTreeMap<EdgeId, EdgeId>> {
        let Some(cut) = self.cut_order.get(i).copied() else {
            return self.vertices(0);
        };
        let signature = self.left_sigs.cuts.get(&cut).copied();
        let parent = self.map_area(self.left.parent_area(cut))?;
        let candidates: Vec<ContextId> = self
            .right
            .closure
            .contexts
            .iter()
            .copied()
            .filter(|r| !self.cut_used.contains(r))
            .filter(|r| self.right_sigs.cuts.get(r).copied() == signature)
            .filter(|r| self.right.parent_area(*r) == parent)
            .collect();
        for candidate in candidates {
            self.cut_map.insert(cut, candidate);
            self.cut_used.insert(candidate);
            if let Some(edges) = self.cuts(i + 1) {
                return Some(edges);
            }
            self.cut_map.remove(&cut);
            self.cut_used.remove(&candidate);
        }
        None
    }

    fn vertices(&mut self, i: usize) -> Option<BTreeMap<EdgeId, EdgeId>> {
        let Some(v) = self.vertex_order.get(i).copied() else {
            return self.edges();
        };
        let colour = self.left_sigs.colours.get(&v).copied();
        let left_area = self.left.vertex_area(v);
        let area = self.map_area(left_area)?;
        let name = self.left.egi.vertex(v).ok().map(|x| x.constant.clone());
        let candidates: Vec<VertexId> = self
            .right
            .closure
            .vertices
            .iter()
            .copied()
            .filter(|r| !self.vertex_used.contains(r))
            .filter(|r| self.right_sigs.colours.get(r).copied() == colour)
            .filter(|r| self.right.vertex_area(*r) == area)
            .filter(|r| self.right.egi.vertex(*r).ok().map(|x| x.constant.clone()) == name)
            .filter(|r| {
                !(self.rules.top_vertices_share_ligature && left_area.is_none())
                    || self.share_ligature(v, *r)
            })
            .collect();
        for candidate in candidates {
            self.vertex_map.insert(v, candidate);
            self.vertex_used.insert(candidate);
            if let Some(edges) = self.vertices(i + 1) {
                return Some(edges);
            }
            self.vertex_map.remove(&v);
            self.vertex_used.remove(&candidate);
        }
        None
    }

    fn right_key(&self, edge: &Edge) -> EdgeKey {
        let args = edge
            .args
            .iter()
            .map(|a| {
                if self.right.closure.contains_vertex(*a) {
                    ArgKey::Inner(*a)
                } else {
                    self.outer_key(self.right.egi, *a)
                }
            })
            .collect();
        (self.right.area_of(edge.context), edge.relation.clone(), args)
    }

    fn left_key(&self, edge: &Edge) -> Option<EdgeKey> {
        let area = self.map_area(self.left.area_of(edge.context))?;
        let mut args = Vec::with_capacity(edge.arity());
        for a in &edge.args {
            if self.left.closure.contains_vertex(*a) {
                args.push(ArgKey::Inner(*self.vertex_map.get(a)?));
            } else {
                args.push(self.outer_key(self.left.egi, *a));
            }
        }
        Some((area, edge.relation.clone(), args))
    }

    fn edges(&self) -> Option<BTreeMap<EdgeId, EdgeId>> {
        let mut pool: BTreeMap<EdgeKey, Vec<EdgeId>> = BTreeMap::new();
        for edge in self.right.relation_edges() {
            pool.entry(self.right_key(edge)).or_default().push(edge.id);
        }
        let mut mapping = BTreeMap::new();
        for edge in self.left.relation_edges() {
            let key = self.left_key(edge)?;
            let image = pool.get_mut(&key)?.pop()?;
            mapping.insert(edge.id, image);
        }

        let right_blocks = identity_blocks(self.right.identity_edges().map(|edge| {
            let (area, _, args) = self.right_key(edge);
            (area, args)
        }));
        let mut left_keys = Vec::new();
        for edge in self.left.identity_edges() {
            let (area, _, args) = self.left_key(edge)?;
            left_keys.push((area, args));
        }
        if identity_blocks(left_keys.into_iter()) != right_blocks {
            return None;
        }
        Some(mapping)
    }
}

/// Find a structure-preserving bijection from `left` onto `right`.
pub(crate) fn find(left: &Region<'_>, right: &Region<'_>, rules: MatchRules<'_>) -> Option<Mapping> {
    let (l, r) = (&left.closure, &right.closure);
    if l.contexts.len() != r.contexts.len()
        || l.vertices.len() != r.vertices.len()
        || left.relation_edges().count() != right.relation_edges().count()
    {
        return None;
    }

    let left_sigs = Signatures::compute(left);
    let right_sigs = Signatures::compute(right);
    if left_sigs.summary(left) != right_sigs.summary(right) {
        return None;
    }

    // Most constrained vertices first.
    let mut class_size: BTreeMap<u64, usize> = BTreeMap::new();
    for colour in right_sigs.colours.values() {
        *class_size.entry(*colour).or_default() += 1;
    }
    let mut vertex_order: Vec<VertexId> = l.vertices.iter().copied().collect();
    vertex_order.sort_by_key(|v| {
        let colour = left_sigs.colours.get(v).copied().unwrap_or(0);
        (class_size.get(&colour).copied().unwrap_or(0), *v)
    });

    let mut search = Search {
        left,
        right,
        rules,
        left_sigs,
        right_sigs,
        cut_order: l.contexts.clone(),
        vertex_order,
        cut_map: BTreeMap::new(),
        cut_used: BTreeSet::new(),
        vertex_map: BTreeMap::new(),
        vertex_used: BTreeSet::new(),
    };
    let edges = search.cuts(0)?;

    let mut contexts = search.cut_map;
    contexts.insert(l.top, r.top);
    Some(Mapping {
        contexts,
        vertices: search.vertex_map,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EgiBuilder;

    fn implication(namespace: u64) -> Egi {
        let mut b = EgiBuilder::with_generator(crate::types::IdGenerator::with_namespace(namespace));
        let sheet = b.sheet();
        let outer = b.add_cut(sheet).unwrap();
        let x = b.add_vertex(outer).unwrap();
        b.add_edge(outer, "Man", vec![x]).unwrap();
        let inner = b.add_cut(outer).unwrap();
        let y = b.add_vertex(inner).unwrap();
        b.add_edge(inner, "Mortal", vec![y]).unwrap();
        b.add_identity(inner, vec![x, y]).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_whole_graphs_match_across_namespaces() {
        let a = implication(1);
        let b = implication(2);
        let mapping = find(&Region::whole(&a).unwrap(), &Region::whole(&b).unwrap(), MatchRules::default()).unwrap();
        assert_eq!(mapping.vertices.len(), 2);
        // The identity edge is matched as a block, not listed.
        assert_eq!(mapping.edges.len(), 2);
        assert_eq!(mapping.contexts.get(&a.root_id()), Some(&b.root_id()));
    }

    #[test]
    fn test_different_relations_do_not_match() {
        let a = implication(1);
        let mut b = EgiBuilder::new();
        let sheet = b.sheet();
        let outer = b.add_cut(sheet).unwrap();
        let x = b.add_vertex(outer).unwrap();
        b.add_edge(outer, "Man", vec![x]).unwrap();
        let inner = b.add_cut(outer).unwrap();
        let y = b.add_vertex(inner).unwrap();
        b.add_edge(inner, "Immortal", vec![y]).unwrap();
        b.add_identity(inner, vec![x, y]).unwrap();
        let b = b.build().unwrap();

        assert!(find(&Region::whole(&a).unwrap(), &Region::whole(&b).unwrap(), MatchRules::default()).is_none());
    }

    #[test]
    fn test_argument_order_matters() {
        let build = |swap: bool| {
            let mut b = EgiBuilder::new();
            let sheet = b.sheet();
            let x = b.add_constant(sheet, "Abelard").unwrap();
            let y = b.add_constant(sheet, "Heloise").unwrap();
            let args = if swap { vec![y, x] } else { vec![x, y] };
            b.add_edge(sheet, "Loves", args).unwrap();
            b.build().unwrap()
        };
        let a = build(false);
        let b = build(true);
        assert!(find(&Region::whole(&a).unwrap(), &Region::whole(&b).unwrap(), MatchRules::default()).is_none());
    }
}
