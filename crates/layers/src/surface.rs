use std::collections::BTreeMap;

use serde_json::{Value, json};
use tracing::error;

use crate::layer::{Filter, LayerSpec, SourceSpec};
use crate::symbology::Paint;

/// The external map the reconciler drives.
///
/// Mutations address layers by id. Adding a source or layer whose id already
/// exists is a caller error; [`Reconciler`](crate::Reconciler) never does it.
pub trait MapSurface {
    fn has_source(&self, id: &str) -> bool;
    fn add_source(&mut self, spec: &SourceSpec);

    /// Current state of a layer, if present.
    fn layer(&self, id: &str) -> Option<LayerSpec>;
    fn add_layer(&mut self, spec: &LayerSpec);
    fn remove_layer(&mut self, id: &str);

    fn set_filter(&mut self, id: &str, filter: Option<&Filter>);
    fn set_paint(&mut self, id: &str, paint: &Paint);
    fn set_visibility(&mut self, id: &str, visible: bool);

    fn has_layer(&self, id: &str) -> bool {
        self.layer(id).is_some()
    }
}

/// Per-operation counters recorded by [`InMemoryMap`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MapOps {
    pub sources_added: usize,
    pub layers_added: usize,
    pub layers_removed: usize,
    pub filters_set: usize,
    pub paints_set: usize,
    pub visibility_set: usize,
    /// Duplicate adds and updates addressed to missing layers.
    pub rejected: usize,
}

/// Map surface kept in memory; layers are kept in insertion order.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMap {
    sources: BTreeMap<String, SourceSpec>,
    layers: Vec<LayerSpec>,
    ops: MapOps,
}

impl InMemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> MapOps {
        self.ops
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceSpec> {
        self.sources.values()
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn visible_layer_ids(&self) -> Vec<&str> {
        self.layers
            .iter()
            .filter(|l| l.visible)
            .map(|l| l.id.as_str())
            .collect()
    }

    /// Sources and layers as a style-document fragment, in insertion order.
    pub fn to_style_json(&self) -> Value {
        let sources: serde_json::Map<String, Value> = self
            .sources
            .values()
            .map(|s| (s.id.clone(), json!({ "type": "vector", "url": s.url })))
            .collect();
        let layers: Vec<Value> = self
            .layers
            .iter()
            .map(|l| {
                let mut layer = json!({
                    "id": l.id,
                    "type": l.kind,
                    "source": l.source,
                    "source-layer": l.source_layer,
                    "paint": l.paint,
                    "layout": { "visibility": if l.visible { "visible" } else { "none" } },
                });
                if let Some(filter) = &l.filter {
                    layer["filter"] = filter.to_json();
                }
                layer
            })
            .collect();
        json!({ "sources": sources, "layers": layers })
    }

    fn layer_mut(&mut self, id: &str) -> Option<&mut LayerSpec> {
        let found = self.layers.iter_mut().find(|l| l.id == id);
        if found.is_none() {
            error!(layer = id, "update addressed to missing layer");
            self.ops.rejected += 1;
        }
        found
    }
}

impl MapSurface for InMemoryMap {
    fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    fn add_source(&mut self, spec: &SourceSpec) {
        if self.sources.contains_key(&spec.id) {
            error!(source = %spec.id, "source already exists");
            self.ops.rejected += 1;
            return;
        }
        self.sources.insert(spec.id.clone(), spec.clone());
        self.ops.sources_added += 1;
    }

    fn layer(&self, id: &str) -> Option<LayerSpec> {
        self.layers.iter().find(|l| l.id == id).cloned()
    }

    fn add_layer(&mut self, spec: &LayerSpec) {
        if self.has_layer(&spec.id) || !self.sources.contains_key(&spec.source) {
            error!(layer = %spec.id, source = %spec.source, "cannot add layer");
            self.ops.rejected += 1;
            return;
        }
        self.layers.push(spec.clone());
        self.ops.layers_added += 1;
    }

    fn remove_layer(&mut self, id: &str) {
        let before = self.layers.len();
        self.layers.retain(|l| l.id != id);
        if self.layers.len() == before {
            self.ops.rejected += 1;
        } else {
            self.ops.layers_removed += 1;
        }
    }

    fn set_filter(&mut self, id: &str, filter: Option<&Filter>) {
        if let Some(layer) = self.layer_mut(id) {
            layer.filter = filter.cloned();
            self.ops.filters_set += 1;
        }
    }

    fn set_paint(&mut self, id: &str, paint: &Paint) {
        if let Some(layer) = self.layer_mut(id) {
            layer.paint = paint.clone();
            self.ops.paints_set += 1;
        }
    }

    fn set_visibility(&mut self, id: &str, visible: bool) {
        if let Some(layer) = self.layer_mut(id) {
            layer.visible = visible;
            self.ops.visibility_set += 1;
        }
    }
}
