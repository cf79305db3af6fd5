use crate::models::torrent::Torrent;
use std::collections::BTreeSet;
use std::sync::Arc;

/// How a row was clicked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickModifier {
    /// Plain click: select only this torrent
    None,
    /// Ctrl/Cmd click: toggle this torrent
    Toggle,
    /// Shift click: select the range from the anchor
    Range,
}

/// Ids of the currently selected torrents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<i64>,
    anchor: Option<i64>,
}

impl Selection {
    pub fn ids(&self) -> &BTreeSet<i64> {
        &self.ids
    }

    pub fn anchor(&self) -> Option<i64> {
        self.anchor
    }

    pub fn set(&mut self, ids: impl IntoIterator<Item = i64>) {
        self.ids = ids.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.anchor = None;
    }

    /// Apply a row click against the current display order
    pub fn click(&mut self, id: i64, modifier: ClickModifier, display: &[Arc<Torrent>]) {
        match (modifier, self.anchor) {
            (ClickModifier::Range, Some(anchor)) => {
                self.ids = range_between(display, anchor, id).into_iter().collect();
            }
            (ClickModifier::Toggle, _) => {
                if !self.ids.remove(&id) {
                    self.ids.insert(id);
                }
                self.anchor = Some(id);
            }
            _ => {
                self.ids = BTreeSet::from([id]);
                self.anchor = Some(id);
            }
        }
    }

    /// Drop ids that are no longer present; returns how many were dropped
    pub fn retain(&mut self, mut present: impl FnMut(i64) -> bool) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| present(*id));
        if let Some(anchor) = self.anchor {
            if !present(anchor) {
                self.anchor = None;
            }
        }
        before - self.ids.len()
    }
}

/// Ids spanning `anchor..=target` in `display` order.
///
/// Positions are resolved against the order passed in, never a remembered
/// one. A hidden anchor degrades to selecting just the target; a hidden
/// target selects nothing.
pub fn range_between(display: &[Arc<Torrent>], anchor: i64, target: i64) -> Vec<i64> {
    let Some(target_index) = display.iter().position(|t| t.id == target) else {
        return Vec::new();
    };
    let Some(anchor_index) = display.iter().position(|t| t.id == anchor) else {
        return vec![target];
    };

    let start = anchor_index.min(target_index);
    let end = anchor_index.max(target_index);

    display[start..=end].iter().map(|t| t.id).collect()
}
