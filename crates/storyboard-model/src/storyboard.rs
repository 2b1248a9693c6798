//! Storyboard panel store.
//!
//! A storyboard owns its panels exclusively. Every mutation that changes
//! membership or position ends with [`Storyboard::resequence`], so `order`
//! is always the contiguous range `0..len` and the backing vector is kept
//! sorted by it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::panel::{PanelDraft, StoryboardPanel};
use crate::script::ScriptDraft;

/// An ordered sequence of panels linked to its owning script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storyboard {
    /// Storyboard identifier.
    pub id: String,

    /// Script this storyboard belongs to.
    #[serde(default)]
    pub script_id: String,

    /// Panels sorted by `order`.
    #[serde(default)]
    pub panels: Vec<StoryboardPanel>,

    /// Creation timestamp (RFC 3339).
    #[serde(default = "now_rfc3339")]
    pub created_at: String,
}

impl Storyboard {
    /// Create an empty storyboard for a script.
    pub fn new(script_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            script_id: script_id.into(),
            panels: Vec::new(),
            created_at: now_rfc3339(),
        }
    }

    /// Seed a storyboard with one panel per scene.
    ///
    /// Each panel takes the scene description and the first dialogue line.
    pub fn from_script(script_id: impl Into<String>, script: &ScriptDraft) -> Self {
        let mut storyboard = Self::new(script_id);
        for (index, scene) in script.scenes.iter().enumerate() {
            storyboard.add_panel(PanelDraft {
                scene_id: Some(format!("scene-{}", index + 1)),
                description: scene.description.clone(),
                dialogue: scene.dialogues.first().map(|d| d.content.clone()),
                ..PanelDraft::default()
            });
        }
        storyboard
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Append a panel at the end. Its `order` is the previous length.
    pub fn add_panel(&mut self, draft: PanelDraft) -> &StoryboardPanel {
        let order = self.panels.len();
        self.panels.push(StoryboardPanel::from_draft(draft, order));
        &self.panels[order]
    }

    pub fn panel(&self, id: &str) -> Option<&StoryboardPanel> {
        self.panels.iter().find(|p| p.id == id)
    }

    /// Apply an edit to one panel. `id` and `order` are restored afterwards.
    pub fn update_panel<F>(&mut self, id: &str, edit: F) -> Result<(), StoryboardError>
    where
        F: FnOnce(&mut StoryboardPanel),
    {
        let panel = self
            .panels
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoryboardError::PanelNotFound { id: id.to_string() })?;
        let (saved_id, saved_order) = (panel.id.clone(), panel.order);
        edit(panel);
        panel.id = saved_id;
        panel.order = saved_order;
        Ok(())
    }

    /// Remove a panel by id and renumber the rest.
    pub fn remove_panel(&mut self, id: &str) -> Result<StoryboardPanel, StoryboardError> {
        let index = self
            .panels
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoryboardError::PanelNotFound { id: id.to_string() })?;
        let removed = self.panels.remove(index);
        self.resequence();
        Ok(removed)
    }

    /// Move the panel at `from` so it ends up at index `to`.
    pub fn move_panel(&mut self, from: usize, to: usize) -> Result<(), StoryboardError> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from != to {
            let panel = self.panels.remove(from);
            self.panels.insert(to, panel);
        }
        self.resequence();
        Ok(())
    }

    /// Exchange the panels at two positions.
    pub fn swap_panels(&mut self, a: usize, b: usize) -> Result<(), StoryboardError> {
        self.check_index(a)?;
        self.check_index(b)?;
        self.panels.swap(a, b);
        self.resequence();
        Ok(())
    }

    /// Move a panel one slot earlier. No-op for the first panel.
    pub fn move_up(&mut self, id: &str) -> Result<(), StoryboardError> {
        let index = self.index_of(id)?;
        if index > 0 {
            self.swap_panels(index, index - 1)?;
        }
        Ok(())
    }

    /// Move a panel one slot later. No-op for the last panel.
    pub fn move_down(&mut self, id: &str) -> Result<(), StoryboardError> {
        let index = self.index_of(id)?;
        if index + 1 < self.panels.len() {
            self.swap_panels(index, index + 1)?;
        }
        Ok(())
    }

    /// Renumber `order` to `0..len` following the current vector position.
    pub fn resequence(&mut self) {
        for (index, panel) in self.panels.iter_mut().enumerate() {
            panel.order = index;
        }
    }

    /// Sort by stored `order` (stable) and then renumber.
    ///
    /// Used after loading files whose numbering may have gaps.
    pub fn normalize(&mut self) {
        self.panels.sort_by_key(|p| p.order);
        self.resequence();
    }

    /// Panels carrying artwork, in `order` sequence.
    pub fn panels_with_images(&self) -> Vec<&StoryboardPanel> {
        self.panels.iter().filter(|p| p.has_image()).collect()
    }

    /// Panels with a description but no artwork yet.
    pub fn panels_missing_artwork(&self) -> Vec<&StoryboardPanel> {
        self.panels
            .iter()
            .filter(|p| !p.description.trim().is_empty() && !p.has_image())
            .collect()
    }

    /// Check that `order` is exactly `0..len` in vector order.
    pub fn validate(&self) -> Result<(), StoryboardError> {
        for (index, panel) in self.panels.iter().enumerate() {
            if panel.order != index {
                return Err(StoryboardError::ValidationError {
                    message: format!(
                        "panel {} has order {} at position {}",
                        panel.id, panel.order, index
                    ),
                });
            }
        }
        Ok(())
    }

    /// Load a storyboard from a JSON file, normalizing its order numbering.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoryboardError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| StoryboardError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut storyboard: Storyboard =
            serde_json::from_str(&json).map_err(|e| StoryboardError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        storyboard.normalize();
        Ok(storyboard)
    }

    /// Write the storyboard as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoryboardError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoryboardError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| StoryboardError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| StoryboardError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn index_of(&self, id: &str) -> Result<usize, StoryboardError> {
        self.panels
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoryboardError::PanelNotFound { id: id.to_string() })
    }

    fn check_index(&self, index: usize) -> Result<(), StoryboardError> {
        if index < self.panels.len() {
            Ok(())
        } else {
            Err(StoryboardError::IndexOutOfRange {
                index,
                len: self.panels.len(),
            })
        }
    }
}

/// Errors that can occur when working with storyboards.
#[derive(Debug, thiserror::Error)]
pub enum StoryboardError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Panel not found: {id}")]
    PanelNotFound { id: String },

    #[error("Panel index {index} out of range (storyboard has {len} panels)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid storyboard: {message}")]
    ValidationError { message: String },
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Fresh random (v4) identifier for storyboards and panels.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{DialogueDraft, SceneDraft};
    use proptest::prelude::*;

    fn board_with(n: usize) -> Storyboard {
        let mut board = Storyboard::new("script-1");
        for i in 0..n {
            board.add_panel(PanelDraft {
                description: format!("panel {i}"),
                ..PanelDraft::default()
            });
        }
        board
    }

    fn descriptions(board: &Storyboard) -> Vec<String> {
        board.panels.iter().map(|p| p.description.clone()).collect()
    }

    #[test]
    fn test_add_panel_appends_with_next_order() {
        let board = board_with(3);
        let orders: Vec<usize> = board.panels.iter().map(|p| p.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert!(board.validate().is_ok());
    }

    #[test]
    fn test_ids_are_unique() {
        let board = board_with(50);
        let mut ids: Vec<&str> = board.panels.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_new_id_is_uuid_v4() {
        let id = new_id();
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(id, parsed.hyphenated().to_string());
    }

    #[test]
    fn test_remove_panel_renumbers() {
        let mut board = board_with(4);
        let id = board.panels[1].id.clone();
        let removed = board.remove_panel(&id).unwrap();
        assert_eq!(removed.description, "panel 1");
        assert_eq!(descriptions(&board), vec!["panel 0", "panel 2", "panel 3"]);
        assert!(board.validate().is_ok());
    }

    #[test]
    fn test_move_panel_uses_splice_semantics() {
        let mut board = board_with(4);
        board.move_panel(0, 2).unwrap();
        assert_eq!(
            descriptions(&board),
            vec!["panel 1", "panel 2", "panel 0", "panel 3"]
        );
        board.move_panel(3, 0).unwrap();
        assert_eq!(
            descriptions(&board),
            vec!["panel 3", "panel 1", "panel 2", "panel 0"]
        );
        assert!(board.validate().is_ok());
    }

    #[test]
    fn test_move_out_of_range_is_rejected() {
        let mut board = board_with(2);
        let err = board.move_panel(0, 5).unwrap_err();
        assert!(matches!(err, StoryboardError::IndexOutOfRange { index: 5, len: 2 }));
    }

    #[test]
    fn test_move_up_and_down_at_edges() {
        let mut board = board_with(3);
        let first = board.panels[0].id.clone();
        let last = board.panels[2].id.clone();
        board.move_up(&first).unwrap();
        board.move_down(&last).unwrap();
        assert_eq!(descriptions(&board), vec!["panel 0", "panel 1", "panel 2"]);

        board.move_down(&first).unwrap();
        assert_eq!(descriptions(&board), vec!["panel 1", "panel 0", "panel 2"]);
    }

    #[test]
    fn test_update_panel_keeps_identity() {
        let mut board = board_with(2);
        let id = board.panels[1].id.clone();
        board
            .update_panel(&id, |p| {
                p.order = 99;
                p.id = "hijacked".to_string();
                p.image_url = Some("a.png".to_string());
            })
            .unwrap();
        let panel = board.panel(&id).unwrap();
        assert_eq!(panel.order, 1);
        assert!(panel.has_image());
    }

    #[test]
    fn test_panels_with_images_in_order() {
        let mut board = board_with(4);
        for index in [3, 1] {
            board.panels[index].image_url = Some(format!("{index}.png"));
        }
        let picked: Vec<usize> = board.panels_with_images().iter().map(|p| p.order).collect();
        assert_eq!(picked, vec![1, 3]);
        assert_eq!(board.panels_missing_artwork().len(), 2);
    }

    #[test]
    fn test_from_script_uses_first_dialogue() {
        let script = ScriptDraft {
            title: Some("Night Market".to_string()),
            scenes: vec![
                SceneDraft {
                    name: "Opening".to_string(),
                    description: "Lanterns sway".to_string(),
                    dialogues: vec![
                        DialogueDraft::new("Mei", "Over here!"),
                        DialogueDraft::new("Jun", "Coming."),
                    ],
                    ..SceneDraft::default()
                },
                SceneDraft {
                    name: "Chase".to_string(),
                    description: "A thief runs".to_string(),
                    ..SceneDraft::default()
                },
            ],
            ..ScriptDraft::default()
        };
        let board = Storyboard::from_script("s-1", &script);
        assert_eq!(board.len(), 2);
        assert_eq!(board.panels[0].dialogue.as_deref(), Some("Over here!"));
        assert!(board.panels[1].dialogue.is_none());
        assert_eq!(board.panels[1].order, 1);
    }

    #[test]
    fn test_save_and_load_normalizes_order() {
        let dir = std::env::temp_dir().join("storyreel_test_storyboard");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("board.json");

        let mut board = board_with(3);
        board.panels[0].order = 7;
        board.panels[1].order = 2;
        board.panels[2].order = 5;
        board.save(&path).unwrap();

        let loaded = Storyboard::load(&path).unwrap();
        assert_eq!(descriptions(&loaded), vec!["panel 1", "panel 2", "panel 0"]);
        assert!(loaded.validate().is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let path = std::env::temp_dir().join("storyreel_no_such_board.json");
        let _ = std::fs::remove_file(&path);
        let err = Storyboard::load(&path).unwrap_err();
        assert!(err.to_string().contains("storyreel_no_such_board.json"));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add,
        Remove(usize),
        Move(usize, usize),
        Swap(usize, usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Add),
            any::<usize>().prop_map(Op::Remove),
            (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Move(a, b)),
            (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Swap(a, b)),
        ]
    }

    proptest! {
        #[test]
        fn test_order_stays_contiguous(initial in 0usize..8, ops in prop::collection::vec(op_strategy(), 0..40)) {
            let mut board = board_with(initial);
            for op in ops {
                let len = board.len();
                match op {
                    Op::Add => {
                        board.add_panel(PanelDraft::default());
                    }
                    Op::Remove(i) if len > 0 => {
                        let id = board.panels[i % len].id.clone();
                        board.remove_panel(&id).unwrap();
                    }
                    Op::Move(a, b) if len > 0 => board.move_panel(a % len, b % len).unwrap(),
                    Op::Swap(a, b) if len > 0 => board.swap_panels(a % len, b % len).unwrap(),
                    _ => {}
                }
                let orders: Vec<usize> = board.panels.iter().map(|p| p.order).collect();
                prop_assert_eq!(orders, (0..board.len()).collect::<Vec<_>>());
            }
        }

        #[test]
        fn test_swap_permutes_without_loss(n in 2usize..12, a in 0usize..12, b in 0usize..12) {
            let mut board = board_with(n);
            let mut before = descriptions(&board);
            board.swap_panels(a % n, b % n).unwrap();
            let mut after = descriptions(&board);
            before.sort();
            after.sort();
            prop_assert_eq!(before, after);
            prop_assert!(board.validate().is_ok());
        }
    }
}
