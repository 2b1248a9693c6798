//! List and rearrange storyboard panels.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use storyreel_storyboard::{CameraAngle, PanelDraft, ScriptDraft, Storyboard};

#[derive(Debug, Clone, Subcommand)]
pub enum PanelAction {
    /// Print every panel in order
    List,

    /// Append a panel
    Add {
        /// Visual description
        description: String,

        #[arg(long)]
        dialogue: Option<String>,

        /// close-up, medium, wide, birds-eye, low-angle
        #[arg(long, default_value = "medium")]
        angle: CameraAngle,

        /// Artwork URL, data URI, or file path
        #[arg(long)]
        image: Option<String>,
    },

    /// Change fields of one panel
    Update {
        /// Panel id
        id: String,

        #[arg(long)]
        description: Option<String>,

        /// New dialogue; an empty string clears it
        #[arg(long)]
        dialogue: Option<String>,

        #[arg(long)]
        angle: Option<CameraAngle>,

        /// New artwork reference; an empty string clears it
        #[arg(long)]
        image: Option<String>,
    },

    /// Move the panel at FROM so it lands at TO (zero-based)
    Move { from: usize, to: usize },

    /// Exchange two panels (zero-based)
    Swap { a: usize, b: usize },

    /// Move a panel one slot earlier
    Up { id: String },

    /// Move a panel one slot later
    Down { id: String },

    /// Remove a panel by id
    Remove { id: String },

    /// Create the storyboard from a script JSON file, one panel per scene
    FromScript {
        /// Script draft JSON
        script: PathBuf,

        /// Replace an existing storyboard file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(path: PathBuf, action: PanelAction) -> anyhow::Result<()> {
    match action {
        PanelAction::FromScript { script, force } => from_script(&path, &script, force),
        PanelAction::List => {
            list(&load(&path)?);
            Ok(())
        }
        edit => {
            let mut storyboard = load(&path)?;
            apply(&mut storyboard, edit)?;
            storyboard
                .save(&path)
                .map_err(|e| anyhow::anyhow!("Failed to save storyboard: {e}"))?;
            list(&storyboard);
            Ok(())
        }
    }
}

fn load(path: &Path) -> anyhow::Result<Storyboard> {
    Storyboard::load(path).map_err(|e| anyhow::anyhow!("Failed to load storyboard: {e}"))
}

fn apply(storyboard: &mut Storyboard, action: PanelAction) -> anyhow::Result<()> {
    match action {
        PanelAction::Add {
            description,
            dialogue,
            angle,
            image,
        } => {
            let panel = storyboard.add_panel(PanelDraft {
                description,
                dialogue,
                camera_angle: angle,
                image_url: image,
                ..PanelDraft::default()
            });
            println!("Added panel {} at position {}", panel.id, panel.order);
        }
        PanelAction::Update {
            id,
            description,
            dialogue,
            angle,
            image,
        } => {
            storyboard.update_panel(&id, |panel| {
                if let Some(description) = description {
                    panel.description = description;
                }
                if let Some(dialogue) = dialogue {
                    panel.dialogue = non_empty(dialogue);
                }
                if let Some(angle) = angle {
                    panel.camera_angle = angle;
                }
                if let Some(image) = image {
                    panel.image_url = non_empty(image);
                }
            })?;
            println!("Updated panel {id}");
        }
        PanelAction::Move { from, to } => {
            storyboard.move_panel(from, to)?;
            println!("Moved panel {from} -> {to}");
        }
        PanelAction::Swap { a, b } => {
            storyboard.swap_panels(a, b)?;
            println!("Swapped panels {a} and {b}");
        }
        PanelAction::Up { id } => storyboard.move_up(&id)?,
        PanelAction::Down { id } => storyboard.move_down(&id)?,
        PanelAction::Remove { id } => {
            let removed = storyboard.remove_panel(&id)?;
            println!("Removed panel {} ({})", removed.id, removed.description);
        }
        PanelAction::List | PanelAction::FromScript { .. } => {}
    }
    Ok(())
}

fn from_script(path: &Path, script: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to replace it",
            path.display()
        );
    }

    let json = std::fs::read_to_string(script)
        .map_err(|e| anyhow::anyhow!("Failed to read script {}: {e}", script.display()))?;
    let draft: ScriptDraft = serde_json::from_str(&json)
        .map_err(|e| anyhow::anyhow!("Failed to parse script {}: {e}", script.display()))?;
    draft.validate()?;

    let script_id = script
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let storyboard = Storyboard::from_script(script_id, &draft);
    storyboard
        .save(path)
        .map_err(|e| anyhow::anyhow!("Failed to save storyboard: {e}"))?;

    println!(
        "Created storyboard {} with {} panel(s)",
        path.display(),
        storyboard.len()
    );
    list(&storyboard);
    Ok(())
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn list(storyboard: &Storyboard) {
    println!("Storyboard {} ({} panels)", storyboard.id, storyboard.len());
    for panel in &storyboard.panels {
        println!(
            "  [{}] {} {:<16} {} {}",
            panel.order,
            panel.id,
            panel.camera_angle.label(),
            if panel.has_image() { "art " } else { "----" },
            summary(&panel.description, 48),
        );
        if let Some(line) = panel.dialogue_text() {
            println!("        \"{}\"", summary(line, 60));
        }
    }
}

fn summary(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_truncates_by_chars() {
        assert_eq!(summary("short", 10), "short");
        assert_eq!(summary("夜市の灯り", 2), "夜市...");
    }

    #[test]
    fn test_non_empty_clears_blank_values() {
        assert_eq!(non_empty("  ".into()), None);
        assert_eq!(non_empty("hi".into()), Some("hi".into()));
    }

    #[test]
    fn test_apply_keeps_order_contiguous() {
        let mut storyboard = Storyboard::new("script");
        for name in ["a", "b", "c"] {
            apply(
                &mut storyboard,
                PanelAction::Add {
                    description: name.into(),
                    dialogue: None,
                    angle: CameraAngle::Wide,
                    image: None,
                },
            )
            .unwrap();
        }
        apply(&mut storyboard, PanelAction::Move { from: 0, to: 2 }).unwrap();
        let id = storyboard.panels[0].id.clone();
        apply(&mut storyboard, PanelAction::Remove { id }).unwrap();

        let names: Vec<&str> = storyboard.panels.iter().map(|p| p.description.as_str()).collect();
        assert_eq!(names, ["c", "a"]);
        assert!(storyboard.validate().is_ok());
        assert!(apply(&mut storyboard, PanelAction::Swap { a: 0, b: 5 }).is_err());
    }

    #[test]
    fn test_from_script_refuses_overwrite() {
        let dir = std::env::temp_dir().join("storyreel_cli_from_script");
        std::fs::create_dir_all(&dir).unwrap();
        let board = dir.join("board.json");
        let script = dir.join("script.json");
        std::fs::write(
            &script,
            r#"{"title":"Rain","scenes":[{"description":"Bus stop","dialogues":[{"content":"Late again."}]}]}"#,
        )
        .unwrap();
        let _ = std::fs::remove_file(&board);

        from_script(&board, &script, false).unwrap();
        let loaded = Storyboard::load(&board).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.panels[0].dialogue.as_deref(), Some("Late again."));

        assert!(from_script(&board, &script, false).is_err());
        assert!(from_script(&board, &script, true).is_ok());
    }
}
