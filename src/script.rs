//! Session scripts: a TOML list of editor actions replayed against a
//! [`Session`], standing in for the clicks and drags of an interactive
//! front end.
//!
//! Layers are addressed by their index in insertion order, since ids are
//! only known at run time.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::canvas::LayerId;
use crate::error::{ExportError, LoadError, ModelError};
use crate::io::SourceHandle;
use crate::project::{Session, UploadOutcome};
use crate::settings::EditorSettings;
use crate::{log_info, log_warn};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("could not read script '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid script: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("action {action}: no layer at index {index}")]
    UnknownLayer { action: usize, index: usize },
    #[error("action {action}: {source}")]
    Model { action: usize, source: ModelError },
    #[error("action {action}: {source}")]
    Load { action: usize, source: LoadError },
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct StageSize {
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    Upload {
        path: PathBuf,
    },
    AddText {
        #[serde(default)]
        text: Option<String>,
    },
    Move {
        layer: usize,
        x: f32,
        y: f32,
    },
    /// Without `layer`, applies to the selection like the color picker does.
    Fill {
        #[serde(default)]
        layer: Option<usize>,
        color: String,
    },
    SetText {
        layer: usize,
        text: String,
    },
    Outline {
        #[serde(default)]
        layer: Option<usize>,
        enabled: bool,
    },
    Select {
        #[serde(default)]
        layer: Option<usize>,
        #[serde(default)]
        at: Option<[f32; 2]>,
    },
    Export,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SessionScript {
    #[serde(default)]
    pub stage: Option<StageSize>,
    #[serde(default, rename = "action")]
    pub actions: Vec<Action>,
}

impl SessionScript {
    pub fn parse(content: &str) -> Result<Self, ScriptError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }
}

/// What a script run produced.
#[derive(Debug, Default)]
pub struct ScriptReport {
    pub exports: Vec<PathBuf>,
    /// Non-fatal problems, such as an upload that failed to decode.
    pub warnings: Vec<String>,
    pub layer_count: usize,
}

/// Replay `script` in a fresh session. Relative upload paths resolve
/// against `base_dir`; exports are written into `output_dir`. A script with
/// no explicit `export` action exports once at the end.
pub fn run_script(
    script: &SessionScript,
    base_dir: &Path,
    output_dir: &Path,
    settings: EditorSettings,
) -> Result<(Session, ScriptReport), ScriptError> {
    let mut session = Session::new("script", settings);
    if let Some(size) = script.stage {
        session.set_stage_size(size.width, size.height);
    }
    let mut report = ScriptReport::default();

    for (idx, action) in script.actions.iter().enumerate() {
        let action_no = idx + 1;
        let layer_id = |session: &Session, index: usize| -> Result<LayerId, ScriptError> {
            session
                .layers()
                .get_index(index)
                .map(|l| l.id)
                .ok_or(ScriptError::UnknownLayer {
                    action: action_no,
                    index,
                })
        };
        let model = |source: ModelError| ScriptError::Model {
            action: action_no,
            source,
        };

        match action {
            Action::Upload { path } => {
                let handle = SourceHandle::from_path(base_dir.join(path)).map_err(|source| {
                    ScriptError::Load {
                        action: action_no,
                        source,
                    }
                })?;
                let mut outcomes: Vec<UploadOutcome> = session.upload(handle).into_iter().collect();
                outcomes.extend(session.wait_for_uploads());
                for outcome in outcomes {
                    match outcome {
                        UploadOutcome::Placed { size, .. } => {
                            log_info!("Action {}: placed image at {}x{}", action_no, size.0, size.1);
                        }
                        UploadOutcome::Failed(e) => {
                            log_warn!("Action {}: {}", action_no, e);
                            report.warnings.push(format!("action {}: {}", action_no, e));
                        }
                        UploadOutcome::Rejected(e) => return Err(model(e)),
                    }
                }
            }
            Action::AddText { text } => {
                let id = session.add_text();
                if let Some(text) = text {
                    session.set_text(id, text).map_err(model)?;
                }
            }
            Action::Move { layer, x, y } => {
                let id = layer_id(&session, *layer)?;
                session.move_layer(id, *x, *y).map_err(model)?;
            }
            Action::Fill { layer, color } => match layer {
                Some(index) => {
                    let id = layer_id(&session, *index)?;
                    session.set_fill(id, color).map_err(model)?;
                }
                None => session.set_fill_selected(color).map_err(model)?,
            },
            Action::SetText { layer, text } => {
                let id = layer_id(&session, *layer)?;
                session.set_text(id, text).map_err(model)?;
            }
            Action::Outline { layer, enabled } => match layer {
                Some(index) => {
                    let id = layer_id(&session, *index)?;
                    session.toggle_outline(id, *enabled).map_err(model)?;
                }
                None => session.toggle_outline_selected(*enabled).map_err(model)?,
            },
            Action::Select { layer, at } => match (layer, at) {
                (Some(index), _) => {
                    let id = layer_id(&session, *index)?;
                    session.select(id);
                }
                (None, Some([x, y])) => {
                    if session.select_at(*x, *y).is_none() {
                        log_info!("Action {}: nothing at ({}, {})", action_no, x, y);
                    }
                }
                (None, None) => session.clear_selection(),
            },
            Action::Export => {
                report.exports.push(session.export_to(output_dir)?);
            }
        }
    }

    if report.exports.is_empty() {
        report.exports.push(session.export_to(output_dir)?);
    }
    report.layer_count = session.layers().len();
    Ok((session, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_action() {
        let script = SessionScript::parse(
            r##"
            [stage]
            width = 640
            height = 360

            [[action]]
            op = "upload"
            path = "photo.jpg"

            [[action]]
            op = "add_text"
            text = "Big News"

            [[action]]
            op = "move"
            layer = 1
            x = 100
            y = 120

            [[action]]
            op = "fill"
            color = "#ff00ff"

            [[action]]
            op = "set_text"
            layer = 1
            text = "Bigger News"

            [[action]]
            op = "outline"
            layer = 0
            enabled = true

            [[action]]
            op = "select"
            at = [10, 10]

            [[action]]
            op = "export"
            "##,
        )
        .unwrap();

        assert_eq!(script.stage, Some(StageSize { width: 640.0, height: 360.0 }));
        assert_eq!(script.actions.len(), 8);
        assert_eq!(
            script.actions[2],
            Action::Move { layer: 1, x: 100.0, y: 120.0 }
        );
        assert_eq!(
            script.actions[3],
            Action::Fill { layer: None, color: "#ff00ff".to_string() }
        );
        assert_eq!(
            script.actions[6],
            Action::Select { layer: None, at: Some([10.0, 10.0]) }
        );
        assert_eq!(script.actions[7], Action::Export);
    }

    #[test]
    fn unknown_op_is_a_parse_error() {
        let err = SessionScript::parse("[[action]]\nop = \"rotate\"\n").unwrap_err();
        assert!(matches!(err, ScriptError::Parse(_)));
    }

    #[test]
    fn bad_layer_index_is_reported() {
        let script = SessionScript::parse(
            "[[action]]\nop = \"move\"\nlayer = 3\nx = 1\ny = 1\n",
        )
        .unwrap();
        let dir = std::env::temp_dir();
        let err = run_script(&script, &dir, &dir, EditorSettings::default()).unwrap_err();
        assert!(matches!(err, ScriptError::UnknownLayer { action: 1, index: 3 }));
    }
}
