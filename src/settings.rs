use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::canvas::{Outline, Stage, TextDefaults};
use crate::error::SettingsError;
use crate::export::EXPORT_FILE_NAME;
use crate::log_warn;

/// Largest box an uploaded image is fitted into. Both sides must be
/// positive and finite.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadBounds {
    pub width: f32,
    pub height: f32,
}

impl Default for UploadBounds {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
        }
    }
}

/// Export options. The pixel ratio is fixed and not configurable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub file_name: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            file_name: EXPORT_FILE_NAME.to_string(),
        }
    }
}

/// Editor defaults, read from `settings.toml`. Every field is optional in
/// the file; missing ones keep their default.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    pub stage: Stage,
    pub upload_bounds: UploadBounds,
    pub text: TextDefaults,
    pub outline: Outline,
    pub export: ExportSettings,
    /// Font file used when a requested family is not installed.
    pub font_path: Option<PathBuf>,
}

impl EditorSettings {
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        let bounds = self.upload_bounds;
        if !valid(bounds.width) || !valid(bounds.height) {
            return Err(SettingsError::InvalidUploadBounds {
                width: bounds.width,
                height: bounds.height,
            });
        }
        if !valid(self.stage.width) || !valid(self.stage.height) {
            return Err(SettingsError::InvalidStage {
                width: self.stage.width,
                height: self.stage.height,
            });
        }
        Ok(())
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load from the platform settings path. A missing file yields the
    /// defaults; an unreadable or invalid one is logged and ignored.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log_warn!("Ignoring settings file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").ok()?;
            Some(PathBuf::from(appdata).join("ThumbCraft").join("settings.toml"))
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("ThumbCraft")
                    .join("settings.toml"),
            )
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("thumbcraft").join("settings.toml"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(EditorSettings::from_toml("").unwrap(), EditorSettings::default());
    }

    #[test]
    fn partial_override() {
        let settings = EditorSettings::from_toml(
            r##"
            font_path = "/fonts/Inter.ttf"

            [stage]
            width = 1280
            height = 720

            [text]
            font_size = 64
            fill = "#ffcc00"

            [outline]
            color = "#000"
            width = 6
            "##,
        )
        .unwrap();
        assert_eq!((settings.stage.width, settings.stage.height), (1280.0, 720.0));
        assert!(settings.stage.background.is_none());
        assert_eq!(settings.text.font_size, 64.0);
        assert_eq!(settings.text.text, "Hello World");
        assert_eq!(settings.text.fill.as_str(), "#ffcc00");
        assert_eq!(settings.outline.width, 6.0);
        assert_eq!(settings.upload_bounds, UploadBounds::default());
        assert_eq!(settings.export.file_name, "thumbnail.png");
        assert_eq!(settings.font_path, Some(PathBuf::from("/fonts/Inter.ttf")));
    }

    #[test]
    fn stage_background_is_opt_in() {
        let settings = EditorSettings::from_toml("[stage]\nbackground = \"#333\"\n").unwrap();
        assert_eq!(settings.stage.background.unwrap().as_str(), "#333");
    }

    #[test]
    fn degenerate_upload_bounds_are_rejected() {
        for bounds in ["width = 0\nheight = 0", "width = -800\nheight = 600", "width = nan\nheight = 600"] {
            let err = EditorSettings::from_toml(&format!("[upload_bounds]\n{}\n", bounds)).unwrap_err();
            assert!(matches!(err, SettingsError::InvalidUploadBounds { .. }), "{}", bounds);
        }
    }

    #[test]
    fn zero_stage_is_rejected() {
        let err = EditorSettings::from_toml("[stage]\nwidth = 0\n").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidStage { .. }));
    }

    #[test]
    fn pixel_ratio_is_not_configurable() {
        let settings = EditorSettings::from_toml("[export]\npixel_ratio = 1.0\n").unwrap();
        assert_eq!(settings.export, ExportSettings::default());
    }

    #[test]
    fn bad_color_is_rejected() {
        let err = EditorSettings::from_toml("[text]\nfill = \"red\"\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }
}
