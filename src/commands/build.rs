//! Typed arguments for the Flutter web build.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::command_traits::CommandArgs;

/// Flutter build mode, mapped 1:1 to the `--release`/`--profile`/`--debug` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Release,
    Profile,
    Debug,
}

impl BuildMode {
    /// Flag passed to `flutter build`.
    pub fn as_flag(&self) -> &'static str {
        match self {
            BuildMode::Release => "--release",
            BuildMode::Profile => "--profile",
            BuildMode::Debug => "--debug",
        }
    }
}

/// `flutter build web --<mode>`.
///
/// Writes its assets to `build/web` relative to the working directory.
#[derive(Debug, Clone, Default)]
pub struct FlutterWebBuildArgs {
    pub mode: BuildMode,
}

impl CommandArgs for FlutterWebBuildArgs {
    fn program(&self) -> &'static str {
        "flutter"
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "build".to_string(),
            "web".to_string(),
            self.mode.as_flag().to_string(),
        ]
    }

    fn step_name(&self) -> &'static str {
        "Building Flutter web app"
    }
}
