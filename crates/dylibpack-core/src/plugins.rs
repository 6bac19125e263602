//! Plugin families: frameworks that load extra binaries at runtime from a
//! sibling plugin tree.
//!
//! A family is plain data: the framework that triggers it, the plugin
//! subdirectories to copy, and which sibling framework each one needs. New
//! families are new table entries; the traversal only iterates [`FAMILIES`].

use crate::error::Result;
use crate::fs::Filesystem;
use crate::store::DependencyStore;
use dylibpack_schema::{CopyKind, CopyOperation, GeneratedFile, ResolvedLibrary};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One plugin subdirectory of a family.
#[derive(Debug, Clone, Copy)]
pub struct PluginRule {
    pub subdir: &'static str,
    /// Framework that must have been discovered for this rule to apply.
    pub requires: Option<&'static str>,
    /// When non-empty, only these file names are copied.
    pub only: &'static [&'static str],
    /// `(file name, framework)`: the file is dropped unless the framework
    /// was discovered.
    pub drop_unless: &'static [(&'static str, &'static str)],
}

impl PluginRule {
    const fn always(subdir: &'static str) -> Self {
        Self {
            subdir,
            requires: None,
            only: &[],
            drop_unless: &[],
        }
    }

    const fn with(subdir: &'static str, framework: &'static str) -> Self {
        Self {
            subdir,
            requires: Some(framework),
            only: &[],
            drop_unless: &[],
        }
    }

    fn keeps(&self, file_name: &str, has_framework: impl Fn(&str) -> bool) -> bool {
        if !self.only.is_empty() && !self.only.contains(&file_name) {
            return false;
        }
        self.drop_unless
            .iter()
            .all(|&(file, framework)| file != file_name || has_framework(framework))
    }
}

/// A framework family that ships runtime plugins.
#[derive(Debug, Clone, Copy)]
pub struct PluginFamily {
    pub name: &'static str,
    /// Framework whose bundling triggers the family.
    pub trigger: &'static str,
    /// Plugin tree, relative to the parent of the directory holding the
    /// trigger framework.
    pub plugin_root: &'static str,
    pub rules: &'static [PluginRule],
    /// `(file name, contents)` written to the app bundle's resources.
    pub config: Option<(&'static str, &'static str)>,
}

pub const QT: PluginFamily = PluginFamily {
    name: "qt",
    trigger: "QtCore",
    plugin_root: "plugins",
    rules: &[
        PluginRule {
            subdir: "platforms",
            requires: None,
            only: &["libqcocoa.dylib"],
            drop_unless: &[],
        },
        PluginRule::always("printsupport"),
        PluginRule::always("styles"),
        PluginRule {
            subdir: "imageformats",
            requires: None,
            only: &[],
            drop_unless: &[("libqsvg.dylib", "QtSvg")],
        },
        PluginRule::always("iconengines"),
        PluginRule::with("platforminputcontexts", "QtGui"),
        PluginRule::with("virtualkeyboard", "QtGui"),
        PluginRule::with("bearer", "QtNetwork"),
        PluginRule::with("sqldrivers", "QtSql"),
        PluginRule::with("mediaservice", "QtMultimedia"),
        PluginRule::with("audio", "QtMultimedia"),
        PluginRule::with("sceneparsers", "Qt3DRender"),
        PluginRule::with("geometryloaders", "Qt3DRender"),
        PluginRule::with("renderplugins", "Qt3DQuickRender"),
        PluginRule::with("position", "QtPositioning"),
        PluginRule::with("geoservices", "QtLocation"),
        PluginRule::with("texttospeech", "QtTextToSpeech"),
        PluginRule::with("webview", "QtWebView"),
    ],
    config: Some((
        "qt.conf",
        "[Paths]\nPlugins = PlugIns\nImports = Resources/qml\nQml2Imports = Resources/qml\n",
    )),
};

/// Every known family.
pub const FAMILIES: &[PluginFamily] = &[QT];

/// Where plugin copies and family config files go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginLayout {
    pub plugin_dir: PathBuf,
    /// The app bundle's `Contents/Resources`, when there is a bundle.
    pub resources_dir: Option<PathBuf>,
}

/// Work produced by one expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginExpansion {
    pub directories: Vec<PathBuf>,
    pub copies: Vec<CopyOperation>,
    pub generated_files: Vec<GeneratedFile>,
}

impl PluginExpansion {
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.copies.is_empty() && self.generated_files.is_empty()
    }

    pub fn extend(&mut self, other: PluginExpansion) {
        self.directories.extend(other.directories);
        self.copies.extend(other.copies);
        self.generated_files.extend(other.generated_files);
    }
}

fn framework_name(name: &str) -> String {
    format!("{name}{}", dylibpack_schema::FRAMEWORK_EXTENSION)
}

impl PluginFamily {
    /// The bundled trigger framework, if discovered.
    pub fn trigger_library<'s>(&self, store: &'s DependencyStore) -> Option<&'s ResolvedLibrary> {
        let wanted = framework_name(self.trigger);
        store
            .bundled()
            .find(|l| l.is_framework && l.file_name == wanted)
    }

    /// Plans the copies for every rule that became applicable since the last
    /// call. `expanded` carries that memory between calls, so calling again
    /// with an unchanged store yields an empty expansion.
    ///
    /// # Errors
    ///
    /// Fails if a plugin directory exists but cannot be listed.
    pub fn expand(
        &self,
        store: &DependencyStore,
        fs: &dyn Filesystem,
        layout: &PluginLayout,
        expanded: &mut BTreeSet<String>,
    ) -> Result<PluginExpansion> {
        let mut expansion = PluginExpansion::default();
        let Some(trigger) = self.trigger_library(store) else {
            return Ok(expansion);
        };
        let Some(prefix) = trigger.directory.parent() else {
            return Ok(expansion);
        };
        let source_root = prefix.join(self.plugin_root);

        let has_framework = |name: &str| {
            let wanted = framework_name(name);
            store
                .libraries()
                .iter()
                .any(|l| l.is_framework && l.file_name == wanted)
        };

        if expanded.insert(self.name.to_string()) {
            tracing::debug!(
                "{} plugin family triggered by {}",
                self.name,
                trigger.real_path.display()
            );
            if let (Some((file, contents)), Some(resources)) = (self.config, &layout.resources_dir) {
                expansion.generated_files.push(GeneratedFile {
                    path: resources.join(file),
                    contents: contents.to_string(),
                });
            }
        }

        for rule in self.rules {
            if rule.requires.is_some_and(|fw| !has_framework(fw)) {
                continue;
            }
            if !expanded.insert(format!("{}/{}", self.name, rule.subdir)) {
                continue;
            }

            let source = source_root.join(rule.subdir);
            if !fs.exists(&source) {
                tracing::trace!("No plugins at {}", source.display());
                continue;
            }

            let target_dir = layout.plugin_dir.join(rule.subdir);
            let mut planned_dir = false;
            for file in fs.list_dir(&source)? {
                let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !Path::new(name).extension().is_some_and(|e| e == "dylib")
                    || !rule.keeps(name, has_framework)
                {
                    continue;
                }
                let Ok(relative) = file.strip_prefix(&source) else {
                    continue;
                };
                if !planned_dir {
                    expansion.directories.push(target_dir.clone());
                    planned_dir = true;
                }
                expansion.copies.push(CopyOperation {
                    from: file.clone(),
                    to: target_dir.join(relative),
                    kind: CopyKind::File,
                    strip: Vec::new(),
                });
            }
        }

        Ok(expansion)
    }
}
