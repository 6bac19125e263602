//! End-to-end discovery and planning over real files with a fake inspector.

use dylibpack_core::plugins::{PluginFamily, PluginLayout, PluginRule};
use dylibpack_core::store::BundlePolicy;
use dylibpack_core::{
    BundleError, Bundler, DestinationPolicy, Discovery, Executor, FailOnUnresolved, Inspector,
    LoadCommands, NullReporter, PathResolver, Patcher, Reporter, Result, Settings, Signer, StdFs,
    Traversal,
};
use dylibpack_schema::{CopyKind, DependentEdge, Disposition, LibraryReference, ResolvedLibrary};
use std::cell::RefCell;
use std::collections::HashMap;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary tree of placeholder binaries.
struct Fixture {
    _temp_dir: TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        // macOS tempdirs live behind the /var -> /private/var symlink.
        let root = temp_dir.path().canonicalize().expect("canonical temp dir");
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// The absolute path of `rel`, as a reference string.
    fn abs(&self, rel: &str) -> String {
        self.path(rel).to_string_lossy().into_owned()
    }

    fn file(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"\xcf\xfa\xed\xfe").unwrap();
        path
    }

    fn symlink(&self, target: &str, link: &str) -> PathBuf {
        let link = self.path(link);
        std::fs::create_dir_all(link.parent().unwrap()).unwrap();
        symlink(self.path(target), &link).unwrap();
        link
    }
}

/// Serves canned load commands; files it does not know are treated as
/// binaries without dependencies, missing files fail like otool does.
#[derive(Default)]
struct FakeInspector {
    commands: HashMap<PathBuf, LoadCommands>,
    calls: RefCell<Vec<PathBuf>>,
}

impl FakeInspector {
    fn binary(&mut self, path: &Path, deps: &[&str], rpaths: &[&str]) -> &mut Self {
        self.commands.insert(
            path.to_path_buf(),
            LoadCommands {
                dependencies: deps.iter().map(|d| LibraryReference::new(*d)).collect(),
                rpaths: rpaths.iter().map(|r| (*r).to_string()).collect(),
            },
        );
        self
    }

    fn inspections(&self, path: &Path) -> usize {
        self.calls.borrow().iter().filter(|p| *p == path).count()
    }
}

impl Inspector for FakeInspector {
    fn load_commands(&self, path: &Path) -> Result<LoadCommands> {
        self.calls.borrow_mut().push(path.to_path_buf());
        if !path.exists() {
            return Err(BundleError::tool("otool", path, "cannot find file"));
        }
        Ok(self.commands.get(path).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct RecordingPatcher {
    calls: RefCell<Vec<String>>,
}

impl Patcher for RecordingPatcher {
    fn set_id(&self, path: &Path, name: &str) -> Result<()> {
        self.calls.borrow_mut().push(format!("-id {name} {}", path.display()));
        Ok(())
    }
    fn change_dependency(&self, path: &Path, old: &str, new: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("-change {old} {new} {}", path.display()));
        Ok(())
    }
    fn change_rpath(&self, path: &Path, old: &str, new: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("-rpath {old} {new} {}", path.display()));
        Ok(())
    }
    fn delete_rpath(&self, path: &Path, old: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("-delete_rpath {old} {}", path.display()));
        Ok(())
    }
}

impl Signer for RecordingPatcher {
    fn resign(&self, path: &Path) -> Result<()> {
        self.calls.borrow_mut().push(format!("sign {}", path.display()));
        Ok(())
    }
}

/// Keeps warnings, drops everything else.
#[derive(Default)]
struct WarningLog {
    warnings: RefCell<Vec<String>>,
}

impl Reporter for WarningLog {
    fn section(&self, _: &str) {}
    fn dependency(&self, _: &str, _: &Path) {}
    fn library(&self, _: &ResolvedLibrary, _: &[&DependentEdge]) {}
    fn action(&self, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, msg: &str) {
        self.warnings.borrow_mut().push(msg.to_string());
    }
    fn summary(&self, _: usize, _: usize) {}
}

fn traverse(inspector: &FakeInspector, policy: BundlePolicy, targets: &[PathBuf]) -> Discovery {
    let resolver = PathResolver::new(&StdFs);
    let mut traversal = Traversal::new(inspector, resolver, policy, &NullReporter);
    traversal.discover(targets).expect("discovery failed");
    traversal.finish()
}

fn copy_settings(fx: &Fixture, files: Vec<PathBuf>) -> Settings {
    Settings {
        files_to_fix: files,
        bundle_libs: true,
        dest_dir: fx.path("out/libs"),
        create_dir: true,
        codesign: false,
        ..Settings::default()
    }
}

#[test]
fn test_merge_idempotence() {
    let fx = Fixture::new();
    let real = fx.file("lib/libfoo.1.0.dylib");
    fx.symlink("lib/libfoo.1.0.dylib", "lib/libfoo.1.dylib");
    let app = fx.file("bin/app");

    let mut inspector = FakeInspector::default();
    let by_symlink = fx.abs("lib/libfoo.1.dylib");
    inspector.binary(&app, &[&by_symlink, "@loader_path/../lib/libfoo.1.0.dylib"], &[]);

    let discovery = traverse(&inspector, BundlePolicy::default(), &[app]);
    assert_eq!(discovery.store.len(), 1);
    let lib = discovery.store.get(&real).unwrap();
    let aliases: Vec<&str> = lib.aliases.iter().map(LibraryReference::as_str).collect();
    assert_eq!(aliases.len(), 2);
    assert!(aliases.contains(&by_symlink.as_str()));
    assert!(aliases.contains(&"@loader_path/../lib/libfoo.1.0.dylib"));
    assert_eq!(inspector.inspections(&real), 1);
}

#[test]
fn test_diamond_converges() {
    let fx = Fixture::new();
    let a = fx.file("a");
    let b = fx.file("lib/libb.dylib");
    let c = fx.file("lib/libc.dylib");
    let d = fx.file("lib/libd.dylib");

    let mut inspector = FakeInspector::default();
    inspector
        .binary(&a, &[&fx.abs("lib/libb.dylib"), &fx.abs("lib/libc.dylib")], &[])
        .binary(&b, &[&fx.abs("lib/libd.dylib")], &[])
        .binary(&c, &["@loader_path/libd.dylib"], &[]);

    let discovery = traverse(&inspector, BundlePolicy::default(), &[a]);
    assert_eq!(discovery.store.len(), 3);
    assert_eq!(inspector.inspections(&d), 1);
    assert_eq!(discovery.store.dependents_of(&d).count(), 2);
}

#[test]
fn test_cycle_terminates() {
    let fx = Fixture::new();
    let a = fx.file("lib/liba.dylib");
    let b = fx.file("lib/libb.dylib");

    let mut inspector = FakeInspector::default();
    inspector
        .binary(&a, &[&fx.abs("lib/libb.dylib")], &[])
        .binary(&b, &[&fx.abs("lib/liba.dylib")], &[]);

    let discovery = traverse(&inspector, BundlePolicy::default(), &[a.clone()]);
    assert_eq!(discovery.store.len(), 2);
    assert_eq!(inspector.inspections(&a), 1);
    assert_eq!(inspector.inspections(&b), 1);
}

#[test]
fn test_rpath_token_prefers_bundle_executable_dir() {
    let fx = Fixture::new();
    let app = fx.file("Demo.app/Contents/MacOS/demo");
    let in_bundle = fx.file("Demo.app/Contents/MacOS/libfoo.dylib");
    fx.file("opt/libs/libfoo.dylib");

    let mut inspector = FakeInspector::default();
    inspector.binary(&app, &["@rpath/libfoo.dylib"], &[&fx.abs("opt/libs")]);

    let resolver =
        PathResolver::new(&StdFs).with_executable_dir(Some(fx.path("Demo.app/Contents/MacOS")));
    let mut traversal = Traversal::new(&inspector, resolver, BundlePolicy::default(), &NullReporter);
    traversal.discover(&[app]).unwrap();
    assert!(traversal.store().get(&in_bundle).is_some());
    assert!(traversal.store().get(&fx.path("opt/libs/libfoo.dylib")).is_none());
}

#[test]
fn test_ignored_library_is_traversed_but_not_planned() {
    let fx = Fixture::new();
    let app = fx.file("bin/app");
    let vendor = fx.file("vendor/libvendor.dylib");
    let sub = fx.file("lib/libsub.dylib");

    let mut inspector = FakeInspector::default();
    inspector
        .binary(&app, &[&fx.abs("vendor/libvendor.dylib")], &[])
        .binary(&vendor, &[&fx.abs("lib/libsub.dylib")], &[]);

    let settings = Settings {
        ignore_prefixes: vec![fx.path("vendor")],
        ..copy_settings(&fx, vec![app.clone()])
    };
    let bundler = Bundler::new(&settings, &StdFs, &inspector, &NullReporter);
    let targets = bundler.targets().unwrap();
    let discovery = bundler.discover(&targets, FailOnUnresolved).unwrap();
    let plan = bundler.plan(&discovery, &targets).unwrap();

    assert_eq!(
        discovery.store.get(&vendor).unwrap().disposition,
        Disposition::Ignored
    );
    assert_eq!(inspector.inspections(&vendor), 1);
    assert!(discovery.store.get(&sub).is_some());
    assert!(plan.copies.iter().all(|c| c.from != vendor));
    assert!(plan.reference_rewrites.iter().all(|r| r.file != app));
    assert!(plan.id_rewrites.iter().all(|r| !r.install_name.contains("libvendor")));
}

/// `app` -> `@rpath/libfoo.dylib` (rpath `opt/libs/`) -> `usr/local/lib/libbar.dylib`.
#[test]
fn test_rpath_chain_plan() {
    let fx = Fixture::new();
    let app = fx.file("bin/app");
    let foo = fx.file("opt/libs/libfoo.dylib");
    let bar = fx.file("usr/local/lib/libbar.dylib");
    let bar_ref = fx.abs("usr/local/lib/libbar.dylib");
    let rpath = format!("{}/", fx.abs("opt/libs"));

    let mut inspector = FakeInspector::default();
    inspector
        .binary(&app, &["@rpath/libfoo.dylib", "/usr/lib/libSystem.B.dylib"], &[&rpath])
        .binary(&foo, &[&bar_ref, "/usr/lib/libSystem.B.dylib"], &[]);

    let settings = copy_settings(&fx, vec![app.clone()]);
    let bundler = Bundler::new(&settings, &StdFs, &inspector, &NullReporter);
    let targets = bundler.targets().unwrap();
    let discovery = bundler.discover(&targets, FailOnUnresolved).unwrap();
    let plan = bundler.plan(&discovery, &targets).unwrap();

    let dest = fx.path("out/libs");
    let copies: Vec<(PathBuf, PathBuf)> = plan
        .copies
        .iter()
        .map(|c| (c.from.clone(), c.to.clone()))
        .collect();
    assert_eq!(
        copies,
        vec![
            (foo.clone(), dest.join("libfoo.dylib")),
            (bar.clone(), dest.join("libbar.dylib")),
        ]
    );

    let rewrites: Vec<(PathBuf, &str, &str)> = plan
        .reference_rewrites
        .iter()
        .map(|r| (r.file.clone(), r.old.as_str(), r.new.as_str()))
        .collect();
    assert_eq!(
        rewrites,
        vec![
            (
                app.clone(),
                "@rpath/libfoo.dylib",
                "@executable_path/../libs/libfoo.dylib"
            ),
            (
                dest.join("libfoo.dylib"),
                bar_ref.as_str(),
                "@executable_path/../libs/libbar.dylib"
            ),
        ]
    );
    assert!(
        plan.reference_rewrites
            .iter()
            .all(|r| !r.old.as_str().starts_with("/usr/lib/"))
    );
    assert_eq!(
        discovery
            .store
            .get(Path::new("/usr/lib/libSystem.B.dylib"))
            .map(|l| l.disposition),
        Some(Disposition::System)
    );
    assert_eq!(plan.rpath_rewrites.len(), 1);
    assert_eq!(plan.rpath_rewrites[0].file, app);
    assert_eq!(
        plan.rpath_rewrites[0].new.as_deref(),
        Some("@executable_path/../libs/")
    );
}

#[test]
fn test_symlinked_aliases_from_two_consumers() {
    let fx = Fixture::new();
    let app1 = fx.file("bin/app1");
    let app2 = fx.file("bin/app2");
    let real = fx.file("real/libfoo.1.dylib");
    fx.symlink("real/libfoo.1.dylib", "a/libfoo.dylib");
    fx.symlink("real/libfoo.1.dylib", "b/libfoo.dylib");

    let mut inspector = FakeInspector::default();
    inspector
        .binary(&app1, &[&fx.abs("a/libfoo.dylib")], &[])
        .binary(&app2, &[&fx.abs("b/libfoo.dylib")], &[]);

    let settings = copy_settings(&fx, vec![app1.clone(), app2.clone()]);
    let bundler = Bundler::new(&settings, &StdFs, &inspector, &NullReporter);
    let targets = bundler.targets().unwrap();
    let discovery = bundler.discover(&targets, FailOnUnresolved).unwrap();
    let plan = bundler.plan(&discovery, &targets).unwrap();

    assert_eq!(plan.copies.len(), 1);
    assert_eq!(plan.copies[0].from, real);
    assert_eq!(plan.copies[0].to, fx.path("out/libs/libfoo.1.dylib"));

    let rewrites_of = |file: &Path| -> Vec<_> {
        plan.reference_rewrites.iter().filter(|r| r.file == file).collect()
    };
    let app1_rewrites = rewrites_of(app1.as_path());
    let app2_rewrites = rewrites_of(app2.as_path());
    assert_eq!(app1_rewrites.len(), 1);
    assert_eq!(app2_rewrites.len(), 1);
    assert_eq!(app1_rewrites[0].old.as_str(), fx.abs("a/libfoo.dylib"));
    assert_eq!(app2_rewrites[0].old.as_str(), fx.abs("b/libfoo.dylib"));
    assert_eq!(app1_rewrites[0].new, "@executable_path/../libs/libfoo.1.dylib");
}

#[test]
fn test_unresolved_reference_is_fatal() {
    let fx = Fixture::new();
    let app = fx.file("bin/app");
    let mut inspector = FakeInspector::default();
    inspector.binary(&app, &["@rpath/libmissing.dylib"], &[]);

    let settings = copy_settings(&fx, vec![app]);
    let bundler = Bundler::new(&settings, &StdFs, &inspector, &NullReporter);
    let targets = bundler.targets().unwrap();
    let err = bundler.discover(&targets, FailOnUnresolved).unwrap_err();
    assert!(matches!(err, BundleError::UnresolvedDependency { .. }));
}

#[test]
fn test_folder_target_collects_macho_files() {
    let fx = Fixture::new();
    let one = fx.file("dist/bin/one");
    let two = fx.file("dist/lib/libtwo.dylib");
    std::fs::write(fx.path("dist/README"), b"text").unwrap();

    let inspector = FakeInspector::default();
    let settings = Settings {
        files_to_fix: vec![fx.path("dist")],
        ..Settings::default()
    };
    let bundler = Bundler::new(&settings, &StdFs, &inspector, &NullReporter);
    assert_eq!(bundler.targets().unwrap(), vec![one, two]);
}

#[test]
fn test_qt_plugins_expand_and_rerun() {
    let fx = Fixture::new();
    let app = fx.file("bin/app");
    let core = fx.file("qt/lib/QtCore.framework/Versions/5/QtCore");
    fx.file("qt/lib/QtCore.framework/Versions/5/Headers/qglobal.h");
    let gui = fx.file("qt/lib/QtGui.framework/Versions/5/QtGui");
    let cocoa = fx.file("qt/plugins/platforms/libqcocoa.dylib");
    fx.file("qt/plugins/platforms/libqminimal.dylib");
    let vkb = fx.file("qt/plugins/platforminputcontexts/libqtvirtualkeyboardplugin.dylib");

    let mut inspector = FakeInspector::default();
    inspector
        .binary(&app, &["@rpath/QtCore.framework/Versions/5/QtCore"], &[&fx.abs("qt/lib")])
        .binary(
            &cocoa,
            &[
                "@rpath/QtGui.framework/Versions/5/QtGui",
                "@rpath/QtCore.framework/Versions/5/QtCore",
            ],
            &["@loader_path/../../lib"],
        );

    let settings = Settings {
        bundle_frameworks: true,
        ..copy_settings(&fx, vec![app.clone()])
    };
    let bundler = Bundler::new(&settings, &StdFs, &inspector, &NullReporter);
    let targets = bundler.targets().unwrap();
    let discovery = bundler.discover(&targets, FailOnUnresolved).unwrap();

    let gui_root = fx.path("qt/lib/QtGui.framework");
    assert_eq!(
        discovery.store.get(&gui_root).map(|l| l.disposition),
        Some(Disposition::Bundled)
    );
    assert_eq!(inspector.inspections(&core), 1);
    assert_eq!(inspector.inspections(&gui), 1);
    assert_eq!(inspector.inspections(&cocoa), 1);
    assert_eq!(inspector.inspections(&vkb), 1);

    let plugins = fx.path("out/libs/plugins");
    let plugin_copies: Vec<PathBuf> = discovery.plugins.copies.iter().map(|c| c.to.clone()).collect();
    assert_eq!(
        plugin_copies,
        vec![
            plugins.join("platforms/libqcocoa.dylib"),
            plugins.join("platforminputcontexts/libqtvirtualkeyboardplugin.dylib"),
        ]
    );
    // No app bundle, so no qt.conf.
    assert!(discovery.plugins.generated_files.is_empty());

    let plan = bundler.plan(&discovery, &targets).unwrap();
    let core_copy = plan
        .copies
        .iter()
        .find(|c| c.from == fx.path("qt/lib/QtCore.framework"))
        .unwrap();
    assert_eq!(core_copy.kind, CopyKind::Bundle);
    assert_eq!(core_copy.strip, vec![PathBuf::from("Headers")]);
    assert!(plan.id_rewrites.iter().any(|r| {
        r.file == fx.path("out/libs/QtCore.framework/Versions/5/QtCore")
            && r.install_name == "@executable_path/../libs/QtCore.framework/Versions/5/QtCore"
    }));

    let cocoa_copy = plugins.join("platforms/libqcocoa.dylib");
    let cocoa_rewrites: Vec<&str> = plan
        .reference_rewrites
        .iter()
        .filter(|r| r.file == cocoa_copy)
        .map(|r| r.new.as_str())
        .collect();
    assert_eq!(
        cocoa_rewrites,
        vec![
            "@executable_path/../libs/QtGui.framework/Versions/5/QtGui",
            "@executable_path/../libs/QtCore.framework/Versions/5/QtCore",
        ]
    );
    assert!(plan.directories.contains(&plugins.join("platforms")));
}

const CODECS: &[PluginFamily] = &[PluginFamily {
    name: "media",
    trigger: "Media",
    plugin_root: "PlugIns/media",
    rules: &[PluginRule {
        subdir: "codecs",
        requires: None,
        only: &[],
        drop_unless: &[],
    }],
    config: Some(("media.conf", "plugins=PlugIns\n")),
}];

#[test]
fn test_registered_family_expands_once() {
    let fx = Fixture::new();
    let app = fx.file("bin/app");
    fx.file("sdk/lib/Media.framework/Media");
    let codec = fx.file("sdk/PlugIns/media/codecs/libh264.dylib");
    fx.file("sdk/PlugIns/media/codecs/README.txt");

    let mut inspector = FakeInspector::default();
    inspector.binary(&app, &[&fx.abs("sdk/lib/Media.framework/Media")], &[]);

    let policy = BundlePolicy {
        bundle_frameworks: true,
        ..BundlePolicy::default()
    };
    let layout = PluginLayout {
        plugin_dir: fx.path("out/PlugIns"),
        resources_dir: Some(fx.path("out/Resources")),
    };
    let mut traversal = Traversal::new(&inspector, PathResolver::new(&StdFs), policy, &NullReporter)
        .with_plugins(layout)
        .with_families(CODECS);
    traversal.discover(&[app.clone()]).unwrap();
    // A second pass over the same store adds nothing.
    traversal.discover(&[app]).unwrap();
    let discovery = traversal.finish();

    let copies: Vec<(PathBuf, PathBuf)> = discovery
        .plugins
        .copies
        .iter()
        .map(|c| (c.from.clone(), c.to.clone()))
        .collect();
    assert_eq!(
        copies,
        vec![(codec.clone(), fx.path("out/PlugIns/codecs/libh264.dylib"))]
    );
    assert_eq!(inspector.inspections(&codec), 1);
    assert_eq!(discovery.plugins.generated_files.len(), 1);
    assert_eq!(
        discovery.plugins.generated_files[0].path,
        fx.path("out/Resources/media.conf")
    );
}

#[test]
fn test_execute_plan_end_to_end() {
    let fx = Fixture::new();
    let app = fx.file("bin/app");
    fx.file("opt/libs/libfoo.dylib");

    let mut inspector = FakeInspector::default();
    inspector.binary(&app, &["@rpath/libfoo.dylib"], &[&fx.abs("opt/libs")]);

    let settings = Settings {
        codesign: true,
        ..copy_settings(&fx, vec![app.clone()])
    };
    let bundler = Bundler::new(&settings, &StdFs, &inspector, &NullReporter);
    let targets = bundler.targets().unwrap();
    let discovery = bundler.discover(&targets, FailOnUnresolved).unwrap();
    let plan = bundler.plan(&discovery, &targets).unwrap();

    let patcher = RecordingPatcher::default();
    let executor = Executor {
        fs: &StdFs,
        patcher: &patcher,
        signer: &patcher,
        reporter: &NullReporter,
    };
    let policy = DestinationPolicy {
        create_dir: true,
        ..DestinationPolicy::default()
    };
    executor.apply(&plan, policy).unwrap();

    let copy = fx.path("out/libs/libfoo.dylib");
    assert!(copy.exists());
    assert_eq!(
        *patcher.calls.borrow(),
        vec![
            format!("-id @executable_path/../libs/libfoo.dylib {}", copy.display()),
            format!(
                "-change @rpath/libfoo.dylib @executable_path/../libs/libfoo.dylib {}",
                app.display()
            ),
            format!(
                "-rpath {} @executable_path/../libs/ {}",
                fx.abs("opt/libs"),
                app.display()
            ),
            format!("sign {}", app.display()),
            format!("sign {}", copy.display()),
        ]
    );

    // A second run without overwrite permission conflicts before touching anything.
    patcher.calls.borrow_mut().clear();
    let err = executor
        .apply(&plan, DestinationPolicy::default())
        .unwrap_err();
    assert!(matches!(err, BundleError::DestinationConflict(_)));
    assert!(patcher.calls.borrow().is_empty());
}

#[test]
fn test_executable_relative_reference_without_bundle() {
    let fx = Fixture::new();
    let app = fx.file("bin/app");

    let mut inspector = FakeInspector::default();
    inspector.binary(&app, &["@executable_path/../Frameworks/libpre.dylib"], &[]);

    let reporter = WarningLog::default();
    let resolver = PathResolver::new(&StdFs);
    let mut traversal = Traversal::new(&inspector, resolver, BundlePolicy::default(), &reporter);
    traversal.discover(&[app.clone()]).unwrap();
    let discovery = traversal.finish();

    let lib = discovery
        .store
        .get(Path::new("@executable_path/../Frameworks/libpre.dylib"))
        .unwrap();
    assert_eq!(lib.disposition, Disposition::AlreadyBundled);
    assert_eq!(inspector.calls.borrow().len(), 1);
    assert_eq!(reporter.warnings.borrow().len(), 1);
    assert!(reporter.warnings.borrow()[0].contains("libpre.dylib"));

    let settings = copy_settings(&fx, vec![app.clone()]);
    let bundler = Bundler::new(&settings, &StdFs, &inspector, &NullReporter);
    let plan = bundler.plan(&discovery, &[app]).unwrap();
    assert!(plan.copies.is_empty());
    assert!(plan.reference_rewrites.is_empty());
}

/// `app` -> `Frameworks/libinb.dylib` (already in the destination) -> `ext/libz.dylib`.
#[test]
fn test_library_already_in_destination_is_repointed() {
    let fx = Fixture::new();
    let app = fx.file("bin/app");
    let inb = fx.file("Frameworks/libinb.dylib");
    fx.file("ext/libz.dylib");

    let mut inspector = FakeInspector::default();
    inspector
        .binary(&app, &[&fx.abs("Frameworks/libinb.dylib")], &[])
        .binary(&inb, &[&fx.abs("ext/libz.dylib")], &[]);

    let settings = Settings {
        dest_dir: fx.path("Frameworks"),
        install_path: "@executable_path/../Frameworks/".into(),
        ..copy_settings(&fx, vec![app.clone()])
    };
    let bundler = Bundler::new(&settings, &StdFs, &inspector, &NullReporter);
    let targets = bundler.targets().unwrap();
    let discovery = bundler.discover(&targets, FailOnUnresolved).unwrap();
    let plan = bundler.plan(&discovery, &targets).unwrap();

    assert_eq!(
        discovery.store.get(&inb).unwrap().disposition,
        Disposition::AlreadyBundled
    );
    assert_eq!(plan.copies.len(), 1);
    assert_eq!(plan.copies[0].to, fx.path("Frameworks/libz.dylib"));

    let inb_rewrites: Vec<_> = plan
        .reference_rewrites
        .iter()
        .filter(|r| r.file == inb)
        .collect();
    assert_eq!(inb_rewrites.len(), 1);
    assert_eq!(inb_rewrites[0].old.as_str(), fx.abs("ext/libz.dylib"));
    assert_eq!(inb_rewrites[0].new, "@executable_path/../Frameworks/libz.dylib");
    assert!(plan.reference_rewrites.iter().all(|r| r.file != app));
}

#[test]
fn test_same_file_name_in_two_directories_conflicts() {
    let fx = Fixture::new();
    let app = fx.file("bin/app");
    fx.file("a/libutil.dylib");
    fx.file("b/libutil.dylib");

    let mut inspector = FakeInspector::default();
    inspector.binary(&app, &[&fx.abs("a/libutil.dylib"), &fx.abs("b/libutil.dylib")], &[]);

    let settings = copy_settings(&fx, vec![app.clone()]);
    let bundler = Bundler::new(&settings, &StdFs, &inspector, &NullReporter);
    let targets = bundler.targets().unwrap();
    let discovery = bundler.discover(&targets, FailOnUnresolved).unwrap();
    let err = bundler.plan(&discovery, &targets).unwrap_err();
    assert!(matches!(err, BundleError::DuplicateDestination { ref to, .. }
        if *to == fx.path("out/libs/libutil.dylib")));
    assert!(!fx.path("out/libs").exists());
}

#[test]
fn test_framework_copy_keeps_links_and_drops_headers() {
    let fx = Fixture::new();
    let app = fx.file("bin/app");
    let framework = fx.path("opt/Foo.framework");
    fx.file("opt/Foo.framework/Versions/A/Foo");
    std::fs::create_dir_all(framework.join("Versions/A/Headers")).unwrap();
    std::fs::write(framework.join("Versions/A/Headers/foo.h"), b"").unwrap();
    symlink("A", framework.join("Versions/Current")).unwrap();
    symlink("Versions/Current/Foo", framework.join("Foo")).unwrap();
    symlink("Versions/Current/Headers", framework.join("Headers")).unwrap();

    let mut inspector = FakeInspector::default();
    inspector.binary(&app, &[&fx.abs("opt/Foo.framework/Versions/A/Foo")], &[]);

    let settings = Settings {
        bundle_frameworks: true,
        ..copy_settings(&fx, vec![app.clone()])
    };
    let bundler = Bundler::new(&settings, &StdFs, &inspector, &NullReporter);
    let targets = bundler.targets().unwrap();
    let discovery = bundler.discover(&targets, FailOnUnresolved).unwrap();
    let plan = bundler.plan(&discovery, &targets).unwrap();
    assert_eq!(plan.copies[0].kind, CopyKind::Bundle);

    let patcher = RecordingPatcher::default();
    let executor = Executor {
        fs: &StdFs,
        patcher: &patcher,
        signer: &patcher,
        reporter: &NullReporter,
    };
    let policy = DestinationPolicy {
        create_dir: true,
        ..DestinationPolicy::default()
    };
    executor.apply(&plan, policy).unwrap();

    let copy = fx.path("out/libs/Foo.framework");
    assert!(copy.join("Versions/A/Foo").is_file());
    for link in ["Versions/Current", "Foo"] {
        let meta = copy.join(link).symlink_metadata().unwrap();
        assert!(meta.file_type().is_symlink(), "{link}");
    }
    assert!(copy.join("Headers").symlink_metadata().is_err());
    assert!(!copy.join("Versions/A/Headers").exists());
    assert!(framework.join("Versions/A/Headers/foo.h").exists());
}
