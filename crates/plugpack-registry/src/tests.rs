use plugpack_core::{
    Category, Index, Package, PackageType, Platform, Sections, Source, Version,
};

use super::*;

fn make_version(remote: &str, category: &str, package: &str, name: &str) -> Version {
    let index = Index::new(remote);
    let cat = Category::new(category, &index).expect("must create category");
    let pkg = Package::new(PackageType::Script, package, &cat);
    let mut version = Version::new(name, &pkg).expect("must create version");

    let main = Source::new(Platform::Generic, "", "https://host/main.lua", &version)
        .with_sections(Sections::MAIN);
    version.add_source(main).expect("must attach main source");
    let data = Source::new(Platform::Generic, "helper.lua", "https://host/helper.lua", &version);
    version.add_source(data).expect("must attach data source");

    version
}

fn open_scratch() -> (tempfile::TempDir, Registry) {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let registry = Registry::open(dir.path().join("registry.toml")).expect("must open registry");
    (dir, registry)
}

#[test]
fn open_missing_file_yields_empty_registry() {
    let (_dir, registry) = open_scratch();
    assert!(registry.all_entries().is_empty());
}

#[test]
fn open_rejects_malformed_file() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let path = dir.path().join("registry.toml");
    std::fs::write(&path, "entries = \"nope\"").expect("must write fixture");

    let error = Registry::open(&path).expect_err("must fail on malformed file");
    assert!(error.to_string().contains("failed parsing registry file"));
}

#[test]
fn push_records_version_and_files() {
    let (_dir, mut registry) = open_scratch();
    let version = make_version("Remote", "Category", "pkg.lua", "1.0");

    let entry = registry.push(&version, false);
    assert_eq!(entry.remote, "Remote");
    assert_eq!(entry.version.name(), "1.0");
    assert!(!entry.pinned);
    assert_eq!(entry.files.len(), 2);
    assert_eq!(entry.files[0].path, "Scripts/Remote/Category/pkg.lua");
    assert_eq!(entry.files[1].path, "Scripts/Remote/Category/helper.lua");

    let key = EntryKey::new("Remote", "Category", "pkg.lua");
    assert_eq!(registry.entry(&key), Some(entry));
}

#[test]
fn push_replaces_existing_entry() {
    let (_dir, mut registry) = open_scratch();
    registry.push(&make_version("Remote", "Category", "pkg.lua", "1.0"), true);
    registry.push(&make_version("Remote", "Category", "pkg.lua", "2.0"), false);

    let key = EntryKey::new("Remote", "Category", "pkg.lua");
    let entry = registry.entry(&key).expect("must find entry");
    assert_eq!(entry.version.name(), "2.0");
    assert!(!entry.pinned);
    assert_eq!(registry.all_entries().len(), 1);
}

#[test]
fn entries_filters_by_remote() {
    let (_dir, mut registry) = open_scratch();
    registry.push(&make_version("Alpha", "Category", "a.lua", "1.0"), false);
    registry.push(&make_version("Beta", "Category", "b.lua", "1.0"), false);

    let entries = registry.entries("Alpha");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].package, "a.lua");
}

#[test]
fn set_pinned_flips_flag() {
    let (_dir, mut registry) = open_scratch();
    registry.push(&make_version("Remote", "Category", "pkg.lua", "1.0"), false);

    let key = EntryKey::new("Remote", "Category", "pkg.lua");
    registry.set_pinned(&key, true).expect("must pin entry");
    assert!(registry.entry(&key).expect("must find entry").pinned);
}

#[test]
fn set_pinned_rejects_unknown_entry() {
    let (_dir, mut registry) = open_scratch();
    let key = EntryKey::new("Remote", "Category", "ghost.lua");

    let error = registry.set_pinned(&key, true).expect_err("must fail");
    assert_eq!(error.to_string(), "no registry entry for 'ghost.lua'");
}

#[test]
fn forget_removes_entry() {
    let (_dir, mut registry) = open_scratch();
    registry.push(&make_version("Remote", "Category", "pkg.lua", "1.0"), false);

    let key = EntryKey::new("Remote", "Category", "pkg.lua");
    registry.forget(&key);
    assert_eq!(registry.entry(&key), None);
}

#[test]
fn restore_reverts_to_savepoint() {
    let (_dir, mut registry) = open_scratch();
    registry.push(&make_version("Remote", "Category", "kept.lua", "1.0"), false);

    registry.savepoint();
    registry.push(&make_version("Remote", "Category", "new.lua", "1.0"), false);
    registry.forget(&EntryKey::new("Remote", "Category", "kept.lua"));
    registry.restore();

    assert_eq!(registry.all_entries().len(), 1);
    assert!(registry
        .entry(&EntryKey::new("Remote", "Category", "kept.lua"))
        .is_some());
}

#[test]
fn nested_savepoints_restore_independently() {
    let (_dir, mut registry) = open_scratch();
    registry.savepoint();
    registry.push(&make_version("Remote", "Category", "outer.lua", "1.0"), false);

    registry.savepoint();
    registry.push(&make_version("Remote", "Category", "inner.lua", "1.0"), false);
    registry.restore();

    assert!(registry
        .entry(&EntryKey::new("Remote", "Category", "outer.lua"))
        .is_some());
    assert!(registry
        .entry(&EntryKey::new("Remote", "Category", "inner.lua"))
        .is_none());

    registry.restore();
    assert!(registry.all_entries().is_empty());
}

#[test]
fn restore_reverts_pin_flip() {
    let (_dir, mut registry) = open_scratch();
    registry.push(&make_version("Remote", "Category", "pkg.lua", "1.0"), false);

    let key = EntryKey::new("Remote", "Category", "pkg.lua");
    registry.savepoint();
    registry.set_pinned(&key, true).expect("must pin entry");
    registry.restore();

    assert!(!registry.entry(&key).expect("must find entry").pinned);
}

#[test]
fn outermost_commit_persists_and_reloads() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let path = dir.path().join("registry.toml");

    let mut registry = Registry::open(&path).expect("must open registry");
    registry.savepoint();
    registry.push(&make_version("Remote", "Category", "pkg.lua", "1.2.3"), true);
    registry.commit().expect("must commit");

    let reloaded = Registry::open(&path).expect("must reopen registry");
    let entry = reloaded
        .entry(&EntryKey::new("Remote", "Category", "pkg.lua"))
        .expect("must survive reload");
    assert_eq!(entry.version.name(), "1.2.3");
    assert!(entry.pinned);
    assert_eq!(entry.files.len(), 2);
    assert_eq!(entry.files[0].package_type, PackageType::Script);
    assert_eq!(entry.files[0].sections, Sections::MAIN);
}

#[test]
fn inner_commit_does_not_persist() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let path = dir.path().join("registry.toml");

    let mut registry = Registry::open(&path).expect("must open registry");
    registry.savepoint();
    registry.savepoint();
    registry.push(&make_version("Remote", "Category", "pkg.lua", "1.0"), false);
    registry.commit().expect("must commit inner savepoint");

    assert!(!path.exists());
    registry.commit().expect("must commit outer savepoint");
    assert!(path.exists());
}

#[test]
fn main_files_keeps_sectioned_entries_only() {
    let (_dir, mut registry) = open_scratch();
    let entry = registry.push(&make_version("Remote", "Category", "pkg.lua", "1.0"), false);

    let main = entry.main_files();
    assert_eq!(main.len(), 1);
    assert_eq!(main[0].path, "Scripts/Remote/Category/pkg.lua");
}

#[test]
fn file_record_builds_native_path() {
    let record = FileRecord {
        path: "Scripts/Remote/Category/pkg.lua".to_string(),
        package_type: PackageType::Script,
        sections: Sections::MAIN,
    };
    let expected: PathBuf = ["Scripts", "Remote", "Category", "pkg.lua"].iter().collect();
    assert_eq!(record.fs_path(), expected);
}
