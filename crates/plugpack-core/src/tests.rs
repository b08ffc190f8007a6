use std::path::PathBuf;

use crate::{
    parse_index, quote_field, split_fields, AutoInstall, Category, Index, Package, PackageType,
    Platform, Remote, RemoteList, Sections, Source, Version, VersionName,
};

fn make_tree() -> (Index, Category, Package) {
    let index = Index::new("Remote Name");
    let category = Category::new("Category Name", &index).expect("must build category");
    let package = Package::new(PackageType::Script, "Hello", &category);
    (index, category, package)
}

fn sourced_version(name: &str, package: &Package) -> Version {
    let mut ver = Version::new(name, package).expect("must build version");
    ver.add_source(Source::new(Platform::Generic, "", "url", &ver.clone()))
        .expect("must attach");
    ver
}

#[test]
fn invalid_version_name() {
    let err = VersionName::parse("hello").expect_err("must reject");
    assert_eq!(err.to_string(), "invalid version name");
}

#[test]
fn major_minor_patch_version() {
    let ver = VersionName::parse("1.2.3").expect("must parse");
    assert_eq!(ver.name(), "1.2.3");
    assert_eq!(ver.code(), 1_000_200_030_000);
}

#[test]
fn major_minor_version() {
    let ver = VersionName::parse("1.2").expect("must parse");
    assert_eq!(ver.code(), 1_000_200_000_000);
}

#[test]
fn major_version() {
    let ver = VersionName::parse("1").expect("must parse");
    assert_eq!(ver.code(), 1_000_000_000_000);
}

#[test]
fn version_with_string_suffix() {
    let ver = VersionName::parse("1.2pre3").expect("must parse");
    assert_eq!(ver.code(), 1_000_200_030_000);
    assert!(!ver.is_stable());
}

#[test]
fn version_with_four_components() {
    let ver = VersionName::parse("1.2.3.4").expect("must parse");
    assert_eq!(ver.code(), 1_000_200_030_004);
    assert!(ver < VersionName::parse("1.2.4").expect("must parse"));
}

#[test]
fn decimal_version() {
    let ver = VersionName::parse("5.05").expect("must parse");
    assert_eq!(ver, VersionName::parse("5.5").expect("must parse"));
    assert!(ver < VersionName::parse("5.50").expect("must parse"));
}

#[test]
fn four_digit_version_component() {
    let ver = VersionName::parse("0.2015.12.25").expect("must parse");
    assert_eq!(ver.code(), 201_500_120_025);
    assert!(ver.is_stable());
}

#[test]
fn five_digit_version_component() {
    let err = VersionName::parse("12345.1").expect_err("must reject");
    assert_eq!(err.to_string(), "version component overflow");
}

#[test]
fn version_with_five_components() {
    let err = VersionName::parse("1.2.3.4.5").expect_err("must reject");
    assert_eq!(err.to_string(), "invalid version name");
}

#[test]
fn default_version_is_stable_and_lowest() {
    let default = VersionName::default();
    assert!(default.is_stable());
    assert!(default < VersionName::parse("0.1").expect("must parse"));
}

#[test]
fn version_full_name() {
    let (_, _, package) = make_tree();
    let ver = Version::new("1.0", &package).expect("must build version");
    assert_eq!(ver.full_name(), "Remote Name/Category Name/Hello v1.0");
}

#[test]
fn add_source() {
    let (_, _, package) = make_tree();
    let mut ver = Version::new("1", &package).expect("must build version");
    assert!(ver.sources().is_empty());

    let src = Source::new(Platform::Generic, "a", "b", &ver);
    assert!(ver.add_source(src).expect("must attach"));

    assert!(ver.main_source().is_none());
    assert_eq!(ver.sources().len(), 1);
}

#[test]
fn add_owned_source() {
    let (_, _, package) = make_tree();
    let mut ver = Version::new("1", &package).expect("must build version");
    let ver2 = Version::new("2", &package).expect("must build version");

    let src = Source::new(Platform::Generic, "a", "b", &ver2);
    let err = ver.add_source(src).expect_err("must reject");
    assert_eq!(err.to_string(), "source belongs to another version");
    assert!(ver.sources().is_empty());
}

#[test]
fn add_main_source() {
    let (_, _, package) = make_tree();
    let mut ver = Version::new("1", &package).expect("must build version");

    let src = Source::new(Platform::Generic, "", "b", &ver);
    ver.add_source(src).expect("must attach");
    assert!(ver.main_source().is_some());
    assert_eq!(ver.main_source().expect("main source").file_name(), "Hello");
}

#[test]
fn list_files() {
    let (_, _, package) = make_tree();
    let mut ver = Version::new("1", &package).expect("must build version");
    ver.add_source(Source::new(Platform::Generic, "file", "url", &ver.clone()))
        .expect("must attach");

    let expected: PathBuf = ["Scripts", "Remote Name", "Category Name", "file"]
        .iter()
        .collect();
    assert_eq!(ver.files().into_iter().collect::<Vec<_>>(), vec![expected]);
}

#[test]
fn extension_installs_outside_category_tree() {
    let index = Index::new("Remote");
    let category = Category::new("Extensions", &index).expect("must build category");
    let package = Package::new(PackageType::Extension, "thing.ext", &category);
    let mut ver = Version::new("1.0", &package).expect("must build version");
    ver.add_source(Source::new(Platform::Generic, "", "url", &ver.clone()))
        .expect("must attach");

    assert_eq!(
        ver.sources()[0].target_entry(),
        "UserPlugins/thing.ext"
    );
}

#[test]
fn drop_sources_for_unknown_platforms() {
    let (_, _, package) = make_tree();
    let mut ver = Version::new("1", &package).expect("must build version");
    let src = Source::new(Platform::Unknown, "a", "b", &ver);
    assert!(!ver.add_source(src).expect("attach must not error"));
    assert!(ver.sources().is_empty());
}

#[test]
fn drop_foreign_platform_sources() {
    let (_, _, package) = make_tree();
    let mut ver = Version::new("1", &package).expect("must build version");

    let foreign = if cfg!(windows) {
        [Platform::Darwin, Platform::Linux32, Platform::Linux64]
    } else if cfg!(target_os = "macos") {
        [Platform::Windows, Platform::Win32, Platform::Win64]
    } else {
        [Platform::Windows, Platform::Darwin32, Platform::Darwin64]
    };
    for platform in foreign {
        let src = Source::new(platform, "a", "b", &ver);
        assert!(!ver.add_source(src).expect("attach must not error"));
    }
    assert!(ver.sources().is_empty());

    let src = Source::new(Platform::Generic, "a", "b", &ver);
    assert!(ver.add_source(src).expect("attach must not error"));
    assert_eq!(ver.sources().len(), 1);
}

#[test]
fn add_category_and_find_package() {
    let mut index = Index::new("Remote");
    let mut category = Category::new("Tools", &index).expect("must build category");
    let mut package = Package::new(PackageType::Script, "hello.lua", &category);
    let mut ver = Version::new("1.0", &package).expect("must build version");
    ver.add_source(Source::new(Platform::Generic, "", "url", &ver.clone()))
        .expect("must attach");
    package.add_version(ver).expect("must attach");
    category.add_package(package).expect("must attach");
    assert!(index.add_category(category).expect("must attach"));

    assert!(index.find("Tools", "hello.lua").is_some());
    assert!(index.find("Tools", "missing").is_none());
    assert!(index.find("Other", "hello.lua").is_none());
    assert_eq!(index.packages().count(), 1);
}

#[test]
fn empty_category_is_dropped() {
    let mut index = Index::new("Remote");
    let category = Category::new("Empty", &index).expect("must build category");
    assert!(!index.add_category(category).expect("attach must not error"));
    assert!(index.category("Empty").is_none());
    assert!(index.categories().is_empty());
}

#[test]
fn empty_category_name_is_rejected() {
    let index = Index::new("Remote");
    let err = Category::new("", &index).expect_err("must reject");
    assert_eq!(err.to_string(), "empty category name");
}

#[test]
fn unknown_package_type_is_dropped() {
    let index = Index::new("Remote");
    let mut category = Category::new("Tools", &index).expect("must build category");
    let mut package = Package::new(PackageType::Unknown, "mystery", &category);
    let ver = sourced_version("1.0", &package);
    package.add_version(ver).expect("must attach");
    assert!(!category.add_package(package).expect("attach must not error"));
    assert!(category.package("mystery").is_none());
}

#[test]
fn package_without_versions_is_dropped() {
    let index = Index::new("Remote");
    let mut category = Category::new("Tools", &index).expect("must build category");
    let package = Package::new(PackageType::Script, "empty", &category);
    assert!(!category.add_package(package).expect("attach must not error"));
}

#[test]
fn category_from_another_index_is_rejected() {
    let mut index = Index::new("Remote");
    let other = Index::new("Other");
    let mut category = Category::new("Tools", &other).expect("must build category");
    let mut package = Package::new(PackageType::Script, "hello", &category);
    let ver = sourced_version("1.0", &package);
    package.add_version(ver).expect("must attach");
    category.add_package(package).expect("must attach");

    let err = index.add_category(category).expect_err("must reject");
    assert_eq!(err.to_string(), "category belongs to another index");
    assert!(index.categories().is_empty());
}

#[test]
fn duplicate_version_key_is_dropped() {
    let (_, _, mut package) = make_tree();
    let first = sourced_version("1.0", &package);
    let spelled_differently = sourced_version("1.00", &package);
    assert!(package.add_version(first).expect("must attach"));
    assert!(!package
        .add_version(spelled_differently)
        .expect("attach must not error"));
    assert_eq!(package.versions().len(), 1);
}

#[test]
fn version_without_sources_is_dropped() {
    let (_, _, mut package) = make_tree();
    let ver = Version::new("1.0", &package).expect("must build version");
    assert!(!package.add_version(ver).expect("attach must not error"));
    assert!(package.versions().is_empty());
}

#[test]
fn last_version_prefers_highest_stable() {
    let (_, _, mut package) = make_tree();
    for name in ["0.9", "1.0", "1.1pre1"] {
        let ver = sourced_version(name, &package);
        package.add_version(ver).expect("must attach");
    }

    let stable = package
        .last_version(false, &VersionName::default())
        .expect("must resolve");
    assert_eq!(stable.name().name(), "1.0");

    let bleeding = package
        .last_version(true, &VersionName::default())
        .expect("must resolve");
    assert_eq!(bleeding.name().name(), "1.1pre1");
}

#[test]
fn last_version_never_regresses_installed_prerelease() {
    let (_, _, mut package) = make_tree();
    for name in ["1.0", "2.0beta1"] {
        let ver = sourced_version(name, &package);
        package.add_version(ver).expect("must attach");
    }

    let installed = VersionName::parse("2.0beta1").expect("must parse");
    let resolved = package
        .last_version(false, &installed)
        .expect("must resolve");
    assert_eq!(resolved.name().name(), "2.0beta1");
}

#[test]
fn last_version_none_when_only_prereleases() {
    let (_, _, mut package) = make_tree();
    let ver = sourced_version("1.0rc1", &package);
    package.add_version(ver).expect("must attach");

    assert!(package
        .last_version(false, &VersionName::default())
        .is_none());
    assert!(package.last_version(true, &VersionName::default()).is_some());
}

#[test]
fn quoted_fields_round_trip() {
    let line = format!(
        "{} {} plain",
        quote_field("with space"),
        quote_field("has \"quotes\" and \\slashes\\")
    );
    let fields = split_fields(&line).expect("must split");
    assert_eq!(
        fields,
        vec!["with space", "has \"quotes\" and \\slashes\\", "plain"]
    );
}

#[test]
fn unterminated_quote_is_rejected() {
    assert!(split_fields("\"open").is_err());
}

#[test]
fn remote_record_round_trip() {
    let mut remote = Remote::new("Remote Name", "https://example.test/index.xml")
        .expect("must build remote");
    remote.set_enabled(false);
    remote.set_auto_install(AutoInstall::Enabled);

    let parsed = Remote::from_record(&remote.to_record()).expect("must parse");
    assert_eq!(parsed, remote);
}

#[test]
fn remote_name_validation() {
    assert!(Remote::new("", "url").is_err());
    assert!(Remote::new("bad/name", "url").is_err());
    assert!(Remote::new("Good Name", "url").is_ok());
}

#[test]
fn remote_list_protects_protected_remotes() {
    let mut list = RemoteList::default();
    let mut keeper = Remote::new("keeper", "url").expect("must build remote");
    keeper.protect();
    list.add(keeper);
    list.add(Remote::new("other", "url").expect("must build remote"));

    assert!(list.remove("other"));
    assert!(!list.remove("keeper"));
    assert!(list.get("keeper").is_some());
}

const SAMPLE_INDEX: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<index version="1">
  <category name="Tools">
    <package name="hello.lua" type="script">
      <version name="1.0" author="someone">
        <source platform="all" main="true">https://example.test/hello-1.0.lua</source>
      </version>
      <version name="1.1pre1" author="someone">
        <source platform="all" main="true">https://example.test/hello-1.1.lua</source>
      </version>
    </package>
    <package name="mystery.bin" type="data">
      <version name="1.0">
        <source platform="all">https://example.test/mystery.bin</source>
      </version>
    </package>
  </category>
  <category name="Empty"/>
</index>
"#;

#[test]
fn parse_index_v1() {
    let index = parse_index("Remote", SAMPLE_INDEX).expect("must parse");
    assert_eq!(index.name(), "Remote");
    assert_eq!(index.categories().len(), 1);

    let package = index.find("Tools", "hello.lua").expect("must resolve");
    assert_eq!(package.versions().len(), 2);
    assert_eq!(package.versions()[0].author(), "someone");
    assert_eq!(
        package.versions()[0].sources()[0].url(),
        "https://example.test/hello-1.0.lua"
    );
    assert_eq!(
        package.versions()[0].sources()[0].sections(),
        Sections::MAIN
    );

    // unknown type dropped at attach time
    assert!(index.find("Tools", "mystery.bin").is_none());
}

#[test]
fn parse_index_rejects_wrong_root() {
    let err = parse_index("Remote", "<database version=\"1\"/>").expect_err("must reject");
    assert_eq!(err.to_string(), "invalid index");
}

#[test]
fn parse_index_requires_version() {
    let err = parse_index("Remote", "<index></index>").expect_err("must reject");
    assert_eq!(err.to_string(), "index version not found");
}

#[test]
fn parse_index_rejects_unsupported_version() {
    let err = parse_index("Remote", "<index version=\"2\"></index>").expect_err("must reject");
    assert_eq!(err.to_string(), "index version is unsupported");
}

#[test]
fn sections_parse_main_attribute() {
    assert_eq!(Sections::parse("true"), Sections::MAIN);
    assert_eq!(Sections::parse(""), Sections::NONE);
    assert_eq!(
        Sections::parse("main editor"),
        Sections::MAIN | Sections::EDITOR
    );
    assert!(Sections::parse("main").contains(Sections::MAIN));
}
