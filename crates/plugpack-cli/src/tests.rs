use clap::CommandFactory;
use clap::Parser;
use plugpack_core::RemoteList;
use tempfile::TempDir;

use crate::dispatch::{Cli, Commands, RemoteCommand};
use crate::flows::{self, CliContext, PackageSpec};
use crate::settings::Settings;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn parses_install_with_pin_flag() {
    let cli = Cli::parse_from(["plugpack", "install", "--pin", "Remote/Tools/hello"]);
    match cli.command {
        Commands::Install { specs, pin } => {
            assert_eq!(specs, vec!["Remote/Tools/hello".to_string()]);
            assert!(pin);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_global_flags_before_subcommand() {
    let cli = Cli::parse_from(["plugpack", "--root", "/tmp/pp", "-y", "sync"]);
    assert_eq!(cli.root.as_deref(), Some(std::path::Path::new("/tmp/pp")));
    assert!(cli.yes);
    assert!(matches!(cli.command, Commands::Sync { .. }));
}

#[test]
fn package_spec_parses_bare_path() {
    let spec = PackageSpec::parse("Remote/Tools/hello.lua").expect("must parse");
    assert_eq!(spec.remote, "Remote");
    assert_eq!(spec.category, "Tools");
    assert_eq!(spec.package, "hello.lua");
    assert_eq!(spec.version, None);
}

#[test]
fn package_spec_parses_version_suffix() {
    let spec = PackageSpec::parse("Remote/Tools/hello.lua@1.2.3").expect("must parse");
    assert_eq!(spec.version.as_deref(), Some("1.2.3"));
}

#[test]
fn package_spec_keeps_slashes_inside_the_package_name() {
    let spec = PackageSpec::parse("Remote/Tools/sub/dir/hello.lua").expect("must parse");
    assert_eq!(spec.category, "Tools");
    assert_eq!(spec.package, "sub/dir/hello.lua");
}

#[test]
fn package_spec_rejects_short_paths() {
    let err = PackageSpec::parse("Remote/hello.lua").expect_err("must fail");
    assert!(err.to_string().contains("expected remote/category/package"));
}

#[test]
fn package_spec_rejects_empty_version() {
    let err = PackageSpec::parse("Remote/Tools/hello.lua@").expect_err("must fail");
    assert!(err.to_string().contains("empty version"));
}

#[test]
fn settings_survive_a_save_and_reload() {
    let dir = TempDir::new().expect("must create temp dir");
    let path = dir.path().join("settings.toml");

    let mut settings = Settings::default();
    settings.auto_install = true;
    settings.workers = 2;
    settings.save(&path).expect("must save settings");

    let reloaded = Settings::load(&path).expect("must load settings");
    assert!(reloaded.auto_install);
    assert!(!reloaded.bleeding_edge);
    assert_eq!(reloaded.workers, 2);
}

#[test]
fn missing_settings_file_yields_defaults() {
    let dir = TempDir::new().expect("must create temp dir");
    let settings = Settings::load(&dir.path().join("settings.toml")).expect("must load");
    assert!(!settings.auto_install);
    assert_eq!(settings.workers, 4);
}

fn scratch_context() -> (TempDir, CliContext) {
    let dir = TempDir::new().expect("must create temp dir");
    let ctx = CliContext::new(Some(dir.path().to_path_buf()), true).expect("must build context");
    (dir, ctx)
}

#[test]
fn remote_add_persists_to_the_remote_list() {
    let (dir, ctx) = scratch_context();
    flows::remote(
        &ctx,
        RemoteCommand::Add {
            name: "Remote".into(),
            url: "https://index.test/index.xml".into(),
        },
    )
    .expect("must add remote");

    let remotes = RemoteList::load(&dir.path().join("state").join("remotes.toml"))
        .expect("must load remotes");
    let remote = remotes.get("Remote").expect("must find added remote");
    assert_eq!(remote.url(), "https://index.test/index.xml");
    assert!(remote.is_enabled());
}

#[test]
fn remote_disable_and_enable_round_trip() {
    let (dir, ctx) = scratch_context();
    flows::remote(
        &ctx,
        RemoteCommand::Add {
            name: "Remote".into(),
            url: "https://index.test/index.xml".into(),
        },
    )
    .expect("must add remote");

    flows::remote(&ctx, RemoteCommand::Disable { name: "Remote".into() })
        .expect("must disable remote");
    let path = dir.path().join("state").join("remotes.toml");
    let remotes = RemoteList::load(&path).expect("must load remotes");
    assert!(!remotes.get("Remote").expect("must exist").is_enabled());

    flows::remote(&ctx, RemoteCommand::Enable { name: "Remote".into() })
        .expect("must enable remote");
    let remotes = RemoteList::load(&path).expect("must load remotes");
    assert!(remotes.get("Remote").expect("must exist").is_enabled());
}

#[test]
fn removing_an_unknown_remote_is_an_error() {
    let (_dir, ctx) = scratch_context();
    let err = flows::remote(
        &ctx,
        RemoteCommand::Remove {
            name: "Ghost".into(),
            purge: false,
        },
    )
    .expect_err("must fail");
    assert!(err.to_string().contains("unknown remote 'Ghost'"));
}

#[test]
fn listing_an_empty_prefix_succeeds() {
    let (_dir, ctx) = scratch_context();
    flows::list(&ctx, None).expect("must list empty registry");
}
