//! End-to-end render runs against a shell script standing in for Factorio.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mapshot::factorio::{ModList, MOD_LIST_FILE};
use mapshot::render::Renderer;
use mapshot::{shutdown_channel, Error, Factorio, RenderParams, Settings, Shutdown};
use tempfile::TempDir;

struct Install {
    _tmp: TempDir,
    root: PathBuf,
    script_output: PathBuf,
    renderer: Renderer,
}

/// Shell prelude: records the args, finds the staged mod dir and the run id.
const PRELUDE: &str = r#"
echo "$@" > "$ROOT/args.txt"
MODS=""
while [ $# -gt 0 ]; do
  case "$1" in
    --mod-directory) MODS="$2"; shift ;;
  esac
  shift
done
cp "$MODS/mod-list.json" "$ROOT/seen-mod-list.json"
cp "$MODS/mapshot/overrides.lua" "$ROOT/seen-overrides.lua"
ID=$(sed -n 's/.*"onstartup":"\([^"]*\)".*/\1/p' "$MODS/mapshot/overrides.lua")
trap 'exit 0' INT
"#;

fn install(body: &str) -> Install {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().canonicalize().unwrap();
    let datadir = root.join("data");
    let script_output = datadir.join("script-output");
    std::fs::create_dir_all(datadir.join("mods")).unwrap();
    std::fs::create_dir_all(datadir.join("saves")).unwrap();
    std::fs::create_dir_all(&script_output).unwrap();
    std::fs::write(
        datadir.join("mods").join(MOD_LIST_FILE),
        r#"{"mods":[{"name":"base","enabled":true}]}"#,
    )
    .unwrap();
    std::fs::write(datadir.join("saves").join("alpha.zip"), "not really a save").unwrap();

    let binary = root.join("factorio");
    let script = format!(
        "#!/bin/sh\nROOT='{}'\nOUT='{}'\n{}\n{}\n",
        root.display(),
        script_output.display(),
        PRELUDE,
        body
    );
    std::fs::write(&binary, script).unwrap();
    std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

    let settings = Settings {
        datadir: Some(datadir),
        binary: Some(binary),
        ..Default::default()
    };
    let fact = Factorio::new(&settings).unwrap();
    let renderer = Renderer::new(fact, None).poll_interval(Duration::from_millis(100));
    Install { _tmp: tmp, root, script_output, renderer }
}

fn staged_mods_dir(root: &Path) -> PathBuf {
    let args = std::fs::read_to_string(root.join("args.txt")).unwrap();
    let mut words = args.split_whitespace();
    while let Some(w) = words.next() {
        if w == "--mod-directory" {
            return PathBuf::from(words.next().unwrap());
        }
    }
    panic!("no --mod-directory in {args}");
}

const WRITES_MARKER: &str = r#"
sleep 0.3
printf 'alpha_001' > "$OUT/.tmp-$ID"
mv "$OUT/.tmp-$ID" "$OUT/mapshot-done-$ID"
sleep 30 &
wait $!
"#;

#[tokio::test]
async fn render_reports_output_from_marker() {
    let inst = install(WRITES_MARKER);
    let out = inst
        .renderer
        .render("alpha", &RenderParams::default(), Shutdown::never())
        .await
        .unwrap();

    assert_eq!(out.name, "alpha");
    assert_eq!(out.output, inst.script_output.join("alpha_001"));
    assert!(out.save.ends_with("saves/alpha.zip"));

    // Marker consumed.
    let marker = inst.script_output.join(format!("mapshot-done-{}", out.run_id));
    assert!(!marker.exists());

    // Fixed flags come first.
    let args = std::fs::read_to_string(inst.root.join("args.txt")).unwrap();
    assert!(args.starts_with("--disable-audio --disable-prototype-history --load-game "));

    // The staged mod list had the companion mod enabled.
    let list = ModList::load(&inst.root.join("seen-mod-list.json")).unwrap();
    assert!(list.mods.iter().any(|m| m.name == "mapshot" && m.enabled));
    assert!(list.mods.iter().any(|m| m.name == "base"));

    let overrides = std::fs::read_to_string(inst.root.join("seen-overrides.lua")).unwrap();
    assert!(overrides.contains(&format!("\"onstartup\":\"{}\"", out.run_id)));
    assert!(overrides.contains("\"shotname\":\"alpha\""));

    // Temporary working dir is gone.
    assert!(!staged_mods_dir(&inst.root).exists());
}

#[tokio::test]
async fn render_passes_overrides() {
    let inst = install(WRITES_MARKER);
    let params = RenderParams {
        tilemin: Some(16),
        surface: Some("nauvis".into()),
        ..Default::default()
    };
    inst.renderer.render("alpha", &params, Shutdown::never()).await.unwrap();

    let overrides = std::fs::read_to_string(inst.root.join("seen-overrides.lua")).unwrap();
    assert!(overrides.contains("\"tilemin\":16"));
    assert!(overrides.contains("\"surface\":\"nauvis\""));
    assert!(!overrides.contains("resolution"));
}

#[tokio::test]
async fn engine_exiting_first_is_an_error() {
    let inst = install("exit 0");
    let err = inst
        .renderer
        .render("alpha", &RenderParams::default(), Shutdown::never())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EngineExitedEarly { .. }), "{err}");
    assert!(!staged_mods_dir(&inst.root).exists());

    let inst = install("exit 2");
    let err = inst
        .renderer
        .render("alpha", &RenderParams::default(), Shutdown::never())
        .await
        .unwrap_err();
    match err {
        Error::EngineFailed { status } => assert_eq!(status.code(), Some(2)),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_save_fails_before_launch() {
    let inst = install(WRITES_MARKER);
    let err = inst
        .renderer
        .render("beta", &RenderParams::default(), Shutdown::never())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SaveNotFound { .. }));
    assert!(err.is_configuration());
    assert!(!inst.root.join("args.txt").exists());
}

#[tokio::test]
async fn missing_mod_list_fails_before_launch() {
    let inst = install(WRITES_MARKER);
    std::fs::remove_file(inst.root.join("data").join("mods").join(MOD_LIST_FILE)).unwrap();
    let err = inst
        .renderer
        .render("alpha", &RenderParams::default(), Shutdown::never())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ModListMissing { .. }));
    assert!(!inst.root.join("args.txt").exists());
}

#[tokio::test]
async fn cancellation_interrupts_engine() {
    let inst = install(
        r#"
trap 'echo interrupted > "$ROOT/interrupted.txt"; exit 0' INT
sleep 30 &
wait $!
"#,
    );
    let (trigger, shutdown) = shutdown_channel();
    let renderer = inst.renderer.clone();
    let run = tokio::spawn(async move { renderer.render("alpha", &RenderParams::default(), shutdown).await });

    tokio::time::sleep(Duration::from_millis(800)).await;
    trigger.trigger();

    let res = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("render did not stop")
        .unwrap();
    assert!(matches!(res, Err(Error::Cancelled)));
    assert!(inst.root.join("interrupted.txt").exists());
    assert!(!staged_mods_dir(&inst.root).exists());
}

#[tokio::test]
async fn marker_then_exit_is_a_success() {
    let inst = install(
        r#"
sleep 0.3
printf 'alpha_001' > "$OUT/mapshot-done-$ID"
exit 0
"#,
    );
    // Factorio exits long before the next poll would see the marker.
    let renderer = inst.renderer.clone().poll_interval(Duration::from_secs(5));
    let out = renderer
        .render("alpha", &RenderParams::default(), Shutdown::never())
        .await
        .unwrap();

    assert_eq!(out.output, inst.script_output.join("alpha_001"));
    let leftovers: Vec<_> = std::fs::read_dir(&inst.script_output).unwrap().collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
    assert!(!staged_mods_dir(&inst.root).exists());
}

#[tokio::test]
async fn unreadable_marker_is_fatal() {
    let inst = install(
        r#"
mkdir "$OUT/mapshot-done-$ID"
sleep 30 &
wait $!
"#,
    );
    let err = inst
        .renderer
        .render("alpha", &RenderParams::default(), Shutdown::never())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io { .. }), "{err}");
    assert!(!staged_mods_dir(&inst.root).exists());
}

#[tokio::test]
async fn dropping_render_stops_engine() {
    let inst = install(
        r#"
trap 'echo interrupted > "$ROOT/interrupted.txt"; exit 0' INT
sleep 30 &
wait $!
"#,
    );
    let timed_out = tokio::time::timeout(
        Duration::from_millis(800),
        inst.renderer.render("alpha", &RenderParams::default(), Shutdown::never()),
    )
    .await;
    assert!(timed_out.is_err());

    // Stopping and cleanup continue in the background.
    let mods = staged_mods_dir(&inst.root);
    let interrupted = inst.root.join("interrupted.txt");
    for _ in 0..50 {
        if interrupted.exists() && !mods.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(interrupted.exists());
    assert!(!mods.exists());
}
