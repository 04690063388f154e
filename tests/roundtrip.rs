//! Song persistence through files

use chiptrack::{create_backend, ChipBackend, ChipError, EngineConfig, BACKEND_NAMES};
use std::fs;

fn backend(name: &str) -> Box<dyn ChipBackend> {
    create_backend(name, &EngineConfig::default()).expect("known backend")
}

fn edit(backend: &mut dyn ChipBackend) {
    let pattern = if backend.id() == "BV" { 2 } else { 3 };
    backend.set_song_pattern(0, 1, pattern);
    backend.set_pattern_cell(1, pattern, 4, 0, 2, 17);
    backend.set_instrument_cell(2, 0, 5, 0, b'w');
}

#[test]
fn test_saved_songs_load_back_identically() {
    let dir = tempfile::tempdir().expect("tempdir");
    for name in BACKEND_NAMES {
        let mut original = backend(name);
        edit(original.as_mut());
        let path = dir.path().join(format!("song.{}", original.file_extension()));
        original.save_song(&path).expect("save");

        let mut loaded = backend(name);
        loaded.load_song(&path).expect("load");
        assert_eq!(
            loaded.save_to_bytes().expect("save"),
            original.save_to_bytes().expect("save"),
            "{name} changed across a save/load cycle"
        );
        assert_eq!(loaded.pattern_num(0, 1), original.pattern_num(0, 1));
    }
}

#[test]
fn test_new_song_discards_edits() {
    for name in BACKEND_NAMES {
        let mut chip = backend(name);
        let empty = chip.save_to_bytes().expect("save");
        edit(chip.as_mut());
        chip.new_song().expect("new song");
        assert_eq!(chip.save_to_bytes().expect("save"), empty, "{name}");
    }
}

#[test]
fn test_register_file_of_wrong_size_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("short.bv");
    fs::write(&path, [0u8; 100]).expect("write");

    let mut chip = backend("bv");
    chip.set_song_pattern(0, 0, 7);
    let err = chip.load_song(&path).expect_err("100 bytes is not a song");
    assert!(matches!(err, ChipError::InvalidSize { expected: 512, actual: 100 }));
    assert_eq!(chip.pattern_num(0, 0), 7, "song kept after a failed load");
}

#[test]
fn test_text_song_with_bad_line_reports_line_number() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("bad.lft");
    fs::write(&path, "musicchip tune\nversion 1\n\nsongline 00 zz\n").expect("write");

    let mut chip = backend("lft");
    match chip.load_song(&path) {
        Err(ChipError::Parse { line, .. }) => assert_eq!(line, 4),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut chip = backend("p1xl");
    let err = chip.load_song(&dir.path().join("absent.p1xl")).expect_err("missing");
    assert!(matches!(err, ChipError::Io(_)));
}

#[test]
fn test_config_file_drives_backends() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("engine.json");
    fs::write(&path, r#"{ "sample_rate": 22050, "echo": { "enabled": false } }"#).expect("write");

    let config = EngineConfig::from_json_file(&path).expect("config");
    assert_eq!(config.register.tick_rate_hz, 50, "unspecified fields keep defaults");
    for name in BACKEND_NAMES {
        let chip = create_backend(name, &config).expect("backend");
        assert_eq!(chip.sample_rate(), 22_050, "{name}");
    }

    fs::write(&path, r#"{ "sample_rate": 0 }"#).expect("write");
    let config = EngineConfig::from_json_file(&path).expect("parses");
    assert!(matches!(create_backend("lft", &config), Err(ChipError::Config(_))));
}
