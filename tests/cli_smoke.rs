//! Smoke test for the jpeg2y4m binary: drive a short run end to end and
//! check the emitted stream structure.

use std::path::{Path, PathBuf};
use std::process::Command;

fn binary_path() -> PathBuf {
    // Set by cargo for integration tests of this package.
    match std::env::var_os("CARGO_BIN_EXE_jpeg2y4m") {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from("target/debug/jpeg2y4m"),
    }
}

fn fixture_root(tag: &str) -> PathBuf {
    let root = PathBuf::from("target").join("cli_smoke").join(format!(
        "{tag}_{}",
        std::process::id()
    ));
    std::fs::create_dir_all(&root).unwrap();
    root
}

fn write_jpeg(path: &Path, seed: u8) {
    let img = image::RgbImage::from_fn(32, 16, |x, y| {
        image::Rgb([seed.wrapping_mul(40), (x * 8) as u8, (y * 16) as u8])
    });
    img.save(path).unwrap();
}

#[test]
fn produces_a_parsable_stream_from_a_pattern() {
    let root = fixture_root("pattern");
    for i in 0..2u8 {
        write_jpeg(&root.join(format!("in_{i:02}.jpg")), i);
    }
    let out_path = root.join("out.y4m");

    let status = Command::new(binary_path())
        .arg("-j")
        .arg(root.join("in_%02d.jpg"))
        .args(["-f", "25", "-I", "p", "-n", "2", "-v", "0"])
        .arg("-o")
        .arg(&out_path)
        .status()
        .expect("failed to launch jpeg2y4m");
    assert!(status.success());

    let stream = std::fs::read(&out_path).unwrap();
    let header = b"YUV4MPEG2 W32 H16 F25:1 Ip A1:1 C420jpeg\n";
    assert!(stream.starts_with(header));

    // Two frame records follow, each FRAME marker plus planar 4:2:0 data.
    let frame_record = 6 + 32 * 16 + 2 * (16 * 8);
    assert_eq!(stream.len(), header.len() + 2 * frame_record);
    assert_eq!(&stream[header.len()..header.len() + 6], b"FRAME\n");
}

#[test]
fn reads_filenames_from_stdin_when_no_pattern_is_given() {
    use std::io::Write as _;

    let root = fixture_root("stdin");
    let image_path = root.join("single.jpg");
    write_jpeg(&image_path, 5);
    let out_path = root.join("out.y4m");

    let mut child = Command::new(binary_path())
        .args(["-f", "30000:1001", "-I", "p", "-v", "0"])
        .arg("-o")
        .arg(&out_path)
        .stdin(std::process::Stdio::piped())
        .spawn()
        .expect("failed to launch jpeg2y4m");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(format!("{}\n", image_path.display()).as_bytes())
        .unwrap();
    let status = child.wait().unwrap();
    assert!(status.success());

    let stream = std::fs::read(&out_path).unwrap();
    assert!(stream.starts_with(b"YUV4MPEG2 W32 H16 F30000:1001 Ip A1:1 C420jpeg\n"));
}

#[test]
fn rejects_a_missing_first_image() {
    let root = fixture_root("missing");

    let status = Command::new(binary_path())
        .arg("-j")
        .arg(root.join("absent_%02d.jpg"))
        .args(["-f", "25", "-I", "p", "-v", "0"])
        .arg("-o")
        .arg(root.join("out.y4m"))
        .status()
        .expect("failed to launch jpeg2y4m");
    assert!(!status.success());
}
