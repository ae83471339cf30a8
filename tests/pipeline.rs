//! Integration tests for the djvupress pipeline.
//!
//! Everything here runs without Calibre or DjVuLibre installed: planning,
//! preconditions and encoding are exercised directly, and the one
//! end-to-end test injects a [`Toolset`] whose "tools" are tiny shell
//! scripts written into a temp directory. Tests that need `/bin/sh` skip
//! themselves on platforms without it.

use djvupress::{
    convert_book_with, BookOutcome, BookSpec, DjvuPressError, Manifest, RunOptions, Settings,
    SkipReason, SourceKind, Toolset,
};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn fake_toolset() -> Toolset {
    Toolset {
        ebook_convert: Some(PathBuf::from("/opt/calibre/ebook-convert")),
        c44: Some(PathBuf::from("/usr/bin/c44")),
        djvm: Some(PathBuf::from("/usr/bin/djvm")),
        djvused: Some(PathBuf::from("/usr/bin/djvused")),
    }
}

fn write_page_png(path: &Path) {
    RgbImage::from_pixel(4, 4, Rgb([120, 130, 140]))
        .save(path)
        .expect("write test png");
}

/// Write an executable shell script and return its path.
#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// ── Manifest → plan → outcome ────────────────────────────────────────────────

#[test]
fn manifest_drives_planning() {
    let dir = tempfile::tempdir().unwrap();
    let scans = dir.path().join("scans");
    fs::create_dir(&scans).unwrap();
    write_page_png(&scans.join("page-1.png"));

    let manifest_path = dir.path().join("books.json");
    fs::write(
        &manifest_path,
        format!(
            r#"{{
                "settings": {{ "work_dir": "{work}", "out_dir": "{out}" }},
                "books": [
                    {{ "name": "scans", "source": "{src}" }},
                    {{ "name": "later", "source": "{src}", "skip": true }}
                ]
            }}"#,
            work = dir.path().join("tmp").display(),
            out = dir.path().join("out").display(),
            src = scans.display(),
        ),
    )
    .unwrap();

    let manifest = Manifest::load(&manifest_path).unwrap();
    assert_eq!(manifest.books.len(), 2);

    let plan = djvupress::build_plan(
        &manifest.books[0],
        &scans,
        &manifest.settings,
        &fake_toolset(),
    )
    .unwrap();
    assert_eq!(plan.source_kind, SourceKind::ImageSet);
    assert_eq!(
        plan.destination().unwrap(),
        dir.path().join("out").join("scans.djvu")
    );

    let reason = djvupress::build_plan(
        &manifest.books[1],
        &scans,
        &manifest.settings,
        &fake_toolset(),
    )
    .unwrap_err();
    assert_eq!(reason, SkipReason::Requested);
}

#[test]
fn pdf_books_are_demoted_without_calibre() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("atlas.pdf");
    fs::write(&pdf, b"%PDF-1.4").unwrap();
    let book = BookSpec::new("atlas", pdf.to_string_lossy());

    let tools = Toolset {
        ebook_convert: None,
        ..fake_toolset()
    };
    let reason = djvupress::build_plan(&book, &pdf, &Settings::default(), &tools).unwrap_err();
    assert_eq!(reason, SkipReason::MissingDocumentConverter);
    assert!(reason.to_string().contains("Calibre"));
}

// ── Destination precondition (re-run safety) ─────────────────────────────────

#[tokio::test]
async fn rerun_against_existing_destination_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::default().relative_to(dir.path());

    let scans = dir.path().join("scans");
    fs::create_dir(&scans).unwrap();
    write_page_png(&scans.join("page-1.png"));

    fs::create_dir_all(&settings.out_dir).unwrap();
    let destination = settings.out_dir.join("scans.djvu");
    fs::write(&destination, b"previous run").unwrap();

    let book = BookSpec::new("scans", scans.to_string_lossy());
    let outcome = convert_book_with(&book, &settings, &fake_toolset(), None).await;

    assert!(matches!(
        outcome,
        BookOutcome::Failed {
            error: DjvuPressError::DestinationExists { .. },
            ..
        }
    ));
    assert_eq!(fs::read(&destination).unwrap(), b"previous run");
    assert!(!settings.book_work_dir("scans").exists());
}

// ── End-to-end with scripted tools ───────────────────────────────────────────

/// Full image-set conversion where `c44`, `djvm` and `djvused` are shell
/// scripts: `c44` copies its input, `djvm` concatenates page markers into
/// the destination so page order is observable, `djvused` appends a marker.
#[cfg(unix)]
#[tokio::test]
async fn image_set_converts_end_to_end_in_canonical_order() {
    if which::which("sh").is_err() {
        eprintln!("SKIP — no /bin/sh available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    fs::create_dir(&bin).unwrap();

    // c44 -decibel 48 <pm> <djvu>: record which page this is.
    let c44 = write_script(
        &bin,
        "c44",
        r#"name=$(basename "$3"); printf '%s\n' "${name%.*}" > "$4""#,
    );
    // djvm -c|-i <dest> <page>: append the page marker to the document.
    let djvm = write_script(&bin, "djvm", r#"cat "$3" >> "$2""#);
    // djvused -e <cmd> -s <djvu>: append an outline marker.
    let djvused = write_script(&bin, "djvused", r#"printf 'outline\n' >> "$4""#);

    let tools = Toolset {
        ebook_convert: None,
        c44: Some(c44),
        djvm: Some(djvm),
        djvused: Some(djvused),
    };

    // Canonically named pages, created in non-sorted order.
    let scans = dir.path().join("scans");
    fs::create_dir(&scans).unwrap();
    for name in ["page-023.png", "page-004.png", "page-007.png"] {
        write_page_png(&scans.join(name));
    }
    let bookmarks = dir.path().join("outline.txt");
    fs::write(&bookmarks, "(bookmarks (\"Cover\" \"#1\"))").unwrap();

    let settings = Settings::default().relative_to(dir.path());
    let book = BookSpec::new("scans", scans.to_string_lossy()).bookmarks(&bookmarks);

    let outcome = convert_book_with(&book, &settings, &tools, None).await;
    let output = match outcome {
        BookOutcome::Converted(output) => output,
        other => panic!("expected conversion, got {other:?}"),
    };

    assert_eq!(output.pages, 3);
    assert!(output.bookmarks_attached);

    // Pages appended in canonical order, outline applied last.
    let document = fs::read_to_string(&output.document).unwrap();
    assert_eq!(document, "page-004\npage-007\npage-023\noutline\n");

    // Single-page DjVus were consumed; user scans were left alone.
    let work_dir = settings.book_work_dir("scans");
    assert!(fs::read_dir(&work_dir).unwrap().next().is_none());
    assert_eq!(fs::read_dir(&scans).unwrap().count(), 3);
}

/// The same scripted run with `keep_intermediates`: single-page DjVus stay.
#[cfg(unix)]
#[tokio::test]
async fn keep_intermediates_retains_page_djvus() {
    if which::which("sh").is_err() {
        eprintln!("SKIP — no /bin/sh available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    fs::create_dir(&bin).unwrap();
    let c44 = write_script(&bin, "c44", r#"printf 'page\n' > "$4""#);
    let djvm = write_script(&bin, "djvm", r#"cat "$3" >> "$2""#);
    let tools = Toolset {
        ebook_convert: None,
        c44: Some(c44),
        djvm: Some(djvm),
        djvused: None,
    };

    let scans = dir.path().join("scans");
    fs::create_dir(&scans).unwrap();
    write_page_png(&scans.join("page-001.png"));
    write_page_png(&scans.join("page-002.png"));

    let settings = Settings::default().relative_to(dir.path());
    let book = BookSpec::new("scans", scans.to_string_lossy()).keep_intermediates(true);

    let outcome = convert_book_with(&book, &settings, &tools, None).await;
    assert!(outcome.is_converted());

    let work_dir = settings.book_work_dir("scans");
    let kept: Vec<String> = fs::read_dir(&work_dir)
        .unwrap()
        .filter_map(|e| e.ok().map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect();
    assert!(kept.contains(&"page-001.djvu".to_string()));
    assert!(kept.contains(&"page-002.djvu".to_string()));
    // Portable maps are never retained, keep_intermediates or not.
    assert!(!kept.iter().any(|n| n.ends_with(".ppm") || n.ends_with(".pgm")));
}

/// A failing compressor aborts the book and reports the tool by name.
#[cfg(unix)]
#[tokio::test]
async fn failing_compressor_stops_the_stage() {
    if which::which("sh").is_err() {
        eprintln!("SKIP — no /bin/sh available");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let bin = dir.path().join("bin");
    fs::create_dir(&bin).unwrap();
    let c44 = write_script(&bin, "c44", "exit 2");
    let djvm = write_script(&bin, "djvm", "exit 0");
    let tools = Toolset {
        ebook_convert: None,
        c44: Some(c44),
        djvm: Some(djvm),
        djvused: None,
    };

    let scans = dir.path().join("scans");
    fs::create_dir(&scans).unwrap();
    write_page_png(&scans.join("page-001.png"));

    let settings = Settings::default().relative_to(dir.path());
    let book = BookSpec::new("scans", scans.to_string_lossy());

    let outcome = convert_book_with(&book, &settings, &tools, None).await;
    match outcome {
        BookOutcome::Failed { error, .. } => {
            assert!(matches!(
                error,
                DjvuPressError::ToolFailed { tool: "c44", .. }
            ));
        }
        other => panic!("expected tool failure, got {other:?}"),
    }
    // No document was produced.
    assert!(!settings.out_dir.join("scans.djvu").exists());
    // The portable map was not stranded either.
    let work_dir = settings.book_work_dir("scans");
    assert!(!fs::read_dir(&work_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .any(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.ends_with(".ppm") || name.ends_with(".pgm") || name.ends_with(".pm")
        }));
}

// ── Multi-book runs ──────────────────────────────────────────────────────────

#[tokio::test]
async fn independent_books_do_not_poison_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::default().relative_to(dir.path());

    let scans = dir.path().join("scans");
    fs::create_dir(&scans).unwrap();
    write_page_png(&scans.join("page-1.png"));

    let books = vec![
        BookSpec::new("ghost", dir.path().join("ghost.pdf").to_string_lossy()),
        BookSpec::new("opted-out", scans.to_string_lossy()).skip(true),
    ];

    // Missing tools everywhere: the first book fails on its missing source,
    // the second is skipped by flag; neither outcome leaks into the other.
    let report = djvupress::convert_books(&books, &settings, &RunOptions::default())
        .await
        .unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.converted(), 0);
}
