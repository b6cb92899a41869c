use std::fs;
use std::path::Path;

use tempfile::TempDir;

use txtpub::import::DetectionMethod;
use txtpub::{
    ConvertOptions, Converter, FileOutcome, MetadataHints, OutputNaming, inspect_epub,
};

fn write(dir: &Path, name: &str, bytes: &[u8]) {
    fs::write(dir.join(name), bytes).unwrap();
}

fn converted(outcome: &FileOutcome) -> (&Path, usize, &str) {
    match outcome {
        FileOutcome::Converted {
            output,
            chapters,
            encoding,
            ..
        } => (output.as_path(), *chapters, encoding.as_str()),
        other => panic!("expected a conversion, got {other:?}"),
    }
}

#[test]
fn test_two_chapter_novel_end_to_end() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "故事.txt",
        "第一章 开始\n今天天气很好。\n第二章 结束\n故事说完了。\n".as_bytes(),
    );

    let mut converter = Converter::new(ConvertOptions::default());
    let report = converter
        .convert_path(&dir.path().join("故事.txt"), None)
        .unwrap();
    assert!(report.is_success());

    let (output, chapters, encoding) = converted(&report.outcomes[0]);
    assert_eq!(output, dir.path().join("故事.epub"));
    assert_eq!(chapters, 2);
    assert_eq!(encoding, "UTF-8");

    let summary = inspect_epub(output).unwrap();
    assert_eq!(summary.metadata.title, "故事");
    assert_eq!(summary.metadata.author, "无");
    assert_eq!(summary.spine_hrefs(), vec!["chapter1.xhtml", "chapter2.xhtml"]);
    let titles: Vec<&str> = summary.toc.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["第一章 开始", "第二章 结束"]);
}

#[test]
fn test_gb18030_source_with_author_line() {
    let dir = TempDir::new().unwrap();
    let (bytes, _, _) =
        encoding_rs::GB18030.encode("作者：李四\n\n第一章 山\n山很高。\n第二章 水\n水很深。\n");
    write(dir.path(), "山水.txt", &bytes);

    let mut converter = Converter::new(
        ConvertOptions::default().with_naming(OutputNaming::TitleAuthor),
    );
    let report = converter
        .convert_path(&dir.path().join("山水.txt"), None)
        .unwrap();

    let (output, chapters, encoding) = converted(&report.outcomes[0]);
    assert_eq!(output, dir.path().join("山水 - 李四.epub"));
    assert_eq!(chapters, 3, "preface plus two chapters");
    assert_eq!(encoding, "gb18030");

    let summary = inspect_epub(output).unwrap();
    assert_eq!(summary.metadata.author, "李四");
    assert_eq!(summary.toc[0].title, "前言");
}

#[test]
fn test_utf16le_bom_is_detected() {
    let dir = TempDir::new().unwrap();
    let mut bytes = vec![0xFF, 0xFE];
    for unit in "第一章 你好\n世界\n".encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    write(dir.path(), "utf16.txt", &bytes);

    let mut converter = Converter::new(ConvertOptions::default());
    let report = converter
        .convert_path(&dir.path().join("utf16.txt"), None)
        .unwrap();

    let (_, chapters, encoding) = converted(&report.outcomes[0]);
    assert_eq!(encoding, "UTF-16LE");
    assert_eq!(chapters, 1);

    let detection = converter
        .cache()
        .get(&dir.path().join("utf16.txt"))
        .unwrap();
    assert_eq!(detection.method, DetectionMethod::Bom);
}

#[test]
fn test_plain_ascii_is_utf8() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "plain.txt", b"Chapter 1\nIt was a dark night.\n");

    let mut converter = Converter::new(ConvertOptions::default());
    let report = converter
        .convert_path(&dir.path().join("plain.txt"), None)
        .unwrap();

    let (_, _, encoding) = converted(&report.outcomes[0]);
    assert_eq!(encoding, "UTF-8");
}

#[test]
fn test_empty_file_yields_one_chapter() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "empty.txt", b"");

    let mut converter = Converter::new(ConvertOptions::default());
    let report = converter
        .convert_path(&dir.path().join("empty.txt"), None)
        .unwrap();

    let (output, chapters, _) = converted(&report.outcomes[0]);
    assert_eq!(chapters, 1);
    let summary = inspect_epub(output).unwrap();
    assert_eq!(summary.spine, vec!["chapter1"]);
    assert_eq!(summary.toc[0].title, "正文");
}

#[test]
fn test_hints_override_file_name() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write(dir.path(), "《原名》原作者.txt", "第一章\n内容\n".as_bytes());

    let hints = MetadataHints::default().with_title("新名").with_author("新作者");
    let mut converter = Converter::new(ConvertOptions::default().with_hints(hints));
    let report = converter
        .convert_path(&dir.path().join("《原名》原作者.txt"), Some(out.path()))
        .unwrap();

    let (output, _, _) = converted(&report.outcomes[0]);
    assert_eq!(output, out.path().join("新名.epub"));
    let summary = inspect_epub(output).unwrap();
    assert_eq!(summary.metadata.title, "新名");
    assert_eq!(summary.metadata.author, "新作者");
}

#[test]
fn test_file_name_convention() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "《三体》刘慈欣.txt", "第一章\n内容\n".as_bytes());

    let mut converter = Converter::new(ConvertOptions::default());
    let report = converter.convert_path(dir.path(), None).unwrap();

    let (output, _, _) = converted(&report.outcomes[0]);
    assert_eq!(output, dir.path().join("三体.epub"));
    assert_eq!(inspect_epub(output).unwrap().metadata.author, "刘慈欣");
}

#[test]
fn test_directory_batch_in_path_order() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    write(dir.path(), "b.txt", "第一章\nB\n".as_bytes());
    write(dir.path(), "a.txt", "第一章\nA\n".as_bytes());
    write(dir.path(), "notes.md", b"# not a novel");

    let mut converter = Converter::new(ConvertOptions::default());
    let report = converter.convert_path(dir.path(), Some(&out)).unwrap();

    let sources: Vec<&Path> = report.outcomes.iter().map(FileOutcome::source).collect();
    assert_eq!(sources, vec![dir.path().join("a.txt"), dir.path().join("b.txt")]);
    assert!(out.join("a.epub").exists());
    assert!(out.join("b.epub").exists());
    assert_eq!(converter.cache().len(), 2);
}

#[test]
fn test_recursive_batch_mirrors_subdirectories() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("卷一")).unwrap();
    write(&dir.path().join("卷一"), "c.txt", "第一章\nC\n".as_bytes());
    write(dir.path(), "top.txt", "第一章\nT\n".as_bytes());

    let mut flat = Converter::new(ConvertOptions::default());
    let report = flat.convert_path(dir.path(), Some(out.path())).unwrap();
    assert_eq!(report.outcomes.len(), 1);

    let mut deep = Converter::new(ConvertOptions::default().with_recursive(true));
    let report = deep.convert_path(dir.path(), Some(out.path())).unwrap();
    assert_eq!(report.converted(), 2);
    assert!(out.path().join("卷一").join("c.epub").exists());
}

#[test]
fn test_skip_existing() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "book.txt", "第一章\n内容\n".as_bytes());
    write(dir.path(), "book.epub", b"existing");

    let mut converter = Converter::new(ConvertOptions::default().with_skip_existing(true));
    let report = converter.convert_path(dir.path(), None).unwrap();

    assert_eq!(report.skipped(), 1);
    assert!(report.is_success());
    assert_eq!(fs::read(dir.path().join("book.epub")).unwrap(), b"existing");

    let mut converter = Converter::new(ConvertOptions::default());
    let report = converter.convert_path(dir.path(), None).unwrap();
    assert_eq!(report.converted(), 1);
    assert!(inspect_epub(dir.path().join("book.epub")).is_ok());
}

#[cfg(unix)]
#[test]
fn test_batch_continues_past_failing_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", "第一章\nA\n".as_bytes());
    std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("b.txt")).unwrap();
    write(dir.path(), "c.txt", "第一章\nC\n".as_bytes());

    let mut converter = Converter::new(ConvertOptions::default());
    let report = converter.convert_path(dir.path(), None).unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.converted(), 2);
    assert_eq!(report.failed(), 1);
    assert!(!report.is_success());
    assert!(report.outcomes[1].is_failed());
    assert_eq!(report.outcomes[1].source(), dir.path().join("b.txt"));
    assert!(dir.path().join("c.epub").exists());
}

#[test]
fn test_missing_single_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut converter = Converter::new(ConvertOptions::default());
    let report = converter
        .convert_path(&dir.path().join("nope.txt"), None)
        .unwrap();

    assert_eq!(report.failed(), 1);
    match &report.outcomes[0] {
        FileOutcome::Failed { error, .. } => assert!(error.contains("nope.txt")),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn test_converting_twice_differs_only_in_identity() {
    use std::io::Cursor;

    use txtpub::export::{EpubExporter, Exporter};
    use txtpub::{EncodingCache, TextImporter};

    let dir = TempDir::new().unwrap();
    write(dir.path(), "twice.txt", "前情\n第一章 甲\n内容甲\n第二章 乙\n内容乙\n".as_bytes());
    let path = dir.path().join("twice.txt");

    let importer = TextImporter::new();
    let mut cache = EncodingCache::new();
    let mut first = importer
        .import(&path, &mut cache, &MetadataHints::default())
        .unwrap();
    let mut second = importer
        .import(&path, &mut cache, &MetadataHints::default())
        .unwrap();
    assert_ne!(first.metadata.identifier, second.metadata.identifier);

    for book in [&mut first, &mut second] {
        book.metadata.identifier = "urn:uuid:00000000-0000-4000-8000-000000000001".to_string();
        book.metadata.modified = "2024-01-01T00:00:00Z".to_string();
    }

    let export = |book: &txtpub::Book| {
        let mut out = Cursor::new(Vec::new());
        EpubExporter::new().export(book, &mut out).unwrap();
        out.into_inner()
    };
    assert_eq!(export(&first), export(&second));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_sources_sharing_a_title_get_distinct_outputs() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write(dir.path(), "三体.txt", "第一章\n甲\n".as_bytes());
    write(dir.path(), "《三体》刘慈欣.txt", "第一章\n乙\n第二章\n丙\n".as_bytes());

    let mut converter = Converter::new(ConvertOptions::default());
    let report = converter.convert_path(dir.path(), Some(out.path())).unwrap();
    assert_eq!(report.converted(), 2);

    // Path order puts the bracketed name first.
    let (first, first_chapters, _) = converted(&report.outcomes[0]);
    let (second, second_chapters, _) = converted(&report.outcomes[1]);
    assert_eq!(first, out.path().join("三体.epub"));
    assert_eq!(first_chapters, 2);
    assert_eq!(second, out.path().join("三体 (2).epub"));
    assert_eq!(second_chapters, 1);

    assert_eq!(inspect_epub(first).unwrap().metadata.author, "刘慈欣");
    assert_eq!(inspect_epub(second).unwrap().metadata.author, "无");
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 2);
}

#[test]
fn test_control_characters_in_hints_do_not_reach_the_archive() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "book.txt", "第一章\n内容\n".as_bytes());

    let hints = MetadataHints::default()
        .with_title("a\u{1}b")
        .with_author("x\u{8}y");
    let mut converter = Converter::new(ConvertOptions::default().with_hints(hints));
    let report = converter
        .convert_path(&dir.path().join("book.txt"), None)
        .unwrap();

    let (output, _, _) = converted(&report.outcomes[0]);
    assert_eq!(output, dir.path().join("ab.epub"));
    let summary = inspect_epub(output).unwrap();
    assert_eq!(summary.metadata.title, "ab");
    assert_eq!(summary.metadata.author, "xy");
}
