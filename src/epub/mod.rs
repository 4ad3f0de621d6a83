//! EPUB 3 writer: mimetype, container, OPF, nav.xhtml, toc.ncx, stylesheet, cover, chapters.

use crate::model::Book;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTAINER_XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n    <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>\n  </rootfiles>\n</container>";

const MIMETYPE: &[u8] = b"application/epub+zip";
const OEBPS_PREFIX: &str = "OEBPS/";
const LANGUAGE: &str = "ru";

const STYLESHEET: &str = r#"@namespace epub "http://www.idpf.org/2007/ops";
body {
    font-family: Cambria, Liberation Serif, serif;
}
h1 {
    text-align: left;
    text-transform: uppercase;
    font-weight: 200;
}
"#;

/// Errors from the EPUB writer.
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("Cannot write EPUB: book title is empty.")]
    EmptyTitle,

    #[error("Cannot write EPUB: book author is empty.")]
    EmptyAuthor,

    #[error("Cannot write EPUB: book has no chapters.")]
    NoChapters,

    #[error("Cannot read cover image: {path}: {source}")]
    ReadCover {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create EPUB file: {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl From<std::io::Error> for EpubError {
    fn from(e: std::io::Error) -> Self {
        EpubError::Zip(zip::result::ZipError::Io(e))
    }
}

/// Write `book` to an EPUB file at `path`.
///
/// The cover image is read from `book.cover_path` before the destination is created, so an
/// unreadable cover leaves nothing behind. Spine order is cover, nav, then chapters 1..N.
pub fn write_epub(book: &Book, path: &Path) -> Result<(), EpubError> {
    validate_book(book)?;

    let cover = match &book.cover_path {
        Some(p) => Some(std::fs::read(p).map_err(|e| EpubError::ReadCover {
            path: p.clone(),
            source: e,
        })?),
        None => None,
    };

    let file = std::fs::File::create(path).map_err(|e| EpubError::CreateFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut zip = ZipWriter::new(file);

    let options_stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    let options_deflate = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    // Mimetype first, uncompressed.
    zip.start_file("mimetype", options_stored)?;
    zip.write_all(MIMETYPE)?;

    zip.start_file("META-INF/container.xml", options_deflate)?;
    zip.write_all(CONTAINER_XML)?;

    write_opf(book, cover.is_some(), &mut zip, options_deflate)?;
    write_nav_xhtml(book, &mut zip, options_deflate)?;
    write_ncx(book, &mut zip, options_deflate)?;

    zip.start_file(format!("{}style/nav.css", OEBPS_PREFIX), options_deflate)?;
    zip.write_all(STYLESHEET.as_bytes())?;

    if let Some(data) = &cover {
        write_cover_xhtml(book, &mut zip, options_deflate)?;
        zip.start_file(format!("{}images/cover.png", OEBPS_PREFIX), options_deflate)?;
        zip.write_all(data)?;
    }

    write_chapters(book, &mut zip, options_deflate)?;

    zip.finish()?;
    Ok(())
}

fn validate_book(book: &Book) -> Result<(), EpubError> {
    if book.title.trim().is_empty() {
        return Err(EpubError::EmptyTitle);
    }
    if book.author.trim().is_empty() {
        return Err(EpubError::EmptyAuthor);
    }
    if book.chapters.is_empty() {
        return Err(EpubError::NoChapters);
    }
    Ok(())
}

fn identifier(book: &Book) -> String {
    format!("urn:novelgen:{}", book.title)
}

fn chapter_file(i: usize) -> String {
    format!("chapter_{}.xhtml", i + 1)
}

/// Chapter heading, falling back to a numbered label when no title was derived.
fn chapter_heading(book: &Book, i: usize) -> String {
    let title = book.chapters[i].title.trim();
    if title.is_empty() {
        format!("Глава {}", i + 1)
    } else {
        title.to_string()
    }
}

fn write_opf(
    book: &Book,
    has_cover: bool,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut manifest = String::from(
        r#"    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="style_nav" href="style/nav.css" media-type="text/css"/>
"#,
    );
    if has_cover {
        manifest.push_str(
            r#"    <item id="cover-img" href="images/cover.png" media-type="image/png" properties="cover-image"/>
    <item id="cover" href="cover.xhtml" media-type="application/xhtml+xml"/>
"#,
        );
    }
    for i in 0..book.chapters.len() {
        manifest.push_str(&format!(
            "    <item id=\"chapter_{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            i + 1,
            chapter_file(i)
        ));
    }

    let mut spine = String::new();
    if has_cover {
        spine.push_str("    <itemref idref=\"cover\" linear=\"no\"/>\n");
    }
    spine.push_str("    <itemref idref=\"nav\"/>\n");
    for i in 0..book.chapters.len() {
        spine.push_str(&format!("    <itemref idref=\"chapter_{}\"/>\n", i + 1));
    }

    let cover_meta = if has_cover {
        "\n    <meta name=\"cover\" content=\"cover-img\"/>"
    } else {
        ""
    };

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="book-id" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:language>{lang}</dc:language>
    <dc:creator id="creator">{creator}</dc:creator>{cover_meta}
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}  </spine>
</package>
"#,
        id = xml_escape(&identifier(book)),
        title = xml_escape(&book.title),
        lang = LANGUAGE,
        creator = xml_escape(&book.author),
        cover_meta = cover_meta,
        manifest = manifest,
        spine = spine,
    );

    zip.start_file(format!("{}content.opf", OEBPS_PREFIX), options)?;
    zip.write_all(opf.as_bytes())?;
    Ok(())
}

fn write_nav_xhtml(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_links = String::new();
    for i in 0..book.chapters.len() {
        nav_links.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            chapter_file(i),
            xml_escape(&chapter_heading(book, i))
        ));
    }
    let nav = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" lang="{lang}" xml:lang="{lang}">
<head>
  <title>{title}</title>
  <link rel="stylesheet" type="text/css" href="style/nav.css"/>
</head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{title}</h1>
    <ol>
{links}    </ol>
  </nav>
</body>
</html>
"#,
        lang = LANGUAGE,
        title = xml_escape(&book.title),
        links = nav_links
    );
    zip.start_file(format!("{}nav.xhtml", OEBPS_PREFIX), options)?;
    zip.write_all(nav.as_bytes())?;
    Ok(())
}

fn write_ncx(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_points = String::new();
    for i in 0..book.chapters.len() {
        nav_points.push_str(&format!(
            r#"    <navPoint id="navpoint-{n}" playOrder="{n}">
      <navLabel><text>{label}</text></navLabel>
      <content src="{src}"/>
    </navPoint>
"#,
            n = i + 1,
            label = xml_escape(&chapter_heading(book, i)),
            src = chapter_file(i)
        ));
    }
    let ncx = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{}"/>
  </head>
  <docTitle>
    <text>{}</text>
  </docTitle>
  <navMap>
{}  </navMap>
</ncx>
"#,
        xml_escape(&identifier(book)),
        xml_escape(&book.title),
        nav_points
    );
    zip.start_file(format!("{}toc.ncx", OEBPS_PREFIX), options)?;
    zip.write_all(ncx.as_bytes())?;
    Ok(())
}

fn write_cover_xhtml(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let cover_xhtml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" lang="{lang}" xml:lang="{lang}">
<head>
  <title>{title}</title>
</head>
<body>
  <div style="text-align: center;">
    <img src="images/cover.png" alt="{title}" style="max-width: 100%; height: auto;"/>
  </div>
</body>
</html>
"#,
        lang = LANGUAGE,
        title = xml_escape(&book.title)
    );
    zip.start_file(format!("{}cover.xhtml", OEBPS_PREFIX), options)?;
    zip.write_all(cover_xhtml.as_bytes())?;
    Ok(())
}

fn write_chapters(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    for i in 0..book.chapters.len() {
        let heading = xml_escape(&chapter_heading(book, i));
        let html = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" lang="{lang}" xml:lang="{lang}">
<head>
  <title>{heading}</title>
  <link rel="stylesheet" type="text/css" href="style/nav.css"/>
</head>
<body>
  <h1>{heading}</h1>
{body}</body>
</html>
"#,
            lang = LANGUAGE,
            heading = heading,
            body = paragraphs(&book.chapters[i].content)
        );
        zip.start_file(format!("{}{}", OEBPS_PREFIX, chapter_file(i)), options)?;
        zip.write_all(html.as_bytes())?;
    }
    Ok(())
}

/// One `<p>` per non-empty line, trimmed and escaped.
fn paragraphs(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("  <p>{}</p>\n", xml_escape(line)))
        .collect()
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Chapter;
    use std::io::Read;
    use zip::read::ZipArchive;

    fn book(chapter_count: u32) -> Book {
        Book {
            title: "Тайна_особняка".to_string(),
            author: "AI".to_string(),
            chapters: (1..=chapter_count)
                .map(|i| Chapter {
                    index: i,
                    content: format!("Абзац {} один.\n\n  Абзац {} два.  \n", i, i),
                    title: format!("Глава {} <{}>", i, i),
                })
                .collect(),
            cover_path: None,
        }
    }

    fn read_entry(zip: &mut ZipArchive<std::fs::File>, name: &str) -> String {
        let mut entry = zip.by_name(name).unwrap();
        let mut s = String::new();
        entry.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn validate_book_rejects_empty_title() {
        let mut b = book(1);
        b.title.clear();
        let path = std::env::temp_dir().join("novelgen_epub_void.epub");
        assert!(matches!(write_epub(&b, &path), Err(EpubError::EmptyTitle)));
    }

    #[test]
    fn validate_book_rejects_empty_author() {
        let mut b = book(1);
        b.author.clear();
        let path = std::env::temp_dir().join("novelgen_epub_void.epub");
        assert!(matches!(write_epub(&b, &path), Err(EpubError::EmptyAuthor)));
    }

    #[test]
    fn validate_book_rejects_no_chapters() {
        let b = book(0);
        let path = std::env::temp_dir().join("novelgen_epub_void.epub");
        assert!(matches!(write_epub(&b, &path), Err(EpubError::NoChapters)));
    }

    #[test]
    fn write_epub_produces_expected_entries() {
        let b = book(2);
        let path = std::env::temp_dir().join("novelgen_epub_test_entries.epub");
        write_epub(&b, &path).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let mut zip = ZipArchive::new(file).unwrap();
        let names: Vec<String> = zip.file_names().map(String::from).collect();
        for expected in [
            "META-INF/container.xml",
            "OEBPS/content.opf",
            "OEBPS/nav.xhtml",
            "OEBPS/toc.ncx",
            "OEBPS/style/nav.css",
            "OEBPS/chapter_1.xhtml",
            "OEBPS/chapter_2.xhtml",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
        assert!(!names.iter().any(|n| n == "OEBPS/cover.xhtml"));
        let first = zip.by_index(0).unwrap();
        assert_eq!(first.name(), "mimetype");
        assert_eq!(first.compression(), zip::CompressionMethod::Stored);
        drop(first);
        let opf = read_entry(&mut zip, "OEBPS/content.opf");
        assert!(opf.contains("<dc:title>Тайна_особняка</dc:title>"));
        assert!(opf.contains("<dc:language>ru</dc:language>"));
        assert!(opf.contains("<dc:creator id=\"creator\">AI</dc:creator>"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn spine_and_toc_follow_generation_order() {
        let b = book(3);
        let path = std::env::temp_dir().join("novelgen_epub_test_order.epub");
        write_epub(&b, &path).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let mut zip = ZipArchive::new(file).unwrap();

        let opf = read_entry(&mut zip, "OEBPS/content.opf");
        let spine = &opf[opf.find("<spine").unwrap()..];
        let refs: Vec<&str> = spine
            .split("idref=\"")
            .skip(1)
            .filter_map(|s| s.split('"').next())
            .filter(|s| s.starts_with("chapter_"))
            .collect();
        assert_eq!(refs, vec!["chapter_1", "chapter_2", "chapter_3"]);

        let nav = read_entry(&mut zip, "OEBPS/nav.xhtml");
        let hrefs: Vec<&str> = nav
            .split("href=\"chapter_")
            .skip(1)
            .filter_map(|s| s.split('"').next())
            .collect();
        assert_eq!(hrefs, vec!["1.xhtml", "2.xhtml", "3.xhtml"]);

        let ncx = read_entry(&mut zip, "OEBPS/toc.ncx");
        let srcs: Vec<&str> = ncx
            .split("<content src=\"")
            .skip(1)
            .filter_map(|s| s.split('"').next())
            .collect();
        assert_eq!(srcs, vec!["chapter_1.xhtml", "chapter_2.xhtml", "chapter_3.xhtml"]);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn chapter_document_has_heading_and_paragraphs() {
        let b = book(1);
        let path = std::env::temp_dir().join("novelgen_epub_test_chapter.epub");
        write_epub(&b, &path).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let mut zip = ZipArchive::new(file).unwrap();
        let chapter = read_entry(&mut zip, "OEBPS/chapter_1.xhtml");
        assert!(chapter.contains("<h1>Глава 1 &lt;1&gt;</h1>"));
        assert!(chapter.contains("<p>Абзац 1 один.</p>"));
        assert!(chapter.contains("<p>Абзац 1 два.</p>"));
        assert_eq!(chapter.matches("<p>").count(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn cover_is_embedded_when_present() {
        let cover = std::env::temp_dir().join("novelgen_epub_test_cover.png");
        std::fs::write(&cover, b"\x89PNG fake").unwrap();
        let mut b = book(1);
        b.cover_path = Some(cover.clone());
        let path = std::env::temp_dir().join("novelgen_epub_test_with_cover.epub");
        write_epub(&b, &path).unwrap();
        let file = std::fs::File::open(&path).unwrap();
        let mut zip = ZipArchive::new(file).unwrap();
        let mut img = Vec::new();
        zip.by_name("OEBPS/images/cover.png")
            .unwrap()
            .read_to_end(&mut img)
            .unwrap();
        assert_eq!(img, b"\x89PNG fake".to_vec());
        let opf = read_entry(&mut zip, "OEBPS/content.opf");
        assert!(opf.contains("<meta name=\"cover\" content=\"cover-img\"/>"));
        assert!(opf.contains("properties=\"cover-image\""));
        std::fs::remove_file(&path).ok();
        std::fs::remove_file(&cover).ok();
    }

    #[test]
    fn unreadable_cover_fails_without_creating_package() {
        let mut b = book(1);
        b.cover_path = Some(PathBuf::from("/nonexistent_dir_novelgen_xyz/cover.png"));
        let path = std::env::temp_dir().join("novelgen_epub_test_missing_cover.epub");
        std::fs::remove_file(&path).ok();
        assert!(matches!(write_epub(&b, &path), Err(EpubError::ReadCover { .. })));
        assert!(!path.exists());
    }

    #[test]
    fn untitled_chapter_gets_numbered_heading() {
        let mut b = book(2);
        b.chapters[1].title.clear();
        assert_eq!(chapter_heading(&b, 1), "Глава 2");
        assert_eq!(chapter_heading(&b, 0), "Глава 1 <1>");
    }
}
