//! Shared fixtures: small PDFs synthesized with lopdf

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use pdfpass::{CipherStrength, DocumentCodec, LopdfCodec};

/// A document with `pages` pages. Fonts and the media box are inherited
/// from the page tree root, and the Info dictionary carries a title string.
pub fn build_pdf(pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Font".to_vec()),
        "Subtype" => Object::Name(b"Type1".to_vec()),
        "BaseFont" => Object::Name(b"Helvetica".to_vec())
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => Object::Dictionary(dictionary! { "F1" => Object::Reference(font_id) })
    });

    let mut kids = Vec::new();
    for n in 1..=pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), page_content(n)));
        let page_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Page".to_vec()),
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id)
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Kids" => Object::Array(kids),
            "Count" => Object::Integer(i64::from(pages)),
            "Resources" => Object::Reference(resources_id),
            "MediaBox" => Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792)
            ])
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Catalog".to_vec()),
        "Pages" => Object::Reference(pages_id)
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::String(b"Quarterly figures".to_vec(), StringFormat::Literal)
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.trailer.set("Info", Object::Reference(info_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub fn page_content(n: u32) -> Vec<u8> {
    format!("BT /F1 24 Tf 72 720 Td (Page {}) Tj ET", n).into_bytes()
}

pub fn write_pdf(dir: &Path, name: &str, pages: u32) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, build_pdf(pages)).unwrap();
    path
}

/// Writes a protected copy of a fresh `pages`-page document
pub fn write_protected_pdf(dir: &Path, name: &str, pages: u32, user: &str, owner: &str) -> PathBuf {
    let plain = write_pdf(dir, &format!("plain_{}", name), pages);
    let path = dir.join(name);
    protect(&plain, &path, user, owner, 4 | 16, CipherStrength::Rc4_128);
    fs::remove_file(plain).unwrap();
    path
}

pub fn protect(input: &Path, output: &Path, user: &str, owner: &str, bits: u32, strength: CipherStrength) {
    let codec = LopdfCodec::new();
    let handle = codec.open(input).unwrap();
    let mut container = codec.new_container();
    for page in codec.pages(&handle) {
        codec.add_page(&mut container, &handle, page).unwrap();
    }
    codec
        .encrypt(&mut container, user.as_bytes(), owner.as_bytes(), bits, strength)
        .unwrap();
    codec.write(container, output).unwrap();
}

/// Page count read straight from the page tree
pub fn page_count(path: &Path) -> usize {
    Document::load(path).unwrap().get_pages().len()
}

/// Content stream bytes of every page, in page order
pub fn page_contents(path: &Path) -> Vec<Vec<u8>> {
    let doc = Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let page = doc.get_object(*id).unwrap().as_dict().unwrap();
            let content_id = page.get(b"Contents").unwrap().as_reference().unwrap();
            match doc.get_object(content_id).unwrap() {
                Object::Stream(stream) => stream.content.clone(),
                other => panic!("unexpected contents object: {:?}", other),
            }
        })
        .collect()
}

pub fn is_encrypted(path: &Path) -> bool {
    Document::load(path).unwrap().trailer.has(b"Encrypt")
}
