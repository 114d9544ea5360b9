mod fixtures;

use std::fs;

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128Enc, Block};
use lopdf::{dictionary, Document, Object, ObjectId, StringFormat};
use pdfpass::codec::standard_security::{CryptMethod, SecurityParams};
use pdfpass::error::CodecError;
use pdfpass::{CipherStrength, DocumentCodec, LopdfCodec};
use tempfile::TempDir;

use fixtures::{build_pdf, page_content, page_contents, page_count, protect, write_pdf};

fn unprotect(input: &std::path::Path, output: &std::path::Path, password: &str) {
    let codec = LopdfCodec::new();
    let mut handle = codec.open(input).unwrap();
    assert!(codec.verify_password(&mut handle, password.as_bytes()).unwrap());
    let mut container = codec.new_container();
    for page in codec.pages(&handle) {
        codec.add_page(&mut container, &handle, page).unwrap();
    }
    codec.write(container, output).unwrap();
}

#[test]
fn add_then_remove_keeps_pages_and_content() {
    let dir = TempDir::new().unwrap();
    for strength in [CipherStrength::Rc4_40, CipherStrength::Rc4_128] {
        for pages in [0u32, 1, 3] {
            let plain = write_pdf(dir.path(), &format!("plain_{}.pdf", pages), pages);
            let locked = dir.path().join(format!("locked_{}_{}.pdf", strength, pages));
            let unlocked = dir.path().join(format!("unlocked_{}_{}.pdf", strength, pages));

            protect(&plain, &locked, "user", "owner", 4 | 16, strength);
            assert!(fixtures::is_encrypted(&locked));
            assert_eq!(page_count(&locked), pages as usize);

            unprotect(&locked, &unlocked, "user");
            assert!(!fixtures::is_encrypted(&unlocked));
            assert_eq!(page_count(&unlocked), pages as usize);

            let expected: Vec<_> = (1..=pages).map(page_content).collect();
            assert_eq!(page_contents(&unlocked), expected);
        }
    }
}

#[test]
fn encryption_dictionary_reflects_settings() {
    let dir = TempDir::new().unwrap();
    let plain = write_pdf(dir.path(), "plain.pdf", 1);

    let strong = dir.path().join("strong.pdf");
    protect(&plain, &strong, "u", "o", 4 | 16 | 32, CipherStrength::Rc4_128);
    let doc = Document::load(&strong).unwrap();
    let encrypt_id = doc.trailer.get(b"Encrypt").unwrap().as_reference().unwrap();
    let encrypt = doc.get_object(encrypt_id).unwrap().as_dict().unwrap();
    assert_eq!(encrypt.get(b"Filter").unwrap().as_name().unwrap(), b"Standard");
    assert_eq!(encrypt.get(b"V").unwrap().as_i64().unwrap(), 2);
    assert_eq!(encrypt.get(b"R").unwrap().as_i64().unwrap(), 3);
    assert_eq!(encrypt.get(b"Length").unwrap().as_i64().unwrap(), 128);
    assert_eq!(encrypt.get(b"P").unwrap().as_i64().unwrap(), 52);
    assert!(doc.trailer.has(b"ID"));

    let weak = dir.path().join("weak.pdf");
    protect(&plain, &weak, "u", "o", 0, CipherStrength::Rc4_40);
    let doc = Document::load(&weak).unwrap();
    let encrypt_id = doc.trailer.get(b"Encrypt").unwrap().as_reference().unwrap();
    let encrypt = doc.get_object(encrypt_id).unwrap().as_dict().unwrap();
    assert_eq!(encrypt.get(b"V").unwrap().as_i64().unwrap(), 1);
    assert_eq!(encrypt.get(b"R").unwrap().as_i64().unwrap(), 2);
    assert_eq!(encrypt.get(b"P").unwrap().as_i64().unwrap(), 0);
}

#[test]
fn content_is_not_readable_while_protected() {
    let dir = TempDir::new().unwrap();
    let plain = write_pdf(dir.path(), "plain.pdf", 1);
    let locked = dir.path().join("locked.pdf");
    protect(&plain, &locked, "user", "owner", 4, CipherStrength::Rc4_128);

    assert_ne!(page_contents(&locked), vec![page_content(1)]);
}

#[test]
fn owner_password_also_unlocks() {
    let dir = TempDir::new().unwrap();
    let plain = write_pdf(dir.path(), "plain.pdf", 2);
    let locked = dir.path().join("locked.pdf");
    let unlocked = dir.path().join("unlocked.pdf");
    protect(&plain, &locked, "reader", "admin", 4, CipherStrength::Rc4_128);

    unprotect(&locked, &unlocked, "admin");
    assert_eq!(page_count(&unlocked), 2);
}

#[test]
fn wrong_password_leaves_the_handle_locked() {
    let dir = TempDir::new().unwrap();
    let plain = write_pdf(dir.path(), "plain.pdf", 1);
    let locked = dir.path().join("locked.pdf");
    protect(&plain, &locked, "user", "owner", 4, CipherStrength::Rc4_128);

    let codec = LopdfCodec::new();
    let mut handle = codec.open(&locked).unwrap();
    assert!(codec.is_protected(&handle));
    assert!(!codec.verify_password(&mut handle, b"guess").unwrap());

    let page = codec.pages(&handle)[0];
    let mut container = codec.new_container();
    assert_eq!(
        codec.add_page(&mut container, &handle, page),
        Err(CodecError::Locked)
    );
}

#[test]
fn empty_user_password_opens_with_empty_string() {
    let dir = TempDir::new().unwrap();
    let plain = write_pdf(dir.path(), "plain.pdf", 1);
    let locked = dir.path().join("locked.pdf");
    protect(&plain, &locked, "", "owner", 4, CipherStrength::Rc4_128);

    let codec = LopdfCodec::new();
    let mut handle = codec.open(&locked).unwrap();
    assert!(codec.is_protected(&handle));
    assert!(codec.verify_password(&mut handle, b"").unwrap());
}

#[test]
fn garbage_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.pdf");
    fs::write(&path, b"%PDF-1.4\nthis is not a document").unwrap();

    match LopdfCodec::new().open(&path) {
        Err(CodecError::Parse(_)) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("garbage parsed as a document"),
    }
}

fn rewrite_encryption_dictionary(path: &std::path::Path, edit: impl FnOnce(&mut lopdf::Dictionary)) {
    let mut doc = Document::load(path).unwrap();
    let encrypt_id = doc.trailer.get(b"Encrypt").unwrap().as_reference().unwrap();
    let encrypt = doc.get_object_mut(encrypt_id).unwrap().as_dict_mut().unwrap();
    edit(encrypt);
    doc.save(path).unwrap();
}

#[test]
fn aes_256_and_foreign_handlers_are_unsupported() {
    let dir = TempDir::new().unwrap();
    let plain = write_pdf(dir.path(), "plain.pdf", 1);

    let v5 = dir.path().join("v5.pdf");
    protect(&plain, &v5, "user", "owner", 4, CipherStrength::Rc4_128);
    rewrite_encryption_dictionary(&v5, |encrypt| {
        encrypt.set("V", Object::Integer(5));
        encrypt.set("R", Object::Integer(5));
    });

    let public_key = dir.path().join("pubsec.pdf");
    protect(&plain, &public_key, "user", "owner", 4, CipherStrength::Rc4_128);
    rewrite_encryption_dictionary(&public_key, |encrypt| {
        encrypt.set("Filter", Object::Name(b"Adobe.PubSec".to_vec()));
    });

    for path in [&v5, &public_key] {
        match LopdfCodec::new().open(path) {
            Err(CodecError::UnsupportedSecurity(_)) => {}
            Err(other) => panic!("unexpected error for {}: {}", path.display(), other),
            Ok(_) => panic!("{} opened with an unsupported handler", path.display()),
        }
    }
}

fn aes_encrypt(key: &[u8], iv: [u8; 16], data: &[u8]) -> Vec<u8> {
    let cipher = Aes128Enc::new_from_slice(key).unwrap();
    let mut padded = data.to_vec();
    let pad = 16 - padded.len() % 16;
    padded.extend(std::iter::repeat(pad as u8).take(pad));

    let mut out = iv.to_vec();
    let mut previous = iv;
    for chunk in padded.chunks_exact(16) {
        let mut bytes = [0u8; 16];
        for (i, b) in chunk.iter().enumerate() {
            bytes[i] = b ^ previous[i];
        }
        let mut block = Block::from(bytes);
        cipher.encrypt_block(&mut block);
        previous.copy_from_slice(&block);
        out.extend_from_slice(&block);
    }
    out
}

fn aes_encrypt_object(params: &SecurityParams, file_key: &[u8], id: ObjectId, object: &mut Object) {
    match object {
        Object::String(bytes, _) => {
            let key = params.object_key(file_key, id, CryptMethod::AesV2);
            *bytes = aes_encrypt(&key, [7u8; 16], bytes);
        }
        Object::Array(items) => {
            for item in items.iter_mut() {
                aes_encrypt_object(params, file_key, id, item);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                aes_encrypt_object(params, file_key, id, value);
            }
        }
        Object::Stream(stream) => {
            let key = params.object_key(file_key, id, CryptMethod::AesV2);
            let content = aes_encrypt(&key, [9u8; 16], &stream.content);
            stream.set_content(content);
        }
        _ => {}
    }
}

#[test]
fn aes_protected_input_is_decrypted() {
    let dir = TempDir::new().unwrap();
    let file_id = b"fixture-file-id!".to_vec();

    let mut params = SecurityParams::for_encryption(CipherStrength::Rc4_128, b"aes", b"aes-owner", 4, file_id.clone());
    params.version = 4;
    params.revision = 4;
    params.stream_method = CryptMethod::AesV2;
    params.string_method = CryptMethod::AesV2;
    let file_key = params.authenticate_user(b"aes").unwrap();

    let mut doc = Document::load_mem(&build_pdf(2)).unwrap();
    let ids: Vec<ObjectId> = doc.objects.keys().copied().collect();
    for id in ids {
        if let Some(object) = doc.objects.get_mut(&id) {
            aes_encrypt_object(&params, &file_key, id, object);
        }
    }

    let mut encrypt = params.to_dictionary();
    encrypt.set(
        "CF",
        Object::Dictionary(dictionary! {
            "StdCF" => Object::Dictionary(dictionary! {
                "CFM" => Object::Name(b"AESV2".to_vec()),
                "Length" => Object::Integer(16)
            })
        }),
    );
    encrypt.set("StmF", Object::Name(b"StdCF".to_vec()));
    encrypt.set("StrF", Object::Name(b"StdCF".to_vec()));
    let encrypt_id = doc.add_object(encrypt);
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(file_id.clone(), StringFormat::Hexadecimal),
            Object::String(file_id, StringFormat::Hexadecimal),
        ]),
    );

    let locked = dir.path().join("aes.pdf");
    doc.save(&locked).unwrap();

    let unlocked = dir.path().join("unlocked.pdf");
    unprotect(&locked, &unlocked, "aes-owner");
    assert_eq!(page_contents(&unlocked), vec![page_content(1), page_content(2)]);
}
