//! In-memory codec for engine tests
//!
//! Documents are small text files:
//!
//! ```text
//! %PDF-fake
//! password=<pw>     (only when protected)
//! pages=<n>
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::codec::{CipherStrength, DocumentCodec, PageRef};
use crate::error::CodecError;

const HEADER: &str = "%PDF-fake";

pub struct FakeCodec;

pub struct FakeHandle {
    password: Option<String>,
    pages: u32,
    unlocked: bool,
}

#[derive(Default)]
pub struct FakeContainer {
    pages: u32,
    password: Option<String>,
}

pub fn fake_pdf(dir: &Path, name: &str, password: Option<&str>, pages: u32) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, render(password, pages)).unwrap();
    path
}

/// Returns `(password, pages)` of a fake document
pub fn read_fake(path: &Path) -> (Option<String>, u32) {
    let handle = parse(&fs::read_to_string(path).unwrap()).unwrap();
    (handle.password, handle.pages)
}

fn render(password: Option<&str>, pages: u32) -> String {
    let mut text = format!("{}\n", HEADER);
    if let Some(pw) = password {
        text.push_str(&format!("password={}\n", pw));
    }
    text.push_str(&format!("pages={}\n", pages));
    text
}

fn parse(text: &str) -> Result<FakeHandle, CodecError> {
    let mut lines = text.lines();
    if lines.next() != Some(HEADER) {
        return Err(CodecError::Parse("not a fake document".into()));
    }

    let mut handle = FakeHandle {
        password: None,
        pages: 0,
        unlocked: false,
    };
    for line in lines {
        if let Some(pw) = line.strip_prefix("password=") {
            handle.password = Some(pw.to_string());
        } else if let Some(n) = line.strip_prefix("pages=") {
            handle.pages = n
                .parse()
                .map_err(|_| CodecError::Parse(format!("bad page count {}", n)))?;
        }
    }
    Ok(handle)
}

impl DocumentCodec for FakeCodec {
    type Handle = FakeHandle;
    type Container = FakeContainer;

    fn open(&self, path: &Path) -> Result<FakeHandle, CodecError> {
        parse(&fs::read_to_string(path)?)
    }

    fn is_protected(&self, handle: &FakeHandle) -> bool {
        handle.password.is_some()
    }

    fn verify_password(&self, handle: &mut FakeHandle, password: &[u8]) -> Result<bool, CodecError> {
        let ok = match &handle.password {
            Some(pw) => pw.as_bytes() == password,
            None => true,
        };
        handle.unlocked |= ok;
        Ok(ok)
    }

    fn pages(&self, handle: &FakeHandle) -> Vec<PageRef> {
        (1..=handle.pages)
            .map(|number| PageRef {
                number,
                object: number,
                generation: 0,
            })
            .collect()
    }

    fn new_container(&self) -> FakeContainer {
        FakeContainer::default()
    }

    fn add_page(&self, container: &mut FakeContainer, source: &FakeHandle, _page: PageRef) -> Result<(), CodecError> {
        if source.password.is_some() && !source.unlocked {
            return Err(CodecError::Locked);
        }
        container.pages += 1;
        Ok(())
    }

    fn encrypt(
        &self,
        container: &mut FakeContainer,
        user_password: &[u8],
        _owner_password: &[u8],
        _permission_bits: u32,
        _strength: CipherStrength,
    ) -> Result<(), CodecError> {
        container.password = Some(String::from_utf8_lossy(user_password).into_owned());
        Ok(())
    }

    fn write(&self, container: FakeContainer, path: &Path) -> Result<(), CodecError> {
        fs::write(path, render(container.password.as_deref(), container.pages))?;
        Ok(())
    }
}
