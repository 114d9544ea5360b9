//! `DocumentCodec` backed by lopdf
//!
//! lopdf supplies the object model and serializer. Password handling lives in
//! `standard_security`. Pages are copied into a fresh document together with
//! every object they reference, so the output never shares structure with
//! the source beyond what the pages themselves need.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::codec::standard_security::SecurityParams;
use crate::codec::{CipherStrength, DocumentCodec, PageRef};
use crate::error::CodecError;
use crate::utils::io::atomic_write;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `/Parent` chains
const MAX_TREE_DEPTH: usize = 64;

const DEFAULT_VERSION: &str = "1.4";

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfCodec;

impl LopdfCodec {
    pub fn new() -> Self {
        Self
    }
}

/// An opened source document
pub struct LopdfHandle {
    document: Document,
    path: PathBuf,
    security: Option<SecurityParams>,
    unlocked: bool,
}

impl LopdfHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_locked(&self) -> bool {
        self.security.is_some() && !self.unlocked
    }
}

struct PendingEncryption {
    user_password: Zeroizing<Vec<u8>>,
    owner_password: Zeroizing<Vec<u8>>,
    permission_bits: u32,
    strength: CipherStrength,
}

/// A document under construction
pub struct LopdfContainer {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    /// Source object id to destination object id
    copied: HashMap<ObjectId, ObjectId>,
    encryption: Option<PendingEncryption>,
}

impl LopdfContainer {
    fn new() -> Self {
        let mut document = Document::with_version(DEFAULT_VERSION);
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
            copied: HashMap::new(),
            encryption: None,
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    fn destination_id(&mut self, source_id: ObjectId) -> ObjectId {
        if let Some(id) = self.copied.get(&source_id) {
            return *id;
        }
        let id = self.document.new_object_id();
        self.copied.insert(source_id, id);
        id
    }

    fn import_object(&mut self, source: &Document, object: &Object) -> Object {
        match object {
            Object::Reference(id) => self.import_reference(source, *id),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.import_object(source, item))
                    .collect(),
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(source, dict)),
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.import_dictionary(source, &stream.dict);
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    fn import_dictionary(&mut self, source: &Document, dict: &Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            let value = self.import_object(source, value);
            copy.set(key.clone(), value);
        }
        copy
    }

    fn import_reference(&mut self, source: &Document, id: ObjectId) -> Object {
        if let Some(mapped) = self.copied.get(&id) {
            return Object::Reference(*mapped);
        }

        let target = match source.get_object(id) {
            Ok(object) => object,
            Err(_) => return Object::Null,
        };
        // Page tree nodes are rebuilt, never copied
        if type_name(target) == Some(b"Pages".as_ref()) {
            return Object::Null;
        }

        let new_id = self.destination_id(id);
        let copy = match target {
            Object::Dictionary(dict) if type_name(target) == Some(b"Page".as_ref()) => {
                // A page reached through a link or annotation, not a member of the output tree
                let mut orphan = dict.clone();
                orphan.remove(b"Parent");
                Object::Dictionary(self.import_dictionary(source, &orphan))
            }
            other => self.import_object(source, other),
        };
        self.document.objects.insert(new_id, copy);
        Object::Reference(new_id)
    }
}

fn type_name(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        Object::Stream(stream) => &stream.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}

/// Page dictionary with inherited attributes pulled down from the tree
fn flattened_page(source: &Document, id: ObjectId) -> Result<Dictionary, CodecError> {
    let mut page = source
        .get_object(id)
        .and_then(Object::as_dict)
        .map_err(|e| CodecError::Parse(format!("page {} {} R: {}", id.0, id.1, e)))?
        .clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        depth += 1;

        let node = match source.get_object(parent_id).and_then(Object::as_dict) {
            Ok(node) => node,
            Err(_) => break,
        };
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    page.remove(b"Parent");
    Ok(page)
}

fn new_file_id() -> Vec<u8> {
    let mut context = md5::Context::new();
    context.consume(uuid::Uuid::new_v4().as_bytes());
    context.consume(chrono::Utc::now().to_rfc3339().as_bytes());
    context.compute().0.to_vec()
}

impl DocumentCodec for LopdfCodec {
    type Handle = LopdfHandle;
    type Container = LopdfContainer;

    fn open(&self, path: &Path) -> Result<LopdfHandle, CodecError> {
        let bytes = fs::read(path)?;
        let document = Document::load_mem(&bytes)?;

        let security = if document.trailer.has(b"Encrypt") {
            Some(SecurityParams::from_document(&document)?)
        } else {
            None
        };

        debug!(
            path = %path.display(),
            version = %document.version,
            objects = document.objects.len(),
            protected = security.is_some(),
            "opened document"
        );

        Ok(LopdfHandle {
            document,
            path: path.to_path_buf(),
            security,
            unlocked: false,
        })
    }

    fn is_protected(&self, handle: &LopdfHandle) -> bool {
        handle.security.is_some()
    }

    fn verify_password(&self, handle: &mut LopdfHandle, password: &[u8]) -> Result<bool, CodecError> {
        let params = match &handle.security {
            Some(params) => params,
            None => return Ok(true),
        };

        let key = match params
            .authenticate_user(password)
            .or_else(|| params.authenticate_owner(password))
        {
            Some(key) => Zeroizing::new(key),
            None => return Ok(false),
        };

        if !handle.unlocked {
            let encrypt_ref = handle
                .document
                .trailer
                .get(b"Encrypt")
                .and_then(Object::as_reference)
                .ok();
            params.decrypt_objects(&mut handle.document.objects, &key, encrypt_ref)?;

            handle.document.trailer.remove(b"Encrypt");
            if let Some(id) = encrypt_ref {
                handle.document.objects.remove(&id);
            }
            handle.unlocked = true;
            debug!(path = %handle.path.display(), revision = params.revision, "document unlocked");
        }
        Ok(true)
    }

    fn pages(&self, handle: &LopdfHandle) -> Vec<PageRef> {
        handle
            .document
            .get_pages()
            .into_iter()
            .map(|(number, (object, generation))| PageRef {
                number,
                object,
                generation,
            })
            .collect()
    }

    fn new_container(&self) -> LopdfContainer {
        LopdfContainer::new()
    }

    fn add_page(
        &self,
        container: &mut LopdfContainer,
        source: &LopdfHandle,
        page: PageRef,
    ) -> Result<(), CodecError> {
        if source.is_locked() {
            return Err(CodecError::Locked);
        }
        if container.kids.is_empty() {
            container.document.version = source.document.version.clone();
        }

        let source_id = (page.object, page.generation);
        let flattened = flattened_page(&source.document, source_id)?;
        let page_id = container.destination_id(source_id);

        let mut dict = container.import_dictionary(&source.document, &flattened);
        dict.set("Parent", Object::Reference(container.pages_id));
        container.document.objects.insert(page_id, Object::Dictionary(dict));
        container.kids.push(page_id);

        trace!(page = page.number, objects = container.copied.len(), "page copied");
        Ok(())
    }

    fn encrypt(
        &self,
        container: &mut LopdfContainer,
        user_password: &[u8],
        owner_password: &[u8],
        permission_bits: u32,
        strength: CipherStrength,
    ) -> Result<(), CodecError> {
        container.encryption = Some(PendingEncryption {
            user_password: Zeroizing::new(user_password.to_vec()),
            owner_password: Zeroizing::new(owner_password.to_vec()),
            permission_bits,
            strength,
        });
        Ok(())
    }

    fn write(&self, container: LopdfContainer, path: &Path) -> Result<(), CodecError> {
        let LopdfContainer {
            mut document,
            pages_id,
            kids,
            encryption,
            ..
        } = container;

        let page_count = kids.len() as i64;
        let kids: Vec<Object> = kids.into_iter().map(Object::Reference).collect();
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => Object::Name(b"Pages".to_vec()),
                "Kids" => Object::Array(kids),
                "Count" => Object::Integer(page_count)
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => Object::Name(b"Catalog".to_vec()),
            "Pages" => Object::Reference(pages_id)
        });
        document.trailer.set("Root", Object::Reference(catalog_id));

        if let Some(pending) = encryption {
            let file_id = new_file_id();
            let params = SecurityParams::for_encryption(
                pending.strength,
                &pending.user_password,
                &pending.owner_password,
                pending.permission_bits,
                file_id.clone(),
            );
            let key = Zeroizing::new(params.file_key(&pending.user_password));
            params
                .encrypt_objects(&mut document.objects, &key)
                .map_err(|e| CodecError::Encrypt(e.to_string()))?;

            let encrypt_id = document.add_object(params.to_dictionary());
            document.trailer.set("Encrypt", Object::Reference(encrypt_id));
            document.trailer.set(
                "ID",
                Object::Array(vec![
                    Object::String(file_id.clone(), StringFormat::Hexadecimal),
                    Object::String(file_id, StringFormat::Hexadecimal),
                ]),
            );
            debug!(strength = %pending.strength, permissions = pending.permission_bits, "container encrypted");
        }

        let mut buffer = Vec::new();
        document
            .save_to(&mut buffer)
            .map_err(|e| CodecError::Write(e.to_string()))?;

        atomic_write(path, &buffer).map_err(|e| CodecError::Write(e.to_string()))?;
        debug!(path = %path.display(), pages = page_count, bytes = buffer.len(), "document written");
        Ok(())
    }
}
