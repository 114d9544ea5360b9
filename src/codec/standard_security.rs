//! Standard security handler
//!
//! Key derivation and password checks for `/Filter /Standard` encryption,
//! revisions 2 through 4. Documents are decrypted with RC4 or AES-128-CBC
//! (`AESV2` crypt filter) and encrypted with RC4 at 40 or 128 bits.

use std::collections::BTreeMap;

use aes::cipher::{BlockDecrypt, KeyInit};
use aes::{Aes128Dec, Block as AesBlock};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::codec::CipherStrength;
use crate::error::CodecError;

/// Padding string from the PDF reference, used to stretch passwords to 32 bytes
const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

const AES_SALT: &[u8; 4] = b"sAlT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptMethod {
    Identity,
    Rc4,
    AesV2,
}

/// Parameters of a document's encryption dictionary
#[derive(Debug, Clone)]
pub struct SecurityParams {
    pub version: i64,
    pub revision: i64,
    /// File key length in bytes
    pub key_length: usize,
    pub owner_entry: Vec<u8>,
    pub user_entry: Vec<u8>,
    pub permissions: i32,
    pub file_id: Vec<u8>,
    pub encrypt_metadata: bool,
    pub stream_method: CryptMethod,
    pub string_method: CryptMethod,
}

impl SecurityParams {
    /// Reads the encryption dictionary referenced by the trailer
    pub fn from_document(document: &Document) -> Result<Self, CodecError> {
        let encrypt = encryption_dictionary(document)?;

        let filter = encrypt
            .get(b"Filter")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or(&b""[..]);
        if filter != b"Standard" {
            return Err(CodecError::UnsupportedSecurity(format!(
                "filter {}",
                String::from_utf8_lossy(filter)
            )));
        }

        let version = integer(encrypt, b"V").unwrap_or(0);
        let revision = integer(encrypt, b"R")
            .ok_or_else(|| CodecError::Parse("encryption dictionary has no /R".into()))?;
        if !(1..=4).contains(&version) || !(2..=4).contains(&revision) {
            return Err(CodecError::UnsupportedSecurity(format!(
                "V {} R {}",
                version, revision
            )));
        }

        let (stream_method, string_method) = if version == 4 {
            (
                crypt_filter_method(encrypt, b"StmF")?,
                crypt_filter_method(encrypt, b"StrF")?,
            )
        } else {
            (CryptMethod::Rc4, CryptMethod::Rc4)
        };

        let key_bits = if revision == 2 {
            40
        } else if version == 4 {
            integer(encrypt, b"Length").unwrap_or(128)
        } else {
            integer(encrypt, b"Length").unwrap_or(40)
        };
        let key_length = ((key_bits / 8) as usize).clamp(5, 16);

        let owner_entry = string(encrypt, b"O")
            .ok_or_else(|| CodecError::Parse("encryption dictionary has no /O".into()))?;
        let user_entry = string(encrypt, b"U")
            .ok_or_else(|| CodecError::Parse("encryption dictionary has no /U".into()))?;
        if owner_entry.len() < 32 || user_entry.len() < 32 {
            return Err(CodecError::Parse("/O or /U entry shorter than 32 bytes".into()));
        }

        let permissions = integer(encrypt, b"P")
            .ok_or_else(|| CodecError::Parse("encryption dictionary has no /P".into()))?
            as i32;
        let encrypt_metadata = encrypt
            .get(b"EncryptMetadata")
            .ok()
            .and_then(|o| match o { lopdf::Object::Boolean(b) => Some(*b), _ => None })
            .unwrap_or(true);

        Ok(Self {
            version,
            revision,
            key_length,
            owner_entry: owner_entry[..32].to_vec(),
            user_entry: user_entry[..32].to_vec(),
            permissions,
            file_id: first_file_id(document),
            encrypt_metadata,
            stream_method,
            string_method,
        })
    }

    /// Fresh parameters for protecting a document with RC4
    pub fn for_encryption(
        strength: CipherStrength,
        user_password: &[u8],
        owner_password: &[u8],
        permission_bits: u32,
        file_id: Vec<u8>,
    ) -> Self {
        let (version, revision) = match strength {
            CipherStrength::Rc4_40 => (1, 2),
            CipherStrength::Rc4_128 => (2, 3),
        };
        let key_length = (strength.key_bits() / 8) as usize;
        let owner_password = if owner_password.is_empty() {
            user_password
        } else {
            owner_password
        };

        let mut params = Self {
            version,
            revision,
            key_length,
            owner_entry: compute_owner_entry(revision, key_length, owner_password, user_password),
            user_entry: Vec::new(),
            permissions: permission_bits as i32,
            file_id,
            encrypt_metadata: true,
            stream_method: CryptMethod::Rc4,
            string_method: CryptMethod::Rc4,
        };
        let key = params.file_key(user_password);
        params.user_entry = params.user_entry_for_key(&key);
        params
    }

    /// File encryption key derived from a (user) password
    pub fn file_key(&self, password: &[u8]) -> Vec<u8> {
        let mut context = md5::Context::new();
        context.consume(pad_password(password));
        context.consume(&self.owner_entry);
        context.consume(self.permissions.to_le_bytes());
        context.consume(&self.file_id);
        if self.revision >= 4 && !self.encrypt_metadata {
            context.consume([0xFF_u8; 4]);
        }
        let mut digest = context.compute().0.to_vec();

        if self.revision >= 3 {
            for _ in 0..50 {
                digest = md5::compute(&digest[..self.key_length]).0.to_vec();
            }
        }
        digest.truncate(self.key_length);
        digest
    }

    /// Expected `/U` value for a file key
    pub fn user_entry_for_key(&self, key: &[u8]) -> Vec<u8> {
        if self.revision == 2 {
            return rc4(key, &PASSWORD_PADDING);
        }

        let mut context = md5::Context::new();
        context.consume(PASSWORD_PADDING);
        context.consume(&self.file_id);
        let mut data = rc4(key, &context.compute().0);
        for round in 1..=19u8 {
            data = rc4(&xor_key(key, round), &data);
        }
        data.resize(32, 0);
        data
    }

    /// Returns the file key when `password` is the user password
    pub fn authenticate_user(&self, password: &[u8]) -> Option<Vec<u8>> {
        let key = self.file_key(password);
        let expected = self.user_entry_for_key(&key);
        let compared = if self.revision == 2 { 32 } else { 16 };

        (expected[..compared] == self.user_entry[..compared]).then_some(key)
    }

    /// Returns the file key when `password` is the owner password
    pub fn authenticate_owner(&self, password: &[u8]) -> Option<Vec<u8>> {
        let owner_key = owner_key(self.revision, self.key_length, password);
        let mut user_password = self.owner_entry.clone();

        if self.revision == 2 {
            user_password = rc4(&owner_key, &user_password);
        } else {
            for round in (0..=19u8).rev() {
                user_password = rc4(&xor_key(&owner_key, round), &user_password);
            }
        }
        self.authenticate_user(&user_password)
    }

    /// Per-object key (algorithm 1 of the reference)
    pub fn object_key(&self, file_key: &[u8], id: ObjectId, method: CryptMethod) -> Vec<u8> {
        let mut context = md5::Context::new();
        context.consume(file_key);
        context.consume(&id.0.to_le_bytes()[..3]);
        context.consume(id.1.to_le_bytes());
        if method == CryptMethod::AesV2 {
            context.consume(AES_SALT);
        }
        let digest = context.compute();
        digest.0[..(file_key.len() + 5).min(16)].to_vec()
    }

    /// Encryption dictionary describing these parameters
    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Name(b"Standard".to_vec()));
        dict.set("V", Object::Integer(self.version));
        dict.set("R", Object::Integer(self.revision));
        dict.set("Length", Object::Integer((self.key_length * 8) as i64));
        dict.set(
            "O",
            Object::String(self.owner_entry.clone(), lopdf::StringFormat::Hexadecimal),
        );
        dict.set(
            "U",
            Object::String(self.user_entry.clone(), lopdf::StringFormat::Hexadecimal),
        );
        dict.set("P", Object::Integer(i64::from(self.permissions)));
        dict
    }

    fn method_for(&self, target: CryptTarget) -> CryptMethod {
        match target {
            CryptTarget::String => self.string_method,
            CryptTarget::Stream => self.stream_method,
        }
    }

    /// Decrypts every string and stream in place, leaving `skip` untouched
    pub fn decrypt_objects(
        &self,
        objects: &mut BTreeMap<ObjectId, Object>,
        file_key: &[u8],
        skip: Option<ObjectId>,
    ) -> Result<(), CodecError> {
        let mut transform =
            |id: ObjectId, target: CryptTarget, data: &[u8]| -> Result<Vec<u8>, CodecError> {
                match self.method_for(target) {
                    CryptMethod::Identity => Ok(data.to_vec()),
                    CryptMethod::Rc4 => {
                        Ok(rc4(&self.object_key(file_key, id, CryptMethod::Rc4), data))
                    }
                    CryptMethod::AesV2 => {
                        aes_cbc_decrypt(&self.object_key(file_key, id, CryptMethod::AesV2), data)
                    }
                }
            };
        walk_objects(objects, skip, !self.encrypt_metadata, &mut transform)
    }

    /// RC4-encrypts every string and stream in place
    pub fn encrypt_objects(
        &self,
        objects: &mut BTreeMap<ObjectId, Object>,
        file_key: &[u8],
    ) -> Result<(), CodecError> {
        let mut transform =
            |id: ObjectId, _target: CryptTarget, data: &[u8]| -> Result<Vec<u8>, CodecError> {
                Ok(rc4(&self.object_key(file_key, id, CryptMethod::Rc4), data))
            };
        walk_objects(objects, None, false, &mut transform)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CryptTarget {
    String,
    Stream,
}

type Transform<'a> = dyn FnMut(ObjectId, CryptTarget, &[u8]) -> Result<Vec<u8>, CodecError> + 'a;

fn walk_objects(
    objects: &mut BTreeMap<ObjectId, Object>,
    skip: Option<ObjectId>,
    skip_metadata: bool,
    transform: &mut Transform<'_>,
) -> Result<(), CodecError> {
    let mut streams = 0usize;
    for (id, object) in objects.iter_mut() {
        if Some(*id) == skip {
            continue;
        }
        if let Object::Stream(stream) = &*object {
            let kind = stream.dict.get(b"Type").ok().and_then(|o| o.as_name().ok());
            if kind == Some(b"XRef".as_ref()) || (skip_metadata && kind == Some(b"Metadata".as_ref())) {
                continue;
            }
            streams += 1;
        }
        walk_object(*id, object, transform)?;
    }
    debug!(objects = objects.len(), streams, "applied standard security transform");
    Ok(())
}

fn walk_object(id: ObjectId, object: &mut Object, transform: &mut Transform<'_>) -> Result<(), CodecError> {
    match object {
        Object::String(bytes, _) => {
            *bytes = transform(id, CryptTarget::String, bytes)?;
        }
        Object::Array(items) => {
            for item in items.iter_mut() {
                walk_object(id, item, transform)?;
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                walk_object(id, value, transform)?;
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                walk_object(id, value, transform)?;
            }
            let content = transform(id, CryptTarget::Stream, &stream.content)?;
            stream.set_content(content);
        }
        _ => {}
    }
    Ok(())
}

fn encryption_dictionary(document: &Document) -> Result<&Dictionary, CodecError> {
    let entry = document
        .trailer
        .get(b"Encrypt")
        .map_err(|_| CodecError::Parse("trailer has no /Encrypt entry".into()))?;
    match entry {
        Object::Reference(id) => document
            .get_object(*id)
            .and_then(|o| o.as_dict())
            .map_err(|e| CodecError::Parse(format!("bad /Encrypt reference: {}", e))),
        Object::Dictionary(dict) => Ok(dict),
        _ => Err(CodecError::Parse("/Encrypt is not a dictionary".into())),
    }
}

fn crypt_filter_method(encrypt: &Dictionary, key: &[u8]) -> Result<CryptMethod, CodecError> {
    let name = match encrypt.get(key).ok().and_then(|o| o.as_name().ok()) {
        Some(name) => name,
        None => return Ok(CryptMethod::Identity),
    };
    if name == b"Identity" {
        return Ok(CryptMethod::Identity);
    }

    let cfm = encrypt
        .get(b"CF")
        .ok()
        .and_then(|o| o.as_dict().ok())
        .and_then(|cf| cf.get(name).ok())
        .and_then(|o| o.as_dict().ok())
        .and_then(|filter| filter.get(b"CFM").ok())
        .and_then(|o| o.as_name().ok())
        .unwrap_or(&b"None"[..]);

    match cfm {
        b"V2" => Ok(CryptMethod::Rc4),
        b"AESV2" => Ok(CryptMethod::AesV2),
        b"None" => Ok(CryptMethod::Identity),
        other => Err(CodecError::UnsupportedSecurity(format!(
            "crypt filter method {}",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn integer(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).ok().and_then(|o| o.as_i64().ok())
}

fn string(dict: &Dictionary, key: &[u8]) -> Option<Vec<u8>> {
    match dict.get(key) {
        Ok(Object::String(bytes, _)) => Some(bytes.clone()),
        _ => None,
    }
}

fn first_file_id(document: &Document) -> Vec<u8> {
    match document.trailer.get(b"ID") {
        Ok(Object::Array(ids)) => match ids.first() {
            Some(Object::String(bytes, _)) => bytes.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let used = password.len().min(32);
    padded[..used].copy_from_slice(&password[..used]);
    padded[used..].copy_from_slice(&PASSWORD_PADDING[..32 - used]);
    padded
}

fn owner_key(revision: i64, key_length: usize, owner_password: &[u8]) -> Vec<u8> {
    let mut digest = md5::compute(pad_password(owner_password)).0.to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            digest = md5::compute(&digest).0.to_vec();
        }
    }
    digest.truncate(key_length);
    digest
}

fn compute_owner_entry(revision: i64, key_length: usize, owner_password: &[u8], user_password: &[u8]) -> Vec<u8> {
    let key = owner_key(revision, key_length, owner_password);
    let mut data = rc4(&key, &pad_password(user_password));
    if revision >= 3 {
        for round in 1..=19u8 {
            data = rc4(&xor_key(&key, round), &data);
        }
    }
    data
}

fn xor_key(key: &[u8], value: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ value).collect()
}

/// RC4 keystream applied to `data`; the same call encrypts and decrypts
pub fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut s: [u8; 256] = [0; 256];
    for (i, slot) in s.iter_mut().enumerate() {
        *slot = i as u8;
    }

    let mut j = 0u8;
    for i in 0..256 {
        j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
        s.swap(i, j as usize);
    }

    let mut output = Vec::with_capacity(data.len());
    let mut i = 0u8;
    let mut j = 0u8;
    for &byte in data {
        i = i.wrapping_add(1);
        j = j.wrapping_add(s[i as usize]);
        s.swap(i as usize, j as usize);
        let k = s[(s[i as usize].wrapping_add(s[j as usize])) as usize];
        output.push(byte ^ k);
    }
    output
}

/// AES-128-CBC with the IV in the first block and PKCS#7 padding
fn aes_cbc_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() < 32 || data.len() % 16 != 0 {
        return Err(CodecError::Parse(format!(
            "AES payload of {} bytes is not a whole number of blocks",
            data.len()
        )));
    }

    let cipher = Aes128Dec::new_from_slice(key)
        .map_err(|_| CodecError::Parse("AES key must be 16 bytes".into()))?;

    let (iv, body) = data.split_at(16);
    let mut previous = [0u8; 16];
    previous.copy_from_slice(iv);
    let mut plain = Vec::with_capacity(body.len());

    for chunk in body.chunks_exact(16) {
        let mut block_bytes = [0u8; 16];
        block_bytes.copy_from_slice(chunk);
        let mut block = AesBlock::from(block_bytes);
        cipher.decrypt_block(&mut block);
        plain.extend(block.iter().zip(previous.iter()).map(|(a, b)| a ^ b));
        previous = block_bytes;
    }

    let pad = usize::from(*plain.last().unwrap_or(&0));
    if pad == 0 || pad > 16 || pad > plain.len() {
        return Err(CodecError::Parse("invalid AES padding".into()));
    }
    plain.truncate(plain.len() - pad);
    Ok(plain)
}
