//! Password protection using the PDF Standard Security Handler
//!
//! Encryption always produces RC4 128-bit, revision 3 documents. Decryption
//! accepts revisions 2 and 3 with 40- or 128-bit keys, authenticating with
//! either the user or the owner password.

use crate::error::PdfToolsError;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use md5::{Digest, Md5};
use rc4::consts::{U10, U16, U5};
use rc4::{KeyInit, Rc4, StreamCipher};
use std::path::Path;

/// Password padding string, ISO 32000-1 section 7.6.3.3
const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

const REVISION: i64 = 3;
const KEY_LEN: usize = 16;
/// Every permission bit granted
const PERMISSIONS: i32 = -4;

#[derive(Clone, Copy, PartialEq)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// Parameters of a standard security handler
struct Handler {
    revision: i64,
    key_len: usize,
    owner_entry: Vec<u8>,
    user_entry: Vec<u8>,
    permissions: i32,
    id0: Vec<u8>,
}

/// Returns true when the document declares an `/Encrypt` dictionary.
pub fn is_encrypted(bytes: &[u8]) -> Result<bool, PdfToolsError> {
    let doc = Document::load_mem(bytes).map_err(|e| PdfToolsError::ParseError(e.to_string()))?;
    Ok(doc.trailer.has(b"Encrypt"))
}

/// Encrypt a document with `user_password`. The owner password defaults to
/// the user password.
pub fn encrypt_document(
    bytes: &[u8],
    user_password: &str,
    owner_password: Option<&str>,
) -> Result<Vec<u8>, PdfToolsError> {
    if user_password.is_empty() {
        return Err(PdfToolsError::InvalidArgument(
            "Password must not be empty".into(),
        ));
    }

    let mut doc =
        Document::load_mem(bytes).map_err(|e| PdfToolsError::ParseError(e.to_string()))?;
    if doc.trailer.has(b"Encrypt") {
        return Err(PdfToolsError::AlreadyEncrypted);
    }

    // Object and xref streams were expanded on load; they are rewritten as
    // plain objects and must not be encrypted as payload.
    doc.objects.retain(|_, object| !is_structural_stream(object));
    // Filters apply before encryption, so compress first
    doc.compress();

    let id0 = match first_id(&doc) {
        Some(id) => id,
        None => {
            let id = Md5::digest(bytes).to_vec();
            doc.trailer.set(
                "ID",
                Object::Array(vec![
                    Object::String(id.clone(), StringFormat::Hexadecimal),
                    Object::String(id.clone(), StringFormat::Hexadecimal),
                ]),
            );
            id
        }
    };

    let owner = owner_password.unwrap_or(user_password).as_bytes();
    let owner_entry = compute_owner_entry(owner, user_password.as_bytes(), REVISION, KEY_LEN)?;
    let mut handler = Handler {
        revision: REVISION,
        key_len: KEY_LEN,
        owner_entry,
        user_entry: Vec::new(),
        permissions: PERMISSIONS,
        id0,
    };
    let key = file_key(user_password.as_bytes(), &handler);
    handler.user_entry = compute_user_entry(&key, &handler)?;

    for (id, object) in doc.objects.iter_mut() {
        crypt_object(object, &object_key(&key, *id), Direction::Encrypt)?;
    }

    let encrypt_id = doc.add_object(Dictionary::from_iter(vec![
        ("Filter", Object::Name(b"Standard".to_vec())),
        ("V", Object::Integer(2)),
        ("R", Object::Integer(handler.revision)),
        ("Length", Object::Integer((KEY_LEN * 8) as i64)),
        (
            "O",
            Object::String(handler.owner_entry.clone(), StringFormat::Hexadecimal),
        ),
        (
            "U",
            Object::String(handler.user_entry.clone(), StringFormat::Hexadecimal),
        ),
        ("P", Object::Integer(handler.permissions as i64)),
    ]));
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfToolsError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Remove encryption using either the user or the owner password.
pub fn decrypt_document(bytes: &[u8], password: &str) -> Result<Vec<u8>, PdfToolsError> {
    let mut doc =
        Document::load_mem(bytes).map_err(|e| PdfToolsError::ParseError(e.to_string()))?;

    let (encrypt_id, encrypt) = match doc.trailer.get(b"Encrypt") {
        Err(_) => return Err(PdfToolsError::NotEncrypted),
        Ok(Object::Reference(id)) => (
            Some(*id),
            doc.get_dictionary(*id)
                .map_err(|_| {
                    PdfToolsError::UnsupportedEncryption("Missing encryption dictionary".into())
                })?
                .clone(),
        ),
        Ok(Object::Dictionary(dict)) => (None, dict.clone()),
        Ok(_) => {
            return Err(PdfToolsError::UnsupportedEncryption(
                "Malformed /Encrypt entry".into(),
            ))
        }
    };

    let handler = read_handler(&doc, &encrypt)?;
    let key = authenticate(password.as_bytes(), &handler)?.ok_or(PdfToolsError::WrongPassword)?;

    for (id, object) in doc.objects.iter_mut() {
        if Some(*id) == encrypt_id || is_structural_stream(object) {
            continue;
        }
        crypt_object(object, &object_key(&key, *id), Direction::Decrypt)?;
    }

    doc.trailer.remove(b"Encrypt");
    if let Some(id) = encrypt_id {
        doc.objects.remove(&id);
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfToolsError::OperationError(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

pub fn encrypt_file(input: &Path, output: &Path, password: &str) -> Result<(), PdfToolsError> {
    let encrypted = encrypt_document(&std::fs::read(input)?, password, None)?;
    std::fs::write(output, encrypted)?;
    Ok(())
}

pub fn decrypt_file(input: &Path, output: &Path, password: &str) -> Result<(), PdfToolsError> {
    let decrypted = decrypt_document(&std::fs::read(input)?, password)?;
    std::fs::write(output, decrypted)?;
    Ok(())
}

fn read_handler(doc: &Document, encrypt: &Dictionary) -> Result<Handler, PdfToolsError> {
    let filter = encrypt.get(b"Filter").and_then(Object::as_name_str).ok();
    if filter != Some("Standard") {
        return Err(PdfToolsError::UnsupportedEncryption(
            "Only the standard security handler is supported".into(),
        ));
    }

    let integer = |key: &[u8]| encrypt.get(key).and_then(Object::as_i64).ok();
    let revision = integer(b"R").unwrap_or(0);
    if !(2..=3).contains(&revision) {
        return Err(PdfToolsError::UnsupportedEncryption(format!(
            "Security handler revision {} is not supported",
            revision
        )));
    }

    let key_len = if revision == 2 {
        5
    } else {
        (integer(b"Length").unwrap_or(40) / 8) as usize
    };
    if key_len != 5 && key_len != KEY_LEN {
        return Err(PdfToolsError::UnsupportedEncryption(format!(
            "{}-bit keys are not supported",
            key_len * 8
        )));
    }

    let string = |key: &[u8]| match encrypt.get(key) {
        Ok(Object::String(bytes, _)) => Ok(bytes.clone()),
        _ => Err(PdfToolsError::UnsupportedEncryption(format!(
            "Missing /{} entry",
            String::from_utf8_lossy(key)
        ))),
    };

    Ok(Handler {
        revision,
        key_len,
        owner_entry: string(b"O")?,
        user_entry: string(b"U")?,
        permissions: integer(b"P").unwrap_or(PERMISSIONS as i64) as i32,
        id0: first_id(doc).unwrap_or_default(),
    })
}

/// Try the password as user password, then as owner password.
/// Returns the file key on success.
fn authenticate(password: &[u8], handler: &Handler) -> Result<Option<Vec<u8>>, PdfToolsError> {
    if let Some(key) = authenticate_user(password, handler)? {
        return Ok(Some(key));
    }

    // Recover the user password from /O
    let owner_key = owner_rc4_key(password, handler.revision, handler.key_len);
    let mut user_password = handler.owner_entry.clone();
    if handler.revision == 2 {
        rc4(&owner_key, &mut user_password)?;
    } else {
        for i in (0..=19u8).rev() {
            rc4(&xor_key(&owner_key, i), &mut user_password)?;
        }
    }
    authenticate_user(&user_password, handler)
}

fn authenticate_user(password: &[u8], handler: &Handler) -> Result<Option<Vec<u8>>, PdfToolsError> {
    let key = file_key(password, handler);
    let expected = compute_user_entry(&key, handler)?;
    let compared = if handler.revision == 2 { 32 } else { 16 };

    let matches = handler.user_entry.len() >= compared
        && expected[..compared] == handler.user_entry[..compared];
    Ok(matches.then_some(key))
}

/// Algorithm 2: file encryption key
fn file_key(password: &[u8], handler: &Handler) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(pad(password));
    hasher.update(&handler.owner_entry);
    hasher.update((handler.permissions as u32).to_le_bytes());
    hasher.update(&handler.id0);
    let mut digest = hasher.finalize().to_vec();

    if handler.revision >= 3 {
        for _ in 0..50 {
            digest = Md5::digest(&digest[..handler.key_len]).to_vec();
        }
    }
    digest.truncate(handler.key_len);
    digest
}

/// Algorithm 3, steps a-d: RC4 key derived from the owner password
fn owner_rc4_key(owner_password: &[u8], revision: i64, key_len: usize) -> Vec<u8> {
    let mut digest = Md5::digest(pad(owner_password)).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            digest = Md5::digest(&digest).to_vec();
        }
    }
    digest.truncate(key_len);
    digest
}

/// Algorithm 3: the /O entry
fn compute_owner_entry(
    owner_password: &[u8],
    user_password: &[u8],
    revision: i64,
    key_len: usize,
) -> Result<Vec<u8>, PdfToolsError> {
    let key = owner_rc4_key(owner_password, revision, key_len);
    let mut data = pad(user_password).to_vec();
    rc4(&key, &mut data)?;
    if revision >= 3 {
        for i in 1..=19u8 {
            rc4(&xor_key(&key, i), &mut data)?;
        }
    }
    Ok(data)
}

/// Algorithms 4 and 5: the /U entry
fn compute_user_entry(key: &[u8], handler: &Handler) -> Result<Vec<u8>, PdfToolsError> {
    if handler.revision == 2 {
        let mut data = PADDING.to_vec();
        rc4(key, &mut data)?;
        return Ok(data);
    }

    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(&handler.id0);
    let mut data = hasher.finalize().to_vec();
    rc4(key, &mut data)?;
    for i in 1..=19u8 {
        rc4(&xor_key(key, i), &mut data)?;
    }
    data.extend_from_slice(&PADDING[..16]);
    Ok(data)
}

/// Algorithm 1: per-object key
fn object_key(key: &[u8], id: ObjectId) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(key);
    hasher.update(&id.0.to_le_bytes()[..3]);
    hasher.update(&id.1.to_le_bytes()[..2]);
    let mut digest = hasher.finalize().to_vec();
    digest.truncate((key.len() + 5).min(16));
    digest
}

fn crypt_object(
    object: &mut Object,
    key: &[u8],
    direction: Direction,
) -> Result<(), PdfToolsError> {
    match object {
        Object::String(bytes, format) => {
            rc4(key, bytes)?;
            if direction == Direction::Encrypt {
                *format = StringFormat::Hexadecimal;
            }
        }
        Object::Array(items) => {
            for item in items.iter_mut() {
                crypt_object(item, key, direction)?;
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                crypt_object(value, key, direction)?;
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                crypt_object(value, key, direction)?;
            }
            let mut content = std::mem::take(&mut stream.content);
            rc4(key, &mut content)?;
            stream.set_content(content);
        }
        _ => {}
    }
    Ok(())
}

fn rc4(key: &[u8], data: &mut [u8]) -> Result<(), PdfToolsError> {
    macro_rules! apply {
        ($size:ty) => {{
            let mut cipher = Rc4::<$size>::new_from_slice(key)
                .map_err(|_| PdfToolsError::OperationError("Invalid RC4 key".into()))?;
            cipher.apply_keystream(data);
        }};
    }

    match key.len() {
        5 => apply!(U5),
        10 => apply!(U10),
        16 => apply!(U16),
        n => {
            return Err(PdfToolsError::UnsupportedEncryption(format!(
                "{}-byte RC4 key",
                n
            )))
        }
    }
    Ok(())
}

fn xor_key(key: &[u8], value: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ value).collect()
}

fn pad(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    let n = password.len().min(32);
    padded[..n].copy_from_slice(&password[..n]);
    padded[n..].copy_from_slice(&PADDING[..32 - n]);
    padded
}

fn first_id(doc: &Document) -> Option<Vec<u8>> {
    match doc.trailer.get(b"ID").ok()?.as_array().ok()?.first()? {
        Object::String(bytes, _) => Some(bytes.clone()),
        _ => None,
    }
}

fn is_structural_stream(object: &Object) -> bool {
    match object {
        Object::Stream(stream) => stream
            .dict
            .get(b"Type")
            .and_then(Object::as_name_str)
            .map(|name| name == "ObjStm" || name == "XRef")
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn page_count(bytes: &[u8]) -> usize {
        Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn test_encrypt_then_decrypt_keeps_page_count() {
        let original = fixtures::document(4, "Secure");
        let encrypted = encrypt_document(&original, "secret", None).unwrap();
        assert!(is_encrypted(&encrypted).unwrap());

        let decrypted = decrypt_document(&encrypted, "secret").unwrap();
        assert!(!is_encrypted(&decrypted).unwrap());
        assert_eq!(page_count(&decrypted), 4);
    }

    #[test]
    fn test_decrypted_content_matches_original() {
        let original = fixtures::document(1, "Readable");
        let encrypted = encrypt_document(&original, "secret", None).unwrap();
        let decrypted = decrypt_document(&encrypted, "secret").unwrap();

        let doc = Document::load_mem(&decrypted).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let content_id = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Contents")
            .unwrap()
            .as_reference()
            .unwrap();
        let stream = doc.get_object(content_id).unwrap().as_stream().unwrap();
        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        assert!(String::from_utf8_lossy(&content).contains("Readable-Page-1"));
    }

    #[test]
    fn test_wrong_password_is_reported() {
        let encrypted = encrypt_document(&fixtures::document(1, "S"), "secret", None).unwrap();
        let err = decrypt_document(&encrypted, "not-the-secret").unwrap_err();
        assert!(matches!(err, PdfToolsError::WrongPassword));
    }

    #[test]
    fn test_owner_password_also_unlocks() {
        let encrypted =
            encrypt_document(&fixtures::document(2, "S"), "reader", Some("owner")).unwrap();
        let decrypted = decrypt_document(&encrypted, "owner").unwrap();
        assert_eq!(page_count(&decrypted), 2);
    }

    #[test]
    fn test_decrypt_plain_document_reports_not_encrypted() {
        let err = decrypt_document(&fixtures::document(1, "P"), "secret").unwrap_err();
        assert!(matches!(err, PdfToolsError::NotEncrypted));
    }

    #[test]
    fn test_encrypt_twice_rejected() {
        let encrypted = encrypt_document(&fixtures::document(1, "S"), "secret", None).unwrap();
        let err = encrypt_document(&encrypted, "secret", None).unwrap_err();
        assert!(matches!(err, PdfToolsError::AlreadyEncrypted));
    }

    #[test]
    fn test_pad_truncates_and_fills() {
        let padded = pad(b"abc");
        assert_eq!(&padded[..3], b"abc");
        assert_eq!(&padded[3..], &PADDING[..29]);
        assert_eq!(pad(&[7u8; 40]), [7u8; 32]);
    }
}
