use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::warn;

use crate::models::{generate_id, Form};

/// Extension for downloaded form files.
pub const FORM_FILE_EXTENSION: &str = "kuest";

/// Encodes a form into an opaque URL-safe token so it can be shared as
/// a link without ever touching a server. JSON first, then UTF-8 bytes
/// through base64; titles and descriptions with arbitrary Unicode
/// survive the round trip.
pub fn encode_form(form: &Form) -> Option<String> {
    match serde_json::to_vec(form) {
        Ok(bytes) => Some(URL_SAFE_NO_PAD.encode(bytes)),
        Err(e) => {
            warn!("Failed to encode form {} for sharing: {}", form.id, e);
            None
        }
    }
}

/// Decodes a share token back into a form. Missing optional fields get
/// the same defaults the storage backends backfill, and the embedded id
/// is replaced with a fresh one so an imported form can never collide
/// with one the recipient already owns.
///
/// Any malformed token yields `None`; links are user input and a
/// friendly "invalid link" message is the expected failure mode.
pub fn decode_form(token: &str) -> Option<Form> {
    let bytes = match URL_SAFE_NO_PAD.decode(token.trim()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Share token is not valid base64: {}", e);
            return None;
        }
    };

    match serde_json::from_slice::<Form>(&bytes) {
        Ok(mut form) => {
            form.id = generate_id();
            Some(form)
        }
        Err(e) => {
            warn!("Share token did not contain a form: {}", e);
            None
        }
    }
}

/// Pretty JSON for the downloadable form file.
pub fn export_form_json(form: &Form) -> Option<String> {
    serde_json::to_string_pretty(form).ok()
}

/// Download filename built from the form title: lowercased, stripped to
/// alphanumerics, fixed extension. An all-symbol title still yields a
/// usable name.
pub fn export_file_name(form: &Form) -> String {
    let stem: String = form
        .title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let stem = if stem.is_empty() { "form".to_string() } else { stem };
    format!("{}.{}", stem, FORM_FILE_EXTENSION)
}

/// Parses the text content of an uploaded form file. Same backfill and
/// fresh-id rules as `decode_form`; `None` on anything unparseable.
pub fn import_form_json(text: &str) -> Option<Form> {
    match serde_json::from_str::<Form>(text) {
        Ok(mut form) => {
            form.id = generate_id();
            Some(form)
        }
        Err(e) => {
            warn!("Imported file did not contain a form: {}", e);
            None
        }
    }
}
