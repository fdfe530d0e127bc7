//! Multipart registration forms

use futures_util::TryStreamExt;
use serde_json::Value;
use warp::multipart::{FormData, Part};
use warp::Buf;

use crate::error::{RegistryError, Result};
use crate::registry::RegistrationRequest;

/// Form field carrying the passport image
pub const PASSPORT_FIELD: &str = "passportImage";

const MAX_TEXT_FIELD_BYTES: usize = 8 * 1024;

#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct RegistrationForm {
    pub request: RegistrationRequest,
    pub passport_image: Option<UploadedFile>,
}

/// "5MB" for whole mebibytes, otherwise a finer unit
fn human_size(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    const KIB: u64 = 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}KB", bytes / KIB)
    } else {
        format!("{} bytes", bytes)
    }
}

pub fn file_too_large(max_bytes: u64) -> RegistryError {
    RegistryError::UploadError(format!(
        "File size exceeds the limit of {}!",
        human_size(max_bytes)
    ))
}

async fn read_part<F>(part: &mut Part, limit: usize, too_large: F) -> Result<Vec<u8>>
where
    F: Fn() -> RegistryError,
{
    let mut data = Vec::new();
    while let Some(chunk) = part.data().await {
        let mut chunk = chunk
            .map_err(|e| RegistryError::UploadError(format!("Malformed multipart body: {}", e)))?;

        while chunk.has_remaining() {
            let slice = chunk.chunk();
            if data.len() + slice.len() > limit {
                return Err(too_large());
            }
            data.extend_from_slice(slice);
            let read = slice.len();
            chunk.advance(read);
        }
    }
    Ok(data)
}

fn assign(request: &mut RegistrationRequest, name: &str, value: String) {
    match name {
        "email" => request.email = Some(value),
        "password" => request.password = Some(value),
        "role" => request.role = Some(value),
        "name" => request.name = Some(value),
        "number" => request.number = Some(value),
        "class" => request.class_name = Some(value),
        "address" => request.address = Some(value),
        "fatherName" => request.father_name = Some(value),
        "motherName" => request.mother_name = Some(value),
        "age" => request.age = Some(Value::String(value)),
        "birthdate" => request.birthdate = Some(value),
        "gender" => request.gender = Some(value),
        other => log::debug!("Ignoring form field {}", other),
    }
}

/// Reads a registration form. The passport image is capped at `max_file_bytes`.
pub async fn read_registration_form(mut form: FormData, max_file_bytes: u64) -> Result<RegistrationForm> {
    let mut request = RegistrationRequest::default();
    let mut passport_image = None;
    let file_limit = usize::try_from(max_file_bytes).unwrap_or(usize::MAX);

    while let Some(mut part) = form
        .try_next()
        .await
        .map_err(|e| RegistryError::UploadError(format!("Malformed multipart body: {}", e)))?
    {
        let name = part.name().to_string();

        if name == PASSPORT_FIELD {
            let file_name = part.filename().unwrap_or("").to_string();
            let bytes = read_part(&mut part, file_limit, || file_too_large(max_file_bytes)).await?;

            // An untouched file input arrives as an empty, unnamed part
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }
            passport_image = Some(UploadedFile { file_name, bytes });
            continue;
        }

        let bytes = read_part(&mut part, MAX_TEXT_FIELD_BYTES, || {
            RegistryError::UploadError(format!("Form field {} is too large", name))
        })
        .await?;
        let value = String::from_utf8(bytes).map_err(|_| {
            RegistryError::UploadError(format!("Form field {} is not valid UTF-8", name))
        })?;
        assign(&mut request, &name, value);
    }

    Ok(RegistrationForm {
        request,
        passport_image,
    })
}
