use std::path::Path;

use common::{error::AppError, storage::types::document::Document};
use mime::Mime;
use tracing::{debug, info, warn};

/// Whether `dir` exists and holds at least one entry.
pub async fn source_is_ready(dir: &Path) -> Result<bool, AppError> {
    match tokio::fs::read_dir(dir).await {
        Ok(mut entries) => Ok(entries.next_entry().await?.is_some()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Reads every document at the top level of `dir`, ordered by file name.
///
/// PDFs contribute their text layer. Hidden files and subdirectories are skipped, as are files
/// whose type is not text-like or whose content is not valid UTF-8.
pub async fn read_documents(dir: &Path) -> Result<Vec<Document>, AppError> {
    if !source_is_ready(dir).await? {
        return Err(AppError::MissingSource(format!(
            "data directory {} is missing or empty, please add documents to the directory",
            dir.display()
        )));
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.starts_with('.') {
            debug!(%file_name, "Skipping hidden file");
            continue;
        }
        if !entry.file_type().await?.is_file() {
            debug!(%file_name, "Skipping non-file entry");
            continue;
        }
        files.push((file_name, entry.path()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut documents = Vec::with_capacity(files.len());
    for (file_name, path) in files {
        let mime_type = mime_guess::from_path(&path).first_or_octet_stream();
        let text = if mime_type == mime::APPLICATION_PDF {
            extract_pdf_text(&file_name, tokio::fs::read(&path).await?).await
        } else if is_text_like(&mime_type) {
            let bytes = tokio::fs::read(&path).await?;
            match String::from_utf8(bytes) {
                Ok(text) => Some(text),
                Err(_) => {
                    warn!(%file_name, "Skipping document that is not valid UTF-8");
                    None
                }
            }
        } else {
            warn!(%file_name, mime_type = %mime_type, "Skipping unsupported document type");
            None
        };

        if let Some(text) = text {
            documents.push(Document::new(
                file_name,
                path,
                mime_type.essence_str().to_string(),
                text,
            ));
        }
    }

    if documents.is_empty() {
        return Err(AppError::MissingSource(format!(
            "data directory {} contains no readable text documents",
            dir.display()
        )));
    }

    info!(
        directory = %dir.display(),
        documents = documents.len(),
        "Loaded source documents"
    );

    Ok(documents)
}

/// Pulls the text layer out of a PDF off the async executor.
///
/// Returns `None` when the PDF cannot be parsed or carries no text.
async fn extract_pdf_text(file_name: &str, pdf_bytes: Vec<u8>) -> Option<String> {
    let extraction = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&pdf_bytes).map(|s| s.trim().to_string())
    })
    .await;

    match extraction {
        Ok(Ok(text)) if !text.is_empty() => {
            debug!(%file_name, chars = text.len(), "Extracted PDF text");
            Some(text)
        }
        Ok(Ok(_)) => {
            warn!(%file_name, "Skipping PDF without a text layer");
            None
        }
        Ok(Err(err)) => {
            warn!(%file_name, error = %err, "Skipping PDF that could not be parsed");
            None
        }
        Err(err) => {
            warn!(%file_name, error = %err, "PDF extraction task failed");
            None
        }
    }
}

fn is_text_like(mime_type: &Mime) -> bool {
    if mime_type.type_() == mime::TEXT {
        return true;
    }

    matches!(
        mime_type.essence_str(),
        "application/octet-stream"
            | "application/json"
            | "application/xml"
            | "application/toml"
            | "application/x-sh"
            | "application/javascript"
    )
}
