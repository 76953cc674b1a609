//! User-facing commands. Thin wrappers that run the conversion layer
//! with an explicit origin and report the outcome as a notice.

use tokio_util::sync::CancellationToken;

use crate::convert::{
    convert_file, convert_folder, convert_vault, ConvertError, ConvertOrigin, ConvertOutcome,
    ConvertReport,
};
use crate::host::NoticeSink;
use crate::session::Session;

pub async fn convert_links_in_current_file(
    session: &Session,
    path: &str,
) -> Result<ConvertOutcome, ConvertError> {
    let (seq, token) = session.begin_document_work(path).await;
    let result = convert_file(session, path, ConvertOrigin::Explicit, &token).await;
    session.finish_document_work(path, seq).await;

    match &result {
        Ok(ConvertOutcome::Converted(n)) => {
            session
                .notices
                .notify(&format!("Converted {n} links in {path}"))
                .await;
        }
        Ok(ConvertOutcome::Unchanged) => {
            session.notices.notify("No links needed converting").await;
        }
        _ => {}
    }
    result
}

pub async fn convert_links_in_folder(
    session: &Session,
    folder: &str,
    token: &CancellationToken,
) -> Result<ConvertReport, ConvertError> {
    let report = convert_folder(session, folder, ConvertOrigin::Explicit, token).await?;
    if !report.cancelled {
        notify_report(session, &report).await;
    }
    Ok(report)
}

pub async fn convert_links_in_vault(
    session: &Session,
    token: &CancellationToken,
) -> Result<ConvertReport, ConvertError> {
    let report = convert_vault(session, ConvertOrigin::Explicit, token).await?;
    if !report.cancelled {
        notify_report(session, &report).await;
    }
    Ok(report)
}

async fn notify_report(session: &Session, report: &ConvertReport) {
    let mut message = format!(
        "Converted {} links across {} notes",
        report.links_changed, report.files_changed
    );
    if !report.failures.is_empty() {
        message.push_str(&format!(", {} notes failed", report.failures.len()));
    }
    session.notices.notify(&message).await;
}
