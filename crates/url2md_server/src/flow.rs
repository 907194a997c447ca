use std::time::Instant;

use serde::Deserialize;
use serde_json::json;
use url2md_core::{ConversionJob, LifecycleError, NotificationEvent};
use url2md_engine::ConvertOptions;
use url2md_logging::conv_error;

use crate::context::AppContext;

/// A request to convert one URL, as accepted by every entry point.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub url: String,
    #[serde(default = "default_include_images")]
    pub include_images: bool,
    #[serde(default)]
    pub clean_html: bool,
}

fn default_include_images() -> bool {
    true
}

impl ConversionRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            include_images: true,
            clean_html: false,
        }
    }

    fn options(&self) -> ConvertOptions {
        ConvertOptions {
            include_images: self.include_images,
            clean_html: self.clean_html,
        }
    }
}

/// Drives one conversion from `pending` to a terminal state.
///
/// Pipeline failures end up on the returned job as `failed` with an error
/// message; they are never returned as `Err`. `origin` names the caller in the
/// activity log (client address, or the protocol tool).
pub async fn run_conversion(
    ctx: &AppContext,
    request: &ConversionRequest,
    origin: &str,
) -> ConversionJob {
    ctx.activity.info(
        format!("Conversion request received for: {}", request.url),
        Some(json!({
            "includeImages": request.include_images,
            "cleanHtml": request.clean_html,
            "client": origin,
        })),
    );

    let job = ctx
        .store
        .create(&request.url, request.include_images, request.clean_html);
    ctx.events.publish(NotificationEvent::ConversionStarted {
        id: job.id,
        url: job.url.clone(),
    });

    let job = match ctx.store.start_processing(job.id) {
        Ok(processing) => processing,
        Err(err) => return lifecycle_fallback(ctx, job, err),
    };

    let started = Instant::now();
    let result = ctx.converter.convert(&request.url, request.options()).await;
    let elapsed = started.elapsed();

    match result {
        Ok(page) => {
            ctx.stats.record_conversion(true, elapsed);
            ctx.activity.success(
                format!("Successfully converted URL: {}", request.url),
                Some(json!({
                    "conversionId": job.id,
                    "title": page.title,
                    "markdownLength": page.markdown.len(),
                    "elapsedMs": elapsed.as_millis() as u64,
                })),
            );
            let title = page.title.clone();
            let finished = match ctx.store.complete(job.id, page.markdown, page.title) {
                Ok(finished) => finished,
                Err(err) => return lifecycle_fallback(ctx, job, err),
            };
            ctx.events.publish(NotificationEvent::ConversionCompleted {
                id: finished.id,
                url: finished.url.clone(),
                title,
            });
            ctx.events.publish(NotificationEvent::StatsUpdate {});
            finished
        }
        Err(err) => {
            let message = format!("Conversion failed: {}", err.message);
            ctx.stats.record_conversion(false, elapsed);
            ctx.activity.error(
                format!("Conversion failed for: {}", request.url),
                Some(json!({
                    "conversionId": job.id,
                    "error": message,
                    "kind": err.kind.to_string(),
                    "client": origin,
                })),
            );
            let finished = match ctx.store.fail(job.id, message.clone()) {
                Ok(finished) => finished,
                Err(err) => return lifecycle_fallback(ctx, job, err),
            };
            ctx.events.publish(NotificationEvent::ConversionFailed {
                id: finished.id,
                url: finished.url.clone(),
                error: message,
            });
            ctx.events.publish(NotificationEvent::StatsUpdate {});
            finished
        }
    }
}

// Only reachable if the job vanished or was moved by someone else, which the
// store's single-writer model rules out. Report whatever is stored.
fn lifecycle_fallback(ctx: &AppContext, job: ConversionJob, err: LifecycleError) -> ConversionJob {
    conv_error!("Lifecycle violation for conversion {}: {}", job.id, err);
    ctx.store.get(job.id).unwrap_or(job)
}
