use serde_json::json;
use tokio::time::{sleep, Duration};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_MS: u64 = 1000;
const RESEND_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub api_key: Option<String>,
    pub from_email: String,
}

pub async fn send_email(
    settings: &MailSettings,
    to_email: &str,
    subject: &str,
    html_body: &str,
) -> Result<(), String> {
    if to_email.is_empty() || !to_email.contains('@') {
        return Err(format!("Invalid email address: {}", to_email));
    }

    let api_key = match settings.api_key.as_deref() {
        Some(key) if !key.is_empty() => key,
        _ => {
            tracing::debug!("RESEND_API_KEY not set, skipping email to {}", to_email);
            return Ok(());
        }
    };

    let mut last_error = None;

    for attempt in 1..=MAX_RETRIES {
        match send_via_resend(api_key, &settings.from_email, to_email, subject, html_body).await {
            Ok(email_id) => {
                tracing::info!("Email sent to {} (id: {})", to_email, email_id);
                return Ok(());
            }
            Err(e) => {
                last_error = Some(e);
                if attempt < MAX_RETRIES {
                    let delay = RETRY_DELAY_MS * (2_u64.pow(attempt - 1));
                    tracing::warn!(
                        "Email send attempt {} failed for {}. Retrying in {}ms...",
                        attempt,
                        to_email,
                        delay
                    );
                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    Err(last_error
        .map(|e| format!("Failed after {} retries: {}", MAX_RETRIES, e))
        .unwrap_or_else(|| "Unknown email sending error".to_string()))
}

async fn send_via_resend(
    api_key: &str,
    from_email: &str,
    to_email: &str,
    subject: &str,
    html_body: &str,
) -> Result<String, String> {
    let client = reqwest::Client::new();
    let request_body = json!({
        "from": from_email,
        "to": to_email,
        "subject": subject,
        "html": html_body,
    });

    let response = client
        .post(RESEND_URL)
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&request_body)
        .send()
        .await
        .map_err(|e| format!("Network error: {}", e))?;

    let status = response.status();
    let response_text = response
        .text()
        .await
        .unwrap_or_else(|_| "No response body".to_string());

    if !status.is_success() {
        return Err(format!("Resend API error ({}): {}", status.as_u16(), response_text));
    }

    let email_id = serde_json::from_str::<serde_json::Value>(&response_text)
        .ok()
        .and_then(|body| body.get("id").and_then(|v| v.as_str()).map(str::to_string))
        .unwrap_or_else(|| "success".to_string());

    Ok(email_id)
}
