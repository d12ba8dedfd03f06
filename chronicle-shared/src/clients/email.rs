use reqwest::Client;
use serde::Serialize;

/// Thin client for a Resend-style transactional email API. Delivery
/// failures are reported to the caller, who logs and moves on; email is
/// never on the critical path of an auth operation.
#[derive(Clone)]
pub struct EmailClient {
    client: Client,
    api_key: String,
    from_email: String,
    from_name: String,
    app_base_url: String,
}

#[derive(Debug, Serialize)]
struct ResendRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

impl EmailClient {
    pub fn new(api_key: &str, from_email: &str, from_name: &str, app_base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            from_email: from_email.to_string(),
            from_name: from_name.to_string(),
            app_base_url: app_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), String> {
        let request = ResendRequest {
            from: format!("{} <{}>", self.from_name, self.from_email),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        };

        let response = self
            .client
            .post("https://api.resend.com/emails")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("email send failed: {e}"))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("email API error: {body}"));
        }

        tracing::debug!(to = %to, subject = %subject, "email sent");
        Ok(())
    }

    pub async fn send_verification_link(&self, to: &str, token: &str) -> Result<(), String> {
        let link = format!("{}/verify-email?token={token}", self.app_base_url);
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2 style="color: #b45309;">Chronicle - Verify your email</h2>
            <p>Welcome to Chronicle! Confirm your email address to finish setting up your account:</p>
            <p style="text-align: center; margin: 24px 0;"><a href="{link}" style="background: #b45309; color: #fff; padding: 12px 24px; border-radius: 6px; text-decoration: none;">Verify email</a></p>
            <p style="color: #666; margin-top: 20px;">This link expires in 2 days. If you did not create an account, please ignore this email.</p>
            </div>"#
        );

        self.send_email(to, "Chronicle - Verify your email", &html)
            .await
    }

    pub async fn send_password_reset_link(&self, to: &str, token: &str) -> Result<(), String> {
        let link = format!("{}/reset-password?token={token}", self.app_base_url);
        let html = format!(
            r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
            <h2 style="color: #b45309;">Chronicle - Password reset</h2>
            <p>We received a request to reset your password:</p>
            <p style="text-align: center; margin: 24px 0;"><a href="{link}" style="background: #b45309; color: #fff; padding: 12px 24px; border-radius: 6px; text-decoration: none;">Reset password</a></p>
            <p style="color: #666; margin-top: 20px;">This link expires in 24 hours. If you did not request this, please ignore this email.</p>
            </div>"#
        );

        self.send_email(to, "Chronicle - Reset your password", &html)
            .await
    }
}
