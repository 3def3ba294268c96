//! Professional email formatting stage
//!
//! Formatting never fails outward: if the generation call errors, a fixed
//! template reply (with the standard signature) is returned instead.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error};

use super::EmailFormat;
use crate::api::{ApiClient, ApiMessage};
use crate::types::CustomerInfo;

/// Signature block required at the end of every support email
pub const SIGNATURE: &str = "Best regards,\n\
Thomas von Mentlen\n\
Customer Support Team\n\
Nakamo\n\
tvm@nakamo.io";

const SYSTEM_PROMPT: &str = "\
You are a professional customer support email specialist. Format the \
provided content as a complete support email reply that can be sent \
directly to the customer.

Requirements:
- Start with a professional greeting, addressing the customer by name when \
available
- Acknowledge the customer's inquiry
- Present the information clearly, with actionable steps where applicable
- Offer additional help before closing
- End with EXACTLY this signature:

Best regards,
Thomas von Mentlen
Customer Support Team
Nakamo
tvm@nakamo.io";

/// Email formatting over the completion service
pub struct EmailFormatter {
    api: ApiClient,
}

impl EmailFormatter {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl EmailFormat for EmailFormatter {
    async fn format(&self, content: &str, info: &CustomerInfo) -> Result<String> {
        debug!("Formatting content as support email");

        let prompt = format!(
            "Customer email information:\n\
             - Subject: {}\n\
             - Customer name: {}\n\
             - Email: {}\n\n\
             Content to deliver:\n{}\n\n\
             Format this as a professional support email reply, addressing the \
             customer by name when available.",
            info.subject,
            info.customer_name,
            info.sender_email.as_deref().unwrap_or("N/A"),
            content,
        );

        let messages = vec![ApiMessage::user(prompt)];
        match self.api.generate(&messages, SYSTEM_PROMPT).await {
            Ok(email) => Ok(email),
            Err(e) => {
                error!("Email formatting generation failed: {}", e);
                Ok(fallback_email(info))
            }
        }
    }
}

/// Fixed-template reply used when generation is unavailable
pub fn fallback_email(info: &CustomerInfo) -> String {
    format!(
        "Dear {},\n\n\
         Thank you for contacting our support team.\n\n\
         I apologize, but I'm currently experiencing technical difficulties and \
         unable to fully process your request at this time. Please contact our \
         support team directly, and we'll be happy to assist you promptly.\n\n\
         {}",
        info.customer_name, SIGNATURE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_email_carries_signature() {
        let email = fallback_email(&CustomerInfo::default());
        assert!(email.starts_with("Dear Valued Customer,"));
        assert!(email.ends_with(SIGNATURE));
    }

    #[test]
    fn test_fallback_email_uses_customer_name() {
        let info = CustomerInfo {
            customer_name: "Anna".to_string(),
            ..Default::default()
        };
        assert!(fallback_email(&info).starts_with("Dear Anna,"));
    }
}
