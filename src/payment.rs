//! Hosted checkout through Stripe's REST API.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::AppError;
use crate::money::Money;

pub const SESSION_COMPLETE: &str = "complete";

/// What the caller is paying for.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub product_name: String,
    pub amount: Money,
    pub metadata: Vec<(String, String)>,
    /// Path the provider sends the payer back to; `session_id` is appended.
    pub confirm_path: String,
    pub cancel_path: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some(SESSION_COMPLETE)
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, AppError>;

    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, AppError>;
}

pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
    currency: String,
    app_url: String,
}

impl StripeGateway {
    pub fn new(secret_key: &str, api_base: &str, currency: &str, app_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            currency: currency.to_string(),
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    fn form_for(&self, request: &CheckoutRequest) -> Result<Vec<(String, String)>, AppError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("ui_mode".into(), "hosted".into()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("line_items[0][price_data][currency]".into(), self.currency.clone()),
            (
                "line_items[0][price_data][product_data][name]".into(),
                request.product_name.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                minor_units(request.amount)?.to_string(),
            ),
            (
                "success_url".into(),
                format!("{}{}?session_id={{CHECKOUT_SESSION_ID}}", self.app_url, request.confirm_path),
            ),
            ("cancel_url".into(), format!("{}{}", self.app_url, request.cancel_path)),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }
        Ok(form)
    }

    async fn read_session(&self, resp: reqwest::Response) -> Result<CheckoutSession, AppError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            log::error!("Stripe answered {}: {}", status, body);
            return Err(AppError::Payment(format!("checkout provider answered {}", status)));
        }
        resp.json::<CheckoutSession>()
            .await
            .map_err(|e| AppError::Payment(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, AppError> {
        let form = self.form_for(&request)?;
        let resp = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Payment(e.to_string()))?;
        let session = self.read_session(resp).await?;
        log::info!("Checkout session {} created for {}", session.id, request.product_name);
        Ok(session)
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, AppError> {
        let session_id = checked_session_id(session_id)?;
        let resp = self
            .client
            .get(format!("{}/v1/checkout/sessions/{}", self.api_base, session_id))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::Payment(e.to_string()))?;
        self.read_session(resp).await
    }
}

/// Checkout session ids look like `cs_test_a1B2...`. Anything else never
/// reaches the provider's URL.
pub fn checked_session_id(session_id: &str) -> Result<&str, AppError> {
    let well_formed = session_id.len() > 3
        && session_id.starts_with("cs_")
        && session_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !well_formed {
        log::warn!("Rejected malformed checkout session id {:?}", session_id);
        return Err(AppError::Validation("Invalid checkout session".to_string()));
    }
    Ok(session_id)
}

/// Amount in the currency's minor unit (cents), as the provider expects.
pub fn minor_units(amount: Money) -> Result<i64, AppError> {
    (amount.0 * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .filter(|units| *units > 0)
        .ok_or_else(|| AppError::Validation(format!("Invalid payment amount: {}", amount)))
}


#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            product_name: "Villa Kenanga".to_string(),
            amount: "1500000.5".parse().unwrap(),
            metadata: vec![("bookingId".to_string(), "b-1".to_string())],
            confirm_path: "/api/confirm".to_string(),
            cancel_path: "/bookings".to_string(),
        }
    }

    #[test]
    fn amounts_are_sent_in_minor_units() {
        assert_eq!(minor_units(Money::from_units(150)).unwrap(), 15000);
        assert_eq!(minor_units("0.5".parse().unwrap()).unwrap(), 50);
        assert!(minor_units(Money::ZERO).is_err());
    }

    #[test]
    fn form_carries_metadata_and_return_urls() {
        let gateway = StripeGateway::new("sk_test", "https://api.stripe.com/", "idr", "http://localhost:8080/");
        let form = gateway.form_for(&request()).unwrap();
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(get("metadata[bookingId]"), "b-1");
        assert_eq!(get("line_items[0][price_data][unit_amount]"), "150000050");
        assert_eq!(get("line_items[0][price_data][currency]"), "idr");
        assert_eq!(
            get("success_url"),
            "http://localhost:8080/api/confirm?session_id={CHECKOUT_SESSION_ID}"
        );
    }

    #[test]
    fn only_checkout_session_ids_are_looked_up() {
        assert_eq!(checked_session_id("cs_test_a1B2c3").unwrap(), "cs_test_a1B2c3");
        for bad in [
            "",
            "cs_",
            "../../customers/cus_123?expand[]=x",
            "cs_test/../../customers",
            "cs_test?expand[]=x",
            "cus_123",
            "cs_test%2F..",
        ] {
            assert!(matches!(checked_session_id(bad), Err(AppError::Validation(_))), "{}", bad);
        }
    }

    #[tokio::test]
    async fn malformed_session_id_never_leaves_the_process() {
        // nothing listens here; a request would fail as a payment error instead
        let gateway = StripeGateway::new("sk_test", "http://127.0.0.1:9", "idr", "http://localhost:8080");
        let result = gateway.retrieve_session("../../customers/cus_123").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn session_json_is_parsed() {
        let session: CheckoutSession = serde_json::from_str(
            r#"{"id":"cs_1","object":"checkout.session","url":null,"status":"complete","metadata":{"memberId":"m-1","transactionId":""}}"#,
        )
        .unwrap();
        assert!(session.is_complete());
        assert_eq!(session.metadata_value("memberId"), Some("m-1"));
        assert_eq!(session.metadata_value("transactionId"), None);
    }
}
