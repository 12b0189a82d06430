use async_trait::async_trait;

pub mod checkout_client;

pub use checkout_client::HttpCheckoutClient;

/// Authoritative payment state as reported by the external gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Pending,
    Paid,
    Failed,
}

/// The external payment gateway. Both calls may be slow; implementations
/// carry a bounded timeout, and a timeout surfaces as a transient error, not
/// as proof the gateway did nothing.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a checkout for the order and return the gateway's reference the
    /// client uses to pay.
    async fn create_checkout(
        &self,
        order_code: &str,
        amount_cents: i64,
        description: &str,
    ) -> crate::error::Result<String>;

    /// Query the authoritative status of an order. Idempotent; safe to retry.
    async fn get_payment_status(
        &self,
        order_code: &str,
    ) -> crate::error::Result<GatewayPaymentStatus>;
}
