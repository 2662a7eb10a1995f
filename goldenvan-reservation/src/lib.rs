pub mod audit;
pub mod distance;
pub mod gateway;
pub mod manager;
pub mod reconciler;

pub use distance::{GoogleDistanceResolver, StaticDistanceResolver};
pub use gateway::{HttpPaymentGateway, MockPaymentGateway};
pub use manager::{
    BookingConfirmation, BookingDraft, Disposition, PaymentAttempt, PaymentSubmission,
    Reconciliation, ReservationManager, Timeouts,
};
pub use reconciler::{WebhookNotification, WebhookReconciler};
