pub mod bookings;
pub mod metrics;
pub mod razorpay;
pub mod reconciler;
pub mod store;

pub use bookings::BookingService;
pub use metrics::{get_metrics, init_metrics};
pub use razorpay::RazorpayClient;
pub use reconciler::PaymentReconciler;
pub use store::{BookingStore, MongoStore};
