pub mod gateway_trait;
pub mod razorpay;

pub use gateway_trait::{
    ChargeResponse, MandateRegistration, MandateRegistrationRequest, MandateStatusReport,
    PaymentGateway, RecurringChargeRequest,
};
pub use razorpay::RazorpayGateway;
