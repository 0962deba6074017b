pub mod gateway_event;

pub use gateway_event::{
    GatewayEvent, MandateNotice, MandateNoticeKind, PaymentEntity, PaymentNotice,
    PaymentNoticeKind, TokenEntity,
};
