//! SMS dispatch interface and providers

pub mod provider;

pub use provider::{ConsoleSmsProvider, RetryingSmsProvider, SmsDelivery, SmsError, SmsProvider};
