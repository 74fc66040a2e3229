pub mod authorization_exchange;
