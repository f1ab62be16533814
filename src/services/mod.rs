pub mod notifier;
pub mod trading_poller;
