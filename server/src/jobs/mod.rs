/// Background jobs
///
/// Long-running loops spawned from `main`: the scheduled-post poller and
/// the token refresher. Both stop when the shutdown channel fires.
pub mod scheduled_publisher;
pub mod token_refresher;
